//! Compile fuzz target: arbitrary text through the parser and, when it parses, the compiler.
//! Neither may panic; malformed input must come back as a `CompileError`.
//! Build with: cargo fuzz run compile_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(spec) = bitstructc::parse(s) {
        let _ = bitstructc::compile(&spec, &bitstructc::CompileOptions::default());
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run compile_fuzz");
}
