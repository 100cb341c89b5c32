//! Compile `<base>.p` into `<base>.ts`.
//!
//! Usage:
//!   bitstructc <BASE>
//!
//! Set `RUST_LOG=debug` to trace each compiled declaration.

use anyhow::{Context, Result};
use bitstructc::{compile_file, CompileOptions};
use clap::Parser;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "bitstructc")]
#[command(about = "Compile a bitstruct specification into TypeScript decoders.")]
struct Cli {
    /// Base name: reads <BASE>.p, writes <BASE>.ts
    base: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let input = with_suffix(&cli.base, ".p");
    let output = with_suffix(&cli.base, ".ts");

    let generated = compile_file(&input, &CompileOptions::default())
        .with_context(|| format!("compiling {}", input.display()))?;
    fs::write(&output, generated).with_context(|| format!("writing {}", output.display()))?;
    log::info!("wrote {}", output.display());
    Ok(())
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
