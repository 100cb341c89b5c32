//! # bitstructc: bit-packed record DSL compiler
//!
//! A DSL for declaring fixed-size 64-bit records (four 16-bit words, as in RDS data
//! groups) with a PEST grammar, compiled into TypeScript decode and log routines.
//!
//! ## DSL structure
//!
//! - **Imports**: `import module Symbol` re-exports a host symbol
//! - **Structs**: host objects (fields and method signatures) the decoders write into
//! - **Bitstructs**: one record layout, plus `action { ... }` and `log { ... }` sections
//!
//! ## Field types
//!
//! - `uint<N>`, `bool`, `byte<N>` (N bytes), `unparsed<N>` (consumes bits, no value)
//! - Fields named `_` consume bits without becoming a value
//! - Widths of one bitstruct must sum to exactly 64
//!
//! ## Example DSL
//!
//! ```text
//! struct Station {
//!   pi: uint<16>
//!   ps: str<8>
//!   addToGroupStats(type: uint<5>)
//! }
//!
//! bitstruct group(station: Station) {
//!   pi: uint<16>
//!   type: uint<5>
//!   _: unparsed<43>
//! } action {
//!   station.pi = pi
//!   station.addToGroupStats(type)
//! } log {
//!   "PI={pi:04x} Group {type:grouptype}"
//! }
//! ```
//!
//! Every field that touches an invalid word decodes to `null`, and every statement or log
//! line referencing it is skipped.
//!
//! ## Usage
//!
//! ```no_run
//! let ts = bitstructc::compile_file(std::path::Path::new("rds.p"), &Default::default())?;
//! # Ok::<(), bitstructc::CompileError>(())
//! ```

pub mod action;
pub mod ast;
pub mod compiler;
pub mod emit;
pub mod error;
pub mod expr;
pub mod guard;
pub mod layout;
pub mod parser;
pub mod preprocess;
pub mod record;
pub mod template;
pub mod types;

pub use ast::Specification;
pub use compiler::{compile, CompileOptions};
pub use error::{CompileError, Result};
pub use layout::{field_extent, BitstructLayout, FieldExtent};
pub use parser::parse;
pub use record::{DecodedField, FieldValue, Record};

/// Parse and compile specification source (includes already inlined).
pub fn compile_source(source: &str, options: &CompileOptions) -> Result<String> {
    let spec = parse(source)?;
    compile(&spec, options)
}

/// Inline includes, parse and compile a specification file.
pub fn compile_file(path: &std::path::Path, options: &CompileOptions) -> Result<String> {
    let source = preprocess::inline_includes(path)?;
    compile_source(&source, options)
}
