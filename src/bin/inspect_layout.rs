//! Print the bit layout of bitstructs and decode a sample record against it.
//!
//! Usage:
//!   inspect_layout <FILE.p> [--rule NAME] [--record HEX] [--invalid WORD]...
//!
//! `--record` takes 16 hex digits (spaces allowed), word 0 first. Each `--invalid`
//! marks one word (0..3) as failed, poisoning every field that touches it.

use anyhow::{anyhow, bail, Context, Result};
use bitstructc::ast::Bitstruct;
use bitstructc::preprocess::inline_includes;
use bitstructc::{parse, BitstructLayout, FieldValue, Record};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inspect_layout")]
#[command(about = "Show per-field masks and shifts of bitstruct layouts.")]
struct Cli {
    file: PathBuf,

    /// Only this bitstruct
    #[arg(long)]
    rule: Option<String>,

    /// Record to decode, as 16 hex digits
    #[arg(long)]
    record: Option<String>,

    /// Word index to mark invalid (repeatable)
    #[arg(long)]
    invalid: Vec<usize>,
}

fn parse_record(hex: &str, invalid: &[usize]) -> Result<Record> {
    let digits: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != 16 {
        bail!("record must be 16 hex digits, got {}", digits.len());
    }
    let bytes = (0..8)
        .map(|i| u8::from_str_radix(&digits[2 * i..2 * i + 2], 16))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .with_context(|| format!("invalid hex record: {}", hex))?;
    let mut record = Record::from_be_bytes(&bytes)?;
    for &w in invalid {
        if w >= record.ok.len() {
            bail!("invalid word index {} (records have 4 words)", w);
        }
        record = record.with_invalid(w);
    }
    Ok(record)
}

fn show(value: &Option<FieldValue>) -> String {
    match value {
        None => "null".to_string(),
        Some(FieldValue::Uint(v)) => format!("{} (0x{:X})", v, v),
        Some(FieldValue::Bool(b)) => b.to_string(),
        Some(FieldValue::Bytes(bytes)) => bytes
            .iter()
            .map(|b| b.map_or_else(|| "..".to_string(), |b| format!("{:02X}", b)))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn inspect(bitstruct: &Bitstruct, record: Option<&Record>) -> Result<()> {
    let layout = BitstructLayout::new(bitstruct)?;
    println!("bitstruct {}", layout.name);
    for placed in &layout.fields {
        let decl = placed.decl;
        println!(
            "  {:<20} {:<14} +{:<2} width {}",
            decl.name,
            decl.field_type.to_string(),
            placed.pos,
            decl.field_type.width()
        );
        if !decl.is_output() {
            continue;
        }
        for (i, extent) in placed.element_extents().iter().enumerate() {
            let parts: Vec<String> = extent
                .words()
                .map(|w| format!("w{}: mask {:#018b} shift {:+}", w, extent.masks[w], extent.shifts[w]))
                .collect();
            println!("    [{}] {}", i, parts.join(", "));
        }
    }
    if let Some(record) = record {
        println!("  decoded {:016X}:", record.as_u64());
        for field in record.decode(&layout) {
            println!("    {} = {}", field.name, show(&field.value));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let source = inline_includes(&cli.file).with_context(|| format!("reading {}", cli.file.display()))?;
    let spec = parse(&source).with_context(|| format!("parsing {}", cli.file.display()))?;
    let record = cli
        .record
        .as_deref()
        .map(|hex| parse_record(hex, &cli.invalid))
        .transpose()?;

    match &cli.rule {
        Some(rule) => {
            let bitstruct = spec
                .get_bitstruct(rule)
                .ok_or_else(|| anyhow!("no bitstruct named `{}`", rule))?;
            inspect(bitstruct, record.as_ref())?;
        }
        None => {
            for bitstruct in spec.bitstructs() {
                inspect(bitstruct, record.as_ref())?;
            }
        }
    }
    Ok(())
}
