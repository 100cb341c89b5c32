//! `#include` inlining, applied to source text before parsing.

use crate::error::{CompileError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const INCLUDE: &str = "#include ";

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| CompileError::Io { path: path.to_path_buf(), source })
}

/// Read `path` and replace each `#include <file>` line by the lines of `<file>`.
///
/// One level only: includes inside included files are left as they are (and then read
/// as comments by the grammar). Relative paths resolve against the including file's
/// directory.
pub fn inline_includes(path: &Path) -> Result<String> {
    let source = read(path)?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        match line.strip_prefix(INCLUDE) {
            Some(target) => {
                let target = target.trim();
                let resolved: PathBuf = base.join(target);
                log::debug!("including {}", resolved.display());
                let included = read(&resolved)?;
                for l in included.lines() {
                    out.push_str(l);
                    out.push('\n');
                }
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    Ok(out)
}
