//! Log templates: literal text with `{identifier:format}` placeholders, rendered into
//! a single guarded log statement.

use crate::emit::Emitter;
use crate::error::{CompileError, Result};
use crate::expr::Lowering;
use crate::guard::{emit_guarded, GuardSet};
use crate::types::Ty;
use std::str::FromStr;

/// Closed set of placeholder renderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSpec {
    Bool,
    Unsigned,
    Decimal2,
    Hex2,
    Hex4,
    GroupType,
    Frequency,
    RdsText,
    Bytes,
    Letter,
    Sign,
}

impl FromStr for FormatSpec {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "bool" => FormatSpec::Bool,
            "u" => FormatSpec::Unsigned,
            "02u" => FormatSpec::Decimal2,
            "02x" => FormatSpec::Hex2,
            "04x" => FormatSpec::Hex4,
            "grouptype" => FormatSpec::GroupType,
            "freq" => FormatSpec::Frequency,
            "rdstext" => FormatSpec::RdsText,
            "bytes" => FormatSpec::Bytes,
            "letter" => FormatSpec::Letter,
            "sign" => FormatSpec::Sign,
            other => return Err(CompileError::Format(format!("unknown format spec `{}`", other))),
        })
    }
}

impl FormatSpec {
    /// Target expression rendering `var`.
    pub fn render(self, var: &str) -> String {
        match self {
            FormatSpec::Bool => format!("{} ? '1': '0'", var),
            FormatSpec::Unsigned => var.to_string(),
            FormatSpec::Decimal2 => format!("{}.toString().padStart(2, '0')", var),
            FormatSpec::Hex2 => format!("{}.toString(16).toUpperCase().padStart(2, '0')", var),
            FormatSpec::Hex4 => format!("{}.toString(16).toUpperCase().padStart(4, '0')", var),
            FormatSpec::GroupType => {
                format!("({v}>>1).toString() + (({v} & 1) == 0 ? 'A' : 'B')", v = var)
            }
            FormatSpec::Frequency => format!("formatAf({})", var),
            FormatSpec::RdsText => format!("formatRdsText({})", var),
            FormatSpec::Bytes => format!("formatBytes({})", var),
            FormatSpec::Letter => format!("{} ? 'A' : 'B'", var),
            FormatSpec::Sign => format!("{} ? '+' : '-'", var),
        }
    }

    /// Whether a value of type `ty` can be rendered with this spec.
    fn fits(self, ty: &Ty) -> bool {
        let sequence = matches!(self, FormatSpec::RdsText | FormatSpec::Bytes);
        match ty {
            ty if ty.unchecked() => true,
            // `bigint` does not mix with number arithmetic or `formatAf`.
            Ty::Wide => !sequence && !matches!(self, FormatSpec::GroupType | FormatSpec::Frequency),
            ty => sequence == matches!(ty, Ty::Bytes(_)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder { ident: String, spec: FormatSpec },
}

/// Split a template into literal text and placeholders.
pub fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut part = String::new();
    let mut in_placeholder = false;
    for c in template.chars() {
        match (in_placeholder, c) {
            (false, '{') => {
                if !part.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut part)));
                }
                in_placeholder = true;
            }
            (true, '{') => {
                return Err(CompileError::Format(format!("nested `{{` in log string \"{}\"", template)))
            }
            (true, '}') => {
                segments.push(placeholder(&part, template)?);
                part.clear();
                in_placeholder = false;
            }
            (_, c) => part.push(c),
        }
    }
    if in_placeholder {
        return Err(CompileError::Format(format!(
            "log string stopped inside a placeholder: \"{}\"",
            template
        )));
    }
    if !part.is_empty() {
        segments.push(Segment::Literal(part));
    }
    Ok(segments)
}

fn placeholder(body: &str, template: &str) -> Result<Segment> {
    let malformed = || {
        CompileError::Format(format!(
            "placeholder `{{{}}}` must be of the form {{variable:format}} in \"{}\"",
            body, template
        ))
    };
    let parts: Vec<&str> = body.split(':').collect();
    let [ident, spec] = parts.as_slice() else {
        return Err(malformed());
    };
    let mut chars = ident.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(malformed());
    }
    Ok(Segment::Placeholder { ident: ident.to_string(), spec: spec.parse()? })
}

/// Escape literal text for a backtick template literal.
fn escape_literal(text: &str) -> String {
    text.replace('\\', "\\\\").replace('`', "\\`")
}

impl Lowering<'_> {
    /// One log line. An absent referenced field suppresses the whole line.
    pub fn log_statement(&mut self, out: &mut Emitter, template: &str) -> Result<()> {
        let mut rendered = String::new();
        let mut guards = GuardSet::new();
        for segment in parse_template(template)? {
            match segment {
                Segment::Literal(text) => rendered.push_str(&escape_literal(&text)),
                Segment::Placeholder { ident, spec } => {
                    let ty = self.scope.get(&ident)?;
                    if !spec.fits(ty) {
                        return Err(CompileError::Format(format!(
                            "`{:?}` cannot render `{}` of type `{}`",
                            spec,
                            ident,
                            ty.ts(self.options)
                        )));
                    }
                    rendered.push_str(&format!("${{{}}}", spec.render(&ident)));
                    guards = guards.union(GuardSet::value(ident));
                }
            }
        }
        let var = self.names.log();
        let guards = self.settle(guards);
        emit_guarded(out, &guards, |out| {
            out.line(format!("const {} = `{}`;", var, rendered));
            out.line(format!("log.add({});", var));
            Ok(())
        })
    }
}
