//! Driver: walks the specification in declaration order and writes the generated module.

use crate::ast::{Bitstruct, Declaration, FieldType, Import, Specification, Struct};
use crate::emit::Emitter;
use crate::error::{CompileError, Result};
use crate::expr::Lowering;
use crate::layout::{BitstructLayout, FieldExtent, PlacedField, BITWISE_BITS, EXACT_BITS};
use crate::types::{Scope, TypeEnv};
use std::collections::BTreeSet;

/// Names of the runtime the generated code links against.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Module the runtime symbols are imported from.
    pub runtime_module: String,
    /// Log sink type; exposes `add(line)`.
    pub sink_type: String,
    /// String-like type used for `str<N>` fields.
    pub string_type: String,
    /// Character table indexed by code point.
    pub charmap: String,
    /// Channel number to frequency lookup, in units of 100 kHz.
    pub frequency_lookup: String,
    /// Appended to a record name to name its default-constructible implementation.
    pub impl_suffix: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            runtime_module: "./rds_types".to_string(),
            sink_type: "LogMessage".to_string(),
            string_type: "RdsString".to_string(),
            charmap: "RDS_CHARMAP".to_string(),
            frequency_lookup: "channelToFrequency".to_string(),
            impl_suffix: "Impl".to_string(),
        }
    }
}

/// Synthetic name counters, owned by one compile run.
#[derive(Debug, Default)]
pub struct NameContext {
    elements: usize,
    logs: usize,
}

impl NameContext {
    /// Next element guard id and variable.
    pub fn element(&mut self) -> (usize, String) {
        let id = self.elements;
        self.elements += 1;
        (id, format!("elt{}", id))
    }

    pub fn log(&mut self) -> String {
        let id = self.logs;
        self.logs += 1;
        format!("log{}", id)
    }
}

/// Compile a parsed specification into one generated source file.
pub fn compile(spec: &Specification, options: &CompileOptions) -> Result<String> {
    let env = TypeEnv::new(spec)?;
    let mut rules = BTreeSet::new();
    for b in spec.bitstructs() {
        if !rules.insert(b.name.clone()) {
            return Err(CompileError::DuplicateName { kind: "bitstruct", name: b.name.clone() });
        }
    }
    let mut names = NameContext::default();
    let mut out = Emitter::new();

    out.line("// Generated file. DO NOT EDIT.");
    out.blank();
    let mut runtime: BTreeSet<String> = [
        &options.sink_type,
        &options.string_type,
        &options.charmap,
        &options.frequency_lookup,
    ]
    .into_iter()
    .cloned()
    .collect();
    let constructors: BTreeSet<String> = env
        .constructible_types(spec)?
        .into_iter()
        .map(|record| format!("{}{}", record, options.impl_suffix))
        .collect();
    runtime.extend(constructors.iter().cloned());
    out.line(format!(
        "import {{ {} }} from \"{}\";",
        runtime.into_iter().collect::<Vec<_>>().join(", "),
        options.runtime_module
    ));
    out.blank();

    let mut dispatch = Vec::new();
    for declaration in &spec.declarations {
        match declaration {
            Declaration::Import(import) => emit_import(&mut out, import),
            Declaration::Struct(s) => emit_interface(&mut out, &env, s, options)?,
            Declaration::Bitstruct(b) => {
                let scope = Scope::new(&env, b)?;
                if let Some(name) = constructors.iter().find(|c| scope.get(c).is_ok()) {
                    return Err(CompileError::DuplicateName { kind: "reserved", name: name.clone() });
                }
                let mut lowering = Lowering {
                    env: &env,
                    scope: &scope,
                    names: &mut names,
                    options,
                    rules: &rules,
                };
                emit_parse_function(&mut out, &mut lowering, b)?;
                dispatch.push(b.name.as_str());
            }
        }
        log::debug!("compiled {}", declaration_name(declaration));
    }

    emit_trailer(&mut out, &dispatch, options);
    log::info!(
        "compiled {} declarations, {} rules",
        spec.declarations.len(),
        dispatch.len()
    );
    Ok(out.finish())
}

fn declaration_name(declaration: &Declaration) -> String {
    match declaration {
        Declaration::Import(i) => format!("import {} {}", i.module, i.symbol),
        Declaration::Struct(s) => format!("struct {}", s.name),
        Declaration::Bitstruct(b) => format!("bitstruct {}", b.name),
    }
}

fn emit_import(out: &mut Emitter, import: &Import) {
    out.line(format!("import {{ {} }} from \"./{}\";", import.symbol, import.module));
    out.blank();
}

fn emit_interface(out: &mut Emitter, env: &TypeEnv, s: &Struct, options: &CompileOptions) -> Result<()> {
    out.block(format!("export interface {} {{", s.name), |out: &mut Emitter| -> Result<()> {
        for f in &s.fields {
            let ty = env.resolve(&f.var_type)?;
            let mark = if ty.optional() { "?" } else { "" };
            out.line(format!("{}{}: {};", f.name, mark, ty.ts(options)));
        }
        for m in &s.methods {
            let params = m
                .params
                .iter()
                .map(|p| -> Result<String> {
                    Ok(format!("{}: {}", p.name, env.resolve(&p.var_type)?.ts(options)))
                })
                .collect::<Result<Vec<_>>>()?;
            out.line(format!("{}({}): void;", m.name, params.join(", ")));
        }
        Ok(())
    })?;
    out.blank();
    Ok(())
}

fn emit_parse_function(out: &mut Emitter, lowering: &mut Lowering, b: &Bitstruct) -> Result<()> {
    let layout = BitstructLayout::new(b)?;
    let args: String = lowering
        .scope
        .arguments()
        .iter()
        .map(|(name, ty)| format!(", {}: {}", name, ty.ts(lowering.options)))
        .collect();
    let header = format!(
        "export function parse_{}(block: Uint16Array, ok: boolean[], log: {}{}) {{",
        b.name, lowering.options.sink_type, args
    );
    out.block(header, |out: &mut Emitter| -> Result<()> {
        for placed in &layout.fields {
            emit_field(out, placed);
        }
        out.blank();
        out.line("// Actions.");
        for element in &b.logs {
            lowering.log_statement(out, &element.template)?;
        }
        for action in &b.actions {
            lowering.action(out, action)?;
        }
        Ok(())
    })?;
    out.blank();
    Ok(())
}

/// Decode one field into `let` bindings, null when a word it touches is invalid.
fn emit_field(out: &mut Emitter, placed: &PlacedField) {
    let decl = placed.decl;
    let ft = &decl.field_type;
    out.line(format!(
        "// Field {}: {} at +{}, width {}.",
        decl.name,
        ft,
        placed.pos,
        ft.width()
    ));
    if !decl.is_output() {
        return;
    }
    let extents = placed.element_extents();
    let per_element = matches!(ft, FieldType::Byte(_));
    for (i, extent) in extents.iter().enumerate() {
        let name = if per_element { format!("{}__{}", decl.name, i) } else { decl.name.clone() };
        let ok: Vec<String> = extent.words().map(|w| format!("ok[{}]", w)).collect();
        out.line(format!("let {} = ({}) ?", name, ok.join(" && ")));
        out.indented(|out| {
            let bits = extraction(extent);
            match ft {
                FieldType::Bool => out.line(format!("{} == 1", bits)),
                _ => out.line(bits),
            }
            out.line(": null;");
        });
    }
    if per_element {
        let elements: Vec<String> = (0..extents.len()).map(|i| format!("{}__{}", decl.name, i)).collect();
        out.line(format!("const {} = [{}];", decl.name, elements.join(", ")));
    }
}

/// Each contributing word, masked and realigned, combined so the value stays exact: `|` up
/// to [`BITWISE_BITS`], sums of power-of-two multiples up to [`EXACT_BITS`], `bigint` beyond.
fn extraction(extent: &FieldExtent) -> String {
    let width = extent.width();
    let terms: Vec<String> = extent
        .words()
        .map(|w| {
            let masked = match extent.masks[w] {
                0xFFFF => format!("block[{}]", w),
                m => format!("block[{}] & {:#b}", w, m),
            };
            let shift = extent.shifts[w];
            if width > EXACT_BITS {
                match shift {
                    s if s < 0 => format!("(BigInt({}) << {}n)", masked, -s),
                    s if s > 0 => format!("BigInt(({}) >> {})", masked, s),
                    _ => format!("BigInt({})", masked),
                }
            } else if width > BITWISE_BITS {
                match shift {
                    s if s < 0 => format!("({}) * {}", masked, 1u64 << s.unsigned_abs()),
                    s if s > 0 => format!("(({}) >> {})", masked, s),
                    _ => format!("({})", masked),
                }
            } else {
                match shift {
                    s if s < 0 => format!("(({}) << {})", masked, -s),
                    s if s > 0 => format!("(({}) >> {})", masked, s),
                    _ => format!("(({}))", masked),
                }
            }
        })
        .collect();
    let join = if width > BITWISE_BITS && width <= EXACT_BITS { " + " } else { " | " };
    terms.join(join)
}

fn emit_trailer(out: &mut Emitter, dispatch: &[&str], options: &CompileOptions) {
    out.block("export function get_parse_function(rule: string) {", |out| {
        out.block("switch (rule) {", |out| {
            for rule in dispatch {
                out.line(format!("case \"{}\": return parse_{};", rule, rule));
            }
        });
        out.line("throw new RangeError(\"Invalid rule: \" + rule);");
    });
    out.blank();
    out.block("function formatAf(af: number): string {", |out| {
        out.line(format!("const freq = {}(af);", options.frequency_lookup));
        out.line("return freq > 0 ? (freq/10).toString() : \"None\";");
    });
    out.blank();
    out.block("function formatRdsText(text: Array<number | null>): string {", |out| {
        out.line(format!(
            "return text.map((c) => c == null ? \".\" : {}[c]).join(\"\");",
            options.charmap
        ));
    });
    out.blank();
    out.block("function formatBytes(bytes: Array<number | null>): string {", |out| {
        out.line(
            "return bytes.map((b) => b == null ? \"..\" : b.toString(16).toUpperCase().padStart(2, \"0\")).join(\" \");",
        );
    });
}
