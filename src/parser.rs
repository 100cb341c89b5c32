//! Parse DSL source into the specification model using PEST.

use crate::ast::*;
use crate::error::{CompileError, Result};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SpecParser;

/// Parse (already preprocessed) specification source.
pub fn parse(source: &str) -> Result<Specification> {
    let pairs = SpecParser::parse(Rule::specification, source)
        .map_err(|e| CompileError::Syntax(e.to_string()))?;
    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| CompileError::Syntax("empty parse".to_string()))?;
    build_specification(pair)
}

fn missing(what: &str) -> CompileError {
    CompileError::Structural(format!("missing {}", what))
}

fn unexpected(rule: Rule, context: &str) -> CompileError {
    CompileError::Structural(format!("unexpected {:?} in {}", rule, context))
}

fn next_pair<'i>(
    it: &mut impl Iterator<Item = Pair<'i, Rule>>,
    what: &str,
) -> Result<Pair<'i, Rule>> {
    it.next().ok_or_else(|| missing(what))
}

/// Children of a statement with its keyword token dropped.
fn operands<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
    pair.into_inner().filter(|p| {
        !matches!(
            p.as_rule(),
            Rule::kw_copy | Rule::kw_put | Rule::kw_parse | Rule::kw_switch
        )
    })
}

fn parse_number<T: std::str::FromStr>(pair: &Pair<Rule>) -> Result<T> {
    pair.as_str()
        .parse()
        .map_err(|_| CompileError::Syntax(format!("integer out of range: {}", pair.as_str())))
}

fn build_specification(pair: Pair<Rule>) -> Result<Specification> {
    let mut declarations = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::import_decl => declarations.push(Declaration::Import(build_import(inner)?)),
            Rule::struct_decl => declarations.push(Declaration::Struct(build_struct(inner)?)),
            Rule::bitstruct_decl => {
                declarations.push(Declaration::Bitstruct(build_bitstruct(inner)?))
            }
            Rule::EOI => {}
            other => return Err(unexpected(other, "specification")),
        }
    }
    Ok(Specification { declarations })
}

fn build_import(pair: Pair<Rule>) -> Result<Import> {
    let mut it = pair.into_inner();
    let module = next_pair(&mut it, "import module")?.as_str().to_string();
    let symbol = next_pair(&mut it, "import symbol")?.as_str().to_string();
    Ok(Import { module, symbol })
}

// ==================== struct ====================

fn build_struct(pair: Pair<Rule>) -> Result<Struct> {
    let mut name = String::new();
    let mut fields = Vec::new();
    let mut methods = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::var_decl => fields.push(build_var_decl(inner)?),
            Rule::method_decl => methods.push(build_method(inner)?),
            other => return Err(unexpected(other, "struct")),
        }
    }
    Ok(Struct { name, fields, methods })
}

fn build_var_decl(pair: Pair<Rule>) -> Result<Field> {
    let mut it = pair.into_inner();
    let name = next_pair(&mut it, "field name")?.as_str().to_string();
    let var_type = build_var_type(next_pair(&mut it, "field type")?)?;
    Ok(Field { name, var_type })
}

fn build_method(pair: Pair<Rule>) -> Result<Method> {
    let mut it = pair.into_inner();
    let name = next_pair(&mut it, "method name")?.as_str().to_string();
    let params = it.map(build_var_decl).collect::<Result<Vec<_>>>()?;
    Ok(Method { name, params })
}

fn build_var_type(pair: Pair<Rule>) -> Result<VarType> {
    match pair.as_rule() {
        Rule::simple_var_type => {
            let mut it = pair.into_inner();
            let name = next_pair(&mut it, "type name")?.as_str().to_string();
            let width = it.next().map(|p| parse_number(&p)).transpose()?;
            Ok(VarType::Simple { name, width })
        }
        Rule::map_type => {
            let mut it = pair.into_inner();
            let key = build_var_type(next_pair(&mut it, "map key type")?)?;
            let value = build_var_type(next_pair(&mut it, "map value type")?)?;
            Ok(VarType::Map(Box::new(key), Box::new(value)))
        }
        other => Err(unexpected(other, "type")),
    }
}

// ==================== bitstruct ====================

fn build_bitstruct(pair: Pair<Rule>) -> Result<Bitstruct> {
    let mut name = String::new();
    let mut arguments = Vec::new();
    let mut decls = Vec::new();
    let mut actions = Vec::new();
    let mut logs = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::arg_list => {
                for arg in inner.into_inner() {
                    let mut it = arg.into_inner();
                    let arg_name = next_pair(&mut it, "argument name")?.as_str().to_string();
                    let var_type = build_var_type(next_pair(&mut it, "argument type")?)?;
                    arguments.push(Argument { name: arg_name, var_type });
                }
            }
            Rule::field_decl => decls.push(build_decl(inner)?),
            Rule::action_section => {
                for a in inner.into_inner() {
                    actions.push(build_action(a)?);
                }
            }
            Rule::log_section => {
                for l in inner.into_inner() {
                    if let Some(element) = build_log_element(l)? {
                        logs.push(element);
                    }
                }
            }
            other => return Err(unexpected(other, "bitstruct")),
        }
    }
    Ok(Bitstruct { name, arguments, decls, actions, logs })
}

fn build_decl(pair: Pair<Rule>) -> Result<Decl> {
    let mut it = pair.into_inner();
    let name = next_pair(&mut it, "field name")?.as_str().to_string();
    let field_type = build_field_type(next_pair(&mut it, "field type")?)?;
    Ok(Decl { name, field_type })
}

/// Map a `name<width>` field type onto the closed set of record field types.
fn build_field_type(pair: Pair<Rule>) -> Result<FieldType> {
    let raw: String = pair.as_str().split_whitespace().collect();
    let mut it = pair.into_inner();
    let name = next_pair(&mut it, "type name")?.as_str();
    let width: Option<u32> = it.next().map(|p| parse_number(&p)).transpose()?;
    Ok(match (name, width) {
        ("uint", Some(w)) => FieldType::Uint(w),
        ("unparsed", Some(w)) => FieldType::Unparsed(w),
        ("byte", Some(n)) => FieldType::Byte(n),
        ("bool", None) => FieldType::Bool,
        _ => FieldType::Unknown(raw),
    })
}

fn build_log_element(pair: Pair<Rule>) -> Result<Option<LogElement>> {
    let mut children: Vec<_> = pair.into_inner().collect();
    if children.len() > 1 {
        return Err(CompileError::Structural(format!(
            "log element carries {} strings",
            children.len()
        )));
    }
    Ok(children.pop().map(|s| LogElement { template: unescape(s.as_str()) }))
}

// ==================== actions ====================

fn build_action(pair: Pair<Rule>) -> Result<Action> {
    let mut children: Vec<_> = pair.into_inner().collect();
    let stmt = match children.len() {
        0 => return Ok(Action::Noop),
        1 => children.remove(0),
        n => {
            return Err(CompileError::Structural(format!(
                "action carries {} statements",
                n
            )))
        }
    };
    match stmt.as_rule() {
        Rule::assignment => {
            let mut it = stmt.into_inner();
            let target = build_lvalue(next_pair(&mut it, "assignment target")?)?;
            let value = build_expr(next_pair(&mut it, "assigned value")?)?;
            Ok(Action::Assign { target, value })
        }
        Rule::copy_stmt => {
            let mut it = operands(stmt);
            let target = build_lvalue(next_pair(&mut it, "copy target")?)?;
            let address = build_expr(next_pair(&mut it, "copy address")?)?;
            let segment = build_expr(next_pair(&mut it, "copy segment size")?)?;
            let value = build_expr(next_pair(&mut it, "copy value")?)?;
            Ok(Action::Copy { target, address, segment, value })
        }
        Rule::put_stmt => {
            let mut it = operands(stmt);
            let target = build_lvalue(next_pair(&mut it, "put target")?)?;
            let key = build_expr(next_pair(&mut it, "put key")?)?;
            let value = build_expr(next_pair(&mut it, "put value")?)?;
            Ok(Action::Put { target, key, value })
        }
        Rule::parse_stmt => {
            let mut it = operands(stmt);
            let label = next_pair(&mut it, "parse label")?.as_str().to_string();
            let rule = build_expr(next_pair(&mut it, "parse rule")?)?;
            Ok(Action::Parse { label, rule })
        }
        Rule::invocation => {
            let mut it = stmt.into_inner();
            let callee = build_lvalue(next_pair(&mut it, "invocation target")?)?;
            let args = it.map(build_expr).collect::<Result<Vec<_>>>()?;
            match callee {
                Lvalue::Field(object, method) => Ok(Action::Invoke { object: *object, method, args }),
                _ => Err(CompileError::Syntax(
                    "invocation needs the form `object.method(...)`".to_string(),
                )),
            }
        }
        Rule::switch_stmt => {
            let mut it = operands(stmt);
            let on = build_expr(next_pair(&mut it, "switch discriminant")?)?;
            let cases = it.map(build_case).collect::<Result<Vec<_>>>()?;
            Ok(Action::Switch { on, cases })
        }
        other => Err(unexpected(other, "action")),
    }
}

fn build_case(pair: Pair<Rule>) -> Result<Case> {
    let mut labels = Vec::new();
    let mut actions = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::int => labels.push(parse_number(&inner)?),
            Rule::action => actions.push(build_action(inner)?),
            other => return Err(unexpected(other, "case")),
        }
    }
    Ok(Case { labels, actions })
}

// ==================== expressions ====================

fn build_expr(pair: Pair<Rule>) -> Result<Expr> {
    let mut terms = Vec::new();
    let mut ops = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::bin_op => ops.push(match inner.as_str() {
                "*" => BinOp::Mul,
                _ => BinOp::Add,
            }),
            _ => terms.push(build_term(inner)?),
        }
    }
    fold_binary(terms, ops)
}

/// Left-associative folding with `*` binding tighter than `+`.
fn fold_binary(terms: Vec<Expr>, ops: Vec<BinOp>) -> Result<Expr> {
    let mut terms = terms.into_iter();
    let first = terms.next().ok_or_else(|| missing("expression"))?;
    let mut summands = vec![first];
    for (op, rhs) in ops.into_iter().zip(terms) {
        match op {
            BinOp::Mul => {
                let lhs = summands.pop().ok_or_else(|| missing("left operand"))?;
                summands.push(Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) });
            }
            BinOp::Add => summands.push(rhs),
        }
    }
    let mut summands = summands.into_iter();
    let mut acc = summands.next().ok_or_else(|| missing("expression"))?;
    for rhs in summands {
        acc = Expr::Binary { op: BinOp::Add, lhs: Box::new(acc), rhs: Box::new(rhs) };
    }
    Ok(acc)
}

fn build_term(pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::int => Ok(Expr::Int(parse_number(&pair)?)),
        Rule::string => Ok(Expr::Str(unescape(pair.as_str()))),
        Rule::lvalue => Ok(Expr::Lvalue(build_lvalue(pair)?)),
        Rule::function_call => {
            let mut it = pair.into_inner();
            let function = next_pair(&mut it, "function name")?.as_str().to_string();
            let args = it.map(build_expr).collect::<Result<Vec<_>>>()?;
            Ok(Expr::Call { function, args })
        }
        other => Err(unexpected(other, "expression")),
    }
}

fn build_lvalue(pair: Pair<Rule>) -> Result<Lvalue> {
    let mut it = pair.into_inner();
    let mut acc = Lvalue::Ident(next_pair(&mut it, "identifier")?.as_str().to_string());
    for postfix in it {
        acc = match postfix.as_rule() {
            Rule::field_access => {
                let mut inner = postfix.into_inner();
                let field = next_pair(&mut inner, "field name")?.as_str().to_string();
                Lvalue::Field(Box::new(acc), field)
            }
            Rule::index_access => {
                let mut inner = postfix.into_inner();
                let index = build_expr(next_pair(&mut inner, "index expression")?)?;
                Lvalue::Index(Box::new(acc), Box::new(index))
            }
            other => return Err(unexpected(other, "lvalue")),
        };
    }
    Ok(acc)
}

/// Strip the quotes of a string token and resolve backslash escapes.
fn unescape(s: &str) -> String {
    let inner = s
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
