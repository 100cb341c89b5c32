//! Lowering of lvalues and expressions into target expressions with their guards.

use crate::ast::{Expr, Lvalue};
use crate::compiler::{CompileOptions, NameContext};
use crate::error::{CompileError, Result};
use crate::guard::{ElementGuard, GuardSet};
use crate::types::{Scope, Ty, TypeEnv};
use std::collections::BTreeSet;

/// A lowered expression: target code, what must be present to evaluate it, and its type.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub code: String,
    pub guards: GuardSet,
    pub ty: Ty,
}

impl Lowered {
    fn literal(code: String, ty: Ty) -> Self {
        Lowered { code, guards: GuardSet::new(), ty }
    }
}

/// Everything needed to lower the body of one bitstruct.
pub struct Lowering<'a> {
    pub env: &'a TypeEnv<'a>,
    pub scope: &'a Scope,
    pub names: &'a mut NameContext,
    pub options: &'a CompileOptions,
    /// Names of every bitstruct, for dispatch diagnostics.
    pub rules: &'a BTreeSet<String>,
}

impl Lowering<'_> {
    pub fn lvalue(&mut self, lvalue: &Lvalue) -> Result<Lowered> {
        match lvalue {
            Lvalue::Ident(name) => Ok(Lowered {
                code: name.clone(),
                guards: GuardSet::value(name.as_str()),
                ty: self.scope.get(name)?.clone(),
            }),
            Lvalue::Field(object, field) => {
                let object = self.lvalue(object)?;
                let ty = match &object.ty {
                    Ty::Record(record) => self.env.field_type(record, field)?,
                    ty if ty.unchecked() => Ty::Dynamic,
                    ty => {
                        return Err(CompileError::Type(format!(
                            "`{}` has type `{}`, which has no field `{}`",
                            object.code,
                            ty.ts(self.options),
                            field
                        )))
                    }
                };
                Ok(Lowered { code: format!("{}.{}", object.code, field), guards: object.guards, ty })
            }
            Lvalue::Index(object, key) => {
                let object = self.lvalue(object)?;
                let key = self.expr(key)?;
                let record = match &object.ty {
                    Ty::Map(_, value) => match value.as_ref() {
                        Ty::Record(record) => record.clone(),
                        other => {
                            return Err(CompileError::Type(format!(
                                "elements of `{}` have type `{}`, which cannot be default-constructed",
                                object.code,
                                other.ts(self.options)
                            )))
                        }
                    },
                    other => {
                        return Err(CompileError::Type(format!(
                            "`{}` has type `{}`, which cannot be indexed",
                            object.code,
                            other.ts(self.options)
                        )))
                    }
                };
                let (id, var) = self.names.element();
                let element = ElementGuard {
                    id,
                    var: var.clone(),
                    map: object.code,
                    key: key.code,
                    constructor: format!("{}{}", record, self.options.impl_suffix),
                    ty: record.clone(),
                    requires: object.guards.clone().union(key.guards),
                };
                Ok(Lowered {
                    code: var,
                    guards: object.guards.union(GuardSet::element(element)),
                    ty: Ty::Record(record),
                })
            }
        }
    }

    pub fn expr(&mut self, expr: &Expr) -> Result<Lowered> {
        match expr {
            Expr::Int(v) => Ok(Lowered::literal(v.to_string(), Ty::Number)),
            Expr::Str(s) => Ok(Lowered::literal(quote(s), Ty::Tag)),
            Expr::Lvalue(lv) => self.lvalue(lv),
            Expr::Call { function, args } => match (function.as_str(), args.as_slice()) {
                ("lookup", [map, key, default]) => self.lookup(map, key, default),
                ("lookup", _) => Err(CompileError::Unsupported(format!(
                    "`lookup` takes 3 arguments, got {}",
                    args.len()
                ))),
                (other, _) => Err(CompileError::Unsupported(format!("function `{}`", other))),
            },
            Expr::Binary { op, .. } => Err(CompileError::Unsupported(format!(
                "binary operator `{}` has no defined lowering",
                op
            ))),
        }
    }

    /// `lookup(m, k, d)`: map get with fallback.
    fn lookup(&mut self, map: &Expr, key: &Expr, default: &Expr) -> Result<Lowered> {
        let map = self.expr(map)?;
        let value_ty = match &map.ty {
            Ty::Map(_, v) => v.as_ref().clone(),
            ty if ty.unchecked() => Ty::Dynamic,
            other => {
                return Err(CompileError::Type(format!(
                    "`lookup` needs a map, `{}` has type `{}`",
                    map.code,
                    other.ts(self.options)
                )))
            }
        };
        let key = self.expr(key)?;
        let default = self.expr(default)?;
        Ok(Lowered {
            code: format!("{}.get({}) ?? {}", map.code, key.code, default.code),
            guards: map.guards.union(key.guards).union(default.guards),
            ty: value_ty,
        })
    }

    /// Drop obligations on the bitstruct's arguments, which are always present.
    pub fn settle(&self, guards: GuardSet) -> GuardSet {
        guards.without(|name| self.scope.is_argument(name))
    }
}

/// Render a string as a double-quoted target literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
