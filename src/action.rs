//! Action statements: assignment, byte copy, map put, rule dispatch, method invocation
//! and switch.

use crate::ast::{Action, Case, Expr, Lvalue};
use crate::emit::Emitter;
use crate::error::{CompileError, Result};
use crate::expr::Lowering;
use crate::guard::{emit_guarded, emit_tested, GuardSet};
use crate::types::Ty;

impl Lowering<'_> {
    pub fn action(&mut self, out: &mut Emitter, action: &Action) -> Result<()> {
        match action {
            Action::Noop => Ok(()),
            Action::Assign { target, value } => self.assign(out, target, value),
            Action::Copy { target, address, segment, value } => {
                self.copy(out, target, address, segment, value)
            }
            Action::Put { target, key, value } => self.put(out, target, key, value),
            Action::Parse { label, rule } => self.dispatch(out, label, rule),
            Action::Invoke { object, method, args } => self.invoke(out, object, method, args),
            Action::Switch { on, cases } => self.switch(out, on, cases),
        }
    }

    fn assign(&mut self, out: &mut Emitter, target: &Lvalue, value: &Expr) -> Result<()> {
        let value = self.expr(value)?;
        let target = self.lvalue(target)?;
        if !target.ty.accepts(&value.ty) {
            return Err(CompileError::Type(format!(
                "cannot assign `{}` ({}) to `{}` ({})",
                value.code,
                value.ty.ts(self.options),
                target.code,
                target.ty.ts(self.options)
            )));
        }
        let guards = self.settle(value.guards.union(target.guards));
        emit_guarded(out, &guards, |out| {
            out.line(format!("{} = {};", target.code, value.code));
            Ok(())
        })
    }

    /// `copy target, address, size, value`: `size` bytes of a decoded `byte<N>` field
    /// into a text target at `address * size`.
    fn copy(
        &mut self,
        out: &mut Emitter,
        target: &Lvalue,
        address: &Expr,
        segment: &Expr,
        value: &Expr,
    ) -> Result<()> {
        let size = match segment {
            Expr::Int(n) => *n,
            other => {
                return Err(CompileError::Type(format!(
                    "copy segment size must be an integer literal, got {:?}",
                    other
                )))
            }
        };
        let source = match value {
            Expr::Lvalue(Lvalue::Ident(name)) => name,
            other => {
                return Err(CompileError::Type(format!(
                    "copy source must name a decoded byte field, got {:?}",
                    other
                )))
            }
        };
        match self.scope.get(source)? {
            Ty::Bytes(n) if u64::from(*n) >= size => {}
            Ty::Bytes(n) => {
                return Err(CompileError::Type(format!(
                    "copy of {} bytes from `{}`, which has only {}",
                    size, source, n
                )))
            }
            other => {
                return Err(CompileError::Type(format!(
                    "copy source `{}` has type `{}`, not a byte field",
                    source,
                    other.ts(self.options)
                )))
            }
        }
        let target = self.lvalue(target)?;
        if !matches!(target.ty, Ty::Text) && !target.ty.unchecked() {
            return Err(CompileError::Type(format!(
                "copy target `{}` has type `{}`, not text",
                target.code,
                target.ty.ts(self.options)
            )));
        }
        let addr = self.expr(address)?;
        if !matches!(addr.ty, Ty::Number) && !addr.ty.unchecked() {
            return Err(CompileError::Type(format!(
                "copy address `{}` has type `{}`, not a number",
                addr.code,
                addr.ty.ts(self.options)
            )));
        }
        let addr_guards = self.settle(addr.guards);
        let outer = self.settle(target.guards).union(addr_guards.elements_only());
        emit_guarded(out, &outer, |out: &mut Emitter| {
            for i in 0..size {
                let byte = GuardSet::value(format!("{}__{}", source, i));
                emit_tested(out, &addr_guards.clone().union(byte), |out| {
                    out.line(format!(
                        "{}.setByte({}*{} + {}, {}__{});",
                        target.code, addr.code, size, i, source, i
                    ));
                });
            }
        });
        Ok(())
    }

    fn put(&mut self, out: &mut Emitter, target: &Lvalue, key: &Expr, value: &Expr) -> Result<()> {
        let target = self.lvalue(target)?;
        if !matches!(target.ty, Ty::Map(..)) && !target.ty.unchecked() {
            return Err(CompileError::Type(format!(
                "put target `{}` has type `{}`, not a map",
                target.code,
                target.ty.ts(self.options)
            )));
        }
        let key = self.expr(key)?;
        let value = self.expr(value)?;
        if let Ty::Map(_, v) = &target.ty {
            if !v.accepts(&value.ty) {
                return Err(CompileError::Type(format!(
                    "cannot put `{}` ({}) into `{}`",
                    value.code,
                    value.ty.ts(self.options),
                    target.code
                )));
            }
        }
        let guards = self.settle(target.guards.union(key.guards).union(value.guards));
        emit_guarded(out, &guards, |out| {
            out.line(format!("{}.set({}, {});", target.code, key.code, value.code));
            Ok(())
        })
    }

    /// `parse label rule`: call another bitstruct's function through the dispatch table.
    fn dispatch(&mut self, out: &mut Emitter, label: &str, rule: &Expr) -> Result<()> {
        if let Expr::Str(name) = rule {
            if !self.rules.contains(name) {
                log::warn!(
                    "`parse {}` in `{}` names rule `{}`, which no bitstruct declares",
                    label,
                    self.scope.bitstruct,
                    name
                );
            }
        }
        let rule = self.expr(rule)?;
        if !matches!(rule.ty, Ty::Tag) && !rule.ty.unchecked() {
            return Err(CompileError::Type(format!(
                "rule name `{}` has type `{}`, not a tag",
                rule.code,
                rule.ty.ts(self.options)
            )));
        }
        let forwarded: String = self
            .scope
            .arguments()
            .iter()
            .map(|(name, _)| format!(", {}", name))
            .collect();
        let guards = self.settle(rule.guards);
        emit_guarded(out, &guards, |out| {
            out.line(format!(
                "get_parse_function({})(block, ok, log{});",
                rule.code, forwarded
            ));
            Ok(())
        })
    }

    fn invoke(&mut self, out: &mut Emitter, object: &Lvalue, method: &str, args: &[Expr]) -> Result<()> {
        let mut lowered = Vec::with_capacity(args.len());
        let mut guards = GuardSet::new();
        for arg in args {
            let arg = self.expr(arg)?;
            guards = guards.union(arg.guards.clone());
            lowered.push(arg);
        }
        let object = self.lvalue(object)?;
        match &object.ty {
            Ty::Record(record) => {
                let declared = self.env.method(record, method)?;
                if declared.params.len() != args.len() {
                    return Err(CompileError::Type(format!(
                        "`{}.{}` takes {} arguments, got {}",
                        record,
                        method,
                        declared.params.len(),
                        args.len()
                    )));
                }
                for (param, arg) in declared.params.iter().zip(&lowered) {
                    let expected = self.env.resolve(&param.var_type)?;
                    if !expected.accepts(&arg.ty) {
                        return Err(CompileError::Type(format!(
                            "argument `{}` of `{}.{}` expects `{}`, got `{}`",
                            param.name,
                            record,
                            method,
                            expected.ts(self.options),
                            arg.ty.ts(self.options)
                        )));
                    }
                }
            }
            ty if ty.unchecked() => {}
            other => {
                return Err(CompileError::Type(format!(
                    "cannot call `{}` on `{}` of type `{}`",
                    method,
                    object.code,
                    other.ts(self.options)
                )))
            }
        }
        let guards = self.settle(guards.union(object.guards));
        let args: Vec<&str> = lowered.iter().map(|a| a.code.as_str()).collect();
        emit_guarded(out, &guards, |out| {
            out.line(format!("{}.{}({});", object.code, method, args.join(", ")));
            Ok(())
        })
    }

    /// Every case ends in `break;`, so no case falls into the next.
    fn switch(&mut self, out: &mut Emitter, on: &Expr, cases: &[Case]) -> Result<()> {
        let on = self.expr(on)?;
        if !matches!(on.ty, Ty::Number) && !on.ty.unchecked() {
            return Err(CompileError::Type(format!(
                "switch on `{}` of type `{}`",
                on.code,
                on.ty.ts(self.options)
            )));
        }
        let guards = self.settle(on.guards);
        emit_guarded(out, &guards, |out: &mut Emitter| -> Result<()> {
            out.block(format!("switch ({}) {{", on.code), |out: &mut Emitter| -> Result<()> {
                for case in cases {
                    for label in &case.labels {
                        out.line(format!("case {}:", label));
                    }
                    out.indented(|out: &mut Emitter| -> Result<()> {
                        for action in &case.actions {
                            self.action(out, action)?;
                        }
                        out.line("break;");
                        out.blank();
                        Ok(())
                    })?;
                }
                Ok(())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, NameContext};
    use crate::parser::parse;
    use crate::types::{Scope, TypeEnv};
    use std::collections::BTreeSet;

    const STATION: &str = r#"
        struct Station {
            pi: uint<16>
            tp: bool
            ps: str<8>
            odas: map<uint<16>, tag>
            others: map<uint<16>, Station>
            addAfPair(a: uint<8>, b: uint<8>)
        }
    "#;

    fn compile_actions(body: &str) -> Result<String> {
        let source = format!("{}\n{}", STATION, body);
        let spec = parse(&source)?;
        let env = TypeEnv::new(&spec)?;
        let b = spec.bitstructs().last().expect("bitstruct");
        let scope = Scope::new(&env, b)?;
        let options = CompileOptions::default();
        let rules: BTreeSet<String> = spec.bitstructs().map(|b| b.name.clone()).collect();
        let mut names = NameContext::default();
        let mut lowering =
            Lowering { env: &env, scope: &scope, names: &mut names, options: &options, rules: &rules };
        let mut out = Emitter::new();
        for a in &b.actions {
            lowering.action(&mut out, a)?;
        }
        Ok(out.finish())
    }

    #[test]
    fn assignment_drops_argument_guard() {
        let out = compile_actions(
            "bitstruct g(station: Station) { pi: uint<16> _: unparsed<48> } action { station.pi = pi }",
        )
        .unwrap();
        assert_eq!(out, "if ((pi != null)) {\n\tstation.pi = pi;\n}\n");
    }

    #[test]
    fn copy_guards_each_byte() {
        let out = compile_actions(
            "bitstruct g(station: Station) { addr: uint<2> _: unparsed<46> seg: byte<2> } \
             action { copy station.ps, addr, 2, seg }",
        )
        .unwrap();
        let expected = "\
if ((addr != null) && (seg__0 != null)) {
\tstation.ps.setByte(addr*2 + 0, seg__0);
}
if ((addr != null) && (seg__1 != null)) {
\tstation.ps.setByte(addr*2 + 1, seg__1);
}
";
        assert_eq!(out, expected);
    }

    #[test]
    fn copy_address_lowered_once() {
        let out = compile_actions(
            "bitstruct g(station: Station) { k: uint<16> _: unparsed<32> seg: byte<2> } \
             action { copy station.ps, station.others[k].pi, 2, seg }",
        )
        .unwrap();
        assert_eq!(out.matches("let elt").count(), 1, "{}", out);
        assert!(!out.contains("elt1"), "{}", out);
        assert!(out.contains(
            "if ((elt0 != undefined)) {\n\tif ((elt0 != undefined) && (seg__0 != null)) {\n\t\t\
             station.ps.setByte(elt0.pi*2 + 0, seg__0);"
        ));
        assert!(out.contains(
            "\tif ((elt0 != undefined) && (seg__1 != null)) {\n\t\tstation.ps.setByte(elt0.pi*2 + 1, seg__1);"
        ));
    }

    #[test]
    fn copy_checks() {
        let too_many = compile_actions(
            "bitstruct g(station: Station) { addr: uint<2> _: unparsed<46> seg: byte<2> } \
             action { copy station.ps, addr, 3, seg }",
        );
        assert!(matches!(too_many, Err(CompileError::Type(_))));
        let not_literal = compile_actions(
            "bitstruct g(station: Station) { addr: uint<2> _: unparsed<46> seg: byte<2> } \
             action { copy station.ps, addr, addr, seg }",
        );
        assert!(matches!(not_literal, Err(CompileError::Type(_))));
        let not_bytes = compile_actions(
            "bitstruct g(station: Station) { addr: uint<2> _: unparsed<46> seg: uint<16> } \
             action { copy station.ps, addr, 2, seg }",
        );
        assert!(matches!(not_bytes, Err(CompileError::Type(_))));
        let wide_address = compile_actions(
            "bitstruct g(station: Station) { addr: uint<54> seg: byte<1> _: unparsed<2> } \
             action { copy station.ps, addr, 1, seg }",
        );
        assert!(matches!(wide_address, Err(CompileError::Type(_))));
    }

    #[test]
    fn put_and_dispatch() {
        let out = compile_actions(
            r#"bitstruct g(station: Station) { aid: uint<16> t: uint<5> _: unparsed<43> }
               action {
                 put station.odas aid "group_x"
                 parse group lookup(station.odas, t, "g")
               }"#,
        )
        .unwrap();
        let expected = "\
if ((aid != null)) {
\tstation.odas.set(aid, \"group_x\");
}
if ((t != null)) {
\tget_parse_function(station.odas.get(t) ?? \"g\")(block, ok, log, station);
}
";
        assert_eq!(out, expected);
    }

    #[test]
    fn put_needs_map() {
        let err = compile_actions(
            "bitstruct g(station: Station) { aid: uint<16> _: unparsed<48> } action { put station.pi aid 1 }",
        );
        assert!(matches!(err, Err(CompileError::Type(_))));
    }

    #[test]
    fn invocation_on_element() {
        let out = compile_actions(
            "bitstruct g(station: Station) { pi_on: uint<16> af1: uint<8> af2: uint<8> _: unparsed<32> } \
             action { station.others[pi_on].addAfPair(af1, af2) }",
        )
        .unwrap();
        assert!(out.starts_with("let elt0: Station | undefined;\nif ((pi_on != null)) {\n"));
        assert!(out.contains("\t\telt0 = new StationImpl();\n"));
        assert!(out.ends_with(
            "if ((af1 != null) && (af2 != null) && (elt0 != undefined)) {\n\telt0.addAfPair(af1, af2);\n}\n"
        ));
    }

    #[test]
    fn invocation_arity_checked() {
        let err = compile_actions(
            "bitstruct g(station: Station) { af1: uint<8> _: unparsed<56> } action { station.addAfPair(af1) }",
        );
        assert!(matches!(err, Err(CompileError::Type(_))));
    }

    #[test]
    fn switch_cases_never_fall_through() {
        let out = compile_actions(
            "bitstruct g(station: Station) { addr: uint<2> di: bool _: unparsed<61> } \
             action { switch addr { case 0, 1 { station.tp = di } case 2 { ; } } }",
        )
        .unwrap();
        let expected = "\
if ((addr != null)) {
\tswitch (addr) {
\t\tcase 0:
\t\tcase 1:
\t\t\tif ((di != null)) {
\t\t\t\tstation.tp = di;
\t\t\t}
\t\t\tbreak;

\t\tcase 2:
\t\t\tbreak;

\t}
}
";
        assert_eq!(out, expected);
    }

    #[test]
    fn assignment_type_mismatch() {
        let err = compile_actions(
            "bitstruct g(station: Station) { pi: uint<16> _: unparsed<48> } action { station.tp = pi }",
        );
        assert!(matches!(err, Err(CompileError::Type(_))));
    }
}
