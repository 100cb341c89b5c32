//! Type table, declared-struct environment and per-bitstruct name scopes.

use crate::ast::{Bitstruct, FieldType, Method, Specification, Struct, VarType};
use crate::compiler::CompileOptions;
use crate::error::{CompileError, Result};
use crate::layout::EXACT_BITS;
use std::collections::{BTreeMap, BTreeSet};

/// Resolved type of a name or expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Number,
    /// `uint<N>` wider than a `number` holds exactly.
    Wide,
    Bool,
    /// `str<N>`: the runtime's string-like type.
    Text,
    /// `tag`: a plain string.
    Tag,
    /// A decoded `byte<N>` field.
    Bytes(u32),
    Map(Box<Ty>, Box<Ty>),
    /// A declared `struct`.
    Record(String),
    /// A user type the specification does not declare (usually imported).
    Opaque(String),
    /// A value reached through an opaque object; nothing is known about it.
    Dynamic,
}

impl Ty {
    /// Target-language spelling.
    pub fn ts(&self, options: &CompileOptions) -> String {
        match self {
            Ty::Number => "number".to_string(),
            Ty::Wide => "bigint".to_string(),
            Ty::Bool => "boolean".to_string(),
            Ty::Text => options.string_type.clone(),
            Ty::Tag => "string".to_string(),
            Ty::Bytes(_) => "Array<number | null>".to_string(),
            Ty::Map(k, v) => format!("Map<{}, {}>", k.ts(options), v.ts(options)),
            Ty::Record(name) | Ty::Opaque(name) => name.clone(),
            Ty::Dynamic => "any".to_string(),
        }
    }

    /// Whether a struct field of this type may be absent.
    pub fn optional(&self) -> bool {
        matches!(self, Ty::Number | Ty::Wide | Ty::Bool | Ty::Tag)
    }

    pub fn uint(width: u32) -> Ty {
        if width > EXACT_BITS {
            Ty::Wide
        } else {
            Ty::Number
        }
    }

    /// Host types whose shape is not checked.
    pub fn unchecked(&self) -> bool {
        matches!(self, Ty::Opaque(_) | Ty::Dynamic)
    }

    /// Whether a value of type `value` may be stored in a location of this type.
    pub fn accepts(&self, value: &Ty) -> bool {
        self.unchecked() || value.unchecked() || self == value
    }
}

/// Declared structs of one specification.
#[derive(Debug, Default)]
pub struct TypeEnv<'a> {
    structs: BTreeMap<&'a str, &'a Struct>,
}

impl<'a> TypeEnv<'a> {
    pub fn new(spec: &'a Specification) -> Result<Self> {
        let mut structs = BTreeMap::new();
        for s in spec.structs() {
            if structs.insert(s.name.as_str(), s).is_some() {
                return Err(CompileError::DuplicateName { kind: "struct", name: s.name.clone() });
            }
        }
        Ok(TypeEnv { structs })
    }

    pub fn get_struct(&self, name: &str) -> Option<&'a Struct> {
        self.structs.get(name).copied()
    }

    /// Resolve a declared type through the fixed type table.
    pub fn resolve(&self, var_type: &VarType) -> Result<Ty> {
        match var_type {
            VarType::Map(k, v) => Ok(Ty::Map(Box::new(self.resolve(k)?), Box::new(self.resolve(v)?))),
            VarType::Simple { name, width } => match (name.as_str(), width) {
                ("uint", Some(w)) => Ok(Ty::uint(*w)),
                ("bool", None) => Ok(Ty::Bool),
                ("str", Some(_)) => Ok(Ty::Text),
                ("tag", None) => Ok(Ty::Tag),
                ("uint" | "bool" | "str" | "tag" | "map", _) => {
                    Err(CompileError::Type(format!("malformed type `{}`", var_type)))
                }
                (other, None) if self.structs.contains_key(other) => Ok(Ty::Record(other.to_string())),
                (other, None) => Ok(Ty::Opaque(other.to_string())),
                (_, Some(_)) => Err(CompileError::Type(format!(
                    "type `{}` does not take a width",
                    var_type
                ))),
            },
        }
    }

    /// Type of `record.field`.
    pub fn field_type(&self, record: &str, field: &str) -> Result<Ty> {
        let s = self
            .get_struct(record)
            .ok_or_else(|| CompileError::Type(format!("`{}` is not a declared struct", record)))?;
        let f = s.field(field).ok_or_else(|| {
            CompileError::Type(format!("struct `{}` has no field `{}`", record, field))
        })?;
        self.resolve(&f.var_type)
    }

    pub fn method(&self, record: &str, method: &str) -> Result<&'a Method> {
        self.get_struct(record)
            .and_then(|s| s.method(method))
            .ok_or_else(|| {
                CompileError::Type(format!("struct `{}` has no method `{}`", record, method))
            })
    }

    /// Records used as map values anywhere: their implementations get imported for
    /// get-or-create.
    pub fn constructible_types(&self, spec: &Specification) -> Result<BTreeSet<String>> {
        fn collect(ty: &Ty, out: &mut BTreeSet<String>) {
            if let Ty::Map(k, v) = ty {
                if let Ty::Record(name) = v.as_ref() {
                    out.insert(name.clone());
                }
                collect(k, out);
                collect(v, out);
            }
        }
        let mut out = BTreeSet::new();
        for s in self.structs.values() {
            for f in &s.fields {
                collect(&self.resolve(&f.var_type)?, &mut out);
            }
        }
        for b in spec.bitstructs() {
            for a in &b.arguments {
                collect(&self.resolve(&a.var_type)?, &mut out);
            }
        }
        Ok(out)
    }
}

/// Names visible inside one bitstruct: its arguments and its output fields.
#[derive(Debug, Clone)]
pub struct Scope {
    pub bitstruct: String,
    names: BTreeMap<String, Ty>,
    arguments: Vec<(String, Ty)>,
}

/// Names the generated parse functions bind or call themselves.
const RESERVED: [&str; 7] = [
    "block",
    "ok",
    "log",
    "get_parse_function",
    "formatAf",
    "formatRdsText",
    "formatBytes",
];

/// `elt<N>` and `log<N>` are the compiler's own temporaries.
fn is_synthetic(name: &str) -> bool {
    ["elt", "log"].iter().any(|prefix| {
        name.strip_prefix(prefix)
            .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    })
}

fn claim(taken: &mut BTreeSet<String>, kind: &'static str, name: String) -> Result<()> {
    if RESERVED.contains(&name.as_str()) || is_synthetic(&name) {
        return Err(CompileError::DuplicateName { kind: "reserved", name });
    }
    if !taken.insert(name.clone()) {
        return Err(CompileError::DuplicateName { kind, name });
    }
    Ok(())
}

impl Scope {
    pub fn new(env: &TypeEnv, bitstruct: &Bitstruct) -> Result<Self> {
        let mut names = BTreeMap::new();
        // Every identifier the parse function declares, byte elements included.
        let mut taken = BTreeSet::new();
        let mut arguments = Vec::with_capacity(bitstruct.arguments.len());
        for arg in &bitstruct.arguments {
            let ty = env.resolve(&arg.var_type)?;
            claim(&mut taken, "argument", arg.name.clone())?;
            names.insert(arg.name.clone(), ty.clone());
            arguments.push((arg.name.clone(), ty));
        }
        for decl in bitstruct.decls.iter().filter(|d| d.is_output()) {
            let ty = match decl.field_type {
                FieldType::Bool => Ty::Bool,
                FieldType::Byte(n) => {
                    for i in 0..n {
                        claim(&mut taken, "field", format!("{}__{}", decl.name, i))?;
                    }
                    Ty::Bytes(n)
                }
                FieldType::Uint(w) => Ty::uint(w),
                _ => Ty::Number,
            };
            claim(&mut taken, "field", decl.name.clone())?;
            names.insert(decl.name.clone(), ty);
        }
        Ok(Scope { bitstruct: bitstruct.name.clone(), names, arguments })
    }

    pub fn get(&self, name: &str) -> Result<&Ty> {
        self.names.get(name).ok_or_else(|| CompileError::UnknownName {
            bitstruct: self.bitstruct.clone(),
            name: name.to_string(),
        })
    }

    pub fn arguments(&self) -> &[(String, Ty)] {
        &self.arguments
    }

    pub fn is_argument(&self, name: &str) -> bool {
        self.arguments.iter().any(|(n, _)| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const SPEC: &str = r#"
        struct Station {
            pi: uint<16>
            ps: str<8>
            odas: map<uint<16>, tag>
            others: map<uint<16>, Station>
            app: RtPlusApp
            addAfPair(a: uint<8>, b: uint<8>)
        }
        bitstruct g(station: Station) { pi: uint<16> tp: bool seg: byte<2> _: uint<15> rest: unparsed<16> }
    "#;

    #[test]
    fn fixed_table() {
        let spec = parse(SPEC).unwrap();
        let env = TypeEnv::new(&spec).unwrap();
        let options = CompileOptions::default();
        assert_eq!(env.field_type("Station", "pi").unwrap(), Ty::Number);
        assert_eq!(env.field_type("Station", "ps").unwrap().ts(&options), "RdsString");
        assert_eq!(
            env.field_type("Station", "others").unwrap().ts(&options),
            "Map<number, Station>"
        );
        assert_eq!(env.field_type("Station", "app").unwrap(), Ty::Opaque("RtPlusApp".into()));
        assert!(env.field_type("Station", "pi").unwrap().optional());
        assert!(!env.field_type("Station", "odas").unwrap().optional());
        assert!(env.field_type("Station", "nope").is_err());
        assert!(env.resolve(&VarType::Simple { name: "Station".into(), width: Some(3) }).is_err());
    }

    #[test]
    fn constructible_records() {
        let spec = parse(SPEC).unwrap();
        let env = TypeEnv::new(&spec).unwrap();
        let set = env.constructible_types(&spec).unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["Station".to_string()]);
    }

    #[test]
    fn scope_has_arguments_and_outputs() {
        let spec = parse(SPEC).unwrap();
        let env = TypeEnv::new(&spec).unwrap();
        let scope = Scope::new(&env, spec.get_bitstruct("g").unwrap()).unwrap();
        assert_eq!(scope.get("station").unwrap(), &Ty::Record("Station".into()));
        assert_eq!(scope.get("tp").unwrap(), &Ty::Bool);
        assert_eq!(scope.get("seg").unwrap(), &Ty::Bytes(2));
        assert!(scope.is_argument("station"));
        assert!(!scope.is_argument("pi"));
        assert!(matches!(scope.get("rest"), Err(CompileError::UnknownName { .. })));
        assert!(matches!(scope.get("_"), Err(CompileError::UnknownName { .. })));
    }

    fn scope_error(src: &str) -> CompileError {
        let spec = parse(src).unwrap();
        let env = TypeEnv::new(&spec).unwrap();
        let err = Scope::new(&env, spec.bitstructs().next().unwrap()).unwrap_err();
        err
    }

    #[test]
    fn generated_names_are_reserved() {
        for name in RESERVED {
            let err = scope_error(&format!("bitstruct s {{ {}: uint<16> _: unparsed<48> }}", name));
            assert!(
                matches!(&err, CompileError::DuplicateName { kind: "reserved", name: n } if n == name),
                "{:?}",
                err
            );
            let err = scope_error(&format!("bitstruct s({}: Station) {{ _: unparsed<64> }}", name));
            assert!(matches!(err, CompileError::DuplicateName { kind: "reserved", .. }), "{:?}", err);
        }
        for name in ["elt0", "elt12", "log3"] {
            let err = scope_error(&format!("bitstruct s {{ {}: bool _: unparsed<63> }}", name));
            assert!(matches!(err, CompileError::DuplicateName { kind: "reserved", .. }), "{:?}", err);
        }
    }

    #[test]
    fn names_resembling_generated_ones_are_free() {
        let spec = parse("bitstruct s { elt: bool logx: bool elt_0: bool blocks: bool log0x: bool _: unparsed<59> }")
            .unwrap();
        let env = TypeEnv::new(&spec).unwrap();
        assert!(Scope::new(&env, spec.bitstructs().next().unwrap()).is_ok());
    }

    #[test]
    fn byte_elements_collide_with_fields() {
        let err = scope_error("bitstruct s { seg: byte<2> seg__1: uint<8> _: unparsed<40> }");
        assert!(
            matches!(&err, CompileError::DuplicateName { kind: "field", name } if name == "seg__1"),
            "{:?}",
            err
        );
        let err = scope_error("bitstruct s { seg__0: uint<8> seg: byte<2> _: unparsed<40> }");
        assert!(matches!(err, CompileError::DuplicateName { kind: "field", .. }), "{:?}", err);
    }

    #[test]
    fn wide_fields_are_bigint() {
        let spec = parse("struct Clock { t: uint<64> n: uint<53> } bitstruct s { a: uint<54> b: uint<10> }").unwrap();
        let env = TypeEnv::new(&spec).unwrap();
        assert_eq!(env.field_type("Clock", "t").unwrap(), Ty::Wide);
        assert_eq!(env.field_type("Clock", "n").unwrap(), Ty::Number);
        assert_eq!(Ty::Wide.ts(&CompileOptions::default()), "bigint");
        let scope = Scope::new(&env, spec.get_bitstruct("s").unwrap()).unwrap();
        assert_eq!(scope.get("a").unwrap(), &Ty::Wide);
        assert_eq!(scope.get("b").unwrap(), &Ty::Number);
    }

    #[test]
    fn duplicate_struct() {
        let spec = parse("struct A { } struct A { }").unwrap();
        assert!(matches!(TypeEnv::new(&spec), Err(CompileError::DuplicateName { .. })));
    }
}
