//! Typed model of a bitstruct specification.

use std::fmt;

/// Root of a specification: declarations in source order.
#[derive(Debug, Clone, Default)]
pub struct Specification {
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Import(Import),
    Struct(Struct),
    Bitstruct(Bitstruct),
}

/// `import module Symbol`: re-exports a host symbol into the generated file.
#[derive(Debug, Clone)]
pub struct Import {
    pub module: String,
    pub symbol: String,
}

/// A stateful host object whose shape is declared but not implemented here.
#[derive(Debug, Clone)]
pub struct Struct {
    pub name: String,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub var_type: VarType,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub params: Vec<Field>,
}

impl Struct {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Type of a struct field, method parameter or bitstruct argument.
#[derive(Debug, Clone, PartialEq)]
pub enum VarType {
    Simple { name: String, width: Option<u32> },
    Map(Box<VarType>, Box<VarType>),
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Simple { name, width: Some(w) } => write!(f, "{}<{}>", name, w),
            VarType::Simple { name, width: None } => write!(f, "{}", name),
            VarType::Map(k, v) => write!(f, "map<{}, {}>", k, v),
        }
    }
}

/// One 64-bit record layout with its reactions and log lines.
#[derive(Debug, Clone)]
pub struct Bitstruct {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub decls: Vec<Decl>,
    pub actions: Vec<Action>,
    pub logs: Vec<LogElement>,
}

/// Bitstruct argument. Arguments are always present and never guarded.
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub var_type: VarType,
}

/// A field occupying the bits right after the previous decl.
#[derive(Debug, Clone)]
pub struct Decl {
    pub name: String,
    pub field_type: FieldType,
}

impl Decl {
    /// Whether the field becomes a named value in generated code.
    pub fn is_output(&self) -> bool {
        self.field_type.output() && self.name != "_"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Uint(u32),
    Bool,
    /// `byte<N>`: N consecutive 8-bit elements.
    Byte(u32),
    Unparsed(u32),
    Unknown(String),
}

impl FieldType {
    /// Total width in bits.
    pub fn width(&self) -> u32 {
        match self {
            FieldType::Uint(w) | FieldType::Unparsed(w) => *w,
            FieldType::Bool => 1,
            FieldType::Byte(n) => n.saturating_mul(8),
            FieldType::Unknown(_) => 0,
        }
    }

    pub fn elem_width(&self) -> u32 {
        match self {
            FieldType::Byte(_) => 8,
            other => other.width(),
        }
    }

    /// Number of elements; above one only for `byte<N>`.
    pub fn num(&self) -> u32 {
        match self {
            FieldType::Byte(n) => *n,
            _ => 1,
        }
    }

    pub fn output(&self) -> bool {
        !matches!(self, FieldType::Unparsed(_) | FieldType::Unknown(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Uint(w) => write!(f, "uint<{}>", w),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Byte(n) => write!(f, "byte<{}>", n),
            FieldType::Unparsed(w) => write!(f, "unparsed<{}>", w),
            FieldType::Unknown(raw) => write!(f, "unknown<{}>", raw),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    /// The empty statement `;`.
    Noop,
    Assign { target: Lvalue, value: Expr },
    Copy { target: Lvalue, address: Expr, segment: Expr, value: Expr },
    Put { target: Lvalue, key: Expr, value: Expr },
    /// `parse <label> <rule>`: the label word is kept for diagnostics only.
    Parse { label: String, rule: Expr },
    Invoke { object: Lvalue, method: String, args: Vec<Expr> },
    Switch { on: Expr, cases: Vec<Case> },
}

#[derive(Debug, Clone)]
pub struct Case {
    pub labels: Vec<u64>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(u64),
    Str(String),
    Lvalue(Lvalue),
    Call { function: String, args: Vec<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Mul,
    Add,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinOp::Mul => write!(f, "*"),
            BinOp::Add => write!(f, "+"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lvalue {
    Ident(String),
    Field(Box<Lvalue>, String),
    Index(Box<Lvalue>, Box<Expr>),
}

impl Lvalue {
    pub fn ident(name: &str) -> Self {
        Lvalue::Ident(name.to_string())
    }
}

/// A log template line, already unescaped.
#[derive(Debug, Clone, PartialEq)]
pub struct LogElement {
    pub template: String,
}

impl Specification {
    pub fn structs(&self) -> impl Iterator<Item = &Struct> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Struct(s) => Some(s),
            _ => None,
        })
    }

    pub fn bitstructs(&self) -> impl Iterator<Item = &Bitstruct> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Bitstruct(b) => Some(b),
            _ => None,
        })
    }

    pub fn get_bitstruct(&self, name: &str) -> Option<&Bitstruct> {
        self.bitstructs().find(|b| b.name == name)
    }
}
