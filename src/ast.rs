//! Syntax tree for the supported Python subset.
//!
//! Three node families carry a [`NodeId`]: statements, expressions and
//! exception handlers. Everything else (parameters, keywords, aliases,
//! with-items, comprehension clauses) is plain structure owned by its
//! parent node. Cloning a tree is always a deep copy and keeps the IDs.

use num_bigint::BigInt;
use serde::Serialize;
use std::fmt;

/// Stable identifier stamped on a node by [`crate::ids::assign_node_ids`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: Option<NodeId>,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    FunctionDef {
        name: String,
        params: Parameters,
        body: Vec<Stmt>,
        decorators: Vec<Expr>,
        returns: Option<Expr>,
        is_async: bool,
    },
    ClassDef {
        name: String,
        bases: Vec<Expr>,
        keywords: Vec<Keyword>,
        body: Vec<Stmt>,
        decorators: Vec<Expr>,
    },
    Return(Option<Expr>),
    Delete(Vec<Expr>),
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOperator,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        is_async: bool,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        is_async: bool,
    },
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Import(Vec<Alias>),
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
        level: usize,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Expr(Expr),
    Pass,
    Break,
    Continue,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { id: None, kind }
    }

    pub fn pass() -> Self {
        Self::new(StmtKind::Pass)
    }

    /// Name of the defined function, if this is a function definition.
    pub fn function_name(&self) -> Option<&str> {
        match &self.kind {
            StmtKind::FunctionDef { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub id: Option<NodeId>,
    pub type_: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: Option<NodeId>,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    BoolOp {
        op: BoolOperator,
        values: Vec<Expr>,
    },
    NamedExpr {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Lambda {
        params: Box<Parameters>,
        body: Box<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    /// `None` keys are `**mapping` unpackings.
    Dict {
        keys: Vec<Option<Expr>>,
        values: Vec<Expr>,
    },
    Set(Vec<Expr>),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    Await(Box<Expr>),
    Yield(Option<Box<Expr>>),
    YieldFrom(Box<Expr>),
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOperator>,
        comparators: Vec<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    /// f-string kept as its literal source text.
    FormattedString(String),
    Constant(Constant),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
    },
    Starred(Box<Expr>),
    Name(String),
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { id: None, kind }
    }

    pub fn name(id: impl Into<String>) -> Self {
        Self::new(ExprKind::Name(id.into()))
    }

    pub fn constant(value: Constant) -> Self {
        Self::new(ExprKind::Constant(value))
    }

    pub fn is_none_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(Constant::None))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    /// Imaginary literal such as `2j`; the value is the imaginary part.
    Complex(f64),
    Str(String),
    Bytes(Vec<u8>),
    Ellipsis,
}

impl Constant {
    pub fn int(value: i64) -> Self {
        Constant::Int(BigInt::from(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOperator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    FloorDiv,
}

impl BinOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOperator::Add => "+",
            BinOperator::Sub => "-",
            BinOperator::Mult => "*",
            BinOperator::MatMult => "@",
            BinOperator::Div => "/",
            BinOperator::Mod => "%",
            BinOperator::Pow => "**",
            BinOperator::LShift => "<<",
            BinOperator::RShift => ">>",
            BinOperator::BitOr => "|",
            BinOperator::BitXor => "^",
            BinOperator::BitAnd => "&",
            BinOperator::FloorDiv => "//",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinOperator::Add,
            "-" => BinOperator::Sub,
            "*" => BinOperator::Mult,
            "@" => BinOperator::MatMult,
            "/" => BinOperator::Div,
            "%" => BinOperator::Mod,
            "**" => BinOperator::Pow,
            "<<" => BinOperator::LShift,
            ">>" => BinOperator::RShift,
            "|" => BinOperator::BitOr,
            "^" => BinOperator::BitXor,
            "&" => BinOperator::BitAnd,
            "//" => BinOperator::FloorDiv,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Invert,
    Not,
    UAdd,
    USub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOperator::Eq => "==",
            CmpOperator::NotEq => "!=",
            CmpOperator::Lt => "<",
            CmpOperator::LtE => "<=",
            CmpOperator::Gt => ">",
            CmpOperator::GtE => ">=",
            CmpOperator::Is => "is",
            CmpOperator::IsNot => "is not",
            CmpOperator::In => "in",
            CmpOperator::NotIn => "not in",
        }
    }
}

/// A single parameter; `default` is only ever set for positional and
/// keyword-only parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    pub posonly: Vec<Param>,
    pub args: Vec<Param>,
    pub vararg: Option<Param>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<Param>,
}

impl Parameters {
    /// Parameters in source order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.posonly
            .iter()
            .chain(self.args.iter())
            .chain(self.vararg.iter())
            .chain(self.kwonly.iter())
            .chain(self.kwarg.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Param> {
        self.posonly
            .iter_mut()
            .chain(self.args.iter_mut())
            .chain(self.vararg.iter_mut())
            .chain(self.kwonly.iter_mut())
            .chain(self.kwarg.iter_mut())
    }
}

/// Call or class keyword argument; `arg` is `None` for `**mapping`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context_expr: Expr,
    pub optional_vars: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

/// An owned tree fragment: what the catalog proposes and the replacer inserts.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Stmt(Stmt),
    Expr(Expr),
    Handler(ExceptHandler),
}

impl Node {
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Node::Stmt(stmt) => stmt.id,
            Node::Expr(expr) => expr.id,
            Node::Handler(handler) => handler.id,
        }
    }

    pub fn set_id(&mut self, id: Option<NodeId>) {
        match self {
            Node::Stmt(stmt) => stmt.id = id,
            Node::Expr(expr) => expr.id = id,
            Node::Handler(handler) => handler.id = id,
        }
    }

    pub fn as_ref(&self) -> NodeRef<'_> {
        match self {
            Node::Stmt(stmt) => NodeRef::Stmt(stmt),
            Node::Expr(expr) => NodeRef::Expr(expr),
            Node::Handler(handler) => NodeRef::Handler(handler),
        }
    }
}

/// Borrowed view of any ID-carrying node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeRef<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    Handler(&'a ExceptHandler),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> Option<NodeId> {
        match self {
            NodeRef::Stmt(stmt) => stmt.id,
            NodeRef::Expr(expr) => expr.id,
            NodeRef::Handler(handler) => handler.id,
        }
    }

    pub fn to_owned_node(&self) -> Node {
        match self {
            NodeRef::Stmt(stmt) => Node::Stmt((*stmt).clone()),
            NodeRef::Expr(expr) => Node::Expr((*expr).clone()),
            NodeRef::Handler(handler) => Node::Handler((*handler).clone()),
        }
    }

    /// Short category label used in logs.
    pub fn family(&self) -> &'static str {
        match self {
            NodeRef::Stmt(_) => "statement",
            NodeRef::Expr(_) => "expression",
            NodeRef::Handler(_) => "except handler",
        }
    }
}

/// Mutable view handed out by [`crate::ids::walk_mut`].
#[derive(Debug)]
pub enum NodeMut<'a> {
    Stmt(&'a mut Stmt),
    Expr(&'a mut Expr),
    Handler(&'a mut ExceptHandler),
}
