use crate::error::Span;
use std::rc::Rc;

/// One parse worth of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A user function or class method. Shared so the runtime's function
/// registry and class method tables can hold on to it after the statement
/// that declared it has run.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    App {
        name: String,
        body: Vec<Stmt>,
        span: Span,
    },
    Window {
        name: String,
        body: Vec<Stmt>,
        span: Span,
    },
    Function(Rc<FuncDecl>),
    Class {
        name: String,
        methods: Vec<Rc<FuncDecl>>,
        span: Span,
    },
    /// `title "Hello"` or `sh "ls -la"`.
    Property {
        name: String,
        value: String,
        span: Span,
    },
    /// Call in statement position. `name` may be qualified (`io.write`).
    Call {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Connect {
        source: String,
        event: String,
        target: String,
        span: Span,
    },
    Set {
        name: String,
        value: Expr,
        span: Span,
    },
    /// `name++`
    Update {
        name: String,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    /// `if` branch followed by any `elif` branches, in source order.
    If {
        branches: Vec<ConditionalBranch>,
        else_branch: Option<Vec<Stmt>>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    For {
        iterator: String,
        iterable: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    Try {
        body: Vec<Stmt>,
        error_var: String,
        handler: Vec<Stmt>,
        span: Span,
    },
    Import {
        path: String,
        span: Span,
    },
    Clear {
        span: Span,
    },
    Expression {
        expr: Expr,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> &Span {
        match self {
            Stmt::App { span, .. } => span,
            Stmt::Window { span, .. } => span,
            Stmt::Function(decl) => &decl.span,
            Stmt::Class { span, .. } => span,
            Stmt::Property { span, .. } => span,
            Stmt::Call { span, .. } => span,
            Stmt::Connect { span, .. } => span,
            Stmt::Set { span, .. } => span,
            Stmt::Update { span, .. } => span,
            Stmt::Return { span, .. } => span,
            Stmt::If { span, .. } => span,
            Stmt::While { span, .. } => span,
            Stmt::For { span, .. } => span,
            Stmt::Try { span, .. } => span,
            Stmt::Import { span, .. } => span,
            Stmt::Clear { span } => span,
            Stmt::Expression { span, .. } => span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
        span: Span,
    },
    Variable {
        name: String,
        span: Span,
    },
    Array {
        elements: Vec<Expr>,
        span: Span,
    },
    /// Keys are always string literals.
    Dict {
        pairs: Vec<(String, Expr)>,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Get {
        object: Box<Expr>,
        name: String,
        span: Span,
    },
    Set {
        object: Box<Expr>,
        name: String,
        value: Box<Expr>,
        span: Span,
    },
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },
    /// Function or built-in call by (possibly qualified) name.
    Call {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },
    Negate {
        operand: Box<Expr>,
        span: Span,
    },
    This {
        span: Span,
    },
    New {
        class_name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Input {
        prompt: Option<String>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Literal { span, .. } => span,
            Expr::Variable { span, .. } => span,
            Expr::Array { span, .. } => span,
            Expr::Dict { span, .. } => span,
            Expr::Index { span, .. } => span,
            Expr::Get { span, .. } => span,
            Expr::Set { span, .. } => span,
            Expr::MethodCall { span, .. } => span,
            Expr::Call { span, .. } => span,
            Expr::Binary { span, .. } => span,
            Expr::Negate { span, .. } => span,
            Expr::This { span } => span,
            Expr::New { span, .. } => span,
            Expr::Input { span, .. } => span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Less,
    Greater,
    Equal,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::Equal => "==",
        }
    }
}
