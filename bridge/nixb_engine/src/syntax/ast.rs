//! Expression arena.
//!
//! Expressions are stored flat in an [`ExprArena`] and referenced by
//! [`ExprId`]. An arena is immutable once parsed and shared (`Rc`) by every
//! thunk and closure created from it.

use std::ops::Range;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ExprId(u32);

#[derive(Debug)]
pub(crate) struct Expr {
    pub kind: ExprKind,
    pub span: Range<usize>,
}

#[derive(Debug)]
pub(crate) enum ExprKind {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// Absolute path, resolved against the base directory while parsing.
    Path(Rc<str>),
    /// `<name>`
    SearchPath(Rc<str>),
    Var(Rc<str>),
    List(Vec<ExprId>),
    Attrs {
        recursive: bool,
        bindings: Vec<Binding>,
    },
    Let {
        bindings: Vec<Binding>,
        body: ExprId,
    },
    Lambda {
        param: Param,
        body: ExprId,
    },
    Apply {
        func: ExprId,
        arg: ExprId,
    },
    Select {
        target: ExprId,
        path: Vec<Rc<str>>,
        default: Option<ExprId>,
    },
    HasAttr {
        target: ExprId,
        path: Vec<Rc<str>>,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Not(ExprId),
    Negate(ExprId),
    If {
        cond: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
    Assert {
        cond: ExprId,
        body: ExprId,
    },
    With {
        scope: ExprId,
        body: ExprId,
    },
}

/// `a.b.c = value;`, or one name of an `inherit`.
///
/// A plain `inherit x;` is a binding of `x` to `Var(x)` evaluated in the
/// enclosing scope, never in the scope of a `rec` set or `let` it sits in.
#[derive(Debug)]
pub(crate) struct Binding {
    pub path: Vec<Rc<str>>,
    pub value: ExprId,
    pub inherited: bool,
}

#[derive(Debug)]
pub(crate) enum Param {
    Ident(Rc<str>),
    Formals {
        formals: Vec<Formal>,
        ellipsis: bool,
        bind: Option<Rc<str>>,
    },
}

#[derive(Debug)]
pub(crate) struct Formal {
    pub name: Rc<str>,
    pub default: Option<ExprId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Update,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Implies,
}

impl BinaryOp {
    pub(crate) fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Concat => "++",
            BinaryOp::Update => "//",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Implies => "->",
        }
    }
}

#[derive(Debug)]
pub(crate) struct ExprArena {
    exprs: Vec<Expr>,
    source: Rc<str>,
}

impl ExprArena {
    pub(crate) fn new(source: Rc<str>) -> Self {
        ExprArena {
            exprs: Vec::new(),
            source,
        }
    }

    pub(crate) fn alloc(&mut self, kind: ExprKind, span: Range<usize>) -> ExprId {
        let id = u32::try_from(self.exprs.len()).unwrap_or(u32::MAX);
        self.exprs.push(Expr { kind, span });
        ExprId(id)
    }

    #[inline]
    pub(crate) fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    /// Source text of an expression, for error messages.
    pub(crate) fn text(&self, id: ExprId) -> &str {
        self.source.get(self.get(id).span.clone()).unwrap_or_default()
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.exprs.len()
    }
}
