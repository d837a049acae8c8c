//! Runtime values and thunks.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use nixb_sys::{
    ValueType, NIX_TYPE_ATTRS, NIX_TYPE_BOOL, NIX_TYPE_EXTERNAL, NIX_TYPE_FLOAT,
    NIX_TYPE_FUNCTION, NIX_TYPE_INT, NIX_TYPE_LIST, NIX_TYPE_NULL, NIX_TYPE_PATH,
    NIX_TYPE_STRING,
};

use super::builtins::Builtin;
use super::env::Env;
use crate::syntax::{ExprArena, ExprId};
use crate::ExternalId;

/// Attribute set contents, kept sorted by name.
pub(crate) type Attrs = BTreeMap<Rc<str>, Thunk>;

/// A value in weak head normal form.
#[derive(Clone, Debug)]
pub(crate) enum Val {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
    Path(Rc<str>),
    Null,
    Attrs(Rc<Attrs>),
    List(Rc<Vec<Thunk>>),
    Lambda(Rc<Closure>),
    PrimOp(Rc<PrimOpApp>),
    External(ExternalId),
}

impl Val {
    pub(crate) fn str(s: &str) -> Val {
        Val::Str(Rc::from(s))
    }

    pub(crate) fn type_tag(&self) -> ValueType {
        match self {
            Val::Int(_) => NIX_TYPE_INT,
            Val::Float(_) => NIX_TYPE_FLOAT,
            Val::Bool(_) => NIX_TYPE_BOOL,
            Val::Str(_) => NIX_TYPE_STRING,
            Val::Path(_) => NIX_TYPE_PATH,
            Val::Null => NIX_TYPE_NULL,
            Val::Attrs(_) => NIX_TYPE_ATTRS,
            Val::List(_) => NIX_TYPE_LIST,
            Val::Lambda(_) | Val::PrimOp(_) => NIX_TYPE_FUNCTION,
            Val::External(_) => NIX_TYPE_EXTERNAL,
        }
    }

    /// Name reported by `builtins.typeOf`.
    pub(crate) fn type_of(&self) -> &'static str {
        match self {
            Val::Int(_) => "int",
            Val::Float(_) => "float",
            Val::Bool(_) => "bool",
            Val::Str(_) => "string",
            Val::Path(_) => "path",
            Val::Null => "null",
            Val::Attrs(_) => "set",
            Val::List(_) => "list",
            Val::Lambda(_) => "lambda",
            Val::PrimOp(app) if app.args.is_empty() => "primop",
            Val::PrimOp(_) => "primop-app",
            Val::External(_) => "external",
        }
    }

    /// Phrase used in error messages and by `nix_get_typename`.
    pub(crate) fn show_type(&self) -> &'static str {
        match self {
            Val::Int(_) => "an integer",
            Val::Float(_) => "a float",
            Val::Bool(_) => "a Boolean",
            Val::Str(_) => "a string",
            Val::Path(_) => "a path",
            Val::Null => "null",
            Val::Attrs(_) => "a set",
            Val::List(_) => "a list",
            Val::Lambda(_) => "a function",
            Val::PrimOp(app) if app.args.is_empty() => "a built-in function",
            Val::PrimOp(_) => "a partially applied built-in function",
            Val::External(_) => "an external value",
        }
    }
}

/// A lambda together with the scope it closes over.
pub(crate) struct Closure {
    pub arena: Rc<ExprArena>,
    /// The `Lambda` expression.
    pub expr: ExprId,
    pub env: Env,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "«lambda {:?}»", self.expr)
    }
}

/// A builtin applied to fewer arguments than its arity.
#[derive(Debug)]
pub(crate) struct PrimOpApp {
    pub op: Builtin,
    pub args: Vec<Thunk>,
}

// ── Thunks ──────────────────────────────────────────────────────────────

pub(crate) enum ThunkState {
    /// Allocated slot that nothing has been written to.
    Uninit,
    Pending {
        arena: Rc<ExprArena>,
        expr: ExprId,
        env: Env,
    },
    /// Deferred function application (`map`, `genList`, ...).
    Apply { func: Thunk, arg: Thunk },
    /// Shares the result of another thunk (`nix_copy_value` of a thunk).
    Alias(Thunk),
    /// Being forced; reaching it again means infinite recursion.
    Blackhole,
    Done(Val),
}

/// A shared, lazily evaluated value slot.
#[derive(Clone)]
pub(crate) struct Thunk(Rc<RefCell<ThunkState>>);

impl Thunk {
    fn from_state(state: ThunkState) -> Self {
        Thunk(Rc::new(RefCell::new(state)))
    }

    pub(crate) fn uninit() -> Self {
        Self::from_state(ThunkState::Uninit)
    }

    pub(crate) fn done(value: Val) -> Self {
        Self::from_state(ThunkState::Done(value))
    }

    pub(crate) fn pending(arena: Rc<ExprArena>, expr: ExprId, env: Env) -> Self {
        Self::from_state(ThunkState::Pending { arena, expr, env })
    }

    pub(crate) fn apply(func: Thunk, arg: Thunk) -> Self {
        Self::from_state(ThunkState::Apply { func, arg })
    }

    /// The value, if already forced.
    pub(crate) fn value(&self) -> Option<Val> {
        match &*self.0.borrow() {
            ThunkState::Done(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub(crate) fn is_uninit(&self) -> bool {
        matches!(&*self.0.borrow(), ThunkState::Uninit)
    }

    pub(crate) fn replace(&self, state: ThunkState) -> ThunkState {
        self.0.replace(state)
    }

    pub(crate) fn set(&self, value: Val) {
        self.0.replace(ThunkState::Done(value));
    }

    /// Make this slot share `source`: forced values are copied, anything
    /// else is aliased so it is evaluated at most once.
    pub(crate) fn copy_from(&self, source: &Thunk) {
        if Rc::ptr_eq(&self.0, &source.0) {
            return;
        }
        let state = match source.value() {
            Some(v) => ThunkState::Done(v),
            None => ThunkState::Alias(source.clone()),
        };
        self.0.replace(state);
    }

    /// Overwrite element `ix` of the list held by this slot.
    pub(crate) fn set_list_item(&self, ix: usize, item: Thunk) -> Result<(), Option<usize>> {
        let mut state = self.0.borrow_mut();
        match &mut *state {
            ThunkState::Done(Val::List(items)) => {
                let len = items.len();
                let items = Rc::make_mut(items);
                match items.get_mut(ix) {
                    Some(slot) => {
                        *slot = item;
                        Ok(())
                    }
                    None => Err(Some(len)),
                }
            }
            _ => Err(None),
        }
    }

    #[allow(dead_code)]
    pub(crate) fn ptr_eq(&self, other: &Thunk) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow().as_deref() {
            Ok(ThunkState::Done(v)) => write!(f, "{v:?}"),
            Ok(ThunkState::Uninit) => f.write_str("«uninitialized»"),
            Ok(_) | Err(_) => f.write_str("«thunk»"),
        }
    }
}
