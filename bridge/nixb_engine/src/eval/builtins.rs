//! Built-in functions and the base environment.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::env::Env;
use super::value::{Attrs, PrimOpApp, Thunk, Val};
use super::{operators, Evaluator};
use crate::errors::{
    aborted, attribute_not_found, eval_error, list_index_out_of_bounds, thrown, NativeResult,
};
use crate::store::DerivationSpec;
use crate::syntax::BinaryOp;
use crate::NIX_VERSION;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Builtin {
    Abort,
    Add,
    AttrNames,
    AttrValues,
    BaseNameOf,
    ConcatLists,
    ConcatStringsSep,
    DeepSeq,
    Derivation,
    Div,
    Elem,
    ElemAt,
    Filter,
    FoldlStrict,
    GenList,
    GetAttr,
    HasAttr,
    Head,
    Import,
    IsAttrs,
    IsBool,
    IsFloat,
    IsFunction,
    IsInt,
    IsList,
    IsNull,
    IsPath,
    IsString,
    Length,
    LessThan,
    ListToAttrs,
    Map,
    MapAttrs,
    Mul,
    RemoveAttrs,
    Seq,
    StringLength,
    Sub,
    Tail,
    Throw,
    ToString,
    Trace,
    TypeOf,
}

impl Builtin {
    pub(crate) const ALL: [Builtin; 43] = [
        Builtin::Abort,
        Builtin::Add,
        Builtin::AttrNames,
        Builtin::AttrValues,
        Builtin::BaseNameOf,
        Builtin::ConcatLists,
        Builtin::ConcatStringsSep,
        Builtin::DeepSeq,
        Builtin::Derivation,
        Builtin::Div,
        Builtin::Elem,
        Builtin::ElemAt,
        Builtin::Filter,
        Builtin::FoldlStrict,
        Builtin::GenList,
        Builtin::GetAttr,
        Builtin::HasAttr,
        Builtin::Head,
        Builtin::Import,
        Builtin::IsAttrs,
        Builtin::IsBool,
        Builtin::IsFloat,
        Builtin::IsFunction,
        Builtin::IsInt,
        Builtin::IsList,
        Builtin::IsNull,
        Builtin::IsPath,
        Builtin::IsString,
        Builtin::Length,
        Builtin::LessThan,
        Builtin::ListToAttrs,
        Builtin::Map,
        Builtin::MapAttrs,
        Builtin::Mul,
        Builtin::RemoveAttrs,
        Builtin::Seq,
        Builtin::StringLength,
        Builtin::Sub,
        Builtin::Tail,
        Builtin::Throw,
        Builtin::ToString,
        Builtin::Trace,
        Builtin::TypeOf,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            Builtin::Abort => "abort",
            Builtin::Add => "add",
            Builtin::AttrNames => "attrNames",
            Builtin::AttrValues => "attrValues",
            Builtin::BaseNameOf => "baseNameOf",
            Builtin::ConcatLists => "concatLists",
            Builtin::ConcatStringsSep => "concatStringsSep",
            Builtin::DeepSeq => "deepSeq",
            Builtin::Derivation => "derivation",
            Builtin::Div => "div",
            Builtin::Elem => "elem",
            Builtin::ElemAt => "elemAt",
            Builtin::Filter => "filter",
            Builtin::FoldlStrict => "foldl'",
            Builtin::GenList => "genList",
            Builtin::GetAttr => "getAttr",
            Builtin::HasAttr => "hasAttr",
            Builtin::Head => "head",
            Builtin::Import => "import",
            Builtin::IsAttrs => "isAttrs",
            Builtin::IsBool => "isBool",
            Builtin::IsFloat => "isFloat",
            Builtin::IsFunction => "isFunction",
            Builtin::IsInt => "isInt",
            Builtin::IsList => "isList",
            Builtin::IsNull => "isNull",
            Builtin::IsPath => "isPath",
            Builtin::IsString => "isString",
            Builtin::Length => "length",
            Builtin::LessThan => "lessThan",
            Builtin::ListToAttrs => "listToAttrs",
            Builtin::Map => "map",
            Builtin::MapAttrs => "mapAttrs",
            Builtin::Mul => "mul",
            Builtin::RemoveAttrs => "removeAttrs",
            Builtin::Seq => "seq",
            Builtin::StringLength => "stringLength",
            Builtin::Sub => "sub",
            Builtin::Tail => "tail",
            Builtin::Throw => "throw",
            Builtin::ToString => "toString",
            Builtin::Trace => "trace",
            Builtin::TypeOf => "typeOf",
        }
    }

    pub(crate) fn arity(self) -> usize {
        match self {
            Builtin::FoldlStrict => 3,
            Builtin::Add
            | Builtin::ConcatStringsSep
            | Builtin::DeepSeq
            | Builtin::Div
            | Builtin::Elem
            | Builtin::ElemAt
            | Builtin::Filter
            | Builtin::GenList
            | Builtin::GetAttr
            | Builtin::HasAttr
            | Builtin::LessThan
            | Builtin::Map
            | Builtin::MapAttrs
            | Builtin::Mul
            | Builtin::RemoveAttrs
            | Builtin::Seq
            | Builtin::Sub
            | Builtin::Trace => 2,
            _ => 1,
        }
    }

    /// Also bound at top level, not only under `builtins`.
    fn is_global(self) -> bool {
        matches!(
            self,
            Builtin::Abort
                | Builtin::BaseNameOf
                | Builtin::Derivation
                | Builtin::Import
                | Builtin::IsNull
                | Builtin::Map
                | Builtin::RemoveAttrs
                | Builtin::Throw
                | Builtin::ToString
        )
    }
}

/// `<arch>-<os>` in Nix's spelling.
pub(crate) fn current_system() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    format!("{}-{os}", std::env::consts::ARCH)
}

/// The scope every evaluation starts in.
pub(crate) fn base_env(store_dir: &str, nix_path: Val) -> Env {
    let env = Env::root();
    let mut builtins = Attrs::new();
    for op in Builtin::ALL {
        let value = Thunk::done(Val::PrimOp(Rc::new(PrimOpApp {
            op,
            args: Vec::new(),
        })));
        if op.is_global() {
            env.define(Rc::from(op.name()), value.clone());
        }
        builtins.insert(Rc::from(op.name()), value);
    }
    let constants = [
        ("true", Val::Bool(true)),
        ("false", Val::Bool(false)),
        ("null", Val::Null),
    ];
    for (name, value) in constants {
        let value = Thunk::done(value);
        env.define(Rc::from(name), value.clone());
        builtins.insert(Rc::from(name), value);
    }
    builtins.insert(Rc::from("nixVersion"), Thunk::done(Val::str(NIX_VERSION)));
    builtins.insert(Rc::from("storeDir"), Thunk::done(Val::str(store_dir)));
    builtins.insert(
        Rc::from("currentSystem"),
        Thunk::done(Val::str(&current_system())),
    );
    builtins.insert(Rc::from("nixPath"), Thunk::done(nix_path));

    let builtins = Thunk::done(Val::Attrs(Rc::new(builtins)));
    if let Some(Val::Attrs(attrs)) = builtins.value() {
        // `builtins.builtins` refers back to the set itself.
        let mut attrs = (*attrs).clone();
        attrs.insert(Rc::from("builtins"), builtins.clone());
        builtins.set(Val::Attrs(Rc::new(attrs)));
    }
    env.define(Rc::from("builtins"), builtins);
    env
}

fn list(items: Vec<Thunk>) -> Val {
    Val::List(Rc::new(items))
}

/// Run a fully applied builtin.
pub(crate) fn call(ev: &Evaluator, op: Builtin, args: &[Thunk]) -> NativeResult<Val> {
    match op {
        Builtin::Abort => {
            let message = ev.force_coerced(&args[0], false)?;
            Err(aborted(&message))
        }
        Builtin::Throw => {
            let message = ev.force_coerced(&args[0], false)?;
            Err(thrown(&message))
        }
        Builtin::Add => arith(ev, BinaryOp::Add, args),
        Builtin::Sub => arith(ev, BinaryOp::Sub, args),
        Builtin::Mul => arith(ev, BinaryOp::Mul, args),
        Builtin::Div => arith(ev, BinaryOp::Div, args),
        Builtin::AttrNames => {
            let attrs = ev.force_attrs(&args[0])?;
            Ok(list(
                attrs
                    .keys()
                    .map(|k| Thunk::done(Val::Str(k.clone())))
                    .collect(),
            ))
        }
        Builtin::AttrValues => {
            let attrs = ev.force_attrs(&args[0])?;
            Ok(list(attrs.values().cloned().collect()))
        }
        Builtin::BaseNameOf => {
            let text = ev.force_coerced(&args[0], false)?;
            let trimmed = text.strip_suffix('/').unwrap_or(&text);
            let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
            Ok(Val::str(base))
        }
        Builtin::ConcatLists => {
            let outer = ev.force_list(&args[0])?;
            let mut items = Vec::new();
            for inner in outer.iter() {
                items.extend(ev.force_list(inner)?.iter().cloned());
            }
            Ok(list(items))
        }
        Builtin::ConcatStringsSep => {
            let sep = ev.force_str(&args[0])?;
            let parts = ev.force_list(&args[1])?;
            let mut out = String::new();
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    out.push_str(&sep);
                }
                out.push_str(&ev.force_coerced(part, false)?);
            }
            Ok(Val::str(&out))
        }
        Builtin::DeepSeq => {
            ev.force_deep(&args[0])?;
            ev.force(&args[1])
        }
        Builtin::Seq => {
            ev.force(&args[0])?;
            ev.force(&args[1])
        }
        Builtin::Derivation => derivation(ev, &args[0]),
        Builtin::Elem => {
            let needle = ev.force(&args[0])?;
            for item in ev.force_list(&args[1])?.iter() {
                if ev.values_equal(&needle, &ev.force(item)?)? {
                    return Ok(Val::Bool(true));
                }
            }
            Ok(Val::Bool(false))
        }
        Builtin::ElemAt => {
            let items = ev.force_list(&args[0])?;
            let index = ev.force_int(&args[1])?;
            let item = usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .ok_or_else(|| list_index_out_of_bounds(index))?;
            ev.force(item)
        }
        Builtin::Filter => {
            let pred = ev.force(&args[0])?;
            let mut kept = Vec::new();
            for item in ev.force_list(&args[1])?.iter() {
                if ev.expect_bool(ev.apply(&pred, item.clone())?)? {
                    kept.push(item.clone());
                }
            }
            Ok(list(kept))
        }
        Builtin::FoldlStrict => {
            let func = ev.force(&args[0])?;
            let mut acc = ev.force(&args[1])?;
            for item in ev.force_list(&args[2])?.iter() {
                let partial = ev.apply(&func, Thunk::done(acc))?;
                acc = ev.apply(&partial, item.clone())?;
            }
            Ok(acc)
        }
        Builtin::GenList => {
            let func = &args[0];
            let len = ev.force_int(&args[1])?;
            let len = usize::try_from(len)
                .map_err(|_| eval_error(format!("cannot create list of size {len}")))?;
            let items = (0..len)
                .map(|i| {
                    let index = i64::try_from(i).unwrap_or(i64::MAX);
                    Thunk::apply(func.clone(), Thunk::done(Val::Int(index)))
                })
                .collect();
            Ok(list(items))
        }
        Builtin::GetAttr => {
            let name = ev.force_str(&args[0])?;
            let attrs = ev.force_attrs(&args[1])?;
            let value = attrs.get(&*name).ok_or_else(|| attribute_not_found(&name))?;
            ev.force(value)
        }
        Builtin::HasAttr => {
            let name = ev.force_str(&args[0])?;
            let attrs = ev.force_attrs(&args[1])?;
            Ok(Val::Bool(attrs.contains_key(&*name)))
        }
        Builtin::Head => {
            let items = ev.force_list(&args[0])?;
            let first = items.first().ok_or_else(|| list_index_out_of_bounds(0))?;
            ev.force(first)
        }
        Builtin::Tail => {
            let items = ev.force_list(&args[0])?;
            if items.is_empty() {
                return Err(eval_error("'tail' called on an empty list"));
            }
            Ok(list(items[1..].to_vec()))
        }
        Builtin::Import => {
            let path = ev.force_coerced(&args[0], false)?;
            ev.import(&path)
        }
        Builtin::IsAttrs => is(ev, &args[0], |v| matches!(v, Val::Attrs(_))),
        Builtin::IsBool => is(ev, &args[0], |v| matches!(v, Val::Bool(_))),
        Builtin::IsFloat => is(ev, &args[0], |v| matches!(v, Val::Float(_))),
        Builtin::IsFunction => is(ev, &args[0], |v| matches!(v, Val::Lambda(_) | Val::PrimOp(_))),
        Builtin::IsInt => is(ev, &args[0], |v| matches!(v, Val::Int(_))),
        Builtin::IsList => is(ev, &args[0], |v| matches!(v, Val::List(_))),
        Builtin::IsNull => is(ev, &args[0], |v| matches!(v, Val::Null)),
        Builtin::IsPath => is(ev, &args[0], |v| matches!(v, Val::Path(_))),
        Builtin::IsString => is(ev, &args[0], |v| matches!(v, Val::Str(_))),
        Builtin::Length => {
            let items = ev.force_list(&args[0])?;
            Ok(Val::Int(i64::try_from(items.len()).unwrap_or(i64::MAX)))
        }
        Builtin::LessThan => {
            let left = ev.force(&args[0])?;
            let right = ev.force(&args[1])?;
            Ok(Val::Bool(ev.less_than(&left, &right)?))
        }
        Builtin::ListToAttrs => {
            let mut attrs = Attrs::new();
            for item in ev.force_list(&args[0])?.iter() {
                let entry = ev.force_attrs(item)?;
                let name = entry
                    .get("name")
                    .ok_or_else(|| attribute_not_found("name"))?;
                let name = ev.force_str(name)?;
                let value = entry
                    .get("value")
                    .ok_or_else(|| attribute_not_found("value"))?;
                attrs.entry(name).or_insert_with(|| value.clone());
            }
            Ok(Val::Attrs(Rc::new(attrs)))
        }
        Builtin::Map => {
            let func = &args[0];
            let items = ev.force_list(&args[1])?;
            Ok(list(
                items
                    .iter()
                    .map(|item| Thunk::apply(func.clone(), item.clone()))
                    .collect(),
            ))
        }
        Builtin::MapAttrs => {
            let func = &args[0];
            let attrs = ev.force_attrs(&args[1])?;
            let mapped: Attrs = attrs
                .iter()
                .map(|(name, value)| {
                    let with_name = Thunk::apply(func.clone(), Thunk::done(Val::Str(name.clone())));
                    (name.clone(), Thunk::apply(with_name, value.clone()))
                })
                .collect();
            Ok(Val::Attrs(Rc::new(mapped)))
        }
        Builtin::RemoveAttrs => {
            let attrs = ev.force_attrs(&args[0])?;
            let mut kept = (*attrs).clone();
            for name in ev.force_list(&args[1])?.iter() {
                kept.remove(&*ev.force_str(name)?);
            }
            Ok(Val::Attrs(Rc::new(kept)))
        }
        Builtin::StringLength => {
            let text = ev.force_coerced(&args[0], false)?;
            Ok(Val::Int(i64::try_from(text.len()).unwrap_or(i64::MAX)))
        }
        Builtin::ToString => {
            let text = ev.force_coerced(&args[0], true)?;
            Ok(Val::str(&text))
        }
        Builtin::Trace => {
            let message = match ev.force(&args[0])? {
                Val::Str(s) => s.to_string(),
                other => format!("«{}»", other.type_of()),
            };
            tracing::info!(target: "nixb_engine::trace", "trace: {message}");
            ev.force(&args[1])
        }
        Builtin::TypeOf => {
            let value = ev.force(&args[0])?;
            Ok(Val::str(value.type_of()))
        }
    }
}

fn arith(ev: &Evaluator, op: BinaryOp, args: &[Thunk]) -> NativeResult<Val> {
    let left = ev.force(&args[0])?;
    let right = ev.force(&args[1])?;
    operators::arithmetic(op, &left, &right)
}

fn is(ev: &Evaluator, arg: &Thunk, test: impl Fn(&Val) -> bool) -> NativeResult<Val> {
    Ok(Val::Bool(test(&ev.force(arg)?)))
}

/// `derivation attrs`: instantiate into the store and return `attrs`
/// extended with `type`, `drvPath`, `outPath` and one set per output.
fn derivation(ev: &Evaluator, arg: &Thunk) -> NativeResult<Val> {
    let attrs = ev.force_attrs(arg)?;
    let required = |name: &str| -> NativeResult<String> {
        let value = attrs.get(name).ok_or_else(|| {
            eval_error(format!("required attribute '{name}' missing"))
        })?;
        ev.force_coerced(value, true)
    };
    let name = required("name")?;
    let system = required("system")?;
    let builder = required("builder")?;

    let outputs = match attrs.get("outputs") {
        Some(outputs) => {
            let mut names = Vec::new();
            for output in ev.force_list(outputs)?.iter() {
                names.push(ev.force_str(output)?.to_string());
            }
            names
        }
        None => vec!["out".to_owned()],
    };
    if outputs.is_empty() {
        return Err(eval_error("derivation cannot have an empty set of outputs"));
    }
    let args = match attrs.get("args") {
        Some(args) => {
            let mut out = Vec::new();
            for arg in ev.force_list(args)?.iter() {
                out.push(ev.force_coerced(arg, true)?);
            }
            out
        }
        None => Vec::new(),
    };
    let mut env = BTreeMap::new();
    for (key, value) in attrs.iter() {
        match &**key {
            "args" => {}
            "outputs" => {
                env.insert(key.to_string(), outputs.join(" "));
            }
            _ => {
                env.insert(key.to_string(), ev.force_coerced(value, true)?);
            }
        }
    }
    let spec = DerivationSpec {
        name: name.clone(),
        system,
        builder,
        args,
        env,
        outputs: outputs.clone(),
    };
    let drv = ev.store().borrow_mut().add_derivation(&spec)?;

    let drv_path = Thunk::done(Val::str(&drv.drv_path));
    let mut result = (*attrs).clone();
    result.insert(Rc::from("type"), Thunk::done(Val::str("derivation")));
    result.insert(Rc::from("drvPath"), drv_path.clone());
    for output in &outputs {
        let path = drv.outputs.get(output).map_or("", String::as_str);
        let mut sub = Attrs::new();
        sub.insert(Rc::from("type"), Thunk::done(Val::str("derivation")));
        sub.insert(Rc::from("name"), Thunk::done(Val::str(&name)));
        sub.insert(Rc::from("drvPath"), drv_path.clone());
        sub.insert(Rc::from("outPath"), Thunk::done(Val::str(path)));
        sub.insert(Rc::from("outputName"), Thunk::done(Val::str(output)));
        result.insert(Rc::from(output.as_str()), Thunk::done(Val::Attrs(Rc::new(sub))));
    }
    let first = &outputs[0];
    let out_path = drv.outputs.get(first).map_or("", String::as_str);
    result.insert(Rc::from("outPath"), Thunk::done(Val::str(out_path)));
    result.insert(Rc::from("outputName"), Thunk::done(Val::str(first)));
    Ok(Val::Attrs(Rc::new(result)))
}
