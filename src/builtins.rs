//! Fixed table of host-provided functions. Built-ins are looked up before
//! user functions and behave the same in statement and expression position,
//! except `os.exec`, which only captures output when its value is used.

use crate::error::{LinkError, Span};
use crate::runtime::Runtime;
use crate::stdlib::{fs_ops, process, strings};
use crate::value::Value;
use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CallSite {
    Statement,
    Expression,
}

pub struct CallContext<'a> {
    pub site: CallSite,
    pub span: &'a Span,
}

type BuiltinFn = fn(&mut Runtime, &[Value], &CallContext) -> Result<Value, LinkError>;

pub struct Builtin {
    pub name: &'static str,
    /// Minimum argument count. Fewer arguments skip the call and yield
    /// `fallback` instead.
    pub arity: usize,
    pub fallback: fn() -> Value,
    pub run: BuiltinFn,
}

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|builtin| builtin.name)
}

pub fn invoke(
    runtime: &mut Runtime,
    builtin: &Builtin,
    args: Vec<Value>,
    context: &CallContext,
) -> Result<Value, LinkError> {
    if args.len() < builtin.arity {
        return Ok((builtin.fallback)());
    }
    (builtin.run)(runtime, &args, context)
}

fn nil() -> Value {
    Value::Nil
}

fn zero() -> Value {
    Value::Int(0)
}

fn zero_float() -> Value {
    Value::Float(0.0)
}

fn no() -> Value {
    Value::Bool(false)
}

fn empty_string() -> Value {
    Value::String(String::new())
}

fn empty_list() -> Value {
    Value::list(Vec::new())
}

static BUILTINS: &[Builtin] = &[
    Builtin { name: "print", arity: 0, fallback: nil, run: print },
    Builtin { name: "time.sleep", arity: 1, fallback: nil, run: sleep },
    Builtin { name: "range", arity: 1, fallback: empty_list, run: range },
    Builtin { name: "len", arity: 1, fallback: zero, run: len },
    Builtin { name: "str.len", arity: 1, fallback: zero, run: len },
    Builtin { name: "list.add", arity: 2, fallback: nil, run: list_add },
    Builtin { name: "io.read", arity: 1, fallback: empty_string, run: io_read },
    Builtin { name: "io.exists", arity: 1, fallback: no, run: io_exists },
    Builtin { name: "io.write", arity: 2, fallback: nil, run: io_write },
    Builtin { name: "io.append", arity: 2, fallback: nil, run: io_append },
    Builtin { name: "io.remove", arity: 1, fallback: nil, run: io_remove },
    Builtin { name: "os.exec", arity: 1, fallback: empty_string, run: os_exec },
    Builtin { name: "os.getenv", arity: 1, fallback: empty_string, run: os_getenv },
    Builtin { name: "os.setenv", arity: 2, fallback: nil, run: os_setenv },
    Builtin { name: "str.trim", arity: 1, fallback: empty_string, run: str_trim },
    Builtin { name: "str.replace", arity: 3, fallback: empty_string, run: str_replace },
    Builtin { name: "str.split", arity: 2, fallback: empty_list, run: str_split },
    Builtin { name: "str.merge", arity: 2, fallback: empty_string, run: str_merge },
    Builtin { name: "str.contains", arity: 2, fallback: no, run: str_contains },
    Builtin { name: "math.pi", arity: 0, fallback: zero_float, run: math_pi },
    Builtin { name: "math.sin", arity: 1, fallback: zero_float, run: math_sin },
    Builtin { name: "math.cos", arity: 1, fallback: zero_float, run: math_cos },
    Builtin { name: "math.tan", arity: 1, fallback: zero_float, run: math_tan },
    Builtin { name: "math.sqrt", arity: 1, fallback: zero_float, run: math_sqrt },
    Builtin { name: "math.abs", arity: 1, fallback: zero_float, run: math_abs },
    Builtin { name: "math.pow", arity: 2, fallback: zero_float, run: math_pow },
];

/// Text form used where a built-in accepts "anything printable": strings,
/// chars and numbers. Other values read as absent.
fn printable(value: &Value) -> Option<String> {
    match value {
        Value::String(_) | Value::Char(_) | Value::Int(_) | Value::Float(_) => {
            Some(value.to_string())
        }
        _ => None,
    }
}

fn print(runtime: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    let line = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    runtime.console_mut().write_line(&line);
    Ok(Value::Nil)
}

fn sleep(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    let millis = match &args[0] {
        Value::Int(ms) => (*ms).max(0) as u64,
        Value::Float(ms) if *ms > 0.0 => *ms as u64,
        _ => 0,
    };
    thread::sleep(Duration::from_millis(millis));
    Ok(Value::Nil)
}

fn range(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    let items = match &args[0] {
        Value::Int(n) if *n > 0 => (0..*n).map(Value::Int).collect(),
        _ => Vec::new(),
    };
    Ok(Value::list(items))
}

fn len(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    let count = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(list) => list.borrow().len(),
        _ => 0,
    };
    Ok(Value::Int(count as i64))
}

fn list_add(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    if let Value::List(list) = &args[0] {
        list.borrow_mut().push(args[1].clone());
    }
    Ok(Value::Nil)
}

fn io_read(_: &mut Runtime, args: &[Value], context: &CallContext) -> Result<Value, LinkError> {
    let Some(path) = args[0].as_str() else {
        return Ok(empty_string());
    };
    if !fs_ops::exists(path) {
        return Err(LinkError::exception(
            context.span.clone(),
            format!("File not found: {}", path),
        ));
    }
    fs_ops::read(path).map(Value::String).map_err(|error| {
        LinkError::exception(context.span.clone(), format!("Cannot read {}: {}", path, error))
    })
}

fn io_exists(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    Ok(Value::Bool(args[0].as_str().is_some_and(fs_ops::exists)))
}

fn write_file(runtime: &mut Runtime, args: &[Value], append: bool) -> Result<Value, LinkError> {
    let Some(path) = args[0].as_str() else {
        return Ok(Value::Nil);
    };
    let content = printable(&args[1]).unwrap_or_default();
    if let Err(error) = fs_ops::write(path, &content, append) {
        runtime.soft_error(format!("Cannot write {}: {}", path, error));
    }
    Ok(Value::Nil)
}

fn io_write(runtime: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    write_file(runtime, args, false)
}

fn io_append(runtime: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    write_file(runtime, args, true)
}

fn io_remove(runtime: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    if let Some(path) = args[0].as_str() {
        if let Err(error) = fs_ops::remove(path) {
            runtime.soft_error(format!("Cannot remove {}: {}", path, error));
        }
    }
    Ok(Value::Nil)
}

fn os_exec(runtime: &mut Runtime, args: &[Value], context: &CallContext) -> Result<Value, LinkError> {
    let Some(command) = args[0].as_str() else {
        return Ok(empty_string());
    };
    match context.site {
        CallSite::Statement => {
            if let Err(error) = process::exec(command) {
                runtime.soft_error(format!("Cannot run '{}': {}", command, error));
            }
            Ok(Value::Nil)
        }
        CallSite::Expression => match process::exec_capture(command) {
            Ok(output) => Ok(Value::String(output)),
            Err(error) => {
                runtime.soft_error(format!("Cannot run '{}': {}", command, error));
                Ok(empty_string())
            }
        },
    }
}

fn os_getenv(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    Ok(Value::String(
        args[0].as_str().map(process::getenv).unwrap_or_default(),
    ))
}

fn os_setenv(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    if let (Some(key), Some(value)) = (args[0].as_str(), printable(&args[1])) {
        process::setenv(key, &value);
    }
    Ok(Value::Nil)
}

fn str_trim(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    Ok(match &args[0] {
        Value::String(s) => Value::String(strings::trim(s)),
        other => other.clone(),
    })
}

fn str_replace(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    Ok(match (&args[0], args[1].as_str(), args[2].as_str()) {
        (Value::String(s), Some(from), Some(to)) => Value::String(strings::replace(s, from, to)),
        (other, _, _) => other.clone(),
    })
}

fn str_split(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    Ok(match (args[0].as_str(), args[1].as_str()) {
        (Some(s), Some(delimiter)) => Value::list(
            strings::split(s, delimiter)
                .into_iter()
                .map(Value::String)
                .collect(),
        ),
        _ => empty_list(),
    })
}

fn str_merge(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    let (Value::List(list), Some(delimiter)) = (&args[0], args[1].as_str()) else {
        return Ok(empty_string());
    };
    let parts: Vec<String> = list
        .borrow()
        .iter()
        .filter(|item| !matches!(item, Value::Char(_)))
        .filter_map(printable)
        .collect();
    Ok(Value::String(strings::merge(&parts, delimiter)))
}

fn str_contains(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    Ok(Value::Bool(match (args[0].as_str(), args[1].as_str()) {
        (Some(haystack), Some(needle)) => strings::contains(haystack, needle),
        _ => false,
    }))
}

fn math_pi(_: &mut Runtime, _: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    Ok(Value::Float(PI))
}

fn unary_math(args: &[Value], op: fn(f64) -> f64) -> Result<Value, LinkError> {
    Ok(Value::Float(op(args[0].as_f64())))
}

fn math_sin(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    unary_math(args, f64::sin)
}

fn math_cos(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    unary_math(args, f64::cos)
}

fn math_tan(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    unary_math(args, f64::tan)
}

fn math_sqrt(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    unary_math(args, f64::sqrt)
}

fn math_abs(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    unary_math(args, f64::abs)
}

fn math_pow(_: &mut Runtime, args: &[Value], _: &CallContext) -> Result<Value, LinkError> {
    Ok(Value::Float(args[0].as_f64().powf(args[1].as_f64())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_is_registered_once() {
        let mut seen = std::collections::HashSet::new();
        for name in names() {
            assert!(seen.insert(name), "duplicate built-in {}", name);
        }
        assert!(lookup("math.pow").is_some());
        assert!(lookup("pow").is_none());
    }

    #[test]
    fn printable_covers_text_and_numbers_only() {
        assert_eq!(printable(&Value::Int(3)).as_deref(), Some("3"));
        assert_eq!(printable(&Value::Float(2.0)).as_deref(), Some("2.0"));
        assert_eq!(printable(&Value::Bool(true)), None);
        assert_eq!(printable(&Value::Nil), None);
    }
}
