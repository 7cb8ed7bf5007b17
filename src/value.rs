use crate::ast::{FuncDecl, Literal};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

pub type List = Rc<RefCell<Vec<Value>>>;
pub type Dict = Rc<RefCell<BTreeMap<String, Value>>>;

/// Script-visible data. Lists, dicts and instances are shared: cloning a
/// `Value` aliases the container, so mutation through one reference is seen
/// through every other. Reference cycles between containers are allowed and
/// live until the runtime is dropped.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
    List(List),
    Dict(Dict),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
}

/// A declared class. The method table is fixed once declared.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub methods: HashMap<String, Rc<FuncDecl>>,
}

impl Class {
    pub fn find_method(&self, name: &str) -> Option<Rc<FuncDecl>> {
        self.methods.get(name).cloned()
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: HashMap<String, Value>,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: BTreeMap<String, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn instance(class: Rc<Class>) -> Self {
        Value::Instance(Rc::new(RefCell::new(Instance {
            class,
            fields: HashMap::new(),
        })))
    }

    /// Strings, dicts, classes and instances are never truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::List(l) => !l.borrow().is_empty(),
            _ => false,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Char(_) => "char",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by the math built-ins; non-numbers read as 0.0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Int(n) => *n as f64,
            Value::Float(n) => *n,
            _ => 0.0,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Int(n) => Value::Int(*n),
            Literal::Float(n) => Value::Float(*n),
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Char(c) => Value::Char(*c),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }
}

impl PartialEq for Value {
    /// Structural for scalars, identity for shared containers.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Int(l), Value::Int(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Char(l), Value::Char(r)) => l == r,
            (Value::List(l), Value::List(r)) => Rc::ptr_eq(l, r),
            (Value::Dict(l), Value::Dict(r)) => Rc::ptr_eq(l, r),
            (Value::Class(l), Value::Class(r)) => Rc::ptr_eq(l, r),
            (Value::Instance(l), Value::Instance(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_value(self, f, &mut Vec::new())
    }
}

/// Containers currently being written, outermost first. A container met again
/// while it is still open is shown as `[...]` or `{...}`.
fn write_value(value: &Value, f: &mut fmt::Formatter, open: &mut Vec<*const ()>) -> fmt::Result {
    match value {
        Value::Nil => write!(f, "nil"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Int(n) => write!(f, "{}", n),
        Value::Float(n) => {
            // Always show at least one decimal place for floats
            if n.fract() == 0.0 && n.is_finite() {
                write!(f, "{:.1}", n)
            } else {
                write!(f, "{}", n)
            }
        }
        Value::String(s) => write!(f, "{}", s),
        Value::Char(c) => write!(f, "{}", c),
        Value::List(l) => {
            let id = Rc::as_ptr(l) as *const ();
            if open.contains(&id) {
                return write!(f, "[...]");
            }
            open.push(id);
            write!(f, "[")?;
            for (i, item) in l.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(item, f, open)?;
            }
            open.pop();
            write!(f, "]")
        }
        Value::Dict(d) => {
            let id = Rc::as_ptr(d) as *const ();
            if open.contains(&id) {
                return write!(f, "{{...}}");
            }
            open.push(id);
            write!(f, "{{")?;
            for (i, (key, value)) in d.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "\"{}\": ", key)?;
                write_value(value, f, open)?;
            }
            open.pop();
            write!(f, "}}")
        }
        Value::Class(class) => write!(f, "<class {}>", class.name),
        Value::Instance(instance) => write!(f, "<{} instance>", instance.borrow().class.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_children_are_not_mistaken_for_cycles() {
        let inner = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![inner.clone(), inner]);
        assert_eq!(outer.to_string(), "[[1], [1]]");
    }

    #[test]
    fn self_referencing_dict_is_elided() {
        let dict = Value::dict(BTreeMap::new());
        if let Value::Dict(entries) = &dict {
            entries.borrow_mut().insert("me".to_string(), dict.clone());
        }
        assert_eq!(dict.to_string(), "{\"me\": {...}}");
    }
}
