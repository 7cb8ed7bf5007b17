use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type EnvRef = Rc<RefCell<Environment>>;

/// A scope of name bindings chained to an optional parent. The global scope
/// has no parent; call scopes are parented directly to it.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    parent: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: EnvRef) -> Self {
        Self {
            values: HashMap::new(),
            parent: Some(parent),
        }
    }

    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            Some(value.clone())
        } else if let Some(ref parent) = self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    /// Update the nearest scope that already binds `name`. Returns false,
    /// creating nothing, when no scope does.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            true
        } else if let Some(ref parent) = self.parent {
            parent.borrow_mut().assign(name, value)
        } else {
            false
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::Environment;
    use crate::value::Value;

    #[test]
    fn get_walks_parent_chain() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("x", Value::Int(1));

        let child = Environment::with_parent(global.clone());
        assert_eq!(child.get("x"), Some(Value::Int(1)));
        assert_eq!(child.get("missing"), None);
    }

    #[test]
    fn define_shadows_without_touching_parent() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("x", Value::Int(1));

        let mut child = Environment::with_parent(global.clone());
        child.define("x", Value::Int(2));

        assert_eq!(child.get("x"), Some(Value::Int(2)));
        assert_eq!(global.borrow().get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn assign_updates_nearest_defining_scope() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("count", Value::Int(0));

        let mut child = Environment::with_parent(global.clone());
        assert!(child.assign("count", Value::Int(5)));
        assert!(!child.contains("count"));
        assert_eq!(global.borrow().get("count"), Some(Value::Int(5)));

        assert!(!child.assign("unknown", Value::Nil));
        assert_eq!(child.get("unknown"), None);
    }
}
