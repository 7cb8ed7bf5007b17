use crate::ast::{BinaryOp, Expr, FuncDecl, Program, Stmt};
use crate::builtins::{self, CallContext, CallSite};
use crate::environment::{EnvRef, Environment};
use crate::error::{LinkError, Span};
use crate::parser::parse_source;
use crate::stdlib::{fs_ops, process};
use crate::value::{Class, Value};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Nested user calls allowed before the runtime gives up.
const MAX_CALL_DEPTH: usize = 256;

/// Stack that must remain before a call body runs; below this the stack grows.
const RED_ZONE: usize = 256 * 1024;

/// Size of each additional stack segment.
const STACK_GROWTH: usize = 1024 * 1024;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// How a statement finished when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// Where script output goes and where `input()` reads from.
pub struct Console {
    output: Box<dyn Write>,
    input: Box<dyn BufRead>,
}

impl Console {
    pub fn new(output: impl Write + 'static, input: impl BufRead + 'static) -> Self {
        Self {
            output: Box::new(output),
            input: Box::new(input),
        }
    }

    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stdin().lock())
    }

    /// Write `text` and flush. A failed write is logged and otherwise
    /// ignored; a closed stdout does not stop the script.
    pub fn write(&mut self, text: &str) {
        let result = self
            .output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush());
        if let Err(error) = result {
            warn!(%error, "console write failed");
        }
    }

    pub fn write_line(&mut self, text: &str) {
        self.write(&format!("{}\n", text));
    }

    /// Next line without its terminator, or `None` at end of input.
    pub fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub source: String,
    pub event: String,
    pub target: String,
}

/// Executes programs against one persistent global scope.
pub struct Runtime {
    globals: EnvRef,
    environment: EnvRef,
    functions: HashMap<String, Rc<FuncDecl>>,
    /// Every program run so far, top-level or imported. Never shrinks.
    loaded_programs: Vec<Rc<Program>>,
    connections: Vec<Connection>,
    properties: HashMap<String, String>,
    console: Console,
    depth: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_console(Console::stdio())
    }

    pub fn with_console(console: Console) -> Self {
        let globals = Environment::new().into_ref();
        Self {
            environment: globals.clone(),
            globals,
            functions: HashMap::new(),
            loaded_programs: Vec::new(),
            connections: Vec::new(),
            properties: HashMap::new(),
            console,
            depth: 0,
        }
    }

    /// Retain `program` and run its statements in order. A top-level
    /// `return` ends the program quietly.
    pub fn execute(&mut self, program: Program) -> Result<(), LinkError> {
        let program = Rc::new(program);
        self.loaded_programs.push(program.clone());
        debug!(
            statements = program.statements.len(),
            retained = self.loaded_programs.len(),
            "executing program"
        );

        self.execute_block(&program.statements)?;
        Ok(())
    }

    /// Lex, parse and execute `source` as one unit.
    pub fn run_source(&mut self, source: &str) -> Result<(), LinkError> {
        let program = parse_source(source)?;
        self.execute(program)
    }

    /// Call every function connected to `source.event`, in the order the
    /// connections were declared.
    pub fn emit(&mut self, source: &str, event: &str) -> Result<(), LinkError> {
        let targets: Vec<String> = self
            .connections
            .iter()
            .filter(|c| c.source == source && c.event == event)
            .map(|c| c.target.clone())
            .collect();

        debug!(source, event, handlers = targets.len(), "emitting event");
        for target in targets {
            self.call(&target, &[], &Span::new(0, 0), CallSite::Statement)?;
        }
        Ok(())
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn loaded_programs(&self) -> usize {
        self.loaded_programs.len()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn console_mut(&mut self) -> &mut Console {
        &mut self.console
    }

    /// Report a non-fatal problem and let the script carry on.
    pub(crate) fn soft_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "soft runtime error");
        self.console.write_line(&format!("Runtime Error: {}", message));
    }

    fn with_environment<T>(&mut self, env: EnvRef, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = f(self);
        self.environment = previous;
        result
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<Flow, LinkError> {
        for statement in statements {
            if let Flow::Return(value) = self.execute_statement(statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<Flow, LinkError> {
        match stmt {
            Stmt::App { name, body, .. } | Stmt::Window { name, body, .. } => {
                debug!(name = %name, "entering block");
                self.execute_block(body)
            }
            Stmt::Function(decl) => {
                debug!(name = %decl.name, params = decl.params.len(), "registering function");
                self.functions.insert(decl.name.clone(), decl.clone());
                Ok(Flow::Normal)
            }
            Stmt::Class { name, methods, .. } => {
                let methods = methods
                    .iter()
                    .map(|method| (method.name.clone(), method.clone()))
                    .collect();
                let class = Class {
                    name: name.clone(),
                    methods,
                };
                debug!(name = %name, methods = class.methods.len(), "declaring class");
                self.environment
                    .borrow_mut()
                    .define(name, Value::Class(Rc::new(class)));
                Ok(Flow::Normal)
            }
            Stmt::Property { name, value, .. } => {
                if name == "sh" {
                    if let Err(error) = process::exec(value) {
                        self.soft_error(format!("Cannot run '{}': {}", value, error));
                    }
                } else {
                    self.properties.insert(name.clone(), value.clone());
                }
                Ok(Flow::Normal)
            }
            Stmt::Call { name, args, span } => {
                self.call(name, args, span, CallSite::Statement)?;
                Ok(Flow::Normal)
            }
            Stmt::Connect {
                source,
                event,
                target,
                ..
            } => {
                self.connections.push(Connection {
                    source: source.clone(),
                    event: event.clone(),
                    target: target.clone(),
                });
                Ok(Flow::Normal)
            }
            Stmt::Set { name, value, .. } => {
                let value = self.evaluate_expression(value)?;
                self.environment.borrow_mut().define(name, value);
                Ok(Flow::Normal)
            }
            Stmt::Update { name, span } => {
                let current = self.lookup(name, span)?;
                if let Value::Int(n) = current {
                    self.environment
                        .borrow_mut()
                        .assign(name, Value::Int(n.wrapping_add(1)));
                }
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let result = match value {
                    Some(expr) => self.evaluate_expression(expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(result))
            }
            Stmt::If {
                branches,
                else_branch,
                ..
            } => {
                for branch in branches {
                    if self.evaluate_expression(&branch.condition)?.is_truthy() {
                        return self.execute_block(&branch.body);
                    }
                }
                match else_branch {
                    Some(body) => self.execute_block(body),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::While { condition, body, .. } => {
                while self.evaluate_expression(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                iterator,
                iterable,
                body,
                ..
            } => {
                let items = match self.evaluate_expression(iterable)? {
                    // Iterate a snapshot so the body may grow the list.
                    Value::List(list) => list.borrow().clone(),
                    other => {
                        self.soft_error(format!(
                            "'for' loop expects a list, got {}",
                            other.type_name()
                        ));
                        return Ok(Flow::Normal);
                    }
                };

                for item in items {
                    self.environment.borrow_mut().define(iterator, item);
                    if let Flow::Return(value) = self.execute_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Try {
                body,
                error_var,
                handler,
                ..
            } => match self.execute_block(body) {
                Err(error) if error.is_catchable() => {
                    debug!(message = %error.message, "caught exception");
                    let mut scope = Environment::with_parent(self.environment.clone());
                    scope.define(error_var, Value::String(error.message));
                    self.with_environment(scope.into_ref(), |runtime| {
                        runtime.execute_block(handler)
                    })
                }
                other => other,
            },
            Stmt::Import { path, .. } => {
                self.import(path)?;
                Ok(Flow::Normal)
            }
            Stmt::Clear { .. } => {
                self.console.write(CLEAR_SCREEN);
                Ok(Flow::Normal)
            }
            Stmt::Expression { expr, .. } => {
                self.evaluate_expression(expr)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Load, retain and run another script file. No caching: importing the
    /// same path twice runs it twice.
    fn import(&mut self, path: &str) -> Result<(), LinkError> {
        if !fs_ops::exists(path) {
            self.soft_error(format!("Cannot import '{}'. File not found.", path));
            return Ok(());
        }
        let source = match fs_ops::read(path) {
            Ok(source) => source,
            Err(error) => {
                self.soft_error(format!("Cannot import '{}': {}", path, error));
                return Ok(());
            }
        };

        debug!(path, "importing");
        let program = parse_source(&source).map_err(|error| error.in_file(path, &source))?;
        self.execute(program)
            .map_err(|error| error.in_file(path, &source))
    }

    fn lookup(&self, name: &str, span: &Span) -> Result<Value, LinkError> {
        self.environment.borrow().get(name).ok_or_else(|| {
            LinkError::runtime_error_with_help(
                span.clone(),
                format!("Undefined variable '{}'", name),
                "Functions see only globals, their parameters and their own locals.".to_string(),
            )
        })
    }

    /// Dispatch a call by name: built-ins first, then user functions.
    fn call(&mut self, name: &str, args: &[Expr], span: &Span, site: CallSite) -> Result<Value, LinkError> {
        if let Some(builtin) = builtins::lookup(name) {
            let values = self.evaluate_arguments(args)?;
            trace!(name, args = values.len(), "calling built-in");
            let context = CallContext { site, span };
            return builtins::invoke(self, builtin, values, &context);
        }

        match self.functions.get(name).cloned() {
            Some(decl) => self.invoke(&decl, None, args, span),
            None => {
                self.soft_error(format!("Undefined function '{}'", name));
                Ok(Value::Nil)
            }
        }
    }

    fn evaluate_arguments(&mut self, args: &[Expr]) -> Result<Vec<Value>, LinkError> {
        args.iter().map(|arg| self.evaluate_expression(arg)).collect()
    }

    /// Call a user function or method. Arity is checked before any argument
    /// is evaluated; a mismatch is reported and the call yields nil.
    fn invoke(
        &mut self,
        decl: &Rc<FuncDecl>,
        this: Option<Value>,
        args: &[Expr],
        span: &Span,
    ) -> Result<Value, LinkError> {
        if args.len() != decl.params.len() {
            self.soft_error(format!(
                "Function {} expects {} argument(s), got {}",
                decl.name,
                decl.params.len(),
                args.len()
            ));
            return Ok(Value::Nil);
        }

        let values = self.evaluate_arguments(args)?;
        self.invoke_with_values(decl, this, values, span)
    }

    fn invoke_with_values(
        &mut self,
        decl: &Rc<FuncDecl>,
        this: Option<Value>,
        values: Vec<Value>,
        span: &Span,
    ) -> Result<Value, LinkError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(LinkError::runtime_error(
                span.clone(),
                format!("Maximum call depth exceeded in '{}'", decl.name),
            ));
        }

        // Calls see the global scope, never the caller's locals.
        let mut scope = Environment::with_parent(self.globals.clone());
        if let Some(this) = this {
            scope.define("this", this);
        }
        for (param, value) in decl.params.iter().zip(values) {
            scope.define(param, value);
        }

        trace!(name = %decl.name, depth = self.depth, "calling function");
        self.depth += 1;
        let flow = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || {
            self.with_environment(scope.into_ref(), |runtime| runtime.execute_block(&decl.body))
        });
        self.depth -= 1;

        Ok(match flow? {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        })
    }

    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value, LinkError> {
        match expr {
            Expr::Literal { value, .. } => Ok(Value::from(value)),
            Expr::Variable { name, span } => self.lookup(name, span),
            Expr::Array { elements, .. } => {
                let items = self.evaluate_arguments(elements)?;
                Ok(Value::list(items))
            }
            Expr::Dict { pairs, .. } => {
                let mut entries = BTreeMap::new();
                for (key, value_expr) in pairs {
                    let value = self.evaluate_expression(value_expr)?;
                    entries.insert(key.clone(), value);
                }
                Ok(Value::dict(entries))
            }
            Expr::Index { object, index, .. } => {
                let object = self.evaluate_expression(object)?;
                let index = self.evaluate_expression(index)?;
                Ok(self.index(&object, &index))
            }
            Expr::Get { object, name, .. } => match self.evaluate_expression(object)? {
                Value::Instance(instance) => {
                    let field = instance.borrow().fields.get(name).cloned();
                    Ok(field.unwrap_or_default())
                }
                other => {
                    self.soft_error(format!(
                        "Only instances have fields (tried '{}' on {})",
                        name,
                        other.type_name()
                    ));
                    Ok(Value::Nil)
                }
            },
            Expr::Set {
                object,
                name,
                value,
                ..
            } => match self.evaluate_expression(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate_expression(value)?;
                    instance
                        .borrow_mut()
                        .fields
                        .insert(name.clone(), value.clone());
                    Ok(value)
                }
                other => {
                    self.soft_error(format!(
                        "Only instances have fields (tried to set '{}' on {})",
                        name,
                        other.type_name()
                    ));
                    Ok(Value::Nil)
                }
            },
            Expr::MethodCall {
                object,
                method,
                args,
                span,
            } => {
                let receiver = self.evaluate_expression(object)?;
                let instance = match &receiver {
                    Value::Instance(instance) => instance.clone(),
                    other => {
                        self.soft_error(format!(
                            "Method call '{}' on non-instance {}",
                            method,
                            other.type_name()
                        ));
                        return Ok(Value::Nil);
                    }
                };

                let class = instance.borrow().class.clone();
                match class.find_method(method) {
                    Some(decl) => self.invoke(&decl, Some(receiver), args, span),
                    None => {
                        self.soft_error(format!(
                            "Method '{}' not found on {}",
                            method, class.name
                        ));
                        Ok(Value::Nil)
                    }
                }
            }
            Expr::Call { name, args, span } => self.call(name, args, span, CallSite::Expression),
            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => {
                let left = self.evaluate_expression(left)?;
                let right = self.evaluate_expression(right)?;
                Ok(binary_op(*operator, left, right))
            }
            Expr::Negate { operand, .. } => Ok(match self.evaluate_expression(operand)? {
                Value::Int(n) => Value::Int(n.wrapping_neg()),
                Value::Float(n) => Value::Float(-n),
                _ => Value::Nil,
            }),
            Expr::This { span } => self.environment.borrow().get("this").ok_or_else(|| {
                LinkError::runtime_error(span.clone(), "'this' used outside of a method".to_string())
            }),
            Expr::New {
                class_name,
                args,
                span,
            } => self.instantiate(class_name, args, span),
            Expr::Input { prompt, .. } => {
                if let Some(prompt) = prompt {
                    self.console.write(prompt);
                }
                Ok(match self.console.read_line() {
                    Some(line) => parse_input(line),
                    None => Value::Nil,
                })
            }
        }
    }

    /// `new Class(args)`: allocate, run `init` with `this` bound if the class
    /// has one, and hand back the instance either way.
    fn instantiate(&mut self, class_name: &str, args: &[Expr], span: &Span) -> Result<Value, LinkError> {
        let class = match self.environment.borrow().get(class_name) {
            Some(Value::Class(class)) => Some(class),
            _ => None,
        };
        let Some(class) = class else {
            self.soft_error(format!("'{}' is not a class", class_name));
            return Ok(Value::Nil);
        };

        let instance = Value::instance(class.clone());
        if let Some(init) = class.find_method("init") {
            self.invoke(&init, Some(instance.clone()), args, span)?;
        }
        Ok(instance)
    }

    fn index(&mut self, object: &Value, index: &Value) -> Value {
        match (object, index) {
            (Value::List(list), Value::Int(i)) => {
                let list = list.borrow();
                let len = list.len() as i64;
                let position = if *i < 0 { i + len } else { *i };
                if (0..len).contains(&position) {
                    list[position as usize].clone()
                } else {
                    drop(list);
                    self.soft_error(format!("Index {} out of bounds (length {})", i, len));
                    Value::Nil
                }
            }
            (Value::Dict(dict), Value::String(key)) => {
                dict.borrow().get(key).cloned().unwrap_or_default()
            }
            _ => Value::Nil,
        }
    }
}

/// Operator table: string `+` concatenates, int with int stays integral,
/// mixed numbers go through f64, strings compare with `==`. Everything else
/// (and division by zero's error case) is defined rather than raised.
pub fn binary_op(operator: BinaryOp, left: Value, right: Value) -> Value {
    if let (BinaryOp::Add, Value::String(l)) = (operator, &left) {
        let mut text = l.clone();
        match &right {
            Value::String(_) | Value::Char(_) | Value::Int(_) | Value::Float(_) => {
                text.push_str(&right.to_string())
            }
            _ => {}
        }
        return Value::String(text);
    }

    match (left, right) {
        (Value::Int(l), Value::Int(r)) => match operator {
            BinaryOp::Add => Value::Int(l.wrapping_add(r)),
            BinaryOp::Subtract => Value::Int(l.wrapping_sub(r)),
            BinaryOp::Multiply => Value::Int(l.wrapping_mul(r)),
            BinaryOp::Divide => Value::Int(if r == 0 { 0 } else { l.wrapping_div(r) }),
            BinaryOp::Less => Value::Bool(l < r),
            BinaryOp::Greater => Value::Bool(l > r),
            BinaryOp::Equal => Value::Bool(l == r),
        },
        (l @ (Value::Int(_) | Value::Float(_)), r @ (Value::Int(_) | Value::Float(_))) => {
            let (l, r) = (l.as_f64(), r.as_f64());
            match operator {
                BinaryOp::Add => Value::Float(l + r),
                BinaryOp::Subtract => Value::Float(l - r),
                BinaryOp::Multiply => Value::Float(l * r),
                BinaryOp::Divide => Value::Float(if r == 0.0 { 0.0 } else { l / r }),
                BinaryOp::Less => Value::Bool(l < r),
                BinaryOp::Greater => Value::Bool(l > r),
                BinaryOp::Equal => Value::Bool(l == r),
            }
        }
        (Value::String(l), Value::String(r)) if operator == BinaryOp::Equal => Value::Bool(l == r),
        _ => Value::Nil,
    }
}

/// Typed reading of an `input()` line: float if it has a '.', then int,
/// otherwise the raw text.
fn parse_input(line: String) -> Value {
    let trimmed = line.trim();
    if trimmed.contains('.') {
        if let Ok(n) = trimmed.parse::<f64>() {
            return Value::Float(n);
        }
    } else if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Int(n);
    }
    Value::String(line)
}
