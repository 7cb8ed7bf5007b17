use crate::ast::{BinaryOp, ConditionalBranch, Expr, FuncDecl, Literal, Program, Stmt};
use crate::error::{LinkError, Span};
use crate::lexer::{Token, TokenType};
use std::rc::Rc;

/// Identifiers that introduce a built-in namespace when followed by `.`.
pub const NAMESPACES: &[&str] = &["time", "math", "io", "os", "str", "list"];

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse(&mut self) -> Result<Program, LinkError> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.statement()? {
                statements.push(stmt);
            }
        }

        Ok(Program { statements })
    }

    /// Parse one statement. Tokens that cannot start a statement are skipped
    /// and yield `None`; every call consumes at least one token.
    fn statement(&mut self) -> Result<Option<Stmt>, LinkError> {
        let token_type = self.peek().token_type;
        let stmt = match token_type {
            TokenType::App => {
                self.advance();
                self.app_statement()?
            }
            TokenType::Window => {
                self.advance();
                self.window_statement()?
            }
            TokenType::Func => {
                self.advance();
                Stmt::Function(Rc::new(self.function_declaration()?))
            }
            TokenType::Class => {
                self.advance();
                self.class_statement()?
            }
            TokenType::Connect => {
                self.advance();
                self.connect_statement()?
            }
            TokenType::Set => {
                self.advance();
                self.set_statement()?
            }
            TokenType::Return => {
                self.advance();
                self.return_statement()?
            }
            TokenType::If => {
                self.advance();
                self.if_statement()?
            }
            TokenType::While => {
                self.advance();
                self.while_statement()?
            }
            TokenType::For => {
                self.advance();
                self.for_statement()?
            }
            TokenType::Try => {
                self.advance();
                self.try_statement()?
            }
            TokenType::Import => {
                self.advance();
                self.import_statement()?
            }
            TokenType::Sh => {
                self.advance();
                self.shell_statement()?
            }
            TokenType::Clear => Stmt::Clear {
                span: self.advance().span.clone(),
            },
            TokenType::Identifier => self.identifier_statement()?,
            TokenType::This
            | TokenType::New
            | TokenType::Integer
            | TokenType::Float
            | TokenType::String
            | TokenType::Char
            | TokenType::True
            | TokenType::False
            | TokenType::LeftParen
            | TokenType::LeftBracket
            | TokenType::Minus => self.expression_statement()?,
            _ => {
                self.advance();
                return Ok(None);
            }
        };
        Ok(Some(stmt))
    }

    fn app_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let name = self
            .consume_with_help(
                TokenType::Identifier,
                "Expected app name",
                "App declarations need a name: app Main".to_string(),
            )?
            .lexeme
            .clone();
        let body = self.block("app")?;

        Ok(Stmt::App {
            name,
            body,
            span: start.to(&self.previous().span),
        })
    }

    fn window_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let name = self
            .consume_with_help(
                TokenType::Identifier,
                "Expected window name",
                "Window declarations need a name: window Settings".to_string(),
            )?
            .lexeme
            .clone();
        let body = self.block("window")?;

        Ok(Stmt::Window {
            name,
            body,
            span: start.to(&self.previous().span),
        })
    }

    fn function_declaration(&mut self) -> Result<FuncDecl, LinkError> {
        let start = self.previous().span.clone();
        let name = if self.match_types(&[TokenType::Identifier, TokenType::Init]) {
            self.previous().lexeme.clone()
        } else {
            return Err(self.error_at_current(
                "Expected function name",
                "Function declarations look like: func greet(name) { ... }",
            ));
        };

        let mut params = Vec::new();
        if self.match_types(&[TokenType::LeftParen]) {
            if !self.check(&TokenType::RightParen) {
                loop {
                    let param = self.consume_with_help(
                        TokenType::Identifier,
                        "Expected parameter name",
                        "Parameters are plain names separated by commas: func add(a, b)".to_string(),
                    )?;
                    params.push(param.lexeme.clone());
                    if !self.match_types(&[TokenType::Comma]) {
                        break;
                    }
                }
            }
            self.consume_with_help(
                TokenType::RightParen,
                "Expected ')' after parameters",
                "Close the parameter list with ')': func add(a, b)".to_string(),
            )?;
        }

        let body = self.block("function")?;

        Ok(FuncDecl {
            name,
            params,
            body,
            span: start.to(&self.previous().span),
        })
    }

    fn class_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let name = self
            .consume_with_help(
                TokenType::Identifier,
                "Expected class name",
                "Class declarations need a name: class Box { ... }".to_string(),
            )?
            .lexeme
            .clone();
        let methods = self.block_with("class", Self::method)?;

        Ok(Stmt::Class {
            name,
            methods,
            span: start.to(&self.previous().span),
        })
    }

    fn method(&mut self) -> Result<Option<Rc<FuncDecl>>, LinkError> {
        if self.match_types(&[TokenType::Func]) {
            Ok(Some(Rc::new(self.function_declaration()?)))
        } else {
            Err(self.error_at_current(
                "Expected method declaration in class body",
                "Class bodies may only contain methods: func name(args) { ... }",
            ))
        }
    }

    fn connect_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let source = self
            .consume(TokenType::Identifier, "Expected source in connect")?
            .lexeme
            .clone();
        self.consume(TokenType::Dot, "Expected '.' after connect source")?;
        let event = self
            .consume(TokenType::Identifier, "Expected event name in connect")?
            .lexeme
            .clone();
        self.consume_with_help(
            TokenType::Arrow,
            "Expected '->' in connect",
            "Connections look like: connect Main.onLoad -> greet".to_string(),
        )?;
        let target = self
            .consume(TokenType::Identifier, "Expected target function in connect")?
            .lexeme
            .clone();

        Ok(Stmt::Connect {
            source,
            event,
            target,
            span: start.to(&self.previous().span),
        })
    }

    fn set_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let target = self.postfix()?;
        let equals = self
            .consume_with_help(
                TokenType::Equal,
                "Expected '=' after assignment target",
                "Assignments look like: set x = 10".to_string(),
            )?
            .span
            .clone();
        let value = self.expression()?;
        let span = start.to(value.span());
        self.assignment(target, value, equals, span)
    }

    /// Build the statement for `target = value`. Only names and fields can
    /// be assigned to.
    fn assignment(&self, target: Expr, value: Expr, equals: Span, span: Span) -> Result<Stmt, LinkError> {
        match target {
            Expr::Variable { name, .. } => Ok(Stmt::Set { name, value, span }),
            Expr::Get { object, name, .. } => Ok(Stmt::Expression {
                expr: Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                    span: span.clone(),
                },
                span,
            }),
            _ => Err(LinkError::parse_error_with_help(
                equals,
                "Invalid assignment target".to_string(),
                "Only variables and fields can be assigned to. Examples: 'set x = 10' or 'set this.x = 10'".to_string(),
            )),
        }
    }

    fn return_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let value = if self.check_any(&[
            TokenType::Newline,
            TokenType::Dedent,
            TokenType::RightBrace,
        ]) || self.is_at_end()
        {
            None
        } else {
            Some(self.expression()?)
        };

        let span = match &value {
            Some(expr) => start.to(expr.span()),
            None => start,
        };
        Ok(Stmt::Return { value, span })
    }

    fn if_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let mut branches = Vec::new();

        let condition = self.condition("if")?;
        let body = self.block("if")?;
        branches.push(ConditionalBranch { condition, body });

        while self.match_continuation(TokenType::Elif) {
            let condition = self.condition("elif")?;
            let body = self.block("elif")?;
            branches.push(ConditionalBranch { condition, body });
        }

        let else_branch = if self.match_continuation(TokenType::Else) {
            Some(self.block("else")?)
        } else {
            None
        };

        Ok(Stmt::If {
            branches,
            else_branch,
            span: start.to(&self.previous().span),
        })
    }

    fn condition(&mut self, construct: &str) -> Result<Expr, LinkError> {
        if self.check_any(&[TokenType::Newline, TokenType::LeftBrace]) || self.is_at_end() {
            return Err(self.error_at_current(
                &format!("Expected condition after '{}'", construct),
                &format!("Write the condition before the body: {} x > 0 {{ ... }}", construct),
            ));
        }
        self.expression()
    }

    fn while_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let condition = self.condition("while")?;
        let body = self.block("while")?;

        Ok(Stmt::While {
            condition,
            body,
            span: start.to(&self.previous().span),
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let iterator = self
            .consume_with_help(
                TokenType::Identifier,
                "Expected loop variable after 'for'",
                "For loops look like: for item in range(5) { ... }".to_string(),
            )?
            .lexeme
            .clone();
        self.consume_with_help(
            TokenType::In,
            "Expected 'in' after loop variable",
            "For loops look like: for item in range(5) { ... }".to_string(),
        )?;
        let iterable = self.expression()?;
        let body = self.block("for")?;

        Ok(Stmt::For {
            iterator,
            iterable,
            body,
            span: start.to(&self.previous().span),
        })
    }

    fn try_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let body = self.block("try")?;

        if !self.match_continuation(TokenType::Catch) {
            return Err(self.error_at_current(
                "Expected 'catch' after try block",
                "Every try block needs a handler: try { ... } catch (e) { ... }",
            ));
        }

        let parenthesized = self.match_types(&[TokenType::LeftParen]);
        let error_var = self
            .consume_with_help(
                TokenType::Identifier,
                "Expected error variable after 'catch'",
                "Name the caught error: catch (e) { print(e) }".to_string(),
            )?
            .lexeme
            .clone();
        if parenthesized {
            self.consume(TokenType::RightParen, "Expected ')' after error variable")?;
        }
        let handler = self.block("catch")?;

        Ok(Stmt::Try {
            body,
            error_var,
            handler,
            span: start.to(&self.previous().span),
        })
    }

    fn import_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let path = self
            .consume_with_help(
                TokenType::String,
                "Expected file path after 'import'",
                "Imports take a quoted path: import \"lib/util.link\"".to_string(),
            )?
            .lexeme
            .clone();

        Ok(Stmt::Import {
            path,
            span: start.to(&self.previous().span),
        })
    }

    fn shell_statement(&mut self) -> Result<Stmt, LinkError> {
        let start = self.previous().span.clone();
        let command = self
            .consume_with_help(
                TokenType::String,
                "Expected command string after 'sh'",
                "Shell statements take a quoted command: sh \"ls -la\"".to_string(),
            )?
            .lexeme
            .clone();

        Ok(Stmt::Property {
            name: "sh".to_string(),
            value: command,
            span: start.to(&self.previous().span),
        })
    }

    /// Statements led by an identifier: assignment, increment, property
    /// shorthand, namespaced or plain call, or an expression statement.
    fn identifier_statement(&mut self) -> Result<Stmt, LinkError> {
        let name_token = self.peek().clone();
        let name = name_token.lexeme.clone();
        let next = self.peek_next_type();

        match next {
            TokenType::Equal => {
                self.advance();
                let equals = self.advance().span.clone();
                let value = self.expression()?;
                let span = name_token.span.to(value.span());
                let target = Expr::Variable {
                    name,
                    span: name_token.span,
                };
                self.assignment(target, value, equals, span)
            }
            TokenType::PlusPlus => {
                self.advance();
                let end = self.advance().span.clone();
                Ok(Stmt::Update {
                    name,
                    span: name_token.span.to(&end),
                })
            }
            TokenType::String => {
                self.advance();
                let value = self.advance().clone();
                Ok(Stmt::Property {
                    name,
                    value: value.lexeme,
                    span: name_token.span.to(&value.span),
                })
            }
            TokenType::Dot if NAMESPACES.contains(&name.as_str()) => {
                self.advance();
                self.advance();
                let (qualified, args, span) = self.qualified_call(&name, &name_token.span)?;
                Ok(Stmt::Call {
                    name: qualified,
                    args,
                    span,
                })
            }
            TokenType::LeftParen if name != "input" => {
                self.advance();
                self.advance();
                let args = self.arguments()?;
                let span = name_token.span.to(&self.previous().span);
                if self.check_any(&[TokenType::Dot, TokenType::LeftBracket]) {
                    return Err(self.error_at_current(
                        "Unexpected token after call statement",
                        "Only method calls can be chained; bind the result first: set r = f(x)",
                    ));
                }
                Ok(Stmt::Call { name, args, span })
            }
            TokenType::Newline | TokenType::Dedent | TokenType::RightBrace | TokenType::Eof => {
                self.advance();
                Ok(Stmt::Call {
                    name,
                    args: Vec::new(),
                    span: name_token.span,
                })
            }
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> Result<Stmt, LinkError> {
        let expr = self.expression()?;

        if self.match_types(&[TokenType::Equal]) {
            let equals = self.previous().span.clone();
            let value = self.expression()?;
            let span = expr.span().to(value.span());
            return self.assignment(expr, value, equals, span);
        }

        if self.match_types(&[TokenType::PlusPlus]) {
            let span = expr.span().to(&self.previous().span);
            return match expr {
                Expr::Variable { name, .. } => Ok(Stmt::Update { name, span }),
                _ => Err(LinkError::parse_error_with_help(
                    span,
                    "Invalid increment target".to_string(),
                    "Only variables can be incremented: count++".to_string(),
                )),
            };
        }

        let span = expr.span().clone();
        Ok(Stmt::Expression { expr, span })
    }

    // --- blocks -----------------------------------------------------------

    fn block(&mut self, construct: &str) -> Result<Vec<Stmt>, LinkError> {
        self.block_with(construct, Self::statement)
    }

    /// Parse a block body in either brace form (`{ ... }`) or indentation
    /// form (NEWLINE INDENT ... DEDENT), collecting whatever `item` yields.
    fn block_with<T>(
        &mut self,
        construct: &str,
        item: fn(&mut Self) -> Result<Option<T>, LinkError>,
    ) -> Result<Vec<T>, LinkError> {
        let mut items = Vec::new();

        if self.brace_ahead() {
            self.skip_newlines();
            self.advance();
            loop {
                self.skip_structural();
                if self.check(&TokenType::RightBrace) || self.is_at_end() {
                    break;
                }
                if let Some(parsed) = item(self)? {
                    items.push(parsed);
                }
            }
            self.consume_with_help(
                TokenType::RightBrace,
                &format!("Expected '}}' after {} body", construct),
                "Block statements must be closed with '}' after the opening '{'.".to_string(),
            )?;
            return Ok(items);
        }

        self.consume_with_help(
            TokenType::Newline,
            &format!("Expected newline or '{{' after {} header", construct),
            "Start the body on an indented line, or wrap it in braces: { ... }".to_string(),
        )?;
        self.skip_newlines();
        self.consume_with_help(
            TokenType::Indent,
            &format!("Expected indented block after {} header", construct),
            "Indent the body deeper than the line that opens it.".to_string(),
        )?;

        // Over-indented lines nest instead of closing the block early.
        let mut depth = 0usize;
        loop {
            match self.peek().token_type {
                TokenType::Newline => {
                    self.advance();
                }
                TokenType::Indent => {
                    depth += 1;
                    self.advance();
                }
                TokenType::Dedent => {
                    self.advance();
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                TokenType::Eof => break,
                _ => {
                    if let Some(parsed) = item(self)? {
                        items.push(parsed);
                    }
                }
            }
        }

        Ok(items)
    }

    /// Whether a `{` comes next, possibly after blank lines.
    fn brace_ahead(&self) -> bool {
        let mut pos = self.current;
        while self.tokens[pos].token_type == TokenType::Newline && pos + 1 < self.tokens.len() {
            pos += 1;
        }
        self.tokens[pos].token_type == TokenType::LeftBrace
    }

    /// Consume `kind` if it is the next token after any blank lines; otherwise
    /// leave the position untouched.
    fn match_continuation(&mut self, kind: TokenType) -> bool {
        let checkpoint = self.current;
        self.skip_newlines();
        if self.match_types(&[kind]) {
            true
        } else {
            self.current = checkpoint;
            false
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenType::Newline) {
            self.advance();
        }
    }

    fn skip_structural(&mut self) {
        while self.peek().token_type.is_structural() {
            self.advance();
        }
    }

    // --- expressions ------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, LinkError> {
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, LinkError> {
        let mut expr = self.term()?;

        while self.match_types(&[TokenType::Less, TokenType::Greater, TokenType::EqualEqual]) {
            let operator_token = self.previous().clone();
            let operator = match operator_token.token_type {
                TokenType::Less => BinaryOp::Less,
                TokenType::Greater => BinaryOp::Greater,
                TokenType::EqualEqual => BinaryOp::Equal,
                _ => unreachable!(),
            };

            let right = self.term().map_err(|_| {
                LinkError::parse_error_with_help(
                    operator_token.span.clone(),
                    format!("Expected expression after '{}'", operator_token.lexeme),
                    "Comparison operators like '<', '>' and '==' require expressions on both sides.".to_string(),
                )
            })?;
            let span = expr.span().to(right.span());

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, LinkError> {
        let mut expr = self.factor()?;

        while self.match_types(&[TokenType::Minus, TokenType::Plus]) {
            let operator_token = self.previous().clone();
            let operator = match operator_token.token_type {
                TokenType::Minus => BinaryOp::Subtract,
                TokenType::Plus => BinaryOp::Add,
                _ => unreachable!(),
            };

            let right = self.factor().map_err(|_| {
                LinkError::parse_error_with_help(
                    operator_token.span.clone(),
                    format!("Expected expression after '{}'", operator_token.lexeme),
                    "Arithmetic operators like '+' and '-' require expressions on both sides.".to_string(),
                )
            })?;
            let span = expr.span().to(right.span());

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, LinkError> {
        let mut expr = self.unary()?;

        while self.match_types(&[TokenType::Slash, TokenType::Star]) {
            let operator_token = self.previous().clone();
            let operator = match operator_token.token_type {
                TokenType::Slash => BinaryOp::Divide,
                TokenType::Star => BinaryOp::Multiply,
                _ => unreachable!(),
            };

            let right = self.unary().map_err(|_| {
                LinkError::parse_error_with_help(
                    operator_token.span.clone(),
                    format!("Expected expression after '{}'", operator_token.lexeme),
                    "Multiplication and division operators require expressions on both sides.".to_string(),
                )
            })?;
            let span = expr.span().to(right.span());

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, LinkError> {
        if self.match_types(&[TokenType::Minus]) {
            let start = self.previous().span.clone();
            let operand = self.unary()?;
            let span = start.to(operand.span());

            return Ok(Expr::Negate {
                operand: Box::new(operand),
                span,
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, LinkError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_types(&[TokenType::LeftBracket]) {
                let index = self.expression()?;
                let end = self
                    .consume_with_help(
                        TokenType::RightBracket,
                        "Expected ']' after index",
                        "Index expressions look like: items[0]".to_string(),
                    )?
                    .span
                    .clone();
                let span = expr.span().to(&end);
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span,
                };
            } else if self.match_types(&[TokenType::Dot]) {
                if !self.match_types(&[TokenType::Identifier, TokenType::Init]) {
                    return Err(self.error_at_current(
                        "Expected property name after '.'",
                        "Field and method access look like: obj.name or obj.method()",
                    ));
                }
                let property = self.previous().clone();
                let span = expr.span().to(&property.span);
                expr = Expr::Get {
                    object: Box::new(expr),
                    name: property.lexeme,
                    span,
                };
            } else if self.match_types(&[TokenType::LeftParen]) {
                let paren = self.previous().span.clone();
                let args = self.arguments()?;
                let span = expr.span().to(&self.previous().span);
                expr = match expr {
                    Expr::Get { object, name, .. } => Expr::MethodCall {
                        object,
                        method: name,
                        args,
                        span,
                    },
                    Expr::Variable { name, .. } => Expr::Call { name, args, span },
                    _ => {
                        return Err(LinkError::parse_error_with_help(
                            paren,
                            "Invalid call target".to_string(),
                            "Only named functions and methods can be called: f(x) or obj.method(x)".to_string(),
                        ))
                    }
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parse call arguments after the opening '('.
    fn arguments(&mut self) -> Result<Vec<Expr>, LinkError> {
        let mut args = Vec::new();

        if !self.check(&TokenType::RightParen) {
            loop {
                if self.is_at_end() {
                    return Err(LinkError::parse_error_with_help(
                        self.peek().span.clone(),
                        "Unexpected end of input in function call".to_string(),
                        "Function calls must be closed with ')' after the arguments. Example: func(arg1, arg2)".to_string(),
                    ));
                }

                args.push(self.expression().map_err(|_| {
                    LinkError::parse_error_with_help(
                        self.peek().span.clone(),
                        "Invalid expression in function call arguments".to_string(),
                        "Function arguments must be valid expressions separated by commas. Example: func(arg1, arg2)".to_string(),
                    )
                })?);

                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume_with_help(
            TokenType::RightParen,
            "Expected ')' after arguments",
            "Function calls must be closed with ')' after the arguments. Example: func(arg1, arg2)".to_string(),
        )?;
        Ok(args)
    }

    /// `ns.member(args)` or bare `ns.member`, with `ns` and '.' consumed.
    fn qualified_call(&mut self, namespace: &str, start: &Span) -> Result<(String, Vec<Expr>, Span), LinkError> {
        let member = self
            .consume_with_help(
                TokenType::Identifier,
                &format!("Expected member name after '{}.'", namespace),
                format!("Built-ins are called by qualified name, e.g. {}.name(args)", namespace),
            )?
            .lexeme
            .clone();
        let args = if self.match_types(&[TokenType::LeftParen]) {
            self.arguments()?
        } else {
            Vec::new()
        };
        let span = start.to(&self.previous().span);
        Ok((format!("{}.{}", namespace, member), args, span))
    }

    fn primary(&mut self) -> Result<Expr, LinkError> {
        if self.is_at_end() {
            return Err(LinkError::parse_error_with_help(
                self.peek().span.clone(),
                "Unexpected end of input".to_string(),
                "Expected an expression here. Check for unmatched parentheses, brackets, or incomplete statements.".to_string(),
            ));
        }

        let token = self.advance().clone();

        match token.token_type {
            TokenType::False => Ok(Expr::Literal {
                value: Literal::Bool(false),
                span: token.span,
            }),
            TokenType::True => Ok(Expr::Literal {
                value: Literal::Bool(true),
                span: token.span,
            }),
            TokenType::Integer => {
                let value = token.lexeme.parse::<i64>().map_err(|_| {
                    LinkError::parse_error(token.span.clone(), "Invalid integer".to_string())
                })?;
                Ok(Expr::Literal {
                    value: Literal::Int(value),
                    span: token.span,
                })
            }
            TokenType::Float => {
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    LinkError::parse_error(token.span.clone(), "Invalid float".to_string())
                })?;
                Ok(Expr::Literal {
                    value: Literal::Float(value),
                    span: token.span,
                })
            }
            TokenType::String => Ok(Expr::Literal {
                value: Literal::Str(token.lexeme),
                span: token.span,
            }),
            TokenType::Char => {
                let c = token.lexeme.chars().next().unwrap_or('\0');
                Ok(Expr::Literal {
                    value: Literal::Char(c),
                    span: token.span,
                })
            }
            TokenType::This => Ok(Expr::This { span: token.span }),
            TokenType::New => self.new_instance(token.span),
            TokenType::Identifier => self.identifier_expression(token),
            TokenType::LeftParen => {
                let start_span = token.span.clone();

                if self.check(&TokenType::RightParen) {
                    return Err(LinkError::parse_error_with_help(
                        Span::new(start_span.start, self.peek().span.end),
                        "Empty parentheses are not allowed".to_string(),
                        "Parentheses must contain an expression. Example: (x + 1)".to_string(),
                    ));
                }

                let expr = self.expression()?;
                self.consume_with_help(
                    TokenType::RightParen,
                    "Expected ')' after expression",
                    "Every opening parenthesis '(' must have a matching closing parenthesis ')'.".to_string(),
                )?;
                Ok(expr)
            }
            TokenType::LeftBracket => self.array_literal(token.span),
            TokenType::LeftBrace => self.dict_literal(token.span),
            _ => {
                let help_msg = match token.token_type {
                    TokenType::RightParen => "Found ')' without matching '('. Check for unbalanced parentheses.",
                    TokenType::RightBrace => "Found '}' without matching '{'. Check for unbalanced braces.",
                    TokenType::RightBracket => "Found ']' without matching '['. Check for unbalanced brackets.",
                    TokenType::Newline | TokenType::Dedent => "The line ended while an expression was still expected.",
                    _ => "Expected a literal value, variable, or parenthesized expression here.",
                };

                Err(LinkError::parse_error_with_help(
                    token.span.clone(),
                    format!("Expected expression, found {}", describe(&token)),
                    help_msg.to_string(),
                ))
            }
        }
    }

    /// Identifier in expression position: `input(...)`, a namespaced
    /// built-in, or a plain variable (calls are attached in `postfix`).
    fn identifier_expression(&mut self, token: Token) -> Result<Expr, LinkError> {
        if token.lexeme == "input" && self.check(&TokenType::LeftParen) {
            self.advance();
            let prompt = if self.match_types(&[TokenType::String]) {
                Some(self.previous().lexeme.clone())
            } else {
                None
            };
            self.consume_with_help(
                TokenType::RightParen,
                "Expected ')' after input prompt",
                "input takes an optional quoted prompt: input(\"Name: \")".to_string(),
            )?;
            return Ok(Expr::Input {
                prompt,
                span: token.span.to(&self.previous().span),
            });
        }

        if NAMESPACES.contains(&token.lexeme.as_str()) && self.check(&TokenType::Dot) {
            self.advance();
            let (name, args, span) = self.qualified_call(&token.lexeme, &token.span)?;
            return Ok(Expr::Call { name, args, span });
        }

        Ok(Expr::Variable {
            name: token.lexeme,
            span: token.span,
        })
    }

    fn new_instance(&mut self, start: Span) -> Result<Expr, LinkError> {
        let class_name = self
            .consume_with_help(
                TokenType::Identifier,
                "Expected class name after 'new'",
                "Instances are created with: new ClassName(args)".to_string(),
            )?
            .lexeme
            .clone();
        let args = if self.match_types(&[TokenType::LeftParen]) {
            self.arguments()?
        } else {
            Vec::new()
        };

        Ok(Expr::New {
            class_name,
            args,
            span: start.to(&self.previous().span),
        })
    }

    fn array_literal(&mut self, start_span: Span) -> Result<Expr, LinkError> {
        let mut elements = Vec::new();

        if !self.check(&TokenType::RightBracket) {
            loop {
                elements.push(self.expression()?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let end_token = self.consume_with_help(
            TokenType::RightBracket,
            "Expected ']' after list elements",
            "List literals must be closed with ']' after the opening '['. Example: [1, 2, 3]".to_string(),
        )?;
        Ok(Expr::Array {
            elements,
            span: Span::new(start_span.start, end_token.span.end),
        })
    }

    fn dict_literal(&mut self, start_span: Span) -> Result<Expr, LinkError> {
        let mut pairs = Vec::new();

        self.skip_structural();
        if !self.check(&TokenType::RightBrace) {
            loop {
                self.skip_structural();
                let key = self.consume_with_help(
                    TokenType::String,
                    "Dictionary keys must be string literals",
                    "Quote each key: {\"name\": \"value\"}".to_string(),
                )?;
                let key = key.lexeme.clone();
                self.consume_with_help(
                    TokenType::Colon,
                    "Expected ':' after dictionary key",
                    "Dictionary entries require a colon ':' between key and value. Example: {\"key\": \"value\"}".to_string(),
                )?;
                let value = self.expression()?;
                pairs.push((key, value));

                self.skip_structural();
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.skip_structural();

        let end_token = self.consume_with_help(
            TokenType::RightBrace,
            "Expected '}' after dictionary pairs",
            "Dictionary literals must be closed with '}' after the opening '{'. Example: {\"key\": \"value\"}".to_string(),
        )?;
        Ok(Expr::Dict {
            pairs,
            span: Span::new(start_span.start, end_token.span.end),
        })
    }

    // --- token helpers ----------------------------------------------------

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            false
        } else {
            &self.peek().token_type == token_type
        }
    }

    fn check_any(&self, types: &[TokenType]) -> bool {
        types.iter().any(|token_type| self.check(token_type))
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_next_type(&self) -> TokenType {
        self.tokens
            .get(self.current + 1)
            .map(|token| token.token_type)
            .unwrap_or(TokenType::Eof)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn error_span(&self) -> Span {
        if self.is_at_end() && self.current > 0 {
            // Point just past the last real token rather than at EOF.
            Span::single(self.tokens[self.current - 1].span.end)
        } else {
            self.peek().span.clone()
        }
    }

    fn error_at_current(&self, message: &str, help: &str) -> LinkError {
        LinkError::parse_error_with_help(self.error_span(), message.to_string(), help.to_string())
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<&Token, LinkError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(LinkError::parse_error(self.error_span(), message.to_string()))
        }
    }

    fn consume_with_help(&mut self, token_type: TokenType, message: &str, help: String) -> Result<&Token, LinkError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(LinkError::parse_error_with_help(
                self.error_span(),
                message.to_string(),
                help,
            ))
        }
    }
}

fn describe(token: &Token) -> String {
    match token.token_type {
        TokenType::Newline => "end of line".to_string(),
        TokenType::Indent => "indentation".to_string(),
        TokenType::Dedent => "end of block".to_string(),
        TokenType::Eof => "end of input".to_string(),
        TokenType::String => format!("\"{}\"", token.lexeme),
        _ => format!("'{}'", token.lexeme),
    }
}

/// Lex and parse `source` in one step.
pub fn parse_source(source: &str) -> Result<Program, LinkError> {
    let tokens = crate::lexer::Lexer::new(source).scan_tokens()?;
    Parser::new(tokens).parse()
}
