//! Indented tree dump of a parsed program, shown by `link --debug`.

use crate::ast::{Expr, Literal, Program, Stmt};
use std::fmt::{self, Write};

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write_stmt(f, stmt, 0)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_expr(self))
    }
}

fn write_body(f: &mut impl Write, body: &[Stmt], indent: usize) -> fmt::Result {
    for stmt in body {
        write_stmt(f, stmt, indent)?;
    }
    Ok(())
}

fn write_stmt(f: &mut impl Write, stmt: &Stmt, indent: usize) -> fmt::Result {
    let pad = " ".repeat(indent);
    match stmt {
        Stmt::App { name, body, .. } => {
            writeln!(f, "{}App: {}", pad, name)?;
            write_body(f, body, indent + 2)
        }
        Stmt::Window { name, body, .. } => {
            writeln!(f, "{}Window: {}", pad, name)?;
            write_body(f, body, indent + 2)
        }
        Stmt::Function(decl) => {
            writeln!(f, "{}Func: {}({})", pad, decl.name, decl.params.join(", "))?;
            write_body(f, &decl.body, indent + 2)
        }
        Stmt::Class { name, methods, .. } => {
            writeln!(f, "{}Class: {}", pad, name)?;
            for method in methods {
                writeln!(f, "{}  Method: {}({})", pad, method.name, method.params.join(", "))?;
                write_body(f, &method.body, indent + 4)?;
            }
            Ok(())
        }
        Stmt::Property { name, value, .. } => {
            writeln!(f, "{}Property: {} = \"{}\"", pad, name, value)
        }
        Stmt::Call { name, args, .. } => {
            writeln!(f, "{}Call: {}({})", pad, name, render_list(args))
        }
        Stmt::Connect {
            source,
            event,
            target,
            ..
        } => writeln!(f, "{}Connect: {}.{} -> {}", pad, source, event, target),
        Stmt::Set { name, value, .. } => {
            writeln!(f, "{}Set: {} = {}", pad, name, render_expr(value))
        }
        Stmt::Update { name, .. } => writeln!(f, "{}Update: {}++", pad, name),
        Stmt::Return { value, .. } => match value {
            Some(value) => writeln!(f, "{}Return: {}", pad, render_expr(value)),
            None => writeln!(f, "{}Return", pad),
        },
        Stmt::If {
            branches,
            else_branch,
            ..
        } => {
            for (i, branch) in branches.iter().enumerate() {
                let keyword = if i == 0 { "If" } else { "Elif" };
                writeln!(f, "{}{}: {}", pad, keyword, render_expr(&branch.condition))?;
                write_body(f, &branch.body, indent + 2)?;
            }
            if let Some(body) = else_branch {
                writeln!(f, "{}Else:", pad)?;
                write_body(f, body, indent + 2)?;
            }
            Ok(())
        }
        Stmt::While { condition, body, .. } => {
            writeln!(f, "{}While: {}", pad, render_expr(condition))?;
            write_body(f, body, indent + 2)
        }
        Stmt::For {
            iterator,
            iterable,
            body,
            ..
        } => {
            writeln!(f, "{}For: {} in {}", pad, iterator, render_expr(iterable))?;
            write_body(f, body, indent + 2)
        }
        Stmt::Try {
            body,
            error_var,
            handler,
            ..
        } => {
            writeln!(f, "{}Try:", pad)?;
            write_body(f, body, indent + 2)?;
            writeln!(f, "{}Catch ({}):", pad, error_var)?;
            write_body(f, handler, indent + 2)
        }
        Stmt::Import { path, .. } => writeln!(f, "{}Import: \"{}\"", pad, path),
        Stmt::Clear { .. } => writeln!(f, "{}Clear", pad),
        Stmt::Expression { expr, .. } => writeln!(f, "{}Expr: {}", pad, render_expr(expr)),
    }
}

fn render_list(exprs: &[Expr]) -> String {
    exprs.iter().map(render_expr).collect::<Vec<_>>().join(", ")
}

fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal { value, .. } => match value {
            Literal::Int(n) => n.to_string(),
            Literal::Float(n) => format!("{:?}", n),
            Literal::Str(s) => format!("\"{}\"", s),
            Literal::Char(c) => format!("'{}'", c),
            Literal::Bool(b) => b.to_string(),
        },
        Expr::Variable { name, .. } => name.clone(),
        Expr::Array { elements, .. } => format!("[{}]", render_list(elements)),
        Expr::Dict { pairs, .. } => {
            let entries: Vec<String> = pairs
                .iter()
                .map(|(key, value)| format!("\"{}\": {}", key, render_expr(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Expr::Index { object, index, .. } => {
            format!("{}[{}]", render_expr(object), render_expr(index))
        }
        Expr::Get { object, name, .. } => format!("{}.{}", render_expr(object), name),
        Expr::Set {
            object,
            name,
            value,
            ..
        } => format!("{}.{} = {}", render_expr(object), name, render_expr(value)),
        Expr::MethodCall {
            object,
            method,
            args,
            ..
        } => format!("{}.{}({})", render_expr(object), method, render_list(args)),
        Expr::Call { name, args, .. } => format!("{}({})", name, render_list(args)),
        Expr::Binary {
            left,
            operator,
            right,
            ..
        } => format!(
            "({} {} {})",
            operator.symbol(),
            render_expr(left),
            render_expr(right)
        ),
        Expr::Negate { operand, .. } => format!("(- {})", render_expr(operand)),
        Expr::This { .. } => "this".to_string(),
        Expr::New {
            class_name, args, ..
        } => format!("new {}({})", class_name, render_list(args)),
        Expr::Input { prompt, .. } => match prompt {
            Some(prompt) => format!("input(\"{}\")", prompt),
            None => "input()".to_string(),
        },
    }
}
