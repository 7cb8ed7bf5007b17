use crate::ast::{Expr, Program, Stmt};
use crate::builtins;
use crate::parser::parse_source;
use crate::runtime::Runtime;

const PROMPT: &str = "link> ";
const CONTINUATION_PROMPT: &str = "... ";

/// Keywords whose line opens a block, so the REPL keeps reading until a
/// blank line.
const BLOCK_KEYWORDS: &[&str] = &[
    "if", "while", "for", "func", "app", "window", "elif", "else", "class", "try", "catch",
];

/// Interactive loop over one persistent runtime. Lines are read through the
/// runtime's console so scripts calling `input()` share the same stream.
pub fn start(runtime: &mut Runtime, debug_ast: bool) {
    let console = runtime.console_mut();
    console.write_line(&format!("Link-Lang {}", env!("CARGO_PKG_VERSION")));
    console.write_line("Type 'exit' or 'quit' to leave; finish blocks with an empty line.");

    loop {
        runtime.console_mut().write(PROMPT);
        let Some(line) = runtime.console_mut().read_line() else {
            runtime.console_mut().write_line("");
            break;
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" {
            break;
        }

        let mut source = line.clone();
        if opens_block(trimmed) {
            loop {
                runtime.console_mut().write(CONTINUATION_PROMPT);
                match runtime.console_mut().read_line() {
                    Some(next) if !next.trim().is_empty() => {
                        source.push('\n');
                        source.push_str(&next);
                    }
                    _ => break,
                }
            }
        }
        source.push('\n');

        run_entry(runtime, &source, debug_ast);
    }
}

pub fn opens_block(line: &str) -> bool {
    let first_word = line
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or("");
    BLOCK_KEYWORDS.contains(&first_word) || line.ends_with('{') || line.ends_with('[')
}

fn run_entry(runtime: &mut Runtime, source: &str, debug_ast: bool) {
    let program = match parse_source(source) {
        Ok(program) => program,
        Err(error) => {
            error.report(source, None);
            return;
        }
    };
    if debug_ast {
        runtime.console_mut().write(&program.to_string());
    }

    if let Some(expr) = echo_expression(runtime, &program) {
        match runtime.evaluate_expression(&expr) {
            Ok(value) if !value.is_nil() => runtime.console_mut().write_line(&value.to_string()),
            Ok(_) => {}
            Err(error) => error.report(source, None),
        }
        return;
    }

    if let Err(error) = runtime.execute(program) {
        error.report(source, None);
    }
}

/// The expression whose value a single-statement entry should echo. A bare
/// name parses as a zero-argument call; when no function or built-in has that
/// name but a variable does, it is shown as the variable.
fn echo_expression(runtime: &Runtime, program: &Program) -> Option<Expr> {
    let [statement] = program.statements.as_slice() else {
        return None;
    };
    match statement {
        Stmt::Expression { expr, .. } if !matches!(expr, Expr::Set { .. }) => Some(expr.clone()),
        Stmt::Call { name, args, span }
            if args.is_empty()
                && !runtime.has_function(name)
                && builtins::lookup(name).is_none()
                && runtime.global(name).is_some() =>
        {
            Some(Expr::Variable {
                name: name.clone(),
                span: span.clone(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::opens_block;

    #[test]
    fn block_openers() {
        assert!(opens_block("if x > 1"));
        assert!(opens_block("func greet(name)"));
        assert!(opens_block("data = {"));
        assert!(opens_block("items = ["));
        assert!(!opens_block("iffy = 3"));
        assert!(!opens_block("print(\"if\")"));
    }
}
