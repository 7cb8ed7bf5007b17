use crate::error::LinkError;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::runtime::Runtime;
use tracing::debug;

/// Lex, parse and execute one unit of source against `runtime`, reporting
/// any error against `source`. Returns false when the unit failed.
pub fn run(runtime: &mut Runtime, source: &str, filename: Option<&str>, debug_ast: bool) -> bool {
    match run_unit(runtime, source, debug_ast) {
        Ok(()) => true,
        Err(error) => {
            error.report(source, filename);
            false
        }
    }
}

fn run_unit(runtime: &mut Runtime, source: &str, debug_ast: bool) -> Result<(), LinkError> {
    // Lexical analysis
    let tokens = Lexer::new(source).scan_tokens()?;
    debug!(tokens = tokens.len(), "lexed unit");

    // Parsing
    let program = Parser::new(tokens).parse()?;
    if debug_ast {
        let console = runtime.console_mut();
        console.write_line("--- AST ---");
        console.write(&program.to_string());
        console.write_line("-----------");
    }

    // Execution
    runtime.execute(program)
}
