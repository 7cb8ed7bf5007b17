// Link-Lang interpreter library
//
// Lexer, indentation- and brace-tolerant parser, and a tree-walking runtime
// for the Link scripting language.

pub mod ast;
pub mod builtins;
pub mod environment;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod repl;
pub mod runner;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use ast::{Expr, Program, Stmt};
pub use error::{ErrorKind, LinkError, Span};
pub use lexer::{Lexer, Token, TokenType};
pub use parser::{parse_source, Parser};
pub use runtime::{Console, Flow, Runtime};
pub use value::Value;

pub use repl::start as start_repl;
pub use runner::run;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install the stderr log subscriber. `RUST_LOG` wins when set; otherwise
/// only warnings are shown, or debug events for this crate when `verbose`.
/// Safe to call more than once.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let default = if verbose { "linklang=debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}
