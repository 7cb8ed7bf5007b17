//! Property-based tests for the lexer, parser and runtime.
//!
//! 1. Indentation balance: every INDENT the lexer emits is matched by a DEDENT.
//! 2. Robustness: lexing and parsing arbitrary text never panics.
//! 3. Block forms: an indented body and its braced twin parse to the same tree.
//! 4. `range(n)` binds the loop variable to `0..n` in order, or not at all when `n <= 0`.

use linklang::lexer::{Lexer, TokenType};
use linklang::parser::parse_source;
use linklang::{Console, Runtime};
use proptest::prelude::*;
use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;

const KEYWORDS: &[&str] = &[
    "app", "window", "func", "class", "init", "new", "this", "connect", "import", "set", "return",
    "for", "in", "while", "if", "elif", "else", "try", "catch", "true", "false", "clear", "cls",
    "sh",
];

fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,8}")
        .expect("valid regex")
        .prop_filter("not a keyword", |s| !KEYWORDS.contains(&s.as_str()))
}

/// Lines of plausible source with uneven leading whitespace.
fn indented_source_strategy() -> impl Strategy<Value = String> {
    let line = (
        prop::sample::select(vec!["", " ", "  ", "    ", "\t", "        ", "      "]),
        prop::string::string_regex("[a-z0-9 =+*#]{0,12}").expect("valid regex"),
    )
        .prop_map(|(indent, body)| format!("{}{}", indent, body));
    prop::collection::vec(line, 0..20).prop_map(|lines| lines.join("\n"))
}

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

proptest! {
    #[test]
    fn indents_and_dedents_balance(source in indented_source_strategy()) {
        if let Ok(tokens) = Lexer::new(&source).scan_tokens() {
            let indents = tokens.iter().filter(|t| t.token_type == TokenType::Indent).count();
            let dedents = tokens.iter().filter(|t| t.token_type == TokenType::Dedent).count();
            prop_assert_eq!(indents, dedents);
            prop_assert_eq!(tokens.last().map(|t| t.token_type), Some(TokenType::Eof));
        }
    }

    #[test]
    fn parsing_arbitrary_text_never_panics(source in "\\PC{0,200}") {
        let _ = parse_source(&source);
    }

    #[test]
    fn parsing_structured_noise_never_panics(
        source in prop::string::string_regex("[a-z(){}\\[\\]\"'.,:=+\\-*/<> \n\t]{0,200}").expect("valid regex")
    ) {
        let _ = parse_source(&source);
    }

    #[test]
    fn braced_and_indented_bodies_parse_alike(
        condition in identifier_strategy(),
        assignments in prop::collection::vec((identifier_strategy(), 0i64..1_000_000), 1..8),
    ) {
        let mut indented = format!("if {}\n", condition);
        let mut braced = format!("if {} {{\n", condition);
        for (name, value) in &assignments {
            indented.push_str(&format!("    {} = {}\n", name, value));
            braced.push_str(&format!("  {} = {}\n", name, value));
        }
        braced.push_str("}\n");

        let indented = parse_source(&indented).expect("indented form parses");
        let braced = parse_source(&braced).expect("braced form parses");
        prop_assert_eq!(indented.to_string(), braced.to_string());
    }

    #[test]
    fn range_loops_visit_zero_to_n_in_order(n in -20i64..60) {
        let output = SharedBuffer::default();
        let console = Console::new(output.clone(), Cursor::new(Vec::new()));
        let mut runtime = Runtime::with_console(console);

        let source = format!("for i in range({})\n    print(i)\n", n);
        prop_assert!(runtime.run_source(&source).is_ok());

        let printed = String::from_utf8_lossy(&output.0.borrow()).into_owned();
        let expected: String = (0..n.max(0)).map(|i| format!("{}\n", i)).collect();
        prop_assert_eq!(printed, expected);
    }
}
