use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos + 1,
        }
    }

    pub fn to(&self, other: &Span) -> Self {
        Self::new(self.start, other.end.max(self.end))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    LexError,
    ParseError,
    /// Fatal runtime failure: aborts the current unit and is never caught.
    RuntimeError,
    /// Recoverable from script code through `try`/`catch`.
    Exception,
}

/// The file a diagnostic belongs to when it is not the unit being run,
/// e.g. a syntax error inside an imported script.
#[derive(Debug, Clone)]
pub struct Origin {
    pub filename: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct LinkError {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
    pub origin: Option<Box<Origin>>,
}

impl LinkError {
    pub fn new(kind: ErrorKind, span: Span, message: String) -> Self {
        Self {
            kind,
            span,
            message,
            help: None,
            origin: None,
        }
    }

    pub fn new_with_help(kind: ErrorKind, span: Span, message: String, help: String) -> Self {
        Self {
            kind,
            span,
            message,
            help: Some(help),
            origin: None,
        }
    }

    pub fn lex_error(span: Span, message: String) -> Self {
        Self::new(ErrorKind::LexError, span, message)
    }

    pub fn parse_error(span: Span, message: String) -> Self {
        Self::new(ErrorKind::ParseError, span, message)
    }

    pub fn parse_error_with_help(span: Span, message: String, help: String) -> Self {
        Self::new_with_help(ErrorKind::ParseError, span, message, help)
    }

    pub fn runtime_error(span: Span, message: String) -> Self {
        Self::new(ErrorKind::RuntimeError, span, message)
    }

    pub fn runtime_error_with_help(span: Span, message: String, help: String) -> Self {
        Self::new_with_help(ErrorKind::RuntimeError, span, message, help)
    }

    pub fn exception(span: Span, message: String) -> Self {
        Self::new(ErrorKind::Exception, span, message)
    }

    pub fn is_catchable(&self) -> bool {
        self.kind == ErrorKind::Exception
    }

    /// Attach the file this error was raised in. An origin that is already
    /// set wins, so nested imports keep the innermost file.
    pub fn in_file(mut self, filename: &str, source: &str) -> Self {
        if self.origin.is_none() {
            self.origin = Some(Box::new(Origin {
                filename: filename.to_string(),
                source: source.to_string(),
            }));
        }
        self
    }

    pub fn report(&self, source: &str, filename: Option<&str>) {
        let (filename, source) = match self.origin.as_deref() {
            Some(origin) => (origin.filename.as_str(), origin.source.as_str()),
            None => (filename.unwrap_or("<repl>"), source),
        };

        let color = match self.kind {
            ErrorKind::LexError => Color::Red,
            ErrorKind::ParseError => Color::Yellow,
            ErrorKind::RuntimeError => Color::Magenta,
            ErrorKind::Exception => Color::Magenta,
        };

        let kind_str = match self.kind {
            ErrorKind::LexError => "Lexical Error",
            ErrorKind::ParseError => "Parse Error",
            ErrorKind::RuntimeError => "Runtime Error",
            ErrorKind::Exception => "Uncaught Exception",
        };

        // Clamp so a stale span can never point past the text it is drawn on.
        let len = source.chars().count();
        let start = self.span.start.min(len);
        let end = self.span.end.clamp(start, len.max(start));

        let mut report_builder = Report::build(ReportKind::Error, filename, start)
            .with_message(format!("{}: {}", kind_str.fg(color), self.message))
            .with_label(
                Label::new((filename, start..end))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        if let Err(error) = report_builder
            .finish()
            .eprint((filename, Source::from(source)))
        {
            eprintln!("{}: {} ({})", kind_str, self.message, error);
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LinkError {}
