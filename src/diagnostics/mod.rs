use crate::modules::SourceMap;
use crate::span::{line_col, Span};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Syntax error: {msg}")]
    Syntax { msg: String, span: Span },

    /// Unknown variable or callee.
    #[error("Lookup error: {msg}")]
    Lookup { msg: String, span: Span },

    #[error("Type error: {msg}")]
    Type { msg: String, span: Span },

    /// Wrong number of values where a fixed arity is required, or an
    /// ill-formed control-flow shape.
    #[error("Shape error: {msg}")]
    Shape { msg: String, span: Span },

    #[error("Module error: {msg}")]
    Module { msg: String },

    #[error("Manifest error: {msg}")]
    Manifest { msg: String, path: PathBuf },

    #[error("Output error: {msg}")]
    Output { msg: String },

    #[error("in function `{function}`: {source}")]
    InFunction {
        function: String,
        source: Box<CompileError>,
    },
}

impl CompileError {
    pub fn syntax(msg: impl Into<String>, span: Span) -> Self {
        Self::Syntax { msg: msg.into(), span }
    }

    pub fn lookup(msg: impl Into<String>, span: Span) -> Self {
        Self::Lookup { msg: msg.into(), span }
    }

    pub fn type_err(msg: impl Into<String>, span: Span) -> Self {
        Self::Type { msg: msg.into(), span }
    }

    pub fn shape(msg: impl Into<String>, span: Span) -> Self {
        Self::Shape { msg: msg.into(), span }
    }

    pub fn module(msg: impl Into<String>) -> Self {
        Self::Module { msg: msg.into() }
    }

    pub fn manifest(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Manifest { msg: msg.into(), path }
    }

    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output { msg: msg.into() }
    }

    pub fn in_function(self, function: impl Into<String>) -> Self {
        Self::InFunction { function: function.into(), source: Box::new(self) }
    }

    /// The innermost error, with any function context peeled off.
    pub fn root(&self) -> &CompileError {
        match self {
            CompileError::InFunction { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self.root() {
            CompileError::Syntax { span, .. }
            | CompileError::Lookup { span, .. }
            | CompileError::Type { span, .. }
            | CompileError::Shape { span, .. } => Some(*span),
            _ => None,
        }
    }

    /// Attach `span` to a positioned error that was raised without one.
    pub fn or_span(self, outer: Span) -> Self {
        match self {
            CompileError::InFunction { function, source } => CompileError::InFunction {
                function,
                source: Box::new((*source).or_span(outer)),
            },
            mut positioned => {
                if let Some(span) = positioned.span_mut() {
                    if span.is_dummy() {
                        *span = outer;
                    }
                }
                positioned
            }
        }
    }

    fn span_mut(&mut self) -> Option<&mut Span> {
        match self {
            CompileError::Syntax { span, .. }
            | CompileError::Lookup { span, .. }
            | CompileError::Type { span, .. }
            | CompileError::Shape { span, .. } => Some(span),
            _ => None,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self.root() {
            CompileError::Syntax { .. } => "syntax",
            CompileError::Lookup { .. } => "lookup",
            CompileError::Type { .. } => "type",
            CompileError::Shape { .. } => "shape",
            CompileError::Module { .. } => "module",
            CompileError::Manifest { .. } => "manifest",
            CompileError::Output { .. } => "output",
            CompileError::InFunction { .. } => unreachable!(),
        }
    }

    fn message(&self) -> &str {
        match self.root() {
            CompileError::Syntax { msg, .. }
            | CompileError::Lookup { msg, .. }
            | CompileError::Type { msg, .. }
            | CompileError::Shape { msg, .. }
            | CompileError::Module { msg }
            | CompileError::Manifest { msg, .. }
            | CompileError::Output { msg } => msg,
            CompileError::InFunction { .. } => unreachable!(),
        }
    }

    fn function(&self) -> Option<&str> {
        match self {
            CompileError::InFunction { function, .. } => Some(function),
            _ => None,
        }
    }
}

/// One-line `path:line:col: message` form, for logs and non-terminal output.
pub fn describe(sources: &SourceMap, err: &CompileError) -> String {
    let located = err.span().and_then(|span| {
        sources.get(span.file_id).map(|file| {
            let (line, col) = line_col(&file.text, span.start);
            format!("{}:{line}:{col}", file.path.display())
        })
    });
    match located {
        Some(at) => format!("{at}: {err}"),
        None => err.to_string(),
    }
}

/// Render a CompileError with ariadne for nice terminal output.
pub fn render_error(sources: &SourceMap, err: &CompileError) {
    use ariadne::{Label, Report, ReportKind, Source};

    let kind_str = err.kind_label();
    let msg = err.message();
    let positioned = err.span().and_then(|span| sources.get(span.file_id).map(|file| (span, file)));

    match positioned {
        Some((span, file)) => {
            let mut report = Report::build(ReportKind::Error, (), span.start)
                .with_message(format!("{kind_str} error in {}", file.path.display()))
                .with_label(Label::new(span.start..span.end).with_message(msg));
            if let Some(function) = err.function() {
                report = report.with_note(format!("while generating function `{function}`"));
            }
            if let Err(e) = report.finish().eprint(Source::from(file.text.as_str())) {
                eprintln!("error[{kind_str}]: {msg} ({e})");
            }
        }
        None => match err.root() {
            CompileError::Manifest { msg, path } => {
                eprintln!("error[manifest]: {msg}");
                eprintln!("  --> {}", path.display());
            }
            _ => eprintln!("error[{kind_str}]: {msg}"),
        },
    }
}
