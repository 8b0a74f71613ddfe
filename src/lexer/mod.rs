pub mod token;

use crate::diagnostics::CompileError;
use crate::span::{Span, Spanned};
use logos::Logos;
use token::Token;

/// Tokenize a module. Spans carry `file_id` so later errors point into the right module.
pub fn lex(source: &str, file_id: u32) -> Result<Vec<Spanned<Token>>, CompileError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let span = Span::with_file(span.start, span.end, file_id);
        match result {
            Ok(Token::Comment) => continue,
            Ok(tok) => tokens.push(Spanned::new(tok, span)),
            Err(()) => {
                let text = &source[span.start..span.end];
                let msg = if text.starts_with(|c: char| c.is_ascii_digit()) {
                    format!("integer literal `{text}` is out of range")
                } else if text.starts_with('"') {
                    "unterminated string literal".to_string()
                } else {
                    format!("unexpected character '{text}'")
                };
                return Err(CompileError::syntax(msg, span));
            }
        }
    }

    Ok(tokens)
}
