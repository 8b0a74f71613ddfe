// Property tests for the lexer: robustness and span structure over arbitrary input.

use hang10::lexer::{lex, token::Token};
use proptest::prelude::*;

#[test]
fn prop_lexer_never_panics() {
    proptest!(|(source in "\\PC{0,500}")| {
        let _ = lex(&source, 0);
    });
}

#[test]
fn prop_lexing_is_deterministic() {
    proptest!(|(source in "\\PC{0,300}")| {
        let first = lex(&source, 0);
        let second = lex(&source, 0);
        prop_assert_eq!(first.is_ok(), second.is_ok());
        if let (Ok(a), Ok(b)) = (first, second) {
            prop_assert_eq!(a, b);
        }
    });
}

#[test]
fn prop_spans_are_ordered_and_in_bounds() {
    proptest!(|(source in "\\PC{0,300}", file_id in 0u32..8)| {
        if let Ok(tokens) = lex(&source, file_id) {
            for pair in tokens.windows(2) {
                prop_assert!(pair[0].span.end <= pair[1].span.start);
            }
            for token in &tokens {
                prop_assert!(token.span.start < token.span.end);
                prop_assert!(token.span.end <= source.len());
                prop_assert!(source.is_char_boundary(token.span.start));
                prop_assert_eq!(token.span.file_id, file_id);
            }
        }
    });
}

#[test]
fn prop_integer_literals_keep_their_value() {
    proptest!(|(value in 0i64..=i64::MAX)| {
        let tokens = lex(&value.to_string(), 0).unwrap();
        prop_assert_eq!(tokens.len(), 1);
        prop_assert_eq!(&tokens[0].node, &Token::IntLit(value));
    });
}

#[test]
fn prop_identifiers_cover_their_text() {
    proptest!(|(name in "[a-z_][a-z0-9_]{0,12}")| {
        let keywords = ["import", "func", "sync", "native", "let", "return", "if", "else", "while", "true", "false"];
        prop_assume!(!keywords.contains(&name.as_str()));
        let tokens = lex(&name, 0).unwrap();
        prop_assert_eq!(tokens.len(), 1);
        prop_assert_eq!(&tokens[0].node, &Token::Ident);
        prop_assert_eq!(tokens[0].span.end - tokens[0].span.start, name.len());
    });
}

#[test]
fn prop_whitespace_and_comments_are_skipped() {
    proptest!(|(comment in "[ -~]{0,40}")| {
        let source = format!("let // {comment}\n  x");
        let tokens = lex(&source, 0).unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.node).collect();
        prop_assert_eq!(kinds, vec![Token::Let, Token::Ident]);
    });
}
