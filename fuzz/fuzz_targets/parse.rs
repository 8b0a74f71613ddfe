#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

/// Token-shaped fragments, so most inputs get past the lexer.
#[derive(Arbitrary, Debug)]
enum Fragment {
    Ident,
    Int,
    Str,
    Kind,
    Import,
    Func,
    Sync,
    Native,
    Let,
    Return,
    If,
    Else,
    While,
    Amp,
    Eq,
    Compare,
    Comma,
    Colon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Lt,
    Gt,
}

impl Fragment {
    fn text(&self) -> &'static str {
        match self {
            Fragment::Ident => "x",
            Fragment::Int => "42",
            Fragment::Str => "\"s\"",
            Fragment::Kind => "Integer",
            Fragment::Import => "import",
            Fragment::Func => "func",
            Fragment::Sync => "sync",
            Fragment::Native => "native",
            Fragment::Let => "let",
            Fragment::Return => "return",
            Fragment::If => "if",
            Fragment::Else => "else",
            Fragment::While => "while",
            Fragment::Amp => "&",
            Fragment::Eq => "=",
            Fragment::Compare => "==",
            Fragment::Comma => ",",
            Fragment::Colon => ":",
            Fragment::LParen => "(",
            Fragment::RParen => ")",
            Fragment::LBrace => "{",
            Fragment::RBrace => "}",
            Fragment::Lt => "<",
            Fragment::Gt => ">",
        }
    }
}

fuzz_target!(|fragments: Vec<Fragment>| {
    let source: Vec<&str> = fragments.iter().map(Fragment::text).collect();
    let _ = hang10::parser::parse_module(&source.join(" "), 0);
});
