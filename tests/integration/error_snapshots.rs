//! Snapshot tests for error message formatting.
//!
//! Messages are pinned inline; run `cargo insta review` after intentional changes.

mod common;

use common::generate_err;
use hang10::diagnostics::describe;
use hang10::modules::{MemorySource, SourceMap};
use insta::assert_snapshot;

fn located(source: &str) -> String {
    let mut sources = SourceMap::new();
    let err = hang10::generate_program("main", &MemorySource::new().with("main", source), &mut sources).unwrap_err();
    describe(&sources, &err)
}

#[test]
fn syntax_error() {
    assert_snapshot!(located("func main(): Integer { return 1 +"), @"main.ht:1:33: Syntax error: unexpected character '+'");
}

#[test]
fn unknown_type() {
    assert_snapshot!(located("func main(x: Float): Integer { return 0 }"), @"main.ht:1:14: Syntax error: unknown type `Float`");
}

#[test]
fn unknown_variable() {
    assert_snapshot!(
        located("func main(): Integer {\n    return y\n}"),
        @"main.ht:2:12: in function `main`: Lookup error: unknown variable `y`"
    );
}

#[test]
fn return_kind_mismatch() {
    assert_snapshot!(
        generate_err(r#"func main(): Integer { return "x" }"#).to_string(),
        @"in function `main`: Type error: return value 1: expecting Integer, got &String"
    );
}

#[test]
fn borrowed_return_into_owned() {
    assert_snapshot!(
        generate_err("func main(s: &String): String { return s }").to_string(),
        @"in function `main`: Type error: return value 1: expecting owned String, but got &String"
    );
}

#[test]
fn missing_return() {
    assert_snapshot!(
        generate_err("func main(c: Boolean): Integer { if c { return 1 } }").to_string(),
        @"in function `main`: Shape error: function `main` does not return on every path"
    );
}

#[test]
fn duplicate_parameter() {
    assert_snapshot!(
        generate_err("func main(a: Integer, a: Integer): Integer { return a }").to_string(),
        @"Syntax error: duplicate parameter `a` in function `main`"
    );
}

#[test]
fn tuple_in_condition() {
    assert_snapshot!(
        generate_err("func main(): Integer { if (true, false) { return 1 } return 0 }").to_string(),
        @"in function `main`: Shape error: expected a single value as an `if` condition, got 2"
    );
}
