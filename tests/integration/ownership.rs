mod common;

use common::{function, generate, generate_err, last_return, ops};
use hang10::codegen::ir::{ChildCall, Condition, Op, Register};

const CONSUME: &str = "func consume(s: String): Integer { return 0 }\n";

#[test]
fn async_move_forgets_the_variable() {
    let err = generate_err(&format!(
        "{CONSUME}func main(x: String): Integer {{ let n = consume(x) return consume(x) }}"
    ));
    assert_eq!(err.to_string(), "in function `main`: Lookup error: unknown variable `x`");
}

#[test]
fn moved_value_is_not_garbage() {
    let program = generate(&format!("{CONSUME}func main(x: String): Integer {{ let n = consume(x) return n }}"));
    let main = function(&program, "main");
    assert_eq!(
        ops(main),
        vec![
            (
                Condition::ENTRY,
                Op::CallAsync {
                    callee: "consume".into(),
                    args: vec![Register(0)],
                    results: vec![Register(1)],
                    slot: ChildCall(0),
                    done: None,
                }
            ),
            (Condition::ENTRY, Op::Return { values: vec![Register(1)], garbage: vec![] }),
        ]
    );
    // The callee owns the parameter and releases it on return.
    let consume = function(&program, "consume");
    assert_eq!(last_return(consume).2, vec![Register(0)]);
}

#[test]
fn borrowed_argument_stays_owned_by_caller() {
    let program = generate(
        "sync func peek(s: &String): Integer { return 0 }\n\
         func main(x: String): Integer { let n = peek(x) return n }",
    );
    let main = function(&program, "main");
    assert_eq!(last_return(main).2, vec![Register(0)]);
}

#[test]
fn threaded_borrow_rebinds_the_result() {
    let program = generate(
        r#"import std
        func main(console: Stream): Stream {
            print(&console, "hello")
            print(&console, "world")
            return console
        }"#,
    );
    let main = function(&program, "main");
    let calls: Vec<_> = main
        .ops
        .iter()
        .filter_map(|g| match &g.op {
            Op::CallSync { args, results, .. } => Some((args.clone(), results.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        calls,
        vec![
            (vec![Register(0), Register(1)], vec![Register(2)]),
            (vec![Register(2), Register(3)], vec![Register(4)]),
        ]
    );
    assert_eq!(last_return(main).1, vec![Register(4)]);
}

#[test]
fn threaded_borrow_needs_a_matching_result() {
    let err = generate_err(
        "sync func g(s: &String): () { return }\n\
         func main(s: &String): Integer { g(&s) return 0 }",
    );
    assert_eq!(err.root().to_string(), "Shape error: `g` has no result at position 1 to hand back to `s`");

    let err = generate_err(
        "sync func f(s: &String): Integer { return 0 }\n\
         func main(s: &String): Integer { f(&s) return 0 }",
    );
    assert_eq!(
        err.root().to_string(),
        "Type error: borrowed variable `s` changes type across `f`: expecting &String, got Integer"
    );
}

#[test]
fn borrowed_value_cannot_be_moved() {
    let err = generate_err(
        r#"sync func own(s: String): () { return }
        func main(): Integer { own("literal") return 0 }"#,
    );
    assert_eq!(
        err.root().to_string(),
        "Type error: argument `s` of `own`: expecting owned String, but got &String"
    );
}

#[test]
fn owned_value_returned_twice() {
    let err = generate_err("func main(s: String): (String, String) { return (s, s) }");
    assert_eq!(err.root().to_string(), "Type error: owned value is returned more than once");
}

#[test]
fn owned_resource_keeps_a_single_name() {
    let err = generate_err(
        "import std\n\
         func main(): Integer { let a = itoa(1) let b = a let n = len(a) return n }",
    );
    assert_eq!(err.root().to_string(), "Lookup error: unknown variable `a`");
}

#[test]
fn plain_values_may_alias() {
    let program = generate("func main(): (Integer, Integer) { let a = 1 let b = a return (a, b) }");
    let main = function(&program, "main");
    assert_eq!(last_return(main).1, vec![Register(0), Register(0)]);
}
