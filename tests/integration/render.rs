mod common;

use common::generate;
use hang10::codegen::render::render_c;

#[test]
fn loop_closure_restarts_itself() {
    let program = generate(
        "import std
        func main(): Integer {
            let i = 0
            while i < 3 { let i = add(i, 1) }
            return i
        }",
    );
    let rendered = render_c(&program);

    assert!(rendered.header.contains("#ifndef HANG10_MAIN_H"));
    assert!(rendered.header.contains("struct hang10_main_1_state *call_0;"));
    assert!(rendered.header.contains("void hang10_add(future_t **args, future_t **results);"));
    assert!(rendered.header.contains("void hang10_start_main(future_t **results);"));

    assert!(rendered.source.contains("#include \"main.h\""));
    assert!(rendered.source.contains("struct hang10_main_1_state *next = hang10_main_1_new(sp->caller);"));
    assert!(rendered.source.contains("next->r[0] = sp->r[2];"));
    assert!(rendered.source.contains("hang10_main_1_poll(next);"));
    assert!(rendered.source.contains("sp->r[4].value.boolean = sp->r[2].value.integer < sp->r[3].value.integer;"));
    // Skip arm moves the captured value straight into the post-loop slot.
    assert!(rendered.source.contains("sp->r[1] = sp->r[0];"));
}

#[test]
fn joined_registers_share_a_slot() {
    let program = generate(
        r#"func main(c: Boolean): &String {
            if c { let y = "a" } else { let y = "b" }
            return y
        }"#,
    );
    let source = render_c(&program).source;
    assert!(source.contains("if (sp->conditions[2] && !sp->r[1].ready) {"));
    assert!(!source.contains("sp->r[2]"));
}

#[test]
fn frees_and_garbage_use_family_release() {
    let program = generate(
        "import std
        func main(t: Tuple<Integer, String>): Integer { let s = itoa(1) let s = itoa(2) return 0 }",
    );
    let source = render_c(&program).source;
    assert!(source.contains("hang10_string_free(sp->r[2].value.pointer);"));
    assert!(source.contains("if (sp->r[0].ready) hang10_tuple_free(sp->r[0].value.pointer);"));
    assert!(source.contains("if (sp->r[4].ready) hang10_string_free(sp->r[4].value.pointer);"));
}

#[test]
fn rendering_is_deterministic() {
    let source = "import std\nfunc main(c: Boolean, n: Integer): Integer { while c { let n = add(n, 1) } return n }";
    assert_eq!(render_c(&generate(source)), render_c(&generate(source)));
}
