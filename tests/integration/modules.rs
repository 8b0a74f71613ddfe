mod common;

use common::names;
use hang10::diagnostics::describe;
use hang10::modules::{DirectorySource, MemorySource, SourceMap};

#[test]
fn imported_functions_are_callable() {
    let source = MemorySource::new()
        .with("main", "import util\nfunc main(): Integer { return inc(1) }")
        .with("util", "sync func inc(n: Integer): Integer { return n }");
    let mut sources = SourceMap::new();
    let program = hang10::generate_program("main", &source, &mut sources).unwrap();
    assert_eq!(names(&program), vec!["main", "inc"]);
    assert_eq!(sources.get(1).unwrap().module, "util");
}

#[test]
fn transitive_imports_are_loaded_once() {
    let source = MemorySource::new()
        .with("main", "import a\nimport b\nfunc main(): Integer { return fa() }")
        .with("a", "import b\nsync func fa(): Integer { return fb() }")
        .with("b", "import a\nsync func fb(): Integer { return 2 }");
    let mut sources = SourceMap::new();
    let program = hang10::generate_program("main", &source, &mut sources).unwrap();
    assert_eq!(names(&program), vec!["main", "fa", "fb"]);
    assert_eq!(sources.len(), 3);
}

#[test]
fn user_module_shadows_prelude() {
    let source = MemorySource::new()
        .with("main", "import std\nfunc main(): Integer { return answer() }")
        .with("std", "sync func answer(): Integer { return 42 }");
    let mut sources = SourceMap::new();
    let program = hang10::generate_program("main", &source, &mut sources).unwrap();
    assert_eq!(names(&program), vec!["main", "answer"]);
}

#[test]
fn duplicate_function_across_modules() {
    let source = MemorySource::new()
        .with("main", "import util\nfunc main(): Integer { return 0 }\nsync func inc(n: Integer): Integer { return n }")
        .with("util", "sync func inc(n: Integer): Integer { return n }");
    let mut sources = SourceMap::new();
    let err = hang10::generate_program("main", &source, &mut sources).unwrap_err();
    assert_eq!(
        describe(&sources, &err),
        "util.ht:1:11: Lookup error: function `inc` is already defined in module `main`"
    );
}

#[test]
fn missing_import_is_located() {
    let source = MemorySource::new().with("main", "import nowhere\nfunc main(): Integer { return 0 }");
    let mut sources = SourceMap::new();
    let err = hang10::generate_program("main", &source, &mut sources).unwrap_err();
    assert_eq!(
        describe(&sources, &err),
        "main.ht:1:8: Lookup error: module `nowhere` not found (imported by `main`)"
    );
}

#[test]
fn errors_carry_their_module_file() {
    let source = MemorySource::new()
        .with("main", "import util\nfunc main(): Integer { return 0 }")
        .with("util", "sync func broken(): Integer {\n  return missing\n}");
    let mut sources = SourceMap::new();
    let err = hang10::generate_program("main", &source, &mut sources).unwrap_err();
    assert_eq!(
        describe(&sources, &err),
        "util.ht:2:10: in function `broken`: Lookup error: unknown variable `missing`"
    );
}

#[test]
fn directory_project() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.ht"), "import helpers\nfunc main(): Integer { return one() }").unwrap();
    std::fs::write(dir.path().join("helpers.ht"), "sync func one(): Integer { return 1 }").unwrap();
    let mut sources = SourceMap::new();
    let program = hang10::generate_program("app", &DirectorySource::new(dir.path()), &mut sources).unwrap();
    assert_eq!(program.entry, "app");
    assert_eq!(names(&program), vec!["main", "one"]);
    assert!(sources.get(0).unwrap().path.ends_with("app.ht"));
}
