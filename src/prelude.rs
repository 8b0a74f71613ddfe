//! Modules embedded in the compiler. User modules of the same name shadow them.

pub const STD_MODULE: &str = "std";

const STD_SOURCE: &str = include_str!("../stdlib/std.ht");

pub fn lookup(module: &str) -> Option<&'static str> {
    match module {
        STD_MODULE => Some(STD_SOURCE),
        _ => None,
    }
}
