//! Kinds and the resolved function table the generator type-checks against.

pub mod env;
pub mod kind;

pub use env::{FuncId, FuncSig, FunctionTable};
pub use kind::{Family, Kind, KindError};
