use std::collections::{BTreeMap, BTreeSet};

use super::ir::Register;
use super::registers::RegisterFile;

/// Local variable bindings at the current lowering point.
///
/// Ordered so joins and captures visit names deterministically. Branch arms
/// work on clones taken with [`Scope::snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    bindings: BTreeMap<String, Register>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Register> {
        self.bindings.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn bind(&mut self, name: impl Into<String>, r: Register) {
        self.bindings.insert(name.into(), r);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Register)> + '_ {
        self.bindings.iter().map(|(name, r)| (name.as_str(), *r))
    }

    pub fn snapshot(&self) -> Scope {
        self.clone()
    }

    pub fn restore(&mut self, saved: Scope) {
        *self = saved;
    }

    /// Drop every binding whose value is in `r`'s group.
    pub fn unbind_aliases(&mut self, registers: &RegisterFile, r: Register) {
        let root = registers.resolve(r);
        self.bindings.retain(|_, bound| registers.resolve(*bound) != root);
    }

    pub fn reachable_roots(&self, registers: &RegisterFile) -> BTreeSet<Register> {
        self.bindings.values().map(|r| registers.resolve(*r)).collect()
    }
}
