use std::cell::Cell;

use super::ir::{ChildCall, Condition, Register};
use crate::typeck::kind::Kind;

/// Value slots of one activation, plus the substitution forest built by joins.
///
/// Every substitution edge points to a strictly smaller register, so the
/// canonical register of a joined group is its lowest member.
#[derive(Debug, Default)]
pub struct RegisterFile {
    kinds: Vec<Kind>,
    parent: Vec<Cell<u32>>,
    /// Still owned by this activation on the current path (not moved or freed).
    live: Vec<bool>,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: Kind) -> Register {
        let r = Register(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.parent.push(Cell::new(r.0));
        self.live.push(true);
        r
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind(&self, r: Register) -> &Kind {
        &self.kinds[r.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = Register> + use<> {
        (0..self.kinds.len() as u32).map(Register)
    }

    /// Follow substitutions to the canonical register, compressing the path.
    pub fn resolve(&self, r: Register) -> Register {
        let mut root = r.0;
        loop {
            let next = self.parent[root as usize].get();
            if next == root {
                break;
            }
            assert!(next < root, "substitution r{root} -> r{next} does not decrease");
            root = next;
        }
        let mut cur = r.0;
        while cur != root {
            let next = self.parent[cur as usize].get();
            self.parent[cur as usize].set(root);
            cur = next;
        }
        Register(root)
    }

    /// Unify two registers; returns the canonical one.
    pub fn join(&mut self, a: Register, b: Register) -> Register {
        let (a, b) = (self.resolve(a), self.resolve(b));
        if a == b {
            return a;
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        self.parent[high.index()].set(low.0);
        low
    }

    pub fn same_value(&self, a: Register, b: Register) -> bool {
        self.resolve(a) == self.resolve(b)
    }

    pub fn is_live(&self, r: Register) -> bool {
        self.live[r.index()]
    }

    /// Release every register in `r`'s group.
    pub fn release(&mut self, r: Register) {
        let root = self.resolve(r);
        for i in 0..self.live.len() {
            if self.live[i] && self.resolve(Register(i as u32)) == root {
                self.live[i] = false;
            }
        }
    }

    pub fn live_flags(&self) -> Vec<bool> {
        self.live.clone()
    }

    /// Reinstate saved flags; registers allocated after the snapshot are
    /// treated as not owned on this path.
    pub fn restore(&mut self, saved: &[bool]) {
        for (i, flag) in self.live.iter_mut().enumerate() {
            *flag = saved.get(i).copied().unwrap_or(false);
        }
    }

    pub fn set_live_flags(&mut self, flags: Vec<bool>) {
        debug_assert_eq!(flags.len(), self.live.len());
        self.live = flags;
    }

    /// Release `r`'s group inside a saved flag vector.
    pub fn release_in(&self, flags: &mut [bool], r: Register) {
        let root = self.resolve(r);
        for (i, flag) in flags.iter_mut().enumerate() {
            if *flag && self.resolve(Register(i as u32)) == root {
                *flag = false;
            }
        }
    }

    pub fn canonical_slots(&self) -> Vec<Register> {
        self.iter().map(|r| self.resolve(r)).collect()
    }

    pub fn into_kinds(self) -> Vec<Kind> {
        self.kinds
    }
}

/// Issues fresh conditions and child-call slots for one activation.
#[derive(Debug)]
pub struct ControlAllocator {
    next_condition: u32,
    child_calls: Vec<String>,
}

impl Default for ControlAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlAllocator {
    pub fn new() -> Self {
        // Condition 0 is the entry condition.
        Self { next_condition: 1, child_calls: Vec::new() }
    }

    pub fn condition(&mut self) -> Condition {
        let c = Condition(self.next_condition);
        self.next_condition += 1;
        c
    }

    pub fn child_call(&mut self, callee: &str) -> ChildCall {
        let slot = ChildCall(self.child_calls.len() as u32);
        self.child_calls.push(callee.to_string());
        slot
    }

    pub fn condition_count(&self) -> u32 {
        self.next_condition
    }

    pub fn into_child_calls(self) -> Vec<String> {
        self.child_calls
    }
}
