//! Liveness-driven release of owned resources.

use std::collections::BTreeSet;

use tracing::trace;

use super::ir::{Condition, Op, Register};
use super::lower::FunctionBuilder;
use super::registers::RegisterFile;

/// Canonical registers of live owned resources whose group is not in `keep`.
pub fn unreachable_resources(registers: &RegisterFile, keep: &BTreeSet<Register>) -> Vec<Register> {
    let mut roots = BTreeSet::new();
    for r in registers.iter() {
        if registers.is_live(r) && registers.kind(r).needs_cleanup() {
            let root = registers.resolve(r);
            if !keep.contains(&root) {
                roots.insert(root);
            }
        }
    }
    roots.into_iter().collect()
}

impl FunctionBuilder<'_> {
    /// Free every owned resource no local can reach any more.
    pub(super) fn sweep_unreachable(&mut self) {
        let reachable = self.scope.reachable_roots(&self.registers);
        for root in unreachable_resources(&self.registers, &reachable) {
            self.emit_free(self.current, root);
        }
    }

    pub(super) fn emit_free(&mut self, condition: Condition, register: Register) {
        let done = self.control.condition();
        trace!(function = %self.name, register = %register, condition = %condition, "freeing unreachable register");
        self.emit_under(condition, Op::Free { register, done });
        self.registers.release(register);
    }

    /// Garbage for an exit that hands `keep` to the caller: every live owned
    /// resource outside `keep`. Everything is released afterwards, since
    /// nothing survives the exit on this path.
    pub(super) fn take_garbage(&mut self, keep: &[Register]) -> Vec<Register> {
        let kept: BTreeSet<Register> = keep.iter().map(|r| self.registers.resolve(*r)).collect();
        let garbage = unreachable_resources(&self.registers, &kept);
        for r in garbage.iter().chain(&kept) {
            self.registers.release(*r);
        }
        garbage
    }
}
