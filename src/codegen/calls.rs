//! Call lowering: strategy selection plus move and borrow bookkeeping.

use tracing::trace;

use super::ir::{Op, Register};
use super::lower::FunctionBuilder;
use crate::diagnostics::CompileError;
use crate::parser::ast::CallArg;
use crate::span::{Span, Spanned};
use crate::typeck::env::FuncSig;
use crate::typeck::kind::Kind;

/// How a call site is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStrategy {
    /// Evaluated in place; results are ready for the next operation.
    Inline,
    /// Runs in a child activation scheduled through a child-call slot.
    Scheduled,
}

impl CallStrategy {
    pub fn select(sig: &FuncSig) -> Self {
        if sig.is_sync { CallStrategy::Inline } else { CallStrategy::Scheduled }
    }
}

impl FunctionBuilder<'_> {
    pub(super) fn lower_call(
        &mut self,
        callee: &Spanned<String>,
        args: &[CallArg],
        span: Span,
    ) -> Result<Vec<Register>, CompileError> {
        let table = self.table;
        let id = table
            .lookup(&callee.node)
            .ok_or_else(|| CompileError::lookup(format!("unknown function `{}`", callee.node), callee.span))?;
        let sig = table.get(id);

        if args.len() != sig.params.len() {
            return Err(CompileError::type_err(
                format!(
                    "argument count mismatch calling `{}`, expecting {}, got {}",
                    sig.name,
                    sig.params.len(),
                    args.len()
                ),
                span,
            ));
        }

        let mut arg_regs = Vec::with_capacity(args.len());
        let mut threaded: Vec<Option<(&Spanned<String>, Kind)>> = Vec::with_capacity(args.len());
        for (arg, (param, expected)) in args.iter().zip(&sig.params) {
            let (r, arg_span) = match arg {
                CallArg::Borrow(name) => {
                    let r = self.scope.get(&name.node).ok_or_else(|| {
                        CompileError::lookup(format!("unknown variable `{}`", name.node), name.span)
                    })?;
                    threaded.push(Some((name, self.registers.kind(r).clone())));
                    (r, name.span)
                }
                CallArg::Value(expr) => {
                    threaded.push(None);
                    (self.lower_single(expr, "as a call argument")?, expr.span)
                }
            };
            self.registers.kind(r).converts_to(expected).map_err(|e| {
                CompileError::type_err(format!("argument `{param}` of `{}`: {e}", sig.name), arg_span)
            })?;
            if !expected.borrowed {
                self.move_out(r);
            }
            arg_regs.push(r);
        }

        let results: Vec<Register> = sig.returns.iter().map(|k| self.registers.alloc(k.clone())).collect();
        let done = if results.is_empty() { Some(self.control.condition()) } else { None };
        let strategy = CallStrategy::select(sig);
        trace!(function = %self.name, callee = %sig.name, ?strategy, "lowering call");
        let op = match strategy {
            CallStrategy::Inline => Op::CallSync {
                callee: sig.name.clone(),
                args: arg_regs,
                results: results.clone(),
                done,
            },
            CallStrategy::Scheduled => Op::CallAsync {
                callee: sig.name.clone(),
                args: arg_regs,
                results: results.clone(),
                slot: self.control.child_call(&sig.name),
                done,
            },
        };
        self.emit(op);

        // `&name` arguments take back the result at their own position.
        for (i, thread) in threaded.iter().enumerate() {
            let Some((name, before)) = thread else { continue };
            let Some(&r) = results.get(i) else {
                return Err(CompileError::shape(
                    format!("`{}` has no result at position {} to hand back to `{}`", sig.name, i + 1, name.node),
                    name.span,
                ));
            };
            self.registers.kind(r).is_equivalent(before).map_err(|e| {
                CompileError::type_err(format!("borrowed variable `{}` changes type across `{}`: {e}", name.node, sig.name), name.span)
            })?;
            self.bind_local(&name.node, r);
        }

        Ok(results
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !matches!(threaded.get(*i), Some(Some(_))))
            .map(|(_, r)| r)
            .collect())
    }

    /// Ownership of `r` passes to a callee: release its group and forget every
    /// local bound to it.
    pub(super) fn move_out(&mut self, r: Register) {
        self.registers.release(r);
        self.scope.unbind_aliases(&self.registers, r);
    }
}
