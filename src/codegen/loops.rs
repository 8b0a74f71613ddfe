//! Rewrites `while` into a self-restarting closure plus a start/skip branch.
//!
//! The closure takes the captured variables as parameters and returns them.
//! Each iteration lowers the body, re-evaluates the condition and either
//! restarts itself with the updated values or returns them. At the original
//! site the condition is evaluated once: the start arm calls the closure, the
//! skip arm renames the captured values straight into the post-loop registers.

use std::collections::BTreeSet;

use tracing::trace;

use super::ir::{Condition, Op, Register};
use super::lower::{Flow, FunctionBuilder};
use crate::diagnostics::CompileError;
use crate::parser::ast::{Block, CallArg, Expr, Stmt};
use crate::span::Spanned;
use crate::typeck::kind::Kind;

/// Variable names a loop reads or re-binds, in name order.
pub fn referenced_names(cond: &Expr, body: &Block) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    names_in_expr(cond, &mut names);
    names_in_block(body, &mut names);
    names
}

fn names_in_block(block: &Block, names: &mut BTreeSet<String>) {
    for stmt in &block.stmts {
        match &stmt.node {
            Stmt::Let { names: targets, value } => {
                names_in_expr(&value.node, names);
                names.extend(targets.iter().map(|t| t.node.clone()));
            }
            Stmt::Return { value } => {
                if let Some(value) = value {
                    names_in_expr(&value.node, names);
                }
            }
            Stmt::If { cond, then_block, else_block } => {
                names_in_expr(&cond.node, names);
                names_in_block(&then_block.node, names);
                names_in_block(&else_block.node, names);
            }
            Stmt::While { cond, body } => {
                names_in_expr(&cond.node, names);
                names_in_block(&body.node, names);
            }
            Stmt::Expr(expr) => names_in_expr(&expr.node, names),
        }
    }
}

fn names_in_expr(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Ident(name) => {
            names.insert(name.clone());
        }
        Expr::BoolLit(_) | Expr::IntLit(_) | Expr::StringLit(_) => {}
        Expr::Tuple(items) => {
            for item in items {
                names_in_expr(&item.node, names);
            }
        }
        Expr::Call { args, .. } => {
            for arg in args {
                match arg {
                    CallArg::Borrow(name) => {
                        names.insert(name.node.clone());
                    }
                    CallArg::Value(value) => names_in_expr(&value.node, names),
                }
            }
        }
        Expr::Compare { lhs, rhs, .. } => {
            names_in_expr(&lhs.node, names);
            names_in_expr(&rhs.node, names);
        }
    }
}

struct Capture {
    name: String,
    kind: Kind,
}

impl FunctionBuilder<'_> {
    pub(super) fn lower_while(&mut self, cond: &Spanned<Expr>, body: &Spanned<Block>) -> Result<(), CompileError> {
        let captures: Vec<Capture> = referenced_names(&cond.node, &body.node)
            .into_iter()
            .filter_map(|name| {
                let register = self.scope.get(&name)?;
                let kind = self.registers.kind(register).clone();
                Some(Capture { name, kind })
            })
            .collect();
        let params: Vec<(String, Kind)> = captures.iter().map(|c| (c.name.clone(), c.kind.clone())).collect();
        let kinds: Vec<Kind> = captures.iter().map(|c| c.kind.clone()).collect();

        let closure_name = self.next_closure_name();
        let after: Vec<Register> = kinds.iter().map(|k| self.registers.alloc(k.clone())).collect();

        let mut closure = FunctionBuilder::new(self.table, closure_name.clone(), &params, kinds, false);
        closure.in_loop = true;
        closure.lower_iteration(cond, body, &params)?;
        let (closure_ir, nested) = closure.finish();
        trace!(
            function = %self.name,
            closure = %closure_name,
            captures = params.len(),
            "synthesized loop closure"
        );
        self.closures.push(closure_ir);
        self.closures.extend(nested);

        let start = self.control.condition();
        let skip = self.control.condition();
        let test = self.lower_single(cond, "as a `while` condition")?;
        self.require_boolean(test, cond.span, "`while` condition")?;
        self.emit(Op::Branch { test, if_true: start, if_false: skip });

        // The condition may have threaded a capture into a new register.
        let mut entry = Vec::with_capacity(captures.len());
        for capture in &captures {
            let r = self.scope.get(&capture.name).ok_or_else(|| {
                CompileError::type_err(
                    format!("captured variable `{}` is moved by the `while` condition", capture.name),
                    cond.span,
                )
            })?;
            entry.push(r);
        }

        let slot = self.control.child_call(&closure_name);
        let done = if after.is_empty() { Some(self.control.condition()) } else { None };
        self.emit_under(
            start,
            Op::CallAsync { callee: closure_name, args: entry.clone(), results: after.clone(), slot, done },
        );
        for ((capture, source), after) in captures.iter().zip(entry).zip(after) {
            self.emit_under(skip, Op::Rename { source, dest: after });
            self.registers.release(source);
            self.bind_local(&capture.name, after);
        }
        Ok(())
    }

    /// Body of a loop closure: one iteration, then restart or exit.
    fn lower_iteration(
        &mut self,
        cond: &Spanned<Expr>,
        body: &Spanned<Block>,
        params: &[(String, Kind)],
    ) -> Result<(), CompileError> {
        let flow = self.lower_block(body)?;
        debug_assert_eq!(flow, Flow::Continues);

        let test = self.lower_single(cond, "as a `while` condition")?;
        self.require_boolean(test, cond.span, "`while` condition")?;
        let on_continue = self.control.condition();
        let on_exit = self.control.condition();

        let mut values = Vec::with_capacity(params.len());
        for (name, kind) in params {
            let r = self.scope.get(name).ok_or_else(|| {
                CompileError::type_err(
                    format!("captured variable `{name}` is moved inside the loop and never re-bound"),
                    body.span,
                )
            })?;
            self.registers.kind(r).is_equivalent(kind).map_err(|e| {
                CompileError::type_err(format!("variable `{name}` changes type inside the loop: {e}"), body.span)
            })?;
            values.push(r);
        }

        let garbage = self.take_garbage(&values);
        self.emit_under(Condition::ENTRY, Op::Branch { test, if_true: on_continue, if_false: on_exit });
        self.emit_under(on_continue, Op::RestartLoop { args: values.clone(), garbage: garbage.clone() });
        self.emit_under(on_exit, Op::Return { values, garbage });
        Ok(())
    }
}
