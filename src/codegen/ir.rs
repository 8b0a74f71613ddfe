//! The generator's output: per-function activation layouts and guarded operations.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::parser::ast::CompareOp;
use crate::typeck::kind::Kind;

/// Index into an activation's value slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Register(pub u32);

impl Register {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Phase flag gating an operation. Condition 0 is set on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Condition(pub u32);

impl Condition {
    pub const ENTRY: Condition = Condition(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Slot holding at most one outstanding asynchronous sub-activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ChildCall(pub u32);

impl ChildCall {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Move a value into another slot.
    Rename { source: Register, dest: Register },
    LoadInteger { target: Register, value: i64 },
    LoadString { target: Register, value: String },
    /// Inline call; results are ready as soon as it runs. `done` is set for
    /// calls without results so they fire once.
    CallSync {
        callee: String,
        args: Vec<Register>,
        results: Vec<Register>,
        done: Option<Condition>,
    },
    /// Construct and schedule a child activation in `slot`.
    CallAsync {
        callee: String,
        args: Vec<Register>,
        results: Vec<Register>,
        slot: ChildCall,
        done: Option<Condition>,
    },
    Compare {
        #[serde(rename = "operator")]
        op: CompareOp,
        lhs: Register,
        rhs: Register,
        result: Register,
    },
    Branch {
        test: Register,
        if_true: Condition,
        if_false: Condition,
    },
    MakeTuple { items: Vec<Register>, result: Register },
    UnpackTuple { tuple: Register, items: Vec<Register> },
    CheckUnionTag { value: Register, tag: u32, result: Register },
    ExtractUnionValue { value: Register, result: Register },
    /// Release an owned resource once it has materialized.
    Free { register: Register, done: Condition },
    /// Tail-invoke the enclosing loop closure with the next iteration's values
    /// once all of them have materialized.
    RestartLoop {
        args: Vec<Register>,
        garbage: Vec<Register>,
    },
    Return {
        values: Vec<Register>,
        garbage: Vec<Register>,
    },
}

impl Op {
    /// Registers that must be ready before the operation may fire.
    pub fn needs(&self) -> Vec<Register> {
        match self {
            Op::Rename { source, .. } => vec![*source],
            Op::LoadInteger { .. } | Op::LoadString { .. } => vec![],
            Op::CallSync { args, .. } => args.clone(),
            // Arguments are copied into the child on every poll, ready or not.
            Op::CallAsync { .. } => vec![],
            Op::Compare { lhs, rhs, .. } => vec![*lhs, *rhs],
            Op::Branch { test, .. } => vec![*test],
            Op::MakeTuple { items, .. } => items.clone(),
            Op::UnpackTuple { tuple, .. } => vec![*tuple],
            Op::CheckUnionTag { value, .. } | Op::ExtractUnionValue { value, .. } => vec![*value],
            Op::Free { register, .. } => vec![*register],
            Op::RestartLoop { args, .. } => args.clone(),
            Op::Return { values, .. } => values.clone(),
        }
    }

    /// Registers the operation produces; it fires only while they are unready.
    pub fn provides(&self) -> Vec<Register> {
        match self {
            Op::Rename { dest, .. } => vec![*dest],
            Op::LoadInteger { target, .. } | Op::LoadString { target, .. } => vec![*target],
            Op::CallSync { results, .. } | Op::CallAsync { results, .. } => results.clone(),
            Op::Compare { result, .. } => vec![*result],
            Op::MakeTuple { result, .. } => vec![*result],
            Op::UnpackTuple { items, .. } => items.clone(),
            Op::CheckUnionTag { result, .. } | Op::ExtractUnionValue { result, .. } => vec![*result],
            Op::Branch { .. } | Op::Free { .. } | Op::RestartLoop { .. } | Op::Return { .. } => vec![],
        }
    }

    /// Flags that must still be clear for the operation to fire: the
    /// completion flag of operations that produce no register, and both
    /// targets of a branch.
    pub fn unset_flags(&self) -> Vec<Condition> {
        match self {
            Op::Free { done, .. } => vec![*done],
            Op::CallSync { done, .. } | Op::CallAsync { done, .. } => done.iter().copied().collect(),
            Op::Branch { if_true, if_false, .. } => vec![*if_true, *if_false],
            _ => vec![],
        }
    }

    /// The operation ends the activation when it fires.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Op::Return { .. } | Op::RestartLoop { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Rename { .. } => "rename",
            Op::LoadInteger { .. } => "load_integer",
            Op::LoadString { .. } => "load_string",
            Op::CallSync { .. } => "call_sync",
            Op::CallAsync { .. } => "call_async",
            Op::Compare { .. } => "compare",
            Op::Branch { .. } => "branch",
            Op::MakeTuple { .. } => "make_tuple",
            Op::UnpackTuple { .. } => "unpack_tuple",
            Op::CheckUnionTag { .. } => "check_union_tag",
            Op::ExtractUnionValue { .. } => "extract_union_value",
            Op::Free { .. } => "free",
            Op::RestartLoop { .. } => "restart_loop",
            Op::Return { .. } => "return",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardedOp {
    pub condition: Condition,
    #[serde(flatten)]
    pub op: Op,
}

/// The firing rule for one operation, over canonical slots:
/// `condition && all needs ready && all provides unready && all unset clear`.
/// The renderer emits exactly these terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub condition: Condition,
    pub needs: Vec<Register>,
    pub provides: Vec<Register>,
    pub unset: Vec<Condition>,
}

impl Guard {
    pub fn is_satisfied(&self, ready: &BTreeSet<Register>, flags: &BTreeSet<Condition>) -> bool {
        flags.contains(&self.condition)
            && self.needs.iter().all(|r| ready.contains(r))
            && self.provides.iter().all(|r| !ready.contains(r))
            && self.unset.iter().all(|c| !flags.contains(c))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionIr {
    pub name: String,
    pub is_sync: bool,
    pub is_native: bool,
    /// Parameters occupy registers `0..param_count`.
    pub param_count: usize,
    pub return_kinds: Vec<Kind>,
    pub register_kinds: Vec<Kind>,
    /// Canonical register of every register after branch joins.
    pub slots: Vec<Register>,
    pub ops: Vec<GuardedOp>,
    /// Callee of each child-call slot.
    pub child_calls: Vec<String>,
    pub condition_count: u32,
}

impl FunctionIr {
    pub fn native(name: impl Into<String>, is_sync: bool, params: Vec<Kind>, returns: Vec<Kind>) -> Self {
        let slots = (0..params.len() as u32).map(Register).collect();
        Self {
            name: name.into(),
            is_sync,
            is_native: true,
            param_count: params.len(),
            return_kinds: returns,
            register_kinds: params,
            slots,
            ops: Vec::new(),
            child_calls: Vec::new(),
            condition_count: 1,
        }
    }

    pub fn result_count(&self) -> usize {
        self.return_kinds.len()
    }

    pub fn child_call_count(&self) -> usize {
        self.child_calls.len()
    }

    pub fn slot(&self, r: Register) -> Register {
        self.slots[r.index()]
    }

    pub fn guard(&self, index: usize) -> Guard {
        let GuardedOp { condition, op } = &self.ops[index];
        let canon = |regs: Vec<Register>| regs.into_iter().map(|r| self.slot(r)).collect();
        Guard {
            condition: *condition,
            needs: canon(op.needs()),
            provides: canon(op.provides()),
            unset: op.unset_flags(),
        }
    }

    /// Operations governed by `condition`, in generation order.
    pub fn ops_under(&self, condition: Condition) -> impl Iterator<Item = &Op> + '_ {
        self.ops.iter().filter(move |g| g.condition == condition).map(|g| &g.op)
    }

    /// Canonical registers released by free operations and garbage sets.
    pub fn freed_registers(&self) -> Vec<Register> {
        let mut freed = Vec::new();
        for guarded in &self.ops {
            match &guarded.op {
                Op::Free { register, .. } => freed.push(self.slot(*register)),
                Op::Return { garbage, .. } | Op::RestartLoop { garbage, .. } => {
                    freed.extend(garbage.iter().map(|r| self.slot(*r)))
                }
                _ => {}
            }
        }
        freed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramIr {
    pub entry: String,
    pub functions: Vec<FunctionIr>,
}

impl ProgramIr {
    pub fn function(&self, name: &str) -> Option<&FunctionIr> {
        self.functions.iter().find(|f| f.name == name)
    }
}
