//! Render a `ProgramIr` as C against the `hang10_runtime.h` support library.
//!
//! Every generated function becomes a heap-allocated state struct and a poll
//! function. Polling re-evaluates each guarded operation until a full pass makes
//! no progress; terminal operations release the activation and return early.

use crate::codegen::ir::{Condition, FunctionIr, GuardedOp, Op, ProgramIr, Register};
use crate::parser::ast::CompareOp;
use crate::typeck::kind::{Family, Kind};

/// Generated C for one program.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedC {
    pub header: String,
    pub source: String,
}

const ENTRY_FUNCTION: &str = "main";

pub fn render_c(program: &ProgramIr) -> RenderedC {
    let guard_macro = format!("HANG10_{}_H", program.entry.to_ascii_uppercase());

    let mut header = Printer::new();
    header.line(&format!("#ifndef {guard_macro}"));
    header.line(&format!("#define {guard_macro}"));
    header.newline();
    header.line("#include <stdbool.h>");
    header.line("#include \"hang10_runtime.h\"");
    header.newline();
    for function in program.functions.iter().filter(|f| !(f.is_native && f.is_sync)) {
        header.line(&format!("struct {};", state_name(&function.name)));
    }
    for function in &program.functions {
        header.newline();
        header.emit_declarations(function, program);
    }
    header.newline();
    header.line(&format!("void hang10_start_{}(future_t **results);", program.entry));
    header.newline();
    header.line(&format!("#endif /* {guard_macro} */"));

    let mut source = Printer::new();
    source.line("#include <stdlib.h>");
    source.line(&format!("#include \"{}.h\"", program.entry));
    for function in program.functions.iter().filter(|f| !f.is_native) {
        source.newline();
        source.emit_constructor(function);
        source.newline();
        source.emit_poll(function, program);
    }
    source.newline();
    source.emit_start(program);

    RenderedC { header: header.buf, source: source.buf }
}

fn state_name(function: &str) -> String {
    format!("hang10_{function}_state")
}

fn poll_name(function: &str) -> String {
    format!("hang10_{function}_poll")
}

fn new_name(function: &str) -> String {
    format!("hang10_{function}_new")
}

fn native_name(function: &str) -> String {
    format!("hang10_{function}")
}

/// C arrays may not be empty.
fn array_len(n: usize) -> usize {
    n.max(1)
}

fn c_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for byte in value.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(byte as char),
            other => out.push_str(&format!("\\{other:03o}")),
        }
    }
    out.push('"');
    out
}

fn release_call(kind: &Kind, value: &str) -> String {
    match kind.family {
        Family::Tuple => format!("hang10_tuple_free({value}.pointer);"),
        _ => format!("hang10_string_free({value}.pointer);"),
    }
}

fn compare_expr(op: CompareOp, kind: &Kind, lhs: &str, rhs: &str) -> String {
    let symbol = op.symbol();
    match kind.family {
        Family::Integer => format!("{lhs}.integer {symbol} {rhs}.integer"),
        Family::Boolean => format!("{lhs}.boolean {symbol} {rhs}.boolean"),
        Family::String => format!("hang10_string_compare({lhs}.pointer, {rhs}.pointer) {symbol} 0"),
        Family::Stream | Family::Clock | Family::Tuple => {
            format!("{lhs}.pointer {symbol} {rhs}.pointer")
        }
    }
}

struct Printer {
    buf: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Self { buf: String::new(), indent: 0 }
    }

    fn line(&mut self, s: &str) {
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str(s);
        self.buf.push('\n');
    }

    fn newline(&mut self) {
        self.buf.push('\n');
    }

    fn open(&mut self, s: &str) {
        self.line(s);
        self.indent += 1;
    }

    fn close(&mut self, s: &str) {
        self.indent -= 1;
        self.line(s);
    }

    // ── Header ───────────────────────────────────────────────────────

    fn emit_declarations(&mut self, function: &FunctionIr, program: &ProgramIr) {
        if function.is_native && function.is_sync {
            self.line(&format!("void {}(future_t **args, future_t **results);", native_name(&function.name)));
            return;
        }

        self.open(&format!("struct {} {{", state_name(&function.name)));
        self.line("closure_t caller;");
        self.line("bool *finished;");
        self.line(&format!("future_t *result[{}];", array_len(function.result_count())));
        self.line(&format!("future_t r[{}];", array_len(function.register_kinds.len())));
        if !function.is_native {
            self.line(&format!("bool conditions[{}];", function.condition_count));
            for (k, callee) in function.child_calls.iter().enumerate() {
                let callee_is_generated =
                    program.function(callee).is_some_and(|f| !(f.is_native && f.is_sync));
                if callee_is_generated {
                    self.line(&format!("struct {} *call_{k};", state_name(callee)));
                } else {
                    self.line(&format!("void *call_{k};"));
                }
                self.line(&format!("bool call_{k}_done;"));
            }
        }
        self.close("};");
        self.line(&format!(
            "struct {} *{}(closure_t caller);",
            state_name(&function.name),
            new_name(&function.name)
        ));
        self.line(&format!("void {}(void *state);", poll_name(&function.name)));
    }

    // ── Source ───────────────────────────────────────────────────────

    fn emit_constructor(&mut self, function: &FunctionIr) {
        let state = state_name(&function.name);
        self.open(&format!("struct {state} *{}(closure_t caller) {{", new_name(&function.name)));
        self.line(&format!("struct {state} *sp = calloc(1, sizeof(struct {state}));"));
        self.line("sp->caller = caller;");
        self.line(&format!("sp->conditions[{}] = true;", Condition::ENTRY.index()));
        self.line("return sp;");
        self.close("}");
    }

    fn emit_poll(&mut self, function: &FunctionIr, program: &ProgramIr) {
        let state = state_name(&function.name);
        self.open(&format!("void {}(void *state) {{", poll_name(&function.name)));
        self.line(&format!("struct {state} *sp = state;"));
        self.line("bool progress;");
        self.open("do {");
        self.line("progress = false;");
        for (index, guarded) in function.ops.iter().enumerate() {
            self.emit_guarded(function, index, guarded, program);
        }
        self.close("} while (progress);");
        self.close("}");
    }

    fn emit_guarded(&mut self, function: &FunctionIr, index: usize, guarded: &GuardedOp, program: &ProgramIr) {
        let guard = function.guard(index);
        let mut terms = vec![format!("sp->conditions[{}]", guard.condition.index())];
        terms.extend(guard.needs.iter().map(|r| format!("sp->r[{}].ready", r.index())));
        terms.extend(guard.provides.iter().map(|r| format!("!sp->r[{}].ready", r.index())));
        terms.extend(guard.unset.iter().map(|c| format!("!sp->conditions[{}]", c.index())));

        self.line(&format!("/* {} */", guarded.op.name()));
        self.open(&format!("if ({}) {{", terms.join(" && ")));
        self.emit_op(function, &guarded.op, program);
        // Scheduling a child changes nothing locally; its completion re-polls us.
        if !guarded.op.is_terminal() && !matches!(guarded.op, Op::CallAsync { .. }) {
            self.line("progress = true;");
        }
        self.close("}");
    }

    fn emit_op(&mut self, function: &FunctionIr, op: &Op, program: &ProgramIr) {
        let reg = |r: &Register| format!("sp->r[{}]", function.slot(*r).index());
        match op {
            Op::Rename { source, dest } => {
                self.line(&format!("{} = {};", reg(dest), reg(source)));
            }
            Op::LoadInteger { target, value } => {
                self.line(&format!("{}.value.integer = {value};", reg(target)));
                self.line(&format!("{}.ready = true;", reg(target)));
            }
            Op::LoadString { target, value } => {
                self.line(&format!(
                    "{}.value.pointer = hang10_string_new({}, {});",
                    reg(target),
                    c_string_literal(value),
                    value.len()
                ));
                self.line(&format!("{}.ready = true;", reg(target)));
            }
            Op::CallSync { callee, args, results, done } => {
                let generated = program.function(callee).is_some_and(|f| !f.is_native);
                if generated {
                    self.line(&format!(
                        "struct {} *child = {}(hang10_closure_none());",
                        state_name(callee),
                        new_name(callee)
                    ));
                    for (i, arg) in args.iter().enumerate() {
                        self.line(&format!("child->r[{i}] = {};", reg(arg)));
                    }
                    for (j, result) in results.iter().enumerate() {
                        self.line(&format!("child->result[{j}] = &{};", reg(result)));
                    }
                    self.line(&format!("{}(child);", poll_name(callee)));
                } else {
                    let arg_ptrs: Vec<_> = args.iter().map(|a| format!("&{}", reg(a))).collect();
                    let result_ptrs: Vec<_> = results.iter().map(|r| format!("&{}", reg(r))).collect();
                    self.line(&format!("future_t *args[] = {{{}}};", ptr_list(&arg_ptrs)));
                    self.line(&format!("future_t *results[] = {{{}}};", ptr_list(&result_ptrs)));
                    self.line(&format!("{}(args, results);", native_name(callee)));
                    for result in results {
                        self.line(&format!("{}.ready = true;", reg(result)));
                    }
                }
                if let Some(done) = done {
                    self.line(&format!("sp->conditions[{}] = true;", done.index()));
                }
            }
            Op::CallAsync { callee, args, results, slot, done } => {
                let call = format!("sp->call_{}", slot.index());
                let call_done = format!("sp->call_{}_done", slot.index());
                if let Some(done) = done {
                    self.open(&format!("if ({call_done}) {{"));
                    self.line(&format!("sp->conditions[{}] = true;", done.index()));
                    self.line(&format!("{call} = NULL;"));
                    self.line(&format!("{call_done} = false;"));
                    self.line("progress = true;");
                    self.close("}");
                }
                self.open(&format!("if ({call} == NULL && !{call_done}) {{"));
                self.line(&format!(
                    "{call} = {}(hang10_closure({}, sp));",
                    new_name(callee),
                    poll_name(&function.name)
                ));
                self.line(&format!("{call}->finished = &{call_done};"));
                for (j, result) in results.iter().enumerate() {
                    self.line(&format!("{call}->result[{j}] = &{};", reg(result)));
                }
                self.close("}");
                self.open(&format!("if (!{call_done}) {{"));
                for (i, arg) in args.iter().enumerate() {
                    self.line(&format!("{call}->r[{i}].value = {}.value;", reg(arg)));
                    self.line(&format!("{call}->r[{i}].ready = {}.ready;", reg(arg)));
                    self.line(&format!("{call}->r[{i}].cancelled = {}.cancelled;", reg(arg)));
                }
                self.line(&format!("hang10_schedule(hang10_closure({}, {call}));", poll_name(callee)));
                self.close("}");
            }
            Op::Compare { op, lhs, rhs, result } => {
                let kind = &function.register_kinds[lhs.index()];
                let lhs = format!("{}.value", reg(lhs));
                let rhs = format!("{}.value", reg(rhs));
                self.line(&format!("{}.value.boolean = {};", reg(result), compare_expr(*op, kind, &lhs, &rhs)));
                self.line(&format!("{}.ready = true;", reg(result)));
            }
            Op::Branch { test, if_true, if_false } => {
                self.line(&format!("sp->conditions[{}] = {}.value.boolean;", if_true.index(), reg(test)));
                self.line(&format!("sp->conditions[{}] = !{}.value.boolean;", if_false.index(), reg(test)));
            }
            Op::MakeTuple { items, result } => {
                self.line(&format!("{}.value.pointer = hang10_tuple_new({});", reg(result), items.len()));
                for (i, item) in items.iter().enumerate() {
                    self.line(&format!("hang10_tuple_set({}.value.pointer, {i}, {}.value);", reg(result), reg(item)));
                }
                self.line(&format!("{}.ready = true;", reg(result)));
            }
            Op::UnpackTuple { tuple, items } => {
                for (i, item) in items.iter().enumerate() {
                    self.line(&format!("{}.value = hang10_tuple_get({}.value.pointer, {i});", reg(item), reg(tuple)));
                    self.line(&format!("{}.ready = true;", reg(item)));
                }
            }
            Op::CheckUnionTag { value, tag, result } => {
                self.line(&format!(
                    "{}.value.boolean = hang10_union_tag({}.value.pointer) == {tag};",
                    reg(result),
                    reg(value)
                ));
                self.line(&format!("{}.ready = true;", reg(result)));
            }
            Op::ExtractUnionValue { value, result } => {
                self.line(&format!("{}.value = hang10_union_value({}.value.pointer);", reg(result), reg(value)));
                self.line(&format!("{}.ready = true;", reg(result)));
            }
            Op::Free { register, done } => {
                let kind = &function.register_kinds[register.index()];
                self.line(&release_call(kind, &format!("{}.value", reg(register))));
                self.line(&format!("sp->conditions[{}] = true;", done.index()));
            }
            Op::RestartLoop { args, garbage } => {
                let state = state_name(&function.name);
                self.line(&format!(
                    "struct {state} *next = {}(sp->caller);",
                    new_name(&function.name)
                ));
                self.line("next->finished = sp->finished;");
                for j in 0..function.result_count() {
                    self.line(&format!("next->result[{j}] = sp->result[{j}];"));
                }
                for (i, arg) in args.iter().enumerate() {
                    self.line(&format!("next->r[{i}] = {};", reg(arg)));
                }
                self.emit_garbage(function, garbage);
                self.line("free(sp);");
                self.line(&format!("{}(next);", poll_name(&function.name)));
                self.line("return;");
            }
            Op::Return { values, garbage } => {
                for (j, value) in values.iter().enumerate() {
                    self.line(&format!("*sp->result[{j}] = {};", reg(value)));
                }
                self.emit_garbage(function, garbage);
                self.line("if (sp->finished) *sp->finished = true;");
                self.line("hang10_schedule(sp->caller);");
                self.line("free(sp);");
                self.line("return;");
            }
        }
    }

    fn emit_garbage(&mut self, function: &FunctionIr, garbage: &[Register]) {
        for register in garbage {
            let slot = function.slot(*register).index();
            let kind = &function.register_kinds[register.index()];
            self.line(&format!("if (sp->r[{slot}].ready) {}", release_call(kind, &format!("sp->r[{slot}].value"))));
        }
    }

    fn emit_start(&mut self, program: &ProgramIr) {
        let entry = ENTRY_FUNCTION;
        self.open(&format!("void hang10_start_{}(future_t **results) {{", program.entry));
        if let Some(main) = program.function(entry) {
            self.line(&format!(
                "struct {} *sp = {}(hang10_closure_none());",
                state_name(entry),
                new_name(entry)
            ));
            for j in 0..main.result_count() {
                self.line(&format!("sp->result[{j}] = results[{j}];"));
            }
            for i in 0..main.param_count {
                self.line(&format!("sp->r[{i}] = hang10_initial_argument({i});"));
            }
            self.line(&format!("hang10_schedule(hang10_closure({}, sp));", poll_name(entry)));
        }
        self.close("}");
    }
}

fn ptr_list(ptrs: &[String]) -> String {
    if ptrs.is_empty() { "NULL".to_string() } else { ptrs.join(", ") }
}
