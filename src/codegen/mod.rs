//! Lowers type-checked functions into resumable activation records.

pub mod calls;
pub mod cleanup;
pub mod ir;
pub mod loops;
pub mod lower;
pub mod registers;
pub mod render;
pub mod scope;

use tracing::debug;

use crate::diagnostics::CompileError;
use crate::modules::LoadedProgram;
use crate::parser::ast::FunctionDecl;
use crate::typeck::env::FunctionTable;
use ir::{FunctionIr, ProgramIr};
use lower::FunctionBuilder;

/// Program-wide state threaded through generation: the read-only function
/// table and the append-only output.
pub struct Generator<'t> {
    table: &'t FunctionTable,
    output: Vec<FunctionIr>,
}

impl<'t> Generator<'t> {
    pub fn new(table: &'t FunctionTable) -> Self {
        Self { table, output: Vec::new() }
    }

    /// Generate one declared function, followed by the loop closures it needs.
    pub fn generate_function(&mut self, decl: &FunctionDecl) -> Result<(), CompileError> {
        let name = &decl.name.node;
        let params: Vec<_> = decl.params.iter().map(|p| (p.name.node.clone(), p.kind.node.clone())).collect();
        let returns: Vec<_> = decl.returns.iter().map(|k| k.node.clone()).collect();

        let Some(body) = &decl.body else {
            let kinds = params.into_iter().map(|(_, kind)| kind).collect();
            self.output.push(FunctionIr::native(name.clone(), decl.is_sync, kinds, returns));
            return Ok(());
        };

        let mut builder = FunctionBuilder::new(self.table, name.clone(), &params, returns, decl.is_sync);
        builder.lower_body(body).map_err(|e| e.in_function(name.clone()))?;
        let (ir, closures) = builder.finish();
        debug!(
            function = %name,
            ops = ir.ops.len(),
            registers = ir.register_kinds.len(),
            closures = closures.len(),
            "generated function"
        );
        self.output.push(ir);
        self.output.extend(closures);
        Ok(())
    }

    pub fn finish(self, entry: impl Into<String>) -> ProgramIr {
        ProgramIr { entry: entry.into(), functions: self.output }
    }
}

/// Generate every function of a loaded program, in load order.
///
/// Fails if no `main` is declared anywhere, or as soon as any function fails.
pub fn generate(program: &LoadedProgram, table: &FunctionTable) -> Result<ProgramIr, CompileError> {
    if table.lookup("main").is_none() {
        return Err(CompileError::module(format!(
            "no main function defined in `{}` or its imports",
            program.entry
        )));
    }
    let mut generator = Generator::new(table);
    for module in &program.modules {
        for func in &module.ast.functions {
            generator.generate_function(&func.node)?;
        }
    }
    Ok(generator.finish(program.entry.clone()))
}
