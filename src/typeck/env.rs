use std::collections::HashMap;

use super::kind::Kind;
use crate::diagnostics::CompileError;
use crate::modules::LoadedProgram;
use crate::span::Span;

#[derive(Debug, Clone)]
pub struct FuncSig {
    pub name: String,
    pub module: String,
    pub is_sync: bool,
    pub is_native: bool,
    pub params: Vec<(String, Kind)>,
    pub returns: Vec<Kind>,
    pub span: Span,
}

impl FuncSig {
    pub fn param_kinds(&self) -> impl Iterator<Item = &Kind> + '_ {
        self.params.iter().map(|(_, kind)| kind)
    }
}

/// Handle into the function table, obtained once per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(usize);

/// Every function declared across the loaded modules. Read-only once built.
#[derive(Debug, Default)]
pub struct FunctionTable {
    sigs: Vec<FuncSig>,
    by_name: HashMap<String, FuncId>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_program(program: &LoadedProgram) -> Result<Self, CompileError> {
        let mut table = Self::new();
        for module in &program.modules {
            for func in &module.ast.functions {
                let decl = &func.node;
                let mut params: Vec<(String, Kind)> = Vec::with_capacity(decl.params.len());
                for p in &decl.params {
                    if params.iter().any(|(name, _)| *name == p.name.node) {
                        return Err(CompileError::syntax(
                            format!("duplicate parameter `{}` in function `{}`", p.name.node, decl.name.node),
                            p.name.span,
                        ));
                    }
                    params.push((p.name.node.clone(), p.kind.node.clone()));
                }
                table.declare(FuncSig {
                    name: decl.name.node.clone(),
                    module: module.name.clone(),
                    is_sync: decl.is_sync,
                    is_native: decl.is_native,
                    params,
                    returns: decl.returns.iter().map(|k| k.node.clone()).collect(),
                    span: decl.name.span,
                })?;
            }
        }
        Ok(table)
    }

    pub fn declare(&mut self, sig: FuncSig) -> Result<FuncId, CompileError> {
        if let Some(existing) = self.by_name.get(&sig.name) {
            let prior = &self.sigs[existing.0];
            return Err(CompileError::lookup(
                format!("function `{}` is already defined in module `{}`", sig.name, prior.module),
                sig.span,
            ));
        }
        let id = FuncId(self.sigs.len());
        self.by_name.insert(sig.name.clone(), id);
        self.sigs.push(sig);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: FuncId) -> &FuncSig {
        &self.sigs[id.0]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}
