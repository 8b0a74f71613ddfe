use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::diagnostics::CompileError;
use crate::parser::ast::Module;
use crate::parser::parse_module;
use crate::prelude;
use crate::span::Span;

pub const SOURCE_EXTENSION: &str = "ht";

/// Text of one module and where it came from.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub path: PathBuf,
    pub text: String,
}

/// Supplies module text by name.
pub trait ModuleSource {
    /// `Ok(None)` when no such module exists.
    fn load(&self, module: &str) -> Result<Option<SourceText>, CompileError>;
}

/// Modules held in memory, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    modules: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, module: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(module, text);
        self
    }

    pub fn insert(&mut self, module: impl Into<String>, text: impl Into<String>) {
        self.modules.insert(module.into(), text.into());
    }
}

impl ModuleSource for MemorySource {
    fn load(&self, module: &str) -> Result<Option<SourceText>, CompileError> {
        Ok(self.modules.get(module).map(|text| SourceText {
            path: PathBuf::from(format!("{module}.{SOURCE_EXTENSION}")),
            text: text.clone(),
        }))
    }
}

/// Modules stored as `<root>/<name>.ht`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModuleSource for DirectorySource {
    fn load(&self, module: &str) -> Result<Option<SourceText>, CompileError> {
        let path = self.root.join(format!("{module}.{SOURCE_EXTENSION}"));
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(SourceText { path, text })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CompileError::module(format!("could not read '{}': {e}", path.display()))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub module: String,
    pub path: PathBuf,
    pub text: String,
}

/// Maps file_id -> loaded module text, for diagnostics.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, module: impl Into<String>, path: PathBuf, text: String) -> u32 {
        let id = self.files.len() as u32;
        self.files.push(SourceFile { module: module.into(), path, text });
        id
    }

    pub fn get(&self, file_id: u32) -> Option<&SourceFile> {
        self.files.get(file_id as usize)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug)]
pub struct LoadedModule {
    pub name: String,
    pub file_id: u32,
    pub ast: Module,
}

/// The import closure of an entry module, in breadth-first load order.
#[derive(Debug)]
pub struct LoadedProgram {
    pub entry: String,
    pub modules: Vec<LoadedModule>,
}

fn fetch(module: &str, source: &dyn ModuleSource) -> Result<Option<SourceText>, CompileError> {
    if let Some(found) = source.load(module)? {
        return Ok(Some(found));
    }
    Ok(prelude::lookup(module).map(|text| SourceText {
        path: PathBuf::from(format!("<{module}>")),
        text: text.to_string(),
    }))
}

/// Load `entry` and everything it imports. Each module is parsed once.
pub fn load_program(
    entry: &str,
    source: &dyn ModuleSource,
    sources: &mut SourceMap,
) -> Result<LoadedProgram, CompileError> {
    let mut queue: VecDeque<(String, Option<(String, Span)>)> = VecDeque::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut modules = Vec::new();
    queue.push_back((entry.to_string(), None));
    seen.insert(entry.to_string());

    while let Some((name, importer)) = queue.pop_front() {
        let Some(found) = fetch(&name, source)? else {
            return Err(match importer {
                Some((importer, span)) => CompileError::lookup(
                    format!("module `{name}` not found (imported by `{importer}`)"),
                    span,
                ),
                None => CompileError::module(format!("module `{name}` not found")),
            });
        };
        let file_id = sources.add(name.clone(), found.path, found.text);
        let text = sources.get(file_id).map(|f| f.text.as_str()).unwrap_or_default();
        let ast = parse_module(text, file_id)?;
        debug!(module = %name, file_id, functions = ast.functions.len(), "loaded module");

        for import in &ast.imports {
            if seen.insert(import.node.clone()) {
                queue.push_back((import.node.clone(), Some((name.clone(), import.span))));
            }
        }
        modules.push(LoadedModule { name, file_id, ast });
    }

    Ok(LoadedProgram { entry: entry.to_string(), modules })
}
