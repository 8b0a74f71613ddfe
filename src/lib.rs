pub mod span;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod typeck;
pub mod codegen;
pub mod modules;
pub mod prelude;
pub mod manifest;

use std::path::{Path, PathBuf};

use tracing::debug;

use codegen::ir::ProgramIr;
use diagnostics::CompileError;
use manifest::Emit;
use modules::{MemorySource, ModuleSource, SourceMap};
use typeck::FunctionTable;

/// Load `entry` and its imports, then generate every function they declare.
pub fn generate_program(
    entry: &str,
    source: &dyn ModuleSource,
    sources: &mut SourceMap,
) -> Result<ProgramIr, CompileError> {
    let program = modules::load_program(entry, source, sources)?;
    let table = FunctionTable::from_program(&program)?;
    codegen::generate(&program, &table)
}

/// Generate a single in-memory module named `main`. Used by tests.
pub fn generate_source(text: &str) -> Result<ProgramIr, CompileError> {
    let source = MemorySource::new().with("main", text);
    let mut sources = SourceMap::new();
    generate_program("main", &source, &mut sources)
}

/// Write the requested outputs for `program` into `out_dir`, returning the paths written.
///
/// Everything is rendered before the first file is created.
pub fn write_outputs(program: &ProgramIr, out_dir: &Path, emit: &[Emit]) -> Result<Vec<PathBuf>, CompileError> {
    let mut files: Vec<(PathBuf, String)> = Vec::new();
    for kind in emit {
        match kind {
            Emit::C => {
                let rendered = codegen::render::render_c(program);
                files.push((out_dir.join(format!("{}.h", program.entry)), rendered.header));
                files.push((out_dir.join(format!("{}.c", program.entry)), rendered.source));
            }
            Emit::Ir => {
                let json = serde_json::to_string_pretty(program)
                    .map_err(|e| CompileError::output(format!("failed to serialize IR: {e}")))?;
                files.push((out_dir.join(format!("{}.ir.json", program.entry)), json));
            }
        }
    }

    std::fs::create_dir_all(out_dir).map_err(|e| {
        CompileError::output(format!("could not create '{}': {e}", out_dir.display()))
    })?;

    // Stage every file next to its destination, then move them all into place.
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
    for (path, contents) in files {
        let temp = staging_path(&path);
        if let Err(e) = std::fs::write(&temp, contents) {
            discard(staged.iter().map(|(temp, _)| temp).chain([&temp]));
            return Err(CompileError::output(format!("could not write '{}': {e}", path.display())));
        }
        staged.push((temp, path));
    }

    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (i, (temp, path)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(temp, path) {
            discard(written.iter().chain(staged[i..].iter().map(|(temp, _)| temp)));
            return Err(CompileError::output(format!("could not write '{}': {e}", path.display())));
        }
        debug!(path = %path.display(), "wrote output");
        written.push(path.clone());
    }
    Ok(written)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Best-effort removal of partial output after a failed write.
fn discard<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}
