use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostics::CompileError;

pub const MANIFEST_FILE: &str = "hang10.toml";

/// Output format written by `build`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Emit {
    C,
    Ir,
}

/// Resolved build settings for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub name: String,
    pub entry: String,
    pub source_dir: PathBuf,
    pub out_dir: PathBuf,
    pub emit: Vec<Emit>,
}

// ---- TOML deserialization types ----

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlManifest {
    package: Option<TomlPackage>,
    #[serde(default)]
    build: TomlBuild,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlPackage {
    name: Option<String>,
    entry: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct TomlBuild {
    source_dir: Option<String>,
    out_dir: Option<String>,
    emit: Option<Vec<Emit>>,
}

fn is_module_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl BuildConfig {
    /// Settings for a single source file: its stem is the entry module.
    pub fn for_file(path: &Path) -> Result<Self, CompileError> {
        let entry = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| is_module_name(s))
            .ok_or_else(|| {
                CompileError::output(format!("'{}' is not a valid module file name", path.display()))
            })?
            .to_string();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self {
            name: entry.clone(),
            entry,
            out_dir: dir.join("build"),
            source_dir: dir,
            emit: vec![Emit::C],
        })
    }

    /// Read `<dir>/hang10.toml`. Relative directories are resolved against `dir`.
    pub fn load(dir: &Path) -> Result<Self, CompileError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&manifest_path).map_err(|e| {
            CompileError::manifest(format!("{MANIFEST_FILE}: could not read file: {e}"), manifest_path.clone())
        })?;
        Self::parse(&content, dir, &manifest_path)
    }

    pub fn parse(content: &str, dir: &Path, manifest_path: &Path) -> Result<Self, CompileError> {
        let err = |msg: String| CompileError::manifest(msg, manifest_path.to_path_buf());

        let manifest: TomlManifest =
            toml::from_str(content).map_err(|e| err(format!("{MANIFEST_FILE}: invalid syntax: {e}")))?;

        let package = manifest
            .package
            .ok_or_else(|| err(format!("{MANIFEST_FILE}: missing [package] section")))?;
        let name = package
            .name
            .ok_or_else(|| err(format!("{MANIFEST_FILE}: missing 'name' in [package]")))?;
        if name.trim().is_empty() {
            return Err(err(format!("{MANIFEST_FILE}: package name must not be empty")));
        }
        let entry = package.entry.unwrap_or_else(|| "main".to_string());
        if !is_module_name(&entry) {
            return Err(err(format!("{MANIFEST_FILE}: entry '{entry}' is not a module name")));
        }

        let emit = manifest.build.emit.unwrap_or_else(|| vec![Emit::C]);
        if emit.is_empty() {
            return Err(err(format!("{MANIFEST_FILE}: 'emit' must name at least one output")));
        }

        Ok(Self {
            name,
            entry,
            source_dir: dir.join(manifest.build.source_dir.as_deref().unwrap_or(".")),
            out_dir: dir.join(manifest.build.out_dir.as_deref().unwrap_or("build")),
            emit,
        })
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, out_dir: Option<PathBuf>, emit: &[Emit]) -> Self {
        if let Some(out_dir) = out_dir {
            self.out_dir = out_dir;
        }
        if !emit.is_empty() {
            let mut emit = emit.to_vec();
            emit.sort();
            emit.dedup();
            self.emit = emit;
        }
        self
    }
}
