use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::Level;

use hang10::diagnostics::{render_error, CompileError};
use hang10::manifest::{BuildConfig, Emit, MANIFEST_FILE};
use hang10::modules::{DirectorySource, SourceMap};

#[derive(Parser)]
#[command(name = "hang10c", version, about = "Generate resumable C activations from hang10 sources")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate C (or IR) for a source file or a project directory
    Build {
        /// A `.ht` file or a directory containing hang10.toml
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Output directory (overrides the manifest)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Output formats (overrides the manifest)
        #[arg(long, value_enum)]
        emit: Vec<Emit>,
    },
    /// Check that a source file or project generates without writing anything
    Check {
        /// A `.ht` file or a directory containing hang10.toml
        path: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

fn resolve_config(path: &Path) -> Result<BuildConfig, CompileError> {
    if path.is_dir() {
        if !path.join(MANIFEST_FILE).is_file() {
            return Err(CompileError::manifest(
                format!("no {MANIFEST_FILE} in '{}'", path.display()),
                path.join(MANIFEST_FILE),
            ));
        }
        BuildConfig::load(path)
    } else {
        BuildConfig::for_file(path)
    }
}

fn generate(config: &BuildConfig, sources: &mut SourceMap) -> Result<hang10::codegen::ir::ProgramIr, CompileError> {
    let source = DirectorySource::new(&config.source_dir);
    hang10::generate_program(&config.entry, &source, sources)
}

fn fail(sources: &SourceMap, err: &CompileError) -> ! {
    render_error(sources, err);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut sources = SourceMap::new();
    match cli.command {
        Commands::Build { path, out_dir, emit } => {
            let config = match resolve_config(&path) {
                Ok(config) => config.with_overrides(out_dir, &emit),
                Err(err) => fail(&sources, &err),
            };
            let program = generate(&config, &mut sources).unwrap_or_else(|err| fail(&sources, &err));
            match hang10::write_outputs(&program, &config.out_dir, &config.emit) {
                Ok(written) => {
                    for path in written {
                        eprintln!("wrote {}", path.display());
                    }
                }
                Err(err) => fail(&sources, &err),
            }
        }
        Commands::Check { path } => {
            let config = resolve_config(&path).unwrap_or_else(|err| fail(&sources, &err));
            match generate(&config, &mut sources) {
                Ok(program) => {
                    let generated = program.functions.iter().filter(|f| !f.is_native).count();
                    eprintln!("ok: {generated} function(s) generated from `{}`", config.entry);
                }
                Err(err) => fail(&sources, &err),
            }
        }
    }
}
