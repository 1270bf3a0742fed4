// Build orchestration: one full pass from src/ to <out_dir>/<mod_id>

use crate::assets;
use crate::compiler::{CompileRequest, CompilerError, ExternalCompiler, TstlCompiler};
use crate::config::ProjectConfig;
use crate::status::Stage;
use anyhow::{Context, Result};
use pipewrench_diagnostics::DiagnosticEngine;
use pipewrench_emit::{emit_all, CompiledUnit, EmitContext, EmitError, EmitOutcome, Scope};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Name of the empty entry file placed in each scope folder while compiling
pub const ENTRY_MARKER: &str = "_.ts";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("compilation failed: {0}")]
    Compiler(#[from] CompilerError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error("failed to create entry marker {}: {source}", .path.display())]
    Marker {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a finished pass did
#[derive(Debug, Default)]
pub struct BuildReport {
    pub units_written: usize,
    pub units_skipped: usize,
    pub files_copied: usize,
    /// Warnings raised during the pass, with the compiled text they point into
    pub diagnostics: DiagnosticEngine,
    pub elapsed: Duration,
}

impl BuildReport {
    fn record(&mut self, units: &[CompiledUnit], outcomes: &[EmitOutcome]) {
        for unit in units {
            self.diagnostics
                .add_source(unit.declared_path.clone(), unit.generated_text.clone());
        }
        for outcome in outcomes {
            if outcome.is_written() {
                self.units_written += 1;
            } else {
                self.units_skipped += 1;
            }
            self.diagnostics.extend(outcome.diagnostics().iter().cloned());
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Compilation complete. Took {:.3} second(s). {} written, {} skipped, {} copied, \
             {} warning(s).",
            self.elapsed.as_secs_f64(),
            self.units_written,
            self.units_skipped,
            self.files_copied,
            self.diagnostics.warning_count()
        )
    }
}

/// Temporary `_.ts` files giving every compiler root an entry point.
///
/// Only markers this guard created are removed, and they are removed on drop so a failed
/// compile never leaves them behind.
#[derive(Debug)]
pub struct EntryMarkers {
    created: Vec<PathBuf>,
}

impl EntryMarkers {
    pub fn place(src_dir: &Path) -> Result<Self, BuildError> {
        let mut markers = Self { created: Vec::new() };

        for scope in Scope::FOLDERS {
            let folder = src_dir.join(scope.folder().unwrap_or_default());
            if !folder.is_dir() {
                continue;
            }

            let path = folder.join(ENTRY_MARKER);
            if path.exists() {
                continue;
            }

            // Markers placed so far are cleaned up by drop on early return
            fs::write(&path, "").map_err(|source| BuildError::Marker {
                path: path.clone(),
                source,
            })?;
            markers.created.push(path);
        }

        Ok(markers)
    }

    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }
}

impl Drop for EntryMarkers {
    fn drop(&mut self) {
        for path in &self.created {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Runs build passes for one project
pub struct Builder<C: ExternalCompiler> {
    root: PathBuf,
    compiler: C,
}

impl Builder<TstlCompiler> {
    /// Builder using the compiler command from the project's `pipewrench.json`
    pub fn for_project<P: AsRef<Path>>(root: P) -> Result<Self> {
        let project = ProjectConfig::load(&root)?;
        Ok(Self::new(
            root,
            TstlCompiler::new(project.settings.compiler.clone()),
        ))
    }
}

impl<C: ExternalCompiler> Builder<C> {
    pub fn new<P: AsRef<Path>>(root: P, compiler: C) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            compiler,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Current configuration; the manifest is re-read and re-validated every time
    pub fn project(&self) -> Result<ProjectConfig> {
        ProjectConfig::load(&self.root)
    }

    /// One full build pass
    pub fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let project = self.project()?;

        Stage::Compiler.success("Compiling project..");

        let mut report = BuildReport::default();
        report
            .diagnostics
            .extend(project.manifest.lint(&project.manifest_path().display().to_string()));

        assets::copy_manifest(&project)?;
        report.files_copied += assets::copy_scope_files(&project)?;
        report.files_copied += assets::copy_asset_dirs(&project)?;
        report
            .diagnostics
            .extend(assets::copy_runtime_libraries(&project)?);

        let units = {
            let _markers = EntryMarkers::place(&project.src_dir())?;
            self.compiler
                .compile(&compile_request(&project, false))
                .map_err(BuildError::from)?
        };
        log::debug!("compiler returned {} unit(s)", units.len());

        let ctx = EmitContext::new(project.layout(), project.template());
        let outcomes = match emit_all(&units, &ctx) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                report.diagnostics.extend(e.diagnostic());
                report.diagnostics.print_all();
                report.diagnostics.print_summary();
                return Err(BuildError::from(e)).with_context(|| {
                    format!("Failed to emit into {}", ctx.layout.mod_dir.display())
                });
            }
        };
        report.record(&units, &outcomes);

        report.diagnostics.print_all();
        report.diagnostics.print_summary();

        report.elapsed = started.elapsed();
        Stage::Compiler.success(&report);

        Ok(report)
    }
}

pub(crate) fn compile_request(project: &ProjectConfig, declarations: bool) -> CompileRequest {
    let src_dir = project.src_dir();
    CompileRequest {
        project_root: project.root.clone(),
        scope_roots: [Scope::Shared, Scope::Client, Scope::Server]
            .iter()
            .filter_map(|scope| scope.folder())
            .map(|folder| src_dir.join(folder))
            .collect(),
        src_dir,
        declarations,
    }
}
