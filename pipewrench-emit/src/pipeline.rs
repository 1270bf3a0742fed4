// Emission pipeline
// Per unit: skip filters -> output path -> require rewriting -> boot reimport -> write

use crate::layout::{resolve_output_path, OutputLayout, ResolvedOutput, UnitKind};
use crate::path::normalize;
use crate::reference::rewrite_references;
use crate::reimport::{ReimportPlan, ReimportTemplate};
use crate::scope::Scope;
use pipewrench_diagnostics::{error_codes, Diagnostic, Span};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// One file handed back by the external compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Normalized path relative to the compiler's output root
    pub declared_path: String,
    pub generated_text: String,
    /// Classified from the declared path, never changes afterwards
    pub scope: Scope,
}

impl CompiledUnit {
    pub fn new(declared_path: &str, generated_text: impl Into<String>) -> Self {
        let declared_path = normalize(declared_path);
        Self {
            scope: Scope::classify(&declared_path),
            declared_path,
            generated_text: generated_text.into(),
        }
    }

    /// Type declarations have no runtime meaning
    pub fn is_declaration(&self) -> bool {
        self.declared_path.to_ascii_lowercase().ends_with(".d.ts")
    }

    fn skip_reason(&self) -> Option<SkipReason> {
        if self.generated_text.is_empty() {
            Some(SkipReason::Empty)
        } else if self.is_declaration() {
            Some(SkipReason::Declaration)
        } else {
            None
        }
    }
}

/// Read-only inputs shared by every unit of a pass
#[derive(Debug, Clone)]
pub struct EmitContext {
    pub layout: OutputLayout,
    pub template: ReimportTemplate,
}

impl EmitContext {
    pub fn new(layout: OutputLayout, template: ReimportTemplate) -> Self {
        Self { layout, template }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Placeholder output of a side-effect free source file
    Empty,
    /// `.d.ts` artifact
    Declaration,
}

#[derive(Debug, Clone)]
pub enum EmitOutcome {
    Skipped {
        declared: String,
        reason: SkipReason,
    },
    Written {
        declared: String,
        output: ResolvedOutput,
        diagnostics: Vec<Diagnostic>,
        /// Number of bridge bindings replayed on boot
        rebound: usize,
    },
}

impl EmitOutcome {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            EmitOutcome::Written { diagnostics, .. } => diagnostics,
            EmitOutcome::Skipped { .. } => &[],
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, EmitOutcome::Written { .. })
    }
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{first}` and `{second}` both resolve to {}", .path.display())]
    Collision {
        path: PathBuf,
        first: String,
        second: String,
    },
}

impl EmitError {
    /// Report form of an error that is about the compiled units rather than the disk
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            EmitError::Collision {
                path,
                first,
                second,
            } => Some(
                Diagnostic::error(
                    error_codes::OUTPUT_COLLISION,
                    format!("`{}` and `{}` resolve to the same output file", first, second),
                    Span::from_path(path),
                )
                .with_help(format!("rename one of them so only one writes {}", path.display())),
            ),
            EmitError::CreateDir { .. } | EmitError::Write { .. } => None,
        }
    }
}

/// Final text for a unit, plus the diagnostics raised and how many bindings got rebound
pub fn transform_unit(
    unit: &CompiledUnit,
    output: &ResolvedOutput,
    template: &ReimportTemplate,
) -> (String, Vec<Diagnostic>, usize) {
    let mut diagnostics = Vec::new();

    if output.kind == UnitKind::RuntimeBundle {
        return (unit.generated_text.clone(), diagnostics, 0);
    }

    if output.kind == UnitKind::Unscoped {
        diagnostics.push(
            Diagnostic::warning(
                error_codes::UNLOADABLE_OUTPUT,
                format!("`{}` is outside client/server/shared", unit.declared_path),
                Span::new(unit.declared_path.clone(), 0, 0, 0),
            )
            .with_note(
                "the game only loads Lua from media/lua/{client,server,shared}".to_string(),
            ),
        );
    }

    let rewritten = rewrite_references(unit.scope, &unit.generated_text, &unit.declared_path);
    diagnostics.extend(rewritten.diagnostics);

    let plan = ReimportPlan::analyze(&rewritten.text, template);
    let text = plan.render(&rewritten.text, template);

    (text, diagnostics, plan.bindings.len())
}

/// Run one unit through the pipeline and write it
pub fn emit_unit(unit: &CompiledUnit, ctx: &EmitContext) -> Result<EmitOutcome, EmitError> {
    if let Some(reason) = unit.skip_reason() {
        log::debug!("skipping {} ({:?})", unit.declared_path, reason);
        return Ok(EmitOutcome::Skipped {
            declared: unit.declared_path.clone(),
            reason,
        });
    }

    let output = resolve_output_path(&unit.declared_path, &ctx.layout);
    let (text, diagnostics, rebound) = transform_unit(unit, &output, &ctx.template);

    if let Some(parent) = output.path.parent() {
        fs::create_dir_all(parent).map_err(|source| EmitError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&output.path, text).map_err(|source| EmitError::Write {
        path: output.path.clone(),
        source,
    })?;

    log::debug!("{} -> {}", unit.declared_path, output.path.display());

    Ok(EmitOutcome::Written {
        declared: unit.declared_path.clone(),
        output,
        diagnostics,
        rebound,
    })
}

/// Fail when two units that will be written land on the same file. Several runtime
/// bundles folding into one is expected.
pub fn check_collisions(units: &[CompiledUnit], layout: &OutputLayout) -> Result<(), EmitError> {
    let mut claimed: HashMap<PathBuf, &str> = HashMap::new();

    for unit in units.iter().filter(|u| u.skip_reason().is_none()) {
        let output = resolve_output_path(&unit.declared_path, layout);
        if output.kind == UnitKind::RuntimeBundle {
            continue;
        }

        if let Some(first) = claimed.insert(output.path.clone(), &unit.declared_path) {
            return Err(EmitError::Collision {
                path: output.path,
                first: first.to_string(),
                second: unit.declared_path.clone(),
            });
        }
    }

    Ok(())
}

/// Emit a whole batch. Units are independent and written in parallel; the call returns
/// once every file is on disk.
pub fn emit_all(
    units: &[CompiledUnit],
    ctx: &EmitContext,
) -> Result<Vec<EmitOutcome>, EmitError> {
    check_collisions(units, &ctx.layout)?;

    units
        .par_iter()
        .map(|unit| emit_unit(unit, ctx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(dir: &std::path::Path) -> EmitContext {
        EmitContext::new(OutputLayout::new(dir, "Mod"), ReimportTemplate::default())
    }

    #[test]
    fn test_unit_scope_from_declared_path() {
        assert_eq!(CompiledUnit::new(r"client\A.lua", "x").scope, Scope::Client);
        assert_eq!(CompiledUnit::new("lualib_bundle.lua", "x").scope, Scope::None);
        assert!(CompiledUnit::new("shared/Types.d.ts", "x").is_declaration());
    }

    #[test]
    fn test_skips_empty_and_declaration_units() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let empty = emit_unit(&CompiledUnit::new("client/_.lua", ""), &ctx).unwrap();
        assert!(matches!(
            empty,
            EmitOutcome::Skipped {
                reason: SkipReason::Empty,
                ..
            }
        ));

        let unit = CompiledUnit::new("shared/A.d.ts", "declare const a: number;");
        let decl = emit_unit(&unit, &ctx).unwrap();
        assert!(matches!(
            decl,
            EmitOutcome::Skipped {
                reason: SkipReason::Declaration,
                ..
            }
        ));

        assert!(!dir.path().join("Mod").exists());
    }

    #[test]
    fn test_runtime_bundle_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let text = "local x = require(\"shared.Foo\")\nlocal a = ____PipeWrench.A\nreturn x";

        emit_unit(&CompiledUnit::new("lualib_bundle.lua", text), &ctx).unwrap();

        let bundle = dir.path().join("Mod/media/lua/shared/lualib_bundle.lua");
        assert_eq!(fs::read_to_string(bundle).unwrap(), text);
    }

    #[test]
    fn test_overwrites_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        emit_unit(&CompiledUnit::new("client/A.lua", "first"), &ctx).unwrap();
        emit_unit(&CompiledUnit::new("client/A.lua", "second"), &ctx).unwrap();

        let written = fs::read_to_string(dir.path().join("Mod/media/lua/client/A.lua")).unwrap();
        assert_eq!(written, "second");
    }

    #[test]
    fn test_unscoped_unit_warns() {
        let unit = CompiledUnit::new("index.lua", "return 1");
        let output = resolve_output_path(&unit.declared_path, &OutputLayout::new("/o", "Mod"));
        let (_, diagnostics, _) = transform_unit(&unit, &output, &ReimportTemplate::default());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, error_codes::UNLOADABLE_OUTPUT);
    }

    #[test]
    fn test_collision_detected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let units = vec![
            CompiledUnit::new("shared/json.lua", "return 1"),
            CompiledUnit::new("node_modules/json.lua", "return 2"),
        ];

        let err = emit_all(&units, &ctx).unwrap_err();
        assert!(matches!(err, EmitError::Collision { .. }));
        assert!(!dir.path().join("Mod").exists());

        let diagnostic = err.diagnostic().unwrap();
        assert_eq!(diagnostic.code, error_codes::OUTPUT_COLLISION);
        assert!(diagnostic.message.contains("node_modules/json.lua"));
        assert!(diagnostic.span.file.ends_with("shared/json.lua"));
    }

    #[test]
    fn test_external_module_checked_against_declaring_scope() {
        let unit = CompiledUnit::new(
            "client/node_modules/x.lua",
            "local S = require(\"server.Secret\")\nreturn S",
        );
        let output = resolve_output_path(&unit.declared_path, &OutputLayout::new("/o", "Mod"));
        assert_eq!(output.scope, Scope::Shared);

        let (text, diagnostics, _) = transform_unit(&unit, &output, &ReimportTemplate::default());
        assert_eq!(text, "local S = require('Secret')\nreturn S");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, error_codes::CROSS_SCOPE_REFERENCE);
        assert_eq!(diagnostics[0].span.file, "client/node_modules/x.lua");
    }

    #[test]
    fn test_bundles_may_fold_together() {
        let units = vec![
            CompiledUnit::new("lualib_bundle.lua", "a"),
            CompiledUnit::new("client/lualib_bundle.lua", "a"),
        ];
        assert!(check_collisions(&units, &OutputLayout::new("/o", "Mod")).is_ok());
    }
}
