// Verbatim copies into the mod tree: loose Lua, assets, runtime libraries, mod.info

use crate::config::ProjectConfig;
use crate::status::Stage;
use anyhow::{Context, Result};
use pipewrench_diagnostics::{error_codes, Diagnostic, Span};
use pipewrench_emit::Scope;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Copy one file, creating parent directories
pub fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    Stage::Compiler.info(format!(
        "Copying \"{}\" to \"{}\"..",
        source.display(),
        destination.display()
    ));

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::copy(source, destination).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            source.display(),
            destination.display()
        )
    })?;

    Ok(())
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ts"))
}

/// Mirror every file under `source_dir` into `dest_dir`. With `skip_sources`, `.ts` files
/// are left to the compiler. Returns the number of files copied.
pub fn mirror_dir(source_dir: &Path, dest_dir: &Path, skip_sources: bool) -> Result<usize> {
    if !source_dir.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", source_dir.display()))?;
        if !entry.file_type().is_file() || (skip_sources && is_source(entry.path())) {
            continue;
        }

        let relative = entry.path().strip_prefix(source_dir).unwrap_or(entry.path());
        copy_file(entry.path(), &dest_dir.join(relative))?;
        copied += 1;
    }

    Ok(copied)
}

/// Loose (non-`.ts`) files of each scope folder
pub fn copy_scope_files(project: &ProjectConfig) -> Result<usize> {
    let layout = project.layout();
    let mut copied = 0;

    for scope in Scope::FOLDERS {
        let folder = scope.folder().unwrap_or_default();
        copied += mirror_dir(
            &project.src_dir().join(folder),
            &layout.scope_dir(scope),
            true,
        )?;
    }

    Ok(copied)
}

/// models, textures, sound and scripts under `media/`
pub fn copy_asset_dirs(project: &ProjectConfig) -> Result<usize> {
    let media = project.layout().media_dir();
    let mut copied = 0;

    for (source, kind) in project.asset_dirs() {
        copied += mirror_dir(&source, &media.join(kind), false)?;
    }

    Ok(copied)
}

/// Runtime Lua libraries into the shared folder. Missing ones become warnings.
pub fn copy_runtime_libraries(project: &ProjectConfig) -> Result<Vec<Diagnostic>> {
    let shared = project.layout().scope_dir(Scope::Shared);
    let mut warnings = Vec::new();

    for library in project.runtime_libraries() {
        let Some(name) = library.file_name() else {
            continue;
        };

        if !library.is_file() {
            warnings.push(
                Diagnostic::warning(
                    error_codes::MISSING_RUNTIME_LIBRARY,
                    format!("runtime library {} not found", library.display()),
                    Span::from_path(&library),
                )
                .with_help("run `npm install` in the project root".to_string()),
            );
            continue;
        }

        copy_file(&library, &shared.join(name))?;
    }

    Ok(warnings)
}

/// mod.info, plus the poster when it exists
pub fn copy_manifest(project: &ProjectConfig) -> Result<()> {
    let mod_dir = project.layout().mod_dir;
    fs::create_dir_all(&mod_dir)
        .with_context(|| format!("Failed to create directory: {}", mod_dir.display()))?;

    project
        .manifest
        .to_file(mod_dir.join(crate::manifest::MANIFEST_FILE))?;

    let poster = project.root.join(&project.manifest.poster);
    if poster.is_file() {
        copy_file(&poster, &mod_dir.join(&project.manifest.poster))?;
    }

    Ok(())
}
