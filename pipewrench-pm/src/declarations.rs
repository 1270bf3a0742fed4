// Single-file type declarations for other mods to build against

use crate::build::compile_request;
use crate::compiler::ExternalCompiler;
use crate::config::ProjectConfig;
use crate::status::Stage;
use anyhow::{Context, Result};
use pipewrench_emit::{normalize_path, Scope};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DECLARATION_HEADER: &str = "/** @noResolution @noSelfInFile */";

/// Hand-written `.d.ts` files under the scope folders, as (project-relative path, text)
pub fn collect_handwritten(project: &ProjectConfig) -> Result<Vec<(String, String)>> {
    let mut files = Vec::new();

    for scope in Scope::FOLDERS {
        let dir = project.src_dir().join(scope.folder().unwrap_or_default());
        if !dir.is_dir() {
            continue;
        }

        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
            let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
            if !entry.file_type().is_file() || !name.ends_with(".d.ts") {
                continue;
            }

            let text = fs::read_to_string(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            let relative = entry.path().strip_prefix(&project.root).unwrap_or(entry.path());
            files.push((normalize_path(relative), text));
        }
    }

    Ok(files)
}

fn strip_scope_prefix(line: &str) -> String {
    let mut line = line.to_string();

    for pattern in ["declare module \"", "from \""] {
        for scope in Scope::FOLDERS {
            let prefixed = format!("{}{}/", pattern, scope);
            if line.contains(&prefixed) {
                line = line.replacen(&prefixed, pattern, 1);
                break;
            }
        }
    }

    line
}

/// Merge compiler output with hand-written declarations. `None` when there is nothing
/// to export.
pub fn aggregate_declarations(generated: &str, handwritten: &[(String, String)]) -> Option<String> {
    let mut lines: Vec<&str> = generated
        .lines()
        .filter(|line| !line.is_empty())
        .filter(|line| !(line.contains("declare module ") && line.contains("{ }")))
        .collect();

    if lines.is_empty() && handwritten.is_empty() {
        return None;
    }

    let banners: Vec<String> = handwritten
        .iter()
        .map(|(path, _)| format!("/* File: {} */", path))
        .collect();

    let mut all = vec![DECLARATION_HEADER, ""];
    all.append(&mut lines);
    all.push("");
    for ((_, text), banner) in handwritten.iter().zip(&banners) {
        all.push(banner);
        all.extend(text.lines());
    }

    let mut output = all
        .into_iter()
        .map(strip_scope_prefix)
        .collect::<Vec<_>>()
        .join("\r\n");
    output.push_str("\r\n");

    Some(output)
}

/// `<out_dir>/<mod_id>.d.ts`
pub fn declaration_file(project: &ProjectConfig) -> PathBuf {
    project.out_dir().join(format!("{}.d.ts", project.manifest.id))
}

/// Run the compiler in declaration mode and write the aggregated file. Returns the file
/// written, or `None` when there was nothing to export.
pub fn build_declarations<C: ExternalCompiler>(
    project: &ProjectConfig,
    compiler: &C,
) -> Result<Option<PathBuf>> {
    let file = declaration_file(project);
    Stage::Compiler.success(format!(
        "Compiling project declarations.. (file: {})",
        file.display()
    ));

    let generated = compiler
        .declarations(&compile_request(project, true))
        .context("Failed to emit declarations")?;
    let handwritten = collect_handwritten(project)?;

    let Some(text) = aggregate_declarations(&generated, &handwritten) else {
        Stage::Compiler.info("No declarations to export.");
        remove_if_exists(&file)?;
        return Ok(None);
    };

    Stage::Compiler.success("Refactoring project declarations..");
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(&file, text).with_context(|| format!("Failed to write {}", file.display()))?;

    Ok(Some(file))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}
