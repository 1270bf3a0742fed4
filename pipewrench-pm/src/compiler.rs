// TypeScriptToLua bridge
//
// The compiler runs against a generated tsconfig that extends the project's own, inside a
// throwaway staging directory. Emitted files are read back as `CompiledUnit`s; nothing is
// written into the mod tree from here.

use pipewrench_emit::{normalize, CompiledUnit};
use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("no compiler command configured")]
    EmptyCommand,

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}\n{output}")]
    Failed {
        command: String,
        status: String,
        output: String,
    },

    #[error("failed to prepare compiler staging directory: {0}")]
    Staging(#[source] io::Error),

    #[error("failed to read compiler output {}: {source}", .path.display())]
    ReadOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One compiler invocation
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub project_root: PathBuf,
    /// Root every declared path is relative to
    pub src_dir: PathBuf,
    /// `src/{client,server,shared}`, merged into one module namespace
    pub scope_roots: Vec<PathBuf>,
    pub declarations: bool,
}

/// Seam between the orchestrator and whatever produces Lua
pub trait ExternalCompiler {
    /// Compile the whole source tree. Declared paths are relative to `request.src_dir`.
    fn compile(&self, request: &CompileRequest) -> Result<Vec<CompiledUnit>, CompilerError>;

    /// Emit the project's type declarations as a single text
    fn declarations(&self, request: &CompileRequest) -> Result<String, CompilerError>;
}

impl<T: ExternalCompiler + ?Sized> ExternalCompiler for &T {
    fn compile(&self, request: &CompileRequest) -> Result<Vec<CompiledUnit>, CompilerError> {
        (**self).compile(request)
    }

    fn declarations(&self, request: &CompileRequest) -> Result<String, CompilerError> {
        (**self).declarations(request)
    }
}

#[derive(Debug, Clone)]
pub struct TstlCompiler {
    command: String,
    declaration_command: String,
}

impl TstlCompiler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            declaration_command: "npx tsc".to_string(),
        }
    }

    /// Generated tsconfig, pointing the compiler at `out_dir`
    fn tsconfig(request: &CompileRequest, out_dir: &Path) -> serde_json::Value {
        let src = normalize(&request.src_dir.to_string_lossy());
        let root_dirs: Vec<String> = request
            .scope_roots
            .iter()
            .map(|root| normalize(&root.to_string_lossy()))
            .collect();

        let mut config = json!({
            "compilerOptions": {
                "rootDir": src,
                "rootDirs": root_dirs,
                "outDir": normalize(&out_dir.to_string_lossy()),
                "declaration": request.declarations,
            },
            "include": [format!("{}/**/*", src)],
            "tstl": {
                "luaTarget": "5.1",
            },
        });

        let project_tsconfig = request.project_root.join("tsconfig.json");
        if project_tsconfig.exists() {
            config["extends"] = json!(normalize(&project_tsconfig.to_string_lossy()));
        }

        config
    }

    fn run(&self, command: &str, args: &[String], cwd: &Path) -> Result<(), CompilerError> {
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(CompilerError::EmptyCommand)?;
        let display = format!("{} {}", command, args.join(" "));

        log::debug!("running {}", display);
        let output = Command::new(program)
            .args(parts)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|source| CompilerError::Spawn {
                command: display.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(CompilerError::Failed {
                command: display,
                status: output.status.to_string(),
                output: text.trim_end().to_string(),
            });
        }

        Ok(())
    }

    fn write_tsconfig(
        staging: &Path,
        config: &serde_json::Value,
    ) -> Result<PathBuf, CompilerError> {
        let path = staging.join("tsconfig.json");
        let text = serde_json::to_string_pretty(config)
            .map_err(|e| CompilerError::Staging(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(&path, text).map_err(CompilerError::Staging)?;
        Ok(path)
    }
}

impl ExternalCompiler for TstlCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<Vec<CompiledUnit>, CompilerError> {
        let staging = tempfile::Builder::new()
            .prefix("pipewrench-")
            .tempdir()
            .map_err(CompilerError::Staging)?;
        let out_dir = staging.path().join("out");

        let tsconfig = Self::write_tsconfig(staging.path(), &Self::tsconfig(request, &out_dir))?;
        let args = vec!["--project".to_string(), tsconfig.to_string_lossy().into_owned()];
        self.run(&self.command, &args, &request.project_root)?;

        collect_units(&out_dir)
    }

    fn declarations(&self, request: &CompileRequest) -> Result<String, CompilerError> {
        let staging = tempfile::Builder::new()
            .prefix("pipewrench-")
            .tempdir()
            .map_err(CompilerError::Staging)?;
        let out_file = staging.path().join("declarations.d.ts");

        let tsconfig = Self::write_tsconfig(
            staging.path(),
            &Self::tsconfig(request, &staging.path().join("out")),
        )?;
        let args = vec![
            "--declaration".to_string(),
            "--emitDeclarationOnly".to_string(),
            "--outFile".to_string(),
            out_file.to_string_lossy().into_owned(),
            "-p".to_string(),
            tsconfig.to_string_lossy().into_owned(),
        ];
        self.run(&self.declaration_command, &args, &request.project_root)?;

        if !out_file.exists() {
            return Ok(String::new());
        }
        fs::read_to_string(&out_file).map_err(|source| CompilerError::ReadOutput {
            path: out_file,
            source,
        })
    }
}

/// Read every file under `out_dir` back as a unit, in path order
pub fn collect_units(out_dir: &Path) -> Result<Vec<CompiledUnit>, CompilerError> {
    if !out_dir.exists() {
        return Ok(Vec::new());
    }

    let mut units = Vec::new();
    for entry in WalkDir::new(out_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CompilerError::ReadOutput {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| out_dir.to_path_buf()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(out_dir).unwrap_or(path);
        let text = fs::read_to_string(path).map_err(|source| CompilerError::ReadOutput {
            path: path.to_path_buf(),
            source,
        })?;

        units.push(CompiledUnit::new(&relative.to_string_lossy(), text));
    }

    Ok(units)
}
