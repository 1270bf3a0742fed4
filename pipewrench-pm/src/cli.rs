// Project scaffolding

use crate::config::{PipeWrenchConfig, CONFIG_FILE};
use crate::manifest::{Manifest, MANIFEST_FILE};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const SOURCE_DIRS: [&str; 7] = [
    "sound", "textures", "models", "scripts", "client", "server", "shared",
];

const TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "esnext",
    "lib": ["esnext"],
    "moduleResolution": "node",
    "types": ["@shughesuk/pipewrench"],
    "strict": true
  },
  "tstl": {
    "luaTarget": "5.1"
  }
}
"#;

/// Scaffold a PipeWrench mod in `path` (created if missing)
pub fn init_project(path: Option<PathBuf>) -> Result<PathBuf> {
    let project_path = path.unwrap_or_else(|| PathBuf::from("."));

    let manifest_path = project_path.join(MANIFEST_FILE);
    if manifest_path.exists() {
        anyhow::bail!("{} already exists in {}", MANIFEST_FILE, project_path.display());
    }

    create_project_structure(&project_path)?;
    Manifest::default().to_file(&manifest_path)?;

    let config_path = project_path.join(CONFIG_FILE);
    if !config_path.exists() {
        PipeWrenchConfig::default().to_file(&config_path)?;
    }

    let tsconfig_path = project_path.join("tsconfig.json");
    if !tsconfig_path.exists() {
        fs::write(&tsconfig_path, TSCONFIG)
            .with_context(|| format!("Failed to write {}", tsconfig_path.display()))?;
    }

    println!("✅ Initialized PipeWrench mod in {}", project_path.display());
    println!("\nNext steps:");
    println!("   edit {}", MANIFEST_FILE);
    println!("   pipewrench build");

    Ok(project_path)
}

fn create_project_structure(path: &Path) -> Result<()> {
    let src_dir = path.join("src");
    for dir in SOURCE_DIRS {
        let dir = src_dir.join(dir);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    Ok(())
}
