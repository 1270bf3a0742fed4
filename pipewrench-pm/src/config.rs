// Project configuration: pipewrench.json + mod.info

use crate::manifest::{Manifest, MANIFEST_FILE};
use anyhow::{Context, Result};
use pipewrench_emit::{OutputLayout, ReimportTemplate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "pipewrench.json";

const SCHEMA: &str = include_str!("../schemas/pipewrench.schema.json");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{file} is not valid JSON: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{file} failed validation:\n{}", bullet_list(.violations))]
    Invalid {
        file: String,
        violations: Vec<String>,
    },
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  - {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Contents of `pipewrench.json`. Every field is optional on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PipeWrenchConfig {
    pub out_dir: String,
    pub models_dir: String,
    pub textures_dir: String,
    pub sound_dir: String,
    pub scripts_dir: String,
    /// Lua files copied into the shared folder on every build
    pub runtime_libraries: Vec<String>,
    pub external_module_dir: String,
    /// Command line running TypeScriptToLua
    pub compiler: String,
    pub bridge_alias: String,
    pub boot_event: String,
}

impl Default for PipeWrenchConfig {
    fn default() -> Self {
        let template = ReimportTemplate::default();
        Self {
            out_dir: "dist".to_string(),
            models_dir: "src/models".to_string(),
            textures_dir: "src/textures".to_string(),
            sound_dir: "src/sound".to_string(),
            scripts_dir: "src/scripts".to_string(),
            runtime_libraries: ["PipeWrench", "PipeWrench-Events", "PipeWrench-Utils"]
                .iter()
                .map(|pkg| format!("node_modules/@shughesuk/{}/{}.lua", pkg.to_lowercase(), pkg))
                .collect(),
            external_module_dir: OutputLayout::DEFAULT_EXTERNAL_MODULE_DIR.to_string(),
            compiler: "npx tstl".to_string(),
            bridge_alias: template.bridge_alias,
            boot_event: template.boot_event,
        }
    }
}

impl PipeWrenchConfig {
    /// Parse and validate against the embedded schema. All violations are collected.
    pub fn parse(content: &str, file: &str) -> Result<Self, ConfigError> {
        let json = |source| ConfigError::Json {
            file: file.to_string(),
            source,
        };

        let instance: Value = serde_json::from_str(content).map_err(json)?;
        let violations = validate(&instance);
        if !violations.is_empty() {
            return Err(ConfigError::Invalid {
                file: file.to_string(),
                violations,
            });
        }

        serde_json::from_value(instance).map_err(json)
    }

    /// Load from file, falling back to defaults when the file is absent
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(Self::parse(&content, &path.display().to_string())?)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;

        Ok(())
    }
}

#[allow(deprecated)]
fn validate(instance: &Value) -> Vec<String> {
    let schema: Value = match serde_json::from_str(SCHEMA) {
        Ok(schema) => schema,
        Err(e) => return vec![format!("embedded schema is not valid JSON: {}", e)],
    };
    let compiled = match jsonschema::JSONSchema::compile(&schema) {
        Ok(compiled) => compiled,
        Err(e) => return vec![format!("embedded schema does not compile: {}", e)],
    };

    let result = compiled.validate(instance);
    match result {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|error| {
                let at = error.instance_path.to_string();
                if at.is_empty() {
                    error.to_string()
                } else {
                    format!("{}: {}", at, error)
                }
            })
            .collect(),
    }
}

/// Everything a build needs to know about a project
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub manifest: Manifest,
    pub settings: PipeWrenchConfig,
}

impl ProjectConfig {
    /// Read `pipewrench.json` (optional) and `mod.info` (required) under `root`
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let settings = PipeWrenchConfig::from_file(root.join(CONFIG_FILE))?;

        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            anyhow::bail!(
                "{} not found in {}. Run 'pipewrench init' first.",
                MANIFEST_FILE,
                root.display()
            );
        }
        let manifest = Manifest::from_file(&manifest_path)?;

        Ok(Self {
            root,
            manifest,
            settings,
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.settings.out_dir)
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(self.out_dir(), &self.manifest.id)
            .with_external_module_dir(self.settings.external_module_dir.clone())
    }

    pub fn template(&self) -> ReimportTemplate {
        ReimportTemplate::new(
            self.settings.bridge_alias.clone(),
            self.settings.boot_event.clone(),
        )
    }

    /// Asset source folders paired with their folder name under `media/`
    pub fn asset_dirs(&self) -> Vec<(PathBuf, &'static str)> {
        vec![
            (self.root.join(&self.settings.models_dir), "models"),
            (self.root.join(&self.settings.textures_dir), "textures"),
            (self.root.join(&self.settings.sound_dir), "sound"),
            (self.root.join(&self.settings.scripts_dir), "scripts"),
        ]
    }

    pub fn runtime_libraries(&self) -> Vec<PathBuf> {
        self.settings
            .runtime_libraries
            .iter()
            .map(|lib| self.root.join(lib))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = PipeWrenchConfig::parse("{}", CONFIG_FILE).unwrap();
        assert_eq!(config, PipeWrenchConfig::default());
        assert_eq!(config.out_dir, "dist");
        assert_eq!(
            config.runtime_libraries[0],
            "node_modules/@shughesuk/pipewrench/PipeWrench.lua"
        );
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config =
            PipeWrenchConfig::parse(r#"{"outDir": "build", "bootEvent": "OnBoot"}"#, CONFIG_FILE)
                .unwrap();
        assert_eq!(config.out_dir, "build");
        assert_eq!(config.boot_event, "OnBoot");
        assert_eq!(config.sound_dir, "src/sound");
    }

    #[test]
    fn test_every_violation_reported() {
        let err = PipeWrenchConfig::parse(
            r#"{"outDir": 3, "modInfo": {}, "bridgeAlias": "not an ident"}"#,
            CONFIG_FILE,
        )
        .unwrap_err();

        assert!(
            matches!(&err, ConfigError::Invalid { violations, .. } if violations.len() == 3),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_malformed_json() {
        let err = PipeWrenchConfig::parse("{ outDir", CONFIG_FILE).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipeWrenchConfig::from_file(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, PipeWrenchConfig::default());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = PipeWrenchConfig::default();
        config.out_dir = "out".to_string();
        config.to_file(&path).unwrap();

        assert_eq!(PipeWrenchConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_project_requires_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("mod.info not found"));
    }

    #[test]
    fn test_project_layout_uses_mod_id() {
        let dir = tempfile::tempdir().unwrap();
        Manifest::default().to_file(dir.path().join(MANIFEST_FILE)).unwrap();

        let project = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(project.layout().mod_dir, dir.path().join("dist").join("MyFirst"));
        assert_eq!(project.template(), ReimportTemplate::default());
        assert_eq!(project.asset_dirs()[2].1, "sound");
    }
}
