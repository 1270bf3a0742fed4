// Manifest parser - mod.info

use anyhow::{Context, Result};
use pipewrench_diagnostics::{error_codes, fuzzy, Diagnostic, Span};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const MANIFEST_FILE: &str = "mod.info";

const KNOWN_KEYS: [&str; 6] = ["id", "name", "poster", "description", "url", "require"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("{file} is missing required field(s): {}", .fields.join(", "))]
    MissingFields {
        file: String,
        fields: Vec<&'static str>,
    },
}

/// Mod identity, read from `mod.info` (`key=value` lines)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub poster: String,
    pub description: String,
    pub url: Option<String>,
    pub require: Vec<String>,
    /// Keys this tool does not interpret, kept in file order
    pub extra: Vec<(String, String)>,
}

impl Manifest {
    /// Parse mod.info from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(Self::parse(&content, &path.display().to_string())?)
    }

    /// Parse mod.info content. Every missing required field is reported at once.
    pub fn parse(content: &str, file: &str) -> Result<Self, ManifestError> {
        let mut id = None;
        let mut name = None;
        let mut poster = None;
        let mut description = None;
        let mut url = None;
        let mut require = Vec::new();
        let mut extra = Vec::new();

        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "id" => id = Some(value),
                "name" => name = Some(value),
                "poster" => poster = Some(value),
                "description" => description = Some(value),
                "url" => url = Some(value),
                "require" => {
                    require = value
                        .split(',')
                        .map(str::trim)
                        .filter(|entry| !entry.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                _ => extra.push((key.trim().to_string(), value)),
            }
        }

        let mut missing = Vec::new();
        for (field, value) in [
            ("id", &id),
            ("name", &name),
            ("poster", &poster),
            ("description", &description),
        ] {
            if value.as_deref().map_or(true, str::is_empty) {
                missing.push(field);
            }
        }

        if !missing.is_empty() {
            return Err(ManifestError::MissingFields {
                file: file.to_string(),
                fields: missing,
            });
        }

        Ok(Self {
            id: id.unwrap_or_default(),
            name: name.unwrap_or_default(),
            poster: poster.unwrap_or_default(),
            description: description.unwrap_or_default(),
            url,
            require,
            extra,
        })
    }

    /// Write mod.info (CRLF, as the game ships it)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(&path, self.to_string())
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Warnings for keys that look like misspelled known keys
    pub fn lint(&self, file: &str) -> Vec<Diagnostic> {
        self.extra
            .iter()
            .filter_map(|(key, _)| {
                let similar =
                    fuzzy::find_similar_names(&key.to_ascii_lowercase(), &KNOWN_KEYS, 0.85, 1);
                let suggestion = similar.first()?;
                Some(
                    Diagnostic::warning(
                        error_codes::UNKNOWN_MANIFEST_KEY,
                        format!("unknown key `{}` in {}", key, MANIFEST_FILE),
                        Span::new(file.to_string(), 0, 0, 0),
                    )
                    .with_help(format!("did you mean `{}`?", suggestion)),
                )
            })
            .collect()
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut lines = vec![
            format!("name={}", self.name),
            format!("poster={}", self.poster),
            format!("id={}", self.id),
            format!("description={}", self.description),
        ];

        if let Some(url) = &self.url {
            lines.push(format!("url={}", url));
        }
        if !self.require.is_empty() {
            lines.push(format!("require={}", self.require.join(",")));
        }
        for (key, value) in &self.extra {
            lines.push(format!("{}={}", key, value));
        }

        write!(f, "{}", lines.join("\r\n"))
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            id: "MyFirst".to_string(),
            name: "My First Mod".to_string(),
            poster: "poster.png".to_string(),
            description: "ModDescription".to_string(),
            url: Some("https://theindiestone.com".to_string()),
            require: Vec::new(),
            extra: Vec::new(),
        }
    }
}
