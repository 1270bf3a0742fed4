// Output placement
// Maps the path a compiled unit was declared at onto the mod's `media/lua` tree.

use crate::path::{normalize, segments};
use crate::scope::Scope;
use crate::LUALIB_BUNDLE;
use std::path::{Path, PathBuf};

/// Where a mod's files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// `<out_dir>/<mod_id>`
    pub mod_dir: PathBuf,
    /// Folder whose contents are third-party modules, flattened into `shared/`
    pub external_module_dir: String,
}

impl OutputLayout {
    pub const DEFAULT_EXTERNAL_MODULE_DIR: &'static str = "node_modules";

    pub fn new(out_dir: impl AsRef<Path>, mod_id: &str) -> Self {
        Self {
            mod_dir: out_dir.as_ref().join(mod_id),
            external_module_dir: Self::DEFAULT_EXTERNAL_MODULE_DIR.to_string(),
        }
    }

    pub fn with_external_module_dir(mut self, dir: impl Into<String>) -> Self {
        self.external_module_dir = dir.into();
        self
    }

    /// `<mod>/media`
    pub fn media_dir(&self) -> PathBuf {
        self.mod_dir.join("media")
    }

    /// `<mod>/media/lua`
    pub fn lua_root(&self) -> PathBuf {
        self.media_dir().join("lua")
    }

    /// `<mod>/media/lua/<scope>`, or the Lua root for `Scope::None`
    pub fn scope_dir(&self, scope: Scope) -> PathBuf {
        match scope.folder() {
            Some(folder) => self.lua_root().join(folder),
            None => self.lua_root(),
        }
    }

    /// Join a '/'-separated relative path onto the Lua root
    pub fn lua_path(&self, relative: &str) -> PathBuf {
        segments(relative).fold(self.lua_root(), |path, segment| path.join(segment))
    }
}

/// Which placement rule applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// The TSTL runtime bundle, always `shared/lualib_bundle.lua`
    RuntimeBundle,
    /// Third-party module re-rooted under `shared/`
    External,
    /// Regular unit under its scope folder
    Scoped,
    /// Unit outside any scope folder; the runtime never loads these
    Unscoped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    /// Path relative to `media/lua`, e.g. `shared/lualib_bundle.lua`
    pub relative: String,
    /// Final on-disk location
    pub path: PathBuf,
    pub scope: Scope,
    pub kind: UnitKind,
}

/// Resolve where a unit declared at `declared` is written. First matching rule wins:
///
/// 1. the runtime bundle goes to the shared root, wherever it was declared
/// 2. anything below the external module folder is re-rooted under `shared/`
/// 3. everything else stays under its scope folder
///
/// and the result is placed under `<out_dir>/<mod_id>/media/lua`.
pub fn resolve_output_path(declared: &str, layout: &OutputLayout) -> ResolvedOutput {
    let declared = normalize(declared);
    let parts: Vec<&str> = segments(&declared).collect();

    let (relative, scope, kind) = if parts.last() == Some(&LUALIB_BUNDLE) {
        (
            format!("shared/{}", LUALIB_BUNDLE),
            Scope::Shared,
            UnitKind::RuntimeBundle,
        )
    } else if let Some(marker) = parts
        .iter()
        .position(|segment| *segment == layout.external_module_dir)
    {
        let mut relative = String::from("shared");
        for segment in &parts[marker + 1..] {
            relative.push('/');
            relative.push_str(segment);
        }
        (relative, Scope::Shared, UnitKind::External)
    } else {
        let relative = parts.join("/");
        match Scope::classify(&relative) {
            Scope::None => (relative, Scope::None, UnitKind::Unscoped),
            scope => (relative, scope, UnitKind::Scoped),
        }
    };

    ResolvedOutput {
        path: layout.lua_path(&relative),
        relative,
        scope,
        kind,
    }
}
