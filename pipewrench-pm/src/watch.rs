// Watch mode: mirror loose files as they change, rebuild on source changes

use crate::build::{Builder, ENTRY_MARKER};
use crate::compiler::ExternalCompiler;
use crate::config::ProjectConfig;
use crate::status::Stage;
use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use pipewrench_emit::Scope;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// How often an idle loop checks its stop flag
const STOP_POLL: Duration = Duration::from_millis(100);

/// Files under `src/` that never trigger anything
const SENTINELS: [&str; 2] = ["header.lua", "footer.lua"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
    DirAdded(PathBuf),
    DirRemoved(PathBuf),
}

impl WatchEvent {
    /// Translate a raw notification. Renames become a removal and/or an addition.
    pub fn from_notify(event: &Event) -> Vec<WatchEvent> {
        let added = |path: &PathBuf| {
            if path.is_dir() {
                WatchEvent::DirAdded(path.clone())
            } else {
                WatchEvent::Added(path.clone())
            }
        };

        match event.kind {
            EventKind::Create(CreateKind::Folder) => {
                event.paths.iter().cloned().map(WatchEvent::DirAdded).collect()
            }
            EventKind::Create(_) => event.paths.iter().map(added).collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                event.paths.iter().cloned().map(WatchEvent::Removed).collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                event.paths.iter().map(added).collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                match event.paths.as_slice() {
                    [from, to] => vec![WatchEvent::Removed(from.clone()), added(to)],
                    _ => Vec::new(),
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
            EventKind::Modify(_) => event
                .paths
                .iter()
                .filter(|path| path.is_file())
                .cloned()
                .map(WatchEvent::Changed)
                .collect(),
            EventKind::Remove(RemoveKind::Folder) => {
                event.paths.iter().cloned().map(WatchEvent::DirRemoved).collect()
            }
            EventKind::Remove(_) => event.paths.iter().cloned().map(WatchEvent::Removed).collect(),
            _ => Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Added(path)
            | WatchEvent::Changed(path)
            | WatchEvent::Removed(path)
            | WatchEvent::DirAdded(path)
            | WatchEvent::DirRemoved(path) => path,
        }
    }
}

/// What to do about one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    Ignore,
    Rebuild,
    Copy { from: PathBuf, to: PathBuf },
    Remove(PathBuf),
    CreateDir(PathBuf),
}

/// Source folders and where they are mirrored to in the mod tree
#[derive(Debug, Clone)]
pub struct Mirror {
    src_dir: PathBuf,
    roots: Vec<(PathBuf, PathBuf)>,
}

impl Mirror {
    pub fn new(project: &ProjectConfig) -> Self {
        let layout = project.layout();
        let mut roots: Vec<(PathBuf, PathBuf)> = Scope::FOLDERS
            .iter()
            .filter_map(|scope| {
                let folder = scope.folder()?;
                Some((project.src_dir().join(folder), layout.scope_dir(*scope)))
            })
            .collect();

        let media = layout.media_dir();
        roots.extend(
            project
                .asset_dirs()
                .into_iter()
                .map(|(source, kind)| (source, media.join(kind))),
        );

        Self {
            src_dir: project.src_dir(),
            roots,
        }
    }

    /// Output location of a source path, `None` outside every mirrored folder
    pub fn map(&self, path: &Path) -> Option<PathBuf> {
        self.roots.iter().find_map(|(source, dest)| {
            let relative = path.strip_prefix(source).ok()?;
            Some(if relative.as_os_str().is_empty() {
                dest.clone()
            } else {
                dest.join(relative)
            })
        })
    }

    fn is_sentinel(&self, path: &Path) -> bool {
        path.strip_prefix(&self.src_dir)
            .ok()
            .and_then(|relative| relative.to_str())
            .is_some_and(|relative| {
                SENTINELS
                    .iter()
                    .any(|sentinel| relative.eq_ignore_ascii_case(sentinel))
            })
    }

    /// `src/<scope>/_.ts`, written and removed by every build pass
    fn is_entry_marker(&self, path: &Path) -> bool {
        if path.file_name().and_then(|name| name.to_str()) != Some(ENTRY_MARKER) {
            return false;
        }
        Scope::FOLDERS
            .iter()
            .filter_map(|scope| scope.folder())
            .any(|folder| path.parent() == Some(self.src_dir.join(folder).as_path()))
    }
}

fn lower_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Decide what an event means. Pure: nothing touches the filesystem here.
pub fn plan(event: &WatchEvent, mirror: &Mirror) -> WatchAction {
    let path = event.path();
    if mirror.is_sentinel(path) || mirror.is_entry_marker(path) {
        return WatchAction::Ignore;
    }

    let name = lower_name(path);
    let is_declaration = name.ends_with(".d.ts");
    let is_source = name.ends_with(".ts") && !is_declaration;

    match event {
        WatchEvent::Added(_) | WatchEvent::Changed(_) => {
            if is_declaration {
                WatchAction::Ignore
            } else if is_source {
                WatchAction::Rebuild
            } else {
                mirror.map(path).map_or(WatchAction::Ignore, |to| WatchAction::Copy {
                    from: path.to_path_buf(),
                    to,
                })
            }
        }
        WatchEvent::Removed(_) => {
            if is_declaration {
                return WatchAction::Ignore;
            }
            let Some(mut target) = mirror.map(path) else {
                return WatchAction::Ignore;
            };
            if is_source {
                target.set_extension("lua");
            }
            WatchAction::Remove(target)
        }
        WatchEvent::DirRemoved(_) => mirror
            .map(path)
            .map_or(WatchAction::Ignore, WatchAction::Remove),
        WatchEvent::DirAdded(_) => mirror
            .map(path)
            .map_or(WatchAction::Ignore, WatchAction::CreateDir),
    }
}

/// Carry out everything except rebuilds. Returns whether a rebuild was requested.
fn apply(actions: &[WatchAction]) -> Result<bool> {
    let mut rebuild = false;

    for action in actions {
        match action {
            WatchAction::Ignore => {}
            WatchAction::Rebuild => rebuild = true,
            WatchAction::Copy { from, to } => {
                Stage::Watcher.info(format!("File changed: {}", from.display()));
                if let Some(parent) = to.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create directory: {}", parent.display())
                    })?;
                }
                fs::copy(from, to).with_context(|| {
                    format!("Failed to copy {} to {}", from.display(), to.display())
                })?;
            }
            WatchAction::Remove(target) => {
                if target.is_dir() {
                    fs::remove_dir_all(target)
                        .with_context(|| format!("Failed to remove {}", target.display()))?;
                    Stage::Watcher.info(format!("Deleted directory: {}", target.display()));
                } else if target.exists() {
                    fs::remove_file(target)
                        .with_context(|| format!("Failed to remove {}", target.display()))?;
                    Stage::Watcher.info(format!("Deleted file: {}", target.display()));
                }
            }
            WatchAction::CreateDir(target) => {
                if !target.exists() {
                    fs::create_dir_all(target).with_context(|| {
                        format!("Failed to create directory: {}", target.display())
                    })?;
                    Stage::Watcher.info(format!("Created directory: {}", target.display()));
                }
            }
        }
    }

    Ok(rebuild)
}

fn handle_batch<C: ExternalCompiler>(builder: &Builder<C>, events: &[WatchEvent]) -> Result<()> {
    let project = builder.project()?;
    let mirror = Mirror::new(&project);

    let actions: Vec<WatchAction> = events.iter().map(|event| plan(event, &mirror)).collect();
    if apply(&actions)? {
        builder.build()?;
    }

    Ok(())
}

/// Watch `src/` until the process is stopped. Failed passes are reported and the loop
/// keeps going.
pub fn watch<C: ExternalCompiler>(builder: &Builder<C>, debounce: Duration) -> Result<()> {
    watch_until(builder, debounce, &AtomicBool::new(false))
}

/// Same as [`watch`], returning once `stop` is set. A batch being handled is finished first.
pub fn watch_until<C: ExternalCompiler>(
    builder: &Builder<C>,
    debounce: Duration,
    stop: &AtomicBool,
) -> Result<()> {
    let root = fs::canonicalize(builder.root())
        .with_context(|| format!("Failed to resolve {}", builder.root().display()))?;
    let builder = Builder::new(&root, builder.compiler());
    let src_dir = root.join("src");

    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to start file watcher")?;
    watcher
        .watch(&src_dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", src_dir.display()))?;

    Stage::Watcher.success(format!("Watching {}..", src_dir.display()));

    while !stop.load(Ordering::Relaxed) {
        let first = match rx.recv_timeout(STOP_POLL) {
            Ok(first) => first,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let mut batch = vec![first];
        while let Ok(next) = rx.recv_timeout(debounce) {
            batch.push(next);
        }

        let events: Vec<WatchEvent> = batch
            .into_iter()
            .filter_map(|result| match result {
                Ok(event) => Some(event),
                Err(e) => {
                    log::warn!("watch error: {}", e);
                    None
                }
            })
            .flat_map(|event| WatchEvent::from_notify(&event))
            .collect();

        if events.is_empty() {
            continue;
        }
        log::debug!("handling {} event(s)", events.len());

        if let Err(e) = handle_batch(&builder, &events) {
            Stage::Watcher.warn(format!("{:#}", e));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Manifest, MANIFEST_FILE};

    fn project() -> (tempfile::TempDir, ProjectConfig) {
        let dir = tempfile::tempdir().unwrap();
        Manifest::default().to_file(dir.path().join(MANIFEST_FILE)).unwrap();
        let project = ProjectConfig::load(dir.path()).unwrap();
        (dir, project)
    }

    #[test]
    fn test_source_change_rebuilds() {
        let (dir, project) = project();
        let mirror = Mirror::new(&project);
        let path = dir.path().join("src/client/Main.ts");

        assert_eq!(plan(&WatchEvent::Changed(path.clone()), &mirror), WatchAction::Rebuild);
        assert_eq!(plan(&WatchEvent::Added(path), &mirror), WatchAction::Rebuild);
    }

    #[test]
    fn test_declaration_and_sentinels_ignored() {
        let (dir, project) = project();
        let mirror = Mirror::new(&project);

        for path in ["src/shared/Types.d.ts", "src/header.lua", "src/Footer.lua"] {
            let event = WatchEvent::Changed(dir.path().join(path));
            assert_eq!(plan(&event, &mirror), WatchAction::Ignore, "{}", path);
        }
    }

    #[test]
    fn test_entry_markers_never_rebuild() {
        let (dir, project) = project();
        let mirror = Mirror::new(&project);

        for scope in ["client", "server", "shared"] {
            let marker = dir.path().join("src").join(scope).join(ENTRY_MARKER);
            for event in [
                WatchEvent::Added(marker.clone()),
                WatchEvent::Changed(marker.clone()),
                WatchEvent::Removed(marker),
            ] {
                assert_eq!(plan(&event, &mirror), WatchAction::Ignore, "{:?}", event);
            }
        }

        let nested = dir.path().join("src/client/ui").join(ENTRY_MARKER);
        assert_eq!(plan(&WatchEvent::Added(nested), &mirror), WatchAction::Rebuild);
    }

    #[test]
    fn test_loose_lua_copied_to_scope_output() {
        let (dir, project) = project();
        let mirror = Mirror::new(&project);
        let from = dir.path().join("src/server/legacy/Old.lua");

        assert_eq!(
            plan(&WatchEvent::Added(from.clone()), &mirror),
            WatchAction::Copy {
                from,
                to: dir.path().join("dist/MyFirst/media/lua/server/legacy/Old.lua"),
            }
        );
    }

    #[test]
    fn test_asset_copied_under_media() {
        let (dir, project) = project();
        let mirror = Mirror::new(&project);
        let from = dir.path().join("src/textures/Item_Wrench.png");

        assert_eq!(
            plan(&WatchEvent::Changed(from.clone()), &mirror),
            WatchAction::Copy {
                from,
                to: dir.path().join("dist/MyFirst/media/textures/Item_Wrench.png"),
            }
        );
    }

    #[test]
    fn test_removed_source_removes_lua_output() {
        let (dir, project) = project();
        let mirror = Mirror::new(&project);
        let event = WatchEvent::Removed(dir.path().join("src/shared/util/Strings.ts"));

        let output = dir.path().join("dist/MyFirst/media/lua/shared/util/Strings.lua");
        assert_eq!(plan(&event, &mirror), WatchAction::Remove(output));
    }

    #[test]
    fn test_directory_events_mirrored() {
        let (dir, project) = project();
        let mirror = Mirror::new(&project);

        assert_eq!(
            plan(&WatchEvent::DirAdded(dir.path().join("src/client/ui")), &mirror),
            WatchAction::CreateDir(dir.path().join("dist/MyFirst/media/lua/client/ui"))
        );
        assert_eq!(
            plan(&WatchEvent::DirRemoved(dir.path().join("src/client/ui")), &mirror),
            WatchAction::Remove(dir.path().join("dist/MyFirst/media/lua/client/ui"))
        );
    }

    #[test]
    fn test_events_outside_mirrored_roots_ignored() {
        let (dir, project) = project();
        let mirror = Mirror::new(&project);

        let event = WatchEvent::Added(dir.path().join("src/notes.txt"));
        assert_eq!(plan(&event, &mirror), WatchAction::Ignore);
    }

    #[test]
    fn test_apply_performs_copies_and_reports_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.lua");
        let to = dir.path().join("out/nested/a.lua");
        fs::write(&from, "return 1").unwrap();

        let rebuild = apply(&[
            WatchAction::Copy { from, to: to.clone() },
            WatchAction::Rebuild,
            WatchAction::Remove(dir.path().join("missing.lua")),
        ])
        .unwrap();

        assert!(rebuild);
        assert_eq!(fs::read_to_string(to).unwrap(), "return 1");
    }

    #[test]
    fn test_folder_renamed_away_removes_its_mirror() {
        let (dir, project) = project();
        let mirror = Mirror::new(&project);
        let mirrored = dir.path().join("dist/MyFirst/media/lua/client/ui");
        fs::create_dir_all(&mirrored).unwrap();
        fs::write(mirrored.join("Panel.lua"), "return 1").unwrap();

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(dir.path().join("src/client/ui"));
        let actions: Vec<_> = WatchEvent::from_notify(&event)
            .iter()
            .map(|event| plan(event, &mirror))
            .collect();
        assert_eq!(actions, vec![WatchAction::Remove(mirrored.clone())]);

        assert!(!apply(&actions).unwrap());
        assert!(!mirrored.exists());
        assert!(dir.path().join("dist/MyFirst/media/lua/client").is_dir());
    }

    #[test]
    fn test_rename_becomes_remove_and_add() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/nope/a.ts"))
            .add_path(PathBuf::from("/nope/b.ts"));

        assert_eq!(
            WatchEvent::from_notify(&event),
            vec![
                WatchEvent::Removed(PathBuf::from("/nope/a.ts")),
                WatchEvent::Added(PathBuf::from("/nope/b.ts")),
            ]
        );
    }
}
