// The watch loop against a real filesystem watcher and a stand-in compiler

use pipewrench_emit::CompiledUnit;
use pipewrench_pm::{
    init_project, watch_until, Builder, CompileRequest, CompilerError, ExternalCompiler,
};
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Counts compile requests and returns nothing
#[derive(Default)]
struct CountingCompiler {
    compiles: AtomicUsize,
}

impl ExternalCompiler for CountingCompiler {
    fn compile(&self, _request: &CompileRequest) -> Result<Vec<CompiledUnit>, CompilerError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    fn declarations(&self, _request: &CompileRequest) -> Result<String, CompilerError> {
        Ok(String::new())
    }
}

const DEBOUNCE: Duration = Duration::from_millis(50);
const SETTLE: Duration = Duration::from_millis(300);

#[test]
fn test_one_edit_triggers_one_build() {
    let dir = tempfile::tempdir().unwrap();
    init_project(Some(dir.path().to_path_buf())).unwrap();

    let compiler = CountingCompiler::default();
    let builder = Builder::new(dir.path(), &compiler);
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        let handle = s.spawn(|| watch_until(&builder, DEBOUNCE, &stop));

        thread::sleep(SETTLE);
        fs::write(dir.path().join("src/shared/A.ts"), "export const a = 1;\n").unwrap();

        // Long enough for a build's own marker files to have come back as events
        thread::sleep(Duration::from_millis(1500));
        stop.store(true, Ordering::Relaxed);

        handle.join().unwrap().unwrap();
    });

    let compiles = compiler.compiles.load(Ordering::SeqCst);
    assert!((1..=2).contains(&compiles), "{} compile(s) after one edit", compiles);
    assert!(!dir.path().join("src/shared/_.ts").exists());
}

#[test]
fn test_removed_folder_is_removed_from_output() {
    let dir = tempfile::tempdir().unwrap();
    init_project(Some(dir.path().to_path_buf())).unwrap();
    let ui = dir.path().join("src/client/ui");
    fs::create_dir_all(&ui).unwrap();
    fs::write(ui.join("Panel.lua"), "return 1").unwrap();

    let mirrored = dir.path().join("dist/MyFirst/media/lua/client/ui");
    fs::create_dir_all(&mirrored).unwrap();
    fs::write(mirrored.join("Panel.lua"), "return 1").unwrap();

    let compiler = CountingCompiler::default();
    let builder = Builder::new(dir.path(), &compiler);
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        let handle = s.spawn(|| watch_until(&builder, DEBOUNCE, &stop));

        thread::sleep(SETTLE);
        fs::remove_dir_all(&ui).unwrap();

        thread::sleep(Duration::from_millis(1000));
        stop.store(true, Ordering::Relaxed);

        handle.join().unwrap().unwrap();
    });

    assert!(!mirrored.exists());
    assert_eq!(compiler.compiles.load(Ordering::SeqCst), 0);
}
