// pipewrench-pm - PipeWrench project manager
// mod.info/pipewrench.json, scaffolding, TSTL bridge, build and watch orchestration

pub mod assets;
pub mod build;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod declarations;
pub mod manifest;
pub mod status;
pub mod watch;

pub use build::{BuildError, BuildReport, Builder, EntryMarkers};
pub use cli::init_project;
pub use compiler::{CompileRequest, CompilerError, ExternalCompiler, TstlCompiler};
pub use config::{ConfigError, PipeWrenchConfig, ProjectConfig};
pub use declarations::{aggregate_declarations, build_declarations};
pub use manifest::{Manifest, ManifestError};
pub use status::Stage;
pub use watch::{watch, watch_until, WatchAction, WatchEvent, DEFAULT_DEBOUNCE};

/// Tool version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
