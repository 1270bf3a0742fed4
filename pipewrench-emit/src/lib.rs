// pipewrench-emit - rewrites compiled Lua for the Project Zomboid (Kahlua) loader
//
// Every unit the external compiler hands back passes through:
//   layout (where it lands) -> reference (require rewriting) -> reimport (boot rebinding)
// and is then written by the pipeline.

pub mod layout;
pub mod path;
pub mod pipeline;
pub mod reference;
pub mod reimport;
pub mod scope;

pub use layout::{resolve_output_path, OutputLayout, ResolvedOutput, UnitKind};
pub use path::{normalize, normalize_path};
pub use pipeline::{
    check_collisions, emit_all, emit_unit, transform_unit, CompiledUnit, EmitContext, EmitError,
    EmitOutcome, SkipReason,
};
pub use reference::{rewrite_references, ModuleReference, RewriteOutcome};
pub use reimport::{apply_reimport, ReimportBinding, ReimportPlan, ReimportTemplate};
pub use scope::Scope;

/// File name of the TypeScriptToLua runtime-support bundle
pub const LUALIB_BUNDLE: &str = "lualib_bundle.lua";
