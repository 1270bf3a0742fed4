// require(..) rewriting
//
// TSTL emits `require("shared.util.Strings")`. Kahlua only resolves slash paths, wants the
// single-quoted call form, and loads each of client/server/shared as its own flat
// namespace, so the scope prefix has to go:
//
//   require("shared.util.Strings")  ->  require('util/Strings')

use crate::scope::Scope;
use pipewrench_diagnostics::{error_codes, Diagnostic, Span};

const CALL_OPEN: &str = "require(\"";
const CALL_CLOSE: &str = "\")";

/// A parsed `require` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    /// Target exactly as the compiler wrote it, e.g. `shared.util.Strings`
    pub dotted: String,
    /// Namespace named by the stripped prefix, `Scope::None` when there was none
    pub scope: Scope,
    /// Slash form with the scope prefix removed, e.g. `util/Strings`
    pub path: String,
}

impl ModuleReference {
    pub fn parse(dotted: &str) -> Self {
        let slashed = dotted.replace('.', "/");

        let (scope, path) = match slashed.split_once('/') {
            Some((head, rest)) if Scope::from_folder(head) != Scope::None => {
                (Scope::from_folder(head), rest.to_string())
            }
            _ => (Scope::None, slashed.clone()),
        };

        Self {
            dotted: dotted.to_string(),
            scope,
            path,
        }
    }

    /// The call the runtime loader understands
    pub fn to_call(&self) -> String {
        format!("require('{}')", self.path)
    }
}

/// Result of rewriting one unit
#[derive(Debug, Clone, Default)]
pub struct RewriteOutcome {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Rewrite every `require("<path>")` in `lua`.
///
/// `owner` is the scope of the unit being rewritten and `file` names it in diagnostics.
/// Only the exact call shape is touched. An opening `require("` without a closing quote
/// ends the scan and leaves the rest of the text as is.
pub fn rewrite_references(owner: Scope, lua: &str, file: &str) -> RewriteOutcome {
    let mut outcome = RewriteOutcome {
        text: String::with_capacity(lua.len()),
        ..RewriteOutcome::default()
    };

    let mut rest = lua;
    let mut offset = 0;

    while let Some(start) = rest.find(CALL_OPEN) {
        let path_start = start + CALL_OPEN.len();

        let Some(path_len) = rest[path_start..].find('"') else {
            log::debug!(
                "{}: unterminated require at byte {}, leaving the remainder untouched",
                file,
                offset + start
            );
            break;
        };
        let path_end = path_start + path_len;

        if !rest[path_end..].starts_with(CALL_CLOSE) {
            // `require("a" .. b)` and friends are not ours to touch
            outcome.text.push_str(&rest[..=path_end]);
            rest = &rest[path_end + 1..];
            offset += path_end + 1;
            continue;
        }

        let call_end = path_end + CALL_CLOSE.len();
        let reference = ModuleReference::parse(&rest[path_start..path_end]);

        if !owner.can_reference(reference.scope) {
            let span = Span::from_file_and_span(file, lua, offset + start..offset + call_end);
            outcome
                .diagnostics
                .push(cross_scope_warning(owner, &reference, span));
        }

        outcome.text.push_str(&rest[..start]);
        outcome.text.push_str(&reference.to_call());

        rest = &rest[call_end..];
        offset += call_end;
    }

    outcome.text.push_str(rest);
    outcome
}

fn cross_scope_warning(owner: Scope, reference: &ModuleReference, span: Span) -> Diagnostic {
    Diagnostic::warning(
        error_codes::CROSS_SCOPE_REFERENCE,
        format!(
            "cannot reference code from src/{} in src/{}: `{}`",
            reference.scope, owner, reference.dotted
        ),
        span,
    )
    .with_note(format!(
        "{} and {} do not share modules at runtime, this require will fail when loaded",
        owner, reference.scope
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_reference_from_client() {
        let lua = "local Foo = require(\"shared.Foo\")";
        let outcome = rewrite_references(Scope::Client, lua, "a.lua");
        assert_eq!(outcome.text, "local Foo = require('Foo')");
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_server_reference_from_client_warns_once() {
        let lua = "local Bar = require(\"server.Bar\")";
        let outcome = rewrite_references(Scope::Client, lua, "a.lua");
        assert_eq!(outcome.text, "local Bar = require('Bar')");
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].code, error_codes::CROSS_SCOPE_REFERENCE);
        assert_eq!(outcome.diagnostics[0].span.line, 1);
        assert_eq!(outcome.diagnostics[0].span.column, 13);
    }

    #[test]
    fn test_client_reference_from_server_warns() {
        let outcome = rewrite_references(Scope::Server, "require(\"client.ui.Panel\")", "s.lua");
        assert_eq!(outcome.text, "require('ui/Panel')");
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn test_shared_scope_may_reference_anything() {
        let lua = "require(\"client.A\")\nrequire(\"server.B\")";
        let outcome = rewrite_references(Scope::Shared, lua, "x.lua");
        assert_eq!(outcome.text, "require('A')\nrequire('B')");
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_unprefixed_paths_keep_all_segments() {
        let lua = "require(\"lualib_bundle\")\nrequire(\"lib.json\")";
        let outcome = rewrite_references(Scope::Client, lua, "x.lua");
        assert_eq!(outcome.text, "require('lualib_bundle')\nrequire('lib/json')");
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_duplicate_references_all_rewritten() {
        let lua = "require(\"shared.A\")\nrequire(\"shared.A\")\nrequire(\"shared.A\")";
        let outcome = rewrite_references(Scope::Client, lua, "x.lua");
        assert_eq!(outcome.text, "require('A')\nrequire('A')\nrequire('A')");
    }

    #[test]
    fn test_unterminated_reference_stops_scan() {
        let lua = "require(\"shared.A\")\nlocal x = require(\"shared.B";
        let outcome = rewrite_references(Scope::Client, lua, "x.lua");
        assert_eq!(outcome.text, "require('A')\nlocal x = require(\"shared.B");
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_inexact_call_left_alone() {
        let lua = "require(\"shared.\" .. name)\nrequire(\"shared.B\")";
        let outcome = rewrite_references(Scope::Client, lua, "x.lua");
        assert_eq!(outcome.text, "require(\"shared.\" .. name)\nrequire('B')");
    }

    #[test]
    fn test_single_quoted_input_untouched() {
        let lua = "require('shared/A')";
        assert_eq!(rewrite_references(Scope::Client, lua, "x.lua").text, lua);
    }

    #[test]
    fn test_parse_reference() {
        let reference = ModuleReference::parse("client.ui.Panel");
        assert_eq!(reference.scope, Scope::Client);
        assert_eq!(reference.path, "ui/Panel");
        assert_eq!(reference.to_call(), "require('ui/Panel')");

        let bare = ModuleReference::parse("shared");
        assert_eq!(bare.scope, Scope::None);
        assert_eq!(bare.path, "shared");
    }
}
