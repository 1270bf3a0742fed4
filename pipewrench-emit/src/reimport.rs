// Boot-time rebinding of PipeWrench objects
//
// Kahlua may run a module before the PipeWrench bridge is fully populated, so a
// module-scope `local getPlayer = ____PipeWrench.getPlayer` can capture nil. Closures in
// the module already close over `getPlayer`, so the fix is to assign the same locals again
// once the boot event fires:
//
//   local getPlayer = ____PipeWrench.getPlayer      -- declared, possibly stale
//   ...
//   Events.OnPipeWrenchBoot.Add(function()
//     getPlayer = ____PipeWrench.getPlayer          -- rebound
//   end)
//   return ____exports

use regex::Regex;
use std::sync::OnceLock;

// local <identifier>[, <identifier>...] = <initializer>
static DECLARATION_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn declaration_pattern() -> Option<&'static Regex> {
    DECLARATION_RE
        .get_or_init(|| {
            Regex::new(
                r"^local\s+([A-Za-z_][A-Za-z0-9_]*(?:\s*,\s*[A-Za-z_][A-Za-z0-9_]*)*)\s*=\s*(.+)$",
            )
            .ok()
        })
        .as_ref()
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Member path read from the first `<alias>.` token in `initializer`, e.g. `getCore` for
/// `____PipeWrench.getCore():getVersion()`
fn bridge_member(initializer: &str, alias: &str) -> Option<String> {
    let needle = format!("{}.", alias);
    initializer.match_indices(&needle).find_map(|(at, _)| {
        let bounded = initializer[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !is_identifier_char(c));
        if !bounded {
            return None;
        }
        let member: String = initializer[at + needle.len()..]
            .chars()
            .take_while(|c| is_identifier_char(*c) || *c == '.')
            .collect();
        Some(member.trim_end_matches('.').to_string())
    })
}

/// Shape of the injected subscription block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReimportTemplate {
    /// Local the compiler binds the bridge module to
    pub bridge_alias: String,
    /// Event fired once the bridge is populated
    pub boot_event: String,
}

impl Default for ReimportTemplate {
    fn default() -> Self {
        Self {
            bridge_alias: "____PipeWrench".to_string(),
            boot_event: "OnPipeWrenchBoot".to_string(),
        }
    }
}

impl ReimportTemplate {
    pub const BLOCK_START: &'static str = "-- PIPEWRENCH --";
    pub const BLOCK_END: &'static str = "----------------";

    pub fn new(bridge_alias: impl Into<String>, boot_event: impl Into<String>) -> Self {
        Self {
            bridge_alias: bridge_alias.into(),
            boot_event: boot_event.into(),
        }
    }

    /// Render the subscription block replaying `bindings` in order
    pub fn render(&self, bindings: &[ReimportBinding]) -> String {
        let mut block = String::new();
        block.push_str(Self::BLOCK_START);
        block.push('\n');
        block.push_str(&format!("Events.{}.Add(function()\n", self.boot_event));
        for binding in bindings {
            block.push_str("  ");
            block.push_str(&binding.assignment);
            block.push('\n');
        }
        block.push_str("end)\n");
        block.push_str(Self::BLOCK_END);
        block.push('\n');
        block
    }
}

/// A module-scope local whose initializer reads the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReimportBinding {
    /// Declared name, or the comma-separated names of a multi-assignment
    pub identifier: String,
    /// First member path read from the bridge, e.g. `getPlayer`
    pub member: String,
    /// The declaration without its `local` keyword, replayed verbatim, e.g.
    /// `player = ____PipeWrench.getPlayer()`
    pub assignment: String,
    /// 1-based line of the original declaration
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TrailingReturn {
    start: usize,
    statement: String,
}

/// First phase of the rebinding: what a module captured at load time.
///
/// `analyze` records the bridge bindings in declaration order together with the module's
/// trailing `return`. `render` produces the second phase, the module with its rebinding
/// block in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReimportPlan {
    pub bindings: Vec<ReimportBinding>,
    trailing_return: Option<TrailingReturn>,
}

impl ReimportPlan {
    pub fn analyze(lua: &str, template: &ReimportTemplate) -> Self {
        let bindings = lua
            .lines()
            .enumerate()
            .filter_map(|(index, line)| {
                let captures = declaration_pattern()?.captures(line)?;
                let alias = template.bridge_alias.as_str();
                let identifier = &captures[1];
                if identifier.split(',').any(|name| name.trim() == alias) {
                    return None;
                }
                let member = bridge_member(&captures[2], alias)?;
                Some(ReimportBinding {
                    identifier: identifier.to_string(),
                    member,
                    assignment: line["local".len()..]
                        .trim_start()
                        .trim_end_matches(|c: char| c.is_whitespace() || c == ';')
                        .to_string(),
                    line: index + 1,
                })
            })
            .collect();

        Self {
            bindings,
            trailing_return: find_trailing_return(lua),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn render(&self, lua: &str, template: &ReimportTemplate) -> String {
        if self.is_empty() {
            return lua.to_string();
        }

        let block = template.render(&self.bindings);

        match &self.trailing_return {
            Some(ret) => {
                let body = lua[..ret.start].trim_end_matches(['\n', '\r']);
                format!("{}\n\n{}{}\n", body, block, ret.statement)
            }
            None => {
                let body = lua.trim_end_matches(['\n', '\r']);
                format!("{}\n\n{}", body, block)
            }
        }
    }
}

/// Inject the rebinding block into `lua`, or return it untouched when nothing is bound
/// from the bridge.
pub fn apply_reimport(lua: &str, template: &ReimportTemplate) -> String {
    ReimportPlan::analyze(lua, template).render(lua, template)
}

fn find_trailing_return(lua: &str) -> Option<TrailingReturn> {
    let trimmed = lua.trim_end();
    let start = trimmed.rfind('\n').map_or(0, |i| i + 1);
    let line = &trimmed[start..];

    let is_return = line == "return"
        || line.starts_with("return ")
        || line.starts_with("return\t")
        || line.starts_with("return;");

    is_return.then(|| TrailingReturn {
        start,
        statement: line.to_string(),
    })
}
