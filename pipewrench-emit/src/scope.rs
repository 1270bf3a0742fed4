// Runtime module namespaces

use crate::path::segments;
use std::fmt;

/// The runtime loads each of these folders into its own flat namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Client,
    Server,
    Shared,
    None,
}

impl Scope {
    /// Scopes that own a folder under `media/lua/`
    pub const FOLDERS: [Scope; 3] = [Scope::Client, Scope::Server, Scope::Shared];

    pub fn folder(self) -> Option<&'static str> {
        match self {
            Scope::Client => Some("client"),
            Scope::Server => Some("server"),
            Scope::Shared => Some("shared"),
            Scope::None => None,
        }
    }

    pub fn from_folder(name: &str) -> Scope {
        match name {
            "client" => Scope::Client,
            "server" => Scope::Server,
            "shared" => Scope::Shared,
            _ => Scope::None,
        }
    }

    /// Classify a '/'-separated path by its first segment.
    ///
    /// Only an exact segment counts: `clientside/x.lua` or `server/client_ui.lua`
    /// never classify as client.
    pub fn classify(path: &str) -> Scope {
        segments(path)
            .next()
            .map(Scope::from_folder)
            .unwrap_or(Scope::None)
    }

    /// Whether code in `self` can load a module living in `target`
    pub fn can_reference(self, target: Scope) -> bool {
        !matches!(
            (self, target),
            (Scope::Client, Scope::Server) | (Scope::Server, Scope::Client)
        )
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.folder().unwrap_or("none"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_first_segment() {
        assert_eq!(Scope::classify("client/ui/Panel.lua"), Scope::Client);
        assert_eq!(Scope::classify("server/Loot.lua"), Scope::Server);
        assert_eq!(Scope::classify("./shared/Util.lua"), Scope::Shared);
        assert_eq!(Scope::classify("index.lua"), Scope::None);
    }

    #[test]
    fn test_classify_is_segment_exact() {
        assert_eq!(Scope::classify("server/client_bridge.lua"), Scope::Server);
        assert_eq!(Scope::classify("clientside/Foo.lua"), Scope::None);
        assert_eq!(Scope::classify("lib/shared/Foo.lua"), Scope::None);
    }

    #[test]
    fn test_cross_scope_visibility() {
        assert!(Scope::Client.can_reference(Scope::Shared));
        assert!(Scope::Server.can_reference(Scope::Shared));
        assert!(Scope::Shared.can_reference(Scope::Client));
        assert!(!Scope::Client.can_reference(Scope::Server));
        assert!(!Scope::Server.can_reference(Scope::Client));
    }
}
