use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(RoomId);
id_newtype!(UserId);
id_newtype!(EventId);

/// Drops the trailing `:server` part of a qualified identifier.
pub fn strip_server(identifier: &str) -> &str {
    identifier
        .rsplit_once(':')
        .map_or(identifier, |(local, _)| local)
}

impl UserId {
    /// Short display name: `@alice:example.org` becomes `alice`.
    pub fn localpart(&self) -> &str {
        let local = strip_server(&self.0);
        local.strip_prefix('@').unwrap_or(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localpart_strips_sigil_and_server() {
        assert_eq!(UserId::from("@alice:example.org").localpart(), "alice");
        assert_eq!(UserId::from("bob").localpart(), "bob");
    }

    #[test]
    fn strip_server_keeps_unqualified_ids() {
        assert_eq!(strip_server("!room:example.org"), "!room");
        assert_eq!(strip_server("#lobby"), "#lobby");
        assert_eq!(strip_server("@carol:example.org:8448"), "@carol:example.org");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = EventId::from("$abc:example.org");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"$abc:example.org\"");
    }
}
