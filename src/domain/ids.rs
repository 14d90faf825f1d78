//! Type-safe entity identifiers.
//!
//! Every entity is keyed by a newtype wrapper around [`uuid::Uuid`] (v4) so
//! that a roster ID can never be passed where a contest ID is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a real-world match.
    MatchId
);
entity_id!(
    /// Identifier of a real-world player.
    PlayerId
);
entity_id!(
    /// Identifier of a real-world team.
    TeamId
);
entity_id!(
    /// Identifier of a user (roster owner, event recorder, prize recipient).
    UserId
);
entity_id!(
    /// Identifier of a recorded match event.
    EventId
);
entity_id!(
    /// Identifier of a fantasy roster.
    RosterId
);
entity_id!(
    /// Identifier of a contest.
    ContestId
);
entity_id!(
    /// Identifier of a contest entry (roster joined to a contest).
    EntryId
);
entity_id!(
    /// Identifier of a live leaderboard connection.
    ConnectionId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(RosterId::new(), RosterId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let s = format!("{}", ContestId::new());
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let id = MatchId::from_uuid(uuid);
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn from_uuid_preserves_value() {
        let uuid = uuid::Uuid::new_v4();
        let id = PlayerId::from(uuid);
        assert_eq!(*id.as_uuid(), uuid);
        assert_eq!(uuid::Uuid::from(id), uuid);
    }

    #[test]
    fn usable_as_map_key() {
        use std::collections::HashMap;
        let id = EntryId::new();
        let mut map = HashMap::new();
        map.insert(id, "entry");
        assert_eq!(map.get(&id), Some(&"entry"));
    }
}
