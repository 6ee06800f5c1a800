//! Identifier newtypes used across the data model.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.0.to_string()[..8])
            }
        }
    };
}

id_type!(
    /// Unique identifier for an entity.
    EntityId
);
id_type!(
    /// Unique identifier for a universe (timeline branch).
    UniverseId
);
id_type!(
    /// Unique identifier for an event in the append-only log.
    EventId
);
id_type!(
    /// Unique identifier for a relationship edge.
    RelationshipId
);
id_type!(
    /// Unique identifier for an ability (UAO).
    AbilityId
);
id_type!(
    /// Unique identifier for a quest.
    QuestId
);
