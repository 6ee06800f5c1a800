use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, RelationshipId, UniverseId};

/// The kind of a directed edge between entities. A closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    /// Social awareness; carries a trust scalar in `[-1, 1]`.
    Knows,
    Fears,
    Desires,
    /// Functional: exactly one per entity per universe.
    LocatedIn,
    Owns,
    Wields,
    Wears,
    Carries,
    Contains,
    ConnectedTo,
    TrappedIn,
    /// Links a universe-local variant to its canonical origin.
    VariantOf,
    HasAtmosphere,
    Caused,
}

impl RelationshipKind {
    /// Inventory edges move with a character on cross-world travel.
    pub fn is_inventory(self) -> bool {
        matches!(self, Self::Owns | Self::Wields | Self::Wears | Self::Carries)
    }

    /// Social edges are universe-local and never transferred.
    pub fn is_social(self) -> bool {
        matches!(self, Self::Knows | Self::Fears | Self::Desires)
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Knows => "KNOWS",
            Self::Fears => "FEARS",
            Self::Desires => "DESIRES",
            Self::LocatedIn => "LOCATED_IN",
            Self::Owns => "OWNS",
            Self::Wields => "WIELDS",
            Self::Wears => "WEARS",
            Self::Carries => "CARRIES",
            Self::Contains => "CONTAINS",
            Self::ConnectedTo => "CONNECTED_TO",
            Self::TrappedIn => "TRAPPED_IN",
            Self::VariantOf => "VARIANT_OF",
            Self::HasAtmosphere => "HAS_ATMOSPHERE",
            Self::Caused => "CAUSED",
        };
        write!(f, "{s}")
    }
}

/// A directed edge between two entities within a universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub universe_id: UniverseId,
    pub source: EntityId,
    pub target: EntityId,
    pub kind: RelationshipKind,
    /// Trust scalar for KNOWS edges, in `[-1, 1]`.
    pub trust: Option<f64>,
    pub label: Option<String>,
}

impl Relationship {
    pub fn new(
        universe_id: UniverseId,
        source: EntityId,
        kind: RelationshipKind,
        target: EntityId,
    ) -> Self {
        Self {
            id: RelationshipId::new(),
            universe_id,
            source,
            target,
            kind,
            trust: None,
            label: None,
        }
    }

    /// Attach a trust scalar, clamped to `[-1, 1]`.
    pub fn with_trust(mut self, trust: f64) -> Self {
        self.trust = Some(trust.clamp(-1.0, 1.0));
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_is_clamped() {
        let universe = UniverseId::new();
        let rel = Relationship::new(universe, EntityId::new(), RelationshipKind::Knows, EntityId::new())
            .with_trust(2.5);
        assert_eq!(rel.trust, Some(1.0));
    }

    #[test]
    fn inventory_and_social_classification() {
        assert!(RelationshipKind::Carries.is_inventory());
        assert!(RelationshipKind::Owns.is_inventory());
        assert!(!RelationshipKind::Knows.is_inventory());
        assert!(RelationshipKind::Knows.is_social());
        assert!(RelationshipKind::Fears.is_social());
        assert!(!RelationshipKind::LocatedIn.is_social());
    }

    #[test]
    fn kind_display_is_screaming_snake() {
        assert_eq!(RelationshipKind::LocatedIn.to_string(), "LOCATED_IN");
        assert_eq!(RelationshipKind::VariantOf.to_string(), "VARIANT_OF");
    }
}
