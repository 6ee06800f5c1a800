use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, EventId, UniverseId};

/// Status of a universe (timeline branch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseStatus {
    /// Currently playable.
    Active,
    /// Preserved read-only. Universes are never destroyed.
    Archived,
    /// Content merged into the parent.
    Merged,
    /// No longer maintained.
    Abandoned,
}

/// A timeline in the multiverse. Each universe corresponds to a branch in the
/// truth store; forking is a zero-copy branch operation.
///
/// Invariant: the root universe has no parent and depth 0; every other
/// universe has `depth == parent.depth + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub id: UniverseId,
    pub name: String,
    pub description: String,
    pub parent_id: Option<UniverseId>,
    /// The event where the fork occurred, if recorded.
    pub fork_point: Option<EventId>,
    /// Forks from the root universe.
    pub depth: u32,
    /// Player who owns this branch, if any.
    pub owner: Option<EntityId>,
    pub status: UniverseStatus,
    /// Branch label in the truth store.
    pub branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Universe {
    /// Create the root (canonical) universe on the `main` branch.
    pub fn root(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UniverseId::new(),
            name: name.into(),
            description: "The canonical timeline.".to_string(),
            parent_id: None,
            fork_point: None,
            depth: 0,
            owner: None,
            status: UniverseStatus::Active,
            branch: "main".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a fork of this universe. The child's depth is `parent + 1` and
    /// its branch label is derived from the fork name.
    pub fn fork(
        &self,
        name: impl Into<String>,
        reason: impl Into<String>,
        owner: Option<EntityId>,
        fork_point: Option<EventId>,
    ) -> Self {
        let name = name.into();
        let id = UniverseId::new();
        let safe_name: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let now = Utc::now();
        Self {
            id,
            name,
            description: reason.into(),
            parent_id: Some(self.id),
            fork_point,
            depth: self.depth + 1,
            owner,
            status: UniverseStatus::Active,
            branch: format!("fork/{safe_name}_{id}"),
            created_at: now,
            updated_at: now,
        }
    }

    /// True for the root/canonical universe.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none() && self.depth == 0
    }

    pub fn is_active(&self) -> bool {
        self.status == UniverseStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_universe_shape() {
        let root = Universe::root("Prime");
        assert!(root.is_root());
        assert!(root.is_active());
        assert_eq!(root.depth, 0);
        assert_eq!(root.branch, "main");
    }

    #[test]
    fn fork_increments_depth() {
        let root = Universe::root("Prime");
        let child = root.fork("What If", "the king lived", None, None);
        assert_eq!(child.parent_id, Some(root.id));
        assert_eq!(child.depth, 1);
        assert!(!child.is_root());

        let grandchild = child.fork("Deeper", "again", None, None);
        assert_eq!(grandchild.depth, 2);
    }

    #[test]
    fn fork_branch_label_is_sanitized() {
        let root = Universe::root("Prime");
        let child = root.fork("The King Lives!", "", None, None);
        assert!(child.branch.starts_with("fork/the_king_lives_"));
        assert!(!child.branch.contains(' '));
    }
}
