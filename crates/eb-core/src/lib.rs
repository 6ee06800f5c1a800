//! Core data model for Everbranch: entities, universes, events,
//! relationships, resource pools, and quests.
//!
//! This crate defines the records that the truth store and graph store
//! persist. It is independent of any resolution mechanics — you can construct
//! a world programmatically or deserialize one from JSON.

pub mod condition;
pub mod entity;
pub mod error;
pub mod event;
pub mod ids;
pub mod npc;
pub mod quest;
pub mod relationship;
pub mod resources;
pub mod universe;

pub use entity::{AbilityScores, Entity, EntityKind, Stats};
pub use error::{CoreError, CoreResult};
pub use event::{Event, EventOutcome, EventType};
pub use ids::{AbilityId, EntityId, EventId, QuestId, RelationshipId, UniverseId};
pub use relationship::{Relationship, RelationshipKind};
pub use universe::{Universe, UniverseStatus};
