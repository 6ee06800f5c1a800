//! The storage and LLM port traits.

use serde_json::Value;

use eb_core::entity::{Entity, EntityKind};
use eb_core::event::Event;
use eb_core::ids::{EntityId, EventId, QuestId, RelationshipId, UniverseId};
use eb_core::npc::{NpcMemory, NpcProfile};
use eb_core::quest::Quest;
use eb_core::relationship::{Relationship, RelationshipKind};
use eb_core::universe::Universe;

use crate::error::{LlmError, StoreResult};

/// A batch of staged writes applied atomically at commit.
///
/// Stage every write a turn makes, then hand the batch to
/// [`TruthRepo::commit`]. A failed commit applies nothing; dropping the
/// batch discards it. At commit the events land first, so the log never
/// trails the state it explains.
#[derive(Debug, Default)]
pub struct Transaction {
    /// (new branch, source branch) pairs.
    pub branches: Vec<(String, String)>,
    pub universes: Vec<Universe>,
    pub entities: Vec<Entity>,
    pub events: Vec<Event>,
    pub quests: Vec<Quest>,
    pub npc_profiles: Vec<NpcProfile>,
    pub memories: Vec<NpcMemory>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_branch(&mut self, name: impl Into<String>, from: impl Into<String>) {
        self.branches.push((name.into(), from.into()));
    }

    pub fn stage_universe(&mut self, universe: Universe) {
        self.universes.push(universe);
    }

    pub fn stage_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn stage_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn stage_quest(&mut self, quest: Quest) {
        self.quests.push(quest);
    }

    pub fn stage_npc_profile(&mut self, profile: NpcProfile) {
        self.npc_profiles.push(profile);
    }

    pub fn stage_memory(&mut self, memory: NpcMemory) {
        self.memories.push(memory);
    }

    /// Fold another batch into this one, preserving order.
    pub fn merge(&mut self, other: Transaction) {
        self.branches.extend(other.branches);
        self.universes.extend(other.universes);
        self.entities.extend(other.entities);
        self.events.extend(other.events);
        self.quests.extend(other.quests);
        self.npc_profiles.extend(other.npc_profiles);
        self.memories.extend(other.memories);
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
            && self.universes.is_empty()
            && self.entities.is_empty()
            && self.events.is_empty()
            && self.quests.is_empty()
            && self.npc_profiles.is_empty()
            && self.memories.is_empty()
    }
}

/// The truth store: entities, events, universes, NPC profiles, and quests,
/// with git-like branches backing universe forks.
///
/// `save_entity` is idempotent given `(id, version)`: saving the same
/// version twice is a no-op, and saving an older version than the stored one
/// is a conflict.
pub trait TruthRepo {
    // Branches
    fn create_branch(&mut self, name: &str, from: &str) -> StoreResult<()>;
    fn branch_exists(&self, name: &str) -> bool;

    // Universes
    fn save_universe(&mut self, universe: &Universe) -> StoreResult<()>;
    fn load_universe(&self, id: UniverseId) -> StoreResult<Option<Universe>>;
    fn list_universes(&self) -> StoreResult<Vec<Universe>>;

    // Entities
    fn save_entity(&mut self, entity: &Entity) -> StoreResult<()>;
    fn load_entity(&self, id: EntityId, universe: UniverseId) -> StoreResult<Option<Entity>>;
    fn find_entity_by_name(&self, name: &str, universe: UniverseId)
        -> StoreResult<Option<Entity>>;
    fn list_entities(
        &self,
        kind: Option<EntityKind>,
        universe: UniverseId,
    ) -> StoreResult<Vec<Entity>>;

    // Events
    fn append_event(&mut self, event: &Event) -> StoreResult<()>;
    fn list_events(
        &self,
        universe: UniverseId,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Event>>;
    fn load_event(&self, id: EventId) -> StoreResult<Option<Event>>;
    fn events_since(&self, universe: UniverseId, since: EventId) -> StoreResult<Vec<Event>>;
    /// The event prefix up to and including the given event — the replay
    /// input that identifies a snapshot.
    fn snapshot_at(&self, universe: UniverseId, upto: EventId) -> StoreResult<Vec<Event>>;

    // NPC profiles and memories
    fn save_npc_profile(&mut self, profile: &NpcProfile) -> StoreResult<()>;
    fn load_npc_profile(&self, entity: EntityId) -> StoreResult<Option<NpcProfile>>;
    fn record_memory(&mut self, memory: &NpcMemory) -> StoreResult<()>;
    fn recall_memories(&self, npc: EntityId, limit: usize) -> StoreResult<Vec<NpcMemory>>;

    // Quests
    fn save_quest(&mut self, quest: &Quest) -> StoreResult<()>;
    fn load_quest(&self, id: QuestId) -> StoreResult<Option<Quest>>;
    fn list_quests(&self, universe: UniverseId) -> StoreResult<Vec<Quest>>;

    /// Apply a staged batch atomically. Either every write lands or none do.
    fn commit(&mut self, transaction: Transaction) -> StoreResult<()>;
}

/// A lightweight node mirrored into the graph store.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: EntityId,
    pub universe_id: UniverseId,
    pub kind: EntityKind,
    pub name: String,
    /// Description embedding for vector retrieval, when available.
    pub embedding: Option<Vec<f32>>,
}

impl GraphNode {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            universe_id: entity.universe_id,
            kind: entity.kind(),
            name: entity.name.clone(),
            embedding: None,
        }
    }
}

/// The graph store: relationship edges, universe-local variants of canonical
/// entities, and vector retrieval over description embeddings.
///
/// Queries are exact per universe; the lazy-divergence walk across a fork's
/// ancestry is the multiverse service's job.
pub trait GraphRepo {
    fn upsert_node(&mut self, node: &GraphNode) -> StoreResult<()>;

    fn create_relationship(&mut self, relationship: &Relationship) -> StoreResult<()>;
    fn delete_relationship(&mut self, id: RelationshipId) -> StoreResult<()>;
    fn relationships_of(
        &self,
        entity: EntityId,
        universe: UniverseId,
        kind: Option<RelationshipKind>,
    ) -> StoreResult<Vec<Relationship>>;
    /// Entities with a LOCATED_IN edge to the given location.
    fn entities_at_location(
        &self,
        location: EntityId,
        universe: UniverseId,
    ) -> StoreResult<Vec<EntityId>>;

    /// Find a node by name within one universe (no ancestry fallback).
    fn find_node_by_name(&self, name: &str, universe: UniverseId)
        -> StoreResult<Option<EntityId>>;

    /// Register a universe-local variant of a canonical entity. Creates the
    /// variant node and its VARIANT_OF edge.
    fn create_variant(&mut self, canonical: EntityId, variant: &GraphNode) -> StoreResult<()>;
    fn has_variant(&self, canonical: EntityId, universe: UniverseId) -> bool;
    /// The variant shadowing a canonical entity in a universe, if any.
    fn variant_of(&self, canonical: EntityId, universe: UniverseId) -> Option<EntityId>;
    /// The canonical entity a variant shadows, if this node is a variant.
    fn canonical_of(&self, variant: EntityId) -> Option<EntityId>;

    /// Cosine-similarity search over node embeddings within a universe.
    fn query_by_vector(
        &self,
        embedding: &[f32],
        universe: UniverseId,
        limit: usize,
    ) -> StoreResult<Vec<(EntityId, f32)>>;
}

/// The LLM port. The core never builds prompts; the shell injects them.
/// Calls may fail or time out — every caller must have a deterministic
/// fallback.
pub trait LlmPort {
    /// Generate JSON matching the given schema description.
    fn generate_structured(&mut self, prompt: &str, schema: &str) -> Result<Value, LlmError>;

    /// Generate free-form narration.
    fn generate_narrative(&mut self, prompt: &str) -> Result<String, LlmError>;
}
