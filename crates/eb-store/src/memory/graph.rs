use std::collections::HashMap;

use eb_core::ids::{EntityId, RelationshipId, UniverseId};
use eb_core::relationship::{Relationship, RelationshipKind};

use crate::error::{StoreError, StoreResult};
use crate::ports::{GraphNode, GraphRepo};

/// In-memory graph store.
///
/// Nodes and edges are exact per universe. Variants are tracked in a
/// `(canonical, universe) -> variant` map, with the VARIANT_OF edge stored
/// like any other relationship.
#[derive(Debug, Default)]
pub struct MemoryGraphRepo {
    nodes: HashMap<EntityId, GraphNode>,
    relationships: HashMap<RelationshipId, Relationship>,
    variants: HashMap<(EntityId, UniverseId), EntityId>,
    canonical_by_variant: HashMap<EntityId, EntityId>,
}

impl MemoryGraphRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: EntityId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }
}

impl GraphRepo for MemoryGraphRepo {
    fn upsert_node(&mut self, node: &GraphNode) -> StoreResult<()> {
        self.nodes.insert(node.id, node.clone());
        Ok(())
    }

    fn create_relationship(&mut self, relationship: &Relationship) -> StoreResult<()> {
        // LOCATED_IN is functional: a new location edge replaces the old one.
        if relationship.kind == RelationshipKind::LocatedIn {
            let existing: Vec<RelationshipId> = self
                .relationships
                .values()
                .filter(|r| {
                    r.kind == RelationshipKind::LocatedIn
                        && r.source == relationship.source
                        && r.universe_id == relationship.universe_id
                })
                .map(|r| r.id)
                .collect();
            for id in existing {
                self.relationships.remove(&id);
            }
        }
        self.relationships.insert(relationship.id, relationship.clone());
        Ok(())
    }

    fn delete_relationship(&mut self, id: RelationshipId) -> StoreResult<()> {
        self.relationships
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("relationship {id}")))
    }

    fn relationships_of(
        &self,
        entity: EntityId,
        universe: UniverseId,
        kind: Option<RelationshipKind>,
    ) -> StoreResult<Vec<Relationship>> {
        Ok(self
            .relationships
            .values()
            .filter(|r| r.universe_id == universe)
            .filter(|r| r.source == entity || r.target == entity)
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect())
    }

    fn entities_at_location(
        &self,
        location: EntityId,
        universe: UniverseId,
    ) -> StoreResult<Vec<EntityId>> {
        Ok(self
            .relationships
            .values()
            .filter(|r| {
                r.kind == RelationshipKind::LocatedIn
                    && r.target == location
                    && r.universe_id == universe
            })
            .map(|r| r.source)
            .collect())
    }

    fn find_node_by_name(
        &self,
        name: &str,
        universe: UniverseId,
    ) -> StoreResult<Option<EntityId>> {
        let lower = name.to_lowercase();
        Ok(self
            .nodes
            .values()
            .find(|n| n.universe_id == universe && n.name.to_lowercase() == lower)
            .map(|n| n.id))
    }

    fn create_variant(&mut self, canonical: EntityId, variant: &GraphNode) -> StoreResult<()> {
        if self.canonical_by_variant.contains_key(&canonical) {
            return Err(StoreError::Conflict(format!(
                "entity {canonical} is itself a variant; variants chain to the canonical"
            )));
        }
        let key = (canonical, variant.universe_id);
        if self.variants.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "entity {canonical} already has a variant in universe {}",
                variant.universe_id
            )));
        }
        self.nodes.insert(variant.id, variant.clone());
        self.variants.insert(key, variant.id);
        self.canonical_by_variant.insert(variant.id, canonical);
        let edge = Relationship::new(
            variant.universe_id,
            variant.id,
            RelationshipKind::VariantOf,
            canonical,
        );
        self.relationships.insert(edge.id, edge);
        Ok(())
    }

    fn has_variant(&self, canonical: EntityId, universe: UniverseId) -> bool {
        self.variants.contains_key(&(canonical, universe))
    }

    fn variant_of(&self, canonical: EntityId, universe: UniverseId) -> Option<EntityId> {
        self.variants.get(&(canonical, universe)).copied()
    }

    fn canonical_of(&self, variant: EntityId) -> Option<EntityId> {
        self.canonical_by_variant.get(&variant).copied()
    }

    fn query_by_vector(
        &self,
        embedding: &[f32],
        universe: UniverseId,
        limit: usize,
    ) -> StoreResult<Vec<(EntityId, f32)>> {
        let mut scored: Vec<(EntityId, f32)> = self
            .nodes
            .values()
            .filter(|n| n.universe_id == universe)
            .filter_map(|n| {
                n.embedding
                    .as_ref()
                    .map(|e| (n.id, cosine_similarity(embedding, e)))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
