//! The multiverse service: forking timelines, lazy divergence, and
//! cross-universe travel.
//!
//! Forking is O(1): a new universe row, a branch label in the truth store,
//! and a FORK event in both logs. Nothing is copied. Reads walk the fork's
//! ancestry until they find the entity; the first write to a canonical
//! entity inside a fork materializes a universe-local variant linked by a
//! VARIANT_OF edge, which shadows the canonical from then on.
//!
//! These functions write through whatever `TruthRepo` they are handed.
//! Inside a turn the router hands them a `StagedTruth` view, so every write
//! here lands in the turn's transaction and commits (or vanishes)
//! atomically with the events that explain it.

use tracing::info;

use eb_core::entity::Entity;
use eb_core::event::{Event, EventOutcome, EventType};
use eb_core::ids::{EntityId, EventId, UniverseId};
use eb_core::relationship::{Relationship, RelationshipKind};
use eb_core::universe::Universe;
use eb_store::ports::{GraphNode, GraphRepo, TruthRepo};

use crate::error::{EngineError, EngineResult};

/// Result of a fork operation.
#[derive(Debug, Clone)]
pub struct ForkOutcome {
    pub universe: Universe,
    pub fork_event: EventId,
}

/// Result of a cross-universe travel.
#[derive(Debug, Clone)]
pub struct TravelOutcome {
    /// The traveler's copy in the destination universe.
    pub traveler_copy: EntityId,
    pub destination: UniverseId,
    /// Inventory items copied along.
    pub items_transferred: Vec<EntityId>,
}

/// Fork a universe at the current point of its timeline.
///
/// Appends the FORK event to **both** the parent and the child logs,
/// cross-referencing, so either side of the split can explain itself.
pub fn fork_universe(
    truth: &mut dyn TruthRepo,
    parent_id: UniverseId,
    name: &str,
    reason: &str,
    actor: EntityId,
    fork_point: Option<EventId>,
) -> EngineResult<ForkOutcome> {
    let parent = truth
        .load_universe(parent_id)?
        .ok_or_else(|| EngineError::NotFound(format!("universe {parent_id}")))?;
    if !parent.is_active() {
        return Err(EngineError::RuleViolation(format!(
            "cannot fork from a universe with status {:?}",
            parent.status
        )));
    }

    let child = parent.fork(name, reason, None, fork_point);
    if !truth.branch_exists(&parent.branch) {
        return Err(EngineError::RepoError(format!(
            "parent branch '{}' missing",
            parent.branch
        )));
    }
    truth.create_branch(&child.branch, &parent.branch)?;

    // The log leads: both FORK events land before the universe row.
    let parent_event = Event::new(parent.id, EventType::Fork, actor)
        .with_outcome(EventOutcome::Success)
        .with_payload("child_universe_id", child.id.0.to_string())
        .with_payload("fork_reason", reason);
    let mut child_event = Event::new(child.id, EventType::Fork, actor)
        .with_outcome(EventOutcome::Success)
        .with_payload("parent_universe_id", parent.id.0.to_string())
        .with_payload("fork_reason", reason);
    if let Some(point) = fork_point {
        child_event = child_event.with_payload("fork_point_event_id", point.0.to_string());
    }
    truth.append_event(&parent_event)?;
    truth.append_event(&child_event)?;
    truth.save_universe(&child)?;

    info!(parent = %parent.id, child = %child.id, "forked universe");
    Ok(ForkOutcome {
        fork_event: child_event.id,
        universe: child,
    })
}

/// The chain of universes from the root down to (and including) the given
/// one.
pub fn lineage(truth: &dyn TruthRepo, universe: UniverseId) -> EngineResult<Vec<Universe>> {
    let mut chain = Vec::new();
    let mut cursor = Some(universe);
    while let Some(id) = cursor {
        let record = truth
            .load_universe(id)?
            .ok_or_else(|| EngineError::NotFound(format!("universe {id}")))?;
        cursor = record.parent_id;
        chain.push(record);
    }
    chain.reverse();
    Ok(chain)
}

/// Resolve an entity in a universe under the lazy-divergence rule.
///
/// A universe-local row wins; otherwise a registered variant shadows the
/// canonical; otherwise the ancestry is walked and the nearest ancestor's
/// row is returned read-only.
pub fn resolve_entity(
    truth: &dyn TruthRepo,
    graph: &dyn GraphRepo,
    id: EntityId,
    universe: UniverseId,
) -> EngineResult<Option<Entity>> {
    if let Some(entity) = truth.load_entity(id, universe)? {
        return Ok(Some(entity));
    }
    if let Some(variant) = graph.variant_of(id, universe) {
        return Ok(truth.load_entity(variant, universe)?);
    }
    // Walk up the fork ancestry.
    let mut cursor = truth
        .load_universe(universe)?
        .and_then(|u| u.parent_id);
    while let Some(ancestor) = cursor {
        if let Some(entity) = truth.load_entity(id, ancestor)? {
            return Ok(Some(entity));
        }
        cursor = truth.load_universe(ancestor)?.and_then(|u| u.parent_id);
    }
    Ok(None)
}

/// Resolve an entity by name in a universe, honoring variants before
/// canonical ancestry.
pub fn resolve_by_name(
    truth: &dyn TruthRepo,
    graph: &dyn GraphRepo,
    name: &str,
    universe: UniverseId,
) -> EngineResult<Option<Entity>> {
    if let Some(entity) = truth.find_entity_by_name(name, universe)? {
        return Ok(Some(entity));
    }
    let mut cursor = truth.load_universe(universe)?.and_then(|u| u.parent_id);
    while let Some(ancestor) = cursor {
        if let Some(canonical) = truth.find_entity_by_name(name, ancestor)? {
            // A variant in the querying universe shadows the canonical.
            if let Some(variant) = graph.variant_of(canonical.id, universe) {
                return Ok(truth.load_entity(variant, universe)?);
            }
            return Ok(Some(canonical));
        }
        cursor = truth.load_universe(ancestor)?.and_then(|u| u.parent_id);
    }
    Ok(None)
}

/// Mutate an entity within a universe, materializing a variant when the
/// entity is canonical elsewhere.
///
/// Returns the entity that now carries the change (the original when it
/// lives in this universe, the variant otherwise). The variant node is
/// persisted before its VARIANT_OF edge.
pub fn mutate_entity(
    truth: &mut dyn TruthRepo,
    graph: &mut dyn GraphRepo,
    id: EntityId,
    universe: UniverseId,
    mutate: impl FnOnce(&mut Entity),
) -> EngineResult<Entity> {
    if let Some(mut entity) = truth.load_entity(id, universe)? {
        mutate(&mut entity);
        entity.version += 1;
        entity.updated_at = chrono::Utc::now();
        truth.save_entity(&entity)?;
        graph.upsert_node(&GraphNode::from_entity(&entity))?;
        return Ok(entity);
    }

    // Already diverged?
    if let Some(variant_id) = graph.variant_of(id, universe) {
        return mutate_entity(truth, graph, variant_id, universe, mutate);
    }

    let canonical = resolve_entity(truth, graph, id, universe)?
        .ok_or_else(|| EngineError::NotFound(format!("entity {id} in universe {universe}")))?;

    // First mutation in this fork: materialize the variant.
    let mut variant = canonical.clone();
    variant.id = EntityId::new();
    variant.universe_id = universe;
    variant.version = 0;
    mutate(&mut variant);
    variant.updated_at = chrono::Utc::now();
    truth.save_entity(&variant)?;
    graph.create_variant(canonical.id, &GraphNode::from_entity(&variant))?;
    info!(canonical = %canonical.id, variant = %variant.id, universe = %universe, "materialized variant");
    Ok(variant)
}

/// Copy a character into another universe.
///
/// The copy gets new ids, lands LOCATED_IN the named portal location, and
/// brings its inventory edges (OWNS/CARRIES/WIELDS/WEARS) with copied items.
/// Social edges stay behind — relationships are universe-local. A
/// WORLD_TRAVEL event is recorded in both universes.
pub fn travel_between_worlds(
    truth: &mut dyn TruthRepo,
    graph: &mut dyn GraphRepo,
    traveler_id: EntityId,
    source: UniverseId,
    destination: UniverseId,
    portal_name: &str,
) -> EngineResult<TravelOutcome> {
    let traveler = resolve_entity(truth, graph, traveler_id, source)?
        .ok_or_else(|| EngineError::NotFound(format!("traveler {traveler_id}")))?;
    if !traveler.is_character() {
        return Err(EngineError::InvalidTarget(
            "only characters can travel between worlds".to_string(),
        ));
    }
    let portal = resolve_by_name(truth, graph, portal_name, destination)?
        .ok_or_else(|| EngineError::NotFound(format!("portal location '{portal_name}'")))?;

    let mut copy = traveler.clone();
    copy.id = EntityId::new();
    copy.universe_id = destination;
    copy.version = 0;

    // The log leads: record the crossing in both universes before any state.
    let source_event = Event::new(source, EventType::WorldTravel, traveler.id)
        .with_outcome(EventOutcome::Success)
        .with_payload("to_universe_id", destination.0.to_string())
        .with_payload("traveler_copy_id", copy.id.0.to_string());
    let destination_event = Event::new(destination, EventType::WorldTravel, copy.id)
        .with_outcome(EventOutcome::Success)
        .with_location(portal.id)
        .with_payload("from_universe_id", source.0.to_string())
        .with_payload("original_entity_id", traveler.id.0.to_string());
    truth.append_event(&source_event)?;
    truth.append_event(&destination_event)?;

    truth.save_entity(&copy)?;
    graph.upsert_node(&GraphNode::from_entity(&copy))?;
    graph.create_relationship(&Relationship::new(
        destination,
        copy.id,
        RelationshipKind::LocatedIn,
        portal.id,
    ))?;

    // Inventory crosses over; KNOWS/FEARS do not.
    let mut items_transferred = Vec::new();
    for edge in graph.relationships_of(traveler.id, source, None)? {
        if !edge.kind.is_inventory() || edge.source != traveler.id {
            continue;
        }
        if let Some(item) = truth.load_entity(edge.target, source)? {
            let mut item_copy = item.clone();
            item_copy.id = EntityId::new();
            item_copy.universe_id = destination;
            item_copy.version = 0;
            truth.save_entity(&item_copy)?;
            graph.upsert_node(&GraphNode::from_entity(&item_copy))?;
            graph.create_relationship(&Relationship::new(
                destination,
                copy.id,
                edge.kind,
                item_copy.id,
            ))?;
            items_transferred.push(item_copy.id);
        }
    }

    Ok(TravelOutcome {
        traveler_copy: copy.id,
        destination,
        items_transferred,
    })
}

/// Archive a universe (never the root). Archived timelines are read-only.
pub fn archive_universe(truth: &mut dyn TruthRepo, universe: UniverseId) -> EngineResult<()> {
    let mut record = truth
        .load_universe(universe)?
        .ok_or_else(|| EngineError::NotFound(format!("universe {universe}")))?;
    if record.is_root() {
        return Err(EngineError::RuleViolation(
            "the root universe cannot be archived".to_string(),
        ));
    }
    record.status = eb_core::universe::UniverseStatus::Archived;
    record.updated_at = chrono::Utc::now();
    truth.save_universe(&record)?;
    Ok(())
}
