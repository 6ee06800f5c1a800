//! A staged view over a truth store.
//!
//! `StagedTruth` implements [`TruthRepo`] by buffering every write into a
//! [`Transaction`] while reads see the buffer overlaid on the underlying
//! store. The owner of the transaction commits it against the real store in
//! one atomic step (or drops it, discarding the turn). This is how a turn
//! satisfies "the event is appended before the repo is updated" and "a
//! failed turn never leaves partial state": nothing reaches the store until
//! everything does.

use std::collections::BTreeMap;

use eb_core::entity::{Entity, EntityKind};
use eb_core::event::Event;
use eb_core::ids::{EntityId, EventId, QuestId, UniverseId};
use eb_core::npc::{NpcMemory, NpcProfile};
use eb_core::quest::Quest;
use eb_core::universe::Universe;

use crate::error::{StoreError, StoreResult};
use crate::ports::{Transaction, TruthRepo};

/// Write-buffering, read-through view of a truth store.
pub struct StagedTruth<'a> {
    inner: &'a dyn TruthRepo,
    tx: &'a mut Transaction,
}

impl<'a> StagedTruth<'a> {
    pub fn new(inner: &'a dyn TruthRepo, tx: &'a mut Transaction) -> Self {
        Self { inner, tx }
    }

    fn staged_entity(&self, id: EntityId, universe: UniverseId) -> Option<&Entity> {
        self.tx
            .entities
            .iter()
            .rev()
            .find(|e| e.id == id && e.universe_id == universe)
    }

    /// Per-universe events: the store's log followed by this turn's staged
    /// appends, in order.
    fn combined_events(&self, universe: UniverseId) -> StoreResult<Vec<Event>> {
        let mut all = self.inner.list_events(universe, usize::MAX, 0)?;
        all.extend(
            self.tx
                .events
                .iter()
                .filter(|e| e.universe_id == universe)
                .cloned(),
        );
        Ok(all)
    }
}

impl TruthRepo for StagedTruth<'_> {
    fn create_branch(&mut self, name: &str, from: &str) -> StoreResult<()> {
        if !self.branch_exists(from) {
            return Err(StoreError::Branch(format!(
                "source branch '{from}' does not exist"
            )));
        }
        if self.branch_exists(name) {
            return Err(StoreError::Branch(format!("branch '{name}' already exists")));
        }
        self.tx.stage_branch(name, from);
        Ok(())
    }

    fn branch_exists(&self, name: &str) -> bool {
        self.tx.branches.iter().any(|(n, _)| n == name) || self.inner.branch_exists(name)
    }

    fn save_universe(&mut self, universe: &Universe) -> StoreResult<()> {
        self.tx.stage_universe(universe.clone());
        Ok(())
    }

    fn load_universe(&self, id: UniverseId) -> StoreResult<Option<Universe>> {
        if let Some(universe) = self.tx.universes.iter().rev().find(|u| u.id == id) {
            return Ok(Some(universe.clone()));
        }
        self.inner.load_universe(id)
    }

    fn list_universes(&self) -> StoreResult<Vec<Universe>> {
        let mut by_id: BTreeMap<UniverseId, Universe> = self
            .inner
            .list_universes()?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        for universe in &self.tx.universes {
            by_id.insert(universe.id, universe.clone());
        }
        let mut all: Vec<Universe> = by_id.into_values().collect();
        all.sort_by_key(|u| (u.depth, u.created_at));
        Ok(all)
    }

    fn save_entity(&mut self, entity: &Entity) -> StoreResult<()> {
        let current = match self.staged_entity(entity.id, entity.universe_id) {
            Some(staged) => Some(staged.version),
            None => self
                .inner
                .load_entity(entity.id, entity.universe_id)?
                .map(|e| e.version),
        };
        match current {
            Some(version) if entity.version == version => Ok(()),
            Some(version) if entity.version < version => Err(StoreError::Conflict(format!(
                "entity {} version {} is behind stored version {}",
                entity.id, entity.version, version
            ))),
            _ => {
                self.tx.stage_entity(entity.clone());
                Ok(())
            }
        }
    }

    fn load_entity(&self, id: EntityId, universe: UniverseId) -> StoreResult<Option<Entity>> {
        if let Some(entity) = self.staged_entity(id, universe) {
            return Ok(Some(entity.clone()));
        }
        self.inner.load_entity(id, universe)
    }

    fn find_entity_by_name(
        &self,
        name: &str,
        universe: UniverseId,
    ) -> StoreResult<Option<Entity>> {
        let lower = name.to_lowercase();
        if let Some(entity) = self
            .tx
            .entities
            .iter()
            .rev()
            .find(|e| e.universe_id == universe && e.name.to_lowercase() == lower)
        {
            return Ok(Some(entity.clone()));
        }
        self.inner.find_entity_by_name(name, universe)
    }

    fn list_entities(
        &self,
        kind: Option<EntityKind>,
        universe: UniverseId,
    ) -> StoreResult<Vec<Entity>> {
        let mut by_id: BTreeMap<EntityId, Entity> = self
            .inner
            .list_entities(None, universe)?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();
        for entity in self.tx.entities.iter().filter(|e| e.universe_id == universe) {
            by_id.insert(entity.id, entity.clone());
        }
        let mut all: Vec<Entity> = by_id
            .into_values()
            .filter(|e| kind.is_none_or(|k| e.kind() == k))
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    fn append_event(&mut self, event: &Event) -> StoreResult<()> {
        let duplicate = self.tx.events.iter().any(|e| e.id == event.id)
            || self.inner.load_event(event.id)?.is_some();
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "event {} already appended",
                event.id
            )));
        }
        self.tx.stage_event(event.clone());
        Ok(())
    }

    fn list_events(
        &self,
        universe: UniverseId,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Event>> {
        Ok(self
            .combined_events(universe)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn load_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        if let Some(event) = self.tx.events.iter().find(|e| e.id == id) {
            return Ok(Some(event.clone()));
        }
        self.inner.load_event(id)
    }

    fn events_since(&self, universe: UniverseId, since: EventId) -> StoreResult<Vec<Event>> {
        let all = self.combined_events(universe)?;
        let Some(index) = all.iter().position(|e| e.id == since) else {
            return Ok(Vec::new());
        };
        Ok(all[index + 1..].to_vec())
    }

    fn snapshot_at(&self, universe: UniverseId, upto: EventId) -> StoreResult<Vec<Event>> {
        let mut prefix = Vec::new();
        for event in self.combined_events(universe)? {
            let hit = event.id == upto;
            prefix.push(event);
            if hit {
                return Ok(prefix);
            }
        }
        Err(StoreError::NotFound(format!(
            "event {upto} in universe {universe}"
        )))
    }

    fn save_npc_profile(&mut self, profile: &NpcProfile) -> StoreResult<()> {
        self.tx.stage_npc_profile(profile.clone());
        Ok(())
    }

    fn load_npc_profile(&self, entity: EntityId) -> StoreResult<Option<NpcProfile>> {
        if let Some(profile) = self
            .tx
            .npc_profiles
            .iter()
            .rev()
            .find(|p| p.entity_id == entity)
        {
            return Ok(Some(profile.clone()));
        }
        self.inner.load_npc_profile(entity)
    }

    fn record_memory(&mut self, memory: &NpcMemory) -> StoreResult<()> {
        self.tx.stage_memory(memory.clone());
        Ok(())
    }

    fn recall_memories(&self, npc: EntityId, limit: usize) -> StoreResult<Vec<NpcMemory>> {
        let mut all = self.inner.recall_memories(npc, usize::MAX)?;
        all.extend(self.tx.memories.iter().filter(|m| m.npc_id == npc).cloned());
        all.sort_by(|a, b| b.formed_at.cmp(&a.formed_at));
        all.truncate(limit);
        Ok(all)
    }

    fn save_quest(&mut self, quest: &Quest) -> StoreResult<()> {
        self.tx.stage_quest(quest.clone());
        Ok(())
    }

    fn load_quest(&self, id: QuestId) -> StoreResult<Option<Quest>> {
        if let Some(quest) = self.tx.quests.iter().rev().find(|q| q.id == id) {
            return Ok(Some(quest.clone()));
        }
        self.inner.load_quest(id)
    }

    fn list_quests(&self, universe: UniverseId) -> StoreResult<Vec<Quest>> {
        let mut by_id: BTreeMap<QuestId, Quest> = self
            .inner
            .list_quests(universe)?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();
        for quest in self.tx.quests.iter().filter(|q| q.universe_id == universe) {
            by_id.insert(quest.id, quest.clone());
        }
        let mut all: Vec<Quest> = by_id.into_values().collect();
        all.sort_by_key(|q| q.created_at);
        Ok(all)
    }

    fn commit(&mut self, transaction: Transaction) -> StoreResult<()> {
        self.tx.merge(transaction);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTruthRepo;
    use eb_core::event::EventType;

    fn seeded() -> (MemoryTruthRepo, Universe, Entity) {
        let mut store = MemoryTruthRepo::new();
        let universe = Universe::root("Prime");
        store.save_universe(&universe).unwrap();
        let hero = Entity::character(universe.id, "Kael", 10, 12);
        store.save_entity(&hero).unwrap();
        (store, universe, hero)
    }

    #[test]
    fn writes_stay_staged_until_committed() {
        let (mut store, universe, hero) = seeded();
        let mut tx = Transaction::new();
        {
            let mut view = StagedTruth::new(&store, &mut tx);
            let mut wounded = hero.clone();
            wounded.character_stats_mut().unwrap().hp_current = 3;
            wounded.version += 1;
            view.save_entity(&wounded).unwrap();
            view.append_event(&Event::new(universe.id, EventType::Damage, hero.id))
                .unwrap();

            // The view sees its own writes...
            let seen = view.load_entity(hero.id, universe.id).unwrap().unwrap();
            assert_eq!(seen.character_stats().unwrap().hp_current, 3);
            assert_eq!(view.list_events(universe.id, 10, 0).unwrap().len(), 1);
        }
        // ...the store does not, until the commit.
        let live = store.load_entity(hero.id, universe.id).unwrap().unwrap();
        assert_eq!(live.character_stats().unwrap().hp_current, 10);
        assert!(store.list_events(universe.id, 10, 0).unwrap().is_empty());

        store.commit(tx).unwrap();
        let live = store.load_entity(hero.id, universe.id).unwrap().unwrap();
        assert_eq!(live.character_stats().unwrap().hp_current, 3);
        assert_eq!(store.list_events(universe.id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn dropped_buffer_discards_everything() {
        let (mut store, universe, hero) = seeded();
        let mut tx = Transaction::new();
        {
            let mut view = StagedTruth::new(&store, &mut tx);
            let mut wounded = hero.clone();
            wounded.version += 1;
            view.save_entity(&wounded).unwrap();
            view.append_event(&Event::new(universe.id, EventType::Damage, hero.id))
                .unwrap();
        }
        drop(tx);
        assert!(store.list_events(universe.id, 10, 0).unwrap().is_empty());
        let live = store.load_entity(hero.id, universe.id).unwrap().unwrap();
        assert_eq!(live.version, 0);
    }

    #[test]
    fn repeated_saves_in_one_turn_chain_versions() {
        let (store, universe, hero) = seeded();
        let mut tx = Transaction::new();
        let mut view = StagedTruth::new(&store, &mut tx);

        let mut first = hero.clone();
        first.version += 1;
        view.save_entity(&first).unwrap();

        // A second mutation reads the staged version, not the store's.
        let mut second = view.load_entity(hero.id, universe.id).unwrap().unwrap();
        assert_eq!(second.version, 1);
        second.version += 1;
        view.save_entity(&second).unwrap();

        // A stale write is refused at staging time.
        let mut stale = hero.clone();
        stale.version = 0;
        stale.name = "Impostor".to_string();
        assert!(matches!(view.save_entity(&stale), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn branch_and_universe_staging() {
        let (store, universe, _hero) = seeded();
        let mut tx = Transaction::new();
        let mut view = StagedTruth::new(&store, &mut tx);

        view.create_branch("fork/a", "main").unwrap();
        assert!(view.branch_exists("fork/a"));
        // Chained: a branch from a staged branch works within the turn.
        view.create_branch("fork/b", "fork/a").unwrap();
        assert!(view.create_branch("fork/a", "main").is_err());

        let child = universe.fork("Fork", "why not", None, None);
        view.save_universe(&child).unwrap();
        assert!(view.load_universe(child.id).unwrap().is_some());
        assert_eq!(view.list_universes().unwrap().len(), 2);
    }

    #[test]
    fn staged_events_extend_the_log_in_order() {
        let (mut store, universe, hero) = seeded();
        let prior = Event::new(universe.id, EventType::SessionStart, hero.id);
        store.append_event(&prior).unwrap();

        let mut tx = Transaction::new();
        let mut view = StagedTruth::new(&store, &mut tx);
        let fresh = Event::new(universe.id, EventType::Travel, hero.id);
        view.append_event(&fresh).unwrap();

        let all = view.list_events(universe.id, 10, 0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, prior.id);
        assert_eq!(all[1].id, fresh.id);

        let since = view.events_since(universe.id, prior.id).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].id, fresh.id);

        // Duplicates are refused against both the store and the buffer.
        assert!(view.append_event(&prior).is_err());
        assert!(view.append_event(&fresh).is_err());
    }
}
