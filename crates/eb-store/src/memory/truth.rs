use std::collections::{HashMap, HashSet};

use eb_core::entity::{Entity, EntityKind};
use eb_core::event::Event;
use eb_core::ids::{EntityId, EventId, QuestId, UniverseId};
use eb_core::npc::{NpcMemory, NpcProfile};
use eb_core::quest::Quest;
use eb_core::universe::Universe;

use crate::error::{StoreError, StoreResult};
use crate::ports::{Transaction, TruthRepo};

/// In-memory truth store.
///
/// Branches are labels: forking copies nothing, and rows are keyed by
/// `(id, universe)`. The event log is a single append-ordered vector;
/// per-universe order is the order of appends, which keeps timelines
/// strictly monotonic without clock games.
#[derive(Debug, Default)]
pub struct MemoryTruthRepo {
    branches: HashSet<String>,
    universes: HashMap<UniverseId, Universe>,
    entities: HashMap<(EntityId, UniverseId), Entity>,
    events: Vec<Event>,
    npc_profiles: HashMap<EntityId, NpcProfile>,
    memories: HashMap<EntityId, Vec<NpcMemory>>,
    quests: HashMap<QuestId, Quest>,
}

impl MemoryTruthRepo {
    pub fn new() -> Self {
        let mut branches = HashSet::new();
        branches.insert("main".to_string());
        Self {
            branches,
            ..Self::default()
        }
    }

    fn check_entity_version(&self, entity: &Entity) -> StoreResult<bool> {
        match self.entities.get(&(entity.id, entity.universe_id)) {
            Some(existing) if entity.version == existing.version => Ok(false),
            Some(existing) if entity.version < existing.version => Err(StoreError::Conflict(
                format!(
                    "entity {} version {} is behind stored version {}",
                    entity.id, entity.version, existing.version
                ),
            )),
            _ => Ok(true),
        }
    }
}

impl TruthRepo for MemoryTruthRepo {
    fn create_branch(&mut self, name: &str, from: &str) -> StoreResult<()> {
        if !self.branches.contains(from) {
            return Err(StoreError::Branch(format!("source branch '{from}' does not exist")));
        }
        if !self.branches.insert(name.to_string()) {
            return Err(StoreError::Branch(format!("branch '{name}' already exists")));
        }
        Ok(())
    }

    fn branch_exists(&self, name: &str) -> bool {
        self.branches.contains(name)
    }

    fn save_universe(&mut self, universe: &Universe) -> StoreResult<()> {
        self.universes.insert(universe.id, universe.clone());
        Ok(())
    }

    fn load_universe(&self, id: UniverseId) -> StoreResult<Option<Universe>> {
        Ok(self.universes.get(&id).cloned())
    }

    fn list_universes(&self) -> StoreResult<Vec<Universe>> {
        let mut all: Vec<Universe> = self.universes.values().cloned().collect();
        all.sort_by_key(|u| (u.depth, u.created_at));
        Ok(all)
    }

    fn save_entity(&mut self, entity: &Entity) -> StoreResult<()> {
        if self.check_entity_version(entity)? {
            self.entities
                .insert((entity.id, entity.universe_id), entity.clone());
        }
        Ok(())
    }

    fn load_entity(&self, id: EntityId, universe: UniverseId) -> StoreResult<Option<Entity>> {
        Ok(self.entities.get(&(id, universe)).cloned())
    }

    fn find_entity_by_name(
        &self,
        name: &str,
        universe: UniverseId,
    ) -> StoreResult<Option<Entity>> {
        let lower = name.to_lowercase();
        Ok(self
            .entities
            .values()
            .find(|e| e.universe_id == universe && e.name.to_lowercase() == lower)
            .cloned())
    }

    fn list_entities(
        &self,
        kind: Option<EntityKind>,
        universe: UniverseId,
    ) -> StoreResult<Vec<Entity>> {
        let mut found: Vec<Entity> = self
            .entities
            .values()
            .filter(|e| e.universe_id == universe)
            .filter(|e| kind.is_none_or(|k| e.kind() == k))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    fn append_event(&mut self, event: &Event) -> StoreResult<()> {
        if self.events.iter().any(|e| e.id == event.id) {
            return Err(StoreError::Conflict(format!(
                "event {} already appended",
                event.id
            )));
        }
        self.events.push(event.clone());
        Ok(())
    }

    fn list_events(
        &self,
        universe: UniverseId,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Event>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.universe_id == universe)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn load_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.events.iter().find(|e| e.id == id).cloned())
    }

    fn events_since(&self, universe: UniverseId, since: EventId) -> StoreResult<Vec<Event>> {
        let universe_events: Vec<&Event> = self
            .events
            .iter()
            .filter(|e| e.universe_id == universe)
            .collect();
        let Some(index) = universe_events.iter().position(|e| e.id == since) else {
            return Ok(Vec::new());
        };
        Ok(universe_events[index + 1..].iter().map(|e| (*e).clone()).collect())
    }

    fn snapshot_at(&self, universe: UniverseId, upto: EventId) -> StoreResult<Vec<Event>> {
        let mut prefix = Vec::new();
        let mut found = false;
        for event in self.events.iter().filter(|e| e.universe_id == universe) {
            prefix.push(event.clone());
            if event.id == upto {
                found = true;
                break;
            }
        }
        if !found {
            return Err(StoreError::NotFound(format!("event {upto} in universe {universe}")));
        }
        Ok(prefix)
    }

    fn save_npc_profile(&mut self, profile: &NpcProfile) -> StoreResult<()> {
        self.npc_profiles.insert(profile.entity_id, profile.clone());
        Ok(())
    }

    fn load_npc_profile(&self, entity: EntityId) -> StoreResult<Option<NpcProfile>> {
        Ok(self.npc_profiles.get(&entity).cloned())
    }

    fn record_memory(&mut self, memory: &NpcMemory) -> StoreResult<()> {
        self.memories
            .entry(memory.npc_id)
            .or_default()
            .push(memory.clone());
        Ok(())
    }

    fn recall_memories(&self, npc: EntityId, limit: usize) -> StoreResult<Vec<NpcMemory>> {
        let mut found = self.memories.get(&npc).cloned().unwrap_or_default();
        found.sort_by(|a, b| b.formed_at.cmp(&a.formed_at));
        found.truncate(limit);
        Ok(found)
    }

    fn save_quest(&mut self, quest: &Quest) -> StoreResult<()> {
        self.quests.insert(quest.id, quest.clone());
        Ok(())
    }

    fn load_quest(&self, id: QuestId) -> StoreResult<Option<Quest>> {
        Ok(self.quests.get(&id).cloned())
    }

    fn list_quests(&self, universe: UniverseId) -> StoreResult<Vec<Quest>> {
        let mut found: Vec<Quest> = self
            .quests
            .values()
            .filter(|q| q.universe_id == universe)
            .cloned()
            .collect();
        found.sort_by_key(|q| q.created_at);
        Ok(found)
    }

    fn commit(&mut self, transaction: Transaction) -> StoreResult<()> {
        // Validate everything before applying anything.
        for (index, (name, from)) in transaction.branches.iter().enumerate() {
            let from_exists = self.branches.contains(from)
                || transaction.branches[..index].iter().any(|(n, _)| n == from);
            if !from_exists {
                return Err(StoreError::Branch(format!(
                    "source branch '{from}' does not exist"
                )));
            }
            let name_taken = self.branches.contains(name)
                || transaction.branches[..index].iter().any(|(n, _)| n == name);
            if name_taken {
                return Err(StoreError::Branch(format!("branch '{name}' already exists")));
            }
        }
        for entity in &transaction.entities {
            self.check_entity_version(entity)?;
        }
        for event in &transaction.events {
            if self.events.iter().any(|e| e.id == event.id) {
                return Err(StoreError::Conflict(format!(
                    "event {} already appended",
                    event.id
                )));
            }
        }

        // The log lands first; everything else is a function of it.
        for event in transaction.events {
            self.events.push(event);
        }
        for (name, _) in transaction.branches {
            self.branches.insert(name);
        }
        for universe in transaction.universes {
            self.universes.insert(universe.id, universe);
        }
        for entity in transaction.entities {
            self.entities.insert((entity.id, entity.universe_id), entity);
        }
        for quest in transaction.quests {
            self.quests.insert(quest.id, quest);
        }
        for profile in transaction.npc_profiles {
            self.npc_profiles.insert(profile.entity_id, profile);
        }
        for memory in transaction.memories {
            self.memories.entry(memory.npc_id).or_default().push(memory);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eb_core::event::EventType;

    fn repo_with_universe() -> (MemoryTruthRepo, Universe) {
        let mut repo = MemoryTruthRepo::new();
        let universe = Universe::root("Prime");
        repo.save_universe(&universe).unwrap();
        (repo, universe)
    }

    #[test]
    fn branch_lifecycle() {
        let mut repo = MemoryTruthRepo::new();
        assert!(repo.branch_exists("main"));
        repo.create_branch("fork/a", "main").unwrap();
        assert!(repo.branch_exists("fork/a"));
        assert!(repo.create_branch("fork/a", "main").is_err());
        assert!(repo.create_branch("fork/b", "nope").is_err());
    }

    #[test]
    fn save_entity_idempotent_per_version() {
        let (mut repo, universe) = repo_with_universe();
        let mut entity = Entity::character(universe.id, "Kael", 10, 12);
        repo.save_entity(&entity).unwrap();

        // Same version again: no-op, not an error.
        repo.save_entity(&entity).unwrap();

        // Newer version: applied.
        entity.character_stats_mut().unwrap().hp_current = 5;
        entity.version += 1;
        repo.save_entity(&entity).unwrap();
        let loaded = repo.load_entity(entity.id, universe.id).unwrap().unwrap();
        assert_eq!(loaded.character_stats().unwrap().hp_current, 5);

        // Stale version: conflict, store unchanged.
        let mut stale = loaded.clone();
        stale.version = 0;
        stale.character_stats_mut().unwrap().hp_current = 9;
        assert!(matches!(repo.save_entity(&stale), Err(StoreError::Conflict(_))));
        let unchanged = repo.load_entity(entity.id, universe.id).unwrap().unwrap();
        assert_eq!(unchanged.character_stats().unwrap().hp_current, 5);
    }

    #[test]
    fn same_version_save_does_not_overwrite() {
        let (mut repo, universe) = repo_with_universe();
        let entity = Entity::character(universe.id, "Kael", 10, 12);
        repo.save_entity(&entity).unwrap();

        let mut tweaked = entity.clone();
        tweaked.character_stats_mut().unwrap().hp_current = 1;
        repo.save_entity(&tweaked).unwrap();

        let loaded = repo.load_entity(entity.id, universe.id).unwrap().unwrap();
        assert_eq!(loaded.character_stats().unwrap().hp_current, 10);
    }

    #[test]
    fn events_are_append_only_and_ordered() {
        let (mut repo, universe) = repo_with_universe();
        let actor = EntityId::new();
        let first = Event::new(universe.id, EventType::SessionStart, actor);
        let second = Event::new(universe.id, EventType::Travel, actor);
        repo.append_event(&first).unwrap();
        repo.append_event(&second).unwrap();
        assert!(repo.append_event(&first).is_err());

        let events = repo.list_events(universe.id, 10, 0).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, first.id);
        assert_eq!(events[1].id, second.id);

        let since = repo.events_since(universe.id, first.id).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].id, second.id);
    }

    #[test]
    fn snapshot_at_returns_prefix() {
        let (mut repo, universe) = repo_with_universe();
        let actor = EntityId::new();
        let events: Vec<Event> = (0..3)
            .map(|_| Event::new(universe.id, EventType::Travel, actor))
            .collect();
        for event in &events {
            repo.append_event(event).unwrap();
        }

        let prefix = repo.snapshot_at(universe.id, events[1].id).unwrap();
        assert_eq!(prefix.len(), 2);
        assert!(repo.snapshot_at(universe.id, EventId::new()).is_err());
    }

    #[test]
    fn events_are_universe_scoped() {
        let (mut repo, universe) = repo_with_universe();
        let other = Universe::root("Other");
        repo.save_universe(&other).unwrap();
        let actor = EntityId::new();
        repo.append_event(&Event::new(universe.id, EventType::Travel, actor)).unwrap();
        repo.append_event(&Event::new(other.id, EventType::Travel, actor)).unwrap();

        assert_eq!(repo.list_events(universe.id, 10, 0).unwrap().len(), 1);
        assert_eq!(repo.list_events(other.id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn commit_applies_all_or_nothing() {
        let (mut repo, universe) = repo_with_universe();
        let mut entity = Entity::character(universe.id, "Kael", 10, 12);
        repo.save_entity(&entity).unwrap();
        // Advance the stored version so a version-0 write is stale.
        entity.version += 1;
        repo.save_entity(&entity).unwrap();

        let mut fresh = entity.clone();
        fresh.version += 1;
        fresh.character_stats_mut().unwrap().hp_current = 3;
        let mut stale = entity.clone();
        stale.version = 0;

        // The valid writes come first to prove the failure discards them too.
        let mut tx = Transaction::new();
        tx.stage_entity(fresh);
        tx.stage_event(Event::new(universe.id, EventType::Damage, entity.id));
        tx.stage_entity(stale);

        assert!(repo.commit(tx).is_err());
        assert!(repo.list_events(universe.id, 10, 0).unwrap().is_empty());
        let loaded = repo.load_entity(entity.id, universe.id).unwrap().unwrap();
        assert_eq!(loaded.character_stats().unwrap().hp_current, 10);
    }

    #[test]
    fn commit_happy_path() {
        let (mut repo, universe) = repo_with_universe();
        let mut entity = Entity::character(universe.id, "Kael", 10, 12);
        repo.save_entity(&entity).unwrap();

        entity.character_stats_mut().unwrap().hp_current = 6;
        entity.version += 1;
        let mut tx = Transaction::new();
        tx.stage_entity(entity.clone());
        tx.stage_event(
            Event::new(universe.id, EventType::Damage, entity.id).with_payload("hp_after", 6),
        );
        repo.commit(tx).unwrap();

        assert_eq!(repo.list_events(universe.id, 10, 0).unwrap().len(), 1);
        let loaded = repo.load_entity(entity.id, universe.id).unwrap().unwrap();
        assert_eq!(loaded.character_stats().unwrap().hp_current, 6);
    }

    #[test]
    fn npc_profiles_and_memories() {
        let mut repo = MemoryTruthRepo::new();
        let npc = EntityId::new();
        let profile = NpcProfile::new(npc);
        repo.save_npc_profile(&profile).unwrap();
        assert!(repo.load_npc_profile(npc).unwrap().is_some());
        assert!(repo.load_npc_profile(EntityId::new()).unwrap().is_none());

        use eb_core::npc::{MemoryKind, NpcMemory};
        for i in 0..5 {
            repo.record_memory(&NpcMemory::new(npc, MemoryKind::Dialogue, format!("line {i}")))
                .unwrap();
        }
        assert_eq!(repo.recall_memories(npc, 3).unwrap().len(), 3);
    }
}
