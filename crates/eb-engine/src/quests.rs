//! Quest progression: advancing objectives from events and issuing rewards.

use eb_core::event::{Event, EventOutcome, EventType};
use eb_core::ids::{EntityId, QuestId, UniverseId};
use eb_core::quest::{Quest, QuestStatus};
use eb_store::ports::TruthRepo;

use crate::error::{EngineError, EngineResult};
use crate::reputation::ReputationChange;

/// What advancing a quest produced.
#[derive(Debug, Clone, Default)]
pub struct QuestProgress {
    pub quests_advanced: Vec<QuestId>,
    pub quests_completed: Vec<QuestId>,
    /// Reputation changes owed from completed rewards.
    pub reputation_changes: Vec<ReputationChange>,
    /// Gold and XP owed from completed rewards.
    pub gold: u32,
    pub experience: u32,
    /// Follow-up quests unlocked by chains.
    pub quests_unlocked: Vec<QuestId>,
}

/// Accept an available quest.
pub fn accept_quest(truth: &mut dyn TruthRepo, quest_id: QuestId) -> EngineResult<Quest> {
    let mut quest = truth
        .load_quest(quest_id)?
        .ok_or_else(|| EngineError::NotFound(format!("quest {quest_id}")))?;
    if quest.status != QuestStatus::Available {
        return Err(EngineError::RuleViolation(format!(
            "quest '{}' is not available",
            quest.name
        )));
    }
    quest.accept();
    truth.save_quest(&quest)?;
    Ok(quest)
}

/// Advance every active quest whose current objective targets the given
/// entity. Completing a quest collects its reward and unlocks its chain.
pub fn record_progress(
    truth: &mut dyn TruthRepo,
    universe: UniverseId,
    target: EntityId,
    amount: u32,
) -> EngineResult<QuestProgress> {
    let mut progress = QuestProgress::default();

    for quest in truth.list_quests(universe)? {
        if quest.status != QuestStatus::Active {
            continue;
        }
        let matches = quest
            .active_objective()
            .is_some_and(|o| o.target == Some(target));
        if !matches {
            continue;
        }

        let mut quest = quest;
        let completed = quest.advance(amount);
        progress.quests_advanced.push(quest.id);

        if completed {
            progress.quests_completed.push(quest.id);
            progress.gold += quest.reward.gold;
            progress.experience += quest.reward.experience;
            for (faction, delta) in &quest.reward.reputation {
                progress.reputation_changes.push(ReputationChange {
                    faction: *faction,
                    delta: *delta,
                    reason: format!("completed '{}'", quest.name),
                });
            }
            if let Some(next_id) = quest.next_quest {
                if let Some(mut next) = truth.load_quest(next_id)? {
                    if next.status == QuestStatus::Available {
                        next.accept();
                        truth.save_quest(&next)?;
                        progress.quests_unlocked.push(next.id);
                    }
                }
            }
        }
        truth.save_quest(&quest)?;
    }

    Ok(progress)
}

/// Build the QUEST_UPDATED event for a progress report.
pub fn progress_event(
    universe: UniverseId,
    actor: EntityId,
    progress: &QuestProgress,
) -> Option<Event> {
    if progress.quests_advanced.is_empty() {
        return None;
    }
    let mut event = Event::new(universe, EventType::QuestUpdated, actor)
        .with_outcome(EventOutcome::Success)
        .with_payload("advanced", progress.quests_advanced.len() as i64)
        .with_payload("completed", progress.quests_completed.len() as i64);
    if progress.gold > 0 {
        event = event.with_payload("gold", progress.gold as i64);
    }
    if progress.experience > 0 {
        event = event.with_payload("experience", progress.experience as i64);
    }
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eb_core::quest::{Objective, Reward};
    use eb_core::universe::Universe;
    use eb_store::memory::MemoryTruthRepo;

    fn setup() -> (MemoryTruthRepo, UniverseId, EntityId) {
        let mut truth = MemoryTruthRepo::new();
        let universe = Universe::root("Prime");
        truth.save_universe(&universe).unwrap();
        (truth, universe.id, EntityId::new())
    }

    fn rat_quest(universe: UniverseId, target: EntityId) -> Quest {
        let mut quest = Quest::new(
            universe,
            "Rat Problem",
            vec![Objective::new("Kill the rats", 2).with_target(target)],
        );
        quest.reward = Reward {
            gold: 50,
            experience: 100,
            items: Vec::new(),
            reputation: vec![(EntityId::new(), 10)],
        };
        quest
    }

    #[test]
    fn accepting_moves_to_active() {
        let (mut truth, universe, target) = setup();
        let quest = rat_quest(universe, target);
        truth.save_quest(&quest).unwrap();

        let accepted = accept_quest(&mut truth, quest.id).unwrap();
        assert_eq!(accepted.status, QuestStatus::Active);
        assert!(accept_quest(&mut truth, quest.id).is_err());
    }

    #[test]
    fn progress_only_counts_active_quests() {
        let (mut truth, universe, target) = setup();
        let quest = rat_quest(universe, target);
        truth.save_quest(&quest).unwrap();

        let progress = record_progress(&mut truth, universe, target, 1).unwrap();
        assert!(progress.quests_advanced.is_empty());
    }

    #[test]
    fn completion_collects_reward() {
        let (mut truth, universe, target) = setup();
        let quest = rat_quest(universe, target);
        truth.save_quest(&quest).unwrap();
        accept_quest(&mut truth, quest.id).unwrap();

        let progress = record_progress(&mut truth, universe, target, 1).unwrap();
        assert_eq!(progress.quests_advanced, vec![quest.id]);
        assert!(progress.quests_completed.is_empty());

        let progress = record_progress(&mut truth, universe, target, 1).unwrap();
        assert_eq!(progress.quests_completed, vec![quest.id]);
        assert_eq!(progress.gold, 50);
        assert_eq!(progress.experience, 100);
        assert_eq!(progress.reputation_changes.len(), 1);

        let done = truth.load_quest(quest.id).unwrap().unwrap();
        assert_eq!(done.status, QuestStatus::Completed);
    }

    #[test]
    fn chained_quest_unlocks() {
        let (mut truth, universe, target) = setup();
        let followup = Quest::new(
            universe,
            "Nest of the Rat King",
            vec![Objective::new("Find the nest", 1)],
        );
        let mut quest = rat_quest(universe, target);
        quest.next_quest = Some(followup.id);
        truth.save_quest(&followup).unwrap();
        truth.save_quest(&quest).unwrap();
        accept_quest(&mut truth, quest.id).unwrap();

        let progress = record_progress(&mut truth, universe, target, 2).unwrap();
        assert_eq!(progress.quests_unlocked, vec![followup.id]);
        let unlocked = truth.load_quest(followup.id).unwrap().unwrap();
        assert_eq!(unlocked.status, QuestStatus::Active);
    }

    #[test]
    fn progress_event_shape() {
        let (_, universe, actor) = setup();
        assert!(progress_event(universe, actor, &QuestProgress::default()).is_none());

        let progress = QuestProgress {
            quests_advanced: vec![QuestId::new()],
            quests_completed: vec![QuestId::new()],
            gold: 10,
            ..QuestProgress::default()
        };
        let event = progress_event(universe, actor, &progress).unwrap();
        assert_eq!(event.event_type, EventType::QuestUpdated);
        assert_eq!(event.payload_i64("gold"), Some(10));
    }
}
