use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, QuestId, UniverseId};

/// Lifecycle of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Available,
    Active,
    Completed,
    Failed,
    Abandoned,
}

/// One step of a quest, targeting an entity or location with a quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub description: String,
    pub target: Option<EntityId>,
    pub required: u32,
    pub progress: u32,
}

impl Objective {
    pub fn new(description: impl Into<String>, required: u32) -> Self {
        Self {
            description: description.into(),
            target: None,
            required: required.max(1),
            progress: 0,
        }
    }

    pub fn with_target(mut self, target: EntityId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.required
    }

    /// Advance progress by `amount`, capped at the requirement. Returns true
    /// if this call completed the objective.
    pub fn advance(&mut self, amount: u32) -> bool {
        let was_complete = self.is_complete();
        self.progress = (self.progress + amount).min(self.required);
        !was_complete && self.is_complete()
    }
}

/// What completing the quest grants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reward {
    pub gold: u32,
    pub experience: u32,
    pub items: Vec<EntityId>,
    /// faction entity id paired with a reputation delta
    pub reputation: Vec<(EntityId, i32)>,
}

/// A quest with ordered objectives. Quests can chain via `next_quest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub universe_id: UniverseId,
    pub name: String,
    pub description: String,
    /// Who offered the quest.
    pub giver: Option<EntityId>,
    pub objectives: Vec<Objective>,
    /// Index into `objectives`; earlier objectives are complete.
    pub current_objective: usize,
    pub status: QuestStatus,
    pub reward: Reward,
    pub expires_at: Option<DateTime<Utc>>,
    pub parent_quest: Option<QuestId>,
    pub next_quest: Option<QuestId>,
    pub created_at: DateTime<Utc>,
}

impl Quest {
    pub fn new(universe_id: UniverseId, name: impl Into<String>, objectives: Vec<Objective>) -> Self {
        Self {
            id: QuestId::new(),
            universe_id,
            name: name.into(),
            description: String::new(),
            giver: None,
            objectives,
            current_objective: 0,
            status: QuestStatus::Available,
            reward: Reward::default(),
            expires_at: None,
            parent_quest: None,
            next_quest: None,
            created_at: Utc::now(),
        }
    }

    pub fn active_objective(&self) -> Option<&Objective> {
        self.objectives.get(self.current_objective)
    }

    /// Advance the active objective. When it completes, the cursor moves to
    /// the next one; finishing the last objective completes the quest.
    /// Returns true if the quest just completed.
    pub fn advance(&mut self, amount: u32) -> bool {
        if self.status != QuestStatus::Active {
            return false;
        }
        let index = self.current_objective;
        let Some(objective) = self.objectives.get_mut(index) else {
            return false;
        };
        if objective.advance(amount) {
            self.current_objective += 1;
            if self.current_objective >= self.objectives.len() {
                self.status = QuestStatus::Completed;
                return true;
            }
        }
        false
    }

    pub fn accept(&mut self) {
        if self.status == QuestStatus::Available {
            self.status = QuestStatus::Active;
        }
    }

    pub fn fail(&mut self) {
        if self.status == QuestStatus::Active {
            self.status = QuestStatus::Failed;
        }
    }

    pub fn abandon(&mut self) {
        if matches!(self.status, QuestStatus::Available | QuestStatus::Active) {
            self.status = QuestStatus::Abandoned;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step_quest() -> Quest {
        Quest::new(
            UniverseId::new(),
            "Clear the cellar",
            vec![Objective::new("Defeat the rats", 3), Objective::new("Report back", 1)],
        )
    }

    #[test]
    fn objective_advance_caps_at_required() {
        let mut objective = Objective::new("Collect herbs", 2);
        assert!(!objective.advance(1));
        assert!(objective.advance(5));
        assert_eq!(objective.progress, 2);
        // Already complete: no second completion signal.
        assert!(!objective.advance(1));
    }

    #[test]
    fn quest_progresses_through_objectives() {
        let mut quest = two_step_quest();
        quest.accept();
        assert_eq!(quest.status, QuestStatus::Active);

        assert!(!quest.advance(2));
        assert_eq!(quest.current_objective, 0);
        assert!(!quest.advance(1));
        assert_eq!(quest.current_objective, 1);

        assert!(quest.advance(1));
        assert_eq!(quest.status, QuestStatus::Completed);
    }

    #[test]
    fn advance_requires_active_status() {
        let mut quest = two_step_quest();
        assert!(!quest.advance(3));
        assert_eq!(quest.objectives[0].progress, 0);
    }

    #[test]
    fn abandon_and_fail_transitions() {
        let mut quest = two_step_quest();
        quest.accept();
        quest.fail();
        assert_eq!(quest.status, QuestStatus::Failed);

        let mut quest = two_step_quest();
        quest.abandon();
        assert_eq!(quest.status, QuestStatus::Abandoned);
    }
}
