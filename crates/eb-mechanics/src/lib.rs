//! Rules engine for Everbranch.
//!
//! Provides dice notation parsing and rolling behind a roller port, SRD-style
//! checks/saves/attacks, the PbtA outcome overlay with deterministic GM-move
//! selection, the unified ability schema, solo-combat balance mechanics, and
//! per-universe physics overlays.

pub mod ability;
pub mod checks;
pub mod dice;
pub mod error;
pub mod overlay;
pub mod pbta;
pub mod solo;

pub use checks::{Advantage, AttackOutcome, CheckOutcome, Cover, Skill, Weapon};
pub use dice::{DiceExpr, DiceResult, DiceRoller, ScriptedRoller, SeededRoller, SystemRoller};
pub use error::{MechError, MechResult};
pub use pbta::{GmMove, GmMoveType, PbtaOutcome};
