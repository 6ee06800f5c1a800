//! The roller port: where random numbers come from.
//!
//! Rule code never touches an RNG directly; it takes `&mut dyn DiceRoller`.
//! The default is the OS-seeded CSPRNG, the seeded roller gives reproducible
//! sessions, and the scripted roller realizes predetermined results in tests.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of die results.
pub trait DiceRoller {
    /// Roll a single die with `sides` sides, returning a value in
    /// `[1, sides]`. `sides` of 0 returns 0.
    fn roll_die(&mut self, sides: u32) -> u32;

    /// Roll `count` dice.
    fn roll(&mut self, count: u32, sides: u32) -> Vec<u32> {
        (0..count).map(|_| self.roll_die(sides)).collect()
    }
}

/// Default roller backed by the OS-seeded thread RNG (a CSPRNG).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRoller;

impl DiceRoller for SystemRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        rand::rng().random_range(1..=sides)
    }
}

/// Deterministic roller seeded for reproducible sessions and tests.
#[derive(Debug, Clone)]
pub struct SeededRoller {
    rng: StdRng,
}

impl SeededRoller {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DiceRoller for SeededRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.rng.random_range(1..=sides)
    }
}

/// Test fixture that replays a fixed sequence of results. Values are clamped
/// to the die being rolled; once the script runs out, the die's midpoint is
/// returned.
#[derive(Debug, Clone)]
pub struct ScriptedRoller {
    script: VecDeque<u32>,
}

impl ScriptedRoller {
    pub fn new(script: Vec<u32>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Results not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DiceRoller for ScriptedRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        match self.script.pop_front() {
            Some(value) => value.clamp(1, sides),
            None => sides.div_ceil(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_roller_replays_then_falls_back() {
        let mut roller = ScriptedRoller::new(vec![20, 1]);
        assert_eq!(roller.roll_die(20), 20);
        assert_eq!(roller.roll_die(20), 1);
        assert_eq!(roller.roll_die(20), 10);
        assert_eq!(roller.remaining(), 0);
    }

    #[test]
    fn scripted_roller_clamps_to_die() {
        let mut roller = ScriptedRoller::new(vec![15]);
        assert_eq!(roller.roll_die(6), 6);
    }

    #[test]
    fn seeded_rollers_agree() {
        let mut a = SeededRoller::seeded(7);
        let mut b = SeededRoller::seeded(7);
        assert_eq!(a.roll(20, 20), b.roll(20, 20));
    }

    #[test]
    fn zero_sided_die_rolls_zero() {
        assert_eq!(SystemRoller.roll_die(0), 0);
        assert_eq!(SeededRoller::seeded(1).roll_die(0), 0);
    }
}
