//! Dice notation parsing and rolling.
//!
//! Supports `NdX`, `NdX+M`, `NdX-M`, keep-highest `NdXkhK`, keep-lowest
//! `NdXklK`, and `+`/`-` chains of any of those (e.g. `2d6+1d4+3`).
//! Advantage is expressed by callers as `2d20kh1`, disadvantage as `2d20kl1`.

pub mod roller;

pub use roller::{DiceRoller, ScriptedRoller, SeededRoller, SystemRoller};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MechError, MechResult};

/// Dice count and sides are both limited to `[1, 1000]`.
const MAX_DICE: u32 = 1000;

/// Which dice of a term are kept for the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keep {
    Highest(u32),
    Lowest(u32),
}

/// One `NdX` group in an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    pub count: u32,
    pub sides: u32,
    pub keep: Option<Keep>,
}

/// A signed element of a dice expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Term {
    Dice { sign: i32, dice: DiceTerm },
    Constant(i32),
}

/// A parsed dice expression. `Display` produces the normalized notation,
/// so `parse(expr.to_string())` round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpr {
    terms: Vec<Term>,
}

/// Result of rolling a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceResult {
    /// Normalized notation that produced this result.
    pub notation: String,
    /// Every individual die result, in roll order.
    pub rolls: Vec<u32>,
    /// Dice kept by kh/kl terms, or `None` when nothing was dropped.
    pub kept: Option<Vec<u32>>,
    /// Sum of all constant terms.
    pub modifier: i32,
    /// Final result.
    pub total: i32,
}

impl DiceExpr {
    /// Parse dice notation. Rejects malformed input and out-of-range counts.
    pub fn parse(notation: &str) -> MechResult<Self> {
        let text: String = notation.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
        if text.is_empty() {
            return Err(MechError::BadNotation("empty notation".to_string()));
        }

        let mut terms = Vec::new();
        let mut rest = text.as_str();
        let mut sign = 1i32;
        let mut first = true;

        while !rest.is_empty() {
            if !first {
                sign = match rest.as_bytes()[0] {
                    b'+' => 1,
                    b'-' => -1,
                    _ => return Err(MechError::BadNotation(notation.to_string())),
                };
                rest = &rest[1..];
            } else if let Some(stripped) = rest.strip_prefix('-') {
                sign = -1;
                rest = stripped;
            }
            first = false;

            let end = rest
                .find(['+', '-'])
                .unwrap_or(rest.len());
            let chunk = &rest[..end];
            rest = &rest[end..];
            if chunk.is_empty() {
                return Err(MechError::BadNotation(notation.to_string()));
            }

            terms.push(parse_chunk(chunk, sign, notation)?);
        }

        if !terms.iter().any(|t| matches!(t, Term::Dice { .. })) {
            return Err(MechError::BadNotation(format!("{notation}: no dice term")));
        }

        Ok(Self { terms })
    }

    /// Roll the expression with the given roller.
    pub fn roll(&self, roller: &mut dyn DiceRoller) -> DiceResult {
        let mut rolls = Vec::new();
        let mut kept: Option<Vec<u32>> = None;
        let mut modifier = 0i32;
        let mut total = 0i32;

        for term in &self.terms {
            match term {
                Term::Constant(value) => {
                    modifier += value;
                    total += value;
                }
                Term::Dice { sign, dice } => {
                    let group = roller.roll(dice.count, dice.sides);
                    rolls.extend_from_slice(&group);
                    let counted: Vec<u32> = match dice.keep {
                        None => group,
                        Some(Keep::Highest(k)) => {
                            let mut sorted = group;
                            sorted.sort_unstable_by(|a, b| b.cmp(a));
                            sorted.truncate(k as usize);
                            kept.get_or_insert_with(Vec::new).extend_from_slice(&sorted);
                            sorted
                        }
                        Some(Keep::Lowest(k)) => {
                            let mut sorted = group;
                            sorted.sort_unstable();
                            sorted.truncate(k as usize);
                            kept.get_or_insert_with(Vec::new).extend_from_slice(&sorted);
                            sorted
                        }
                    };
                    total += sign * counted.iter().sum::<u32>() as i32;
                }
            }
        }

        DiceResult {
            notation: self.to_string(),
            rolls,
            kept,
            modifier,
            total,
        }
    }

    /// Double every dice group's count, leaving modifiers alone (critical
    /// hits double dice, not bonuses).
    pub fn double_dice(&self) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|term| match *term {
                Term::Dice { sign, dice } => Term::Dice {
                    sign,
                    dice: DiceTerm {
                        count: dice.count * 2,
                        ..dice
                    },
                },
                constant => constant,
            })
            .collect();
        Self { terms }
    }
}

fn parse_chunk(chunk: &str, sign: i32, notation: &str) -> MechResult<Term> {
    if let Some(d_pos) = chunk.find('d') {
        let count: u32 = chunk[..d_pos]
            .parse()
            .map_err(|_| MechError::BadNotation(notation.to_string()))?;
        let after = &chunk[d_pos + 1..];

        let (sides_str, keep) = if let Some(kh) = after.find("kh") {
            let k = after[kh + 2..]
                .parse()
                .map_err(|_| MechError::BadNotation(notation.to_string()))?;
            (&after[..kh], Some(Keep::Highest(k)))
        } else if let Some(kl) = after.find("kl") {
            let k = after[kl + 2..]
                .parse()
                .map_err(|_| MechError::BadNotation(notation.to_string()))?;
            (&after[..kl], Some(Keep::Lowest(k)))
        } else {
            (after, None)
        };

        let sides: u32 = sides_str
            .parse()
            .map_err(|_| MechError::BadNotation(notation.to_string()))?;

        if !(1..=MAX_DICE).contains(&count) || !(1..=MAX_DICE).contains(&sides) {
            return Err(MechError::BadNotation(format!(
                "{notation}: dice count and sides must be in [1, {MAX_DICE}]"
            )));
        }
        if let Some(Keep::Highest(k)) | Some(Keep::Lowest(k)) = keep {
            if k == 0 || k > count {
                return Err(MechError::BadNotation(format!(
                    "{notation}: cannot keep {k} of {count} dice"
                )));
            }
        }

        Ok(Term::Dice {
            sign,
            dice: DiceTerm { count, sides, keep },
        })
    } else {
        let value: i32 = chunk
            .parse()
            .map_err(|_| MechError::BadNotation(notation.to_string()))?;
        Ok(Term::Constant(sign * value))
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            match term {
                Term::Dice { sign, dice } => {
                    if i > 0 {
                        write!(f, "{}", if *sign < 0 { "-" } else { "+" })?;
                    } else if *sign < 0 {
                        write!(f, "-")?;
                    }
                    write!(f, "{}d{}", dice.count, dice.sides)?;
                    match dice.keep {
                        Some(Keep::Highest(k)) => write!(f, "kh{k}")?,
                        Some(Keep::Lowest(k)) => write!(f, "kl{k}")?,
                        None => {}
                    }
                }
                Term::Constant(value) => {
                    if i > 0 {
                        write!(f, "{}{}", if *value < 0 { "-" } else { "+" }, value.abs())?;
                    } else {
                        write!(f, "{value}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parse and roll in one step.
pub fn roll(notation: &str, roller: &mut dyn DiceRoller) -> MechResult<DiceResult> {
    Ok(DiceExpr::parse(notation)?.roll(roller))
}
