//! Deterministic arbitration between the conservative and aggressive passes.

use super::types::TraumaLevel;

/// What the two first-round verdicts settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arbitration {
    Decided(TraumaLevel),
    NeedsTiebreak,
}

/// Any Level 1 vote wins outright; agreement stands; anything else goes to
/// the tie-breaker.
///
/// With the two-valued level set the last branch cannot be reached: two
/// levels that are neither equal nor contain a 1 do not exist. It stays so
/// the rule remains correct if the vocabulary grows.
pub fn arbitrate(conservative: TraumaLevel, aggressive: TraumaLevel) -> Arbitration {
    if conservative == TraumaLevel::One || aggressive == TraumaLevel::One {
        Arbitration::Decided(TraumaLevel::One)
    } else if conservative == aggressive {
        Arbitration::Decided(conservative)
    } else {
        Arbitration::NeedsTiebreak
    }
}
