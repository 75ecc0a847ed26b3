//! XP and level arithmetic.
//!
//! Levels are derived from XP, never stored. Level n starts at
//! `100 * (n - 1)^2` XP, so level 1 covers 0..100, level 2 covers 100..400,
//! level 3 covers 400..900 and so on.

/// XP awarded to a buyer for a completed note purchase.
pub const PURCHASE_XP: u64 = 10;

pub fn level_for_xp(xp: u64) -> u32 {
    ((xp as f64 / 100.0).sqrt() as u32) + 1
}

/// Minimum XP required to be at the given level.
pub fn xp_for_level(level: u32) -> u64 {
    let base = level.saturating_sub(1) as u64;
    100 * base * base
}
