//! Preference → hotel budget bridge.

use crate::models::{normalize_value, Budget, BudgetPreset, PreferenceUpdate};

/// Nightly ceiling at comfort level 0.
const BASE_PRICE_MAX: u32 = 40;
/// Added per comfort point (0-100).
const PRICE_PER_COMFORT_POINT: u32 = 4;
/// Added per premium must-have, at most twice.
const PREMIUM_MUST_HAVE_BONUS: u32 = 25;

const PREMIUM_MUST_HAVES: &[&str] = &[
    "spa",
    "pool",
    "infinity pool",
    "ocean view",
    "sea view",
    "butler",
    "private beach",
    "suite",
];

/// Nightly ceiling implied by comfort level (or the budget/luxury style axis
/// when no comfort level is given). `None` when neither is present.
pub fn derived_price_max(update: &PreferenceUpdate) -> Option<u32> {
    let level = update
        .comfort_level
        .or_else(|| update.style_axes.as_ref().and_then(|s| s.budget_vs_luxury))?
        .min(100) as u32;

    let premium = update
        .must_haves
        .iter()
        .filter(|m| PREMIUM_MUST_HAVES.contains(&normalize_value(m).as_str()))
        .count()
        .min(2) as u32;

    Some(BASE_PRICE_MAX + level * PRICE_PER_COMFORT_POINT + premium * PREMIUM_MUST_HAVE_BONUS)
}

/// Budget the bridge would propagate for `update`.
pub fn budget_for(update: &PreferenceUpdate) -> Option<Budget> {
    let price_max = derived_price_max(update)?;
    Budget::from_preset(BudgetPreset::for_price_max(price_max)).ok()
}
