//! Cross-store propagation rules.
//!
//! Each rule is a pure function from a trigger and the current accommodation
//! state to a list of [`Mutation`]s. Rules run in table order, then
//! [`protect`] drops every budget write aimed at an entry whose budget the
//! user set explicitly. The engine applies the surviving mutations inside the
//! same call that caused the trigger.
//!
//! Copying the defaults into a newly created entry happens at creation time in
//! the lifecycle manager; those entries are never protected.

use uuid::Uuid;

use super::preferences;
use crate::models::{AccommodationMemory, Budget, PreferenceUpdate, Travelers, UpdateOrigin};

/// Event shapes the rules react to.
#[derive(Debug, Clone)]
pub enum Trigger<'a> {
    /// The user set the budget of one entry.
    UserBudgetSet {
        entry_id: Uuid,
        budget: Budget,
        /// Entry is acting as the template for new entries.
        default_source: bool,
    },
    /// Trip-wide budget: an explicit "set default budget" action or a chat
    /// request that names no particular city.
    DefaultBudgetSet(Budget),
    PassengersSet(Travelers),
    TravelersSet(Travelers),
    PreferencesUpdated(&'a PreferenceUpdate),
    ApplyPreferencesToHotels(&'a PreferenceUpdate),
}

/// Secondary write produced by a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Propagated budget write. Never sets the override flag.
    EntryBudget { entry_id: Uuid, budget: Budget },
    Defaults {
        budget: Budget,
        source: Option<Uuid>,
    },
    /// Into `TravelMemory::travelers`.
    Travelers(Travelers),
    /// Into `FlightMemory::passengers`.
    Passengers(Travelers),
}

pub struct RuleContext<'a> {
    pub accommodation: &'a AccommodationMemory,
}

type Rule = fn(&Trigger<'_>, &RuleContext<'_>) -> Vec<Mutation>;

const RULES: &[(&str, Rule)] = &[
    ("budget_default_update", budget_default_update),
    ("traveler_sync", traveler_sync),
    ("preference_budget", preference_budget),
];

/// Runs every rule for `trigger` and returns the gated mutations in rule order.
pub fn evaluate(trigger: &Trigger<'_>, ctx: &RuleContext<'_>) -> Vec<Mutation> {
    let mut out = Vec::new();
    for (name, rule) in RULES {
        let produced = rule(trigger, ctx);
        if !produced.is_empty() {
            tracing::debug!(rule = *name, count = produced.len(), "propagation rule fired");
        }
        out.extend(produced);
    }
    protect(out, ctx.accommodation)
}

/// Drops budget writes to protected or unknown entries. Other mutations pass.
pub fn protect(mutations: Vec<Mutation>, accommodation: &AccommodationMemory) -> Vec<Mutation> {
    mutations
        .into_iter()
        .filter(|m| match m {
            Mutation::EntryBudget { entry_id, .. } => match accommodation.get(*entry_id) {
                Some(entry) if entry.is_budget_protected() => {
                    tracing::debug!(
                        "Skipping budget propagation to {} ({}): user-modified",
                        entry.city,
                        entry.id
                    );
                    false
                }
                Some(_) => true,
                None => false,
            },
            _ => true,
        })
        .collect()
}

/// Writes a propagated budget into every entry of the collection.
fn to_all_entries(accommodation: &AccommodationMemory, budget: Budget) -> Vec<Mutation> {
    accommodation
        .accommodations
        .iter()
        .map(|e| Mutation::EntryBudget {
            entry_id: e.id,
            budget,
        })
        .collect()
}

fn budget_default_update(trigger: &Trigger<'_>, ctx: &RuleContext<'_>) -> Vec<Mutation> {
    match trigger {
        Trigger::UserBudgetSet {
            entry_id,
            budget,
            default_source: true,
        } => vec![Mutation::Defaults {
            budget: *budget,
            source: Some(*entry_id),
        }],
        Trigger::DefaultBudgetSet(budget) => {
            let mut out = vec![Mutation::Defaults {
                budget: *budget,
                source: None,
            }];
            out.extend(to_all_entries(ctx.accommodation, *budget));
            out
        }
        _ => Vec::new(),
    }
}

fn traveler_sync(trigger: &Trigger<'_>, _ctx: &RuleContext<'_>) -> Vec<Mutation> {
    match trigger {
        Trigger::PassengersSet(t) => vec![Mutation::Travelers(*t)],
        Trigger::TravelersSet(t) => vec![Mutation::Passengers(*t)],
        _ => Vec::new(),
    }
}

fn preference_budget(trigger: &Trigger<'_>, ctx: &RuleContext<'_>) -> Vec<Mutation> {
    let update = match trigger {
        Trigger::PreferencesUpdated(update)
            if update.origin == UpdateOrigin::Chat && update.touches_budget_signals() =>
        {
            update
        }
        Trigger::ApplyPreferencesToHotels(update) => update,
        _ => return Vec::new(),
    };
    let Some(budget) = preferences::budget_for(update) else {
        return Vec::new();
    };
    let mut out = vec![Mutation::Defaults {
        budget,
        source: None,
    }];
    out.extend(to_all_entries(ctx.accommodation, budget));
    out
}

/// Applies the accommodation-side mutations to a draft.
pub fn apply_to_accommodation(accommodation: &mut AccommodationMemory, mutations: &[Mutation]) {
    for mutation in mutations {
        match mutation {
            Mutation::EntryBudget { entry_id, budget } => {
                if let Some(entry) = accommodation
                    .accommodations
                    .iter_mut()
                    .find(|e| e.id == *entry_id)
                {
                    entry.budget = *budget;
                }
            }
            Mutation::Defaults { budget, source } => {
                accommodation.default_budget = *budget;
                accommodation.default_source_id = *source;
            }
            Mutation::Travelers(_) | Mutation::Passengers(_) => {}
        }
    }
}

pub fn touches_accommodation(mutations: &[Mutation]) -> bool {
    mutations
        .iter()
        .any(|m| matches!(m, Mutation::EntryBudget { .. } | Mutation::Defaults { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccommodationEntry, BudgetPreset, Destination};

    fn memory() -> AccommodationMemory {
        let mut memory = AccommodationMemory::default();
        for city in ["Tokyo", "Bangkok"] {
            memory
                .accommodations
                .push(AccommodationEntry::new(&Destination::new(city), Budget::default()));
        }
        memory.accommodations[0].user_modified_budget = Some(true);
        memory
    }

    fn eco() -> Budget {
        Budget::from_preset(BudgetPreset::Eco).unwrap()
    }

    #[test]
    fn default_budget_skips_protected_entries() {
        let memory = memory();
        let ctx = RuleContext {
            accommodation: &memory,
        };
        let out = evaluate(&Trigger::DefaultBudgetSet(eco()), &ctx);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Mutation::Defaults { .. }));
        assert_eq!(
            out[1],
            Mutation::EntryBudget {
                entry_id: memory.accommodations[1].id,
                budget: eco()
            }
        );
    }

    #[test]
    fn non_default_source_changes_only_the_entry() {
        let memory = memory();
        let ctx = RuleContext {
            accommodation: &memory,
        };
        let out = evaluate(
            &Trigger::UserBudgetSet {
                entry_id: memory.accommodations[1].id,
                budget: eco(),
                default_source: false,
            },
            &ctx,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn passengers_mirror_into_travelers() {
        let memory = AccommodationMemory::default();
        let ctx = RuleContext {
            accommodation: &memory,
        };
        let t = Travelers::new(2, 1, 0);
        assert_eq!(
            evaluate(&Trigger::PassengersSet(t), &ctx),
            vec![Mutation::Travelers(t)]
        );
        assert_eq!(
            evaluate(&Trigger::TravelersSet(t), &ctx),
            vec![Mutation::Passengers(t)]
        );
    }

    #[test]
    fn widget_preference_updates_do_not_touch_budgets() {
        let memory = memory();
        let ctx = RuleContext {
            accommodation: &memory,
        };
        let update = PreferenceUpdate {
            comfort_level: Some(90),
            origin: UpdateOrigin::Widget,
            ..Default::default()
        };
        assert!(evaluate(&Trigger::PreferencesUpdated(&update), &ctx).is_empty());
        assert!(!evaluate(&Trigger::ApplyPreferencesToHotels(&update), &ctx).is_empty());
    }

    #[test]
    fn apply_writes_budget_without_flag() {
        let mut memory = memory();
        let target = memory.accommodations[1].id;
        apply_to_accommodation(
            &mut memory,
            &[Mutation::EntryBudget {
                entry_id: target,
                budget: eco(),
            }],
        );
        assert_eq!(memory.accommodations[1].budget, eco());
        assert!(memory.accommodations[1].user_modified_budget.is_none());
    }
}
