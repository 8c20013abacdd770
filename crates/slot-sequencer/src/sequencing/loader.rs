use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::domain::{
    Boost, ChannelId, EnergyTier, RuleGroup, RuleOperator, SlotDefinition, Strategy,
    MAX_BOOST_WEIGHT, MAX_REPEAT_WINDOW, MAX_SLOTS, MIN_BOOST_WEIGHT,
};
use super::repository::{StoreError, StrategyStore};

/// Fetches a strategy as one unit and repairs its shape before handing it out.
pub struct StrategyLoader<S> {
    store: Arc<S>,
}

impl<S> StrategyLoader<S>
where
    S: StrategyStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// `Ok(None)` means "not configured"; only store failures are errors.
    pub fn load_strategy(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Option<Strategy>, StoreError> {
        match self.store.fetch_strategy(channel_id, energy_tier)? {
            Some(raw) => Ok(Some(normalize_strategy(raw))),
            None => {
                debug!(channel = %channel_id, tier = %energy_tier, "no slot strategy configured");
                Ok(None)
            }
        }
    }
}

/// Clamps bounds, sorts and de-duplicates slots, boosts and rule groups.
///
/// Slot positions come out contiguous from 1 to `num_slots`; gaps become empty
/// target profiles so a malformed strategy still plays.
pub fn normalize_strategy(raw: Strategy) -> Strategy {
    let channel = raw.channel_id.clone();
    let tier = raw.energy_tier;

    let num_slots = raw.num_slots.clamp(1, MAX_SLOTS);
    if num_slots != raw.num_slots {
        warn!(channel = %channel, tier = %tier, requested = raw.num_slots, num_slots, "slot count out of range");
    }

    let recent_repeat_window = raw.recent_repeat_window.min(MAX_REPEAT_WINDOW);
    if recent_repeat_window != raw.recent_repeat_window {
        warn!(channel = %channel, tier = %tier, requested = raw.recent_repeat_window, "repeat window capped");
    }

    let slots = normalize_slots(&channel, tier, num_slots, raw.slots);
    let boosts = normalize_boosts(&channel, tier, raw.boosts);
    let rule_groups = normalize_rule_groups(&channel, tier, raw.rule_groups);

    Strategy {
        channel_id: raw.channel_id,
        energy_tier: raw.energy_tier,
        num_slots,
        recent_repeat_window,
        slots,
        boosts,
        rule_groups,
    }
}

fn normalize_slots(
    channel: &ChannelId,
    tier: EnergyTier,
    num_slots: u16,
    raw: Vec<SlotDefinition>,
) -> Vec<SlotDefinition> {
    let mut by_position: BTreeMap<u16, SlotDefinition> = BTreeMap::new();

    for slot in raw {
        if slot.position == 0 || slot.position > num_slots {
            warn!(channel = %channel, tier = %tier, position = slot.position, num_slots, "dropping slot outside strategy range");
            continue;
        }
        if by_position.contains_key(&slot.position) {
            warn!(channel = %channel, tier = %tier, position = slot.position, "duplicate slot position; keeping the first");
            continue;
        }
        by_position.insert(slot.position, slot);
    }

    (1..=num_slots)
        .map(|position| {
            by_position.remove(&position).unwrap_or_else(|| {
                warn!(channel = %channel, tier = %tier, position, "slot missing; using an empty profile");
                SlotDefinition::empty(position)
            })
        })
        .collect()
}

fn normalize_boosts(channel: &ChannelId, tier: EnergyTier, raw: Vec<Boost>) -> Vec<Boost> {
    let mut seen = HashSet::new();
    let mut boosts = Vec::with_capacity(raw.len());

    for mut boost in raw {
        if !seen.insert(boost.field.clone()) {
            warn!(channel = %channel, tier = %tier, field = %boost.field, "duplicate boost; keeping the first");
            continue;
        }
        let weight = boost.weight.clamp(MIN_BOOST_WEIGHT, MAX_BOOST_WEIGHT);
        if weight != boost.weight {
            warn!(channel = %channel, tier = %tier, field = %boost.field, weight = boost.weight, "boost weight out of range");
            boost.weight = weight;
        }
        boosts.push(boost);
    }

    boosts
}

fn normalize_rule_groups(
    channel: &ChannelId,
    tier: EnergyTier,
    raw: Vec<RuleGroup>,
) -> Vec<RuleGroup> {
    let mut groups: Vec<RuleGroup> = raw
        .into_iter()
        .map(|mut group| {
            for rule in &mut group.rules {
                if has_non_finite_bound(&rule.operator) {
                    warn!(channel = %channel, tier = %tier, group = %group.name, field = %rule.field, "rule has a non-finite bound; it will match nothing");
                    rule.operator = RuleOperator::Unreadable;
                } else if let RuleOperator::Between(low, high) = rule.operator {
                    if low > high {
                        rule.operator = RuleOperator::Between(high, low);
                    }
                }
            }
            group
        })
        .collect();

    // stable: equal orders keep their authored sequence
    groups.sort_by_key(|group| group.evaluation_order);
    groups
}

fn has_non_finite_bound(operator: &RuleOperator) -> bool {
    match operator {
        RuleOperator::Gte(bound) | RuleOperator::Lte(bound) => !bound.is_finite(),
        RuleOperator::Between(low, high) => !low.is_finite() || !high.is_finite(),
        _ => false,
    }
}
