use super::domain::{FieldValue, GroupLogic, Rule, RuleGroup, RuleOperator, Track};
use super::fields::FieldResolver;

/// Evaluates strategy rule groups against tracks.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    resolver: FieldResolver,
}

impl RuleFilter {
    pub fn new(resolver: FieldResolver) -> Self {
        Self { resolver }
    }

    pub fn evaluate_rule(&self, rule: &Rule, track: &Track) -> bool {
        let value = self.resolver.resolve(track, &rule.field);
        operator_matches(&rule.operator, value.as_ref())
    }

    /// An empty group passes whatever its logic.
    pub fn evaluate_group(&self, group: &RuleGroup, track: &Track) -> bool {
        if group.rules.is_empty() {
            return true;
        }

        match group.logic {
            GroupLogic::And => group
                .rules
                .iter()
                .all(|rule| self.evaluate_rule(rule, track)),
            GroupLogic::Or => group
                .rules
                .iter()
                .any(|rule| self.evaluate_rule(rule, track)),
        }
    }

    /// Groups are AND'd together in the given order.
    pub fn passes_all_groups(&self, groups: &[RuleGroup], track: &Track) -> bool {
        groups.iter().all(|group| self.evaluate_group(group, track))
    }

    pub fn eligible<'a>(&self, groups: &[RuleGroup], pool: &'a [Track]) -> Vec<&'a Track> {
        pool.iter()
            .filter(|track| self.passes_all_groups(groups, track))
            .collect()
    }
}

pub(crate) fn operator_matches(operator: &RuleOperator, value: Option<&FieldValue>) -> bool {
    match operator {
        RuleOperator::Eq(expected) => value == Some(expected),
        RuleOperator::Neq(expected) => value != Some(expected),
        RuleOperator::In(set) => value.map(|value| set.contains(value)).unwrap_or(false),
        RuleOperator::Nin(set) => !value.map(|value| set.contains(value)).unwrap_or(false),
        RuleOperator::Gte(bound) => numeric(value)
            .map(|number| number >= *bound)
            .unwrap_or(false),
        RuleOperator::Lte(bound) => numeric(value)
            .map(|number| number <= *bound)
            .unwrap_or(false),
        RuleOperator::Between(low, high) => numeric(value)
            .map(|number| number >= *low && number <= *high)
            .unwrap_or(false),
        RuleOperator::Exists => value.map(|value| !value.is_empty_text()).unwrap_or(false),
        RuleOperator::Unreadable => false,
    }
}

fn numeric(value: Option<&FieldValue>) -> Option<f64> {
    value.and_then(FieldValue::as_number)
}
