use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::{EffectuatedSetRules, Rule, SetRules};

/// Malformed desired state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("voter name must not be empty")]
    EmptyVoter,

    #[error("voter {voter}: ruleset name must not be empty")]
    EmptyRulesetName { voter: String },

    #[error("voter {voter}: duplicate ruleset name '{name}'")]
    DuplicateRuleset { voter: String, name: String },

    #[error("voter {voter}, ruleset '{ruleset}': weight bounds inverted (min={min} > max={max})")]
    InvertedWeightBounds {
        voter: String,
        ruleset: String,
        min: i32,
        max: i32,
    },
}

impl SetRules {
    /// Ruleset names unique and non-empty; weight bounds ordered.
    pub fn validate_for(&self, voter: &str) -> Result<(), ConfigError> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for ruleset in &self.rulesets {
            if ruleset.name.trim().is_empty() {
                return Err(ConfigError::EmptyRulesetName {
                    voter: voter.to_string(),
                });
            }
            if !names.insert(ruleset.name.as_str()) {
                return Err(ConfigError::DuplicateRuleset {
                    voter: voter.to_string(),
                    name: ruleset.name.clone(),
                });
            }
            for rule in &ruleset.rules {
                if let Rule::Weight(w) = rule {
                    if w.min > w.max {
                        return Err(ConfigError::InvertedWeightBounds {
                            voter: voter.to_string(),
                            ruleset: ruleset.name.clone(),
                            min: w.min,
                            max: w.max,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Target configuration supplied by the delegator side (voter -> rules).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesiredState {
    pub voters: BTreeMap<String, SetRules>,
}

impl DesiredState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_voter(mut self, voter: impl Into<String>, set_rules: SetRules) -> Self {
        self.voters.insert(voter.into(), set_rules);
        self
    }

    pub fn get(&self, voter: &str) -> Option<&SetRules> {
        self.voters.get(voter)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (voter, set_rules) in &self.voters {
            if voter.trim().is_empty() {
                return Err(ConfigError::EmptyVoter);
            }
            set_rules.validate_for(voter)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, SetRules)> for DesiredState {
    fn from_iter<I: IntoIterator<Item = (String, SetRules)>>(iter: I) -> Self {
        Self {
            voters: iter.into_iter().collect(),
        }
    }
}

/// Last confirmed rules per voter, as read from chain or index.
///
/// Read fresh for every reconciliation; never cached across calls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservedState {
    pub voters: BTreeMap<String, EffectuatedSetRules>,
}

impl ObservedState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, voter: &str) -> Option<&EffectuatedSetRules> {
        self.voters.get(voter)
    }

    pub fn known_voters(&self) -> BTreeSet<String> {
        self.voters.keys().cloned().collect()
    }
}

impl FromIterator<EffectuatedSetRules> for ObservedState {
    fn from_iter<I: IntoIterator<Item = EffectuatedSetRules>>(iter: I) -> Self {
        Self {
            voters: iter.into_iter().map(|e| (e.voter.clone(), e)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ruleset, WeightRule};

    #[test]
    fn duplicate_ruleset_names_are_rejected() {
        let desired = DesiredState::empty().with_voter(
            "alice",
            SetRules::new(vec![Ruleset::new("a", vec![]), Ruleset::new("a", vec![])]),
        );
        assert_eq!(
            desired.validate(),
            Err(ConfigError::DuplicateRuleset {
                voter: "alice".into(),
                name: "a".into()
            })
        );
    }

    #[test]
    fn inverted_weight_bounds_are_rejected() {
        let desired = DesiredState::empty().with_voter(
            "bob",
            SetRules::new(vec![Ruleset::new("r", vec![WeightRule::new(100, 0).into()])]),
        );
        assert!(matches!(
            desired.validate(),
            Err(ConfigError::InvertedWeightBounds { min: 100, max: 0, .. })
        ));
    }

    #[test]
    fn empty_voter_is_rejected() {
        let desired = DesiredState::empty().with_voter(" ", SetRules::empty());
        assert_eq!(desired.validate(), Err(ConfigError::EmptyVoter));
    }

    #[test]
    fn well_formed_state_validates() {
        let desired = DesiredState::empty()
            .with_voter("a", SetRules::new(vec![Ruleset::new("x", vec![])]))
            .with_voter("b", SetRules::empty());
        assert!(desired.validate().is_ok());
    }
}
