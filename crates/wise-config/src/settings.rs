use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use wise_chain::{HistorySource, DEFAULT_BATCH_SIZE};
use wise_protocol::{Broadcaster, Protocol, RulesIndex};
use wise_reconcile::Synchronizer;
use wise_rules::{ChainRulesReader, Confirmer, Validator};
use wise_schemas::{DesiredState, Ruleset, SetRules};

use crate::LoadedConfig;

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistorySettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRuleset {
    name: String,
    #[serde(default)]
    rules: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    delegator: String,
    #[serde(default)]
    posting_key_env: Option<String>,
    #[serde(default)]
    history: HistorySettings,
    #[serde(default)]
    rules: BTreeMap<String, Vec<RawRuleset>>,
}

/// Typed delegator configuration.
///
/// ```yaml
/// delegator: "steemprojects1"
/// posting_key_env: "WISE_POSTING_KEY"
/// history:
///   batch_size: 1000
/// rules:
///   voter-a:
///     - name: "photos"
///       rules:
///         - { rule: weight, mode: single_vote_weight, min: 0, max: 5000 }
///         - { rule: tags, mode: require, tags: ["photography"] }
/// ```
///
/// A voter listed with no rulesets (`voter-b: []`) is a revocation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiseConfig {
    pub delegator: String,
    /// Name of the env var holding the posting key; never the key itself.
    pub posting_key_env: Option<String>,
    pub history: HistorySettings,
    pub rules: DesiredState,
}

impl WiseConfig {
    /// Decode and validate. Fails on unknown keys, undecodable rules and on
    /// anything [`DesiredState::validate`] refuses.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        Self::from_json(&loaded.config_json)
    }

    pub fn from_json(config_json: &Value) -> Result<Self> {
        let raw = RawConfig::deserialize(config_json).context("invalid wise config")?;
        if raw.delegator.trim().is_empty() {
            anyhow::bail!("CONFIG_INVALID: delegator must not be empty");
        }
        if raw.history.batch_size == 0 {
            anyhow::bail!("CONFIG_INVALID: history.batch_size must be at least 1");
        }

        let protocol = Protocol::new();
        let mut rules = DesiredState::empty();
        for (voter, rulesets) in raw.rules {
            let mut decoded = Vec::with_capacity(rulesets.len());
            for rs in rulesets {
                let mut rule_list = Vec::with_capacity(rs.rules.len());
                for (i, v) in rs.rules.iter().enumerate() {
                    let rule = protocol.decode_rule(v).with_context(|| {
                        format!("rules.{voter}: ruleset '{}' rule #{i}", rs.name)
                    })?;
                    rule_list.push(rule);
                }
                decoded.push(Ruleset::new(rs.name, rule_list));
            }
            rules.voters.insert(voter, SetRules::new(decoded));
        }
        rules.validate().context("invalid desired rules")?;

        Ok(Self {
            delegator: raw.delegator,
            posting_key_env: raw.posting_key_env,
            history: raw.history,
            rules,
        })
    }

    pub fn load(paths: &[&str]) -> Result<Self> {
        Self::from_loaded(&crate::load_layered_yaml(paths)?)
    }

    pub fn load_from_strings(yaml_docs: &[&str]) -> Result<Self> {
        Self::from_loaded(&crate::load_layered_yaml_from_strings(yaml_docs)?)
    }

    // -----------------------------------------------------------------------
    // Pipelines built from this config
    // -----------------------------------------------------------------------

    /// History-walking rules reader paging with `history.batch_size`.
    pub fn chain_rules_reader(&self, source: Arc<dyn HistorySource>) -> ChainRulesReader {
        ChainRulesReader::new(source).with_batch_size(self.history.batch_size)
    }

    /// Confirmation loop for the configured delegator.
    pub fn confirmer(
        &self,
        source: Arc<dyn HistorySource>,
        index: Arc<dyn RulesIndex>,
        validator: Validator,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Confirmer {
        Confirmer::new(self.delegator.as_str(), source, index, validator, broadcaster)
            .with_batch_size(self.history.batch_size)
    }

    pub fn synchronizer(
        &self,
        index: Arc<dyn RulesIndex>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Synchronizer {
        Synchronizer::new(self.delegator.as_str(), index, broadcaster)
    }
}
