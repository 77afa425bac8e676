use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use wise_chain::filters::{self, MomentComparison};
use wise_chain::{
    AccountHistory, ChainItem, ChainMoment, HistorySource, Transaction, TransportError,
    DEFAULT_BATCH_SIZE,
};
use wise_protocol::{Protocol, RulesReader};
use wise_schemas::{EffectuatedSetRules, SetRules};

use crate::resolve_binding;

/// [`RulesReader`] that needs no index: walks the delegator's own history
/// newest-first and stops at the first matching `set_rules`.
pub struct ChainRulesReader {
    source: Arc<dyn HistorySource>,
    protocol: Protocol,
    batch_size: u32,
}

impl ChainRulesReader {
    pub fn new(source: Arc<dyn HistorySource>) -> Self {
        Self {
            source,
            protocol: Protocol::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Latest `set_rules` for the pair with moment <= `at`.
    pub async fn find_binding(
        &self,
        delegator: &str,
        voter: &str,
        at: ChainMoment,
    ) -> Result<Option<EffectuatedSetRules>, TransportError> {
        let history =
            AccountHistory::new(self.source.clone(), delegator).with_batch_size(self.batch_size);
        let ids = Protocol::custom_json_ids();
        let protocol = self.protocol;

        let mut found: Option<EffectuatedSetRules> = None;
        let mut failure: Option<TransportError> = None;
        {
            let mut collect = |item: ChainItem<Transaction>| -> bool {
                let trx = match item {
                    Ok(trx) => trx,
                    Err(e) => {
                        failure = Some(e);
                        return false;
                    }
                };
                let commands: Vec<_> = protocol
                    .decode_transaction(&trx)
                    .into_iter()
                    .filter_map(Result::ok)
                    .collect();
                found = resolve_binding(&commands, delegator, voter, at);
                found.is_none()
            };
            let mut chain = filters::moment(
                MomentComparison::Le,
                at,
                filters::custom_json_id(&ids, &mut collect),
            );
            history.run(&mut chain).await;
        }

        if let Some(e) = failure {
            return Err(e);
        }
        debug!(
            delegator,
            voter,
            %at,
            found = ?found.as_ref().map(|b| b.moment),
            "binding rules read from chain"
        );
        Ok(found)
    }
}

#[async_trait]
impl RulesReader for ChainRulesReader {
    fn name(&self) -> &'static str {
        "chain-history"
    }

    async fn query_rulesets(
        &self,
        delegator: &str,
        voter: &str,
        at: ChainMoment,
    ) -> Result<SetRules, TransportError> {
        Ok(self
            .find_binding(delegator, voter, at)
            .await?
            .map(|b| b.set_rules)
            .unwrap_or_default())
    }
}
