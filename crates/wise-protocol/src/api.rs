//! Collaborators the core calls. Implementations live outside this workspace
//! (node RPC, index service, signer); tests use in-memory fakes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use wise_chain::{ChainMoment, TransportError};
use wise_schemas::{CustomRpcRule, EffectuatedSetRules, PostMetadata, SetRules, VoteOrder};

use crate::WireOperation;

/// Resolves the rules binding one (delegator, voter) pair at a moment.
#[async_trait]
pub trait RulesReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Latest `set_rules` with moment <= `at`; empty when there is none.
    async fn query_rulesets(
        &self,
        delegator: &str,
        voter: &str,
        at: ChainMoment,
    ) -> Result<SetRules, TransportError>;
}

/// Indexed view over a delegator's whole configuration.
#[async_trait]
pub trait RulesIndex: RulesReader {
    /// Current rules for every voter the delegator ever configured.
    async fn query_all_rulesets(
        &self,
        delegator: &str,
        at: ChainMoment,
    ) -> Result<BTreeMap<String, EffectuatedSetRules>, TransportError>;

    /// Moment of the delegator's newest `confirm_vote`, if any.
    async fn query_last_confirmation(
        &self,
        delegator: &str,
    ) -> Result<Option<ChainMoment>, TransportError>;
}

/// Signs and publishes operations. Returns the moment they landed at.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, ops: Vec<WireOperation>) -> Result<ChainMoment, TransportError>;
}

/// Post lookup. `Ok(None)` means the node answered and the post does not
/// exist; `Err` is reserved for failing to get an answer at all.
#[async_trait]
pub trait PostLoader: Send + Sync {
    async fn load_post(
        &self,
        author: &str,
        permlink: &str,
    ) -> Result<Option<PostMetadata>, TransportError>;
}

/// External verdict for a [`CustomRpcRule`].
#[async_trait]
pub trait CustomRpcClient: Send + Sync {
    async fn call(&self, rule: &CustomRpcRule, voteorder: &VoteOrder) -> Result<bool, TransportError>;
}
