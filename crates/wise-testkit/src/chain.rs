//! In-memory chain.
//!
//! # Invariants
//!
//! - Every broadcast lands in a fresh block; blocks are 3 seconds apart.
//! - An operation is appended only to the histories of the accounts that
//!   signed it (posting and active authorities), as a node indexes them. A
//!   `send_voteorder` therefore lives in the voter's history alone.
//! - History indices start at 0 and grow by one per appended operation.
//! - Index reads derive everything from the stored histories; there is no
//!   second copy of the rules to drift out of sync.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::debug;
use wise_chain::{group_batch, ChainMoment, HistorySource, RawOperation, TransportError};
use wise_protocol::{
    Broadcaster, CommandEnvelope, CustomRpcClient, PostLoader, Protocol, ProtocolVersion,
    RulesIndex, RulesReader, WireOperation,
};
use wise_rules::resolve_binding;
use wise_schemas::{
    Command, CustomRpcRule, EffectuatedCommand, EffectuatedSetRules, PostMetadata,
    SendVoteorder, SetRules, VoteOrder,
};

/// First block produced by a fresh [`FakeChain`].
pub const FAKE_GENESIS_BLOCK: u64 = 20_000_000;

/// 2018-06-01T00:00:00Z, the timestamp of [`FAKE_GENESIS_BLOCK`].
const GENESIS_UNIX_SECS: i64 = 1_527_811_200;

const BLOCK_INTERVAL_SECS: i64 = 3;

#[derive(Default)]
struct State {
    next_block: u64,
    histories: BTreeMap<String, Vec<RawOperation>>,
    posts: BTreeMap<(String, String), PostMetadata>,
    rpc_verdicts: BTreeMap<CustomRpcRule, bool>,

    failing_broadcasts: BTreeSet<String>,
    failing_history_fetches: u32,
    failing_index: bool,

    history_calls: u32,
    broadcasts: Vec<Vec<WireOperation>>,
}

/// Node, index, broadcaster, post store and RPC endpoint in one process.
pub struct FakeChain {
    state: Mutex<State>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self::new()
    }
}

fn block_time(block: u64) -> DateTime<Utc> {
    let offset = (block.saturating_sub(FAKE_GENESIS_BLOCK) as i64) * BLOCK_INTERVAL_SECS;
    DateTime::from_timestamp(GENESIS_UNIX_SECS + offset, 0).unwrap_or_default()
}

fn trx_id(block: u64) -> String {
    format!("{block:040x}")
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_block: FAKE_GENESIS_BLOCK,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Timestamp the next block will carry.
    pub fn now(&self) -> DateTime<Utc> {
        block_time(self.state().next_block)
    }

    /// Skip empty blocks so chain time moves forward by at least `by`.
    pub fn advance_time(&self, by: Duration) {
        let blocks = (by.num_seconds().max(0) + BLOCK_INTERVAL_SECS - 1) / BLOCK_INTERVAL_SECS;
        self.state().next_block += blocks as u64;
    }

    // -----------------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------------

    /// Store a post created `age` before the current chain time.
    pub fn add_post(&self, author: &str, permlink: &str, tags: &[&str], age: Duration) {
        let created = self.now() - age;
        self.state().posts.insert(
            (author.to_string(), permlink.to_string()),
            PostMetadata {
                author: author.to_string(),
                permlink: permlink.to_string(),
                created,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    pub fn set_rpc_verdict(&self, rule: CustomRpcRule, accepted: bool) {
        self.state().rpc_verdicts.insert(rule, accepted);
    }

    /// Append an arbitrary operation to one account's history in its own block.
    pub fn push_foreign_op(&self, account: &str, op_type: &str, payload: Value) -> ChainMoment {
        let mut st = self.state();
        let block = st.next_block;
        st.next_block += 1;
        append(&mut st, account, block, 0, op_type, payload);
        ChainMoment::new(block, 0, 0)
    }

    /// Encode and commit a command with the current protocol version.
    /// Bypasses broadcast failure injection and the broadcast log.
    pub fn publish(&self, envelope: &CommandEnvelope) -> ChainMoment {
        self.publish_as(ProtocolVersion::CURRENT, envelope)
    }

    pub fn publish_as(&self, version: ProtocolVersion, envelope: &CommandEnvelope) -> ChainMoment {
        let op = Protocol::encode_as(version, envelope);
        let mut st = self.state();
        commit(&mut st, &[op])
    }

    /// Publish a `send_voteorder` from `voter` and return the voteorder as
    /// it sits on chain.
    pub fn send_voteorder(
        &self,
        delegator: &str,
        voter: &str,
        author: &str,
        permlink: &str,
        weight: i32,
    ) -> (VoteOrder, ChainMoment, DateTime<Utc>) {
        let timestamp = self.now();
        let moment = self.publish(&CommandEnvelope::new(
            delegator,
            voter,
            Command::SendVoteorder(SendVoteorder {
                delegator: delegator.to_string(),
                author: author.to_string(),
                permlink: permlink.to_string(),
                weight,
            }),
        ));
        let transaction_id = moment.block_num().map(trx_id).unwrap_or_default();
        let voteorder = VoteOrder {
            delegator: delegator.to_string(),
            voter: voter.to_string(),
            author: author.to_string(),
            permlink: permlink.to_string(),
            weight,
            transaction_id,
        };
        (voteorder, moment, timestamp)
    }

    // -----------------------------------------------------------------------
    // Failure injection
    // -----------------------------------------------------------------------

    /// Broadcasts touching `account` (as signer or voter) fail from now on.
    pub fn fail_broadcasts_for(&self, account: &str) {
        self.state().failing_broadcasts.insert(account.to_string());
    }

    pub fn fail_next_history_fetches(&self, n: u32) {
        self.state().failing_history_fetches = n;
    }

    pub fn fail_index_reads(&self, failing: bool) {
        self.state().failing_index = failing;
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn history_calls(&self) -> u32 {
        self.state().history_calls
    }

    pub fn broadcast_count(&self) -> usize {
        self.state().broadcasts.len()
    }

    /// Everything handed to [`Broadcaster::broadcast`] that was accepted.
    pub fn broadcasts(&self) -> Vec<Vec<WireOperation>> {
        self.state().broadcasts.clone()
    }

    pub fn history_len(&self, account: &str) -> usize {
        self.state().histories.get(account).map_or(0, Vec::len)
    }

    /// Every protocol command in `account`'s history that decodes cleanly.
    pub fn decoded_commands(&self, account: &str) -> Vec<EffectuatedCommand> {
        let history = self.state().histories.get(account).cloned().unwrap_or_default();
        let protocol = Protocol::new();
        group_batch(history)
            .iter()
            .flat_map(|trx| protocol.decode_transaction(trx))
            .filter_map(Result::ok)
            .collect()
    }

    fn check_index(&self) -> Result<(), TransportError> {
        if self.state().failing_index {
            return Err(TransportError::Unreachable("index unavailable".into()));
        }
        Ok(())
    }
}

fn append(st: &mut State, account: &str, block: u64, op_in_trx: u32, op_type: &str, payload: Value) {
    let history = st.histories.entry(account.to_string()).or_default();
    let index = history.len() as u64;
    history.push(RawOperation {
        index,
        block,
        trx_id: trx_id(block),
        trx_in_block: 0,
        op_in_trx,
        virtual_op: 0,
        timestamp: block_time(block),
        op_type: op_type.to_string(),
        payload,
    });
}

/// Accounts whose history an operation is indexed under.
fn signers(op: &WireOperation) -> BTreeSet<String> {
    let mut accounts = BTreeSet::new();
    if let Some(cj) = op.as_custom_json() {
        accounts.extend(cj.required_posting_auths.iter().cloned());
        accounts.extend(cj.required_auths.iter().cloned());
    }
    accounts
}

/// Signers plus, for protocol traffic, the decoded delegator and voter.
fn parties(op: &WireOperation) -> BTreeSet<String> {
    let mut accounts = signers(op);
    if let Ok((_, envelope)) = Protocol::new().decode_wire(op) {
        accounts.insert(envelope.delegator);
        accounts.insert(envelope.voter);
    }
    accounts
}

fn commit(st: &mut State, ops: &[WireOperation]) -> ChainMoment {
    let block = st.next_block;
    st.next_block += 1;
    for (i, op) in ops.iter().enumerate() {
        for account in signers(op) {
            append(st, &account, block, i as u32, op.op_type(), op.payload().clone());
        }
    }
    ChainMoment::new(block, 0, 0)
}

// ---------------------------------------------------------------------------
// Collaborator impls
// ---------------------------------------------------------------------------

#[async_trait]
impl HistorySource for FakeChain {
    fn name(&self) -> &'static str {
        "fake-chain"
    }

    /// Indices in `(from - limit, from]`, oldest first; `from < 0` means
    /// newest. Index 0 is the account's first operation.
    async fn fetch_history_batch(
        &self,
        account: &str,
        from: i64,
        limit: u32,
    ) -> Result<Vec<RawOperation>, TransportError> {
        let mut st = self.state();
        st.history_calls += 1;
        if st.failing_history_fetches > 0 {
            st.failing_history_fetches -= 1;
            return Err(TransportError::Unreachable("node timed out".into()));
        }

        let Some(history) = st.histories.get(account) else {
            return Ok(Vec::new());
        };
        let len = history.len() as i64;
        let end = if from < 0 { len } else { (from + 1).min(len) };
        let start = (end - limit as i64).max(0);
        Ok(history[start as usize..end as usize].to_vec())
    }
}

#[async_trait]
impl RulesReader for FakeChain {
    fn name(&self) -> &'static str {
        "fake-index"
    }

    async fn query_rulesets(
        &self,
        delegator: &str,
        voter: &str,
        at: ChainMoment,
    ) -> Result<SetRules, TransportError> {
        self.check_index()?;
        let commands = self.decoded_commands(delegator);
        Ok(resolve_binding(&commands, delegator, voter, at)
            .map(|b| b.set_rules)
            .unwrap_or_default())
    }
}

#[async_trait]
impl RulesIndex for FakeChain {
    async fn query_all_rulesets(
        &self,
        delegator: &str,
        at: ChainMoment,
    ) -> Result<BTreeMap<String, EffectuatedSetRules>, TransportError> {
        self.check_index()?;
        let commands = self.decoded_commands(delegator);
        let voters: BTreeSet<&str> = commands
            .iter()
            .filter(|c| c.delegator == delegator && matches!(c.command, Command::SetRules(_)))
            .map(|c| c.voter.as_str())
            .collect();

        Ok(voters
            .into_iter()
            .filter_map(|voter| {
                resolve_binding(&commands, delegator, voter, at).map(|b| (voter.to_string(), b))
            })
            .collect())
    }

    async fn query_last_confirmation(
        &self,
        delegator: &str,
    ) -> Result<Option<ChainMoment>, TransportError> {
        self.check_index()?;
        Ok(self
            .decoded_commands(delegator)
            .iter()
            .filter(|c| c.delegator == delegator && matches!(c.command, Command::ConfirmVote(_)))
            .map(|c| c.moment)
            .max())
    }
}

#[async_trait]
impl Broadcaster for FakeChain {
    async fn broadcast(&self, ops: Vec<WireOperation>) -> Result<ChainMoment, TransportError> {
        let mut st = self.state();
        let blocked = ops
            .iter()
            .flat_map(parties)
            .find(|a| st.failing_broadcasts.contains(a));
        if let Some(account) = blocked {
            return Err(TransportError::Api {
                code: Some(-32000),
                message: format!("missing required posting authority for {account}"),
            });
        }

        let moment = commit(&mut st, &ops);
        debug!(%moment, ops = ops.len(), "fake broadcast committed");
        st.broadcasts.push(ops);
        Ok(moment)
    }
}

#[async_trait]
impl PostLoader for FakeChain {
    async fn load_post(
        &self,
        author: &str,
        permlink: &str,
    ) -> Result<Option<PostMetadata>, TransportError> {
        Ok(self
            .state()
            .posts
            .get(&(author.to_string(), permlink.to_string()))
            .cloned())
    }
}

#[async_trait]
impl CustomRpcClient for FakeChain {
    async fn call(&self, rule: &CustomRpcRule, _voteorder: &VoteOrder) -> Result<bool, TransportError> {
        self.state()
            .rpc_verdicts
            .get(rule)
            .copied()
            .ok_or_else(|| TransportError::Unreachable(format!("{}{}", rule.host, rule.path)))
    }
}
