//! Delegator-side confirmation loop.
//!
//! A node indexes a `send_voteorder` under its signer, the voter. Voteorders
//! are therefore read from the histories of the voters the delegator ever
//! configured; confirmations are read from the delegator's own history.
//!
//! # Invariants
//!
//! - Confirmations are published oldest-first, so for each voter the
//!   voteorder answered by the newest `confirm_vote` naming that voter marks
//!   the settled boundary. Older voteorders of that voter are never
//!   revisited.
//! - A voteorder above the boundary is pending until a `confirm_vote` naming
//!   its transaction id exists, wherever that confirmation landed.
//! - One `confirm_vote` per voteorder.
//! - The first transport failure halts the pass. The failing voteorder stays
//!   unconfirmed and the next pass picks it up again.
//! - A malformed voteorder, or one for a post that does not exist, is
//!   permanent: it is confirmed as rejected.
//! - Voteorders from accounts the delegator never configured are not read.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};
use wise_chain::filters;
use wise_chain::{
    AccountHistory, ChainItem, ChainMoment, HistorySource, Transaction, TransportError,
    DEFAULT_BATCH_SIZE,
};
use wise_protocol::{Broadcaster, CommandEnvelope, Protocol, RulesIndex};
use wise_schemas::{Command, ConfirmVote, EffectuatedCommand};

use crate::{ConfirmError, Validator, ValidatorError};

/// One published confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedVote {
    pub voteorder_tx_id: String,
    pub voter: String,
    pub accepted: bool,
    pub msg: String,
    /// Where the `confirm_vote` landed.
    pub published_at: ChainMoment,
}

pub struct Confirmer {
    delegator: String,
    source: Arc<dyn HistorySource>,
    index: Arc<dyn RulesIndex>,
    validator: Validator,
    broadcaster: Arc<dyn Broadcaster>,
    protocol: Protocol,
    batch_size: u32,
}

/// What the delegator's history says about past confirmations.
#[derive(Default)]
struct Settled {
    confirmed: BTreeSet<String>,
    /// Per voter, the voteorder answered by the newest `confirm_vote`.
    boundaries: BTreeMap<String, String>,
}

impl Settled {
    /// Returns `false` once every voter in `voters` has a boundary.
    fn absorb(
        &mut self,
        delegator: &str,
        voters: &BTreeSet<String>,
        cmd: EffectuatedCommand,
    ) -> bool {
        if cmd.delegator != delegator {
            return true;
        }
        if let Command::ConfirmVote(body) = cmd.command {
            self.boundaries
                .entry(cmd.voter)
                .or_insert_with(|| body.voteorder_tx_id.clone());
            self.confirmed.insert(body.voteorder_tx_id);
        }
        !voters.iter().all(|v| self.boundaries.contains_key(v))
    }
}

impl Confirmer {
    pub fn new(
        delegator: impl Into<String>,
        source: Arc<dyn HistorySource>,
        index: Arc<dyn RulesIndex>,
        validator: Validator,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            delegator: delegator.into(),
            source,
            index,
            validator,
            broadcaster,
            protocol: Protocol::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn delegator(&self) -> &str {
        &self.delegator
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Push every decoded protocol command of `account`'s history,
    /// newest-first, into `absorb` until it answers `false`.
    async fn walk_commands<F>(&self, account: &str, mut absorb: F) -> Result<(), TransportError>
    where
        F: FnMut(EffectuatedCommand) -> bool + Send,
    {
        let history =
            AccountHistory::new(self.source.clone(), account).with_batch_size(self.batch_size);
        let ids = Protocol::custom_json_ids();
        let protocol = self.protocol;

        let mut failure = None;
        {
            let mut collect = |item: ChainItem<Transaction>| -> bool {
                let trx = match item {
                    Ok(trx) => trx,
                    Err(e) => {
                        failure = Some(e);
                        return false;
                    }
                };
                let mut more = true;
                for decoded in protocol.decode_transaction(&trx) {
                    match decoded {
                        Ok(cmd) => more &= absorb(cmd),
                        Err(e) => {
                            warn!(trx_id = %trx.transaction_id, error = %e, "skipping malformed operation")
                        }
                    }
                }
                more
            };
            let mut chain = filters::custom_json_id(&ids, &mut collect);
            history.run(&mut chain).await;
        }
        failure.map_or(Ok(()), Err)
    }

    /// `send_voteorder` commands addressed to this delegator and not yet
    /// confirmed, oldest first.
    pub async fn pending_voteorders(&self) -> Result<Vec<EffectuatedCommand>, TransportError> {
        let voters: BTreeSet<String> = self
            .index
            .query_all_rulesets(&self.delegator, ChainMoment::FUTURE)
            .await?
            .into_keys()
            .collect();
        if voters.is_empty() {
            return Ok(Vec::new());
        }

        let delegator = self.delegator.as_str();
        let mut settled = Settled::default();
        self.walk_commands(delegator, |cmd| settled.absorb(delegator, &voters, cmd))
            .await?;

        let mut pending = Vec::new();
        for voter in &voters {
            let boundary = settled.boundaries.get(voter).map(String::as_str);
            let before = pending.len();
            self.walk_commands(voter, |cmd| {
                if cmd.delegator != delegator || !matches!(cmd.command, Command::SendVoteorder(_)) {
                    return true;
                }
                if boundary == Some(cmd.transaction_id.as_str()) {
                    return false;
                }
                pending.push(cmd);
                true
            })
            .await?;
            debug!(delegator, %voter, found = pending.len() - before, "voter history read");
        }

        pending.retain(|cmd| !settled.confirmed.contains(&cmd.transaction_id));
        pending.sort_by_key(|c| c.moment);
        pending.dedup_by(|a, b| a.transaction_id == b.transaction_id);
        Ok(pending)
    }

    /// Validate and confirm every pending voteorder.
    pub async fn confirm_pending(&self) -> Result<Vec<ConfirmedVote>, ConfirmError> {
        let pending = self.pending_voteorders().await?;
        info!(delegator = %self.delegator, pending = pending.len(), "confirming voteorders");

        let mut confirmed = Vec::with_capacity(pending.len());
        for cmd in pending {
            let Some(voteorder) = cmd.as_voteorder() else {
                continue;
            };

            let (accepted, msg) = match self
                .validator
                .validate(&voteorder, cmd.moment, cmd.timestamp)
                .await
            {
                Ok(verdict) => (verdict.is_accepted(), verdict.message()),
                Err(ValidatorError::InvalidVoteorder(reason)) => {
                    (false, format!("invalid voteorder: {reason}"))
                }
                Err(source) => {
                    warn!(
                        delegator = %self.delegator,
                        trx_id = %voteorder.transaction_id,
                        error = %source,
                        "validation failed, halting confirmation pass"
                    );
                    return Err(ConfirmError::Validation {
                        tx_id: voteorder.transaction_id,
                        source,
                    });
                }
            };

            let envelope = CommandEnvelope::new(
                self.delegator.as_str(),
                voteorder.voter.as_str(),
                Command::ConfirmVote(ConfirmVote {
                    voteorder_tx_id: voteorder.transaction_id.clone(),
                    accepted,
                    msg: msg.clone(),
                }),
            );
            let published_at = self
                .broadcaster
                .broadcast(vec![self.protocol.encode(&envelope)])
                .await?;
            info!(
                delegator = %self.delegator,
                voter = %voteorder.voter,
                trx_id = %voteorder.transaction_id,
                accepted,
                %published_at,
                "confirm_vote published"
            );

            confirmed.push(ConfirmedVote {
                voteorder_tx_id: voteorder.transaction_id,
                voter: voteorder.voter,
                accepted,
                msg,
                published_at,
            });
        }
        Ok(confirmed)
    }
}
