use std::collections::BTreeSet;

use wise_schemas::{DesiredState, ObservedState, SetRules};

use crate::{ChangeKind, ReconcilePlan, VoterChange};

fn change_for(voter: &str, desired: Option<&SetRules>, observed: Option<&SetRules>) -> Option<VoterChange> {
    let empty = SetRules::empty();
    let target = desired.unwrap_or(&empty);
    let current = observed.unwrap_or(&empty);

    if target.same_configuration(current) {
        return None;
    }

    let kind = if target.is_empty() {
        ChangeKind::Revoked
    } else if current.is_empty() {
        ChangeKind::Added
    } else {
        ChangeKind::Modified
    };
    Some(VoterChange {
        voter: voter.to_string(),
        kind,
        target: target.clone(),
    })
}

/// Deterministic diff between desired and observed rules.
///
/// - Every voter in desired ∪ observed is compared.
/// - A voter missing from desired is compared against empty rules, so a
///   voter with rules on chain is revoked and one already empty is left alone.
/// - Tag and author lists compare as sets; rule and ruleset order matter.
pub fn diff(desired: &DesiredState, observed: &ObservedState) -> ReconcilePlan {
    let mut voters: BTreeSet<&str> = BTreeSet::new();
    voters.extend(desired.voters.keys().map(String::as_str));
    voters.extend(observed.voters.keys().map(String::as_str));

    let changes = voters
        .into_iter()
        .filter_map(|voter| {
            change_for(
                voter,
                desired.get(voter),
                observed.get(voter).map(|e| &e.set_rules),
            )
        })
        .collect();

    ReconcilePlan { changes }
}
