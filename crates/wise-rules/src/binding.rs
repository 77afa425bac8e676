use wise_chain::ChainMoment;
use wise_schemas::{EffectuatedCommand, EffectuatedSetRules};

/// The `set_rules` binding `(delegator, voter)` at `at`.
///
/// Latest matching command with moment <= `at`; `None` when there is none.
/// Input order does not matter.
pub fn resolve_binding<'a, I>(
    commands: I,
    delegator: &str,
    voter: &str,
    at: ChainMoment,
) -> Option<EffectuatedSetRules>
where
    I: IntoIterator<Item = &'a EffectuatedCommand>,
{
    commands
        .into_iter()
        .filter(|c| c.delegator == delegator && c.voter == voter && c.moment <= at)
        .filter_map(EffectuatedCommand::as_set_rules)
        .max_by_key(|e| e.moment)
}
