//! Stock transaction filters.

use crate::{ChainMoment, Consumer, Operation, OperationFilter, Transaction};

/// Comparison applied by [`moment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MomentComparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl MomentComparison {
    pub fn holds(&self, candidate: ChainMoment, pivot: ChainMoment) -> bool {
        match self {
            MomentComparison::Lt => candidate < pivot,
            MomentComparison::Le => candidate <= pivot,
            MomentComparison::Gt => candidate > pivot,
            MomentComparison::Ge => candidate >= pivot,
        }
    }
}

/// Keep operations of the given node operation type (e.g. `"custom_json"`).
pub fn operation_type<C>(
    type_name: impl Into<String>,
    downstream: C,
) -> OperationFilter<impl FnMut(&Transaction, &Operation) -> bool, C>
where
    C: Consumer<Transaction>,
{
    let type_name = type_name.into();
    OperationFilter::new(
        move |_: &Transaction, op: &Operation| op.op_type == type_name,
        downstream,
    )
}

/// Keep operations whose own moment satisfies `cmp` against `pivot`.
pub fn moment<C>(
    cmp: MomentComparison,
    pivot: ChainMoment,
    downstream: C,
) -> OperationFilter<impl FnMut(&Transaction, &Operation) -> bool, C>
where
    C: Consumer<Transaction>,
{
    OperationFilter::new(
        move |trx: &Transaction, op: &Operation| cmp.holds(trx.moment_of(op), pivot),
        downstream,
    )
}

/// Keep `custom_json` operations whose `id` is one of `ids`.
pub fn custom_json_id<C>(
    ids: &[&str],
    downstream: C,
) -> OperationFilter<impl FnMut(&Transaction, &Operation) -> bool, C>
where
    C: Consumer<Transaction>,
{
    let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
    OperationFilter::new(
        move |_: &Transaction, op: &Operation| {
            op.op_type == "custom_json"
                && op
                    .payload
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(|id| ids.iter().any(|i| i == id))
                    .unwrap_or(false)
        },
        downstream,
    )
}
