use super::*;

/// Combines merged partials across processes before centroids are finalized.
///
/// Called once per iteration by the coordinator, after its own workers'
/// partials have been absorbed. Implementations must leave every process
/// holding the global sums, counts, and change count.
pub trait AllReduce: Send {
    fn all_reduce(&self, merged: &mut Accumulator, tally: &mut Tally);

    /// Widens a column range to cover every process's rows.
    fn all_range(&self, _range: &mut FeatureRange) {}

    /// Sums one seeding weight across processes.
    fn all_sum(&self, value: Energy) -> Energy {
        value
    }
}

/// Single-process reduction: local partials already are the global ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Local;

impl AllReduce for Local {
    fn all_reduce(&self, _: &mut Accumulator, _: &mut Tally) {}
}
