use super::*;

/// A contiguous half-open row range `[start, start + rows)` owned by one
/// thread (or one memory node), together with the node it is bound to.
///
/// Partitions produced by [`Partition::plan`] are disjoint and cover
/// `[0, nrow)` exactly once. All but the last hold `nrow / parts` rows; the
/// last absorbs the `nrow % parts` remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    start: usize,
    rows: usize,
    node: usize,
}

impl Partition {
    /// Splits `nrow` rows into `parts` contiguous ranges.
    /// Nodes are bound round-robin over `nnodes`.
    pub fn plan(nrow: usize, parts: usize, nnodes: usize) -> Result<Vec<Self>> {
        if parts == 0 {
            return Err(Error::config("cannot partition rows over zero threads"));
        }
        if nnodes == 0 {
            return Err(Error::config("cannot bind partitions to zero nodes"));
        }
        let each = nrow / parts;
        Ok((0..parts)
            .map(|i| Self {
                start: i * each,
                rows: if i == parts - 1 { each + nrow % parts } else { each },
                node: i % nnodes,
            })
            .collect())
    }
    pub fn start(&self) -> usize {
        self.start
    }
    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn end(&self) -> usize {
        self.start + self.rows
    }
    pub fn node(&self) -> usize {
        self.node
    }
    pub fn contains(&self, row: usize) -> bool {
        (self.start..self.end()).contains(&row)
    }
}
