use super::*;
use std::sync::Arc;

/// Duplicates a row-major matrix onto memory nodes.
///
/// Rows are split per node exactly as [`Partition::plan`] splits them per
/// thread. [`MemoryDistributor::numa_reorg`] copies each node's range from a
/// thread bound to that node, so the copy is resident there. The copies live
/// as long as any [`View`] over them does; the source is left untouched.
pub struct MemoryDistributor {
    source: Arc<[f64]>,
    nrow: usize,
    ncol: usize,
    topology: Topology,
    parts: Vec<Partition>,
    nodes: Vec<View>,
}

impl MemoryDistributor {
    pub fn create(
        source: impl Into<Arc<[f64]>>,
        nnodes: usize,
        nrow: usize,
        ncol: usize,
    ) -> Result<Self> {
        Self::with_topology(source, nnodes, nrow, ncol, Topology::detect())
    }

    pub fn with_topology(
        source: impl Into<Arc<[f64]>>,
        nnodes: usize,
        nrow: usize,
        ncol: usize,
        topology: Topology,
    ) -> Result<Self> {
        let source = source.into();
        if source.len() != nrow * ncol {
            return Err(Error::config(format!(
                "buffer holds {} values, expected {} x {}",
                source.len(),
                nrow,
                ncol
            )));
        }
        Ok(Self {
            parts: Partition::plan(nrow, nnodes, nnodes)?,
            source,
            nrow,
            ncol,
            topology,
            nodes: Vec::new(),
        })
    }

    /// Copies every node's rows onto that node. Idempotent.
    pub fn numa_reorg(&mut self) {
        if !self.nodes.is_empty() {
            return;
        }
        log::info!("{:<32}{:<32}", "numa reorganizing", format!("{} nodes", self.parts.len()));
        let ref source = self.source;
        let ref topology = self.topology;
        let ncol = self.ncol;
        self.nodes = std::thread::scope(|scope| {
            self.parts
                .iter()
                .map(|part| {
                    scope.spawn(move || {
                        if let Err(e) = topology.bind(part.node()) {
                            log::warn!("node {} binding failed: {}", part.node(), e);
                        }
                        View::copied(source, part.start(), part.rows(), ncol)
                    })
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|handle| handle.join().expect("node copy thread panicked"))
                .collect()
        });
    }

    /// Per-node base slices, ordered by node. Empty before [`Self::numa_reorg`].
    pub fn get_ptrs(&self) -> Vec<&[f64]> {
        self.nodes.iter().map(View::as_slice).collect()
    }

    /// Per-node copies as shareable views.
    pub fn nodes(&self) -> &[View] {
        &self.nodes
    }

    pub fn nrow(&self) -> usize {
        self.nrow
    }
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    /// Views over the node-local copies covering global rows
    /// `start..start + rows`, split wherever the range crosses a node.
    pub fn views(&self, start: usize, rows: usize) -> Vec<View> {
        assert!(!self.nodes.is_empty(), "numa_reorg must run before views");
        let end = start + rows;
        self.nodes
            .iter()
            .filter(|node| node.start() < end && start < node.end())
            .map(|node| {
                let lo = start.max(node.start());
                let hi = end.min(node.end());
                node.window(lo, hi - lo)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(nrow: usize, ncol: usize) -> Vec<f64> {
        (0..nrow * ncol).map(|x| (x as f64).sin()).collect()
    }

    #[test]
    fn node_copies_match_original_rows() {
        let (nrow, ncol, nnodes) = (50, 5, 3);
        let data = matrix(nrow, ncol);
        let topology = Topology::from(vec![vec![0]; nnodes]);
        let mut md =
            MemoryDistributor::with_topology(data.clone(), nnodes, nrow, ncol, topology).unwrap();
        assert!(md.get_ptrs().is_empty());
        md.numa_reorg();
        let ptrs = md.get_ptrs();
        assert_eq!(ptrs.len(), nnodes);
        for (node, ptr) in ptrs.iter().enumerate() {
            let offset = node * (nrow / nnodes) * ncol;
            let prows = if node < nnodes - 1 {
                nrow / nnodes
            } else {
                nrow / nnodes + nrow % nnodes
            };
            assert_eq!(ptr.len(), prows * ncol);
            assert_eq!(*ptr, &data[offset..offset + prows * ncol]);
        }
    }

    #[test]
    fn views_span_node_boundaries() {
        let (nrow, ncol) = (50, 5);
        let data = matrix(nrow, ncol);
        let mut md = MemoryDistributor::with_topology(
            data.clone(),
            2,
            nrow,
            ncol,
            Topology::from(vec![vec![0], vec![0]]),
        )
        .unwrap();
        md.numa_reorg();
        let views = md.views(20, 10);
        assert_eq!(views.len(), 2);
        assert_eq!(views.iter().map(View::rows).sum::<usize>(), 10);
        for row in 20..30 {
            let found = views.iter().find_map(|v| v.global(row)).unwrap();
            assert_eq!(found, &data[row * ncol..(row + 1) * ncol]);
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(MemoryDistributor::create(vec![0.; 9], 1, 2, 5).is_err());
    }
}
