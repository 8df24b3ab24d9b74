use super::*;
use std::sync::Arc;

/// An immutable window of consecutive matrix rows.
///
/// `start` is the global index of the first row; `base` is the element
/// offset of that row inside `data`. Many views can share one allocation,
/// e.g. every thread on a node reading from that node's copy.
#[derive(Debug, Clone)]
pub struct View {
    data: Arc<[f64]>,
    base: usize,
    start: usize,
    rows: usize,
    ncol: usize,
}

impl View {
    /// Views `rows` rows of `data` starting at element `base`, labelled as
    /// global rows `start..start + rows`.
    pub fn new(data: Arc<[f64]>, base: usize, start: usize, rows: usize, ncol: usize) -> Self {
        assert!(base + rows * ncol <= data.len(), "view exceeds its buffer");
        Self {
            data,
            base,
            start,
            rows,
            ncol,
        }
    }

    /// Copies rows `start..start + rows` of a row-major `source` into a
    /// freshly allocated buffer owned by the calling thread.
    pub fn copied(source: &[f64], start: usize, rows: usize, ncol: usize) -> Self {
        let data = source[start * ncol..(start + rows) * ncol].to_vec();
        Self::new(Arc::from(data), 0, start, rows, ncol)
    }

    pub fn start(&self) -> usize {
        self.start
    }
    pub fn end(&self) -> usize {
        self.start + self.rows
    }
    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn ncol(&self) -> usize {
        self.ncol
    }
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Row by local index.
    pub fn row(&self, i: usize) -> &[f64] {
        let offset = self.base + i * self.ncol;
        &self.data[offset..offset + self.ncol]
    }

    /// Row by global index, if this view holds it.
    pub fn global(&self, row: usize) -> Option<&[f64]> {
        (self.start..self.end())
            .contains(&row)
            .then(|| self.row(row - self.start))
    }

    /// All rows as one contiguous slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.data[self.base..self.base + self.rows * self.ncol]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.as_slice().chunks_exact(self.ncol.max(1))
    }

    /// Narrows this view to global rows `start..start + rows`.
    pub fn window(&self, start: usize, rows: usize) -> View {
        assert!(start >= self.start && start + rows <= self.end(), "window outside view");
        Self {
            data: self.data.clone(),
            base: self.base + (start - self.start) * self.ncol,
            start,
            rows,
            ncol: self.ncol,
        }
    }

    /// A copy of these rows with every column scaled into `range`, in a
    /// buffer owned by the calling thread.
    pub fn rescaled(&self, range: &FeatureRange) -> View {
        let data = self.iter().flat_map(|row| range.rescale(row)).collect::<Vec<_>>();
        Self::new(Arc::from(data), 0, self.start, self.rows, self.ncol)
    }

    /// Cuts this view into consecutive views of at most `rows` rows each.
    pub fn split(&self, rows: usize) -> Vec<View> {
        let rows = rows.max(1);
        (0..self.rows)
            .step_by(rows)
            .map(|offset| Self {
                data: self.data.clone(),
                base: self.base + offset * self.ncol,
                start: self.start + offset,
                rows: rows.min(self.rows - offset),
                ncol: self.ncol,
            })
            .collect()
    }
}
