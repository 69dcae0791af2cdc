use std::hash::Hash;
use std::ops::AddAssign;

use fxhash::FxHashMap;

/// Analogy of `scipy.sparse.csr_matrix`
/// https://docs.scipy.org/doc/scipy/reference/generated/scipy.sparse.csr_matrix.html
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T, U> {
    pub indices: Vec<T>,
    pub indptr: Vec<usize>,
    pub data: Vec<U>,
    pub n_cols: usize,
}

impl<T: Copy + Ord, U: Copy> CsrMatrix<T, U> {
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }

    /// Number of stored entries, explicit zeros included.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Column indices and values of row `i`, empty slices when out of range.
    pub fn row(&self, i: usize) -> (&[T], &[U]) {
        if i >= self.n_rows() {
            return (&[], &[]);
        }
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Builds a matrix from per-row entries, each row sorted by column.
    pub fn from_rows(rows: Vec<Vec<(T, U)>>, n_cols: usize) -> Self {
        let mut indices = Vec::new();
        let mut indptr = vec![0];
        let mut data = Vec::new();
        for mut row in rows {
            row.sort_unstable_by_key(|&(i, _)| i);
            for (i, d) in row {
                indices.push(i);
                data.push(d);
            }
            // keep empty rows
            indptr.push(indices.len());
        }
        Self {
            indices,
            indptr,
            data,
            n_cols,
        }
    }
}

impl CsrMatrix<u32, f32> {
    /// Swap rows and columns, equivalent to a CSC view of the same matrix.
    pub fn transpose(&self) -> CsrMatrix<u32, f32> {
        let n_rows = self.n_rows();
        let mut counts = vec![0usize; self.n_cols + 1];
        for &col in &self.indices {
            counts[col as usize + 1] += 1;
        }
        for i in 0..self.n_cols {
            counts[i + 1] += counts[i];
        }
        let indptr = counts.clone();
        let mut next = counts;
        let mut indices = vec![0u32; self.nnz()];
        let mut data = vec![0.0f32; self.nnz()];
        for row in 0..n_rows {
            let (cols, vals) = self.row(row);
            for (&col, &val) in cols.iter().zip(vals) {
                let dest = next[col as usize];
                indices[dest] = row as u32;
                data[dest] = val;
                next[col as usize] += 1;
            }
        }
        CsrMatrix {
            indices,
            indptr,
            data,
            n_cols: n_rows,
        }
    }

    /// L2-normalize every row in place. All-zero rows are left untouched.
    pub fn normalize_rows(&mut self) {
        for i in 0..self.n_rows() {
            let (start, end) = (self.indptr[i], self.indptr[i + 1]);
            let row = &mut self.data[start..end];
            let norm = row.iter().map(|d| d * d).sum::<f32>().sqrt();
            if norm > 0.0 {
                row.iter_mut().for_each(|d| *d /= norm);
            }
        }
    }

    /// Value at `(i, j)`, zero if absent.
    pub fn get(&self, i: usize, j: u32) -> f32 {
        let (cols, vals) = self.row(i);
        cols.binary_search(&j).map_or(0.0, |pos| vals[pos])
    }
}

/// Analogy of `scipy.sparse.dok_matrix`
/// https://docs.scipy.org/doc/scipy/reference/generated/scipy.sparse.dok_matrix.html
///
/// Repeated insertions into the same cell are summed.
pub struct DokMatrix<T = u32, U = f32> {
    data: Vec<FxHashMap<T, U>>,
}

impl<T, U> DokMatrix<T, U>
where
    T: Copy + Eq + Hash + Ord,
    U: Copy + AddAssign,
{
    pub fn new(n_rows: usize) -> Self {
        Self {
            data: (0..n_rows).map(|_| FxHashMap::default()).collect(),
        }
    }

    pub fn add(&mut self, i: usize, j: T, value: U) {
        self.data[i]
            .entry(j)
            .and_modify(|v| *v += value)
            .or_insert(value);
    }

    pub fn rows(&self) -> impl Iterator<Item = (usize, &FxHashMap<T, U>)> + '_ {
        self.data.iter().enumerate()
    }

    pub fn to_csr(&self, n_cols: usize) -> CsrMatrix<T, U> {
        let mut indices: Vec<T> = Vec::new();
        let mut indptr: Vec<usize> = vec![0];
        let mut data: Vec<U> = Vec::new();
        for d in &self.data {
            if !d.is_empty() {
                let mut mapping: Vec<(&T, &U)> = d.iter().collect();
                mapping.sort_unstable_by_key(|(i, _)| *i);
                let (idx, dat): (Vec<T>, Vec<U>) = mapping.into_iter().unzip();
                indices.extend(idx);
                data.extend(dat);
            }
            // keep empty rows
            indptr.push(indices.len());
        }
        CsrMatrix {
            indices,
            indptr,
            data,
            n_cols,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dok_sums_repeated_cells() {
        // [
        //   [0, 5, 0],
        //   [],
        //   [1, 0, 2],
        // ]
        let mut dok: DokMatrix<u32, f32> = DokMatrix::new(3);
        dok.add(0, 1, 2.0);
        dok.add(2, 2, 2.0);
        dok.add(0, 1, 3.0);
        dok.add(2, 0, 1.0);

        let matrix = dok.to_csr(3);
        assert_eq!(matrix.indptr, vec![0, 1, 1, 3]);
        assert_eq!(matrix.indices, vec![1, 0, 2]);
        assert_eq!(matrix.data, vec![5.0, 1.0, 2.0]);
        assert_eq!(matrix.n_rows(), 3);
        assert_eq!(matrix.row(1).0.len(), 0);
    }

    #[test]
    fn test_transpose() {
        // [
        //   [1, 0, 2],
        //   [0, 3, 0],
        // ]
        let matrix: CsrMatrix<u32, f32> = CsrMatrix {
            indices: vec![0, 2, 1],
            indptr: vec![0, 2, 3],
            data: vec![1.0, 2.0, 3.0],
            n_cols: 3,
        };
        let transposed = matrix.transpose();
        assert_eq!(transposed.n_rows(), 3);
        assert_eq!(transposed.n_cols, 2);
        assert_eq!(transposed.indptr, vec![0, 1, 2, 3]);
        assert_eq!(transposed.indices, vec![0, 1, 0]);
        assert_eq!(transposed.data, vec![1.0, 3.0, 2.0]);
        assert_eq!(transposed.transpose(), matrix);
    }

    #[test]
    fn test_normalize_rows_keeps_zero_rows() {
        let mut matrix: CsrMatrix<u32, f32> = CsrMatrix {
            indices: vec![0, 1, 2],
            indptr: vec![0, 2, 3],
            data: vec![3.0, 4.0, 0.0],
            n_cols: 3,
        };
        matrix.normalize_rows();
        assert!((matrix.get(0, 0) - 0.6).abs() < 1e-6);
        assert!((matrix.get(0, 1) - 0.8).abs() < 1e-6);
        assert_eq!(matrix.get(1, 2), 0.0);
        assert!(matrix.data.iter().all(|d| d.is_finite()));
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![vec![(2u32, 1.0f32), (0, 4.0)], vec![], vec![(1, 2.0)]];
        let matrix = CsrMatrix::from_rows(rows, 3);
        assert_eq!(matrix.indptr, vec![0, 2, 2, 3]);
        assert_eq!(matrix.row(0), (&[0u32, 2][..], &[4.0f32, 1.0][..]));
        assert!(matrix.row(1).0.is_empty());
        assert_eq!(matrix.get(2, 1), 2.0);
        assert_eq!(matrix.row(5), (&[][..], &[][..]));
    }
}
