//! Dense linear solvers for `A·x = b`.
//!
//! All solvers work in place: `A` is destroyed and `b` is overwritten with
//! the solution. A pivot whose magnitude does not exceed
//! [`PIVOT_TOLERANCE`] raises [`NodalError::SingularMatrix`]. NaN entries
//! never win a pivot search, and a NaN pivot is reported as singular.

use std::ops::{Index, IndexMut};

use crate::error::{NodalError, Result};

/// Pivots with magnitude at or below this value are treated as zero.
pub const PIVOT_TOLERANCE: f64 = 1e-15;

/// Square dense matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    size: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create an `n×n` zero matrix.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    /// Build a matrix from rows; every row must be as long as there are rows.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let size = rows.len();
        let mut m = Self::new(size);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(NodalError::invalid_param(format!(
                    "matrix row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            m.data[i * size..(i + 1) * size].copy_from_slice(row);
        }
        Ok(m)
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reset every entry to zero, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Add to element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] += value;
    }

    /// Borrow one row.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.size..(row + 1) * self.size]
    }

    /// Swap two rows.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let n = self.size;
        for j in 0..n {
            self.data.swap(a * n + j, b * n + j);
        }
    }

    /// Swap two columns.
    pub fn swap_cols(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let n = self.size;
        for i in 0..n {
            self.data.swap(i * n + a, i * n + b);
        }
    }

    /// Multiply by a vector.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        (0..self.size)
            .map(|i| self.row(i).iter().zip(x).map(|(a, b)| a * b).sum())
            .collect()
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.size + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.data[row * self.size + col]
    }
}

/// Choice of dense solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinearSolver {
    /// Gauss elimination with partial pivoting
    #[default]
    Gauss,
    /// Gauss-Jordan elimination with partial pivoting
    GaussJordan,
    /// LU factorization with partial pivoting, then substitution
    Lu,
    /// Gauss elimination with rook pivoting
    RookGauss,
}

impl LinearSolver {
    /// Solve `a·x = b` in place, leaving `x` in `b`.
    pub fn solve(self, a: &mut Matrix, b: &mut [f64]) -> Result<()> {
        match self {
            LinearSolver::Gauss => gauss(a, b),
            LinearSolver::GaussJordan => gauss_jordan(a, b),
            LinearSolver::Lu => {
                let mut perm = vec![0; a.size()];
                lu_factor(a, &mut perm)?;
                lu_solve(a, &perm, b)
            }
            LinearSolver::RookGauss => gauss_rook(a, b),
        }
    }
}

/// Magnitude used for pivot comparisons; NaN ranks below everything.
fn magnitude(x: f64) -> f64 {
    if x.is_nan() {
        -1.0
    } else {
        x.abs()
    }
}

fn check_pivot(pivot: f64, index: usize) -> Result<()> {
    // Written so that NaN fails the test
    if pivot.abs() > PIVOT_TOLERANCE {
        Ok(())
    } else {
        Err(NodalError::SingularMatrix { index })
    }
}

fn argmax_in_col(a: &Matrix, k: usize, col: usize) -> usize {
    let mut best = k;
    let mut max = magnitude(a[(k, col)]);
    for i in (k + 1)..a.size() {
        let v = magnitude(a[(i, col)]);
        if v > max {
            max = v;
            best = i;
        }
    }
    best
}

fn argmax_in_row(a: &Matrix, k: usize, row: usize) -> usize {
    let mut best = k;
    let mut max = magnitude(a[(row, k)]);
    for j in (k + 1)..a.size() {
        let v = magnitude(a[(row, j)]);
        if v > max {
            max = v;
            best = j;
        }
    }
    best
}

/// Partial pivoting: the row in `k..n` with the largest entry in column `k`.
pub fn partial_pivot(a: &Matrix, k: usize) -> usize {
    argmax_in_col(a, k, k)
}

/// Rook pivoting over the trailing submatrix starting at `(k, k)`.
///
/// Starts from the largest entry of column `k`, then alternately searches
/// the current row and column for a strictly larger entry until one is
/// the maximum of both its row and its column. Returns `(row, col)`.
pub fn rook_pivot(a: &Matrix, k: usize) -> (usize, usize) {
    let mut col = k;
    let mut row = argmax_in_col(a, k, col);
    let mut best = magnitude(a[(row, col)]);

    loop {
        let c = argmax_in_row(a, k, row);
        let v = magnitude(a[(row, c)]);
        if v <= best {
            break;
        }
        col = c;
        best = v;

        let r = argmax_in_col(a, k, col);
        let v = magnitude(a[(r, col)]);
        if v <= best {
            break;
        }
        row = r;
        best = v;
    }

    (row, col)
}

/// Eliminate column `k` below the pivot row.
fn eliminate_below(a: &mut Matrix, b: &mut [f64], k: usize) {
    let n = a.size();
    let pivot = a[(k, k)];
    for i in (k + 1)..n {
        let factor = a[(i, k)] / pivot;
        if factor == 0.0 {
            continue;
        }
        a[(i, k)] = 0.0;
        for j in (k + 1)..n {
            let akj = a[(k, j)];
            a[(i, j)] -= factor * akj;
        }
        b[i] -= factor * b[k];
    }
}

/// Back substitution on an upper-triangular system.
fn back_substitute(a: &Matrix, b: &mut [f64]) {
    let n = a.size();
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[(i, j)] * b[j];
        }
        b[i] = sum / a[(i, i)];
    }
}

/// Gauss elimination with partial pivoting.
pub fn gauss(a: &mut Matrix, b: &mut [f64]) -> Result<()> {
    let n = a.size();
    debug_assert_eq!(b.len(), n);

    for k in 0..n {
        let p = partial_pivot(a, k);
        check_pivot(a[(p, k)], k)?;
        if p != k {
            a.swap_rows(k, p);
            b.swap(k, p);
        }
        eliminate_below(a, b, k);
    }

    back_substitute(a, b);
    Ok(())
}

/// Gauss elimination with rook pivoting.
///
/// Column exchanges permute the unknowns; the solution is written back
/// into `b` in the original order.
pub fn gauss_rook(a: &mut Matrix, b: &mut [f64]) -> Result<()> {
    rook_eliminate(a, b).map(|_| ())
}

/// Rook-pivoted elimination and back substitution. Returns the `(row, col)`
/// pivot chosen at each step, relative to the partially reduced matrix.
fn rook_eliminate(a: &mut Matrix, b: &mut [f64]) -> Result<Vec<(usize, usize)>> {
    let n = a.size();
    debug_assert_eq!(b.len(), n);
    let mut cols: Vec<usize> = (0..n).collect();
    let mut pivots = Vec::with_capacity(n);

    for k in 0..n {
        let (p, q) = rook_pivot(a, k);
        check_pivot(a[(p, q)], k)?;
        pivots.push((p, q));
        if p != k {
            a.swap_rows(k, p);
            b.swap(k, p);
        }
        if q != k {
            a.swap_cols(k, q);
            cols.swap(k, q);
        }
        eliminate_below(a, b, k);
    }

    back_substitute(a, b);

    let y = b.to_vec();
    for (j, &col) in cols.iter().enumerate() {
        b[col] = y[j];
    }
    Ok(pivots)
}

/// Gauss-Jordan elimination with partial pivoting.
///
/// Reduces `a` to the identity; `b` holds the solution directly.
pub fn gauss_jordan(a: &mut Matrix, b: &mut [f64]) -> Result<()> {
    let n = a.size();
    debug_assert_eq!(b.len(), n);

    for k in 0..n {
        let p = partial_pivot(a, k);
        check_pivot(a[(p, k)], k)?;
        if p != k {
            a.swap_rows(k, p);
            b.swap(k, p);
        }

        let pivot = a[(k, k)];
        for j in k..n {
            a[(k, j)] /= pivot;
        }
        b[k] /= pivot;

        for i in 0..n {
            if i == k {
                continue;
            }
            let factor = a[(i, k)];
            if factor == 0.0 {
                continue;
            }
            for j in k..n {
                let akj = a[(k, j)];
                a[(i, j)] -= factor * akj;
            }
            b[i] -= factor * b[k];
        }
    }

    Ok(())
}

/// LU factorization with partial pivoting, in place.
///
/// On return `a` holds the unit lower factor below the diagonal and the
/// upper factor on and above it; `perm[i]` is the original row now at `i`.
pub fn lu_factor(a: &mut Matrix, perm: &mut [usize]) -> Result<()> {
    let n = a.size();
    debug_assert_eq!(perm.len(), n);
    for (i, p) in perm.iter_mut().enumerate() {
        *p = i;
    }

    for k in 0..n {
        let p = partial_pivot(a, k);
        check_pivot(a[(p, k)], k)?;
        if p != k {
            a.swap_rows(k, p);
            perm.swap(k, p);
        }

        let pivot = a[(k, k)];
        for i in (k + 1)..n {
            let factor = a[(i, k)] / pivot;
            a[(i, k)] = factor;
            if factor == 0.0 {
                continue;
            }
            for j in (k + 1)..n {
                let akj = a[(k, j)];
                a[(i, j)] -= factor * akj;
            }
        }
    }

    Ok(())
}

/// Solve with a factorization from [`lu_factor`], overwriting `b`.
///
/// The factorization is left untouched and may be reused.
pub fn lu_solve(lu: &Matrix, perm: &[usize], b: &mut [f64]) -> Result<()> {
    let n = lu.size();
    let permuted: Vec<f64> = perm.iter().map(|&p| b[p]).collect();
    b.copy_from_slice(&permuted);

    // Forward substitution (L * y = Pb)
    for i in 0..n {
        for j in 0..i {
            b[i] -= lu[(i, j)] * b[j];
        }
    }

    // Back substitution (U * x = y)
    for i in (0..n).rev() {
        for j in (i + 1)..n {
            b[i] -= lu[(i, j)] * b[j];
        }
        check_pivot(lu[(i, i)], i)?;
        b[i] /= lu[(i, i)];
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference_system() -> (Matrix, Vec<f64>) {
        let a = Matrix::from_rows(&[&[2.0, 1.0, -1.0], &[-3.0, -1.0, 2.0], &[-2.0, 1.0, 2.0]])
            .unwrap();
        (a, vec![8.0, -11.0, -3.0])
    }

    fn assert_reference_solution(x: &[f64]) {
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(x[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_methods_solve_reference_system() {
        for method in [
            LinearSolver::Gauss,
            LinearSolver::GaussJordan,
            LinearSolver::Lu,
            LinearSolver::RookGauss,
        ] {
            let (mut a, mut b) = reference_system();
            method.solve(&mut a, &mut b).unwrap();
            assert_reference_solution(&b);
        }
    }

    #[test]
    fn test_one_by_one() {
        for method in [
            LinearSolver::Gauss,
            LinearSolver::GaussJordan,
            LinearSolver::Lu,
            LinearSolver::RookGauss,
        ] {
            let mut a = Matrix::from_rows(&[&[2.0]]).unwrap();
            let mut b = vec![6.0];
            method.solve(&mut a, &mut b).unwrap();
            assert_eq!(b[0], 3.0);
        }
    }

    #[test]
    fn test_gauss_jordan_leaves_identity() {
        let (mut a, mut b) = reference_system();
        gauss_jordan(&mut a, &mut b).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(a[(i, j)], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_zero_leading_pivot_is_exchanged() {
        let a = Matrix::from_rows(&[&[0.0, 1.0, 2.0], &[0.0, 3.0, 1.0], &[4.0, 1.0, 0.0]]).unwrap();
        assert_eq!(partial_pivot(&a, 0), 2);

        let mut m = a.clone();
        let mut b = vec![3.0, 4.0, 5.0];
        gauss(&mut m, &mut b).unwrap();
        let check = a.mul_vec(&b);
        assert_relative_eq!(check[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(check[1], 4.0, epsilon = 1e-12);
        assert_relative_eq!(check[2], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rook_pivot_sequence() {
        let a = Matrix::from_rows(&[
            &[1.0, 2.0, 0.0, -7.0, 3.0, 1.0],
            &[4.0, -1.0, 5.0, 2.0, 0.0, 11.0],
            &[0.0, 3.0, -8.0, 1.0, 6.0, 2.0],
            &[2.0, 0.0, 1.0, 3.0, -4.0, 5.0],
            &[-6.0, 1.0, 2.0, 0.0, 1.0, -9.0],
            &[3.0, 5.0, -2.0, 4.0, 7.0, 1.0],
        ])
        .unwrap();
        // First pivot: 4 in column 0, then 11 in its row, which also tops column 5
        assert_eq!(rook_pivot(&a, 0), (1, 5));

        let mut m = a.clone();
        let rhs = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut x = rhs.clone();
        let pivots = rook_eliminate(&mut m, &mut x).unwrap();
        assert_eq!(pivots, vec![(1, 5), (5, 4), (2, 2), (5, 3), (5, 4), (5, 5)]);
        for (got, want) in a.mul_vec(&x).iter().zip(&rhs) {
            assert_relative_eq!(*got, *want, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(Matrix::from_rows(&[&[1.0, 2.0], &[3.0]]).is_err());
        assert!(Matrix::from_rows(&[&[1.0, 2.0]]).is_err());
        assert_eq!(Matrix::from_rows(&[]).unwrap().size(), 0);
    }

    #[test]
    fn test_singular_column_detected() {
        for method in [
            LinearSolver::Gauss,
            LinearSolver::GaussJordan,
            LinearSolver::Lu,
            LinearSolver::RookGauss,
        ] {
            let mut a = Matrix::from_rows(&[&[1.0, 0.0, 2.0], &[3.0, 0.0, 1.0], &[5.0, 0.0, 4.0]])
                .unwrap();
            let mut b = vec![1.0, 2.0, 3.0];
            let err = method.solve(&mut a, &mut b).unwrap_err();
            assert!(err.is_singular(), "{:?}", method);
        }
    }

    #[test]
    fn test_dependent_rows_detected() {
        let mut a = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]).unwrap();
        let mut b = vec![1.0, 2.0];
        assert!(matches!(
            gauss(&mut a, &mut b),
            Err(NodalError::SingularMatrix { index: 1 })
        ));
    }

    #[test]
    fn test_nan_pivot_is_singular() {
        let mut a = Matrix::from_rows(&[&[f64::NAN, 1.0], &[f64::NAN, 2.0]]).unwrap();
        let mut b = vec![1.0, 2.0];
        assert!(gauss(&mut a, &mut b).unwrap_err().is_singular());
    }

    #[test]
    fn test_nan_entry_loses_pivot_search() {
        let a = Matrix::from_rows(&[&[f64::NAN, 1.0], &[0.5, 2.0]]).unwrap();
        assert_eq!(partial_pivot(&a, 0), 1);
    }

    #[test]
    fn test_lu_factorization_reused() {
        let (mut a, _) = reference_system();
        let mut perm = vec![0; 3];
        lu_factor(&mut a, &mut perm).unwrap();

        let mut b1 = vec![8.0, -11.0, -3.0];
        lu_solve(&a, &perm, &mut b1).unwrap();
        assert_reference_solution(&b1);

        // Same factors, second right-hand side: A·[1,1,1] = [2,-2,1]
        let mut b2 = vec![2.0, -2.0, 1.0];
        lu_solve(&a, &perm, &mut b2).unwrap();
        for x in b2 {
            assert_relative_eq!(x, 1.0, epsilon = 1e-12);
        }
    }
}
