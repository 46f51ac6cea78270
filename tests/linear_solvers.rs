//! Property tests for the dense linear solvers.

use nodal_core::solver::{LinearSolver, Matrix};
use proptest::prelude::*;

const SOLVERS: [LinearSolver; 4] = [
    LinearSolver::Gauss,
    LinearSolver::GaussJordan,
    LinearSolver::Lu,
    LinearSolver::RookGauss,
];

/// A strictly diagonally dominant system with its right-hand side.
fn dominant_system() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<f64>)> {
    (1usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec(prop::collection::vec(-10.0f64..10.0, n), n),
            prop::collection::vec(-100.0f64..100.0, n),
        )
            .prop_map(|(mut rows, b)| {
                for (i, row) in rows.iter_mut().enumerate() {
                    let off: f64 = row
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, v)| v.abs())
                        .sum();
                    row[i] = off + 1.0 + row[i].abs();
                }
                (rows, b)
            })
    })
}

proptest! {
    #[test]
    fn solution_reproduces_rhs((rows, b) in dominant_system()) {
        let slices: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let original = Matrix::from_rows(&slices).unwrap();
        for solver in SOLVERS {
            let mut a = original.clone();
            let mut x = b.clone();
            solver.solve(&mut a, &mut x).unwrap();
            let ax = original.mul_vec(&x);
            for (lhs, rhs) in ax.iter().zip(&b) {
                prop_assert!(
                    (lhs - rhs).abs() <= 1e-9 * (1.0 + rhs.abs()),
                    "{:?}: {} vs {}",
                    solver,
                    lhs,
                    rhs
                );
            }
        }
    }

    #[test]
    fn zero_row_is_singular(n in 2usize..6, zero in 0usize..6) {
        let zero = zero % n;
        let mut a = Matrix::new(n);
        for i in 0..n {
            if i != zero {
                a[(i, i)] = 1.0;
            }
        }
        for solver in SOLVERS {
            let mut m = a.clone();
            let mut b = vec![1.0; n];
            prop_assert!(solver.solve(&mut m, &mut b).is_err());
        }
    }
}
