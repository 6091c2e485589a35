use crate::{Error, Result};
use pathfinding::matrix::Matrix;
use std::fmt;

/// A dense system of linear equations `A·x = b`, stored as an
/// `n × (n + 1)` augmented matrix and solved by Gaussian elimination
/// with partial pivoting.
///
/// Rows are never physically swapped; the pivot order is kept in a
/// permutation array instead.
#[derive(Clone, Debug)]
pub struct LinearSystem {
    /// The number of unknowns.
    size: usize,
    /// The augmented matrix `[A | b]`.
    matrix: Matrix<f64>,
    /// Maps the i-th pivot row to its row in `matrix`.
    permutation: Vec<usize>,
    /// The solution, once back substitution has run.
    solution: Vec<f64>,
}

impl LinearSystem {
    /// Creates a system of `size` equations with all coefficients zero.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            matrix: Matrix::new(size, size + 1, 0.0),
            permutation: (0..size).collect(),
            solution: vec![0.0; size],
        }
    }

    /// Creates a system from the rows of an augmented matrix.
    ///
    /// # Panics
    /// Panics if a row does not have exactly `rows.len() + 1` entries.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let mut system = Self::new(rows.len());
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), rows.len() + 1, "row {} has the wrong length", i);
            for (j, value) in row.iter().enumerate() {
                system.matrix[(i, j)] = *value;
            }
        }
        system
    }

    /// The number of unknowns.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Gets the coefficient of unknown `col` in equation `row`.
    pub fn coefficient(&self, row: usize, col: usize) -> f64 {
        self.matrix[(row, col)]
    }

    /// Sets the coefficient of unknown `col` in equation `row`.
    pub fn set_coefficient(&mut self, row: usize, col: usize, value: f64) {
        self.matrix[(row, col)] = value;
    }

    /// Adds to the coefficient of unknown `col` in equation `row`.
    pub fn add_coefficient(&mut self, row: usize, col: usize, value: f64) {
        self.matrix[(row, col)] += value;
    }

    /// Gets the right hand side of equation `row`.
    pub fn rhs(&self, row: usize) -> f64 {
        self.matrix[(row, self.size)]
    }

    /// Sets the right hand side of equation `row`.
    pub fn set_rhs(&mut self, row: usize, value: f64) {
        self.matrix[(row, self.size)] = value;
    }

    /// The pivot order chosen by [Self::eliminate].
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// The solution computed by [Self::back_substitute].
    pub fn solution(&self) -> &[f64] {
        &self.solution
    }

    /// Reduces the matrix to upper triangular form (in permutation order).
    ///
    /// Fails with [Error::SingularMatrix] if a column has no entry whose
    /// magnitude exceeds `tolerance`.
    pub fn eliminate(&mut self, tolerance: f64) -> Result<()> {
        let n = self.size;
        let p = &mut self.permutation;
        let a = &mut self.matrix;

        for j in 0..n {
            // Partial pivoting
            let (best, max) = (j..n)
                .map(|i| (i, a[(p[i], j)].abs()))
                .fold((j, 0.0), |acc, x| if x.1 > acc.1 { x } else { acc });
            if max <= tolerance {
                return Err(Error::SingularMatrix { column: j });
            }
            p.swap(j, best);

            let pivot_row = p[j];
            let pivot = a[(pivot_row, j)];
            for &row in &p[j + 1..] {
                let factor = a[(row, j)] / pivot;
                if factor == 0.0 {
                    continue;
                }
                for col in j..=n {
                    a[(row, col)] -= factor * a[(pivot_row, col)];
                }
            }
        }

        Ok(())
    }

    /// Solves the triangular system left by [Self::eliminate].
    pub fn back_substitute(&mut self) -> &[f64] {
        let n = self.size;
        let p = &self.permutation;
        let a = &self.matrix;
        let x = &mut self.solution;

        for i in (0..n).rev() {
            let row = p[i];
            let sum: f64 = (i + 1..n).map(|j| a[(row, j)] * x[j]).sum();
            x[i] = (a[(row, n)] - sum) / a[(row, i)];
        }

        &self.solution
    }

    /// Eliminates and back substitutes, returning the solution vector.
    pub fn solve(&mut self, tolerance: f64) -> Result<&[f64]> {
        self.eliminate(tolerance)?;
        Ok(self.back_substitute())
    }

    /// Dumps the augmented matrix and solution as JSON.
    #[cfg(feature = "debug")]
    pub fn debug_json(&self) -> serde_json::Value {
        let rows = (0..self.size)
            .map(|i| {
                (0..=self.size)
                    .map(|j| self.matrix[(i, j)])
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        serde_json::json!({
            "size": self.size,
            "matrix": rows,
            "permutation": self.permutation,
            "solution": self.solution,
        })
    }
}

impl fmt::Display for LinearSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "linear system ({} unknowns)", self.size)?;
        for &row in &self.permutation {
            write!(f, "[{:>4}]", row)?;
            for col in 0..self.size {
                write!(f, " {:>10.4}", self.matrix[(row, col)])?;
            }
            writeln!(f, " | {:>12.4}", self.matrix[(row, self.size)])?;
        }
        write!(f, "x =")?;
        for value in &self.solution {
            write!(f, " {:.6}", value)?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{Rng, SeedableRng};

    fn fixture() -> LinearSystem {
        LinearSystem::from_rows(&[
            vec![2.0, 1.0, -1.0, 0.0, 3.0, 3.0],
            vec![4.0, -6.0, 0.0, 1.0, 0.0, 16.5],
            vec![-2.0, 7.0, 2.0, 0.0, 1.0, -8.0],
            vec![0.0, 1.0, -3.0, 5.0, 2.0, -4.5],
            vec![1.0, 0.0, 1.0, 2.0, -4.0, -3.0],
        ])
    }

    #[test]
    fn five_row_fixture() {
        let mut system = fixture();
        let x = system.solve(1e-7).unwrap();
        let expected = [1.0, -2.0, 3.0, 0.5, 2.0];
        for (x, e) in x.iter().zip(expected) {
            assert_approx_eq!(*x, e, 1e-6);
        }
    }

    #[test]
    fn pivots_without_moving_rows() {
        let mut system = LinearSystem::from_rows(&[
            vec![0.0, 1.0, 2.0],
            vec![3.0, 0.0, 6.0],
        ]);
        let x = system.solve(1e-7).unwrap().to_vec();
        assert_eq!(system.permutation(), &[1, 0]);
        assert_approx_eq!(x[0], 2.0);
        assert_approx_eq!(x[1], 2.0);
        // The stored rows are untouched by the pivoting
        assert_eq!(system.coefficient(0, 1), 1.0);
    }

    #[test]
    fn singular_matrix() {
        let mut system = LinearSystem::from_rows(&[
            vec![1.0, 2.0, 3.0],
            vec![2.0, 4.0, 6.0],
        ]);
        assert_eq!(system.solve(1e-7), Err(Error::SingularMatrix { column: 1 }));

        let mut system = LinearSystem::new(3);
        assert_eq!(system.eliminate(1e-7), Err(Error::SingularMatrix { column: 0 }));
    }

    #[test]
    fn empty_system() {
        let mut system = LinearSystem::new(0);
        assert!(system.solve(1e-7).unwrap().is_empty());
    }

    #[test]
    fn reproduces_right_hand_side() {
        let mut rng = rand::rngs::StdRng::from_seed(*b"Vegemite sandwhich is not fun...");
        for _ in 0..50 {
            let n = rng.gen_range(1..12);
            let rows = (0..n)
                .map(|_| (0..=n).map(|_| rng.gen_range(-10.0..10.0)).collect::<Vec<f64>>())
                .collect::<Vec<_>>();
            let mut system = LinearSystem::from_rows(&rows);
            let x = match system.solve(1e-7) {
                Ok(x) => x.to_vec(),
                Err(_) => continue,
            };
            for row in &rows {
                let lhs: f64 = row[..n].iter().zip(&x).map(|(a, x)| a * x).sum();
                assert_approx_eq!(lhs, row[n], 1e-6 * (1.0 + row[n].abs()));
            }
        }
    }

    #[test]
    fn dump_lists_solution() {
        let mut system = fixture();
        system.solve(1e-7).unwrap();
        let dump = system.to_string();
        assert!(dump.starts_with("linear system (5 unknowns)"));
        assert_eq!(dump.lines().count(), 7);
    }

    #[cfg(feature = "debug")]
    #[test]
    fn json_dump() {
        let mut system = fixture();
        system.solve(1e-7).unwrap();
        let json = system.debug_json();
        assert_eq!(json["size"], 5);
        assert_eq!(json["matrix"].as_array().unwrap().len(), 5);
        assert_eq!(json["solution"].as_array().unwrap().len(), 5);
    }
}
