// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Dense LU decomposition with partial pivoting.
//!
//! The decomposition satisfies `P·B = L·U`, where `L` is unit lower triangular
//! and `U` upper triangular. Both live in one `Array2` (the unit diagonal of
//! `L` is implicit). `perm[i]` names the row of `B` that ended up in row `i`
//! of `P·B`.

use crate::error::FactorizationError;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Views the row-major slice `matrix` as an `m × m` matrix.
pub fn square_view(matrix: &[f64], m: usize) -> Result<ArrayView2<'_, f64>, FactorizationError> {
    ArrayView2::from_shape((m, m), matrix).map_err(|_| FactorizationError::DimensionMismatch {
        expected: m * m,
        found: matrix.len(),
    })
}

/// `L` and `U` factors of a row-permuted square matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LuFactors {
    lu: Array2<f64>,
    perm: Vec<usize>,
}

impl LuFactors {
    /// The factors of the `m × m` identity matrix.
    pub fn identity(m: usize) -> Self {
        Self {
            lu: Array2::eye(m),
            perm: (0..m).collect(),
        }
    }

    /// Factorizes the square matrix `matrix`.
    ///
    /// Returns `Singular` if no pivot of magnitude at least `pivot_tolerance`
    /// exists in some column.
    pub fn factorize(
        matrix: ArrayView2<'_, f64>,
        pivot_tolerance: f64,
    ) -> Result<Self, FactorizationError> {
        let (m, columns) = matrix.dim();
        if m != columns {
            return Err(FactorizationError::DimensionMismatch {
                expected: m * m,
                found: m * columns,
            });
        }

        let mut lu = matrix.to_owned();
        let mut perm: Vec<usize> = (0..m).collect();

        for k in 0..m {
            let mut pivot_row = k;
            let mut pivot_abs = lu[[k, k]].abs();
            for i in (k + 1)..m {
                let candidate = lu[[i, k]].abs();
                if candidate > pivot_abs {
                    pivot_abs = candidate;
                    pivot_row = i;
                }
            }

            if !(pivot_abs >= pivot_tolerance) {
                return Err(FactorizationError::Singular { column: k });
            }

            if pivot_row != k {
                for j in 0..m {
                    lu.swap([k, j], [pivot_row, j]);
                }
                perm.swap(k, pivot_row);
            }

            let pivot = lu[[k, k]];
            for i in (k + 1)..m {
                let factor = lu[[i, k]] / pivot;
                lu[[i, k]] = factor;
                if factor != 0.0 {
                    for j in (k + 1)..m {
                        lu[[i, j]] -= factor * lu[[k, j]];
                    }
                }
            }
        }

        Ok(Self { lu, perm })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.perm.len()
    }

    /// Solves `B·x = y` in place: `x` holds `y` on entry and the solution on exit.
    pub fn solve_in_place(&self, x: &mut [f64]) {
        let m = self.dimension();
        debug_assert_eq!(
            x.len(),
            m,
            "called `LuFactors::solve_in_place` with a vector of the wrong length"
        );

        let mut z: Vec<f64> = self.perm.iter().map(|&p| x[p]).collect();

        // L·w = P·y
        for i in 0..m {
            let row = self.lu.row(i);
            let sum: f64 = row.iter().take(i).zip(&z[..i]).map(|(l, w)| l * w).sum();
            z[i] -= sum;
        }

        // U·x = w
        for i in (0..m).rev() {
            let row = self.lu.row(i);
            let sum: f64 = row
                .iter()
                .skip(i + 1)
                .zip(&z[i + 1..])
                .map(|(u, x)| u * x)
                .sum();
            z[i] = (z[i] - sum) / row[i];
        }

        x.copy_from_slice(&z);
    }

    /// Solves `x·B = y` in place: `x` holds `y` on entry and the solution on exit.
    pub fn solve_transposed_in_place(&self, x: &mut [f64]) {
        let m = self.dimension();
        debug_assert_eq!(
            x.len(),
            m,
            "called `LuFactors::solve_transposed_in_place` with a vector of the wrong length"
        );

        // Uᵀ·z = y
        let mut z = x.to_vec();
        for i in 0..m {
            let mut sum = 0.0;
            for k in 0..i {
                sum += self.lu[[k, i]] * z[k];
            }
            z[i] = (z[i] - sum) / self.lu[[i, i]];
        }

        // Lᵀ·w = z
        for i in (0..m).rev() {
            let mut sum = 0.0;
            for k in (i + 1)..m {
                sum += self.lu[[k, i]] * z[k];
            }
            z[i] -= sum;
        }

        // P·x = w
        for (i, &p) in self.perm.iter().enumerate() {
            x[p] = z[i];
        }
    }

    /// `B⁻¹`, one forward solve per unit column.
    pub fn invert(&self) -> Array2<f64> {
        let m = self.dimension();
        let mut inverse = Array2::eye(m);
        let mut column = vec![0.0; m];
        for j in 0..m {
            column.iter_mut().for_each(|c| *c = 0.0);
            column[j] = 1.0;
            self.solve_in_place(&mut column);
            inverse.column_mut(j).assign(&ArrayView1::from(&column[..]));
        }
        inverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    const EPS: f64 = 1e-9;

    fn assert_close<'a>(
        a: impl IntoIterator<Item = &'a f64>,
        b: impl IntoIterator<Item = &'a f64>,
    ) {
        let (a, b): (Vec<f64>, Vec<f64>) = (
            a.into_iter().copied().collect(),
            b.into_iter().copied().collect(),
        );
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < EPS, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_identity_solves_trivially() {
        let lu = LuFactors::identity(3);
        let mut x = vec![1.0, 2.0, 3.0];
        lu.solve_in_place(&mut x);
        assert_eq!(x, vec![1.0, 2.0, 3.0]);
        lu.solve_transposed_in_place(&mut x);
        assert_eq!(x, vec![1.0, 2.0, 3.0]);
        assert_eq!(lu.invert(), Array2::<f64>::eye(3));
    }

    #[test]
    fn test_pivoting_handles_zero_leading_entry() {
        let b = array![[0.0, 1.0], [2.0, 3.0]];
        let lu = LuFactors::factorize(b.view(), 1e-10).expect("nonsingular");

        let y = array![1.0, 8.0];
        let mut x = y.to_vec();
        lu.solve_in_place(&mut x);
        assert_close(&b.dot(&Array1::from(x)), &y);

        let mut v = y.to_vec();
        lu.solve_transposed_in_place(&mut v);
        assert_close(&Array1::from(v).dot(&b), &y);
    }

    #[test]
    fn test_singular_matrix_is_detected() {
        let b = array![[1.0, 2.0], [2.0, 4.0]];
        assert_eq!(
            LuFactors::factorize(b.view(), 1e-10),
            Err(FactorizationError::Singular { column: 1 })
        );
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        assert!(matches!(
            square_view(&[1.0, 2.0, 3.0], 2),
            Err(FactorizationError::DimensionMismatch { expected: 4, found: 3 })
        ));
        let wide = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            LuFactors::factorize(wide.view(), 1e-10),
            Err(FactorizationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_invert_produces_inverse() {
        let b = array![[4.0, 7.0], [2.0, 6.0]];
        let lu = LuFactors::factorize(b.view(), 1e-10).expect("nonsingular");
        let inverse = lu.invert();
        assert_close(&inverse, &array![[0.6, -0.7], [-0.2, 0.4]]);
        assert_close(&b.dot(&inverse), &Array2::<f64>::eye(2));
    }
}
