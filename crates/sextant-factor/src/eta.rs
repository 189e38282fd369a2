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

//! Eta matrices.
//!
//! An eta matrix `E` is the identity with column `p` replaced by a vector `d`.
//! A pivot that replaces basis column `p` by an entering column `a` is exactly
//! `B' = B·E` with `d = B⁻¹·a`, so a basis update can be stored as the pair
//! `(p, d)` in `O(m)` space.
//!
//! Solving with `E` is cheap:
//!
//! - `E·w = z`: `w_p = z_p / d_p`, and `w_i = z_i - d_i·w_p` for `i ≠ p`.
//! - `v·E = y`: `v_j = y_j` for `j ≠ p`, and
//!   `v_p = (y_p - Σ_{i≠p} y_i·d_i) / d_p`.

use crate::error::FactorizationError;
use ndarray::{Array2, ArrayView1};

/// The identity matrix with one column replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct EtaMatrix {
    column_index: usize,
    column: Vec<f64>,
}

impl EtaMatrix {
    /// Creates an eta matrix, rejecting a diagonal entry below `pivot_tolerance`.
    pub fn new(
        column_index: usize,
        column: &[f64],
        pivot_tolerance: f64,
    ) -> Result<Self, FactorizationError> {
        if column_index >= column.len() {
            return Err(FactorizationError::DimensionMismatch {
                expected: column.len(),
                found: column_index,
            });
        }
        if !(column[column_index].abs() >= pivot_tolerance) {
            return Err(FactorizationError::Singular {
                column: column_index,
            });
        }

        Ok(Self {
            column_index,
            column: column.to_vec(),
        })
    }

    #[inline]
    pub fn column_index(&self) -> usize {
        self.column_index
    }

    #[inline]
    pub fn column(&self) -> &[f64] {
        &self.column
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.column.len()
    }

    /// Solves `E·w = z` in place.
    pub fn solve_in_place(&self, z: &mut [f64]) {
        let p = self.column_index;
        let wp = z[p] / self.column[p];
        for (i, (zi, di)) in z.iter_mut().zip(&self.column).enumerate() {
            if i == p {
                *zi = wp;
            } else {
                *zi -= di * wp;
            }
        }
    }

    /// Solves `v·E = y` in place.
    pub fn solve_transposed_in_place(&self, y: &mut [f64]) {
        let p = self.column_index;
        let off_diagonal: f64 = y
            .iter()
            .zip(&self.column)
            .enumerate()
            .filter(|&(i, _)| i != p)
            .map(|(_, (yi, di))| yi * di)
            .sum();
        y[p] = (y[p] - off_diagonal) / self.column[p];
    }

    /// Replaces `basis` by `basis·E`.
    ///
    /// Only column `p` changes; it becomes `basis·d`.
    pub fn multiply_basis(&self, basis: &mut Array2<f64>) {
        let updated = basis.dot(&ArrayView1::from(&self.column[..]));
        basis.column_mut(self.column_index).assign(&updated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn eta() -> EtaMatrix {
        EtaMatrix::new(1, &[2.0, 4.0, -1.0], 1e-10).expect("valid eta")
    }

    fn explicit(eta: &EtaMatrix) -> Array2<f64> {
        let mut e = Array2::eye(eta.dimension());
        eta.multiply_basis(&mut e);
        e
    }

    #[test]
    fn test_multiply_identity_gives_eta_matrix() {
        let e = explicit(&eta());
        assert_eq!(e, array![[1.0, 2.0, 0.0], [0.0, 4.0, 0.0], [0.0, -1.0, 1.0]]);
    }

    #[test]
    fn test_multiply_basis_matches_matrix_product() {
        let eta = eta();
        let mut basis = array![[1.0, 2.0, 0.0], [0.0, 1.0, 3.0], [2.0, 0.0, 1.0]];
        let expected = basis.dot(&explicit(&eta));
        eta.multiply_basis(&mut basis);
        assert_eq!(basis, expected);
    }

    #[test]
    fn test_solves_match_explicit_matrix() {
        let eta = eta();
        let e = explicit(&eta);
        let y = [3.0, 8.0, 1.0];

        let mut w = y;
        eta.solve_in_place(&mut w);
        assert_eq!(e.dot(&Array1::from(w.to_vec())).to_vec(), y.to_vec());

        let mut v = y;
        eta.solve_transposed_in_place(&mut v);
        let check = Array1::from(v.to_vec()).dot(&e);
        for (a, b) in check.iter().zip(&y) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_diagonal_is_singular() {
        assert_eq!(
            EtaMatrix::new(0, &[0.0, 1.0], 1e-10),
            Err(FactorizationError::Singular { column: 0 })
        );
    }
}
