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

//! LU baseline with an eta file.
//!
//! The basis is kept as `B_k = B_0 · E_1 · … · E_k`: a partially pivoted LU
//! decomposition of `B_0` plus the ordered chain of eta matrices pushed since.
//!
//! - Forward: solve with the LU factors, then with `E_1`, …, `E_k` in order.
//! - Backward: solve with `E_k`, …, `E_1`, then with the transposed LU factors.
//!
//! Once the chain reaches `refactorization_threshold`, the basis is multiplied
//! out and `B_0` is replaced by it.

use crate::{
    error::FactorizationError,
    eta::EtaMatrix,
    factorization::{
        check_len, downcast_mut, downcast_ref, BasisFactorization, FactorizationConfig,
        FactorizationKind,
    },
    lu::{square_view, LuFactors},
};
use ndarray::Array2;
use std::any::Any;

#[derive(Debug, Clone)]
pub struct ForrestTomlinFactorization {
    dimension: usize,
    config: FactorizationConfig,
    /// The matrix `B_0` the LU factors belong to.
    baseline: Array2<f64>,
    lu: LuFactors,
    etas: Vec<EtaMatrix>,
    /// `B_k`, when it has been materialized.
    explicit: Option<Array2<f64>>,
    enabled: bool,
}

impl ForrestTomlinFactorization {
    /// Creates a factorization of the `m × m` identity basis.
    pub fn new(m: usize, config: FactorizationConfig) -> Self {
        Self {
            dimension: m,
            config,
            baseline: Array2::eye(m),
            lu: LuFactors::identity(m),
            etas: Vec::new(),
            explicit: Some(Array2::eye(m)),
            enabled: true,
        }
    }

    #[inline]
    pub fn config(&self) -> &FactorizationConfig {
        &self.config
    }

    #[inline]
    pub fn etas(&self) -> &[EtaMatrix] {
        &self.etas
    }

    /// Computes `B_0 · E_1 · … · E_k` without touching the state.
    fn materialize(&self) -> Array2<f64> {
        if let Some(explicit) = &self.explicit {
            return explicit.clone();
        }
        let mut basis = self.baseline.clone();
        for eta in &self.etas {
            eta.multiply_basis(&mut basis);
        }
        basis
    }
}

impl BasisFactorization for ForrestTomlinFactorization {
    #[inline]
    fn kind(&self) -> FactorizationKind {
        FactorizationKind::ForrestTomlin
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn set_basis(&mut self, basis: &[f64]) -> Result<(), FactorizationError> {
        let basis = square_view(basis, self.dimension)?;
        let lu = LuFactors::factorize(basis, self.config.pivot_tolerance)?;
        self.baseline = basis.to_owned();
        self.lu = lu;
        self.etas.clear();
        self.explicit = Some(basis.to_owned());
        Ok(())
    }

    fn push_eta_matrix(
        &mut self,
        column_index: usize,
        column: &[f64],
    ) -> Result<(), FactorizationError> {
        check_len(self.dimension, column.len())?;
        let eta = EtaMatrix::new(column_index, column, self.config.pivot_tolerance)?;

        let refactorize_now = self.etas.len() + 1 >= self.config.refactorization_threshold;
        let previous_explicit = if refactorize_now {
            self.explicit.clone()
        } else {
            None
        };

        // Without factorization the explicit basis is the source of truth and
        // has to follow every update.
        if self.enabled {
            self.explicit = None;
        } else if let Some(explicit) = self.explicit.as_mut() {
            eta.multiply_basis(explicit);
        }
        self.etas.push(eta);

        if refactorize_now {
            if let Err(e) = self.refactorize() {
                self.etas.pop();
                self.explicit = previous_explicit;
                tracing::debug!("refactorization after eta push failed: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }

    fn forward_transformation(&self, y: &[f64], x: &mut [f64]) -> Result<(), FactorizationError> {
        check_len(self.dimension, y.len())?;
        check_len(self.dimension, x.len())?;
        x.copy_from_slice(y);

        if !self.enabled {
            let basis = self.materialize();
            let lu = LuFactors::factorize(basis.view(), self.config.pivot_tolerance)?;
            lu.solve_in_place(x);
            return Ok(());
        }

        self.lu.solve_in_place(x);
        for eta in &self.etas {
            eta.solve_in_place(x);
        }
        Ok(())
    }

    fn backward_transformation(
        &self,
        y: &[f64],
        x: &mut [f64],
    ) -> Result<(), FactorizationError> {
        check_len(self.dimension, y.len())?;
        check_len(self.dimension, x.len())?;
        x.copy_from_slice(y);

        if !self.enabled {
            let basis = self.materialize();
            let lu = LuFactors::factorize(basis.view(), self.config.pivot_tolerance)?;
            lu.solve_transposed_in_place(x);
            return Ok(());
        }

        for eta in self.etas.iter().rev() {
            eta.solve_transposed_in_place(x);
        }
        self.lu.solve_transposed_in_place(x);
        Ok(())
    }

    fn store_factorization(
        &self,
        target: &mut dyn BasisFactorization,
    ) -> Result<(), FactorizationError> {
        check_len(self.dimension, target.dimension())?;
        let target = downcast_mut::<Self>(self.kind(), target)?;
        target.clone_from(self);
        Ok(())
    }

    fn restore_factorization(
        &mut self,
        source: &dyn BasisFactorization,
    ) -> Result<(), FactorizationError> {
        check_len(self.dimension, source.dimension())?;
        let source = downcast_ref::<Self>(self.kind(), source)?;
        self.clone_from(source);
        Ok(())
    }

    #[inline]
    fn factorization_enabled(&self) -> bool {
        self.enabled
    }

    fn toggle_factorization(&mut self, enabled: bool) {
        if !enabled && self.explicit.is_none() {
            self.explicit = Some(self.materialize());
        }
        self.enabled = enabled;
    }

    #[inline]
    fn explicit_basis_available(&self) -> bool {
        self.explicit.is_some()
    }

    fn make_explicit_basis_available(&mut self) -> Result<(), FactorizationError> {
        if self.explicit.is_some() {
            return Ok(());
        }
        self.refactorize()
    }

    #[inline]
    fn basis(&self) -> Option<&[f64]> {
        self.explicit.as_ref().and_then(|basis| basis.as_slice())
    }

    fn invert_basis(&self, result: &mut [f64]) -> Result<(), FactorizationError> {
        let basis = self.explicit.as_ref().ok_or(FactorizationError::NotExplicit)?;
        check_len(self.dimension * self.dimension, result.len())?;

        let inverse = if self.etas.is_empty() && self.enabled {
            self.lu.invert()
        } else {
            LuFactors::factorize(basis.view(), self.config.pivot_tolerance)?.invert()
        };
        result
            .iter_mut()
            .zip(inverse.iter())
            .for_each(|(r, v)| *r = *v);
        Ok(())
    }

    #[inline]
    fn eta_chain_len(&self) -> usize {
        self.etas.len()
    }

    fn refactorize(&mut self) -> Result<(), FactorizationError> {
        let basis = self.materialize();
        let lu = LuFactors::factorize(basis.view(), self.config.pivot_tolerance)?;
        tracing::trace!(
            "refactorized {}x{} basis after {} eta updates",
            self.dimension,
            self.dimension,
            self.etas.len()
        );
        self.lu = lu;
        self.etas.clear();
        self.explicit = Some(basis.clone());
        self.baseline = basis;
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn BasisFactorization> {
        Box::new(self.clone())
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_push_invalidates_explicit_basis() {
        let mut f = ForrestTomlinFactorization::new(2, FactorizationConfig::default());
        assert!(f.explicit_basis_available());
        f.push_eta_matrix(0, &[2.0, 1.0]).unwrap();
        assert!(!f.explicit_basis_available());
        assert_eq!(f.eta_chain_len(), 1);

        f.make_explicit_basis_available().unwrap();
        assert_eq!(f.basis().unwrap(), &[2.0, 0.0, 1.0, 1.0]);
        assert_eq!(f.eta_chain_len(), 0);
    }

    #[test]
    fn test_materialized_basis_is_the_eta_product() {
        let baseline = array![[2.0, 1.0, 0.0], [0.0, 3.0, 1.0], [1.0, 0.0, 4.0]];
        let mut f = ForrestTomlinFactorization::new(3, FactorizationConfig::default());
        f.set_basis(baseline.as_slice().unwrap()).unwrap();

        let first = EtaMatrix::new(1, &[0.5, 2.0, -1.0], 1e-10).unwrap();
        let second = EtaMatrix::new(2, &[1.0, 0.0, 3.0], 1e-10).unwrap();
        f.push_eta_matrix(1, first.column()).unwrap();
        f.push_eta_matrix(2, second.column()).unwrap();
        assert_eq!(f.eta_chain_len(), 2);

        let explicit = |eta: &EtaMatrix| {
            let mut e = Array2::eye(3);
            eta.multiply_basis(&mut e);
            e
        };
        let expected = baseline.dot(&explicit(&first)).dot(&explicit(&second));

        f.make_explicit_basis_available().unwrap();
        let basis = Array2::from_shape_vec((3, 3), f.basis().unwrap().to_vec()).unwrap();
        for (a, b) in basis.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12, "{} != {}", basis, expected);
        }

        let mut inverse = vec![0.0; 9];
        f.invert_basis(&mut inverse).unwrap();
        let inverse = Array2::from_shape_vec((3, 3), inverse).unwrap();
        let identity = Array2::<f64>::eye(3);
        for (a, b) in expected.dot(&inverse).iter().zip(identity.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_disabled_mode_keeps_explicit_basis_current() {
        let mut f = ForrestTomlinFactorization::new(2, FactorizationConfig::default());
        f.toggle_factorization(false);
        f.push_eta_matrix(1, &[1.0, 3.0]).unwrap();
        assert!(f.explicit_basis_available());
        assert_eq!(f.basis().unwrap(), &[1.0, 1.0, 0.0, 3.0]);

        let mut x = [0.0; 2];
        f.forward_transformation(&[4.0, 6.0], &mut x).unwrap();
        assert_eq!(x, [2.0, 2.0]);
    }

    #[test]
    fn test_failed_refactorization_undoes_push() {
        let config = FactorizationConfig::default()
            .with_refactorization_threshold(2)
            .with_pivot_tolerance(1e-3);
        let mut f = ForrestTomlinFactorization::new(2, config);
        // B_1 = [[1, 0], [10, 1]].
        f.push_eta_matrix(0, &[1.0, 10.0]).unwrap();
        // The eta pivot 2e-3 passes, but B_2 = [[1, 0], [10, 2e-3]] has a
        // second LU pivot of 2e-4, which only the refactorization notices.
        let before = f.etas().to_vec();
        let result = f.push_eta_matrix(1, &[0.0, 2e-3]);
        assert_eq!(result, Err(FactorizationError::Singular { column: 1 }));
        assert!(!f.explicit_basis_available());
        assert_eq!(f.etas(), before.as_slice());
    }
}
