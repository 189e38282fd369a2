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

//! Explicit basis, refactorized after every update.
//!
//! Every eta update is multiplied into the explicit basis right away and the
//! basis is decomposed again. Updates cost `O(m³)` instead of `O(m)`, but
//! solves never pay for an eta chain and the explicit basis is always
//! available.

use crate::{
    error::FactorizationError,
    eta::EtaMatrix,
    factorization::{
        check_len, downcast_mut, downcast_ref, BasisFactorization, FactorizationConfig,
        FactorizationKind,
    },
    lu::{square_view, LuFactors},
};
use ndarray::{Array2, ArrayView2};
use std::any::Any;

#[derive(Debug, Clone)]
pub struct DenseLuFactorization {
    dimension: usize,
    config: FactorizationConfig,
    basis: Array2<f64>,
    lu: LuFactors,
    enabled: bool,
}

impl DenseLuFactorization {
    /// Creates a factorization of the `m × m` identity basis.
    pub fn new(m: usize, config: FactorizationConfig) -> Self {
        Self {
            dimension: m,
            config,
            basis: Array2::eye(m),
            lu: LuFactors::identity(m),
            enabled: true,
        }
    }

    fn solver(&self) -> Result<std::borrow::Cow<'_, LuFactors>, FactorizationError> {
        if self.enabled {
            Ok(std::borrow::Cow::Borrowed(&self.lu))
        } else {
            LuFactors::factorize(self.basis.view(), self.config.pivot_tolerance)
                .map(std::borrow::Cow::Owned)
        }
    }

    fn replace_basis(&mut self, basis: ArrayView2<'_, f64>) -> Result<(), FactorizationError> {
        self.lu = LuFactors::factorize(basis, self.config.pivot_tolerance)?;
        self.basis = basis.to_owned();
        Ok(())
    }
}

impl BasisFactorization for DenseLuFactorization {
    #[inline]
    fn kind(&self) -> FactorizationKind {
        FactorizationKind::DenseLu
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn set_basis(&mut self, basis: &[f64]) -> Result<(), FactorizationError> {
        let basis = square_view(basis, self.dimension)?;
        self.replace_basis(basis)
    }

    fn push_eta_matrix(
        &mut self,
        column_index: usize,
        column: &[f64],
    ) -> Result<(), FactorizationError> {
        check_len(self.dimension, column.len())?;
        let eta = EtaMatrix::new(column_index, column, self.config.pivot_tolerance)?;

        let mut updated = self.basis.clone();
        eta.multiply_basis(&mut updated);
        self.replace_basis(updated.view())
    }

    fn forward_transformation(&self, y: &[f64], x: &mut [f64]) -> Result<(), FactorizationError> {
        check_len(self.dimension, y.len())?;
        check_len(self.dimension, x.len())?;
        x.copy_from_slice(y);
        self.solver()?.solve_in_place(x);
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
        self.solver()?.solve_transposed_in_place(x);
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

    #[inline]
    fn toggle_factorization(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline]
    fn explicit_basis_available(&self) -> bool {
        true
    }

    #[inline]
    fn make_explicit_basis_available(&mut self) -> Result<(), FactorizationError> {
        Ok(())
    }

    #[inline]
    fn basis(&self) -> Option<&[f64]> {
        self.basis.as_slice()
    }

    fn invert_basis(&self, result: &mut [f64]) -> Result<(), FactorizationError> {
        check_len(self.dimension * self.dimension, result.len())?;
        let inverse = self.solver()?.invert();
        result
            .iter_mut()
            .zip(inverse.iter())
            .for_each(|(r, v)| *r = *v);
        Ok(())
    }

    #[inline]
    fn eta_chain_len(&self) -> usize {
        0
    }

    #[inline]
    fn refactorize(&mut self) -> Result<(), FactorizationError> {
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
