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

//! # Basis Factorization Contract
//!
//! `BasisFactorization` is the capability the pivoting logic needs from a
//! factorization. It is object safe: engines hold a
//! `Box<dyn BasisFactorization>` chosen once at construction through
//! `FactorizationKind` and `create_factorization`.
//!
//! ## Explicit versus factorized basis
//!
//! A factorization always knows how to solve with the current basis, but it
//! does not necessarily hold the basis matrix itself. After an eta update only
//! the factorized form is current. `make_explicit_basis_available` multiplies
//! the update chain out; `basis()` and `invert_basis` only work afterwards.
//!
//! ## Disabled factorization
//!
//! With `toggle_factorization(false)` the transformations solve directly
//! against the explicit basis (a fresh elimination per call). This is slow and
//! exists to cross-check the factorized path.

use crate::{
    dense::DenseLuFactorization, error::FactorizationError,
    forrest_tomlin::ForrestTomlinFactorization,
};
use sextant_core::float::DEFAULT_PIVOT_TOLERANCE;
use std::any::Any;

/// Default length of the eta chain that triggers a refactorization.
pub const DEFAULT_REFACTORIZATION_THRESHOLD: usize = 100;

/// Numeric settings shared by all factorization kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorizationConfig {
    /// Pivots of smaller magnitude are treated as zero.
    pub pivot_tolerance: f64,
    /// Eta chain length at which the basis is multiplied out and refactorized.
    pub refactorization_threshold: usize,
}

impl Default for FactorizationConfig {
    fn default() -> Self {
        Self {
            pivot_tolerance: DEFAULT_PIVOT_TOLERANCE,
            refactorization_threshold: DEFAULT_REFACTORIZATION_THRESHOLD,
        }
    }
}

impl FactorizationConfig {
    #[inline]
    pub fn with_pivot_tolerance(mut self, pivot_tolerance: f64) -> Self {
        self.pivot_tolerance = pivot_tolerance;
        self
    }

    /// Sets the refactorization threshold. A threshold of `0` is treated as `1`.
    #[inline]
    pub fn with_refactorization_threshold(mut self, threshold: usize) -> Self {
        self.refactorization_threshold = threshold.max(1);
        self
    }
}

/// The available factorization algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FactorizationKind {
    /// LU baseline with an eta file and periodic refactorization.
    #[default]
    ForrestTomlin,
    /// Explicit basis, refactorized after every update.
    DenseLu,
}

impl std::fmt::Display for FactorizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactorizationKind::ForrestTomlin => write!(f, "forrest-tomlin"),
            FactorizationKind::DenseLu => write!(f, "dense-lu"),
        }
    }
}

/// Error returned when parsing an unknown factorization kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown factorization kind '{0}', expected 'forrest-tomlin' or 'dense-lu'")]
pub struct ParseFactorizationKindError(pub String);

impl std::str::FromStr for FactorizationKind {
    type Err = ParseFactorizationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forrest-tomlin" | "forresttomlin" | "ft" => Ok(FactorizationKind::ForrestTomlin),
            "dense-lu" | "denselu" | "lu" => Ok(FactorizationKind::DenseLu),
            _ => Err(ParseFactorizationKindError(s.to_owned())),
        }
    }
}

/// Solves linear systems with the current basis matrix `B`.
///
/// All matrices are row-major `m × m` slices, all vectors length `m`.
pub trait BasisFactorization: Send + std::fmt::Debug {
    fn kind(&self) -> FactorizationKind;

    /// The dimension `m` of the basis.
    fn dimension(&self) -> usize;

    /// Replaces the basis by the explicit matrix `basis` and clears the eta
    /// chain. On error the previous state is kept.
    fn set_basis(&mut self, basis: &[f64]) -> Result<(), FactorizationError>;

    /// Records the update `B ← B·E`, where `E` is the identity with column
    /// `column_index` replaced by `column`.
    fn push_eta_matrix(
        &mut self,
        column_index: usize,
        column: &[f64],
    ) -> Result<(), FactorizationError>;

    /// Finds `x` with `B·x = y`.
    fn forward_transformation(&self, y: &[f64], x: &mut [f64]) -> Result<(), FactorizationError>;

    /// Finds `x` with `x·B = y`.
    fn backward_transformation(&self, y: &[f64], x: &mut [f64])
        -> Result<(), FactorizationError>;

    /// Deep-copies this factorization into `target`, which must be of the same
    /// kind and dimension.
    fn store_factorization(
        &self,
        target: &mut dyn BasisFactorization,
    ) -> Result<(), FactorizationError>;

    /// Replaces this factorization by a deep copy of `source`, which must be of
    /// the same kind and dimension.
    fn restore_factorization(
        &mut self,
        source: &dyn BasisFactorization,
    ) -> Result<(), FactorizationError>;

    fn factorization_enabled(&self) -> bool;

    fn toggle_factorization(&mut self, enabled: bool);

    fn explicit_basis_available(&self) -> bool;

    /// Multiplies the eta chain out so that `basis()` becomes available.
    fn make_explicit_basis_available(&mut self) -> Result<(), FactorizationError>;

    /// The explicit basis, when available.
    fn basis(&self) -> Option<&[f64]>;

    /// Writes `B⁻¹` into `result`. Fails with `NotExplicit` unless the explicit
    /// basis is available.
    fn invert_basis(&self, result: &mut [f64]) -> Result<(), FactorizationError>;

    /// Number of eta matrices applied on top of the LU baseline.
    fn eta_chain_len(&self) -> usize;

    /// Multiplies out and refactorizes the current basis now, emptying the
    /// eta chain. On `Singular` the state is unchanged.
    fn refactorize(&mut self) -> Result<(), FactorizationError>;

    fn boxed_clone(&self) -> Box<dyn BasisFactorization>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn BasisFactorization> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Creates a factorization of kind `kind` for an `m × m` identity basis.
pub fn create_factorization(
    kind: FactorizationKind,
    m: usize,
    config: FactorizationConfig,
) -> Box<dyn BasisFactorization> {
    match kind {
        FactorizationKind::ForrestTomlin => Box::new(ForrestTomlinFactorization::new(m, config)),
        FactorizationKind::DenseLu => Box::new(DenseLuFactorization::new(m, config)),
    }
}

/// Checks that `len` is `expected`.
#[inline]
pub(crate) fn check_len(expected: usize, len: usize) -> Result<(), FactorizationError> {
    if expected == len {
        Ok(())
    } else {
        Err(FactorizationError::DimensionMismatch {
            expected,
            found: len,
        })
    }
}

/// Downcasts `other` to `T`, or reports the kinds involved.
pub(crate) fn downcast_ref<'a, T: 'static>(
    expected: FactorizationKind,
    other: &'a dyn BasisFactorization,
) -> Result<&'a T, FactorizationError> {
    let found = other.kind();
    other
        .as_any()
        .downcast_ref::<T>()
        .ok_or(FactorizationError::KindMismatch { expected, found })
}

pub(crate) fn downcast_mut<'a, T: 'static>(
    expected: FactorizationKind,
    other: &'a mut dyn BasisFactorization,
) -> Result<&'a mut T, FactorizationError> {
    let found = other.kind();
    other
        .as_any_mut()
        .downcast_mut::<T>()
        .ok_or(FactorizationError::KindMismatch { expected, found })
}
