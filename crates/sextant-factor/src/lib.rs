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

//! # Sextant Factor
//!
//! Basis factorizations: the linear-algebra primitive behind every pivot.
//! Given the current `m × m` basis matrix `B`, a factorization answers
//! `B·x = y` (forward transformation) and `x·B = y` (backward transformation)
//! without ever forming `B⁻¹`.
//!
//! ## Motivation
//!
//! A pivot step replaces one column of the basis. Recomputing an LU
//! decomposition after every pivot costs `O(m³)`; recording the change as an
//! eta matrix costs `O(m)` and keeps each solve at `O(m² + k·m)` for a chain of
//! `k` updates. Once the chain grows past a threshold the basis is multiplied
//! out and factorized afresh.
//!
//! ## Highlights
//!
//! - `factorization`: the object-safe `BasisFactorization` trait, the
//!   `FactorizationKind` selector and `FactorizationConfig`.
//! - `forrest_tomlin`: LU baseline plus eta file, with a refactorization policy.
//! - `dense`: refactors the explicit basis after every update; the simple,
//!   robust reference variant.
//! - `lu`: dense LU decomposition with partial pivoting.
//! - `eta`: eta matrices and their solves.
//!
//! ## Conventions
//!
//! The trait exchanges matrices as dense, row-major slices of length `m * m`;
//! internally they are stored as `ndarray::Array2<f64>`. With the
//! product-form convention used here, after `k` updates
//! `B_k = B_0 · E_1 · … · E_k`, where `E_j` is the identity matrix with one
//! column replaced.

pub mod dense;
pub mod error;
pub mod eta;
pub mod factorization;
pub mod forrest_tomlin;
pub mod lu;
