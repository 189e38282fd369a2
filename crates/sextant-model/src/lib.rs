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

//! # Sextant Model
//!
//! The problem representation consumed by every solver component.
//!
//! A query is a set of real-valued variables with lower/upper bounds, linear
//! equations `Σ aᵢ·xᵢ = c` over them, and ReLU constraints `f = max(0, b)`.
//! Verification problems for piecewise-linear networks encode each neuron as
//! one equation (the weighted sum) and one ReLU (the activation); the
//! property to check becomes bounds on input and output variables.
//!
//! ## Modules
//!
//! - `index`: typed indices for variables, equations and ReLU constraints.
//! - `equation`: linear equations with small inline addend storage.
//! - `relu`: the ReLU constraint.
//! - `tightening`: single bound tightenings and case splits (sets of them).
//! - `query`: `InputQuery` and its `QueryBuilder`.
//! - `loading`: a whitespace-token query file loader.

pub mod equation;
pub mod index;
pub mod loading;
pub mod query;
pub mod relu;
pub mod tightening;
