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

//! # Sextant Engine
//!
//! Everything a single search thread needs to decide one (sub-)query.
//!
//! ## Motivation
//!
//! The divide-and-conquer orchestrator treats engines as black boxes: it hands
//! an engine a region of the input space and a time budget, and gets back an
//! exit code. This crate defines that contract (`SearchEngine`) and ships a
//! complete implementation of it (`ReferenceEngine`), together with the
//! building blocks the implementation is made of.
//!
//! ## Highlights
//!
//! - `engine`: the `SearchEngine` trait, `ExitCode` and `TreeState`.
//! - `reference`: the bundled engine, a depth-first search over ReLU phases.
//! - `tightener`: bound propagation over equation rows and over rows of the
//!   inverted basis.
//! - `relu`: the ReLU bound propagation rules.
//! - `propagation`: both of the above run together until saturation.
//! - `basis`: the crash basis that picks one basic variable per equation.
//! - `preprocess`: query simplification and the `VariableMap` that undoes it.
//! - `branching`: ReLU selection heuristics.
//! - `monitor`: search monitors (interrupt, time limit, composite).
//! - `config`, `stats`, `error`: the ambient pieces.

pub mod basis;
pub mod branching;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod preprocess;
pub mod propagation;
pub mod reference;
pub mod relu;
pub mod stats;
pub mod tightener;
