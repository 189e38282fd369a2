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

//! # Sextant Bounds
//!
//! The variable bound store of the solver: per-variable lower and upper bounds
//! that only ever tighten during search and are widened again exclusively by
//! backtracking.
//!
//! ## Motivation
//!
//! Branch-and-bound over ReLU phases repeatedly narrows variable intervals,
//! discovers a conflict, and has to restore the state of an earlier node. Copying
//! every bound per node costs O(n) per step; an undo trail costs time
//! proportional to the number of mutations actually made since the node was
//! entered.
//!
//! ## Highlights
//!
//! - `store`: the `BoundStore` with monotone tightenings, conflict detection,
//!   checkpoints and deep snapshots.
//! - `trail`: the undo log with one frame per checkpoint.
//! - `observer`: the optional, non-owning `BoundObserver` notified about every
//!   accepted tightening.
//! - `error`: `BoundError`.

pub mod error;
pub mod observer;
pub mod store;
pub mod trail;
