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

//! Notification capability for accepted bound tightenings.
//!
//! An observer is typically the component that caches values derived from
//! bounds (a tableau, a set of dirty rows) and must learn about each change.
//! The store holds it through a `Weak` reference: it never keeps the observer
//! alive, and a dropped observer silently stops receiving notifications.

use sextant_model::index::VariableIndex;

/// Receives one callback per accepted tightening.
///
/// Callbacks take `&self`; implementations that record state use interior
/// mutability. They are never invoked for rejected tightenings, nor for
/// tightenings that turned out infeasible.
pub trait BoundObserver: Send + Sync {
    fn on_lower_tightened(&self, variable: VariableIndex, value: f64);

    fn on_upper_tightened(&self, variable: VariableIndex, value: f64);
}
