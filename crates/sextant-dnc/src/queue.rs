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

//! The work queue shared by all workers.
//!
//! A plain `Mutex<VecDeque<_>>`. Workers hold the lock only for a single push
//! or pop, never while solving, so contention stays negligible next to the
//! cost of a search. No ordering is promised to callers.

use crate::subquery::SubQuery;
use std::{
    collections::{TryReserveError, VecDeque},
    sync::{Mutex, MutexGuard},
};

#[derive(Debug, Default)]
pub struct WorkQueue {
    queue: Mutex<VecDeque<SubQuery>>,
}

impl WorkQueue {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue with room for `capacity` subqueries, or fails if the
    /// allocation cannot be made.
    pub fn try_with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut queue = VecDeque::new();
        queue.try_reserve(capacity)?;
        Ok(Self {
            queue: Mutex::new(queue),
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<SubQuery>> {
        // A panicking worker cannot leave the deque itself inconsistent, so a
        // poisoned lock is still safe to use.
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[inline]
    pub fn push(&self, query: SubQuery) {
        self.lock().push_back(query);
    }

    pub fn extend<I>(&self, queries: I)
    where
        I: IntoIterator<Item = SubQuery>,
    {
        self.lock().extend(queries);
    }

    /// Takes any subquery, or `None` if the queue is empty right now.
    #[inline]
    pub fn pop(&self) -> Option<SubQuery> {
        self.lock().pop_front()
    }

    /// A snapshot of the queue length. Other workers may change it before
    /// the caller acts on the value.
    #[inline]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
