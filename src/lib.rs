// Copyright 2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Arena-backed containers with cursor-based iteration
//!
//! `arena-collections` provides three single-threaded containers with an
//! explicit, checked error contract:
//!
//! * [`TreeMap`] — an ordered unique-key map backed by a red-black tree whose
//!   nodes live in an index-addressed arena. Lookup, insertion and erasure are
//!   O(log n); iteration is in key order under a caller-supplied comparator.
//! * [`PriorityQueue`] — a mergeable max-heap (leftist tree) with O(log n)
//!   push, pop and whole-queue merge.
//! * [`Vector`] — a growable array with an explicitly tracked doubling
//!   capacity and bounds-checked access.
//!
//! Ordering for the map and the queue is pluggable through the
//! [`compare`](compare) crate; by default keys order by their natural `Ord`.
//!
//! Besides ordinary Rust iterators, the map and the vector expose [`Cursor`]s:
//! detached, copyable positions validated at use. Using a cursor with a
//! container it does not belong to, moving it past its valid range, or
//! dereferencing the end position reports [`Error::InvalidIterator`] instead
//! of corrupting the structure.

use std::sync::atomic::{AtomicU64, Ordering};

mod error;
pub mod map;
pub mod priority_queue;
pub mod vector;

pub use error::{Error, Result};
pub use map::{Cursor, TreeMap};
pub use priority_queue::PriorityQueue;
pub use vector::Vector;

/// Mints a process-unique tag for a container instance. Cursors carry the tag
/// of the container that created them, which is how foreign cursors are
/// rejected. Clones get a fresh tag.
pub(crate) fn next_container_tag() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
