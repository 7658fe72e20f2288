// Copyright 2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types shared by every container in the crate.

use thiserror::Error;

/// Result type alias using our [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Contract violations reported by the containers.
///
/// Every failing operation leaves the container unchanged. A duplicate key is
/// not an error: [`TreeMap::insert`](crate::TreeMap::insert) reports it through
/// its boolean return instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A bounds-checked map lookup found no equivalent key.
    #[error("key not found")]
    KeyNotFound,

    /// A cursor from another container instance was used, a cursor was moved
    /// past its valid range, or the end position was dereferenced or erased.
    #[error("invalid iterator")]
    InvalidIterator,

    /// An array index was out of range.
    #[error("index out of bound")]
    IndexOutOfBound,

    /// `top`, `pop`, `front` or `back` was called on an empty container.
    #[error("container is empty")]
    EmptyContainer,
}
