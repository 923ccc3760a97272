//! Insertion-ordered hash containers for managed runtimes.
//!
//! This crate is the backing store for language-level ordered sets, ordered
//! maps and property dictionaries: associative lookup keyed by arbitrary
//! host values under identity-hash semantics, with deterministic iteration
//! in first-insertion order. Its distinguishing features over an ordinary
//! ordered map are:
//!
//! - a compact backing layout that keeps hash buckets, collision chains and
//!   the ordered data region in one block (see [`large`] and [`small`]);
//! - a two-tier representation (a byte-celled small form bounded at 254
//!   entries and an unbounded large form) with one-way promotion behind the
//!   [`OrderedSet`], [`OrderedMap`] and [`NameDictionary`] facades;
//! - live iterator migration: a [`TableIter`] stays valid across grows,
//!   compactions and clears by following the obsoleted tables' next-table
//!   links and re-mapping its position across removed entries.
//!
//! Deletion tombstones entries in place; space is reclaimed only by rehash,
//! which is what keeps iterator positions computable. All host services
//! (allocation, identity hashes, value equality) come from the
//! [`otable_heap::Host`] threaded in via [`Runtime`].
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod layout;
mod runtime;
mod shape;

pub mod handler;
pub mod iter;
pub mod large;
pub mod small;

mod test_dict;
mod test_handler;
mod test_iter;
mod test_map;
mod test_set;

pub use error::Error;
pub use handler::{NameDictionary, OrderedMap, OrderedSet};
pub use iter::{Keys, TableIter};
pub use large::{KeysConversion, LargeTable};
pub use runtime::{Roots, Runtime};
pub use shape::{DictShape, MapShape, PropertyDetails, SetShape, Shape, NO_HASH_SENTINEL};
pub use small::SmallTable;
