//! Runtime context threaded through all table operations.
use std::rc::Rc;

use otable_heap::Host;

use crate::large::LargeTable;
use crate::shape::{DictShape, MapShape, SetShape};

/// The host plus the per-variant canonical empty tables.
///
/// Every table operation takes a `&Runtime`: allocation, hashing and
/// stringification go through the host, and exhausted iterators park on the
/// matching canonical empty root.
pub struct Runtime<H: Host> {
    host: H,
    roots: Roots<H>,
}

impl<H: Host> Runtime<H> {
    /// Wraps a host and materializes the canonical empty roots.
    pub fn new(host: H) -> Self {
        Runtime {
            host,
            roots: Roots::new(),
        }
    }

    /// The wrapped host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The canonical empty tables.
    pub fn roots(&self) -> &Roots<H> {
        &self.roots
    }
}

/// Per-variant canonical empty tables.
///
/// Each is an immutable zero-bucket table shared by every container of the
/// runtime; structural mutation never touches them.
pub struct Roots<H: Host> {
    empty_set: Rc<LargeTable<H, SetShape>>,
    empty_map: Rc<LargeTable<H, MapShape>>,
    empty_dict: Rc<LargeTable<H, DictShape>>,
}

impl<H: Host> Roots<H> {
    fn new() -> Self {
        Roots {
            empty_set: Rc::new(LargeTable::canonical_empty()),
            empty_map: Rc::new(LargeTable::canonical_empty()),
            empty_dict: Rc::new(LargeTable::canonical_empty()),
        }
    }

    /// The canonical empty ordered set table.
    pub fn empty_set(&self) -> &Rc<LargeTable<H, SetShape>> {
        &self.empty_set
    }

    /// The canonical empty ordered map table.
    pub fn empty_map(&self) -> &Rc<LargeTable<H, MapShape>> {
        &self.empty_map
    }

    /// The canonical empty name dictionary table.
    pub fn empty_dict(&self) -> &Rc<LargeTable<H, DictShape>> {
        &self.empty_dict
    }
}
