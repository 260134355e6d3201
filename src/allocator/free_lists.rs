//! Free-list heads, one per order
//!
//! Only the head of each list lives here; the rest of a list is threaded
//! through the `Free` headers in linear memory.

use super::header::Link;
use super::order::{Order, NUM_ORDERS};

#[derive(Debug, Clone)]
pub struct FreeLists {
    heads: [Link; NUM_ORDERS],
}

impl FreeLists {
    pub fn new() -> Self {
        Self {
            heads: [Link::Nil; NUM_ORDERS],
        }
    }

    /// Current head of the list for `order`.
    #[inline]
    pub fn head(&self, order: Order) -> Link {
        self.heads[order.index()]
    }

    /// Install `new` as the head for `order` and return the previous head.
    #[inline]
    pub fn replace(&mut self, order: Order, new: Link) -> Link {
        std::mem::replace(&mut self.heads[order.index()], new)
    }

    /// Whether every list is empty.
    pub fn is_empty(&self) -> bool {
        self.heads.iter().all(|link| *link == Link::Nil)
    }
}

impl Default for FreeLists {
    fn default() -> Self {
        Self::new()
    }
}
