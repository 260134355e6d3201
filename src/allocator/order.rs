//! Size classes - power-of-two buckets from 8 bytes to 32 MiB

use super::error::OrderError;

/// Number of size classes (orders 0..=22).
pub const NUM_ORDERS: usize = 23;

/// Smallest class size. Requests below it are rounded up.
pub const MIN_POSSIBLE_ALLOCATION: u32 = 8;

/// Largest single allocation, 2^25 bytes.
pub const MAX_POSSIBLE_ALLOCATION: u32 = 1 << 25;

/// Index of a power-of-two size class: class size = `8 << order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Order(u32);

impl Order {
    /// Smallest order whose class size fits `size`.
    pub fn from_size(size: u32) -> Result<Self, OrderError> {
        if size > MAX_POSSIBLE_ALLOCATION {
            return Err(OrderError::TooLarge(size));
        }

        let class_size = size.max(MIN_POSSIBLE_ALLOCATION).next_power_of_two();
        Ok(Self(class_size.trailing_zeros() - MIN_POSSIBLE_ALLOCATION.trailing_zeros()))
    }

    /// Validate an order decoded from memory.
    pub fn from_raw(raw: u32) -> Result<Self, OrderError> {
        if (raw as usize) < NUM_ORDERS {
            Ok(Self(raw))
        } else {
            Err(OrderError::Invalid(raw))
        }
    }

    /// Class size in bytes.
    #[inline]
    pub const fn size(self) -> u32 {
        MIN_POSSIBLE_ALLOCATION << self.0
    }

    #[inline]
    pub const fn into_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }

    /// All orders, smallest first.
    pub fn all() -> impl Iterator<Item = Order> {
        (0..NUM_ORDERS as u32).map(Order)
    }
}
