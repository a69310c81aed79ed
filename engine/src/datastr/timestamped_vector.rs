//! Fast resettable vectors and flag sets based on timestamps.

use std::ops::{Index, IndexMut};

/// A fast resettable vector based on 32bit timestamps.
/// When only few entries are modified, a clearlist based approach may actually be preferable
/// The elements can be modified through the index traits.
/// Other modifications are not permitted.
#[derive(Debug, Clone)]
pub struct TimestampedVector<T> {
    data: Vec<T>,
    // timestamp for current iteration. Up to date values will have this one
    current: u32,
    // current timestamp for each entry.
    timestamps: Vec<u32>,
    default: T,
}

impl<T: Clone> TimestampedVector<T> {
    /// Create a new `TimestampedVector` with `size` elements of the default
    pub fn new(size: usize, default: T) -> TimestampedVector<T> {
        TimestampedVector {
            data: vec![default.clone(); size],
            current: 0,
            timestamps: vec![0; size],
            default,
        }
    }

    /// Reset all elements to the default.
    /// Amortized O(1).
    pub fn reset(&mut self) {
        let (new, overflow) = self.current.overflowing_add(1);
        self.current = new;

        // old timestamps could become current again, so everything gets cleared for real
        if overflow {
            for element in &mut self.data {
                *element = self.default.clone();
            }
            for timestamp in &mut self.timestamps {
                *timestamp = 0;
            }
            self.current = 1;
        }
    }

    /// Update an individual element.
    /// Slightly more efficient than going through `index_mut` because no branching is involved.
    pub fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
        self.timestamps[index] = self.current;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Index<usize> for TimestampedVector<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        // If element is from the current iteration use the element, otherwise the default
        if self.timestamps[index] == self.current {
            &self.data[index]
        } else {
            &self.default
        }
    }
}

impl<T: Clone> IndexMut<usize> for TimestampedVector<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        if self.timestamps[index] != self.current {
            self.set(index, self.default.clone());
        }
        &mut self.data[index]
    }
}

/// A set of flags over a dense id space where unsetting all flags is amortized O(1).
#[derive(Debug, Clone)]
pub struct TimestampFlags {
    current: u16,
    timestamps: Vec<u16>,
}

impl TimestampFlags {
    pub fn new(size: usize) -> TimestampFlags {
        TimestampFlags {
            current: 1,
            timestamps: vec![0; size],
        }
    }

    pub fn is_set(&self, id: usize) -> bool {
        self.timestamps[id] == self.current
    }

    pub fn set(&mut self, id: usize) {
        self.timestamps[id] = self.current;
    }

    pub fn reset_one(&mut self, id: usize) {
        self.timestamps[id] = self.current.wrapping_sub(1);
    }

    pub fn reset_all(&mut self) {
        self.current = self.current.wrapping_add(1);
        if self.current == 0 {
            // wrapped around, stale stamps could match again
            for timestamp in &mut self.timestamps {
                *timestamp = 0;
            }
            self.current = 1;
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
