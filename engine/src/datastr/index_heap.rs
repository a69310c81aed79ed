//! A priority queue implemented with a 4-ary heap.
//!
//! Insertion and popping the minimal element have `O(log n)` time complexity.
//! Checking the minimal element is `O(1)`. Keys of elements in the heap can
//! also be increased or decreased.
//!
//! # Examples
//!
//! ```
//! use road_hierarchies::datastr::index_heap::{IndexdMinHeap, Indexing};
//!
//! #[derive(Copy, Clone, Eq, PartialEq, Debug, Ord, PartialOrd)]
//! pub struct State {
//!     pub distance: usize,
//!     pub node: usize,
//! }
//!
//! // The `Indexing` traits needs to be implemented as well, so we can find elements to decrease their key.
//! impl Indexing for State {
//!     fn as_index(&self) -> usize {
//!         self.node as usize
//!     }
//! }
//!
//! let mut heap = IndexdMinHeap::new(3);
//! heap.push(State { node: 0, distance: 42 });
//! heap.push(State { node: 1, distance: 23 });
//! heap.push(State { node: 2, distance: 50000 });
//! assert_eq!(heap.peek().cloned(), Some(State { node: 1, distance: 23 }));
//! assert!(heap.decrease_key(State { node: 0, distance: 1 }));
//! assert!(!heap.decrease_key(State { node: 2, distance: 60000 }));
//! assert_eq!(heap.pop(), Some(State { node: 0, distance: 1 }));
//! ```

use std::{cmp::min, ptr};

/// A trait to map elements in a heap to a unique index.
/// The element type of the `IndexdMinHeap` has to implement this trait.
pub trait Indexing {
    /// This method has to map a heap element to a unique `usize` index.
    fn as_index(&self) -> usize;
}

/// Heap element consisting of a key and an id, ordered by key first.
/// This is what the hierarchies put into their queues.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Ord, PartialOrd)]
pub struct State<K> {
    pub key: K,
    pub id: u32,
}

impl<K> Indexing for State<K> {
    #[inline]
    fn as_index(&self) -> usize {
        self.id as usize
    }
}

/// A priority queue where the elements are IDs from 0 to id_count-1 where id_count is a number that is set in the constructor.
/// The elements are sorted ascending by the ordering defined by the `Ord` trait.
/// The interface mirrors the standard library BinaryHeap (except for the reversed order).
/// In addition, `increase_key` and `decrease_key` methods are available.
#[derive(Debug, Clone)]
pub struct IndexdMinHeap<T> {
    positions: Vec<usize>,
    data: Vec<T>,
}

const TREE_ARITY: usize = 4;
const INVALID_POSITION: usize = usize::MAX;

impl<T: Ord + Indexing> IndexdMinHeap<T> {
    /// Creates an empty `IndexdMinHeap` as a min-heap.
    /// The indices (as defined by the `Indexing` trait) of all inserted elements
    /// will have to be in `[0, max_id)`
    pub fn new(max_id: usize) -> IndexdMinHeap<T> {
        IndexdMinHeap {
            positions: vec![INVALID_POSITION; max_id],
            data: Vec::new(),
        }
    }

    /// Number of ids this heap was created for.
    pub fn id_count(&self) -> usize {
        self.positions.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if the heap already contains an element mapped to the given index
    pub fn contains_index(&self, id: usize) -> bool {
        self.positions[id] != INVALID_POSITION
    }

    /// Drops all items from the heap.
    pub fn clear(&mut self) {
        for element in &self.data {
            self.positions[element.as_index()] = INVALID_POSITION;
        }
        self.data.clear();
    }

    /// Returns a reference to the smallest item in the heap, or None if it is empty.
    pub fn peek(&self) -> Option<&T> {
        self.data.first()
    }

    /// Removes the smallest item from the heap and returns it, or None if it is empty.
    pub fn pop(&mut self) -> Option<T> {
        self.data.pop().map(|mut item| {
            self.positions[item.as_index()] = INVALID_POSITION;
            if !self.is_empty() {
                std::mem::swap(&mut item, &mut self.data[0]);
                self.positions[item.as_index()] = INVALID_POSITION;
                self.move_down_in_tree(0);
            }
            item
        })
    }

    /// Pushes an item onto the heap if its not yet in the queue.
    pub fn push_unless_contained(&mut self, element: T) {
        if !self.contains_index(element.as_index()) {
            self.push(element)
        }
    }

    /// Pushes an item onto the heap.
    /// Panics if an element with the same index already exists.
    pub fn push(&mut self, element: T) {
        assert!(!self.contains_index(element.as_index()));
        let insert_position = self.len();
        self.positions[element.as_index()] = insert_position;
        self.data.push(element);
        self.move_up_in_tree(insert_position);
    }

    /// Replaces the element with the same index if the new one is smaller.
    /// Returns whether anything changed.
    pub fn decrease_key(&mut self, element: T) -> bool {
        let position = self.positions[element.as_index()];
        if element >= self.data[position] {
            return false;
        }
        self.data[position] = element;
        self.move_up_in_tree(position);
        true
    }

    /// Replaces the element with the same index if the new one is larger.
    /// Returns whether anything changed.
    pub fn increase_key(&mut self, element: T) -> bool {
        let position = self.positions[element.as_index()];
        if element <= self.data[position] {
            return false;
        }
        self.data[position] = element;
        self.move_down_in_tree(position);
        true
    }

    fn move_up_in_tree(&mut self, position: usize) {
        unsafe {
            let mut hole = Hole::new(&mut self.data, position);

            while hole.pos > 0 {
                let parent = (hole.pos - 1) / TREE_ARITY;

                if hole.get(parent) <= hole.element() {
                    break;
                }

                *self.positions.get_unchecked_mut(hole.get(parent).as_index()) = hole.pos;
                hole.move_to(parent);
            }

            *self.positions.get_unchecked_mut(hole.element().as_index()) = hole.pos;
        }
    }

    fn move_down_in_tree(&mut self, position: usize) {
        unsafe {
            let heap_size = self.len();
            let mut hole = Hole::new(&mut self.data, position);

            while let Some(smallest_child) = Self::children_index_range(hole.pos, heap_size).min_by_key(|&child_index| hole.get(child_index)) {
                if hole.get(smallest_child) >= hole.element() {
                    break; // no child is smaller
                }

                *self.positions.get_unchecked_mut(hole.get(smallest_child).as_index()) = hole.pos;
                hole.move_to(smallest_child);
            }

            *self.positions.get_unchecked_mut(hole.element().as_index()) = hole.pos;
        }
    }

    fn children_index_range(parent_index: usize, heap_size: usize) -> std::ops::Range<usize> {
        let first_child = TREE_ARITY * parent_index + 1;
        let last_child = min(TREE_ARITY * parent_index + TREE_ARITY + 1, heap_size);
        first_child..last_child
    }
}

// Taken from the binary heap of the standard library:
// move each element only once instead of swapping pairwise.

/// Hole represents a hole in a slice i.e. an index without valid value
/// (because it was moved from or duplicated).
/// In drop, `Hole` will restore the slice by filling the hole
/// position with the value that was originally removed.
struct Hole<'a, T: 'a> {
    data: &'a mut [T],
    /// `elt` is always `Some` from new until drop.
    elt: Option<T>,
    pos: usize,
}

impl<'a, T> Hole<'a, T> {
    /// Unsafe because pos must be within the data slice.
    #[inline]
    unsafe fn new(data: &'a mut [T], pos: usize) -> Self {
        debug_assert!(pos < data.len());
        let elt = ptr::read(data.get_unchecked(pos));
        Hole { data, elt: Some(elt), pos }
    }

    #[inline]
    fn element(&self) -> &T {
        match &self.elt {
            Some(elt) => elt,
            None => unreachable!("hole element is only taken on drop"),
        }
    }

    /// Unsafe because index must be within the data slice and not equal to pos.
    #[inline]
    unsafe fn get(&self, index: usize) -> &T {
        debug_assert!(index != self.pos);
        debug_assert!(index < self.data.len());
        self.data.get_unchecked(index)
    }

    /// Unsafe because index must be within the data slice and not equal to pos.
    #[inline]
    unsafe fn move_to(&mut self, index: usize) {
        debug_assert!(index != self.pos);
        debug_assert!(index < self.data.len());
        let index_ptr: *const _ = self.data.get_unchecked(index);
        let hole_ptr = self.data.get_unchecked_mut(self.pos);
        ptr::copy_nonoverlapping(index_ptr, hole_ptr, 1);
        self.pos = index;
    }
}

impl<'a, T> Drop for Hole<'a, T> {
    #[inline]
    fn drop(&mut self) {
        // fill the hole again
        if let Some(elt) = self.elt.take() {
            unsafe {
                ptr::write(self.data.get_unchecked_mut(self.pos), elt);
            }
        }
    }
}
