//! Doubly linked list over an arena, used as O(1) storage for unranked members.

use std::collections::TryReserveError;

use crate::raw::{Arena, Handle};

#[derive(Clone, Debug)]
struct ListNode<T> {
    value: T,
    prev: Option<Handle>,
    next: Option<Handle>,
}

/// A doubly linked list whose front is the most recently pushed value and
/// whose back is the oldest.
///
/// Handles returned by [`push_front`](Self::push_front) stay valid until the
/// value is removed or the list is cleared.
#[derive(Clone, Debug)]
pub struct FastPathList<T> {
    nodes: Arena<ListNode<T>>,
    head: Option<Handle>,
    tail: Option<Handle>,
}

impl<T> Default for FastPathList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FastPathList<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            head: None,
            tail: None,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Most recently pushed value.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.head.map(|h| &self.nodes.get(h).value)
    }

    /// Oldest value.
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.tail.map(|h| &self.nodes.get(h).value)
    }

    /// # Panics
    ///
    /// Panics if `handle` is not live in this list.
    #[must_use]
    pub fn get(&self, handle: Handle) -> &T {
        &self.nodes.get(handle).value
    }

    /// # Panics
    ///
    /// Panics if `handle` is not live in this list.
    pub fn get_mut(&mut self, handle: Handle) -> &mut T {
        &mut self.nodes.get_mut(handle).value
    }

    /// Makes room for `additional` more values.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if the memory cannot be reserved.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.nodes.try_reserve(additional)
    }

    pub fn push_front(&mut self, value: T) -> Handle {
        let handle = self.nodes.alloc(ListNode {
            value,
            prev: None,
            next: self.head,
        });
        match self.head {
            Some(old) => self.nodes.get_mut(old).prev = Some(handle),
            None => self.tail = Some(handle),
        }
        self.head = Some(handle);
        handle
    }

    /// Links `value` in just ahead of `older`, or at the back when `older` is
    /// `None`. Restores a value removed from between two others.
    ///
    /// # Panics
    ///
    /// Panics if `older` is not live in this list.
    pub fn insert_ahead_of(&mut self, older: Option<Handle>, value: T) -> Handle {
        let prev = older.map_or(self.tail, |o| self.nodes.get(o).prev);
        let handle = self.nodes.alloc(ListNode { value, prev, next: older });
        match prev {
            Some(p) => self.nodes.get_mut(p).next = Some(handle),
            None => self.head = Some(handle),
        }
        match older {
            Some(o) => self.nodes.get_mut(o).prev = Some(handle),
            None => self.tail = Some(handle),
        }
        handle
    }

    /// Handle of the value pushed just before the one at `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is not live in this list.
    #[must_use]
    pub fn older(&self, handle: Handle) -> Option<Handle> {
        self.nodes.get(handle).next
    }

    /// Unlinks and returns the value at `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is not live in this list.
    pub fn remove(&mut self, handle: Handle) -> T {
        let ListNode { value, prev, next } = self.nodes.take(handle);
        match prev {
            Some(p) => self.nodes.get_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes.get_mut(n).prev = prev,
            None => self.tail = prev,
        }
        value
    }

    /// Moves every value of `other` behind this list's back, oldest last,
    /// leaving `other` empty. `on_move` observes each value with its new handle.
    ///
    /// # Errors
    ///
    /// Fails before moving anything if room for `other` cannot be reserved.
    pub fn append(&mut self, other: &mut Self, mut on_move: impl FnMut(&T, Handle)) -> Result<(), TryReserveError> {
        self.try_reserve(other.len())?;
        let mut current = other.head;
        while let Some(h) = current {
            let ListNode { value, next, .. } = other.nodes.take(h);
            current = next;
            let handle = self.nodes.alloc(ListNode {
                value,
                prev: self.tail,
                next: None,
            });
            match self.tail {
                Some(old) => self.nodes.get_mut(old).next = Some(handle),
                None => self.head = Some(handle),
            }
            self.tail = Some(handle);
            on_move(&self.nodes.get(handle).value, handle);
        }
        other.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Values from front (newest) to back (oldest).
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            current: self.head,
        }
    }
}

pub struct Iter<'a, T> {
    list: &'a FastPathList<T>,
    current: Option<Handle>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.list.nodes.get(self.current?);
        self.current = node.next;
        Some(&node.value)
    }
}

impl<'a, T> IntoIterator for &'a FastPathList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
