use std::cmp::Ordering;

use super::OrderStatisticsTree;
use crate::aggregate::Aggregate;
use crate::raw::Handle;

impl<T: Ord, A: Aggregate<T>> OrderStatisticsTree<T, A> {
    /// Summary of the single element at `handle`.
    #[must_use]
    pub fn element_summary(&self, handle: Handle) -> A {
        A::of(&self.node(handle).element, self.domain)
    }

    /// Summary of every element whose key is `<=` the key at `target`.
    ///
    /// Walks from the root towards `target`. Each right turn passes a node that
    /// is smaller than `target` together with its whole left subtree; at
    /// `target` its own left subtree is the last part of the prefix.
    ///
    /// # Panics
    ///
    /// Panics if `target` does not refer to a node of this tree.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn prefix_aggregate(&self, target: Handle) -> A {
        let key = &self.node(target).element;
        let mut acc = A::empty(self.domain);
        let mut current = self.root;
        while let Some(h) = current {
            let node = self.node(h);
            match node.element.cmp(key) {
                Ordering::Less => {
                    self.add_node_and_left(h, &mut acc);
                    current = node.right;
                }
                Ordering::Greater => current = node.left,
                Ordering::Equal => {
                    self.add_node_and_left(h, &mut acc);
                    return acc;
                }
            }
        }
        panic!("`OrderStatisticsTree::prefix_aggregate()` - `target` is not reachable from the root!");
    }

    /// Summary of the elements from `low` to `high`, both inclusive.
    ///
    /// `low` must not order after `high`.
    #[must_use]
    pub fn range_aggregate(&self, low: Handle, high: Handle) -> A {
        debug_assert!(self.get(low) <= self.get(high), "`range_aggregate()` - `low` orders after `high`!");
        let mut range = self.prefix_aggregate(high);
        range -= &self.prefix_aggregate(low);
        range += &self.element_summary(low);
        range
    }

    /// The node holding the `k`-th largest element (`k = 1` is the maximum).
    ///
    /// Returns `None` if `k` is zero or larger than the tree.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn kth_from_top(&self, mut k: usize) -> Option<Handle> {
        if k == 0 || k > self.len() {
            return None;
        }
        let mut current = self.root?;
        loop {
            let node = self.node(current);
            let above = node.right.map_or(0, |r| self.node(r).summary.count());
            match k.cmp(&(above + 1)) {
                Ordering::Equal => return Some(current),
                Ordering::Less => current = node.right?,
                Ordering::Greater => {
                    k -= above + 1;
                    current = node.left?;
                }
            }
        }
    }

    /// The largest element satisfying `pred`, where `pred` holds for a prefix
    /// of the ascending order (true, ..., true, false, ..., false).
    pub fn rightmost_where(&self, mut pred: impl FnMut(&T) -> bool) -> Option<Handle> {
        let mut best = None;
        let mut current = self.root;
        while let Some(h) = current {
            let node = self.node(h);
            if pred(&node.element) {
                best = Some(h);
                current = node.right;
            } else {
                current = node.left;
            }
        }
        best
    }

    /// The smallest element satisfying `pred`, where `pred` holds for a suffix
    /// of the ascending order (false, ..., false, true, ..., true).
    pub fn leftmost_where(&self, mut pred: impl FnMut(&T) -> bool) -> Option<Handle> {
        let mut best = None;
        let mut current = self.root;
        while let Some(h) = current {
            let node = self.node(h);
            if pred(&node.element) {
                best = Some(h);
                current = node.left;
            } else {
                current = node.right;
            }
        }
        best
    }

    fn add_node_and_left(&self, handle: Handle, acc: &mut A) {
        let node = self.node(handle);
        *acc += &A::of(&node.element, self.domain);
        if let Some(left) = node.left {
            *acc += &self.node(left).summary;
        }
    }
}
