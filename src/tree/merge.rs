use tracing::debug;

use super::{Node, OrderStatisticsTree, Stack, TreeError};
use crate::aggregate::Aggregate;
use crate::raw::{Arena, Handle};

impl<T: Ord, A: Aggregate<T>> OrderStatisticsTree<T, A> {
    /// Moves every element of `other` into `self`, leaving `other` empty.
    ///
    /// Both trees are flattened to sorted runs, the runs are merged, and the
    /// result is poured in order into a freshly built, minimal-height shape.
    /// Identities must be disjoint. All memory is reserved up front: on
    /// [`TreeError::AllocationFailure`] neither tree has been modified.
    ///
    /// Every handle into either tree is invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AllocationFailure`] if memory for the rebuild
    /// cannot be reserved.
    ///
    /// # Complexity
    ///
    /// O(n1 + n2) regardless of which side is smaller.
    pub fn merge(&mut self, other: &mut Self) -> Result<(), TreeError> {
        if other.is_empty() {
            return Ok(());
        }
        let (n1, n2) = (self.len(), other.len());
        let total = n1 + n2;

        let mut left = try_vec(n1)?;
        let mut right = try_vec(n2)?;
        let mut merged = try_vec(total)?;
        let skeleton = Skeleton::try_new(total)?;
        let nodes = Arena::try_with_capacity(total).map_err(|_| TreeError::AllocationFailure)?;

        self.drain_sorted(&mut left);
        other.drain_sorted(&mut right);
        merge_sorted(left, right, &mut merged);

        self.nodes = nodes;
        let mut elements = merged.into_iter();
        self.root = self.materialize(&skeleton, skeleton.root, None, &mut elements);
        debug_assert!(elements.next().is_none(), "skeleton has fewer slots than elements");

        debug!(left = n1, right = n2, height = self.height(), "rebuilt merged tree");
        Ok(())
    }

    /// Moves all elements out in ascending order and empties the tree.
    fn drain_sorted(&mut self, out: &mut Vec<T>) {
        let mut stack = Stack::new();
        let mut current = self.root.take();
        loop {
            while let Some(h) = current {
                stack.push(h);
                current = self.node(h).left;
            }
            let Some(h) = stack.pop() else { break };
            let node = self.nodes.take(h);
            out.push(node.element);
            current = node.right;
        }
        self.nodes.clear();
    }

    /// Fills the skeleton slot `slot` and its subtree in order, computing
    /// heights and summaries on the way back up.
    fn materialize(
        &mut self,
        skeleton: &Skeleton,
        slot: Option<usize>,
        parent: Option<Handle>,
        elements: &mut impl Iterator<Item = T>,
    ) -> Option<Handle> {
        let shape = skeleton.slots[slot?];
        let left = self.materialize(skeleton, shape.left, None, elements);
        let element = elements.next().expect("skeleton has one slot per element");
        let summary = A::empty(self.domain);
        let handle = self.nodes.alloc(Node {
            element,
            summary,
            height: 0,
            parent,
            left,
            right: None,
        });
        if let Some(l) = left {
            self.node_mut(l).parent = Some(handle);
        }
        let right = self.materialize(skeleton, shape.right, Some(handle), elements);
        self.node_mut(handle).right = right;
        self.refresh(handle);
        Some(handle)
    }
}

fn try_vec<T>(capacity: usize) -> Result<Vec<T>, TreeError> {
    let mut v = Vec::new();
    v.try_reserve_exact(capacity).map_err(|_| TreeError::AllocationFailure)?;
    Ok(v)
}

fn merge_sorted<T: Ord>(left: Vec<T>, right: Vec<T>, out: &mut Vec<T>) {
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l < r,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        out.extend(if take_left { left.next() } else { right.next() });
    }
}

#[derive(Clone, Copy, Debug)]
struct Shape {
    left: Option<usize>,
    right: Option<usize>,
}

/// Placeholder tree with exactly `len` slots: a complete tree of the
/// smallest height holding `len` nodes, minus its rightmost bottom leaves.
#[derive(Debug)]
struct Skeleton {
    slots: Vec<Shape>,
    root: Option<usize>,
}

impl Skeleton {
    fn try_new(len: usize) -> Result<Self, TreeError> {
        let levels = levels_for(len);
        let full = (1usize << levels) - 1;
        let mut skeleton = Self {
            slots: try_vec(full)?,
            root: None,
        };
        skeleton.root = skeleton.grow(levels);
        let mut excess = full - len;
        skeleton.trim(skeleton.root, &mut excess);
        debug_assert_eq!(excess, 0, "bottom level too small to absorb the excess");
        Ok(skeleton)
    }

    fn grow(&mut self, levels: u32) -> Option<usize> {
        if levels == 0 {
            return None;
        }
        let left = self.grow(levels - 1);
        let right = self.grow(levels - 1);
        self.slots.push(Shape { left, right });
        Some(self.slots.len() - 1)
    }

    /// Deletes up to `excess` leaves, right subtrees first. Returns `true` if
    /// `slot` itself was deleted so the caller can clear its link.
    ///
    /// A node is only tested as a leaf before its children are visited, so
    /// parents that lose both children in this pass survive and only the
    /// bottom level shrinks.
    fn trim(&mut self, slot: Option<usize>, excess: &mut usize) -> bool {
        let Some(i) = slot else { return false };
        if *excess == 0 {
            return false;
        }
        let Shape { left, right } = self.slots[i];
        if left.is_none() && right.is_none() {
            *excess -= 1;
            return true;
        }
        if self.trim(right, excess) {
            self.slots[i].right = None;
        }
        if self.trim(left, excess) {
            self.slots[i].left = None;
        }
        false
    }

    #[cfg(test)]
    fn count(&self, slot: Option<usize>) -> usize {
        slot.map_or(0, |i| 1 + self.count(self.slots[i].left) + self.count(self.slots[i].right))
    }
}

/// `ceil(log2(len + 1))`: the number of levels of the shortest tree holding `len` nodes.
fn levels_for(len: usize) -> u32 {
    (len + 1).next_power_of_two().trailing_zeros()
}
