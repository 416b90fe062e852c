//! An AVL tree whose nodes cache the [`Aggregate`] of their subtree.
//!
//! Nodes live in an arena and are linked by [`Handle`]s. Child links own the
//! layout, parent links are plain back-references used to walk towards the
//! root after a mutation. Every structural change (attach, splice, rotation)
//! refreshes the height and summary of each node whose child set changed
//! before the walk continues, so `summary(node) == of(node) + summary(left) +
//! summary(right)` holds for every node between operations.

mod merge;
mod order_statistic;

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

use crate::aggregate::Aggregate;
use crate::raw::{Arena, Handle};

/// Failures of structural tree operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("an element with the same key is already present")]
    AlreadyExists,
    #[error("no element with the given key is present")]
    NotFound,
    #[error("could not reserve memory for the merged tree")]
    AllocationFailure,
}

/// Outcome of a key descent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Search {
    /// The tree has no nodes.
    Empty,
    /// A node with an equal key.
    Found(Handle),
    /// No match; the key belongs in the (vacant) left slot of this leaf-ward node.
    InsertLeft(Handle),
    /// No match; the key belongs in the (vacant) right slot of this leaf-ward node.
    InsertRight(Handle),
}

struct Node<T, A> {
    element: T,
    summary: A,
    height: u32,
    parent: Option<Handle>,
    left: Option<Handle>,
    right: Option<Handle>,
}

// Inline stack depth for traversals; an AVL tree addressable by a 32-bit
// handle is never taller than this.
type Stack = SmallVec<[Handle; 64]>;

/// A height-balanced binary search tree ordered by `T: Ord` and augmented with
/// a per-subtree summary `A`.
///
/// # Examples
///
/// ```
/// use ranked_partitions::{Member, MemberId, OrderStatisticsTree, RankAggregate, Scale};
///
/// let mut tree: OrderStatisticsTree<Member, RankAggregate> = OrderStatisticsTree::new(Scale::new(3)?);
/// for (id, rank) in [(1, 4), (2, 9), (3, 1)] {
///     tree.insert(Member::with_rank(MemberId(id), rank, 2)).unwrap();
/// }
///
/// let top = tree.kth_from_top(1).unwrap();
/// assert_eq!(tree.get(top).rank(), 9);
/// assert_eq!(tree.total().rank_sum(), 14);
/// # Ok::<(), ranked_partitions::Error>(())
/// ```
pub struct OrderStatisticsTree<T, A: Aggregate<T>> {
    nodes: Arena<Node<T, A>>,
    root: Option<Handle>,
    domain: A::Domain,
}

impl<T, A: Aggregate<T>> OrderStatisticsTree<T, A> {
    #[must_use]
    pub const fn new(domain: A::Domain) -> Self {
        Self {
            nodes: Arena::new(),
            root: None,
            domain,
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

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    #[must_use]
    pub const fn domain(&self) -> A::Domain {
        self.domain
    }

    #[must_use]
    pub const fn root(&self) -> Option<Handle> {
        self.root
    }

    /// Height of the tree; zero when empty, one for a single node.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height_of(self.root)
    }

    /// # Panics
    ///
    /// Panics if `handle` does not refer to a node of this tree.
    #[must_use]
    pub fn get(&self, handle: Handle) -> &T {
        &self.node(handle).element
    }

    /// Summary of the subtree rooted at `handle`.
    #[must_use]
    pub fn summary(&self, handle: Handle) -> &A {
        &self.node(handle).summary
    }

    /// Summary of every element in the tree.
    #[must_use]
    pub fn total(&self) -> A {
        self.root.map_or_else(|| A::empty(self.domain), |root| self.node(root).summary.clone())
    }

    #[must_use]
    pub fn leftmost(&self) -> Option<Handle> {
        self.root.map(|root| self.leftmost_from(root))
    }

    #[must_use]
    pub fn rightmost(&self) -> Option<Handle> {
        let mut current = self.root?;
        while let Some(right) = self.node(current).right {
            current = right;
        }
        Some(current)
    }

    /// Elements in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        InOrder::new(self).map(|h| &self.node(h).element)
    }

    fn node(&self, handle: Handle) -> &Node<T, A> {
        self.nodes.get(handle)
    }

    fn node_mut(&mut self, handle: Handle) -> &mut Node<T, A> {
        self.nodes.get_mut(handle)
    }

    fn height_of(&self, handle: Option<Handle>) -> u32 {
        handle.map_or(0, |h| self.node(h).height)
    }

    fn balance(&self, handle: Handle) -> i64 {
        let node = self.node(handle);
        i64::from(self.height_of(node.left)) - i64::from(self.height_of(node.right))
    }

    fn leftmost_from(&self, mut current: Handle) -> Handle {
        while let Some(left) = self.node(current).left {
            current = left;
        }
        current
    }

    fn rightmost_from(&self, mut current: Handle) -> Handle {
        while let Some(right) = self.node(current).right {
            current = right;
        }
        current
    }

    /// In-order neighbour of `handle`, following parent links when the
    /// subtree on that side is empty.
    fn neighbour(&self, handle: Handle, forward: bool) -> Option<Handle> {
        let node = self.node(handle);
        let inner = if forward { node.right } else { node.left };
        if let Some(inner) = inner {
            return Some(if forward { self.leftmost_from(inner) } else { self.rightmost_from(inner) });
        }
        let mut child = handle;
        let mut parent = node.parent;
        while let Some(p) = parent {
            let from_side = if forward { self.node(p).left } else { self.node(p).right };
            if from_side == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.node(p).parent;
        }
        None
    }

    fn alloc_leaf(&mut self, element: T, parent: Option<Handle>) -> Handle {
        let summary = A::of(&element, self.domain);
        self.nodes.alloc(Node {
            element,
            summary,
            height: 1,
            parent,
            left: None,
            right: None,
        })
    }

    /// Recomputes the height and summary of `handle` from its children.
    fn refresh(&mut self, handle: Handle) {
        let node = self.node(handle);
        let (left, right) = (node.left, node.right);
        let mut summary = A::of(&node.element, self.domain);
        if let Some(l) = left {
            summary += &self.node(l).summary;
        }
        if let Some(r) = right {
            summary += &self.node(r).summary;
        }
        let height = 1 + self.height_of(left).max(self.height_of(right));

        let node = self.node_mut(handle);
        node.summary = summary;
        node.height = height;
    }

    /// Refreshes every node from `from` up to the root.
    fn refresh_path(&mut self, mut from: Option<Handle>) {
        while let Some(h) = from {
            self.refresh(h);
            from = self.node(h).parent;
        }
    }

    /// Points `parent`'s link that referenced `old` at `new` instead.
    fn replace_child(&mut self, parent: Option<Handle>, old: Handle, new: Option<Handle>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let node = self.node_mut(p);
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    debug_assert_eq!(node.right, Some(old), "`replace_child()` - `old` is not a child of `parent`!");
                    node.right = new;
                }
            }
        }
    }

    //     x              y
    //    / \            / \
    //   a   y    =>    x   c
    //      / \        / \
    //     b   c      a   b
    fn rotate_left(&mut self, x: Handle) -> Handle {
        let y = self.node(x).right.expect("`rotate_left()` - missing right child!");
        let b = self.node(y).left;
        let parent = self.node(x).parent;

        self.node_mut(x).right = b;
        if let Some(b) = b {
            self.node_mut(b).parent = Some(x);
        }
        self.node_mut(y).parent = parent;
        self.replace_child(parent, x, Some(y));
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);

        self.refresh(x);
        self.refresh(y);
        y
    }

    //       x          y
    //      / \        / \
    //     y   c  =>  a   x
    //    / \            / \
    //   a   b          b   c
    fn rotate_right(&mut self, x: Handle) -> Handle {
        let y = self.node(x).left.expect("`rotate_right()` - missing left child!");
        let b = self.node(y).right;
        let parent = self.node(x).parent;

        self.node_mut(x).left = b;
        if let Some(b) = b {
            self.node_mut(b).parent = Some(x);
        }
        self.node_mut(y).parent = parent;
        self.replace_child(parent, x, Some(y));
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);

        self.refresh(x);
        self.refresh(y);
        y
    }

    /// Restores the AVL condition at `handle`, returning the subtree's new root.
    fn rebalance(&mut self, handle: Handle) -> Handle {
        let balance = self.balance(handle);
        if balance > 1 {
            let left = self.node(handle).left.expect("left-heavy node has a left child");
            if self.balance(left) < 0 {
                self.rotate_left(left);
            }
            self.rotate_right(handle)
        } else if balance < -1 {
            let right = self.node(handle).right.expect("right-heavy node has a right child");
            if self.balance(right) > 0 {
                self.rotate_right(right);
            }
            self.rotate_left(handle)
        } else {
            handle
        }
    }

    /// Walks from `from` to the root after a leaf was attached or spliced out
    /// below it, rebalancing on the way. Once a subtree's height is unchanged
    /// the shape above is final and only summaries still need refreshing.
    fn retrace(&mut self, mut from: Option<Handle>) {
        while let Some(h) = from {
            let before = self.node(h).height;
            self.refresh(h);
            let top = self.rebalance(h);
            let parent = self.node(top).parent;
            if self.node(top).height == before {
                self.refresh_path(parent);
                return;
            }
            from = parent;
        }
    }
}

impl<T: Ord, A: Aggregate<T>> OrderStatisticsTree<T, A> {
    /// Mutates the element at `handle` and refreshes the summaries on its path
    /// to the root.
    ///
    /// The closure must not change the element's ordering relative to any other
    /// element; only summarized payload may change. Debug builds panic if it
    /// does.
    pub fn update(&mut self, handle: Handle, f: impl FnOnce(&mut T)) {
        f(&mut self.node_mut(handle).element);
        debug_assert!(self.ordered_at(handle), "update moved an element out of order");
        self.refresh_path(Some(handle));
    }

    fn ordered_at(&self, handle: Handle) -> bool {
        let element = &self.node(handle).element;
        self.neighbour(handle, false).is_none_or(|p| self.node(p).element < *element)
            && self.neighbour(handle, true).is_none_or(|n| *element < self.node(n).element)
    }

    /// Descends by key, reporting either the match or the vacant slot the key
    /// would occupy.
    pub fn find<Q>(&self, key: &Q) -> Search
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let Some(mut current) = self.root else {
            return Search::Empty;
        };
        loop {
            let node = self.node(current);
            match <T as Borrow<Q>>::borrow(&node.element).cmp(key) {
                Ordering::Equal => return Search::Found(current),
                Ordering::Greater => match node.left {
                    Some(left) => current = left,
                    None => return Search::InsertLeft(current),
                },
                Ordering::Less => match node.right {
                    Some(right) => current = right,
                    None => return Search::InsertRight(current),
                },
            }
        }
    }

    /// Returns the handle of the element equal to `key`, if present.
    pub fn handle_of<Q>(&self, key: &Q) -> Option<Handle>
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        match self.find(key) {
            Search::Found(h) => Some(h),
            _ => None,
        }
    }

    /// Inserts `element` as a new leaf and rebalances.
    ///
    /// Handles returned earlier stay valid; rotations relink nodes without
    /// moving elements between them.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AlreadyExists`] if an equal element is present.
    ///
    /// # Complexity
    ///
    /// O(log n) node visits, each refresh costing one summary combination.
    pub fn insert(&mut self, element: T) -> Result<Handle, TreeError> {
        match self.find(&element) {
            Search::Found(_) => Err(TreeError::AlreadyExists),
            Search::Empty => {
                let leaf = self.alloc_leaf(element, None);
                self.root = Some(leaf);
                Ok(leaf)
            }
            Search::InsertLeft(parent) => {
                let leaf = self.alloc_leaf(element, Some(parent));
                self.node_mut(parent).left = Some(leaf);
                self.retrace(Some(parent));
                Ok(leaf)
            }
            Search::InsertRight(parent) => {
                let leaf = self.alloc_leaf(element, Some(parent));
                self.node_mut(parent).right = Some(leaf);
                self.retrace(Some(parent));
                Ok(leaf)
            }
        }
    }

    /// Removes and returns the element equal to `key`.
    ///
    /// A node with two children trades elements with its in-order successor,
    /// which is then spliced out instead; the successor's element therefore
    /// moves to a different handle.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if no equal element is present.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<T, TreeError>
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let Search::Found(mut target) = self.find(key) else {
            return Err(TreeError::NotFound);
        };

        let node = self.node(target);
        if let (Some(_), Some(right)) = (node.left, node.right) {
            let successor = self.leftmost_from(right);
            let (a, b) = self.nodes.get_pair_mut(target, successor);
            std::mem::swap(&mut a.element, &mut b.element);
            target = successor;
        }

        let Node {
            element,
            parent,
            left,
            right,
            ..
        } = self.nodes.take(target);
        let child = left.or(right);
        if let Some(c) = child {
            self.node_mut(c).parent = parent;
        }
        self.replace_child(parent, target, child);
        self.retrace(parent);
        Ok(element)
    }
}

impl<T: fmt::Debug, A: Aggregate<T>> fmt::Debug for OrderStatisticsTree<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// In-order handle traversal with an explicit stack.
struct InOrder<'a, T, A: Aggregate<T>> {
    tree: &'a OrderStatisticsTree<T, A>,
    stack: Stack,
}

impl<'a, T, A: Aggregate<T>> InOrder<'a, T, A> {
    fn new(tree: &'a OrderStatisticsTree<T, A>) -> Self {
        let mut iter = Self {
            tree,
            stack: Stack::new(),
        };
        iter.push_left_spine(tree.root);
        iter
    }

    fn push_left_spine(&mut self, mut current: Option<Handle>) {
        while let Some(h) = current {
            self.stack.push(h);
            current = self.tree.node(h).left;
        }
    }
}

impl<T, A: Aggregate<T>> Iterator for InOrder<'_, T, A> {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        let h = self.stack.pop()?;
        self.push_left_spine(self.tree.node(h).right);
        Some(h)
    }
}
