//! Disjoint sets whose roots own a value, merged through a callback on union.
//!
//! Union is by size: the root of the larger set survives and absorbs the
//! smaller set's value, and on equal sizes the first argument's root survives.
//! [`DisjointSet::find`] compresses fully: a first pass locates the root, a
//! second pass points every visited element straight at it.

#[derive(Clone, Debug)]
struct SetNode<T> {
    value: T,
    parent: usize,
    size: usize,
}

/// A union-find forest over ordinals `0..len()`, each carrying a `T`.
///
/// Only a root's value is meaningful for its set; after a union the retired
/// root keeps whatever the merge callback left in it.
#[derive(Clone, Debug)]
pub struct DisjointSet<T> {
    nodes: Vec<SetNode<T>>,
}

impl<T> Default for DisjointSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DisjointSet<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Adds a singleton set holding `value` and returns its ordinal.
    pub fn push(&mut self, value: T) -> usize {
        let ordinal = self.nodes.len();
        self.nodes.push(SetNode {
            value,
            parent: ordinal,
            size: 1,
        });
        ordinal
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the root of the set containing `x`, re-pointing every element
    /// on the way directly at the root.
    ///
    /// # Panics
    ///
    /// Panics if `x >= len()`.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.nodes[root].parent != root {
            root = self.nodes[root].parent;
        }
        let mut current = x;
        while current != root {
            let next = self.nodes[current].parent;
            self.nodes[current].parent = root;
            current = next;
        }
        root
    }

    /// Like [`find`](Self::find) but without compressing.
    #[must_use]
    pub fn root(&self, mut x: usize) -> usize {
        while self.nodes[x].parent != x {
            x = self.nodes[x].parent;
        }
        x
    }

    /// Immediate parent of `x`; `x` itself for a root.
    #[must_use]
    pub fn parent(&self, x: usize) -> usize {
        self.nodes[x].parent
    }

    /// Number of elements in the set rooted at `root`.
    #[must_use]
    pub fn size(&self, root: usize) -> usize {
        self.nodes[root].size
    }

    #[must_use]
    pub fn get(&self, x: usize) -> &T {
        &self.nodes[x].value
    }

    pub fn get_mut(&mut self, x: usize) -> &mut T {
        &mut self.nodes[x].value
    }

    /// Value of the root of the set containing `x`.
    pub fn get_root_mut(&mut self, x: usize) -> &mut T {
        let root = self.find(x);
        &mut self.nodes[root].value
    }

    /// Unites the sets containing `a` and `b`, returning the surviving root.
    ///
    /// `merge` receives the survivor's value and the retired root's value. If
    /// it fails the forest is left untouched and its error is returned. Sets
    /// that are already one are not passed to `merge`.
    ///
    /// # Errors
    ///
    /// Whatever `merge` returns.
    pub fn union_with<E>(
        &mut self,
        a: usize,
        b: usize,
        merge: impl FnOnce(&mut T, &mut T) -> Result<(), E>,
    ) -> Result<usize, E> {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return Ok(ra);
        }
        let (survivor, retired) = if self.nodes[ra].size >= self.nodes[rb].size { (ra, rb) } else { (rb, ra) };

        let (kept, gone) = if survivor < retired {
            let (lo, hi) = self.nodes.split_at_mut(retired);
            (&mut lo[survivor], &mut hi[0])
        } else {
            let (lo, hi) = self.nodes.split_at_mut(survivor);
            (&mut hi[0], &mut lo[retired])
        };
        merge(&mut kept.value, &mut gone.value)?;

        kept.size += gone.size;
        gone.parent = survivor;
        Ok(survivor)
    }
}
