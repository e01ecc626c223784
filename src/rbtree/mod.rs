//! An intrusive, iterative red-black tree, grounded on
//! `C-kern/platform/shared/index/redblacktree.c`.
//!
//! Nodes are caller-owned (see [`Adapter`]); the tree only links them
//! together through the embedded [`RbNode`] header. All operations are
//! iterative — no recursion, so stack depth never grows with tree size on
//! the hot insert/remove paths (the test-only [`RbTree::verify`] is the one
//! exception, bounded by `O(log n)` for any tree that passes it).

mod adapter;
mod node;

pub use adapter::Adapter;
pub use node::{Color, RbNode};

use std::marker::PhantomData;
use std::ptr::NonNull;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RbError {
    #[error("node pointer is misaligned for the color tag (must be 2-byte aligned)")]
    Misaligned,
    #[error("a node with this key is already present")]
    AlreadyExists,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("root is not black")]
    RootNotBlack,
    #[error("red node has a red child")]
    RedRedEdge,
    #[error("black-height differs between left and right subtree")]
    BlackHeightMismatch,
    #[error("a node's parent pointer does not match its actual parent")]
    ParentMismatch,
    #[error("in-order key sequence is not strictly increasing")]
    NotMonotone,
}

/// An intrusive red-black tree ordering `A::Value`s by `A::Key`.
pub struct RbTree<A: Adapter> {
    root: Option<NonNull<RbNode>>,
    len: usize,
    _adapter: PhantomData<A>,
}

impl<A: Adapter> Default for RbTree<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Adapter> RbTree<A> {
    pub fn new() -> Self {
        Self {
            root: None,
            len: 0,
            _adapter: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts `value`, keyed by `A::key_of(value)`. Rejects a node whose
    /// embedded [`RbNode`] is misaligned (spec.md §4.2) and a duplicate key
    /// (spec.md §4.2's "exists" case), leaving the tree untouched either way.
    pub fn insert(&mut self, value: NonNull<A::Value>) -> Result<(), RbError> {
        let node = A::node_of(value);
        if !RbNode::is_aligned(node) {
            return Err(RbError::Misaligned);
        }
        let key = A::key_of(value);

        let mut cursor = self.root;
        let mut parent = None;
        let mut went_left = false;
        while let Some(cur) = cursor {
            parent = Some(cur);
            let cur_value = A::value_of(cur);
            match key.cmp(A::key_of(cur_value)) {
                std::cmp::Ordering::Less => {
                    went_left = true;
                    cursor = unsafe { cur.as_ref() }.left();
                }
                std::cmp::Ordering::Greater => {
                    went_left = false;
                    cursor = unsafe { cur.as_ref() }.right();
                }
                std::cmp::Ordering::Equal => return Err(RbError::AlreadyExists),
            }
        }

        let n = unsafe { node.as_ref() };
        n.reset();
        n.set_color(Color::Red);
        n.set_parent(parent);
        match parent {
            None => self.root = Some(node),
            Some(p) => {
                let p = unsafe { p.as_ref() };
                if went_left {
                    p.set_left(Some(node));
                } else {
                    p.set_right(Some(node));
                }
            }
        }
        self.len += 1;
        self.fix_insert(node);
        Ok(())
    }

    /// Finds the value keyed by `key`, if present.
    pub fn find(&self, key: &A::Key) -> Option<NonNull<A::Value>> {
        let mut cursor = self.root;
        while let Some(cur) = cursor {
            let value = A::value_of(cur);
            match key.cmp(A::key_of(value)) {
                std::cmp::Ordering::Less => cursor = unsafe { cur.as_ref() }.left(),
                std::cmp::Ordering::Greater => cursor = unsafe { cur.as_ref() }.right(),
                std::cmp::Ordering::Equal => return Some(value),
            }
        }
        None
    }

    /// Removes and returns the value keyed by `key`, if present.
    pub fn remove(&mut self, key: &A::Key) -> Option<NonNull<A::Value>> {
        let value = self.find(key)?;
        let node = A::node_of(value);
        self.delete(node);
        Some(value)
    }

    /// Atomically renames `value`'s key: unlinks it, invokes `rename` (which
    /// must toggle the value's key between its current value and the
    /// desired new one — a symmetric swap), and re-inserts under the new
    /// key. If re-insertion fails because the new key is already taken, the
    /// old key is restored (by invoking `rename` again) and the value is
    /// re-inserted under it, and the original error is returned.
    pub fn update_key(
        &mut self,
        value: NonNull<A::Value>,
        mut rename: impl FnMut(NonNull<A::Value>),
    ) -> Result<(), RbError> {
        let node = A::node_of(value);
        self.delete(node);
        rename(value);
        match self.insert(value) {
            Ok(()) => Ok(()),
            Err(err) => {
                rename(value);
                self.insert(value)
                    .expect("the old key must still be free: it was just removed from this tree");
                Err(err)
            }
        }
    }

    /// Visits every node post-order and invokes `destroy` on each value,
    /// without recursion or any extra heap allocation: the traversal reuses
    /// each visited node's own `left` pointer to thread the parent chain,
    /// the same technique as `freenodes_redblacktree` in
    /// `C-kern/platform/shared/index/redblacktree.c`. Destructor errors are
    /// accumulated rather than aborting the traversal; if any occurred they
    /// are all returned once traversal completes.
    pub fn free_all<E>(
        &mut self,
        mut destroy: impl FnMut(NonNull<A::Value>) -> Result<(), E>,
    ) -> Result<(), Vec<E>> {
        let mut errors = Vec::new();
        let mut parent: Option<NonNull<RbNode>> = None;
        let mut node = self.root;
        self.root = None;
        self.len = 0;

        while let Some(mut cur) = node {
            // Descend the left spine, threading each visited ancestor's own
            // `left` field into a parent-chain stack as we go.
            loop {
                let cur_ref = unsafe { cur.as_ref() };
                match cur_ref.left() {
                    Some(l) => {
                        cur_ref.set_left(parent);
                        parent = Some(cur);
                        cur = l;
                    }
                    None => break,
                }
            }

            let cur_ref = unsafe { cur.as_ref() };
            if let Some(r) = cur_ref.right() {
                cur_ref.set_left(parent);
                parent = Some(cur);
                node = Some(r);
                continue;
            }

            // `cur` is a leaf: destroy it, then pop the threaded stack until
            // an ancestor with unvisited right work is found (or it's empty).
            let mut leaf = cur;
            loop {
                let value = A::value_of(leaf);
                if let Err(e) = destroy(value) {
                    errors.push(e);
                }
                unsafe { leaf.as_ref() }.reset();

                let Some(p) = parent else {
                    node = None;
                    break;
                };
                let p_ref = unsafe { p.as_ref() };
                if p_ref.right() == Some(leaf) {
                    // `leaf` was p's right child, so p's left subtree was
                    // already empty when we descended into it — p is fully
                    // processed too, keep popping.
                    parent = p_ref.left();
                    p_ref.set_left(None);
                    p_ref.set_right(None);
                    leaf = p;
                    continue;
                } else {
                    // `leaf` was p's left child: p's right subtree (if any)
                    // still needs visiting.
                    parent = p_ref.left();
                    p_ref.set_left(None);
                    node = Some(p);
                    break;
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Checks every structural invariant spec.md §4.2 and §8 (invariant 4)
    /// require: root is black, no red node has a red child, every
    /// root-to-leaf path has equal black-height, parent pointers agree with
    /// actual linkage, and the in-order key sequence is strictly increasing.
    /// Intended for tests, not the hot path.
    pub fn verify(&self) -> Result<(), VerifyError> {
        let Some(root) = self.root else { return Ok(()) };
        if unsafe { root.as_ref() }.color() != Color::Black {
            return Err(VerifyError::RootNotBlack);
        }
        let mut prev_key: Option<&'static A::Key> = None;
        self.verify_node(root, None, &mut prev_key)?;
        Ok(())
    }

    fn verify_node(
        &self,
        node: NonNull<RbNode>,
        expected_parent: Option<NonNull<RbNode>>,
        prev_key: &mut Option<&'static A::Key>,
    ) -> Result<usize, VerifyError> {
        let n = unsafe { node.as_ref() };
        if n.parent() != expected_parent {
            return Err(VerifyError::ParentMismatch);
        }
        if n.color() == Color::Red {
            if let Some(p) = n.parent() {
                if unsafe { p.as_ref() }.color() == Color::Red {
                    return Err(VerifyError::RedRedEdge);
                }
            }
        }
        let left_bh = match n.left() {
            Some(l) => self.verify_node(l, Some(node), prev_key)?,
            None => 0,
        };
        let value = A::value_of(node);
        let key = A::key_of(value);
        if let Some(prev) = *prev_key {
            if prev >= key {
                return Err(VerifyError::NotMonotone);
            }
        }
        *prev_key = Some(key);
        let right_bh = match n.right() {
            Some(r) => self.verify_node(r, Some(node), prev_key)?,
            None => 0,
        };
        if left_bh != right_bh {
            return Err(VerifyError::BlackHeightMismatch);
        }
        Ok(left_bh + usize::from(n.color() == Color::Black))
    }

    // -- rotations (spec.md §4.2, "Rotation primitives") --

    fn rotate_left(&mut self, x: NonNull<RbNode>) {
        let xr = unsafe { x.as_ref() };
        let y = xr.right().expect("rotate_left requires a right child");
        let yr = unsafe { y.as_ref() };
        xr.set_right(yr.left());
        if let Some(yl) = yr.left() {
            unsafe { yl.as_ref() }.set_parent(Some(x));
        }
        let parent = xr.parent();
        yr.set_parent(parent);
        self.reparent_child_slot(parent, x, y);
        yr.set_left(Some(x));
        xr.set_parent(Some(y));
    }

    fn rotate_right(&mut self, x: NonNull<RbNode>) {
        let xr = unsafe { x.as_ref() };
        let y = xr.left().expect("rotate_right requires a left child");
        let yr = unsafe { y.as_ref() };
        xr.set_left(yr.right());
        if let Some(yr_child) = yr.right() {
            unsafe { yr_child.as_ref() }.set_parent(Some(x));
        }
        let parent = xr.parent();
        yr.set_parent(parent);
        self.reparent_child_slot(parent, x, y);
        yr.set_right(Some(x));
        xr.set_parent(Some(y));
    }

    /// After `old`'s subtree is replaced by `new` under `parent` (or at the
    /// root), fixes up whichever side pointed at `old`.
    fn reparent_child_slot(
        &mut self,
        parent: Option<NonNull<RbNode>>,
        old: NonNull<RbNode>,
        new: NonNull<RbNode>,
    ) {
        match parent {
            None => self.root = Some(new),
            Some(p) => {
                let p = unsafe { p.as_ref() };
                if p.left() == Some(old) {
                    p.set_left(Some(new));
                } else {
                    p.set_right(Some(new));
                }
            }
        }
    }

    // -- insertion rebalance (spec.md §4.2) --

    fn fix_insert(&mut self, mut z: NonNull<RbNode>) {
        loop {
            let Some(p) = unsafe { z.as_ref() }.parent() else {
                break;
            };
            if unsafe { p.as_ref() }.color() == Color::Black {
                break;
            }
            // A red node always has a parent (the root is forced black), so
            // a red parent always has a grandparent too.
            let g = unsafe { p.as_ref() }
                .parent()
                .expect("red parent implies a grandparent");

            let parent_is_left = unsafe { g.as_ref() }.left() == Some(p);
            let uncle = if parent_is_left {
                unsafe { g.as_ref() }.right()
            } else {
                unsafe { g.as_ref() }.left()
            };

            if let Some(u) = uncle {
                if unsafe { u.as_ref() }.color() == Color::Red {
                    unsafe { p.as_ref() }.set_color(Color::Black);
                    unsafe { u.as_ref() }.set_color(Color::Black);
                    unsafe { g.as_ref() }.set_color(Color::Red);
                    z = g;
                    continue;
                }
            }

            // Uncle is black (or absent). Flatten a zig-zag, then rotate at
            // the grandparent.
            if parent_is_left {
                if unsafe { p.as_ref() }.right() == Some(z) {
                    z = p;
                    self.rotate_left(z);
                }
                let p = unsafe { z.as_ref() }.parent().unwrap();
                let g = unsafe { p.as_ref() }.parent().unwrap();
                unsafe { p.as_ref() }.set_color(Color::Black);
                unsafe { g.as_ref() }.set_color(Color::Red);
                self.rotate_right(g);
            } else {
                if unsafe { p.as_ref() }.left() == Some(z) {
                    z = p;
                    self.rotate_right(z);
                }
                let p = unsafe { z.as_ref() }.parent().unwrap();
                let g = unsafe { p.as_ref() }.parent().unwrap();
                unsafe { p.as_ref() }.set_color(Color::Black);
                unsafe { g.as_ref() }.set_color(Color::Red);
                self.rotate_left(g);
            }
            break;
        }
        if let Some(root) = self.root {
            unsafe { root.as_ref() }.set_color(Color::Black);
        }
    }

    // -- deletion rebalance (spec.md §4.2) --

    fn transplant(&mut self, u: NonNull<RbNode>, v: Option<NonNull<RbNode>>) {
        let parent = unsafe { u.as_ref() }.parent();
        match parent {
            None => self.root = v,
            Some(p) => {
                let p = unsafe { p.as_ref() };
                if p.left() == Some(u) {
                    p.set_left(v);
                } else {
                    p.set_right(v);
                }
            }
        }
        if let Some(v) = v {
            unsafe { v.as_ref() }.set_parent(parent);
        }
    }

    fn delete(&mut self, z: NonNull<RbNode>) {
        let zr = unsafe { z.as_ref() };
        let mut removed_color = zr.color();
        let x: Option<NonNull<RbNode>>;
        let x_parent: Option<NonNull<RbNode>>;
        let x_is_left: bool;

        if zr.left().is_none() {
            x = zr.right();
            x_parent = zr.parent();
            x_is_left = matches!(zr.parent(), Some(p) if unsafe { p.as_ref() }.left() == Some(z));
            self.transplant(z, x);
        } else if zr.right().is_none() {
            x = zr.left();
            x_parent = zr.parent();
            x_is_left = matches!(zr.parent(), Some(p) if unsafe { p.as_ref() }.left() == Some(z));
            self.transplant(z, x);
        } else {
            let y = leftmost(zr.right().unwrap());
            let yr = unsafe { y.as_ref() };
            removed_color = yr.color();
            x = yr.right();
            if yr.parent() == Some(z) {
                x_parent = Some(y);
                x_is_left = false;
            } else {
                x_parent = yr.parent();
                x_is_left = true;
                self.transplant(y, x);
                yr.set_right(zr.right());
                unsafe { zr.right().unwrap().as_ref() }.set_parent(Some(y));
            }
            self.transplant(z, Some(y));
            yr.set_left(zr.left());
            unsafe { zr.left().unwrap().as_ref() }.set_parent(Some(y));
            yr.set_color(zr.color());
        }

        if removed_color == Color::Black {
            self.fix_delete(x, x_parent, x_is_left);
        }
        zr.reset();
        self.len -= 1;
    }

    fn fix_delete(
        &mut self,
        mut x: Option<NonNull<RbNode>>,
        mut x_parent: Option<NonNull<RbNode>>,
        mut x_is_left: bool,
    ) {
        loop {
            let Some(parent) = x_parent else { break };
            if let Some(xx) = x {
                if unsafe { xx.as_ref() }.color() == Color::Red {
                    unsafe { xx.as_ref() }.set_color(Color::Black);
                    break;
                }
            }
            let pr = unsafe { parent.as_ref() };

            if x_is_left {
                let mut sibling = pr.right().expect("x's black deficit implies a sibling");
                if unsafe { sibling.as_ref() }.color() == Color::Red {
                    unsafe { sibling.as_ref() }.set_color(Color::Black);
                    pr.set_color(Color::Red);
                    self.rotate_left(parent);
                    sibling = pr.right().unwrap();
                }
                let sr = unsafe { sibling.as_ref() };
                let left_black = sr.left().map_or(true, |c| unsafe { c.as_ref() }.color() == Color::Black);
                let right_black = sr.right().map_or(true, |c| unsafe { c.as_ref() }.color() == Color::Black);
                if left_black && right_black {
                    sr.set_color(Color::Red);
                    x = Some(parent);
                    x_parent = pr.parent();
                    x_is_left = matches!(x_parent, Some(gp) if unsafe { gp.as_ref() }.left() == Some(parent));
                    continue;
                }
                if right_black {
                    let near = sr.left().unwrap();
                    unsafe { near.as_ref() }.set_color(Color::Black);
                    sr.set_color(Color::Red);
                    self.rotate_right(sibling);
                    sibling = pr.right().unwrap();
                }
                let sr = unsafe { sibling.as_ref() };
                sr.set_color(pr.color());
                pr.set_color(Color::Black);
                unsafe { sr.right().unwrap().as_ref() }.set_color(Color::Black);
                self.rotate_left(parent);
                break;
            } else {
                let mut sibling = pr.left().expect("x's black deficit implies a sibling");
                if unsafe { sibling.as_ref() }.color() == Color::Red {
                    unsafe { sibling.as_ref() }.set_color(Color::Black);
                    pr.set_color(Color::Red);
                    self.rotate_right(parent);
                    sibling = pr.left().unwrap();
                }
                let sr = unsafe { sibling.as_ref() };
                let left_black = sr.left().map_or(true, |c| unsafe { c.as_ref() }.color() == Color::Black);
                let right_black = sr.right().map_or(true, |c| unsafe { c.as_ref() }.color() == Color::Black);
                if left_black && right_black {
                    sr.set_color(Color::Red);
                    x = Some(parent);
                    x_parent = pr.parent();
                    x_is_left = matches!(x_parent, Some(gp) if unsafe { gp.as_ref() }.left() == Some(parent));
                    continue;
                }
                if left_black {
                    let near = sr.right().unwrap();
                    unsafe { near.as_ref() }.set_color(Color::Black);
                    sr.set_color(Color::Red);
                    self.rotate_left(sibling);
                    sibling = pr.left().unwrap();
                }
                let sr = unsafe { sibling.as_ref() };
                sr.set_color(pr.color());
                pr.set_color(Color::Black);
                unsafe { sr.left().unwrap().as_ref() }.set_color(Color::Black);
                self.rotate_right(parent);
                break;
            }
        }
        if let Some(root) = self.root {
            unsafe { root.as_ref() }.set_color(Color::Black);
        }
    }
}

fn leftmost(mut node: NonNull<RbNode>) -> NonNull<RbNode> {
    while let Some(l) = unsafe { node.as_ref() }.left() {
        node = l;
    }
    node
}


#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;

    struct Item {
        node: RbNode,
        key: u64,
    }

    impl Item {
        fn leak(key: u64) -> NonNull<Item> {
            NonNull::from(Box::leak(Box::new(Item {
                node: RbNode::new(),
                key,
            })))
        }
    }

    crate::intrusive_adapter!(ItemAdapter => Item, node, key, u64);

    fn reclaim(tree: &mut RbTree<ItemAdapter>) {
        let _: Result<(), Vec<()>> = tree.free_all(|v| {
            unsafe { drop(Box::from_raw(v.as_ptr())) };
            Ok(())
        });
    }

    #[test]
    fn insert_find_remove_roundtrip() {
        let mut tree: RbTree<ItemAdapter> = RbTree::new();
        let items: Vec<_> = [5u64, 3, 8, 1, 4, 7, 9, 2, 6].into_iter().map(Item::leak).collect();
        for &v in &items {
            tree.insert(v).unwrap();
            tree.verify().unwrap();
        }
        assert_eq!(tree.len(), items.len());

        for &v in &items {
            let key = unsafe { v.as_ref() }.key;
            assert!(tree.find(&key).is_some());
        }

        for &v in &items {
            let key = unsafe { v.as_ref() }.key;
            let removed = tree.remove(&key).expect("just inserted");
            assert_eq!(removed, v);
            tree.verify().unwrap();
        }
        assert!(tree.is_empty());

        for v in items {
            unsafe { drop(Box::from_raw(v.as_ptr())) };
        }
    }

    #[test]
    fn free_all_visits_every_node_and_accumulates_destructor_errors() {
        let mut tree: RbTree<ItemAdapter> = RbTree::new();
        let items: Vec<_> = (0..50u64).map(Item::leak).collect();
        for &v in &items {
            tree.insert(v).unwrap();
        }
        let mut visited = Vec::new();
        let result = tree.free_all(|v| {
            let key = unsafe { v.as_ref() }.key;
            visited.push(key);
            unsafe { drop(Box::from_raw(v.as_ptr())) };
            if key % 7 == 0 {
                Err(key)
            } else {
                Ok(())
            }
        });
        visited.sort_unstable();
        assert_eq!(visited, (0..50u64).collect::<Vec<_>>());
        let mut errors = result.unwrap_err();
        errors.sort_unstable();
        assert_eq!(errors, vec![0, 7, 14, 21, 28, 35, 42, 49]);
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn duplicate_insert_rejected() {
        let mut tree: RbTree<ItemAdapter> = RbTree::new();
        let a = Item::leak(1);
        let b = Item::leak(1);
        tree.insert(a).unwrap();
        assert_eq!(tree.insert(b), Err(RbError::AlreadyExists));
        reclaim(&mut tree);
        unsafe { drop(Box::from_raw(b.as_ptr())) };
    }

    #[test]
    fn pseudorandom_sequence_of_10000_keys_verifies_at_checkpoints() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut keys: Vec<u64> = (0..10_000).collect();
        let mut rng = StdRng::seed_from_u64(100);
        keys.shuffle(&mut rng);

        let mut tree: RbTree<ItemAdapter> = RbTree::new();
        let mut handles = Vec::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let item = Item::leak(*key);
            tree.insert(item).unwrap();
            handles.push(item);
            if (i + 1) % 100 == 0 {
                tree.verify().unwrap();
            }
        }

        for key in &keys {
            assert!(tree.find(key).is_some());
        }

        reclaim(&mut tree);
    }

    #[test]
    fn update_key_moves_a_node() {
        #[derive(Clone)]
        struct Box2 {
            node: RbNode,
            key: Cell<u64>,
        }
        struct BoxAdapter;
        unsafe impl Adapter for BoxAdapter {
            type Value = Box2;
            type Key = u64;
            fn node_of(value: NonNull<Box2>) -> NonNull<RbNode> {
                unsafe { NonNull::new_unchecked(&(*value.as_ptr()).node as *const _ as *mut _) }
            }
            fn value_of(node: NonNull<RbNode>) -> NonNull<Box2> {
                let offset = std::mem::offset_of!(Box2, node);
                unsafe { NonNull::new_unchecked((node.as_ptr() as *mut u8).sub(offset) as *mut Box2) }
            }
            fn key_of(value: NonNull<Box2>) -> &'static u64 {
                unsafe { std::mem::transmute::<&u64, &'static u64>(&*(*value.as_ptr()).key.as_ptr()) }
            }
        }

        let mut tree: RbTree<BoxAdapter> = RbTree::new();
        let a = NonNull::from(Box::leak(Box::new(Box2 {
            node: RbNode::new(),
            key: Cell::new(1),
        })));
        let b = NonNull::from(Box::leak(Box::new(Box2 {
            node: RbNode::new(),
            key: Cell::new(2),
        })));
        tree.insert(a).unwrap();
        tree.insert(b).unwrap();

        tree.update_key(a, |v| unsafe {
            let cur = (*v.as_ptr()).key.get();
            (*v.as_ptr()).key.set(if cur == 1 { 42 } else { 1 });
        })
        .unwrap();
        assert!(tree.find(&1).is_none());
        assert!(tree.find(&42).is_some());
        tree.verify().unwrap();

        let err = tree.update_key(b, |v| unsafe {
            let cur = (*v.as_ptr()).key.get();
            (*v.as_ptr()).key.set(if cur == 2 { 42 } else { 2 });
        });
        assert_eq!(err, Err(RbError::AlreadyExists));
        assert!(tree.find(&2).is_some(), "old key restored after failed rename");
        tree.verify().unwrap();

        unsafe {
            drop(Box::from_raw(a.as_ptr()));
            drop(Box::from_raw(b.as_ptr()));
        }
    }
}
