//! The intrusive node header, grounded on `C-kern/platform/shared/index/redblacktree.c`.
//!
//! `parent` and the node's color share one word: the low bit is the color
//! tag (spec.md §3.3), the remaining bits are the parent pointer. This
//! implies every node must be at least 2-byte aligned; [`RbNode::is_aligned`]
//! is checked by the tree on every insert (spec.md §4.2, "a misaligned node
//! pointer on insert is an error").

use std::cell::Cell;
use std::ptr::NonNull;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

const COLOR_BIT: usize = 1;

/// Intrusive red-black tree linkage, embedded by value inside a caller-owned
/// struct (see [`super::Adapter`]).
#[derive(Debug)]
pub struct RbNode {
    left: Cell<Option<NonNull<RbNode>>>,
    right: Cell<Option<NonNull<RbNode>>>,
    /// Tagged pointer: bit 0 is the color, the rest is the parent pointer
    /// (or all-zero bits above the tag when there is no parent).
    parent_color: Cell<usize>,
}

impl Default for RbNode {
    fn default() -> Self {
        Self::new()
    }
}

impl RbNode {
    pub fn new() -> Self {
        Self {
            left: Cell::new(None),
            right: Cell::new(None),
            // New nodes start red with no parent, per spec.md §4.2
            // ("new nodes are coloured red").
            parent_color: Cell::new(0),
        }
    }

    /// `true` if a pointer to this node satisfies the low-bit color tag's
    /// alignment requirement.
    pub fn is_aligned(ptr: NonNull<RbNode>) -> bool {
        (ptr.as_ptr() as usize) & COLOR_BIT == 0
    }

    pub fn left(&self) -> Option<NonNull<RbNode>> {
        self.left.get()
    }

    pub fn set_left(&self, node: Option<NonNull<RbNode>>) {
        self.left.set(node);
    }

    pub fn right(&self) -> Option<NonNull<RbNode>> {
        self.right.get()
    }

    pub fn set_right(&self, node: Option<NonNull<RbNode>>) {
        self.right.set(node);
    }

    pub fn parent(&self) -> Option<NonNull<RbNode>> {
        let tagged = self.parent_color.get();
        NonNull::new((tagged & !COLOR_BIT) as *mut RbNode)
    }

    pub fn set_parent(&self, parent: Option<NonNull<RbNode>>) {
        let color_bit = self.parent_color.get() & COLOR_BIT;
        let addr = parent.map_or(0, |p| p.as_ptr() as usize);
        debug_assert_eq!(addr & COLOR_BIT, 0, "parent pointer must be aligned");
        self.parent_color.set(addr | color_bit);
    }

    pub fn color(&self) -> Color {
        if self.parent_color.get() & COLOR_BIT == COLOR_BIT {
            Color::Black
        } else {
            Color::Red
        }
    }

    pub fn set_color(&self, color: Color) {
        let addr = self.parent_color.get() & !COLOR_BIT;
        let bit = match color {
            Color::Black => COLOR_BIT,
            Color::Red => 0,
        };
        self.parent_color.set(addr | bit);
    }

    /// Resets this node to a fresh, unlinked state. Called after removal so
    /// the header triplet (left/right/parent_color) is zeroed while the rest
    /// of the caller's struct is left untouched (spec.md §8, invariant 5).
    pub fn reset(&self) {
        self.left.set(None);
        self.right.set(None);
        self.parent_color.set(0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn color_and_parent_are_independent() {
        let node = RbNode::new();
        assert_eq!(node.color(), Color::Red);
        node.set_color(Color::Black);
        assert_eq!(node.color(), Color::Black);
        assert_eq!(node.parent(), None);

        let other = Box::leak(Box::new(RbNode::new()));
        let other_ptr = NonNull::from(&*other);
        node.set_parent(Some(other_ptr));
        assert_eq!(node.parent(), Some(other_ptr));
        assert_eq!(node.color(), Color::Black);

        node.set_color(Color::Red);
        assert_eq!(node.color(), Color::Red);
        assert_eq!(node.parent(), Some(other_ptr));

        unsafe {
            drop(Box::from_raw(other));
        }
    }

    #[test]
    fn alignment_check() {
        let node = RbNode::new();
        let ptr = NonNull::from(&node);
        assert!(RbNode::is_aligned(ptr));
    }
}
