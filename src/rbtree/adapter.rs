//! The intrusive-container projector (spec.md §9: "express this with a
//! generic wrapper that stores a `by_field` projector... do not attempt to
//! cast raw pointers").

use super::node::RbNode;
use std::ptr::NonNull;

/// Maps between a caller-owned value and the [`RbNode`] embedded inside it,
/// and exposes the key the tree orders values by.
///
/// # Safety
///
/// `node_of`/`value_of` must be exact inverses of each other for any
/// `NonNull<Self::Value>` that has actually been inserted: the tree stores
/// only `RbNode` pointers internally and recovers `Value` pointers solely
/// through this trait.
pub unsafe trait Adapter {
    type Value;
    type Key: Ord + ?Sized;

    /// Projects a value pointer to its embedded node pointer.
    fn node_of(value: NonNull<Self::Value>) -> NonNull<RbNode>;

    /// Projects a node pointer back to the value that embeds it.
    fn value_of(node: NonNull<RbNode>) -> NonNull<Self::Value>;

    /// Borrows the key of a value, used for all ordering comparisons.
    fn key_of(value: NonNull<Self::Value>) -> &'static Self::Key;
}

/// Implements [`Adapter`] for the common case of a field named `node` at a
/// fixed byte offset, computed once via [`std::mem::offset_of`].
///
/// ```
/// use kcore_toolkit::{intrusive_adapter, rbtree::RbNode};
///
/// struct Item {
///     node: RbNode,
///     key: u64,
/// }
///
/// intrusive_adapter!(ItemAdapter => Item, node, key, u64);
/// ```
#[macro_export]
macro_rules! intrusive_adapter {
    ($name:ident => $value:ty, $field:ident, $key_field:ident, $key:ty) => {
        pub struct $name;

        // SAFETY: `node_of`/`value_of` round-trip through the fixed,
        // compiler-computed offset of `$field` within `$value`.
        unsafe impl $crate::rbtree::Adapter for $name {
            type Value = $value;
            type Key = $key;

            fn node_of(
                value: ::std::ptr::NonNull<$value>,
            ) -> ::std::ptr::NonNull<$crate::rbtree::RbNode> {
                let offset = ::std::mem::offset_of!($value, $field);
                unsafe {
                    ::std::ptr::NonNull::new_unchecked(
                        (value.as_ptr() as *mut u8).add(offset) as *mut $crate::rbtree::RbNode,
                    )
                }
            }

            fn value_of(
                node: ::std::ptr::NonNull<$crate::rbtree::RbNode>,
            ) -> ::std::ptr::NonNull<$value> {
                let offset = ::std::mem::offset_of!($value, $field);
                unsafe {
                    ::std::ptr::NonNull::new_unchecked(
                        (node.as_ptr() as *mut u8).sub(offset) as *mut $value,
                    )
                }
            }

            fn key_of(value: ::std::ptr::NonNull<$value>) -> &'static $key {
                unsafe { &(*value.as_ptr()).$key_field }
            }
        }
    };
}
