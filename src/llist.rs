//! A minimal intrusive, circular, doubly linked list node.
//!
//! Free chunks borrow two words of their own payload space to act as
//! `LlistNode`s (see `chunk::FreeView`); this type only knows about the
//! two pointers, not what it's embedded in.
//!
//! Being circular means every bin's sentinel is a valid list all on its
//! own (`next == prev == self`) with no special-cased empty state, and
//! removing a node never needs a reference to the list's head.
//!
//! ### Safety
//! `LlistNode`s must never be moved once linked; the list is held together
//! by raw pointers embedded in chunk memory, not by Rust's ownership.

#[derive(Debug)]
pub(crate) struct LlistNode {
    pub prev: *mut LlistNode,
    pub next: *mut LlistNode,
}

impl LlistNode {
    /// Initialize `node` as a standalone, self-linked list (e.g. a sentinel).
    /// ### Safety
    /// `node` must be valid for writes and properly aligned.
    #[inline]
    pub unsafe fn new_standalone(node: *mut Self) {
        node.write(Self { prev: node, next: node });
    }

    /// Insert `node` into a list, directly after `after`.
    /// ### Safety
    /// `node` must be `ptr::write`-able; `after` must be dereferencable and valid.
    #[inline]
    pub unsafe fn insert_after(after: *mut Self, node: *mut Self) {
        let next = (*after).next;
        node.write(Self { prev: after, next });
        (*next).prev = node;
        (*after).next = node;
    }

    /// Remove `node` from whatever list it's linked into.
    /// ### Safety
    /// `node` must be dereferencable and valid.
    #[inline]
    pub unsafe fn remove(node: *mut Self) {
        let prev = (*node).prev;
        let next = (*node).next;
        (*prev).next = next;
        (*next).prev = prev;
    }

    /// Iterate the real (non-sentinel) nodes of a list, starting after `sentinel`.
    /// ### Safety
    /// `sentinel`'s list must remain valid for the lifetime of the iterator.
    #[inline]
    pub unsafe fn iter(sentinel: *mut Self) -> Iter {
        Iter { sentinel, curr: (*sentinel).next }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Iter {
    sentinel: *mut LlistNode,
    curr: *mut LlistNode,
}

impl Iterator for Iter {
    type Item = *mut LlistNode;

    fn next(&mut self) -> Option<Self::Item> {
        if self.curr == self.sentinel {
            None
        } else {
            let ret = self.curr;
            self.curr = unsafe { (*self.curr).next };
            Some(ret)
        }
    }
}


#[cfg(test)]
extern crate alloc;
