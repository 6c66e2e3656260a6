//! Capacity-bounded encoder contract
//!
//! A [`DexPool`] accumulates class definitions for one output dex file and
//! reports when the accumulated content no longer fits a capacity limit. The
//! writer discovers dex boundaries lazily: it marks the pool, interns the next
//! class, and rolls back to the mark when the pool overflows.

use std::io::Write;

use crate::dex::Opcodes;
use crate::error::Result;

/// Encoder that interns classes into one dex file
pub trait DexPool: Sized {
    type Class: ?Sized;

    fn new(opcodes: Opcodes) -> Self;

    /// Remember the current state for a later [`DexPool::reset`].
    fn mark(&mut self);

    /// Roll back to the last mark.
    fn reset(&mut self);

    fn intern_class(&mut self, class: &Self::Class) -> Result<()>;

    /// True once any item section exceeds `max_pool_size` entries.
    fn has_overflowed(&self, max_pool_size: usize) -> bool;

    fn write_to<W: Write>(&mut self, sink: &mut W) -> std::io::Result<()>;
}

/// Mark taken on a pool, closed by exactly one of `commit` or `rollback`.
#[must_use = "a pool transaction must be committed or rolled back"]
pub struct PoolTransaction<'p, P: DexPool> {
    pool: &'p mut P,
}

impl<'p, P: DexPool> PoolTransaction<'p, P> {
    pub fn begin(pool: &'p mut P) -> Self {
        pool.mark();
        Self { pool }
    }

    pub fn intern_class(&mut self, class: &P::Class) -> Result<()> {
        self.pool.intern_class(class)
    }

    pub fn has_overflowed(&self, max_pool_size: usize) -> bool {
        self.pool.has_overflowed(max_pool_size)
    }

    /// Keep everything interned since the mark.
    pub fn commit(self) {}

    /// Discard everything interned since the mark.
    pub fn rollback(self) {
        self.pool.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClass, FakePool};

    #[test]
    fn rollback_restores_marked_state() {
        let mut pool = FakePool::new(Opcodes::default());
        pool.intern_class(&FakeClass::new("LA;", 10)).unwrap();

        let mut tx = PoolTransaction::begin(&mut pool);
        tx.intern_class(&FakeClass::new("LB;", 20)).unwrap();
        assert!(tx.has_overflowed(25));
        tx.rollback();

        assert_eq!(pool.used(), 10);
        assert_eq!(pool.class_names(), vec!["LA;"]);
    }

    #[test]
    fn commit_keeps_interned_classes() {
        let mut pool = FakePool::new(Opcodes::default());

        let mut tx = PoolTransaction::begin(&mut pool);
        tx.intern_class(&FakeClass::new("LA;", 10)).unwrap();
        assert!(!tx.has_overflowed(10));
        tx.commit();

        assert_eq!(pool.used(), 10);
    }
}
