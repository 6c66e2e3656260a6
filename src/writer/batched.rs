//! Batched access to a class stream shared by writer threads

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::split::ClassCursor;
use crate::naming::{DexFileNameIterator, DexFileNamer};

/// State shared by all writer threads, guarded by one lock
///
/// Taking a batch of classes and issuing a dex name happen under the same
/// lock so names stay gap-free whatever the thread interleaving.
pub(crate) struct SharedCursor<'n, I, N: ?Sized> {
    classes: I,
    names: DexFileNameIterator<'n, N>,
}

impl<'n, I, N: DexFileNamer + ?Sized> SharedCursor<'n, I, N> {
    pub(crate) fn new(classes: I, names: DexFileNameIterator<'n, N>) -> Self {
        Self { classes, names }
    }

    pub(crate) fn issued(&self) -> usize {
        self.names.issued()
    }
}

/// Per-thread view of the shared class stream
///
/// Classes are pulled in batches under the shared lock and then served from
/// a private buffer without contention.
pub(crate) struct BatchedClasses<'s, 'n, 'd, C: ?Sized, I, N: ?Sized> {
    shared: &'s Mutex<SharedCursor<'n, I, N>>,
    batch: VecDeque<&'d C>,
    batch_size: usize,
}

impl<'s, 'n, 'd, C, I, N> BatchedClasses<'s, 'n, 'd, C, I, N>
where
    C: ?Sized + 'd,
    I: Iterator<Item = &'d C>,
    N: DexFileNamer + ?Sized,
{
    /// Create a view and load its first batch.
    pub(crate) fn new(shared: &'s Mutex<SharedCursor<'n, I, N>>, batch_size: usize) -> Self {
        let mut batched = Self {
            shared,
            batch: VecDeque::with_capacity(batch_size),
            batch_size,
        };
        batched.load_batch();
        batched
    }

    /// Whether the private buffer holds classes right now.
    pub(crate) fn has_buffered(&self) -> bool {
        !self.batch.is_empty()
    }

    fn load_batch(&mut self) {
        let mut shared = self.shared.lock();
        Self::preload_batch(&mut self.batch, self.batch_size, &mut shared.classes);
    }

    /// Refill an exhausted buffer; the caller holds the shared lock.
    fn preload_batch(batch: &mut VecDeque<&'d C>, batch_size: usize, classes: &mut I) {
        if batch.is_empty() {
            batch.extend(classes.by_ref().take(batch_size));
        }
    }
}

impl<'s, 'n, 'd, C, I, N> ClassCursor<'d, C> for BatchedClasses<'s, 'n, 'd, C, I, N>
where
    C: ?Sized + 'd,
    I: Iterator<Item = &'d C>,
    N: DexFileNamer + ?Sized,
{
    fn peek(&mut self) -> Option<&'d C> {
        if self.batch.is_empty() {
            self.load_batch();
        }
        self.batch.front().copied()
    }

    fn advance(&mut self) {
        if self.batch.is_empty() {
            self.load_batch();
        }
        self.batch.pop_front();
    }

    fn next_dex_name(&mut self) -> String {
        let mut shared = self.shared.lock();
        let name = shared.names.next().unwrap_or_default();
        Self::preload_batch(&mut self.batch, self.batch_size, &mut shared.classes);
        name
    }
}
