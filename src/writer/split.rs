//! The per-dex split loop
//!
//! Classes are interned until the pool overflows; the overflowing class is
//! rolled back and opens the next dex file.

use std::iter::Peekable;

use tracing::debug;

use crate::dex::{ClassDef, Opcodes};
use crate::error::{MultiDexError, Result};
use crate::naming::{DexFileNameIterator, DexFileNamer};
use crate::pool::{DexPool, PoolTransaction};

/// Dex files produced by one writer, in the order they were closed
pub(crate) type WrittenDexFiles = Vec<(String, Vec<u8>)>;

/// Source of classes and dex names for the split loop
pub(crate) trait ClassCursor<'d, C: ?Sized + 'd> {
    fn peek(&mut self) -> Option<&'d C>;

    fn advance(&mut self);

    /// Name for the dex file just filled.
    fn next_dex_name(&mut self) -> String;
}

/// Unshared cursor used by the single-threaded writer
pub(crate) struct SequentialCursor<'n, I: Iterator, N: ?Sized> {
    classes: Peekable<I>,
    names: DexFileNameIterator<'n, N>,
}

impl<'n, I: Iterator, N: DexFileNamer + ?Sized> SequentialCursor<'n, I, N> {
    pub(crate) fn new(classes: I, names: DexFileNameIterator<'n, N>) -> Self {
        Self {
            classes: classes.peekable(),
            names,
        }
    }

    pub(crate) fn issued(&self) -> usize {
        self.names.issued()
    }
}

impl<'d, 'n, C, I, N> ClassCursor<'d, C> for SequentialCursor<'n, I, N>
where
    C: ?Sized + 'd,
    I: Iterator<Item = &'d C>,
    N: DexFileNamer + ?Sized,
{
    fn peek(&mut self) -> Option<&'d C> {
        self.classes.peek().copied()
    }

    fn advance(&mut self) {
        self.classes.next();
    }

    fn next_dex_name(&mut self) -> String {
        self.names.next().unwrap_or_default()
    }
}

/// Fill dex files from `cursor` until it runs dry
///
/// The main dex floor (`min_main_dex_class_count`, `minimal_main_dex`)
/// applies to the first dex only.
pub(crate) fn write_dex_files<'d, P, S>(
    output: &mut WrittenDexFiles,
    cursor: &mut S,
    mut min_main_dex_class_count: usize,
    mut minimal_main_dex: bool,
    opcodes: Opcodes,
    max_dex_pool_size: usize,
) -> Result<()>
where
    P: DexPool,
    P::Class: ClassDef + 'd,
    S: ClassCursor<'d, P::Class>,
{
    while cursor.peek().is_some() {
        let mut pool = P::new(opcodes);
        let mut file_class_count = 0;
        while let Some(class) = cursor.peek() {
            if minimal_main_dex && file_class_count >= min_main_dex_class_count {
                break;
            }
            let mut tx = PoolTransaction::begin(&mut pool);
            tx.intern_class(class)?;
            if tx.has_overflowed(max_dex_pool_size) {
                check_overflow(class, file_class_count, min_main_dex_class_count)?;
                tx.rollback();
                break;
            }
            tx.commit();
            cursor.advance();
            file_class_count += 1;
        }

        let dex_name = cursor.next_dex_name();
        let mut buffer = Vec::new();
        pool.write_to(&mut buffer)
            .map_err(|e| MultiDexError::from_io_error(dex_name.clone(), e))?;
        debug!(
            dex = %dex_name,
            classes = file_class_count,
            bytes = buffer.len(),
            "closed dex file"
        );
        output.push((dex_name, buffer));

        min_main_dex_class_count = 0;
        minimal_main_dex = false;
    }
    Ok(())
}

/// Fail when an overflow cannot be resolved by starting a new dex file
pub(crate) fn check_overflow<C: ClassDef + ?Sized>(
    class: &C,
    class_count: usize,
    min_class_count: usize,
) -> Result<()> {
    if class_count < min_class_count {
        return Err(MultiDexError::PoolOverflow {
            position: class_count + 1,
            required: min_class_count,
        });
    }
    if class_count == 0 {
        return Err(MultiDexError::ClassTooLarge(
            class.type_descriptor().to_owned(),
        ));
    }
    Ok(())
}
