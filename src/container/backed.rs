//! Flattening a container into one class stream

use super::MultiDexContainer;
use crate::dex::{DexFile, Opcodes};

/// A container presented as one dex file
///
/// Classes are yielded entry by entry in `dex_entry_names()` order, and in
/// each entry's native order within it. Opcodes come from the first entry.
#[derive(Debug)]
pub struct MultiDexContainerBackedDexFile<C> {
    container: C,
    opcodes: Opcodes,
}

impl<C: MultiDexContainer> MultiDexContainerBackedDexFile<C> {
    pub fn new(container: C) -> Self {
        let opcodes = container
            .dex_entry_names()
            .first()
            .and_then(|name| container.entry(name))
            .map(|entry| entry.dex_file().opcodes())
            .unwrap_or_default();
        Self { container, opcodes }
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn into_container(self) -> C {
        self.container
    }
}

impl<C: MultiDexContainer> DexFile for MultiDexContainerBackedDexFile<C> {
    type Class = <C::Dex as DexFile>::Class;

    fn opcodes(&self) -> Opcodes {
        self.opcodes
    }

    fn classes(&self) -> impl Iterator<Item = &Self::Class> + Send + '_ {
        let container = &self.container;
        container
            .dex_entry_names()
            .iter()
            .filter_map(move |name| container.entry(name))
            .flat_map(|entry| entry.dex_file().classes())
    }

    fn class_count(&self) -> usize {
        self.container
            .dex_entry_names()
            .iter()
            .filter_map(|name| self.container.entry(name))
            .map(|entry| entry.dex_file().class_count())
            .sum()
    }
}
