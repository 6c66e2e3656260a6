//! One raw dex file presented as a container

use std::path::{Path, PathBuf};

use super::{BaseContainer, DexEntry, EntryMap, MultiDexContainer};
use crate::dex::DexFile;

/// Container holding exactly one dex file
#[derive(Debug)]
pub struct SingletonDexContainer<D> {
    path: PathBuf,
    pub(super) base: BaseContainer<D>,
}

impl<D> SingletonDexContainer<D> {
    /// Wrap `dex_file` as the only entry, named `entry_name`.
    pub fn new(path: impl Into<PathBuf>, entry_name: impl Into<String>, dex_file: D) -> Self {
        Self {
            path: path.into(),
            base: BaseContainer::from_entries(EntryMap::single(entry_name, dex_file)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<D: DexFile> MultiDexContainer for SingletonDexContainer<D> {
    type Dex = D;

    fn dex_entry_names(&self) -> &[String] {
        self.base.entry_names()
    }

    fn entry(&self, entry_name: &str) -> Option<DexEntry<'_, Self>> {
        let (name, dex) = self.base.get(entry_name)?;
        Some(DexEntry::new(self, name, dex))
    }
}
