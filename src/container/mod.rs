//! Multi-dex containers
//!
//! A container maps entry names to decoded dex files. It is populated once
//! and immutable afterwards; its entry names are snapshotted at
//! initialization so iteration order never changes.
//!
//! Concrete containers:
//! - [`SingletonDexContainer`]: one raw dex file
//! - [`DirectoryDexContainer`]: the recognized dex files of a directory
//! - [`ZipFileDexContainer`]: the recognized dex members of a zip archive

mod archive;
mod backed;
mod directory;
mod singleton;

pub use archive::{is_zip_file, ZipFileDexContainer};
pub use backed::MultiDexContainerBackedDexFile;
pub use directory::DirectoryDexContainer;
pub use singleton::SingletonDexContainer;

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::dex::DexFile;
use crate::error::{MultiDexError, Result};

/// Read interface shared by every container
pub trait MultiDexContainer: Send + Sync {
    type Dex: DexFile;

    /// Entry names in their fixed iteration order.
    fn dex_entry_names(&self) -> &[String];

    fn entry(&self, entry_name: &str) -> Option<DexEntry<'_, Self>>;
}

/// One named dex file inside a container
pub struct DexEntry<'c, C: MultiDexContainer + ?Sized> {
    container: &'c C,
    entry_name: &'c str,
    dex_file: &'c C::Dex,
}

impl<'c, C: MultiDexContainer + ?Sized> DexEntry<'c, C> {
    pub fn new(container: &'c C, entry_name: &'c str, dex_file: &'c C::Dex) -> Self {
        Self {
            container,
            entry_name,
            dex_file,
        }
    }

    pub fn container(&self) -> &'c C {
        self.container
    }

    pub fn entry_name(&self) -> &'c str {
        self.entry_name
    }

    pub fn dex_file(&self) -> &'c C::Dex {
        self.dex_file
    }
}

impl<C: MultiDexContainer + ?Sized> Clone for DexEntry<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: MultiDexContainer + ?Sized> Copy for DexEntry<'_, C> {}

/// Entries collected while a container is being built
///
/// Insertion order is kept and becomes the container's entry-name order.
#[derive(Debug)]
pub struct EntryMap<D> {
    entries: HashMap<String, D>,
    order: Vec<String>,
}

impl<D> EntryMap<D> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// A map holding exactly one entry.
    pub fn single(entry_name: impl Into<String>, dex_file: D) -> Self {
        let entry_name = entry_name.into();
        Self {
            order: vec![entry_name.clone()],
            entries: HashMap::from([(entry_name, dex_file)]),
        }
    }

    /// Add an entry, failing if `entry_name` is already present.
    pub fn insert(&mut self, entry_name: impl Into<String>, dex_file: D) -> Result<()> {
        let entry_name = entry_name.into();
        if self.entries.contains_key(&entry_name) {
            return Err(MultiDexError::duplicate_entry_name(entry_name));
        }
        self.order.push(entry_name.clone());
        self.entries.insert(entry_name, dex_file);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<D> Default for EntryMap<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct EntryTable<D> {
    entries: HashMap<String, D>,
    names: Box<[String]>,
}

/// Storage shared by the concrete containers
#[derive(Debug)]
pub struct BaseContainer<D> {
    table: OnceLock<EntryTable<D>>,
}

impl<D> BaseContainer<D> {
    /// An uninitialized container; see [`BaseContainer::initialize`].
    pub fn new() -> Self {
        Self {
            table: OnceLock::new(),
        }
    }

    pub fn from_entries(entries: EntryMap<D>) -> Self {
        Self {
            table: OnceLock::from(EntryTable::from(entries)),
        }
    }

    /// Install the entries. Fails if the container already holds entries.
    pub fn initialize(&self, entries: EntryMap<D>) -> Result<()> {
        self.table
            .set(EntryTable::from(entries))
            .map_err(|_| MultiDexError::AlreadyInitialized)
    }

    pub fn entry_names(&self) -> &[String] {
        self.table.get().map_or(&[][..], |table| &table.names[..])
    }

    pub fn get(&self, entry_name: &str) -> Option<(&str, &D)> {
        self.table
            .get()?
            .entries
            .get_key_value(entry_name)
            .map(|(name, dex)| (name.as_str(), dex))
    }

    pub fn duplicate_entry_name(entry_name: impl Into<String>) -> MultiDexError {
        MultiDexError::duplicate_entry_name(entry_name)
    }
}

impl<D> Default for BaseContainer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> From<EntryMap<D>> for EntryTable<D> {
    fn from(map: EntryMap<D>) -> Self {
        Self {
            entries: map.entries,
            names: map.order.into_boxed_slice(),
        }
    }
}

/// Any container the read orchestrator can resolve from a path
#[derive(Debug)]
pub enum FileDexContainer<D> {
    Directory(DirectoryDexContainer<D>),
    Zip(ZipFileDexContainer<D>),
    Singleton(SingletonDexContainer<D>),
}

impl<D> FileDexContainer<D> {
    pub fn kind(&self) -> &'static str {
        match self {
            FileDexContainer::Directory(_) => "directory",
            FileDexContainer::Zip(_) => "zip",
            FileDexContainer::Singleton(_) => "dex",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FileDexContainer::Directory(c) => c.path(),
            FileDexContainer::Zip(c) => c.path(),
            FileDexContainer::Singleton(c) => c.path(),
        }
    }

    fn base(&self) -> &BaseContainer<D> {
        match self {
            FileDexContainer::Directory(c) => &c.base,
            FileDexContainer::Zip(c) => &c.base,
            FileDexContainer::Singleton(c) => &c.base,
        }
    }
}

impl<D: DexFile> MultiDexContainer for FileDexContainer<D> {
    type Dex = D;

    fn dex_entry_names(&self) -> &[String] {
        self.base().entry_names()
    }

    fn entry(&self, entry_name: &str) -> Option<DexEntry<'_, Self>> {
        let (name, dex) = self.base().get(entry_name)?;
        Some(DexEntry::new(self, name, dex))
    }
}
