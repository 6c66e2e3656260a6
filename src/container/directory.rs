//! A directory of dex files as a container

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{BaseContainer, DexEntry, EntryMap, MultiDexContainer};
use crate::dex::{DexFile, DexReader};
use crate::error::{MultiDexError, Result};
use crate::naming::{DexFileNameComparator, DexFileNamer};

/// Container over the dex files of one directory
///
/// Only regular files whose names the namer recognizes become entries; they
/// are inserted in name order.
#[derive(Debug)]
pub struct DirectoryDexContainer<D> {
    path: PathBuf,
    pub(super) base: BaseContainer<D>,
}

impl<D: DexFile> DirectoryDexContainer<D> {
    pub fn open<N, R>(directory: &Path, namer: &N, reader: &R) -> Result<Self>
    where
        N: DexFileNamer + ?Sized,
        R: DexReader<Dex = D> + ?Sized,
    {
        let io_err =
            |e: std::io::Error| MultiDexError::from_io_error(directory.display().to_string(), e);

        let mut names = Vec::new();
        for entry in fs::read_dir(directory).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            // follows symlinks
            if !entry.path().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if namer.is_valid_name(&name) {
                names.push(name);
            }
        }
        DexFileNameComparator::new(namer).sort(&mut names);

        let mut entries = EntryMap::new();
        for name in names {
            let file = directory.join(&name);
            let file_name = file.display().to_string();
            let data =
                fs::read(&file).map_err(|e| MultiDexError::from_io_error(file_name.clone(), e))?;
            debug!(file = %file_name, bytes = data.len(), "reading dex entry");
            let dex = reader.read_dex(&file_name, data)?;
            entries.insert(name, dex)?;
        }

        let base = BaseContainer::new();
        base.initialize(entries)?;
        Ok(Self {
            path: directory.to_path_buf(),
            base,
        })
    }
}

impl<D> DirectoryDexContainer<D> {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<D: DexFile> MultiDexContainer for DirectoryDexContainer<D> {
    type Dex = D;

    fn dex_entry_names(&self) -> &[String] {
        self.base.entry_names()
    }

    fn entry(&self, entry_name: &str) -> Option<DexEntry<'_, Self>> {
        let (name, dex) = self.base.get(entry_name)?;
        Some(DexEntry::new(self, name, dex))
    }
}
