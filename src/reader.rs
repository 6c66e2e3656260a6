//! Resolving a filesystem path into a dex container
//!
//! A path is read as a directory of dex files, a zip archive, or a single raw
//! dex file, in that order. The validated variants reject empty sources and,
//! unless multi-dex input is allowed, sources holding more than one dex.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::container::{
    is_zip_file, DirectoryDexContainer, FileDexContainer, MultiDexContainer,
    MultiDexContainerBackedDexFile, SingletonDexContainer, ZipFileDexContainer,
};
use crate::dex::{DexFile, DexReader};
use crate::error::{MultiDexError, Result};
use crate::logger::DexLogger;
use crate::naming::DexFileNamer;

/// Open `path` as whichever container kind it holds
pub fn read_multi_dex_container<D, N, R>(
    path: &Path,
    namer: &N,
    reader: &R,
) -> Result<FileDexContainer<D>>
where
    D: DexFile,
    N: DexFileNamer + ?Sized,
    R: DexReader<Dex = D> + ?Sized,
{
    if path.is_dir() {
        return DirectoryDexContainer::open(path, namer, reader).map(FileDexContainer::Directory);
    }
    if !path.is_file() {
        return Err(MultiDexError::NotFound(path.to_path_buf()));
    }
    if is_zip_file(path)? {
        return ZipFileDexContainer::open(path, namer, reader).map(FileDexContainer::Zip);
    }

    let data =
        fs::read(path).map_err(|e| MultiDexError::from_io_error(path.display().to_string(), e))?;
    let entry_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dex = reader.read_dex(&path.display().to_string(), data)?;
    Ok(FileDexContainer::Singleton(SingletonDexContainer::new(
        path, entry_name, dex,
    )))
}

/// Open `path` and report every entry to `logger` in entry order
pub fn read_multi_dex_container_logged<D, N, R>(
    path: &Path,
    namer: &N,
    reader: &R,
    logger: &dyn DexLogger,
) -> Result<FileDexContainer<D>>
where
    D: DexFile,
    N: DexFileNamer + ?Sized,
    R: DexReader<Dex = D> + ?Sized,
{
    let container = read_multi_dex_container(path, namer, reader)?;
    log_entries(&container, path, logger);
    Ok(container)
}

/// Open `path` and check its entry count
///
/// Fails with [`MultiDexError::EmptyContainer`] when no dex was found and,
/// unless `multi_dex` is set, with [`MultiDexError::MultiDexDetected`] when
/// more than one was.
pub fn read_validated<D, N, R>(
    multi_dex: bool,
    path: &Path,
    namer: &N,
    reader: &R,
    logger: Option<&dyn DexLogger>,
) -> Result<FileDexContainer<D>>
where
    D: DexFile,
    N: DexFileNamer + ?Sized,
    R: DexReader<Dex = D> + ?Sized,
{
    let container = read_multi_dex_container(path, namer, reader)?;
    let entries = container.dex_entry_names().len();
    debug!(path = %path.display(), kind = container.kind(), entries, "resolved container");

    if entries == 0 {
        return Err(MultiDexError::EmptyContainer(path.to_path_buf()));
    }
    if !multi_dex && entries > 1 {
        return Err(MultiDexError::MultiDexDetected(path.to_path_buf()));
    }
    if let Some(logger) = logger {
        log_entries(&container, path, logger);
    }
    Ok(container)
}

/// Open `path` as one dex file flattening all of its entries
pub fn read_dex_file<D, N, R>(
    multi_dex: bool,
    path: &Path,
    namer: &N,
    reader: &R,
    logger: Option<&dyn DexLogger>,
) -> Result<MultiDexContainerBackedDexFile<FileDexContainer<D>>>
where
    D: DexFile,
    N: DexFileNamer + ?Sized,
    R: DexReader<Dex = D> + ?Sized,
{
    read_validated(multi_dex, path, namer, reader, logger).map(MultiDexContainerBackedDexFile::new)
}

fn log_entries<C: MultiDexContainer>(container: &C, path: &Path, logger: &dyn DexLogger) {
    for name in container.dex_entry_names() {
        if let Some(entry) = container.entry(name) {
            logger.log(path, entry.entry_name(), entry.dex_file().class_count());
        }
    }
}
