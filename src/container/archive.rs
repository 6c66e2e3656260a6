//! Zip archives (APK, JAR) as dex containers
//!
//! The `zip` crate keeps one record per member name, so duplicate members are
//! found by walking the central directory before the archive is opened.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use super::{BaseContainer, DexEntry, EntryMap, MultiDexContainer};
use crate::dex::{DexFile, DexReader};
use crate::error::{MultiDexError, Result};
use crate::naming::{DexFileNameComparator, DexFileNamer};

/// Local file header signature that opens every zip archive
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// End of central directory record
const EOCD_SIGNATURE: [u8; 4] = *b"PK\x05\x06";
const EOCD_SIZE: usize = 22;
/// Central directory file header
const CDFH_SIGNATURE: [u8; 4] = *b"PK\x01\x02";
const CDFH_SIZE: usize = 46;

/// Check whether the leading bytes of `path` identify a zip archive
pub fn is_zip_file(path: &Path) -> Result<bool> {
    let io_err = |e: io::Error| MultiDexError::from_io_error(path.display().to_string(), e);
    let mut file = File::open(path).map_err(io_err)?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == ZIP_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(io_err(e)),
    }
}

/// Container over the dex members of a zip archive (APK, JAR)
///
/// Members whose names the namer recognizes become entries, in name order;
/// everything else in the archive is skipped.
#[derive(Debug)]
pub struct ZipFileDexContainer<D> {
    path: PathBuf,
    pub(super) base: BaseContainer<D>,
}

impl<D: DexFile> ZipFileDexContainer<D> {
    pub fn open<N, R>(path: &Path, namer: &N, reader: &R) -> Result<Self>
    where
        N: DexFileNamer + ?Sized,
        R: DexReader<Dex = D> + ?Sized,
    {
        let zip_err = |e: zip::result::ZipError| MultiDexError::from_zip_error(path, e);
        let io_err = |e: io::Error| MultiDexError::from_io_error(path.display().to_string(), e);
        let mut file = File::open(path).map_err(io_err)?;
        if let Some(names) = central_directory_names(&mut file).map_err(io_err)? {
            let mut seen = HashSet::new();
            for name in names.into_iter().filter(|n| namer.is_valid_name(n)) {
                if !seen.insert(name.clone()) {
                    return Err(BaseContainer::<D>::duplicate_entry_name(name));
                }
            }
        }
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;

        let mut members = Vec::new();
        for index in 0..archive.len() {
            let mut member = archive.by_index(index).map_err(zip_err)?;
            if member.is_dir() || !namer.is_valid_name(member.name()) {
                continue;
            }
            let name = member.name().to_owned();
            let mut data = Vec::new();
            member.read_to_end(&mut data).map_err(|e| {
                MultiDexError::from_io_error(format!("{}!{name}", path.display()), e)
            })?;
            members.push((name, data));
        }
        let comparator = DexFileNameComparator::new(namer);
        members.sort_by(|(l, _), (r, _)| comparator.compare(l, r));

        let mut entries = EntryMap::new();
        for (name, data) in members {
            let source = format!("{}!{name}", path.display());
            debug!(member = %source, bytes = data.len(), "reading dex entry");
            let dex = reader.read_dex(&source, data)?;
            entries.insert(name, dex)?;
        }

        if entries.is_empty() {
            debug!(archive = %path.display(), "no dex members found");
        }
        let base = BaseContainer::new();
        base.initialize(entries)?;
        Ok(Self {
            path: path.to_path_buf(),
            base,
        })
    }
}

/// Member names of every central directory record, in archive order
///
/// Returns `None` when the directory cannot be walked here (zip64 or a
/// damaged trailer) and the zip reader is left to judge the archive.
fn central_directory_names<R: Read + Seek>(reader: &mut R) -> io::Result<Option<Vec<String>>> {
    let len = reader.seek(SeekFrom::End(0))?;
    let tail_len = len.min((EOCD_SIZE + usize::from(u16::MAX)) as u64);
    reader.seek(SeekFrom::Start(len - tail_len))?;
    let mut tail = vec![0u8; tail_len as usize];
    reader.read_exact(&mut tail)?;

    let Some(eocd) = tail
        .windows(4)
        .rposition(|w| w == EOCD_SIGNATURE)
        .filter(|&pos| pos + EOCD_SIZE <= tail.len())
    else {
        return Ok(None);
    };
    let u16_at = |buf: &[u8], at: usize| usize::from(u16::from_le_bytes([buf[at], buf[at + 1]]));
    let record_count = u16_at(&tail[..], eocd + 10);
    let cd_size = u32::from_le_bytes([
        tail[eocd + 12],
        tail[eocd + 13],
        tail[eocd + 14],
        tail[eocd + 15],
    ]);
    if record_count == usize::from(u16::MAX) || cd_size == u32::MAX {
        return Ok(None);
    }

    // the directory ends where the trailer starts, whatever prefix the file has
    let eocd_offset = len - tail_len + eocd as u64;
    let Some(cd_offset) = eocd_offset.checked_sub(u64::from(cd_size)) else {
        return Ok(None);
    };
    reader.seek(SeekFrom::Start(cd_offset))?;
    let mut directory = vec![0u8; cd_size as usize];
    reader.read_exact(&mut directory)?;

    let mut names = Vec::with_capacity(record_count);
    let mut pos = 0;
    while pos + CDFH_SIZE <= directory.len() && directory[pos..pos + 4] == CDFH_SIGNATURE {
        let name_len = u16_at(&directory[..], pos + 28);
        let extra_len = u16_at(&directory[..], pos + 30);
        let comment_len = u16_at(&directory[..], pos + 32);
        let name_start = pos + CDFH_SIZE;
        let Some(name) = directory.get(name_start..name_start + name_len) else {
            return Ok(None);
        };
        names.push(String::from_utf8_lossy(name).into_owned());
        pos = name_start + name_len + extra_len + comment_len;
    }
    if names.len() != record_count {
        return Ok(None);
    }
    Ok(Some(names))
}

impl<D> ZipFileDexContainer<D> {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<D: DexFile> MultiDexContainer for ZipFileDexContainer<D> {
    type Dex = D;

    fn dex_entry_names(&self) -> &[String] {
        self.base.entry_names()
    }

    fn entry(&self, entry_name: &str) -> Option<DexEntry<'_, Self>> {
        let (name, dex) = self.base.get(entry_name)?;
        Some(DexEntry::new(self, name, dex))
    }
}
