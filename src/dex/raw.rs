//! Minimal raw DEX decoding
//!
//! Only the parts of the format needed to enumerate class definitions are
//! read: the header, `string_ids`, `type_ids`, and `class_defs`. Everything
//! else in the image is ignored.

use std::path::PathBuf;

use super::kind::{dex_version, detect_dex_kind, DexKind};
use super::{ClassDef, DexFile, DexReader, Opcodes, HEADER_SIZE};
use crate::error::{MultiDexError, Result};

/// DEX header offsets
const STRING_IDS_SIZE_OFFSET: usize = 0x38;
const STRING_IDS_OFF_OFFSET: usize = 0x3C;
const TYPE_IDS_SIZE_OFFSET: usize = 0x40;
const TYPE_IDS_OFF_OFFSET: usize = 0x44;
const CLASS_DEFS_SIZE_OFFSET: usize = 0x60;
const CLASS_DEFS_OFF_OFFSET: usize = 0x64;

const CLASS_DEF_ITEM_SIZE: usize = 0x20;

/// A class definition known only by its type descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawClassDef {
    type_descriptor: String,
}

impl RawClassDef {
    pub fn new(type_descriptor: impl Into<String>) -> Self {
        Self {
            type_descriptor: type_descriptor.into(),
        }
    }
}

impl ClassDef for RawClassDef {
    fn type_descriptor(&self) -> &str {
        &self.type_descriptor
    }
}

/// Class list of one decoded dex image
#[derive(Clone, Debug)]
pub struct RawDexFile {
    opcodes: Opcodes,
    classes: Vec<RawClassDef>,
}

impl RawDexFile {
    /// Decode `data`, deriving opcodes from the header unless `opcodes` is given.
    pub fn parse(name: &str, data: &[u8], opcodes: Option<Opcodes>) -> Result<Self> {
        let version = match detect_dex_kind(data) {
            Some(DexKind::Dex) => dex_version(data),
            Some(kind) => {
                return Err(MultiDexError::malformed(
                    name,
                    format!("{} images are not supported", kind.as_str()),
                ))
            }
            None => return Err(MultiDexError::InvalidDexMagic(PathBuf::from(name))),
        };
        if data.len() < HEADER_SIZE {
            return Err(MultiDexError::malformed(name, "truncated header"));
        }

        let image = Image { name, data };
        let class_defs_size = image.u32_at(CLASS_DEFS_SIZE_OFFSET)? as usize;
        let class_defs_off = image.u32_at(CLASS_DEFS_OFF_OFFSET)? as usize;

        let mut classes = Vec::with_capacity(class_defs_size.min(data.len() / CLASS_DEF_ITEM_SIZE));
        for i in 0..class_defs_size {
            let item = class_defs_off + i * CLASS_DEF_ITEM_SIZE;
            let class_idx = image.u32_at(item)?;
            classes.push(RawClassDef::new(image.type_descriptor(class_idx)?));
        }

        let opcodes = opcodes
            .or_else(|| version.map(Opcodes::for_dex_version))
            .unwrap_or_default();
        Ok(Self { opcodes, classes })
    }

    pub fn from_classes(opcodes: Opcodes, classes: Vec<RawClassDef>) -> Self {
        Self { opcodes, classes }
    }
}

impl DexFile for RawDexFile {
    type Class = RawClassDef;

    fn opcodes(&self) -> Opcodes {
        self.opcodes
    }

    fn classes(&self) -> impl Iterator<Item = &RawClassDef> + Send + '_ {
        self.classes.iter()
    }

    fn class_count(&self) -> usize {
        self.classes.len()
    }
}

/// Decoder producing [`RawDexFile`] values
#[derive(Clone, Copy, Debug, Default)]
pub struct RawDexReader {
    opcodes: Option<Opcodes>,
}

impl RawDexReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force every decoded file to use `opcodes` instead of its header version.
    pub fn with_opcodes(opcodes: Opcodes) -> Self {
        Self {
            opcodes: Some(opcodes),
        }
    }
}

impl DexReader for RawDexReader {
    type Dex = RawDexFile;

    fn read_dex(&self, name: &str, data: Vec<u8>) -> Result<RawDexFile> {
        RawDexFile::parse(name, &data, self.opcodes)
    }
}

struct Image<'a> {
    name: &'a str,
    data: &'a [u8],
}

impl Image<'_> {
    fn u32_at(&self, offset: usize) -> Result<u32> {
        offset
            .checked_add(4)
            .and_then(|end| self.data.get(offset..end))
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| {
                MultiDexError::malformed(self.name, format!("offset {offset:#x} out of bounds"))
            })
    }

    fn id_at(&self, size_offset: usize, off_offset: usize, index: u32) -> Result<u32> {
        let size = self.u32_at(size_offset)?;
        if index >= size {
            return Err(MultiDexError::malformed(
                self.name,
                format!("index {index} exceeds id table of {size}"),
            ));
        }
        let base = self.u32_at(off_offset)? as usize;
        self.u32_at(base + index as usize * 4)
    }

    fn type_descriptor(&self, type_idx: u32) -> Result<String> {
        let descriptor_idx = self.id_at(TYPE_IDS_SIZE_OFFSET, TYPE_IDS_OFF_OFFSET, type_idx)?;
        let string_data_off =
            self.id_at(STRING_IDS_SIZE_OFFSET, STRING_IDS_OFF_OFFSET, descriptor_idx)? as usize;
        self.string_data(string_data_off)
    }

    fn string_data(&self, offset: usize) -> Result<String> {
        let truncated = || MultiDexError::malformed(self.name, "truncated string data");
        let data = self.data.get(offset..).ok_or_else(truncated)?;

        // utf16_size as uleb128, not needed beyond skipping it
        let mut pos = 0;
        loop {
            let byte = *data.get(pos).ok_or_else(truncated)?;
            pos += 1;
            if byte & 0x80 == 0 {
                break;
            }
            if pos == 5 {
                return Err(MultiDexError::malformed(self.name, "invalid uleb128"));
            }
        }

        let rest = &data[pos..];
        let len = rest.iter().position(|&b| b == 0).ok_or_else(truncated)?;
        Ok(String::from_utf8_lossy(&rest[..len]).into_owned())
    }
}
