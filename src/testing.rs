//! Fixtures shared by the unit tests

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::dex::{ClassDef, DexFile, Opcodes, HEADER_SIZE};
use crate::error::{MultiDexError, Result};
use crate::pool::DexPool;

/// Class whose encoded size is fixed up front
#[derive(Clone, Debug)]
pub(crate) struct FakeClass {
    descriptor: String,
    size: usize,
}

impl FakeClass {
    pub(crate) fn new(descriptor: impl Into<String>, size: usize) -> Self {
        Self {
            descriptor: descriptor.into(),
            size,
        }
    }
}

impl ClassDef for FakeClass {
    fn type_descriptor(&self) -> &str {
        &self.descriptor
    }
}

#[derive(Clone, Debug)]
pub(crate) struct FakeDex {
    opcodes: Opcodes,
    classes: Vec<FakeClass>,
}

impl FakeDex {
    pub(crate) fn new(classes: Vec<FakeClass>) -> Self {
        Self {
            opcodes: Opcodes::default(),
            classes,
        }
    }

    /// `count` classes named `LC0;`, `LC1;`, ... each of `size` units
    pub(crate) fn uniform(count: usize, size: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| FakeClass::new(format!("LC{i};"), size))
                .collect(),
        )
    }
}

impl DexFile for FakeDex {
    type Class = FakeClass;

    fn opcodes(&self) -> Opcodes {
        self.opcodes
    }

    fn classes(&self) -> impl Iterator<Item = &FakeClass> + Send + '_ {
        self.classes.iter()
    }

    fn class_count(&self) -> usize {
        self.classes.len()
    }
}

/// Pool that sums class sizes and writes descriptors one per line
#[derive(Debug, Default)]
pub(crate) struct FakePool {
    used: usize,
    classes: Vec<String>,
    mark: Option<(usize, usize)>,
}

impl FakePool {
    pub(crate) fn used(&self) -> usize {
        self.used
    }

    pub(crate) fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(String::as_str).collect()
    }
}

impl DexPool for FakePool {
    type Class = FakeClass;

    fn new(_opcodes: Opcodes) -> Self {
        Self::default()
    }

    fn mark(&mut self) {
        self.mark = Some((self.used, self.classes.len()));
    }

    fn reset(&mut self) {
        if let Some((used, len)) = self.mark {
            self.used = used;
            self.classes.truncate(len);
        }
    }

    fn intern_class(&mut self, class: &FakeClass) -> Result<()> {
        if self.classes.iter().any(|c| c == &class.descriptor) {
            return Err(MultiDexError::Other(anyhow::anyhow!(
                "class {} already interned",
                class.descriptor
            )));
        }
        self.used += class.size;
        self.classes.push(class.descriptor.clone());
        Ok(())
    }

    fn has_overflowed(&self, max_pool_size: usize) -> bool {
        self.used > max_pool_size
    }

    fn write_to<W: Write>(&mut self, sink: &mut W) -> std::io::Result<()> {
        sink.write_all(self.classes.join("\n").as_bytes())
    }
}

/// Split a [`FakePool`] buffer back into class descriptors
pub(crate) fn decode_fake(buffer: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(buffer);
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').map(str::to_owned).collect()
}

/// Build a minimal dex image declaring one class per descriptor
///
/// Layout: header, string_ids, type_ids, class_defs, string data.
pub(crate) fn build_dex(descriptors: &[&str]) -> Vec<u8> {
    let n = descriptors.len();
    let string_ids_off = HEADER_SIZE;
    let type_ids_off = string_ids_off + 4 * n;
    let class_defs_off = type_ids_off + 4 * n;
    let data_off = class_defs_off + 0x20 * n;

    fn put(image: &mut [u8], offset: usize, value: u32) {
        image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    let mut image = vec![0u8; data_off];

    image[0..8].copy_from_slice(b"dex\n035\0");
    put(&mut image, 0x24, HEADER_SIZE as u32);
    put(&mut image, 0x28, 0x1234_5678);
    if n > 0 {
        put(&mut image, 0x38, n as u32);
        put(&mut image, 0x3C, string_ids_off as u32);
        put(&mut image, 0x40, n as u32);
        put(&mut image, 0x44, type_ids_off as u32);
        put(&mut image, 0x60, n as u32);
        put(&mut image, 0x64, class_defs_off as u32);
    }

    for (i, descriptor) in descriptors.iter().enumerate() {
        let string_data_off = image.len();
        assert!(descriptor.len() < 0x80, "fixture descriptors are single-byte uleb128");
        image.push(descriptor.len() as u8);
        image.extend_from_slice(descriptor.as_bytes());
        image.push(0);

        put(&mut image, string_ids_off + 4 * i, string_data_off as u32);
        put(&mut image, type_ids_off + 4 * i, i as u32);
        let item = class_defs_off + 0x20 * i;
        put(&mut image, item, i as u32);
        put(&mut image, item + 0x08, u32::MAX);
    }

    let file_size = image.len() as u32;
    put(&mut image, 0x20, file_size);
    image
}

/// Write a stored (uncompressed) zip archive with the given members
pub(crate) fn write_zip(path: &Path, members: &[(&str, Vec<u8>)]) -> anyhow::Result<()> {
    let mut writer = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in members {
        writer.start_file(*name, options)?;
        writer.write_all(data)?;
    }
    writer.finish()?;
    Ok(())
}

/// Rename a member in place by patching its local header and directory record
pub(crate) fn rename_zip_member(archive: &Path, from: &str, to: &str) -> anyhow::Result<()> {
    assert_eq!(from.len(), to.len(), "names must keep their length");
    let mut bytes = std::fs::read(archive)?;
    let mut renamed = 0;
    let mut pos = 0;
    while let Some(offset) = bytes[pos..]
        .windows(from.len())
        .position(|w| w == from.as_bytes())
    {
        let at = pos + offset;
        bytes[at..at + to.len()].copy_from_slice(to.as_bytes());
        renamed += 1;
        pos = at + to.len();
    }
    assert_eq!(renamed, 2, "expected one local header and one directory record");
    std::fs::write(archive, bytes)?;
    Ok(())
}
