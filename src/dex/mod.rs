//! DEX model shared by the reader and the writer
//!
//! This module defines the narrow contracts the rest of the crate consumes:
//! - [`ClassDef`] and [`DexFile`]: decoded class definitions and their owner
//! - [`DexReader`]: turns the bytes of one dex file into a [`DexFile`]
//! - [`Opcodes`]: the instruction set a pool encodes against
//!
//! A minimal raw decoder ([`RawDexReader`]) is provided for tooling that only
//! needs class descriptors.

mod kind;
mod raw;

pub use kind::{dex_version, detect_dex_kind, DexKind};
pub use raw::{RawClassDef, RawDexFile, RawDexReader};

use crate::error::Result;

/// DEX file header size (standard)
pub const HEADER_SIZE: usize = 0x70;

/// Oldest dex format version, used when nothing better is known
pub const DEFAULT_DEX_VERSION: u16 = 35;

/// Instruction set descriptor handed to a pool when it is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Opcodes {
    dex_version: u16,
}

impl Opcodes {
    pub const fn for_dex_version(dex_version: u16) -> Self {
        Self { dex_version }
    }

    pub fn dex_version(&self) -> u16 {
        self.dex_version
    }
}

impl Default for Opcodes {
    fn default() -> Self {
        Self::for_dex_version(DEFAULT_DEX_VERSION)
    }
}

/// A decoded class definition.
pub trait ClassDef {
    /// Type descriptor such as `Lcom/example/Foo;`, used in diagnostics.
    fn type_descriptor(&self) -> &str;
}

/// A decoded dex file: an ordered set of class definitions.
pub trait DexFile: Send + Sync {
    type Class: ClassDef + Sync;

    fn opcodes(&self) -> Opcodes;

    /// Classes in their native order.
    fn classes(&self) -> impl Iterator<Item = &Self::Class> + Send + '_;

    fn class_count(&self) -> usize;
}

/// Decodes the bytes of one dex file.
pub trait DexReader: Sync {
    type Dex: DexFile;

    /// `name` identifies the source in error messages.
    fn read_dex(&self, name: &str, data: Vec<u8>) -> Result<Self::Dex>;
}
