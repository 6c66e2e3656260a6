//! Sequential dex file names
//!
//! A [`DexFileNamer`] maps ordinals to names and back. [`DexFileNameIterator`]
//! hands out names in sequence during a write, and [`DexFileNameComparator`]
//! orders names so that sequence members come first, by ordinal.

use std::cmp::Ordering;

/// Naming policy for the dex files of a multi-dex container
pub trait DexFileNamer: Sync {
    fn name(&self, index: usize) -> String;

    /// Ordinal of `name`, or `None` when it is not part of the sequence.
    fn index(&self, name: &str) -> Option<usize>;

    fn is_valid_name(&self, name: &str) -> bool {
        self.index(name).is_some()
    }
}

/// The Android convention: `classes.dex`, `classes2.dex`, `classes3.dex`, ...
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicDexFileNamer {
    prefix: String,
    suffix: String,
}

impl BasicDexFileNamer {
    pub const DEFAULT_PREFIX: &'static str = "classes";
    pub const DEFAULT_SUFFIX: &'static str = ".dex";

    pub fn new() -> Self {
        Self::with_affixes(Self::DEFAULT_PREFIX, Self::DEFAULT_SUFFIX)
    }

    pub fn with_affixes(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }
}

impl Default for BasicDexFileNamer {
    fn default() -> Self {
        Self::new()
    }
}

impl DexFileNamer for BasicDexFileNamer {
    fn name(&self, index: usize) -> String {
        if index == 0 {
            format!("{}{}", self.prefix, self.suffix)
        } else {
            format!("{}{}{}", self.prefix, index + 1, self.suffix)
        }
    }

    fn index(&self, name: &str) -> Option<usize> {
        let number = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        if number.is_empty() {
            return Some(0);
        }
        // "classes1.dex" and zero-padded forms are never generated
        if number.starts_with('0') || !number.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match number.parse::<usize>().ok()? {
            n if n >= 2 => Some(n - 1),
            _ => None,
        }
    }
}

/// Cursor issuing sequential names during one write
#[derive(Debug)]
pub struct DexFileNameIterator<'n, N: ?Sized> {
    namer: &'n N,
    count: usize,
}

impl<'n, N: DexFileNamer + ?Sized> DexFileNameIterator<'n, N> {
    pub fn new(namer: &'n N) -> Self {
        Self { namer, count: 0 }
    }

    /// Number of names issued so far.
    pub fn issued(&self) -> usize {
        self.count
    }
}

impl<N: DexFileNamer + ?Sized> Iterator for DexFileNameIterator<'_, N> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let name = self.namer.name(self.count);
        self.count += 1;
        Some(name)
    }
}

/// Total order over dex names
///
/// Names the namer recognizes sort before all others and among themselves by
/// ordinal; the rest sort lexicographically.
#[derive(Debug)]
pub struct DexFileNameComparator<'n, N: ?Sized> {
    namer: &'n N,
}

impl<'n, N: DexFileNamer + ?Sized> DexFileNameComparator<'n, N> {
    pub fn new(namer: &'n N) -> Self {
        Self { namer }
    }

    pub fn namer(&self) -> &'n N {
        self.namer
    }

    pub fn compare(&self, l: &str, r: &str) -> Ordering {
        match (self.namer.index(l), self.namer.index(r)) {
            (Some(li), Some(ri)) => li.cmp(&ri),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => l.cmp(r),
        }
    }

    pub fn sort<S: AsRef<str>>(&self, names: &mut [S]) {
        names.sort_by(|l, r| self.compare(l.as_ref(), r.as_ref()));
    }
}
