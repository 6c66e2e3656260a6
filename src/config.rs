use crate::dex::Opcodes;

/// Upper bound for the automatic writer thread count.
pub const DEFAULT_MAX_THREADS: usize = 4;
/// Classes a writer thread takes from the shared stream per lock acquisition.
pub const PER_THREAD_BATCH_SIZE: usize = 100;
/// Pool capacity matching the 16-bit index limit of the dex format.
pub const DEFAULT_MAX_DEX_POOL_SIZE: usize = 1 << 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteConfig {
    /// Split across several dex files. Single-dex output is rejected.
    pub multi_dex: bool,
    /// Writer threads; `0` picks `min(cpus, DEFAULT_MAX_THREADS)`.
    pub thread_count: usize,
    /// Classes the first dex must hold before it may be closed.
    pub min_main_dex_class_count: usize,
    /// Close the first dex as soon as it holds `min_main_dex_class_count` classes.
    pub minimal_main_dex: bool,
    pub max_dex_pool_size: usize,
}

impl WriteConfig {
    /// Whether a main dex floor forces the single-threaded writer.
    pub fn has_main_dex_floor(&self) -> bool {
        main_dex_floor_requested(self.min_main_dex_class_count, self.minimal_main_dex)
    }
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            multi_dex: true,
            thread_count: 0,
            min_main_dex_class_count: 0,
            minimal_main_dex: false,
            max_dex_pool_size: DEFAULT_MAX_DEX_POOL_SIZE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadConfig {
    /// Accept sources holding more than one dex file.
    pub multi_dex: bool,
    /// Opcodes forced on every decoded file instead of its header version.
    pub opcodes: Option<Opcodes>,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            multi_dex: true,
            opcodes: None,
        }
    }
}

/// Whether the first dex carries a class floor, which rules out threaded writing.
pub fn main_dex_floor_requested(min_main_dex_class_count: usize, minimal_main_dex: bool) -> bool {
    min_main_dex_class_count != 0 || minimal_main_dex
}

/// Resolve a requested writer thread count; `0` means automatic.
pub fn resolve_thread_count(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().clamp(1, DEFAULT_MAX_THREADS)
    } else {
        requested
    }
}
