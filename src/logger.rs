//! Per-entry observation hook
//!
//! Readers and the raw writer report every dex file they touch together with
//! its class count. The hook is informational and never changes the outcome.

use std::path::Path;

use tracing::info;

pub trait DexLogger: Sync {
    fn log(&self, file: &Path, entry_name: &str, class_count: usize);
}

impl<F> DexLogger for F
where
    F: Fn(&Path, &str, usize) + Sync,
{
    fn log(&self, file: &Path, entry_name: &str, class_count: usize) {
        self(file, entry_name, class_count)
    }
}

/// Emits one `tracing` event per entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl DexLogger for TracingLogger {
    fn log(&self, file: &Path, entry_name: &str, class_count: usize) {
        info!(
            file = %file.display(),
            entry = entry_name,
            classes = class_count,
            "dex entry"
        );
    }
}
