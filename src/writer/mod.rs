//! Splitting classes across capacity-bounded dex files
//!
//! The writer walks a class stream, filling one [`DexPool`] at a time until it
//! overflows, then closes that dex file under the next sequential name. With
//! more than one thread, workers pull batches from a shared stream and name
//! their dex files under the same lock, so names stay sequential and gap-free.

mod batched;
mod output;
mod split;

pub use output::write_output_dir;

use std::any::Any;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::{
    main_dex_floor_requested, resolve_thread_count, WriteConfig, PER_THREAD_BATCH_SIZE,
};
use crate::dex::DexFile;
use crate::error::{MultiDexError, Result};
use crate::logger::DexLogger;
use crate::naming::{DexFileNameIterator, DexFileNamer};
use crate::pool::DexPool;

use batched::{BatchedClasses, SharedCursor};
use split::{write_dex_files, SequentialCursor, WrittenDexFiles};

/// Encoded dex files keyed by name
pub type OutputSet = BTreeMap<String, Vec<u8>>;

/// Write `dex_file` as a multi-dex set according to `config`
///
/// Returns the number of dex files written. Single-dex output is not
/// supported through this entry point; use [`write_raw_dex`].
pub fn write_dex_file<P, D, N>(
    config: &WriteConfig,
    output: &mut OutputSet,
    namer: &N,
    dex_file: &D,
) -> Result<usize>
where
    P: DexPool<Class = D::Class>,
    D: DexFile,
    N: DexFileNamer + ?Sized,
{
    if !config.multi_dex {
        return Err(MultiDexError::SingleDexUnsupported);
    }
    write_multi_dex_directory::<P, D, N>(
        config.thread_count,
        output,
        namer,
        dex_file,
        config.min_main_dex_class_count,
        config.minimal_main_dex,
        config.max_dex_pool_size,
    )
}

/// Split `dex_file` into dex files named by `namer`
///
/// A `thread_count` of 0 picks a count automatically. The multi-threaded
/// writer is used only without a main dex floor.
pub fn write_multi_dex_directory<P, D, N>(
    thread_count: usize,
    output: &mut OutputSet,
    namer: &N,
    dex_file: &D,
    min_main_dex_class_count: usize,
    minimal_main_dex: bool,
    max_dex_pool_size: usize,
) -> Result<usize>
where
    P: DexPool<Class = D::Class>,
    D: DexFile,
    N: DexFileNamer + ?Sized,
{
    let names = DexFileNameIterator::new(namer);
    let thread_count = resolve_thread_count(thread_count);
    let floor = main_dex_floor_requested(min_main_dex_class_count, minimal_main_dex);
    let written = if thread_count > 1 && !floor {
        write_multi_thread::<P, D, N>(thread_count, output, names, dex_file, max_dex_pool_size)?
    } else {
        write_single_thread::<P, D, N>(
            output,
            names,
            dex_file,
            min_main_dex_class_count,
            minimal_main_dex,
            max_dex_pool_size,
        )?
    };
    info!(
        classes = dex_file.class_count(),
        dex_files = written,
        threads = thread_count,
        "multi-dex write complete"
    );
    Ok(written)
}

fn write_single_thread<P, D, N>(
    output: &mut OutputSet,
    names: DexFileNameIterator<'_, N>,
    dex_file: &D,
    min_main_dex_class_count: usize,
    minimal_main_dex: bool,
    max_dex_pool_size: usize,
) -> Result<usize>
where
    P: DexPool<Class = D::Class>,
    D: DexFile,
    N: DexFileNamer + ?Sized,
{
    let mut cursor = SequentialCursor::new(dex_file.classes(), names);
    let mut written = WrittenDexFiles::new();
    let result = write_dex_files::<P, _>(
        &mut written,
        &mut cursor,
        min_main_dex_class_count,
        minimal_main_dex,
        dex_file.opcodes(),
        max_dex_pool_size,
    );
    output.extend(written);
    result.map(|()| cursor.issued())
}

fn write_multi_thread<P, D, N>(
    thread_count: usize,
    output: &mut OutputSet,
    names: DexFileNameIterator<'_, N>,
    dex_file: &D,
    max_dex_pool_size: usize,
) -> Result<usize>
where
    P: DexPool<Class = D::Class>,
    D: DexFile,
    N: DexFileNamer + ?Sized,
{
    let opcodes = dex_file.opcodes();
    let shared = Mutex::new(SharedCursor::new(dex_file.classes(), names));

    // a worker whose first batch is empty would have nothing to write
    let mut cursors = Vec::with_capacity(thread_count);
    for _ in 0..thread_count {
        let cursor = BatchedClasses::new(&shared, PER_THREAD_BATCH_SIZE);
        if !cursor.has_buffered() {
            break;
        }
        cursors.push(cursor);
    }
    debug!(workers = cursors.len(), "starting dex writer threads");

    let results: Vec<(WrittenDexFiles, Result<()>)> = thread::scope(|scope| {
        let handles: Vec<_> = cursors
            .into_iter()
            .map(|mut cursor| {
                scope.spawn(move || {
                    let mut written = WrittenDexFiles::new();
                    let result = write_dex_files::<P, _>(
                        &mut written,
                        &mut cursor,
                        0,
                        false,
                        opcodes,
                        max_dex_pool_size,
                    );
                    (written, result)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|payload| {
                    let err = MultiDexError::WorkerPanicked(panic_message(payload));
                    (WrittenDexFiles::new(), Err(err))
                })
            })
            .collect()
    });

    // output of a failed worker is kept, as in the sequential writer
    let mut first_error = None;
    for (written, result) in results {
        output.extend(written);
        if let Err(err) = result {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(shared.into_inner().issued()),
    }
}

/// Extract a readable message from a thread panic payload
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".into()
    }
}

/// Write every class of `dex_file` into a single dex
///
/// Any overflow is fatal. `logger` receives the class count under the file
/// name of `file`.
pub fn write_raw_dex<P, D, W>(
    sink: &mut W,
    dex_file: &D,
    max_dex_pool_size: usize,
    logger: Option<&dyn DexLogger>,
    file: &Path,
) -> Result<()>
where
    P: DexPool<Class = D::Class>,
    D: DexFile,
    W: Write,
{
    let total = dex_file.class_count();
    let mut pool = P::new(dex_file.opcodes());
    let mut class_count = 0;
    for class in dex_file.classes() {
        pool.intern_class(class)?;
        if pool.has_overflowed(max_dex_pool_size) {
            return Err(MultiDexError::PoolOverflow {
                position: class_count + 1,
                required: total,
            });
        }
        class_count += 1;
    }
    if let Some(logger) = logger {
        let entry_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        logger.log(file, &entry_name, class_count);
    }
    pool.write_to(sink)
        .map_err(|e| MultiDexError::from_io_error(file.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_DEX_POOL_SIZE;
    use crate::dex::{ClassDef, Opcodes};
    use crate::naming::BasicDexFileNamer;
    use crate::testing::{decode_fake, FakeClass, FakeDex, FakePool};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn split(threads: usize, dex: &FakeDex, capacity: usize) -> Result<(usize, OutputSet)> {
        let mut output = OutputSet::new();
        let count = write_multi_dex_directory::<FakePool, _, _>(
            threads,
            &mut output,
            &BasicDexFileNamer::new(),
            dex,
            0,
            false,
            capacity,
        )?;
        Ok((count, output))
    }

    #[test]
    fn single_thread_split_is_complete_and_ordered() {
        let dex = FakeDex::uniform(1000, 7);
        let (count, output) = split(1, &dex, 100).unwrap();

        // 14 classes of 7 units fit under 100
        assert_eq!(count, 72);
        assert_eq!(output.len(), count);

        let namer = BasicDexFileNamer::new();
        let mut all = Vec::new();
        for i in 0..count {
            let classes = decode_fake(&output[&namer.name(i)]);
            assert!(classes.len() <= 14);
            all.extend(classes);
        }
        let expected: Vec<_> = dex.classes().map(|c| c.type_descriptor().to_owned()).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn thread_counts_agree_on_membership_and_names_stay_sequential() {
        let dex = FakeDex::uniform(2_345, 3);
        let capacity = 3 * 40;

        let (baseline_count, baseline) = split(1, &dex, capacity).unwrap();
        assert_eq!(baseline_count, 2_345usize.div_ceil(40));
        let mut expected: Vec<_> = baseline.values().flat_map(|b| decode_fake(b)).collect();
        expected.sort();

        let namer = BasicDexFileNamer::new();
        for threads in [2, 8] {
            let (count, output) = split(threads, &dex, capacity).unwrap();
            // each worker may close one partial dex at the end of the stream
            assert!(count >= baseline_count, "{threads} threads");
            assert!(count < baseline_count + threads, "{threads} threads");
            assert_eq!(output.len(), count);

            let names: BTreeSet<_> = output.keys().cloned().collect();
            let sequential: BTreeSet<_> = (0..count).map(|i| namer.name(i)).collect();
            assert_eq!(names, sequential);

            let mut classes: Vec<_> = output.values().flat_map(|b| decode_fake(b)).collect();
            classes.sort();
            assert_eq!(classes, expected);

            // classes inside one dex stay in stream order
            for buffer in output.values() {
                let indices: Vec<usize> = decode_fake(buffer)
                    .iter()
                    .map(|c| c[2..c.len() - 1].parse().unwrap())
                    .collect();
                assert!(!indices.is_empty());
                assert!(indices.len() <= 40);
                assert!(indices.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn full_dex_batches_give_identical_counts() {
        // one batch fills exactly one dex, so no worker closes a partial one
        let dex = FakeDex::uniform(10 * PER_THREAD_BATCH_SIZE, 1);
        for threads in [1, 2, 8] {
            let (count, output) = split(threads, &dex, PER_THREAD_BATCH_SIZE).unwrap();
            assert_eq!(count, 10, "{threads} threads");
            assert!(output
                .values()
                .all(|b| decode_fake(b).len() == PER_THREAD_BATCH_SIZE));
        }
    }

    #[test]
    fn short_stream_uses_fewer_workers() {
        let dex = FakeDex::uniform(150, 1);
        let (count, output) = split(8, &dex, 1_000).unwrap();
        // two batches of 100 and 50 land in two workers
        assert_eq!(count, 2);
        assert_eq!(
            output.keys().cloned().collect::<Vec<_>>(),
            vec!["classes.dex", "classes2.dex"]
        );
    }

    #[test]
    fn empty_stream_writes_no_dex_files() {
        let dex = FakeDex::uniform(0, 1);
        for threads in [1, 4] {
            let (count, output) = split(threads, &dex, 10).unwrap();
            assert_eq!(count, 0);
            assert!(output.is_empty());
        }
    }

    #[test]
    fn worker_failure_keeps_its_kind() {
        let mut classes: Vec<_> = (0..500).map(|i| FakeClass::new(format!("LC{i};"), 1)).collect();
        classes[250] = FakeClass::new("LHuge;", 5_000);
        let dex = FakeDex::new(classes);

        let err = split(4, &dex, 100).unwrap_err();
        assert!(matches!(err, MultiDexError::ClassTooLarge(ref ty) if ty == "LHuge;"));
    }

    #[test]
    fn main_dex_floor_forces_single_thread() {
        let dex = FakeDex::uniform(10, 1);
        let mut output = OutputSet::new();
        let count = write_multi_dex_directory::<FakePool, _, _>(
            8,
            &mut output,
            &BasicDexFileNamer::new(),
            &dex,
            3,
            true,
            100,
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(decode_fake(&output["classes.dex"]), ["LC0;", "LC1;", "LC2;"]);
    }

    #[test]
    fn main_dex_floor_overflow_is_fatal() {
        let dex = FakeDex::uniform(10, 10);
        let mut output = OutputSet::new();
        let err = write_multi_dex_directory::<FakePool, _, _>(
            1,
            &mut output,
            &BasicDexFileNamer::new(),
            &dex,
            5,
            false,
            35,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Dex pool overflowed while writing type 4 of 5");
    }

    #[test]
    fn single_dex_mode_is_rejected() {
        let config = WriteConfig {
            multi_dex: false,
            ..WriteConfig::default()
        };
        let err = write_dex_file::<FakePool, _, _>(
            &config,
            &mut OutputSet::new(),
            &BasicDexFileNamer::new(),
            &FakeDex::uniform(1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, MultiDexError::SingleDexUnsupported));
    }

    #[test]
    fn write_dex_file_uses_config() {
        let config = WriteConfig {
            thread_count: 1,
            max_dex_pool_size: 10,
            ..WriteConfig::default()
        };
        let mut output = OutputSet::new();
        let count = write_dex_file::<FakePool, _, _>(
            &config,
            &mut output,
            &BasicDexFileNamer::new(),
            &FakeDex::uniform(25, 1),
        )
        .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn raw_dex_write_logs_and_encodes() {
        let dex = FakeDex::uniform(3, 1);
        let logged = Mutex::new(Vec::new());
        let logger = |file: &Path, entry: &str, count: usize| {
            logged
                .lock()
                .push((file.to_path_buf(), entry.to_owned(), count));
        };
        let mut sink = Vec::new();

        write_raw_dex::<FakePool, _, _>(
            &mut sink,
            &dex,
            DEFAULT_MAX_DEX_POOL_SIZE,
            Some(&logger),
            Path::new("out/app.dex"),
        )
        .unwrap();

        assert_eq!(decode_fake(&sink), ["LC0;", "LC1;", "LC2;"]);
        assert_eq!(
            logged.into_inner(),
            vec![(PathBuf::from("out/app.dex"), "app.dex".to_string(), 3)]
        );
    }

    #[test]
    fn raw_dex_overflow_is_fatal() {
        let dex = FakeDex::uniform(5, 4);
        let mut sink = Vec::new();
        let err = write_raw_dex::<FakePool, _, _>(&mut sink, &dex, 10, None, Path::new("a.dex"))
            .unwrap_err();
        assert!(matches!(
            err,
            MultiDexError::PoolOverflow {
                position: 3,
                required: 5
            }
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn opcodes_reach_the_pool() {
        struct OpcodeProbe(Opcodes);

        impl DexPool for OpcodeProbe {
            type Class = FakeClass;

            fn new(opcodes: Opcodes) -> Self {
                Self(opcodes)
            }
            fn mark(&mut self) {}
            fn reset(&mut self) {}
            fn intern_class(&mut self, _class: &FakeClass) -> Result<()> {
                Ok(())
            }
            fn has_overflowed(&self, _max_pool_size: usize) -> bool {
                false
            }
            fn write_to<W: Write>(&mut self, sink: &mut W) -> std::io::Result<()> {
                write!(sink, "{}", self.0.dex_version())
            }
        }

        let mut output = OutputSet::new();
        write_multi_dex_directory::<OpcodeProbe, _, _>(
            1,
            &mut output,
            &BasicDexFileNamer::new(),
            &FakeDex::uniform(2, 1),
            0,
            false,
            DEFAULT_MAX_DEX_POOL_SIZE,
        )
        .unwrap();
        assert_eq!(output["classes.dex"], b"35");
    }
}
