//! Persisting a written dex set to disk

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::OutputSet;
use crate::error::{MultiDexError, Result};

/// Write every dex of `output` into `dir`
///
/// # Returns
/// Paths of the written files, in name order
///
/// # Notes
/// - Creates `dir` and its parents if needed
/// - Overwrites existing files
pub fn write_output_dir(dir: &Path, output: &OutputSet) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    output
        .iter()
        .map(|(name, data)| {
            let path = dir.join(name);
            write_dex(&path, data)?;
            debug!(path = %path.display(), bytes = data.len(), "wrote dex file");
            Ok(path)
        })
        .collect()
}

fn write_dex(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| io_err(path, e))?;
    file.write_all(data).map_err(|e| io_err(path, e))
}

fn io_err(path: &Path, e: std::io::Error) -> MultiDexError {
    MultiDexError::from_io_error(path.display().to_string(), e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_output_dir() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let out = temp.path().join("nested").join("out");

        let mut output = OutputSet::new();
        output.insert("classes2.dex".into(), b"second".to_vec());
        output.insert("classes.dex".into(), b"first".to_vec());

        let paths = write_output_dir(&out, &output)?;
        assert_eq!(paths, vec![out.join("classes.dex"), out.join("classes2.dex")]);
        assert_eq!(fs::read(out.join("classes.dex"))?, b"first");
        assert_eq!(fs::read(out.join("classes2.dex"))?, b"second");
        Ok(())
    }

    #[test]
    fn test_write_output_dir_overwrites() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join("classes.dex"), b"stale data")?;

        let mut output = OutputSet::new();
        output.insert("classes.dex".into(), b"new".to_vec());
        write_output_dir(temp.path(), &output)?;

        assert_eq!(fs::read(temp.path().join("classes.dex"))?, b"new");
        Ok(())
    }

    #[test]
    fn test_write_output_dir_reports_path() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"x")?;

        let err = write_output_dir(&blocker, &OutputSet::new()).unwrap_err();
        assert!(matches!(err, MultiDexError::Io { ref path, .. } if path.ends_with("file")));
        Ok(())
    }
}
