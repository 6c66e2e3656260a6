use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::ReadConfig;
use crate::container::{FileDexContainer, MultiDexContainer};
use crate::dex::{ClassDef, DexFile, Opcodes, RawDexFile, RawDexReader};
use crate::error::Result;
use crate::logger::TracingLogger;
use crate::naming::BasicDexFileNamer;
use crate::reader::{read_dex_file, read_validated};

#[derive(Parser, Debug)]
#[command(
    name = "multidex",
    about = "Inspect multi-dex directories, archives and dex files",
    version,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the dex entries of a source with their class counts.
    List(ListCommand),
    /// Print every class type descriptor of a source in order.
    Classes(ListCommand),
}

#[derive(Args, Debug, Clone)]
pub struct ListCommand {
    /// Directory, zip archive or dex file to read.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Reject sources holding more than one dex file.
    #[arg(long = "single-dex", action = ArgAction::SetTrue)]
    pub single_dex: bool,

    /// Force a dex version instead of reading it from each header.
    #[arg(long = "dex-version", value_name = "VERSION")]
    pub dex_version: Option<u16>,
}

/// One line of `multidex list` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub entry_name: String,
    pub class_count: usize,
}

impl ListCommand {
    pub fn to_config(&self) -> ReadConfig {
        let mut cfg = ReadConfig::default();
        cfg.multi_dex = !self.single_dex;
        cfg.opcodes = self.dex_version.map(Opcodes::for_dex_version);
        cfg
    }

    fn reader(cfg: &ReadConfig) -> RawDexReader {
        match cfg.opcodes {
            Some(opcodes) => RawDexReader::with_opcodes(opcodes),
            None => RawDexReader::new(),
        }
    }

    /// Read and validate the source, reporting each entry through `tracing`.
    pub fn list_entries(&self) -> Result<Vec<EntrySummary>> {
        let cfg = self.to_config();
        let container: FileDexContainer<RawDexFile> = read_validated(
            cfg.multi_dex,
            &self.path,
            &BasicDexFileNamer::new(),
            &Self::reader(&cfg),
            Some(&TracingLogger),
        )?;
        Ok(container
            .dex_entry_names()
            .iter()
            .filter_map(|name| container.entry(name))
            .map(|entry| EntrySummary {
                entry_name: entry.entry_name().to_owned(),
                class_count: entry.dex_file().class_count(),
            })
            .collect())
    }

    /// Type descriptors of the flattened class stream.
    pub fn class_descriptors(&self) -> Result<Vec<String>> {
        let cfg = self.to_config();
        let dex = read_dex_file(
            cfg.multi_dex,
            &self.path,
            &BasicDexFileNamer::new(),
            &Self::reader(&cfg),
            Some(&TracingLogger),
        )?;
        Ok(dex
            .classes()
            .map(|class| class.type_descriptor().to_owned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::MultiDexError;
    use crate::testing::build_dex;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["multidex"];
        argv.extend(args);
        Cli::try_parse_from(&argv).expect("parse command")
    }

    fn parse_list(args: &[&str]) -> (ListCommand, ReadConfig) {
        match parse(args).command {
            Commands::List(cmd) | Commands::Classes(cmd) => {
                let cfg = cmd.to_config();
                (cmd, cfg)
            }
        }
    }

    #[test]
    fn list_defaults_accept_multi_dex() {
        let (cmd, cfg) = parse_list(&["list", "/tmp/app.apk"]);
        assert_eq!(cmd.path, PathBuf::from("/tmp/app.apk"));
        assert_eq!(cfg, ReadConfig::default());
        assert!(cfg.multi_dex);
    }

    #[test]
    fn list_options_map_into_config() {
        let (_, cfg) = parse_list(&["list", "out", "--single-dex", "--dex-version", "39"]);
        assert!(!cfg.multi_dex);
        assert_eq!(cfg.opcodes, Some(Opcodes::for_dex_version(39)));
    }

    #[test]
    fn verbosity_counts_flags() {
        let cli = parse(&["-vv", "classes", "classes.dex"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Classes(_)));
    }

    #[test]
    fn missing_path_is_rejected() {
        assert!(Cli::try_parse_from(["multidex", "list"]).is_err());
    }

    #[test]
    fn list_and_classes_read_a_directory() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join("classes.dex"), build_dex(&["LA;", "LB;"]))?;
        fs::write(temp.path().join("classes2.dex"), build_dex(&["LC;"]))?;
        let dir = temp.path().to_string_lossy().into_owned();

        let (cmd, _) = parse_list(&["list", &dir]);
        assert_eq!(
            cmd.list_entries()?,
            vec![
                EntrySummary {
                    entry_name: "classes.dex".into(),
                    class_count: 2
                },
                EntrySummary {
                    entry_name: "classes2.dex".into(),
                    class_count: 1
                },
            ]
        );
        assert_eq!(cmd.class_descriptors()?, vec!["LA;", "LB;", "LC;"]);

        let (single, _) = parse_list(&["classes", &dir, "--single-dex"]);
        let err = single.class_descriptors().unwrap_err();
        assert!(matches!(err, MultiDexError::MultiDexDetected(_)));
        Ok(())
    }
}
