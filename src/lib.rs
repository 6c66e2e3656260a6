pub mod cli;
pub mod config;
pub mod container;
pub mod dex;
pub mod error;
pub mod logger;
pub mod naming;
pub mod pool;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod testing;

pub use config::{ReadConfig, WriteConfig};
pub use error::{MultiDexError, Result};
pub use reader::{read_dex_file, read_multi_dex_container, read_validated};
pub use writer::{write_dex_file, write_multi_dex_directory, write_raw_dex, OutputSet};
