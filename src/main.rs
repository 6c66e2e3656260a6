use anyhow::Result;
use clap::Parser;
use multidex::cli::{Cli, Commands};
use multidex::MultiDexError;
use tracing::Level;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List(opts) => {
            for entry in opts.list_entries().map_err(user_error)? {
                println!("{}\t{}", entry.entry_name, entry.class_count);
            }
        }
        Commands::Classes(opts) => {
            for descriptor in opts.class_descriptors().map_err(user_error)? {
                println!("{descriptor}");
            }
        }
    }
    Ok(())
}

fn user_error(err: MultiDexError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}
