#![forbid(unsafe_code)]

use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use instream::InputStream;

#[derive(Debug, Parser)]
#[command(name = "instream")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Copy a file to stdout through a stream handle.
    Cat { path: PathBuf },
    /// Print the stream length reported by the handle.
    Length { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,instream=info".to_string()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Cat { path } => {
            let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
            let mut stream = InputStream::from_reader(file);

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let copied = std::io::copy(&mut stream, &mut out)?;
            out.flush()?;
            tracing::debug!(copied, path = %path.display(), "stream drained");
        }
        Command::Length { path } => {
            let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
            let mut stream = InputStream::from_reader(file);
            let length = stream
                .length()
                .with_context(|| format!("stream length for {}", path.display()))?;
            println!("{length}");
        }
    }
    Ok(())
}
