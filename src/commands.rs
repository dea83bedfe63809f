use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "recsync")]
#[command(about = "Download, check and organize recorded class sessions", long_about = None)]
pub struct Cli {
    /// Year for spreadsheet dates without one (default: most recent past date)
    #[arg(long, global = true)]
    pub year: Option<i32>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Args)]
pub struct Inputs {
    /// Semicolon-delimited session spreadsheet
    #[arg(value_parser = existing_file)]
    pub csv: PathBuf,
    /// Recordings directory
    #[arg(value_parser = existing_dir)]
    pub dir: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare the spreadsheet against the recordings directory
    Check {
        #[command(flatten)]
        inputs: Inputs,
        /// Print the summary only, without writing report tables
        #[arg(long)]
        no_reports: bool,
    },
    /// Capture and download the recordings listed in the spreadsheet
    Download {
        #[command(flatten)]
        inputs: Inputs,
        /// HAR export of the recording pages, taken while logged in
        #[arg(long, value_parser = existing_file)]
        har: PathBuf,
    },
    /// Rename files positionally, two per spreadsheet row
    Rename {
        #[command(flatten)]
        inputs: Inputs,
        /// Show the planned renames without touching any file
        #[arg(long)]
        dry_run: bool,
    },
    /// Audit file names per track against the spreadsheet
    Audit {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Print configuration values
    PrintConfig,
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("file not found: {value}"))
    }
}

fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("directory not found: {value}"))
    }
}
