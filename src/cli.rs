use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "boardpack")]
#[command(about = "Download a board's pins into a single archive", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides BOARDPACK_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the job staged under a job token
    Run(RunArgs),
    /// Stage a job's parameters in the job store
    Submit(SubmitArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Job token; also the archive file name
    pub uifn: String,
}

#[derive(clap::Args, Debug)]
pub struct SubmitArgs {
    /// Job token
    pub uifn: String,

    /// JSON object of job fields (board_pins, CALLBACK_URL, MAX_BOARD_NUMBER,
    /// board_id, site, uifnKey)
    #[arg(long)]
    pub file: PathBuf,
}
