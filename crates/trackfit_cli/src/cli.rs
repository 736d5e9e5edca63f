use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "trackfit",
    version,
    about = "Sequential QR identifiers and records for track fittings"
)]
pub struct Cli {
    /// Use this directory instead of the platform data directory
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Log at DEBUG level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// List categories with the identifier each would get next
    Categories,
    /// Print the next identifier for a category without consuming it
    Preview {
        /// Category label ("Fish Plates") or prefix ("FP")
        category: String,
    },
    /// Issue a single record and submit it
    Issue(IssueArgs),
    /// List persisted counters
    Counters,
    /// Interactive form
    Form,
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
pub struct IssueArgs {
    /// Category label or prefix
    #[arg(long, short)]
    pub category: String,

    #[arg(long)]
    pub vendor: String,

    #[arg(long)]
    pub batch: String,

    /// Warranty in whole years
    #[arg(long)]
    pub warranty: String,

    /// YYYY-MM-DD, defaults to today
    #[arg(long, value_name = "DATE")]
    pub supply_date: Option<String>,

    /// Also write the record to an .xlsx workbook
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Where to write the code as SVG (defaults to the codes directory)
    #[arg(long, value_name = "PATH")]
    pub svg: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print every setting with its current value
    Show,
    /// Set one value, e.g. `sheets.endpoint https://...`
    Set { key: String, value: String },
}
