use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};
use model::{job::JobStatus, mapping::field::Direction};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run and manage reconciliation jobs
    Reconcile {
        #[command(subcommand)]
        command: ReconcileCommand,
    },
    /// Run sample records through the mapping without writing anything
    Preview {
        #[arg(long, help = "JSON file holding an array of sample records")]
        samples: PathBuf,

        #[arg(long, default_value = "remote-to-local")]
        direction: Direction,

        #[arg(long, default_value = "ID", help = "Field holding each sample's id")]
        id_field: String,

        #[arg(
            long,
            help = "Load field titles and list labels from the CRM for the remote side"
        )]
        with_metadata: bool,

        #[arg(long, help = "Write the JSON report to this file instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Inspect the mapping table
    Mappings {
        #[command(subcommand)]
        command: MappingsCommand,
    },
}

#[derive(Subcommand)]
pub enum ReconcileCommand {
    /// Start a job and follow it until it ends. Ctrl-C cancels it.
    Start {
        #[arg(long, help = "Only leads of this scouter")]
        scouter: Option<String>,

        #[arg(long, help = "First creation date to include (YYYY-MM-DD)")]
        from: Option<NaiveDate>,

        #[arg(long, help = "Last creation date to include (YYYY-MM-DD)")]
        to: Option<NaiveDate>,
    },
    /// Cancel a running, healthy job
    Cancel { id: String },
    /// Force a stalled job into its terminal status
    Terminate { id: String },
    /// Delete a finished job and its error details
    Delete { id: String },
    /// List jobs, newest first
    List {
        #[arg(long)]
        status: Option<JobStatus>,

        #[arg(long)]
        scouter: Option<String>,

        #[arg(long, help = "Only jobs started on or after this date")]
        since: Option<NaiveDate>,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },
    /// Show one job with its health
    Status {
        id: String,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },
    /// Export the error details of a job
    Errors {
        id: String,

        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        #[arg(long, help = "Write to this file instead of stdout")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum MappingsCommand {
    /// Validate the mapping table and report conflicts
    Check {
        #[arg(long, help = "Print JSON instead of a summary")]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}
