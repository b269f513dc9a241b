use crate::{
    commands::{Commands, MappingsCommand, ReconcileCommand},
    error::CliError,
    output::JobView,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use async_trait::async_trait;
use clap::Parser;
use connectors::{
    bitrix::{BitrixClient, FilterFields},
    local::SledRecordStore,
};
use engine_config::{
    env::EnvContext,
    mapping_table::MappingTable,
    report::mapping::MappingReport,
    settings::{ConnectorSettings, ENV_BITRIX_WEBHOOK, ReconcileSettings},
};
use engine_core::{
    connectors::{
        metadata::{FieldMetadata, NoMetadata},
        remote::{IdPage, RemoteCrm},
    },
    error::ConnectorError,
    state::{JobStore, sled_store::SledJobStore},
};
use engine_processing::preview::SyncPreviewSimulator;
use engine_runtime::{controller::JobController, reconcile::ReconcileContext};
use model::{
    job::{JobFilters, JobQuery, JobStatus},
    mapping::{field::Direction, registry::MappingRegistry},
    records::record::Record,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "crmsync",
    version,
    about = "Reconcile CRM leads into a local store"
)]
struct Cli {
    #[arg(long, global = true, help = "KEY=VALUE file overriding the environment")]
    env_file: Option<PathBuf>,

    #[arg(long, global = true, help = "State directory (default ~/.crmsync)")]
    state_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Mapping table (default <state dir>/mappings.json)")]
    mappings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::new(&cli)?;

    let code = match cli.command {
        Commands::Reconcile { command } => app.reconcile(command).await?,
        Commands::Preview {
            samples,
            direction,
            id_field,
            with_metadata,
            output,
        } => {
            app.preview(&samples, direction, &id_field, with_metadata, output.as_deref())
                .await?
        }
        Commands::Mappings { command } => match command {
            MappingsCommand::Check { json } => app.check_mappings(json).await?,
        },
    };

    if code != ExitCode::Success {
        std::process::exit(code.as_i32());
    }
    Ok(())
}

/// Resolved configuration shared by every command.
struct App {
    connectors: ConnectorSettings,
    settings: ReconcileSettings,
    state_dir: PathBuf,
    mappings_path: PathBuf,
}

impl App {
    fn new(cli: &Cli) -> Result<Self, CliError> {
        let env: EnvContext = env::load_env(cli.env_file.as_deref())?;
        let connectors = ConnectorSettings::from_env(&env);
        let settings = ReconcileSettings::from_env(&env)?;

        let state_dir = match cli.state_dir.clone().or_else(|| connectors.state_dir.clone()) {
            Some(dir) => dir,
            None => dirs::home_dir()
                .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into()))?
                .join(".crmsync"),
        };
        let mappings_path = cli
            .mappings
            .clone()
            .unwrap_or_else(|| state_dir.join("mappings.json"));

        Ok(Self {
            connectors,
            settings,
            state_dir,
            mappings_path,
        })
    }

    fn open_job_store(&self) -> Result<Arc<dyn JobStore>, CliError> {
        let path = self.state_dir.join("jobs");
        let store = SledJobStore::open(&path).map_err(|err| CliError::OpenStore {
            what: "job store",
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(Arc::new(store))
    }

    fn open_record_store(&self) -> Result<Arc<SledRecordStore>, CliError> {
        let path = self.state_dir.join("records");
        let store = SledRecordStore::open(
            &path,
            self.connectors.local_scouter_field.as_str(),
            self.connectors.local_date_field.as_str(),
        )
        .map_err(|err| CliError::OpenStore {
            what: "record store",
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(Arc::new(store))
    }

    fn load_registry(&self) -> Result<MappingRegistry, CliError> {
        Ok(MappingTable::load(&self.mappings_path)?.into_registry())
    }

    fn bitrix(&self) -> Result<BitrixClient, CliError> {
        let webhook = self.connectors.require_webhook()?;
        let filters = FilterFields::new(
            self.connectors.remote_scouter_field.as_str(),
            self.connectors.remote_date_field.as_str(),
        );
        Ok(BitrixClient::new(
            webhook,
            &self.connectors.entity,
            filters,
            self.settings.call_timeout,
        )?)
    }

    /// Controller able to run jobs: needs the CRM, the mapping table and
    /// both stores.
    fn runner(&self) -> Result<JobController, CliError> {
        let ctx = ReconcileContext {
            remote: Arc::new(self.bitrix()?),
            local: self.open_record_store()?,
            store: self.open_job_store()?,
            registry: Arc::new(self.load_registry()?),
            settings: self.settings.clone(),
        };
        Ok(JobController::new(ctx))
    }

    /// Controller for inspecting and stopping jobs. Never talks to the CRM.
    fn admin(&self) -> Result<JobController, CliError> {
        let ctx = ReconcileContext {
            remote: Arc::new(Unconfigured),
            local: self.open_record_store()?,
            store: self.open_job_store()?,
            registry: Arc::new(MappingRegistry::new(Vec::new())),
            settings: self.settings.clone(),
        };
        Ok(JobController::new(ctx))
    }

    async fn reconcile(&self, command: ReconcileCommand) -> Result<ExitCode, CliError> {
        match command {
            ReconcileCommand::Start { scouter, from, to } => {
                let filters = JobFilters {
                    scouter_name: scouter,
                    date_from: from,
                    date_to: to,
                };
                self.start(filters).await
            }
            ReconcileCommand::Cancel { id } => {
                let controller = self.admin()?;
                let job = controller.cancel(&id).await?;
                println!("Job '{}' is {}", job.id, job.status);
                Ok(ExitCode::Success)
            }
            ReconcileCommand::Terminate { id } => {
                let controller = self.admin()?;
                let job = controller.terminate(&id).await?;
                println!("Job '{}' is {}", job.id, job.status);
                Ok(ExitCode::Success)
            }
            ReconcileCommand::Delete { id } => {
                self.admin()?.delete(&id).await?;
                println!("Job '{id}' deleted");
                Ok(ExitCode::Success)
            }
            ReconcileCommand::List {
                status,
                scouter,
                since,
                json,
            } => {
                let controller = self.admin()?;
                let query = JobQuery {
                    status,
                    scouter_name: scouter,
                    started_after: since,
                };
                let mut rows = Vec::new();
                for job in controller.list_jobs(&query).await? {
                    let health = controller.health(&job.id).await?;
                    rows.push((job, health));
                }
                if json {
                    let views: Vec<_> = rows
                        .iter()
                        .map(|(job, health)| JobView { job, health })
                        .collect();
                    output::emit_json(&views, None).await?;
                } else {
                    output::print_jobs(&rows);
                }
                Ok(ExitCode::Success)
            }
            ReconcileCommand::Status { id, json } => {
                let controller = self.admin()?;
                let job = controller.job(&id).await?;
                let health = controller.health(&id).await?;
                if json {
                    output::emit_json(&JobView { job: &job, health: &health }, None).await?;
                } else {
                    output::print_job(&job, &health);
                }
                Ok(ExitCode::Success)
            }
            ReconcileCommand::Errors { id, format, output } => {
                let job = self.admin()?.job(&id).await?;
                match output {
                    Some(path) => {
                        let file = std::fs::File::create(&path)?;
                        output::write_error_details(&job.error_details, format, file)?;
                        info!(
                            job_id = %job.id,
                            path = %path.display(),
                            details = job.error_details.len(),
                            "Exported error details"
                        );
                    }
                    None => {
                        output::write_error_details(&job.error_details, format, std::io::stdout())?
                    }
                }
                if job.error_count > job.error_details.len() as u64 {
                    warn!(
                        job_id = %job.id,
                        errors = job.error_count,
                        kept = job.error_details.len(),
                        "Only the first error details were kept"
                    );
                }
                Ok(ExitCode::Success)
            }
        }
    }

    /// Runs a job in the foreground. The first SIGINT or SIGTERM cancels it.
    async fn start(&self, filters: JobFilters) -> Result<ExitCode, CliError> {
        let controller = self.runner()?;
        let shutdown = ShutdownCoordinator::new(CancellationToken::new());
        shutdown.register_handlers();

        let handle = controller.start(filters).await?;
        let id = handle.id().to_string();
        info!(job_id = %id, "Reconciliation running, Ctrl+C cancels it");

        let token = shutdown.cancel_token();
        let wait = handle.wait();
        tokio::pin!(wait);
        tokio::select! {
            result = &mut wait => result?,
            _ = token.cancelled() => {
                if let Err(e) = controller.cancel(&id).await {
                    warn!(job_id = %id, error = %e, "Could not cancel job, terminating it");
                    if let Err(e) = controller.terminate(&id).await {
                        warn!(job_id = %id, error = %e, "Could not terminate job");
                    }
                }
                wait.await?;
            }
        }

        let job = controller.job(&id).await?;
        let health = controller.health(&id).await?;
        output::print_job(&job, &health);

        Ok(match job.status {
            JobStatus::Completed => ExitCode::Success,
            JobStatus::Cancelled if shutdown.is_shutdown_requested() => ExitCode::ShutdownRequested,
            _ => ExitCode::GeneralError,
        })
    }

    async fn preview(
        &self,
        samples: &Path,
        direction: Direction,
        id_field: &str,
        with_metadata: bool,
        output: Option<&Path>,
    ) -> Result<ExitCode, CliError> {
        let raw = tokio::fs::read_to_string(samples).await?;
        let serde_json::Value::Array(samples) = serde_json::from_str(&raw)? else {
            return Err(CliError::SamplesNotArray);
        };

        let registry = self.load_registry()?;
        let metadata: Box<dyn FieldMetadata> = if with_metadata {
            Box::new(self.bitrix()?.load_field_cache().await?)
        } else {
            Box::new(NoMetadata)
        };

        let report = SyncPreviewSimulator::new(&registry, metadata.as_ref())
            .with_id_field(id_field)
            .preview_json(direction, id_field, samples);
        output::emit_json(&report, output).await?;

        Ok(if report.is_clean() {
            ExitCode::Success
        } else {
            ExitCode::GeneralError
        })
    }

    async fn check_mappings(&self, json: bool) -> Result<ExitCode, CliError> {
        let registry = self.load_registry()?;
        let report = MappingReport::from_registry(&registry);
        if json {
            output::emit_json(&report, None).await?;
        } else {
            output::print_mapping_summary(&report);
        }
        Ok(if report.has_findings() {
            ExitCode::GeneralError
        } else {
            ExitCode::Success
        })
    }
}

/// Stand-in CRM for commands that only read or stop jobs.
struct Unconfigured;

#[async_trait]
impl RemoteCrm for Unconfigured {
    async fn list_ids(
        &self,
        _filters: &JobFilters,
        _page_token: Option<&str>,
    ) -> Result<IdPage, ConnectorError> {
        Err(not_configured())
    }

    async fn get_record(&self, _id: &str) -> Result<Record, ConnectorError> {
        Err(not_configured())
    }
}

fn not_configured() -> ConnectorError {
    ConnectorError::Api(format!("{ENV_BITRIX_WEBHOOK} is not set for this command"))
}
