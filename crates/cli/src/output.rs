use crate::{commands::ExportFormat, error::CliError};
use chrono::SecondsFormat;
use engine_config::report::mapping::MappingReport;
use engine_core::progress::JobHealth;
use model::job::{ErrorDetail, ReconciliationJob};
use serde::Serialize;
use std::{io::Write, path::Path};

/// Pretty JSON to `path`, or to stdout.
pub async fn emit_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => tokio::fs::write(path, json).await?,
        None => println!("{json}"),
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView<'a> {
    #[serde(flatten)]
    pub job: &'a ReconciliationJob,
    pub health: &'a JobHealth,
}

pub fn print_job(job: &ReconciliationJob, health: &JobHealth) {
    println!("Job '{}':", job.id);
    println!("-----------------------------");
    println!("{:<16} {}", "Status", job.status);
    println!("{:<16} {}", "Stage", job.stage);
    println!("{:<16} {:.1}%", "Progress", health.percentage);
    println!("{:<16} {}", "Remote total", job.bitrix_total);
    println!("{:<16} {}", "Scanned", job.scanned_count);
    println!("{:<16} {}", "Missing", job.missing_count);
    println!("{:<16} {}", "Synced", job.synced_count);
    println!("{:<16} {}", "Errors", job.error_count);
    println!("{:<16} {}", "Started", timestamp(job.started_at));
    println!(
        "{:<16} {} ({}s ago)",
        "Last heartbeat",
        timestamp(job.last_heartbeat_at),
        health.heartbeat_age_secs
    );
    if let Some(done) = job.completed_at {
        println!("{:<16} {}", "Completed", timestamp(done));
    }
    if health.stalled {
        println!("{:<16} yes, terminate it to release its scope", "Stalled");
    }
    if let Some(failure) = &job.failure {
        println!("{:<16} {}", "Failure", failure);
    }
}

pub fn print_jobs(jobs: &[(ReconciliationJob, JobHealth)]) {
    println!(
        "{:<38} {:<10} {:<15} {:>7} {:>8} {:>8} {:>7}",
        "ID", "STATUS", "STAGE", "PCT", "MISSING", "SYNCED", "ERRORS"
    );
    for (job, health) in jobs {
        let status = if health.stalled {
            "stalled".to_string()
        } else {
            job.status.to_string()
        };
        println!(
            "{:<38} {:<10} {:<15} {:>6.1}% {:>8} {:>8} {:>7}",
            job.id,
            status,
            job.stage.to_string(),
            health.percentage,
            job.missing_count,
            job.synced_count,
            job.error_count
        );
    }
}

pub fn print_mapping_summary(report: &MappingReport) {
    let totals = &report.totals;
    println!(
        "{} mappings: {} active, {} hidden, {} inactive (hash {})",
        totals.mappings, totals.active, totals.hidden, totals.inactive, report.mapping_hash
    );
    for finding in &report.findings {
        println!("  [{:?}] {}: {}", finding.severity, finding.code, finding.message);
    }
}

/// Writes error details as JSON or as CSV with a header row.
pub fn write_error_details<W: Write>(
    details: &[ErrorDetail],
    format: ExportFormat,
    mut out: W,
) -> Result<(), CliError> {
    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut out, details)?;
            writeln!(out)?;
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for detail in details {
                writer.serialize(detail)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
