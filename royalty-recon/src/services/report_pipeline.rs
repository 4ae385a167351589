//! Report pipeline
//!
//! Runs one uploaded report from decoded files to a terminal status:
//!
//! 1. ingest every file into the aggregator (0-50%)
//! 2. resolve and persist each aggregated track (50-90%)
//! 3. credit the per-user payouts
//! 4. write the final counters (100%)
//!
//! File, track and payout failures are collected into the report error log
//! and processing continues. Only a failure of the report row itself is
//! fatal, which marks the report `failed`.

use crate::db::reports;
use crate::models::{ReportFile, ReportStats, ReportStatus, RoyaltyReport};
use crate::services::aggregator::Aggregator;
use crate::services::catalog_resolver::{CatalogResolver, ReleaseCatalog};
use crate::services::decoder;
use crate::services::ledger_writer::{LedgerWriter, PayoutAccumulator, ReportContext};
use crate::services::progress::ProgressTracker;
use crate::services::row_parser::{has_identity_columns, is_summary_file, parse_rows};
use royalty_common::{Error, Result};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Decode an uploaded file into text
pub fn decode_upload(name: &str, bytes: &[u8]) -> ReportFile {
    let decoded = decoder::decode(bytes);
    debug!(file = name, encoding = decoded.encoding.name(), bytes = bytes.len(), "Decoded upload");
    ReportFile {
        name: name.to_string(),
        content: decoded.text,
    }
}

/// Stages of one report run
pub struct ReportPipeline<C: ReleaseCatalog> {
    pool: SqlitePool,
    resolver: CatalogResolver<C>,
    ledger: LedgerWriter,
    delimiter: char,
}

impl<C: ReleaseCatalog> ReportPipeline<C> {
    pub fn new(pool: SqlitePool, catalog: C, delimiter: char, currency: &str) -> Self {
        Self {
            ledger: LedgerWriter::new(pool.clone(), currency),
            resolver: CatalogResolver::new(catalog),
            pool,
            delimiter,
        }
    }

    /// Run the report to a terminal status
    ///
    /// Never returns an error: a fatal failure is written to the report row.
    pub async fn execute(&self, report: &RoyaltyReport, files: Vec<ReportFile>) -> ReportStatus {
        match self.run(report, &files).await {
            Ok(stats) => {
                info!(
                    report_id = %report.id,
                    processed_files = stats.processed_files,
                    total_rows = stats.total_rows,
                    matched = stats.matched_tracks,
                    unmatched = stats.unmatched_tracks,
                    total_revenue = %stats.total_revenue,
                    "Report processing completed"
                );
                ReportStatus::Completed
            }
            Err(e) => {
                error!(report_id = %report.id, error = %e, "Report processing failed");
                let message = format!("Fatal error: {}", e);
                if let Err(write_err) = reports::fail_report(&self.pool, &report.id, &message).await {
                    error!(report_id = %report.id, error = %write_err, "Could not mark report as failed");
                }
                ReportStatus::Failed
            }
        }
    }

    async fn run(&self, report: &RoyaltyReport, files: &[ReportFile]) -> Result<ReportStats> {
        reports::mark_processing(&self.pool, &report.id).await?;
        info!(report_id = %report.id, period = %report.period(), files = files.len(), "Report processing started");

        let ctx = ReportContext::new(report.id.clone(), report.quarter.clone(), report.year);
        let progress = ProgressTracker::new(self.pool.clone(), report.id.clone(), files.len());
        let mut errors: Vec<String> = Vec::new();

        // Ingestion
        let mut aggregator = Aggregator::new();
        let mut processed_files = 0usize;

        for file in files {
            if is_summary_file(&file.name) {
                debug!(report_id = %report.id, file = %file.name, "Skipping summary file");
                processed_files += 1;
                continue;
            }

            match self.ingest_file(&mut aggregator, file) {
                Ok(rows) => {
                    processed_files += 1;
                    debug!(report_id = %report.id, file = %file.name, rows, "File ingested");
                    progress.file_processed(processed_files, aggregator.totals().rows).await;
                }
                Err(e) => {
                    warn!(report_id = %report.id, file = %file.name, error = %e, "File skipped");
                    errors.push(format!("Error processing file {}: {}", file.name, e));
                }
            }
        }

        let totals = aggregator.totals();
        let tracks = aggregator.into_tracks();
        info!(
            report_id = %report.id,
            rows = totals.rows,
            tracks = tracks.len(),
            "Ingestion finished"
        );

        // Matching and persistence
        let mut payouts = PayoutAccumulator::new();
        let mut matched_tracks = 0i64;
        let mut unmatched_tracks = 0i64;
        let mut persisted = 0usize;

        for track in &tracks {
            let found = self.resolver.resolve(track).await;
            if found.is_some() {
                matched_tracks += 1;
            } else {
                unmatched_tracks += 1;
            }

            match self.ledger.persist_track(&ctx, track, found.as_ref()).await {
                Ok(_) => {
                    if let Some(user_id) = found.as_ref().and_then(|m| m.user_id.as_deref()) {
                        payouts.add(user_id, track.revenue);
                    }
                    persisted += 1;
                    progress.track_resolved(persisted, tracks.len()).await;
                }
                Err(e) => {
                    warn!(report_id = %report.id, track = %track.key(), error = %e, "Track not saved");
                    errors.push(format!("Error saving track {}: {}", track.key(), e));
                }
            }
        }

        info!(
            report_id = %report.id,
            matched = matched_tracks,
            unmatched = unmatched_tracks,
            payees = payouts.len(),
            "Matching finished"
        );

        // Payouts
        let payout_summary = self.ledger.credit_payouts(&ctx, payouts).await;
        errors.extend(payout_summary.errors);

        let stats = ReportStats {
            processed_files: processed_files as i64,
            total_rows: totals.rows,
            matched_tracks,
            unmatched_tracks,
            total_streams: totals.streams,
            total_revenue: totals.revenue,
        };

        let error_log = if errors.is_empty() {
            None
        } else {
            Some(errors.join("\n"))
        };
        reports::complete_report(&self.pool, &report.id, &stats, error_log.as_deref()).await?;

        Ok(stats)
    }

    /// Fold one file into the aggregator, returning its row count
    fn ingest_file(&self, aggregator: &mut Aggregator, file: &ReportFile) -> Result<usize> {
        let rows = parse_rows(&file.content, self.delimiter);
        if !rows.is_empty() && !has_identity_columns(&file.content, self.delimiter) {
            return Err(Error::InvalidInput(format!(
                "no ISRC, UPC or Track title column found with delimiter '{}'",
                self.delimiter
            )));
        }

        aggregator.add_rows(&rows);
        Ok(rows.len())
    }
}

/// Run a report on its own background task
pub fn spawn_report<C>(pipeline: ReportPipeline<C>, report: RoyaltyReport, files: Vec<ReportFile>) -> JoinHandle<ReportStatus>
where
    C: ReleaseCatalog + 'static,
{
    tokio::spawn(async move {
        let report_id = report.id.clone();
        let status = pipeline.execute(&report, files).await;
        debug!(report_id = %report_id, status = status.as_str(), "Background report task finished");
        status
    })
}
