//! Report API handlers
//!
//! POST /reports, GET /reports, GET /reports/:id, DELETE /reports/:id,
//! POST /reports/:id/resume

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::{parse_delimiter, resolve_default_delimiter};
use crate::db::catalog::SqliteCatalog;
use crate::db::reports;
use crate::error::{ApiError, ApiResult};
use crate::models::{ReportFile, ReportStatus, RoyaltyReport};
use crate::services::ledger_writer::PayoutSummary;
use crate::services::report_details::{report_details, ReportDetails};
use crate::services::report_pipeline::{decode_upload, spawn_report, ReportPipeline};
use crate::services::resume::resume_report;
use crate::services::reversal::{reverse_report, ReversalSummary};
use crate::services::row_parser::parse_quarter_from_path;
use crate::AppState;

/// POST /reports response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub report_id: String,
    pub message: String,
}

/// GET /reports/:id response
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    #[serde(flatten)]
    pub report: RoyaltyReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ReportDetails>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailsQuery {
    #[serde(default)]
    pub details: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForceQuery {
    #[serde(default)]
    pub force: bool,
}

/// Multipart fields of an upload
#[derive(Debug, Default)]
struct UploadForm {
    files: Vec<ReportFile>,
    quarter: Option<String>,
    year: Option<i32>,
    delimiter: Option<char>,
    uploaded_by: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "file" => {
                let file_name = field.file_name().unwrap_or("upload.csv").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Could not read file {}: {}", file_name, e)))?;
                form.files.push(decode_upload(&file_name, &bytes));
            }
            "quarter" | "year" | "delimiter" | "uploaded_by" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Could not read field {}: {}", name, e)))?;
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }

                match name.as_str() {
                    "quarter" => form.quarter = Some(normalize_quarter(value)?),
                    "year" => {
                        let year = value
                            .parse::<i32>()
                            .map_err(|_| ApiError::BadRequest(format!("Invalid year: {}", value)))?;
                        form.year = Some(year);
                    }
                    "delimiter" => form.delimiter = Some(parse_delimiter(value)?),
                    _ => form.uploaded_by = Some(value.to_string()),
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    Ok(form)
}

/// Accept `Q1`..`Q4` in any case
fn normalize_quarter(value: &str) -> ApiResult<String> {
    let upper = value.to_uppercase();
    match upper.as_str() {
        "Q1" | "Q2" | "Q3" | "Q4" => Ok(upper),
        _ => Err(ApiError::BadRequest(format!("Invalid quarter: {}", value))),
    }
}

/// POST /reports
///
/// Creates the report and returns immediately; processing runs in the background.
pub async fn upload_report(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    let form = read_upload_form(multipart).await?;

    if form.files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    let inferred = form.files.iter().find_map(|f| parse_quarter_from_path(&f.name));
    let (quarter, year) = match (form.quarter, form.year, inferred) {
        (Some(quarter), Some(year), _) => (quarter, year),
        (quarter, year, Some((inferred_quarter, inferred_year))) => {
            (quarter.unwrap_or(inferred_quarter), year.unwrap_or(inferred_year))
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Quarter and year are required (or a file name like 'Q1 2025')".to_string(),
            ))
        }
    };

    let delimiter = match form.delimiter {
        Some(c) => c,
        None => resolve_default_delimiter(&state.db, &state.config).await?,
    };

    let report = reports::create_report(
        &state.db,
        &quarter,
        year,
        form.files.len() as i64,
        form.uploaded_by.as_deref(),
    )
    .await?;

    let report_id = report.id.clone();
    let pipeline = ReportPipeline::new(
        state.db.clone(),
        SqliteCatalog::new(state.db.clone()),
        delimiter,
        &state.config.reconciliation.currency,
    );
    let handle = spawn_report(pipeline, report, form.files);

    let last_error = state.last_error.clone();
    let watched_id = report_id.clone();
    tokio::spawn(async move {
        match handle.await {
            Ok(ReportStatus::Failed) => {
                *last_error.write().await = Some(format!("Report {} failed", watched_id));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(report_id = %watched_id, error = %e, "Report task panicked");
                *last_error.write().await = Some(format!("Report {} task panicked", watched_id));
            }
        }
    });

    tracing::info!(report_id = %report_id, quarter = %quarter, year, delimiter = ?delimiter, "Report upload accepted");

    Ok(Json(UploadResponse {
        success: true,
        report_id,
        message: "Report processing started".to_string(),
    }))
}

/// GET /reports
pub async fn list_reports(State(state): State<AppState>) -> ApiResult<Json<Vec<RoyaltyReport>>> {
    Ok(Json(reports::list_reports(&state.db).await?))
}

/// GET /reports/:id
///
/// With `details=true`, a completed report also carries its detail payload.
pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    Query(query): Query<DetailsQuery>,
) -> ApiResult<Json<ReportResponse>> {
    let report = reports::load_report(&state.db, &report_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Report not found: {}", report_id)))?;

    let details = if query.details && report.status == ReportStatus::Completed {
        Some(report_details(&state.db, &report_id).await?)
    } else {
        None
    };

    Ok(Json(ReportResponse { report, details }))
}

/// DELETE /reports/:id
pub async fn delete_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    Query(query): Query<ForceQuery>,
) -> ApiResult<Json<ReversalSummary>> {
    Ok(Json(reverse_report(&state.db, &report_id, query.force).await?))
}

/// POST /reports/:id/resume
pub async fn resume(State(state): State<AppState>, Path(report_id): Path<String>) -> ApiResult<Json<PayoutSummary>> {
    let summary = resume_report(&state.db, &report_id, &state.config.reconciliation.currency).await?;
    Ok(Json(summary))
}

/// Build report routes
pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports", post(upload_report).get(list_reports))
        .route("/reports/:id", get(get_report).delete(delete_report))
        .route("/reports/:id/resume", post(resume))
}
