//! Scan trigger handlers
//!
//! Each trigger runs one scan to completion and answers with its summary.
//! Only one scan per source kind runs at a time; an overlapping trigger gets
//! 409 instead of queueing behind the running one.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use paperscout_common::errors::{AppError, Result};
use paperscout_common::{DateRange, ScanSummary, SourceKind};
use paperscout_discovery::PrimaryScanRequest;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use validator::Validate;

use crate::AppState;

/// One lock per source kind
#[derive(Clone, Default)]
pub struct ScanLocks {
    primary: Arc<Mutex<()>>,
    secondary: Arc<Mutex<()>>,
}

impl ScanLocks {
    fn lock_for(&self, kind: SourceKind) -> &Arc<Mutex<()>> {
        match kind {
            SourceKind::Primary => &self.primary,
            SourceKind::Secondary => &self.secondary,
        }
    }

    /// Claim the slot for `kind` or fail with `ScanInProgress`
    pub fn try_claim(&self, kind: SourceKind) -> Result<OwnedMutexGuard<()>> {
        self.lock_for(kind)
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::ScanInProgress {
                kind: kind.to_string(),
            })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryScanParams {
    /// YYYYMMDD, together with `to`
    pub from: Option<String>,
    pub to: Option<String>,

    /// Upper bound comes from `arxiv.max_results_cap`
    #[validate(range(min = 1))]
    pub max_results_per_keyword: Option<u32>,
}

impl PrimaryScanParams {
    fn check_cap(&self, cap: u32) -> Result<()> {
        match self.max_results_per_keyword {
            Some(requested) if requested > cap => Err(AppError::invalid(
                "max_results_per_keyword",
                format!("maxResultsPerKeyword must be at most {}", cap),
            )),
            _ => Ok(()),
        }
    }

    fn date_range(&self) -> Result<Option<DateRange>> {
        match (self.from.as_deref(), self.to.as_deref()) {
            (Some(from), Some(to)) => DateRange::parse(from, to).map(Some),
            (None, None) => Ok(None),
            _ => Err(AppError::InvalidDateRange {
                message: "from and to must be given together".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryScanParams {
    #[validate(range(min = 1900, max = 2100))]
    pub year_from: Option<i32>,
}

fn query_error(rejection: QueryRejection) -> AppError {
    AppError::Validation {
        message: rejection.body_text(),
        field: None,
    }
}

fn validation_error(errors: validator::ValidationErrors) -> AppError {
    let field = errors.field_errors().keys().next().map(|name| name.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}

/// Keyword scan of the primary source
pub async fn scan_primary(
    State(state): State<AppState>,
    params: std::result::Result<Query<PrimaryScanParams>, QueryRejection>,
) -> Result<Json<ScanSummary>> {
    let Query(params) = params.map_err(query_error)?;
    params.validate().map_err(validation_error)?;
    params.check_cap(state.config.arxiv.max_results_cap)?;

    let request = PrimaryScanRequest {
        date_range: params.date_range()?,
        max_results_per_keyword: params.max_results_per_keyword,
    };

    let guard = state.scan_locks.try_claim(SourceKind::Primary)?;
    let scanner = state.scanner.clone();

    // Runs to completion even if the caller disconnects
    let summary = tokio::spawn(async move {
        let _guard = guard;
        scanner.scan_primary(request).await
    })
    .await
    .map_err(|e| AppError::Internal {
        message: format!("scan task failed: {}", e),
    })??;

    Ok(Json(summary))
}

/// Scholar scan through the external script
pub async fn scan_secondary(
    State(state): State<AppState>,
    params: std::result::Result<Query<SecondaryScanParams>, QueryRejection>,
) -> Result<Json<ScanSummary>> {
    let Query(params) = params.map_err(query_error)?;
    params.validate().map_err(validation_error)?;

    let guard = state.scan_locks.try_claim(SourceKind::Secondary)?;
    let scanner = state.scanner.clone();

    let summary = tokio::spawn(async move {
        let _guard = guard;
        scanner.scan_secondary(params.year_from).await
    })
    .await
    .map_err(|e| AppError::Internal {
        message: format!("scan task failed: {}", e),
    })??;

    Ok(Json(summary))
}
