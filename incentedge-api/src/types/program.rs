//! Program catalog DTOs.

use chrono::NaiveDate;
use incentedge_core::{Program, ProgramType};
use serde::{Deserialize, Serialize};

/// Admin-only request to add a program to the catalog. Mirrors the shape
/// produced by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateProgramRequest {
    pub name: String,
    pub provider: String,
    pub program_type: ProgramType,
    pub funding_amount: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub deadline: Option<NaiveDate>,
    pub default_window_days: Option<i32>,
    pub eligibility: Option<String>,
    pub source_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Query parameters for listing programs.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ProgramListQuery {
    pub program_type: Option<ProgramType>,
    pub active: Option<bool>,
    /// Case-insensitive substring match against name and provider
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ProgramListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 200)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProgramListResponse {
    pub programs: Vec<Program>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
