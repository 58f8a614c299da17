use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Generated report metadata
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: i64,
    pub filename: String,
    pub filepath: String,
    pub report_type: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub filename: String,
    pub filepath: String,
    pub report_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub generated_at: NaiveDateTime,
}
