//! Database model types for Diesel ORM.

use diesel::prelude::*;

use super::schema::{aggregates, insights, predictions};

/// Database row for a prediction.
///
/// The full record lives in `record` as JSON; the other columns are
/// denormalized for filtering.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = predictions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PredictionRow {
    pub id: String,
    pub created_at: String,
    pub mode: String,
    pub symbol: String,
    pub direction: String,
    pub status: String,
    pub confidence: f64,
    pub setup_key: String,
    pub validated_at: Option<String>,
    pub record: String,
}

/// Database row for one aggregate bucket of a period.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = aggregates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AggregateRow {
    pub period: String,
    pub dimension: String,
    pub value: String,
    pub period_start: String,
    pub trades: i32,
    pub wins: i32,
    pub losses: i32,
    pub expired: i32,
    pub sum_r: f64,
    pub gross_profit_r: f64,
    pub gross_loss_r: f64,
    pub calibration: Option<String>,
    pub computed_at: String,
}

/// Database row for an insight record.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = insights)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InsightRow {
    pub period: String,
    pub period_kind: String,
    pub period_start: String,
    pub version: i64,
    pub generated_at: String,
    pub record: String,
}
