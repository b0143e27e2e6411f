//! Form number and form series models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Region a form is issued for
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RegionCode {
    #[serde(rename = "NR")]
    North,
    #[serde(rename = "SR")]
    South,
    #[serde(rename = "ER")]
    East,
    #[serde(rename = "WR")]
    West,
}

impl RegionCode {
    pub fn code(&self) -> &'static str {
        match self {
            RegionCode::North => "NR",
            RegionCode::South => "SR",
            RegionCode::East => "ER",
            RegionCode::West => "WR",
        }
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RegionCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NR" => Ok(RegionCode::North),
            "SR" => Ok(RegionCode::South),
            "ER" => Ok(RegionCode::East),
            "WR" => Ok(RegionCode::West),
            other => Err(format!(
                "unrecognized region code '{}'; expected one of NR, SR, ER, WR",
                other
            )),
        }
    }
}

/// Kind of loan application form
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum FormType {
    #[serde(rename = "IL")]
    Individual,
    #[serde(rename = "GL")]
    Group,
    #[serde(rename = "SL")]
    SmallBusiness,
}

impl FormType {
    pub fn code(&self) -> &'static str {
        match self {
            FormType::Individual => "IL",
            FormType::Group => "GL",
            FormType::SmallBusiness => "SL",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IL" => Ok(FormType::Individual),
            "GL" => Ok(FormType::Group),
            "SL" => Ok(FormType::SmallBusiness),
            other => Err(format!(
                "unrecognized form type '{}'; expected one of IL, GL, SL",
                other
            )),
        }
    }
}

/// Partner form-number issuance request. Codes arrive as raw strings so an
/// unknown value is reported as a validation error with detail.
#[derive(Debug, Deserialize, Validate)]
pub struct IssueFormNumberRequest {
    #[validate(range(min = 1, message = "partner_id must be a positive integer"))]
    pub partner_id: i64,
    pub region_code: String,
    pub form_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FormNumberResponse {
    pub form_number: String,
}

/// Form series status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "series_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    Active,
    Revoked,
    Exhausted,
}

/// A numeric range of paper forms allotted to a partner
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct FormSeries {
    pub id: Uuid,
    pub partner_id: i64,
    pub prefix: String,
    pub start_number: i64,
    pub end_number: i64,
    pub status: SeriesStatus,
    pub created_at: DateTime<Utc>,
}

impl FormSeries {
    /// Whether `start..=end` under `prefix` shares any serial with this series
    pub fn overlaps(&self, prefix: &str, start: i64, end: i64) -> bool {
        self.prefix == prefix && self.start_number <= end && start <= self.end_number
    }

    pub fn size(&self) -> i64 {
        self.end_number - self.start_number + 1
    }
}

/// Request to register a form series
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFormSeriesRequest {
    #[validate(range(min = 1, message = "partner_id must be a positive integer"))]
    pub partner_id: i64,
    #[validate(length(min = 1, max = 16))]
    pub prefix: String,
    #[validate(range(min = 0))]
    pub start_number: i64,
    #[validate(range(min = 0))]
    pub end_number: i64,
    pub status: Option<SeriesStatus>,
}

/// Query for listing form series
#[derive(Debug, Deserialize)]
pub struct ListFormSeriesQuery {
    pub partner_id: Option<i64>,
}
