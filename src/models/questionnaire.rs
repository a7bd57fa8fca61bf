use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root document for one standardized assessment instrument, versioned by
/// a free-text label embedded in the title (see [`crate::versioning`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub literature_sources: Vec<LiteratureSource>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

/// Bibliographic record backing an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureSource {
    pub title: String,
    pub authors: Option<String>,
    pub year: Option<SourceYear>,
}

/// Publication year as found in imported records: numeric or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceYear {
    Number(i32),
    Text(String),
}
