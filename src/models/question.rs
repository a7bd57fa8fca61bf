use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ResponseType, ScoringMethod};

/// A single prompt within a session. The scoring method is carried for the
/// reporting layer; this crate only stores and clones it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub session_id: Uuid,
    pub text: String,
    pub response_type: ResponseType,
    pub scoring_method: ScoringMethod,
    pub order_index: i32,
    pub required: bool,
}
