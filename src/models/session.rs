use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::visibility::VisibilityRule;

/// Named subsection of a questionnaire. `order_index` is a display hint,
/// conventionally sequential from 1 but not required unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub questionnaire_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub visibility: Option<VisibilityRule>,
}
