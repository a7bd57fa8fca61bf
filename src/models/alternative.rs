use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One selectable answer option, with its numeric score contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub value: f64,
    pub order_index: i32,
}
