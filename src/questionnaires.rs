//! Questionnaire operations — the creation/read surface consumed by the
//! API layer, plus the nested tree views it serialises.

use chrono::Local;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::error::QuestionnaireError;
use crate::models::*;

// ═══════════════════════════════════════════
// View types — full tree, nested
// ═══════════════════════════════════════════

/// Complete questionnaire tree: sessions, questions and alternatives in
/// display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionnaireTree {
    pub questionnaire: Questionnaire,
    pub sessions: Vec<SessionNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionNode {
    pub session: Session,
    pub questions: Vec<QuestionNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionNode {
    pub question: Question,
    pub alternatives: Vec<Alternative>,
}

impl QuestionnaireTree {
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn question_count(&self) -> usize {
        self.sessions.iter().map(|s| s.questions.len()).sum()
    }

    pub fn alternative_count(&self) -> usize {
        self.sessions
            .iter()
            .flat_map(|s| &s.questions)
            .map(|q| q.alternatives.len())
            .sum()
    }
}

// ═══════════════════════════════════════════
// Input types
// ═══════════════════════════════════════════

/// Input for creating a questionnaire.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestionnaire {
    pub title: String,
    pub description: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub literature_sources: Vec<LiteratureSource>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Input for adding a session to a questionnaire. Without an explicit
/// `order_index` the store assigns max(order)+1.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub questionnaire_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: Option<i32>,
    pub visibility: Option<VisibilityRule>,
}

/// Input for adding a question to a session.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub session_id: Uuid,
    pub text: String,
    pub response_type: ResponseType,
    pub scoring_method: ScoringMethod,
    pub order_index: Option<i32>,
    #[serde(default)]
    pub required: bool,
}

/// Input for adding an alternative to a question.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAlternative {
    pub question_id: Uuid,
    pub text: String,
    pub value: f64,
    pub order_index: i32,
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

/// Create a questionnaire from validated input.
///
/// The (title, version) pair is unique across all questionnaires; a
/// collision surfaces as `Conflict` carrying the existing row's id.
pub fn create_questionnaire(
    conn: &Connection,
    input: NewQuestionnaire,
) -> Result<Questionnaire, QuestionnaireError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(QuestionnaireError::validation("title", "title must not be empty"));
    }
    let version = match input.version.as_deref().map(str::trim) {
        Some("") => {
            return Err(QuestionnaireError::validation(
                "version",
                "version label must not be empty when present",
            ))
        }
        other => other.map(ToString::to_string),
    };

    let questionnaire = Questionnaire {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: input.description,
        version,
        literature_sources: input.literature_sources,
        active: input.active,
        created_at: Local::now().naive_local(),
    };

    match insert_questionnaire(conn, &questionnaire) {
        Ok(()) => {
            tracing::info!(questionnaire_id = %questionnaire.id, title = %questionnaire.title,
                "Questionnaire created");
            Ok(questionnaire)
        }
        Err(e) => {
            if e.unique_violation().is_some() {
                if let Some(existing) = get_questionnaire_by_title_version(
                    conn,
                    &questionnaire.title,
                    questionnaire.version.as_deref(),
                )? {
                    return Err(QuestionnaireError::Conflict {
                        title: questionnaire.title,
                        existing_id: existing.id,
                    });
                }
            }
            Err(e.into())
        }
    }
}

/// The full tree of a questionnaire.
pub fn read_questionnaire_tree(
    conn: &Connection,
    id: &Uuid,
) -> Result<QuestionnaireTree, QuestionnaireError> {
    get_questionnaire_tree(conn, id)?.ok_or_else(|| QuestionnaireError::not_found("Questionnaire", id))
}

/// Assemble the nested tree, `None` when the root does not exist.
pub fn get_questionnaire_tree(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<QuestionnaireTree>, DatabaseError> {
    let Some(questionnaire) = get_questionnaire(conn, id)? else {
        return Ok(None);
    };

    let mut sessions = Vec::new();
    for session in get_sessions_by_questionnaire(conn, id)? {
        let mut questions = Vec::new();
        for question in get_questions_by_session(conn, &session.id)? {
            let alternatives = get_alternatives_by_question(conn, &question.id)?;
            questions.push(QuestionNode { question, alternatives });
        }
        sessions.push(SessionNode { session, questions });
    }

    Ok(Some(QuestionnaireTree { questionnaire, sessions }))
}

/// Add a session, validating that any visibility rule in the typed shape
/// references a question of the same questionnaire.
pub fn add_session(conn: &Connection, input: NewSession) -> Result<Session, QuestionnaireError> {
    if input.title.trim().is_empty() {
        return Err(QuestionnaireError::validation("title", "title must not be empty"));
    }
    if get_questionnaire(conn, &input.questionnaire_id)?.is_none() {
        return Err(QuestionnaireError::not_found("Questionnaire", &input.questionnaire_id));
    }
    if let Some(trigger) = input.visibility.as_ref().and_then(VisibilityRule::trigger_question) {
        if !question_belongs_to_questionnaire(conn, &trigger, &input.questionnaire_id)? {
            return Err(QuestionnaireError::validation(
                "visibility",
                "triggering question must belong to the same questionnaire",
            ));
        }
    }

    let mut session = Session {
        id: Uuid::new_v4(),
        questionnaire_id: input.questionnaire_id,
        title: input.title.trim().to_string(),
        description: input.description,
        order_index: input.order_index.unwrap_or_default(),
        visibility: input.visibility,
    };
    match input.order_index {
        Some(_) => insert_session(conn, &session)?,
        None => session.order_index = insert_session_auto_order(conn, &session)?,
    }
    Ok(session)
}

/// Add a question to a session.
pub fn add_question(conn: &Connection, input: NewQuestion) -> Result<Question, QuestionnaireError> {
    if input.text.trim().is_empty() {
        return Err(QuestionnaireError::validation("text", "question text must not be empty"));
    }
    if get_session(conn, &input.session_id)?.is_none() {
        return Err(QuestionnaireError::not_found("Session", &input.session_id));
    }

    let mut question = Question {
        id: Uuid::new_v4(),
        session_id: input.session_id,
        text: input.text.trim().to_string(),
        response_type: input.response_type,
        scoring_method: input.scoring_method,
        order_index: input.order_index.unwrap_or_default(),
        required: input.required,
    };
    match input.order_index {
        Some(_) => insert_question(conn, &question)?,
        None => question.order_index = insert_question_auto_order(conn, &question)?,
    }
    Ok(question)
}

/// Add an alternative to a question. The score value must be a finite
/// number — the reporting layer aggregates it blindly.
pub fn add_alternative(
    conn: &Connection,
    input: NewAlternative,
) -> Result<Alternative, QuestionnaireError> {
    if !input.value.is_finite() {
        return Err(QuestionnaireError::validation(
            "value",
            "alternative value must be a finite number",
        ));
    }
    if get_question(conn, &input.question_id)?.is_none() {
        return Err(QuestionnaireError::not_found("Question", &input.question_id));
    }

    let alternative = Alternative {
        id: Uuid::new_v4(),
        question_id: input.question_id,
        text: input.text,
        value: input.value,
        order_index: input.order_index,
    };
    insert_alternative(conn, &alternative)?;
    Ok(alternative)
}
