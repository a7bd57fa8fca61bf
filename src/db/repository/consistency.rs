use rusqlite::Connection;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::VisibilityRule;
use super::question::question_belongs_to_questionnaire;
use super::session::get_sessions_by_questionnaire;

/// A single integrity issue detected by the checker.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IntegrityIssue {
    pub category: String,
    pub severity: String,
    pub description: String,
    pub session_id: Option<String>,
}

/// Result of an integrity check over one questionnaire's visibility rules.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IntegrityReport {
    pub issues: Vec<IntegrityIssue>,
    pub sessions_checked: i64,
}

/// Check every visibility rule of a questionnaire.
///
/// Detects:
/// - Rules whose triggering question does not resolve within the same
///   questionnaire (dangling weak reference)
/// - Rules gating a session on a question from the same or a later session
/// - Rule payloads in a legacy, untyped shape
///
/// Read-only: rewriting a clinical rule is a curator decision, so no
/// repair path is offered.
pub fn check_visibility_integrity(
    conn: &Connection,
    questionnaire_id: &Uuid,
) -> Result<IntegrityReport, DatabaseError> {
    let sessions = get_sessions_by_questionnaire(conn, questionnaire_id)?;
    let mut issues = Vec::new();

    for session in &sessions {
        let Some(rule) = &session.visibility else { continue };

        match rule {
            VisibilityRule::Legacy(_) => {
                issues.push(IntegrityIssue {
                    category: "legacy_rule_shape".into(),
                    severity: "medium".into(),
                    description: "Visibility rule payload is not in the typed shape".into(),
                    session_id: Some(session.id.to_string()),
                });
            }
            VisibilityRule::Conditional(cond) => {
                if !question_belongs_to_questionnaire(conn, &cond.question_id, questionnaire_id)? {
                    issues.push(IntegrityIssue {
                        category: "dangling_trigger".into(),
                        severity: "high".into(),
                        description: format!(
                            "Triggering question {} does not belong to this questionnaire",
                            cond.question_id
                        ),
                        session_id: Some(session.id.to_string()),
                    });
                } else if !trigger_precedes_session(conn, &cond.question_id, session.order_index)? {
                    issues.push(IntegrityIssue {
                        category: "forward_trigger".into(),
                        severity: "low".into(),
                        description: format!(
                            "Triggering question {} is not in an earlier session than the one it gates",
                            cond.question_id
                        ),
                        session_id: Some(session.id.to_string()),
                    });
                }
            }
        }
    }

    Ok(IntegrityReport {
        issues,
        sessions_checked: sessions.len() as i64,
    })
}

/// Whether the question's owning session is ordered before the gated one.
fn trigger_precedes_session(
    conn: &Connection,
    question_id: &Uuid,
    gated_order: i32,
) -> Result<bool, DatabaseError> {
    let earlier: i64 = conn.query_row(
        "SELECT COUNT(*) FROM questions q
         JOIN sessions s ON q.session_id = s.id
         WHERE q.id = ?1 AND s.order_index < ?2",
        rusqlite::params![question_id.to_string(), gated_order],
        |row| row.get(0),
    )?;
    Ok(earlier > 0)
}
