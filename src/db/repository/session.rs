use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Session, VisibilityRule};

pub fn insert_session(conn: &Connection, session: &Session) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (id, questionnaire_id, title, description, order_index,
         visibility_rule)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session.id.to_string(),
            session.questionnaire_id.to_string(),
            session.title,
            session.description,
            session.order_index,
            rule_to_json(session.visibility.as_ref())?,
        ],
    )?;
    Ok(())
}

/// Insert a session with `order_index` assigned as max(order)+1 within its
/// questionnaire. The assignment happens inside the INSERT statement, so
/// concurrent writers cannot observe the same maximum. Returns the
/// assigned order.
pub fn insert_session_auto_order(conn: &Connection, session: &Session) -> Result<i32, DatabaseError> {
    let order: i32 = conn.query_row(
        "INSERT INTO sessions (id, questionnaire_id, title, description, order_index,
         visibility_rule)
         VALUES (?1, ?2, ?3, ?4,
                 (SELECT COALESCE(MAX(order_index), 0) + 1 FROM sessions
                  WHERE questionnaire_id = ?2),
                 ?5)
         RETURNING order_index",
        params![
            session.id.to_string(),
            session.questionnaire_id.to_string(),
            session.title,
            session.description,
            rule_to_json(session.visibility.as_ref())?,
        ],
        |row| row.get(0),
    )?;
    Ok(order)
}

pub fn get_session(conn: &Connection, id: &Uuid) -> Result<Option<Session>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, questionnaire_id, title, description, order_index, visibility_rule
         FROM sessions WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], session_row);

    match result {
        Ok(row) => Ok(Some(session_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Sessions of a questionnaire in display order.
pub fn get_sessions_by_questionnaire(
    conn: &Connection,
    questionnaire_id: &Uuid,
) -> Result<Vec<Session>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, questionnaire_id, title, description, order_index, visibility_rule
         FROM sessions WHERE questionnaire_id = ?1 ORDER BY order_index ASC",
    )?;

    let rows = stmt.query_map(params![questionnaire_id.to_string()], |row| Ok(session_row(row)))?;

    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(session_from_row(row??)?);
    }
    Ok(sessions)
}

pub fn update_session(conn: &Connection, session: &Session) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE sessions SET title = ?2, description = ?3, order_index = ?4,
         visibility_rule = ?5
         WHERE id = ?1",
        params![
            session.id.to_string(),
            session.title,
            session.description,
            session.order_index,
            rule_to_json(session.visibility.as_ref())?,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Session".into(),
            id: session.id.to_string(),
        });
    }
    Ok(())
}

/// Replace only the visibility rule of a session.
pub fn update_session_visibility(
    conn: &Connection,
    session_id: &Uuid,
    rule: Option<&VisibilityRule>,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE sessions SET visibility_rule = ?2 WHERE id = ?1",
        params![session_id.to_string(), rule_to_json(rule)?],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Session".into(),
            id: session_id.to_string(),
        });
    }
    Ok(())
}

/// Delete a session; its questions and alternatives follow through the
/// CASCADE foreign keys.
pub fn delete_session_cascade(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let id_str = id.to_string();

    let questions: i64 = conn.query_row(
        "SELECT COUNT(*) FROM questions WHERE session_id = ?1",
        params![id_str],
        |row| row.get(0),
    )?;

    let deleted = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id_str])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Session".into(),
            id: id_str,
        });
    }

    tracing::info!(session_id = %id, questions, "Session cascade-deleted");
    Ok(())
}

fn rule_to_json(rule: Option<&VisibilityRule>) -> Result<Option<String>, DatabaseError> {
    rule.map(|r| {
        serde_json::to_string(r).map_err(|e| DatabaseError::MalformedPayload {
            column: "visibility_rule".into(),
            reason: e.to_string(),
        })
    })
    .transpose()
}

// Internal row type for Session mapping
struct SessionRow {
    id: String,
    questionnaire_id: String,
    title: String,
    description: Option<String>,
    order_index: i32,
    visibility_rule: Option<String>,
}

fn session_row(row: &rusqlite::Row<'_>) -> Result<SessionRow, rusqlite::Error> {
    Ok(SessionRow {
        id: row.get(0)?,
        questionnaire_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        order_index: row.get(4)?,
        visibility_rule: row.get(5)?,
    })
}

fn session_from_row(row: SessionRow) -> Result<Session, DatabaseError> {
    let visibility = row
        .visibility_rule
        .as_deref()
        .map(|json| {
            serde_json::from_str::<VisibilityRule>(json).map_err(|e| {
                DatabaseError::MalformedPayload {
                    column: "visibility_rule".into(),
                    reason: e.to_string(),
                }
            })
        })
        .transpose()?;

    Ok(Session {
        id: Uuid::parse_str(&row.id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        questionnaire_id: Uuid::parse_str(&row.questionnaire_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        title: row.title,
        description: row.description,
        order_index: row.order_index,
        visibility,
    })
}
