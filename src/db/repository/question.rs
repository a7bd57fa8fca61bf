use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Question, ResponseType, ScoringMethod};

pub fn insert_question(conn: &Connection, question: &Question) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO questions (id, session_id, text, response_type, scoring_method,
         order_index, required)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            question.id.to_string(),
            question.session_id.to_string(),
            question.text,
            question.response_type.as_str(),
            question.scoring_method.as_str(),
            question.order_index,
            question.required as i32,
        ],
    )?;
    Ok(())
}

/// Insert a question with `order_index` assigned as max(order)+1 within its
/// session, computed inside the INSERT statement. Returns the assigned
/// order.
pub fn insert_question_auto_order(conn: &Connection, question: &Question) -> Result<i32, DatabaseError> {
    let order: i32 = conn.query_row(
        "INSERT INTO questions (id, session_id, text, response_type, scoring_method,
         order_index, required)
         VALUES (?1, ?2, ?3, ?4, ?5,
                 (SELECT COALESCE(MAX(order_index), 0) + 1 FROM questions
                  WHERE session_id = ?2),
                 ?6)
         RETURNING order_index",
        params![
            question.id.to_string(),
            question.session_id.to_string(),
            question.text,
            question.response_type.as_str(),
            question.scoring_method.as_str(),
            question.required as i32,
        ],
        |row| row.get(0),
    )?;
    Ok(order)
}

pub fn get_question(conn: &Connection, id: &Uuid) -> Result<Option<Question>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, text, response_type, scoring_method, order_index, required
         FROM questions WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], question_row);

    match result {
        Ok(row) => Ok(Some(question_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Questions of a session in display order.
pub fn get_questions_by_session(
    conn: &Connection,
    session_id: &Uuid,
) -> Result<Vec<Question>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, text, response_type, scoring_method, order_index, required
         FROM questions WHERE session_id = ?1 ORDER BY order_index ASC",
    )?;

    let rows = stmt.query_map(params![session_id.to_string()], |row| Ok(question_row(row)))?;

    let mut questions = Vec::new();
    for row in rows {
        questions.push(question_from_row(row??)?);
    }
    Ok(questions)
}

/// Whether a question belongs to the given questionnaire (through its
/// session). Visibility rules may only reference questions that do.
pub fn question_belongs_to_questionnaire(
    conn: &Connection,
    question_id: &Uuid,
    questionnaire_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let found: i64 = conn.query_row(
        "SELECT COUNT(*) FROM questions q
         JOIN sessions s ON q.session_id = s.id
         WHERE q.id = ?1 AND s.questionnaire_id = ?2",
        params![question_id.to_string(), questionnaire_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(found > 0)
}

pub fn update_question(conn: &Connection, question: &Question) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE questions SET text = ?2, response_type = ?3, scoring_method = ?4,
         order_index = ?5, required = ?6
         WHERE id = ?1",
        params![
            question.id.to_string(),
            question.text,
            question.response_type.as_str(),
            question.scoring_method.as_str(),
            question.order_index,
            question.required as i32,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Question".into(),
            id: question.id.to_string(),
        });
    }
    Ok(())
}

/// Delete a question; its alternatives follow through the CASCADE foreign
/// key.
pub fn delete_question_cascade(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let id_str = id.to_string();

    let alternatives: i64 = conn.query_row(
        "SELECT COUNT(*) FROM alternatives WHERE question_id = ?1",
        params![id_str],
        |row| row.get(0),
    )?;

    let deleted = conn.execute("DELETE FROM questions WHERE id = ?1", params![id_str])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Question".into(),
            id: id_str,
        });
    }

    tracing::info!(question_id = %id, alternatives, "Question cascade-deleted");
    Ok(())
}

// Internal row type for Question mapping
struct QuestionRow {
    id: String,
    session_id: String,
    text: String,
    response_type: String,
    scoring_method: String,
    order_index: i32,
    required: i32,
}

fn question_row(row: &rusqlite::Row<'_>) -> Result<QuestionRow, rusqlite::Error> {
    Ok(QuestionRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        text: row.get(2)?,
        response_type: row.get(3)?,
        scoring_method: row.get(4)?,
        order_index: row.get(5)?,
        required: row.get(6)?,
    })
}

fn question_from_row(row: QuestionRow) -> Result<Question, DatabaseError> {
    Ok(Question {
        id: Uuid::parse_str(&row.id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        session_id: Uuid::parse_str(&row.session_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        text: row.text,
        response_type: ResponseType::from_str(&row.response_type)?,
        scoring_method: ScoringMethod::from_str(&row.scoring_method)?,
        order_index: row.order_index,
        required: row.required != 0,
    })
}
