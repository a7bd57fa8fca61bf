use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Alternative;

pub fn insert_alternative(conn: &Connection, alt: &Alternative) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO alternatives (id, question_id, text, value, order_index)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            alt.id.to_string(),
            alt.question_id.to_string(),
            alt.text,
            alt.value,
            alt.order_index,
        ],
    )?;
    Ok(())
}

/// Alternatives of a question in display order.
pub fn get_alternatives_by_question(
    conn: &Connection,
    question_id: &Uuid,
) -> Result<Vec<Alternative>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, question_id, text, value, order_index
         FROM alternatives WHERE question_id = ?1 ORDER BY order_index ASC",
    )?;

    let rows = stmt.query_map(params![question_id.to_string()], |row| {
        Ok(AlternativeRow {
            id: row.get(0)?,
            question_id: row.get(1)?,
            text: row.get(2)?,
            value: row.get(3)?,
            order_index: row.get(4)?,
        })
    })?;

    let mut alternatives = Vec::new();
    for row in rows {
        alternatives.push(alternative_from_row(row?)?);
    }
    Ok(alternatives)
}

pub fn update_alternative(conn: &Connection, alt: &Alternative) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE alternatives SET text = ?2, value = ?3, order_index = ?4 WHERE id = ?1",
        params![alt.id.to_string(), alt.text, alt.value, alt.order_index],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Alternative".into(),
            id: alt.id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_alternative(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM alternatives WHERE id = ?1", params![id.to_string()])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Alternative".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// Internal row type for Alternative mapping
struct AlternativeRow {
    id: String,
    question_id: String,
    text: String,
    value: f64,
    order_index: i32,
}

fn alternative_from_row(row: AlternativeRow) -> Result<Alternative, DatabaseError> {
    Ok(Alternative {
        id: Uuid::parse_str(&row.id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        question_id: Uuid::parse_str(&row.question_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        text: row.text,
        value: row.value,
        order_index: row.order_index,
    })
}
