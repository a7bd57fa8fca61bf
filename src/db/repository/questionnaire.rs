use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{LiteratureSource, Questionnaire};
use crate::versioning;

pub fn insert_questionnaire(conn: &Connection, q: &Questionnaire) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO questionnaires (id, title, description, version, literature_sources,
         active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            q.id.to_string(),
            q.title,
            q.description,
            q.version,
            sources_to_json(&q.literature_sources)?,
            q.active as i32,
            q.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_questionnaire(conn: &Connection, id: &Uuid) -> Result<Option<Questionnaire>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, version, literature_sources, active, created_at
         FROM questionnaires WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], questionnaire_row);

    match result {
        Ok(row) => Ok(Some(questionnaire_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Exact-title lookup. Derived titles embed the version marker, so this is
/// the uniqueness probe the clone engine runs before copying.
pub fn get_questionnaire_by_title(
    conn: &Connection,
    title: &str,
) -> Result<Option<Questionnaire>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, version, literature_sources, active, created_at
         FROM questionnaires WHERE title = ?1 LIMIT 1",
    )?;

    let result = stmt.query_row(params![title], questionnaire_row);

    match result {
        Ok(row) => Ok(Some(questionnaire_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Lookup by the full (title, version) key, version-absent rows included.
pub fn get_questionnaire_by_title_version(
    conn: &Connection,
    title: &str,
    version: Option<&str>,
) -> Result<Option<Questionnaire>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, version, literature_sources, active, created_at
         FROM questionnaires
         WHERE title = ?1 AND COALESCE(version, '') = COALESCE(?2, '') LIMIT 1",
    )?;

    let result = stmt.query_row(params![title, version], questionnaire_row);

    match result {
        Ok(row) => Ok(Some(questionnaire_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_questionnaires(conn: &Connection) -> Result<Vec<Questionnaire>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, version, literature_sources, active, created_at
         FROM questionnaires ORDER BY title ASC, created_at ASC",
    )?;

    let rows = stmt.query_map([], |row| Ok(questionnaire_row(row)))?;

    let mut questionnaires = Vec::new();
    for row in rows {
        questionnaires.push(questionnaire_from_row(row??)?);
    }
    Ok(questionnaires)
}

/// All stored versions of one instrument: the bare base title plus every
/// annotated derivative, oldest first.
pub fn list_versions(conn: &Connection, title: &str) -> Result<Vec<Questionnaire>, DatabaseError> {
    let base = versioning::base_title(title);
    let annotated_pattern = format!("{base} (versão: %");
    let mut stmt = conn.prepare(
        "SELECT id, title, description, version, literature_sources, active, created_at
         FROM questionnaires
         WHERE title = ?1 OR title LIKE ?2
         ORDER BY created_at ASC, title ASC",
    )?;

    let rows = stmt.query_map(params![base, annotated_pattern], |row| Ok(questionnaire_row(row)))?;

    let mut questionnaires = Vec::new();
    for row in rows {
        questionnaires.push(questionnaire_from_row(row??)?);
    }
    Ok(questionnaires)
}

pub fn update_questionnaire(conn: &Connection, q: &Questionnaire) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE questionnaires SET title = ?2, description = ?3, version = ?4,
         literature_sources = ?5, active = ?6
         WHERE id = ?1",
        params![
            q.id.to_string(),
            q.title,
            q.description,
            q.version,
            sources_to_json(&q.literature_sources)?,
            q.active as i32,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Questionnaire".into(),
            id: q.id.to_string(),
        });
    }
    Ok(())
}

/// Delete a questionnaire and its whole tree.
///
/// Sessions, questions and alternatives go with it through the schema's
/// CASCADE foreign keys; children are counted first so the log records
/// what the cascade removed.
pub fn delete_questionnaire_cascade(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let id_str = id.to_string();

    let sessions: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE questionnaire_id = ?1",
        params![id_str],
        |row| row.get(0),
    )?;
    let questions: i64 = conn.query_row(
        "SELECT COUNT(*) FROM questions WHERE session_id IN
         (SELECT id FROM sessions WHERE questionnaire_id = ?1)",
        params![id_str],
        |row| row.get(0),
    )?;
    let alternatives: i64 = conn.query_row(
        "SELECT COUNT(*) FROM alternatives WHERE question_id IN
         (SELECT id FROM questions WHERE session_id IN
          (SELECT id FROM sessions WHERE questionnaire_id = ?1))",
        params![id_str],
        |row| row.get(0),
    )?;

    let deleted = conn.execute("DELETE FROM questionnaires WHERE id = ?1", params![id_str])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Questionnaire".into(),
            id: id_str,
        });
    }

    tracing::info!(
        questionnaire_id = %id,
        sessions,
        questions,
        alternatives,
        "Questionnaire cascade-deleted with all child entities"
    );

    Ok(())
}

fn sources_to_json(sources: &[LiteratureSource]) -> Result<String, DatabaseError> {
    serde_json::to_string(sources).map_err(|e| DatabaseError::MalformedPayload {
        column: "literature_sources".into(),
        reason: e.to_string(),
    })
}

// Internal row type for Questionnaire mapping
struct QuestionnaireRow {
    id: String,
    title: String,
    description: Option<String>,
    version: Option<String>,
    literature_sources: String,
    active: i32,
    created_at: String,
}

fn questionnaire_row(row: &rusqlite::Row<'_>) -> Result<QuestionnaireRow, rusqlite::Error> {
    Ok(QuestionnaireRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        version: row.get(3)?,
        literature_sources: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn questionnaire_from_row(row: QuestionnaireRow) -> Result<Questionnaire, DatabaseError> {
    let literature_sources: Vec<LiteratureSource> =
        serde_json::from_str(&row.literature_sources).map_err(|e| {
            DatabaseError::MalformedPayload {
                column: "literature_sources".into(),
                reason: e.to_string(),
            }
        })?;

    Ok(Questionnaire {
        id: Uuid::parse_str(&row.id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        title: row.title,
        description: row.description,
        version: row.version,
        literature_sources,
        active: row.active != 0,
        created_at: NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_default(),
    })
}
