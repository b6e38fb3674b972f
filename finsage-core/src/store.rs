//! SQLite persistence for loan analyses and advisor chat transcripts.
//!
//! Payloads (the applicant profile and the attribution ranking) are stored as
//! JSON text written straight from their typed form, so key order survives a
//! round trip through the database.

use crate::error::StoreError;
use crate::types::Role;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS loan_analyses (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    applicant          TEXT    NOT NULL,
    prediction         INTEGER NOT NULL,
    feature_importance TEXT,
    insights           TEXT,
    created_at         TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT    NOT NULL,
    analysis_id INTEGER REFERENCES loan_analyses(id) ON DELETE SET NULL,
    role        TEXT    NOT NULL,
    content     TEXT    NOT NULL,
    created_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_session ON chat_history(session_id, id);
"#;

/// A persisted analysis.
#[derive(Debug, Clone)]
pub struct StoredAnalysis {
    pub id: i64,
    pub prediction: i64,
    pub insights: Option<String>,
    pub created_at: DateTime<Utc>,
    applicant_json: String,
    feature_importance_json: Option<String>,
}

impl StoredAnalysis {
    /// Decode the applicant payload.
    pub fn applicant<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_str(&self.applicant_json).map_err(|e| StoreError::Corrupt {
            id: self.id,
            message: format!("applicant: {e}"),
        })
    }

    /// Decode the attribution ranking, if one was saved.
    pub fn feature_importance<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        self.feature_importance_json
            .as_deref()
            .map(|json| {
                serde_json::from_str(json).map_err(|e| StoreError::Corrupt {
                    id: self.id,
                    message: format!("feature_importance: {e}"),
                })
            })
            .transpose()
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRecord {
    pub id: i64,
    pub session_id: Uuid,
    pub analysis_id: Option<i64>,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed store.
pub struct AnalysisStore {
    conn: Connection,
}

impl AnalysisStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "Opened analysis store");
        Self::with_connection(conn)
    }

    /// An in-memory store, used by tests and `--no-save` runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Save an analysis and return its id.
    pub fn save_analysis<A, F>(
        &self,
        applicant: &A,
        prediction: i64,
        feature_importance: Option<&F>,
        insights: Option<&str>,
    ) -> Result<i64, StoreError>
    where
        A: Serialize + ?Sized,
        F: Serialize + ?Sized,
    {
        let applicant_json = to_json(applicant)?;
        let importance_json = feature_importance.map(to_json).transpose()?;
        self.conn.execute(
            "INSERT INTO loan_analyses (applicant, prediction, feature_importance, insights, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                applicant_json,
                prediction,
                importance_json,
                insights,
                Utc::now().to_rfc3339()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(analysis_id = id, "Saved loan analysis");
        Ok(id)
    }

    /// Fetch one analysis by id.
    pub fn get_analysis(&self, id: i64) -> Result<StoredAnalysis, StoreError> {
        self.conn
            .query_row(
                "SELECT id, applicant, prediction, feature_importance, insights, created_at
                 FROM loan_analyses WHERE id = ?1",
                params![id],
                analysis_from_row,
            )
            .optional()?
            .ok_or(StoreError::AnalysisNotFound { id })?
    }

    /// The most recent analyses, newest first.
    pub fn recent_analyses(&self, limit: usize) -> Result<Vec<StoredAnalysis>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, applicant, prediction, feature_importance, insights, created_at
             FROM loan_analyses ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], analysis_from_row)?;
        let mut analyses = Vec::new();
        for row in rows {
            analyses.push(row??);
        }
        Ok(analyses)
    }

    /// Append a chat message to a session transcript.
    pub fn save_chat_message(
        &self,
        session_id: Uuid,
        analysis_id: Option<i64>,
        role: Role,
        content: &str,
    ) -> Result<i64, StoreError> {
        insert_chat_message(&self.conn, session_id, analysis_id, role, content)
    }

    /// Persist one question and its answer together. Either both messages
    /// are stored or neither is. Returns the ids of the user and assistant
    /// messages.
    pub fn save_chat_turn(
        &self,
        session_id: Uuid,
        analysis_id: Option<i64>,
        question: &str,
        answer: &str,
    ) -> Result<(i64, i64), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let user = insert_chat_message(&tx, session_id, analysis_id, Role::User, question)?;
        let assistant =
            insert_chat_message(&tx, session_id, analysis_id, Role::Assistant, answer)?;
        tx.commit()?;
        debug!(%session_id, user, assistant, "Saved chat turn");
        Ok((user, assistant))
    }

    /// The last `limit` messages of a session, oldest first.
    pub fn chat_history(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChatRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, analysis_id, role, content, created_at
             FROM chat_history WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![session_id.to_string(), limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, session, analysis_id, role, content, created_at) = row?;
            records.push(ChatRecord {
                id,
                session_id: Uuid::parse_str(&session).map_err(|e| StoreError::Corrupt {
                    id,
                    message: format!("session id: {e}"),
                })?,
                analysis_id,
                role: role
                    .parse()
                    .map_err(|message| StoreError::Corrupt { id, message })?,
                content,
                created_at: parse_timestamp(id, &created_at)?,
            });
        }
        records.reverse();
        Ok(records)
    }
}

fn insert_chat_message(
    conn: &Connection,
    session_id: Uuid,
    analysis_id: Option<i64>,
    role: Role,
    content: &str,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO chat_history (session_id, analysis_id, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session_id.to_string(),
            analysis_id,
            role.to_string(),
            content,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
        id: 0,
        message: format!("serialize: {e}"),
    })
}

fn parse_timestamp(id: i64, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id,
            message: format!("timestamp: {e}"),
        })
}

fn analysis_from_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<StoredAnalysis, StoreError>> {
    let id: i64 = row.get(0)?;
    let applicant_json: String = row.get(1)?;
    let prediction: i64 = row.get(2)?;
    let feature_importance_json: Option<String> = row.get(3)?;
    let insights: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(
        parse_timestamp(id, &created_at).map(|created_at| StoredAnalysis {
            id,
            prediction,
            insights,
            created_at,
            applicant_json,
            feature_importance_json,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Applicant {
        name: String,
        cibil_score: u32,
    }

    fn applicant() -> Applicant {
        Applicant {
            name: "Asha".into(),
            cibil_score: 712,
        }
    }

    #[test]
    fn test_save_and_get_analysis() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let ranking = vec![("loan_grade".to_string(), 0.31), ("dti_ratio".to_string(), 0.12)];
        let id = store
            .save_analysis(&applicant(), 1, Some(&ranking), Some("Reduce your debt."))
            .unwrap();

        let stored = store.get_analysis(id).unwrap();
        assert_eq!(stored.prediction, 1);
        assert_eq!(stored.insights.as_deref(), Some("Reduce your debt."));
        assert_eq!(stored.applicant::<Applicant>().unwrap(), applicant());
        let back: Vec<(String, f64)> = stored.feature_importance().unwrap().unwrap();
        assert_eq!(back, ranking);
    }

    #[test]
    fn test_missing_analysis() {
        let store = AnalysisStore::open_in_memory().unwrap();
        assert!(matches!(
            store.get_analysis(99),
            Err(StoreError::AnalysisNotFound { id: 99 })
        ));
    }

    #[test]
    fn test_recent_analyses_newest_first() {
        let store = AnalysisStore::open_in_memory().unwrap();
        for prediction in [0, 1, 0] {
            store
                .save_analysis::<_, ()>(&applicant(), prediction, None, None)
                .unwrap();
        }
        let recent = store.recent_analyses(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].id > recent[1].id);
        assert!(recent[0].feature_importance::<Vec<(String, f64)>>().unwrap().is_none());
    }

    #[test]
    fn test_chat_history_is_chronological_and_scoped() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let session = Uuid::new_v4();
        let other = Uuid::new_v4();
        store
            .save_chat_message(session, None, Role::User, "How do I improve?")
            .unwrap();
        store
            .save_chat_message(session, None, Role::Assistant, "Lower your DTI.")
            .unwrap();
        store
            .save_chat_message(other, None, Role::User, "unrelated")
            .unwrap();
        store
            .save_chat_message(session, None, Role::User, "By how much?")
            .unwrap();

        let history = store.chat_history(session, 2).unwrap();
        let contents: Vec<_> = history.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["Lower your DTI.", "By how much?"]);
        assert_eq!(history[0].role, Role::Assistant);
    }

    #[test]
    fn test_chat_turn_saves_question_then_answer() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let id = store
            .save_analysis::<_, ()>(&applicant(), 1, None, None)
            .unwrap();
        let session = Uuid::new_v4();
        let (user, assistant) = store
            .save_chat_turn(session, Some(id), "What hurts most?", "Your DTI ratio.")
            .unwrap();
        assert!(assistant > user);

        let history = store.chat_history(session, 10).unwrap();
        let turn: Vec<_> = history
            .iter()
            .map(|r| (r.role, r.content.as_str()))
            .collect();
        assert_eq!(
            turn,
            vec![
                (Role::User, "What hurts most?"),
                (Role::Assistant, "Your DTI ratio.")
            ]
        );
    }

    #[test]
    fn test_failed_chat_turn_stores_nothing() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let session = Uuid::new_v4();
        assert!(matches!(
            store.save_chat_turn(session, Some(404), "Hello?", "Hi."),
            Err(StoreError::Query(_))
        ));
        assert!(store.chat_history(session, 10).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("finsage.db");
        let id = {
            let store = AnalysisStore::open(&path).unwrap();
            store
                .save_analysis::<_, ()>(&applicant(), 0, None, None)
                .unwrap()
        };
        let store = AnalysisStore::open(&path).unwrap();
        assert_eq!(store.get_analysis(id).unwrap().prediction, 0);
    }
}
