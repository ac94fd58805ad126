//! SQLite database interface for attempts, assessments and insights

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    AssessmentRecord, Attempt, Diagnostic, Insight, Passage, Recommendations, Student,
};

/// A previous attempt with whatever was stored about it
#[derive(Debug, Clone)]
pub struct AttemptHistoryEntry {
    pub attempt: Attempt,
    pub passage_title: Option<String>,
    pub assessment: Option<AssessmentRecord>,
}

/// Thread-safe SQLite store
pub struct AssessmentStore {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl AssessmentStore {
    /// Schema version for migrations
    pub const SCHEMA_VERSION: i32 = 2;

    /// Open (or create) the store at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = fluency_paths::expand_home(db_path)?;

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path).context("Failed to open assessment database")?;

        Self::from_connection(db_path, conn)
    }

    /// In-memory store, gone when dropped
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(PathBuf::from(":memory:"), conn)
    }

    fn from_connection(db_path: PathBuf, conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;

        let store = Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("assessment database lock poisoned"))
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS passages (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS students (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                age INTEGER,
                observations TEXT,
                professional_id TEXT
            );

            CREATE TABLE IF NOT EXISTS attempts (
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                passage_id TEXT NOT NULL,
                duration_s REAL,
                transcript TEXT,
                created_by TEXT,
                recorded_at REAL NOT NULL,
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
                FOREIGN KEY (passage_id) REFERENCES passages(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS assessments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                attempt_id TEXT NOT NULL UNIQUE,
                total_words INTEGER NOT NULL CHECK (total_words >= 0),
                correct_words INTEGER NOT NULL CHECK (correct_words >= 0),
                wpm REAL CHECK (wpm IS NULL OR wpm >= 0),
                accuracy_score REAL CHECK (accuracy_score IS NULL OR accuracy_score BETWEEN 0 AND 100),
                fluency_score REAL CHECK (fluency_score IS NULL OR fluency_score BETWEEN 0 AND 100),
                prosody_score REAL CHECK (prosody_score IS NULL OR prosody_score BETWEEN 0 AND 100),
                overall_score REAL CHECK (overall_score IS NULL OR overall_score BETWEEN 0 AND 100),
                errors TEXT NOT NULL DEFAULT '[]',
                improvement_points TEXT NOT NULL DEFAULT '[]',
                summary TEXT,
                recommendations TEXT NOT NULL DEFAULT '{}',
                processed_at REAL NOT NULL,
                FOREIGN KEY (attempt_id) REFERENCES attempts(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS diagnostics (
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                overall_score REAL,
                reading_level TEXT,
                strengths TEXT NOT NULL DEFAULT '[]',
                difficulties TEXT NOT NULL DEFAULT '[]',
                recommendations TEXT,
                created_at REAL NOT NULL,
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS insights (
                id TEXT PRIMARY KEY,
                owner_id TEXT,
                category TEXT NOT NULL,
                priority TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                related_students TEXT NOT NULL DEFAULT '[]',
                source TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at REAL NOT NULL,
                expires_at REAL
            );

            CREATE INDEX IF NOT EXISTS idx_attempts_student_recorded
                ON attempts(student_id, recorded_at);
            CREATE INDEX IF NOT EXISTS idx_diagnostics_student_created
                ON diagnostics(student_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_insights_created_at
                ON insights(created_at);",
        )?;

        conn.pragma_update(None, "user_version", Self::SCHEMA_VERSION)?;

        Ok(())
    }

    /// Insert or replace a passage
    pub fn insert_passage(&self, passage: &Passage) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO passages (id, title, content) VALUES (?1, ?2, ?3)",
            params![passage.id.to_string(), passage.title, passage.content],
        )?;
        Ok(())
    }

    pub fn get_passage(&self, passage_id: Uuid) -> Result<Option<Passage>> {
        let conn = self.lock()?;
        let passage = conn
            .query_row(
                "SELECT id, title, content FROM passages WHERE id = ?1",
                params![passage_id.to_string()],
                |row| {
                    Ok(Passage {
                        id: uuid_column(row, "id")?,
                        title: row.get("title")?,
                        content: row.get("content")?,
                    })
                },
            )
            .optional()?;
        Ok(passage)
    }

    /// Insert or replace a student profile
    pub fn insert_student(&self, student: &Student) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO students (id, name, age, observations, professional_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                student.id.to_string(),
                student.name,
                student.age,
                student.observations,
                student.professional_id.map(|id| id.to_string()),
            ],
        )?;
        Ok(())
    }

    pub fn get_student(&self, student_id: Uuid) -> Result<Option<Student>> {
        let conn = self.lock()?;
        let student = conn
            .query_row(
                "SELECT * FROM students WHERE id = ?1",
                params![student_id.to_string()],
                |row| {
                    Ok(Student {
                        id: uuid_column(row, "id")?,
                        name: row.get("name")?,
                        age: row.get("age")?,
                        observations: row.get("observations")?,
                        professional_id: optional_uuid_column(row, "professional_id")?,
                    })
                },
            )
            .optional()?;
        Ok(student)
    }

    /// Insert new attempt record
    pub fn insert_attempt(&self, attempt: &Attempt) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO attempts (
                id, student_id, passage_id, duration_s, transcript, created_by, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                attempt.id.to_string(),
                attempt.student_id.to_string(),
                attempt.passage_id.to_string(),
                attempt.duration_seconds,
                attempt.transcript,
                attempt.created_by.map(|id| id.to_string()),
                to_timestamp(&attempt.recorded_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<Attempt>> {
        let conn = self.lock()?;
        let attempt = conn
            .query_row(
                "SELECT * FROM attempts WHERE id = ?1",
                params![attempt_id.to_string()],
                row_to_attempt,
            )
            .optional()?;
        Ok(attempt)
    }

    /// Replace an attempt's transcript. Returns false if the attempt is unknown.
    pub fn update_transcript(&self, attempt_id: Uuid, transcript: Option<&str>) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE attempts SET transcript = ?1 WHERE id = ?2",
            params![transcript, attempt_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Most recent transcribed attempts of a student, newest first
    pub fn recent_attempts(
        &self,
        student_id: Uuid,
        limit: usize,
        exclude: Option<Uuid>,
    ) -> Result<Vec<AttemptHistoryEntry>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT a.*, p.title AS passage_title
             FROM attempts a
             LEFT JOIN passages p ON p.id = a.passage_id
             WHERE a.student_id = ?1
               AND a.transcript IS NOT NULL
               AND a.id != ?2
             ORDER BY a.recorded_at DESC
             LIMIT ?3",
        )?;

        let excluded = exclude.map(|id| id.to_string()).unwrap_or_default();
        let rows = stmt
            .query_map(
                params![student_id.to_string(), excluded, limit as i64],
                |row| Ok((row_to_attempt(row)?, row.get::<_, Option<String>>("passage_title")?)),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (attempt, passage_title) in rows {
            let assessment = Self::query_assessment(&conn, attempt.id)?;
            entries.push(AttemptHistoryEntry {
                attempt,
                passage_title,
                assessment,
            });
        }

        Ok(entries)
    }

    /// Insert or replace a diagnostic
    pub fn insert_diagnostic(&self, diagnostic: &Diagnostic) -> Result<()> {
        let strengths = serde_json::to_string(&diagnostic.strengths)?;
        let difficulties = serde_json::to_string(&diagnostic.difficulties)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO diagnostics (
                id, student_id, kind, overall_score, reading_level,
                strengths, difficulties, recommendations, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                diagnostic.id.to_string(),
                diagnostic.student_id.to_string(),
                diagnostic.kind.as_str(),
                diagnostic.overall_score,
                diagnostic.reading_level,
                strengths,
                difficulties,
                diagnostic.recommendations,
                to_timestamp(&diagnostic.created_at),
            ],
        )?;
        Ok(())
    }

    /// Latest diagnostics of a student, newest first
    pub fn recent_diagnostics(&self, student_id: Uuid, limit: usize) -> Result<Vec<Diagnostic>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM diagnostics
             WHERE student_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![student_id.to_string(), limit as i64], |row| {
                Ok((
                    uuid_column(row, "id")?,
                    uuid_column(row, "student_id")?,
                    row.get::<_, String>("kind")?,
                    row.get::<_, Option<f64>>("overall_score")?,
                    row.get::<_, Option<String>>("reading_level")?,
                    row.get::<_, String>("strengths")?,
                    row.get::<_, String>("difficulties")?,
                    row.get::<_, Option<String>>("recommendations")?,
                    from_timestamp(row.get("created_at")?)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut diagnostics = Vec::with_capacity(rows.len());
        for (
            id,
            student_id,
            kind,
            overall_score,
            reading_level,
            strengths,
            difficulties,
            recommendations,
            created_at,
        ) in rows
        {
            diagnostics.push(Diagnostic {
                id,
                student_id,
                kind: kind.parse()?,
                overall_score,
                reading_level,
                strengths: serde_json::from_str(&strengths).context("Malformed strengths column")?,
                difficulties: serde_json::from_str(&difficulties)
                    .context("Malformed difficulties column")?,
                recommendations,
                created_at,
            });
        }

        Ok(diagnostics)
    }

    /// Create or fully overwrite the assessment of an attempt.
    ///
    /// Every metric column is replaced in one statement; there is never more
    /// than one row per attempt.
    pub fn upsert_assessment(&self, record: &AssessmentRecord) -> Result<()> {
        let errors = serde_json::to_string(&record.errors)?;
        let improvement_points = serde_json::to_string(&record.improvement_points)?;
        let recommendations = serde_json::to_string(&record.recommendations)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO assessments (
                attempt_id, total_words, correct_words, wpm, accuracy_score,
                fluency_score, prosody_score, overall_score, errors,
                improvement_points, summary, recommendations, processed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(attempt_id) DO UPDATE SET
                total_words = excluded.total_words,
                correct_words = excluded.correct_words,
                wpm = excluded.wpm,
                accuracy_score = excluded.accuracy_score,
                fluency_score = excluded.fluency_score,
                prosody_score = excluded.prosody_score,
                overall_score = excluded.overall_score,
                errors = excluded.errors,
                improvement_points = excluded.improvement_points,
                summary = excluded.summary,
                recommendations = excluded.recommendations,
                processed_at = excluded.processed_at",
            params![
                record.attempt_id.to_string(),
                record.total_words,
                record.correct_words,
                record.words_per_minute,
                record.accuracy_score,
                record.fluency_score,
                record.prosody_score,
                record.overall_score,
                errors,
                improvement_points,
                record.summary,
                recommendations,
                to_timestamp(&record.processed_at),
            ],
        )?;

        debug!(attempt_id = %record.attempt_id, "Assessment stored");
        Ok(())
    }

    pub fn get_assessment(&self, attempt_id: Uuid) -> Result<Option<AssessmentRecord>> {
        let conn = self.lock()?;
        Self::query_assessment(&conn, attempt_id)
    }

    /// Number of assessment rows stored for one attempt (0 or 1)
    pub fn count_assessments(&self, attempt_id: Uuid) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM assessments WHERE attempt_id = ?1",
            params![attempt_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query_assessment(conn: &Connection, attempt_id: Uuid) -> Result<Option<AssessmentRecord>> {
        let row = conn
            .query_row(
                "SELECT * FROM assessments WHERE attempt_id = ?1",
                params![attempt_id.to_string()],
                |row| {
                    Ok((
                        uuid_column(row, "attempt_id")?,
                        row.get::<_, i64>("total_words")?,
                        row.get::<_, i64>("correct_words")?,
                        row.get::<_, Option<f64>>("wpm")?,
                        row.get::<_, Option<f64>>("accuracy_score")?,
                        row.get::<_, Option<f64>>("fluency_score")?,
                        row.get::<_, Option<f64>>("prosody_score")?,
                        row.get::<_, Option<f64>>("overall_score")?,
                        row.get::<_, String>("errors")?,
                        row.get::<_, String>("improvement_points")?,
                        row.get::<_, Option<String>>("summary")?,
                        row.get::<_, String>("recommendations")?,
                        row.get::<_, f64>("processed_at")?,
                    ))
                },
            )
            .optional()?;

        let Some((
            attempt_id,
            total_words,
            correct_words,
            words_per_minute,
            accuracy_score,
            fluency_score,
            prosody_score,
            overall_score,
            errors,
            improvement_points,
            summary,
            recommendations,
            processed_at,
        )) = row
        else {
            return Ok(None);
        };

        let recommendations: Recommendations = serde_json::from_str(&recommendations)
            .context("Malformed recommendations column")?;

        Ok(Some(AssessmentRecord {
            attempt_id,
            total_words,
            correct_words,
            words_per_minute,
            accuracy_score,
            fluency_score,
            prosody_score,
            overall_score,
            errors: serde_json::from_str(&errors).context("Malformed errors column")?,
            improvement_points: serde_json::from_str(&improvement_points)
                .context("Malformed improvement_points column")?,
            summary,
            recommendations,
            processed_at: from_timestamp(processed_at)?,
        }))
    }

    /// Insert a new insight (insights accumulate, they are never upserted)
    pub fn insert_insight(&self, insight: &Insight) -> Result<()> {
        let related: Vec<String> = insight
            .related_students
            .iter()
            .map(Uuid::to_string)
            .collect();
        let related = serde_json::to_string(&related)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO insights (
                id, owner_id, category, priority, title, description,
                related_students, source, is_read, created_at, expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                insight.id.to_string(),
                insight.owner_id.map(|id| id.to_string()),
                insight.category.as_str(),
                insight.priority.as_str(),
                insight.title,
                insight.description,
                related,
                insight.source.as_str(),
                insight.is_read,
                to_timestamp(&insight.created_at),
                insight.expires_at.as_ref().map(to_timestamp),
            ],
        )?;

        debug!(insight_id = %insight.id, category = %insight.category, "Insight stored");
        Ok(())
    }

    pub fn get_insight(&self, insight_id: Uuid) -> Result<Option<Insight>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT * FROM insights WHERE id = ?1",
                params![insight_id.to_string()],
                InsightRow::from_row,
            )
            .optional()?;
        row.map(InsightRow::into_insight).transpose()
    }

    /// Insights mentioning a student, newest first
    pub fn insights_for_student(&self, student_id: Uuid) -> Result<Vec<Insight>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM insights
             WHERE EXISTS (
                 SELECT 1 FROM json_each(insights.related_students) WHERE value = ?1
             )
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt
            .query_map(params![student_id.to_string()], InsightRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(InsightRow::into_insight).collect()
    }

    /// Flag an insight as read. Returns false if it does not exist.
    pub fn mark_insight_read(&self, insight_id: Uuid) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE insights SET is_read = 1 WHERE id = ?1",
            params![insight_id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

/// Raw insight columns, decoded outside the rusqlite callback
struct InsightRow {
    id: Uuid,
    owner_id: Option<Uuid>,
    category: String,
    priority: String,
    title: String,
    description: String,
    related_students: String,
    source: String,
    is_read: bool,
    created_at: f64,
    expires_at: Option<f64>,
}

impl InsightRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_column(row, "id")?,
            owner_id: optional_uuid_column(row, "owner_id")?,
            category: row.get("category")?,
            priority: row.get("priority")?,
            title: row.get("title")?,
            description: row.get("description")?,
            related_students: row.get("related_students")?,
            source: row.get("source")?,
            is_read: row.get("is_read")?,
            created_at: row.get("created_at")?,
            expires_at: row.get("expires_at")?,
        })
    }

    fn into_insight(self) -> Result<Insight> {
        let related: Vec<String> = serde_json::from_str(&self.related_students)
            .context("Malformed related_students column")?;
        let related_students = related
            .iter()
            .map(|id| Uuid::parse_str(id))
            .collect::<Result<Vec<_>, _>>()
            .context("Malformed student id in related_students")?;

        Ok(Insight {
            id: self.id,
            owner_id: self.owner_id,
            category: self.category.parse()?,
            priority: self.priority.parse()?,
            title: self.title,
            description: self.description,
            related_students,
            source: self.source.parse()?,
            is_read: self.is_read,
            created_at: from_timestamp(self.created_at)?,
            expires_at: self.expires_at.map(from_timestamp).transpose()?,
        })
    }
}

fn row_to_attempt(row: &Row) -> rusqlite::Result<Attempt> {
    Ok(Attempt {
        id: uuid_column(row, "id")?,
        student_id: uuid_column(row, "student_id")?,
        passage_id: uuid_column(row, "passage_id")?,
        duration_seconds: row.get("duration_s")?,
        transcript: row.get("transcript")?,
        created_by: optional_uuid_column(row, "created_by")?,
        recorded_at: from_timestamp(row.get("recorded_at")?)?,
    })
}

fn uuid_column(row: &Row, name: &str) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(name)?;
    parse_uuid_column(name, &raw)
}

fn optional_uuid_column(row: &Row, name: &str) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(name)?;
    raw.map(|value| parse_uuid_column(name, &value)).transpose()
}

fn parse_uuid_column(name: &str, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("column {}: {}", name, e).into(),
        )
    })
}

/// Seconds since the epoch with millisecond precision
fn to_timestamp(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp_millis() as f64 / 1000.0
}

fn from_timestamp(t: f64) -> rusqlite::Result<DateTime<Utc>> {
    Some(t * 1000.0)
        .filter(|millis| millis.is_finite() && millis.abs() < i64::MAX as f64)
        .and_then(|millis| DateTime::from_timestamp_millis(millis.round() as i64))
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Real,
                format!("timestamp out of range: {}", t).into(),
            )
        })
}
