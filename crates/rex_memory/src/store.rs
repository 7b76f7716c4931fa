//! SQLite-backed [`MemoryStore`]: the sole owner of every persisted record.
//!
//! All mutations are serialized by the pool; reads proceed concurrently.
//! Schema creation is `CREATE TABLE IF NOT EXISTS` plus best-effort
//! `ALTER TABLE ... ADD COLUMN` migrations that swallow "duplicate column"
//! errors, so upgrading in place never fails a fresh-enough database.

use rex_core::{
    clamp01, clamp_priority, Action, Conversation, Face, Goal, GoalStatus, Memory, MemoryCategory,
    Room, StorageError, Trick, ValidationError, MAX_TRICK_ACTIONS,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Result<T> = std::result::Result<T, StorageError>;

/// A persistent, content-addressed store for memories, tricks, goals,
/// faces, rooms and conversations.
pub struct MemoryStore {
    pool: SqlitePool,
    closed: Arc<AtomicBool>,
}

impl MemoryStore {
    pub async fn connect(db_path: &str) -> Result<Self> {
        let url = format!("sqlite://{db_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await?;
        let store = Self {
            pool,
            closed: Arc::new(AtomicBool::new(false)),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                subject TEXT NOT NULL,
                content TEXT NOT NULL,
                importance REAL NOT NULL,
                created_at INTEGER NOT NULL,
                last_accessed INTEGER NOT NULL,
                access_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
                subject, content, content='memories', content_rowid='id'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::debug!("fts5 virtual table creation skipped: {e}");
            e
        })
        .ok();

        for (name, ddl) in [
            (
                "memories_ai",
                "CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN \
                 INSERT INTO memories_fts(rowid, subject, content) VALUES (new.id, new.subject, new.content); END",
            ),
            (
                "memories_ad",
                "CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN \
                 INSERT INTO memories_fts(memories_fts, rowid, subject, content) VALUES('delete', old.id, old.subject, old.content); END",
            ),
            (
                "memories_au",
                "CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN \
                 INSERT INTO memories_fts(memories_fts, rowid, subject, content) VALUES('delete', old.id, old.subject, old.content); \
                 INSERT INTO memories_fts(rowid, subject, content) VALUES (new.id, new.subject, new.content); END",
            ),
        ] {
            if let Err(e) = sqlx::query(ddl).execute(&self.pool).await {
                tracing::debug!("trigger {name} creation skipped: {e}");
            }
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tricks (
                name TEXT PRIMARY KEY,
                trigger_phrase TEXT NOT NULL,
                actions TEXT NOT NULL,
                times_performed INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL,
                priority INTEGER NOT NULL,
                status TEXT NOT NULL,
                progress TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                completed_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS faces (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                encoding BLOB NOT NULL,
                image_hash TEXT NOT NULL DEFAULT '',
                times_seen INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                last_seen INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                name TEXT PRIMARY KEY,
                description TEXT NOT NULL DEFAULT '',
                landmarks TEXT NOT NULL DEFAULT '[]',
                image_hash TEXT NOT NULL DEFAULT '',
                times_visited INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                last_visited INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                summary TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::NotFound("store is closed".to_string()));
        }
        Ok(())
    }

    /// Idempotent: a second call is a no-op, not an error.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.pool.close().await;
        }
    }

    fn row_to_memory(row: &sqlx::sqlite::SqliteRow) -> Memory {
        let category_str: String = row.get("category");
        Memory {
            id: row.get("id"),
            category: MemoryCategory::parse_str(&category_str).unwrap_or(MemoryCategory::Fact),
            subject: row.get("subject"),
            content: row.get("content"),
            importance: row.get::<f64, _>("importance") as f32,
            created_at: row.get("created_at"),
            last_accessed: row.get("last_accessed"),
            access_count: row.get("access_count"),
        }
    }

    // ------------------------------------------------------------------
    // Memory CRUD
    // ------------------------------------------------------------------

    pub async fn remember(
        &self,
        category: MemoryCategory,
        subject: &str,
        content: &str,
        importance: f32,
    ) -> Result<i64> {
        self.check_open()?;
        let now = now_ts();
        let importance = clamp01(importance);
        let rec = sqlx::query(
            "INSERT INTO memories (category, subject, content, importance, created_at, last_accessed, access_count) \
             VALUES (?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(category.as_str())
        .bind(subject)
        .bind(content)
        .bind(importance as f64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(rec.last_insert_rowid())
    }

    /// Full-text ranked recall; atomically touches `last_accessed` and
    /// `access_count` for every returned row in one batched update.
    pub async fn recall(
        &self,
        query: &str,
        limit: i64,
        category: Option<MemoryCategory>,
    ) -> Result<Vec<Memory>> {
        self.check_open()?;
        let escaped = query.replace('"', "\"\"");
        let rows = match category {
            Some(cat) => {
                sqlx::query(
                    "SELECT m.* FROM memories m JOIN memories_fts f ON m.id = f.rowid \
                     WHERE memories_fts MATCH ? AND m.category = ? ORDER BY bm25(memories_fts) LIMIT ?",
                )
                .bind(format!("\"{escaped}\""))
                .bind(cat.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT m.* FROM memories m JOIN memories_fts f ON m.id = f.rowid \
                     WHERE memories_fts MATCH ? ORDER BY bm25(memories_fts) LIMIT ?",
                )
                .bind(format!("\"{escaped}\""))
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        };

        // FTS5 MATCH fails on malformed/empty queries; fall back to a plain
        // substring scan rather than surfacing a parse error upward.
        let rows = match rows {
            Ok(rows) => rows,
            Err(_) => {
                let like = format!("%{query}%");
                match category {
                    Some(cat) => {
                        sqlx::query(
                            "SELECT * FROM memories WHERE (subject LIKE ? OR content LIKE ?) AND category = ? \
                             ORDER BY importance DESC LIMIT ?",
                        )
                        .bind(&like)
                        .bind(&like)
                        .bind(cat.as_str())
                        .bind(limit)
                        .fetch_all(&self.pool)
                        .await?
                    }
                    None => {
                        sqlx::query(
                            "SELECT * FROM memories WHERE subject LIKE ? OR content LIKE ? \
                             ORDER BY importance DESC LIMIT ?",
                        )
                        .bind(&like)
                        .bind(&like)
                        .bind(limit)
                        .fetch_all(&self.pool)
                        .await?
                    }
                }
            }
        };

        let memories: Vec<Memory> = rows.iter().map(Self::row_to_memory).collect();
        let ids: Vec<i64> = memories.iter().map(|m| m.id).collect();
        if !ids.is_empty() {
            self.touch_access(&ids).await?;
        }
        Ok(memories)
    }

    async fn touch_access(&self, ids: &[i64]) -> Result<()> {
        let now = now_ts();
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(
                "UPDATE memories SET last_accessed = ?, access_count = access_count + 1 WHERE id = ?",
            )
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn by_subject(&self, subject: &str) -> Result<Vec<Memory>> {
        self.check_open()?;
        let rows = sqlx::query("SELECT * FROM memories WHERE subject = ? ORDER BY created_at DESC")
            .bind(subject)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::row_to_memory).collect())
    }

    pub async fn by_category(&self, category: MemoryCategory, limit: i64) -> Result<Vec<Memory>> {
        self.check_open()?;
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE category = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(category.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_memory).collect())
    }

    pub async fn important(&self, min_importance: f32, limit: i64) -> Result<Vec<Memory>> {
        self.check_open()?;
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE importance >= ? ORDER BY importance DESC LIMIT ?",
        )
        .bind(min_importance as f64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_memory).collect())
    }

    pub async fn update_importance(&self, id: i64, value: f32) -> Result<()> {
        self.check_open()?;
        let clamped = clamp01(value);
        sqlx::query("UPDATE memories SET importance = ? WHERE id = ?")
            .bind(clamped as f64)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_content(&self, id: i64, content: &str) -> Result<()> {
        self.check_open()?;
        sqlx::query("UPDATE memories SET content = ? WHERE id = ?")
            .bind(content)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.check_open()?;
        sqlx::query("DELETE FROM memories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn bulk_update_importance(&self, updates: &[(i64, f32)]) -> Result<()> {
        self.check_open()?;
        let mut tx = self.pool.begin().await?;
        for (id, value) in updates {
            sqlx::query("UPDATE memories SET importance = ? WHERE id = ?")
                .bind(clamp01(*value) as f64)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn bulk_delete(&self, ids: &[i64]) -> Result<()> {
        self.check_open()?;
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM memories WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn stale(&self, days_since_access: i64, max_importance: f32) -> Result<Vec<Memory>> {
        self.check_open()?;
        let cutoff = now_ts() - days_since_access * 86_400;
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE last_accessed < ? AND importance <= ? ORDER BY last_accessed ASC",
        )
        .bind(cutoff)
        .bind(max_importance as f64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_memory).collect())
    }

    pub async fn prune_candidates(&self, max_importance: f32, limit: i64) -> Result<Vec<Memory>> {
        self.check_open()?;
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE importance <= ? \
             ORDER BY importance ASC, access_count ASC, last_accessed ASC LIMIT ?",
        )
        .bind(max_importance as f64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_memory).collect())
    }

    pub async fn by_subject_grouped(&self) -> Result<HashMap<String, Vec<Memory>>> {
        self.check_open()?;
        let rows = sqlx::query("SELECT * FROM memories ORDER BY subject")
            .fetch_all(&self.pool)
            .await?;
        let mut grouped: HashMap<String, Vec<Memory>> = HashMap::new();
        for row in &rows {
            let m = Self::row_to_memory(row);
            grouped.entry(m.subject.clone()).or_default().push(m);
        }
        Ok(grouped)
    }

    pub async fn stats(&self) -> Result<HashMap<String, i64>> {
        self.check_open()?;
        let mut stats = HashMap::new();
        for table in ["memories", "tricks", "goals", "faces", "rooms", "conversations"] {
            let count: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                    .fetch_one(&self.pool)
                    .await?;
            stats.insert(table.to_string(), count);
        }
        Ok(stats)
    }

    // ------------------------------------------------------------------
    // Trick CRUD
    // ------------------------------------------------------------------

    pub async fn learn_trick(
        &self,
        name: &str,
        trigger_phrase: &str,
        actions: &[Action],
    ) -> Result<()> {
        self.check_open()?;
        if actions.len() > MAX_TRICK_ACTIONS {
            return Err(ValidationError::OutOfRange {
                field: "actions",
                min: 0.0,
                max: MAX_TRICK_ACTIONS as f32,
                value: actions.len() as f32,
            }
            .into());
        }
        let name = name.to_lowercase();
        let trigger_phrase = trigger_phrase.to_lowercase();
        let encoded = serde_json::to_string(actions).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            "INSERT INTO tricks (name, trigger_phrase, actions, times_performed, created_at) \
             VALUES (?, ?, ?, 0, ?) \
             ON CONFLICT(name) DO UPDATE SET trigger_phrase = excluded.trigger_phrase, actions = excluded.actions",
        )
        .bind(&name)
        .bind(&trigger_phrase)
        .bind(&encoded)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_trick(row: &sqlx::sqlite::SqliteRow) -> Trick {
        let encoded: String = row.get("actions");
        let actions: Vec<Action> = serde_json::from_str(&encoded).unwrap_or_default();
        Trick {
            name: row.get("name"),
            trigger_phrase: row.get("trigger_phrase"),
            actions,
            times_performed: row.get("times_performed"),
            created_at: row.get("created_at"),
        }
    }

    pub async fn get_trick(&self, name: &str) -> Result<Option<Trick>> {
        self.check_open()?;
        let row = sqlx::query("SELECT * FROM tricks WHERE name = ?")
            .bind(name.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::row_to_trick))
    }

    /// Returns the first trick whose trigger phrase is a substring of the
    /// (case-folded) input phrase.
    pub async fn find_trick_by_trigger(&self, phrase: &str) -> Result<Option<Trick>> {
        self.check_open()?;
        let folded = phrase.to_lowercase();
        let rows = sqlx::query("SELECT * FROM tricks").fetch_all(&self.pool).await?;
        for row in &rows {
            let trick = Self::row_to_trick(row);
            if folded.contains(&trick.trigger_phrase) {
                return Ok(Some(trick));
            }
        }
        Ok(None)
    }

    pub async fn list_tricks(&self) -> Result<Vec<Trick>> {
        self.check_open()?;
        let rows = sqlx::query("SELECT * FROM tricks ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::row_to_trick).collect())
    }

    pub async fn record_trick_performed(&self, name: &str) -> Result<()> {
        self.check_open()?;
        sqlx::query("UPDATE tricks SET times_performed = times_performed + 1 WHERE name = ?")
            .bind(name.to_lowercase())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Goal CRUD
    // ------------------------------------------------------------------

    fn row_to_goal(row: &sqlx::sqlite::SqliteRow) -> Goal {
        let status_str: String = row.get("status");
        let progress_str: String = row.get("progress");
        Goal {
            id: row.get("id"),
            description: row.get("description"),
            priority: row.get::<i64, _>("priority") as u8,
            status: GoalStatus::parse_str(&status_str).unwrap_or(GoalStatus::Active),
            progress: serde_json::from_str(&progress_str).unwrap_or(serde_json::Value::Null),
            created_at: row.get("created_at"),
            completed_at: row.get("completed_at"),
        }
    }

    pub async fn create_goal(&self, description: &str, priority: u8) -> Result<i64> {
        self.check_open()?;
        let priority = clamp_priority(priority);
        let rec = sqlx::query(
            "INSERT INTO goals (description, priority, status, progress, created_at) \
             VALUES (?, ?, 'active', '{}', ?)",
        )
        .bind(description)
        .bind(priority as i64)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;
        Ok(rec.last_insert_rowid())
    }

    pub async fn update_goal_progress(&self, id: i64, progress: serde_json::Value) -> Result<()> {
        self.check_open()?;
        sqlx::query("UPDATE goals SET progress = ? WHERE id = ?")
            .bind(progress.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_goal_status(&self, id: i64, status: GoalStatus) -> Result<()> {
        self.check_open()?;
        let completed_at = matches!(status, GoalStatus::Completed).then(now_ts);
        sqlx::query("UPDATE goals SET status = ?, completed_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(completed_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_active_goals(&self) -> Result<Vec<Goal>> {
        self.check_open()?;
        let rows = sqlx::query("SELECT * FROM goals WHERE status = 'active' ORDER BY priority DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::row_to_goal).collect())
    }

    pub async fn get_goal(&self, id: i64) -> Result<Option<Goal>> {
        self.check_open()?;
        let row = sqlx::query("SELECT * FROM goals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::row_to_goal))
    }

    // ------------------------------------------------------------------
    // Face / room / conversation CRUD
    // ------------------------------------------------------------------

    fn row_to_face(row: &sqlx::sqlite::SqliteRow) -> Face {
        let encoded: Vec<u8> = row.get("encoding");
        let encoding: Vec<f32> = bincode::deserialize(&encoded).unwrap_or_default();
        Face {
            id: row.get("id"),
            name: row.get("name"),
            encoding,
            image_hash: row.get("image_hash"),
            times_seen: row.get("times_seen"),
            created_at: row.get("created_at"),
            last_seen: row.get("last_seen"),
        }
    }

    pub async fn store_face(&self, name: &str, encoding: &[f32], image_hash: &str) -> Result<i64> {
        self.check_open()?;
        let blob = bincode::serialize(encoding).unwrap_or_default();
        let now = now_ts();
        let rec = sqlx::query(
            "INSERT INTO faces (name, encoding, image_hash, times_seen, created_at, last_seen) \
             VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(name)
        .bind(blob)
        .bind(image_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(rec.last_insert_rowid())
    }

    pub async fn get_faces_by_name(&self, name: &str) -> Result<Vec<Face>> {
        self.check_open()?;
        let rows = sqlx::query("SELECT * FROM faces WHERE name = ?")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::row_to_face).collect())
    }

    /// Groups faces by name, then clusters within each name by Euclidean
    /// distance on their encodings.
    pub async fn duplicate_faces(&self, distance_threshold: f32) -> Result<Vec<Vec<Face>>> {
        self.check_open()?;
        let rows = sqlx::query("SELECT * FROM faces ORDER BY name").fetch_all(&self.pool).await?;
        let faces: Vec<Face> = rows.iter().map(Self::row_to_face).collect();

        let mut by_name: HashMap<String, Vec<Face>> = HashMap::new();
        for f in faces {
            by_name.entry(f.name.clone()).or_default().push(f);
        }

        let mut clusters = Vec::new();
        for (_, group) in by_name {
            let mut remaining = group;
            while remaining.len() > 1 {
                let anchor = remaining.remove(0);
                let mut cluster = vec![anchor.clone()];
                remaining.retain(|candidate| {
                    if euclidean_distance(&anchor.encoding, &candidate.encoding) <= distance_threshold
                    {
                        cluster.push(candidate.clone());
                        false
                    } else {
                        true
                    }
                });
                if cluster.len() > 1 {
                    clusters.push(cluster);
                }
            }
        }
        Ok(clusters)
    }

    pub async fn merge_face_entries(&self, keep_id: i64, delete_ids: &[i64]) -> Result<()> {
        self.check_open()?;
        let mut tx = self.pool.begin().await?;
        let mut total_seen: i64 = sqlx::query_scalar("SELECT times_seen FROM faces WHERE id = ?")
            .bind(keep_id)
            .fetch_one(&mut *tx)
            .await?;
        for id in delete_ids {
            let seen: Option<i64> = sqlx::query_scalar("SELECT times_seen FROM faces WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            total_seen += seen.unwrap_or(0);
            sqlx::query("DELETE FROM faces WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("UPDATE faces SET times_seen = ? WHERE id = ?")
            .bind(total_seen)
            .bind(keep_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    fn row_to_room(row: &sqlx::sqlite::SqliteRow) -> Room {
        let landmarks_str: String = row.get("landmarks");
        Room {
            name: row.get("name"),
            description: row.get("description"),
            landmarks: serde_json::from_str(&landmarks_str).unwrap_or_default(),
            image_hash: row.get("image_hash"),
            times_visited: row.get("times_visited"),
            created_at: row.get("created_at"),
            last_visited: row.get("last_visited"),
        }
    }

    pub async fn store_room(&self, name: &str, description: &str, landmarks: &[String]) -> Result<()> {
        self.check_open()?;
        let name = name.to_lowercase();
        let now = now_ts();
        let landmarks_json = serde_json::to_string(landmarks).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            "INSERT INTO rooms (name, description, landmarks, times_visited, created_at, last_visited) \
             VALUES (?, ?, ?, 1, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET times_visited = times_visited + 1, last_visited = excluded.last_visited",
        )
        .bind(&name)
        .bind(description)
        .bind(&landmarks_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_room(&self, name: &str) -> Result<Option<Room>> {
        self.check_open()?;
        let row = sqlx::query("SELECT * FROM rooms WHERE name = ?")
            .bind(name.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::row_to_room))
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.check_open()?;
        let rows = sqlx::query("SELECT * FROM rooms ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::row_to_room).collect())
    }

    pub async fn record_conversation(&self, summary: &str) -> Result<i64> {
        self.check_open()?;
        let rec = sqlx::query("INSERT INTO conversations (summary, created_at) VALUES (?, ?)")
            .bind(summary)
            .bind(now_ts())
            .execute(&self.pool)
            .await?;
        Ok(rec.last_insert_rowid())
    }

    pub async fn recent_conversations(&self, limit: i64) -> Result<Vec<Conversation>> {
        self.check_open()?;
        let rows = sqlx::query("SELECT * FROM conversations ORDER BY created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| Conversation {
                id: row.get("id"),
                summary: row.get("summary"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
