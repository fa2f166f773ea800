use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

mod schema;

/// Timestamp layout used for every stored date; sorts lexicographically.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRecord {
    pub id: i64,
    pub user_id: String,
    pub reminder: String,
    pub reminder_at: String,
    pub reminder_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommandRecord {
    pub command: String,
    pub response: String,
    pub created_by_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRecord {
    pub message: String,
    pub author_id: String,
    pub message_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuote {
    pub author_id: String,
    pub nominee_id: String,
    pub message_id: String,
    pub message: String,
    pub message_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRecord {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendlyFireRecord {
    pub killer_id: String,
    pub victim_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FriendlyFireStats {
    /// `(killer_id, kills)`, most kills first.
    pub top_killers: Vec<(String, i64)>,
    pub latest: Option<FriendlyFireRecord>,
    /// `(killer_id, victim_id, kills)`.
    pub top_pair: Option<(String, String, i64)>,
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(database_url: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(database_url)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.conn()?;
        conn.execute_batch(schema::SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Run `f` against this handle on the blocking pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| anyhow!("Database task failed: {}", e))?
    }

    /// Whether both handles share one connection.
    pub fn same_as(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    // --- Reminders ---

    pub fn create_reminder(
        &self,
        user_id: &str,
        reminder: &str,
        reminder_at: &str,
        reminder_url: &str,
    ) -> anyhow::Result<i64> {
        debug!("Database: Creating reminder for user {} at {}", user_id, reminder_at);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO reminders (user_id, reminder, reminder_at, reminder_url)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, reminder, reminder_at, reminder_url],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Reminders for a user, soonest first.
    pub fn list_reminders_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ReminderRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, reminder, reminder_at, reminder_url FROM reminders
             WHERE user_id = ?1 ORDER BY reminder_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([user_id], map_reminder)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_due_reminders(&self, now: &str) -> anyhow::Result<Vec<ReminderRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, reminder, reminder_at, reminder_url FROM reminders
             WHERE reminder_at <= ?1 ORDER BY reminder_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([now], map_reminder)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_reminder(&self, id: i64) -> anyhow::Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM reminders WHERE id = ?1", [id])?)
    }

    pub fn delete_reminders(&self, ids: &[i64]) -> anyhow::Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for id in ids {
            deleted += tx.execute("DELETE FROM reminders WHERE id = ?1", [id])?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    // --- Simple commands ---

    /// Returns `false` when the name is already taken.
    pub fn create_simple_command(
        &self,
        command: &str,
        response: &str,
        created_by_id: &str,
    ) -> anyhow::Result<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO simplecommands (command, response, created_by_id)
             VALUES (?1, ?2, ?3)",
            params![command, response, created_by_id],
        )?;
        Ok(inserted > 0)
    }

    pub fn get_simple_command(&self, command: &str) -> anyhow::Result<Option<SimpleCommandRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT command, response, created_by_id, created_at FROM simplecommands
                 WHERE command = ?1 LIMIT 1",
                [command],
                |row| {
                    Ok(SimpleCommandRecord {
                        command: row.get(0)?,
                        response: row.get(1)?,
                        created_by_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_simple_commands(&self) -> anyhow::Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT command FROM simplecommands ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_simple_command(&self, command: &str) -> anyhow::Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM simplecommands WHERE command = ?1", [command])?)
    }

    // --- Quotes ---

    pub fn random_quote(&self) -> anyhow::Result<Option<QuoteRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT message, author_id, message_url, created_at FROM quotes
                 WHERE accepted = 1 ORDER BY random() LIMIT 1",
                [],
                |row| {
                    Ok(QuoteRecord {
                        message: row.get(0)?,
                        author_id: row.get(1)?,
                        message_url: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn quote_exists(&self, message_id: &str) -> anyhow::Result<bool> {
        let conn = self.conn()?;
        let exists = conn
            .prepare("SELECT 1 FROM quotes WHERE message_id = ?1")?
            .exists([message_id])?;
        Ok(exists)
    }

    pub fn create_quote(&self, quote: &NewQuote) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO quotes (author_id, nominee_id, message_id, message, message_url)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                quote.author_id,
                quote.nominee_id,
                quote.message_id,
                quote.message,
                quote.message_url
            ],
        )?;
        Ok(())
    }

    /// Accept a pending nomination. Returns `false` if none was pending.
    pub fn accept_quote(&self, message_id: &str) -> anyhow::Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE quotes SET accepted = 1, updated_at = CURRENT_TIMESTAMP
             WHERE message_id = ?1 AND accepted = 0",
            [message_id],
        )?;
        Ok(updated > 0)
    }

    /// Author of a pending nomination.
    pub fn pending_quote_author(&self, message_id: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn()?;
        let author = conn
            .query_row(
                "SELECT author_id FROM quotes WHERE message_id = ?1 AND accepted = 0 LIMIT 1",
                [message_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(author)
    }

    pub fn delete_pending_quotes(&self) -> anyhow::Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM quotes WHERE accepted = 0", [])?)
    }

    // --- Friendly fire ---

    pub fn record_friendly_fire(&self, killer_id: &str, victim_id: &str) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO friendlyfire (killer_id, victim_id) VALUES (?1, ?2)",
            params![killer_id, victim_id],
        )?;
        Ok(())
    }

    pub fn friendly_fire_stats(&self, top: usize) -> anyhow::Result<FriendlyFireStats> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT killer_id, COUNT(*) AS kills FROM friendlyfire
             GROUP BY killer_id ORDER BY kills DESC, MAX(id) DESC LIMIT ?1",
        )?;
        let top_killers = stmt
            .query_map([top as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let latest = conn
            .query_row(
                "SELECT killer_id, victim_id, created_at FROM friendlyfire
                 ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(FriendlyFireRecord {
                        killer_id: row.get(0)?,
                        victim_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;

        let top_pair = conn
            .query_row(
                "SELECT killer_id, victim_id, COUNT(*) AS kills FROM friendlyfire
                 GROUP BY killer_id, victim_id ORDER BY kills DESC, MAX(id) DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        Ok(FriendlyFireStats {
            top_killers,
            latest,
            top_pair,
        })
    }

    // --- Counters ---

    pub fn get_counter(&self, key: &str) -> anyhow::Result<Option<i64>> {
        let conn = self.conn()?;
        let count = conn
            .query_row("SELECT count FROM counter WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(count)
    }

    pub fn set_counter(&self, key: &str, count: i64) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO counter (key, count) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET count = ?2, updated_at = CURRENT_TIMESTAMP",
            params![key, count],
        )?;
        Ok(())
    }

    pub fn delete_counter(&self, key: &str) -> anyhow::Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM counter WHERE key = ?1", [key])?)
    }

    pub fn list_counters(&self) -> anyhow::Result<Vec<CounterRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, count FROM counter ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(CounterRecord {
                key: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // --- Assistant continuations ---

    pub fn get_previous_response_id(&self, entity_id: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT previous_response_id FROM chatgpt WHERE entity_id = ?1",
                [entity_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn set_previous_response_id(&self, entity_id: &str, response_id: &str) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chatgpt (entity_id, previous_response_id) VALUES (?1, ?2)
             ON CONFLICT(entity_id) DO UPDATE SET previous_response_id = ?2,
                 updated_at = CURRENT_TIMESTAMP",
            params![entity_id, response_id],
        )?;
        Ok(())
    }
}

fn map_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReminderRecord> {
    Ok(ReminderRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        reminder: row.get(2)?,
        reminder_at: row.get(3)?,
        reminder_url: row.get(4)?,
    })
}
