//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, params, OptionalExtension};
use crate::Result;
use super::schema;

/// SQLite-backed play-count table
pub struct SongStatsStore {
    conn: Connection,
}

impl SongStatsStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(schema::CREATE_SONG_PLAYS_TABLE, [])?;
        Ok(())
    }

    /// Create the lookup indexes
    pub fn create_indexes(&self) -> Result<()> {
        for stmt in schema::CREATE_INDEXES {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Song Operations ==========

    /// Insert a song row. Fails with a constraint error when the hash
    /// already exists; existing rows are never overwritten.
    pub fn insert_song(&self, song_hash: &str, song_name: &str, play_count: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO song_plays (song_hash, song_data, play_count) VALUES (?1, ?2, ?3)",
            params![song_hash, song_name, play_count],
        )?;
        Ok(())
    }

    /// Get a song row by hash
    pub fn get_song(&self, song_hash: &str) -> Result<Option<SongPlay>> {
        self.conn
            .query_row(
                "SELECT id, song_hash, song_data, play_count, last_played FROM song_plays WHERE song_hash = ?1",
                [song_hash],
                Self::row_to_song,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Most played songs first
    pub fn top_songs(&self, limit: usize) -> Result<Vec<SongPlay>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, song_hash, song_data, play_count, last_played FROM song_plays ORDER BY play_count DESC, id LIMIT ?1"
        )?;

        let songs = stmt
            .query_map([limit as i64], Self::row_to_song)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(songs)
    }

    /// Count all songs
    pub fn count_songs(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM song_plays", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Names of the indexes defined on song_plays
    pub fn index_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'song_plays' AND name LIKE 'idx_%' ORDER BY name"
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(names)
    }

    fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<SongPlay> {
        Ok(SongPlay {
            id: row.get(0)?,
            song_hash: row.get(1)?,
            name: row.get(2)?,
            play_count: row.get(3)?,
            last_played: row.get(4)?,
        })
    }

    // ========== Transactions ==========

    /// Begin a transaction
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let (songs, total_plays, max_plays): (i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(play_count), 0), COALESCE(MAX(play_count), 0) FROM song_plays",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(DbStats {
            songs: songs as usize,
            total_plays,
            max_plays,
        })
    }
}

/// A persisted play-count row
#[derive(Debug, Clone, PartialEq)]
pub struct SongPlay {
    pub id: i64,
    pub song_hash: String,
    pub name: String,
    pub play_count: i64,
    pub last_played: String,
}

#[derive(Debug, Clone)]
pub struct DbStats {
    pub songs: usize,
    pub total_plays: i64,
    pub max_plays: i64,
}
