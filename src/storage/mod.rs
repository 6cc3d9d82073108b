//! Storage Layer - SQLite-backed persistence
//!
//! One table:
//! - song_plays(id, song_hash UNIQUE, song_data, play_count, last_played)

pub mod schema;
pub mod sqlite;

pub use sqlite::{SongStatsStore, SongPlay, DbStats};
