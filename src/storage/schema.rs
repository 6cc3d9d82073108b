//! Database schema definitions

/// SQL to create the song_plays table
pub const CREATE_SONG_PLAYS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS song_plays (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    song_hash TEXT UNIQUE,
    song_data TEXT,
    play_count INTEGER DEFAULT 0,
    last_played TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

/// SQL to create indexes. Built after the bulk insert.
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_count ON song_plays(play_count)",
    "CREATE INDEX IF NOT EXISTS idx_hash ON song_plays(song_hash)",
    "CREATE INDEX IF NOT EXISTS idx_last_played ON song_plays(last_played)",
];
