//! One-shot migration of legacy play counts into SQLite.

pub mod legacy;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::MigrateConfig;
use crate::storage::SongStatsStore;
use crate::Result;

pub use legacy::{load_legacy_counts, read_legacy_counts, LegacyError};

/// Rows between progress log lines
const PROGRESS_EVERY: usize = 100;

/// Truncated MD5 of the display name used as the row key.
pub fn song_hash(song_name: &str) -> String {
    let digest = format!("{:x}", md5::compute(song_name.as_bytes()));
    digest[..16].to_string()
}

/// Path the source file is renamed to after a successful run
pub fn backup_path_for(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

/// Outcome of a migration run
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Songs found in the legacy file
    pub found: usize,
    pub migrated: usize,
    /// Rows rejected by the database, usually duplicate hashes
    pub skipped: usize,
    pub database: Option<PathBuf>,
    pub backup: Option<PathBuf>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.found == 0
    }
}

pub struct Migrator {
    source: PathBuf,
    database: PathBuf,
    backup: bool,
}

impl Migrator {
    pub fn new(source: impl Into<PathBuf>, database: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            database: database.into(),
            backup: true,
        }
    }

    pub fn from_config(config: &MigrateConfig) -> Self {
        Self::new(&config.source, &config.database).with_backup(config.backup)
    }

    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn database(&self) -> &Path {
        &self.database
    }

    /// Run the migration. An unreadable source is not an error: the report
    /// comes back empty and the database is left untouched.
    pub fn run(&self) -> Result<MigrationReport> {
        let counts = load_legacy_counts(&self.source);
        if counts.is_empty() {
            tracing::info!("No song data found to migrate");
            return Ok(MigrationReport::default());
        }
        tracing::info!("Found {} songs to migrate", counts.len());

        let mut store = SongStatsStore::open(&self.database)?;
        let mut report = insert_counts(&mut store, &counts)?;

        tracing::info!("Creating indexes");
        store.create_indexes()?;
        drop(store);
        report.database = Some(self.database.clone());

        if self.backup && self.source.exists() {
            let backup = backup_path_for(&self.source);
            std::fs::rename(&self.source, &backup)?;
            tracing::info!("Backed up {} to {}", self.source.display(), backup.display());
            report.backup = Some(backup);
        }

        tracing::info!(
            "Migration completed: {} migrated, {} skipped",
            report.migrated,
            report.skipped
        );
        Ok(report)
    }
}

/// Insert every entry in one transaction, skipping rows the database rejects.
pub fn insert_counts(store: &mut SongStatsStore, counts: &BTreeMap<String, i64>) -> Result<MigrationReport> {
    let mut report = MigrationReport {
        found: counts.len(),
        ..Default::default()
    };

    store.begin_transaction()?;
    for (song, count) in counts {
        match store.insert_song(&song_hash(song), song, *count) {
            Ok(()) => {
                report.migrated += 1;
                if report.migrated % PROGRESS_EVERY == 0 {
                    tracing::info!("Migrated {} songs...", report.migrated);
                }
            }
            Err(e) => {
                let preview: String = song.chars().take(50).collect();
                tracing::warn!("Error migrating song '{}...': {}", preview, e);
                report.skipped += 1;
            }
        }
    }
    store.commit()?;
    Ok(report)
}
