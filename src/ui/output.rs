use crate::migrate::MigrationReport;
use crate::storage::{DbStats, SongPlay};
use crate::ui::{palette, Icons};
use owo_colors::OwoColorize;

/// Longest song name shown in the top songs list
const NAME_WIDTH: usize = 48;

pub fn header(icon: &str, text: &str) {
    println!("{} {}", icon, text.style(palette().heading()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(palette().ok()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(palette().fail()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(palette().caution()));
}

pub fn info(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(palette().muted()), value);
}

/// Like [`info`], for SSIDs and URLs
pub fn network(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(palette().muted()), value.style(palette().network()));
}

pub fn hint(text: &str) {
    println!("   {}", text.style(palette().muted()));
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(palette().heading()));
}

pub fn summary_row(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", label.style(palette().muted()), value.style(palette().figure()));
}

pub fn migration_summary(report: &MigrationReport) {
    section("Migration");
    summary_row("Found:   ", report.found);
    summary_row("Migrated:", report.migrated);
    summary_row("Skipped: ", report.skipped);
}

pub fn db_summary(stats: &DbStats) {
    section("Database");
    summary_row("Songs:      ", stats.songs);
    summary_row("Total plays:", stats.total_plays);
    summary_row("Most plays: ", stats.max_plays);
}

pub fn top_songs(songs: &[SongPlay]) {
    if songs.is_empty() {
        return;
    }
    section("Top songs");
    for (rank, song) in songs.iter().enumerate() {
        println!(
            "  {:>2}. {:>6}  {}",
            rank + 1,
            song.play_count.style(palette().figure()),
            truncate_name(&song.name, NAME_WIDTH)
        );
    }
}

fn truncate_name(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let kept: String = name.chars().take(width.saturating_sub(1)).collect();
    format!("{}…", kept)
}
