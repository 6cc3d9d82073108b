pub mod icons;
pub mod output;
pub mod progress;
pub mod theme;

pub use icons::Icons;
pub use output::{
    db_summary, error, header, hint, info, migration_summary, network, section, success,
    summary_row, top_songs, warn,
};
pub use progress::Spinner;
pub use theme::{palette, Palette};
