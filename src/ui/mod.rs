pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    dim, error, header, info, path, reconcile_report, section, source_added, source_failed, source_removed,
    source_skipped, source_unchanged, source_updated, status, success, summary_row, timing, warn,
};
pub use progress::Spinner;
pub use table::{sources_table, stats_table, SourceRow, TableBuilder};
pub use theme::{theme, Theme};
