use crate::sync::ReconcileReport;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn path(text: &str) -> String {
    text.style(theme().path.clone()).to_string()
}

pub fn source_added(id: &str) {
    println!("{} {}", Icons::NEW.style(theme().success.clone()), path(id));
}

pub fn source_updated(id: &str) {
    println!("{} {}", Icons::MOD.style(theme().warn.clone()), path(id));
}

pub fn source_removed(id: &str) {
    println!("{} {}", Icons::DEL.style(theme().error.clone()), path(id));
}

pub fn source_unchanged(id: &str) {
    println!("  {}", id.style(theme().muted.clone()));
}

pub fn source_skipped(id: &str, reason: &str) {
    println!("{} {} {}", Icons::SKIP, path(id), dim(reason));
}

pub fn source_failed(id: &str, error: &str) {
    eprintln!("{} {} {}", Icons::CROSS, path(id), error.style(theme().error.clone()));
}

pub fn timing(elapsed: &str) {
    println!("{} {}", Icons::CLOCK.style(theme().dim.clone()), elapsed);
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// Per-item lines followed by totals
pub fn reconcile_report(report: &ReconcileReport) {
    for id in &report.added {
        source_added(id);
    }
    for id in &report.updated {
        source_updated(id);
    }
    for id in &report.removed {
        source_removed(id);
    }
    for id in &report.unchanged {
        source_unchanged(id);
    }
    for id in &report.skipped {
        source_skipped(id, "published by this system");
    }
    for failure in &report.failures {
        source_failed(&failure.id, &failure.error);
    }

    section("Summary");
    summary_row("Added:", &report.added.len().to_string());
    summary_row("Updated:", &report.updated.len().to_string());
    summary_row("Removed:", &report.removed.len().to_string());
    summary_row("Unchanged:", &report.unchanged.len().to_string());
    summary_row("Skipped:", &report.skipped.len().to_string());
    summary_row("Failed:", &report.failures.len().to_string());
}
