use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::error::BulkError;

/// Maps a level name to a filter; unknown names fall back to `Info`.
pub fn parse_level(log_level: &str) -> log::LevelFilter {
    match log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

fn colored_level(level: log::Level) -> colored::ColoredString {
    let text = level.to_string();
    match level {
        log::Level::Error => text.bright_red(),
        log::Level::Warn => text.bright_yellow(),
        log::Level::Info => text.bright_green(),
        log::Level::Debug => text.bright_white(),
        log::Level::Trace => text.bright_cyan(),
    }
}

/// Installs the global logger: colored lines on stderr plus a fresh
/// `<app_name>_<timestamp>.log` in `log_dir`. Older `.log` files in `log_dir`
/// are rotated out first, keeping the `keep` most recent.
///
/// Stdout is left alone; it carries the console sink's block lines.
///
/// # Returns
/// The path of the log file opened for this run.
pub fn setup_logging(
    app_name: &str,
    log_dir: &Path,
    log_level: &str,
    keep: usize,
) -> Result<PathBuf, BulkError> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    // The new file is not there yet, so keep one fewer.
    cleanup_old_logs(log_dir, app_name, keep.saturating_sub(1))?;

    let log_file_name = format!(
        "{}_{}.log",
        app_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = log_dir.join(log_file_name);

    let stderr = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now()
                    .format("[%Y-%m-%d %H:%M:%S]")
                    .to_string()
                    .truecolor(128, 128, 128),
                record.target(),
                colored_level(record.level()),
                message
            ))
        })
        .chain(std::io::stderr());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(&log_path)?);

    fern::Dispatch::new()
        .level(parse_level(log_level))
        .chain(stderr)
        .chain(file)
        .apply()?;

    Ok(log_path)
}

/// Deletes `<app_name>_*.log` files in `log_dir`, keeping the `keep` newest
/// by modification time.
///
/// Files that cannot be deleted are reported on stderr and skipped.
///
/// # Returns
/// The number of files removed.
pub fn cleanup_old_logs(log_dir: &Path, app_name: &str, keep: usize) -> Result<usize, BulkError> {
    let prefix = format!("{}_", app_name);
    let mut entries: Vec<(std::time::SystemTime, PathBuf)> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "log"))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix))
        })
        .filter_map(|p| {
            let modified = fs::metadata(&p).and_then(|m| m.modified()).ok()?;
            Some((modified, p))
        })
        .collect();

    // Newest first; ties broken by name so timestamped names order correctly.
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

    let mut removed = 0;
    for (_, path) in entries.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Failed to delete old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_level("trace"), log::LevelFilter::Trace);
        assert_eq!(parse_level("off"), log::LevelFilter::Off);
        assert_eq!(parse_level("nonsense"), log::LevelFilter::Info);
    }

    #[test]
    fn cleanup_keeps_newest_and_ignores_other_files() {
        let dir = tempdir().unwrap();
        for name in [
            "bulk_server_2024-01-01_00-00-00.log",
            "bulk_server_2024-01-02_00-00-00.log",
            "bulk_server_2024-01-03_00-00-00.log",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::write(dir.path().join("bulk1700000000.log"), "bulk: a\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let removed = cleanup_old_logs(dir.path(), "bulk_server", 1).unwrap();
        assert_eq!(removed, 2);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "bulk1700000000.log".to_string(),
                "bulk_server_2024-01-03_00-00-00.log".to_string(),
                "notes.txt".to_string(),
            ]
        );
    }

    #[test]
    fn cleanup_with_nothing_to_do() {
        let dir = tempdir().unwrap();
        assert_eq!(cleanup_old_logs(dir.path(), "bulk_server", 3).unwrap(), 0);
    }
}
