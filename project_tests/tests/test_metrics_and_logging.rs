//! Statistics report and diagnostic log rotation.

use std::fs;

use lib_bulk::api;
use lib_bulk::loggers::cleanup_old_logs;
use project_tests::{captured_registry, console_only};
use tempfile::tempdir;

#[test]
fn report_lists_front_end_and_sink_threads() {
    let (registry, _) = captured_registry(console_only());
    registry.metrics().register_front_end("main");

    let handle = api::connect(&registry, 2);
    api::receive(&registry, handle, b"a\nb\nc\nd\ne\n");
    api::disconnect(&registry, handle);
    registry.shutdown();

    let report = registry.metrics().to_string();
    assert!(report.contains("main thread - 5 lines, 5 commands, 3 blocks"), "{report}");
    assert!(report.contains("log thread - 5 commands, 3 blocks"), "{report}");
}

#[test]
fn front_end_counts_match_rendered_output() {
    let (registry, _) = captured_registry(console_only());
    registry.metrics().register_front_end("main");

    let handle = api::connect(&registry, 2);
    api::receive(&registry, handle, b"a\nb\nc\n{\nd\n}\n");
    api::disconnect(&registry, handle);
    registry.shutdown();

    let main = registry.metrics().totals("main");
    assert_eq!((main.lines, main.commands, main.blocks), (6, 4, 3));
    let log = registry.metrics().totals("log");
    assert_eq!((log.commands, log.blocks), (main.commands, main.blocks));
}

#[test]
fn rotation_spares_block_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("bulk_server_2024-05-01_10-00-00.log"), "old").unwrap();
    fs::write(dir.path().join("bulk_server_2024-05-02_10-00-00.log"), "new").unwrap();
    fs::write(dir.path().join("bulk1714557600.log"), "bulk: a\n").unwrap();

    assert_eq!(cleanup_old_logs(dir.path(), "bulk_server", 0).unwrap(), 2);
    let left: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(left.len(), 1);
    assert!(dir.path().join("bulk1714557600.log").exists());
}
