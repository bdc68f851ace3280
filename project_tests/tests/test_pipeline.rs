//! End-to-end: boundary calls in, console lines and block files out.

use std::fs;

use lib_bulk::{api, RegistryOptions};
use project_tests::{captured_registry, console_only};
use tempfile::tempdir;

#[test]
fn static_blocks_reach_console_and_files() {
    let dir = tempdir().unwrap();
    let options = RegistryOptions {
        file_workers: 2,
        output_dir: dir.path().to_path_buf(),
        ..RegistryOptions::default()
    };
    let (registry, console) = captured_registry(options);

    let handle = api::connect(&registry, 2);
    api::receive(&registry, handle, b"cmd1\ncmd2\ncmd3\n");
    api::disconnect(&registry, handle);
    registry.shutdown();

    assert_eq!(console.contents(), "bulk: cmd1, cmd2\nbulk: cmd3\n");

    let mut file_lines: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| {
            let path = e.unwrap().path();
            let name = path.file_name().unwrap().to_str().unwrap().to_string();
            assert!(name.starts_with("bulk") && name.ends_with(".log"), "{name}");
            fs::read_to_string(path).unwrap()
        })
        .collect();
    file_lines.sort();
    assert_eq!(file_lines, vec!["bulk: cmd1, cmd2\n", "bulk: cmd3\n"]);

    let stats = registry.metrics();
    assert_eq!(stats.totals("log").blocks, 2);
    assert_eq!(stats.totals("file").blocks, 2);
    assert_eq!(stats.totals("file").commands, 3);
}

#[test]
fn dynamic_block_example() {
    let (registry, console) = captured_registry(console_only());
    let handle = api::connect(&registry, 2);
    api::receive(&registry, handle, b"cmd1\n{\ncmd2\ncmd3\n}\ncmd4\n");
    api::disconnect(&registry, handle);
    registry.shutdown();

    assert_eq!(
        console.contents(),
        "bulk: cmd1\nbulk: cmd2, cmd3\nbulk: cmd4\n"
    );
}

#[test]
fn unterminated_block_at_disconnect_is_dropped() {
    let (registry, console) = captured_registry(console_only());
    let handle = api::connect(&registry, 3);
    api::receive(&registry, handle, b"a\n{\nb\n{\nc\n}\n");
    api::disconnect(&registry, handle);
    registry.shutdown();

    assert_eq!(console.contents(), "bulk: a\n");
}

#[test]
fn bytes_split_mid_line_and_mid_bracket() {
    let (registry, console) = captured_registry(console_only());
    let handle = api::connect(&registry, 10);
    for piece in [&b"x\n{"[..], b"\ny", b"\n{\nz\n}", b"\n}\nw"] {
        api::receive(&registry, handle, piece);
    }
    // "w" never got its terminator.
    api::disconnect(&registry, handle);
    registry.shutdown();

    assert_eq!(console.contents(), "bulk: x\nbulk: y, z\n");
}

#[test]
fn file_sink_failure_does_not_stop_console() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"").unwrap();
    let options = RegistryOptions {
        file_workers: 1,
        output_dir: blocker,
        ..RegistryOptions::default()
    };
    let (registry, console) = captured_registry(options);

    let handle = api::connect(&registry, 1);
    api::receive(&registry, handle, b"one\ntwo\n");
    api::disconnect(&registry, handle);
    registry.shutdown();

    assert_eq!(console.contents(), "bulk: one\nbulk: two\n");
    assert_eq!(registry.metrics().totals("file").blocks, 0);
}
