//! Shared fixtures for the workspace integration tests in `tests/`.

use std::sync::Arc;

use lib_bulk::sinks::{ConsoleWriter, SharedBuffer};
use lib_bulk::{Block, ContextRegistry, Handle, RegistryOptions};

/// A registry whose console output is captured in memory.
pub fn captured_registry(options: RegistryOptions) -> (ContextRegistry, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let registry = ContextRegistry::with_console(options, ConsoleWriter::new(Box::new(buffer.clone())))
        .expect("registry starts");
    (registry, buffer)
}

/// Console-only options, for tests that do not look at files.
pub fn console_only() -> RegistryOptions {
    RegistryOptions {
        file_output: false,
        ..RegistryOptions::default()
    }
}

/// Joins commands into newline-terminated input bytes.
pub fn to_input(commands: &[String]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for command in commands {
        bytes.extend_from_slice(command.as_bytes());
        bytes.push(b'\n');
    }
    bytes
}

/// Feeds `input` in `chunk`-sized pieces, then flushes, collecting every
/// block the context sealed.
pub fn drive(registry: &ContextRegistry, handle: Handle, input: &[u8], chunk: usize) -> Vec<Vec<String>> {
    let context = registry.find(handle).expect("handle is live");
    let mut blocks: Vec<Arc<Block>> = Vec::new();
    for piece in input.chunks(chunk.max(1)) {
        blocks.extend(context.process(piece));
    }
    blocks.extend(context.flush());
    blocks.iter().map(|b| b.commands().to_vec()).collect()
}

/// Reference partition of plain commands into chunks of `threshold`.
pub fn reference_partition(commands: &[String], threshold: usize) -> Vec<Vec<String>> {
    commands.chunks(threshold.max(1)).map(|c| c.to_vec()).collect()
}
