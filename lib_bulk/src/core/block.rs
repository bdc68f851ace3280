//! Sealed block model.

use std::fmt;
use std::io::{self, Write};

/// Prefix of every rendered block line.
pub const BLOCK_PREFIX: &str = "bulk: ";

/// A sealed, ordered group of commands.
///
/// Blocks are built only by [`crate::core::engine::BulkEngine`] (or by tests)
/// and are never empty once they leave the engine. They travel to the sinks
/// wrapped in an `Arc`, so every sink sees the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Epoch seconds at which the first command of the block was accepted.
    timestamp: i64,
    commands: Vec<String>,
}

impl Block {
    /// Creates a block from its capture time and commands.
    pub fn new(timestamp: i64, commands: Vec<String>) -> Self {
        Self { timestamp, commands }
    }

    /// Capture time in epoch seconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The commands, in arrival order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Number of commands in the block.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// `true` when the block carries no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Writes `bulk: c1, c2, ..., cN` and a line terminator.
    ///
    /// An empty block writes nothing.
    pub fn write_line<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        if self.commands.is_empty() {
            return Ok(());
        }
        writeln!(out, "{}", self)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", BLOCK_PREFIX, self.commands.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(cmds: &[&str]) -> Block {
        Block::new(42, cmds.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn renders_comma_joined_line() {
        let mut out = Vec::new();
        block(&["cmd1", "cmd2", "cmd3"]).write_line(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "bulk: cmd1, cmd2, cmd3\n");
    }

    #[test]
    fn single_command_has_no_separator() {
        let mut out = Vec::new();
        block(&["only"]).write_line(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "bulk: only\n");
    }

    #[test]
    fn empty_block_writes_nothing() {
        let mut out = Vec::new();
        block(&[]).write_line(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn empty_command_text_is_kept() {
        assert_eq!(block(&["a", "", "b"]).to_string(), "bulk: a, , b");
    }
}
