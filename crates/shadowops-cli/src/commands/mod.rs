//! CLI command implementations.

pub mod digest;
pub mod init;
pub mod similar;

use anyhow::{bail, Context, Result};
use std::io::Read;

/// Shortest accepted ticket, in characters.
pub const MIN_TICKET_CHARS: usize = 5;
/// Longest accepted ticket, in characters.
pub const MAX_TICKET_CHARS: usize = 500;

/// Read tickets from a file, or stdin when `input` is "-".
pub fn read_tickets(input: &str) -> Result<Vec<String>> {
    let content = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read tickets from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };
    parse_tickets(&content)
}

/// Parse a JSON array of strings, or one ticket per non-blank line.
pub fn parse_tickets(content: &str) -> Result<Vec<String>> {
    let trimmed = content.trim_start();
    let tickets: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).context("Expected a JSON array of ticket strings")?
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()
    };

    for (i, ticket) in tickets.iter().enumerate() {
        let chars = ticket.trim().chars().count();
        if !(MIN_TICKET_CHARS..=MAX_TICKET_CHARS).contains(&chars) {
            bail!(
                "Ticket {} has {} characters (expected {}-{})",
                i + 1,
                chars,
                MIN_TICKET_CHARS,
                MAX_TICKET_CHARS
            );
        }
    }
    Ok(tickets)
}
