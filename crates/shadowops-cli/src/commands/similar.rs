//! Similar command - rank tickets against a free-text query.

use super::read_tickets;
use anyhow::Result;
use colored::Colorize;
use shadowops_digest::prelude::*;

pub async fn run(input: &str, query: &str, top: usize, config: &DigestConfig) -> Result<()> {
    let batch = TicketBatch::new(read_tickets(input)?)?;
    let digester = Digester::from_config(config);

    println!("{} Searching {} tickets for: {}", "→".blue(), batch.len(), query.bold());

    let matches = digester.find_similar(&batch, query, top).await?;
    if matches.is_empty() {
        println!("{}", "No similar tickets found.".yellow());
        return Ok(());
    }

    println!();
    for (rank, hit) in matches.iter().enumerate() {
        println!(
            "  {}. {} {}",
            rank + 1,
            format!("[{:.3}]", hit.score).dimmed(),
            hit.ticket
        );
    }
    println!();
    Ok(())
}
