//! Digest command - cluster tickets and report the top opportunity.

use super::read_tickets;
use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use shadowops_digest::prelude::*;
use shadowops_digest::summary::cluster_overview;
use std::time::Duration;

pub async fn run(
    input: &str,
    avg_minutes: f64,
    hourly_cost: f64,
    json: bool,
    config: &DigestConfig,
) -> Result<()> {
    let batch = TicketBatch::new(read_tickets(input)?)?;
    let params = DigestParams::new(avg_minutes, hourly_cost)?;
    let digester = Digester::from_config(config);

    let spinner = if json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };
    spinner.set_message(format!("Clustering {} tickets...", batch.len()));

    let digest = digester.produce_digest(&batch, &params).await;
    spinner.finish_and_clear();
    let digest = digest?;

    if json {
        println!("{}", serde_json::to_string_pretty(&digest)?);
        return Ok(());
    }

    print_digest(&digest, &batch);
    Ok(())
}

fn print_digest(digest: &DigestResult, batch: &TicketBatch) {
    println!();
    for line in report_lines(digest, batch) {
        println!("{line}");
    }
    println!();
}

fn report_lines(digest: &DigestResult, batch: &TicketBatch) -> Vec<String> {
    let mut lines = vec![
        "═══ ShadowOps Digest ═══".bold().to_string(),
        String::new(),
        digest.summary.clone(),
        String::new(),
        format!("{} {}", "Top categories:".bold(), cluster_overview(&digest.clusters)),
        String::new(),
        "Clusters:".bold().to_string(),
    ];

    for (rank, cluster) in digest.clusters.iter().enumerate() {
        let cohesion = digest
            .insights
            .iter()
            .find(|insight| insight.label == cluster.label)
            .map(|insight| format!("cohesion {:.2}", insight.cohesion))
            .unwrap_or_default();
        lines.push(format!("  {}. {} {}", rank + 1, cluster.label.cyan(), cohesion.dimmed()));
        if let Some(example) = cluster.indices.first().and_then(|&i| batch.get(i)) {
            lines.push(format!("     {} {}", "e.g.".dimmed(), example));
        }
    }

    lines.push(String::new());
    lines.push(format!("{} {}", "Suggestion:".bold(), digest.suggestion.green()));
    lines.push(format!(
        "{} {:.1}h wasted, ${:.2} recoverable",
        "Savings:".bold(),
        digest.savings.wasted_hours,
        digest.savings.saved_dollars
    ));

    if digest.embedding_strategy.is_degraded() {
        lines.push(format!(
            "  {} Remote embeddings unavailable, clustered with local TF-IDF",
            "•".yellow()
        ));
    }
    if digest.suggestion_source.is_degraded() {
        lines.push(format!("  {} Suggestion came from a {}", "•".yellow(), digest.suggestion_source));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_report_lists_top_categories() {
        let batch = TicketBatch::new(
            ["VPN not connecting", "VPN drops constantly", "Password reset needed", "Printer offline"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        let params = DigestParams::new(30.0, 40.0).unwrap();
        let digest = Digester::local().produce_digest(&batch, &params).await.unwrap();

        let lines = report_lines(&digest, &batch);
        let overview = cluster_overview(&digest.clusters);
        assert!(overview.starts_with("VPN Issues (2 tickets, 50.0%)"));
        assert!(lines.iter().any(|line| line.ends_with(&overview)));
        assert!(lines.contains(&digest.summary));
        assert!(lines.iter().any(|line| line.contains("Remote embeddings unavailable")));
    }
}
