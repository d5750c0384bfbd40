//! Time and cost arithmetic.

use crate::types::{DigestParams, SavingsEstimate};

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Hours spent on the batch and dollars the largest cluster accounts for.
///
/// `wasted_hours = n × avg / 60` (one decimal), `saved_dollars = wasted ×
/// largest / n × hourly` (cents). Savings never exceed `wasted × hourly`.
pub fn estimate(ticket_count: usize, largest_cluster_size: usize, params: &DigestParams) -> SavingsEstimate {
    if ticket_count == 0 {
        return SavingsEstimate {
            wasted_hours: 0.0,
            saved_dollars: 0.0,
        };
    }

    let wasted_hours = round_to(ticket_count as f64 * params.avg_minutes_per_ticket / 60.0, 1);
    let share = (largest_cluster_size.min(ticket_count) as f64) / ticket_count as f64;
    let ceiling = wasted_hours * params.hourly_cost_usd;

    let mut saved_dollars = round_to(wasted_hours * share * params.hourly_cost_usd, 2);
    if saved_dollars > ceiling {
        // Rounding up past the total possible cost.
        saved_dollars = (ceiling * 100.0).floor() / 100.0;
    }

    SavingsEstimate {
        wasted_hours,
        saved_dollars: saved_dollars.max(0.0),
    }
}
