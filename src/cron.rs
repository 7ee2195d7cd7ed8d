//! Cron expression parsing and next-fire computation (spec §4.G).
//!
//! The teacher carries no real cron-expression parser — its automation
//! triggers only tag a string `"cron"` with no date math — so this wraps the
//! `cron` crate the way `ThirdKeyAI-Symbiont`'s scheduler does, kept to the
//! standard 5-field interpretation per spec §9's re-architecture note.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

/// Validate a cron expression, accepting the standard 5-field form.
/// The `cron` crate itself expects a leading seconds field; we prepend `0`
/// so callers may submit ordinary 5-field expressions (`*/5 * * * *`).
pub fn parse(expr: &str) -> Result<Schedule, String> {
    let with_seconds = to_six_field(expr);
    Schedule::from_str(&with_seconds).map_err(|e| format!("invalid cron expression: {e}"))
}

fn to_six_field(expr: &str) -> String {
    let fields = expr.split_whitespace().count();
    if fields == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

/// Compute the next occurrence strictly after `after`.
pub fn next_occurrence(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let schedule = parse(expr)?;
    schedule
        .after(&after)
        .next()
        .ok_or_else(|| "cron schedule has no future occurrence".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn accepts_standard_five_field_expressions() {
        assert!(parse("*/5 * * * *").is_ok());
        assert!(parse("0 9 * * 1-5").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("not a cron expression").is_err());
    }

    #[test]
    fn next_occurrence_advances_forward() {
        let now = Utc::now();
        let next = next_occurrence("*/5 * * * *", now).unwrap();
        assert!(next > now);
        assert!(next - now <= Duration::minutes(5));
    }
}
