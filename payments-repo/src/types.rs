//! Row parsing and error mapping shared by the SQL adapters.

use payments_types::{OrderStatus, PaymentStatus, RepoError};

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_order_status(s: &str) -> Result<OrderStatus, RepoError> {
    s.parse()
        .map_err(|_| RepoError::Database(format!("Unknown order status: {}", s)))
}

pub fn parse_payment_status(s: &str) -> Result<PaymentStatus, RepoError> {
    s.parse()
        .map_err(|_| RepoError::Database(format!("Unknown payment status: {}", s)))
}

/// Builds a `LIKE` pattern matching `fragment` anywhere, case-folded.
///
/// Use with `ESCAPE '\'`.
pub fn contains_pattern(fragment: &str) -> String {
    let escaped = fragment
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

pub fn db_err(e: sqlx::Error) -> RepoError {
    RepoError::Database(e.to_string())
}

pub fn tx_err(e: sqlx::Error) -> RepoError {
    RepoError::Transaction(e.to_string())
}

/// Maps a unique-constraint violation to `RepoError::Conflict`.
pub fn insert_err(e: sqlx::Error, conflict: impl FnOnce() -> String) -> RepoError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict(conflict()),
        _ => db_err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_storage_text() {
        for status in [
            OrderStatus::Created,
            OrderStatus::PendingPayment,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(parse_order_status(status.as_str()).unwrap(), status);
        }
        assert_eq!(
            parse_payment_status("EXPIRED").unwrap(),
            PaymentStatus::Expired
        );
        assert!(matches!(
            parse_payment_status("???"),
            Err(RepoError::Database(_))
        ));
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(" Kopi "), "%kopi%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
