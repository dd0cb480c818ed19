//! Multi-step workflows shared by several handlers.

pub mod cart;
pub mod checkout;
pub mod inventory;
pub mod reconcile;

use chrono::NaiveDate;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Opaque token identifying a guest cart.
pub fn new_guest_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(40).map(char::from).collect()
}

/// Human-facing order number, e.g. `ORD-240501-004217`. `sequence` comes
/// from `order_number_seq`; past six digits the suffix simply grows.
pub fn order_number(day: NaiveDate, sequence: i64) -> String {
    format!("ORD-{}-{sequence:06}", day.format("%y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_token_shape() {
        let token = new_guest_token();
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, new_guest_token());
    }

    #[test]
    fn test_order_number_shape() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(order_number(day, 4217), "ORD-240501-004217");
        assert_eq!(order_number(day, 12_345_678), "ORD-240501-12345678");
    }

    #[test]
    fn test_order_numbers_are_unique_per_sequence_value() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let numbers: std::collections::HashSet<String> = (1..=5_000).map(|n| order_number(day, n)).collect();
        assert_eq!(numbers.len(), 5_000);
    }
}
