//! Quantity extraction from the ERP stock breakdown.
//!
//! The ERP reports stock as an array of arrays of balance records, one
//! inner array per warehouse group:
//!
//! ```text
//! [[{"warehouse": "A", "balance": 3}, {"warehouse": "B", "balance": 2}],
//!  [{"warehouse": "C", "balance": 5}]]          → 10
//! ```
//!
//! Any shape reduces to one non-negative total: arrays are walked
//! recursively, an object contributes its numeric `balance`, everything
//! else contributes zero.

use restock_domain::Quantity;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

/// Field holding the per-record balance.
pub const BALANCE_FIELD: &str = "balance";

/// Sum every numeric balance in a stock payload.
pub fn extract_quantity(stock: &Value) -> Quantity {
    Quantity::from_decimal_floor(sum_balances(stock))
}

fn sum_balances(value: &Value) -> Decimal {
    match value {
        Value::Array(entries) => entries.iter().map(sum_balances).fold(Decimal::ZERO, saturating_add),
        Value::Object(record) => record.get(BALANCE_FIELD).map(numeric).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

/// Addition that pins to the representable range instead of panicking.
fn saturating_add(acc: Decimal, value: Decimal) -> Decimal {
    acc.checked_add(value).unwrap_or(if value.is_sign_negative() { Decimal::MIN } else { Decimal::MAX })
}

fn numeric(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_u64().map(Decimal::from))
            .or_else(|| n.as_f64().and_then(Decimal::from_f64))
            .unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_balances_are_summed() {
        let stock = json!([[{ "balance": 3 }, { "balance": 2 }], [{ "balance": 5 }]]);
        assert_eq!(extract_quantity(&stock).units(), 10);
    }

    #[test]
    fn test_empty_array_is_zero() {
        assert_eq!(extract_quantity(&json!([])).units(), 0);
        assert_eq!(extract_quantity(&json!([[]])).units(), 0);
    }

    #[test]
    fn test_missing_and_non_numeric_balances_count_as_zero() {
        let stock = json!([[{ "balance": 4 }, { "warehouse": "B" }, { "balance": "7" }, { "balance": null }]]);
        assert_eq!(extract_quantity(&stock).units(), 4);
    }

    #[test]
    fn test_flat_array_of_records() {
        let stock = json!([{ "balance": 1 }, { "balance": 6 }]);
        assert_eq!(extract_quantity(&stock).units(), 7);
    }

    #[test]
    fn test_single_object_payload() {
        assert_eq!(extract_quantity(&json!({ "balance": 12 })).units(), 12);
    }

    #[test]
    fn test_scalar_and_null_payloads_are_zero() {
        assert_eq!(extract_quantity(&json!(null)).units(), 0);
        assert_eq!(extract_quantity(&json!(42)).units(), 0);
        assert_eq!(extract_quantity(&json!("12")).units(), 0);
    }

    #[test]
    fn test_fractional_total_is_floored() {
        let stock = json!([[{ "balance": 1.5 }, { "balance": 2.25 }]]);
        assert_eq!(extract_quantity(&stock).units(), 3);
    }

    #[test]
    fn test_negative_total_clamps_to_zero() {
        let stock = json!([[{ "balance": -8 }, { "balance": 3 }]]);
        assert_eq!(extract_quantity(&stock).units(), 0);
    }

    #[test]
    fn test_negative_entries_offset_positive_ones() {
        let stock = json!([[{ "balance": 10 }], [{ "balance": -4 }]]);
        assert_eq!(extract_quantity(&stock).units(), 6);
    }

    #[test]
    fn test_huge_balances_saturate() {
        let stock = json!([[{ "balance": 5.0e28 }, { "balance": 5.0e28 }]]);
        assert_eq!(extract_quantity(&stock).units(), u64::MAX);
    }

    #[test]
    fn test_huge_negative_balances_clamp_to_zero() {
        let stock = json!([[{ "balance": -5.0e28 }, { "balance": -5.0e28 }], [{ "balance": 3 }]]);
        assert_eq!(extract_quantity(&stock).units(), 0);
    }
}
