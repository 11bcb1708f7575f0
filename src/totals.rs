//! Invoice totals arithmetic.
//!
//! Pure derivation of subtotal, discount amount, GST amount, and grand total
//! from a list of service items and the invoice's adjustment parameters. All
//! arithmetic is exact decimal via [`BigDecimal`]; the functions here never
//! fail and never clamp.

use bigdecimal::{BigDecimal, rounding::RoundingMode};
use serde::{Deserialize, Serialize};

use crate::invoice::ServiceItem;

/// How the invoice-level discount is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// Discount is a percentage of the subtotal.
    Percentage,
    /// Discount is a flat currency amount, applied verbatim.
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "fixed" => DiscountType::Fixed,
            _ => DiscountType::Percentage,
        }
    }
}

/// The derived financial fields of an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceTotals {
    pub subtotal: BigDecimal,
    pub discount_amount: BigDecimal,
    pub gst_amount: BigDecimal,
    pub total: BigDecimal,
}

/// Compute all derived financial fields for a set of items and adjustment
/// parameters.
///
/// The subtotal sums `quantity * rate` per item rather than trusting the
/// stored per-item totals, so partially-updated input cannot skew the result.
/// A fixed discount is applied verbatim, not clamped: a discount larger than
/// the subtotal legitimately produces a negative discounted amount and that
/// state round-trips as-is. GST applies to the discounted subtotal.
pub fn compute_totals(
    items: &[ServiceItem],
    discount: &BigDecimal,
    discount_type: DiscountType,
    gst_enabled: bool,
    gst_rate: &BigDecimal,
) -> InvoiceTotals {
    let hundred = BigDecimal::from(100);
    let subtotal: BigDecimal = items.iter().map(|item| item.line_total()).sum();

    let discount_amount = match discount_type {
        DiscountType::Percentage => (&subtotal * discount) / &hundred,
        DiscountType::Fixed => discount.clone(),
    };

    let after_discount = &subtotal - &discount_amount;
    let gst_amount = if gst_enabled {
        (&after_discount * gst_rate) / &hundred
    } else {
        BigDecimal::from(0)
    };
    let total = &after_discount + &gst_amount;

    InvoiceTotals {
        subtotal,
        discount_amount,
        gst_amount,
        total,
    }
}

/// Format a currency amount for display (AUD, two decimal places, thousands
/// separators), e.g. `$1,234.50` or `-$31.00`.
pub fn format_currency(amount: &BigDecimal) -> String {
    let rounded = amount.with_scale_round(2, RoundingMode::HalfUp);
    let text = rounded.to_string();
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (whole, cents) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{sign}${grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::ServiceItemBuilder;
    use std::str::FromStr;

    fn item(quantity: i32, rate: i32) -> ServiceItem {
        ServiceItemBuilder::default()
            .service("Service")
            .quantity(quantity)
            .rate(rate)
            .build()
            .unwrap()
    }

    fn bd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn no_items_yields_all_zero() {
        let totals = compute_totals(&[], &bd("0"), DiscountType::Percentage, true, &bd("10"));
        assert_eq!(totals.subtotal, bd("0"));
        assert_eq!(totals.discount_amount, bd("0"));
        assert_eq!(totals.gst_amount, bd("0"));
        assert_eq!(totals.total, bd("0"));
    }

    #[test]
    fn no_adjustments_total_equals_subtotal() {
        let items = [item(2, 100), item(1, 50)];
        let totals = compute_totals(&items, &bd("0"), DiscountType::Fixed, false, &bd("10"));
        assert_eq!(totals.subtotal, bd("250"));
        assert_eq!(totals.total, totals.subtotal);
    }

    #[test]
    fn subtotal_is_order_independent() {
        let forward = [item(2, 100), item(1, 50), item(3, 20)];
        let reverse = [item(3, 20), item(1, 50), item(2, 100)];
        let a = compute_totals(&forward, &bd("5"), DiscountType::Percentage, true, &bd("10"));
        let b = compute_totals(&reverse, &bd("5"), DiscountType::Percentage, true, &bd("10"));
        assert_eq!(a.subtotal, b.subtotal);
        assert_eq!(a.total, b.total);
    }

    #[test]
    fn subtotal_ignores_stale_stored_totals() {
        // stored total is left at the builder default of zero; the engine
        // must derive from quantity * rate regardless
        let items = [item(4, 25)];
        let totals = compute_totals(&items, &bd("0"), DiscountType::Fixed, false, &bd("0"));
        assert_eq!(totals.subtotal, bd("100"));
    }

    #[test]
    fn percentage_discount_and_gst_compose() {
        // the worked end-to-end scenario: 2x100 + 1x50 + 3x20, 10% discount,
        // 10% GST on the discounted subtotal
        let items = [item(2, 100), item(1, 50), item(3, 20)];
        let totals = compute_totals(&items, &bd("10"), DiscountType::Percentage, true, &bd("10"));
        assert_eq!(totals.subtotal, bd("310"));
        assert_eq!(totals.discount_amount, bd("31"));
        assert_eq!(totals.gst_amount, bd("27.9"));
        assert_eq!(totals.total, bd("306.9"));
    }

    #[test]
    fn fixed_discount_exceeding_subtotal_is_not_clamped() {
        let items = [item(1, 50)];
        let totals = compute_totals(&items, &bd("80"), DiscountType::Fixed, false, &bd("10"));
        assert_eq!(totals.discount_amount, bd("80"));
        assert_eq!(totals.total, bd("-30"));
    }

    #[test]
    fn fractional_quantities_are_exact() {
        let items = [ServiceItemBuilder::default()
            .service("Lawn Maintanance")
            .quantity(bd("2.5"))
            .rate(bd("180"))
            .build()
            .unwrap()];
        let totals = compute_totals(&items, &bd("0"), DiscountType::Fixed, false, &bd("0"));
        assert_eq!(totals.subtotal, bd("450"));
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(&bd("0")), "$0.00");
        assert_eq!(format_currency(&bd("306.9")), "$306.90");
        assert_eq!(format_currency(&bd("1234.5")), "$1,234.50");
        assert_eq!(format_currency(&bd("1234567.891")), "$1,234,567.89");
        assert_eq!(format_currency(&bd("-31")), "-$31.00");
    }
}
