//! Payment terms and due-date derivation.
//!
//! A payment term is a named policy mapping an invoice's issue date to its
//! due date. Derivation is pure calendar arithmetic on [`NaiveDate`] — no
//! timezone handling, correct across month, year, and leap-year boundaries.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Named payment-term policy.
///
/// Unrecognized term strings parse to [`PaymentTerms::Net14`]; that fallback
/// is deliberate and not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTerms {
    DueOnReceipt,
    Net7,
    Net14,
    Net30,
    Net60,
}

impl PaymentTerms {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTerms::DueOnReceipt => "due-on-receipt",
            PaymentTerms::Net7 => "net-7",
            PaymentTerms::Net14 => "net-14",
            PaymentTerms::Net30 => "net-30",
            PaymentTerms::Net60 => "net-60",
        }
    }

    /// Display label for the policy.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentTerms::DueOnReceipt => "Due on Receipt",
            PaymentTerms::Net7 => "Net 7 Days",
            PaymentTerms::Net14 => "Net 14 Days",
            PaymentTerms::Net30 => "Net 30 Days",
            PaymentTerms::Net60 => "Net 60 Days",
        }
    }

    /// Parse a term name, falling back to `net-14` for anything
    /// unrecognized.
    pub fn parse(s: &str) -> Self {
        match s {
            "due-on-receipt" => PaymentTerms::DueOnReceipt,
            "net-7" => PaymentTerms::Net7,
            "net-30" => PaymentTerms::Net30,
            "net-60" => PaymentTerms::Net60,
            _ => PaymentTerms::Net14,
        }
    }

    /// All supported policies, in display order.
    pub fn all() -> [PaymentTerms; 5] {
        [
            PaymentTerms::DueOnReceipt,
            PaymentTerms::Net7,
            PaymentTerms::Net14,
            PaymentTerms::Net30,
            PaymentTerms::Net60,
        ]
    }

    fn net_days(&self) -> Option<u64> {
        match self {
            PaymentTerms::DueOnReceipt => None,
            PaymentTerms::Net7 => Some(7),
            PaymentTerms::Net14 => Some(14),
            PaymentTerms::Net30 => Some(30),
            PaymentTerms::Net60 => Some(60),
        }
    }
}

impl Serialize for PaymentTerms {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentTerms {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(PaymentTerms::parse(&s))
    }
}

/// Map an issue date and payment-term policy to the concrete due date.
///
/// `due-on-receipt` returns the issue date unchanged; `net-N` adds N calendar
/// days (not business days).
pub fn resolve_due_date(issue_date: NaiveDate, terms: PaymentTerms) -> NaiveDate {
    match terms.net_days() {
        None => issue_date,
        Some(days) => issue_date + Days::new(days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn net_14_crosses_month_boundary() {
        assert_eq!(
            resolve_due_date(date(2024, 1, 20), PaymentTerms::Net14),
            date(2024, 2, 3)
        );
    }

    #[test]
    fn net_14_crosses_leap_february() {
        assert_eq!(
            resolve_due_date(date(2024, 2, 20), PaymentTerms::Net14),
            date(2024, 3, 5)
        );
    }

    #[test]
    fn net_14_in_non_leap_february() {
        assert_eq!(
            resolve_due_date(date(2023, 2, 20), PaymentTerms::Net14),
            date(2023, 3, 6)
        );
    }

    #[test]
    fn due_on_receipt_is_identity() {
        let issue = date(2024, 7, 31);
        assert_eq!(resolve_due_date(issue, PaymentTerms::DueOnReceipt), issue);
    }

    #[test]
    fn net_60_crosses_year_boundary() {
        assert_eq!(
            resolve_due_date(date(2024, 12, 1), PaymentTerms::Net60),
            date(2025, 1, 30)
        );
    }

    #[test]
    fn unknown_terms_behave_like_net_14() {
        let issue = date(2024, 1, 20);
        assert_eq!(
            resolve_due_date(issue, PaymentTerms::parse("unknown-term")),
            resolve_due_date(issue, PaymentTerms::Net14)
        );
    }

    #[test]
    fn term_names_round_trip() {
        for term in PaymentTerms::all() {
            assert_eq!(PaymentTerms::parse(term.as_str()), term);
        }
    }

    #[test]
    fn serde_uses_term_names() {
        let json = serde_json::to_string(&PaymentTerms::Net7).unwrap();
        assert_eq!(json, "\"net-7\"");
        let back: PaymentTerms = serde_json::from_str("\"net-30\"").unwrap();
        assert_eq!(back, PaymentTerms::Net30);
        let fallback: PaymentTerms = serde_json::from_str("\"whenever\"").unwrap();
        assert_eq!(fallback, PaymentTerms::Net14);
    }
}
