//! Invoice domain types and serialization helpers.
//!
//! This module defines the structures used to represent invoices, service line
//! items, and the business/client address records an invoice freezes a copy
//! of. It also provides custom serde serializers for types that need to be
//! represented as strings in JSON ([`BigDecimal`], [`DateTime`] and
//! [`NaiveDate`]). Builders are derived for constructing instances, with some
//! custom build logic for deriving totals and due dates.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use derive_builder::Builder;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::terms::{PaymentTerms, resolve_due_date};
use crate::totals::{DiscountType, compute_totals};

/// Fixed id of the single business info record per deployment.
pub const BUSINESS_INFO_ID: i64 = 1;

pub(crate) fn serialize_bigdecimal<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub(crate) fn serialize_datetime<S>(
    value: &DateTime<FixedOffset>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339())
}

pub(crate) fn serialize_date<S>(value: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.format("%Y-%m-%d").to_string())
}

pub(crate) fn serialize_datetime_vec<S>(
    value: &Vec<DateTime<FixedOffset>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(value.iter().map(|d| d.to_rfc3339()))
}

pub(crate) fn deserialize_bigdecimal<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BigDecimal::from_str(&s).map_err(serde::de::Error::custom)
}

pub(crate) fn deserialize_datetime<'de, D>(
    deserializer: D,
) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom)
}

pub(crate) fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

pub(crate) fn deserialize_datetime_vec<'de, D>(
    deserializer: D,
) -> Result<Vec<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|s| DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom))
        .collect()
}

const ID_DIGITS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const BASE36_DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a short random record id (nine lowercase alphanumeric characters).
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..9)
        .map(|_| ID_DIGITS[rng.gen_range(0..ID_DIGITS.len())] as char)
        .collect()
}

fn base36(mut value: u128) -> String {
    if value == 0 {
        return String::from("0");
    }
    let mut out = String::new();
    while value > 0 {
        out.insert(0, BASE36_DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    out
}

/// Generate a unique display invoice number of the form
/// `INV-<base36 unix millis>-<3 random characters>`.
pub fn generate_invoice_number() -> String {
    let millis = Utc::now().timestamp_millis().unsigned_abs() as u128;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..3)
        .map(|_| BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())] as char)
        .collect();
    format!("INV-{}-{}", base36(millis), suffix)
}

/// Lifecycle state of an invoice. Transitions normally run
/// draft -> sent -> paid (or overdue), but manual override to any state is
/// allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// A single billable service entry. `total` is derived from
/// `quantity * rate` and is re-synced whenever either field changes or the
/// item enters an invoice; it is never authoritative on its own.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(strip_option, into), pattern = "owned")]
pub struct ServiceItem {
    #[builder(default = generate_id())]
    id: String,
    service: String,
    #[builder(default)]
    description: Option<String>,
    /// One entry per scheduled visit, in order.
    #[serde(
        serialize_with = "serialize_datetime_vec",
        deserialize_with = "deserialize_datetime_vec"
    )]
    #[builder(default = Vec::new())]
    dates: Vec<DateTime<FixedOffset>>,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    quantity: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    rate: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    #[builder(default = BigDecimal::from(0))]
    total: BigDecimal,
}

impl ServiceItem {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn dates(&self) -> &[DateTime<FixedOffset>] {
        &self.dates
    }

    pub fn quantity(&self) -> &BigDecimal {
        &self.quantity
    }

    pub fn rate(&self) -> &BigDecimal {
        &self.rate
    }

    /// The stored derived total. May be stale on partially-edited input; use
    /// [`ServiceItem::line_total`] for the authoritative value.
    pub fn total(&self) -> &BigDecimal {
        &self.total
    }

    /// The authoritative line total, `quantity * rate`.
    pub fn line_total(&self) -> BigDecimal {
        &self.quantity * &self.rate
    }

    /// Re-sync the stored total with `quantity * rate`.
    pub fn sync_total(&mut self) {
        self.total = self.line_total();
    }

    pub fn set_quantity(&mut self, quantity: BigDecimal) {
        self.quantity = quantity;
        self.sync_total();
    }

    pub fn set_rate(&mut self, rate: BigDecimal) {
        self.rate = rate;
        self.sync_total();
    }
}

/// The issuing business. At most one record exists per deployment, under
/// [`BUSINESS_INFO_ID`]. Saved invoices freeze a copy of this record.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(strip_option, into), pattern = "owned")]
pub struct BusinessInfo {
    #[builder(default = Some(BUSINESS_INFO_ID))]
    id: Option<i64>,
    business_name: String,
    #[builder(default)]
    email: String,
    #[builder(default)]
    phone: String,
    #[builder(default)]
    address: String,
    #[builder(default)]
    abn: Option<String>,
    #[builder(default)]
    logo_url: Option<String>,
    #[builder(default)]
    bank_account_number: Option<String>,
    #[builder(default)]
    bank_bsb: Option<String>,
}

impl BusinessInfo {
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn business_name(&self) -> &str {
        &self.business_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn abn(&self) -> Option<&str> {
        self.abn.as_deref()
    }

    pub fn logo_url(&self) -> Option<&str> {
        self.logo_url.as_deref()
    }

    pub fn bank_account_number(&self) -> Option<&str> {
        self.bank_account_number.as_deref()
    }

    pub fn bank_bsb(&self) -> Option<&str> {
        self.bank_bsb.as_deref()
    }
}

/// The invoiced client. Saved invoices freeze a copy of this record.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(strip_option, into), pattern = "owned")]
pub struct ClientInfo {
    #[builder(default)]
    id: Option<String>,
    name: String,
    #[builder(default)]
    email: String,
    #[builder(default)]
    phone: String,
    #[builder(default)]
    address: String,
}

impl ClientInfo {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Invoice top level model.
///
/// The financial fields (`subtotal`, `gst_amount`, `total`, per-item totals)
/// are derived and re-computed on every item or parameter change; the stored
/// values exist so a fetched record renders without recomputation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(strip_option, into), pattern = "owned")]
pub struct Invoice {
    #[builder(default = generate_id())]
    id: String,
    #[builder(default = generate_invoice_number())]
    invoice_number: String,
    #[serde(serialize_with = "serialize_date", deserialize_with = "deserialize_date")]
    #[builder(default = Local::now().date_naive())]
    issue_date: NaiveDate,
    /// Derived from `issue_date` and `payment_terms` unless manually
    /// overridden afterwards.
    #[serde(serialize_with = "serialize_date", deserialize_with = "deserialize_date")]
    #[builder(default = Local::now().date_naive())]
    due_date: NaiveDate,
    #[builder(default = PaymentTerms::Net14)]
    payment_terms: PaymentTerms,
    #[builder(default = InvoiceStatus::Draft)]
    status: InvoiceStatus,
    business_info: BusinessInfo,
    client_info: ClientInfo,
    #[builder(default = Vec::new())]
    items: Vec<ServiceItem>,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    #[builder(default = BigDecimal::from(0))]
    subtotal: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    #[builder(default = BigDecimal::from(0))]
    discount: BigDecimal,
    #[builder(default = DiscountType::Percentage)]
    discount_type: DiscountType,
    #[builder(default = true)]
    gst_enabled: bool,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    #[builder(default = BigDecimal::from(10))]
    gst_rate: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    #[builder(default = BigDecimal::from(0))]
    gst_amount: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    #[builder(default = BigDecimal::from(0))]
    total: BigDecimal,
    #[builder(default)]
    notes: Option<String>,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime"
    )]
    #[builder(default = Local::now().into())]
    created_at: DateTime<FixedOffset>,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime"
    )]
    #[builder(default = Local::now().into())]
    updated_at: DateTime<FixedOffset>,
}

impl Invoice {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn issue_date(&self) -> NaiveDate {
        self.issue_date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn payment_terms(&self) -> PaymentTerms {
        self.payment_terms
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn business_info(&self) -> &BusinessInfo {
        &self.business_info
    }

    pub fn client_info(&self) -> &ClientInfo {
        &self.client_info
    }

    pub fn items(&self) -> &[ServiceItem] {
        &self.items
    }

    pub fn subtotal(&self) -> &BigDecimal {
        &self.subtotal
    }

    pub fn discount(&self) -> &BigDecimal {
        &self.discount
    }

    pub fn discount_type(&self) -> DiscountType {
        self.discount_type
    }

    pub fn gst_enabled(&self) -> bool {
        self.gst_enabled
    }

    pub fn gst_rate(&self) -> &BigDecimal {
        &self.gst_rate
    }

    pub fn gst_amount(&self) -> &BigDecimal {
        &self.gst_amount
    }

    pub fn total(&self) -> &BigDecimal {
        &self.total
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<FixedOffset> {
        self.updated_at
    }

    /// File name for the exported PDF artifact, used for downloads and mail
    /// attachments alike.
    pub fn pdf_filename(&self) -> String {
        format!("{}.pdf", self.invoice_number)
    }

    /// Re-derive all financial fields from the current items and adjustment
    /// parameters. Stored per-item totals are synced first so stale input
    /// cannot leak into the invoice totals.
    pub fn recompute_totals(&mut self) {
        for item in &mut self.items {
            item.sync_total();
        }
        let totals = compute_totals(
            &self.items,
            &self.discount,
            self.discount_type,
            self.gst_enabled,
            &self.gst_rate,
        );
        self.subtotal = totals.subtotal;
        self.gst_amount = totals.gst_amount;
        self.total = totals.total;
    }

    /// Re-derive the due date from the issue date and payment terms.
    pub fn derive_due_date(&mut self) {
        self.due_date = resolve_due_date(self.issue_date, self.payment_terms);
    }

    /// Manually override the due date, detaching it from the payment terms.
    pub fn set_due_date(&mut self, due_date: NaiveDate) {
        self.due_date = due_date;
    }

    pub fn set_issue_date(&mut self, issue_date: NaiveDate) {
        self.issue_date = issue_date;
        self.derive_due_date();
    }

    pub fn set_payment_terms(&mut self, terms: PaymentTerms) {
        self.payment_terms = terms;
        self.derive_due_date();
    }

    pub fn set_status(&mut self, status: InvoiceStatus) {
        self.status = status;
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes;
    }

    pub fn add_item(&mut self, mut item: ServiceItem) {
        item.sync_total();
        self.items.push(item);
        self.recompute_totals();
    }

    pub fn set_items(&mut self, items: Vec<ServiceItem>) {
        self.items = items;
        self.recompute_totals();
    }

    pub fn set_discount(&mut self, discount: BigDecimal, discount_type: DiscountType) {
        self.discount = discount;
        self.discount_type = discount_type;
        self.recompute_totals();
    }

    pub fn set_gst(&mut self, enabled: bool, rate: BigDecimal) {
        self.gst_enabled = enabled;
        self.gst_rate = rate;
        self.recompute_totals();
    }

    /// Stamp `updated_at` with the current local time.
    pub fn touch(&mut self) {
        self.updated_at = Local::now().into();
    }
}

impl InvoiceBuilder {
    /// Add a [`ServiceItem`] to the builder's internal list, syncing its
    /// stored total first.
    ///
    /// # Example
    /// ```rust
    /// use invoice_kit::{InvoiceBuilder, ServiceItemBuilder};
    ///
    /// let item = ServiceItemBuilder::default()
    ///     .service("Hedge Trimming")
    ///     .quantity(2)
    ///     .rate(85)
    ///     .build().unwrap();
    /// let builder = InvoiceBuilder::default().add_item(item);
    /// ```
    pub fn add_item(self, mut item: ServiceItem) -> Self {
        item.sync_total();
        match self.items {
            Some(mut items) => {
                items.push(item);
                Self {
                    items: Some(items),
                    ..self
                }
            }
            None => Self {
                items: Some(vec![item]),
                ..self
            },
        }
    }

    /// Build the invoice and derive its dependent fields: the due date (when
    /// not explicitly set) and all financial totals.
    pub fn finish(self) -> Result<Invoice, InvoiceBuilderError> {
        let derive_due = self.due_date.is_none();
        let mut invoice = self.build()?;
        if derive_due {
            invoice.derive_due_date();
        }
        invoice.recompute_totals();
        Ok(invoice)
    }
}
