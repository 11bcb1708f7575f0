//! Wire-format rows for the relational backend.
//!
//! The hosted backend stores every column name as bare lowercase
//! (`invoicenumber`, `issuedate`, ...) while the in-memory model uses Rust
//! snake_case. This module is the single, explicit, bidirectional schema for
//! that translation — each field of each record is mapped here and nowhere
//! else, and the mapping round-trips losslessly, nested records included.

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AddContext, Error};
use crate::invoice::{
    BusinessInfo, BusinessInfoBuilder, ClientInfo, ClientInfoBuilder, Invoice, InvoiceBuilder,
    InvoiceStatus, ServiceItem, ServiceItemBuilder, deserialize_bigdecimal, deserialize_date,
    deserialize_datetime, deserialize_datetime_vec, serialize_bigdecimal, serialize_date,
    serialize_datetime, serialize_datetime_vec,
};
use crate::terms::PaymentTerms;
use crate::totals::DiscountType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: String,
    pub service: String,
    pub description: Option<String>,
    #[serde(
        serialize_with = "serialize_datetime_vec",
        deserialize_with = "deserialize_datetime_vec"
    )]
    pub dates: Vec<DateTime<FixedOffset>>,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub quantity: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub rate: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub total: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRow {
    pub id: Option<i64>,
    #[serde(rename = "businessname")]
    pub business_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub abn: Option<String>,
    #[serde(rename = "logourl")]
    pub logo_url: Option<String>,
    #[serde(rename = "bankaccountnumber")]
    pub bank_account_number: Option<String>,
    #[serde(rename = "bankbsb")]
    pub bank_bsb: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRow {
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRow {
    pub id: String,
    #[serde(rename = "invoicenumber")]
    pub invoice_number: String,
    #[serde(
        rename = "issuedate",
        serialize_with = "serialize_date",
        deserialize_with = "deserialize_date"
    )]
    pub issue_date: NaiveDate,
    #[serde(
        rename = "duedate",
        serialize_with = "serialize_date",
        deserialize_with = "deserialize_date"
    )]
    pub due_date: NaiveDate,
    #[serde(rename = "paymentterms")]
    pub payment_terms: PaymentTerms,
    pub status: InvoiceStatus,
    #[serde(rename = "businessinfo")]
    pub business_info: BusinessRow,
    #[serde(rename = "clientinfo")]
    pub client_info: ClientRow,
    pub items: Vec<ItemRow>,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub subtotal: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub discount: BigDecimal,
    #[serde(rename = "discounttype")]
    pub discount_type: DiscountType,
    #[serde(rename = "gstenabled")]
    pub gst_enabled: bool,
    #[serde(
        rename = "gstrate",
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub gst_rate: BigDecimal,
    #[serde(
        rename = "gstamount",
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub gst_amount: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub total: BigDecimal,
    pub notes: Option<String>,
    #[serde(
        rename = "createdat",
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime"
    )]
    pub created_at: DateTime<FixedOffset>,
    #[serde(
        rename = "updatedat",
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime"
    )]
    pub updated_at: DateTime<FixedOffset>,
}

impl From<&ServiceItem> for ItemRow {
    fn from(item: &ServiceItem) -> Self {
        ItemRow {
            id: item.id().to_string(),
            service: item.service().to_string(),
            description: item.description().map(str::to_string),
            dates: item.dates().to_vec(),
            quantity: item.quantity().clone(),
            rate: item.rate().clone(),
            total: item.total().clone(),
        }
    }
}

impl From<&BusinessInfo> for BusinessRow {
    fn from(info: &BusinessInfo) -> Self {
        BusinessRow {
            id: info.id(),
            business_name: info.business_name().to_string(),
            email: info.email().to_string(),
            phone: info.phone().to_string(),
            address: info.address().to_string(),
            abn: info.abn().map(str::to_string),
            logo_url: info.logo_url().map(str::to_string),
            bank_account_number: info.bank_account_number().map(str::to_string),
            bank_bsb: info.bank_bsb().map(str::to_string),
        }
    }
}

impl From<&ClientInfo> for ClientRow {
    fn from(info: &ClientInfo) -> Self {
        ClientRow {
            id: info.id().map(str::to_string),
            name: info.name().to_string(),
            email: info.email().to_string(),
            phone: info.phone().to_string(),
            address: info.address().to_string(),
        }
    }
}

impl From<&Invoice> for InvoiceRow {
    fn from(invoice: &Invoice) -> Self {
        InvoiceRow {
            id: invoice.id().to_string(),
            invoice_number: invoice.invoice_number().to_string(),
            issue_date: invoice.issue_date(),
            due_date: invoice.due_date(),
            payment_terms: invoice.payment_terms(),
            status: invoice.status(),
            business_info: invoice.business_info().into(),
            client_info: invoice.client_info().into(),
            items: invoice.items().iter().map(ItemRow::from).collect(),
            subtotal: invoice.subtotal().clone(),
            discount: invoice.discount().clone(),
            discount_type: invoice.discount_type(),
            gst_enabled: invoice.gst_enabled(),
            gst_rate: invoice.gst_rate().clone(),
            gst_amount: invoice.gst_amount().clone(),
            total: invoice.total().clone(),
            notes: invoice.notes().map(str::to_string),
            created_at: invoice.created_at(),
            updated_at: invoice.updated_at(),
        }
    }
}

impl ItemRow {
    pub fn into_item(self) -> Result<ServiceItem, Error> {
        let mut builder = ServiceItemBuilder::default()
            .id(self.id)
            .service(self.service)
            .dates(self.dates)
            .quantity(self.quantity)
            .rate(self.rate)
            .total(self.total);
        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        builder
            .build()
            .map_err(|e| Error::from(e.to_string()))
            .add_context("rebuilding service item from stored row")
    }
}

impl BusinessRow {
    pub fn into_business(self) -> Result<BusinessInfo, Error> {
        let mut builder = BusinessInfoBuilder::default()
            .business_name(self.business_name)
            .email(self.email)
            .phone(self.phone)
            .address(self.address);
        if let Some(id) = self.id {
            builder = builder.id(id);
        }
        if let Some(abn) = self.abn {
            builder = builder.abn(abn);
        }
        if let Some(logo_url) = self.logo_url {
            builder = builder.logo_url(logo_url);
        }
        if let Some(account) = self.bank_account_number {
            builder = builder.bank_account_number(account);
        }
        if let Some(bsb) = self.bank_bsb {
            builder = builder.bank_bsb(bsb);
        }
        builder
            .build()
            .map_err(|e| Error::from(e.to_string()))
            .add_context("rebuilding business info from stored row")
    }
}

impl ClientRow {
    pub fn into_client(self) -> Result<ClientInfo, Error> {
        let mut builder = ClientInfoBuilder::default()
            .name(self.name)
            .email(self.email)
            .phone(self.phone)
            .address(self.address);
        if let Some(id) = self.id {
            builder = builder.id(id);
        }
        builder
            .build()
            .map_err(|e| Error::from(e.to_string()))
            .add_context("rebuilding client info from stored row")
    }
}

impl InvoiceRow {
    /// Rebuild the in-memory invoice, preserving every stored field verbatim.
    /// Derived financial fields are deliberately not recomputed here so a
    /// fetched record compares equal to what was saved.
    pub fn into_invoice(self) -> Result<Invoice, Error> {
        let items = self
            .items
            .into_iter()
            .map(ItemRow::into_item)
            .collect::<Result<Vec<_>, _>>()?;
        let mut builder = InvoiceBuilder::default()
            .id(self.id)
            .invoice_number(self.invoice_number)
            .issue_date(self.issue_date)
            .due_date(self.due_date)
            .payment_terms(self.payment_terms)
            .status(self.status)
            .business_info(self.business_info.into_business()?)
            .client_info(self.client_info.into_client()?)
            .items(items)
            .subtotal(self.subtotal)
            .discount(self.discount)
            .discount_type(self.discount_type)
            .gst_enabled(self.gst_enabled)
            .gst_rate(self.gst_rate)
            .gst_amount(self.gst_amount)
            .total(self.total)
            .created_at(self.created_at)
            .updated_at(self.updated_at);
        if let Some(notes) = self.notes {
            builder = builder.notes(notes);
        }
        builder
            .build()
            .map_err(|e| Error::from(e.to_string()))
            .add_context("rebuilding invoice from stored row")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceBuilder;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn sample_invoice() -> Invoice {
        let visit = chrono::Utc
            .with_ymd_and_hms(2024, 1, 12, 9, 0, 0)
            .unwrap()
            .into();
        let business = BusinessInfoBuilder::default()
            .business_name("Mazzari Landscape Management")
            .email("info@mazzarilandscape.com.au")
            .abn("12 345 678 901")
            .bank_bsb("062-000")
            .build()
            .unwrap();
        let client = ClientInfoBuilder::default()
            .name("Jacaranda Body Corporate")
            .email("strata@example.com")
            .build()
            .unwrap();
        let item = ServiceItemBuilder::default()
            .service("Lawn Maintanance")
            .description("Front and rear lawns")
            .dates(vec![visit])
            .quantity(2)
            .rate(BigDecimal::from_str("180").unwrap())
            .build()
            .unwrap();
        InvoiceBuilder::default()
            .business_info(business)
            .client_info(client)
            .issue_date(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap())
            .add_item(item)
            .discount(BigDecimal::from(10))
            .notes("mow before 3pm")
            .finish()
            .unwrap()
    }

    #[test]
    fn wire_keys_are_bare_lowercase() {
        let row = InvoiceRow::from(&sample_invoice());
        let json = serde_json::to_value(&row).unwrap();
        let object = json.as_object().unwrap();
        for key in [
            "invoicenumber",
            "issuedate",
            "duedate",
            "paymentterms",
            "businessinfo",
            "clientinfo",
            "discounttype",
            "gstenabled",
            "gstrate",
            "gstamount",
            "createdat",
            "updatedat",
        ] {
            assert!(object.contains_key(key), "missing wire key {key}");
        }
        assert!(!object.contains_key("invoice_number"));

        let business = object.get("businessinfo").unwrap().as_object().unwrap();
        assert!(business.contains_key("businessname"));
        assert!(business.contains_key("bankbsb"));
    }

    #[test]
    fn row_round_trip_is_lossless() {
        let invoice = sample_invoice();
        let json = serde_json::to_string(&InvoiceRow::from(&invoice)).unwrap();
        let row: InvoiceRow = serde_json::from_str(&json).unwrap();
        let back = row.into_invoice().unwrap();

        assert_eq!(back.id(), invoice.id());
        assert_eq!(back.invoice_number(), invoice.invoice_number());
        assert_eq!(back.issue_date(), invoice.issue_date());
        assert_eq!(back.due_date(), invoice.due_date());
        assert_eq!(back.payment_terms(), invoice.payment_terms());
        assert_eq!(back.status(), invoice.status());
        assert_eq!(back.subtotal(), invoice.subtotal());
        assert_eq!(back.discount(), invoice.discount());
        assert_eq!(back.gst_amount(), invoice.gst_amount());
        assert_eq!(back.total(), invoice.total());
        assert_eq!(back.notes(), invoice.notes());
        assert_eq!(back.created_at(), invoice.created_at());
        assert_eq!(
            back.business_info().business_name(),
            invoice.business_info().business_name()
        );
        assert_eq!(back.business_info().abn(), invoice.business_info().abn());
        assert_eq!(back.client_info().name(), invoice.client_info().name());

        let item = &back.items()[0];
        let original = &invoice.items()[0];
        assert_eq!(item.id(), original.id());
        assert_eq!(item.dates(), original.dates());
        assert_eq!(item.quantity(), original.quantity());
        assert_eq!(item.rate(), original.rate());
        assert_eq!(item.total(), original.total());
    }
}
