//! Invoice record persistence.
//!
//! The core only ever sees the narrow [`InvoiceStore`] contract:
//! upsert/fetch/delete with at-most-one-record-per-id semantics, plus the
//! singleton business-info record. Two implementations are provided — the
//! hosted relational backend spoken to over its REST surface
//! ([`RestStore`]), and a local durable fallback ([`FileStore`]) holding the
//! same records as JSON documents on disk.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::{AddContext, Error};
use crate::invoice::{BUSINESS_INFO_ID, BusinessInfo, Invoice};
use crate::row::{BusinessRow, InvoiceRow};

const INVOICES_TABLE: &str = "invoices";
const BUSINESS_TABLE: &str = "business_info";

/// Narrow persistence contract consumed by the core.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Insert or replace the record with the invoice's id.
    async fn upsert(&self, invoice: &Invoice) -> Result<(), Error>;

    /// Fetch every stored invoice.
    async fn fetch_all(&self) -> Result<Vec<Invoice>, Error>;

    /// Fetch one invoice by id, `None` when absent.
    async fn fetch_one(&self, id: &str) -> Result<Option<Invoice>, Error>;

    /// Delete by id. Returns whether a record was actually removed.
    async fn delete(&self, id: &str) -> Result<bool, Error>;

    /// Fetch the singleton business record, `None` when never saved.
    async fn fetch_business(&self) -> Result<Option<BusinessInfo>, Error>;

    /// Insert or replace the singleton business record.
    async fn save_business(&self, info: &BusinessInfo) -> Result<(), Error>;
}

/// Store backed by the hosted relational backend's REST surface
/// (PostgREST-style: filters in the query string, upserts via
/// `on_conflict` with a merge preference).
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        RestStore {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(Error::from(format!(
            "store returned status {status}: {detail}"
        )))
    }
}

#[async_trait]
impl InvoiceStore for RestStore {
    async fn upsert(&self, invoice: &Invoice) -> Result<(), Error> {
        let rows = vec![InvoiceRow::from(invoice)];
        let response = self
            .request(self.http.post(self.endpoint(INVOICES_TABLE)))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&rows)
            .send()
            .await
            .map_err(Error::from)
            .add_context("upserting invoice")?;
        Self::expect_success(response)
            .await
            .map_err(|e| {
                error!(invoice_id = %invoice.id(), error = %e, "invoice upsert rejected");
                e
            })
            .add_context("upserting invoice")?;
        debug!(invoice_id = %invoice.id(), "invoice upserted");
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<Invoice>, Error> {
        let response = self
            .request(self.http.get(self.endpoint(INVOICES_TABLE)))
            .query(&[("select", "*")])
            .send()
            .await
            .map_err(Error::from)
            .add_context("fetching invoices")?;
        let rows: Vec<InvoiceRow> = Self::expect_success(response)
            .await
            .add_context("fetching invoices")?
            .json()
            .await
            .map_err(Error::from)
            .add_context("decoding invoice rows")
            .add_context("fetching invoices")?;
        rows.into_iter()
            .map(InvoiceRow::into_invoice)
            .collect::<Result<Vec<_>, _>>()
            .add_context("fetching invoices")
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<Invoice>, Error> {
        let filter = format!("eq.{id}");
        let response = self
            .request(self.http.get(self.endpoint(INVOICES_TABLE)))
            .query(&[("select", "*"), ("id", filter.as_str())])
            .send()
            .await
            .map_err(Error::from)
            .add_context("fetching invoice by id")?;
        let rows: Vec<InvoiceRow> = Self::expect_success(response)
            .await
            .add_context("fetching invoice by id")?
            .json()
            .await
            .map_err(Error::from)
            .add_context("decoding invoice row")
            .add_context("fetching invoice by id")?;
        rows.into_iter()
            .next()
            .map(InvoiceRow::into_invoice)
            .transpose()
            .add_context("fetching invoice by id")
    }

    async fn delete(&self, id: &str) -> Result<bool, Error> {
        let filter = format!("eq.{id}");
        let response = self
            .request(self.http.delete(self.endpoint(INVOICES_TABLE)))
            .query(&[("id", filter.as_str())])
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(Error::from)
            .add_context("deleting invoice")?;
        let deleted: Vec<serde_json::Value> = Self::expect_success(response)
            .await
            .add_context("deleting invoice")?
            .json()
            .await
            .map_err(Error::from)
            .add_context("decoding delete response")
            .add_context("deleting invoice")?;
        Ok(!deleted.is_empty())
    }

    async fn fetch_business(&self) -> Result<Option<BusinessInfo>, Error> {
        let filter = format!("eq.{BUSINESS_INFO_ID}");
        let response = self
            .request(self.http.get(self.endpoint(BUSINESS_TABLE)))
            .query(&[("select", "*"), ("id", filter.as_str())])
            .send()
            .await
            .map_err(Error::from)
            .add_context("fetching business info")?;
        let rows: Vec<BusinessRow> = Self::expect_success(response)
            .await
            .add_context("fetching business info")?
            .json()
            .await
            .map_err(Error::from)
            .add_context("decoding business info row")
            .add_context("fetching business info")?;
        rows.into_iter()
            .next()
            .map(BusinessRow::into_business)
            .transpose()
            .add_context("fetching business info")
    }

    async fn save_business(&self, info: &BusinessInfo) -> Result<(), Error> {
        let mut row = BusinessRow::from(info);
        // the business record is a singleton under a fixed id
        row.id = Some(BUSINESS_INFO_ID);
        let response = self
            .request(self.http.post(self.endpoint(BUSINESS_TABLE)))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&vec![row])
            .send()
            .await
            .map_err(Error::from)
            .add_context("saving business info")?;
        Self::expect_success(response)
            .await
            .add_context("saving business info")?;
        Ok(())
    }
}

/// Local durable fallback: the invoice list and the business record each
/// live as one JSON document under the store directory. New invoices are
/// inserted at the front so the list reads newest-first.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    fn invoices_path(&self) -> PathBuf {
        self.dir.join("invoices.json")
    }

    fn business_path(&self) -> PathBuf {
        self.dir.join("business_info.json")
    }

    fn read_list(path: &Path) -> Result<Vec<Invoice>, Error> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(path)
            .map_err(Error::from)
            .add_context("reading invoice list")?;
        serde_json::from_str(&raw)
            .map_err(Error::from)
            .add_context("parsing invoice list")
    }

    fn write_list(&self, invoices: &[Invoice]) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)
            .map_err(Error::from)
            .add_context("creating store directory")?;
        let raw = serde_json::to_string_pretty(invoices)
            .map_err(Error::from)
            .add_context("encoding invoice list")?;
        fs::write(self.invoices_path(), raw)
            .map_err(Error::from)
            .add_context("writing invoice list")
    }
}

#[async_trait]
impl InvoiceStore for FileStore {
    async fn upsert(&self, invoice: &Invoice) -> Result<(), Error> {
        let mut invoices =
            Self::read_list(&self.invoices_path()).add_context("upserting invoice")?;
        match invoices.iter().position(|inv| inv.id() == invoice.id()) {
            Some(index) => invoices[index] = invoice.clone(),
            None => invoices.insert(0, invoice.clone()),
        }
        self.write_list(&invoices).add_context("upserting invoice")
    }

    async fn fetch_all(&self) -> Result<Vec<Invoice>, Error> {
        Self::read_list(&self.invoices_path()).add_context("fetching invoices")
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<Invoice>, Error> {
        let invoices =
            Self::read_list(&self.invoices_path()).add_context("fetching invoice by id")?;
        Ok(invoices.into_iter().find(|inv| inv.id() == id))
    }

    async fn delete(&self, id: &str) -> Result<bool, Error> {
        let mut invoices = Self::read_list(&self.invoices_path()).add_context("deleting invoice")?;
        let before = invoices.len();
        invoices.retain(|inv| inv.id() != id);
        if invoices.len() == before {
            return Ok(false);
        }
        self.write_list(&invoices).add_context("deleting invoice")?;
        Ok(true)
    }

    async fn fetch_business(&self) -> Result<Option<BusinessInfo>, Error> {
        let path = self.business_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .map_err(Error::from)
            .add_context("reading business info")?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(Error::from)
            .add_context("parsing business info")
    }

    async fn save_business(&self, info: &BusinessInfo) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)
            .map_err(Error::from)
            .add_context("creating store directory")?;
        let raw = serde_json::to_string_pretty(info)
            .map_err(Error::from)
            .add_context("encoding business info")?;
        fs::write(self.business_path(), raw)
            .map_err(Error::from)
            .add_context("saving business info")
    }
}
