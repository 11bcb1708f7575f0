//! Cached invoice repository.
//!
//! The application-facing seam over an [`InvoiceStore`]: it validates before
//! persisting, re-derives financial fields on every save, and keeps an
//! explicit in-memory cache of the invoice list with a `refresh` operation.
//! The cache is only mutated after the underlying store has accepted the
//! change, so a failed operation never leaves phantom state behind.

use tracing::info;

use crate::catalog::default_business_info;
use crate::error::{AddContext, Error};
use crate::invoice::{BusinessInfo, Invoice, InvoiceStatus};
use crate::store::InvoiceStore;

/// Check an invoice is complete enough to persist. Raised failures are
/// user-facing notices; nothing is written when validation fails.
pub fn validate_for_save(invoice: &Invoice) -> Result<(), Error> {
    if invoice.client_info().name().trim().is_empty() {
        return Err(Error::validation("missing client name: please enter a client name"));
    }
    if invoice.items().is_empty() {
        return Err(Error::validation(
            "no services added: please add at least one service to the invoice",
        ));
    }
    Ok(())
}

pub struct InvoiceRepository {
    store: Box<dyn InvoiceStore>,
    cache: Vec<Invoice>,
}

impl InvoiceRepository {
    pub fn new(store: Box<dyn InvoiceStore>) -> Self {
        InvoiceRepository {
            store,
            cache: Vec::new(),
        }
    }

    /// The invoice list as of the last refresh or mutation.
    pub fn invoices(&self) -> &[Invoice] {
        &self.cache
    }

    /// Reload the cache from the store.
    pub async fn refresh(&mut self) -> Result<&[Invoice], Error> {
        self.cache = self
            .store
            .fetch_all()
            .await
            .add_context("refreshing invoice list")?;
        Ok(&self.cache)
    }

    /// Validate, re-derive financial fields, stamp `updated_at`, and persist.
    /// Returns the invoice as saved.
    pub async fn save(&mut self, mut invoice: Invoice) -> Result<Invoice, Error> {
        validate_for_save(&invoice).add_context("saving invoice")?;
        invoice.recompute_totals();
        invoice.touch();
        self.store
            .upsert(&invoice)
            .await
            .add_context("saving invoice")?;
        match self.cache.iter().position(|inv| inv.id() == invoice.id()) {
            Some(index) => self.cache[index] = invoice.clone(),
            None => self.cache.insert(0, invoice.clone()),
        }
        info!(invoice_id = %invoice.id(), number = %invoice.invoice_number(), "invoice saved");
        Ok(invoice)
    }

    /// Fetch one invoice straight from the store.
    pub async fn fetch(&self, id: &str) -> Result<Option<Invoice>, Error> {
        self.store.fetch_one(id).await
    }

    /// Hard-delete an invoice. Returns whether a record was removed.
    pub async fn delete(&mut self, id: &str) -> Result<bool, Error> {
        let removed = self
            .store
            .delete(id)
            .await
            .add_context("deleting invoice")?;
        if removed {
            self.cache.retain(|inv| inv.id() != id);
            info!(invoice_id = %id, "invoice deleted");
        }
        Ok(removed)
    }

    /// Filter the cached list by invoice number, client name, or client
    /// email. A blank query returns everything.
    pub fn search(&self, query: &str) -> Vec<&Invoice> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.cache.iter().collect();
        }
        self.cache
            .iter()
            .filter(|inv| {
                inv.invoice_number().to_lowercase().contains(&needle)
                    || inv.client_info().name().to_lowercase().contains(&needle)
                    || inv.client_info().email().to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Set the status of a stored invoice. Any transition is permitted; the
    /// usual flow is draft -> sent -> paid.
    pub async fn update_status(
        &mut self,
        id: &str,
        status: InvoiceStatus,
    ) -> Result<Invoice, Error> {
        let mut invoice = self
            .store
            .fetch_one(id)
            .await
            .add_context("updating invoice status")?
            .ok_or_else(|| {
                Error::from(format!("no invoice with id '{id}'"))
                    .add_context("updating invoice status")
            })?;
        invoice.set_status(status);
        invoice.touch();
        self.store
            .upsert(&invoice)
            .await
            .add_context("updating invoice status")?;
        if let Some(index) = self.cache.iter().position(|inv| inv.id() == id) {
            self.cache[index] = invoice.clone();
        }
        info!(invoice_id = %id, status = status.as_str(), "invoice status updated");
        Ok(invoice)
    }

    /// Advance an invoice to `sent`. Only called after dispatch succeeded.
    pub async fn mark_sent(&mut self, id: &str) -> Result<Invoice, Error> {
        self.update_status(id, InvoiceStatus::Sent).await
    }

    /// The business record, falling back to the built-in default when none
    /// has been saved yet.
    pub async fn business_info(&self) -> Result<BusinessInfo, Error> {
        match self
            .store
            .fetch_business()
            .await
            .add_context("loading business info")?
        {
            Some(info) => Ok(info),
            None => default_business_info()
                .map_err(|e| Error::from(e.to_string()))
                .add_context("loading business info"),
        }
    }

    pub async fn save_business(&self, info: &BusinessInfo) -> Result<(), Error> {
        self.store.save_business(info).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{ClientInfoBuilder, InvoiceBuilder, ServiceItemBuilder};
    use crate::store::FileStore;
    use bigdecimal::BigDecimal;

    fn repo(dir: &std::path::Path) -> InvoiceRepository {
        InvoiceRepository::new(Box::new(FileStore::new(dir)))
    }

    fn draft(client: &str) -> Invoice {
        InvoiceBuilder::default()
            .business_info(default_business_info().unwrap())
            .client_info(
                ClientInfoBuilder::default()
                    .name(client)
                    .email(format!("{}@example.com", client.to_lowercase()))
                    .build()
                    .unwrap(),
            )
            .add_item(
                ServiceItemBuilder::default()
                    .service("Weeding")
                    .quantity(2)
                    .rate(55)
                    .build()
                    .unwrap(),
            )
            .finish()
            .unwrap()
    }

    #[tokio::test]
    async fn save_rejects_incomplete_invoices_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = repo(dir.path());

        let no_client = InvoiceBuilder::default()
            .business_info(default_business_info().unwrap())
            .client_info(ClientInfoBuilder::default().name("  ").build().unwrap())
            .add_item(
                ServiceItemBuilder::default()
                    .service("Weeding")
                    .quantity(1)
                    .rate(55)
                    .build()
                    .unwrap(),
            )
            .finish()
            .unwrap();
        let err = repo.save(no_client).await.unwrap_err();
        assert!(err.is_validation());

        let no_items = InvoiceBuilder::default()
            .business_info(default_business_info().unwrap())
            .client_info(ClientInfoBuilder::default().name("C").build().unwrap())
            .finish()
            .unwrap();
        let err = repo.save(no_items).await.unwrap_err();
        assert!(err.is_validation());

        repo.refresh().await.unwrap();
        assert!(repo.invoices().is_empty());
    }

    #[tokio::test]
    async fn save_rederives_stale_financial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = repo(dir.path());

        // build() without finish() leaves the derived fields at their zero
        // defaults; save must repair them
        let stale = InvoiceBuilder::default()
            .business_info(default_business_info().unwrap())
            .client_info(ClientInfoBuilder::default().name("C").build().unwrap())
            .add_item(
                ServiceItemBuilder::default()
                    .service("Mulching")
                    .quantity(2)
                    .rate(95)
                    .build()
                    .unwrap(),
            )
            .gst_enabled(false)
            .build()
            .unwrap();
        assert_eq!(stale.total(), &BigDecimal::from(0));

        let saved = repo.save(stale).await.unwrap();
        assert_eq!(saved.subtotal(), &BigDecimal::from(190));
        assert_eq!(saved.total(), &BigDecimal::from(190));

        let fetched = repo.fetch(saved.id()).await.unwrap().unwrap();
        assert_eq!(fetched.total(), &BigDecimal::from(190));
    }

    #[tokio::test]
    async fn cache_tracks_saves_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = repo(dir.path());

        let first = repo.save(draft("First")).await.unwrap();
        let second = repo.save(draft("Second")).await.unwrap();
        assert_eq!(repo.invoices().len(), 2);
        assert_eq!(repo.invoices()[0].id(), second.id());

        assert!(repo.delete(first.id()).await.unwrap());
        assert_eq!(repo.invoices().len(), 1);
        assert!(!repo.delete(first.id()).await.unwrap());
    }

    #[tokio::test]
    async fn search_matches_number_name_and_email() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = repo(dir.path());

        let saved = repo.save(draft("Jacaranda")).await.unwrap();
        repo.save(draft("Banksia")).await.unwrap();

        assert_eq!(repo.search("jacaranda").len(), 1);
        assert_eq!(repo.search("banksia@example.com").len(), 1);
        assert_eq!(repo.search(saved.invoice_number()).len(), 1);
        assert_eq!(repo.search("   ").len(), 2);
        assert!(repo.search("wattle").is_empty());
    }

    #[tokio::test]
    async fn status_updates_follow_the_normal_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = repo(dir.path());

        let saved = repo.save(draft("Client")).await.unwrap();
        assert_eq!(saved.status(), InvoiceStatus::Draft);

        let sent = repo.mark_sent(saved.id()).await.unwrap();
        assert_eq!(sent.status(), InvoiceStatus::Sent);

        let paid = repo
            .update_status(saved.id(), InvoiceStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.status(), InvoiceStatus::Paid);
        assert_eq!(repo.invoices()[0].status(), InvoiceStatus::Paid);

        let err = repo.mark_sent("missing-id").await.unwrap_err();
        assert!(!err.is_validation());
    }

    #[tokio::test]
    async fn business_info_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let info = repo.business_info().await.unwrap();
        assert_eq!(info.business_name(), "Mazzari Landscape Management");
    }
}
