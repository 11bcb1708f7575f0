//! Mail dispatch through the relay endpoint.
//!
//! The relay accepts a multipart POST with `to` and `body` text fields, an
//! optional `subject`, and any number of PDF attachments under the `files`
//! field. It answers 2xx with a message id, or an error object with a
//! human-readable detail string. Invoice statuses are only advanced to
//! `sent` after the relay has accepted the message.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{error, info};

use crate::error::{AddContext, Error};
use crate::generate_pdf;
use crate::repository::InvoiceRepository;

const SEND_PATH: &str = "/api/send-invoices";

/// One named binary attachment.
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct SendReceipt {
    #[serde(rename = "messageId")]
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct RelayFailure {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

/// Turn a non-2xx relay response body into the detail string shown to the
/// user. The relay answers JSON `{error, details}`; anything else is passed
/// through raw.
fn relay_error_detail(body: &str) -> String {
    match serde_json::from_str::<RelayFailure>(body) {
        Ok(failure) => match failure.details {
            Some(details) => format!("{} ({details})", failure.error),
            None => failure.error,
        },
        Err(_) => body.to_string(),
    }
}

/// Client for the mail relay endpoint.
pub struct MailRelay {
    http: reqwest::Client,
    base_url: String,
}

impl MailRelay {
    pub fn new(base_url: &str) -> Self {
        MailRelay {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send one message with the given attachments. Returns the relay's
    /// message id on success.
    pub async fn send(
        &self,
        to: &str,
        body: &str,
        subject: Option<&str>,
        attachments: Vec<Attachment>,
    ) -> Result<String, Error> {
        let mut form = Form::new()
            .text("to", to.to_string())
            .text("body", body.to_string());
        if let Some(subject) = subject {
            form = form.text("subject", subject.to_string());
        }
        for attachment in attachments {
            let part = Part::bytes(attachment.bytes)
                .file_name(attachment.name)
                .mime_str("application/pdf")
                .map_err(Error::from)
                .add_context("preparing pdf attachment")
                .add_context("sending invoice email")?;
            form = form.part("files", part);
        }

        let response = self
            .http
            .post(format!("{}{SEND_PATH}", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(Error::from)
            .add_context("posting to mail relay")
            .add_context("sending invoice email")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = relay_error_detail(&body);
            error!(%status, detail = %detail, "mail relay rejected the message");
            return Err(Error::from(format!("mail relay answered {status}: {detail}"))
                .add_context("sending invoice email"));
        }

        let receipt: SendReceipt = response
            .json()
            .await
            .map_err(Error::from)
            .add_context("decoding mail relay response")
            .add_context("sending invoice email")?;
        info!(message_id = %receipt.message_id, "invoice email accepted by relay");
        Ok(receipt.message_id)
    }
}

/// Export each selected invoice to PDF, send them all as one message, and —
/// only once the relay has accepted it — advance each invoice to `sent`.
/// If dispatch fails every invoice keeps its previous status.
pub async fn send_invoices(
    relay: &MailRelay,
    repo: &mut InvoiceRepository,
    webdriver_url: &str,
    to: &str,
    body: &str,
    subject: Option<&str>,
    ids: &[String],
) -> Result<String, Error> {
    let mut attachments = Vec::with_capacity(ids.len());
    let mut exported = Vec::with_capacity(ids.len());
    for id in ids {
        let invoice = repo
            .fetch(id)
            .await
            .add_context("sending invoices")?
            .ok_or_else(|| {
                Error::from(format!("no invoice with id '{id}'")).add_context("sending invoices")
            })?;
        let pdf = generate_pdf(&invoice, webdriver_url)
            .await
            .add_context("exporting invoice for email")
            .add_context("sending invoices")?;
        attachments.push(Attachment {
            name: invoice.pdf_filename(),
            bytes: pdf,
        });
        exported.push(invoice.id().to_string());
    }

    let message_id = relay
        .send(to, body, subject, attachments)
        .await
        .add_context("sending invoices")?;

    for id in &exported {
        repo.mark_sent(id).await.add_context("sending invoices")?;
    }
    Ok(message_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_error_detail_reads_json_bodies() {
        assert_eq!(
            relay_error_detail(r#"{"error":"Failed to send email","details":"bad address"}"#),
            "Failed to send email (bad address)"
        );
        assert_eq!(
            relay_error_detail(r#"{"error":"Missing required fields: to, body"}"#),
            "Missing required fields: to, body"
        );
        assert_eq!(relay_error_detail("upstream timeout"), "upstream timeout");
    }

    #[test]
    fn receipt_parses_relay_shape() {
        let receipt: SendReceipt =
            serde_json::from_str(r#"{"success":true,"messageId":"<abc@relay>"}"#).unwrap();
        assert_eq!(receipt.message_id, "<abc@relay>");
    }
}
