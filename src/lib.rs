//! Invoicing toolkit for a small landscaping business.
//!
//! This crate covers the full life of an invoice: building and editing the
//! record (totals and due dates are derived, never hand-maintained),
//! persisting it through a narrow store contract (hosted relational backend
//! or local fallback), rendering it to a fixed-size A4 PDF through a
//! connection to headless chrome(ium), and emailing the result through a
//! mail relay.
//!
//! # Example
//!
//! ```rust
//! use invoice_kit::{
//!     BusinessInfoBuilder, ClientInfoBuilder, InvoiceBuilder, ServiceItemBuilder, generate_pdf,
//! };
//!
//! let inv = InvoiceBuilder::default()
//!     .business_info(
//!         BusinessInfoBuilder::default()
//!             .business_name("Mazzari Landscape Management")
//!             .email("info@mazzarilandscape.com.au")
//!             .build().unwrap())
//!     .client_info(
//!         ClientInfoBuilder::default()
//!             .name("Jacaranda Body Corporate")
//!             .email("strata@example.com")
//!             .build().unwrap())
//!     .add_item(
//!         ServiceItemBuilder::default()
//!             .service("Lawn Maintanance")
//!             .quantity(2)
//!             .rate(180)
//!             .build().unwrap())
//!     .finish().unwrap();
//! let _ = generate_pdf(&inv, "http://localhost:4444");
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod invoice;
pub mod mail;
pub mod repository;
pub mod row;
pub mod store;
pub mod template_env;
pub mod terms;
pub mod totals;

use std::{
    net::TcpListener,
    process::{Child, Command, Stdio},
    thread,
    time::Duration,
};

use base64::{Engine, engine::general_purpose};
pub use config::AppConfig;
pub use error::Error;
pub use invoice::{
    BusinessInfo, BusinessInfoBuilder, BusinessInfoBuilderError, ClientInfo, ClientInfoBuilder,
    ClientInfoBuilderError, Invoice, InvoiceBuilder, InvoiceBuilderError, InvoiceStatus,
    ServiceItem, ServiceItemBuilder, ServiceItemBuilderError, generate_id,
    generate_invoice_number,
};
pub use mail::{Attachment, MailRelay, send_invoices};
pub use repository::{InvoiceRepository, validate_for_save};
pub use store::{FileStore, InvoiceStore, RestStore};
pub use terms::{PaymentTerms, resolve_due_date};
pub use totals::{DiscountType, InvoiceTotals, compute_totals, format_currency};

use error::AddContext;
use fantoccini::{
    Client, ClientBuilder,
    wd::{PrintConfigurationBuilder, PrintMargins, PrintSize},
};
use serde_json::Map;
use tracing::warn;

use crate::template_env::{render_template, setup_template_env};

/// Page margin on all four sides of the printed A4 page, in centimeters.
const PAGE_MARGIN_CM: f64 = 1.0;

/// Async script handed to the renderer: resolves once every requested font
/// face has settled, so pages are never sampled mid font swap.
const FONTS_READY_SCRIPT: &str =
    "const done = arguments[arguments.length - 1]; document.fonts.ready.then(() => done(true));";

/// Starts ChromeDriver as a child process on the given port
///
/// # Returns
/// - [`Child`] if ChromeDriver successfully starts and the port is available
///
/// # Errors
/// - [`crate::Error`] if the chromedriver binary is not in the path, or if the port is not
/// available, or if the chromedriver process fails to start for any other reason
pub fn start_chromedriver(port: u16) -> Result<Child, crate::Error> {
    if is_port_in_use(port) {
        return Err(
            crate::Error::from(format!("Port {port} is already in use"))
                .add_context("starting chromedriver"),
        );
    }

    let mut child = Command::new("chromedriver")
        .arg(format!("--port={port}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    for _ in 0..100 {
        if is_port_in_use(port) {
            return Ok(child);
        }

        if child
            .try_wait()
            .map_err(crate::Error::from)
            .add_context("starting chromedriver")?
            .is_some()
        {
            return Err(
                crate::Error::from(String::from("Chromedriver has stopped unexpectedly"))
                    .add_context("starting chromedriver"),
            )?;
        }

        thread::sleep(Duration::from_millis(10));
    }

    // Double-check port is now in use
    if !is_port_in_use(port) {
        // Kill the child process if it didn't bind to the port
        child.kill()?;
        return Err(
            crate::Error::from(format!("Chromedriver failed to bind to port {port}"))
                .add_context("starting chromedriver"),
        )?;
    }

    Ok(child)
}

/// Check if a given port is currently in use
///
/// # Arguments
/// - `port` The port number to check
///
/// # Returns
/// - `true` if the TCP port is currently on use on the localhost
/// - `false` if the TCP port is not being used on localhost
fn is_port_in_use(port: u16) -> bool {
    TcpListener::bind(format!("localhost:{port}")).is_err()
}

async fn connect_to_client(
    webdriver_url: &str,
) -> Result<Client, fantoccini::error::NewSessionError> {
    let mut caps = Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        serde_json::json!({
            "args": ["--headless"]
        }),
    );
    ClientBuilder::native()
        .capabilities(caps)
        .connect(webdriver_url)
        .await
}

/// Generate a PDF byte array from [`Invoice`]
///
/// This function renders an HTML document from the provided [`Invoice`],
/// hosts it off-screen in a dedicated headless browser session, waits for
/// font loading to settle, and prints the page(s) at A4 with a fixed margin.
/// Items overflowing one page paginate onto further pages. The browser
/// session is exclusively owned by this invocation and is closed on every
/// exit path, including failures.
///
/// # Arguments
///
/// - `invoice`: Reference to the [`Invoice`] to render and print.
/// - `webdriver_url`: Address of the WebDriver endpoint to render through.
///
/// # Returns
///
/// - The byte array representing the PDF if successful
///
/// # Errors
///
/// Returns `Err(crate::Error)` if any step fails:
/// - connecting to the headless browser [`Client`]
/// - setting up the templating environment
/// - rendering the HTML template
/// - navigating the browser to the generated data URL
/// - waiting for fonts to settle
/// - configuring the print job or printing to PDF
pub async fn generate_pdf(invoice: &Invoice, webdriver_url: &str) -> Result<Vec<u8>, crate::Error> {
    let client = connect_to_client(webdriver_url)
        .await
        .map_err(crate::Error::from)
        .add_context("connecting to client")
        .add_context("generating pdf")?;
    let result = print_to_pdf(&client, invoice).await;
    // the off-screen host is torn down whether printing succeeded or not
    if let Err(close_err) = client.close().await {
        warn!(error = %close_err, "failed to close renderer session");
    }
    result
}

async fn print_to_pdf(client: &Client, invoice: &Invoice) -> Result<Vec<u8>, crate::Error> {
    let template_env = setup_template_env()
        .map_err(crate::Error::from)
        .add_context("setting up templating environment")
        .add_context("generating pdf")?;
    let render = render_template(&template_env, invoice)
        .map_err(crate::Error::from)
        .add_context("rendering html template")
        .add_context("generating pdf")?;
    let encoded = general_purpose::STANDARD.encode(render.as_bytes());
    let data_url = format!("data:text/html;base64,{encoded}");
    client
        .goto(&data_url)
        .await
        .map_err(crate::Error::from)
        .add_context("navigating to address")
        .add_context("printing pdf")?;
    client
        .execute_async(FONTS_READY_SCRIPT, vec![])
        .await
        .map_err(crate::Error::from)
        .add_context("waiting for fonts to settle")
        .add_context("printing pdf")?;
    Ok(client
        .print(
            PrintConfigurationBuilder::default()
                .margins(PrintMargins {
                    top: PAGE_MARGIN_CM,
                    left: PAGE_MARGIN_CM,
                    right: PAGE_MARGIN_CM,
                    bottom: PAGE_MARGIN_CM,
                })
                .size(PrintSize::A4)
                .build()
                .map_err(crate::Error::from)
                .add_context("configuring printer")
                .add_context("printing pdf")?,
        )
        .await
        .map_err(crate::Error::from)
        .add_context("printing pdf")?)
}

#[cfg(test)]
mod tests {
    use std::{process::Command, thread::sleep, time::Duration};

    use super::*;
    use crate::catalog::default_business_info;
    use crate::invoice::ClientInfoBuilder;

    fn sample_invoice() -> Invoice {
        InvoiceBuilder::default()
            .business_info(default_business_info().unwrap())
            .client_info(
                ClientInfoBuilder::default()
                    .name("receiver")
                    .build()
                    .unwrap(),
            )
            .add_item(
                ServiceItemBuilder::default()
                    .service("this is a test")
                    .quantity(2)
                    .rate(10)
                    .build()
                    .unwrap(),
            )
            .add_item(
                ServiceItemBuilder::default()
                    .service("this is a test")
                    .quantity(1)
                    .rate(10)
                    .build()
                    .unwrap(),
            )
            .finish()
            .unwrap()
    }

    #[tokio::test]
    async fn unreachable_renderer_fails_without_leaking_a_session() {
        // nothing listens on port 1; the export must fail as a render error
        // rather than hang or panic
        let err = generate_pdf(&sample_invoice(), "http://localhost:1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("generating pdf"));
    }

    #[tokio::test]
    #[ignore = "requires chromedriver on PATH"]
    async fn test_generate_pdf() {
        let mut c = Command::new("chromedriver")
            .arg("--port=4444")
            .spawn()
            .unwrap();
        sleep(Duration::from_secs(1));
        let v = generate_pdf(&sample_invoice(), "http://localhost:4444")
            .await
            .unwrap();
        assert!(v.len() > 0);
        c.kill().unwrap();
    }
}
