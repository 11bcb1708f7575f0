use std::{io::Write, path::PathBuf, process::Child};

use clap::Parser;
use invoice_kit::{
    AppConfig, ClientInfoBuilder, FileStore, Invoice, InvoiceBuilder, InvoiceRepository,
    InvoiceStore, MailRelay, RestStore, ServiceItemBuilder, catalog, error::AddContext,
    generate_pdf, send_invoices, start_chromedriver,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

mod cli;

fn kill_chrome(chrome_process: &mut Child) -> Result<(), invoice_kit::Error> {
    chrome_process
        .kill()
        .map_err(invoice_kit::Error::from)
        .add_context("killing chromedriver process from cli")?;
    Ok(())
}

fn open_repository(config: &AppConfig) -> InvoiceRepository {
    let store: Box<dyn InvoiceStore> = if config.has_remote_store() {
        Box::new(RestStore::new(&config.store.base_url, &config.store.api_key))
    } else {
        Box::new(FileStore::new(config.store.fallback_dir.clone()))
    };
    InvoiceRepository::new(store)
}

async fn write_invoice_pdf(
    invoice: &Invoice,
    out: &Option<PathBuf>,
    webdriver_url: &str,
) -> Result<(), invoice_kit::Error> {
    let data = generate_pdf(invoice, webdriver_url)
        .await
        .add_context("generating pdf data from invoice")
        .add_context(&format!("invoice id: {}", invoice.id()))?;
    match out {
        Some(out) => {
            let path = out.join(invoice.pdf_filename());
            if std::fs::write(&path, data).is_err() {
                eprintln!(
                    "Failed to write invoice '{}' to '{}'",
                    invoice.id(),
                    &path.to_string_lossy()
                );
                write_invoice_pdf_to_stdout(invoice, webdriver_url).await
            } else {
                info!(path = %path.to_string_lossy(), "invoice pdf written");
                Ok(())
            }
        }
        None => write_invoice_pdf_to_stdout(invoice, webdriver_url).await,
    }
}

async fn write_invoice_pdf_to_stdout(
    invoice: &Invoice,
    webdriver_url: &str,
) -> Result<(), invoice_kit::Error> {
    let buf = generate_pdf(invoice, webdriver_url)
        .await
        .add_context("generating invoice pdf")
        .add_context("printing to stdout")?;
    std::io::stdout()
        .write_all(&buf)
        .map_err(invoice_kit::Error::from)
        .add_context("writing invoice pdf to stdout")?;
    std::io::stdout()
        .flush()
        .map_err(invoice_kit::Error::from)
        .add_context("flushing stdout")
        .add_context("printing to stdout")?;
    Ok(())
}

async fn run_render(
    data: &Option<PathBuf>,
    out: &Option<PathBuf>,
    config: &AppConfig,
) -> Result<(), invoice_kit::Error> {
    let invoices = cli::load_invoices(data).add_context("deserializing invoices from cli")?;
    for invoice in &invoices {
        write_invoice_pdf(invoice, out, &config.render.webdriver_url).await?;
    }
    Ok(())
}

async fn run_send(
    data: &Option<PathBuf>,
    to: &str,
    body: &str,
    subject: Option<&str>,
    config: &AppConfig,
) -> Result<(), invoice_kit::Error> {
    let invoices = cli::load_invoices(data).add_context("deserializing invoices from cli")?;
    let mut repo = open_repository(config);
    let mut ids = Vec::with_capacity(invoices.len());
    for invoice in invoices {
        let saved = repo.save(invoice).await?;
        ids.push(saved.id().to_string());
    }

    let relay = MailRelay::new(&config.mail.relay_url);
    let message_id = send_invoices(
        &relay,
        &mut repo,
        &config.render.webdriver_url,
        to,
        body,
        subject,
        &ids,
    )
    .await?;
    println!("sent {} invoice(s), message id {message_id}", ids.len());
    Ok(())
}

fn sample_invoices() -> Result<Vec<Invoice>, invoice_kit::Error> {
    let business = catalog::default_business_info()
        .map_err(|e| invoice_kit::Error::from(e.to_string()))
        .add_context("building sample business info")?;
    let client = ClientInfoBuilder::default()
        .name("Sample Body Corporate")
        .email("strata@example.com")
        .phone("0400 111 222")
        .address("1 Example St, Brisbane QLD 4131")
        .build()
        .map_err(|e| invoice_kit::Error::from(e.to_string()))
        .add_context("building sample client info")?;

    let mut builder = InvoiceBuilder::default()
        .business_info(business)
        .client_info(client)
        .notes("Thank you for your business");
    for (entry, quantity) in catalog::DEFAULT_SERVICES.iter().zip([2, 1]) {
        let item = ServiceItemBuilder::default()
            .service(entry.service)
            .description(entry.description)
            .quantity(quantity)
            .rate(entry.rate())
            .build()
            .map_err(|e| invoice_kit::Error::from(e.to_string()))
            .add_context("building sample service item")?;
        builder = builder.add_item(item);
    }
    let invoice = builder
        .finish()
        .map_err(|e| invoice_kit::Error::from(e.to_string()))
        .add_context("building sample invoice")?;
    Ok(vec![invoice])
}

fn run_sample() -> Result<(), invoice_kit::Error> {
    let invoices = sample_invoices()?;
    let json = serde_json::to_string_pretty(&invoices)
        .map_err(invoice_kit::Error::from)
        .add_context("encoding sample invoice")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), invoice_kit::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match &cli.command {
        Command::Sample => run_sample(),
        Command::Render { data, out } => {
            let mut chrome_process = start_chromedriver(config.render.chromedriver_port)
                .add_context("starting chromedriver in cli")?;
            let result = run_render(data, out, &config).await;
            kill_chrome(&mut chrome_process)?;
            result
        }
        Command::Send {
            data,
            to,
            body,
            subject,
        } => {
            let mut chrome_process = start_chromedriver(config.render.chromedriver_port)
                .add_context("starting chromedriver in cli")?;
            let result = run_send(data, to, body, subject.as_deref(), &config).await;
            kill_chrome(&mut chrome_process)?;
            result
        }
    }
}
