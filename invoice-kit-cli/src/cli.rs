use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use invoice_kit::{Invoice, error::AddContext};

fn read_until_eof() -> io::Result<String> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

#[derive(Debug, Parser)]
#[command(name = "invoice-kit", about = "Create, render, and email landscaping invoices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render invoices from JSON into PDF files
    Render {
        /// Path to the JSON file with invoice data to print
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Path to the directory where PDF outputs should be saved
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Save invoices, email them as PDF attachments, and mark them sent
    Send {
        /// Path to the JSON file with invoice data to send
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Recipient email address
        #[arg(short, long)]
        to: String,

        /// Message body
        #[arg(short, long)]
        body: String,

        /// Subject line; the relay supplies a default when omitted
        #[arg(long)]
        subject: Option<String>,
    },

    /// Print a sample invoice JSON built from the service catalog
    Sample,
}

/// Read invoices from the given JSON file, or from stdin when no path was
/// provided.
pub fn load_invoices(data: &Option<PathBuf>) -> Result<Vec<Invoice>, invoice_kit::Error> {
    let raw = match data {
        Some(path) => fs::read_to_string(path)
            .map_err(invoice_kit::Error::from)
            .add_context(&format!(
                "reading invoice data from file '{}'",
                path.to_str().unwrap_or("UNKNOWN")
            ))?,
        None => read_until_eof()
            .map_err(invoice_kit::Error::from)
            .add_context("reading invoice data from stdin")?,
    };

    Ok(serde_json::from_str(&raw)
        .map_err(invoice_kit::Error::from)
        .add_context("parsing invoice JSON")?)
}
