use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate};
use minijinja::context;
use std::str::FromStr;

use crate::invoice::{Invoice, ServiceItem};
use crate::totals::{compute_totals, format_currency};

/// Line items per printed page. Overflowing invoices paginate onto
/// additional A4 pages rather than being scaled down or clipped.
pub const ITEMS_PER_PAGE: usize = 12;

/// Render an amount string as AUD currency. Values that fail to parse pass
/// through untouched so a template bug stays visible instead of panicking.
fn currency(value: String) -> String {
    match BigDecimal::from_str(&value) {
        Ok(amount) => format_currency(&amount),
        Err(_) => value,
    }
}

/// Render a stored `YYYY-MM-DD` date for display, e.g. `20 Jan 2024`.
fn display_date(value: String) -> String {
    match NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
        Ok(date) => date.format("%d %b %Y").to_string(),
        Err(_) => value,
    }
}

/// Render a visit instant as `dd/mm/yyyy`.
fn visit_date(value: String) -> String {
    match DateTime::parse_from_rfc3339(&value) {
        Ok(instant) => instant.format("%d/%m/%Y").to_string(),
        Err(_) => value,
    }
}

pub fn setup_template_env() -> Result<minijinja::Environment<'static>, minijinja::Error> {
    let mut env = minijinja::Environment::new();
    env.set_loader(minijinja::path_loader("templates"));
    env.add_filter("currency", currency);
    env.add_filter("display_date", display_date);
    env.add_filter("visit_date", visit_date);
    Ok(env)
}

pub fn render_template(
    env: &minijinja::Environment<'static>,
    invoice: &Invoice,
) -> Result<String, minijinja::Error> {
    let template = env.get_template("base.html")?;
    let items = invoice.items();
    let pages: Vec<&[ServiceItem]> = if items.is_empty() {
        vec![&[]]
    } else {
        items.chunks(ITEMS_PER_PAGE).collect()
    };
    // the discount amount is derived, not stored; recompute it for display
    let totals = compute_totals(
        items,
        invoice.discount(),
        invoice.discount_type(),
        invoice.gst_enabled(),
        invoice.gst_rate(),
    );
    let show_discount = invoice.discount() != &BigDecimal::from(0);
    template.render(context! {
        pages => pages,
        invoice => invoice,
        terms_label => invoice.payment_terms().label(),
        show_discount => show_discount,
        discount_amount => totals.discount_amount.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_business_info;
    use crate::invoice::{ClientInfoBuilder, InvoiceBuilder, ServiceItemBuilder};
    use chrono::NaiveDate;

    fn invoice_with_items(count: usize) -> Invoice {
        let mut builder = InvoiceBuilder::default()
            .business_info(default_business_info().unwrap())
            .client_info(
                ClientInfoBuilder::default()
                    .name("Jacaranda Body Corporate")
                    .build()
                    .unwrap(),
            )
            .issue_date(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
        for i in 0..count {
            builder = builder.add_item(
                ServiceItemBuilder::default()
                    .service(format!("Service {i}"))
                    .quantity(1)
                    .rate(55)
                    .build()
                    .unwrap(),
            );
        }
        builder.finish().unwrap()
    }

    #[test]
    fn filters_format_for_display() {
        assert_eq!(currency(String::from("306.9")), "$306.90");
        assert_eq!(currency(String::from("n/a")), "n/a");
        assert_eq!(display_date(String::from("2024-01-20")), "20 Jan 2024");
        assert_eq!(
            visit_date(String::from("2024-01-12T09:00:00+10:00")),
            "12/01/2024"
        );
    }

    #[test]
    fn render_produces_one_page_per_item_chunk() {
        let env = setup_template_env().unwrap();

        let single = render_template(&env, &invoice_with_items(3)).unwrap();
        assert_eq!(single.matches("class=\"page\"").count(), 1);

        let spilled = render_template(&env, &invoice_with_items(ITEMS_PER_PAGE + 1)).unwrap();
        assert_eq!(spilled.matches("class=\"page\"").count(), 2);
        // totals only appear once, on the last page
        assert_eq!(spilled.matches("Total Amount Due").count(), 1);
    }

    #[test]
    fn render_includes_invoice_fields() {
        let env = setup_template_env().unwrap();
        let invoice = invoice_with_items(1);
        let html = render_template(&env, &invoice).unwrap();
        assert!(html.contains(invoice.invoice_number()));
        assert!(html.contains("Jacaranda Body Corporate"));
        assert!(html.contains("20 Jan 2024"));
        assert!(html.contains("Mazzari Landscape Management"));
    }

    #[test]
    fn render_copes_with_zero_items() {
        let env = setup_template_env().unwrap();
        let invoice = InvoiceBuilder::default()
            .business_info(default_business_info().unwrap())
            .client_info(ClientInfoBuilder::default().name("C").build().unwrap())
            .finish()
            .unwrap();
        let html = render_template(&env, &invoice).unwrap();
        assert_eq!(html.matches("class=\"page\"").count(), 1);
    }
}
