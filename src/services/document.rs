use chrono::{DateTime, NaiveDate, Utc};
use printpdf::{BuiltinFont, Line, Mm, PdfDocument, Point};
use rust_decimal::Decimal;

use crate::error::AppError;
use crate::services::metrics::DOCUMENTS_GENERATED_TOTAL;

/// Everything the rendered invoice needs, decoupled from the database row.
#[derive(Debug, Clone)]
pub struct InvoiceDocument {
    pub invoice_number: String,
    pub facility_name: String,
    pub facility_address: Option<String>,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub billing_period: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;

/// Render an A4 invoice as PDF bytes. Pure with respect to storage;
/// the caller decides where the bytes go.
pub fn render_invoice_pdf(invoice: &InvoiceDocument) -> Result<Vec<u8>, AppError> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Invoice {}", invoice.invoice_number),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "invoice",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("pdf font: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("pdf font: {e}")))?;

    let layer = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;

    // Header: issuer block on the left, document title on the right.
    layer.use_text("Invoicing Portal", 16.0, Mm(MARGIN), Mm(y), &bold);
    layer.use_text("INVOICE", 22.0, Mm(PAGE_WIDTH - MARGIN - 45.0), Mm(y), &bold);
    y -= 7.0;
    layer.use_text(
        format!("Issued {}", invoice.created_at.format("%Y-%m-%d")),
        10.0,
        Mm(MARGIN),
        Mm(y),
        &regular,
    );
    layer.use_text(
        format!("# {}", invoice.invoice_number),
        11.0,
        Mm(PAGE_WIDTH - MARGIN - 45.0),
        Mm(y),
        &regular,
    );

    y -= 16.0;
    layer.use_text("BILL TO", 10.0, Mm(MARGIN), Mm(y), &bold);
    y -= 6.0;
    layer.use_text(&invoice.facility_name, 11.0, Mm(MARGIN), Mm(y), &regular);
    if let Some(address) = &invoice.facility_address {
        y -= 6.0;
        layer.use_text(address, 10.0, Mm(MARGIN), Mm(y), &regular);
    }

    y -= 14.0;
    draw_rule(&layer, y);

    // Single-row billing table.
    y -= 8.0;
    layer.use_text("Description", 10.0, Mm(MARGIN), Mm(y), &bold);
    layer.use_text("Period", 10.0, Mm(100.0), Mm(y), &bold);
    layer.use_text("Amount", 10.0, Mm(PAGE_WIDTH - MARGIN - 30.0), Mm(y), &bold);
    y -= 7.0;
    layer.use_text(
        format!("{} billing", invoice.billing_period),
        10.0,
        Mm(MARGIN),
        Mm(y),
        &regular,
    );
    layer.use_text(
        format!(
            "{} to {}",
            invoice.period_start.format("%Y-%m-%d"),
            invoice.period_end.format("%Y-%m-%d")
        ),
        10.0,
        Mm(100.0),
        Mm(y),
        &regular,
    );
    layer.use_text(
        format!("${}", invoice.amount),
        10.0,
        Mm(PAGE_WIDTH - MARGIN - 30.0),
        Mm(y),
        &regular,
    );

    y -= 8.0;
    draw_rule(&layer, y);

    y -= 9.0;
    layer.use_text(
        format!("Total due: ${}", invoice.amount),
        12.0,
        Mm(PAGE_WIDTH - MARGIN - 60.0),
        Mm(y),
        &bold,
    );
    y -= 7.0;
    layer.use_text(
        format!("Due date: {}", invoice.due_date.format("%Y-%m-%d")),
        10.0,
        Mm(PAGE_WIDTH - MARGIN - 60.0),
        Mm(y),
        &regular,
    );

    if let Some(notes) = &invoice.notes {
        y -= 16.0;
        layer.use_text("Notes", 10.0, Mm(MARGIN), Mm(y), &bold);
        y -= 6.0;
        layer.use_text(notes, 9.0, Mm(MARGIN), Mm(y), &regular);
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("pdf render: {e}")))?;
    DOCUMENTS_GENERATED_TOTAL.with_label_values(&["ok"]).inc();
    Ok(bytes)
}

fn draw_rule(layer: &printpdf::PdfLayerReference, y: f32) {
    let line = Line {
        points: vec![
            (Point::new(Mm(MARGIN), Mm(y)), false),
            (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
        ],
        is_closed: false,
    };
    layer.add_line(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InvoiceDocument {
        InvoiceDocument {
            invoice_number: "INV-2026-001".to_string(),
            facility_name: "Riverside Clinic".to_string(),
            facility_address: Some("12 Quay Street".to_string()),
            amount: Decimal::new(125_000, 2),
            due_date: NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
            billing_period: "monthly".to_string(),
            period_start: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
            notes: Some("Net 30".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn renders_a_valid_pdf() {
        let bytes = render_invoice_pdf(&sample()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn renders_without_optional_fields() {
        let mut doc = sample();
        doc.facility_address = None;
        doc.notes = None;
        let bytes = render_invoice_pdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
