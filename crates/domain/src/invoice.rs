//! Invoices issued for fulfilled orders.

use chrono::{DateTime, Utc};
use common::InvoiceId;
use serde::{Deserialize, Serialize};

/// An invoice; at most one exists per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Unique number such as `INV-2026/10/18/101`.
    pub invoice_no: String,
    pub document_link: Option<String>,
    /// Reference to the QR image encoding the document link.
    pub qr_ref: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(invoice_no: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            id: InvoiceId::new(),
            invoice_no: invoice_no.into(),
            document_link: None,
            qr_ref: None,
            issued_at,
        }
    }

    pub fn with_document(mut self, link: impl Into<String>, qr_ref: Option<String>) -> Self {
        self.document_link = Some(link.into());
        self.qr_ref = qr_ref;
        self
    }
}
