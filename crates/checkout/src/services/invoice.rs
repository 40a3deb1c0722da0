//! Invoice document rendering.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::OrderAggregate;

use crate::error::{CheckoutError, Result};

/// Renders invoice documents and QR codes.
#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    /// Renders the invoice for `order` and returns a link to the document.
    async fn render_invoice(&self, order: &OrderAggregate, invoice_no: &str) -> Result<String>;

    /// Encodes `payload` as a QR image and returns a reference to it.
    async fn encode_qr(&self, payload: &str) -> Result<String>;
}

#[derive(Debug, Default)]
struct InMemoryRendererState {
    rendered: Vec<String>,
    fail_on_render: bool,
}

/// In-memory renderer for testing; produces deterministic links.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInvoiceRenderer {
    state: Arc<RwLock<InMemoryRendererState>>,
}

impl InMemoryInvoiceRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_render(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_render = fail;
    }

    /// Invoice numbers rendered so far.
    pub fn rendered(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rendered
            .clone()
    }
}

#[async_trait]
impl InvoiceRenderer for InMemoryInvoiceRenderer {
    async fn render_invoice(&self, order: &OrderAggregate, invoice_no: &str) -> Result<String> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_render {
            return Err(CheckoutError::collaborator("invoice", "Renderer unavailable"));
        }

        state.rendered.push(invoice_no.to_string());
        Ok(format!(
            "/invoices/{}/{}.pdf",
            order.order.order_code,
            invoice_no.replace('/', "-")
        ))
    }

    async fn encode_qr(&self, payload: &str) -> Result<String> {
        Ok(format!("qr:{payload}"))
    }
}
