//! External collaborator traits and in-memory implementations.

use std::sync::Arc;

pub mod address;
pub mod cart;
pub mod catalog;
pub mod coupons;
pub mod gateway;
pub mod invoice;
pub mod notifier;

pub use address::{Address, AddressBook, InMemoryAddressBook};
pub use cart::{CartService, InMemoryCartService};
pub use catalog::{CatalogService, InMemoryCatalogService, VariationPrice};
pub use coupons::{CouponDirectory, InMemoryCouponDirectory};
pub use gateway::{
    GatewayConfig, GatewayIntent, InMemoryPaymentGateway, PaymentGateway, RazorpayGateway,
};
pub use invoice::{InMemoryInvoiceRenderer, InvoiceRenderer};
pub use notifier::{InMemoryNotifier, Notification, NotificationKind, Notifier};

/// The set of collaborators the checkout components call into.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogService>,
    pub cart: Arc<dyn CartService>,
    pub addresses: Arc<dyn AddressBook>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub invoices: Arc<dyn InvoiceRenderer>,
    pub notifier: Arc<dyn Notifier>,
    pub coupons: Arc<dyn CouponDirectory>,
}

/// In-memory collaborators with handles kept for seeding and inspection.
#[derive(Clone, Default)]
pub struct InMemoryCollaborators {
    pub catalog: InMemoryCatalogService,
    pub cart: InMemoryCartService,
    pub addresses: InMemoryAddressBook,
    pub gateway: InMemoryPaymentGateway,
    pub invoices: InMemoryInvoiceRenderer,
    pub notifier: InMemoryNotifier,
    pub coupons: InMemoryCouponDirectory,
}

impl InMemoryCollaborators {
    /// Creates empty collaborators; the gateway signs with `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            gateway: InMemoryPaymentGateway::new(secret),
            ..Default::default()
        }
    }

    /// Shares the in-memory implementations as trait objects.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            catalog: Arc::new(self.catalog.clone()),
            cart: Arc::new(self.cart.clone()),
            addresses: Arc::new(self.addresses.clone()),
            gateway: Arc::new(self.gateway.clone()),
            invoices: Arc::new(self.invoices.clone()),
            notifier: Arc::new(self.notifier.clone()),
            coupons: Arc::new(self.coupons.clone()),
        }
    }
}
