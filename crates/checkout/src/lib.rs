//! Order placement and payment reconciliation.
//!
//! The components, leaf first:
//! - [`SequenceGenerator`] hands out day-bucketed order codes and invoice numbers
//! - [`PricingEngine`] prices carts against the live catalog
//! - [`OrderWorkflow`] turns a cart into a persisted order and gateway intent
//! - [`PaymentReconciler`] applies gateway callbacks and user cancellations
//! - [`TimeoutSweeper`] fails prepaid payments that were never reconciled
//! - [`FulfillmentService`] moves shipping/delivery forward and issues invoices
//!
//! External systems sit behind the traits in [`services`].

pub mod clock;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod pricing;
pub mod reconciler;
pub mod sequence;
pub mod services;
pub mod signature;
pub mod sweeper;
pub mod workflow;

pub use clock::{Clock, ManualClock, SystemClock, business_day};
pub use config::{CheckoutConfig, DEFAULT_UTC_OFFSET_MINUTES, SweepPolicy, offset_from_minutes};
pub use error::{CheckoutError, ErrorKind, Result};
pub use fulfillment::{FulfillmentService, StatusUpdate};
pub use pricing::{PricedCart, PricingEngine};
pub use reconciler::{PaymentReconciler, ReconcileOutcome};
pub use sequence::SequenceGenerator;
pub use services::{Collaborators, InMemoryCollaborators};
pub use sweeper::{SweepReport, TimeoutSweeper};
pub use workflow::{CreateOrder, OrderResult, OrderWorkflow};
