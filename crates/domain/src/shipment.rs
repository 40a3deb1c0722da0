//! Shipment records.

use chrono::{DateTime, Utc};
use common::{AddressId, ShipmentId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::status::ShippingStatus;

/// Shipping type assigned to new shipments.
pub const DEFAULT_SHIPPING_TYPE: &str = "Home";

/// The shipment attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub status: ShippingStatus,
    pub shipping_type: String,
    /// Courier chosen by fulfillment; unset when the order is placed.
    pub courier: Option<String>,
    pub address_id: AddressId,
    pub shipping_charge: Money,
    /// Tracking id issued by the courier.
    pub shipping_delivery_id: Option<String>,
    /// Raw courier response, kept opaque.
    pub raw_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// A pending home delivery to `address_id`.
    pub fn pending(address_id: AddressId, shipping_charge: Money, at: DateTime<Utc>) -> Self {
        Self {
            id: ShipmentId::new(),
            status: ShippingStatus::Pending,
            shipping_type: DEFAULT_SHIPPING_TYPE.to_string(),
            courier: None,
            address_id,
            shipping_charge,
            shipping_delivery_id: None,
            raw_response: None,
            created_at: at,
            updated_at: at,
        }
    }
}
