//! Day-bucketed sequence counters used for order codes and invoice numbers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sequence name used for order codes.
pub const ORDER_SEQUENCE: &str = "order";

/// Sequence name used for invoice numbers.
pub const INVOICE_SEQUENCE: &str = "invoice";

/// Offset added to the invoice postfix, so the first invoice of a day is 101.
pub const INVOICE_NUMBER_BASE: i64 = 100;

/// Persistent state of one named sequence.
///
/// `prefix` holds the bucket the counter currently counts in and `postfix`
/// the next ordinal to hand out within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounter {
    pub name: String,
    pub prefix: String,
    pub postfix: i64,
}

/// A value handed out by a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceValue {
    pub bucket: String,
    pub postfix: i64,
}

impl SequenceCounter {
    /// Creates a counter positioned at the start of `bucket`.
    pub fn new(name: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: bucket.into(),
            postfix: 1,
        }
    }

    /// Hands out the next value for `bucket` and advances the counter.
    ///
    /// A bucket change resets the ordinal to 1. Callers must hold the
    /// counter's lock for the whole call and persist the result before
    /// releasing it.
    pub fn advance(&mut self, bucket: &str) -> SequenceValue {
        if self.prefix != bucket {
            self.prefix = bucket.to_string();
            self.postfix = 1;
        }
        let value = SequenceValue {
            bucket: self.prefix.clone(),
            postfix: self.postfix,
        };
        self.postfix += 1;
        value
    }
}

impl SequenceValue {
    /// Renders the value as an order code: bucket followed by a
    /// zero-padded four digit ordinal, e.g. `202610180007`.
    pub fn order_code(&self) -> String {
        format!("{}{:04}", self.bucket, self.postfix)
    }

    /// Renders the value as an invoice number, e.g. `INV-2026/10/18/101`.
    pub fn invoice_number(&self) -> String {
        format!("INV-{}/{}", self.bucket, INVOICE_NUMBER_BASE + self.postfix)
    }
}

/// Bucket token for order codes on a business day.
pub fn order_bucket(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

/// Bucket token for invoice numbers on a business day.
pub fn invoice_bucket(day: NaiveDate) -> String {
    day.format("%Y/%m/%d").to_string()
}
