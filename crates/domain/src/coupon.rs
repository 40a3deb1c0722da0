//! Flat-value discount coupons.

use chrono::NaiveDate;
use common::CouponId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// Whether a coupon may be redeemed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    #[default]
    Active,
    Inactive,
}

/// Reasons a coupon is rejected by strict validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("Invalid or inactive coupon: {0}")]
    NotFound(String),

    #[error("Invalid or inactive coupon: {0}")]
    Inactive(String),

    #[error("Coupon {code} not started yet (starts {starts_on})")]
    NotStarted { code: String, starts_on: NaiveDate },

    #[error("Coupon {code} expired on {ended_on}")]
    Expired { code: String, ended_on: NaiveDate },
}

/// A discount coupon worth a flat amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub value: Money,
    pub status: CouponStatus,
    /// First day the coupon is valid; `None` means no lower bound.
    pub start_date: Option<NaiveDate>,
    /// Last day the coupon is valid; `None` means no upper bound.
    pub end_date: Option<NaiveDate>,
}

impl Coupon {
    /// Creates an active coupon with no validity window.
    pub fn new(code: impl Into<String>, value: Money) -> Self {
        Self {
            id: CouponId::new(),
            code: code.into(),
            value,
            status: CouponStatus::Active,
            start_date: None,
            end_date: None,
        }
    }

    /// Restricts the coupon to an inclusive date window.
    pub fn valid_between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Marks the coupon inactive.
    pub fn deactivated(mut self) -> Self {
        self.status = CouponStatus::Inactive;
        self
    }

    /// Strictly checks that the coupon can be redeemed on `today`.
    pub fn check(&self, today: NaiveDate) -> Result<(), CouponError> {
        if self.status != CouponStatus::Active {
            return Err(CouponError::Inactive(self.code.clone()));
        }
        if let Some(starts_on) = self.start_date
            && today < starts_on
        {
            return Err(CouponError::NotStarted {
                code: self.code.clone(),
                starts_on,
            });
        }
        if let Some(ended_on) = self.end_date
            && today > ended_on
        {
            return Err(CouponError::Expired {
                code: self.code.clone(),
                ended_on,
            });
        }
        Ok(())
    }

    /// Returns true if the coupon can be redeemed on `today`.
    pub fn is_redeemable(&self, today: NaiveDate) -> bool {
        self.check(today).is_ok()
    }
}
