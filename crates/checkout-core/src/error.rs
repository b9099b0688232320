//! # Error Types
//!
//! Domain-specific error types for checkout-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  checkout-core errors (this file)                                      │
//! │  ├── CoreError        - Pricing / cart / order rule rejections         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  checkout-db errors (separate crate)                                   │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── CheckoutError    - Domain rejection OR generic commit failure     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError → Rejection → UI    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, code, amounts)
//! 3. Every variant maps to a machine-readable [`ErrorKind`]
//! 4. All of these are recoverable, user-facing rejections

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Why a discount code was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DiscountRejection {
    /// No code with that value exists.
    NotFound,
    /// The code exists but was switched off.
    Inactive,
    /// `used_count` has reached `max_uses`.
    Exhausted,
    /// The subtotal is below the code's minimum order amount.
    BelowMinimum,
}

impl std::fmt::Display for DiscountRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DiscountRejection::NotFound => "code does not exist",
            DiscountRejection::Inactive => "code is no longer active",
            DiscountRejection::Exhausted => "code has reached its usage limit",
            DiscountRejection::BelowMinimum => "order is below the minimum amount",
        };
        f.write_str(text)
    }
}

/// Core checkout rule violations.
///
/// These errors represent business rule rejections. None of them is fatal:
/// each one is surfaced to the shopper as a [`Rejection`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Product or variant cannot be resolved to a price.
    ///
    /// ## When This Occurs
    /// - Product id doesn't exist in the catalog
    /// - Product or referenced variant is inactive
    /// - Variant id belongs to a different product
    #[error("Catalog lookup failed for product {product_id}{}: {reason}", variant_suffix(.variant_id))]
    CatalogLookup {
        product_id: String,
        variant_id: Option<String>,
        reason: String,
    },

    /// Requested quantity exceeds available stock at commit time.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Conditional decrement: stock=3 ≥ 5? NO
    ///      │
    ///      ▼
    /// StockInsufficient { available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 left in stock"
    /// ```
    #[error("Insufficient stock for product {product_id}{}: available {available}, requested {requested}", variant_suffix(.variant_id))]
    StockInsufficient {
        product_id: String,
        variant_id: Option<String>,
        available: i64,
        requested: i64,
    },

    /// Discount code cannot be applied.
    #[error("Discount code {code} rejected: {reason}")]
    DiscountInvalid {
        code: String,
        reason: DiscountRejection,
    },

    /// Requested loyalty points exceed the user's balance.
    #[error("Insufficient loyalty points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    /// The preview is stale versus the authoritative catalog.
    ///
    /// ## When This Occurs
    /// - A unit price changed between cart preview and checkout
    /// - The recomputed totals no longer match the preview
    #[error("Price changed for {subject}: previewed {previewed}, now {current}")]
    PriceChanged {
        subject: String,
        previewed: Money,
        current: Money,
    },

    /// Order cannot move to the requested status.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        order_id: String,
        from: String,
        to: String,
    },

    /// Cart mutation rejected (line missing, owner mismatch, empty cart).
    #[error("Cart error: {0}")]
    Cart(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

fn variant_suffix(variant_id: &Option<String>) -> String {
    variant_id
        .as_ref()
        .map(|v| format!(" (variant {v})"))
        .unwrap_or_default()
}

impl CoreError {
    /// Shorthand for a catalog lookup failure.
    pub fn catalog(
        product_id: impl Into<String>,
        variant_id: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::CatalogLookup {
            product_id: product_id.into(),
            variant_id: variant_id.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Shorthand for a rejected discount code.
    pub fn discount(code: impl Into<String>, reason: DiscountRejection) -> Self {
        CoreError::DiscountInvalid {
            code: code.into(),
            reason,
        }
    }

    /// Machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::CatalogLookup { .. } => ErrorKind::CatalogLookup,
            CoreError::StockInsufficient { .. } => ErrorKind::StockInsufficient,
            CoreError::DiscountInvalid { .. } => ErrorKind::DiscountInvalid,
            CoreError::InsufficientPoints { .. } => ErrorKind::InsufficientPoints,
            CoreError::PriceChanged { .. } => ErrorKind::PriceChanged,
            CoreError::InvalidStatusTransition { .. } => ErrorKind::InvalidStatusTransition,
            CoreError::Cart(_) => ErrorKind::Cart,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Converts into the structured rejection handed to callers.
    pub fn to_rejection(&self) -> Rejection {
        Rejection {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

// =============================================================================
// Rejection
// =============================================================================

/// Machine-readable error kinds.
///
/// ## Usage in Frontend
/// ```typescript
/// switch (e.kind) {
///   case 'PRICE_CHANGED':
///     reloadCart();
///     break;
///   case 'DISCOUNT_INVALID':
///     clearCodeField(e.message);
///     break;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorKind {
    CatalogLookup,
    StockInsufficient,
    DiscountInvalid,
    InsufficientPoints,
    PriceChanged,
    InvalidStatusTransition,
    Cart,
    Validation,
    /// Unexpected failure while committing an order. Nothing was persisted.
    CommitFailed,
}

/// Structured rejection: a kind plus a human message.
///
/// ## Serialization
/// ```json
/// {
///   "kind": "STOCK_INSUFFICIENT",
///   "message": "Insufficient stock for product p-1: available 3, requested 5"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Rejection {
    pub kind: ErrorKind,
    pub message: String,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before pricing runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., malformed discount code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
