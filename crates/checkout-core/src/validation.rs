//! # Validation Module
//!
//! Input validation for checkout requests and reference data.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront (TypeScript)                                      │
//! │  ├── Form checks (empty fields, code length)                           │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Quantity range, code format, address fields                       │
//! │  └── Discount definitions before they are stored                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (stock ≥ 0, used_count ≤ max_uses)              │
//! │  └── UNIQUE (discount code), foreign keys                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use checkout_core::validation::{normalize_discount_code, validate_quantity};
//!
//! assert_eq!(normalize_discount_code(" save5 ").unwrap(), "SAVE5");
//! assert!(validate_quantity(100).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{DiscountCode, DiscountKind, ShippingAddress};
use crate::{DISCOUNT_CODE_LEN, MAX_AMOUNT, MAX_CART_LINES, MAX_DISCOUNT_USES, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Discount Codes
// =============================================================================

/// Validates and canonicalises a discount code.
///
/// ## Rules
/// - Surrounding whitespace is ignored
/// - Exactly 5 characters, ASCII letters and digits only
/// - Input is case-insensitive; the result is uppercase
///
/// ## Example
/// ```rust
/// use checkout_core::validation::normalize_discount_code;
///
/// assert_eq!(normalize_discount_code("abc12").unwrap(), "ABC12");
/// assert!(normalize_discount_code("ABC-1").is_err());
/// assert!(normalize_discount_code("ABCDEF").is_err());
/// ```
pub fn normalize_discount_code(raw: &str) -> ValidationResult<String> {
    let code = raw.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "discount code".to_string(),
        });
    }

    if code.chars().count() != DISCOUNT_CODE_LEN {
        return Err(ValidationError::InvalidFormat {
            field: "discount code".to_string(),
            reason: format!("must be exactly {DISCOUNT_CODE_LEN} characters"),
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "discount code".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }

    Ok(code.to_ascii_uppercase())
}

/// Validates a discount definition before it is stored.
///
/// ## Rules
/// - Code format as in [`normalize_discount_code`], already uppercase
/// - Percentage value in 1..=100, fixed value > 0
/// - `max_uses` in 1..=10, `0 ≤ used_count ≤ max_uses`
/// - Minimum order amount and cap are non-negative
pub fn validate_discount_definition(discount: &DiscountCode) -> ValidationResult<()> {
    let canonical = normalize_discount_code(&discount.code)?;
    if canonical != discount.code {
        return Err(ValidationError::InvalidFormat {
            field: "discount code".to_string(),
            reason: "must be stored uppercase".to_string(),
        });
    }

    match discount.kind {
        DiscountKind::Percentage if !(1..=100).contains(&discount.value) => {
            return Err(ValidationError::OutOfRange {
                field: "percentage value".to_string(),
                min: 1,
                max: 100,
            });
        }
        DiscountKind::Fixed if discount.value <= 0 => {
            return Err(ValidationError::OutOfRange {
                field: "fixed value".to_string(),
                min: 1,
                max: i64::MAX,
            });
        }
        _ => {}
    }

    if !(1..=MAX_DISCOUNT_USES).contains(&discount.max_uses) {
        return Err(ValidationError::OutOfRange {
            field: "max uses".to_string(),
            min: 1,
            max: MAX_DISCOUNT_USES,
        });
    }

    if discount.used_count < 0 || discount.used_count > discount.max_uses {
        return Err(ValidationError::OutOfRange {
            field: "used count".to_string(),
            min: 0,
            max: discount.max_uses,
        });
    }

    validate_amount("minimum order amount", discount.min_order_amount)?;
    if let Some(cap) = discount.max_discount_amount {
        validate_amount("maximum discount amount", cap)?;
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be in 1..=99
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Item                                                         │
/// │                                                                         │
/// │  Shopper sets quantity: 5                                              │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty < 1?  → Error: "quantity must be between 1 and 99"       │
/// │       ├── qty > 99? → Error: "quantity must be between 1 and 99"       │
/// │       └── OK → Proceed with add_item                                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount that must not be negative (prices, caps).
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    if amount.minor() > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT,
        });
    }

    Ok(())
}

/// Validates a loyalty points request.
pub fn validate_points_requested(points: i64) -> ValidationResult<()> {
    if points < 0 {
        return Err(ValidationError::Negative {
            field: "loyalty points".to_string(),
        });
    }

    Ok(())
}

/// Validates the number of distinct lines in a cart before adding one more.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an opaque identifier (product id, user id, guest token).
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    validate_text(field, value, 128)
}

/// Validates a shipping address.
///
/// ## Rules
/// - Recipient, street, city: required, at most 200 characters
/// - Phone: 8 to 15 digits, optional leading `+`, spaces ignored
/// - Postal code: optional, at most 20 characters
pub fn validate_shipping_address(address: &ShippingAddress) -> ValidationResult<()> {
    validate_text("recipient", &address.recipient, 200)?;
    validate_text("street", &address.street, 200)?;
    validate_text("city", &address.city, 200)?;

    let phone: String = address.phone.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = phone.strip_prefix('+').unwrap_or(&phone);
    if digits.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) || !(8..=15).contains(&digits.len()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must be 8 to 15 digits".to_string(),
        });
    }

    if let Some(postal) = &address.postal_code {
        if postal.trim().chars().count() > 20 {
            return Err(ValidationError::TooLong {
                field: "postal code".to_string(),
                max: 20,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
