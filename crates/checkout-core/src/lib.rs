//! # checkout-core: Pure Pricing and Checkout Rules
//!
//! This crate holds every checkout business rule as pure, synchronous code
//! with zero I/O dependencies. The same engine prices the live cart preview
//! and re-prices the cart inside the commit transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Storefront UI                                │   │
//! │  │    Cart view ──► Preview quote ──► Checkout form ──► Order      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ DTOs (serde + ts-rs bindings)          │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ checkout-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  pricing  │  │   money   │  │   cart    │  │   order   │  │   │
//! │  │   │  Engine   │  │   Money   │  │   Cart    │  │  status   │  │   │
//! │  │   │  Policy   │  │   Rate    │  │  merge    │  │  machine  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CatalogLookup / DiscountRegistry       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 checkout-db (Persistence Layer)                 │   │
//! │  │      SQLite repositories, atomic finalize_order transaction     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, DiscountCode, Quote, etc.)
//! - [`money`] - Money and Rate with integer arithmetic
//! - [`pricing`] - The pricing engine and its policy
//! - [`lookup`] - Catalog and discount lookup seams
//! - [`cart`] - Explicit cart state and guest merge
//! - [`order`] - Order snapshot and status state machine
//! - [`error`] - Domain error types and rejections
//! - [`validation`] - Input and business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use checkout_core::lookup::{CatalogSnapshot, DiscountSnapshot};
//! use checkout_core::{
//!     DiscountCode, DiscountKind, LineItem, Money, PricingEngine, Product, QuoteRequest,
//! };
//!
//! let catalog: CatalogSnapshot = [Product {
//!     id: "p-1".into(),
//!     sku: "LAP-01".into(),
//!     name: "Laptop".into(),
//!     base_price: Money::from_minor(800_000),
//!     stock: 5,
//!     is_active: true,
//!     variants: vec![],
//! }]
//! .into_iter()
//! .collect();
//!
//! let discounts: DiscountSnapshot = [DiscountCode {
//!     code: "SAVE5".into(),
//!     kind: DiscountKind::Fixed,
//!     value: 50_000,
//!     max_uses: 10,
//!     used_count: 0,
//!     min_order_amount: Money::zero(),
//!     max_discount_amount: None,
//!     is_active: true,
//!     is_public: true,
//! }]
//! .into_iter()
//! .collect();
//!
//! let request = QuoteRequest {
//!     line_items: vec![LineItem::new("p-1", None, 1)],
//!     discount_code: Some("save5".into()),
//!     loyalty_points_requested: None,
//! };
//!
//! let quote = PricingEngine::default()
//!     .quote(&request, &catalog, &discounts, None)
//!     .unwrap();
//! assert_eq!(quote.breakdown.total, Money::from_minor(880_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod lookup;
pub mod money;
pub mod order;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::Cart;
pub use error::{CoreError, CoreResult, DiscountRejection, ErrorKind, Rejection, ValidationError};
pub use money::{Money, Rate};
pub use order::{Order, OrderLine, OrderStatus, StatusHistoryEntry};
pub use pricing::{PricingEngine, PricingPolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single cart line.
pub const MAX_ITEM_QUANTITY: i64 = 99;

/// Maximum distinct lines in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Discount codes are exactly this many ASCII letters/digits.
pub const DISCOUNT_CODE_LEN: usize = 5;

/// Upper bound for a discount code's `max_uses`.
pub const MAX_DISCOUNT_USES: i64 = 10;

/// Days after delivery during which an order may be returned.
pub const RETURN_WINDOW_DAYS: i64 = 7;

/// Upper bound for any stored price or amount, in minor units.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Longest return window the shop accepts.
pub const MAX_RETURN_WINDOW_DAYS: i64 = 3650;
