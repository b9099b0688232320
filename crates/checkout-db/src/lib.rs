//! # checkout-db: Persistence and Atomic Checkout
//!
//! This crate stores the catalog, discount codes, loyalty balances, carts
//! and orders in SQLite (via sqlx) and runs the checkout commit as a single
//! transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout Data Flow                               │
//! │                                                                         │
//! │  Storefront handler (preview / place order / admin status change)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  checkout-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ catalog       │    │  (embedded)  │  │   │
//! │  │   │               │    │ discount      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ loyalty       │    │ 001_initial  │  │   │
//! │  │   │ PricingEngine │    │ cart, order   │    │ _schema.sql  │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                     │   │
//! │  │   ┌───────▼─────────────────────────────────────────────────┐  │   │
//! │  │   │ CheckoutService: preview (read-only) │ finalize_order   │  │   │
//! │  │   └─────────────────────────────────────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage and checkout error types
//! - [`repository`] - Repository implementations (catalog, cart, order, etc.)
//! - [`checkout`] - Preview and the atomic commit
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_db::{Database, DbConfig};
//! use checkout_core::CartOwner;
//!
//! let db = Database::new(DbConfig::new("shop.db")).await?;
//!
//! let mut cart = db.carts().get_or_create(CartOwner::user("u-1")).await?;
//! cart.add_item("p-laptop", None, 1)?;
//! cart.apply_discount_code("save5")?;
//! db.carts().save(&cart).await?;
//!
//! let quote = db.checkout().preview(&cart).await?;
//! let order = db.checkout().finalize_order(&cart.id, &quote, details).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::CheckoutService;
pub use config::{ConfigError, ShopConfig};
pub use error::{CheckoutError, CheckoutResult, DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::discount::DiscountRepository;
pub use repository::loyalty::LoyaltyRepository;
pub use repository::order::OrderRepository;
