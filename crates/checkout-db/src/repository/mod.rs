//! # Repository Module
//!
//! Database repository implementations for the shop.
//!
//! ## Two Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Repository (pool-level, one call = one statement or transaction)       │
//! │       db.carts().save(&cart)                                            │
//! │       db.orders().transition_status(id, Shipped, None)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pub(crate) helpers taking &mut SqliteConnection                        │
//! │       fetch_cart, reserve_stock, claim_use, debit_points, insert_order  │
//! │       │                                                                 │
//! │       │  the same helpers run inside checkout::finalize_order's         │
//! │       │  transaction, so the commit composes them without nesting       │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Products, variants, prices and stock
//! - [`discount::DiscountRepository`] - Discount codes and usage
//! - [`loyalty::LoyaltyRepository`] - Point balances
//! - [`cart::CartRepository`] - Stored carts and the guest merge
//! - [`order::OrderRepository`] - Orders and status transitions

pub mod cart;
pub mod catalog;
pub mod discount;
pub mod loyalty;
pub mod order;
