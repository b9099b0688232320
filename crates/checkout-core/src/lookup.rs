//! # Lookups
//!
//! The read-only seams the pricing engine consumes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PricingEngine ──► CatalogLookup     (product + variant prices, stock)  │
//! │                ──► DiscountRegistry  (code → rule, usage counters)      │
//! │                                                                         │
//! │  Implementations:                                                       │
//! │    CatalogSnapshot / DiscountSnapshot  in-memory (tests, preview)       │
//! │    checkout-db loads the same snapshots from SQLite, inside or          │
//! │    outside the commit transaction                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use crate::types::{DiscountCode, Product};

/// Product lookup by id.
pub trait CatalogLookup {
    fn product(&self, product_id: &str) -> Option<&Product>;
}

/// Discount lookup by canonical (uppercase) code.
pub trait DiscountRegistry {
    fn discount(&self, code: &str) -> Option<&DiscountCode>;
}

/// Products keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    products: HashMap<String, Product>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn insert(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl FromIterator<Product> for CatalogSnapshot {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        let mut snapshot = CatalogSnapshot::new();
        for product in iter {
            snapshot.insert(product);
        }
        snapshot
    }
}

impl CatalogLookup for CatalogSnapshot {
    fn product(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id)
    }
}

/// Discount codes keyed by canonical code.
#[derive(Debug, Clone, Default)]
pub struct DiscountSnapshot {
    codes: HashMap<String, DiscountCode>,
}

impl DiscountSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, discount: DiscountCode) {
        self.codes.insert(discount.code.to_ascii_uppercase(), discount);
    }
}

impl FromIterator<DiscountCode> for DiscountSnapshot {
    fn from_iter<I: IntoIterator<Item = DiscountCode>>(iter: I) -> Self {
        let mut snapshot = DiscountSnapshot::new();
        for discount in iter {
            snapshot.insert(discount);
        }
        snapshot
    }
}

impl DiscountRegistry for DiscountSnapshot {
    fn discount(&self, code: &str) -> Option<&DiscountCode> {
        self.codes.get(code)
    }
}

/// A registry with no codes, for carts without a discount.
impl DiscountRegistry for () {
    fn discount(&self, _code: &str) -> Option<&DiscountCode> {
        None
    }
}
