//! # Domain Types
//!
//! Core domain types shared by the pricing engine, the cart and orders.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  DiscountCode   │   │ LoyaltyBalance  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  base_price     │   │  code (5 chars) │   │  user_id        │       │
//! │  │  stock          │   │  kind / value   │   │  points         │       │
//! │  │  variants[]     │   │  used / max     │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    LineItem     │──►│   PricedLine    │──►│ PriceBreakdown  │       │
//! │  │  product_id     │   │  PriceSource    │   │ subtotal ...    │       │
//! │  │  variant_id?    │   │  unit_price     │   │ total           │       │
//! │  │  quantity 1..99 │   │  line_total     │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Catalog, discount and loyalty records are reference data owned by the
//! persistence layer. The engine only reads them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Rate};

// =============================================================================
// Catalog
// =============================================================================

/// A purchasable SKU-level configuration of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Variant {
    pub id: String,
    pub product_id: String,
    /// Display label, e.g. "16GB / 512GB".
    pub label: String,
    pub price: Money,
    pub stock: i64,
    pub is_active: bool,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    /// Price used when a line does not reference a variant.
    pub base_price: Money,
    /// Stock used when a line does not reference a variant.
    pub stock: i64,
    pub is_active: bool,
    pub variants: Vec<Variant>,
}

impl Product {
    /// Finds a variant of this product by id.
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Stock available for a line, per variant when one is referenced.
    pub fn available_stock(&self, variant_id: Option<&str>) -> Option<i64> {
        match variant_id {
            Some(id) => self.variant(id).map(|v| v.stock),
            None => Some(self.stock),
        }
    }
}

// =============================================================================
// Lines
// =============================================================================

/// A requested cart line. Carries no price: prices come from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(product_id: impl Into<String>, variant_id: Option<&str>, quantity: i64) -> Self {
        LineItem {
            product_id: product_id.into(),
            variant_id: variant_id.map(str::to_string),
            quantity,
        }
    }

    /// True when both lines point at the same product + variant.
    pub fn same_target(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.product_id == product_id && self.variant_id.as_deref() == variant_id
    }
}

/// Where a resolved unit price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "source", content = "price", rename_all = "snake_case")]
#[ts(export)]
pub enum PriceSource {
    VariantPrice(Money),
    BasePrice(Money),
}

impl PriceSource {
    #[inline]
    pub fn unit_price(&self) -> Money {
        match self {
            PriceSource::VariantPrice(p) | PriceSource::BasePrice(p) => *p,
        }
    }
}

/// A line whose unit price was resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedLine {
    pub item: LineItem,
    /// Product name at pricing time (frozen into the order).
    pub name: String,
    pub price_source: PriceSource,
    pub line_total: Money,
}

impl PricedLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        self.price_source.unit_price()
    }
}

// =============================================================================
// Ownership
// =============================================================================

/// Who owns a cart or an order. A user id and a guest token never coexist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum CartOwner {
    User { user_id: String },
    Guest { session_token: String },
}

impl CartOwner {
    pub fn user(user_id: impl Into<String>) -> Self {
        CartOwner::User {
            user_id: user_id.into(),
        }
    }

    pub fn guest(session_token: impl Into<String>) -> Self {
        CartOwner::Guest {
            session_token: session_token.into(),
        }
    }

    /// The authenticated user id, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            CartOwner::User { user_id } => Some(user_id),
            CartOwner::Guest { .. } => None,
        }
    }

    /// The guest session token, if any.
    pub fn guest_token(&self) -> Option<&str> {
        match self {
            CartOwner::User { .. } => None,
            CartOwner::Guest { session_token } => Some(session_token),
        }
    }
}

// =============================================================================
// Discounts
// =============================================================================

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DiscountKind {
    /// `value` is a whole percentage of the subtotal (0..=100).
    Percentage,
    /// `value` is an amount in minor units.
    Fixed,
}

/// A capped-use promotional code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DiscountCode {
    /// Exactly 5 uppercase letters/digits, stored canonically uppercase.
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub max_uses: i64,
    pub used_count: i64,
    pub min_order_amount: Money,
    pub max_discount_amount: Option<Money>,
    pub is_active: bool,
    pub is_public: bool,
}

impl DiscountCode {
    /// True once `used_count` has reached `max_uses`.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.max_uses
    }

    /// Remaining redemptions.
    #[inline]
    pub fn remaining_uses(&self) -> i64 {
        (self.max_uses - self.used_count).max(0)
    }

    /// Percentage codes as a rate; `None` for fixed codes.
    pub fn rate(&self) -> Option<Rate> {
        match self.kind {
            DiscountKind::Percentage => Some(Rate::from_percent(self.value.clamp(0, 100) as u32)),
            DiscountKind::Fixed => None,
        }
    }
}

/// A discount that passed validation, with the amount it takes off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AppliedDiscount {
    pub code: String,
    pub amount: Money,
}

// =============================================================================
// Loyalty
// =============================================================================

/// A user's redeemable point balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoyaltyBalance {
    pub user_id: String,
    pub points: i64,
}

/// Result of redeeming points against a subtotal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoyaltyRedemption {
    pub points_consumed: i64,
    pub deduction: Money,
}

// =============================================================================
// Breakdown & Quote
// =============================================================================

/// The computed price breakdown.
///
/// ## Invariant
/// `total = subtotal + shipping + tax - discount - loyalty`, floored at 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub loyalty_deduction: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

/// Input to a quote: the cart contents the shopper asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct QuoteRequest {
    pub line_items: Vec<LineItem>,
    pub discount_code: Option<String>,
    pub loyalty_points_requested: Option<i64>,
}

/// Everything the engine derived for a cart.
///
/// Returned by the preview path and handed back to the commit path, which
/// re-derives it from authoritative data and compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub breakdown: PriceBreakdown,
    pub discount: Option<AppliedDiscount>,
    pub loyalty: LoyaltyRedemption,
}

// =============================================================================
// Checkout Details
// =============================================================================

/// Payment method label. No payment processing happens behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    CashOnDelivery,
    BankTransfer,
    Card,
    EWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::EWallet => "e_wallet",
        }
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShippingAddress {
    pub recipient: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
}

/// What the shopper submits alongside the cart at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutDetails {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

// =============================================================================
// Loyalty Accrual
// =============================================================================

/// Points earned per amount spent, applied when an order is delivered.
///
/// There is no default rule: without one, orders earn nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccrualRule {
    pub points: i64,
    pub per_amount: Money,
}

impl AccrualRule {
    /// Points earned for an order total.
    pub fn points_for(&self, total: Money) -> i64 {
        total.whole_units_of(self.per_amount) * self.points.max(0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn laptop() -> Product {
        Product {
            id: "p-1".to_string(),
            sku: "LAP-01".to_string(),
            name: "Laptop".to_string(),
            base_price: Money::from_minor(800_000),
            stock: 4,
            is_active: true,
            variants: vec![Variant {
                id: "v-32".to_string(),
                product_id: "p-1".to_string(),
                label: "32GB".to_string(),
                price: Money::from_minor(950_000),
                stock: 1,
                is_active: true,
            }],
        }
    }

    #[test]
    fn test_available_stock_prefers_variant() {
        let p = laptop();
        assert_eq!(p.available_stock(None), Some(4));
        assert_eq!(p.available_stock(Some("v-32")), Some(1));
        assert_eq!(p.available_stock(Some("v-missing")), None);
    }

    #[test]
    fn test_cart_owner_is_exclusive() {
        let user = CartOwner::user("u-1");
        assert_eq!(user.user_id(), Some("u-1"));
        assert_eq!(user.guest_token(), None);

        let guest = CartOwner::guest("tok");
        assert_eq!(guest.user_id(), None);
        assert_eq!(guest.guest_token(), Some("tok"));
    }

    #[test]
    fn test_discount_code_usage() {
        let code = DiscountCode {
            code: "SAVE5".to_string(),
            kind: DiscountKind::Percentage,
            value: 15,
            max_uses: 2,
            used_count: 1,
            min_order_amount: Money::zero(),
            max_discount_amount: None,
            is_active: true,
            is_public: false,
        };
        assert!(!code.is_exhausted());
        assert_eq!(code.remaining_uses(), 1);
        assert_eq!(code.rate(), Some(Rate::from_bps(1500)));
    }

    #[test]
    fn test_accrual_rule() {
        let rule = AccrualRule {
            points: 1,
            per_amount: Money::from_minor(100_000),
        };
        assert_eq!(rule.points_for(Money::from_minor(880_000)), 8);
        assert_eq!(rule.points_for(Money::from_minor(99_999)), 0);
    }

    #[test]
    fn test_price_source_serialization() {
        let json = serde_json::to_value(PriceSource::VariantPrice(Money::from_minor(10))).unwrap();
        assert_eq!(json["source"], "variant_price");
        assert_eq!(json["price"], 10);
    }

    #[test]
    fn test_cart_owner_serialization() {
        let json = serde_json::to_value(CartOwner::guest("abc")).unwrap();
        assert_eq!(json["type"], "guest");
        assert_eq!(json["session_token"], "abc");
    }
}
