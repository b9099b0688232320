//! # Pricing Engine
//!
//! Computes a deterministic [`PriceBreakdown`] from cart lines and read-only
//! catalog / discount / loyalty data.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PricingEngine::quote                             │
//! │                                                                         │
//! │  LineItem[] ──► price_lines ──► subtotal                                │
//! │                  (catalog)         │                                    │
//! │                                    ├──► apply_discount       (registry) │
//! │                                    ├──► apply_loyalty_points (balance)  │
//! │                                    ├──► compute_shipping                │
//! │                                    └──► compute_tax                     │
//! │                                              │                          │
//! │                                              ▼                          │
//! │  total = subtotal + shipping + tax - discount - loyalty   (floor 0)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Call Sites, One Engine
//! The cart preview calls [`PricingEngine::quote`] on a snapshot and never
//! mutates anything. The commit path calls the same method on rows read
//! inside its transaction, then [`PricingEngine::verify_preview`] to make
//! sure the shopper is charged what they were shown.
//!
//! Tax is charged on the gross subtotal, before discount and loyalty.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, DiscountRejection};
use crate::lookup::{CatalogLookup, DiscountRegistry};
use crate::money::{Money, Rate};
use crate::types::{
    AccrualRule, AppliedDiscount, DiscountCode, LineItem, LoyaltyBalance, LoyaltyRedemption,
    PriceBreakdown, PriceSource, PricedLine, Product, Quote, QuoteRequest,
};
use crate::validation::{normalize_discount_code, validate_points_requested, validate_quantity};

/// Flat tax: 10%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 1000;
/// Subtotals strictly above this ship free.
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: i64 = 1_000_000;
/// Flat shipping fee below the threshold.
pub const DEFAULT_SHIPPING_FEE: i64 = 50_000;
/// Monetary value of one loyalty point.
pub const DEFAULT_POINT_VALUE: i64 = 1000;

// =============================================================================
// Policy
// =============================================================================

/// Numeric policies the engine applies.
///
/// `PricingPolicy::default()` is the storefront's standing policy: 10% tax,
/// free shipping above 1,000,000, otherwise 50,000, 1 point = 1,000, and no
/// loyalty accrual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricingPolicy {
    pub tax_rate: Rate,
    pub free_shipping_threshold: Money,
    pub shipping_fee: Money,
    pub point_value: Money,
    /// Points earned on delivery. `None` means orders earn nothing.
    pub accrual: Option<AccrualRule>,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            tax_rate: Rate::from_bps(DEFAULT_TAX_RATE_BPS),
            free_shipping_threshold: Money::from_minor(DEFAULT_FREE_SHIPPING_THRESHOLD),
            shipping_fee: Money::from_minor(DEFAULT_SHIPPING_FEE),
            point_value: Money::from_minor(DEFAULT_POINT_VALUE),
            accrual: None,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The pricing engine. Cheap to copy, holds only its policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine {
    policy: PricingPolicy,
}

impl PricingEngine {
    pub fn new(policy: PricingPolicy) -> Self {
        PricingEngine { policy }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Resolves the unit price of one line.
    ///
    /// `variant.price` when the line references a variant, otherwise
    /// `product.base_price`. Unknown or inactive products/variants fail;
    /// nothing falls back to zero.
    pub fn resolve_price<'a>(
        &self,
        item: &LineItem,
        catalog: &'a impl CatalogLookup,
    ) -> CoreResult<(PriceSource, &'a Product)> {
        let variant_id = item.variant_id.as_deref();
        let product = catalog
            .product(&item.product_id)
            .ok_or_else(|| CoreError::catalog(&item.product_id, variant_id, "product not found"))?;

        if !product.is_active {
            return Err(CoreError::catalog(&item.product_id, variant_id, "product is inactive"));
        }

        let source = match variant_id {
            Some(id) => {
                let variant = product
                    .variant(id)
                    .ok_or_else(|| CoreError::catalog(&item.product_id, variant_id, "variant not found"))?;
                if !variant.is_active {
                    return Err(CoreError::catalog(&item.product_id, variant_id, "variant is inactive"));
                }
                PriceSource::VariantPrice(variant.price)
            }
            None => PriceSource::BasePrice(product.base_price),
        };

        if source.unit_price().is_negative() {
            return Err(CoreError::catalog(&item.product_id, variant_id, "negative unit price"));
        }

        Ok((source, product))
    }

    /// Resolves every line against the catalog.
    pub fn price_lines(
        &self,
        items: &[LineItem],
        catalog: &impl CatalogLookup,
    ) -> CoreResult<Vec<PricedLine>> {
        items
            .iter()
            .map(|item| -> CoreResult<PricedLine> {
                validate_quantity(item.quantity)?;
                let (price_source, product) = self.resolve_price(item, catalog)?;
                let line_total = price_source
                    .unit_price()
                    .checked_mul(item.quantity)
                    .ok_or_else(|| {
                        CoreError::catalog(
                            &item.product_id,
                            item.variant_id.as_deref(),
                            "line total out of range",
                        )
                    })?;
                Ok(PricedLine {
                    item: item.clone(),
                    name: product.name.clone(),
                    price_source,
                    line_total,
                })
            })
            .collect()
    }

    /// `Σ unit_price × quantity` over all lines. No side effects.
    pub fn compute_subtotal(
        &self,
        items: &[LineItem],
        catalog: &impl CatalogLookup,
    ) -> CoreResult<Money> {
        sum_lines(&self.price_lines(items, catalog)?)
    }

    /// Looks up a code (case-insensitive) and computes what it takes off.
    ///
    /// Read-only: the usage counter is only incremented by the commit path.
    pub fn apply_discount(
        &self,
        subtotal: Money,
        code: &str,
        registry: &impl DiscountRegistry,
    ) -> CoreResult<AppliedDiscount> {
        let canonical = normalize_discount_code(code)
            .map_err(|_| CoreError::discount(code.trim(), DiscountRejection::NotFound))?;

        let discount = registry
            .discount(&canonical)
            .ok_or_else(|| CoreError::discount(&canonical, DiscountRejection::NotFound))?;

        let amount = self.discount_amount(subtotal, discount)?;
        Ok(AppliedDiscount {
            code: canonical,
            amount,
        })
    }

    /// Validates a discount record against a subtotal and computes its amount.
    ///
    /// ## Rules
    /// ```text
    /// inactive                    → DiscountInvalid(Inactive)
    /// used_count ≥ max_uses       → DiscountInvalid(Exhausted)
    /// subtotal < min_order_amount → DiscountInvalid(BelowMinimum)
    ///
    /// percentage → subtotal × value / 100   (half-up)
    /// fixed      → value
    /// then clamp to max_discount_amount, then clamp to subtotal
    /// ```
    pub fn discount_amount(&self, subtotal: Money, discount: &DiscountCode) -> CoreResult<Money> {
        if !discount.is_active {
            return Err(CoreError::discount(&discount.code, DiscountRejection::Inactive));
        }
        if discount.is_exhausted() {
            return Err(CoreError::discount(&discount.code, DiscountRejection::Exhausted));
        }
        if subtotal < discount.min_order_amount {
            return Err(CoreError::discount(&discount.code, DiscountRejection::BelowMinimum));
        }

        let raw = match discount.rate() {
            Some(rate) => subtotal.apply_rate(rate),
            None => Money::from_minor(discount.value),
        };

        let capped = match discount.max_discount_amount {
            Some(cap) => raw.min(cap),
            None => raw,
        };

        Ok(capped.min(subtotal).floor_zero())
    }

    /// Redeems loyalty points against a subtotal.
    ///
    /// ```text
    /// requested > balance → InsufficientPoints
    /// max_redeemable      = floor(subtotal / point_value)
    /// points_consumed     = min(requested, balance, max_redeemable)
    /// deduction           = points_consumed × point_value
    /// ```
    ///
    /// A missing balance (guest checkout) counts as zero points.
    pub fn apply_loyalty_points(
        &self,
        subtotal: Money,
        points_requested: i64,
        balance: Option<&LoyaltyBalance>,
    ) -> CoreResult<LoyaltyRedemption> {
        validate_points_requested(points_requested)?;
        if points_requested == 0 {
            return Ok(LoyaltyRedemption::default());
        }

        let available = balance.map(|b| b.points).unwrap_or(0);
        if points_requested > available {
            return Err(CoreError::InsufficientPoints {
                requested: points_requested,
                available,
            });
        }

        let max_redeemable = subtotal.whole_units_of(self.policy.point_value);
        let points_consumed = points_requested.min(available).min(max_redeemable);

        Ok(LoyaltyRedemption {
            points_consumed,
            deduction: self.policy.point_value * points_consumed,
        })
    }

    /// Flat shipping: free strictly above the threshold.
    pub fn compute_shipping(&self, subtotal: Money) -> Money {
        if subtotal > self.policy.free_shipping_threshold {
            Money::zero()
        } else {
            self.policy.shipping_fee
        }
    }

    /// Tax on the gross subtotal.
    pub fn compute_tax(&self, subtotal: Money) -> Money {
        subtotal.apply_rate(self.policy.tax_rate).floor_zero()
    }

    /// `subtotal + shipping + tax - discount - loyalty`, floored at zero.
    pub fn compute_total(
        &self,
        subtotal: Money,
        discount_amount: Money,
        loyalty_deduction: Money,
        shipping: Money,
        tax: Money,
    ) -> Money {
        let wide = |m: Money| i128::from(m.minor());
        let total = wide(subtotal) + wide(shipping) + wide(tax)
            - wide(discount_amount)
            - wide(loyalty_deduction);
        Money::from_minor(i64::try_from(total.max(0)).unwrap_or(i64::MAX))
    }

    /// Runs the whole pipeline for a cart.
    ///
    /// ## Example
    /// ```rust
    /// use checkout_core::lookup::{CatalogSnapshot, DiscountSnapshot};
    /// use checkout_core::money::Money;
    /// use checkout_core::pricing::PricingEngine;
    /// use checkout_core::types::{LineItem, Product, QuoteRequest};
    ///
    /// let catalog: CatalogSnapshot = [Product {
    ///     id: "p-1".into(),
    ///     sku: "LAP-01".into(),
    ///     name: "Laptop".into(),
    ///     base_price: Money::from_minor(800_000),
    ///     stock: 5,
    ///     is_active: true,
    ///     variants: vec![],
    /// }]
    /// .into_iter()
    /// .collect();
    ///
    /// let request = QuoteRequest {
    ///     line_items: vec![LineItem::new("p-1", None, 1)],
    ///     ..Default::default()
    /// };
    ///
    /// let quote = PricingEngine::default()
    ///     .quote(&request, &catalog, &DiscountSnapshot::new(), None)
    ///     .unwrap();
    /// assert_eq!(quote.breakdown.total.minor(), 930_000);
    /// ```
    pub fn quote(
        &self,
        request: &QuoteRequest,
        catalog: &impl CatalogLookup,
        registry: &impl DiscountRegistry,
        balance: Option<&LoyaltyBalance>,
    ) -> CoreResult<Quote> {
        if request.line_items.is_empty() {
            return Err(CoreError::Cart("cart is empty".to_string()));
        }

        let lines = self.price_lines(&request.line_items, catalog)?;
        let subtotal = sum_lines(&lines)?;

        let discount = request
            .discount_code
            .as_deref()
            .map(|code| self.apply_discount(subtotal, code, registry))
            .transpose()?;

        let loyalty = self.apply_loyalty_points(
            subtotal,
            request.loyalty_points_requested.unwrap_or(0),
            balance,
        )?;

        let discount_amount = discount.as_ref().map(|d| d.amount).unwrap_or_default();
        let shipping = self.compute_shipping(subtotal);
        let tax = self.compute_tax(subtotal);
        let total = self.compute_total(subtotal, discount_amount, loyalty.deduction, shipping, tax);

        Ok(Quote {
            lines,
            breakdown: PriceBreakdown {
                subtotal,
                discount_amount,
                loyalty_deduction: loyalty.deduction,
                shipping,
                tax,
                total,
            },
            discount,
            loyalty,
        })
    }

    /// Checks an authoritative quote against the preview the shopper saw.
    ///
    /// Unit prices are compared line by line first so the rejection names the
    /// product whose price moved; any remaining difference in the totals is
    /// reported against the order total.
    pub fn verify_preview(&self, preview: &Quote, current: &Quote) -> CoreResult<()> {
        self.verify_line_prices(preview, &current.lines)?;

        if preview.breakdown != current.breakdown {
            return Err(CoreError::PriceChanged {
                subject: "order total".to_string(),
                previewed: preview.breakdown.total,
                current: current.breakdown.total,
            });
        }

        Ok(())
    }

    /// Compares freshly priced lines with the preview, line by line: unit
    /// price and quantity must both match.
    pub fn verify_line_prices(&self, preview: &Quote, current: &[PricedLine]) -> CoreResult<()> {
        for line in current {
            let previewed = preview
                .lines
                .iter()
                .find(|p| p.item.same_target(&line.item.product_id, line.item.variant_id.as_deref()))
                .ok_or_else(|| {
                    CoreError::Cart(format!(
                        "product {} was not part of the previewed cart",
                        line.item.product_id
                    ))
                })?;

            if previewed.unit_price() != line.unit_price() {
                return Err(CoreError::PriceChanged {
                    subject: format!("product {}", line.item.product_id),
                    previewed: previewed.unit_price(),
                    current: line.unit_price(),
                });
            }

            if previewed.item.quantity != line.item.quantity {
                return Err(CoreError::Cart(format!(
                    "quantity of product {} changed since preview",
                    line.item.product_id
                )));
            }
        }

        if preview.lines.len() != current.len() {
            return Err(CoreError::Cart("cart changed since preview".to_string()));
        }

        Ok(())
    }
}

/// Sum of line totals, rejecting a cart whose subtotal overflows.
fn sum_lines(lines: &[PricedLine]) -> CoreResult<Money> {
    lines
        .iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total))
        .ok_or_else(|| CoreError::Cart("order subtotal out of range".to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lookup::{CatalogSnapshot, DiscountSnapshot};
    use crate::types::{DiscountKind, Variant};

    fn product(id: &str, base_price: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{id}"),
            name: format!("Product {id}"),
            base_price: Money::from_minor(base_price),
            stock: 10,
            is_active: true,
            variants: Vec::new(),
        }
    }

    fn laptop_with_variants() -> Product {
        let mut p = product("lap", 800_000);
        p.variants = vec![
            Variant {
                id: "lap-16".to_string(),
                product_id: "lap".to_string(),
                label: "16GB / 512GB".to_string(),
                price: Money::from_minor(900_000),
                stock: 3,
                is_active: true,
            },
            Variant {
                id: "lap-8".to_string(),
                product_id: "lap".to_string(),
                label: "8GB / 256GB".to_string(),
                price: Money::from_minor(700_000),
                stock: 0,
                is_active: false,
            },
        ];
        p
    }

    fn catalog() -> CatalogSnapshot {
        let mut retired = product("old", 100_000);
        retired.is_active = false;
        [product("p-1", 800_000), product("p-2", 150_000), laptop_with_variants(), retired]
            .into_iter()
            .collect()
    }

    fn code(code: &str, kind: DiscountKind, value: i64) -> DiscountCode {
        DiscountCode {
            code: code.to_string(),
            kind,
            value,
            max_uses: 5,
            used_count: 0,
            min_order_amount: Money::zero(),
            max_discount_amount: None,
            is_active: true,
            is_public: true,
        }
    }

    fn balance(points: i64) -> LoyaltyBalance {
        LoyaltyBalance {
            user_id: "u-1".to_string(),
            points,
        }
    }

    fn engine() -> PricingEngine {
        PricingEngine::default()
    }

    // -------------------------------------------------------------------------
    // Subtotal
    // -------------------------------------------------------------------------

    #[test]
    fn test_subtotal_uses_variant_or_base_price() {
        let items = vec![
            LineItem::new("p-1", None, 1),
            LineItem::new("p-2", None, 2),
            LineItem::new("lap", Some("lap-16"), 1),
        ];
        let subtotal = engine().compute_subtotal(&items, &catalog()).unwrap();
        assert_eq!(subtotal.minor(), 800_000 + 300_000 + 900_000);

        let lines = engine().price_lines(&items, &catalog()).unwrap();
        assert_eq!(lines[0].price_source, PriceSource::BasePrice(Money::from_minor(800_000)));
        assert_eq!(lines[2].price_source, PriceSource::VariantPrice(Money::from_minor(900_000)));
        assert_eq!(lines[1].line_total.minor(), 300_000);
    }

    #[test]
    fn test_subtotal_is_idempotent() {
        let items = vec![LineItem::new("p-1", None, 3), LineItem::new("lap", Some("lap-16"), 2)];
        let cat = catalog();
        let first = engine().compute_subtotal(&items, &cat).unwrap();
        let second = engine().compute_subtotal(&items, &cat).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_subtotal_rejects_unknown_and_inactive() {
        let cat = catalog();
        let cases = [
            LineItem::new("missing", None, 1),
            LineItem::new("old", None, 1),
            LineItem::new("lap", Some("lap-404"), 1),
            LineItem::new("lap", Some("lap-8"), 1),
        ];
        for item in cases {
            let err = engine().compute_subtotal(&[item.clone()], &cat).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CatalogLookup, "{item:?}");
        }
    }

    #[test]
    fn test_subtotal_rejects_bad_quantity() {
        let err = engine()
            .compute_subtotal(&[LineItem::new("p-1", None, 100)], &catalog())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_subtotal_overflow_is_rejected() {
        let mut cat = catalog();
        cat.insert(product("huge", i64::MAX / 50));

        let err = engine()
            .compute_subtotal(&[LineItem::new("huge", None, 99)], &cat)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogLookup);

        // Each line fits, their sum does not.
        cat.insert(product("half", i64::MAX / 2 + 1));
        cat.insert(product("half-2", i64::MAX / 2 + 1));
        let items = vec![LineItem::new("half", None, 1), LineItem::new("half-2", None, 1)];
        let err = engine().compute_subtotal(&items, &cat).unwrap_err();
        assert_eq!(err, CoreError::Cart("order subtotal out of range".to_string()));

        let request = QuoteRequest {
            line_items: vec![LineItem::new("huge", None, 99)],
            ..Default::default()
        };
        assert!(engine().quote(&request, &cat, &(), None).is_err());
    }

    #[test]
    fn test_total_saturates_instead_of_overflowing() {
        let total = engine().compute_total(
            Money::from_minor(i64::MAX - 10),
            Money::zero(),
            Money::zero(),
            Money::from_minor(50_000),
            Money::from_minor(1_000),
        );
        assert_eq!(total.minor(), i64::MAX);
    }

    // -------------------------------------------------------------------------
    // Discounts
    // -------------------------------------------------------------------------

    #[test]
    fn test_fixed_discount() {
        let registry: DiscountSnapshot = [code("SAVE5", DiscountKind::Fixed, 50_000)].into_iter().collect();
        let applied = engine()
            .apply_discount(Money::from_minor(800_000), "save5", &registry)
            .unwrap();
        assert_eq!(applied.code, "SAVE5");
        assert_eq!(applied.amount.minor(), 50_000);
    }

    #[test]
    fn test_percentage_discount_with_cap() {
        let mut pct = code("PCT20", DiscountKind::Percentage, 20);
        let subtotal = Money::from_minor(1_000_000);
        assert_eq!(engine().discount_amount(subtotal, &pct).unwrap().minor(), 200_000);

        pct.max_discount_amount = Some(Money::from_minor(120_000));
        assert_eq!(engine().discount_amount(subtotal, &pct).unwrap().minor(), 120_000);

        // cap above the raw amount changes nothing
        pct.max_discount_amount = Some(Money::from_minor(500_000));
        assert_eq!(engine().discount_amount(subtotal, &pct).unwrap().minor(), 200_000);
    }

    #[test]
    fn test_discount_never_exceeds_subtotal() {
        let fixed = code("BIG01", DiscountKind::Fixed, 900_000);
        let subtotal = Money::from_minor(150_000);
        assert_eq!(engine().discount_amount(subtotal, &fixed).unwrap(), subtotal);

        let full = code("ALL00", DiscountKind::Percentage, 100);
        assert_eq!(engine().discount_amount(subtotal, &full).unwrap(), subtotal);
    }

    #[test]
    fn test_discount_rejections() {
        let subtotal = Money::from_minor(200_000);

        let mut inactive = code("OFF01", DiscountKind::Fixed, 1000);
        inactive.is_active = false;
        let mut exhausted = code("USED1", DiscountKind::Fixed, 1000);
        exhausted.used_count = exhausted.max_uses;
        let mut minimum = code("MIN50", DiscountKind::Fixed, 1000);
        minimum.min_order_amount = Money::from_minor(200_001);

        let cases = [
            (inactive, DiscountRejection::Inactive),
            (exhausted, DiscountRejection::Exhausted),
            (minimum, DiscountRejection::BelowMinimum),
        ];
        for (discount, expected) in cases {
            let err = engine().discount_amount(subtotal, &discount).unwrap_err();
            assert_eq!(err, CoreError::discount(&discount.code, expected));
        }

        let registry = DiscountSnapshot::new();
        let err = engine().apply_discount(subtotal, "NOPE1", &registry).unwrap_err();
        assert_eq!(err, CoreError::discount("NOPE1", DiscountRejection::NotFound));

        let err = engine().apply_discount(subtotal, "bad code", &registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DiscountInvalid);
    }

    #[test]
    fn test_minimum_order_amount_is_inclusive() {
        let mut minimum = code("MIN50", DiscountKind::Fixed, 1000);
        minimum.min_order_amount = Money::from_minor(500_000);
        assert!(engine().discount_amount(Money::from_minor(500_000), &minimum).is_ok());
    }

    // -------------------------------------------------------------------------
    // Loyalty
    // -------------------------------------------------------------------------

    #[test]
    fn test_loyalty_capped_by_subtotal() {
        let redemption = engine()
            .apply_loyalty_points(Money::from_minor(300_000), 500, Some(&balance(500)))
            .unwrap();
        assert_eq!(redemption.points_consumed, 300);
        assert_eq!(redemption.deduction.minor(), 300_000);
    }

    #[test]
    fn test_loyalty_floor_division() {
        let redemption = engine()
            .apply_loyalty_points(Money::from_minor(2_999), 10, Some(&balance(10)))
            .unwrap();
        assert_eq!(redemption.points_consumed, 2);
        assert_eq!(redemption.deduction.minor(), 2_000);
    }

    #[test]
    fn test_loyalty_insufficient_points() {
        let err = engine()
            .apply_loyalty_points(Money::from_minor(300_000), 501, Some(&balance(500)))
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientPoints {
                requested: 501,
                available: 500
            }
        );

        // guests have no balance
        let err = engine()
            .apply_loyalty_points(Money::from_minor(300_000), 1, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientPoints);
    }

    #[test]
    fn test_loyalty_zero_request_needs_no_balance() {
        let redemption = engine()
            .apply_loyalty_points(Money::from_minor(300_000), 0, None)
            .unwrap();
        assert_eq!(redemption, LoyaltyRedemption::default());

        assert!(engine()
            .apply_loyalty_points(Money::from_minor(300_000), -1, Some(&balance(5)))
            .is_err());
    }

    // -------------------------------------------------------------------------
    // Shipping, tax, total
    // -------------------------------------------------------------------------

    #[test]
    fn test_free_shipping_boundary() {
        assert_eq!(engine().compute_shipping(Money::from_minor(1_000_000)).minor(), 50_000);
        assert_eq!(engine().compute_shipping(Money::from_minor(1_000_001)).minor(), 0);
        assert_eq!(engine().compute_shipping(Money::zero()).minor(), 50_000);
    }

    #[test]
    fn test_tax_is_ten_percent_of_gross() {
        assert_eq!(engine().compute_tax(Money::from_minor(800_000)).minor(), 80_000);
        assert_eq!(engine().compute_tax(Money::from_minor(15)).minor(), 2);
    }

    #[test]
    fn test_total_identity_and_floor() {
        let e = engine();
        let grid = [0_i64, 1, 999, 50_000, 300_000, 1_000_000, 1_000_001, 7_654_321];
        for subtotal in grid {
            let subtotal = Money::from_minor(subtotal);
            let shipping = e.compute_shipping(subtotal);
            let tax = e.compute_tax(subtotal);
            for discount_share in [0_i64, 1, 2] {
                let discount = Money::from_minor(subtotal.minor() * discount_share / 2);
                let remaining = subtotal - discount;
                for loyalty in [Money::zero(), remaining] {
                    let total = e.compute_total(subtotal, discount, loyalty, shipping, tax);
                    assert_eq!(total, subtotal + shipping + tax - discount - loyalty);
                    assert!(!total.is_negative());
                }
            }
        }

        let floored = e.compute_total(
            Money::from_minor(100),
            Money::from_minor(100),
            Money::from_minor(500),
            Money::zero(),
            Money::zero(),
        );
        assert_eq!(floored, Money::zero());
    }

    // -------------------------------------------------------------------------
    // Quote
    // -------------------------------------------------------------------------

    #[test]
    fn test_end_to_end_save5_scenario() {
        let registry: DiscountSnapshot = [code("SAVE5", DiscountKind::Fixed, 50_000)].into_iter().collect();
        let request = QuoteRequest {
            line_items: vec![LineItem::new("p-1", None, 1)],
            discount_code: Some("SAVE5".to_string()),
            loyalty_points_requested: None,
        };

        let quote = engine().quote(&request, &catalog(), &registry, None).unwrap();
        assert_eq!(
            quote.breakdown,
            PriceBreakdown {
                subtotal: Money::from_minor(800_000),
                discount_amount: Money::from_minor(50_000),
                loyalty_deduction: Money::zero(),
                shipping: Money::from_minor(50_000),
                tax: Money::from_minor(80_000),
                total: Money::from_minor(880_000),
            }
        );
        assert_eq!(
            quote.discount,
            Some(AppliedDiscount {
                code: "SAVE5".to_string(),
                amount: Money::from_minor(50_000)
            })
        );
    }

    #[test]
    fn test_quote_with_loyalty_and_free_shipping() {
        let request = QuoteRequest {
            line_items: vec![LineItem::new("lap", Some("lap-16"), 2)],
            discount_code: None,
            loyalty_points_requested: Some(100),
        };
        let quote = engine()
            .quote(&request, &catalog(), &(), Some(&balance(250)))
            .unwrap();

        // subtotal 1,800,000: free shipping, tax 180,000, 100 points = 100,000
        assert_eq!(quote.breakdown.shipping, Money::zero());
        assert_eq!(quote.breakdown.tax.minor(), 180_000);
        assert_eq!(quote.loyalty.points_consumed, 100);
        assert_eq!(quote.breakdown.total.minor(), 1_800_000 + 180_000 - 100_000);
    }

    #[test]
    fn test_quote_rejects_empty_cart() {
        let err = engine()
            .quote(&QuoteRequest::default(), &catalog(), &(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cart);
    }

    #[test]
    fn test_custom_policy() {
        let policy = PricingPolicy {
            tax_rate: Rate::from_bps(825),
            free_shipping_threshold: Money::from_minor(100),
            shipping_fee: Money::from_minor(7),
            point_value: Money::from_minor(10),
            accrual: None,
        };
        let e = PricingEngine::new(policy);
        assert_eq!(e.compute_tax(Money::from_minor(1000)).minor(), 83);
        assert_eq!(e.compute_shipping(Money::from_minor(100)).minor(), 7);
        assert_eq!(e.compute_shipping(Money::from_minor(101)).minor(), 0);
        let r = e
            .apply_loyalty_points(Money::from_minor(55), 9, Some(&balance(9)))
            .unwrap();
        assert_eq!(r.points_consumed, 5);
        assert_eq!(r.deduction.minor(), 50);
    }

    // -------------------------------------------------------------------------
    // Preview verification
    // -------------------------------------------------------------------------

    #[test]
    fn test_verify_preview_detects_price_change() {
        let request = QuoteRequest {
            line_items: vec![LineItem::new("p-1", None, 1)],
            ..Default::default()
        };
        let preview = engine().quote(&request, &catalog(), &(), None).unwrap();
        assert!(engine().verify_preview(&preview, &preview).is_ok());

        let mut repriced = catalog();
        repriced.insert(product("p-1", 820_000));
        let current = engine().quote(&request, &repriced, &(), None).unwrap();

        let err = engine().verify_preview(&preview, &current).unwrap_err();
        assert_eq!(
            err,
            CoreError::PriceChanged {
                subject: "product p-1".to_string(),
                previewed: Money::from_minor(800_000),
                current: Money::from_minor(820_000),
            }
        );
    }

    #[test]
    fn test_verify_line_prices_detects_quantity_swap() {
        let mut cat = catalog();
        cat.insert(product("a", 100_000));
        cat.insert(product("b", 100_000));

        let quote_for = |a: i64, b: i64| {
            let request = QuoteRequest {
                line_items: vec![LineItem::new("a", None, a), LineItem::new("b", None, b)],
                ..Default::default()
            };
            engine().quote(&request, &cat, &(), None).unwrap()
        };
        let preview = quote_for(2, 1);
        let current = quote_for(1, 2);
        assert_eq!(preview.breakdown, current.breakdown);

        let err = engine().verify_line_prices(&preview, &current.lines).unwrap_err();
        assert_eq!(err, CoreError::Cart("quantity of product a changed since preview".to_string()));
        assert!(engine().verify_preview(&preview, &current).is_err());
        assert!(engine().verify_preview(&preview, &preview).is_ok());
    }

    #[test]
    fn test_verify_preview_detects_total_drift() {
        let request = QuoteRequest {
            line_items: vec![LineItem::new("p-1", None, 1)],
            ..Default::default()
        };
        let preview = engine().quote(&request, &catalog(), &(), None).unwrap();

        let other_policy = PricingEngine::new(PricingPolicy {
            shipping_fee: Money::from_minor(60_000),
            ..PricingPolicy::default()
        });
        let current = other_policy.quote(&request, &catalog(), &(), None).unwrap();

        let err = engine().verify_preview(&preview, &current).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PriceChanged);
    }
}
