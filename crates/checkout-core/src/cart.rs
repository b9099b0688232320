//! # Cart
//!
//! An explicit, id-keyed cart. Callers load it, mutate it through these
//! methods, and save it back; there is no ambient "current cart".
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Shopper Action           Method                   State Change         │
//! │  ──────────────           ──────                   ────────────         │
//! │                                                                         │
//! │  Add to cart ───────────► add_item() ────────────► push / merge line    │
//! │  Change quantity ───────► update_quantity() ─────► line.qty = n         │
//! │  Remove ────────────────► remove_item() ─────────► retain               │
//! │  Enter code ────────────► apply_discount_code() ─► canonical code       │
//! │  Use points ────────────► set_loyalty_points() ──► points requested     │
//! │  Log in ────────────────► merge_guest() ─────────► guest lines folded   │
//! │  Checkout / Clear ──────► clear() ───────────────► empty                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices are never stored on the cart: [`Cart::quote_request`] hands the
//! lines to the pricing engine, which resolves prices from the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::{CartOwner, LineItem, QuoteRequest};
use crate::validation::{
    normalize_discount_code, validate_cart_size, validate_identifier, validate_points_requested,
    validate_quantity,
};
use crate::MAX_ITEM_QUANTITY;

/// A shopper's cart.
///
/// ## Invariants
/// - Lines are unique by product + variant (adding again increases quantity)
/// - Every quantity is within 1..=99
/// - The discount code, when present, is canonical uppercase
/// - Guests never request loyalty points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cart {
    pub id: String,
    pub owner: CartOwner,
    pub items: Vec<LineItem>,
    pub discount_code: Option<String>,
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart for an owner.
    pub fn new(owner: CartOwner) -> Self {
        let now = Utc::now();
        Cart {
            id: Uuid::new_v4().to_string(),
            owner,
            items: Vec::new(),
            discount_code: None,
            loyalty_points: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn line_mut(&mut self, product_id: &str, variant_id: Option<&str>) -> Option<&mut LineItem> {
        self.items
            .iter_mut()
            .find(|i| i.same_target(product_id, variant_id))
    }

    /// Adds a product (or variant) or increases its quantity if present.
    ///
    /// ## Errors
    /// - Quantity outside 1..=99, before or after merging
    /// - Cart already holds the maximum number of distinct lines
    pub fn add_item(
        &mut self,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> CoreResult<()> {
        validate_identifier("product id", product_id)?;
        validate_quantity(quantity)?;

        if let Some(line) = self.line_mut(product_id, variant_id) {
            let new_qty = line.quantity + quantity;
            validate_quantity(new_qty)?;
            line.quantity = new_qty;
            self.touch();
            return Ok(());
        }

        validate_cart_size(self.items.len())?;
        self.items.push(LineItem::new(product_id, variant_id, quantity));
        self.touch();
        Ok(())
    }

    /// Sets the quantity of an existing line. Zero removes the line.
    pub fn update_quantity(
        &mut self,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id, variant_id);
        }

        validate_quantity(quantity)?;

        let line = self
            .line_mut(product_id, variant_id)
            .ok_or_else(|| CoreError::Cart(format!("product {product_id} not in cart")))?;
        line.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Removes a line by product + variant.
    pub fn remove_item(&mut self, product_id: &str, variant_id: Option<&str>) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| !i.same_target(product_id, variant_id));

        if self.items.len() == initial_len {
            return Err(CoreError::Cart(format!("product {product_id} not in cart")));
        }

        self.touch();
        Ok(())
    }

    /// Records a discount code after checking its format.
    ///
    /// Whether the code exists and applies is decided at pricing time.
    pub fn apply_discount_code(&mut self, code: &str) -> CoreResult<()> {
        self.discount_code = Some(normalize_discount_code(code)?);
        self.touch();
        Ok(())
    }

    pub fn remove_discount_code(&mut self) {
        self.discount_code = None;
        self.touch();
    }

    /// Sets how many loyalty points to redeem.
    pub fn set_loyalty_points(&mut self, points: i64) -> CoreResult<()> {
        validate_points_requested(points)?;
        if points > 0 && self.owner.user_id().is_none() {
            return Err(CoreError::Cart(
                "guest carts cannot redeem loyalty points".to_string(),
            ));
        }
        self.loyalty_points = points;
        self.touch();
        Ok(())
    }

    /// Empties the cart, including code and points.
    pub fn clear(&mut self) {
        self.items.clear();
        self.discount_code = None;
        self.loyalty_points = 0;
        self.touch();
    }

    /// Folds a guest cart into this (user) cart.
    ///
    /// ## Merge Rules
    /// - Same product + variant: quantities are summed, capped at 99
    /// - New lines are appended in the guest cart's order
    /// - This cart's discount code wins; otherwise the guest's is adopted
    /// - The guest's loyalty points are ignored (guests cannot hold any)
    pub fn merge_guest(&mut self, guest: Cart) -> CoreResult<()> {
        if self.owner.user_id().is_none() {
            return Err(CoreError::Cart(
                "guest carts can only be merged into a user cart".to_string(),
            ));
        }
        if guest.owner.guest_token().is_none() {
            return Err(CoreError::Cart("only guest carts can be merged".to_string()));
        }

        for item in guest.items {
            match self.line_mut(&item.product_id, item.variant_id.as_deref()) {
                Some(line) => {
                    line.quantity = (line.quantity + item.quantity).min(MAX_ITEM_QUANTITY);
                }
                None => {
                    validate_cart_size(self.items.len())?;
                    self.items.push(item);
                }
            }
        }

        if self.discount_code.is_none() {
            self.discount_code = guest.discount_code;
        }

        self.touch();
        Ok(())
    }

    /// Returns the number of distinct lines in the cart.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the total quantity of all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The pricing input for this cart.
    pub fn quote_request(&self) -> QuoteRequest {
        QuoteRequest {
            line_items: self.items.clone(),
            discount_code: self.discount_code.clone(),
            loyalty_points_requested: (self.loyalty_points > 0).then_some(self.loyalty_points),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn user_cart() -> Cart {
        Cart::new(CartOwner::user("u-1"))
    }

    fn guest_cart() -> Cart {
        Cart::new(CartOwner::guest("guest-token"))
    }

    #[test]
    fn test_cart_add_item() {
        let mut cart = user_cart();
        cart.add_item("p-1", None, 2).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 2);
    }

    #[test]
    fn test_cart_add_same_product_increases_quantity() {
        let mut cart = user_cart();
        cart.add_item("p-1", None, 2).unwrap();
        cart.add_item("p-1", None, 3).unwrap();
        cart.add_item("p-1", Some("v-1"), 1).unwrap();

        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.total_quantity(), 6);
    }

    #[test]
    fn test_cart_quantity_limit() {
        let mut cart = user_cart();
        cart.add_item("p-1", None, 98).unwrap();
        let err = cart.add_item("p-1", None, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(cart.total_quantity(), 98);

        assert!(cart.add_item("p-2", None, 0).is_err());
        assert!(cart.update_quantity("p-1", None, 100).is_err());
    }

    #[test]
    fn test_cart_update_and_remove() {
        let mut cart = user_cart();
        cart.add_item("p-1", None, 2).unwrap();
        cart.add_item("p-2", None, 1).unwrap();

        cart.update_quantity("p-1", None, 5).unwrap();
        assert_eq!(cart.items[0].quantity, 5);

        cart.update_quantity("p-1", None, 0).unwrap();
        assert_eq!(cart.item_count(), 1);

        assert_eq!(cart.remove_item("p-1", None).unwrap_err().kind(), ErrorKind::Cart);
        cart.remove_item("p-2", None).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_discount_code_is_normalized() {
        let mut cart = user_cart();
        cart.apply_discount_code("save5").unwrap();
        assert_eq!(cart.discount_code.as_deref(), Some("SAVE5"));

        assert!(cart.apply_discount_code("TOO-LONG").is_err());
        assert_eq!(cart.discount_code.as_deref(), Some("SAVE5"));

        cart.remove_discount_code();
        assert_eq!(cart.discount_code, None);
    }

    #[test]
    fn test_guest_cannot_redeem_points() {
        let mut cart = guest_cart();
        assert!(cart.set_loyalty_points(10).is_err());
        cart.set_loyalty_points(0).unwrap();

        let mut cart = user_cart();
        cart.set_loyalty_points(10).unwrap();
        assert!(cart.set_loyalty_points(-5).is_err());
        assert_eq!(cart.loyalty_points, 10);
    }

    #[test]
    fn test_cart_clear() {
        let mut cart = user_cart();
        cart.add_item("p-1", None, 2).unwrap();
        cart.apply_discount_code("SAVE5").unwrap();
        cart.set_loyalty_points(3).unwrap();

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.discount_code, None);
        assert_eq!(cart.loyalty_points, 0);
    }

    #[test]
    fn test_merge_guest_cart() {
        let mut user = user_cart();
        user.add_item("p-1", None, 90).unwrap();

        let mut guest = guest_cart();
        guest.add_item("p-1", None, 20).unwrap();
        guest.add_item("p-2", Some("v-2"), 1).unwrap();
        guest.apply_discount_code("GUEST").unwrap();

        user.merge_guest(guest).unwrap();

        assert_eq!(user.item_count(), 2);
        assert_eq!(user.items[0].quantity, MAX_ITEM_QUANTITY);
        assert_eq!(user.items[1], LineItem::new("p-2", Some("v-2"), 1));
        assert_eq!(user.discount_code.as_deref(), Some("GUEST"));
    }

    #[test]
    fn test_merge_keeps_user_discount_code() {
        let mut user = user_cart();
        user.apply_discount_code("USER1").unwrap();
        let mut guest = guest_cart();
        guest.apply_discount_code("GUEST").unwrap();

        user.merge_guest(guest).unwrap();
        assert_eq!(user.discount_code.as_deref(), Some("USER1"));
    }

    #[test]
    fn test_merge_requires_user_target_and_guest_source() {
        let mut guest = guest_cart();
        assert!(guest.merge_guest(guest_cart()).is_err());

        let mut user = user_cart();
        assert!(user.merge_guest(user_cart()).is_err());
    }

    #[test]
    fn test_quote_request() {
        let mut cart = user_cart();
        cart.add_item("p-1", None, 1).unwrap();
        assert_eq!(cart.quote_request().loyalty_points_requested, None);

        cart.set_loyalty_points(4).unwrap();
        cart.apply_discount_code("SAVE5").unwrap();
        let request = cart.quote_request();
        assert_eq!(request.line_items.len(), 1);
        assert_eq!(request.discount_code.as_deref(), Some("SAVE5"));
        assert_eq!(request.loyalty_points_requested, Some(4));
    }
}
