//! # Checkout
//!
//! The two call sites of the pricing engine: the read-only preview and the
//! authoritative commit.
//!
//! ## Commit Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    finalize_order (one SQLite transaction)              │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ├─ 0. touch cart row            (first statement is a write)         │
//! │    ├─ 1. stock -= qty  WHERE stock >= qty        per line               │
//! │    ├─ 2. re-price lines, compare unit prices     → PriceChanged         │
//! │    ├─ 3. re-quote (discount + loyalty rules)     → DiscountInvalid ...  │
//! │    ├─ 4. used_count += 1 WHERE used_count < max  → DiscountInvalid      │
//! │    ├─ 5. points -= n   WHERE points >= n         → InsufficientPoints   │
//! │    ├─ 6. compare breakdown with preview          → PriceChanged         │
//! │    ├─ 7. insert order + lines + history[pending], clear cart            │
//! │    │                                                                    │
//! │  COMMIT ── any error above drops the transaction: nothing persisted     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Starting with a write makes SQLite take the write lock immediately, so
//! concurrent commits queue on `busy_timeout` instead of failing on a lock
//! upgrade. Every guard is a conditional `UPDATE`, so the loser of a race on
//! the last unit of stock, the last discount use or the last points sees zero
//! rows affected and rolls back.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use checkout_core::validation::validate_shipping_address;
use checkout_core::{
    Cart, CheckoutDetails, CoreError, DiscountRejection, LoyaltyBalance, Order, PricingEngine, Quote,
};

use crate::error::CheckoutResult;
use crate::repository::cart::{fetch_cart, update_cart, CartKey};
use crate::repository::catalog::{load_snapshot, reserve_stock};
use crate::repository::discount::{claim_use, load_registry};
use crate::repository::loyalty::{debit_points, fetch_balance};
use crate::repository::order::insert_order;

/// Preview and commit, sharing one pricing engine.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
    engine: PricingEngine,
}

impl CheckoutService {
    pub fn new(pool: SqlitePool, engine: PricingEngine) -> Self {
        CheckoutService { pool, engine }
    }

    /// Prices a cart for display.
    ///
    /// Read-only: no counters move, no locks are held beyond the reads, and
    /// any error is safe to retry as-is.
    pub async fn preview(&self, cart: &Cart) -> CheckoutResult<Quote> {
        let mut conn = self.pool.acquire().await?;
        let quote = quote_cart(&mut conn, &self.engine, cart).await?;

        debug!(
            cart_id = %cart.id,
            lines = quote.lines.len(),
            total = %quote.breakdown.total,
            "Cart previewed"
        );
        Ok(quote)
    }

    /// Turns the stored cart into an order, atomically.
    ///
    /// `preview` is the quote the shopper confirmed. The commit re-derives
    /// everything from the database and rejects the order if any part of it
    /// moved since.
    ///
    /// ## Errors
    /// - `CheckoutError::Domain`: a rule rejected the order (stock, price,
    ///   discount, points, empty cart, invalid address). Re-fetch the cart
    ///   and preview again before retrying.
    /// - `CheckoutError::Commit`: storage failed. Nothing was persisted.
    pub async fn finalize_order(
        &self,
        cart_id: &str,
        preview: &Quote,
        details: CheckoutDetails,
    ) -> CheckoutResult<Order> {
        validate_shipping_address(&details.shipping_address)?;

        let mut tx = self.pool.begin().await?;

        match commit_in(&mut tx, &self.engine, cart_id, preview, details).await {
            Ok(order) => {
                tx.commit().await?;
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total = %order.breakdown.total,
                    discount = ?order.discount_code,
                    points_used = order.points_used,
                    "Order committed"
                );
                Ok(order)
            }
            Err(err) => {
                // Dropping `tx` rolls everything back.
                warn!(cart_id = %cart_id, kind = ?err.kind(), error = %err, "Order commit rejected");
                Err(err)
            }
        }
    }
}

/// Loads everything a quote needs and runs the engine.
async fn quote_cart(conn: &mut SqliteConnection, engine: &PricingEngine, cart: &Cart) -> CheckoutResult<Quote> {
    let request = cart.quote_request();
    let catalog = load_snapshot(conn, &request.line_items).await?;
    let registry = load_registry(conn, request.discount_code.as_deref()).await?;
    let balance = load_balance(conn, cart).await?;

    Ok(engine.quote(&request, &catalog, &registry, balance.as_ref())?)
}

async fn load_balance(conn: &mut SqliteConnection, cart: &Cart) -> CheckoutResult<Option<LoyaltyBalance>> {
    match cart.owner.user_id() {
        Some(user_id) => Ok(Some(fetch_balance(conn, user_id).await?)),
        None => Ok(None),
    }
}

async fn commit_in(
    conn: &mut SqliteConnection,
    engine: &PricingEngine,
    cart_id: &str,
    preview: &Quote,
    details: CheckoutDetails,
) -> CheckoutResult<Order> {
    let now = Utc::now();

    // 0. Take the write lock and make sure the cart exists.
    let touched = sqlx::query("UPDATE carts SET updated_at = ?2 WHERE id = ?1")
        .bind(cart_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(CoreError::Cart(format!("cart {cart_id} not found")).into());
    }

    let mut cart = fetch_cart(conn, CartKey::Id(cart_id))
        .await?
        .ok_or_else(|| CoreError::Cart(format!("cart {cart_id} not found")))?;
    if cart.is_empty() {
        return Err(CoreError::Cart("cart is empty".to_string()).into());
    }

    // 1. Reserve stock.
    for item in &cart.items {
        reserve_stock(conn, item).await?;
    }

    // 2. Authoritative unit prices.
    let catalog = load_snapshot(conn, &cart.items).await?;
    let lines = engine.price_lines(&cart.items, &catalog)?;
    engine.verify_line_prices(preview, &lines)?;

    // 3. Full re-quote with the same rules as the preview.
    let request = cart.quote_request();
    let registry = load_registry(conn, request.discount_code.as_deref()).await?;
    let balance = load_balance(conn, &cart).await?;
    let current = engine.quote(&request, &catalog, &registry, balance.as_ref())?;

    // 4. Claim the discount use.
    if let Some(applied) = &current.discount {
        if !claim_use(conn, &applied.code).await? {
            return Err(CoreError::discount(&applied.code, DiscountRejection::Exhausted).into());
        }
    }

    // 5. Spend the points.
    let consumed = current.loyalty.points_consumed;
    if consumed > 0 {
        let user_id = cart
            .owner
            .user_id()
            .ok_or_else(|| CoreError::Cart("guest carts cannot redeem loyalty points".to_string()))?;
        if !debit_points(conn, user_id, consumed).await? {
            let available = fetch_balance(conn, user_id).await?.points;
            return Err(CoreError::InsufficientPoints {
                requested: consumed,
                available,
            }
            .into());
        }
    }

    // 6. The shopper must have seen exactly this.
    engine.verify_preview(preview, &current)?;

    // 7. Persist the order and empty the cart.
    let order = Order::place(cart.owner.clone(), &current, details, now);
    insert_order(conn, &order).await?;

    cart.clear();
    update_cart(conn, &cart).await?;

    Ok(order)
}
