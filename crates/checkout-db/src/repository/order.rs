//! # Order Repository
//!
//! Database operations for orders, their line snapshots and status history.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE (checkout::finalize_order, same transaction as the commit)   │
//! │     └── insert_order() → Order { status: Pending } + history[pending]   │
//! │                                                                         │
//! │  2. PROGRESS (admin)                                                    │
//! │     └── transition_status(confirmed | processing | shipped)             │
//! │                                                                         │
//! │  3. DELIVER                                                             │
//! │     └── transition_status(delivered) → delivered_at, accrual credited   │
//! │                                                                         │
//! │  4. (OPTIONAL) CANCEL before processing, RETURN within the window       │
//! │     └── transition_status(cancelled) → stock released                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status updates are guarded with `WHERE status = <expected>` so two admins
//! acting on the same order cannot both succeed from the same state.

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use checkout_core::{
    AccrualRule, CartOwner, CoreError, Money, Order, OrderLine, OrderStatus, PaymentMethod,
    PriceBreakdown, ShippingAddress, StatusHistoryEntry,
};

use crate::error::{CheckoutResult, DbError, DbResult};
use crate::repository::catalog::release_stock;
use crate::repository::loyalty::credit_points;

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    user_id: Option<String>,
    guest_token: Option<String>,
    subtotal: i64,
    discount_amount: i64,
    loyalty_deduction: i64,
    shipping: i64,
    tax: i64,
    total: i64,
    discount_code: Option<String>,
    points_used: i64,
    recipient: String,
    phone: String,
    street: String,
    city: String,
    postal_code: Option<String>,
    payment_method: PaymentMethod,
    note: Option<String>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    product_id: String,
    variant_id: Option<String>,
    name: String,
    unit_price: i64,
    quantity: i64,
    line_total: i64,
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    status: OrderStatus,
    at: DateTime<Utc>,
    note: Option<String>,
}

const SELECT_ORDER: &str = r#"
    SELECT id, order_number, user_id, guest_token,
           subtotal, discount_amount, loyalty_deduction, shipping, tax, total,
           discount_code, points_used,
           recipient, phone, street, city, postal_code,
           payment_method, note, status,
           created_at, updated_at, delivered_at
    FROM orders
"#;

// =============================================================================
// Connection-level helpers (usable inside a transaction)
// =============================================================================

/// Inserts an order with its lines and history.
pub(crate) async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

    let b = &order.breakdown;
    let address = &order.shipping_address;

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, user_id, guest_token,
            subtotal, discount_amount, loyalty_deduction, shipping, tax, total,
            discount_code, points_used,
            recipient, phone, street, city, postal_code,
            payment_method, note, status,
            created_at, updated_at, delivered_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8, ?9, ?10,
            ?11, ?12,
            ?13, ?14, ?15, ?16, ?17,
            ?18, ?19, ?20,
            ?21, ?22, ?23
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(order.owner.user_id())
    .bind(order.owner.guest_token())
    .bind(b.subtotal.minor())
    .bind(b.discount_amount.minor())
    .bind(b.loyalty_deduction.minor())
    .bind(b.shipping.minor())
    .bind(b.tax.minor())
    .bind(b.total.minor())
    .bind(&order.discount_code)
    .bind(order.points_used)
    .bind(&address.recipient)
    .bind(&address.phone)
    .bind(&address.street)
    .bind(&address.city)
    .bind(&address.postal_code)
    .bind(order.payment_method)
    .bind(&order.note)
    .bind(order.status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.delivered_at)
    .execute(&mut *conn)
    .await?;

    for (position, line) in order.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                order_id, position, product_id, variant_id, name, unit_price, quantity, line_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(position as i64)
        .bind(&line.product_id)
        .bind(&line.variant_id)
        .bind(&line.name)
        .bind(line.unit_price.minor())
        .bind(line.quantity)
        .bind(line.line_total.minor())
        .execute(&mut *conn)
        .await?;
    }

    for entry in &order.history {
        append_history(conn, &order.id, entry).await?;
    }

    Ok(())
}

async fn append_history(conn: &mut SqliteConnection, order_id: &str, entry: &StatusHistoryEntry) -> DbResult<()> {
    sqlx::query("INSERT INTO order_status_history (order_id, status, at, note) VALUES (?1, ?2, ?3, ?4)")
        .bind(order_id)
        .bind(entry.status)
        .bind(entry.at)
        .bind(&entry.note)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn assemble(conn: &mut SqliteConnection, row: OrderRow) -> DbResult<Order> {
    let items: Vec<OrderItemRow> = sqlx::query_as(
        r#"
        SELECT product_id, variant_id, name, unit_price, quantity, line_total
        FROM order_items
        WHERE order_id = ?1
        ORDER BY position
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    let history: Vec<HistoryRow> = sqlx::query_as(
        "SELECT status, at, note FROM order_status_history WHERE order_id = ?1 ORDER BY id",
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    let owner = match (row.user_id, row.guest_token) {
        (Some(user_id), None) => CartOwner::User { user_id },
        (None, Some(session_token)) => CartOwner::Guest { session_token },
        _ => return Err(DbError::Internal(format!("order {} has no single owner", row.id))),
    };

    Ok(Order {
        id: row.id,
        order_number: row.order_number,
        owner,
        lines: items
            .into_iter()
            .map(|i| OrderLine {
                product_id: i.product_id,
                variant_id: i.variant_id,
                name: i.name,
                unit_price: Money::from_minor(i.unit_price),
                quantity: i.quantity,
                line_total: Money::from_minor(i.line_total),
            })
            .collect(),
        breakdown: PriceBreakdown {
            subtotal: Money::from_minor(row.subtotal),
            discount_amount: Money::from_minor(row.discount_amount),
            loyalty_deduction: Money::from_minor(row.loyalty_deduction),
            shipping: Money::from_minor(row.shipping),
            tax: Money::from_minor(row.tax),
            total: Money::from_minor(row.total),
        },
        discount_code: row.discount_code,
        points_used: row.points_used,
        shipping_address: ShippingAddress {
            recipient: row.recipient,
            phone: row.phone,
            street: row.street,
            city: row.city,
            postal_code: row.postal_code,
        },
        payment_method: row.payment_method,
        note: row.note,
        status: row.status,
        history: history
            .into_iter()
            .map(|h| StatusHistoryEntry {
                status: h.status,
                at: h.at,
                note: h.note,
            })
            .collect(),
        created_at: row.created_at,
        updated_at: row.updated_at,
        delivered_at: row.delivered_at,
    })
}

pub(crate) async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(&format!("{SELECT_ORDER} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(assemble(conn, row).await?)),
        None => Ok(None),
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    accrual: Option<AccrualRule>,
    return_window: Duration,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    ///
    /// `accrual` is the points-per-spend rule applied on delivery; `None`
    /// means delivered orders earn nothing.
    pub fn new(pool: SqlitePool, accrual: Option<AccrualRule>, return_window: Duration) -> Self {
        OrderRepository {
            pool,
            accrual,
            return_window,
        }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// Gets an order by its human-readable number.
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<OrderRow> = sqlx::query_as(&format!("{SELECT_ORDER} WHERE order_number = ?1"))
            .bind(order_number)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(assemble(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "{SELECT_ORDER} WHERE user_id = ?1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(assemble(&mut conn, row).await?);
        }
        Ok(orders)
    }

    /// Moves an order to a new status.
    ///
    /// ## What Happens (one transaction)
    /// 1. The state machine checks the edge (and the return window)
    /// 2. `UPDATE ... WHERE status = <current>`; losing a race is an
    ///    `InvalidStatusTransition`
    /// 3. The history entry is appended
    /// 4. Cancelled: every line's stock is released
    /// 5. Delivered: accrual points are credited to the user, if configured
    pub async fn transition_status(
        &self,
        order_id: &str,
        to: OrderStatus,
        note: Option<String>,
    ) -> CheckoutResult<Order> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Touch the row first so the transaction takes the write lock up front.
        let touched = sqlx::query("UPDATE orders SET updated_at = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id).into());
        }

        let mut order = fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;
        let from = order.status;

        if let Err(err) = order.transition(to, note, now, self.return_window) {
            warn!(order_id = %order_id, from = %from, to = %to, "Status transition rejected");
            return Err(err.into());
        }

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?2, updated_at = ?3, delivered_at = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(order_id)
        .bind(to)
        .bind(now)
        .bind(order.delivered_at)
        .bind(from)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::InvalidStatusTransition {
                order_id: order_id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            }
            .into());
        }

        if let Some(entry) = order.history.last() {
            append_history(&mut tx, order_id, entry).await?;
        }

        match to {
            OrderStatus::Cancelled => {
                for line in &order.lines {
                    release_stock(&mut tx, &line.product_id, line.variant_id.as_deref(), line.quantity).await?;
                }
            }
            OrderStatus::Delivered => {
                if let (Some(rule), Some(user_id)) = (self.accrual, order.owner.user_id()) {
                    let earned = rule.points_for(order.breakdown.total);
                    if earned > 0 {
                        credit_points(&mut tx, user_id, earned).await?;
                        info!(order_id = %order_id, user_id = %user_id, earned, "Loyalty points accrued");
                    }
                }
            }
            _ => {}
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            order_number = %order.order_number,
            from = %from,
            to = %to,
            "Order status changed"
        );
        Ok(order)
    }
}
