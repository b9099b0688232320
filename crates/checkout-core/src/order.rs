//! # Orders
//!
//! An order is the frozen result of a successful checkout. After creation it
//! only changes through the status state machine below.
//!
//! ## Status State Machine
//! ```text
//!   pending ──► confirmed ──► processing ──► shipped ──► delivered
//!      │            │                                        │
//!      └─────┬──────┘                                        │ within return
//!            ▼                                               ▼ window
//!        cancelled                                       returned
//! ```
//!
//! Every transition appends a [`StatusHistoryEntry`]. Entries are never
//! edited or removed.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartOwner, CheckoutDetails, PaymentMethod, PriceBreakdown, Quote, ShippingAddress};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    /// The next step of forward progression, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Returned => None,
        }
    }

    /// Whether the edge `self → to` exists, ignoring the return window.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        match (self, to) {
            (OrderStatus::Pending | OrderStatus::Confirmed, OrderStatus::Cancelled) => true,
            (OrderStatus::Delivered, OrderStatus::Returned) => true,
            (from, to) => from.next() == Some(to),
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    #[ts(as = "String")]
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// A line frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderLine {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub line_total: Money,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Human-readable number, e.g. `ORD-20250114-3F9A1C`.
    pub order_number: String,
    pub owner: CartOwner,
    pub lines: Vec<OrderLine>,
    pub breakdown: PriceBreakdown,
    pub discount_code: Option<String>,
    pub points_used: i64,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
    pub status: OrderStatus,
    pub history: Vec<StatusHistoryEntry>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Builds a pending order from an authoritative quote.
    pub fn place(owner: CartOwner, quote: &Quote, details: CheckoutDetails, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        let suffix = id.simple().to_string()[..6].to_ascii_uppercase();

        let lines = quote
            .lines
            .iter()
            .map(|line| OrderLine {
                product_id: line.item.product_id.clone(),
                variant_id: line.item.variant_id.clone(),
                name: line.name.clone(),
                unit_price: line.unit_price(),
                quantity: line.item.quantity,
                line_total: line.line_total,
            })
            .collect();

        Order {
            id: id.to_string(),
            order_number: format!("ORD-{}-{}", now.format("%Y%m%d"), suffix),
            owner,
            lines,
            breakdown: quote.breakdown,
            discount_code: quote.discount.as_ref().map(|d| d.code.clone()),
            points_used: quote.loyalty.points_consumed,
            shipping_address: details.shipping_address,
            payment_method: details.payment_method,
            note: details.note,
            status: OrderStatus::Pending,
            history: vec![StatusHistoryEntry {
                status: OrderStatus::Pending,
                at: now,
                note: None,
            }],
            created_at: now,
            updated_at: now,
            delivered_at: None,
        }
    }

    /// Checks a transition without applying it.
    ///
    /// ## Errors
    /// `InvalidStatusTransition` when the edge doesn't exist, or when a return
    /// is requested after the window following delivery has closed.
    pub fn check_transition(
        &self,
        to: OrderStatus,
        now: DateTime<Utc>,
        return_window: Duration,
    ) -> CoreResult<()> {
        let allowed = self.status.can_transition_to(to)
            && match to {
                OrderStatus::Returned => self
                    .delivered_at
                    .is_some_and(|delivered| now <= delivered + return_window),
                _ => true,
            };

        if allowed {
            Ok(())
        } else {
            Err(CoreError::InvalidStatusTransition {
                order_id: self.id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Moves the order to `to` and appends the history entry.
    pub fn transition(
        &mut self,
        to: OrderStatus,
        note: Option<String>,
        now: DateTime<Utc>,
        return_window: Duration,
    ) -> CoreResult<()> {
        self.check_transition(to, now, return_window)?;

        self.status = to;
        self.updated_at = now;
        if to == OrderStatus::Delivered {
            self.delivered_at = Some(now);
        }
        self.history.push(StatusHistoryEntry {
            status: to,
            at: now,
            note,
        });
        Ok(())
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}
