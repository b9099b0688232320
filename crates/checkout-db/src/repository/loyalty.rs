//! # Loyalty Repository
//!
//! Point balances per user. A user without a row has zero points.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use checkout_core::{LoyaltyBalance, ValidationError};

use crate::error::DbResult;

// =============================================================================
// Connection-level helpers (usable inside a transaction)
// =============================================================================

pub(crate) async fn fetch_balance(conn: &mut SqliteConnection, user_id: &str) -> DbResult<LoyaltyBalance> {
    let points: Option<i64> = sqlx::query_scalar("SELECT points FROM loyalty_balances WHERE user_id = ?1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(LoyaltyBalance {
        user_id: user_id.to_string(),
        points: points.unwrap_or(0),
    })
}

pub(crate) async fn credit_points(conn: &mut SqliteConnection, user_id: &str, points: i64) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO loyalty_balances (user_id, points, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (user_id) DO UPDATE
        SET points = points + excluded.points, updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(points)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Conditionally spends points. Returns `false` (and writes nothing) when the
/// balance is too small.
pub(crate) async fn debit_points(conn: &mut SqliteConnection, user_id: &str, points: i64) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE loyalty_balances
        SET points = points - ?2, updated_at = ?3
        WHERE user_id = ?1 AND points >= ?2
        "#,
    )
    .bind(user_id)
    .bind(points)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for loyalty balances.
#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    /// Creates a new LoyaltyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    /// Gets a user's balance. Unknown users have zero points.
    pub async fn balance(&self, user_id: &str) -> DbResult<LoyaltyBalance> {
        let mut conn = self.pool.acquire().await?;
        fetch_balance(&mut conn, user_id).await
    }

    /// Adds points to a user's balance and returns the new balance.
    pub async fn credit(&self, user_id: &str, points: i64) -> DbResult<LoyaltyBalance> {
        if points < 0 {
            return Err(ValidationError::Negative {
                field: "loyalty points".to_string(),
            }
            .into());
        }

        debug!(user_id = %user_id, points, "Crediting loyalty points");

        let mut conn = self.pool.acquire().await?;
        credit_points(&mut conn, user_id, points).await?;
        let balance = fetch_balance(&mut conn, user_id).await?;

        info!(user_id = %user_id, balance = balance.points, "Loyalty balance updated");
        Ok(balance)
    }
}
