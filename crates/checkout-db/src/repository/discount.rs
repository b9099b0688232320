//! # Discount Repository
//!
//! Discount codes and their usage counters.
//!
//! Codes are stored canonically uppercase, so lookups normalise first and
//! compare exactly. The usage counter is only ever incremented by
//! [`claim_use`], inside the checkout transaction.

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use checkout_core::lookup::DiscountSnapshot;
use checkout_core::validation::{normalize_discount_code, validate_discount_definition};
use checkout_core::{DiscountCode, DiscountKind, Money};

use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct DiscountRow {
    code: String,
    kind: DiscountKind,
    value: i64,
    max_uses: i64,
    used_count: i64,
    min_order_amount: i64,
    max_discount_amount: Option<i64>,
    is_active: bool,
    is_public: bool,
}

impl From<DiscountRow> for DiscountCode {
    fn from(row: DiscountRow) -> Self {
        DiscountCode {
            code: row.code,
            kind: row.kind,
            value: row.value,
            max_uses: row.max_uses,
            used_count: row.used_count,
            min_order_amount: Money::from_minor(row.min_order_amount),
            max_discount_amount: row.max_discount_amount.map(Money::from_minor),
            is_active: row.is_active,
            is_public: row.is_public,
        }
    }
}

const SELECT_DISCOUNT: &str = r#"
    SELECT code, kind, value, max_uses, used_count, min_order_amount,
           max_discount_amount, is_active, is_public
    FROM discount_codes
"#;

// =============================================================================
// Connection-level helpers (usable inside a transaction)
// =============================================================================

/// Loads one code by canonical value.
pub(crate) async fn fetch_discount(
    conn: &mut SqliteConnection,
    canonical: &str,
) -> DbResult<Option<DiscountCode>> {
    let row: Option<DiscountRow> = sqlx::query_as(&format!("{SELECT_DISCOUNT} WHERE code = ?1"))
        .bind(canonical)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(DiscountCode::from))
}

/// Loads the registry entry for a raw code, if any.
///
/// Malformed codes yield an empty registry so the engine reports them as
/// unknown.
pub(crate) async fn load_registry(
    conn: &mut SqliteConnection,
    raw_code: Option<&str>,
) -> DbResult<DiscountSnapshot> {
    let Some(canonical) = raw_code.and_then(|c| normalize_discount_code(c).ok()) else {
        return Ok(DiscountSnapshot::new());
    };

    Ok(fetch_discount(conn, &canonical).await?.into_iter().collect())
}

/// Conditionally records one use of a code.
///
/// Returns `false` when the code is inactive or already at `max_uses`;
/// nothing is written in that case.
pub(crate) async fn claim_use(conn: &mut SqliteConnection, canonical: &str) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE discount_codes
        SET used_count = used_count + 1
        WHERE code = ?1 AND is_active = 1 AND used_count < max_uses
        "#,
    )
    .bind(canonical)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for discount code operations.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    /// Creates a new DiscountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Creates a discount code.
    ///
    /// ## Validation
    /// - Code: exactly 5 letters/digits (stored uppercase)
    /// - Percentage value 1..=100, fixed value > 0
    /// - `max_uses` 1..=10, `used_count` starts at 0
    /// - Code must be unique (case-insensitive)
    pub async fn create(&self, discount: &DiscountCode) -> DbResult<DiscountCode> {
        let mut discount = discount.clone();
        discount.code = normalize_discount_code(&discount.code)?;
        discount.used_count = 0;
        validate_discount_definition(&discount)?;

        debug!(code = %discount.code, kind = ?discount.kind, value = discount.value, "Creating discount code");

        sqlx::query(
            r#"
            INSERT INTO discount_codes (
                code, kind, value, max_uses, used_count, min_order_amount,
                max_discount_amount, is_active, is_public, created_at
            ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&discount.code)
        .bind(discount.kind)
        .bind(discount.value)
        .bind(discount.max_uses)
        .bind(discount.min_order_amount.minor())
        .bind(discount.max_discount_amount.map(|m| m.minor()))
        .bind(discount.is_active)
        .bind(discount.is_public)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("discount code", &discount.code),
            other => other,
        })?;

        info!(code = %discount.code, "Discount code created");
        Ok(discount)
    }

    /// Gets a code, case-insensitively. Malformed codes are simply not found.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<DiscountCode>> {
        let Ok(canonical) = normalize_discount_code(code) else {
            return Ok(None);
        };

        let mut conn = self.pool.acquire().await?;
        fetch_discount(&mut conn, &canonical).await
    }

    /// Public codes that can still be redeemed, for display in the storefront.
    pub async fn list_public_active(&self) -> DbResult<Vec<DiscountCode>> {
        let rows: Vec<DiscountRow> = sqlx::query_as(&format!(
            "{SELECT_DISCOUNT} WHERE is_public = 1 AND is_active = 1 AND used_count < max_uses ORDER BY code"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DiscountCode::from).collect())
    }

    /// Switches a code on or off.
    pub async fn set_active(&self, code: &str, active: bool) -> DbResult<()> {
        let canonical = normalize_discount_code(code)?;
        debug!(code = %canonical, active, "Setting discount active flag");

        let result = sqlx::query("UPDATE discount_codes SET is_active = ?2 WHERE code = ?1")
            .bind(&canonical)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount code", canonical));
        }

        Ok(())
    }
}
