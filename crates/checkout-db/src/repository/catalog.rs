//! # Catalog Repository
//!
//! Products, variants and their stock counters.
//!
//! ## Stock Decrement at Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  UPDATE ... SET stock = stock - :qty                                │
//! │  WHERE id = :id AND is_active = 1 AND stock >= :qty                 │
//! │                                                                     │
//! │  rows_affected = 1 → reserved                                       │
//! │  rows_affected = 0 → re-read the row to say why:                    │
//! │       missing / inactive → CatalogLookup                            │
//! │       stock < qty        → StockInsufficient { available }          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are one statement, so two commits can never both
//! take the last unit.

use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use checkout_core::lookup::CatalogSnapshot;
use checkout_core::validation::validate_amount;
use checkout_core::{CoreError, LineItem, Money, PricingEngine, Product, ValidationError, Variant};

use crate::error::{CheckoutResult, DbError, DbResult};

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    base_price: i64,
    stock: i64,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct VariantRow {
    id: String,
    product_id: String,
    label: String,
    price: i64,
    stock: i64,
    is_active: bool,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Variant {
            id: row.id,
            product_id: row.product_id,
            label: row.label,
            price: Money::from_minor(row.price),
            stock: row.stock,
            is_active: row.is_active,
        }
    }
}

impl ProductRow {
    fn into_product(self, variants: Vec<VariantRow>) -> Product {
        Product {
            id: self.id,
            sku: self.sku,
            name: self.name,
            base_price: Money::from_minor(self.base_price),
            stock: self.stock,
            is_active: self.is_active,
            variants: variants.into_iter().map(Variant::from).collect(),
        }
    }
}

// =============================================================================
// Connection-level helpers (usable inside a transaction)
// =============================================================================

/// Loads one product with all of its variants.
pub(crate) async fn fetch_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Option<Product>> {
    let row: Option<ProductRow> = sqlx::query_as(
        r#"
        SELECT id, sku, name, base_price, stock, is_active
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let variants: Vec<VariantRow> = sqlx::query_as(
        r#"
        SELECT id, product_id, label, price, stock, is_active
        FROM product_variants
        WHERE product_id = ?1
        ORDER BY position, id
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.into_product(variants)))
}

/// Loads every product the lines reference into a snapshot.
///
/// Unknown ids are simply absent; the pricing engine reports them.
pub(crate) async fn load_snapshot(
    conn: &mut SqliteConnection,
    items: &[LineItem],
) -> DbResult<CatalogSnapshot> {
    let ids: BTreeSet<&str> = items.iter().map(|i| i.product_id.as_str()).collect();

    let mut snapshot = CatalogSnapshot::new();
    for id in ids {
        if let Some(product) = fetch_product(conn, id).await? {
            snapshot.insert(product);
        }
    }

    debug!(products = snapshot.len(), "Catalog snapshot loaded");
    Ok(snapshot)
}

/// Conditionally takes `item.quantity` units of stock.
///
/// Fails with `CatalogLookup` or `StockInsufficient` without writing anything.
pub(crate) async fn reserve_stock(conn: &mut SqliteConnection, item: &LineItem) -> CheckoutResult<()> {
    let now = Utc::now();

    let result = match item.variant_id.as_deref() {
        Some(variant_id) => {
            sqlx::query(
                r#"
                UPDATE product_variants
                SET stock = stock - ?1
                WHERE id = ?2
                  AND product_id = ?3
                  AND is_active = 1
                  AND stock >= ?1
                  AND EXISTS (SELECT 1 FROM products p WHERE p.id = ?3 AND p.is_active = 1)
                "#,
            )
            .bind(item.quantity)
            .bind(variant_id)
            .bind(&item.product_id)
            .execute(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - ?1, updated_at = ?3
                WHERE id = ?2 AND is_active = 1 AND stock >= ?1
                "#,
            )
            .bind(item.quantity)
            .bind(&item.product_id)
            .bind(now)
            .execute(&mut *conn)
            .await?
        }
    };

    if result.rows_affected() == 1 {
        return Ok(());
    }

    // Nothing was written: find out why.
    let variant_id = item.variant_id.as_deref();
    let snapshot: CatalogSnapshot = fetch_product(conn, &item.product_id).await?.into_iter().collect();
    let (_, product) = PricingEngine::default().resolve_price(item, &snapshot)?;
    let available = product.available_stock(variant_id).unwrap_or(0);

    Err(CoreError::StockInsufficient {
        product_id: item.product_id.clone(),
        variant_id: variant_id.map(str::to_string),
        available,
        requested: item.quantity,
    }
    .into())
}

/// Puts stock back (order cancellation).
pub(crate) async fn release_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_id: Option<&str>,
    quantity: i64,
) -> DbResult<()> {
    let result = match variant_id {
        Some(variant_id) => {
            sqlx::query(
                "UPDATE product_variants SET stock = stock + ?1 WHERE id = ?2 AND product_id = ?3",
            )
            .bind(quantity)
            .bind(variant_id)
            .bind(product_id)
            .execute(&mut *conn)
            .await?
        }
        None => {
            sqlx::query("UPDATE products SET stock = stock + ?1, updated_at = ?3 WHERE id = ?2")
                .bind(quantity)
                .bind(product_id)
                .bind(Utc::now())
                .execute(&mut *conn)
                .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts a product and its variants in one transaction.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, variants = product.variants.len(), "Inserting product");

        validate_amount("base price", product.base_price)?;
        for variant in &product.variants {
            validate_amount("variant price", variant.price)?;
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, base_price, stock, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.base_price.minor())
        .bind(product.stock)
        .bind(product.is_active)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.ends_with("sku") => {
                DbError::duplicate("SKU", &product.sku)
            }
            other => other,
        })?;

        for (position, variant) in product.variants.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_variants (id, product_id, label, price, stock, is_active, position)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&variant.id)
            .bind(&product.id)
            .bind(&variant.label)
            .bind(variant.price.minor())
            .bind(variant.stock)
            .bind(variant.is_active)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets a product (with variants) by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Loads the products referenced by a set of lines.
    pub async fn snapshot_for(&self, items: &[LineItem]) -> DbResult<CatalogSnapshot> {
        let mut conn = self.pool.acquire().await?;
        load_snapshot(&mut conn, items).await
    }

    /// Changes the price of a product (base price) or one of its variants.
    pub async fn update_price(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
        price: Money,
    ) -> DbResult<()> {
        debug!(product_id = %product_id, variant_id = ?variant_id, price = %price, "Updating price");
        validate_amount("price", price)?;

        let result = match variant_id {
            Some(variant_id) => {
                sqlx::query("UPDATE product_variants SET price = ?1 WHERE id = ?2 AND product_id = ?3")
                    .bind(price.minor())
                    .bind(variant_id)
                    .bind(product_id)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("UPDATE products SET base_price = ?1, updated_at = ?3 WHERE id = ?2")
                    .bind(price.minor())
                    .bind(product_id)
                    .bind(Utc::now())
                    .execute(&self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        Ok(())
    }

    /// Sets the absolute stock level of a product or variant.
    pub async fn set_stock(&self, product_id: &str, variant_id: Option<&str>, stock: i64) -> DbResult<()> {
        debug!(product_id = %product_id, variant_id = ?variant_id, stock, "Setting stock");

        if stock < 0 {
            return Err(ValidationError::Negative {
                field: "stock".to_string(),
            }
            .into());
        }

        let result = match variant_id {
            Some(variant_id) => {
                sqlx::query("UPDATE product_variants SET stock = ?1 WHERE id = ?2 AND product_id = ?3")
                    .bind(stock)
                    .bind(variant_id)
                    .bind(product_id)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("UPDATE products SET stock = ?1, updated_at = ?3 WHERE id = ?2")
                    .bind(stock)
                    .bind(product_id)
                    .bind(Utc::now())
                    .execute(&self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        Ok(())
    }

    /// Deactivates a product. Historical orders keep their snapshots.
    pub async fn deactivate(&self, product_id: &str) -> DbResult<()> {
        debug!(id = %product_id, "Deactivating product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(product_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use checkout_core::ErrorKind;

    fn laptop() -> Product {
        Product {
            id: "p-laptop".to_string(),
            sku: "LAP-01".to_string(),
            name: "Laptop".to_string(),
            base_price: Money::from_minor(800_000),
            stock: 3,
            is_active: true,
            variants: vec![Variant {
                id: "v-32".to_string(),
                product_id: "p-laptop".to_string(),
                label: "32GB".to_string(),
                price: Money::from_minor(950_000),
                stock: 1,
                is_active: true,
            }],
        }
    }

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog().insert(&laptop()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;

        let product = db.catalog().get_by_id("p-laptop").await.unwrap().unwrap();
        assert_eq!(product, laptop());
        assert!(db.catalog().get_by_id("missing").await.unwrap().is_none());
        assert_eq!(db.catalog().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let db = setup().await;
        let mut copy = laptop();
        copy.id = "p-other".to_string();
        copy.variants.clear();

        let err = db.catalog().insert(&copy).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_price_and_stock() {
        let db = setup().await;
        let catalog = db.catalog();

        catalog
            .update_price("p-laptop", Some("v-32"), Money::from_minor(990_000))
            .await
            .unwrap();
        catalog.set_stock("p-laptop", None, 10).await.unwrap();
        assert!(catalog.set_stock("p-laptop", None, -1).await.is_err());
        assert!(catalog.update_price("nope", None, Money::zero()).await.is_err());

        let product = catalog.get_by_id("p-laptop").await.unwrap().unwrap();
        assert_eq!(product.variants[0].price, Money::from_minor(990_000));
        assert_eq!(product.stock, 10);
    }

    #[tokio::test]
    async fn test_oversized_price_is_rejected() {
        let db = setup().await;
        let mut huge = laptop();
        huge.id = "p-huge".to_string();
        huge.sku = "HUGE-01".to_string();
        huge.variants.clear();
        huge.base_price = Money::from_minor(i64::MAX / 50);

        let err = db.catalog().insert(&huge).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(ValidationError::OutOfRange { .. })));
        assert!(db.catalog().get_by_id("p-huge").await.unwrap().is_none());

        let err = db
            .catalog()
            .update_price("p-laptop", None, Money::from_minor(i64::MAX / 50))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Invalid(ValidationError::OutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_reserve_stock_is_conditional() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        reserve_stock(&mut conn, &LineItem::new("p-laptop", Some("v-32"), 1))
            .await
            .unwrap();

        let err = reserve_stock(&mut conn, &LineItem::new("p-laptop", Some("v-32"), 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StockInsufficient);

        let err = reserve_stock(&mut conn, &LineItem::new("p-laptop", None, 4))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("available 3"));

        let err = reserve_stock(&mut conn, &LineItem::new("p-missing", None, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogLookup);

        release_stock(&mut conn, "p-laptop", Some("v-32"), 1).await.unwrap();
        let product = fetch_product(&mut conn, "p-laptop").await.unwrap().unwrap();
        assert_eq!(product.available_stock(Some("v-32")), Some(1));
    }

    #[tokio::test]
    async fn test_inactive_product_cannot_be_reserved() {
        let db = setup().await;
        db.catalog().deactivate("p-laptop").await.unwrap();
        assert_eq!(db.catalog().count().await.unwrap(), 0);

        let mut conn = db.pool().acquire().await.unwrap();
        let err = reserve_stock(&mut conn, &LineItem::new("p-laptop", None, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogLookup);
    }
}
