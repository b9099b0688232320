//! # Cart Repository
//!
//! Persists [`Cart`] values. The cart is explicit state: callers load it by
//! id or owner, mutate it with `checkout_core::Cart` methods, and save it.
//!
//! ## Guest Merge on Login
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  merge_guest_into_user(guest_token, user_id)   (one transaction)        │
//! │                                                                         │
//! │  load guest cart ──► none? return the user's cart unchanged             │
//! │       │                                                                 │
//! │  load or create user cart                                               │
//! │       │                                                                 │
//! │  Cart::merge_guest (quantities summed, capped at 99)                    │
//! │       │                                                                 │
//! │  save user cart, delete guest cart, commit                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because the guest cart is deleted in the same transaction, a second merge
//! for the same token finds nothing to merge.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use checkout_core::{Cart, CartOwner, LineItem};

use crate::error::{CheckoutResult, DbError, DbResult};

#[derive(Debug, FromRow)]
struct CartRow {
    id: String,
    user_id: Option<String>,
    guest_token: Option<String>,
    discount_code: Option<String>,
    loyalty_points: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CartItemRow {
    product_id: String,
    variant_id: Option<String>,
    quantity: i64,
}

/// Which column a cart is looked up by.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CartKey<'a> {
    Id(&'a str),
    Owner(&'a CartOwner),
}

fn owner_columns(owner: &CartOwner) -> (Option<&str>, Option<&str>) {
    (owner.user_id(), owner.guest_token())
}

// =============================================================================
// Connection-level helpers (usable inside a transaction)
// =============================================================================

pub(crate) async fn fetch_cart(conn: &mut SqliteConnection, key: CartKey<'_>) -> DbResult<Option<Cart>> {
    const SELECT: &str = r#"
        SELECT id, user_id, guest_token, discount_code, loyalty_points, created_at, updated_at
        FROM carts
    "#;

    let row: Option<CartRow> = match key {
        CartKey::Id(id) => {
            sqlx::query_as(&format!("{SELECT} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        }
        CartKey::Owner(CartOwner::User { user_id }) => {
            sqlx::query_as(&format!("{SELECT} WHERE user_id = ?1"))
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?
        }
        CartKey::Owner(CartOwner::Guest { session_token }) => {
            sqlx::query_as(&format!("{SELECT} WHERE guest_token = ?1"))
                .bind(session_token)
                .fetch_optional(&mut *conn)
                .await?
        }
    };

    let Some(row) = row else {
        return Ok(None);
    };

    let items: Vec<CartItemRow> = sqlx::query_as(
        r#"
        SELECT product_id, variant_id, quantity
        FROM cart_items
        WHERE cart_id = ?1
        ORDER BY position
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    let owner = match (row.user_id, row.guest_token) {
        (Some(user_id), None) => CartOwner::User { user_id },
        (None, Some(session_token)) => CartOwner::Guest { session_token },
        _ => return Err(DbError::Internal(format!("cart {} has no single owner", row.id))),
    };

    Ok(Some(Cart {
        id: row.id,
        owner,
        items: items
            .into_iter()
            .map(|i| LineItem {
                product_id: i.product_id,
                variant_id: i.variant_id,
                quantity: i.quantity,
            })
            .collect(),
        discount_code: row.discount_code,
        loyalty_points: row.loyalty_points,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub(crate) async fn insert_cart(conn: &mut SqliteConnection, cart: &Cart) -> DbResult<()> {
    let (user_id, guest_token) = owner_columns(&cart.owner);

    sqlx::query(
        r#"
        INSERT INTO carts (id, user_id, guest_token, discount_code, loyalty_points, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&cart.id)
    .bind(user_id)
    .bind(guest_token)
    .bind(&cart.discount_code)
    .bind(cart.loyalty_points)
    .bind(cart.created_at)
    .bind(cart.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate("cart owner", user_id.or(guest_token).unwrap_or_default()),
        other => other,
    })?;

    write_items(conn, &cart.id, &cart.items).await
}

/// Replaces a stored cart's header and lines.
pub(crate) async fn update_cart(conn: &mut SqliteConnection, cart: &Cart) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE carts
        SET discount_code = ?2, loyalty_points = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(&cart.id)
    .bind(&cart.discount_code)
    .bind(cart.loyalty_points)
    .bind(cart.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Cart", &cart.id));
    }

    sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
        .bind(&cart.id)
        .execute(&mut *conn)
        .await?;

    write_items(conn, &cart.id, &cart.items).await
}

async fn write_items(conn: &mut SqliteConnection, cart_id: &str, items: &[LineItem]) -> DbResult<()> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, position, product_id, variant_id, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(cart_id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(&item.variant_id)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub(crate) async fn delete_cart(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM carts WHERE id = ?1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cart persistence.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Creates and stores an empty cart. An owner has at most one cart.
    pub async fn create(&self, owner: CartOwner) -> DbResult<Cart> {
        let cart = Cart::new(owner);
        debug!(id = %cart.id, "Creating cart");

        let mut conn = self.pool.acquire().await?;
        insert_cart(&mut conn, &cart).await?;
        Ok(cart)
    }

    /// Loads a cart by id.
    pub async fn load(&self, id: &str) -> DbResult<Option<Cart>> {
        let mut conn = self.pool.acquire().await?;
        fetch_cart(&mut conn, CartKey::Id(id)).await
    }

    /// Loads the cart belonging to a user or guest session.
    pub async fn find_by_owner(&self, owner: &CartOwner) -> DbResult<Option<Cart>> {
        let mut conn = self.pool.acquire().await?;
        fetch_cart(&mut conn, CartKey::Owner(owner)).await
    }

    /// Returns the owner's cart, creating an empty one on first interaction.
    pub async fn get_or_create(&self, owner: CartOwner) -> DbResult<Cart> {
        match self.find_by_owner(&owner).await? {
            Some(cart) => Ok(cart),
            None => self.create(owner).await,
        }
    }

    /// Saves a cart's lines, code and points in one transaction.
    pub async fn save(&self, cart: &Cart) -> DbResult<()> {
        debug!(id = %cart.id, lines = cart.item_count(), "Saving cart");

        let mut tx = self.pool.begin().await?;
        update_cart(&mut tx, cart).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes a cart and its lines.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        if !delete_cart(&mut conn, id).await? {
            return Err(DbError::not_found("Cart", id));
        }
        Ok(())
    }

    /// Folds a guest cart into the user's cart and discards the guest cart.
    ///
    /// Returns the user's cart after the merge. With no guest cart left for
    /// the token, the user's cart is returned unchanged.
    pub async fn merge_guest_into_user(&self, guest_token: &str, user_id: &str) -> CheckoutResult<Cart> {
        let guest_owner = CartOwner::guest(guest_token);
        let user_owner = CartOwner::user(user_id);

        let mut tx = self.pool.begin().await?;

        // Write first so the transaction holds the write lock from the start.
        sqlx::query("UPDATE carts SET updated_at = ?2 WHERE guest_token = ?1")
            .bind(guest_token)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let existing = fetch_cart(&mut tx, CartKey::Owner(&user_owner)).await?;

        let Some(guest) = fetch_cart(&mut tx, CartKey::Owner(&guest_owner)).await? else {
            let cart = match existing {
                Some(cart) => cart,
                None => {
                    let cart = Cart::new(user_owner);
                    insert_cart(&mut tx, &cart).await?;
                    cart
                }
            };
            tx.commit().await?;
            return Ok(cart);
        };

        let guest_id = guest.id.clone();
        let guest_lines = guest.item_count();

        let cart = match existing {
            Some(mut cart) => {
                cart.merge_guest(guest)?;
                update_cart(&mut tx, &cart).await?;
                cart
            }
            None => {
                let mut cart = Cart::new(user_owner);
                cart.merge_guest(guest)?;
                insert_cart(&mut tx, &cart).await?;
                cart
            }
        };

        delete_cart(&mut tx, &guest_id).await?;
        tx.commit().await?;

        info!(
            user_id = %user_id,
            cart_id = %cart.id,
            guest_lines,
            "Guest cart merged"
        );
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_load_save() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let carts = db.carts();

        let mut cart = carts.create(CartOwner::user("u-1")).await.unwrap();
        cart.add_item("p-1", None, 2).unwrap();
        cart.add_item("p-2", Some("v-1"), 1).unwrap();
        cart.apply_discount_code("save5").unwrap();
        cart.set_loyalty_points(5).unwrap();
        carts.save(&cart).await.unwrap();

        let loaded = carts.load(&cart.id).await.unwrap().unwrap();
        assert_eq!(loaded.items, cart.items);
        assert_eq!(loaded.discount_code.as_deref(), Some("SAVE5"));
        assert_eq!(loaded.loyalty_points, 5);
        assert_eq!(loaded.owner, CartOwner::user("u-1"));

        let by_owner = carts.find_by_owner(&CartOwner::user("u-1")).await.unwrap().unwrap();
        assert_eq!(by_owner.id, cart.id);

        assert!(carts.create(CartOwner::user("u-1")).await.is_err());

        carts.delete(&cart.id).await.unwrap();
        assert!(carts.load(&cart.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_or_create() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = db.carts().get_or_create(CartOwner::guest("tok")).await.unwrap();
        let second = db.carts().get_or_create(CartOwner::guest("tok")).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_merge_guest_into_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let carts = db.carts();

        let mut user = carts.create(CartOwner::user("u-1")).await.unwrap();
        user.add_item("p-1", None, 95).unwrap();
        carts.save(&user).await.unwrap();

        let mut guest = carts.create(CartOwner::guest("tok")).await.unwrap();
        guest.add_item("p-1", None, 10).unwrap();
        guest.add_item("p-2", None, 1).unwrap();
        guest.apply_discount_code("GUEST").unwrap();
        carts.save(&guest).await.unwrap();

        let merged = carts.merge_guest_into_user("tok", "u-1").await.unwrap();
        assert_eq!(merged.id, user.id);
        assert_eq!(merged.total_quantity(), 99 + 1);
        assert_eq!(merged.discount_code.as_deref(), Some("GUEST"));

        assert!(carts.find_by_owner(&CartOwner::guest("tok")).await.unwrap().is_none());
        let stored = carts.load(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.items, merged.items);

        // Second merge finds no guest cart and leaves the user's cart alone.
        let again = carts.merge_guest_into_user("tok", "u-1").await.unwrap();
        assert_eq!(again.items, merged.items);
    }

    #[tokio::test]
    async fn test_merge_creates_user_cart() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let carts = db.carts();

        let mut guest = carts.create(CartOwner::guest("tok")).await.unwrap();
        guest.add_item("p-1", None, 2).unwrap();
        carts.save(&guest).await.unwrap();

        let merged = carts.merge_guest_into_user("tok", "u-9").await.unwrap();
        assert_eq!(merged.owner, CartOwner::user("u-9"));
        assert_eq!(merged.total_quantity(), 2);
        assert!(carts.load(&guest.id).await.unwrap().is_none());
    }
}
