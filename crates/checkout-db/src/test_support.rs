//! Shared fixtures for database tests.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use checkout_core::{
    Cart, CartOwner, DiscountCode, DiscountKind, Money, PricingPolicy, Product, ShippingAddress, Variant,
};

use crate::pool::{Database, DbConfig};

pub const LAPTOP: &str = "p-laptop";
pub const SHIRT: &str = "p-shirt";

fn discount(code: &str, value: i64, max_uses: i64) -> DiscountCode {
    DiscountCode {
        code: code.to_string(),
        kind: DiscountKind::Fixed,
        value,
        max_uses,
        used_count: 0,
        min_order_amount: Money::zero(),
        max_discount_amount: None,
        is_active: true,
        is_public: true,
    }
}

/// In-memory database with a laptop (800,000, stock 5), a shirt with a
/// medium variant (250,000, stock 10), SAVE5 (50,000 off, 10 uses) and
/// ONCE1 (10,000 off, 1 use).
pub async fn seeded_db() -> Database {
    seeded_db_with(PricingPolicy::default()).await
}

pub async fn seeded_db_with(policy: PricingPolicy) -> Database {
    let db = Database::new(DbConfig::in_memory())
        .await
        .unwrap()
        .with_pricing(policy);
    seed(db).await
}

/// Same fixtures in a temporary file, so the pool can hand out several
/// connections at once. Pair with [`remove_db_files`].
pub async fn seeded_file_db(max_connections: u32) -> (Database, PathBuf) {
    let path = std::env::temp_dir().join(format!("checkout-test-{}.db", Uuid::new_v4()));
    let db = Database::new(DbConfig::new(path.clone()).max_connections(max_connections))
        .await
        .unwrap();
    (seed(db).await, path)
}

pub fn remove_db_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

async fn seed(db: Database) -> Database {
    db.catalog()
        .insert(&Product {
            id: LAPTOP.to_string(),
            sku: "LAP-01".to_string(),
            name: "Laptop".to_string(),
            base_price: Money::from_minor(800_000),
            stock: 5,
            is_active: true,
            variants: vec![],
        })
        .await
        .unwrap();

    db.catalog()
        .insert(&Product {
            id: SHIRT.to_string(),
            sku: "SHI-01".to_string(),
            name: "Shirt".to_string(),
            base_price: Money::from_minor(200_000),
            stock: 0,
            is_active: true,
            variants: vec![Variant {
                id: "shirt-m".to_string(),
                product_id: SHIRT.to_string(),
                label: "M".to_string(),
                price: Money::from_minor(250_000),
                stock: 10,
                is_active: true,
            }],
        })
        .await
        .unwrap();

    db.discounts().create(&discount("SAVE5", 50_000, 10)).await.unwrap();
    db.discounts().create(&discount("ONCE1", 10_000, 1)).await.unwrap();

    db
}

/// Stores a user cart with the given lines, code and points.
pub async fn user_cart_with(
    db: &Database,
    user_id: &str,
    items: &[(&str, Option<&str>, i64)],
    code: Option<&str>,
    points: i64,
) -> Cart {
    let mut cart = db.carts().get_or_create(CartOwner::user(user_id)).await.unwrap();
    for (product_id, variant_id, quantity) in items {
        cart.add_item(product_id, *variant_id, *quantity).unwrap();
    }
    if let Some(code) = code {
        cart.apply_discount_code(code).unwrap();
    }
    cart.set_loyalty_points(points).unwrap();
    db.carts().save(&cart).await.unwrap();
    cart
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        recipient: "Ada".to_string(),
        phone: "0901234567".to_string(),
        street: "1 Main St".to_string(),
        city: "Hanoi".to_string(),
        postal_code: Some("100000".to_string()),
    }
}
