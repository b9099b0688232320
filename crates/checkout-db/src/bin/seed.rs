//! # Seed Data Generator
//!
//! Populates the database with a demo catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed $SHOP_DB_PATH (default ./shop.db)
//! cargo run -p checkout-db --bin seed
//!
//! # Specify database path
//! cargo run -p checkout-db --bin seed -- --db ./data/shop.db
//!
//! # More logging
//! RUST_LOG=debug cargo run -p checkout-db --bin seed
//! ```
//!
//! ## Generated Data
//! - Products across a few categories, some sold in size/colour variants
//! - Discount codes: SAVE5 (fixed), TENPC (10%, capped), VIP20 (hidden)
//! - A loyalty balance for `demo-user`
//!
//! Pricing settings (tax, shipping, point value) come from the `SHOP_*`
//! environment variables; see `checkout_db::config`.

use std::env;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use checkout_core::{
    CartOwner, DiscountCode, DiscountKind, Money, Product, Variant, MAX_DISCOUNT_USES,
};
use checkout_db::ShopConfig;

/// (sku prefix, name, base price, stock, variants as (label, price, stock))
type Seed = (&'static str, &'static str, i64, i64, &'static [(&'static str, i64, i64)]);

const PRODUCTS: &[Seed] = &[
    ("LAP", "Ultrabook 14", 800_000, 5, &[]),
    ("LAP", "Workstation 16", 1_450_000, 3, &[]),
    ("PHN", "Phone Mini", 520_000, 12, &[("128GB", 520_000, 8), ("256GB", 610_000, 4)]),
    ("AUD", "Wireless Earbuds", 180_000, 25, &[]),
    ("AUD", "Studio Headphones", 320_000, 7, &[]),
    ("APP", "Cotton Shirt", 200_000, 0, &[("S", 200_000, 10), ("M", 250_000, 10), ("L", 250_000, 6)]),
    ("APP", "Denim Jacket", 450_000, 0, &[("M", 450_000, 4), ("L", 470_000, 2)]),
    ("HOM", "Desk Lamp", 90_000, 40, &[]),
    ("HOM", "Ceramic Mug", 35_000, 100, &[("White", 35_000, 60), ("Black", 38_000, 40)]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,checkout=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut config = ShopConfig::load()?;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Shop Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $SHOP_DB_PATH or shop.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(database = %config.database_path.display(), "Seeding shop database");

    let db = config.open().await?;

    let existing = db.catalog().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;
    for (index, seed) in PRODUCTS.iter().enumerate() {
        let product = build_product(seed, index);
        if let Err(e) = db.catalog().insert(&product).await {
            warn!(sku = %product.sku, error = %e, "Failed to insert product");
            continue;
        }
        generated += 1;
    }
    info!(generated, elapsed = ?start.elapsed(), "Products inserted");

    for discount in discount_codes() {
        db.discounts().create(&discount).await?;
    }
    info!(
        public = db.discounts().list_public_active().await?.len(),
        "Discount codes created"
    );

    let balance = db.loyalty().credit("demo-user", 300).await?;
    info!(user_id = %balance.user_id, points = balance.points, "Loyalty balance seeded");

    // Price a sample cart so the setup can be checked at a glance.
    let mut cart = db.carts().get_or_create(CartOwner::user("demo-user")).await?;
    if let Some(first) = PRODUCTS.first() {
        cart.add_item(&product_id(0, first.0), None, 1)?;
        cart.apply_discount_code("save5")?;
        cart.set_loyalty_points(100)?;
        db.carts().save(&cart).await?;

        let quote = db.checkout().preview(&cart).await?;
        println!();
        println!("Sample cart for demo-user:");
        println!("  Subtotal:  {}", quote.breakdown.subtotal);
        println!("  Discount: -{}", quote.breakdown.discount_amount);
        println!("  Points:   -{}", quote.breakdown.loyalty_deduction);
        println!("  Shipping:  {}", quote.breakdown.shipping);
        println!("  Tax:       {}", quote.breakdown.tax);
        println!("  Total:     {}", quote.breakdown.total);
    }

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Stable, readable ids so the sample cart can reference them.
fn product_id(index: usize, prefix: &str) -> String {
    format!("{}-{:03}", prefix.to_lowercase(), index)
}

fn build_product(seed: &Seed, index: usize) -> Product {
    let (prefix, name, base_price, stock, variants) = *seed;
    let id = product_id(index, prefix);

    Product {
        id: id.clone(),
        sku: format!("{}-{:03}", prefix, index),
        name: name.to_string(),
        base_price: Money::from_minor(base_price),
        stock,
        is_active: true,
        variants: variants
            .iter()
            .map(|(label, price, stock)| Variant {
                id: Uuid::new_v4().to_string(),
                product_id: id.clone(),
                label: label.to_string(),
                price: Money::from_minor(*price),
                stock: *stock,
                is_active: true,
            })
            .collect(),
    }
}

fn discount_codes() -> Vec<DiscountCode> {
    vec![
        DiscountCode {
            code: "SAVE5".to_string(),
            kind: DiscountKind::Fixed,
            value: 50_000,
            max_uses: MAX_DISCOUNT_USES,
            used_count: 0,
            min_order_amount: Money::zero(),
            max_discount_amount: None,
            is_active: true,
            is_public: true,
        },
        DiscountCode {
            code: "TENPC".to_string(),
            kind: DiscountKind::Percentage,
            value: 10,
            max_uses: 5,
            used_count: 0,
            min_order_amount: Money::from_minor(300_000),
            max_discount_amount: Some(Money::from_minor(100_000)),
            is_active: true,
            is_public: true,
        },
        DiscountCode {
            code: "VIP20".to_string(),
            kind: DiscountKind::Percentage,
            value: 20,
            max_uses: 1,
            used_count: 0,
            min_order_amount: Money::zero(),
            max_discount_amount: None,
            is_active: true,
            is_public: false,
        },
    ]
}
