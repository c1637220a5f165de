//! # Seed Data Generator
//!
//! Populates a development database with a small catalog, one coupon and a
//! shipping address for a demo user.
//!
//! ## Usage
//! ```bash
//! # Seed ./storefront_dev.db
//! cargo run -p storefront-db --bin seed
//!
//! # Specify database path and demo user
//! cargo run -p storefront-db --bin seed -- --db ./data/storefront.db --user alice
//! ```
//!
//! Running it twice is safe: existing SKUs, the coupon and the address are
//! left alone.

use chrono::{Duration, Utc};
use std::env;
use storefront_db::{Database, DbConfig, NewAddress, NewCoupon, NewVariant};

/// `(sku, name, base_price, discount_percent, stock)`, prices in toman.
const VARIANTS: &[(&str, &str, i64, i64, i64)] = &[
    ("TSH-BLK-S", "Basic T-Shirt Black S", 450_000, 0, 40),
    ("TSH-BLK-M", "Basic T-Shirt Black M", 450_000, 0, 60),
    ("TSH-BLK-L", "Basic T-Shirt Black L", 450_000, 0, 35),
    ("TSH-WHT-M", "Basic T-Shirt White M", 450_000, 15, 25),
    ("HOD-GRY-M", "Hoodie Grey M", 1_250_000, 10, 12),
    ("HOD-GRY-L", "Hoodie Grey L", 1_250_000, 10, 8),
    ("JKT-NVY-L", "Denim Jacket Navy L", 2_900_000, 20, 4),
    ("CAP-RED", "Baseball Cap Red", 320_000, 0, 100),
    ("SCK-3PK", "Cotton Socks 3-Pack", 180_000, 5, 200),
    ("LTD-ED-01", "Limited Edition Print", 5_000_000, 0, 1),
];

const COUPON_CODE: &str = "WELCOME10";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./storefront_dev.db");
    let mut user_id = String::from("demo-user");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--user" | "-u" => {
                if i + 1 < args.len() {
                    user_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./storefront_dev.db)");
                println!("  -u, --user <ID>    Demo user id (default: demo-user)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Storefront Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    let mut created = 0;
    for &(sku, name, base_price, discount_percent, stock) in VARIANTS {
        if db.variants().get_by_sku(sku).await?.is_some() {
            continue;
        }
        db.variants()
            .insert(NewVariant {
                sku: sku.to_string(),
                name: name.to_string(),
                base_price,
                discount_percent,
                stock,
            })
            .await?;
        created += 1;
    }
    println!("✓ Variants: {} created, {} total", created, db.variants().count().await?);

    if db.coupons().get_by_code(COUPON_CODE).await?.is_none() {
        db.coupons()
            .insert(NewCoupon {
                code: COUPON_CODE.to_string(),
                discount_percent: 10,
                expires_at: Utc::now() + Duration::days(90),
                active: true,
                usage_limit: Some(1_000),
                allowed_users: Vec::new(),
            })
            .await?;
        println!("✓ Coupon {} created", COUPON_CODE);
    } else {
        println!("  Coupon {} already exists", COUPON_CODE);
    }

    let addresses = db.addresses().list_for_user(&user_id).await?;
    let address_id = match addresses.first() {
        Some(address) => address.id.clone(),
        None => {
            db.addresses()
                .insert(NewAddress {
                    user_id: user_id.clone(),
                    recipient: "Demo Customer".to_string(),
                    line1: "No. 7, Azadi Ave".to_string(),
                    city: "Tehran".to_string(),
                    postal_code: "1458889694".to_string(),
                    phone: "09121234567".to_string(),
                })
                .await?
                .id
        }
    };
    println!("✓ Address for {}: {}", user_id, address_id);

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
