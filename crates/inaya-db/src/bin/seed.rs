//! # Seed Data Generator
//!
//! Populates a store with a demo garment catalogue for development.
//!
//! ## Usage
//! ```bash
//! # Generate 60 stock items (default)
//! cargo run -p inaya-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p inaya-db --bin seed -- --count 200
//!
//! # Specify database path
//! cargo run -p inaya-db --bin seed -- --db ./data/inaya_cloth.db
//! ```
//!
//! ## Generated Stock
//! Each item is `{garment} {fabric} {size}` with:
//! - Selling price: Rs. 800 - Rs. 8,000 depending on garment and size
//! - MRP: selling price + 10-25%
//! - Opening quantity: 0
//!
//! Every item then receives an opening GRN through the transaction
//! coordinator, so the ledger and the GRN report agree from day one.

use std::env;

use inaya_core::{Action, GrnLine, Money, MAX_ACTION_LINES};
use inaya_db::{Database, DbConfig};

/// (garment, base price in rupees)
const GARMENTS: &[(&str, i64)] = &[
    ("Lawn Suit 3pc", 3500),
    ("Lawn Suit 2pc", 2600),
    ("Chiffon Dupatta", 1200),
    ("Silk Saree", 7000),
    ("Cotton Kurta", 1800),
    ("Embroidered Shirt", 2900),
    ("Trouser", 900),
    ("Shawl", 2200),
    ("Abaya", 4500),
    ("Khaddar Suit", 3800),
];

const FABRICS: &[&str] = &["Printed", "Plain", "Embroidered"];

/// (size, price addon in rupees)
const SIZES: &[(&str, i64)] = &[("S", 0), ("M", 0), ("L", 150), ("XL", 300)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 60;
    let mut db_path = String::from("./inaya_cloth.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Inaya Back-Office Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of stock items to generate (default: 60)");
                println!("  -d, --db <PATH>    Database file path (default: ./inaya_cloth.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Inaya Back-Office Seed Data Generator");
    println!("=====================================");
    println!("Database: {}", db_path);
    println!("Items:    {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Schema up to date");

    let existing = db.stocks().list().await?.len();
    if existing > 0 {
        println!("⚠ Database already has {} stock items", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut receipts = Vec::new();

    'outer: for (garment_idx, (garment, base)) in GARMENTS.iter().enumerate() {
        for (fabric_idx, fabric) in FABRICS.iter().enumerate() {
            for (size_idx, (size, addon)) in SIZES.iter().enumerate() {
                if receipts.len() >= count {
                    break 'outer;
                }

                let seed = garment_idx * 100 + fabric_idx * 10 + size_idx;
                let (name, selling_price, mrp) =
                    generate_item(garment, fabric, size, *base, *addon, seed);

                match db.stocks().create(&name, 0, selling_price, mrp).await {
                    Ok(stock) => receipts.push(GrnLine {
                        stock_id: stock.id,
                        quantity: 5 + (seed % 21) as i64,
                    }),
                    Err(e) => eprintln!("Failed to insert {}: {}", name, e),
                }
            }
        }
    }

    println!("✓ Created {} stock items", receipts.len());

    // Opening stock arrives as GRNs, batched to the action size limit.
    let mut units = 0;
    for batch in receipts.chunks(MAX_ACTION_LINES) {
        db.coordinator()
            .execute(Action::ReceiveGoods {
                lines: batch.to_vec(),
            })
            .await?;
        units += batch.iter().map(|l| l.quantity).sum::<i64>();
    }

    println!("✓ Received {} opening units in {:?}", units, start.elapsed());

    let report = db.reports().stock_report().await?;
    println!(
        "  Stock value: {} (MRP {})",
        report.valuation.selling_value, report.valuation.mrp_value
    );

    println!();
    println!("✓ Seed complete!");
    Ok(())
}

/// Name and prices for one catalogue entry.
fn generate_item(
    garment: &str,
    fabric: &str,
    size: &str,
    base: i64,
    addon: i64,
    seed: usize,
) -> (String, Money, Money) {
    let name = format!("{} {} {}", garment, fabric, size);

    // Embroidered pieces cost more; round to the nearest Rs. 50.
    let fabric_markup = if fabric == "Embroidered" { base / 4 } else { 0 };
    let rupees = (base + fabric_markup + addon) / 50 * 50;
    let selling_price = Money::from_rupees(rupees);

    let margin_pct = 10 + (seed % 16) as i64;
    let mrp = Money::from_rupees((rupees + rupees * margin_pct / 100) / 50 * 50);

    (name, selling_price, mrp)
}
