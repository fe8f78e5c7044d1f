//! # Seed Data Generator
//!
//! Stocks a fresh ledger with a demo drinks assortment.
//!
//! ## Usage
//! ```bash
//! # Demo products only
//! cargo run -p micropay-db --bin seed
//!
//! # Specify database path
//! cargo run -p micropay-db --bin seed -- --db ./data/micropay.db
//!
//! # Also enroll a test card (the raw swipe text, without the terminator)
//! cargo run -p micropay-db --bin seed -- --card ";4711?" --member Alice --balance 500
//! ```
//!
//! Barcodes are `570` followed by a zero-padded index; prices are in minor units.

use std::env;

use micropay_core::{BarcodeToken, CardToken, Money};
use micropay_db::{Database, DbConfig};

/// Demo assortment: (name, price in minor units)
const DRINKS: &[(&str, i64)] = &[
    ("Club-Mate", 150),
    ("Club-Mate Granat", 150),
    ("Flora Power", 150),
    ("Coca-Cola", 100),
    ("Coca-Cola Zero", 100),
    ("Fanta", 100),
    ("Sprite", 100),
    ("Faxe Kondi", 100),
    ("Red Bull", 200),
    ("Monster Energy", 250),
    ("Tuborg Classic", 100),
    ("Carlsberg", 100),
    ("Mineral Water", 50),
    ("Apple Juice", 120),
    ("Orange Juice", 120),
    ("Iced Tea", 120),
    ("Coffee", 50),
    ("Hot Chocolate", 50),
    ("Chocolate Bar", 80),
    ("Chips", 120),
];

/// Terminator the card reader appends to every swipe.
const CARD_TERMINATOR: u8 = b'\r';

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./micropay_dev.db");
    let mut card: Option<String> = None;
    let mut member = String::from("Test Customer");
    let mut balance: i64 = 0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--card" | "-c" => {
                if i + 1 < args.len() {
                    card = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--member" | "-m" => {
                if i + 1 < args.len() {
                    member = args[i + 1].clone();
                    i += 1;
                }
            }
            "--balance" | "-b" => {
                if i + 1 < args.len() {
                    balance = args[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Micropay Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./micropay_dev.db)");
                println!("  -c, --card <SWIPE>     Enroll a test card from its raw swipe text");
                println!("  -m, --member <NAME>    Member name for the test card");
                println!("  -b, --balance <N>      Initial balance in minor units (default: 0)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Micropay Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let (total, applied) = db.migration_status().await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied ({}/{})", applied, total);

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping products to avoid duplicates.");
    } else {
        println!();
        println!("Creating products...");

        let mut created = 0;
        for (index, (name, price)) in DRINKS.iter().enumerate() {
            let code: BarcodeToken = format!("570{:010}", index + 1).parse()?;
            match db.products().create(name, Money::from_minor(*price), &code).await {
                Ok(_) => {
                    println!("  {:<18} {:>6}  {}", name, Money::from_minor(*price), code);
                    created += 1;
                }
                Err(e) => eprintln!("Failed to insert {}: {}", name, e),
            }
        }

        println!("✓ Created {} products", created);
    }

    if let Some(swipe) = card {
        let mut frame = swipe.into_bytes();
        frame.push(CARD_TERMINATOR);
        let token = CardToken::from_swipe(&frame);

        println!();
        match db
            .accounts()
            .create(&token, &member, Money::from_minor(balance))
            .await
        {
            Ok(id) => println!("✓ Enrolled {} (account {}, card {})", member, id, token.short()),
            Err(e) => eprintln!("Failed to enroll {}: {}", member, e),
        }
    }

    println!();
    println!(
        "Ledger: {} accounts, {} products",
        db.accounts().count().await?,
        db.products().count().await?
    );
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
