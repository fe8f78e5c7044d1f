//! # Product Repository
//!
//! Products keyed by digits-only barcode.
//!
//! ## Partial Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update(barcode, name?, price?)                                        │
//! │                                                                         │
//! │    (None,        None)      → row unchanged                            │
//! │    (Some("X"),   None)      → name = "X", price kept                   │
//! │    (None,        Some(250)) → price = 250, name kept                   │
//! │                                                                         │
//! │  SQL: name = COALESCE(?, name), price = COALESCE(?, price)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::{debug, info};

use micropay_core::validation::{validate_name, validate_non_negative};
use micropay_core::{BarcodeToken, Money, Product};

use crate::error::{DbError, DbResult};

/// Repository for product operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Looks up a product by barcode.
    pub async fn find_by_barcode(&self, barcode: &BarcodeToken) -> DbResult<Option<Product>> {
        debug!(barcode = %barcode, "Looking up product");

        let product = sqlx::query_as::<_, Product>(
            "SELECT id, barcode, name, price FROM products WHERE barcode = ?1",
        )
        .bind(barcode.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Creates a product.
    ///
    /// ## Returns
    /// * `Ok(i64)` - Row id of the new product
    /// * `Err(DbError::UniqueViolation)` - Barcode already in use; nothing written
    pub async fn create(&self, name: &str, price: Money, barcode: &BarcodeToken) -> DbResult<i64> {
        let name = validate_name("name", name)?;
        validate_non_negative("price", price)?;

        debug!(barcode = %barcode, name = %name, "Creating product");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO products (name, price, barcode) VALUES (?1, ?2, ?3)")
            .bind(&name)
            .bind(price.minor())
            .bind(barcode.as_str())
            .execute(&mut *tx)
            .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(err) => return Err(map_duplicate(err, barcode)),
        };

        tx.commit().await?;

        info!(id, barcode = %barcode, name = %name, price = %price, "Product created");
        Ok(id)
    }

    /// Updates name and/or price. `None` keeps the stored value.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The row after the update
    /// * `Err(DbError::NotFound)` - Unknown barcode
    pub async fn update(
        &self,
        barcode: &BarcodeToken,
        name: Option<&str>,
        price: Option<Money>,
    ) -> DbResult<Product> {
        let name = name.map(|n| validate_name("name", n)).transpose()?;
        if let Some(price) = price {
            validate_non_negative("price", price)?;
        }

        debug!(barcode = %barcode, ?name, ?price, "Updating product");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = COALESCE(?1, name),
                price = COALESCE(?2, price)
            WHERE barcode = ?3
            RETURNING id, barcode, name, price
            "#,
        )
        .bind(name.as_deref())
        .bind(price.map(|p| p.minor()))
        .bind(barcode.as_str())
        .fetch_optional(&mut *tx)
        .await;

        let product = match result {
            Ok(Some(product)) => product,
            Ok(None) => return Err(DbError::not_found("Product", barcode.as_str())),
            Err(err) => return Err(map_duplicate(err, barcode)),
        };

        tx.commit().await?;

        info!(barcode = %barcode, name = %product.name, price = %product.price(), "Product updated");
        Ok(product)
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn map_duplicate(err: sqlx::Error, barcode: &BarcodeToken) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("barcode", barcode.as_str()),
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> (Database, BarcodeToken) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let code: BarcodeToken = "1234".parse().unwrap();
        db.products()
            .create("Club-Mate", Money::from_minor(150), &code)
            .await
            .unwrap();
        (db, code)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (db, code) = setup().await;

        let product = db.products().find_by_barcode(&code).await.unwrap().unwrap();
        assert_eq!(product.name, "Club-Mate");
        assert_eq!(product.price(), Money::from_minor(150));
        assert!(product.has_barcode(&code));

        let other: BarcodeToken = "9999".parse().unwrap();
        assert!(db.products().find_by_barcode(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_barcode() {
        let (db, code) = setup().await;

        let err = db
            .products()
            .create("Cola", Money::from_minor(99), &code)
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_with_nothing_changes_nothing() {
        let (db, code) = setup().await;

        let product = db.products().update(&code, None, None).await.unwrap();
        assert_eq!(product.name, "Club-Mate");
        assert_eq!(product.price, 150);
    }

    #[tokio::test]
    async fn test_update_name_only() {
        let (db, code) = setup().await;

        db.products().update(&code, Some("X"), None).await.unwrap();

        let product = db.products().find_by_barcode(&code).await.unwrap().unwrap();
        assert_eq!(product.name, "X");
        assert_eq!(product.price, 150);
    }

    #[tokio::test]
    async fn test_update_price_only() {
        let (db, code) = setup().await;

        let product = db
            .products()
            .update(&code, None, Some(Money::from_minor(250)))
            .await
            .unwrap();
        assert_eq!(product.name, "Club-Mate");
        assert_eq!(product.price, 250);
    }

    #[tokio::test]
    async fn test_update_unknown_barcode() {
        let (db, _) = setup().await;
        let other: BarcodeToken = "42".parse().unwrap();

        let err = db.products().update(&other, Some("X"), None).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
