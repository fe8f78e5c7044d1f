//! # Account Repository
//!
//! Customer accounts keyed by card token hash.
//!
//! ## Key Operations
//! - Login lookup
//! - Purchase (blind decrement, may go negative)
//! - Top-up
//! - Enrollment
//!
//! ## Purchase Atomicity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Decrement-then-read                                  │
//! │                                                                         │
//! │  ❌ Two statements, no transaction:                                    │
//! │     UPDATE accounts SET balance = balance - 150 WHERE hash = ?         │
//! │     SELECT balance FROM accounts WHERE hash = ?   ← may see a later    │
//! │                                                     writer's update     │
//! │                                                                         │
//! │  ✅ One statement inside a transaction:                                │
//! │     BEGIN                                                               │
//! │     UPDATE accounts SET balance = balance - 150 WHERE hash = ?         │
//! │       RETURNING balance                         ← our own write         │
//! │     COMMIT                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::{debug, info};

use micropay_core::validation::{validate_name, validate_non_negative, validate_positive};
use micropay_core::{Account, CardToken, Money};

use crate::error::{DbError, DbResult};

/// Repository for account operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.accounts();
///
/// let id = repo.create(&token, "Alice", Money::from_minor(500)).await?;
/// let balance = repo.purchase(&token, Money::from_minor(150)).await?;
/// assert_eq!(balance.minor(), 350);
/// ```
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    /// Looks up an account by card token.
    ///
    /// ## Returns
    /// * `Ok(Some(Account))` - Known card
    /// * `Ok(None)` - Unknown card
    pub async fn find_by_token(&self, token: &CardToken) -> DbResult<Option<Account>> {
        debug!(card = %token.short(), "Looking up account");

        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, hash AS token_hash, member, balance
            FROM accounts
            WHERE hash = ?1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Enrolls a new customer.
    ///
    /// ## Returns
    /// * `Ok(i64)` - Row id of the new account
    /// * `Err(DbError::UniqueViolation)` - Card already enrolled; nothing written
    /// * `Err(DbError::Validation)` - Negative or oversized initial balance
    pub async fn create(&self, token: &CardToken, member: &str, initial: Money) -> DbResult<i64> {
        let member = validate_name("member", member)?;
        validate_non_negative("amount", initial)?;

        debug!(card = %token.short(), member = %member, "Creating account");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO accounts (hash, member, balance) VALUES (?1, ?2, ?3)")
            .bind(token.as_str())
            .bind(&member)
            .bind(initial.minor())
            .execute(&mut *tx)
            .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(err) => {
                return Err(match DbError::from(err) {
                    DbError::UniqueViolation { .. } => DbError::duplicate("card", token.short()),
                    other => other,
                });
            }
        };

        tx.commit().await?;

        info!(id, card = %token.short(), member = %member, balance = %initial, "Account created");
        Ok(id)
    }

    /// Debits `price` and returns the balance after the purchase.
    ///
    /// Insufficient funds never block a purchase.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Account no longer exists
    pub async fn purchase(&self, token: &CardToken, price: Money) -> DbResult<Money> {
        validate_non_negative("price", price)?;

        let mut tx = self.pool.begin().await?;

        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts SET balance = balance - ?1 WHERE hash = ?2 RETURNING balance",
        )
        .bind(price.minor())
        .bind(token.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let balance = balance.ok_or_else(|| DbError::not_found("Account", token.short()))?;
        tx.commit().await?;

        let balance = Money::from_minor(balance);
        info!(card = %token.short(), price = %price, balance = %balance, "Purchase recorded");
        Ok(balance)
    }

    /// Credits a strictly positive `amount` and returns the new balance.
    pub async fn top_up(&self, token: &CardToken, amount: Money) -> DbResult<Money> {
        validate_positive("amount", amount)?;

        let mut tx = self.pool.begin().await?;

        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts SET balance = balance + ?1 WHERE hash = ?2 RETURNING balance",
        )
        .bind(amount.minor())
        .bind(token.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let balance = balance.ok_or_else(|| DbError::not_found("Account", token.short()))?;
        tx.commit().await?;

        let balance = Money::from_minor(balance);
        info!(card = %token.short(), amount = %amount, balance = %balance, "Top-up recorded");
        Ok(balance)
    }

    /// Counts accounts (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
