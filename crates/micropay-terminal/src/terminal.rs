//! # Terminal
//!
//! The single authority for what a token means right now.
//!
//! ## Lock Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   card: Mutex<ChannelState<CardToken>>        ─┐                        │
//! │   barcode: Mutex<ChannelState<BarcodeToken>>  ─┼─► session: Mutex<..>   │
//! │                                                │                        │
//! │   Lock order is always channel → session. The session lock is never     │
//! │   held across ledger I/O.                                               │
//! │                                                                         │
//! │   route_card     holds the card lock for the whole login lookup         │
//! │   route_barcode  releases the barcode lock before touching the ledger   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use micropay_core::{Account, BarcodeToken, CardToken, Channel, Money, Product};
use micropay_db::Database;

use crate::capture::{ChannelState, Dispatch, PendingCapture};
use crate::error::{TerminalError, TerminalResult};
use crate::events::{LogoutReason, NoOpEmitter, TerminalEvent, TerminalEventEmitter};
use crate::session::{Session, SessionSnapshot};

// =============================================================================
// Routing Outcomes
// =============================================================================

/// Result of routing one card swipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardOutcome {
    /// Gate closed; swipe discarded.
    Dropped,
    /// Handed to an admin flow.
    Captured,
    /// Session started (or switched) for this account.
    LoggedIn(Account),
    /// No such account; session unchanged.
    UnknownCustomer,
}

/// Result of routing one barcode scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarcodeOutcome {
    /// Gate closed; scan discarded.
    Dropped,
    /// Handed to an admin flow.
    Captured,
    /// Not in the product table; nothing charged.
    UnknownProduct,
    /// Nobody logged in; price shown only.
    PriceCheck(Product),
    /// Charged to the logged-in customer.
    Purchased { product: Product, balance: Money },
}

// =============================================================================
// Terminal
// =============================================================================

struct Inner {
    db: Database,
    card: Mutex<ChannelState<CardToken>>,
    barcode: Mutex<ChannelState<BarcodeToken>>,
    session: Mutex<Session>,
    emitter: Arc<dyn TerminalEventEmitter>,
}

/// Shared handle to the session and both channels. Cheap to clone.
///
/// ## Usage
/// ```rust,ignore
/// let terminal = Terminal::with_emitter(db, Arc::new(emitter));
///
/// terminal.route_card(CardToken::from_swipe(b";4711?\r")).await?;
/// terminal.route_barcode("5701234".parse()?).await?;
/// terminal.logout(LogoutReason::Operator).await;
/// ```
#[derive(Clone)]
pub struct Terminal {
    inner: Arc<Inner>,
}

impl Terminal {
    /// Creates a terminal that emits nothing.
    pub fn new(db: Database) -> Self {
        Self::with_emitter(db, Arc::new(NoOpEmitter))
    }

    /// Creates a terminal with a custom event emitter.
    pub fn with_emitter(db: Database, emitter: Arc<dyn TerminalEventEmitter>) -> Self {
        Terminal {
            inner: Arc::new(Inner {
                db,
                card: Mutex::new(ChannelState::new(Channel::Card)),
                barcode: Mutex::new(ChannelState::new(Channel::Barcode)),
                session: Mutex::new(Session::new()),
                emitter,
            }),
        }
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    fn emit(&self, event: TerminalEvent) {
        self.inner.emitter.emit(event);
    }

    // =========================================================================
    // Card Channel
    // =========================================================================

    /// Routes one card swipe.
    ///
    /// ## Flow
    /// 1. Gate closed → drop
    /// 2. Capture armed → deliver to the admin flow
    /// 3. Otherwise a login attempt: known card starts a session, unknown
    ///    card leaves the session as it is
    ///
    /// The card lock is held for the whole decision, ledger lookup included.
    pub async fn route_card(&self, token: CardToken) -> TerminalResult<CardOutcome> {
        let mut card = self.inner.card.lock().await;

        let token = match card.dispatch(token) {
            Dispatch::Dropped => {
                debug!("Card gate closed, swipe dropped");
                return Ok(CardOutcome::Dropped);
            }
            Dispatch::Captured => return Ok(CardOutcome::Captured),
            Dispatch::Route(token) => token,
        };

        match self.inner.db.accounts().find_by_token(&token).await? {
            Some(account) => {
                self.inner
                    .session
                    .lock()
                    .await
                    .login(token.clone(), Instant::now());

                info!(card = %token.short(), member = %account.member, "Logged in");
                self.emit(TerminalEvent::LoggedIn {
                    member: account.member.clone(),
                    balance: account.balance(),
                });
                Ok(CardOutcome::LoggedIn(account))
            }
            None => {
                info!(card = %token.short(), "Unknown customer");
                self.emit(TerminalEvent::UnknownCustomer);
                Ok(CardOutcome::UnknownCustomer)
            }
        }
    }

    /// Ends the session.
    ///
    /// No-op while the card gate is closed (an admin flow owns the card
    /// channel) and when nobody is logged in. Returns true if a session was
    /// actually cleared.
    pub async fn logout(&self, reason: LogoutReason) -> bool {
        let card = self.inner.card.lock().await;
        if !card.is_enabled() {
            debug!(%reason, "Card gate closed, logout ignored");
            return false;
        }

        let cleared = self.inner.session.lock().await.logout();
        drop(card);

        match cleared {
            Some(token) => {
                info!(card = %token.short(), %reason, "Logged out");
                self.emit(TerminalEvent::LoggedOut { reason });
                true
            }
            None => false,
        }
    }

    /// Logs out if the session has been idle strictly longer than `timeout`
    /// as seen from `now`. The check and the logout are one atomic step.
    pub async fn logout_if_idle(&self, now: Instant, timeout: Duration) -> bool {
        let card = self.inner.card.lock().await;
        if !card.is_enabled() {
            return false;
        }

        let cleared = {
            let mut session = self.inner.session.lock().await;
            if session.is_expired_at(now, timeout) {
                session.logout()
            } else {
                None
            }
        };
        drop(card);

        match cleared {
            Some(token) => {
                let reason = LogoutReason::Inactivity;
                info!(card = %token.short(), %reason, "Logged out");
                self.emit(TerminalEvent::LoggedOut { reason });
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Barcode Channel
    // =========================================================================

    /// Routes one barcode scan.
    ///
    /// ## Flow
    /// 1. Gate closed → drop
    /// 2. Capture armed → deliver to the admin flow
    /// 3. Release the barcode lock, then look the product up
    /// 4. Snapshot the holder and refresh activity under the session lock
    /// 5. Unknown product → report only
    /// 6. Nobody logged in → price check
    /// 7. Otherwise debit the holder's account
    pub async fn route_barcode(&self, token: BarcodeToken) -> TerminalResult<BarcodeOutcome> {
        let token = {
            let mut barcode = self.inner.barcode.lock().await;
            match barcode.dispatch(token) {
                Dispatch::Dropped => {
                    debug!("Barcode gate closed, scan dropped");
                    return Ok(BarcodeOutcome::Dropped);
                }
                Dispatch::Captured => return Ok(BarcodeOutcome::Captured),
                Dispatch::Route(token) => token,
            }
        };

        let product = self.inner.db.products().find_by_barcode(&token).await?;

        // Any scan past the gate counts as activity, unknown barcodes included.
        let holder = {
            let mut session = self.inner.session.lock().await;
            session.touch(Instant::now());
            session.holder().cloned()
        };

        let Some(product) = product else {
            info!(barcode = %token, "Unknown product");
            self.emit(TerminalEvent::UnknownProduct {
                barcode: token.to_string(),
            });
            return Ok(BarcodeOutcome::UnknownProduct);
        };

        let Some(holder) = holder else {
            debug!(barcode = %token, name = %product.name, "Price check");
            self.emit(TerminalEvent::PriceCheck {
                product: product.name.clone(),
                price: product.price(),
            });
            return Ok(BarcodeOutcome::PriceCheck(product));
        };

        match self.inner.db.accounts().purchase(&holder, product.price()).await {
            Ok(balance) => {
                self.emit(TerminalEvent::Purchased {
                    product: product.name.clone(),
                    price: product.price(),
                    balance,
                });
                Ok(BarcodeOutcome::Purchased { product, balance })
            }
            Err(err) => {
                error!(card = %holder.short(), barcode = %token, ?err, "Purchase failed");
                let err = TerminalError::from(err);
                self.emit(TerminalEvent::PurchaseFailed {
                    product: product.name.clone(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    // =========================================================================
    // Gates & Capture
    // =========================================================================

    /// Opens or closes a channel gate. Closing a gate releases any capture
    /// armed on it.
    pub async fn set_gate(&self, channel: Channel, enabled: bool) {
        match channel {
            Channel::Card => self.inner.card.lock().await.set_enabled(enabled),
            Channel::Barcode => self.inner.barcode.lock().await.set_enabled(enabled),
        }
        debug!(%channel, enabled, "Gate set");
    }

    /// Opens or closes both gates, card first.
    pub async fn set_gates(&self, enabled: bool) {
        for channel in Channel::ALL {
            self.set_gate(channel, enabled).await;
        }
    }

    pub async fn gate(&self, channel: Channel) -> bool {
        match channel {
            Channel::Card => self.inner.card.lock().await.is_enabled(),
            Channel::Barcode => self.inner.barcode.lock().await.is_enabled(),
        }
    }

    /// True while an admin flow is waiting for a token on `channel`.
    pub async fn is_armed(&self, channel: Channel) -> bool {
        match channel {
            Channel::Card => self.inner.card.lock().await.is_armed(),
            Channel::Barcode => self.inner.barcode.lock().await.is_armed(),
        }
    }

    /// Arms a capture for the next card swipe and opens the card gate.
    pub async fn arm_card(&self) -> TerminalResult<PendingCapture<CardToken>> {
        self.inner.card.lock().await.arm()
    }

    /// Arms a capture for the next barcode scan and opens the barcode gate.
    pub async fn arm_barcode(&self) -> TerminalResult<PendingCapture<BarcodeToken>> {
        self.inner.barcode.lock().await.arm()
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Refreshes the activity timestamp without changing the holder.
    pub async fn touch(&self) {
        self.inner.session.lock().await.touch(Instant::now());
    }

    pub async fn session(&self) -> SessionSnapshot {
        self.inner.session.lock().await.snapshot()
    }

    /// Re-reads the logged-in customer's account from the ledger.
    ///
    /// ## Errors
    /// * `NotLoggedIn` - No session
    /// * `UnknownCustomer` - The account was removed after login
    pub async fn holder_account(&self) -> TerminalResult<Account> {
        let holder = self
            .inner
            .session
            .lock()
            .await
            .holder()
            .cloned()
            .ok_or(TerminalError::NotLoggedIn)?;

        match self.inner.db.accounts().find_by_token(&holder).await? {
            Some(account) => Ok(account),
            None => {
                warn!(card = %holder.short(), "Logged-in account no longer exists");
                Err(TerminalError::UnknownCustomer)
            }
        }
    }
}

// =============================================================================
// Router Trait
// =============================================================================

/// Something a device reader can hand its tokens to.
#[async_trait]
pub trait Router<T>: Send + Sync {
    async fn route(&self, token: T) -> TerminalResult<()>;
}

#[async_trait]
impl Router<CardToken> for Terminal {
    async fn route(&self, token: CardToken) -> TerminalResult<()> {
        self.route_card(token).await.map(|_| ())
    }
}

#[async_trait]
impl Router<BarcodeToken> for Terminal {
    async fn route(&self, token: BarcodeToken) -> TerminalResult<()> {
        self.route_barcode(token).await.map(|_| ())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelEmitter;
    use micropay_db::DbConfig;
    use tokio::sync::mpsc;

    async fn setup() -> (Terminal, mpsc::UnboundedReceiver<TerminalEvent>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.accounts()
            .create(&card("alice"), "Alice", Money::from_minor(500))
            .await
            .unwrap();
        db.products()
            .create("Club-Mate", Money::from_minor(150), &code("1234"))
            .await
            .unwrap();

        let (emitter, rx) = ChannelEmitter::new();
        (Terminal::with_emitter(db, Arc::new(emitter)), rx)
    }

    fn card(raw: &str) -> CardToken {
        CardToken::from_swipe(format!("{raw}\r").as_bytes())
    }

    fn code(raw: &str) -> BarcodeToken {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_unknown_card_leaves_session_unchanged() {
        let (terminal, mut events) = setup().await;

        let outcome = terminal.route_card(card("stranger")).await.unwrap();
        assert_eq!(outcome, CardOutcome::UnknownCustomer);
        assert_eq!(terminal.session().await.holder, None);
        assert_eq!(events.recv().await, Some(TerminalEvent::UnknownCustomer));

        terminal.route_card(card("alice")).await.unwrap();
        terminal.route_card(card("stranger")).await.unwrap();
        assert_eq!(terminal.session().await.holder, Some(card("alice")));
    }

    #[tokio::test]
    async fn test_login_sets_holder_and_activity() {
        let (terminal, mut events) = setup().await;
        let before = Instant::now();

        let outcome = terminal.route_card(card("alice")).await.unwrap();
        assert!(matches!(outcome, CardOutcome::LoggedIn(ref a) if a.member == "Alice"));

        let session = terminal.session().await;
        assert_eq!(session.holder, Some(card("alice")));
        assert!(session.last_activity >= before);
        assert_eq!(
            events.recv().await,
            Some(TerminalEvent::LoggedIn {
                member: "Alice".into(),
                balance: Money::from_minor(500)
            })
        );
    }

    #[tokio::test]
    async fn test_price_check_when_logged_out() {
        let (terminal, _events) = setup().await;

        let outcome = terminal.route_barcode(code("1234")).await.unwrap();
        assert!(matches!(outcome, BarcodeOutcome::PriceCheck(ref p) if p.price == 150));

        let account = terminal
            .db()
            .accounts()
            .find_by_token(&card("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, 500);
    }

    #[tokio::test]
    async fn test_purchase_debits_holder() {
        let (terminal, _events) = setup().await;
        terminal.route_card(card("alice")).await.unwrap();

        let outcome = terminal.route_barcode(code("1234")).await.unwrap();
        match outcome {
            BarcodeOutcome::Purchased { balance, .. } => assert_eq!(balance.minor(), 350),
            other => panic!("expected purchase, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_barcode_refreshes_activity_without_charge() {
        let (terminal, _events) = setup().await;
        terminal.route_card(card("alice")).await.unwrap();
        let login_at = terminal.session().await.last_activity;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let outcome = terminal.route_barcode(code("999")).await.unwrap();

        assert_eq!(outcome, BarcodeOutcome::UnknownProduct);
        assert!(terminal.session().await.last_activity > login_at);
        let account = terminal.holder_account().await.unwrap();
        assert_eq!(account.balance, 500);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (terminal, _events) = setup().await;
        terminal.route_card(card("alice")).await.unwrap();

        assert!(terminal.logout(LogoutReason::Operator).await);
        assert!(!terminal.logout(LogoutReason::Operator).await);
        assert_eq!(terminal.session().await.holder, None);
    }

    #[tokio::test]
    async fn test_logout_ignored_while_card_gate_closed() {
        let (terminal, _events) = setup().await;
        terminal.route_card(card("alice")).await.unwrap();

        terminal.set_gate(Channel::Card, false).await;
        assert!(!terminal.logout(LogoutReason::Operator).await);
        assert!(terminal.session().await.is_logged_in());
    }

    #[tokio::test]
    async fn test_disabled_gates_block_login_and_purchase() {
        let (terminal, _events) = setup().await;
        terminal.set_gates(false).await;

        assert_eq!(
            terminal.route_card(card("alice")).await.unwrap(),
            CardOutcome::Dropped
        );
        assert_eq!(
            terminal.route_barcode(code("1234")).await.unwrap(),
            BarcodeOutcome::Dropped
        );
        assert_eq!(terminal.session().await.holder, None);
    }

    #[tokio::test]
    async fn test_capture_diverts_swipe_from_login() {
        let (terminal, _events) = setup().await;
        terminal.set_gates(false).await;

        let pending = terminal.arm_card().await.unwrap();
        assert!(terminal.gate(Channel::Card).await);

        let outcome = terminal.route_card(card("alice")).await.unwrap();
        assert_eq!(outcome, CardOutcome::Captured);
        assert_eq!(pending.wait().await.unwrap(), card("alice"));

        assert_eq!(terminal.session().await.holder, None);
        assert!(!terminal.gate(Channel::Card).await);
    }

    #[tokio::test]
    async fn test_capture_diverts_scan_from_purchase() {
        let (terminal, _events) = setup().await;
        terminal.route_card(card("alice")).await.unwrap();
        terminal.set_gates(false).await;

        let pending = terminal.arm_barcode().await.unwrap();
        let outcome = terminal.route_barcode(code("1234")).await.unwrap();
        assert_eq!(outcome, BarcodeOutcome::Captured);
        assert_eq!(pending.wait().await.unwrap(), code("1234"));

        assert_eq!(terminal.holder_account().await.unwrap().balance, 500);
    }

    #[tokio::test]
    async fn test_logout_if_idle() {
        let (terminal, mut events) = setup().await;
        terminal.route_card(card("alice")).await.unwrap();
        let _ = events.recv().await;

        let since = terminal.session().await.last_activity;
        let timeout = Duration::from_secs(30);

        assert!(!terminal.logout_if_idle(since + Duration::from_secs(30), timeout).await);
        assert!(terminal.logout_if_idle(since + Duration::from_secs(31), timeout).await);
        assert_eq!(
            events.recv().await,
            Some(TerminalEvent::LoggedOut {
                reason: LogoutReason::Inactivity
            })
        );
    }

    #[tokio::test]
    async fn test_holder_account_requires_login() {
        let (terminal, _events) = setup().await;
        assert!(matches!(
            terminal.holder_account().await,
            Err(TerminalError::NotLoggedIn)
        ));
    }
}
