//! End-to-end walk through a customer's visit: enrollment, login, a
//! purchase, and the inactivity logout.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use micropay_core::{BarcodeToken, CardToken, Channel, Money};
use micropay_db::{Database, DbConfig};
use micropay_terminal::{
    AdminFlows, AdminOutcome, BarcodeOutcome, CardOutcome, ChannelEmitter, InactivityMonitor,
    LogoutReason, MonitorConfig, Operator, Terminal, TerminalError, TerminalEvent,
    TerminalResult,
};

struct Answers(VecDeque<&'static str>);

#[async_trait]
impl Operator for Answers {
    async fn prompt(&mut self, _question: &str) -> TerminalResult<String> {
        self.0
            .pop_front()
            .map(str::to_string)
            .ok_or_else(|| TerminalError::Io("no more answers".into()))
    }

    fn say(&mut self, _line: &str) {}

    async fn wait_for_cancel(&mut self) {
        std::future::pending::<()>().await;
    }
}

fn card(raw: &str) -> CardToken {
    CardToken::from_swipe(format!("{raw}\r").as_bytes())
}

fn code(raw: &str) -> BarcodeToken {
    raw.parse().unwrap()
}

#[tokio::test]
async fn test_customer_visit() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    db.products()
        .create("Club-Mate", Money::from_minor(150), &code("1234"))
        .await
        .unwrap();

    let (emitter, mut events) = ChannelEmitter::new();
    let terminal = Terminal::with_emitter(db, Arc::new(emitter));
    let flows = AdminFlows::new(terminal.clone());

    // Unknown card: nothing happens to the session.
    assert_eq!(
        terminal.route_card(card("C1")).await.unwrap(),
        CardOutcome::UnknownCustomer
    );
    assert_eq!(events.recv().await, Some(TerminalEvent::UnknownCustomer));

    // Enroll it with 500.
    let mut op = Answers(VecDeque::from(["Alice", "500"]));
    let swipe = async {
        while !terminal.is_armed(Channel::Card).await {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        terminal.route_card(card("C1")).await.unwrap()
    };
    let (outcome, captured) = tokio::join!(flows.new_customer(&mut op), swipe);
    assert_eq!(captured, CardOutcome::Captured);
    assert!(matches!(outcome.unwrap(), AdminOutcome::CustomerCreated { .. }));

    // Price check while nobody is logged in.
    assert!(matches!(
        terminal.route_barcode(code("1234")).await.unwrap(),
        BarcodeOutcome::PriceCheck(_)
    ));

    // Login, then buy.
    assert!(matches!(
        terminal.route_card(card("C1")).await.unwrap(),
        CardOutcome::LoggedIn(_)
    ));
    match terminal.route_barcode(code("1234")).await.unwrap() {
        BarcodeOutcome::Purchased { balance, .. } => assert_eq!(balance, Money::from_minor(350)),
        other => panic!("expected purchase, got {other:?}"),
    }

    // Idle past the timeout.
    let monitor = InactivityMonitor::new(terminal.clone(), MonitorConfig::default());
    let since = terminal.session().await.last_activity;
    assert!(!monitor.check_at(since + Duration::from_secs(30)).await);
    assert!(monitor.check_at(since + Duration::from_secs(31)).await);
    assert!(!terminal.session().await.is_logged_in());

    // The next scan is a price check again.
    assert!(matches!(
        terminal.route_barcode(code("1234")).await.unwrap(),
        BarcodeOutcome::PriceCheck(_)
    ));

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&TerminalEvent::LoggedOut {
        reason: LogoutReason::Inactivity
    }));
}

#[tokio::test]
async fn test_debt_is_allowed() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    db.accounts()
        .create(&card("C2"), "Bob", Money::from_minor(100))
        .await
        .unwrap();
    db.products()
        .create("Coffee", Money::from_minor(1000), &code("42"))
        .await
        .unwrap();

    let terminal = Terminal::new(db);
    terminal.route_card(card("C2")).await.unwrap();

    match terminal.route_barcode(code("42")).await.unwrap() {
        BarcodeOutcome::Purchased { balance, .. } => assert_eq!(balance, Money::from_minor(-900)),
        other => panic!("expected purchase, got {other:?}"),
    }
}
