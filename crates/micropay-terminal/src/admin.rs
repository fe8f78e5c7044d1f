//! # Admin Flows
//!
//! Enrollment and top-up wizards driven by the operator console.
//!
//! ## Flow Skeleton
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  enter:  card gate OFF, barcode gate OFF                               │
//! │     │                                                                   │
//! │     ├── prompt ... (empty answer → Aborted)                            │
//! │     ├── arm capture  (that one gate ON)                                │
//! │     ├── wait for token, or operator cancel → CaptureAborted            │
//! │     ├── prompt ...                                                      │
//! │     └── ledger write (one transaction)                                 │
//! │     │                                                                   │
//! │  exit:   card gate ON, barcode gate ON    ← on every path              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use micropay_core::validation::{parse_amount, parse_positive_amount, validate_name};
use micropay_core::{BarcodeToken, Money, Product};

use crate::capture::PendingCapture;
use crate::error::{TerminalError, TerminalResult};
use crate::terminal::Terminal;

/// Answer that aborts the update-product flow (empty keeps the old value).
pub const ABORT_ANSWER: &str = "-";

// =============================================================================
// Operator
// =============================================================================

/// The person at the console.
#[async_trait]
pub trait Operator: Send {
    /// Shows `question` and reads one line (without the line ending).
    async fn prompt(&mut self, question: &str) -> TerminalResult<String>;

    /// Shows one line of instructions.
    fn say(&mut self, line: &str);

    /// Resolves when the operator abandons the current wait.
    async fn wait_for_cancel(&mut self);
}

// =============================================================================
// Outcomes
// =============================================================================

/// How a flow ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome {
    ToppedUp { member: String, balance: Money },
    CustomerCreated { id: i64, member: String },
    ProductCreated { id: i64, name: String, barcode: String },
    ProductUpdated(Product),
    /// The operator left the flow with an empty (or abort) answer.
    Aborted,
}

// =============================================================================
// Admin Flows
// =============================================================================

/// Runs admin flows against one terminal.
#[derive(Clone)]
pub struct AdminFlows {
    terminal: Terminal,
}

impl AdminFlows {
    pub fn new(terminal: Terminal) -> Self {
        AdminFlows { terminal }
    }

    /// Adds money to the logged-in customer's account.
    pub async fn top_up(&self, op: &mut dyn Operator) -> TerminalResult<AdminOutcome> {
        self.terminal.set_gates(false).await;
        let result = self.top_up_steps(op).await;
        self.finish("top_up", result).await
    }

    /// Enrolls a new card.
    pub async fn new_customer(&self, op: &mut dyn Operator) -> TerminalResult<AdminOutcome> {
        self.terminal.set_gates(false).await;
        let result = self.new_customer_steps(op).await;
        self.finish("new_customer", result).await
    }

    /// Adds a product under a freshly scanned barcode.
    pub async fn new_product(&self, op: &mut dyn Operator) -> TerminalResult<AdminOutcome> {
        self.terminal.set_gates(false).await;
        let result = self.new_product_steps(op).await;
        self.finish("new_product", result).await
    }

    /// Renames and/or reprices a scanned product.
    pub async fn update_product(&self, op: &mut dyn Operator) -> TerminalResult<AdminOutcome> {
        self.terminal.set_gates(false).await;
        let result = self.update_product_steps(op).await;
        self.finish("update_product", result).await
    }

    async fn finish(
        &self,
        flow: &'static str,
        result: TerminalResult<AdminOutcome>,
    ) -> TerminalResult<AdminOutcome> {
        self.terminal.set_gates(true).await;

        match &result {
            Ok(AdminOutcome::Aborted) => info!(flow, "Admin flow aborted"),
            Ok(outcome) => info!(flow, ?outcome, "Admin flow completed"),
            Err(e) if e.is_operator_error() => warn!(flow, error = %e, "Admin flow rejected"),
            Err(e) => error!(flow, error = %e, "Admin flow failed"),
        }
        result
    }

    // =========================================================================
    // Flow Steps
    // =========================================================================

    async fn top_up_steps(&self, op: &mut dyn Operator) -> TerminalResult<AdminOutcome> {
        let account = self.terminal.holder_account().await?;

        op.say("Adding money to account (enter to abort)");
        op.say(&format!("Current balance: {}", account.balance()));

        let input = op.prompt("Enter amount: ").await?;
        if input.trim().is_empty() {
            return Ok(AdminOutcome::Aborted);
        }
        let amount = parse_positive_amount(&input)?;

        let balance = self
            .terminal
            .db()
            .accounts()
            .top_up(&account.token(), amount)
            .await?;

        Ok(AdminOutcome::ToppedUp {
            member: account.member,
            balance,
        })
    }

    async fn new_customer_steps(&self, op: &mut dyn Operator) -> TerminalResult<AdminOutcome> {
        op.say("New customer");

        let name = op.prompt("Enter member name (enter to abort): ").await?;
        if name.trim().is_empty() {
            return Ok(AdminOutcome::Aborted);
        }
        let member = validate_name("member", &name)?;

        let pending = self.terminal.arm_card().await?;
        op.say("Swipe card (- to abort)");
        let token = capture(op, pending).await?;
        op.say("Card read OK!");

        let input = op.prompt("Enter initial deposit (enter to abort): ").await?;
        if input.trim().is_empty() {
            return Ok(AdminOutcome::Aborted);
        }
        let deposit = parse_amount(&input)?;

        let id = self
            .terminal
            .db()
            .accounts()
            .create(&token, &member, deposit)
            .await?;

        Ok(AdminOutcome::CustomerCreated { id, member })
    }

    async fn new_product_steps(&self, op: &mut dyn Operator) -> TerminalResult<AdminOutcome> {
        op.say("New product");

        let name = op.prompt("Enter product name (enter to abort): ").await?;
        if name.trim().is_empty() {
            return Ok(AdminOutcome::Aborted);
        }
        let name = validate_name("name", &name)?;

        let barcode = self.scan_barcode(op).await?;

        let input = op.prompt("Enter price (enter to abort): ").await?;
        if input.trim().is_empty() {
            return Ok(AdminOutcome::Aborted);
        }
        let price = parse_amount(&input)?;

        let id = self
            .terminal
            .db()
            .products()
            .create(&name, price, &barcode)
            .await?;

        Ok(AdminOutcome::ProductCreated {
            id,
            name,
            barcode: barcode.to_string(),
        })
    }

    async fn update_product_steps(&self, op: &mut dyn Operator) -> TerminalResult<AdminOutcome> {
        op.say("Update product");

        let barcode = self.scan_barcode(op).await?;

        let product = self
            .terminal
            .db()
            .products()
            .find_by_barcode(&barcode)
            .await?
            .ok_or_else(|| TerminalError::NotFound {
                entity: "Product".to_string(),
                key: barcode.to_string(),
            })?;

        op.say(&format!("Product: {}", product.name));
        op.say(&format!("Price: {}", product.price()));

        let name = op
            .prompt("Enter new name (enter to keep, - to abort): ")
            .await?;
        let name = match name.trim() {
            ABORT_ANSWER => return Ok(AdminOutcome::Aborted),
            "" => None,
            other => Some(validate_name("name", other)?),
        };

        let price = op
            .prompt("Enter new price (enter to keep, - to abort): ")
            .await?;
        let price = match price.trim() {
            ABORT_ANSWER => return Ok(AdminOutcome::Aborted),
            "" => None,
            other => Some(parse_amount(other)?),
        };

        let product = self
            .terminal
            .db()
            .products()
            .update(&barcode, name.as_deref(), price)
            .await?;

        Ok(AdminOutcome::ProductUpdated(product))
    }

    async fn scan_barcode(&self, op: &mut dyn Operator) -> TerminalResult<BarcodeToken> {
        let pending = self.terminal.arm_barcode().await?;
        op.say("Scan barcode (- to abort)");
        let barcode = capture(op, pending).await?;
        op.say(&format!("Barcode read OK: {}", barcode));
        Ok(barcode)
    }
}

/// Waits for the captured token, or for the operator to give up.
async fn capture<T>(op: &mut dyn Operator, pending: PendingCapture<T>) -> TerminalResult<T> {
    let channel = pending.channel();

    tokio::select! {
        token = pending.wait() => token,
        _ = op.wait_for_cancel() => Err(TerminalError::CaptureAborted { channel }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use micropay_core::{CardToken, Channel};
    use micropay_db::{Database, DbConfig};

    /// Answers prompts from a script; cancels captures on request.
    struct ScriptedOperator {
        answers: VecDeque<String>,
        said: Vec<String>,
        cancel: bool,
    }

    impl ScriptedOperator {
        fn new(answers: &[&str]) -> Self {
            ScriptedOperator {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                said: Vec::new(),
                cancel: false,
            }
        }

        fn cancelling(mut self) -> Self {
            self.cancel = true;
            self
        }
    }

    #[async_trait]
    impl Operator for ScriptedOperator {
        async fn prompt(&mut self, question: &str) -> TerminalResult<String> {
            self.said.push(question.to_string());
            self.answers
                .pop_front()
                .ok_or_else(|| TerminalError::Io("script exhausted".into()))
        }

        fn say(&mut self, line: &str) {
            self.said.push(line.to_string());
        }

        async fn wait_for_cancel(&mut self) {
            if !self.cancel {
                std::future::pending::<()>().await;
            }
        }
    }

    async fn setup() -> (Terminal, AdminFlows) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounts()
            .create(&card("alice"), "Alice", Money::from_minor(500))
            .await
            .unwrap();
        db.products()
            .create("Club-Mate", Money::from_minor(150), &code("1234"))
            .await
            .unwrap();

        let terminal = Terminal::new(db);
        (terminal.clone(), AdminFlows::new(terminal))
    }

    fn card(raw: &str) -> CardToken {
        CardToken::from_swipe(format!("{raw}\r").as_bytes())
    }

    fn code(raw: &str) -> BarcodeToken {
        raw.parse().unwrap()
    }

    async fn wait_armed(terminal: &Terminal, channel: Channel) {
        while !terminal.is_armed(channel).await {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn swipe_when_armed(terminal: &Terminal, token: CardToken) {
        wait_armed(terminal, Channel::Card).await;
        terminal.route_card(token).await.unwrap();
    }

    async fn scan_when_armed(terminal: &Terminal, token: BarcodeToken) {
        wait_armed(terminal, Channel::Barcode).await;
        terminal.route_barcode(token).await.unwrap();
    }

    async fn assert_gates_open(terminal: &Terminal) {
        assert!(terminal.gate(Channel::Card).await);
        assert!(terminal.gate(Channel::Barcode).await);
    }

    #[tokio::test]
    async fn test_top_up_requires_login() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&["100"]);

        let result = flows.top_up(&mut op).await;
        assert!(matches!(result, Err(TerminalError::NotLoggedIn)));
        assert_gates_open(&terminal).await;
    }

    #[tokio::test]
    async fn test_top_up_adds_to_balance() {
        let (terminal, flows) = setup().await;
        terminal.route_card(card("alice")).await.unwrap();
        let mut op = ScriptedOperator::new(&["2000"]);

        let outcome = flows.top_up(&mut op).await.unwrap();
        assert_eq!(
            outcome,
            AdminOutcome::ToppedUp {
                member: "Alice".into(),
                balance: Money::from_minor(2500)
            }
        );
        assert!(op.said.iter().any(|l| l == "Current balance: 5.00"));
        assert_gates_open(&terminal).await;
    }

    #[tokio::test]
    async fn test_top_up_rejects_zero_and_empty_aborts() {
        let (terminal, flows) = setup().await;
        terminal.route_card(card("alice")).await.unwrap();

        let mut op = ScriptedOperator::new(&["0"]);
        assert!(matches!(
            flows.top_up(&mut op).await,
            Err(TerminalError::InvalidAmount(_))
        ));

        let mut op = ScriptedOperator::new(&[""]);
        assert_eq!(flows.top_up(&mut op).await.unwrap(), AdminOutcome::Aborted);

        assert_eq!(terminal.holder_account().await.unwrap().balance, 500);
        assert_gates_open(&terminal).await;
    }

    #[tokio::test]
    async fn test_new_customer_enrolls_captured_card() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&["Bob", "500"]);

        let (outcome, _) = tokio::join!(
            flows.new_customer(&mut op),
            swipe_when_armed(&terminal, card("bob"))
        );

        assert!(matches!(
            outcome.unwrap(),
            AdminOutcome::CustomerCreated { ref member, .. } if member == "Bob"
        ));
        // The enrollment swipe is not a login.
        assert_eq!(terminal.session().await.holder, None);

        let account = terminal
            .db()
            .accounts()
            .find_by_token(&card("bob"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, 500);
        assert_gates_open(&terminal).await;
    }

    #[tokio::test]
    async fn test_new_customer_duplicate_card() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&["Mallory", "9999"]);

        let (outcome, _) = tokio::join!(
            flows.new_customer(&mut op),
            swipe_when_armed(&terminal, card("alice"))
        );

        assert!(matches!(outcome, Err(TerminalError::DuplicateKey(_))));
        let account = terminal
            .db()
            .accounts()
            .find_by_token(&card("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.member, "Alice");
        assert_eq!(account.balance, 500);
        assert_gates_open(&terminal).await;
    }

    #[tokio::test]
    async fn test_new_customer_cancelled_capture() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&["Bob"]).cancelling();

        let result = flows.new_customer(&mut op).await;

        assert!(matches!(
            result,
            Err(TerminalError::CaptureAborted { channel: Channel::Card })
        ));
        assert!(!terminal.is_armed(Channel::Card).await);
        assert_gates_open(&terminal).await;

        // The channel is back to normal routing.
        terminal.route_card(card("alice")).await.unwrap();
        assert!(terminal.session().await.is_logged_in());
    }

    #[tokio::test]
    async fn test_new_customer_empty_name_aborts() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&[""]);

        assert_eq!(flows.new_customer(&mut op).await.unwrap(), AdminOutcome::Aborted);
        assert!(!terminal.is_armed(Channel::Card).await);
        assert_gates_open(&terminal).await;
    }

    #[tokio::test]
    async fn test_new_product() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&["Cola", "100"]);

        let (outcome, _) = tokio::join!(
            flows.new_product(&mut op),
            scan_when_armed(&terminal, code("5000"))
        );

        assert!(matches!(
            outcome.unwrap(),
            AdminOutcome::ProductCreated { ref barcode, .. } if barcode == "5000"
        ));
        let product = terminal
            .db()
            .products()
            .find_by_barcode(&code("5000"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.price, 100);
    }

    #[tokio::test]
    async fn test_new_product_invalid_price() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&["Cola", "1.50"]);

        let (outcome, _) = tokio::join!(
            flows.new_product(&mut op),
            scan_when_armed(&terminal, code("5000"))
        );

        assert!(matches!(outcome, Err(TerminalError::InvalidAmount(_))));
        assert_eq!(terminal.db().products().count().await.unwrap(), 1);
        assert_gates_open(&terminal).await;
    }

    #[tokio::test]
    async fn test_update_product_keeps_empty_fields() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&["", "250"]);

        let (outcome, _) = tokio::join!(
            flows.update_product(&mut op),
            scan_when_armed(&terminal, code("1234"))
        );

        match outcome.unwrap() {
            AdminOutcome::ProductUpdated(product) => {
                assert_eq!(product.name, "Club-Mate");
                assert_eq!(product.price, 250);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_product_dash_aborts() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&["X", "-"]);

        let (outcome, _) = tokio::join!(
            flows.update_product(&mut op),
            scan_when_armed(&terminal, code("1234"))
        );

        assert_eq!(outcome.unwrap(), AdminOutcome::Aborted);
        let product = terminal
            .db()
            .products()
            .find_by_barcode(&code("1234"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.name, "Club-Mate");
    }

    #[tokio::test]
    async fn test_update_unknown_product() {
        let (terminal, flows) = setup().await;
        let mut op = ScriptedOperator::new(&[]);

        let (outcome, _) = tokio::join!(
            flows.update_product(&mut op),
            scan_when_armed(&terminal, code("42"))
        );

        assert!(matches!(outcome, Err(TerminalError::NotFound { .. })));
        assert_gates_open(&terminal).await;
    }

    #[tokio::test]
    async fn test_flow_blocks_purchases_and_logout() {
        let (terminal, flows) = setup().await;
        terminal.route_card(card("alice")).await.unwrap();
        let mut op = ScriptedOperator::new(&["Cola", ""]);

        let probe = async {
            wait_armed(&terminal, Channel::Barcode).await;
            // Card channel is closed for the whole flow.
            assert!(!terminal.logout(crate::events::LogoutReason::Operator).await);
            assert_eq!(
                terminal.route_card(card("alice")).await.unwrap(),
                crate::terminal::CardOutcome::Dropped
            );
            terminal.route_barcode(code("1234")).await.unwrap()
        };

        let (outcome, scanned) = tokio::join!(flows.new_product(&mut op), probe);

        // The scan was captured for enrollment, not bought.
        assert_eq!(scanned, crate::terminal::BarcodeOutcome::Captured);
        assert_eq!(outcome.unwrap(), AdminOutcome::Aborted);
        assert_eq!(terminal.holder_account().await.unwrap().balance, 500);
    }
}
