//! # Operator Console
//!
//! Raw-mode keyboard input and all text the kiosk prints.
//!
//! ```text
//!  key thread ──► mpsc ──► Console::run ──► menu command / AdminFlows
//!                                 │
//!  TerminalEvent ──► print_events ┴──► stdout ("\r\n" line endings)
//! ```

use std::io::{self, Write};

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tracing::{debug, error};

use micropay_core::Money;
use micropay_terminal::{
    AdminFlows, AdminOutcome, LogoutReason, Operator, Terminal, TerminalError, TerminalEvent,
    TerminalResult,
};

const RULE_WIDE: &str = "-------------------------------";
const RULE: &str = "------------------";

/// Blank lines printed on logout so the next customer sees a clean screen.
const LOGOUT_SCROLL: usize = 40;

// =============================================================================
// Output
// =============================================================================

/// Writes lines with raw-mode line endings.
pub fn print_lines<S: AsRef<str>>(lines: &[S]) {
    let mut out = io::stdout().lock();
    for line in lines {
        let _ = write!(out, "{}\r\n", line.as_ref());
    }
    let _ = out.flush();
}

fn print_inline(text: &str) {
    let mut out = io::stdout().lock();
    let _ = write!(out, "{}", text);
    let _ = out.flush();
}

/// Prints engine events until the emitter goes away.
pub async fn print_events(mut events: mpsc::UnboundedReceiver<TerminalEvent>, currency: String) {
    while let Some(event) = events.recv().await {
        print_lines(&format_event(&event, &currency));
    }
}

// =============================================================================
// Raw Mode
// =============================================================================

/// Keeps the tty in raw mode until dropped.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            error!(error = %e, "Failed to restore terminal mode");
        }
    }
}

/// Reads key presses on a dedicated thread; crossterm's reader blocks.
pub fn spawn_key_reader() -> mpsc::UnboundedReceiver<KeyEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if tx.send(key).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Keyboard read failed");
                break;
            }
        }
    });

    rx
}

// =============================================================================
// Console
// =============================================================================

pub struct Console {
    keys: mpsc::UnboundedReceiver<KeyEvent>,
    currency: String,
}

impl Console {
    pub fn new(keys: mpsc::UnboundedReceiver<KeyEvent>, currency: impl Into<String>) -> Self {
        Console {
            keys,
            currency: currency.into(),
        }
    }

    /// Runs the idle menu until the keyboard goes away.
    pub async fn run(&mut self, terminal: &Terminal) {
        let flows = AdminFlows::new(terminal.clone());
        print_lines(&menu_lines());

        while let Some(key) = self.keys.recv().await {
            terminal.touch().await;

            if key.modifiers.contains(KeyModifiers::CONTROL) {
                print_lines(&["There is no escape!"]);
                continue;
            }

            match key.code {
                KeyCode::Char('*') => print_lines(&menu_lines()),
                KeyCode::Char('-') | KeyCode::Esc => {
                    if !terminal.logout(LogoutReason::Operator).await {
                        debug!("Logout key with nobody logged in");
                    }
                }
                KeyCode::Char('/') => {
                    let result = flows.top_up(&mut *self).await;
                    self.report(result);
                }
                KeyCode::Char('0') => {
                    let result = flows.new_customer(&mut *self).await;
                    self.report(result);
                }
                KeyCode::Char('1') => {
                    let result = flows.new_product(&mut *self).await;
                    self.report(result);
                }
                KeyCode::Char('2') => {
                    let result = flows.update_product(&mut *self).await;
                    self.report(result);
                }
                KeyCode::Enter => print_lines(&["ENTER"]),
                KeyCode::Char(c) => print_lines(&[c.to_string()]),
                _ => {}
            }
        }
    }

    fn report(&self, result: TerminalResult<AdminOutcome>) {
        let lines = match result {
            Ok(outcome) => format_outcome(&outcome, &self.currency),
            Err(e) => vec![format_error(&e)],
        };
        print_lines(&lines);
    }
}

#[async_trait]
impl Operator for Console {
    async fn prompt(&mut self, question: &str) -> TerminalResult<String> {
        print_inline(question);
        let mut line = String::new();

        while let Some(key) = self.keys.recv().await {
            match key.code {
                KeyCode::Enter => {
                    print_lines(&[""]);
                    return Ok(line);
                }
                KeyCode::Backspace => {
                    if line.pop().is_some() {
                        print_inline("\u{8} \u{8}");
                    }
                }
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    line.push(c);
                    print_inline(c.encode_utf8(&mut [0; 4]));
                }
                _ => {}
            }
        }

        Err(TerminalError::Io("keyboard closed".into()))
    }

    fn say(&mut self, line: &str) {
        print_lines(&[line]);
    }

    async fn wait_for_cancel(&mut self) {
        while let Some(key) = self.keys.recv().await {
            if matches!(key.code, KeyCode::Char('-') | KeyCode::Esc) {
                return;
            }
        }
        // Keyboard gone: nothing can cancel any more.
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// Formatting
// =============================================================================

fn amount(value: Money, currency: &str) -> String {
    format!("{} {}", value, currency)
}

pub fn menu_lines() -> Vec<&'static str> {
    vec![
        "-----------------------------------------",
        "    Swipe card at any time to log in,",
        "    scan barcode(s) and hit \"-\" or",
        "    wait 30 seconds to log out",
        "",
        "* | Print this menu",
        "- | Log out / Escape",
        "/ | Add money to card",
        "0 | New customer",
        "1 | New product",
        "2 | Update product",
        "-----------------------------------------",
    ]
}

pub fn format_event(event: &TerminalEvent, currency: &str) -> Vec<String> {
    match event {
        TerminalEvent::LoggedIn { member, balance } => vec![
            RULE_WIDE.to_string(),
            format!("Logged in as: {}", member),
            format!("With account balance: {}", amount(*balance, currency)),
            RULE_WIDE.to_string(),
            "Scan barcode: ".to_string(),
        ],
        TerminalEvent::UnknownCustomer => vec!["Unknown customer".to_string()],
        TerminalEvent::LoggedOut { reason } => {
            let mut lines = vec![String::new(); LOGOUT_SCROLL];
            lines.push(match reason {
                LogoutReason::Operator => "Logged out".to_string(),
                LogoutReason::Inactivity => "Logged out due to inactivity".to_string(),
            });
            lines
        }
        TerminalEvent::UnknownProduct { barcode } => vec![
            RULE.to_string(),
            "Unknown product!".to_string(),
            format!("Barcode: {}", barcode),
            RULE.to_string(),
        ],
        TerminalEvent::PriceCheck { product, price } => vec![
            RULE.to_string(),
            "Price check!".to_string(),
            format!("Product: {}", product),
            format!("Price  : {}", amount(*price, currency)),
            RULE.to_string(),
        ],
        TerminalEvent::Purchased {
            product,
            price,
            balance,
        } => vec![
            RULE.to_string(),
            "Buying product!".to_string(),
            format!("Product: {}", product),
            format!("Price  : {}", amount(*price, currency)),
            format!("Balance after purchase: {}", amount(*balance, currency)),
            String::new(),
            "=== REMEMBER TO LOG OUT ===".to_string(),
            RULE.to_string(),
        ],
        TerminalEvent::PurchaseFailed { product, message } => {
            vec![format!("ERROR: could not buy {}: {}", product, message)]
        }
    }
}

pub fn format_outcome(outcome: &AdminOutcome, currency: &str) -> Vec<String> {
    match outcome {
        AdminOutcome::ToppedUp { member, balance } => vec![format!(
            "Updated balance for {}: {}",
            member,
            amount(*balance, currency)
        )],
        AdminOutcome::CustomerCreated { id, member } => vec![
            format!("Account #{} created for {}", id, member),
            String::new(),
            "Swipe card again to log in.".to_string(),
        ],
        AdminOutcome::ProductCreated { id, name, barcode } => {
            vec![format!("Product #{} created: {} ({})", id, name, barcode)]
        }
        AdminOutcome::ProductUpdated(product) => vec![
            "Product updated!".to_string(),
            format!("Product: {}", product.name),
            format!("Price  : {}", amount(product.price(), currency)),
        ],
        AdminOutcome::Aborted => vec!["Aborted!".to_string()],
    }
}

pub fn format_error(err: &TerminalError) -> String {
    match err {
        TerminalError::NotLoggedIn => "Not logged in... Swipe card and try again.".to_string(),
        TerminalError::CaptureAborted { .. } => "Aborted!".to_string(),
        TerminalError::InvalidAmount(_) => "ERROR: Invalid value".to_string(),
        TerminalError::DuplicateKey(msg) => format!("ERROR: {}", msg),
        TerminalError::NotFound { entity, .. } if entity == "Product" => {
            "Unknown product!".to_string()
        }
        other => format!("ERROR: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_lines() {
        let lines = format_event(
            &TerminalEvent::Purchased {
                product: "Club-Mate".into(),
                price: Money::from_minor(150),
                balance: Money::from_minor(-650),
            },
            "DKK",
        );

        assert!(lines.contains(&"Price  : 1.50 DKK".to_string()));
        assert!(lines.contains(&"Balance after purchase: -6.50 DKK".to_string()));
    }

    #[test]
    fn test_logout_clears_screen() {
        let lines = format_event(
            &TerminalEvent::LoggedOut {
                reason: LogoutReason::Inactivity,
            },
            "DKK",
        );

        assert_eq!(lines.len(), LOGOUT_SCROLL + 1);
        assert_eq!(lines.last().map(String::as_str), Some("Logged out due to inactivity"));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            format_error(&TerminalError::InvalidAmount("x".into())),
            "ERROR: Invalid value"
        );
        assert_eq!(
            format_error(&TerminalError::NotFound {
                entity: "Product".into(),
                key: "42".into()
            }),
            "Unknown product!"
        );
        assert!(format_error(&TerminalError::DuplicateKey("card 'AB12' already exists".into()))
            .contains("already exists"));
    }

    #[test]
    fn test_menu_lists_every_command() {
        let menu = menu_lines().join("\n");
        for key in ["* |", "- |", "/ |", "0 |", "1 |", "2 |"] {
            assert!(menu.contains(key), "missing {key}");
        }
    }
}
