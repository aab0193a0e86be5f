//! Seams to the UI: popup screens and transient alerts.
//!
//! The engine only asks for a popup or an alert; what they look like is the
//! embedding application's business.

use std::fmt;
use std::time::Duration;

use gazdalkodj_protocol::{PlayerIndex, Position};
use tracing::info;

use crate::fields::PopupKind;

/// A request to show the popup attached to a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PopupRequest {
    pub kind: PopupKind,
    pub player: PlayerIndex,
    pub field: Position,
}

/// Something the acting player should be told.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// A jailed player rolled something other than a six.
    JailStay,
    /// Caught riding the train without a ticket.
    Fined { amount: i64 },
    InsufficientFunds { item: String, price: i64 },
    AlreadyOwned { item: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::JailStay => f.write_str("Only a six gets you out of jail."),
            Notice::Fined { amount } => write!(f, "Caught without a ticket: fined {amount}."),
            Notice::InsufficientFunds { item, price } => {
                write!(f, "Not enough money for {item} ({price}).")
            }
            Notice::AlreadyOwned { item } => write!(f, "You already own {item}."),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertLevel {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertOptions {
    pub level: AlertLevel,
    /// How long the alert stays up; `None` until dismissed.
    pub timeout: Option<Duration>,
}

impl AlertOptions {
    pub fn for_notice(notice: &Notice) -> Self {
        let level = match notice {
            Notice::JailStay => AlertLevel::Info,
            Notice::Fined { .. } => AlertLevel::Warning,
            Notice::InsufficientFunds { .. } | Notice::AlreadyOwned { .. } => AlertLevel::Error,
        };
        Self {
            level,
            timeout: Some(Duration::from_secs(3)),
        }
    }
}

pub trait PopupGateway {
    fn open(&mut self, request: &PopupRequest);
    fn close(&mut self);
}

pub trait AlertGateway {
    fn show(&mut self, notice: &Notice, options: &AlertOptions);
}

/// Headless gateway that only logs; used by bots and the terminal client.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogGateway;

impl PopupGateway for LogGateway {
    fn open(&mut self, request: &PopupRequest) {
        info!(kind = ?request.kind, player = %request.player, field = request.field, "popup opened");
    }

    fn close(&mut self) {
        info!("popup closed");
    }
}

impl AlertGateway for LogGateway {
    fn show(&mut self, notice: &Notice, options: &AlertOptions) {
        info!(level = ?options.level, "{notice}");
    }
}
