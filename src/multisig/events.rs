//! Wallet notifications
//!
//! Observers (the API's WebSocket stream, CLI output) subscribe to an
//! [`EventBus`] and receive a [`WalletEvent`] for every successful state
//! transition.

use crate::core::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Maximum number of events buffered per subscriber
const EVENT_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WalletEvent {
    WalletCreated {
        by: Address,
        wallet: Address,
        timestamp: DateTime<Utc>,
    },
    TransactionInitiated {
        by: Address,
        wallet: Address,
        transaction_id: u64,
        timestamp: DateTime<Utc>,
    },
    VoteCast {
        by: Address,
        wallet: Address,
        transaction_id: u64,
        approve: bool,
        timestamp: DateTime<Utc>,
    },
    VoteReset {
        by: Address,
        wallet: Address,
        transaction_id: u64,
        timestamp: DateTime<Utc>,
    },
    TransactionExecuted {
        by: Address,
        wallet: Address,
        to: Address,
        transaction_id: u64,
        value: u128,
        timestamp: DateTime<Utc>,
    },
}

impl WalletEvent {
    /// Identity that caused the event
    pub fn actor(&self) -> &Address {
        match self {
            WalletEvent::WalletCreated { by, .. }
            | WalletEvent::TransactionInitiated { by, .. }
            | WalletEvent::VoteCast { by, .. }
            | WalletEvent::VoteReset { by, .. }
            | WalletEvent::TransactionExecuted { by, .. } => by,
        }
    }

    /// Wallet the event concerns
    pub fn wallet(&self) -> &Address {
        match self {
            WalletEvent::WalletCreated { wallet, .. }
            | WalletEvent::TransactionInitiated { wallet, .. }
            | WalletEvent::VoteCast { wallet, .. }
            | WalletEvent::VoteReset { wallet, .. }
            | WalletEvent::TransactionExecuted { wallet, .. } => wallet,
        }
    }
}

/// Fan-out channel for wallet events
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<WalletEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publish an event to all current subscribers
    pub fn emit(&self, event: WalletEvent) {
        log::trace!("Emitting {:?}", event);
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
