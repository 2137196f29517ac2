//! Wallet registry
//!
//! The registry is the only way to create wallets. It validates creation
//! parameters, derives each wallet's handle, remembers which identity
//! created which wallets, and performs the external action of every
//! finalized transaction (value transfer plus optional [`Call`]).

use crate::core::{Address, Ledger, LedgerSnapshot};
use crate::multisig::call::Call;
use crate::multisig::engine::WalletEngine;
use crate::multisig::error::{ExecutionError, WalletError};
use crate::multisig::events::{EventBus, WalletEvent};
use crate::multisig::guard::ExecutionLock;
use crate::multisig::state::WalletState;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Seed of the registry's own address
    pub name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "sigsafe".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Address the registry is reachable at
    pub fn address(&self) -> Address {
        Address::derive(&[b"registry", self.name.as_bytes()])
    }
}

#[derive(Debug, Default)]
struct Wallets {
    /// Handle -> engine, in creation order via `order`
    by_address: HashMap<Address, Arc<WalletEngine>>,
    order: Vec<Address>,
}

/// Creates wallets and routes their external actions
#[derive(Debug)]
pub struct WalletRegistry {
    address: Address,
    ledger: Arc<Ledger>,
    events: Arc<EventBus>,
    wallets: RwLock<Wallets>,
    /// Creator -> wallets it created, append-only
    created: RwLock<HashMap<Address, Vec<Address>>>,
    /// Held across every finalize and every snapshot
    execution: ExecutionLock,
    self_ref: Weak<WalletRegistry>,
}

impl WalletRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig, ledger: Arc<Ledger>, events: Arc<EventBus>) -> Arc<Self> {
        Self::with_address(config.address(), ledger, events)
    }

    fn with_address(address: Address, ledger: Arc<Ledger>, events: Arc<EventBus>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            address,
            ledger,
            events,
            wallets: RwLock::new(Wallets::default()),
            created: RwLock::new(HashMap::new()),
            execution: ExecutionLock::new(),
            self_ref: self_ref.clone(),
        })
    }

    fn wallets(&self) -> RwLockReadGuard<'_, Wallets> {
        self.wallets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn wallets_mut(&self) -> RwLockWriteGuard<'_, Wallets> {
        self.wallets.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn created(&self) -> RwLockReadGuard<'_, HashMap<Address, Vec<Address>>> {
        self.created.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn created_mut(&self) -> RwLockWriteGuard<'_, HashMap<Address, Vec<Address>>> {
        self.created.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn derive_wallet_address(&self, creator: &Address, nonce: u64) -> Address {
        Address::derive(&[
            self.address.as_str().as_bytes(),
            creator.as_str().as_bytes(),
            &nonce.to_be_bytes(),
        ])
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a wallet on behalf of `caller`
    ///
    /// The new handle is recorded under the caller, not under the
    /// signatories.
    pub fn create_wallet(
        &self,
        caller: &Address,
        required_approvals: u64,
        signatories: Vec<Address>,
    ) -> Result<Address, WalletError> {
        let state = WalletState::new(required_approvals, signatories)?;

        let address = {
            let mut wallets = self.wallets_mut();
            let address = self.derive_wallet_address(caller, wallets.order.len() as u64);
            let engine = WalletEngine::new(
                address.clone(),
                state,
                self.self_ref.clone(),
                self.events.clone(),
            );
            wallets.by_address.insert(address.clone(), Arc::new(engine));
            wallets.order.push(address.clone());
            address
        };

        self.created_mut()
            .entry(caller.clone())
            .or_default()
            .push(address.clone());

        log::info!(
            "Wallet {} created by {} ({}-of-n)",
            address,
            caller,
            required_approvals
        );
        self.events.emit(WalletEvent::WalletCreated {
            by: caller.clone(),
            wallet: address.clone(),
            timestamp: Utc::now(),
        });

        Ok(address)
    }

    /// Handle the next `create_wallet` by `creator` will return, assuming
    /// no other wallet is created first
    pub fn predict_wallet_address(&self, creator: &Address) -> Address {
        let nonce = self.wallets().order.len() as u64;
        self.derive_wallet_address(creator, nonce)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Wallets created by `identity`, oldest first
    pub fn get_wallets(&self, identity: &Address) -> Vec<Address> {
        self.created().get(identity).cloned().unwrap_or_default()
    }

    pub fn wallet(&self, address: &Address) -> Option<Arc<WalletEngine>> {
        self.wallets().by_address.get(address).cloned()
    }

    pub fn wallet_or_err(&self, address: &Address) -> Result<Arc<WalletEngine>, WalletError> {
        self.wallet(address)
            .ok_or_else(|| WalletError::WalletNotFound(address.clone()))
    }

    /// Every wallet handle, in creation order
    pub fn list_wallets(&self) -> Vec<Address> {
        self.wallets().order.clone()
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets().order.len()
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub(crate) fn execution_lock(&self) -> &ExecutionLock {
        &self.execution
    }

    // =========================================================================
    // External actions
    // =========================================================================

    /// Perform the action of a finalized transaction on behalf of wallet
    /// `from`: move `value` to `to`, then invoke the call in `data`.
    ///
    /// All-or-nothing: if the call fails the transfer is reversed. The
    /// execution lock is held throughout, so no other finalize can spend the
    /// credited funds, and a failed nested call has no effects of its own.
    pub fn execute_action(
        &self,
        from: &Address,
        to: &Address,
        value: u128,
        data: &[u8],
    ) -> Result<(), ExecutionError> {
        let _execution = self.execution.acquire();

        self.ledger.transfer(from, to, value)?;

        if data.is_empty() {
            return Ok(());
        }

        if let Err(call) = self.dispatch(from, to, data) {
            if let Err(reversal) = self.ledger.transfer(to, from, value) {
                log::error!(
                    "Failed to reverse transfer of {} from {}: {}",
                    value,
                    to,
                    reversal
                );
                return Err(ExecutionError::ReversalFailed {
                    call: Box::new(call),
                    reversal,
                });
            }
            return Err(call);
        }

        Ok(())
    }

    fn dispatch(&self, caller: &Address, target: &Address, data: &[u8]) -> Result<(), ExecutionError> {
        let call = Call::decode(data)?;
        log::debug!("{} calls {} on {}", caller, call.method(), target);

        if *target == self.address {
            return match call {
                Call::CreateWallet {
                    required_approvals,
                    signatories,
                } => {
                    self.create_wallet(caller, required_approvals, signatories)?;
                    Ok(())
                }
                other => Err(ExecutionError::UnsupportedCall {
                    target: target.clone(),
                    method: other.method(),
                }),
            };
        }

        let wallet = self
            .wallet(target)
            .ok_or_else(|| ExecutionError::NoCallTarget(target.clone()))?;

        match call {
            Call::InitiateTransaction {
                to,
                value,
                data,
                metadata,
            } => {
                wallet.initiate_transaction(caller, to, value, data, metadata)?;
            }
            Call::VoteForTransaction {
                transaction_id,
                approve,
            } => wallet.vote_for_transaction(caller, transaction_id, approve)?,
            Call::ResetVote { transaction_id } => wallet.reset_vote(caller, transaction_id)?,
            Call::FinalizeTransaction { transaction_id } => {
                wallet.finalize_transaction(caller, transaction_id)?
            }
            other @ Call::CreateWallet { .. } => {
                return Err(ExecutionError::UnsupportedCall {
                    target: target.clone(),
                    method: other.method(),
                })
            }
        }

        Ok(())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Capture the registry, every wallet and the ledger
    ///
    /// Waits for in-flight finalizes, so a snapshot never holds a transfer
    /// without its executed transaction or the other way round.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let _execution = self.execution.acquire();

        let engines: Vec<Arc<WalletEngine>> = {
            let wallets = self.wallets();
            wallets
                .order
                .iter()
                .filter_map(|address| wallets.by_address.get(address).cloned())
                .collect()
        };
        let wallets = engines
            .iter()
            .map(|engine| WalletRecord {
                address: engine.address().clone(),
                state: engine.snapshot(),
            })
            .collect();

        RegistrySnapshot {
            address: self.address.clone(),
            wallets,
            created: self.created().clone(),
            ledger: self.ledger.snapshot(),
        }
    }

    /// Rebuild a registry from a snapshot
    pub fn restore(snapshot: RegistrySnapshot, events: Arc<EventBus>) -> Arc<Self> {
        let ledger = Arc::new(Ledger::from(snapshot.ledger));
        let registry = Self::with_address(snapshot.address, ledger, events);

        {
            let mut wallets = registry.wallets_mut();
            for record in snapshot.wallets {
                let engine = WalletEngine::new(
                    record.address.clone(),
                    record.state,
                    Arc::downgrade(&registry),
                    registry.events.clone(),
                );
                wallets.order.push(record.address.clone());
                wallets.by_address.insert(record.address, Arc::new(engine));
            }
        }
        *registry.created_mut() = snapshot.created;

        log::info!(
            "Restored registry {} with {} wallets",
            registry.address,
            registry.wallet_count()
        );
        registry
    }
}

/// One persisted wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub address: Address,
    pub state: WalletState,
}

/// Serializable registry contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub address: Address,
    pub wallets: Vec<WalletRecord>,
    pub created: HashMap<Address, Vec<Address>>,
    pub ledger: LedgerSnapshot,
}
