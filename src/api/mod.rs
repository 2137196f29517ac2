//! REST API module
//!
//! HTTP access to the wallet registry. The caller identity comes from the
//! `x-caller` header, set by whatever authenticates requests in front of
//! this server.
//!
//! # Endpoints
//!
//! ## Wallets
//! - `GET /api/wallets?owner=` - List wallets
//! - `POST /api/wallets` - Create wallet
//! - `GET /api/wallets/{address}` - Wallet info and balance
//!
//! ## Transactions
//! - `GET /api/wallets/{address}/transactions` - List transactions
//! - `POST /api/wallets/{address}/transactions` - Propose
//! - `GET /api/wallets/{address}/transactions/{id}` - Get transaction
//! - `POST /api/wallets/{address}/transactions/{id}/vote` - Approve/reject
//! - `POST /api/wallets/{address}/transactions/{id}/reset` - Withdraw vote
//! - `POST /api/wallets/{address}/transactions/{id}/finalize` - Execute
//! - `GET /api/wallets/{address}/transactions/{id}/votes/{signatory}` - Ballot
//!
//! ## Ledger
//! - `GET /api/ledger/{address}` - Balance
//! - `POST /api/ledger/{address}/deposit` - Credit an account
//!
//! ## WebSocket
//! - `GET /ws` - Wallet events (WalletCreated, TransactionInitiated, VoteCast,
//!   VoteReset, TransactionExecuted)

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::{ApiState, Caller, CALLER_HEADER};
pub use routes::{create_router, ENDPOINTS};
