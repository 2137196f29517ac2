//! REST API handlers for wallet registry operations

use crate::core::Address;
use crate::multisig::{
    Ballot, Call, EventBus, Transaction, WalletEngine, WalletError, WalletInfo, WalletRegistry,
};
use crate::storage::Storage;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header carrying the authenticated caller identity
pub const CALLER_HEADER: &str = "x-caller";

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<WalletRegistry>,
    pub storage: Arc<Storage>,
    pub events: Arc<EventBus>,
}

impl ApiState {
    pub fn new(registry: Arc<WalletRegistry>, storage: Arc<Storage>) -> Self {
        let events = registry.events().clone();
        Self {
            registry,
            storage,
            events,
        }
    }

    /// Write the current snapshot
    ///
    /// A failure is reported as 500: the change is applied in memory but
    /// not yet durable.
    pub fn persist(&self) -> Result<(), ApiFailure> {
        self.storage.save_registry(&self.registry).map_err(|e| {
            log::error!("Failed to persist registry: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: format!("Change applied but not persisted: {}", e),
                    code: "PersistenceFailed".to_string(),
                }),
            )
        })
    }

    fn wallet(&self, address: &str) -> Result<Arc<WalletEngine>, ApiFailure> {
        self.registry
            .wallet_or_err(&Address::from(address))
            .map_err(wallet_error)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);
pub type ApiResult<T> = Result<Json<T>, ApiFailure>;

/// HTTP status for a wallet error
pub fn status_for(error: &WalletError) -> StatusCode {
    match error {
        e if e.is_construction_error() => StatusCode::BAD_REQUEST,
        WalletError::NotASignatoryForThisWallet(_) => StatusCode::FORBIDDEN,
        WalletError::TransactionDoesNotExist(_) | WalletError::WalletNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        WalletError::TransactionExecutionToAddressFailed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::CONFLICT,
    }
}

fn wallet_error(error: WalletError) -> ApiFailure {
    (
        status_for(&error),
        Json(ApiError {
            error: error.to_string(),
            code: error.code().to_string(),
        }),
    )
}

fn bad_request(code: &str, error: impl ToString) -> ApiFailure {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            error: error.to_string(),
            code: code.to_string(),
        }),
    )
}

// ============================================================================
// Caller extraction
// ============================================================================

/// Identity of the party making the request
#[derive(Debug, Clone)]
pub struct Caller(pub Address);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or_else(|| bad_request("MissingCaller", "Missing x-caller header"))?;
        let caller = value
            .to_str()
            .map_err(|_| bad_request("MissingCaller", "x-caller header is not valid text"))?
            .trim();

        if caller.is_empty() {
            return Err(bad_request("MissingCaller", "x-caller header is empty"));
        }
        Ok(Caller(Address::from(caller)))
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWalletRequest {
    pub required_approvals: u64,
    pub signatories: Vec<Address>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWalletResponse {
    pub address: Address,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListWalletsQuery {
    pub owner: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    #[serde(flatten)]
    pub info: WalletInfo,
    pub balance: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitiateTransactionRequest {
    pub to: Address,
    #[serde(default)]
    pub value: u128,
    /// Call to perform on `to` when finalized
    #[serde(default)]
    pub call: Option<Call>,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitiateTransactionResponse {
    pub transaction_id: u64,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub effectively_rejected: bool,
}

impl TransactionResponse {
    fn new(transaction: Transaction, rejection_threshold: u64) -> Self {
        Self {
            effectively_rejected: transaction.is_effectively_rejected(rejection_threshold),
            transaction,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub approve: bool,
}

#[derive(Debug, Serialize)]
pub struct BallotResponse {
    pub transaction_id: u64,
    pub signatory: Address,
    pub ballot: Ballot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: Address,
    pub balance: u128,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Wallet Handlers
// ============================================================================

/// GET /health - Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// POST /api/wallets - Create a wallet owned by the caller
pub async fn create_wallet(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Json(req): Json<CreateWalletRequest>,
) -> ApiResult<CreateWalletResponse> {
    let address = state
        .registry
        .create_wallet(&caller, req.required_approvals, req.signatories)
        .map_err(wallet_error)?;
    state.persist()?;

    Ok(Json(CreateWalletResponse { address }))
}

/// GET /api/wallets - List wallets, optionally filtered by creator
pub async fn list_wallets(
    State(state): State<ApiState>,
    Query(query): Query<ListWalletsQuery>,
) -> Json<Vec<WalletResponse>> {
    let addresses = match query.owner {
        Some(owner) => state.registry.get_wallets(&Address::from(owner)),
        None => state.registry.list_wallets(),
    };

    let wallets = addresses
        .iter()
        .filter_map(|address| state.registry.wallet(address))
        .map(|wallet| WalletResponse {
            balance: state.registry.ledger().balance_of(wallet.address()),
            info: wallet.get_wallet(),
        })
        .collect();

    Json(wallets)
}

/// GET /api/wallets/{address} - Wallet configuration and balance
pub async fn get_wallet(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<WalletResponse> {
    let wallet = state.wallet(&address)?;
    Ok(Json(WalletResponse {
        balance: state.registry.ledger().balance_of(wallet.address()),
        info: wallet.get_wallet(),
    }))
}

// ============================================================================
// Transaction Handlers
// ============================================================================

/// GET /api/wallets/{address}/transactions - All transactions in id order
pub async fn list_transactions(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<Vec<TransactionResponse>> {
    let wallet = state.wallet(&address)?;
    let threshold = wallet.get_wallet().rejection_threshold;

    Ok(Json(
        wallet
            .transactions()
            .into_iter()
            .map(|tx| TransactionResponse::new(tx, threshold))
            .collect(),
    ))
}

/// POST /api/wallets/{address}/transactions - Propose a transaction
pub async fn initiate_transaction(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(address): Path<String>,
    Json(req): Json<InitiateTransactionRequest>,
) -> ApiResult<InitiateTransactionResponse> {
    let wallet = state.wallet(&address)?;
    let data = match &req.call {
        Some(call) => call.encode().map_err(|e| bad_request("InvalidCall", e))?,
        None => Vec::new(),
    };
    let metadata = req.metadata.map(String::into_bytes).unwrap_or_default();

    let transaction_id = wallet
        .initiate_transaction(&caller, req.to, req.value, data, metadata)
        .map_err(wallet_error)?;
    state.persist()?;

    Ok(Json(InitiateTransactionResponse { transaction_id }))
}

/// GET /api/wallets/{address}/transactions/{id} - Get a transaction
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path((address, id)): Path<(String, u64)>,
) -> ApiResult<TransactionResponse> {
    let wallet = state.wallet(&address)?;
    let transaction = wallet.get_transaction(id).map_err(wallet_error)?;
    Ok(Json(TransactionResponse::new(
        transaction,
        wallet.get_wallet().rejection_threshold,
    )))
}

/// POST /api/wallets/{address}/transactions/{id}/vote - Approve or reject
pub async fn vote_for_transaction(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path((address, id)): Path<(String, u64)>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<ActionResponse> {
    let wallet = state.wallet(&address)?;
    wallet
        .vote_for_transaction(&caller, id, req.approve)
        .map_err(wallet_error)?;
    state.persist()?;

    Ok(Json(ActionResponse {
        success: true,
        message: format!(
            "{} transaction {}",
            if req.approve { "Approved" } else { "Rejected" },
            id
        ),
    }))
}

/// POST /api/wallets/{address}/transactions/{id}/reset - Withdraw a vote
pub async fn reset_vote(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path((address, id)): Path<(String, u64)>,
) -> ApiResult<ActionResponse> {
    let wallet = state.wallet(&address)?;
    wallet.reset_vote(&caller, id).map_err(wallet_error)?;
    state.persist()?;

    Ok(Json(ActionResponse {
        success: true,
        message: format!("Vote on transaction {} withdrawn", id),
    }))
}

/// POST /api/wallets/{address}/transactions/{id}/finalize - Execute
pub async fn finalize_transaction(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path((address, id)): Path<(String, u64)>,
) -> ApiResult<TransactionResponse> {
    let wallet = state.wallet(&address)?;
    wallet
        .finalize_transaction(&caller, id)
        .map_err(wallet_error)?;
    state.persist()?;

    let transaction = wallet.get_transaction(id).map_err(wallet_error)?;
    Ok(Json(TransactionResponse::new(
        transaction,
        wallet.get_wallet().rejection_threshold,
    )))
}

/// GET /api/wallets/{address}/transactions/{id}/votes/{signatory}
///
/// 404 for an unknown transaction, `Unvoted` for an identity without a
/// ballot.
pub async fn get_signatory_vote(
    State(state): State<ApiState>,
    Path((address, id, signatory)): Path<(String, u64, String)>,
) -> ApiResult<BallotResponse> {
    let wallet = state.wallet(&address)?;
    wallet.get_transaction(id).map_err(wallet_error)?;
    let signatory = Address::from(signatory);

    Ok(Json(BallotResponse {
        transaction_id: id,
        ballot: wallet.signatory_votes(id, &signatory),
        signatory,
    }))
}

// ============================================================================
// Ledger Handlers
// ============================================================================

/// POST /api/ledger/{address}/deposit - Credit an account
pub async fn deposit(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<BalanceResponse> {
    let address = Address::from(address);
    let balance = state
        .registry
        .ledger()
        .deposit(&address, req.amount)
        .map_err(|e| bad_request("LedgerError", e))?;
    state.persist()?;

    Ok(Json(BalanceResponse { address, balance }))
}

/// GET /api/ledger/{address} - Account balance
pub async fn get_balance(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Json<BalanceResponse> {
    let address = Address::from(address);
    let balance = state.registry.ledger().balance_of(&address);
    Json(BalanceResponse { address, balance })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Ledger;
    use crate::multisig::RegistryConfig;
    use crate::storage::StorageConfig;
    use axum::http::Request;

    fn test_state() -> (tempfile::TempDir, ApiState) {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        let registry = WalletRegistry::new(
            RegistryConfig::default(),
            Arc::new(Ledger::new()),
            Arc::new(EventBus::new()),
        );
        (temp_dir, ApiState::new(registry, Arc::new(storage)))
    }

    fn caller(name: &str) -> Caller {
        Caller(Address::from(name))
    }

    #[test]
    fn test_status_mapping() {
        let a = Address::from("a");
        assert_eq!(
            status_for(&WalletError::RequiredApprovalsCantBeZero),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&WalletError::DuplicateSignatoryAddress(a.clone())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&WalletError::NotASignatoryForThisWallet(a.clone())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&WalletError::TransactionDoesNotExist(3)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&WalletError::WalletNotFound(a.clone())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&WalletError::TransactionAlreadyExecuted(0)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&WalletError::ReentrantCall(a)),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_caller_extraction() {
        let (mut parts, _) = Request::builder()
            .header(CALLER_HEADER, " alice ")
            .body(())
            .unwrap()
            .into_parts();
        let Caller(who) = Caller::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(who, Address::from("alice"));

        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let (status, Json(err)) = Caller::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "MissingCaller");
    }

    #[tokio::test]
    async fn test_wallet_lifecycle_over_handlers() {
        let (_dir, state) = test_state();

        let Json(created) = create_wallet(
            State(state.clone()),
            caller("alice"),
            Json(CreateWalletRequest {
                required_approvals: 2,
                signatories: vec!["alice".into(), "bob".into(), "carol".into()],
            }),
        )
        .await
        .unwrap();
        let wallet = created.address.to_string();

        deposit(
            State(state.clone()),
            Path(wallet.clone()),
            Json(DepositRequest { amount: 50 }),
        )
        .await
        .unwrap();

        let Json(proposed) = initiate_transaction(
            State(state.clone()),
            caller("bob"),
            Path(wallet.clone()),
            Json(InitiateTransactionRequest {
                to: "dave".into(),
                value: 20,
                call: None,
                metadata: Some("invoice".to_string()),
            }),
        )
        .await
        .unwrap();
        let id = proposed.transaction_id;

        // Quorum not met yet
        let (status, Json(err)) =
            finalize_transaction(State(state.clone()), caller("bob"), Path((wallet.clone(), id)))
                .await
                .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err.code, "MinimumApprovalsForTransactionNotMet");

        for who in ["alice", "carol"] {
            vote_for_transaction(
                State(state.clone()),
                caller(who),
                Path((wallet.clone(), id)),
                Json(VoteRequest { approve: true }),
            )
            .await
            .unwrap();
        }

        let Json(ballot) = get_signatory_vote(
            State(state.clone()),
            Path((wallet.clone(), id, "carol".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(ballot.ballot, Ballot::Approved);

        let Json(done) =
            finalize_transaction(State(state.clone()), caller("bob"), Path((wallet.clone(), id)))
                .await
                .unwrap();
        assert!(done.transaction.executed);

        let Json(balance) = get_balance(State(state.clone()), Path("dave".to_string())).await;
        assert_eq!(balance.balance, 20);

        // Every mutation was persisted
        let saved = state.storage.load().unwrap();
        assert_eq!(saved, state.registry.snapshot());
    }

    #[tokio::test]
    async fn test_outsider_is_forbidden() {
        let (_dir, state) = test_state();
        let address = state
            .registry
            .create_wallet(&"alice".into(), 1, vec!["alice".into()])
            .unwrap();

        let (status, Json(err)) = initiate_transaction(
            State(state.clone()),
            caller("mallory"),
            Path(address.to_string()),
            Json(InitiateTransactionRequest {
                to: "mallory".into(),
                value: 1,
                call: None,
                metadata: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "NotASignatoryForThisWallet");
        assert!(state.registry.wallet(&address).unwrap().transactions().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_wallet_is_not_found() {
        let (_dir, state) = test_state();
        let (status, _) = get_wallet(State(state), Path("0xnowhere".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_wallets_by_owner() {
        let (_dir, state) = test_state();
        state
            .registry
            .create_wallet(&"alice".into(), 1, vec!["alice".into()])
            .unwrap();
        state
            .registry
            .create_wallet(&"bob".into(), 1, vec!["bob".into()])
            .unwrap();

        let Json(all) = list_wallets(State(state.clone()), Query(ListWalletsQuery::default())).await;
        assert_eq!(all.len(), 2);

        let Json(mine) = list_wallets(
            State(state),
            Query(ListWalletsQuery {
                owner: Some("bob".to_string()),
            }),
        )
        .await;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].info.signatories, vec![Address::from("bob")]);
    }

    #[tokio::test]
    async fn test_ballot_of_unknown_transaction_is_not_found() {
        let (_dir, state) = test_state();
        let address = state
            .registry
            .create_wallet(&"alice".into(), 1, vec!["alice".into()])
            .unwrap();

        let (status, Json(err)) = get_signatory_vote(
            State(state.clone()),
            Path((address.to_string(), 9, "alice".to_string())),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "TransactionDoesNotExist");

        // A non-signatory on an existing transaction simply has no ballot
        let id = state
            .registry
            .wallet(&address)
            .unwrap()
            .initiate_transaction(&"alice".into(), "bob".into(), 0, vec![], vec![])
            .unwrap();
        let Json(ballot) = get_signatory_vote(
            State(state),
            Path((address.to_string(), id, "mallory".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(ballot.ballot, Ballot::Unvoted);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_reported() {
        let (dir, state) = test_state();
        // Remove the data directory out from under the storage
        drop(dir);

        let (status, Json(err)) = create_wallet(
            State(state.clone()),
            caller("alice"),
            Json(CreateWalletRequest {
                required_approvals: 1,
                signatories: vec!["alice".into()],
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "PersistenceFailed");
    }
}
