//! CLI commands for the wallet registry
//!
//! Each mutating command loads the saved registry, performs one operation
//! and writes the snapshot back.

use crate::core::{Address, Ledger};
use crate::multisig::{Call, EventBus, RegistryConfig, Transaction, WalletRegistry};
use crate::storage::{Storage, StorageConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub registry: Arc<WalletRegistry>,
    pub storage: Storage,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load the saved registry, or create an empty one
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let storage = open_storage(&data_dir)?;
        let events = Arc::new(EventBus::new());

        let registry = if storage.exists() {
            log::debug!("Loading registry from {:?}", data_dir);
            WalletRegistry::restore(storage.load()?, events)
        } else {
            println!("🆕 Creating new registry...");
            let registry =
                WalletRegistry::new(RegistryConfig::default(), Arc::new(Ledger::new()), events);
            storage.save(&registry.snapshot())?;
            registry
        };

        Ok(Self {
            registry,
            storage,
            data_dir,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save_registry(&self.registry)?;
        Ok(())
    }
}

fn open_storage(data_dir: &PathBuf) -> CliResult<Storage> {
    let storage_config = StorageConfig {
        data_dir: data_dir.clone(),
        ..Default::default()
    };
    Ok(Storage::new(storage_config)?)
}

/// Parse a comma-separated signatory list
pub fn parse_signatories(list: &str) -> Vec<Address> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Address::from)
        .collect()
}

/// Turn the `--data` argument into call bytes
///
/// An absent argument means a plain transfer with empty data.
pub fn parse_call_data(data: Option<&str>) -> CliResult<Vec<u8>> {
    match data {
        None => Ok(Vec::new()),
        Some(json) => {
            let call: Call = serde_json::from_str(json)?;
            Ok(call.encode()?)
        }
    }
}

/// A proposal that moves nothing and calls nothing
fn is_record_only(tx: &Transaction) -> bool {
    tx.to.is_zero() && tx.value == 0 && tx.data.is_empty()
}

fn print_transaction(tx: &Transaction) {
    let status = if tx.executed { "✅ executed" } else { "⏳ pending" };
    println!("   Transaction #{} [{}]", tx.transaction_id, status);
    if is_record_only(tx) {
        println!("   ├─ To: {} (record only)", tx.to);
    } else {
        println!("   ├─ To: {}", tx.to);
    }
    println!("   ├─ Value: {}", tx.value);
    println!("   ├─ Approvals: {}", tx.approval_count);
    println!("   ├─ Rejections: {}", tx.rejection_count);
    if !tx.data.is_empty() {
        println!("   ├─ Data: {} bytes", tx.data.len());
    }
    if let Some(text) = tx.metadata_text() {
        if !text.is_empty() {
            println!("   ├─ Metadata: {}", text);
        }
    }
    println!("   ├─ Initiated: {}", tx.initiated_at.format("%Y-%m-%d %H:%M:%S"));
    match tx.executed_at {
        Some(at) => println!("   └─ Executed: {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("   └─ Executed: -"),
    }
}

// =============================================================================
// Registry and ledger
// =============================================================================

/// Initialize a new registry
pub fn cmd_init(data_dir: &PathBuf, force: bool) -> CliResult<()> {
    let storage = open_storage(data_dir)?;

    if storage.exists() && !force {
        println!("⚠️  Registry already exists at {:?}", data_dir);
        println!("   Use --force to reinitialize (this will delete existing data)");
        return Ok(());
    }

    let registry = WalletRegistry::new(
        RegistryConfig::default(),
        Arc::new(Ledger::new()),
        Arc::new(EventBus::new()),
    );
    storage.save(&registry.snapshot())?;

    println!("✅ Registry initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🏛️  Registry address: {}", registry.address());

    Ok(())
}

/// Credit an account on the ledger
pub fn cmd_fund(state: &mut AppState, address: &str, amount: u128) -> CliResult<()> {
    let address = Address::from(address);
    let balance = state.registry.ledger().deposit(&address, amount)?;
    state.save()?;

    println!("💰 Deposited {} to {}", amount, address);
    println!("   New balance: {}", balance);
    Ok(())
}

/// Show an account balance
pub fn cmd_balance(state: &AppState, address: &str) -> CliResult<()> {
    let address = Address::from(address);
    println!("💰 Balance of {}: {}", address, state.registry.ledger().balance_of(&address));
    Ok(())
}

// =============================================================================
// Wallets
// =============================================================================

/// Create a multisig wallet
pub fn cmd_wallet_create(
    state: &mut AppState,
    caller: &str,
    required: u64,
    signatories: &str,
) -> CliResult<()> {
    let caller = Address::from(caller);
    let signatories = parse_signatories(signatories);
    let count = signatories.len();

    let address = state.registry.create_wallet(&caller, required, signatories)?;
    state.save()?;

    println!("✅ Wallet created!");
    println!("   Address: {}", address);
    println!("   Policy: {}-of-{}", required, count);
    Ok(())
}

/// List wallets, optionally only those created by `owner`
pub fn cmd_wallet_list(state: &AppState, owner: Option<&str>) -> CliResult<()> {
    let wallets = match owner {
        Some(owner) => state.registry.get_wallets(&Address::from(owner)),
        None => state.registry.list_wallets(),
    };

    if wallets.is_empty() {
        println!("📭 No wallets found.");
        return Ok(());
    }

    println!("👛 Wallets ({}):", wallets.len());
    for address in wallets {
        if let Some(wallet) = state.registry.wallet(&address) {
            let info = wallet.get_wallet();
            println!(
                "   {} ({}-of-{}, {} transactions, balance {})",
                address,
                info.required_approvals,
                info.signatories.len(),
                info.transaction_count,
                state.registry.ledger().balance_of(&address)
            );
        }
    }
    Ok(())
}

/// Show wallet configuration
pub fn cmd_wallet_show(state: &AppState, address: &str) -> CliResult<()> {
    let wallet = state.registry.wallet_or_err(&Address::from(address))?;
    let info = wallet.get_wallet();

    println!("👛 Wallet {}", info.address);
    println!("   ├─ Required approvals: {}", info.required_approvals);
    println!("   ├─ Rejection threshold: {}", info.rejection_threshold);
    println!("   ├─ Transactions: {}", info.transaction_count);
    println!(
        "   ├─ Balance: {}",
        state.registry.ledger().balance_of(&info.address)
    );
    println!("   └─ Signatories:");
    for signatory in &info.signatories {
        println!("      • {}", signatory);
    }
    Ok(())
}

// =============================================================================
// Transactions
// =============================================================================

/// Propose a transaction on a wallet
pub fn cmd_tx_propose(
    state: &mut AppState,
    wallet: &str,
    caller: &str,
    to: &str,
    value: u128,
    data: Option<&str>,
    metadata: Option<&str>,
) -> CliResult<()> {
    let wallet = state.registry.wallet_or_err(&Address::from(wallet))?;
    let data = parse_call_data(data)?;
    let metadata = metadata.map(|m| m.as_bytes().to_vec()).unwrap_or_default();

    let id = wallet.initiate_transaction(
        &Address::from(caller),
        Address::from(to),
        value,
        data,
        metadata,
    )?;
    state.save()?;

    println!("📝 Transaction #{} proposed on {}", id, wallet.address());
    Ok(())
}

/// Approve or reject a transaction
pub fn cmd_tx_vote(
    state: &mut AppState,
    wallet: &str,
    caller: &str,
    id: u64,
    reject: bool,
) -> CliResult<()> {
    let wallet = state.registry.wallet_or_err(&Address::from(wallet))?;
    wallet.vote_for_transaction(&Address::from(caller), id, !reject)?;
    state.save()?;

    let tx = wallet.get_transaction(id)?;
    let verb = if reject { "❌ Rejected" } else { "✍️  Approved" };
    println!("{} transaction #{}", verb, id);
    println!(
        "   Approvals: {}/{}  Rejections: {}",
        tx.approval_count,
        wallet.get_wallet().required_approvals,
        tx.rejection_count
    );
    Ok(())
}

/// Withdraw a vote
pub fn cmd_tx_reset(state: &mut AppState, wallet: &str, caller: &str, id: u64) -> CliResult<()> {
    let wallet = state.registry.wallet_or_err(&Address::from(wallet))?;
    wallet.reset_vote(&Address::from(caller), id)?;
    state.save()?;

    println!("↩️  Vote on transaction #{} withdrawn", id);
    Ok(())
}

/// Execute an approved transaction
pub fn cmd_tx_finalize(state: &mut AppState, wallet: &str, caller: &str, id: u64) -> CliResult<()> {
    let wallet = state.registry.wallet_or_err(&Address::from(wallet))?;
    wallet.finalize_transaction(&Address::from(caller), id)?;
    state.save()?;

    let tx = wallet.get_transaction(id)?;
    println!("🚀 Transaction #{} executed!", id);
    println!("   Sent {} to {}", tx.value, tx.to);
    Ok(())
}

/// Show a single transaction
pub fn cmd_tx_show(state: &AppState, wallet: &str, id: u64) -> CliResult<()> {
    let wallet = state.registry.wallet_or_err(&Address::from(wallet))?;
    let tx = wallet.get_transaction(id)?;
    print_transaction(&tx);
    Ok(())
}

/// List transactions of a wallet
pub fn cmd_tx_list(state: &AppState, wallet: &str) -> CliResult<()> {
    let wallet = state.registry.wallet_or_err(&Address::from(wallet))?;
    let transactions = wallet.transactions();

    if transactions.is_empty() {
        println!("📭 No transactions on {}", wallet.address());
        return Ok(());
    }

    println!("📋 Transactions on {} ({}):", wallet.address(), transactions.len());
    for tx in &transactions {
        println!();
        print_transaction(tx);
    }
    Ok(())
}

/// Show each signatory's ballot on a transaction
pub fn cmd_tx_votes(state: &AppState, wallet: &str, id: u64) -> CliResult<()> {
    let wallet = state.registry.wallet_or_err(&Address::from(wallet))?;
    // Surface TransactionDoesNotExist rather than a table of Unvoted
    wallet.get_transaction(id)?;

    println!("🗳️  Votes on transaction #{}:", id);
    for signatory in wallet.get_wallet().signatories {
        println!(
            "   {} → {:?}",
            signatory,
            wallet.signatory_votes(id, &signatory)
        );
    }
    Ok(())
}

// =============================================================================
// Snapshots and backups
// =============================================================================

/// Export the registry to a file
pub fn cmd_export(state: &AppState, path: &PathBuf) -> CliResult<()> {
    crate::storage::save_to_file(&state.registry.snapshot(), path)?;
    println!("📦 Registry exported to {:?}", path);
    Ok(())
}

/// Replace the registry with one exported earlier
pub fn cmd_import(state: &mut AppState, path: &PathBuf) -> CliResult<()> {
    let snapshot = crate::storage::load_from_file(path)?;
    state.registry = WalletRegistry::restore(snapshot, state.registry.events().clone());
    state.save()?;

    println!("📥 Registry imported from {:?}", path);
    println!("   Wallets: {}", state.registry.wallet_count());
    Ok(())
}

/// List rotated backups, newest first
pub fn cmd_backup_list(state: &AppState) -> CliResult<()> {
    let backups = state.storage.list_backups();
    if backups.is_empty() {
        println!("📭 No backups found in {:?}", state.data_dir);
        return Ok(());
    }

    println!("🗄️  Backups ({}):", backups.len());
    for index in backups {
        let snapshot = state.storage.restore_backup(index)?;
        println!("   #{} - {} wallets", index, snapshot.wallets.len());
    }
    Ok(())
}

/// Roll the registry back to a backup
///
/// The current state is rotated into the backups first, so a restore can
/// itself be undone.
pub fn cmd_backup_restore(state: &mut AppState, index: usize) -> CliResult<()> {
    let snapshot = state.storage.restore_backup(index)?;
    state.registry = WalletRegistry::restore(snapshot, state.registry.events().clone());
    state.save()?;

    println!("⏪ Restored backup #{}", index);
    println!("   Wallets: {}", state.registry.wallet_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::Ballot;

    fn temp_state() -> (tempfile::TempDir, AppState) {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, state)
    }

    #[test]
    fn test_parse_signatories() {
        let list = parse_signatories("alice, bob,,carol ");
        assert_eq!(
            list,
            vec![
                Address::from("alice"),
                Address::from("bob"),
                Address::from("carol")
            ]
        );
    }

    #[test]
    fn test_parse_call_data() {
        assert!(parse_call_data(None).unwrap().is_empty());

        let bytes = parse_call_data(Some(r#"{"reset_vote":{"transaction_id":3}}"#)).unwrap();
        assert_eq!(
            Call::decode(&bytes).unwrap(),
            Call::ResetVote { transaction_id: 3 }
        );

        assert!(parse_call_data(Some("not json")).is_err());
    }

    #[test]
    fn test_commands_persist_between_loads() {
        let (temp_dir, mut state) = temp_state();

        cmd_wallet_create(&mut state, "alice", 2, "alice,bob,carol").unwrap();
        let wallet = state.registry.list_wallets()[0].clone();
        cmd_fund(&mut state, wallet.as_str(), 100).unwrap();
        cmd_tx_propose(&mut state, wallet.as_str(), "alice", "dave", 30, None, Some("rent"))
            .unwrap();
        cmd_tx_vote(&mut state, wallet.as_str(), "alice", 0, false).unwrap();

        // Fresh process view of the same data directory
        let mut reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        let engine = reloaded.registry.wallet(&wallet).unwrap();
        assert_eq!(engine.signatory_votes(0, &Address::from("alice")), Ballot::Approved);

        cmd_tx_vote(&mut reloaded, wallet.as_str(), "bob", 0, false).unwrap();
        cmd_tx_finalize(&mut reloaded, wallet.as_str(), "carol", 0).unwrap();

        let again = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(again.registry.ledger().balance_of(&Address::from("dave")), 30);
        assert_eq!(again.registry.ledger().balance_of(&wallet), 70);
        assert!(again.registry.wallet(&wallet).unwrap().get_transaction(0).unwrap().executed);
    }

    #[test]
    fn test_failed_command_is_not_saved() {
        let (temp_dir, mut state) = temp_state();

        cmd_wallet_create(&mut state, "alice", 1, "alice").unwrap();
        let wallet = state.registry.list_wallets()[0].clone();

        assert!(cmd_tx_vote(&mut state, wallet.as_str(), "mallory", 0, false).is_err());
        assert!(cmd_wallet_create(&mut state, "alice", 0, "alice").is_err());

        let reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.registry.wallet_count(), 1);
    }

    #[test]
    fn test_init_does_not_overwrite_without_force() {
        let (temp_dir, mut state) = temp_state();
        cmd_wallet_create(&mut state, "alice", 1, "alice").unwrap();

        let dir = temp_dir.path().to_path_buf();
        cmd_init(&dir, false).unwrap();
        assert_eq!(AppState::new(dir.clone()).unwrap().registry.wallet_count(), 1);

        cmd_init(&dir, true).unwrap();
        assert_eq!(AppState::new(dir).unwrap().registry.wallet_count(), 0);
    }

    #[test]
    fn test_export_then_import_replaces_registry() {
        let (temp_dir, mut state) = temp_state();
        cmd_wallet_create(&mut state, "alice", 1, "alice").unwrap();
        let wallet = state.registry.list_wallets()[0].clone();
        cmd_fund(&mut state, wallet.as_str(), 25).unwrap();

        let export = temp_dir.path().join("export.json");
        cmd_export(&state, &export).unwrap();

        cmd_wallet_create(&mut state, "bob", 1, "bob").unwrap();
        assert_eq!(state.registry.wallet_count(), 2);

        cmd_import(&mut state, &export).unwrap();
        assert_eq!(state.registry.wallet_count(), 1);

        let reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.registry.list_wallets(), vec![wallet.clone()]);
        assert_eq!(reloaded.registry.ledger().balance_of(&wallet), 25);

        assert!(cmd_import(&mut state, &temp_dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_backup_restore_rolls_back_and_can_be_undone() {
        let (temp_dir, mut state) = temp_state();
        cmd_wallet_create(&mut state, "alice", 1, "alice").unwrap();
        cmd_wallet_create(&mut state, "alice", 1, "alice").unwrap();
        assert_eq!(state.registry.wallet_count(), 2);

        // Backup 0 is the state before the last save
        assert!(!state.storage.list_backups().is_empty());
        cmd_backup_list(&state).unwrap();
        cmd_backup_restore(&mut state, 0).unwrap();
        assert_eq!(state.registry.wallet_count(), 1);
        assert_eq!(
            AppState::new(temp_dir.path().to_path_buf())
                .unwrap()
                .registry
                .wallet_count(),
            1
        );

        // The pre-restore state became the newest backup
        cmd_backup_restore(&mut state, 0).unwrap();
        assert_eq!(state.registry.wallet_count(), 2);

        assert!(cmd_backup_restore(&mut state, 99).is_err());
    }

    #[test]
    fn test_record_only_proposal_to_zero_address() {
        let (_temp_dir, mut state) = temp_state();
        cmd_wallet_create(&mut state, "alice", 1, "alice").unwrap();
        let wallet = state.registry.list_wallets()[0].clone();
        let zero = Address::zero();

        cmd_tx_propose(&mut state, wallet.as_str(), "alice", zero.as_str(), 0, None, Some("minutes"))
            .unwrap();
        let tx = state.registry.wallet(&wallet).unwrap().get_transaction(0).unwrap();
        assert!(tx.to.is_zero());
        assert!(is_record_only(&tx));
        cmd_tx_show(&state, wallet.as_str(), 0).unwrap();
    }
}
