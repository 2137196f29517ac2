//! sigsafe CLI application
//!
//! A command-line interface for the multi-signature wallet registry.

use clap::{Parser, Subcommand};
use sigsafe::api::{create_router, ApiState, ENDPOINTS};
use sigsafe::cli::{self, AppState};
use sigsafe::storage::{Storage, StorageConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sigsafe")]
#[command(version = "0.1.0")]
#[command(about = "Multi-signature wallet registry", long_about = None)]
struct Cli {
    /// Data directory for registry storage
    #[arg(short, long, default_value = ".sigsafe_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new registry
    Init {
        /// Overwrite an existing registry
        #[arg(long)]
        force: bool,
    },

    /// Credit an account on the ledger
    Fund {
        #[arg(short, long)]
        address: String,

        #[arg(long)]
        amount: u128,
    },

    /// Show an account balance
    Balance {
        #[arg(short, long)]
        address: String,
    },

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Transaction operations
    Tx {
        #[command(subcommand)]
        action: TxCommands,
    },

    /// Export the registry to a file
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the registry with an exported file
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Rotated backups of the saved registry
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },

    /// REST API server
    Api {
        #[command(subcommand)]
        action: ApiCommands,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new multisig wallet
    Create {
        /// Identity creating the wallet
        #[arg(short, long)]
        caller: String,

        /// Approvals needed to execute a transaction
        #[arg(short, long)]
        required: u64,

        /// Signatories (comma-separated)
        #[arg(short, long)]
        signatories: String,
    },

    /// List wallets
    List {
        /// Only wallets created by this identity
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// Show wallet configuration
    Show {
        #[arg(short, long)]
        address: String,
    },
}

#[derive(Subcommand)]
enum TxCommands {
    /// Propose a transaction
    Propose {
        #[arg(short, long)]
        wallet: String,

        #[arg(short, long)]
        caller: String,

        /// Destination address
        #[arg(short, long)]
        to: String,

        #[arg(short, long, default_value = "0")]
        value: u128,

        /// Call to perform on the destination, as JSON
        #[arg(long)]
        data: Option<String>,

        /// Free-form annotation
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Approve (or reject) a transaction
    Vote {
        #[arg(short, long)]
        wallet: String,

        #[arg(short, long)]
        caller: String,

        #[arg(short, long)]
        id: u64,

        /// Vote against instead of for
        #[arg(long)]
        reject: bool,
    },

    /// Withdraw a vote
    Reset {
        #[arg(short, long)]
        wallet: String,

        #[arg(short, long)]
        caller: String,

        #[arg(short, long)]
        id: u64,
    },

    /// Execute a transaction that reached quorum
    Finalize {
        #[arg(short, long)]
        wallet: String,

        #[arg(short, long)]
        caller: String,

        #[arg(short, long)]
        id: u64,
    },

    /// Show a transaction
    Show {
        #[arg(short, long)]
        wallet: String,

        #[arg(short, long)]
        id: u64,
    },

    /// List all transactions of a wallet
    List {
        #[arg(short, long)]
        wallet: String,
    },

    /// Show every signatory's ballot on a transaction
    Votes {
        #[arg(short, long)]
        wallet: String,

        #[arg(short, long)]
        id: u64,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// List available backups
    List,

    /// Restore a backup (0 is the newest)
    Restore {
        #[arg(short, long)]
        index: usize,
    },
}

#[derive(Subcommand)]
enum ApiCommands {
    /// Start the REST API server
    Start {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Handle init command separately (doesn't need full state)
    if let Commands::Init { force } = &cli.command {
        return cli::cmd_init(&cli.data_dir, *force);
    }

    // Handle API commands with tokio runtime
    if let Commands::Api { ref action } = cli.command {
        return run_api_command(action, &cli.data_dir);
    }

    let mut state = AppState::new(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),
        Commands::Api { .. } => unreachable!(),

        Commands::Fund { address, amount } => {
            cli::cmd_fund(&mut state, &address, amount)?;
        }

        Commands::Balance { address } => {
            cli::cmd_balance(&state, &address)?;
        }

        Commands::Wallet { action } => match action {
            WalletCommands::Create {
                caller,
                required,
                signatories,
            } => {
                cli::cmd_wallet_create(&mut state, &caller, required, &signatories)?;
            }
            WalletCommands::List { owner } => {
                cli::cmd_wallet_list(&state, owner.as_deref())?;
            }
            WalletCommands::Show { address } => {
                cli::cmd_wallet_show(&state, &address)?;
            }
        },

        Commands::Export { output } => {
            cli::cmd_export(&state, &output)?;
        }

        Commands::Import { input } => {
            cli::cmd_import(&mut state, &input)?;
        }

        Commands::Backup { action } => match action {
            BackupCommands::List => {
                cli::cmd_backup_list(&state)?;
            }
            BackupCommands::Restore { index } => {
                cli::cmd_backup_restore(&mut state, index)?;
            }
        },

        Commands::Tx { action } => match action {
            TxCommands::Propose {
                wallet,
                caller,
                to,
                value,
                data,
                metadata,
            } => {
                cli::cmd_tx_propose(
                    &mut state,
                    &wallet,
                    &caller,
                    &to,
                    value,
                    data.as_deref(),
                    metadata.as_deref(),
                )?;
            }
            TxCommands::Vote {
                wallet,
                caller,
                id,
                reject,
            } => {
                cli::cmd_tx_vote(&mut state, &wallet, &caller, id, reject)?;
            }
            TxCommands::Reset { wallet, caller, id } => {
                cli::cmd_tx_reset(&mut state, &wallet, &caller, id)?;
            }
            TxCommands::Finalize { wallet, caller, id } => {
                cli::cmd_tx_finalize(&mut state, &wallet, &caller, id)?;
            }
            TxCommands::Show { wallet, id } => {
                cli::cmd_tx_show(&state, &wallet, id)?;
            }
            TxCommands::List { wallet } => {
                cli::cmd_tx_list(&state, &wallet)?;
            }
            TxCommands::Votes { wallet, id } => {
                cli::cmd_tx_votes(&state, &wallet, id)?;
            }
        },
    }

    Ok(())
}

fn run_api_command(
    action: &ApiCommands,
    data_dir: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match action {
            ApiCommands::Start { port } => {
                let app_state = AppState::new(data_dir.clone())?;
                let storage = Arc::new(Storage::new(StorageConfig {
                    data_dir: data_dir.clone(),
                    ..Default::default()
                })?);

                let state = ApiState::new(app_state.registry, storage);
                let shutdown_state = state.clone();

                let app = create_router(state);

                let addr = format!("0.0.0.0:{}", port);
                println!("🚀 REST API server starting on http://localhost:{}", port);
                println!();
                println!("📖 Available endpoints:");
                for (method, path, description) in ENDPOINTS {
                    println!("   {:<5} {:<55} - {}", method, path, description);
                }
                println!();

                // Handle Ctrl+C with graceful shutdown
                tokio::spawn(async move {
                    tokio::signal::ctrl_c().await.ok();
                    println!("\n📴 Shutting down API server...");
                    println!("💾 Saving data...");
                    match shutdown_state
                        .storage
                        .save_registry(&shutdown_state.registry)
                    {
                        Ok(()) => println!("✅ Data saved successfully!"),
                        Err(e) => eprintln!("❌ Failed to save data: {}", e),
                    }
                    std::process::exit(0);
                });

                let listener = tokio::net::TcpListener::bind(&addr).await?;
                axum::serve(listener, app).await?;
            }
        }

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
