use actions::{ActionRequest, PollSettings};
use alloy_primitives::Address;
use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use lib::actions::ActionType;
use lib::api::{CastEmbed, ProfileUpdate};
use lib::provisioning::SigningMode;
use lib::signer_cache::{SignerCache, SIGNER_CACHE_FILE};
use lib::utils::parse_address;
use std::path::PathBuf;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod actions;
mod chain;
mod companion;
mod config;
mod fname;
mod neynar;
mod rpc_config_utils;
mod server;
mod shell;
mod wallet;

#[derive(Parser)]
#[command(
    name = "delegator",
    about = "Manage a Farcaster identity held by a hats-gated delegator contract",
    version
)]
struct Cli {
    /// Directory holding .delegator_config.json and the signer cache
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the companion HTTP server
    Serve {
        #[arg(long, default_value_t = config::DEFAULT_HTTP_PORT)]
        port: u16,
    },
    /// Show the delegator, the connected wallet's role and available actions
    Status {
        #[arg(long)]
        contract: Option<String>,
    },
    /// Run one action against the delegator
    Run {
        /// Action name, e.g. addKey or changeUsername
        #[arg(value_parser = parse_action)]
        action: ActionType,

        #[arg(long)]
        contract: Option<String>,

        #[command(flatten)]
        args: RunArgs,
    },
    /// List cached signers for the managed FID
    Signers {
        #[arg(long)]
        contract: Option<String>,
    },
    /// List keys registered to the managed FID
    Keys {
        #[arg(long)]
        contract: Option<String>,
    },
    /// Show the owner and caster hats
    Hats {
        #[arg(long)]
        contract: Option<String>,
    },
    /// Manage RPC endpoints
    #[command(subcommand)]
    Rpc(RpcCommands),
}

#[derive(Subcommand)]
enum RpcCommands {
    /// Put a websocket RPC endpoint first in the fallback order
    Add { url: String },
    List,
}

#[derive(Args, Default)]
struct RunArgs {
    #[arg(long)]
    recovery: Option<String>,
    #[arg(long, default_value_t = 0)]
    extra_storage: u64,
    /// Attach an existing key instead of provisioning one
    #[arg(long)]
    key: Option<String>,
    #[arg(long)]
    metadata: Option<String>,
    /// Sign the key request with the connected wallet instead of the app key
    #[arg(long)]
    wallet_signs: bool,
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    deadline: Option<u64>,
    #[arg(long)]
    sig: Option<String>,
    #[arg(long)]
    fid: Option<String>,
    #[arg(long)]
    recipient: Option<String>,
    #[arg(long)]
    signer_uuid: Option<String>,
    #[arg(long)]
    text: Option<String>,
    #[arg(long = "embed")]
    embeds: Vec<String>,
    #[arg(long)]
    parent: Option<String>,
    #[arg(long)]
    channel: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    #[arg(long)]
    pfp_url: Option<String>,
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    username: Option<String>,
}

fn parse_action(s: &str) -> Result<ActionType, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown action: {s}"))
}

fn required(value: Option<String>, flag: &str) -> anyhow::Result<String> {
    value.ok_or_else(|| anyhow!("--{flag} is required"))
}

impl RunArgs {
    fn into_request(self, action: ActionType) -> anyhow::Result<ActionRequest> {
        Ok(match action {
            ActionType::Register => ActionRequest::Register {
                recovery: required(self.recovery, "recovery")?,
                extra_storage: self.extra_storage,
            },
            ActionType::AddKey => match self.key {
                Some(key) => ActionRequest::AddKey {
                    key,
                    metadata: required(self.metadata, "metadata")?,
                },
                None => ActionRequest::CreateSigner {
                    mode: if self.wallet_signs {
                        SigningMode::ConnectedWallet
                    } else {
                        SigningMode::AppSigner
                    },
                },
            },
            ActionType::RemoveKey => ActionRequest::RemoveKey {
                key: required(self.key, "key")?,
            },
            ActionType::ChangeRecovery => ActionRequest::ChangeRecovery {
                recovery: required(self.recovery, "recovery")?,
            },
            ActionType::TransferFid => ActionRequest::TransferFid {
                to: required(self.to, "to")?,
                deadline: self.deadline,
                sig: self.sig,
            },
            ActionType::TransferToWallet => ActionRequest::TransferToWallet,
            ActionType::PrepareReceive => ActionRequest::PrepareReceive {
                fid: required(self.fid, "fid")?,
            },
            ActionType::TransferToContract => ActionRequest::TransferToContract,
            ActionType::MintCasterHat => ActionRequest::MintCasterHat {
                recipient: required(self.recipient, "recipient")?,
            },
            ActionType::ViewHatWearers => ActionRequest::ViewHatWearers,
            ActionType::Cast => ActionRequest::Cast {
                signer_uuid: self.signer_uuid,
                text: required(self.text, "text")?,
                embeds: self.embeds.into_iter().map(|url| CastEmbed { url }).collect(),
                parent: self.parent,
                channel_id: self.channel,
            },
            ActionType::UpdateProfile => ActionRequest::UpdateProfile {
                signer_uuid: self.signer_uuid,
                update: ProfileUpdate {
                    bio: self.bio,
                    pfp_url: self.pfp_url,
                    username: None,
                    display_name: self.display_name,
                    url: self.url,
                },
            },
            ActionType::ChangeUsername => ActionRequest::ChangeUsername {
                name: required(self.username, "username")?,
                signer_uuid: self.signer_uuid,
            },
        })
    }
}

fn resolve_contract(flag: Option<String>, config: &config::DelegatorConfig) -> anyhow::Result<Address> {
    let raw = flag
        .or_else(|| config.default_contract.clone())
        .context("pass --contract or set default_contract in config.json")?;
    Ok(parse_address(&raw)?)
}

/// Read-only sessions never create or write the signer cache.
async fn open_session(
    contract: Option<String>,
    config: &config::DelegatorConfig,
    writable: bool,
) -> anyhow::Result<shell::Session> {
    let delegator = resolve_contract(contract, config)?;
    let rpc_urls = if config.rpc_urls.is_empty() {
        chain::DEFAULT_RPC_URLS.iter().map(|s| s.to_string()).collect()
    } else {
        config.rpc_urls.clone()
    };
    let chain = chain::ChainReader::connect(&rpc_urls).await?;
    let wallet = wallet::LocalWallet::from_env(rpc_urls.first())?;
    if wallet.is_none() {
        info!("no WALLET_PRIVATE_KEY set; running read-only");
    }
    let path = config::get_home_directory().join(SIGNER_CACHE_FILE);
    let cache = if writable {
        SignerCache::open(&path)?
    } else if path.exists() {
        SignerCache::open_read_only(&path)?
    } else {
        SignerCache::in_memory()?
    };
    Ok(shell::Session {
        delegator,
        chain,
        wallet,
        companion: companion::CompanionClient::new(&config.companion_url),
        names: fname::FnameClient::default(),
        cache,
        poll: PollSettings {
            interval: config.poll_interval(),
            max_wait: config.approval_timeout(),
        },
    })
}

async fn run_action(session: &shell::Session, request: ActionRequest) -> anyhow::Result<()> {
    let snapshot = session.refresh().await?;
    let state = session.invoke(&snapshot, request).await?;
    println!("{}", shell::render_outcome(&state));
    if let lib::executor::ExecutorState::Success(outcome) = &state {
        if outcome.refreshes_chain() {
            let snapshot = session.refresh().await?;
            print!("{}", shell::render_status(&snapshot));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Some(home) = cli.home {
        config::initialize_home_directory(home);
    }
    let mut config = config::load_config().await;

    match cli.command {
        Commands::Serve { port } => {
            let (kill_tx, kill_rx) = oneshot::channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = kill_tx.send(true);
                }
            });
            server::serve(config::ServerEnv::from_env(), port, kill_rx).await;
        }
        Commands::Status { contract } => {
            let session = open_session(contract, &config, false).await?;
            let snapshot = session.refresh().await?;
            print!("{}", shell::render_status(&snapshot));
            match snapshot.gate() {
                Some(gate) => print!("\n{}", shell::render_actions(&gate)),
                None => println!("\npermissions still loading; actions unavailable"),
            }
        }
        Commands::Run {
            action,
            contract,
            args,
        } => {
            let request = args.into_request(action)?;
            let session = open_session(contract, &config, true).await?;
            run_action(&session, request).await?;
        }
        Commands::Hats { contract } => {
            let session = open_session(contract, &config, false).await?;
            run_action(&session, ActionRequest::ViewHatWearers).await?;
        }
        Commands::Signers { contract } => {
            let session = open_session(contract, &config, false).await?;
            let snapshot = session.refresh().await?;
            let fid = snapshot.info.fid.context("delegator has no FID")?;
            let signers = session.cache.load(fid)?;
            if signers.is_empty() {
                println!("no cached signers for FID {fid}");
            }
            for signer in signers {
                println!("{} {} {}", signer.signer_uuid, signer.public_key, signer.created_at);
            }
        }
        Commands::Keys { contract } => {
            let session = open_session(contract, &config, false).await?;
            let snapshot = session.refresh().await?;
            let fid = snapshot.info.fid.context("delegator has no FID")?;
            for key in session.chain.keys(fid).await? {
                println!("{key}");
            }
        }
        Commands::Rpc(RpcCommands::Add { url }) => {
            if !rpc_config_utils::is_websocket_url(&url) {
                return Err(anyhow!("{url} is not a websocket URL"));
            }
            rpc_config_utils::add_rpc_url_to_config(&mut config, &url);
            config::save_config(&config).await?;
            info!("added {url}");
        }
        Commands::Rpc(RpcCommands::List) => {
            if config.rpc_urls.is_empty() {
                warn!("no RPC endpoints configured; using defaults");
                for url in chain::DEFAULT_RPC_URLS {
                    println!("{url}");
                }
            }
            for url in &config.rpc_urls {
                println!("{url}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs::default()
    }

    #[test]
    fn test_parse_action_names() {
        assert_eq!(parse_action("changeUsername"), Ok(ActionType::ChangeUsername));
        assert_eq!(parse_action("addKey"), Ok(ActionType::AddKey));
        assert!(parse_action("add-key").is_err());
    }

    #[test]
    fn test_add_key_without_key_provisions() {
        let request = args().into_request(ActionType::AddKey).unwrap();
        assert!(matches!(
            request,
            ActionRequest::CreateSigner {
                mode: SigningMode::AppSigner
            }
        ));

        let mut manual = args();
        manual.key = Some("0x01".to_string());
        assert!(manual.into_request(ActionType::AddKey).is_err());
    }

    #[test]
    fn test_missing_flags_are_named() {
        let err = args().into_request(ActionType::Register).unwrap_err();
        assert_eq!(err.to_string(), "--recovery is required");

        let mut cast = args();
        cast.text = Some("gm".to_string());
        cast.embeds = vec!["https://hats.xyz".to_string()];
        match cast.into_request(ActionType::Cast).unwrap() {
            ActionRequest::Cast { embeds, .. } => assert_eq!(embeds[0].url, "https://hats.xyz"),
            _ => panic!("expected cast"),
        }
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "delegator",
            "run",
            "cast",
            "--contract",
            "0x000000000000000000000000000000000000dEaD",
            "--text",
            "gm",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run {
                action: ActionType::Cast,
                ..
            }
        ));
    }
}
