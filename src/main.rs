use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tfarm::azure::{format_azure_error, AzureClient};
use tfarm::config::{ApiVersions, Config};
use tfarm::resource::storage_container::StorageContainerHandler;
use tfarm::resource::Registry;
use tfarm::resourceids;
use tfarm::state::{self, ResourceState, StateFile};
use tfarm::storage::AccountCache;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Manage Azure resources through Azure Resource Manager
#[derive(Parser, Debug)]
#[command(name = "tfarm", version, about, long_about = None)]
struct Args {
    /// Azure subscription to use
    #[arg(short, long, global = true)]
    subscription: Option<String>,

    /// State file
    #[arg(long, global = true, default_value = state::DEFAULT_STATE_FILE)]
    state: PathBuf,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resource ID utilities
    Id {
        #[command(subcommand)]
        command: IdCommand,
    },
    /// List registered resource types
    Types,
    /// List every instance of a resource type in the subscription
    List { resource_type: String },
    /// Show the raw ARM representation of a resource
    Show { id: String },
    /// Create or update a resource from a JSON or YAML configuration file
    Apply {
        resource_type: String,
        name: String,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Adopt an existing resource into the state
    Import {
        resource_type: String,
        name: String,
        id: String,
    },
    /// Re-read every resource in the state, dropping the ones that are gone
    Refresh,
    /// Delete a resource and remove it from the state
    Destroy { address: String },
    /// Data-plane properties of a storage container
    ContainerProperties { id: String },
    /// Persisted configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum IdCommand {
    /// Parse a resource ID and print its segments
    Parse { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Persist the default subscription
    SetSubscription { subscription_id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;
    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {:?}: {}", log_path, e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let filter = EnvFilter::try_from_env("TFARM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("tfarm started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("tfarm").join("tfarm.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".tfarm").join("tfarm.log");
    }
    PathBuf::from("tfarm.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", format_azure_error(&err));
        std::process::exit(1);
    }
}

/// Everything that needs a subscription
struct Session {
    config: Config,
    client: AzureClient,
    registry: Registry,
    cache: AccountCache,
}

impl Session {
    fn open(config: Config, cli_subscription: Option<&str>) -> Result<Self> {
        let subscription = config.effective_subscription(cli_subscription).ok_or_else(|| {
            anyhow!("no subscription configured: pass --subscription or set ARM_SUBSCRIPTION_ID")
        })?;
        let client = AzureClient::new(&config, &subscription)?;
        let cache = AccountCache::new();
        let registry = Registry::with_cache(
            client.clone(),
            &config.environment.storage_suffix,
            cache.clone(),
        );
        Ok(Self {
            config,
            client,
            registry,
            cache,
        })
    }

    fn handler(&self, resource_type: &str) -> Result<&dyn tfarm::resource::ResourceHandler> {
        self.registry.get(resource_type).ok_or_else(|| {
            anyhow!(
                "unsupported resource type {:?}, expected one of {:?}",
                resource_type,
                self.registry.type_names()
            )
        })
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load();

    match args.command {
        Command::Id {
            command: IdCommand::Parse { id },
        } => parse_id(&id),
        Command::Config { command } => run_config(config, command),
        Command::Types => {
            for name in tfarm::resource::TYPE_NAMES {
                println!("{}", name);
            }
            Ok(())
        },
        command => {
            let session = Session::open(config, args.subscription.as_deref())?;
            run_with_session(&session, &args.state, command).await
        },
    }
}

fn parse_id(id: &str) -> Result<()> {
    let (kind, fields) =
        resourceids::describe(id).ok_or_else(|| anyhow!("{:?} is not a recognised resource ID", id))?;
    println!("{}", kind);
    for (name, value) in fields {
        println!("  {:<20} {}", name, value);
    }
    Ok(())
}

fn run_config(mut config: Config, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        },
        ConfigCommand::SetSubscription { subscription_id } => {
            config.set_subscription(&subscription_id)?;
            println!("Default subscription set to {}", subscription_id);
            Ok(())
        },
    }
}

fn api_version_for<'a>(kind: &str, versions: &'a ApiVersions) -> &'a str {
    match kind {
        "Storage Account" | "Storage Container" => &versions.storage,
        "Metric Alert" => &versions.insights,
        "Virtual Network" | "Subnet" => &versions.network,
        "Key Vault" => &versions.key_vault,
        _ => &versions.resources,
    }
}

fn load_resource_config(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading configuration {:?}", path))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("parsing YAML {:?}", path))
    } else {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON {:?}", path))
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_with_session(session: &Session, state_path: &Path, command: Command) -> Result<()> {
    match command {
        Command::List { resource_type } => {
            let states = session.handler(&resource_type)?.list().await?;
            print_json(&Value::Array(states))
        },
        Command::Show { id } => {
            let (kind, _) = resourceids::describe(&id)
                .ok_or_else(|| anyhow!("{:?} is not a recognised resource ID", id))?;
            let body = session
                .client
                .get(&id, api_version_for(kind, &session.config.api_versions))
                .await
                .with_context(|| format!("retrieving {} {:?}", kind, id))?;
            print_json(&body)
        },
        Command::Apply {
            resource_type,
            name,
            config,
        } => {
            let handler = session.handler(&resource_type)?;
            let resource_config = load_resource_config(&config)?;
            let address = state::address(&resource_type, &name);
            let mut state = StateFile::load(state_path)?;

            let attributes = match state.get(&address) {
                Some(existing) => handler.update(&existing.id, &resource_config).await?,
                None => handler.create(&resource_config).await?,
            };
            let id = attributes
                .get("id")
                .and_then(Value::as_str)
                .context("handler returned state without an id")?
                .to_string();

            state.upsert(
                &address,
                ResourceState {
                    resource_type,
                    id: id.clone(),
                    attributes,
                },
            );
            state.save(state_path)?;
            println!("{}: {}", address, id);
            Ok(())
        },
        Command::Import {
            resource_type,
            name,
            id,
        } => {
            let handler = session.handler(&resource_type)?;
            let address = state::address(&resource_type, &name);
            let mut state = StateFile::load(state_path)?;
            if state.get(&address).is_some() {
                bail!("{} is already managed", address);
            }

            let id = handler.import(&id)?;
            let attributes = handler
                .read(&id)
                .await?
                .ok_or_else(|| anyhow!("cannot import non-existent resource {:?}", id))?;
            state.upsert(
                &address,
                ResourceState {
                    resource_type,
                    id: id.clone(),
                    attributes,
                },
            );
            state.save(state_path)?;
            println!("{}: imported {}", address, id);
            Ok(())
        },
        Command::Refresh => {
            let mut state = StateFile::load(state_path)?;
            let addresses: Vec<String> = state.resources.keys().cloned().collect();

            for address in addresses {
                let Some(entry) = state.get(&address).cloned() else {
                    continue;
                };
                let handler = session.handler(&entry.resource_type)?;
                match handler.read(&entry.id).await? {
                    Some(attributes) => {
                        state.upsert(&address, ResourceState { attributes, ..entry });
                        println!("{}: refreshed", address);
                    },
                    None => {
                        state.remove(&address);
                        println!("{}: gone, removed from state", address);
                    },
                }
            }
            state.save(state_path)
        },
        Command::Destroy { address } => {
            let (resource_type, _) = state::split_address(&address)?;
            let handler = session.handler(resource_type)?;
            let mut state = StateFile::load(state_path)?;
            let entry = state
                .get(&address)
                .cloned()
                .ok_or_else(|| anyhow!("{} is not in the state", address))?;

            handler.delete(&entry.id).await?;
            state.remove(&address);
            state.save(state_path)?;
            println!("{}: destroyed", address);
            Ok(())
        },
        Command::ContainerProperties { id } => {
            let handler = StorageContainerHandler::new(
                session.client.clone(),
                session.cache.clone(),
                session.config.environment.storage_suffix.clone(),
            );
            let properties = handler
                .data_plane_properties(&id)
                .await?
                .ok_or_else(|| anyhow!("container {:?} was not found", id))?;
            println!("{:#?}", properties);
            Ok(())
        },
        Command::Id { .. } | Command::Types | Command::Config { .. } => Ok(()),
    }
}
