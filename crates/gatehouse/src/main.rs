use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use gatehouse::{audit_log, GatehouseConfig, Gatekeeper, RootError, RootResult};
use gatehouse_audit::AuditQuery;
use gatehouse_core::{
    Action, AuditContext, DataSharingAgreement, Decision, Identity, RequestId, ResourceType,
    Timestamp, UserId,
};
use gatehouse_disclosure::{DisclosureEvaluator, OwnerAttributes, RegistryEntry, StaticIdentityRegistry};
use gatehouse_policy::SessionAttributes;

/// Gatehouse: access control and audit for governed catalogue resources.
///
/// Inputs are JSON files; decisions are printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the audit entries produced by the command to stderr as JSON lines
    #[arg(long, global = true)]
    show_audit: bool,

    /// Evaluate as of this RFC 3339 instant instead of the current time
    #[arg(long, global = true)]
    now: Option<String>,

    /// Request id recorded in the audit trail
    #[arg(long, global = true)]
    request_id: Option<String>,

    /// JSON-lines audit log to append to and read from (overrides
    /// audit.log_path)
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a role/action/resource-type triple against the permission matrix
    CheckPermission {
        #[arg(long)]
        role: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        resource_type: String,
    },

    /// Decide access to a single data-sharing agreement
    Evaluate {
        /// Identity JSON (canonical identity or session attributes)
        #[arg(long)]
        identity: PathBuf,
        /// Agreement JSON
        #[arg(long)]
        agreement: PathBuf,
        #[arg(long, default_value = "read")]
        action: String,
    },

    /// Filter a list of data-sharing agreements
    Filter {
        /// Identity JSON (canonical identity or session attributes)
        #[arg(long)]
        identity: PathBuf,
        /// JSON array of agreements
        #[arg(long)]
        agreements: PathBuf,
        #[arg(long, default_value = "read")]
        action: String,
    },

    /// Evaluate which profile fields a requester may see
    Disclose {
        /// Requester identity handle; omit for an anonymous request
        #[arg(long)]
        handle: Option<String>,
        /// Owner attributes JSON (departmentId, teamId)
        #[arg(long)]
        owner: PathBuf,
        /// Profile JSON object
        #[arg(long)]
        profile: PathBuf,
        #[arg(long, default_value = "profile")]
        profile_id: String,
        /// JSON array of known requesters for the fast-path registry
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Inspect the JSON-lines audit log
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Matching entries, newest first
    Query {
        /// Maximum entries returned (default: audit.default_query_limit)
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        resource_type: Option<String>,
        /// allow or deny
        #[arg(long)]
        decision: Option<String>,
        /// RFC 3339 lower bound, inclusive
        #[arg(long)]
        since: Option<String>,
    },

    /// Counts over an inclusive time window
    Stats {
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
    },

    /// Every entry as JSON lines on stdout
    Export,

    /// Recompute every integrity hash; fails if any entry was altered
    Verify,
}

/// Identity files may hold a canonical identity or raw session attributes
/// carrying an admin-panel role.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdentityInput {
    Canonical(Identity),
    Session(SessionAttributes),
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "gatehouse=debug,gatehouse_policy=debug,gatehouse_disclosure=debug,gatehouse_audit=debug",
        )
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gatehouse=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> RootResult<GatehouseConfig> {
    match path {
        Some(p) => GatehouseConfig::load(p),
        None => {
            let default_path = GatehouseConfig::default_config_path();
            GatehouseConfig::load(&default_path)
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> RootResult<T> {
    let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
    Ok(serde_json::from_str(&contents)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> RootResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> RootResult<()> {
    if let Commands::InitConfig { force } = cli.command {
        return cmd_init_config(cli.config.as_ref(), force);
    }

    let config = load_config(cli.config.as_ref())?;
    let log_path = cli.audit_log.clone().or_else(|| config.audit.log_path.clone());
    let now = match cli.now.as_deref() {
        Some(s) => Timestamp::parse_rfc3339(s)?,
        None => Timestamp::now(),
    };
    let context = AuditContext {
        ip_address: None,
        user_agent: Some(format!("gatehouse-cli/{}", env!("CARGO_PKG_VERSION"))),
        request_id: cli.request_id.map(RequestId::new),
    };

    match cli.command {
        Commands::CheckPermission {
            role,
            action,
            resource_type,
        } => {
            let gk = Gatekeeper::from_config(&config);
            print_json(&gk.role_gate().check_permission_raw(&role, &action, &resource_type))
        }
        Commands::Evaluate {
            identity,
            agreement,
            action,
        } => {
            let gk = Gatekeeper::from_config(&config);
            let identity = load_identity(&gk, &identity)?;
            let agreement: DataSharingAgreement = read_json(&agreement)?;
            let action: Action = action.parse()?;
            let outcome = gk.authorize_agreement_at(&identity, action, &agreement, context, now)?;
            print_json(&outcome)?;
            record_audit(&gk, cli.show_audit, log_path.as_deref())
        }
        Commands::Filter {
            identity,
            agreements,
            action,
        } => {
            let gk = Gatekeeper::from_config(&config);
            let identity = load_identity(&gk, &identity)?;
            let agreements: Vec<DataSharingAgreement> = read_json(&agreements)?;
            let action: Action = action.parse()?;
            let listing = gk.filter_agreements_at(&identity, action, agreements, context, now)?;
            print_json(&listing)?;
            record_audit(&gk, cli.show_audit, log_path.as_deref())
        }
        Commands::Disclose {
            handle,
            owner,
            profile,
            profile_id,
            registry,
        } => {
            let mut disclosure =
                DisclosureEvaluator::new(config.disclosure.government_domains.clone())
                    .with_resolve_timeout(config.resolve_timeout());
            if let Some(path) = registry {
                let entries: Vec<RegistryEntry> = read_json(&path)?;
                disclosure =
                    disclosure.with_registry(Arc::new(StaticIdentityRegistry::from_entries(entries)));
            }
            let gk = Gatekeeper::from_config(&config).with_disclosure(disclosure);
            let owner: OwnerAttributes = read_json(&owner)?;
            let profile: serde_json::Map<String, serde_json::Value> = read_json(&profile)?;
            let outcome = gk.authorize_profile_at(
                handle.as_deref(),
                &owner,
                &profile_id,
                &profile,
                context,
                now,
            )?;
            print_json(&outcome)?;
            record_audit(&gk, cli.show_audit, log_path.as_deref())
        }
        Commands::Audit { command } => {
            let path = log_path.ok_or_else(|| {
                RootError::Config("no audit log: pass --audit-log or set audit.log_path".into())
            })?;
            cmd_audit(&config, &path, command)
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn load_identity(gk: &Gatekeeper, path: &Path) -> RootResult<Identity> {
    match read_json::<IdentityInput>(path)? {
        IdentityInput::Canonical(identity) => Ok(identity),
        IdentityInput::Session(attrs) => Ok(gk.identity_from_session(attrs)),
    }
}

fn record_audit(gk: &Gatekeeper, show: bool, log_path: Option<&Path>) -> RootResult<()> {
    if let Some(path) = log_path {
        audit_log::append_entries(gk.audit(), path)?;
    }
    if !show {
        return Ok(());
    }
    let written = gk.audit().export_jsonl(std::io::stderr().lock())?;
    let mismatched = gk.audit().verify_all()?;
    if !mismatched.is_empty() {
        return Err(RootError::Internal(format!(
            "{} audit entries failed integrity verification",
            mismatched.len()
        )));
    }
    info!(entries = written, "audit entries exported");
    Ok(())
}

fn parse_time(s: Option<&str>) -> RootResult<Option<Timestamp>> {
    Ok(s.map(Timestamp::parse_rfc3339).transpose()?)
}

fn cmd_audit(config: &GatehouseConfig, path: &Path, command: AuditCommand) -> RootResult<()> {
    let recorder = audit_log::load(path)?;
    match command {
        AuditCommand::Query {
            limit,
            user,
            resource_type,
            decision,
            since,
        } => {
            let query = AuditQuery {
                user_id: user.map(UserId::new),
                resource_type: resource_type
                    .as_deref()
                    .map(str::parse::<ResourceType>)
                    .transpose()?,
                decision: decision.as_deref().map(str::parse::<Decision>).transpose()?,
                since: parse_time(since.as_deref())?,
                ..audit_log::query_for(&config.audit, limit)
            };
            print_json(&recorder.query(&query)?)
        }
        AuditCommand::Stats { since, until } => {
            let stats =
                recorder.statistics(parse_time(since.as_deref())?, parse_time(until.as_deref())?)?;
            print_json(&stats)
        }
        AuditCommand::Export => {
            recorder.export_jsonl(std::io::stdout().lock())?;
            Ok(())
        }
        AuditCommand::Verify => {
            let mismatched = recorder.verify_all()?;
            print_json(&mismatched)?;
            if mismatched.is_empty() {
                info!(entries = recorder.len()?, "audit log verified");
                Ok(())
            } else {
                Err(RootError::Internal(format!(
                    "{} audit entries failed integrity verification",
                    mismatched.len()
                )))
            }
        }
    }
}

fn cmd_init_config(config_path: Option<&PathBuf>, force: bool) -> RootResult<()> {
    let path = config_path
        .cloned()
        .unwrap_or_else(GatehouseConfig::default_config_path);
    if path.exists() && !force {
        return Err(RootError::Config(format!(
            "{} already exists; pass --force to overwrite",
            path.display()
        )));
    }
    let config = GatehouseConfig::default();
    config.save(&path)?;
    info!(path = %path.display(), "configuration written");
    println!("{}", path.display());
    Ok(())
}
