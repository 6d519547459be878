//! Groups configurations used throughout the node, passed to the CLI
//!
//! A TOML config file may supply any long flag; explicit command line
//! arguments take precedence over file entries

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use std::{env, fs, path::PathBuf};

use clap::Parser;

/// The CLI argument name for the config file
const CONFIG_FILE_ARG: &str = "--config-file";

/// Defines the node's command line interface
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None, args_override_self = true)]
struct Cli {
    // ---------------
    // | Config File |
    // ---------------
    /// An auxiliary config file to read from
    #[arg(long)]
    config_file: Option<String>,

    // ----------------------------
    // | Local Node Configuration |
    // ----------------------------
    /// The port to listen on for the externally facing HTTP API
    #[arg(long, default_value = "3000")]
    http_port: u16,
    /// The port to listen on for the externally facing websocket API
    #[arg(long, default_value = "4000")]
    websocket_port: u16,
    /// Whether or not to run the node in debug mode
    #[arg(short, long)]
    debug: bool,

    // ---------------------
    // | Circuit Artifacts |
    // ---------------------
    /// The path to the settlement circuit's WASM witness generator
    #[arg(long, default_value = "./circuits/settlement_proof.wasm")]
    circuit_wasm: String,
    /// The path to the settlement circuit's proving key
    #[arg(long, default_value = "./circuits/settlement_proof_final.zkey")]
    circuit_zkey: String,

    // --------------
    // | Compliance |
    // --------------
    /// A JSON file holding the ordered list of whitelisted participant
    /// addresses
    #[arg(long)]
    whitelist_file: Option<String>,

    // --------------
    // | Settlement |
    // --------------
    /// An override of the signature rendezvous deadline, in milliseconds
    /// from match pickup; defaults to the matched orders' expiry
    #[arg(long)]
    signature_timeout_ms: Option<u64>,
}

/// Defines the system config for the node
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// The port to listen on for the externally facing HTTP API
    pub http_port: u16,
    /// The port to listen on for the externally facing websocket API
    pub websocket_port: u16,
    /// Whether the node runs in debug mode
    pub debug: bool,
    /// The path to the settlement circuit's WASM witness generator
    pub circuit_wasm: PathBuf,
    /// The path to the settlement circuit's proving key
    pub circuit_zkey: PathBuf,
    /// The ordered list of whitelisted participant addresses
    pub whitelist: Vec<String>,
    /// An override of the signature rendezvous deadline in milliseconds
    pub signature_timeout_ms: Option<u64>,
}

/// Parse the command line arguments, merging in any config file underneath
/// them
pub fn parse_command_line_args() -> Result<NodeConfig, String> {
    let cli_args: Vec<String> = env::args().collect();
    let cli = parse_args_with_config_file(cli_args)?;

    let whitelist = match &cli.whitelist_file {
        Some(path) => read_whitelist_file(path)?,
        None => Vec::new(),
    };

    Ok(NodeConfig {
        http_port: cli.http_port,
        websocket_port: cli.websocket_port,
        debug: cli.debug,
        circuit_wasm: PathBuf::from(cli.circuit_wasm),
        circuit_zkey: PathBuf::from(cli.circuit_zkey),
        whitelist,
        signature_timeout_ms: cli.signature_timeout_ms,
    })
}

/// Parse an argument list, splicing config file entries in before the
/// explicit arguments so the latter win
fn parse_args_with_config_file(cli_args: Vec<String>) -> Result<Cli, String> {
    let config_file = cli_args
        .iter()
        .position(|arg| arg == CONFIG_FILE_ARG)
        .and_then(|idx| cli_args.get(idx + 1))
        .cloned();

    let mut full_args = vec![cli_args[0].clone()];
    if let Some(path) = config_file {
        full_args.extend(config_file_to_args(&path)?);
    }
    full_args.extend(cli_args.into_iter().skip(1));

    Cli::try_parse_from(full_args).map_err(|e| e.to_string())
}

/// Expand a TOML config file into an equivalent argument list
fn config_file_to_args(path: &str) -> Result<Vec<String>, String> {
    let file_contents =
        fs::read_to_string(path).map_err(|e| format!("cannot read config file {path}: {e}"))?;
    let table: toml::Table =
        toml::from_str(&file_contents).map_err(|e| format!("invalid config file: {e}"))?;

    let mut args = Vec::new();
    for (key, value) in table {
        let flag = format!("--{}", key.replace('_', "-"));
        match value {
            toml::Value::Boolean(true) => args.push(flag),
            toml::Value::Boolean(false) => {},
            toml::Value::String(s) => {
                args.push(flag);
                args.push(s);
            },
            toml::Value::Integer(i) => {
                args.push(flag);
                args.push(i.to_string());
            },
            other => {
                return Err(format!("unsupported config value for {key}: {other}"));
            },
        }
    }

    Ok(args)
}

/// Read the whitelist file: a JSON array of participant addresses in leaf
/// order
fn read_whitelist_file(path: &str) -> Result<Vec<String>, String> {
    let file_contents =
        fs::read_to_string(path).map_err(|e| format!("cannot read whitelist file {path}: {e}"))?;
    serde_json::from_str(&file_contents).map_err(|e| format!("invalid whitelist file: {e}"))
}
