use clap::{Parser, Subcommand};
use ledger_tck::{
    generate_key, retry_on_error, save_keys, sign_file, validate_signature, KeyAlgorithm,
    KeySpec, MirrorClient, RpcClient, TckConfig,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledger-tck")]
#[command(about = "Compliance harness for a ledger SDK test server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,
    /// Overrides `server_url`
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Overrides `mirror_url`
    #[arg(long, global = true)]
    mirror_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key or composite key and its private keys
    GenerateKey {
        /// Full spec as `generateKey` JSON parameters
        #[arg(short, long)]
        spec: Option<String>,
        #[arg(short, long, default_value = "ed25519")]
        algorithm: String,
        /// Build a key list with this many members
        #[arg(short = 'n', long)]
        members: Option<usize>,
        /// Make the key list a threshold key
        #[arg(short, long)]
        threshold: Option<u32>,
        /// Ask the server-under-test instead of generating locally
        #[arg(long)]
        remote: bool,
        #[arg(short, long, default_value = "./results/keys.json")]
        out: String,
    },
    /// Sign a message with stored private keys
    Sign {
        #[arg(short, long)]
        message: String,
        #[arg(short, long, default_value = "./results/keys.json")]
        keys_file: String,
        #[arg(short, long, default_value = "./results/signatures.json")]
        signature_file: String,
        /// Number of stored keys to sign with; defaults to the minimal satisfying set
        #[arg(long)]
        signers: Option<usize>,
    },
    /// Check a signature set against the stored key structure
    Verify {
        #[arg(short, long)]
        message: String,
        #[arg(short, long, default_value = "./results/keys.json")]
        keys_file: String,
        #[arg(short, long, default_value = "./results/signatures.json")]
        signature_file: String,
    },
    /// Send one JSON-RPC call to the server-under-test
    Call {
        #[arg(short, long)]
        method: String,
        #[arg(short, long, default_value = "{}")]
        params: String,
    },
    /// Clear the server-under-test's state
    Reset,
    /// Read an entity from the mirror, waiting for it to replicate
    Mirror {
        /// e.g. `files`, `accounts`
        collection: String,
        id: String,
    },
}

fn build_spec(
    spec: Option<&str>,
    algorithm: &str,
    members: Option<usize>,
    threshold: Option<u32>,
) -> Result<KeySpec, Box<dyn std::error::Error>> {
    if let Some(json) = spec {
        return Ok(ledger_tck::codec::decode(json)?);
    }
    let single = KeySpec::Single(algorithm.parse::<KeyAlgorithm>()?);
    Ok(match (members, threshold) {
        (None, None) => single,
        (Some(n), None) => KeySpec::key_list(vec![single; n]),
        (n, Some(t)) => KeySpec::threshold(t, vec![single; n.unwrap_or(t as usize)])?,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TckConfig::load(path)?,
        None => TckConfig::default(),
    };
    if let Some(url) = cli.server_url {
        config.server_url = url;
    }
    if let Some(url) = cli.mirror_url {
        config.mirror_url = url;
    }

    match &cli.command {
        Commands::GenerateKey {
            spec,
            algorithm,
            members,
            threshold,
            remote,
            out,
        } => {
            let spec = build_spec(spec.as_deref(), algorithm, *members, *threshold)?;
            let result = if *remote {
                let client = RpcClient::http(&config.server_url, config.request_timeout())?;
                client.generate_key(&spec).await?
            } else {
                generate_key(&spec)?
            };
            save_keys(&result, out)?;
            println!("{}", result.key.to_wire());
            tracing::info!(path = %out, private_keys = result.private_keys.len(), "keys saved");
        }
        Commands::Sign {
            message,
            keys_file,
            signature_file,
            signers,
        } => {
            let set = sign_file(message, keys_file, signature_file, *signers)?;
            println!("{} signature(s) written to {}", set.len(), signature_file);
        }
        Commands::Verify {
            message,
            keys_file,
            signature_file,
        } => {
            validate_signature(message, keys_file, signature_file)?;
            println!("Signature set satisfies the key");
        }
        Commands::Call { method, params } => {
            let params: Value = ledger_tck::codec::decode(params)?;
            let client = RpcClient::http(&config.server_url, config.request_timeout())?;
            let result = client.call_value(method, &params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Reset => {
            let client = RpcClient::http(&config.server_url, config.request_timeout())?;
            let status = client.reset().await?;
            println!("{}", status.status.as_deref().unwrap_or("reset"));
        }
        Commands::Mirror { collection, id } => {
            let mirror = MirrorClient::new(&config.mirror_url, config.request_timeout())?;
            let policy = config.retry_policy();
            let entity: Value =
                retry_on_error(&policy, || mirror.entity::<Value>(collection, id)).await?;
            println!("{}", serde_json::to_string_pretty(&entity)?);
        }
    }

    Ok(())
}
