use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use ssi_offline::{
    CacheBundle, CacheStore, Credential, CredentialInput, CredentialVerifier,
    Error, FileStorage, HttpClient, OrgResolver, VerifierConfig,
};

/// Verify credentials against a local cache, and prime that cache.
#[derive(Parser, Debug)]
#[command(name = "ssi-offline", version, about)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// More output per occurrence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Cache directory.
    #[arg(long, global = true, default_value = ".ssi-offline")]
    cache: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a credential and print the result.
    Verify {
        file: PathBuf,
        /// Never use the network.
        #[arg(long)]
        offline: bool,
        /// Print a verification report tagged with this source.
        #[arg(long)]
        source: Option<String>,
    },
    /// Load a cache bundle.
    Prime {
        bundle: PathBuf,
        /// Replace everything cached for this organization.
        #[arg(long)]
        org: Option<String>,
    },
    /// Cache the contexts and keys a credential needs.
    Seed {
        credential: PathBuf,
        #[arg(long)]
        org: Option<String>,
    },
}

#[async_std::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = stderrlog::new()
        .module(module_path!())
        .verbosity(cli.verbose as usize + 1)
        .init()
    {
        eprintln!("Unable to initialize logging: {}", e);
    }
    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn read(path: &Path) -> Result<String, Error> {
    Ok(async_std::fs::read_to_string(path).await?)
}

#[cfg(feature = "http")]
fn http_client(config: &VerifierConfig) -> Result<Arc<dyn HttpClient>, Error> {
    Ok(Arc::new(ssi_offline::ReqwestClient::new(config.http_timeout())?))
}

#[cfg(not(feature = "http"))]
fn http_client(_config: &VerifierConfig) -> Result<Arc<dyn HttpClient>, Error> {
    Ok(Arc::new(ssi_offline::NoHttpClient))
}

/// Whether the command succeeded.
async fn run(cli: Cli) -> Result<bool, Error> {
    let mut config = match &cli.config {
        Some(path) => VerifierConfig::from_json_file(path).await?,
        None => VerifierConfig::default(),
    };
    let storage = Arc::new(FileStorage::open(&cli.cache).await?);
    let cache = Arc::new(CacheStore::new(storage, &config.cache_namespace));

    match cli.command {
        Command::Verify {
            file,
            offline,
            source,
        } => {
            if offline {
                config.online = Some(false);
            }
            let http = http_client(&config)?;
            let verifier = CredentialVerifier::new(cache, http, &config);
            let input = CredentialInput::from(read(&file).await?);
            let (output, verified) = match source {
                Some(source) => {
                    let report = verifier.verify_report(input, source).await;
                    let verified = report.result.verification_status;
                    (serde_json::to_string_pretty(&report)?, verified)
                }
                None => {
                    let result = verifier.verify(input).await;
                    let verified = result.verification_status;
                    (serde_json::to_string_pretty(&result)?, verified)
                }
            };
            println!("{}", output);
            Ok(verified)
        }
        Command::Prime { bundle, org } => {
            let bundle = CacheBundle::from_json_str(&read(&bundle).await?)?;
            let seeder = OrgResolver::new(cache, http_client(&config)?);
            match org {
                Some(org) => seeder.replace_for_organization(&org, bundle).await?,
                None => seeder.prime(bundle).await?,
            }
            Ok(true)
        }
        Command::Seed { credential, org } => {
            let credential = Credential::from_value(serde_json::from_str(&read(&credential).await?)?)?;
            let seeder = OrgResolver::new(cache, http_client(&config)?);
            let bundle = seeder
                .seed_from_credential(&credential, org.as_deref(), config.connectivity())
                .await?;
            log::info!(
                "seeded {} contexts and {} keys",
                bundle.contexts.len(),
                bundle.keys.len()
            );
            Ok(true)
        }
    }
}
