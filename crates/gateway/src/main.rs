use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use gateway::{
    start_server, AppState, BackendConfig, GatewayConfig, GenerationService, HttpImageBackend,
    HttpTextBackend, ImageBackend, InstanceRegistry, IpfsClient, IpfsConfig, MemoryRegistry,
    PolicyGate, RedisRegistry, RegistryStorage, TextBackend,
};
use log::{error, info, LevelFilter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Parser)]
struct Args {
    /// Bind host
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port
    #[arg(short = 'p', long, default_value = "8000")]
    port: u16,

    /// Grant generation and storage capabilities without a registered
    /// wallet instance
    #[arg(long)]
    disable_wallet_auth: bool,

    /// Comma separated allow-list of wallet addresses; empty allows any
    /// registered wallet
    #[arg(long, value_delimiter = ',')]
    allowed_addresses: Vec<String>,

    /// Distributed text inference API url
    #[arg(long, default_value = "http://localhost:8093")]
    text_backend_url: String,

    /// Text model served by the swarm
    #[arg(long, default_value = "bigscience/bloom-petals")]
    text_model: String,

    /// Disable the text backend
    #[arg(long)]
    disable_text_backend: bool,

    /// Diffusion image inference API url
    #[arg(long, default_value = "http://localhost:8094")]
    image_backend_url: String,

    /// Image model served by the diffusion service
    #[arg(long, default_value = "runwayml/stable-diffusion-v1-5")]
    image_model: String,

    /// Disable the image backend
    #[arg(long)]
    disable_image_backend: bool,

    /// Backend request deadline in seconds; distributed inference can take
    /// minutes
    #[arg(long, default_value = "300")]
    backend_timeout: u64,

    /// IPFS HTTP API url
    #[arg(long, default_value = "http://127.0.0.1:5001/api/v0")]
    ipfs_api_url: String,

    /// Public IPFS gateway used in response links
    #[arg(long, default_value = "https://ipfs.io/ipfs")]
    ipfs_gateway_url: String,

    /// Content store request deadline in seconds
    #[arg(long, default_value = "30")]
    ipfs_timeout: u64,

    /// Disable the content store bridge
    #[arg(long)]
    disable_ipfs: bool,

    /// Redis url for the durable instance registry; omitted for in-memory
    #[arg(short = 's', long)]
    redis_store_url: Option<String>,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn config_from_args(args: &Args) -> Result<GatewayConfig> {
    let mut allowed_addresses = Vec::new();
    for raw in &args.allowed_addresses {
        let address = Address::from_str(raw.trim())
            .map_err(|err| anyhow::anyhow!("invalid allow-list address {raw}: {err}"))?;
        allowed_addresses.push(address);
    }

    let text_backend = (!args.disable_text_backend).then(|| BackendConfig {
        url: args.text_backend_url.clone(),
        model: args.text_model.clone(),
        request_timeout: Duration::from_secs(args.backend_timeout),
    });
    let image_backend = (!args.disable_image_backend).then(|| BackendConfig {
        url: args.image_backend_url.clone(),
        model: args.image_model.clone(),
        request_timeout: Duration::from_secs(args.backend_timeout),
    });
    let ipfs = (!args.disable_ipfs).then(|| IpfsConfig {
        api_url: args.ipfs_api_url.clone(),
        gateway_url: args.ipfs_gateway_url.clone(),
        request_timeout: Duration::from_secs(args.ipfs_timeout),
    });

    Ok(GatewayConfig {
        host: args.host.clone(),
        port: args.port,
        require_wallet: !args.disable_wallet_auth,
        allowed_addresses,
        text_backend,
        image_backend,
        ipfs,
        redis_url: args.redis_store_url.clone(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = match args.log_level.as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let config = config_from_args(&args)?;

    let storage: Arc<dyn RegistryStorage> = match &config.redis_url {
        Some(redis_url) => {
            info!("Using Redis instance registry at {redis_url}");
            Arc::new(RedisRegistry::new(redis_url).context("failed to open redis registry")?)
        }
        None => {
            info!("Using in-memory instance registry");
            Arc::new(MemoryRegistry::new())
        }
    };
    let registry = Arc::new(InstanceRegistry::new(storage));
    let gate = Arc::new(PolicyGate::new(config.policy()));

    let text_backend: Option<Arc<dyn TextBackend>> = match &config.text_backend {
        Some(backend) => {
            Url::parse(&backend.url).context("invalid text backend url")?;
            info!("Text backend: {} at {}", backend.model, backend.url);
            Some(Arc::new(HttpTextBackend::new(
                &backend.url,
                &backend.model,
                backend.request_timeout,
            )?) as Arc<dyn TextBackend>)
        }
        None => {
            info!("Text backend disabled");
            None
        }
    };

    let image_backend: Option<Arc<dyn ImageBackend>> = match &config.image_backend {
        Some(backend) => {
            Url::parse(&backend.url).context("invalid image backend url")?;
            info!("Image backend: {} at {}", backend.model, backend.url);
            Some(Arc::new(HttpImageBackend::new(
                &backend.url,
                &backend.model,
                backend.request_timeout,
            )?) as Arc<dyn ImageBackend>)
        }
        None => {
            info!("Image backend disabled");
            None
        }
    };

    let ipfs = match &config.ipfs {
        Some(ipfs_config) => {
            Url::parse(&ipfs_config.api_url).context("invalid ipfs api url")?;
            info!("Content store: {}", ipfs_config.api_url);
            Some(Arc::new(IpfsClient::new(
                &ipfs_config.api_url,
                &ipfs_config.gateway_url,
                ipfs_config.request_timeout,
            )?))
        }
        None => {
            info!("Content store disabled");
            None
        }
    };

    info!(
        "Wallet authorization {}",
        if config.require_wallet {
            "required"
        } else {
            "disabled"
        }
    );

    let generation = Arc::new(GenerationService::new(
        gate.clone(),
        text_backend.clone(),
        image_backend.clone(),
        ipfs.clone(),
    ));

    let state = AppState {
        registry,
        gate,
        generation,
        ipfs,
        text_backend,
        image_backend,
    };

    tokio::select! {
        res = start_server(&config.host, config.port, state) => {
            if let Err(e) = res {
                error!("Server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
