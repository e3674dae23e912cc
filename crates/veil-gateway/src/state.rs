//! Application state

use crate::config::GatewayConfig;
use crate::middleware::{self, KeyedRateLimiter};
use std::sync::Arc;
use tracing::{info, warn};
use veil_core::{MetadataAssembler, ProxyPolicy};
use veil_crypto::Signer;
use veil_storage::MountTable;

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Mounted storages
    pub mounts: Arc<MountTable>,
    /// Crypt metadata assembler over `mounts`
    pub assembler: MetadataAssembler,
    /// Link signer
    pub signer: Arc<Signer>,
    /// Per-client request limiter
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

impl AppState {
    /// Create a new application state, mounting every configured storage
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let mounts = Arc::new(MountTable::from_configs(&config.mounts)?);
        info!(mounts = ?mounts.mounts(), "storages mounted");

        let token = if config.token.is_empty() {
            warn!("No link signing token configured, generating a random one");
            uuid::Uuid::new_v4().simple().to_string()
        } else {
            config.token.clone()
        };
        let ttl = match config.link_expiration_hours {
            0 => None,
            hours => Some(
                chrono::Duration::try_hours(i64::try_from(hours)?)
                    .ok_or_else(|| anyhow::anyhow!("link_expiration_hours out of range"))?,
            ),
        };
        let signer = Arc::new(Signer::new(&token, ttl));

        Ok(Self {
            assembler: MetadataAssembler::new(Arc::clone(&mounts)),
            rate_limiter: middleware::create_rate_limiter(config.rate_limit_rps),
            config,
            mounts,
            signer,
        })
    }

    /// Proxy policy for a request served under `api_base`
    pub fn proxy_policy(&self, api_base: String) -> ProxyPolicy {
        ProxyPolicy {
            api_base,
            sign_all: self.config.sign_all,
            signer: Arc::clone(&self.signer),
        }
    }
}
