//! Proxy decision policy
//!
//! Chooses the URL a client should fetch from. First match wins:
//!
//! 1. a download proxy configured on a chain node whose storage needs
//!    proxying; with two or more such nodes the second one is used
//! 2. the terminal storage's download proxy
//! 3. this server's `/p` endpoint when the terminal storage must be proxied
//! 4. the backend link itself
//!
//! Only direct delivery passes backend headers and range hints through.

use crate::chain::ChainNode;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use veil_crypto::Signer;
use veil_storage::path::encode_path;
use veil_storage::{Headers, LinkInfo, StorageSettings};

/// Upper bound on the concurrency hint of direct links
pub const MAX_DIRECT_CONCURRENCY: usize = 16;

/// Server-wide inputs to the decision
#[derive(Clone)]
pub struct ProxyPolicy {
    /// Public base URL of this server, without trailing slash
    pub api_base: String,
    /// Sign every proxied link
    pub sign_all: bool,
    pub signer: Arc<Signer>,
}

impl fmt::Debug for ProxyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyPolicy")
            .field("api_base", &self.api_base)
            .field("sign_all", &self.sign_all)
            .finish_non_exhaustive()
    }
}

/// How the client should fetch the object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub url: String,
    pub proxied: bool,
    /// Backend headers, only for direct delivery
    pub headers: Option<BTreeMap<String, String>>,
    pub concurrency: usize,
    pub part_size: u64,
}

impl Delivery {
    fn proxy(url: String) -> Self {
        Self {
            url,
            proxied: true,
            headers: None,
            concurrency: 0,
            part_size: 0,
        }
    }
}

/// Build a download proxy URL from a storage's template
pub fn down_proxy_url(settings: &StorageSettings, path: &str, signer: &Signer) -> String {
    let base = settings
        .down_proxy_url
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches('/');
    let mut url = format!("{}{}", base, encode_path(path));
    if !settings.disable_proxy_sign {
        url.push_str("?sign=");
        url.push_str(&signer.sign(path));
    }
    url
}

fn has_down_proxy(settings: &StorageSettings) -> bool {
    !settings.down_proxy_url.trim().is_empty()
}

/// Flatten multi-valued headers into comma-joined values
pub fn flatten_headers(headers: &Headers) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, values)| (name.clone(), values.join(",")))
        .collect()
}

/// Decide delivery for `link`, fetched from the last node of `chain`.
/// `path` is the virtual path the chain was resolved for.
pub fn decide_delivery(
    chain: &[ChainNode],
    link: &LinkInfo,
    path: &str,
    policy: &ProxyPolicy,
) -> Delivery {
    let candidates: Vec<String> = chain
        .iter()
        .filter(|node| {
            let settings = node.storage.settings();
            has_down_proxy(settings) && (node.storage.must_proxy() || settings.web_proxy)
        })
        .map(|node| down_proxy_url(node.storage.settings(), &node.virtual_path, &policy.signer))
        .collect();
    if let Some(url) = candidates.get(1).or_else(|| candidates.first()) {
        debug!(url = %url, candidates = candidates.len(), "nested download proxy");
        return Delivery::proxy(url.clone());
    }

    if let Some(terminal) = chain.last() {
        let settings = terminal.storage.settings();
        if has_down_proxy(settings) {
            debug!(mount = %terminal.storage.mount_path(), "terminal download proxy");
            return Delivery::proxy(down_proxy_url(settings, path, &policy.signer));
        }

        if terminal.storage.must_proxy() || settings.web_proxy {
            let mut url = format!(
                "{}/p{}",
                policy.api_base.trim_end_matches('/'),
                encode_path(path)
            );
            let sign_links = chain
                .first()
                .map(|entry| entry.storage.settings().sign_links)
                .unwrap_or_default();
            if sign_links || policy.sign_all {
                url.push_str("?sign=");
                url.push_str(&policy.signer.sign(path));
            }
            debug!(mount = %terminal.storage.mount_path(), "forced local proxy");
            return Delivery::proxy(url);
        }
    }

    Delivery {
        url: link.url.clone(),
        proxied: false,
        headers: Some(flatten_headers(&link.headers)),
        concurrency: link.concurrency.min(MAX_DIRECT_CONCURRENCY),
        part_size: link.part_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_storage::{Storage, UrlTreeConfig, UrlTreeStorage};

    fn policy(sign_all: bool) -> ProxyPolicy {
        ProxyPolicy {
            api_base: "https://veil.example/".to_string(),
            sign_all,
            signer: Arc::new(Signer::new("token", None)),
        }
    }

    fn node(mount: &str, must_proxy: bool, settings: StorageSettings, path: &str) -> ChainNode {
        let storage: Arc<dyn Storage> = Arc::new(UrlTreeStorage::new(UrlTreeConfig {
            mount_path: mount.to_string(),
            must_proxy,
            objects: Vec::new(),
            settings,
        }));
        ChainNode {
            storage,
            virtual_path: path.to_string(),
            actual_path: path.trim_start_matches(mount).to_string(),
        }
    }

    fn proxied(url: &str) -> StorageSettings {
        StorageSettings {
            web_proxy: true,
            down_proxy_url: url.to_string(),
            disable_proxy_sign: true,
            ..Default::default()
        }
    }

    fn link() -> LinkInfo {
        let mut headers = Headers::new();
        headers.insert(
            "Cookie".to_string(),
            vec!["a=1".to_string(), "b=2".to_string()],
        );
        LinkInfo {
            url: "https://backend.example/obj".to_string(),
            headers,
            content_length: 100,
            concurrency: 64,
            part_size: 1 << 20,
        }
    }

    #[test]
    fn test_direct_passthrough_and_cap() {
        let chain = vec![node("/backend", false, StorageSettings::default(), "/backend/a")];
        let delivery = decide_delivery(&chain, &link(), "/backend/a", &policy(false));

        assert!(!delivery.proxied);
        assert_eq!(delivery.url, "https://backend.example/obj");
        assert_eq!(delivery.headers.unwrap()["Cookie"], "a=1,b=2");
        assert_eq!(delivery.concurrency, MAX_DIRECT_CONCURRENCY);
        assert_eq!(delivery.part_size, 1 << 20);
    }

    #[test]
    fn test_direct_keeps_small_concurrency() {
        let chain = vec![node("/backend", false, StorageSettings::default(), "/backend/a")];
        let mut info = link();
        info.concurrency = 4;
        assert_eq!(decide_delivery(&chain, &info, "/backend/a", &policy(false)).concurrency, 4);
    }

    #[test]
    fn test_second_nested_candidate_wins() {
        let chain = vec![
            node("/outer", false, proxied("https://first.example"), "/outer/a"),
            node("/inner", false, proxied("https://second.example"), "/inner/a"),
            node("/backend", false, StorageSettings::default(), "/backend/a"),
        ];
        let delivery = decide_delivery(&chain, &link(), "/backend/a", &policy(false));
        assert_eq!(delivery.url, "https://second.example/inner/a");
        assert!(delivery.headers.is_none());
        assert_eq!(delivery.concurrency, 0);
        assert_eq!(delivery.part_size, 0);
    }

    #[test]
    fn test_single_nested_candidate() {
        let chain = vec![
            node("/outer", false, proxied("https://first.example/\nhttps://ignored"), "/outer/a b"),
            node("/backend", false, StorageSettings::default(), "/backend/a b"),
        ];
        let delivery = decide_delivery(&chain, &link(), "/backend/a b", &policy(false));
        assert_eq!(delivery.url, "https://first.example/outer/a%20b");
    }

    #[test]
    fn test_nested_candidate_needs_proxy_flag() {
        let mut settings = proxied("https://cdn.example");
        settings.web_proxy = false;
        let chain = vec![
            node("/outer", false, settings, "/outer/a"),
            node("/backend", false, StorageSettings::default(), "/backend/a"),
        ];
        let delivery = decide_delivery(&chain, &link(), "/backend/a", &policy(false));
        assert!(!delivery.proxied);
    }

    #[test]
    fn test_terminal_down_proxy_without_flags() {
        let mut settings = proxied("https://cdn.example");
        settings.web_proxy = false;
        settings.disable_proxy_sign = false;
        let chain = vec![node("/backend", false, settings, "/backend/a")];
        let p = policy(false);
        let delivery = decide_delivery(&chain, &link(), "/backend/enc", &p);

        let (url, sign) = delivery.url.split_once("?sign=").unwrap();
        assert_eq!(url, "https://cdn.example/backend/enc");
        p.signer.verify("/backend/enc", sign).unwrap();
    }

    #[test]
    fn test_forced_proxy_suppresses_hints() {
        let chain = vec![node("/local", true, StorageSettings::default(), "/local/a")];
        let delivery = decide_delivery(&chain, &link(), "/local/a", &policy(false));
        assert_eq!(delivery.url, "https://veil.example/p/local/a");
        assert!(delivery.proxied);
        assert!(delivery.headers.is_none());
        assert_eq!(delivery.concurrency, 0);
        assert_eq!(delivery.part_size, 0);
    }

    #[test]
    fn test_forced_proxy_signing() {
        let chain = vec![node("/local", true, StorageSettings::default(), "/local/a")];
        let p = policy(true);
        let delivery = decide_delivery(&chain, &link(), "/local/a", &p);
        let (_, sign) = delivery.url.split_once("?sign=").unwrap();
        p.signer.verify("/local/a", sign).unwrap();

        let signed = StorageSettings {
            sign_links: true,
            ..Default::default()
        };
        let chain = vec![
            node("/alias", false, signed, "/alias/a"),
            node("/local", true, StorageSettings::default(), "/local/a"),
        ];
        let delivery = decide_delivery(&chain, &link(), "/local/a", &policy(false));
        assert!(delivery.url.contains("?sign="));
    }
}
