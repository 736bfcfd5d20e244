use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use barangay::{BarangayConfig, FallbackQueue, LifecycleManager, SubmitOutcome, TrackingLookup};
use dashmap::DashMap;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use records::NewRequest;
use std::sync::Arc;
use subtle::ConstantTimeEq;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the Prometheus recorder once per process.
fn prometheus_handle() -> PrometheusHandle {
    PROMETHEUS
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("a metrics recorder is already installed; /metrics will be empty");
            }
            handle
        })
        .clone()
}

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Rate limit tracking: admin key -> (count, window_start)
    pub rate_limiter: Arc<DashMap<String, (u32, std::time::Instant)>>,

    pub manager: Arc<LifecycleManager>,

    pub lookup: Arc<TrackingLookup>,

    /// Present when the barangay config names a fallback queue path
    pub fallback: Option<Arc<FallbackQueue>>,

    /// Public key/value settings (barangay name, population, GCash QR, ...)
    pub settings: Arc<DashMap<String, serde_json::Value>>,

    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Create new server state from the barangay YAML named in the config,
    /// or from defaults.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let barangay = match &config.barangay_config {
            Some(path) => {
                BarangayConfig::from_file(path).map_err(|e| ServerError::Config(e.to_string()))?
            }
            None => BarangayConfig::default(),
        };
        let manager = Arc::new(LifecycleManager::from_config(&barangay)?);
        let fallback = FallbackQueue::from_config(&barangay.fallback)?.map(Arc::new);
        Ok(Self::with_manager(config, manager, fallback))
    }

    /// Wires prebuilt components; used by tests and embedders.
    pub fn with_manager(
        config: ServerConfig,
        manager: Arc<LifecycleManager>,
        fallback: Option<Arc<FallbackQueue>>,
    ) -> Self {
        let settings = Arc::new(DashMap::new());
        for (key, value) in &config.settings {
            settings.insert(key.clone(), value.clone());
        }
        let metrics = config.metrics_enabled.then(prometheus_handle);
        Self {
            lookup: Arc::new(TrackingLookup::new(Arc::clone(&manager))),
            config: Arc::new(config),
            rate_limiter: Arc::new(DashMap::new()),
            manager,
            fallback,
            settings,
            metrics,
        }
    }

    /// Check if admin key is valid. Every configured key is compared in
    /// constant time.
    pub fn is_valid_admin_key(&self, key: &str) -> bool {
        let mut valid = subtle::Choice::from(0);
        for candidate in &self.config.admin_keys {
            valid |= candidate.as_bytes().ct_eq(key.as_bytes());
        }
        valid.into()
    }

    /// Check rate limit for admin key
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = std::time::Instant::now();
        let window = std::time::Duration::from_secs(60);
        let limit = self.config.rate_limit_per_minute;

        let mut entry = self.rate_limiter.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) > window {
            *count = 0;
            *window_start = now;
        }

        if *count >= limit {
            return false;
        }

        *count += 1;
        true
    }

    /// Creates through the manager, falling back to the local queue on
    /// transient store failures when one is configured.
    pub async fn submit(&self, input: NewRequest) -> ServerResult<SubmitOutcome> {
        match &self.fallback {
            Some(queue) => Ok(queue.submit_or_queue(&self.manager, input).await?),
            None => Ok(SubmitOutcome::Created(self.manager.create(input).await?)),
        }
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
    pub fallback_queue: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(keys: &[&str]) -> ServerState {
        let mut config = ServerConfig::default();
        config.metrics_enabled = false;
        config.rate_limit_per_minute = 2;
        config.admin_keys = keys.iter().map(|k| k.to_string()).collect();
        ServerState::new(config).unwrap()
    }

    #[test]
    fn admin_keys_must_match_exactly() {
        let state = state(&["alpha-key", "beta-key"]);
        assert!(state.is_valid_admin_key("beta-key"));
        assert!(!state.is_valid_admin_key("beta"));
        assert!(!state.is_valid_admin_key(""));
    }

    #[test]
    fn rate_limit_counts_per_key() {
        let state = state(&["k"]);
        assert!(state.check_rate_limit("k"));
        assert!(state.check_rate_limit("k"));
        assert!(!state.check_rate_limit("k"));
        assert!(state.check_rate_limit("other"));
    }

    #[test]
    fn settings_seeded_from_config() {
        let mut config = ServerConfig::default();
        config.metrics_enabled = false;
        config
            .settings
            .insert("barangay_name".into(), serde_json::json!("San Isidro"));
        let state = ServerState::new(config).unwrap();
        assert_eq!(
            state.settings.get("barangay_name").map(|v| v.value().clone()),
            Some(serde_json::json!("San Isidro"))
        );
        assert!(state.fallback.is_none());
    }
}
