// ── Runtime vehicle configuration ──
//
// These types describe *what* to poll and *how* to act for one vehicle.
// They carry credential data and policy flags, but never touch disk.
// The CLI (or any host) constructs a `VehicleConfig` and hands it in.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use secrecy::{ExposeSecret, SecretString};
use tessly_api::TransportConfig;

use crate::discovery::DEFAULT_STREAMING_BASE;
use crate::reconcile::CleanupPolicy;
use crate::store::ObjectId;

/// Default REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.tessie.com";
/// Default REST poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Where the overview link tree lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkTreePlacement {
    /// No overview tree is maintained.
    Disabled,
    /// Directly under the vehicle's instance category.
    #[default]
    InstanceRoot,
    /// Under an arbitrary host category.
    Under(ObjectId),
}

/// Configuration for one vehicle instance.
#[derive(Debug, Clone)]
pub struct VehicleConfig {
    /// REST base URL (e.g. `https://api.tessie.com`).
    pub api_base: String,
    /// Bearer token. Without it polls are skipped and actions fail.
    pub token: Option<SecretString>,
    pub vin: Option<String>,
    /// REST poll period. Zero disables the timer.
    pub poll_interval: Duration,
    /// Accept streaming frames.
    pub telemetry_enabled: bool,
    /// Streaming base URL; the VIN and token are appended per vehicle.
    pub streaming_base: String,
    /// Streaming token, when it differs from `token`.
    pub telemetry_token: Option<SecretString>,
    pub wake_before_commands: bool,
    pub wait_for_completion: bool,
    pub link_tree: LinkTreePlacement,
    pub cleanup: CleanupPolicy,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            api_base: DEFAULT_API_BASE.into(),
            token: None,
            vin: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            telemetry_enabled: true,
            streaming_base: DEFAULT_STREAMING_BASE.into(),
            telemetry_token: None,
            wake_before_commands: false,
            wait_for_completion: true,
            link_tree: LinkTreePlacement::default(),
            cleanup: CleanupPolicy::default(),
            connect_timeout: transport.connect_timeout,
            timeout: transport.timeout,
        }
    }
}

impl VehicleConfig {
    /// Transport settings for the REST client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: self.connect_timeout,
            timeout: self.timeout,
        }
    }

    /// The VIN, if set and non-blank.
    pub fn vin(&self) -> Option<&str> {
        self.vin.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// The REST token, if set and non-blank.
    pub fn token(&self) -> Option<&SecretString> {
        self.token
            .as_ref()
            .filter(|t| !t.expose_secret().trim().is_empty())
    }

    /// Token for the streaming URL: the dedicated one, else the REST token.
    pub fn streaming_token(&self) -> Option<&SecretString> {
        self.telemetry_token
            .as_ref()
            .filter(|t| !t.expose_secret().trim().is_empty())
            .or_else(|| self.token())
    }
}

// ── Config sources ───────────────────────────────────────────────────

/// Read access to the current configuration. The engine calls `load()`
/// at the start of every operation and never caches the result.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Arc<VehicleConfig>;
}

/// Swappable configuration; `store()` takes effect on the next operation.
#[derive(Debug)]
pub struct SharedConfig {
    current: ArcSwap<VehicleConfig>,
}

impl SharedConfig {
    pub fn new(config: VehicleConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
        }
    }

    pub fn store(&self, config: VehicleConfig) {
        self.current.store(Arc::new(config));
    }
}

impl ConfigSource for SharedConfig {
    fn load(&self) -> Arc<VehicleConfig> {
        self.current.load_full()
    }
}
