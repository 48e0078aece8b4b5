// ── Vehicle instance ──
//
// Lifecycle for one vehicle: REST polling on a timer, telemetry frames
// from the stream, user actions back to the car. All tree mutations of an
// instance go through one lock, so a poll and a frame never interleave.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use strum::IntoEnumIterator;
use tessly_api::{ReconnectConfig, StreamHandle, TessieClient};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::command::{
    Action, CommandOutcome, action_state_from_rest, action_state_from_telemetry, plan,
    send_command,
};
use crate::config::{ConfigSource, LinkTreePlacement, VehicleConfig};
use crate::discovery::streaming_url;
use crate::error::CoreError;
use crate::flatten::flatten;
use crate::model::{Origin, Scalar};
use crate::reconcile::{BatchReport, OverviewReport, PointFailure, Reconciler, sync_overview};
use crate::store::{ObjectId, ObjectInfo, ObjectKind, ObjectStore, descendants};
use crate::telemetry::decode_frame;

// ── Reports ──────────────────────────────────────────────────────────

/// What one REST poll did.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Token or VIN missing; nothing was requested.
    NotConfigured,
    /// The request failed; the tree was left untouched.
    TransportFailed(String),
    /// The response held no vehicle data.
    EmptyPayload,
    Applied {
        batch: BatchReport,
        overview: Option<OverviewReport>,
    },
}

/// What one telemetry frame did.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Telemetry is switched off for this vehicle.
    Disabled,
    /// Undecodable, out-of-band, or empty.
    Ignored,
    /// Addressed to another VIN.
    OtherVehicle,
    Applied {
        batch: BatchReport,
        overview: Option<OverviewReport>,
    },
}

/// Result of a user action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub action: Action,
    /// Value written to the action point before dispatch.
    pub value: Scalar,
    /// The remote command, if one was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandOutcome>,
    /// Value written back after dispatch (momentary actions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<Scalar>,
}

impl DispatchOutcome {
    /// `false` only when a command was sent and not confirmed.
    pub fn succeeded(&self) -> bool {
        self.command.as_ref().is_none_or(|c| c.success)
    }
}

// ── Vehicle ──────────────────────────────────────────────────────────

/// One vehicle bound to a subtree of an object store.
///
/// Cheaply cloneable via `Arc<VehicleInner>`. Configuration is read from
/// the [`ConfigSource`] at the start of every operation.
#[derive(Clone)]
pub struct Vehicle {
    inner: Arc<VehicleInner>,
}

struct VehicleInner {
    config: Arc<dyn ConfigSource>,
    store: Arc<dyn ObjectStore>,
    root: ObjectId,
    /// Serializes polls so a slow one is never overlapped by the next tick.
    poll_lock: Mutex<()>,
    /// Serializes every mutation of this instance's subtree.
    apply_lock: std::sync::Mutex<()>,
    dispatch_lock: Mutex<()>,
    last_update: watch::Sender<Option<DateTime<Utc>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Vehicle {
    /// Bind a vehicle to the instance category `root`. Does NOT start
    /// anything; call [`start()`](Self::start) for background work.
    pub fn new(
        config: Arc<dyn ConfigSource>,
        store: Arc<dyn ObjectStore>,
        root: ObjectId,
    ) -> Self {
        let (last_update, _) = watch::channel(None);
        Self {
            inner: Arc::new(VehicleInner {
                config,
                store,
                root,
                poll_lock: Mutex::new(()),
                apply_lock: std::sync::Mutex::new(()),
                dispatch_lock: Mutex::new(()),
                last_update,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> Arc<VehicleConfig> {
        self.inner.config.load()
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.store
    }

    pub fn root(&self) -> ObjectId {
        self.inner.root
    }

    /// Time of the last applied poll or frame.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_update.borrow()
    }

    pub fn subscribe_updates(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.last_update.subscribe()
    }

    // ── Setup ────────────────────────────────────────────────────────

    /// Create the action points and (re)place the overview tree.
    /// Safe to call again after a configuration change.
    pub fn apply_changes(&self) -> Result<Option<OverviewReport>, CoreError> {
        let config = self.inner.config.load();
        let _guard = self.lock_tree();
        let rec = self.reconciler();

        for action in Action::iter() {
            rec.ensure_action_point(action)?;
        }
        debug!(root = %self.inner.root, "Action points ensured");
        Ok(overview(&rec, &config))
    }

    // ── REST polling ─────────────────────────────────────────────────

    /// Poll the REST snapshot once and apply it. Never fails: problems are
    /// logged and reported in the outcome.
    pub async fn update(&self) -> UpdateOutcome {
        let _poll = self.inner.poll_lock.lock().await;
        let config = self.inner.config.load();

        let (Some(token), Some(vin)) = (config.token(), config.vin()) else {
            debug!("Token or VIN not configured, skipping poll");
            return UpdateOutcome::NotConfigured;
        };

        let payload = match TessieClient::new(&config.api_base, token, &config.transport()) {
            Ok(client) => client.vehicle_data(vin).await,
            Err(e) => Err(e),
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                warn!(vin, error = %e, "Vehicle data request failed");
                return UpdateOutcome::TransportFailed(e.to_string());
            }
        };

        let payload = match payload {
            Value::Object(mut map) if map.contains_key("response") => map
                .remove("response")
                .unwrap_or(Value::Null),
            other => other,
        };
        if payload.as_object().is_none_or(serde_json::Map::is_empty) {
            debug!(vin, "Vehicle data response was empty");
            return UpdateOutcome::EmptyPayload;
        }

        let signals = flatten(&payload, Origin::Rest.prefix());
        let actions = action_state_from_rest(&payload);
        let (batch, overview) = self.apply(&config, signals, actions, true);
        info!(
            vin,
            applied = batch.applied,
            created = batch.created,
            failed = batch.failures.len(),
            "Vehicle data applied"
        );
        UpdateOutcome::Applied { batch, overview }
    }

    // ── Telemetry ────────────────────────────────────────────────────

    /// Apply one raw streaming frame.
    pub fn receive_frame(&self, raw: &[u8]) -> FrameOutcome {
        let config = self.inner.config.load();
        if !config.telemetry_enabled {
            return FrameOutcome::Disabled;
        }
        let Some(frame) = decode_frame(raw) else {
            return FrameOutcome::Ignored;
        };
        if let Some(vin) = config.vin() {
            if frame.is_for_other_vehicle(vin) {
                debug!(frame_vin = ?frame.vin, "Frame for another vehicle, dropping");
                return FrameOutcome::OtherVehicle;
            }
        }

        let actions = action_state_from_telemetry(&frame.signals);
        let prefix = Origin::Telemetry.prefix();
        let signals = frame
            .into_signals_with_metadata()
            .into_iter()
            .map(|(key, value)| (format!("{prefix}.{key}"), value));

        let (batch, overview) = self.apply(&config, signals, actions, false);
        trace!(applied = batch.applied, created = batch.created, "Frame applied");
        FrameOutcome::Applied { batch, overview }
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Dispatch a user action by identifier (`act_locked`, `lock`,
    /// `set_charge_limit`, ...).
    ///
    /// The action point takes the requested (clamped) value before the
    /// command is sent and keeps it whatever the outcome; momentary
    /// actions are reset afterwards regardless of the outcome.
    pub async fn request_action(
        &self,
        ident: &str,
        requested: &Scalar,
    ) -> Result<DispatchOutcome, CoreError> {
        let action: Action = ident.parse().map_err(|_| CoreError::UnknownAction {
            ident: ident.to_owned(),
        })?;

        let config = self.inner.config.load();
        let token = config.token().ok_or_else(|| CoreError::Config {
            message: "no API token configured".into(),
        })?;
        let vin = config.vin().ok_or_else(|| CoreError::Config {
            message: "no VIN configured".into(),
        })?;
        let client = TessieClient::new(&config.api_base, token, &config.transport())?;

        let planned = plan(action, requested);
        let _dispatch = self.inner.dispatch_lock.lock().await;

        self.write_action(action, &planned.optimistic)?;

        let command = match &planned.command {
            Some(call) => Some(
                send_command(
                    &client,
                    vin,
                    call,
                    config.wait_for_completion,
                    config.wake_before_commands,
                )
                .await,
            ),
            None => {
                debug!(action = %action, "Nothing to send");
                None
            }
        };

        if let Some(reset) = &planned.reset {
            if let Err(e) = self.write_action(action, reset) {
                warn!(action = %action, error = %e, "Failed to reset momentary action");
            }
        }

        Ok(DispatchOutcome {
            action,
            value: planned.optimistic,
            command,
            reset: planned.reset,
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Set up the tree, run the first poll, and spawn the refresh timer
    /// and the telemetry stream.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.apply_changes()?;
        let initial = self.update().await;
        debug!(?initial, "Initial poll finished");

        let config = self.inner.config.load();
        let mut handles = self.inner.task_handles.lock().await;

        if !config.poll_interval.is_zero() {
            let vehicle = self.clone();
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(refresh_task(
                vehicle,
                config.poll_interval,
                cancel,
            )));
        }

        if config.telemetry_enabled {
            match stream_url(&config) {
                Ok(Some(url)) => {
                    let vehicle = self.clone();
                    let cancel = self.inner.cancel.clone();
                    handles.push(tokio::spawn(stream_task(vehicle, url, cancel)));
                }
                Ok(None) => debug!("Streaming token or VIN missing, telemetry not started"),
                Err(e) => warn!(error = %e, "Invalid streaming configuration"),
            }
        }

        info!(root = %self.inner.root, "Vehicle started");
        Ok(())
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("Vehicle stopped");
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Every point under the instance root, in tree order.
    pub fn points_snapshot(&self) -> Vec<ObjectInfo> {
        descendants(self.inner.store.as_ref(), self.inner.root)
            .into_iter()
            .filter(|info| matches!(info.kind, ObjectKind::Point { .. }))
            .collect()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.inner.store.as_ref(), self.inner.root)
    }

    fn lock_tree(&self) -> std::sync::MutexGuard<'_, ()> {
        self.inner
            .apply_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn apply<I>(
        &self,
        config: &VehicleConfig,
        signals: I,
        actions: Vec<(Action, Scalar)>,
        always_sync_overview: bool,
    ) -> (BatchReport, Option<OverviewReport>)
    where
        I: IntoIterator<Item = (String, Scalar)>,
    {
        let _guard = self.lock_tree();
        let rec = self.reconciler();

        let mut batch = rec.apply_signals(signals);
        for (action, value) in actions {
            if let Err(error) = rec.write_action(action, &value) {
                warn!(action = %action, error = %error, "Failed to sync action state");
                batch.failures.push(PointFailure {
                    path: action.path(),
                    error,
                });
            }
        }

        let overview = if always_sync_overview || batch.created > 0 {
            overview(&rec, config)
        } else {
            None
        };

        self.inner.last_update.send_replace(Some(Utc::now()));
        (batch, overview)
    }

    fn write_action(&self, action: Action, value: &Scalar) -> Result<(), CoreError> {
        let _guard = self.lock_tree();
        self.reconciler().write_action(action, value)?;
        Ok(())
    }
}

fn overview(rec: &Reconciler<'_>, config: &VehicleConfig) -> Option<OverviewReport> {
    let parent = match config.link_tree {
        LinkTreePlacement::Disabled => return None,
        LinkTreePlacement::InstanceRoot => rec.root(),
        LinkTreePlacement::Under(parent) => parent,
    };
    match sync_overview(rec, parent, config.cleanup) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!(parent = %parent, error = %e, "Overview sync failed");
            None
        }
    }
}

fn stream_url(config: &VehicleConfig) -> Result<Option<Url>, CoreError> {
    let (Some(token), Some(vin)) = (config.streaming_token(), config.vin()) else {
        return Ok(None);
    };
    streaming_url(&config.streaming_base, vin, token.expose_secret()).map(Some)
}

// ── Background tasks ─────────────────────────────────────────────────

/// Poll on a fixed period until cancelled.
async fn refresh_task(vehicle: Vehicle, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // the initial poll already ran

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let outcome = vehicle.update().await;
                trace!(?outcome, "Periodic poll finished");
            }
        }
    }
}

/// Feed stream frames into the vehicle one at a time, in arrival order.
async fn stream_task(vehicle: Vehicle, url: Url, cancel: CancellationToken) {
    let mut stream = StreamHandle::connect(url, ReconnectConfig::default(), cancel.child_token());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = stream.next_frame() => {
                let Some(frame) = frame else { break };
                let outcome = vehicle.receive_frame(frame.as_bytes());
                trace!(?outcome, "Frame processed");
            }
        }
    }

    stream.shutdown();
    debug!("Telemetry stream task exited");
}
