#![allow(clippy::unwrap_used)]
// End-to-end tests for `Vehicle` against a wiremock Tessie API.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tessly_api::{TessieClient, TransportConfig};
use tessly_core::ident::{category_identifier, make_identifier};
use tessly_core::reconcile::OVERVIEW_NAME;
use tessly_core::{
    LinkTreePlacement, MemoryStore, ObjectId, ObjectKind, ObjectStore, Scalar, SharedConfig,
    UpdateOutcome, Vehicle, VehicleConfig, discover,
};

const VIN: &str = "5YJ3E1EA7KF000001";

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    server: MockServer,
    store: Arc<MemoryStore>,
    config: Arc<SharedConfig>,
    vehicle: Vehicle,
}

fn config_for(server: &MockServer) -> VehicleConfig {
    VehicleConfig {
        api_base: server.uri(),
        token: Some(SecretString::from("test-token")),
        vin: Some(VIN.into()),
        ..VehicleConfig::default()
    }
}

async fn setup() -> Harness {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let root = store.create_category(ObjectId::ROOT, "TESSIE_1").unwrap();
    let config = Arc::new(SharedConfig::new(config_for(&server)));
    let vehicle = Vehicle::new(config.clone(), store.clone(), root);
    Harness {
        server,
        store,
        config,
        vehicle,
    }
}

fn value_of(h: &Harness, identifier: &str) -> Option<Scalar> {
    let id = h.store.find_by_identifier(h.vehicle.root(), identifier)?;
    match h.store.describe(id)?.kind {
        ObjectKind::Point { value, .. } => value,
        _ => None,
    }
}

fn snapshot() -> Value {
    json!({
        "response": {
            "vin": VIN,
            "state": "online",
            "display_name": "Roadrunner",
            "charge_state": {
                "battery_level": 80,
                "battery_range": 241.3,
                "charging_state": "Charging",
                "charge_limit_soc": 90,
                "charge_current_request": 16,
                "scheduled_charging_start_time": null
            },
            "climate_state": { "inside_temp": 21.5, "is_climate_on": false },
            "vehicle_state": { "locked": true, "odometer": 12345.6 }
        }
    })
}

async fn mount_snapshot(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/1/vehicles/{VIN}/vehicle_data")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_builds_points_and_syncs_actions() {
    let h = setup().await;
    mount_snapshot(&h.server, snapshot()).await;

    let outcome = h.vehicle.update().await;
    let UpdateOutcome::Applied { batch, overview } = outcome else {
        panic!("poll not applied: {outcome:?}");
    };
    assert!(batch.failures.is_empty(), "{:?}", batch.failures);
    assert!(batch.created >= 10);

    assert_eq!(
        value_of(&h, &make_identifier("rest.charge_state.battery_level")),
        Some(Scalar::Int(80))
    );
    assert_eq!(
        value_of(&h, &make_identifier("rest.vin")),
        Some(Scalar::Str(VIN.into()))
    );
    // Null leaves produce nothing.
    assert_eq!(
        h.store.find_by_identifier(
            h.vehicle.root(),
            &make_identifier("rest.charge_state.scheduled_charging_start_time")
        ),
        None
    );

    assert_eq!(value_of(&h, "act_locked"), Some(Scalar::Bool(true)));
    assert_eq!(value_of(&h, "act_climate"), Some(Scalar::Bool(false)));
    assert_eq!(value_of(&h, "act_charging"), Some(Scalar::Bool(true)));
    assert_eq!(value_of(&h, "act_charge_limit"), Some(Scalar::Int(90)));
    assert_eq!(value_of(&h, "act_charging_amps"), Some(Scalar::Int(16)));

    let overview = overview.unwrap();
    assert!(overview.links.ensured > 0);
    assert_eq!(h.store.describe(overview.tree_root).unwrap().name, OVERVIEW_NAME);
}

#[tokio::test]
async fn test_repeated_polls_do_not_duplicate() {
    let h = setup().await;
    mount_snapshot(&h.server, snapshot()).await;

    h.vehicle.update().await;
    let count = h.store.len();
    let second = h.vehicle.update().await;

    assert!(matches!(second, UpdateOutcome::Applied { ref batch, .. } if batch.created == 0));
    assert_eq!(h.store.len(), count);
}

#[tokio::test]
async fn test_poll_failure_leaves_tree_untouched() {
    let h = setup().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/1/vehicles/{VIN}/vehicle_data")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&h.server)
        .await;

    let outcome = h.vehicle.update().await;
    assert!(matches!(outcome, UpdateOutcome::TransportFailed(_)));
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn test_empty_response_is_reported() {
    let h = setup().await;
    mount_snapshot(&h.server, json!({ "response": null })).await;
    assert_eq!(h.vehicle.update().await, UpdateOutcome::EmptyPayload);
}

// ── Actions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_charge_limit_is_clamped_on_the_wire() {
    let h = setup().await;
    Mock::given(method("POST"))
        .and(path(format!("/{VIN}/command/set_charge_limit")))
        .and(query_param("wait_for_completion", "true"))
        .and(body_json(json!({ "percent": 100 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h
        .vehicle
        .request_action("set_charge_limit", &Scalar::Int(150))
        .await
        .unwrap();

    assert!(outcome.succeeded());
    assert_eq!(value_of(&h, "act_charge_limit"), Some(Scalar::Int(100)));
}

#[tokio::test]
async fn test_charging_amps_floor() {
    let h = setup().await;
    Mock::given(method("POST"))
        .and(path(format!("/{VIN}/command/set_charging_amps")))
        .and(body_json(json!({ "amps": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.vehicle
        .request_action("set_charging_amps", &Scalar::Int(-5))
        .await
        .unwrap();
    assert_eq!(value_of(&h, "act_charging_amps"), Some(Scalar::Int(1)));
}

#[tokio::test]
async fn test_momentary_action_resets_even_on_failure() {
    let h = setup().await;
    Mock::given(method("POST"))
        .and(path(format!("/{VIN}/command/flash_lights")))
        .respond_with(ResponseTemplate::new(500).set_body_string("vehicle unavailable"))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h
        .vehicle
        .request_action("flash", &Scalar::Bool(true))
        .await
        .unwrap();

    assert!(!outcome.succeeded());
    assert_eq!(outcome.reset, Some(Scalar::Bool(false)));
    assert_eq!(value_of(&h, "act_flash"), Some(Scalar::Bool(false)));
}

#[tokio::test]
async fn test_failed_toggle_keeps_optimistic_value() {
    let h = setup().await;
    Mock::given(method("POST"))
        .and(path(format!("/{VIN}/command/unlock")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": false })))
        .mount(&h.server)
        .await;

    let outcome = h
        .vehicle
        .request_action("act_locked", &Scalar::Bool(false))
        .await
        .unwrap();

    assert!(!outcome.succeeded());
    assert_eq!(value_of(&h, "act_locked"), Some(Scalar::Bool(false)));
}

#[tokio::test]
async fn test_wake_before_command() {
    let h = setup().await;
    h.config.store(VehicleConfig {
        wake_before_commands: true,
        wait_for_completion: false,
        ..config_for(&h.server)
    });

    Mock::given(method("GET"))
        .and(path(format!("/{VIN}/status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "asleep" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/{VIN}/wake")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/{VIN}/command/honk")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h
        .vehicle
        .request_action("honk", &Scalar::Bool(true))
        .await
        .unwrap();
    assert!(outcome.succeeded());
}

// ── Link tree placement ─────────────────────────────────────────────

#[tokio::test]
async fn test_link_tree_relocates_on_config_change() {
    let h = setup().await;
    let favorites = h.store.create_category(ObjectId::ROOT, "FAVORITES").unwrap();

    let first = h.vehicle.apply_changes().unwrap().unwrap();
    assert_eq!(h.store.describe(first.tree_root).unwrap().parent, h.vehicle.root());

    h.config.store(VehicleConfig {
        link_tree: LinkTreePlacement::Under(favorites),
        ..config_for(&h.server)
    });
    let moved = h.vehicle.apply_changes().unwrap().unwrap();

    assert_eq!(moved.relocated_from, Some(h.vehicle.root()));
    assert!(h.store.describe(first.tree_root).is_none());
    assert_eq!(
        h.store.find_by_identifier(favorites, &category_identifier("FAVORITES", OVERVIEW_NAME)),
        Some(moved.tree_root)
    );
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_discover_vehicles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "vin": VIN, "last_state": { "display_name": "Roadrunner" } },
                { "vin": "7SAYGDEE0PF000002" }
            ]
        })))
        .mount(&server)
        .await;

    let token = SecretString::from("test-token");
    let client = TessieClient::new(&server.uri(), &token, &TransportConfig::default()).unwrap();
    let vehicles = discover(&client).await.unwrap();

    let names: Vec<_> = vehicles.iter().map(|v| v.display_name.as_str()).collect();
    assert_eq!(names, vec!["Roadrunner", "7SAYGDEE0PF000002"]);
}
