use std::{collections::HashMap, io::ErrorKind, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast::error::RecvError};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use heater_common::{
    Active, BridgeConfig, ConnectionError, HeatingCoolingMode, TemperatureDisplayUnits,
};

use crate::{
    accessory::{AccessoryEvent, ThermostatAccessory},
    command_bridge,
    link::DeviceLink,
    registry::DeviceRegistry,
    simulated::SimulatedLink,
};

#[derive(Clone)]
struct AppState {
    registry: Arc<DeviceRegistry>,
}

struct ConfigStore {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::from_env();
    let mut config = store
        .load()
        .await
        .with_context(|| format!("failed to load bridge config from {}", store.path.display()))?;

    if let Some(port) = std::env::var("HEATER_BRIDGE_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.http_port = port;
    }

    let registry = DeviceRegistry::build(&config, |device| {
        Arc::new(SimulatedLink::new(device.id.clone())) as Arc<dyn DeviceLink>
    })
    .context("invalid device configuration")?;

    if registry.is_empty() {
        warn!("no devices configured in {}", store.path.display());
    } else {
        info!("registered {} devices", registry.len());
    }
    for accessory in registry.iter() {
        info!(
            "accessory {} ({}) uuid {}",
            accessory.name(),
            accessory.device_id(),
            accessory.info().uuid
        );
    }

    let registry = Arc::new(registry);
    let loops = registry.start_all();
    spawn_accessory_event_log(&registry);

    let app = router(AppState {
        registry: Arc::clone(&registry),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind http service at {addr}"))?;

    info!("Starting http service on port: {}", config.http_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.stop_all();
    for handle in loops {
        if let Err(err) = handle.await {
            warn!("reconciliation task ended abnormally: {err}");
        }
    }
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/devices", get(handle_get_devices))
        .route("/api/devices/{id}", get(handle_get_device))
        .route("/api/devices/{id}/active", post(handle_set_active))
        .route("/api/devices/{id}/target", post(handle_set_target))
        .route("/api/devices/{id}/mode", post(handle_set_mode))
        .route("/api/devices/{id}/units", post(handle_set_units))
        .fallback(handle_command)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn spawn_accessory_event_log(registry: &DeviceRegistry) {
    for accessory in registry.iter() {
        let mut events = accessory.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AccessoryEvent::ActiveChanged { device_id, warming }) => {
                        debug!("accessory {device_id}: active -> {warming}");
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

/// Command bridge: every path not claimed by the API lands here, raw.
async fn handle_command(State(state): State<AppState>, uri: Uri) -> impl IntoResponse {
    Json(command_bridge::handle(&state.registry, uri.path()).await)
}

async fn handle_get_devices(State(state): State<AppState>) -> impl IntoResponse {
    let mut statuses = Vec::with_capacity(state.registry.len());
    for accessory in state.registry.iter() {
        statuses.push(accessory.status().await);
    }
    Json(statuses)
}

async fn handle_get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match lookup(&state, &id) {
        Ok(accessory) => Json(accessory.status().await).into_response(),
        Err(response) => response,
    }
}

async fn handle_set_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let accessory = match lookup(&state, &id) {
        Ok(accessory) => accessory,
        Err(response) => return response,
    };
    let value = match params.get("value").map(String::as_str) {
        Some("1") | Some("true") => Active::Active,
        Some("0") | Some("false") => Active::Inactive,
        Some(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid active value"),
        None => return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter"),
    };

    let result = accessory.set_active(value).await;
    status_after(accessory, result).await
}

async fn handle_set_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let accessory = match lookup(&state, &id) {
        Ok(accessory) => accessory,
        Err(response) => return response,
    };
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(target) = value.parse::<f32>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature value");
    };
    if !target.is_finite() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature value");
    }

    let result = accessory.set_target_temperature(target).await;
    status_after(accessory, result).await
}

async fn handle_set_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let accessory = match lookup(&state, &id) {
        Ok(accessory) => accessory,
        Err(response) => return response,
    };
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };

    let mode = match value.to_ascii_uppercase().as_str() {
        "OFF" => HeatingCoolingMode::Off,
        "HEAT" => HeatingCoolingMode::Heat,
        "COOL" => HeatingCoolingMode::Cool,
        "AUTO" => HeatingCoolingMode::Auto,
        other => match other.parse::<u8>().ok().and_then(HeatingCoolingMode::from_u8) {
            Some(mode) => mode,
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid mode. Use 'OFF', 'HEAT', 'COOL' or 'AUTO'",
                )
            }
        },
    };

    let result = accessory.set_target_heating_cooling_state(mode).await;
    status_after(accessory, result).await
}

async fn handle_set_units(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let accessory = match lookup(&state, &id) {
        Ok(accessory) => accessory,
        Err(response) => return response,
    };
    let units = match params.get("value").map(String::as_str) {
        Some("C") | Some("c") => TemperatureDisplayUnits::Celsius,
        Some("F") | Some("f") => TemperatureDisplayUnits::Fahrenheit,
        Some(other) => match other
            .parse::<u8>()
            .ok()
            .and_then(TemperatureDisplayUnits::from_u8)
        {
            Some(units) => units,
            None => {
                return error_response(StatusCode::BAD_REQUEST, "Invalid units. Use 'C' or 'F'")
            }
        },
        None => return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter"),
    };

    accessory.set_display_units(units);
    Json(accessory.status().await).into_response()
}

fn lookup(
    state: &AppState,
    id: &str,
) -> Result<Arc<ThermostatAccessory>, axum::response::Response> {
    state
        .registry
        .get(id)
        .map(Arc::clone)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Unknown device id"))
}

async fn status_after(
    accessory: Arc<ThermostatAccessory>,
    result: Result<(), ConnectionError>,
) -> axum::response::Response {
    if let Err(err) = result {
        warn!("device {} command failed: {err}", accessory.device_id());
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Device unreachable");
    }
    Json(accessory.status().await).into_response()
}

impl ConfigStore {
    fn from_env() -> Self {
        let path = std::env::var("HEATER_BRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.heater-bridge/config.json"));
        Self { path }
    }

    async fn load(&self) -> anyhow::Result<BridgeConfig> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(serde_json::from_slice::<BridgeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    "bridge config {} not found, using defaults",
                    self.path.display()
                );
                Ok(BridgeConfig::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
