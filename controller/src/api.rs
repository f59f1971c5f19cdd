use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use homeclimate_common::{Button, FanMode, OperatingMode, SensorRegistry, StateDocument};
use serde::Serialize;
use tracing::warn;

use crate::daemon::monotonic_ms;
use crate::store::StateStore;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<SensorRegistry>,
    pub store: StateStore,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/state", get(handle_get_state))
        .route("/button", post(handle_button))
        .with_state(state)
}

async fn handle_get_state(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state_document(&state).await)
}

/// Accepts a single command token; anything unrecognized is rejected at
/// this boundary and never reaches the control engine.
async fn handle_button(State(state): State<ApiState>, body: String) -> axum::response::Response {
    let Some(button) = Button::parse(&body) else {
        warn!("rejecting malformed button request {body:?}");
        return error_response(StatusCode::BAD_REQUEST, "unrecognized button");
    };

    match button {
        Button::TargetUp => {
            // No bounds on the target, by longstanding household decree.
            state.store.apply(|s| s.target_temp += 1).await;
        }
        Button::TargetDown => {
            state.store.apply(|s| s.target_temp -= 1).await;
        }
        Button::FanAuto => {
            state.store.apply(|s| s.fan_mode = FanMode::Auto).await;
        }
        Button::FanOn => {
            state.store.apply(|s| s.fan_mode = FanMode::On).await;
        }
        Button::ModeCool => {
            state.store.apply(|s| s.mode = OperatingMode::Cool).await;
        }
        Button::ModeHeat => {
            state.store.apply(|s| s.mode = OperatingMode::Heat).await;
        }
        Button::ModeOff => {
            state.store.apply(|s| s.mode = OperatingMode::Off).await;
        }
        Button::ToggleSensor(name) => {
            if let Err(err) = state.registry.toggle_eligibility(&name) {
                warn!("rejecting button request: {err}");
                return error_response(StatusCode::BAD_REQUEST, "unrecognized button");
            }
        }
    }

    Json(state_document(&state).await).into_response()
}

async fn state_document(state: &ApiState) -> StateDocument {
    let control = state.store.snapshot().await;
    let sensors = state.registry.readings(monotonic_ms());
    StateDocument {
        mode: control.mode,
        fan_mode: control.fan_mode,
        target_temp: control.target_temp,
        average_temp: control.average_temp,
        status: control.status,
        duty_cycle_1h: control.duty_cycle_1h,
        duty_cycle_24h: control.duty_cycle_24h,
        current_run_ms: control.current_run_ms,
        last_run_ms: control.last_run_ms,
        hold_active: monotonic_ms() < control.hold_until_ms,
        sensors,
        last_update: Utc::now().to_rfc3339(),
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
