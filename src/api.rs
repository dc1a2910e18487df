use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::spawn;
use tracing::{error, info};

use crate::{
    app_state::AppState,
    decisions::{self, DecisionStatus, GlobalArea},
    diagnosis,
    models::{FileData, FloorPlanContext, PropertyDetails, Room},
    render, report,
    store::{update_room, with_project},
    workflow,
};

// --- Payloads de la API ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImagePayload {
    filename: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomPayload {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    length: String,
    #[serde(default)]
    width: String,
    #[serde(default)]
    area: String,
    #[serde(default)]
    is_irregular: bool,
    #[serde(default)]
    images: Vec<UploadImagePayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomIdPayload {
    room_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionsPayload {
    room_id: String,
    #[serde(default)]
    length: String,
    #[serde(default)]
    width: String,
    #[serde(default)]
    area: String,
    #[serde(default)]
    is_irregular: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionDecisionPayload {
    room_id: String,
    intervention_id: String,
    status: DecisionStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationNotePayload {
    room_id: String,
    intervention_id: String,
    #[serde(default)]
    note: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalTogglePayload {
    area: GlobalArea,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlooringMaterialPayload {
    material: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    room_id: String,
    slot_index: usize,
    /// Si viene, se guarda como instrucción del slot antes de renderizar.
    instruction: Option<String>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(err: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() })))
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/onboarding", post(onboarding_handler))
        .route("/api/floorplan", post(floorplan_handler))
        .route("/api/rooms", post(create_room_handler))
        .route("/api/rooms/remove", post(remove_room_handler))
        .route("/api/rooms/dimensions", post(dimensions_handler))
        .route("/api/diagnosis/start", post(start_diagnosis_handler))
        .route("/api/diagnosis/add-rooms", post(add_more_rooms_handler))
        .route("/api/decisions/intervention", post(intervention_decision_handler))
        .route("/api/decisions/note", post(modification_note_handler))
        .route("/api/decisions/global", post(global_toggle_handler))
        .route("/api/decisions/flooring-material", post(flooring_material_handler))
        .route("/api/render", post(render_handler))
        .route("/api/report", post(report_handler))
        .route("/api/demo", post(demo_handler))
        .route("/api/state", get(state_handler))
        .route("/api/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers de etapas ---

#[axum::debug_handler]
async fn onboarding_handler(
    State(state): State<AppState>,
    Json(payload): Json<PropertyDetails>,
) -> Result<impl IntoResponse, ApiError> {
    with_project(&state.project, |p| workflow::complete_onboarding(p, payload))
        .map_err(bad_request)?;
    Ok((StatusCode::OK, Json(json!({ "message": "Propiedad registrada." }))))
}

#[axum::debug_handler]
async fn floorplan_handler(
    State(state): State<AppState>,
    Json(payload): Json<FloorPlanContext>,
) -> Result<impl IntoResponse, ApiError> {
    with_project(&state.project, |p| workflow::complete_floor_plan(p, payload))
        .map_err(bad_request)?;
    Ok((StatusCode::OK, Json(json!({ "message": "Contexto de planos registrado." }))))
}

#[axum::debug_handler]
async fn demo_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    with_project(&state.project, workflow::fast_forward).map_err(bad_request)?;
    info!("Modo demo activado: salto directo a resultados.");
    Ok((StatusCode::OK, Json(json!({ "message": "Modo demo activado." }))))
}

// --- Handlers de ambientes ---

#[axum::debug_handler]
async fn create_room_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(bad_request("El ambiente necesita un nombre."));
    }

    let mut room = Room::new(&payload.name, &payload.description);
    room.set_dimensions(
        &payload.length,
        &payload.width,
        &payload.area,
        payload.is_irregular,
    );
    for image in payload.images {
        room.add_image(FileData::from_upload(&image.filename, image.data));
    }

    let room_id = room.id.clone();
    with_project(&state.project, |p| p.add_room(room));
    Ok(Json(json!({ "roomId": room_id })))
}

#[axum::debug_handler]
async fn remove_room_handler(
    State(state): State<AppState>,
    Json(payload): Json<RoomIdPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = with_project(&state.project, |p| p.remove_room(&payload.room_id));
    if !removed {
        return Err(bad_request("No existe un ambiente con ese id."));
    }
    Ok((StatusCode::OK, Json(json!({ "message": "Ambiente eliminado." }))))
}

#[axum::debug_handler]
async fn dimensions_handler(
    State(state): State<AppState>,
    Json(payload): Json<DimensionsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    update_room(&state.project, &payload.room_id, |room| {
        room.set_dimensions(
            &payload.length,
            &payload.width,
            &payload.area,
            payload.is_irregular,
        );
    });
    Ok(StatusCode::OK)
}

// --- Handlers de diagnóstico ---

#[axum::debug_handler]
async fn start_diagnosis_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    with_project(&state.project, workflow::enter_diagnosis).map_err(bad_request)?;

    spawn(async move {
        {
            let mut status = state.status.lock().unwrap();
            status.is_busy = true;
            status.message = "Iniciando diagnóstico...".to_string();
            status.progress = 0.0;
        }

        let result = diagnosis::run_diagnosis_pass(
            state.project.clone(),
            state.planner.clone(),
            state.status.clone(),
        )
        .await;

        let mut status = state.status.lock().unwrap();
        status.is_busy = false;
        status.progress = 0.0;
        match result {
            Ok(summary) => {
                status.message = format!("¡Diagnóstico completado! {summary}");
            }
            Err(err) => {
                status.message = format!("Error en el diagnóstico: {err}");
                error!("Error en la pasada de diagnóstico: {err}");
            }
        }
    });

    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn add_more_rooms_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    with_project(&state.project, workflow::back_to_rooms).map_err(bad_request)?;
    Ok(StatusCode::OK)
}

// --- Handlers de decisiones ---

#[axum::debug_handler]
async fn intervention_decision_handler(
    State(state): State<AppState>,
    Json(payload): Json<InterventionDecisionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if !matches!(payload.status, DecisionStatus::Approved | DecisionStatus::Rejected) {
        return Err(bad_request(
            "Una intervención sólo puede aprobarse o rechazarse directamente.",
        ));
    }
    update_room(&state.project, &payload.room_id, |room| {
        decisions::set_status(&mut room.decisions, &payload.intervention_id, payload.status);
    });
    Ok(StatusCode::OK)
}

#[axum::debug_handler]
async fn modification_note_handler(
    State(state): State<AppState>,
    Json(payload): Json<ModificationNotePayload>,
) -> Result<impl IntoResponse, ApiError> {
    update_room(&state.project, &payload.room_id, |room| {
        decisions::set_modification_note(&mut room.decisions, &payload.intervention_id, &payload.note);
    });
    Ok(StatusCode::OK)
}

#[axum::debug_handler]
async fn global_toggle_handler(
    State(state): State<AppState>,
    Json(payload): Json<GlobalTogglePayload>,
) -> Result<impl IntoResponse, ApiError> {
    with_project(&state.project, |p| p.global_decisions.toggle(payload.area));
    Ok(StatusCode::OK)
}

#[axum::debug_handler]
async fn flooring_material_handler(
    State(state): State<AppState>,
    Json(payload): Json<FlooringMaterialPayload>,
) -> Result<impl IntoResponse, ApiError> {
    with_project(&state.project, |p| {
        p.global_decisions.set_flooring_material(&payload.material)
    })
    .map_err(bad_request)?;
    Ok(StatusCode::OK)
}

// --- Handlers de renders e informe ---

#[axum::debug_handler]
async fn render_handler(
    State(state): State<AppState>,
    Json(payload): Json<RenderPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(instruction) = payload.instruction {
        update_room(&state.project, &payload.room_id, |room| {
            if let Some(slot) = room.slots.get_mut(payload.slot_index) {
                slot.instruction = instruction;
            }
        });
    }

    // Cada render corre como tarea independiente: varios slots pueden
    // estar en vuelo a la vez.
    spawn(render::render_slot(
        state.project.clone(),
        state.planner.clone(),
        payload.room_id,
        payload.slot_index,
    ));

    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn report_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match report::compose_report(&state.project, &state.planner).await {
        Ok(plan) => Ok(Json(json!({ "plan": plan }))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Hubo un error generando el reporte final: {e}") })),
        )),
    }
}

// --- Handlers de estado y apagado ---

#[axum::debug_handler]
async fn state_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = with_project(&state.project, |p| p.clone());
    Json(serde_json::to_value(snapshot).unwrap_or_else(|_| json!({})))
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<crate::app_state::Status> {
    Json(state.status.lock().unwrap().clone())
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}
