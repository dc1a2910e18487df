use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::{config::AppConfig, service::PlannerService, store::SharedProject};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub planner: Arc<dyn PlannerService>,
    pub project: SharedProject,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

/// Estado de avance de las tareas de fondo (pasada de diagnóstico,
/// generación del informe), consultado por el frontend.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}
