//! Pasada secuencial de diagnóstico sobre los ambientes del proyecto.
//!
//! La pasada es deliberadamente secuencial (no concurrente): cada
//! llamada externa arrastra contexto caro y paralelizar multiplicaría
//! llamadas limitadas por cuota sin beneficio; además el avance queda
//! visible ambiente a ambiente. Cada commit está acotado a un único
//! ambiente y un fallo nunca aborta la pasada.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tracing::{error, info};

use crate::{
    app_state::Status,
    models::Diagnosis,
    service::PlannerService,
    store::{self, SharedProject},
};

/// Mensaje fijo que queda registrado como desenlace terminal cuando el
/// diagnóstico de un ambiente falla.
pub const DIAGNOSIS_FAILURE_MESSAGE: &str = "Error al analizar este ambiente.";

/// Resumen de una pasada de diagnóstico.
#[derive(Debug, Default)]
pub struct DiagnosisSummary {
    pub rooms_total: u32,
    pub diagnosed: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl std::fmt::Display for DiagnosisSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} ambientes, {} diagnosticados, {} omitidos, {} con error.",
            self.rooms_total, self.diagnosed, self.skipped, self.failed
        )
    }
}

/// Recorre los ambientes en orden de colección y diagnostica los que no
/// tienen desenlace. Un ambiente ya resuelto se omite incondicionalmente,
/// por lo que repetir la pasada no genera llamadas externas adicionales.
pub async fn run_diagnosis_pass(
    project: SharedProject,
    planner: Arc<dyn PlannerService>,
    status: Arc<Mutex<Status>>,
) -> Result<DiagnosisSummary> {
    // Instantánea de ids y propiedad; el estado de cada ambiente se
    // relee bajo lock en su propio turno.
    let (room_ids, property) = {
        let guard = project.lock().unwrap();
        let property = guard
            .property
            .clone()
            .ok_or_else(|| anyhow!("No hay propiedad registrada para diagnosticar"))?;
        let ids: Vec<String> = guard.rooms.iter().map(|r| r.id.clone()).collect();
        (ids, property)
    };

    let mut summary = DiagnosisSummary {
        rooms_total: room_ids.len() as u32,
        ..DiagnosisSummary::default()
    };
    let total = room_ids.len();

    for (index, room_id) in room_ids.iter().enumerate() {
        // Releer el ambiente: pudo haber sido borrado o resuelto desde
        // que se tomó la instantánea de ids.
        let snapshot = {
            let mut guard = project.lock().unwrap();
            match guard.room_mut(room_id) {
                Some(room) if room.diagnosis.is_settled() => {
                    summary.skipped += 1;
                    continue;
                }
                Some(room) => {
                    room.is_analyzing = true;
                    room.clone()
                }
                None => {
                    summary.skipped += 1;
                    continue;
                }
            }
        };

        {
            let mut st = status.lock().unwrap();
            st.message = format!("[{}/{}] Analizando: {}...", index + 1, total, snapshot.name);
            st.progress = (index + 1) as f32 / total as f32;
        }

        match planner.diagnose(&snapshot, &property).await {
            Ok(result) => {
                store::update_room(&project, room_id, |room| {
                    room.diagnosis = Diagnosis::Succeeded { result };
                    room.is_analyzing = false;
                });
                summary.diagnosed += 1;
                info!("Diagnóstico de '{}' completado.", snapshot.name);
            }
            Err(err) => {
                error!("Error diagnosticando '{}': {err}", snapshot.name);
                store::update_room(&project, room_id, |room| {
                    room.diagnosis = Diagnosis::Failed {
                        message: DIAGNOSIS_FAILURE_MESSAGE.to_string(),
                    };
                    room.is_analyzing = false;
                });
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{
        models::{PropertyDetails, Room},
        service::testing::ScriptedPlanner,
        store::{with_project, Project},
    };

    fn project_with_rooms(names: &[&str]) -> (SharedProject, Vec<String>) {
        let project = Project::shared();
        let ids = with_project(&project, |p| {
            p.property = Some(PropertyDetails {
                city: "CABA".to_string(),
                property_type: "Departamento".to_string(),
                area_covered: "50".to_string(),
                area_semi: "5".to_string(),
                area_open: "0".to_string(),
                age: "40".to_string(),
                renovation_level: "Standard".to_string(),
                ..PropertyDetails::default()
            });
            names
                .iter()
                .map(|name| {
                    let room = Room::new(name, "");
                    let id = room.id.clone();
                    p.add_room(room);
                    id
                })
                .collect()
        });
        (project, ids)
    }

    fn status() -> Arc<Mutex<Status>> {
        Arc::new(Mutex::new(Status::default()))
    }

    #[tokio::test]
    async fn repetir_la_pasada_no_genera_llamadas_adicionales() {
        let (project, _) = project_with_rooms(&["Living", "Cocina"]);
        let planner = ScriptedPlanner::shared();

        let first = run_diagnosis_pass(project.clone(), planner.clone(), status())
            .await
            .unwrap();
        assert_eq!(first.diagnosed, 2);
        assert_eq!(planner.diagnose_calls.load(Ordering::SeqCst), 2);

        // Segunda pasada: todos resueltos, cero llamadas externas.
        let second = run_diagnosis_pass(project.clone(), planner.clone(), status())
            .await
            .unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.diagnosed, 0);
        assert_eq!(planner.diagnose_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tras_la_pasada_todo_ambiente_queda_resuelto_y_libre() {
        let (project, ids) = project_with_rooms(&["Living", "Cocina", "Baño"]);
        let planner = ScriptedPlanner::failing_for([ids[1].clone()]);

        let summary = run_diagnosis_pass(project.clone(), planner.clone(), status())
            .await
            .unwrap();
        assert_eq!(summary.diagnosed, 2);
        assert_eq!(summary.failed, 1);

        with_project(&project, |p| {
            for room in &p.rooms {
                assert!(!room.is_analyzing);
                assert!(room.diagnosis.is_settled());
            }
            match &p.room(&ids[1]).unwrap().diagnosis {
                Diagnosis::Failed { message } => {
                    assert_eq!(message, DIAGNOSIS_FAILURE_MESSAGE);
                }
                other => panic!("se esperaba un fallo terminal, no {other:?}"),
            }
        });
    }

    #[tokio::test]
    async fn un_fallo_no_impide_diagnosticar_los_siguientes() {
        let (project, ids) = project_with_rooms(&["Living", "Cocina"]);
        let planner = ScriptedPlanner::failing_for([ids[0].clone()]);

        let summary = run_diagnosis_pass(project.clone(), planner.clone(), status())
            .await
            .unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.diagnosed, 1);

        with_project(&project, |p| {
            assert!(matches!(
                p.room(&ids[1]).unwrap().diagnosis,
                Diagnosis::Succeeded { .. }
            ));
        });
    }

    #[tokio::test]
    async fn un_ambiente_borrado_durante_la_pasada_se_omite() {
        use tokio::sync::Notify;

        let (project, ids) = project_with_rooms(&["Living", "Cocina"]);
        let gate = Arc::new(Notify::new());
        let planner = ScriptedPlanner::gated_diagnose(gate.clone());

        let pass = tokio::spawn(run_diagnosis_pass(
            project.clone(),
            planner.clone(),
            status(),
        ));

        // Esperar a que la pasada esté dentro del primer diagnóstico.
        while planner.diagnose_calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }

        // Borrar el segundo ambiente antes de que llegue su turno.
        with_project(&project, |p| assert!(p.remove_room(&ids[1])));
        gate.notify_waiters();

        let summary = pass.await.unwrap().unwrap();
        assert_eq!(summary.diagnosed, 1);
        assert_eq!(summary.skipped, 1);
        // El ambiente borrado no generó ninguna llamada externa.
        assert_eq!(planner.diagnose_calls.load(Ordering::SeqCst), 1);

        with_project(&project, |p| {
            assert!(matches!(
                p.room(&ids[0]).unwrap().diagnosis,
                Diagnosis::Succeeded { .. }
            ));
        });
    }

    #[tokio::test]
    async fn sin_propiedad_la_pasada_es_un_error() {
        let project = Project::shared();
        let planner = ScriptedPlanner::shared();
        assert!(run_diagnosis_pass(project, planner, status()).await.is_err());
    }
}
