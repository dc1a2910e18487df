//! Generación de renders por slot. Cada invocación opera sobre un par
//! (ambiente, índice de slot) y mantiene su propio flag de ocupado y su
//! propia celda de resultado, así varios renders pueden estar en vuelo
//! a la vez sin pisarse. Volver a pedir un slot ya poblado es un
//! "regenerar": el resultado anterior se sobreescribe sin historial.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    service::PlannerService,
    store::{self, SharedProject},
};

/// Genera (o regenera) el render del slot indicado. El flag de ocupado
/// del slot queda en alto durante todo el tramo entre el pedido y el
/// commit; los demás slots del mismo ambiente no se tocan. Un índice
/// fuera de rango se descarta con un aviso, nunca es un pánico.
pub async fn render_slot(
    project: SharedProject,
    planner: Arc<dyn PlannerService>,
    room_id: String,
    slot_index: usize,
) {
    // Marcar el slot ocupado y tomar la instantánea para la llamada.
    let (room_snapshot, instruction, decisions) = {
        let mut guard = project.lock().unwrap();
        let decisions = guard.global_decisions.clone();
        let Some(room) = guard.room_mut(&room_id) else {
            warn!("Se pidió un render para un ambiente inexistente: {room_id}");
            return;
        };
        let Some(slot) = room.slots.get_mut(slot_index) else {
            warn!(
                "Se pidió el slot {} de '{}' pero el ambiente tiene {} imágenes.",
                slot_index,
                room.name,
                room.slots.len()
            );
            return;
        };
        slot.busy = true;
        let instruction = slot.instruction.clone();
        (room.clone(), instruction, decisions)
    };

    let result = planner
        .generate_render(&room_snapshot, slot_index, &instruction, &decisions)
        .await;

    if result.is_none() {
        info!(
            "El render de '{}' (slot {}) no produjo imagen.",
            room_snapshot.name, slot_index
        );
    }

    // Commit acotado al slot pedido; si el ambiente fue borrado con la
    // llamada en vuelo, se descarta sin error.
    store::update_room(&project, &room_id, |room| {
        if let Some(slot) = room.slots.get_mut(slot_index) {
            slot.result = result;
            slot.busy = false;
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::sync::Notify;

    use super::*;
    use crate::{
        models::{FileData, Room},
        service::testing::ScriptedPlanner,
        store::{update_room, with_project, Project},
    };

    fn project_with_room(image_count: usize) -> (SharedProject, String) {
        let project = Project::shared();
        let id = with_project(&project, |p| {
            let mut room = Room::new("Living", "");
            for i in 0..image_count {
                room.add_image(FileData::from_upload(
                    &format!("foto{i}.jpg"),
                    format!("datos{i}"),
                ));
            }
            let id = room.id.clone();
            p.add_room(room);
            id
        });
        (project, id)
    }

    #[tokio::test]
    async fn el_render_se_escribe_solo_en_su_slot() {
        let (project, room_id) = project_with_room(2);
        let planner = ScriptedPlanner::shared();

        render_slot(project.clone(), planner.clone(), room_id.clone(), 1).await;

        with_project(&project, |p| {
            let room = p.room(&room_id).unwrap();
            assert!(room.slots[0].result.is_none());
            assert!(!room.slots[0].busy);
            assert!(room.slots[1].result.is_some());
            assert!(!room.slots[1].busy);
        });
    }

    #[tokio::test]
    async fn dos_renders_en_vuelo_no_se_pisan() {
        let (project, room_id) = project_with_room(2);
        let gate = Arc::new(Notify::new());
        let planner = ScriptedPlanner::gated(gate.clone());

        let t0 = tokio::spawn(render_slot(
            project.clone(),
            planner.clone() as Arc<dyn PlannerService>,
            room_id.clone(),
            0,
        ));
        let t1 = tokio::spawn(render_slot(
            project.clone(),
            planner.clone() as Arc<dyn PlannerService>,
            room_id.clone(),
            1,
        ));

        // Esperar a que ambos renders estén suspendidos en la llamada
        // externa, con sus dos flags en alto a la vez.
        while planner.render_calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        with_project(&project, |p| {
            let room = p.room(&room_id).unwrap();
            assert!(room.slots[0].busy);
            assert!(room.slots[1].busy);
            assert!(room.slots[0].result.is_none());
            assert!(room.slots[1].result.is_none());
        });

        gate.notify_waiters();
        t0.await.unwrap();
        t1.await.unwrap();

        with_project(&project, |p| {
            let room = p.room(&room_id).unwrap();
            assert_eq!(
                room.slots[0].result.as_deref(),
                Some(format!("render:{room_id}:0:").as_str())
            );
            assert_eq!(
                room.slots[1].result.as_deref(),
                Some(format!("render:{room_id}:1:").as_str())
            );
            assert!(!room.slots[0].busy);
            assert!(!room.slots[1].busy);
        });
    }

    #[tokio::test]
    async fn regenerar_sobreescribe_el_resultado_anterior() {
        let (project, room_id) = project_with_room(1);
        let planner = ScriptedPlanner::shared();

        render_slot(project.clone(), planner.clone(), room_id.clone(), 0).await;
        let primero = with_project(&project, |p| {
            p.room(&room_id).unwrap().slots[0].result.clone()
        });

        update_room(&project, &room_id, |room| {
            room.slots[0].instruction = "más luz natural".to_string();
        });
        render_slot(project.clone(), planner.clone(), room_id.clone(), 0).await;

        with_project(&project, |p| {
            let result = p.room(&room_id).unwrap().slots[0].result.clone();
            assert_ne!(result, primero);
            assert_eq!(
                result.as_deref(),
                Some(format!("render:{room_id}:0:más luz natural").as_str())
            );
        });
    }

    #[tokio::test]
    async fn un_slot_fuera_de_rango_se_descarta_sin_llamada_externa() {
        let (project, room_id) = project_with_room(1);
        let planner = ScriptedPlanner::shared();

        render_slot(project.clone(), planner.clone(), room_id.clone(), 5).await;

        assert_eq!(planner.render_calls.load(Ordering::SeqCst), 0);
        with_project(&project, |p| {
            let room = p.room(&room_id).unwrap();
            assert!(room.slots[0].result.is_none());
            assert!(!room.slots[0].busy);
        });
    }

    #[tokio::test]
    async fn el_commit_de_un_ambiente_borrado_se_descarta() {
        let (project, room_id) = project_with_room(1);
        let gate = Arc::new(Notify::new());
        let planner = ScriptedPlanner::gated(gate.clone());

        let task = tokio::spawn(render_slot(
            project.clone(),
            planner.clone() as Arc<dyn PlannerService>,
            room_id.clone(),
            0,
        ));
        while planner.render_calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }

        with_project(&project, |p| assert!(p.remove_room(&room_id)));
        gate.notify_waiters();
        task.await.unwrap();

        with_project(&project, |p| assert!(p.rooms.is_empty()));
    }
}
