//! Almacén de entidades del proyecto: única fuente de verdad, mutada
//! siempre con actualizaciones acotadas por id para que dos commits en
//! vuelo (p. ej. dos renders de ambientes distintos) no se pisen.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::{
    decisions::GlobalProjectDecisions,
    models::{PropertyDetails, Room},
    workflow::Stage,
};

/// Estado completo del proyecto compartido entre coordinadores.
pub type SharedProject = Arc<Mutex<Project>>;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub stage: Stage,
    pub property: Option<PropertyDetails>,
    pub rooms: Vec<Room>,
    pub global_decisions: GlobalProjectDecisions,
    pub plan: String,
}

impl Project {
    pub fn shared() -> SharedProject {
        Arc::new(Mutex::new(Project::default()))
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    pub fn room_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.id == room_id)
    }

    pub fn add_room(&mut self, room: Room) {
        self.rooms.push(room);
    }

    /// Elimina un ambiente por id. Devuelve `false` si no existía.
    pub fn remove_room(&mut self, room_id: &str) -> bool {
        let before = self.rooms.len();
        self.rooms.retain(|r| r.id != room_id);
        self.rooms.len() < before
    }
}

/// Ejecuta `f` con el proyecto bloqueado. El lock nunca cruza un await.
pub fn with_project<T>(project: &SharedProject, f: impl FnOnce(&mut Project) -> T) -> T {
    let mut guard = project.lock().unwrap();
    f(&mut guard)
}

/// Actualización acotada: localiza el ambiente por id y aplica `f` sólo
/// sobre ese registro, dejando el resto de la colección intacta. Si el
/// ambiente ya no existe (fue borrado con una llamada en vuelo), el
/// commit se descarta en silencio.
pub fn update_room(project: &SharedProject, room_id: &str, f: impl FnOnce(&mut Room)) {
    let mut guard = project.lock().unwrap();
    if let Some(room) = guard.room_mut(room_id) {
        f(room);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_room_solo_toca_el_ambiente_indicado() {
        let project = Project::shared();
        let (id_a, id_b) = with_project(&project, |p| {
            let a = Room::new("Living", "");
            let b = Room::new("Cocina", "");
            let ids = (a.id.clone(), b.id.clone());
            p.add_room(a);
            p.add_room(b);
            ids
        });

        update_room(&project, &id_a, |room| room.is_analyzing = true);

        with_project(&project, |p| {
            assert!(p.room(&id_a).unwrap().is_analyzing);
            assert!(!p.room(&id_b).unwrap().is_analyzing);
        });
    }

    #[test]
    fn update_room_sobre_ambiente_borrado_es_no_op() {
        let project = Project::shared();
        let id = with_project(&project, |p| {
            let room = Room::new("Baño", "");
            let id = room.id.clone();
            p.add_room(room);
            id
        });

        with_project(&project, |p| assert!(p.remove_room(&id)));
        // No debe entrar en pánico ni crear nada nuevo.
        update_room(&project, &id, |room| room.is_analyzing = true);
        with_project(&project, |p| assert!(p.rooms.is_empty()));
    }
}
