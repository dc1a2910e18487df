//! Frontera con el servicio externo de análisis y generación. Los
//! coordinadores sólo conocen este contrato; la implementación real
//! (Gemini) vive en `llm.rs`.

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    decisions::GlobalProjectDecisions,
    models::{DiagnosisResult, PropertyDetails, Room},
};

/// Operaciones del consultor externo consumidas por los coordinadores.
#[async_trait]
pub trait PlannerService: Send + Sync {
    /// Analiza un ambiente en el contexto de la propiedad y devuelve el
    /// diagnóstico estructurado.
    async fn diagnose(&self, room: &Room, property: &PropertyDetails) -> Result<DiagnosisResult>;

    /// Genera el informe técnico final a partir de todo el relevamiento
    /// y las decisiones tomadas.
    async fn generate_plan(
        &self,
        rooms: &[Room],
        property: &PropertyDetails,
        decisions: &GlobalProjectDecisions,
    ) -> Result<String>;

    /// Genera el render de un slot de un ambiente. Por contrato nunca
    /// falla: un resultado ausente significa "no se produjo imagen".
    async fn generate_render(
        &self,
        room: &Room,
        slot_index: usize,
        instruction: &str,
        decisions: &GlobalProjectDecisions,
    ) -> Option<String>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Planner guionado para los tests de coordinadores: cuenta las
    //! llamadas, registra los argumentos del informe y puede demorar los
    //! renders hasta que el test los libere.

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;
    use crate::models::Intervention;

    #[derive(Default)]
    pub struct ScriptedPlanner {
        pub diagnose_calls: AtomicUsize,
        pub plan_calls: AtomicUsize,
        pub render_calls: AtomicUsize,
        /// Ids de ambientes cuyo diagnóstico debe fallar.
        pub fail_rooms: HashSet<String>,
        /// Argumentos recibidos por cada llamada a `generate_plan`.
        pub seen_plans: Mutex<Vec<(Vec<Room>, GlobalProjectDecisions)>>,
        /// Si está presente, cada render espera a que el test lo libere.
        pub render_gate: Option<Arc<Notify>>,
        /// Ídem para los diagnósticos.
        pub diagnose_gate: Option<Arc<Notify>>,
    }

    impl ScriptedPlanner {
        pub fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn failing_for(room_ids: impl IntoIterator<Item = String>) -> Arc<Self> {
            Arc::new(Self {
                fail_rooms: room_ids.into_iter().collect(),
                ..Self::default()
            })
        }

        pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                render_gate: Some(gate),
                ..Self::default()
            })
        }

        pub fn gated_diagnose(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                diagnose_gate: Some(gate),
                ..Self::default()
            })
        }

        pub fn sample_diagnosis(room: &Room) -> DiagnosisResult {
            DiagnosisResult {
                general_state: format!("Estado general de {}", room.name),
                interventions: vec![
                    Intervention {
                        id: "i1".to_string(),
                        task: "Pintura general".to_string(),
                        ..Intervention::default()
                    },
                    Intervention {
                        id: "i2".to_string(),
                        task: "Recambio de pisos".to_string(),
                        ..Intervention::default()
                    },
                ],
                ..DiagnosisResult::default()
            }
        }
    }

    #[async_trait]
    impl PlannerService for ScriptedPlanner {
        async fn diagnose(
            &self,
            room: &Room,
            _property: &PropertyDetails,
        ) -> Result<DiagnosisResult> {
            self.diagnose_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.diagnose_gate {
                gate.notified().await;
            }
            if self.fail_rooms.contains(&room.id) {
                return Err(anyhow::anyhow!("fallo guionado"));
            }
            Ok(Self::sample_diagnosis(room))
        }

        async fn generate_plan(
            &self,
            rooms: &[Room],
            _property: &PropertyDetails,
            decisions: &GlobalProjectDecisions,
        ) -> Result<String> {
            self.plan_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_plans
                .lock()
                .unwrap()
                .push((rooms.to_vec(), decisions.clone()));
            Ok("# Informe de prueba".to_string())
        }

        async fn generate_render(
            &self,
            room: &Room,
            slot_index: usize,
            instruction: &str,
            _decisions: &GlobalProjectDecisions,
        ) -> Option<String> {
            self.render_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.render_gate {
                gate.notified().await;
            }
            Some(format!("render:{}:{}:{}", room.id, slot_index, instruction))
        }
    }
}
