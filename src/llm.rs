//! Implementación Gemini del servicio de análisis y generación.
//!
//! El informe va por Rig (agente de completion). El diagnóstico y los
//! renders van por la API REST `generateContent` con `ureq`: ambos
//! adjuntan las fotos del ambiente como `inlineData`, y Rig no expone
//! ni la entrada multimodal ni la salida de imagen inline de Gemini.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use rig::completion::Prompt;
use serde::Deserialize;
use tracing::warn;

use crate::{
    config::AppConfig,
    decisions::{DecisionStatus, GlobalProjectDecisions, GlobalStatus},
    models::{Diagnosis, DiagnosisResult, PropertyDetails, Room},
    service::PlannerService,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const SYSTEM_INSTRUCTION_BASE: &str = r#"
Actúa como un experto en flipping inmobiliario y Jefe de Obra especializado en Argentina (Flipping Master).
Tu objetivo es generar documentación técnica precisa para contratistas.
Usa terminología local de construcción Argentina.
"#;

/// Palabras que delatan un espacio exterior en el nombre del ambiente.
const OUTDOOR_HINTS: &[&str] = &[
    "patio", "jardin", "jardín", "terraza", "balcon", "balcón", "fondo", "parque",
];

/// Gestor de llamadas a Gemini.
#[derive(Debug, Clone)]
pub struct GeminiManager {
    api_key: String,
    model_fast: String,
    model_reasoning: String,
    model_image: String,
}

/// Sobre JSON que devuelve el modelo de diagnóstico.
#[derive(Debug, Default, Deserialize)]
struct DiagnosisEnvelope {
    #[serde(default, rename = "structuredAnalysis")]
    structured_analysis: Option<DiagnosisResult>,
}

impl GeminiManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            api_key: cfg.gemini_api_key.clone(),
            model_fast: cfg.model_fast.clone(),
            model_reasoning: cfg.model_reasoning.clone(),
            model_image: cfg.model_image.clone(),
        }
    }

    fn build_diagnosis_prompt(room: &Room, property: &PropertyDetails) -> String {
        let name_lower = room.name.to_lowercase();
        let outdoor_context = if OUTDOOR_HINTS.iter().any(|hint| name_lower.contains(hint)) {
            "ATENCIÓN: ESPACIO EXTERIOR. Evalúa paisajismo, solados exterior, impermeabilización y parrillas."
        } else {
            ""
        };

        format!(
            r#"Analiza este ambiente: "{name}".
Notas del relevamiento: {description}.
Propiedad: {ptype} en {city}. Nivel: {level}.
Superficies: Cubierta {covered}m2, Semi {semi}m2, Libre {open}m2.
Dimensiones del ambiente: {area}m2.
{outdoor_context}

TAREA (JSON):
{{
  "structuredAnalysis": {{
    "generalState": "Resumen técnico.",
    "pathologies": "Humedad, grietas, etc.",
    "ageSuggestionElectric": "Recambio si >40 años.",
    "ageSuggestionPlumbing": "Recambio si >40 años.",
    "interventions": [{{"id":"1", "task":"Tarea", "materials":"Material", "roiJustification":"Valor"}}]
  }}
}}"#,
            name = room.name,
            description = room.description,
            ptype = property.property_type,
            city = property.city,
            level = property.renovation_level,
            covered = property.area_covered,
            semi = property.area_semi,
            open = property.area_open,
            area = room.area,
        )
    }

    fn build_plan_prompt(
        rooms: &[Room],
        property: &PropertyDetails,
        decisions: &GlobalProjectDecisions,
    ) -> String {
        let mut global_context = String::from("### DECISIONES GLOBALES\n");
        if decisions.electricity == GlobalStatus::Approved {
            global_context.push_str("- Electricidad: Recambio total norma AEA.\n");
        }
        if decisions.plumbing == GlobalStatus::Approved {
            global_context.push_str("- Plomería: Recambio total termofusión.\n");
        }
        if decisions.painting == GlobalStatus::Approved {
            global_context.push_str("- Pintura: Integral en toda la propiedad.\n");
        }
        if decisions.skirting == GlobalStatus::Approved {
            global_context.push_str("- Zócalos: Recambio completo.\n");
        }
        if decisions.flooring == GlobalStatus::Approved {
            global_context.push_str(&format!(
                "- Pisos: Unificado con material: {}.\n",
                decisions.flooring_material
            ));
        }

        let mut rooms_context = String::from("### AMBIENTES RELEVADOS\n");
        for room in rooms {
            rooms_context.push_str(&format!("#### {} ({} m2)\n", room.name, room.area));
            if let Diagnosis::Succeeded { result } = &room.diagnosis {
                for intervention in &result.interventions {
                    let verdict = match room.decisions.get(&intervention.id) {
                        Some(d) if d.status == DecisionStatus::Approved => "APROBADA".to_string(),
                        Some(d) if d.status == DecisionStatus::Rejected => "RECHAZADA".to_string(),
                        Some(d) if d.status == DecisionStatus::Modified => format!(
                            "MODIFICADA ({})",
                            d.modification_note.as_deref().unwrap_or("")
                        ),
                        _ => "PENDIENTE".to_string(),
                    };
                    rooms_context.push_str(&format!(
                        "- [{verdict}] {} — {}\n",
                        intervention.task, intervention.materials
                    ));
                }
            }
        }

        format!(
            r#"Genera un INFORME TÉCNICO DE OBRA para {address}.
Fecha del relevamiento: {date}.
SUPERFICIES: Cubierta {covered}m2, Semicubierta {semi}m2, Descubierta {open}m2.
{global_context}
{rooms_context}
Analiza si hay cambios entre Plano Actual y Plano Reforma para incluir demoliciones.
Detalla tareas por ambiente y por gremio. Omite las intervenciones rechazadas."#,
            address = property.address,
            date = Utc::now().format("%d/%m/%Y"),
            covered = property.area_covered,
            semi = property.area_semi,
            open = property.area_open,
        )
    }

    /// Cuerpo de la petición de diagnóstico: todas las fotos del
    /// ambiente como `inlineData` seguidas del prompt de texto.
    fn build_diagnosis_body(room: &Room, property: &PropertyDetails) -> serde_json::Value {
        let mut parts: Vec<serde_json::Value> = room
            .slots
            .iter()
            .map(|slot| {
                serde_json::json!({
                    "inlineData": {
                        "mimeType": slot.source.mime_type,
                        "data": Self::base64_payload(&slot.source.data),
                    }
                })
            })
            .collect();
        parts.push(serde_json::json!({ "text": Self::build_diagnosis_prompt(room, property) }));

        serde_json::json!({
            "contents": [{ "parts": parts }],
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION_BASE }] },
            "generationConfig": { "responseMimeType": "application/json" }
        })
    }

    fn build_render_prompt(instruction: &str, decisions: &GlobalProjectDecisions) -> String {
        let mut aesthetic_rules = String::new();
        if decisions.flooring == GlobalStatus::Approved {
            let material = if decisions.flooring_material.is_empty() {
                "Porcelanato Simil Madera"
            } else {
                decisions.flooring_material.as_str()
            };
            aesthetic_rules.push_str(&format!("REGLA PISOS: Usa obligatoriamente {material}. "));
        }
        if decisions.painting == GlobalStatus::Approved {
            aesthetic_rules.push_str("REGLA PAREDES: Pintura nueva, acabado liso impecable. ");
        }

        let instruction = if instruction.is_empty() {
            "Remodelar según diagnóstico"
        } else {
            instruction
        };

        format!(
            r#"Visualizador arquitectónico.
{aesthetic_rules}
INSTRUCCIONES ESPECÍFICAS: "{instruction}".
CONSERVA LA PERSPECTIVA. Estilo moderno argentino."#
        )
    }

    /// Llamada REST a `generateContent` del modelo indicado. Corre en
    /// `spawn_blocking` porque `ureq` es síncrono.
    async fn generate_content_rest(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{GEMINI_API_BASE}/models/{model}:generateContent");
        let api_key = self.api_key.clone();

        let json = tokio::task::spawn_blocking(move || -> Result<serde_json::Value> {
            let agent = ureq::Agent::new_with_defaults();
            let resp = agent
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .header("content-type", "application/json")
                .send_json(body)?;
            let json: serde_json::Value = resp.into_body().read_json()?;
            Ok(json)
        })
        .await??;

        Ok(json)
    }

    /// Recorta los cercos de código que el modelo a veces añade alrededor
    /// del JSON.
    fn strip_json_fences(response: &str) -> &str {
        response
            .trim()
            .trim_start_matches("```json")
            .trim_end_matches("```")
            .trim()
    }

    /// Extrae la parte base64 de un data URL; si no lo es, devuelve el
    /// contenido tal cual.
    fn base64_payload(data: &str) -> &str {
        data.splitn(2, ',').nth(1).unwrap_or(data)
    }
}

#[async_trait]
impl PlannerService for GeminiManager {
    async fn diagnose(&self, room: &Room, property: &PropertyDetails) -> Result<DiagnosisResult> {
        let body = Self::build_diagnosis_body(room, property);
        let json = self.generate_content_rest(&self.model_fast, body).await?;

        let response = json["candidates"][0]["content"]["parts"]
            .as_array()
            .and_then(|parts| parts.iter().find_map(|part| part["text"].as_str()))
            .ok_or_else(|| anyhow!("La respuesta del diagnóstico no contiene texto"))?;

        let json_response = Self::strip_json_fences(response);
        let envelope: DiagnosisEnvelope = serde_json::from_str(json_response).map_err(|e| {
            anyhow!("No se pudo parsear el JSON de diagnóstico: {e}. Respuesta: '{response}'")
        })?;

        envelope
            .structured_analysis
            .ok_or_else(|| anyhow!("La respuesta del modelo no contiene structuredAnalysis"))
    }

    async fn generate_plan(
        &self,
        rooms: &[Room],
        property: &PropertyDetails,
        decisions: &GlobalProjectDecisions,
    ) -> Result<String> {
        use rig::client::CompletionClient as _;
        use rig::providers::gemini;

        let client = gemini::Client::from_env();
        let agent = client
            .agent(&self.model_reasoning)
            .preamble(SYSTEM_INSTRUCTION_BASE)
            .build();

        let prompt = Self::build_plan_prompt(rooms, property, decisions);
        let plan = agent.prompt(prompt).await?;
        Ok(plan)
    }

    async fn generate_render(
        &self,
        room: &Room,
        slot_index: usize,
        instruction: &str,
        decisions: &GlobalProjectDecisions,
    ) -> Option<String> {
        let Some(slot) = room.slots.get(slot_index) else {
            warn!(
                "Render pedido sobre un slot inexistente ({}/{}).",
                slot_index,
                room.slots.len()
            );
            return None;
        };

        let prompt = Self::build_render_prompt(instruction, decisions);
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": slot.source.mime_type,
                            "data": Self::base64_payload(&slot.source.data),
                        }
                    },
                    { "text": prompt }
                ]
            }]
        });

        let json = match self.generate_content_rest(&self.model_image, body).await {
            Ok(json) => json,
            Err(err) => {
                warn!("Falló el render de '{}' (slot {slot_index}): {err}", room.name);
                return None;
            }
        };

        // Primera parte de la respuesta con imagen inline → data URL.
        let parts = json["candidates"][0]["content"]["parts"].as_array()?;
        for part in parts {
            if let Some(inline) = part.get("inlineData") {
                if let Some(data) = inline["data"].as_str() {
                    let mime = inline["mimeType"].as_str().unwrap_or("image/png");
                    return Some(format!("data:{mime};base64,{data}"));
                }
            }
        }
        None
    }
}
