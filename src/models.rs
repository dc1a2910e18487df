//! Modelos de dominio del relevamiento (propiedad, ambientes, slots de
//! render y diagnóstico).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decisions::DecisionLedger;

/// Fichero subido por el usuario (foto de ambiente o plano).
/// El contenido se trata siempre como un blob opaco; nunca se decodifica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub id: String,
    pub data: String,
    pub mime_type: String,
}

impl FileData {
    /// Construye un `FileData` a partir de una subida: id único nuevo y
    /// tipo MIME deducido del nombre de fichero.
    pub fn from_upload(filename: &str, data: String) -> Self {
        let mime_type = mime_guess::from_path(filename)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Self {
            id: Uuid::new_v4().to_string(),
            data,
            mime_type,
        }
    }
}

/// Datos de la propiedad relevada. El campo `area` es siempre derivado
/// (suma de las tres superficies); nunca lo fija el usuario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetails {
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(default)]
    pub area: String,
    pub area_covered: String,
    pub area_semi: String,
    pub area_open: String,
    #[serde(default)]
    pub is_argentina: bool,
    pub age: String,
    pub renovation_level: String,
    #[serde(default)]
    pub has_floor_plan: bool,
    #[serde(default)]
    pub floor_plan_current: Option<FileData>,
    #[serde(default)]
    pub floor_plan_remodel: Option<FileData>,
    #[serde(default)]
    pub listing_description: String,
    #[serde(default)]
    pub listing_image: Option<FileData>,
}

impl PropertyDetails {
    /// Recalcula la superficie total como suma de cubierta, semicubierta
    /// y descubierta. Componentes vacíos o inválidos cuentan como cero.
    pub fn recalculate_area(&mut self) {
        let total = parse_or_zero(&self.area_covered)
            + parse_or_zero(&self.area_semi)
            + parse_or_zero(&self.area_open);
        self.area = total.to_string();
    }

    /// Fusiona en sitio el contexto capturado en la etapa de planos.
    pub fn apply_floor_plan_context(&mut self, ctx: FloorPlanContext) {
        self.has_floor_plan = ctx.has_floor_plan;
        self.floor_plan_current = ctx.floor_plan_current;
        self.floor_plan_remodel = ctx.floor_plan_remodel;
        self.listing_description = ctx.listing_description;
        self.listing_image = ctx.listing_image;
    }
}

/// Contexto de planos y publicación capturado tras el onboarding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlanContext {
    pub has_floor_plan: bool,
    #[serde(default)]
    pub floor_plan_current: Option<FileData>,
    #[serde(default)]
    pub floor_plan_remodel: Option<FileData>,
    #[serde(default)]
    pub listing_description: String,
    #[serde(default)]
    pub listing_image: Option<FileData>,
}

/// Una intervención propuesta por el diagnóstico de un ambiente.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub materials: String,
    #[serde(default)]
    pub roi_justification: String,
}

/// Diagnóstico estructurado de un ambiente.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    #[serde(default)]
    pub general_state: String,
    #[serde(default)]
    pub pathologies: String,
    #[serde(default)]
    pub age_suggestion_electric: String,
    #[serde(default)]
    pub age_suggestion_plumbing: String,
    #[serde(default)]
    pub interventions: Vec<Intervention>,
}

/// Resultado del diagnóstico de un ambiente como variante explícita.
/// Un fallo es un desenlace terminal para ese ambiente: no se reintenta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Diagnosis {
    #[default]
    Pending,
    Succeeded {
        result: DiagnosisResult,
    },
    Failed {
        message: String,
    },
}

impl Diagnosis {
    /// El ambiente ya tiene un desenlace (éxito o fallo) y no debe
    /// volver a analizarse.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Diagnosis::Pending)
    }
}

/// Unidad posicional de trabajo de render dentro de un ambiente: una
/// imagen original, su resultado opcional, su flag de ocupado y la
/// instrucción personalizada. Agrupar los cuatro campos en un registro
/// hace imposible que las secuencias se desalineen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSlot {
    pub source: FileData,
    pub result: Option<String>,
    pub busy: bool,
    #[serde(default)]
    pub instruction: String,
}

impl RenderSlot {
    pub fn new(source: FileData) -> Self {
        Self {
            source,
            result: None,
            busy: false,
            instruction: String::new(),
        }
    }
}

/// Un ambiente de la propiedad con sus imágenes, diagnóstico y
/// decisiones sobre intervenciones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub slots: Vec<RenderSlot>,
    #[serde(default)]
    pub diagnosis: Diagnosis,
    #[serde(default)]
    pub is_analyzing: bool,
    #[serde(default)]
    pub decisions: DecisionLedger,
    #[serde(default)]
    pub length: String,
    #[serde(default)]
    pub width: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub is_irregular: bool,
}

impl Room {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            ..Self::default()
        }
    }

    /// Añade una imagen original creando su slot de render vacío.
    pub fn add_image(&mut self, file: FileData) {
        self.slots.push(RenderSlot::new(file));
    }

    /// Fija las dimensiones del ambiente. Con planta regular la
    /// superficie se deriva como largo × ancho a dos decimales; con
    /// planta irregular se toma el valor manual tal cual.
    pub fn set_dimensions(&mut self, length: &str, width: &str, manual_area: &str, is_irregular: bool) {
        self.length = length.to_string();
        self.width = width.to_string();
        self.is_irregular = is_irregular;
        self.area = if is_irregular {
            manual_area.to_string()
        } else {
            let derived = parse_or_zero(length) * parse_or_zero(width);
            format!("{derived:.2}")
        };
    }
}

/// Interpreta un campo numérico de formulario; vacío o inválido vale cero.
fn parse_or_zero(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(0.0)
}
