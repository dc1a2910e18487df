//! Libro de decisiones: aprobaciones por intervención dentro de cada
//! ambiente y decisiones globales de infraestructura y terminaciones.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Mapa intervención → decisión dentro de un ambiente.
pub type DecisionLedger = HashMap<String, InterventionDecision>;

/// Estado de decisión sobre una intervención propuesta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Modified,
}

/// Decisión humana sobre una intervención. La nota de modificación
/// sólo existe cuando el estado es `Modified`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionDecision {
    pub status: DecisionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_note: Option<String>,
}

/// Fija directamente el estado de una intervención (aprobar/rechazar),
/// descartando cualquier nota de modificación previa.
pub fn set_status(ledger: &mut DecisionLedger, intervention_id: &str, status: DecisionStatus) {
    let entry = ledger.entry(intervention_id.to_string()).or_default();
    entry.status = status;
    entry.modification_note = None;
}

/// Fija la nota de modificación de una intervención. Una nota con
/// contenido deriva el estado a `Modified`; una nota vacía lo vuelve a
/// `Pending`, pisando cualquier estado anterior.
pub fn set_modification_note(ledger: &mut DecisionLedger, intervention_id: &str, note: &str) {
    let entry = ledger.entry(intervention_id.to_string()).or_default();
    if note.trim().is_empty() {
        entry.status = DecisionStatus::Pending;
        entry.modification_note = None;
    } else {
        entry.status = DecisionStatus::Modified;
        entry.modification_note = Some(note.to_string());
    }
}

/// Estado de una decisión global (sin variante `Modified`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Rubros con decisión global a nivel proyecto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalArea {
    Electricity,
    Plumbing,
    Painting,
    Skirting,
    Flooring,
}

/// Decisiones globales de infraestructura y terminaciones del proyecto.
/// El material de pisos sólo tiene sentido con `flooring` aprobado.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalProjectDecisions {
    pub electricity: GlobalStatus,
    pub plumbing: GlobalStatus,
    pub painting: GlobalStatus,
    pub skirting: GlobalStatus,
    pub flooring: GlobalStatus,
    #[serde(default)]
    pub flooring_material: String,
}

impl GlobalProjectDecisions {
    fn slot_mut(&mut self, area: GlobalArea) -> &mut GlobalStatus {
        match area {
            GlobalArea::Electricity => &mut self.electricity,
            GlobalArea::Plumbing => &mut self.plumbing,
            GlobalArea::Painting => &mut self.painting,
            GlobalArea::Skirting => &mut self.skirting,
            GlobalArea::Flooring => &mut self.flooring,
        }
    }

    /// Alterna una decisión global: la primera pulsación aprueba; a
    /// partir de ahí alterna aprobado ⇄ rechazado sin pasar de nuevo
    /// por pendiente.
    pub fn toggle(&mut self, area: GlobalArea) {
        let slot = self.slot_mut(area);
        *slot = match *slot {
            GlobalStatus::Approved => GlobalStatus::Rejected,
            GlobalStatus::Pending | GlobalStatus::Rejected => GlobalStatus::Approved,
        };
    }

    /// Fija el material de pisos unificado. Sólo válido mientras la
    /// decisión de pisos esté aprobada.
    pub fn set_flooring_material(&mut self, material: &str) -> Result<()> {
        if self.flooring != GlobalStatus::Approved {
            return Err(anyhow!(
                "El material de pisos sólo puede fijarse con la decisión de pisos aprobada"
            ));
        }
        self.flooring_material = material.to_string();
        Ok(())
    }
}
