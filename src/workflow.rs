//! Máquina de estados del flujo de relevamiento:
//! onboarding → floorplan → rooms → diagnosis → results,
//! con la vuelta atrás "agregar ambientes" desde diagnosis y el atajo
//! de demostración directo a results.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::{
    decisions::{self, DecisionStatus},
    models::{Diagnosis, DiagnosisResult, FloorPlanContext, Intervention, PropertyDetails, Room},
    store::Project,
};

/// Etapa actual del flujo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Onboarding,
    Floorplan,
    Rooms,
    Diagnosis,
    Results,
}

/// Cierra el onboarding: registra la propiedad (con superficie total
/// recalculada) y avanza a la etapa de planos.
pub fn complete_onboarding(project: &mut Project, mut property: PropertyDetails) -> Result<()> {
    if project.stage != Stage::Onboarding {
        return Err(anyhow!("El onboarding sólo puede completarse desde la etapa inicial"));
    }
    property.recalculate_area();
    project.property = Some(property);
    project.stage = Stage::Floorplan;
    Ok(())
}

/// Cierra la etapa de planos fusionando el contexto sobre la propiedad
/// existente (nunca la reemplaza entera) y avanza a la carga de ambientes.
pub fn complete_floor_plan(project: &mut Project, ctx: FloorPlanContext) -> Result<()> {
    if project.stage != Stage::Floorplan {
        return Err(anyhow!("El contexto de planos sólo puede cargarse en la etapa de planos"));
    }
    let property = project
        .property
        .as_mut()
        .ok_or_else(|| anyhow!("No hay propiedad registrada"))?;
    property.apply_floor_plan_context(ctx);
    project.stage = Stage::Rooms;
    Ok(())
}

/// Entra en la etapa de diagnóstico. Sin ambientes cargados la etapa de
/// carga es un callejón sin salida: no se permite avanzar.
pub fn enter_diagnosis(project: &mut Project) -> Result<()> {
    if project.stage != Stage::Rooms {
        return Err(anyhow!("El diagnóstico sólo puede iniciarse desde la carga de ambientes"));
    }
    if project.rooms.is_empty() {
        return Err(anyhow!("Agregue al menos un ambiente antes de iniciar el diagnóstico"));
    }
    project.stage = Stage::Diagnosis;
    Ok(())
}

/// Vuelta atrás explícita para agregar más ambientes, conservando los
/// existentes y sus diagnósticos.
pub fn back_to_rooms(project: &mut Project) -> Result<()> {
    if project.stage != Stage::Diagnosis {
        return Err(anyhow!("Sólo puede volverse a la carga de ambientes desde el diagnóstico"));
    }
    project.stage = Stage::Rooms;
    Ok(())
}

/// Registra el informe final y avanza a resultados. Es la única arista
/// de diagnosis a results fuera del modo demo.
pub fn complete_report(project: &mut Project, plan: String) -> Result<()> {
    if project.stage != Stage::Diagnosis {
        return Err(anyhow!("El informe sólo puede registrarse desde la etapa de diagnóstico"));
    }
    project.plan = plan;
    project.stage = Stage::Results;
    Ok(())
}

/// Atajo de demostración: siembra una propiedad, un ambiente diagnosticado
/// con sus intervenciones aprobadas y un informe de ejemplo, y salta
/// directo a resultados sin ninguna llamada externa.
pub fn fast_forward(project: &mut Project) -> Result<()> {
    if project.stage != Stage::Onboarding {
        return Err(anyhow!("El modo demo sólo está disponible desde la etapa inicial"));
    }

    let mut property = PropertyDetails {
        city: "Palermo Soho, CABA".to_string(),
        address: "Gurruchaga 1500".to_string(),
        property_type: "Departamento".to_string(),
        area_covered: "50".to_string(),
        area_semi: "5".to_string(),
        area_open: "0".to_string(),
        is_argentina: true,
        age: "40".to_string(),
        renovation_level: "Standard Plus".to_string(),
        ..PropertyDetails::default()
    };
    property.recalculate_area();
    project.property = Some(property);

    let mut room = Room::new(
        "Living Comedor",
        "Pisos de parquet gastados, paredes con pintura vieja.",
    );
    room.set_dimensions("5", "3.5", "", false);
    room.diagnosis = Diagnosis::Succeeded {
        result: DiagnosisResult {
            general_state: "Estructuralmente sano, estéticamente obsoleto.".to_string(),
            pathologies: "Desgaste superficial en pisos.".to_string(),
            interventions: vec![
                Intervention {
                    id: "i1".to_string(),
                    task: "Pulido e Hidrolaqueado".to_string(),
                    materials: "Hidrolaca satinada".to_string(),
                    roi_justification: "Alto impacto visual".to_string(),
                },
                Intervention {
                    id: "i2".to_string(),
                    task: "Pintura General".to_string(),
                    materials: "Látex lavable premium".to_string(),
                    roi_justification: "Esencial".to_string(),
                },
            ],
            ..DiagnosisResult::default()
        },
    };
    decisions::set_status(&mut room.decisions, "i1", DecisionStatus::Approved);
    decisions::set_status(&mut room.decisions, "i2", DecisionStatus::Approved);
    project.rooms = vec![room];

    project.plan = DEMO_PLAN.to_string();
    project.stage = Stage::Results;
    Ok(())
}

const DEMO_PLAN: &str = r#"# INFORME TÉCNICO PRELIMINAR (MODO DEMO)

## 1. Portada Técnica
- Dirección: Gurruchaga 1500
- Tipo: Departamento
- Superficie: 55 m2 (Cub: 50, Semi: 5)

## 2. Alcance General
Se realizará una puesta en valor estética manteniendo la distribución original.

## 3. Listado Técnico
### Living Comedor
1. Pulido e Hidrolaqueado de pisos.
2. Pintura general muros y cielorrasos (Alba/Sherwin).
"#;
