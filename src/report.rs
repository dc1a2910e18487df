//! Composición del informe final: una única llamada externa con todo el
//! relevamiento. Si falla, no hay salida parcial: el error sube al
//! llamador y el proyecto queda intacto para reintentar.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::{
    service::PlannerService,
    store::SharedProject,
    workflow::{self, Stage},
};

/// Genera el informe técnico y, sólo si la llamada tiene éxito, lo
/// registra y avanza la etapa a resultados.
pub async fn compose_report(
    project: &SharedProject,
    planner: &Arc<dyn PlannerService>,
) -> Result<String> {
    let (rooms, property, decisions) = {
        let guard = project.lock().unwrap();
        if guard.stage != Stage::Diagnosis {
            return Err(anyhow!(
                "El informe sólo puede generarse desde la etapa de diagnóstico"
            ));
        }
        let property = guard
            .property
            .clone()
            .ok_or_else(|| anyhow!("No hay propiedad registrada"))?;
        (guard.rooms.clone(), property, guard.global_decisions.clone())
    };

    let plan = planner.generate_plan(&rooms, &property, &decisions).await?;

    {
        let mut guard = project.lock().unwrap();
        workflow::complete_report(&mut guard, plan.clone())?;
    }
    info!("Informe técnico generado ({} caracteres).", plan.len());
    Ok(plan)
}
