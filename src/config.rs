//! Carga y gestión de configuración de la aplicación (servidor + Gemini).

use anyhow::{anyhow, Result};
use std::env;

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,

    pub gemini_api_key: String,
    /// Modelo rápido para el diagnóstico por ambiente.
    pub model_fast: String,
    /// Modelo de razonamiento para el informe técnico.
    pub model_reasoning: String,
    /// Modelo de generación de imágenes para los renders.
    pub model_image: String,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("Falta GEMINI_API_KEY en el entorno"))?;

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3323".to_string());

        let model_fast =
            env::var("GEMINI_MODEL_FAST").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let model_reasoning = env::var("GEMINI_MODEL_REASONING")
            .unwrap_or_else(|_| "gemini-3-pro-preview".to_string());
        let model_image = env::var("GEMINI_MODEL_IMAGE")
            .unwrap_or_else(|_| "gemini-2.5-flash-image".to_string());

        Ok(Self {
            server_addr,
            gemini_api_key,
            model_fast,
            model_reasoning,
            model_image,
        })
    }
}
