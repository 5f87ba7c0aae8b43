use std::env;

use analysis_engine::AnalysisConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub lichess_api_token: Option<String>,
    pub analysis: AnalysisConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            lichess_api_token: env::var("LICHESS_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            analysis: AnalysisConfig::from_env(),
        }
    }
}
