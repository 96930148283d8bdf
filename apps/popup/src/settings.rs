use std::{collections::HashMap, fs};

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend_url: String,
    pub database_url: String,
    pub page_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: dispatcher::DEFAULT_BACKEND_URL.to_string(),
            database_url: "sqlite://./data/popup.db".into(),
            page_url: None,
        }
    }
}

/// Defaults, overridden by `popup.toml` when present, overridden by
/// environment variables. CLI flags are layered on top by the caller.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("popup.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("backend_url") {
                settings.backend_url = v.clone();
            }
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("page_url") {
                settings.page_url = Some(v.clone());
            }
        }
    }

    if let Ok(v) = std::env::var("PAGELENS_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Ok(v) = std::env::var("PAGELENS_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("PAGELENS_PAGE_URL") {
        settings.page_url = Some(v);
    }

    settings
}
