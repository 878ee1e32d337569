use std::{collections::HashMap, fs, path::PathBuf};

#[derive(Debug)]
pub struct Settings {
    pub backend_url: String,
    pub data_dir: PathBuf,
    pub poll_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8090".into(),
            data_dir: PathBuf::from("./data"),
            poll_interval_secs: 5,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("desktop.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("backend_url") {
                settings.backend_url = v.clone();
            }
            if let Some(v) = file_cfg.get("data_dir") {
                settings.data_dir = PathBuf::from(v);
            }
            if let Some(v) = file_cfg.get("poll_interval_secs") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.poll_interval_secs = parsed;
                }
            }
        }
    }

    if let Ok(v) = std::env::var("CHAT_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Ok(v) = std::env::var("CHAT_DATA_DIR") {
        settings.data_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("CHAT_POLL_INTERVAL_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_interval_secs = parsed;
        }
    }

    settings
}
