use std::{env, path::PathBuf, sync::LazyLock};

use clap::Parser;
use cli::Cli;

mod cli;
mod commands;

pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(AppConfig::from_env);

#[derive(Debug, Clone)]
pub struct AppConfig {
    state_path: PathBuf,
    knowledge_path: Option<PathBuf>,
    engine_config_path: Option<PathBuf>,
}

impl AppConfig {
    fn from_env() -> Self {
        let state_path = env::var("READBACK_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("readback-model.json"));
        let knowledge_path = env::var("READBACK_KNOWLEDGE_PATH").ok().map(PathBuf::from);
        let engine_config_path = env::var("READBACK_ENGINE_CONFIG").ok().map(PathBuf::from);
        Self {
            state_path,
            knowledge_path,
            engine_config_path,
        }
    }
}

fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    commands::run(cli, &APP_CONFIG)
}
