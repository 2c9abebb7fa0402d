use crate::probe_engine::TransportKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub target: String,
    pub interval_ms: u64,
    pub transport: TransportKind,
    pub timeout_ms: u64,
    pub retention_days: u32,
    pub db_path: Option<PathBuf>,
    pub duration_secs: Option<u64>,
    pub log_level: String,
    pub json: bool,
}
