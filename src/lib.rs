mod common;

pub mod broadcast;
pub mod config;
pub mod data_model;
pub mod metrics;
pub mod probe;
pub mod probe_engine;
pub mod runtime;
pub mod settings;
pub mod startup;
pub mod storage;
pub mod window;

pub use common::net::{parse_target_url, target_host, target_host_port};
pub use common::time::{Clock, SystemClock, epoch_millis, from_epoch_millis};
