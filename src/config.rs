//! Process configuration: command-line flags with environment fallbacks.

use clap::Args;
use lustre_core::{EngineConfig, FeatureWeights, GroupingMode};
use std::path::PathBuf;
use tracing::Level;

/// Settings shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the LMDB databases
    #[arg(long, global = true, env = "LUSTRE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Database name (a subdirectory of the data directory)
    #[arg(long, global = true, env = "DB_NAME", default_value = "diamond_inventory")]
    pub db_name: String,

    /// Catalog collection the batch reads and updates
    #[arg(long, global = true, env = "COLLECTION_NAME", default_value = "diamonds_test")]
    pub collection: String,

    #[arg(long, global = true, env = "WEIGHT_PRICE", default_value_t = 1.5)]
    pub weight_price: f64,

    #[arg(long, global = true, env = "WEIGHT_CARAT", default_value_t = 2.0)]
    pub weight_carat: f64,

    #[arg(long, global = true, env = "WEIGHT_COLOR", default_value_t = 1.0)]
    pub weight_color: f64,

    /// Search the whole catalog as one group and key updates by `_id`
    #[arg(long, global = true, env = "LUSTRE_UNGROUPED")]
    pub ungrouped: bool,

    /// Write empty lists for records that get no recommendations
    #[arg(long, global = true, env = "LUSTRE_CLEAR_STALE")]
    pub clear_stale: bool,

    /// Log level
    #[arg(long, global = true, env = "LUSTRE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl AppConfig {
    /// Path of the LMDB environment for `db_name`
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }

    pub fn weights(&self) -> FeatureWeights {
        FeatureWeights {
            price: self.weight_price,
            carat: self.weight_carat,
            color: self.weight_color,
        }
    }

    pub fn grouping(&self) -> GroupingMode {
        if self.ungrouped {
            GroupingMode::Ungrouped
        } else {
            GroupingMode::ByShape
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            weights: self.weights(),
            grouping: self.grouping(),
            clear_stale: self.clear_stale,
            ..EngineConfig::default()
        }
    }

    pub fn log_level(&self) -> Level {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}
