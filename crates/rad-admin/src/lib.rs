//! 分诊引擎管理模块
//!
//! 配置加载与校验、日志初始化以及看板指标导出

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{
    ChecklistConfig, ConfigManager, ConfigValidator, LogFormat, LoggingConfig, RadConfig,
};
pub use logging::init_logging;
pub use metrics::DashboardMetrics;
