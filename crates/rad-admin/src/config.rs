//! 配置管理
//!
//! 默认值、配置文件和 `RAD_` 前缀环境变量分层加载，加载后统一校验

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};
use anyhow::{Result, Context};
use tracing::{info, error};
use config::{Config, Environment, File, Map};

use rad_workflow::{ChecklistTemplate, TriageEngine, TriageRules};

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<RadConfig>>,
    /// 配置文件路径
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RadConfig {
    /// 分诊规则
    #[serde(default)]
    pub triage: TriageRules,
    /// 检查单配置
    #[serde(default)]
    pub checklist: ChecklistConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RadConfig {
    /// 按配置创建分诊引擎
    pub fn build_engine(&self) -> TriageEngine {
        TriageEngine::new(
            self.triage.clone(),
            self.checklist.template.clone(),
            self.checklist.require_for_completion,
        )
    }
}

/// 检查单配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistConfig {
    /// 没有检查单时是否禁止完成检查
    pub require_for_completion: bool,
    /// 检查单模板
    pub template: ChecklistTemplate,
}

impl Default for ChecklistConfig {
    fn default() -> Self {
        Self {
            require_for_completion: true,
            template: ChecklistTemplate::default(),
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别或过滤指令
    pub level: String,
    /// 输出格式
    pub format: LogFormat,
    /// 是否输出模块路径
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            with_target: true,
        }
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&RadConfig) -> Result<()>,
}

impl ConfigManager {
    /// 从配置文件创建配置管理器
    pub fn new(config_path: &str) -> Result<Self> {
        Self::build(Some(config_path))
    }

    /// 仅使用默认值和环境变量
    pub fn with_defaults() -> Result<Self> {
        Self::build(None)
    }

    fn build(config_path: Option<&str>) -> Result<Self> {
        Self::build_with_env(config_path, None)
    }

    /// `env_vars` 为 `None` 时读取进程环境变量
    fn build_with_env(
        config_path: Option<&str>,
        env_vars: Option<Map<String, String>>,
    ) -> Result<Self> {
        let config = Self::load_config(config_path, env_vars)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 加载配置
    fn load_config(
        config_path: Option<&str>,
        env_vars: Option<Map<String, String>>,
    ) -> Result<RadConfig> {
        let defaults = Config::try_from(&RadConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("RAD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env_vars),
            )
            .build()
            .context("Failed to load configuration")?;

        let config: RadConfig = settings.try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 获取当前配置
    pub async fn get_config(&self) -> RadConfig {
        let config = self.config.read().await;
        config.clone()
    }

    /// 更新配置
    pub async fn update_config(&self, new_config: RadConfig) -> Result<()> {
        // 验证新配置
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        if self.config_path.is_some() {
            self.save_config().await?;
        }

        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存配置到文件
    async fn save_config(&self) -> Result<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };

        let config = self.config.read().await;
        let config_str = toml::to_string_pretty(&*config)
            .context("Failed to serialize configuration")?;

        tokio::fs::write(path, config_str).await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path);
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref(), None)?;
        self.validator.validate(&new_config)?;

        let mut config = self.config.write().await;
        *config = new_config;
        Ok(())
    }
}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "triage.peak_hour_count",
                validator: |config| {
                    if config.triage.peak_hour_count == 0 {
                        Err(anyhow::anyhow!("Peak hour count cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "triage.wait_alert_minutes",
                validator: |config| {
                    let triage = &config.triage;
                    if triage.wait_alert_minutes < 0 || triage.cancellation_delay_minutes < 0 {
                        Err(anyhow::anyhow!("Time thresholds cannot be negative"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "triage.contrast_allergy_keywords",
                validator: |config| {
                    if config.triage.contrast_allergy_keywords.iter().all(|k| k.trim().is_empty()) {
                        Err(anyhow::anyhow!("At least one contrast allergy keyword is required"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "triage.metal_screening_phrase",
                validator: |config| {
                    if config.triage.metal_screening_phrase.trim().is_empty() {
                        Err(anyhow::anyhow!("Metal screening phrase cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "checklist.template",
                validator: |config| {
                    let mut seen = HashSet::new();
                    for item in &config.checklist.template.items {
                        if !seen.insert(item.item_type) {
                            return Err(anyhow::anyhow!(
                                "Duplicate checklist item type {:?}",
                                item.item_type
                            ));
                        }
                        let missing_unit = item.unit.as_deref().map_or(true, str::is_empty);
                        if item.threshold.is_some() && missing_unit {
                            return Err(anyhow::anyhow!(
                                "Checklist item '{}' has a threshold but no unit",
                                item.title
                            ));
                        }
                    }
                    Ok(())
                },
            },
        ];

        Self {
            validation_rules,
        }
    }

    pub fn validate(&self, config: &RadConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("Invalid {}: {}", rule.field_path, e));
            }
        }

        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
