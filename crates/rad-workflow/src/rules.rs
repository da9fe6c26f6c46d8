//! 分诊规则参数

use serde::{Deserialize, Serialize};

/// 队列分类与告警规则使用的阈值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageRules {
    /// 候检超时告警阈值（分钟，严格大于）
    pub wait_alert_minutes: i64,
    /// 已取消检查归入延误队列的阈值（分钟，严格大于）
    pub cancellation_delay_minutes: i64,
    /// 儿科镇静告警的年龄上限（不含）
    pub pediatric_age_limit: u32,
    /// 统计的高峰时段个数
    pub peak_hour_count: usize,
    /// MRI 金属筛查完成的说明短语
    pub metal_screening_phrase: String,
    /// 造影剂过敏关键字
    pub contrast_allergy_keywords: Vec<String>,
}

impl Default for TriageRules {
    fn default() -> Self {
        Self {
            wait_alert_minutes: 30,
            cancellation_delay_minutes: 30,
            pediatric_age_limit: rad_core::PEDIATRIC_AGE_LIMIT,
            peak_hour_count: 3,
            metal_screening_phrase: "metal screening completed".to_string(),
            contrast_allergy_keywords: vec!["contrast".to_string(), "iodine".to_string()],
        }
    }
}
