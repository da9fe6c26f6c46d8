//! 临床安全告警
//!
//! 对每个检查及其患者逐条评估固定的告警规则，生成一组扁平告警。
//! 告警每次重新计算，ID 由规则键和检查 ID 组成，重复计算结果一致。

use chrono::{DateTime, Duration, Utc};
use rad_core::utils::elapsed_minutes;
use rad_core::{Modality, Patient, Study, StudyStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::rules::TriageRules;

/// 患者记录缺失时使用的显示名
pub const UNKNOWN_PATIENT: &str = "Patient";

/// 告警类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Warning,
    Info,
    Error,
    Success,
}

/// 安全告警
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: String, // <规则键>-<检查ID>
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub study_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

/// 规则评估上下文
#[derive(Debug)]
pub struct RuleContext<'a> {
    pub study: &'a Study,
    pub patient: Option<&'a Patient>,
    pub now: DateTime<Utc>,
    pub rules: &'a TriageRules,
}

impl RuleContext<'_> {
    /// 患者显示名，缺失时降级为占位符
    pub fn patient_name(&self) -> &str {
        self.patient
            .map(|patient| patient.name.as_str())
            .unwrap_or(UNKNOWN_PATIENT)
    }
}

/// 告警规则：判定条件与消息格式化
#[derive(Debug, Clone, Copy)]
pub struct AlertRule {
    pub key: &'static str,
    pub kind: AlertKind,
    pub applies: fn(&RuleContext) -> bool,
    pub message: fn(&RuleContext) -> String,
}

impl AlertRule {
    /// 对单个检查评估规则，命中时生成告警
    pub fn evaluate(&self, ctx: &RuleContext) -> Option<Alert> {
        if !(self.applies)(ctx) {
            return None;
        }

        Some(Alert {
            id: format!("{}-{}", self.key, ctx.study.id),
            kind: self.kind,
            message: (self.message)(ctx),
            timestamp: ctx.now,
            study_id: Some(ctx.study.id),
            patient_id: Some(ctx.study.patient_id),
        })
    }
}

/// 候检超时
pub const WAIT_TIME_RULE: AlertRule = AlertRule {
    key: "wait-time",
    kind: AlertKind::Warning,
    applies: |ctx| {
        ctx.study.status == StudyStatus::Scheduled
            && ctx.now.signed_duration_since(ctx.study.scheduled_at)
                > Duration::minutes(ctx.rules.wait_alert_minutes)
    },
    message: |ctx| {
        format!(
            "{} has been waiting for {} minutes",
            ctx.patient_name(),
            elapsed_minutes(ctx.study.scheduled_at, ctx.now)
        )
    },
};

/// MRI 检查前金属筛查
pub const MRI_PREP_RULE: AlertRule = AlertRule {
    key: "mri-prep",
    kind: AlertKind::Error,
    applies: |ctx| {
        ctx.study.status == StudyStatus::Scheduled
            && ctx.study.modality == Modality::Mri
            && !ctx
                .study
                .instructions_contain(&ctx.rules.metal_screening_phrase)
    },
    message: |ctx| format!("Metal screening required for {}'s MRI", ctx.patient_name()),
};

/// 造影剂过敏
pub const CONTRAST_ALLERGY_RULE: AlertRule = AlertRule {
    key: "contrast-allergy",
    kind: AlertKind::Error,
    applies: |ctx| {
        ctx.study.contrast_required
            && ctx
                .patient
                .map(|patient| patient.has_allergy_matching(&ctx.rules.contrast_allergy_keywords))
                .unwrap_or(false)
    },
    message: |ctx| {
        format!(
            "{} has a contrast/iodine allergy but the {} study requires contrast",
            ctx.patient_name(),
            ctx.study.modality
        )
    },
};

/// 儿科 MRI 未安排镇静
pub const PEDIATRIC_SEDATION_RULE: AlertRule = AlertRule {
    key: "pediatric-sedation",
    kind: AlertKind::Warning,
    applies: |ctx| {
        ctx.study.modality == Modality::Mri
            && !ctx.study.sedation_required
            && ctx
                .patient
                .map(|patient| patient.is_pediatric(ctx.rules.pediatric_age_limit))
                .unwrap_or(false)
    },
    message: |ctx| {
        let age = ctx.patient.map(|patient| patient.age).unwrap_or_default();
        format!(
            "Pediatric MRI for {} (age {}) is scheduled without sedation",
            ctx.patient_name(),
            age
        )
    },
};

/// 默认规则集，按评估顺序排列
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        WAIT_TIME_RULE,
        MRI_PREP_RULE,
        CONTRAST_ALLERGY_RULE,
        PEDIATRIC_SEDATION_RULE,
    ]
}

/// 使用默认规则集生成告警
pub fn generate_alerts(
    studies: &[Study],
    patients: &[Patient],
    now: DateTime<Utc>,
    rules: &TriageRules,
) -> Vec<Alert> {
    generate_alerts_with(&default_rules(), studies, patients, now, rules)
}

/// 使用指定规则集生成告警
///
/// 找不到患者记录时不会中断评估，消息中使用占位名。
pub fn generate_alerts_with(
    alert_rules: &[AlertRule],
    studies: &[Study],
    patients: &[Patient],
    now: DateTime<Utc>,
    rules: &TriageRules,
) -> Vec<Alert> {
    let lookup: HashMap<Uuid, &Patient> = patients.iter().map(|p| (p.id, p)).collect();
    let mut alerts = Vec::new();

    for study in studies {
        let patient = lookup.get(&study.patient_id).copied();
        if patient.is_none() {
            tracing::debug!(
                "Patient {} not found for study {}",
                study.patient_id,
                study.id
            );
        }

        let ctx = RuleContext {
            study,
            patient,
            now,
            rules,
        };
        alerts.extend(alert_rules.iter().filter_map(|rule| rule.evaluate(&ctx)));
    }

    alerts
}
