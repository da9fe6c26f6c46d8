//! 检查前安全检查单
//!
//! 检查单在检查开始时创建，每个（患者，检查）组合同时只有一个进行中的实例。
//! 本模块只负责存储与校验；完成检查前是否执行校验由状态转换的调用方决定。

use chrono::{DateTime, Utc};
use rad_core::utils::format_number;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 检查单条目类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItemType {
    Consent,         // 知情同意
    RenalFunction,   // 肾功能
    MetalScreening,  // 金属筛查
    NpoStatus,       // 禁食状态
    PregnancyStatus, // 妊娠状态
    PreMedication,   // 术前用药
}

/// 检查单条目状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItemStatus {
    #[default]
    Pending,
    Completed,
    Flagged,
    NotApplicable,
}

impl ChecklistItemStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChecklistItemStatus::Pending)
    }
}

/// 检查单整体状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    InProgress,
    Completed,
}

/// 检查单条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub item_type: ChecklistItemType,
    pub title: String,
    pub description: String,
    pub status: ChecklistItemStatus,
    pub is_required: bool,
    pub threshold: Option<f64>,
    pub unit: Option<String>,
    pub value: Option<String>, // 原始录入值，校验时解析
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// 患者检查单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientChecklist {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub study_id: Uuid,
    pub items: Vec<ChecklistItem>,
    pub status: ChecklistStatus,
    pub started_by: String,
    pub started_at: DateTime<Utc>,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PatientChecklist {
    /// 按模板创建新的检查单
    pub fn from_template(
        template: &ChecklistTemplate,
        patient_id: Uuid,
        study_id: Uuid,
        started_by: &str,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            study_id,
            items: template.items.iter().map(ChecklistItemTemplate::instantiate).collect(),
            status: ChecklistStatus::InProgress,
            started_by: started_by.to_string(),
            started_at,
            completed_by: None,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ChecklistStatus::Completed
    }

    /// 按类型查找条目
    pub fn item_by_type(&self, item_type: ChecklistItemType) -> Option<&ChecklistItem> {
        self.items.iter().find(|item| item.item_type == item_type)
    }
}

/// 检查单条目模板
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItemTemplate {
    pub item_type: ChecklistItemType,
    pub title: String,
    pub description: String,
    pub is_required: bool,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl ChecklistItemTemplate {
    fn new(
        item_type: ChecklistItemType,
        title: &str,
        description: &str,
        is_required: bool,
    ) -> Self {
        Self {
            item_type,
            title: title.to_string(),
            description: description.to_string(),
            is_required,
            threshold: None,
            unit: None,
        }
    }

    fn with_threshold(mut self, threshold: f64, unit: &str) -> Self {
        self.threshold = Some(threshold);
        self.unit = Some(unit.to_string());
        self
    }

    fn instantiate(&self) -> ChecklistItem {
        ChecklistItem {
            id: Uuid::new_v4(),
            item_type: self.item_type,
            title: self.title.clone(),
            description: self.description.clone(),
            status: ChecklistItemStatus::Pending,
            is_required: self.is_required,
            threshold: self.threshold,
            unit: self.unit.clone(),
            value: None,
            verified_by: None,
            verified_at: None,
            notes: None,
            attachments: Vec::new(),
        }
    }
}

/// 检查单模板
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistTemplate {
    pub items: Vec<ChecklistItemTemplate>,
}

impl Default for ChecklistTemplate {
    fn default() -> Self {
        Self {
            items: vec![
                ChecklistItemTemplate::new(
                    ChecklistItemType::Consent,
                    "Informed Consent",
                    "Signed consent form on file for the procedure",
                    true,
                ),
                ChecklistItemTemplate::new(
                    ChecklistItemType::RenalFunction,
                    "Renal Function Status",
                    "eGFR within safe range for contrast administration",
                    true,
                )
                .with_threshold(60.0, "mL/min"),
                ChecklistItemTemplate::new(
                    ChecklistItemType::MetalScreening,
                    "Metal Screening",
                    "Implants, devices and foreign bodies screened",
                    true,
                ),
                ChecklistItemTemplate::new(
                    ChecklistItemType::NpoStatus,
                    "NPO Status",
                    "Nothing by mouth for the required fasting period",
                    true,
                ),
                ChecklistItemTemplate::new(
                    ChecklistItemType::PregnancyStatus,
                    "Pregnancy Status",
                    "Pregnancy status confirmed where applicable",
                    false,
                ),
                ChecklistItemTemplate::new(
                    ChecklistItemType::PreMedication,
                    "Pre-medication",
                    "Premedication administered per protocol",
                    false,
                ),
            ],
        }
    }
}

/// 检查单校验结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ChecklistValidation {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    /// 添加错误
    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }
}

impl Default for ChecklistValidation {
    fn default() -> Self {
        Self::new()
    }
}

/// 校验检查单
///
/// 必填条目必须为已完成；已完成且设有阈值的条目必须录入数字，且不低于阈值。
/// 未录入值按不达标处理。
pub fn validate_checklist(checklist: &PatientChecklist) -> ChecklistValidation {
    let mut result = ChecklistValidation::new();

    for item in &checklist.items {
        if item.is_required && item.status != ChecklistItemStatus::Completed {
            result.add_error(format!("{} is required but not completed", item.title));
        }

        if item.status != ChecklistItemStatus::Completed {
            continue;
        }

        if let Some(threshold) = item.threshold {
            let raw = item.value.as_deref().map(str::trim).filter(|raw| !raw.is_empty());
            let meets_threshold = raw
                .and_then(|raw| raw.parse::<f64>().ok())
                .map(|value| value.is_finite() && value >= threshold)
                .unwrap_or(false);

            if !meets_threshold {
                let unit = item.unit.as_deref().unwrap_or_default();
                result.add_error(format!(
                    "{} value ({} {}) is below threshold ({} {})",
                    item.title,
                    raw.unwrap_or("missing"),
                    unit,
                    format_number(threshold),
                    unit
                ));
            }
        }
    }

    result
}

/// 检查单条目更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecklistItemUpdate {
    pub status: Option<ChecklistItemStatus>,
    pub value: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>, // 追加的附件
}

impl ChecklistItemUpdate {
    pub fn status(status: ChecklistItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_attachment(mut self, attachment: impl Into<String>) -> Self {
        self.attachments.push(attachment.into());
        self
    }
}

/// 检查单存储
#[derive(Debug)]
pub struct ChecklistStore {
    template: ChecklistTemplate,
    checklists: HashMap<Uuid, PatientChecklist>,
    order: Vec<Uuid>, // 创建顺序
    active: HashMap<(Uuid, Uuid), Uuid>, // (patient_id, study_id) -> checklist_id
}

impl ChecklistStore {
    /// 使用默认模板创建存储
    pub fn new() -> Self {
        Self::with_template(ChecklistTemplate::default())
    }

    pub fn with_template(template: ChecklistTemplate) -> Self {
        Self {
            template,
            checklists: HashMap::new(),
            order: Vec::new(),
            active: HashMap::new(),
        }
    }

    pub fn template(&self) -> &ChecklistTemplate {
        &self.template
    }

    /// 开始检查单
    ///
    /// 同一（患者，检查）已有进行中的检查单时直接返回该实例。
    pub fn start_checklist(
        &mut self,
        patient_id: Uuid,
        study_id: Uuid,
        started_by: &str,
    ) -> PatientChecklist {
        if let Some(existing) = self
            .active
            .get(&(patient_id, study_id))
            .and_then(|id| self.checklists.get(id))
        {
            tracing::debug!("Checklist {} already active for study {}", existing.id, study_id);
            return existing.clone();
        }

        let checklist = PatientChecklist::from_template(
            &self.template,
            patient_id,
            study_id,
            started_by,
            Utc::now(),
        );

        self.active.insert((patient_id, study_id), checklist.id);
        self.order.push(checklist.id);
        self.checklists.insert(checklist.id, checklist.clone());

        tracing::info!(
            "Started checklist {} for study {} by {}",
            checklist.id,
            study_id,
            started_by
        );
        checklist
    }

    /// 获取检查单
    pub fn get(&self, checklist_id: Uuid) -> Option<&PatientChecklist> {
        self.checklists.get(&checklist_id)
    }

    /// 获取（患者，检查）进行中的检查单
    pub fn active_for(&self, patient_id: Uuid, study_id: Uuid) -> Option<&PatientChecklist> {
        self.active
            .get(&(patient_id, study_id))
            .and_then(|id| self.checklists.get(id))
    }

    /// 获取检查的所有检查单，按创建顺序
    pub fn for_study(&self, study_id: Uuid) -> Vec<&PatientChecklist> {
        self.list()
            .into_iter()
            .filter(|checklist| checklist.study_id == study_id)
            .collect()
    }

    /// 检查的最新检查单
    pub fn latest_for_study(&self, study_id: Uuid) -> Option<&PatientChecklist> {
        self.for_study(study_id).into_iter().last()
    }

    /// 所有检查单，按创建顺序
    pub fn list(&self) -> Vec<&PatientChecklist> {
        self.order
            .iter()
            .filter_map(|id| self.checklists.get(id))
            .collect()
    }

    /// 更新检查单条目
    ///
    /// 检查单或条目不存在、或检查单已完成时不做任何修改并返回 `None`。
    pub fn update_item(
        &mut self,
        checklist_id: Uuid,
        item_id: Uuid,
        update: ChecklistItemUpdate,
        actor: &str,
    ) -> Option<&ChecklistItem> {
        let checklist = self.checklists.get_mut(&checklist_id)?;
        if checklist.is_completed() {
            tracing::warn!("Checklist {} is completed, item {} not updated", checklist_id, item_id);
            return None;
        }

        let item = checklist.items.iter_mut().find(|item| item.id == item_id)?;

        if let Some(status) = update.status {
            if item.status.is_terminal() && item.status != status {
                tracing::warn!(
                    "Checklist item {} leaving terminal status {:?} for {:?}",
                    item.id,
                    item.status,
                    status
                );
            }

            if status == ChecklistItemStatus::Completed {
                item.verified_by = Some(actor.to_string());
                item.verified_at = Some(Utc::now());
            } else {
                item.verified_by = None;
                item.verified_at = None;
            }
            item.status = status;
        }

        if let Some(value) = update.value {
            item.value = Some(value);
        }
        if let Some(notes) = update.notes {
            item.notes = Some(notes);
        }
        item.attachments.extend(update.attachments);

        tracing::debug!(
            "Updated checklist item {} ({:?}) status {:?}",
            item.id,
            item.item_type,
            item.status
        );
        Some(item)
    }

    /// 校验检查单，不存在时返回 `None`
    pub fn validate(&self, checklist_id: Uuid) -> Option<ChecklistValidation> {
        self.checklists.get(&checklist_id).map(validate_checklist)
    }

    /// 完成检查单
    ///
    /// 不执行校验，调用方需先确认校验通过。检查单不存在或已完成时返回 `false`。
    pub fn complete_checklist(&mut self, checklist_id: Uuid, completed_by: &str) -> bool {
        let Some(checklist) = self.checklists.get_mut(&checklist_id) else {
            return false;
        };
        if checklist.is_completed() {
            return false;
        }

        checklist.status = ChecklistStatus::Completed;
        checklist.completed_by = Some(completed_by.to_string());
        checklist.completed_at = Some(Utc::now());
        self.active.remove(&(checklist.patient_id, checklist.study_id));

        tracing::info!("Checklist {} completed by {}", checklist_id, completed_by);
        true
    }
}

impl Default for ChecklistStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(item_type: ChecklistItemType, title: &str, is_required: bool) -> ChecklistItem {
        ChecklistItemTemplate::new(item_type, title, "", is_required).instantiate()
    }

    fn checklist(items: Vec<ChecklistItem>) -> PatientChecklist {
        PatientChecklist {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            study_id: Uuid::new_v4(),
            items,
            status: ChecklistStatus::InProgress,
            started_by: "tech".to_string(),
            started_at: Utc::now(),
            completed_by: None,
            completed_at: None,
        }
    }

    fn renal(value: &str) -> ChecklistItem {
        let mut renal = ChecklistItemTemplate::new(
            ChecklistItemType::RenalFunction,
            "Renal Function Status",
            "",
            true,
        )
        .with_threshold(60.0, "mL/min")
        .instantiate();
        renal.status = ChecklistItemStatus::Completed;
        renal.value = Some(value.to_string());
        renal
    }

    #[test]
    fn test_optional_pending_items_are_valid() {
        let list = checklist(vec![
            item(ChecklistItemType::PregnancyStatus, "Pregnancy Status", false),
            item(ChecklistItemType::PreMedication, "Pre-medication", false),
        ]);

        let result = validate_checklist(&list);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_required_pending_item_fails() {
        let list = checklist(vec![
            item(ChecklistItemType::Consent, "Informed Consent", true),
            item(ChecklistItemType::PreMedication, "Pre-medication", false),
        ]);

        let result = validate_checklist(&list);
        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec!["Informed Consent is required but not completed".to_string()]
        );
    }

    #[test]
    fn test_flagged_required_item_fails() {
        let mut consent = item(ChecklistItemType::Consent, "Informed Consent", true);
        consent.status = ChecklistItemStatus::Flagged;

        let result = validate_checklist(&checklist(vec![consent]));
        assert!(!result.is_valid);
    }

    #[test]
    fn test_threshold_gate() {
        let below = validate_checklist(&checklist(vec![renal("45")]));
        assert!(!below.is_valid);
        assert_eq!(below.errors.len(), 1);
        assert!(below.errors[0].contains("below threshold"));
        assert_eq!(
            below.errors[0],
            "Renal Function Status value (45 mL/min) is below threshold (60 mL/min)"
        );

        let above = validate_checklist(&checklist(vec![renal("75")]));
        assert!(above.is_valid);

        let equal = validate_checklist(&checklist(vec![renal("60")]));
        assert!(equal.is_valid);
    }

    #[test]
    fn test_malformed_value_fails_threshold() {
        let result = validate_checklist(&checklist(vec![renal("pending lab")]));
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("(pending lab mL/min)"));

        let result = validate_checklist(&checklist(vec![renal("NaN")]));
        assert!(!result.is_valid);
    }

    #[test]
    fn test_threshold_without_value_fails() {
        let mut item = renal("0");
        item.value = None;

        let result = validate_checklist(&checklist(vec![item]));
        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec!["Renal Function Status value (missing mL/min) is below threshold (60 mL/min)".to_string()]
        );

        let blank = validate_checklist(&checklist(vec![renal("  ")]));
        assert!(!blank.is_valid);
    }

    #[test]
    fn test_threshold_ignored_unless_completed() {
        let mut item = renal("0");
        item.value = None;
        item.status = ChecklistItemStatus::NotApplicable;
        item.is_required = false;

        let result = validate_checklist(&checklist(vec![item]));
        assert!(result.is_valid);
    }

    #[test]
    fn test_default_template_order() {
        let template = ChecklistTemplate::default();
        let types: Vec<ChecklistItemType> = template.items.iter().map(|i| i.item_type).collect();

        assert_eq!(
            types,
            vec![
                ChecklistItemType::Consent,
                ChecklistItemType::RenalFunction,
                ChecklistItemType::MetalScreening,
                ChecklistItemType::NpoStatus,
                ChecklistItemType::PregnancyStatus,
                ChecklistItemType::PreMedication,
            ]
        );
        assert_eq!(template.items[1].threshold, Some(60.0));
    }

    #[test]
    fn test_start_checklist_reuses_active_instance() {
        let mut store = ChecklistStore::new();
        let patient_id = Uuid::new_v4();
        let study_id = Uuid::new_v4();

        let first = store.start_checklist(patient_id, study_id, "tech-a");
        let second = store.start_checklist(patient_id, study_id, "tech-b");

        assert_eq!(first.id, second.id);
        assert_eq!(second.started_by, "tech-a");
        assert_eq!(store.list().len(), 1);
        assert_eq!(first.items.len(), 6);
    }

    #[test]
    fn test_update_item_stamps_verifier() {
        let mut store = ChecklistStore::new();
        let list = store.start_checklist(Uuid::new_v4(), Uuid::new_v4(), "tech");
        let consent_id = list.items[0].id;

        let updated = store
            .update_item(
                list.id,
                consent_id,
                ChecklistItemUpdate::status(ChecklistItemStatus::Completed)
                    .with_notes("Signed at front desk")
                    .with_attachment("consent.pdf"),
                "nurse",
            )
            .unwrap();

        assert_eq!(updated.status, ChecklistItemStatus::Completed);
        assert_eq!(updated.verified_by.as_deref(), Some("nurse"));
        assert!(updated.verified_at.is_some());
        assert_eq!(updated.attachments, vec!["consent.pdf".to_string()]);

        // 终止状态仍可改回
        let reverted = store
            .update_item(
                list.id,
                consent_id,
                ChecklistItemUpdate::status(ChecklistItemStatus::Pending),
                "nurse",
            )
            .unwrap();
        assert_eq!(reverted.status, ChecklistItemStatus::Pending);
        assert!(reverted.verified_by.is_none());
    }

    #[test]
    fn test_update_missing_targets_is_noop() {
        let mut store = ChecklistStore::new();
        let list = store.start_checklist(Uuid::new_v4(), Uuid::new_v4(), "tech");

        assert!(store
            .update_item(Uuid::new_v4(), list.items[0].id, ChecklistItemUpdate::default(), "x")
            .is_none());
        assert!(store
            .update_item(list.id, Uuid::new_v4(), ChecklistItemUpdate::default(), "x")
            .is_none());
    }

    #[test]
    fn test_complete_checklist_is_terminal() {
        let mut store = ChecklistStore::new();
        let patient_id = Uuid::new_v4();
        let study_id = Uuid::new_v4();
        let list = store.start_checklist(patient_id, study_id, "tech");

        // 完成本身不做校验
        assert!(store.complete_checklist(list.id, "supervisor"));
        assert!(!store.complete_checklist(list.id, "someone-else"));

        let stored = store.get(list.id).unwrap();
        assert_eq!(stored.status, ChecklistStatus::Completed);
        assert_eq!(stored.completed_by.as_deref(), Some("supervisor"));
        assert!(store.active_for(patient_id, study_id).is_none());

        assert!(store
            .update_item(
                list.id,
                list.items[0].id,
                ChecklistItemUpdate::status(ChecklistItemStatus::Completed),
                "x",
            )
            .is_none());

        let next = store.start_checklist(patient_id, study_id, "tech");
        assert_ne!(next.id, list.id);
        assert_eq!(store.for_study(study_id).len(), 2);
        assert!(!store.complete_checklist(Uuid::new_v4(), "x"));
    }

    #[test]
    fn test_latest_for_study_follows_creation_order() {
        let mut store = ChecklistStore::new();
        let patient_id = Uuid::new_v4();
        let study_id = Uuid::new_v4();

        let mut ids = Vec::new();
        for _ in 0..5 {
            let list = store.start_checklist(patient_id, study_id, "tech");
            assert!(store.complete_checklist(list.id, "tech"));
            ids.push(list.id);
        }

        // 同一时刻创建的检查单也保持稳定顺序
        let found: Vec<Uuid> = store.for_study(study_id).iter().map(|c| c.id).collect();
        assert_eq!(found, ids);
        assert_eq!(store.latest_for_study(study_id).map(|c| c.id), ids.last().copied());
    }
}
