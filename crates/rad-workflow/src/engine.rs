//! 分诊引擎
//!
//! 协调仓储、队列分类、统计、告警、检查单和状态机的核心引擎

use crate::{
    alerts::{self, Alert, AlertKind},
    analytics::{self, DepartmentAnalytics, StaffLoad},
    checklist::{
        validate_checklist, ChecklistItem, ChecklistItemUpdate, ChecklistStore, ChecklistTemplate,
        ChecklistValidation, PatientChecklist,
    },
    queue::{self, QueueBuckets},
    repository::{
        AppointmentRepository, AppointmentUpdate, PatientRepository, StudyRepository, StudyUpdate,
    },
    rules::TriageRules,
    snapshot::{DepartmentSnapshot, SnapshotSource},
    state_machine::{AppointmentEvent, AppointmentStateMachine, StudyEvent, StudyStateMachine},
};
use chrono::{DateTime, Utc};
use rad_core::{AppointmentStatus, RadError, Result, Study, StudyStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 仪表盘视图，每次从完整快照重新计算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardView {
    pub generated_at: DateTime<Utc>,
    pub queues: QueueBuckets,
    pub staff_load: HashMap<String, StaffLoad>,
    pub analytics: DepartmentAnalytics,
    pub alerts: Vec<Alert>,
}

impl DashboardView {
    /// 按告警类型计数
    pub fn alert_counts(&self) -> HashMap<AlertKind, usize> {
        let mut counts = HashMap::new();
        for alert in &self.alerts {
            *counts.entry(alert.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// 分诊引擎
#[derive(Debug)]
pub struct TriageEngine {
    rules: TriageRules,
    require_checklist: bool,
    patients: PatientRepository,
    studies: StudyRepository,
    appointments: AppointmentRepository,
    checklists: ChecklistStore,
    study_machine: StudyStateMachine,
    appointment_machine: AppointmentStateMachine,
}

impl TriageEngine {
    /// 创建新的分诊引擎
    ///
    /// `require_checklist` 为真时，没有检查单的检查也不能完成。
    pub fn new(rules: TriageRules, template: ChecklistTemplate, require_checklist: bool) -> Self {
        Self {
            rules,
            require_checklist,
            patients: PatientRepository::new(),
            studies: StudyRepository::new(),
            appointments: AppointmentRepository::new(),
            checklists: ChecklistStore::with_template(template),
            study_machine: StudyStateMachine::new(),
            appointment_machine: AppointmentStateMachine::new(),
        }
    }

    pub fn rules(&self) -> &TriageRules {
        &self.rules
    }

    /// 载入快照，整体替换仓储内容
    pub fn load_snapshot(&mut self, snapshot: DepartmentSnapshot) {
        tracing::info!(
            "Loading snapshot: {} patients, {} studies, {} appointments",
            snapshot.patients.len(),
            snapshot.studies.len(),
            snapshot.appointments.len()
        );

        self.patients.replace_all(snapshot.patients);
        self.studies.replace_all(snapshot.studies);
        self.appointments.replace_all(snapshot.appointments);
    }

    /// 从来源刷新快照
    ///
    /// 获取失败时保留原有快照并返回错误，不做重试。
    pub async fn refresh(&mut self, source: &dyn SnapshotSource) -> Result<()> {
        match source.fetch_snapshot().await {
            Ok(snapshot) => {
                self.load_snapshot(snapshot);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Snapshot refresh failed: {}", e);
                Err(e)
            }
        }
    }

    /// 当前快照副本
    pub fn snapshot(&self) -> DepartmentSnapshot {
        DepartmentSnapshot {
            patients: self.patients.list().to_vec(),
            studies: self.studies.list().to_vec(),
            appointments: self.appointments.list().to_vec(),
        }
    }

    pub fn patients(&self) -> &PatientRepository {
        &self.patients
    }

    pub fn studies(&self) -> &StudyRepository {
        &self.studies
    }

    pub fn appointments(&self) -> &AppointmentRepository {
        &self.appointments
    }

    pub fn checklists(&self) -> &ChecklistStore {
        &self.checklists
    }

    pub fn patients_mut(&mut self) -> &mut PatientRepository {
        &mut self.patients
    }

    pub fn studies_mut(&mut self) -> &mut StudyRepository {
        &mut self.studies
    }

    pub fn appointments_mut(&mut self) -> &mut AppointmentRepository {
        &mut self.appointments
    }

    /// 队列分类
    pub fn classify(&self, now: DateTime<Utc>) -> QueueBuckets {
        queue::classify(self.studies.list(), now, &self.rules)
    }

    /// 生成安全告警
    pub fn generate_alerts(&self, now: DateTime<Utc>) -> Vec<Alert> {
        alerts::generate_alerts(self.studies.list(), self.patients.list(), now, &self.rules)
    }

    /// 技师负载与科室统计
    pub fn aggregate(&self, now: DateTime<Utc>) -> analytics::Aggregation {
        analytics::aggregate(self.studies.list(), now, self.rules.peak_hour_count)
    }

    /// 计算完整仪表盘
    pub fn dashboard(&self, now: DateTime<Utc>) -> DashboardView {
        let aggregation = self.aggregate(now);
        let view = DashboardView {
            generated_at: now,
            queues: self.classify(now),
            staff_load: aggregation.staff_load,
            analytics: aggregation.analytics,
            alerts: self.generate_alerts(now),
        };

        tracing::debug!(
            "Dashboard recomputed: {} queued studies, {} alerts",
            view.queues.total(),
            view.alerts.len()
        );
        view
    }

    /// 开始检查单
    pub fn start_checklist(
        &mut self,
        patient_id: Uuid,
        study_id: Uuid,
        started_by: &str,
    ) -> PatientChecklist {
        self.checklists.start_checklist(patient_id, study_id, started_by)
    }

    /// 为检查开始检查单，检查不存在时返回 `None`
    pub fn start_checklist_for_study(
        &mut self,
        study_id: Uuid,
        started_by: &str,
    ) -> Option<PatientChecklist> {
        let patient_id = self.studies.get(study_id)?.patient_id;
        Some(self.checklists.start_checklist(patient_id, study_id, started_by))
    }

    /// 更新检查单条目
    pub fn update_checklist_item(
        &mut self,
        checklist_id: Uuid,
        item_id: Uuid,
        update: ChecklistItemUpdate,
        actor: &str,
    ) -> Option<&ChecklistItem> {
        self.checklists.update_item(checklist_id, item_id, update, actor)
    }

    /// 校验检查单
    pub fn validate_checklist(&self, checklist_id: Uuid) -> Option<ChecklistValidation> {
        self.checklists.validate(checklist_id)
    }

    /// 完成检查单，调用方需先确认校验通过
    pub fn complete_checklist(&mut self, checklist_id: Uuid, completed_by: &str) -> bool {
        self.checklists.complete_checklist(checklist_id, completed_by)
    }

    /// 检查状态转换
    ///
    /// 检查不存在时返回 `Ok(None)`。完成检查前先校验检查单，不通过时返回
    /// [`RadError::ChecklistGate`]，检查状态保持不变。
    pub fn transition_study(
        &mut self,
        study_id: Uuid,
        event: StudyEvent,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StudyStatus>> {
        let Some(study) = self.studies.get(study_id) else {
            tracing::debug!("Study {} not found, transition {:?} skipped", study_id, event);
            return Ok(None);
        };

        let current_status = study.status;
        let new_status = self.study_machine.transition(current_status, event)?;

        if event.requires_checklist() {
            self.check_completion_gate(study)?;
        }

        let update = StudyUpdate {
            status: Some(new_status),
            ended_at: (new_status == StudyStatus::Completed).then_some(now),
            ..Default::default()
        };
        self.studies.update(study_id, update);

        tracing::info!(
            "Study {} status updated from {} to {} by {}",
            study_id,
            current_status,
            new_status,
            actor
        );
        Ok(Some(new_status))
    }

    /// 完成检查前的检查单门控
    fn check_completion_gate(&self, study: &Study) -> Result<()> {
        let checklist = self
            .checklists
            .active_for(study.patient_id, study.id)
            .or_else(|| self.checklists.latest_for_study(study.id));

        let validation = match checklist {
            Some(checklist) => validate_checklist(checklist),
            None if self.require_checklist => {
                let mut validation = ChecklistValidation::new();
                validation.add_error(format!(
                    "Safety checklist has not been started for study {}",
                    study.accession_number
                ));
                validation
            }
            None => return Ok(()),
        };

        if validation.is_valid {
            Ok(())
        } else {
            tracing::warn!(
                "Completion of study {} blocked by checklist: {}",
                study.id,
                validation.errors.join("; ")
            );
            Err(RadError::ChecklistGate {
                errors: validation.errors,
            })
        }
    }

    /// 预约状态转换，预约不存在时返回 `Ok(None)`
    pub fn transition_appointment(
        &mut self,
        appointment_id: Uuid,
        event: AppointmentEvent,
    ) -> Result<Option<AppointmentStatus>> {
        let Some(appointment) = self.appointments.get(appointment_id) else {
            tracing::debug!(
                "Appointment {} not found, transition {:?} skipped",
                appointment_id,
                event
            );
            return Ok(None);
        };

        let current_status = appointment.status;
        let new_status = self.appointment_machine.transition(current_status, event)?;

        self.appointments.update(
            appointment_id,
            AppointmentUpdate {
                status: Some(new_status),
                ..Default::default()
            },
        );

        tracing::info!(
            "Appointment {} status updated from {} to {}",
            appointment_id,
            current_status,
            new_status
        );
        Ok(Some(new_status))
    }
}

impl Default for TriageEngine {
    fn default() -> Self {
        Self::new(TriageRules::default(), ChecklistTemplate::default(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::{ChecklistItemStatus, ChecklistItemType};
    use crate::snapshot::StaticSource;
    use chrono::Duration;
    use rad_core::{Appointment, Modality, Patient, Priority};

    fn patient() -> Patient {
        Patient {
            id: Uuid::new_v4(),
            medical_record_number: "MRN-200".to_string(),
            name: "Ivan".to_string(),
            age: 45,
            allergies: Vec::new(),
        }
    }

    fn study(patient_id: Uuid, status: StudyStatus, now: DateTime<Utc>) -> Study {
        Study {
            id: Uuid::new_v4(),
            patient_id,
            accession_number: "ACC-20240101-00000005".to_string(),
            modality: Modality::Ct,
            priority: Priority::Stat,
            status,
            scheduled_at: now - Duration::minutes(10),
            ended_at: None,
            special_instructions: None,
            contrast_required: true,
            sedation_required: false,
            technologist: Some("Rivera".to_string()),
            radiologist: None,
            description: None,
        }
    }

    fn engine_with(study: &Study, patient: &Patient) -> TriageEngine {
        let mut engine = TriageEngine::default();
        engine.load_snapshot(DepartmentSnapshot {
            patients: vec![patient.clone()],
            studies: vec![study.clone()],
            appointments: Vec::new(),
        });
        engine
    }

    fn complete_all(engine: &mut TriageEngine, checklist: &PatientChecklist) {
        for item in &checklist.items {
            let mut update = ChecklistItemUpdate::status(ChecklistItemStatus::Completed);
            if item.item_type == ChecklistItemType::RenalFunction {
                update = update.with_value("82");
            }
            engine.update_checklist_item(checklist.id, item.id, update, "nurse");
        }
    }

    #[test]
    fn test_completion_blocked_without_checklist() {
        let now = Utc::now();
        let p = patient();
        let s = study(p.id, StudyStatus::InProgress, now);
        let mut engine = engine_with(&s, &p);

        let err = engine
            .transition_study(s.id, StudyEvent::Complete, "tech", now)
            .unwrap_err();

        assert_eq!(err.gate_errors().map(|e| e.len()), Some(1));
        assert_eq!(engine.studies().get(s.id).unwrap().status, StudyStatus::InProgress);
    }

    #[test]
    fn test_completion_allowed_without_checklist_when_not_required() {
        let now = Utc::now();
        let p = patient();
        let s = study(p.id, StudyStatus::InProgress, now);
        let mut engine =
            TriageEngine::new(TriageRules::default(), ChecklistTemplate::default(), false);
        engine.load_snapshot(DepartmentSnapshot {
            patients: vec![p],
            studies: vec![s.clone()],
            appointments: Vec::new(),
        });

        let status = engine.transition_study(s.id, StudyEvent::Complete, "tech", now).unwrap();
        assert_eq!(status, Some(StudyStatus::Completed));
    }

    #[test]
    fn test_completion_gate_reports_outstanding_items() {
        let now = Utc::now();
        let p = patient();
        let s = study(p.id, StudyStatus::InProgress, now);
        let mut engine = engine_with(&s, &p);

        engine.start_checklist_for_study(s.id, "tech").unwrap();

        let err = engine
            .transition_study(s.id, StudyEvent::Complete, "tech", now)
            .unwrap_err();
        let errors = err.gate_errors().unwrap();

        // 四个必填条目未完成
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e == "Informed Consent is required but not completed"));
        assert_eq!(engine.studies().get(s.id).unwrap().status, StudyStatus::InProgress);
    }

    #[test]
    fn test_completion_after_valid_checklist() {
        let now = Utc::now();
        let p = patient();
        let s = study(p.id, StudyStatus::InProgress, now);
        let mut engine = engine_with(&s, &p);

        let checklist = engine.start_checklist(p.id, s.id, "tech");
        complete_all(&mut engine, &checklist);
        assert!(engine.validate_checklist(checklist.id).unwrap().is_valid);

        let status = engine.transition_study(s.id, StudyEvent::Complete, "tech", now).unwrap();
        assert_eq!(status, Some(StudyStatus::Completed));

        let stored = engine.studies().get(s.id).unwrap();
        assert_eq!(stored.ended_at, Some(now));

        // 检查单本身仍由调用方完成
        assert!(engine.complete_checklist(checklist.id, "tech"));
    }

    #[test]
    fn test_other_transitions_are_unconditional() {
        let now = Utc::now();
        let p = patient();
        let s = study(p.id, StudyStatus::Scheduled, now);
        let mut engine = engine_with(&s, &p);

        assert_eq!(
            engine.transition_study(s.id, StudyEvent::Start, "tech", now).unwrap(),
            Some(StudyStatus::InProgress)
        );
        assert_eq!(
            engine.transition_study(s.id, StudyEvent::Cancel, "tech", now).unwrap(),
            Some(StudyStatus::Cancelled)
        );
    }

    #[test]
    fn test_invalid_transition_checked_before_gate() {
        let now = Utc::now();
        let p = patient();
        let s = study(p.id, StudyStatus::Scheduled, now);
        let mut engine = engine_with(&s, &p);

        let err = engine
            .transition_study(s.id, StudyEvent::Complete, "tech", now)
            .unwrap_err();
        assert!(matches!(err, RadError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_missing_records_are_noops() {
        let now = Utc::now();
        let mut engine = TriageEngine::default();

        assert_eq!(
            engine.transition_study(Uuid::new_v4(), StudyEvent::Start, "tech", now).unwrap(),
            None
        );
        assert_eq!(
            engine.transition_appointment(Uuid::new_v4(), AppointmentEvent::CheckIn).unwrap(),
            None
        );
        assert!(engine.start_checklist_for_study(Uuid::new_v4(), "tech").is_none());
    }

    #[test]
    fn test_appointment_transitions() {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            test_id: Uuid::new_v4(),
            scheduled_at: now,
            status: AppointmentStatus::Scheduled,
            notes: None,
        };
        let mut engine = TriageEngine::default();
        engine.load_snapshot(DepartmentSnapshot {
            appointments: vec![appointment.clone()],
            ..Default::default()
        });

        assert_eq!(
            engine.transition_appointment(appointment.id, AppointmentEvent::CheckIn).unwrap(),
            Some(AppointmentStatus::CheckedIn)
        );
        assert!(engine
            .transition_appointment(appointment.id, AppointmentEvent::CheckIn)
            .is_err());
        assert_eq!(
            engine.transition_appointment(appointment.id, AppointmentEvent::Cancel).unwrap(),
            Some(AppointmentStatus::Cancelled)
        );
    }

    #[test]
    fn test_dashboard_counts() {
        let now = Utc::now();
        let mut p = patient();
        p.allergies = vec!["Iodine".to_string()];
        let s = study(p.id, StudyStatus::InProgress, now);
        let engine = engine_with(&s, &p);

        let view = engine.dashboard(now);

        assert_eq!(view.queues.in_progress.len(), 1);
        assert_eq!(view.staff_load["Rivera"].in_progress, 1);
        assert_eq!(view.alert_counts().get(&AlertKind::Error), Some(&1));
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let now = Utc::now();
        let p = patient();
        let s = study(p.id, StudyStatus::Scheduled, now);
        let source = StaticSource::new(DepartmentSnapshot {
            patients: vec![p],
            studies: vec![s],
            appointments: Vec::new(),
        });

        let mut engine = TriageEngine::default();
        engine.refresh(&source).await.unwrap();

        assert_eq!(engine.studies().len(), 1);
        assert_eq!(engine.classify(now).waiting.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let now = Utc::now();
        let p = patient();
        let s = study(p.id, StudyStatus::Scheduled, now);
        let mut engine = engine_with(&s, &p);

        let source = crate::snapshot::JsonFileSource::new("/nonexistent/snapshot.json");
        let err = engine.refresh(&source).await.unwrap_err();

        assert!(matches!(err, RadError::SnapshotFetch(_)));
        assert_eq!(engine.studies().len(), 1);
    }
}
