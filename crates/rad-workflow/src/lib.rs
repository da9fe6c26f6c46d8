//! # 放射科分诊工作流模块
//!
//! 提供检查队列分诊与临床安全功能，包括：
//! - 队列分类：把当前检查快照划分为五个互斥的队列
//! - 人员负载与统计：技师工作量、科室吞吐量与高峰时段
//! - 安全告警：根据患者与检查属性生成临床安全告警
//! - 安全检查单：检查前核查项的存储与校验
//! - 状态机：检查与预约的状态转换，完成检查前执行检查单门控

pub mod alerts;
pub mod analytics;
pub mod checklist;
pub mod engine;
pub mod queue;
pub mod repository;
pub mod rules;
pub mod snapshot;
pub mod state_machine;

// 重新导出主要类型
pub use alerts::{generate_alerts, Alert, AlertKind, AlertRule};
pub use analytics::{aggregate, Aggregation, DepartmentAnalytics, PeakHour, StaffLoad};
pub use checklist::{
    validate_checklist, ChecklistItem, ChecklistItemStatus, ChecklistItemTemplate,
    ChecklistItemType, ChecklistItemUpdate, ChecklistStatus, ChecklistStore, ChecklistTemplate,
    ChecklistValidation, PatientChecklist,
};
pub use engine::{DashboardView, TriageEngine};
pub use queue::{classify, QueueBuckets};
pub use repository::{
    AppointmentRepository, AppointmentUpdate, InMemoryRepository, PatientRepository, Record,
    StudyRepository, StudyUpdate,
};
pub use rules::TriageRules;
pub use snapshot::{DepartmentSnapshot, JsonFileSource, SnapshotSource, StaticSource};
pub use state_machine::{AppointmentEvent, AppointmentStateMachine, StudyEvent, StudyStateMachine};
