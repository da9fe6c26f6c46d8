//! 内存仓储
//!
//! 每个仓储独占其集合，对外提供只读快照和有限的修改方法。
//! 按 ID 更新时记录不存在则静默跳过。

use chrono::{DateTime, Utc};
use rad_core::{Appointment, AppointmentStatus, Patient, Study, StudyStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 可按 ID 存取的记录
pub trait Record: Clone {
    fn record_id(&self) -> Uuid;
}

impl Record for Patient {
    fn record_id(&self) -> Uuid {
        self.id
    }
}

impl Record for Study {
    fn record_id(&self) -> Uuid {
        self.id
    }
}

impl Record for Appointment {
    fn record_id(&self) -> Uuid {
        self.id
    }
}

/// 内存仓储，保持记录的插入顺序
#[derive(Debug, Clone)]
pub struct InMemoryRepository<T> {
    records: Vec<T>,
}

pub type PatientRepository = InMemoryRepository<Patient>;
pub type StudyRepository = InMemoryRepository<Study>;
pub type AppointmentRepository = InMemoryRepository<Appointment>;

impl<T: Record> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    pub fn with_records(records: Vec<T>) -> Self {
        Self { records }
    }

    /// 当前快照
    pub fn list(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.records.iter().find(|record| record.record_id() == id)
    }

    /// 按 ID 插入或替换
    pub fn upsert(&mut self, record: T) {
        let id = record.record_id();
        match self.records.iter_mut().find(|existing| existing.record_id() == id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// 用新快照整体替换
    pub fn replace_all(&mut self, records: Vec<T>) {
        self.records = records;
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut T> {
        self.records.iter_mut().find(|record| record.record_id() == id)
    }
}

impl<T: Record> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 检查的部分字段更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyUpdate {
    pub status: Option<StudyStatus>,
    pub ended_at: Option<DateTime<Utc>>,
    pub special_instructions: Option<String>,
    pub technologist: Option<String>,
    pub radiologist: Option<String>,
}

impl InMemoryRepository<Study> {
    /// 更新检查，不存在时返回 `None`
    pub fn update(&mut self, id: Uuid, update: StudyUpdate) -> Option<&Study> {
        let study = self.get_mut(id)?;

        if let Some(status) = update.status {
            study.status = status;
        }
        if let Some(ended_at) = update.ended_at {
            study.ended_at = Some(ended_at);
        }
        if let Some(instructions) = update.special_instructions {
            study.special_instructions = Some(instructions);
        }
        if let Some(technologist) = update.technologist {
            study.technologist = Some(technologist);
        }
        if let Some(radiologist) = update.radiologist {
            study.radiologist = Some(radiologist);
        }

        Some(study)
    }
}

/// 预约的部分字段更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    pub status: Option<AppointmentStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl InMemoryRepository<Appointment> {
    /// 更新预约，不存在时返回 `None`
    pub fn update(&mut self, id: Uuid, update: AppointmentUpdate) -> Option<&Appointment> {
        let appointment = self.get_mut(id)?;

        if let Some(status) = update.status {
            appointment.status = status;
        }
        if let Some(scheduled_at) = update.scheduled_at {
            appointment.scheduled_at = scheduled_at;
        }
        if let Some(notes) = update.notes {
            appointment.notes = Some(notes);
        }

        Some(appointment)
    }
}
