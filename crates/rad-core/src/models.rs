//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 儿科患者年龄上限（不含）
pub const PEDIATRIC_AGE_LIMIT: u32 = 12;

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub medical_record_number: String, // 医院内部病历号
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub allergies: Vec<String>, // 过敏史，自由文本
}

impl Patient {
    /// 是否为儿科患者，`age_limit` 通常取 [`PEDIATRIC_AGE_LIMIT`]
    pub fn is_pediatric(&self, age_limit: u32) -> bool {
        self.age < age_limit
    }

    /// 过敏史中是否包含任一关键字（不区分大小写的子串匹配）
    pub fn has_allergy_matching(&self, keywords: &[String]) -> bool {
        self.allergies.iter().any(|allergy| {
            let allergy = allergy.to_lowercase();
            keywords
                .iter()
                .any(|keyword| allergy.contains(&keyword.to_lowercase()))
        })
    }
}

/// 检查设备类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Modality {
    #[serde(rename = "X-Ray")]
    XRay,
    #[serde(rename = "CT")]
    Ct,
    #[serde(rename = "MRI")]
    Mri,
    Ultrasound,
    #[serde(rename = "PET")]
    Pet,
    Mammography,
    Fluoroscopy,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modality::XRay => "X-Ray",
            Modality::Ct => "CT",
            Modality::Mri => "MRI",
            Modality::Ultrasound => "Ultrasound",
            Modality::Pet => "PET",
            Modality::Mammography => "Mammography",
            Modality::Fluoroscopy => "Fluoroscopy",
        };
        f.write_str(name)
    }
}

/// 检查优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    #[serde(rename = "STAT")]
    Stat, // 最高紧急程度
    Urgent,
    #[default]
    Routine,
}

/// 检查状态
///
/// 队列分类只识别前四种状态；`Reported`、`Verified`、`NoShow` 来自报告和统计流程，
/// 分类时不归入任何队列。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StudyStatus {
    Scheduled,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
    Reported,
    Verified,
    #[serde(rename = "No Show")]
    NoShow,
}

impl fmt::Display for StudyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StudyStatus::Scheduled => "Scheduled",
            StudyStatus::InProgress => "In Progress",
            StudyStatus::Completed => "Completed",
            StudyStatus::Cancelled => "Cancelled",
            StudyStatus::Reported => "Reported",
            StudyStatus::Verified => "Verified",
            StudyStatus::NoShow => "No Show",
        };
        f.write_str(name)
    }
}

/// 检查信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub accession_number: String, // 检查号
    pub modality: Modality,
    #[serde(default)]
    pub priority: Priority,
    pub status: StudyStatus,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub contrast_required: bool,
    #[serde(default)]
    pub sedation_required: bool,
    #[serde(default)]
    pub technologist: Option<String>,
    #[serde(default)]
    pub radiologist: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Study {
    /// 特殊说明中是否包含指定短语（不区分大小写）
    pub fn instructions_contain(&self, phrase: &str) -> bool {
        self.special_instructions
            .as_deref()
            .map(|text| text.to_lowercase().contains(&phrase.to_lowercase()))
            .unwrap_or(false)
    }
}

/// 预约状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Scheduled,
    #[serde(rename = "Checked In")]
    CheckedIn,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
    #[serde(rename = "No Show")]
    NoShow,
}

impl AppointmentStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::CheckedIn => "Checked In",
            AppointmentStatus::InProgress => "In Progress",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::NoShow => "No Show",
        };
        f.write_str(name)
    }
}

/// 预约信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub test_id: Uuid, // 对应的检查
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
}
