//! 科室快照来源
//!
//! 快照的获取是异步的；获取完成后引擎只在内存快照上做同步计算。

use async_trait::async_trait;
use rad_core::{Appointment, Patient, RadError, Result, Study};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 科室某一时刻的完整快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepartmentSnapshot {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub studies: Vec<Study>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}

/// 快照来源特征
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// 获取完整快照
    async fn fetch_snapshot(&self) -> Result<DepartmentSnapshot>;
}

/// 从 JSON 文件读取快照
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSource for JsonFileSource {
    async fn fetch_snapshot(&self) -> Result<DepartmentSnapshot> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RadError::SnapshotFetch(format!("failed to read {}: {}", self.path.display(), e))
        })?;

        let snapshot: DepartmentSnapshot = serde_json::from_str(&content).map_err(|e| {
            RadError::SnapshotFetch(format!("failed to parse {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(
            "Loaded snapshot from {}: {} patients, {} studies, {} appointments",
            self.path.display(),
            snapshot.patients.len(),
            snapshot.studies.len(),
            snapshot.appointments.len()
        );
        Ok(snapshot)
    }
}

/// 固定快照，用于演示和测试
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    snapshot: DepartmentSnapshot,
}

impl StaticSource {
    pub fn new(snapshot: DepartmentSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl SnapshotSource for StaticSource {
    async fn fetch_snapshot(&self) -> Result<DepartmentSnapshot> {
        Ok(self.snapshot.clone())
    }
}
