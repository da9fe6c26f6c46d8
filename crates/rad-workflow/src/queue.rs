//! 检查队列分类
//!
//! 将检查快照划分为候检、检查中、已完成、延误、未到检五个互斥队列

use chrono::{DateTime, Duration, Utc};
use rad_core::{Study, StudyStatus};
use serde::{Deserialize, Serialize};

use crate::rules::TriageRules;

/// 队列分类结果，每个队列按预约时间升序
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueBuckets {
    pub waiting: Vec<Study>,     // 候检
    pub in_progress: Vec<Study>, // 检查中
    pub completed: Vec<Study>,   // 已完成
    pub delayed: Vec<Study>,     // 延误
    pub no_show: Vec<Study>,     // 未到检
}

impl QueueBuckets {
    /// 所有队列中的检查总数
    pub fn total(&self) -> usize {
        self.waiting.len()
            + self.in_progress.len()
            + self.completed.len()
            + self.delayed.len()
            + self.no_show.len()
    }

    /// 按显示顺序返回 (队列名, 检查列表)
    pub fn buckets(&self) -> [(&'static str, &[Study]); 5] {
        [
            ("waiting", self.waiting.as_slice()),
            ("in_progress", self.in_progress.as_slice()),
            ("completed", self.completed.as_slice()),
            ("delayed", self.delayed.as_slice()),
            ("no_show", self.no_show.as_slice()),
        ]
    }
}

/// 对检查快照进行队列分类
///
/// 先按预约时间稳定排序，再逐个归类。已取消的检查若距预约时间超过阈值则归入延误队列，
/// 否则归入未到检队列。`Reported`、`Verified`、`NoShow` 等状态不归入任何队列。
pub fn classify(studies: &[Study], now: DateTime<Utc>, rules: &TriageRules) -> QueueBuckets {
    let mut ordered: Vec<&Study> = studies.iter().collect();
    ordered.sort_by_key(|study| study.scheduled_at);

    let delay_threshold = Duration::minutes(rules.cancellation_delay_minutes);
    let mut buckets = QueueBuckets::default();

    for study in ordered {
        match study.status {
            StudyStatus::Scheduled => buckets.waiting.push(study.clone()),
            StudyStatus::InProgress => buckets.in_progress.push(study.clone()),
            StudyStatus::Completed => buckets.completed.push(study.clone()),
            StudyStatus::Cancelled => {
                if now.signed_duration_since(study.scheduled_at) > delay_threshold {
                    buckets.delayed.push(study.clone());
                } else {
                    buckets.no_show.push(study.clone());
                }
            }
            other => {
                tracing::debug!("Study {} with status {} is not queued", study.id, other);
            }
        }
    }

    buckets
}
