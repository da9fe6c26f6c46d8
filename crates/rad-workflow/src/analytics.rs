//! 人员负载与科室统计

use chrono::{DateTime, Timelike, Utc};
use rad_core::{Study, StudyStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 技师工作负载
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaffLoad {
    pub assigned: usize,
    pub completed: usize,
    pub in_progress: usize,
}

impl StaffLoad {
    /// 完成比例，未分配任何检查时为 0
    pub fn completion_ratio(&self) -> f64 {
        if self.assigned == 0 {
            0.0
        } else {
            self.completed as f64 / self.assigned as f64
        }
    }
}

/// 高峰时段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeakHour {
    pub hour: u32, // 0-23
    pub count: usize,
}

/// 科室统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DepartmentAnalytics {
    pub total_scanned: usize,
    pub average_wait_time_minutes: i64,
    pub no_show_rate: f64, // 百分比
    pub peak_hours: Vec<PeakHour>,
}

/// 聚合结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aggregation {
    pub staff_load: HashMap<String, StaffLoad>,
    pub analytics: DepartmentAnalytics,
}

/// 计算技师负载与科室统计
pub fn aggregate(studies: &[Study], now: DateTime<Utc>, peak_hour_count: usize) -> Aggregation {
    Aggregation {
        staff_load: staff_load(studies),
        analytics: analytics(studies, now, peak_hour_count),
    }
}

/// 按技师统计工作负载
///
/// 每个有技师的检查都计入 `assigned`，状态匹配时再计入 `completed` 或 `in_progress`。
pub fn staff_load(studies: &[Study]) -> HashMap<String, StaffLoad> {
    let mut loads: HashMap<String, StaffLoad> = HashMap::new();

    for study in studies {
        let Some(technologist) = study.technologist.as_ref() else {
            continue;
        };

        let load = loads.entry(technologist.clone()).or_default();
        load.assigned += 1;
        match study.status {
            StudyStatus::Completed => load.completed += 1,
            StudyStatus::InProgress => load.in_progress += 1,
            _ => {}
        }
    }

    loads
}

/// 计算科室统计
pub fn analytics(
    studies: &[Study],
    now: DateTime<Utc>,
    peak_hour_count: usize,
) -> DepartmentAnalytics {
    let completed: Vec<&Study> = studies
        .iter()
        .filter(|study| study.status == StudyStatus::Completed)
        .collect();

    // 平均等待时间：(结束时间或当前时间) - 预约时间
    let average_wait_time_minutes = if completed.is_empty() {
        0
    } else {
        let total_millis: i64 = completed
            .iter()
            .map(|study| {
                study
                    .ended_at
                    .unwrap_or(now)
                    .signed_duration_since(study.scheduled_at)
                    .num_milliseconds()
            })
            .sum();
        let mean_minutes = total_millis as f64 / completed.len() as f64 / 60_000.0;
        mean_minutes.round() as i64
    };

    let no_show_count = studies
        .iter()
        .filter(|study| study.status == StudyStatus::NoShow)
        .count();
    let no_show_rate = if studies.is_empty() {
        0.0
    } else {
        no_show_count as f64 / studies.len() as f64 * 100.0
    };

    DepartmentAnalytics {
        total_scanned: completed.len(),
        average_wait_time_minutes,
        no_show_rate,
        peak_hours: peak_hours(studies, peak_hour_count),
    }
}

/// 按预约小时统计频次，返回前 `limit` 个，频次相同时小时小的在前
pub fn peak_hours(studies: &[Study], limit: usize) -> Vec<PeakHour> {
    let mut counts = [0usize; 24];
    for study in studies {
        counts[study.scheduled_at.hour() as usize] += 1;
    }

    let mut hours: Vec<PeakHour> = counts
        .into_iter()
        .enumerate()
        .filter(|(_, count)| *count > 0)
        .map(|(hour, count)| PeakHour {
            hour: hour as u32,
            count,
        })
        .collect();

    // 稳定排序，保持小时升序
    hours.sort_by(|a, b| b.count.cmp(&a.count));
    hours.truncate(limit);
    hours
}
