//! 通用工具函数

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 生成检查号，格式为 `ACC-YYYYMMDD-XXXXXXXX`
pub fn generate_accession_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("ACC-{}-{}", now.format("%Y%m%d"), suffix[..8].to_uppercase())
}

/// 从 `from` 到 `now` 经过的整分钟数（向下取整）
pub fn elapsed_minutes(from: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = now.signed_duration_since(from).num_milliseconds();
    millis.div_euclid(60_000)
}

/// 格式化数值，整数值不带小数部分
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
