//! 看板指标
//!
//! 把看板视图导出为 Prometheus 指标

use anyhow::{Context, Result};
use prometheus::{Encoder, Gauge, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::debug;

use rad_workflow::{AlertKind, DashboardView};

/// 看板指标收集器
#[derive(Debug)]
pub struct DashboardMetrics {
    registry: Registry,
    /// 各队列当前数量
    queue_size: IntGaugeVec,
    /// 各级别告警数量
    alerts: IntGaugeVec,
    total_scanned: IntGauge,
    average_wait_minutes: IntGauge,
    /// 百分比
    no_show_rate: Gauge,
}

impl DashboardMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let queue_size = IntGaugeVec::new(
            Opts::new("rad_queue_size", "Number of studies per queue bucket"),
            &["queue"],
        )?;
        let alerts = IntGaugeVec::new(
            Opts::new("rad_alerts", "Number of active alerts per kind"),
            &["kind"],
        )?;
        let total_scanned = IntGauge::new("rad_total_scanned", "Number of completed studies")?;
        let average_wait_minutes = IntGauge::new(
            "rad_average_wait_minutes",
            "Average wait of completed studies in minutes",
        )?;
        let no_show_rate = Gauge::new("rad_no_show_rate_percent", "Share of no-show studies")?;

        registry.register(Box::new(queue_size.clone()))?;
        registry.register(Box::new(alerts.clone()))?;
        registry.register(Box::new(total_scanned.clone()))?;
        registry.register(Box::new(average_wait_minutes.clone()))?;
        registry.register(Box::new(no_show_rate.clone()))?;

        Ok(Self {
            registry,
            queue_size,
            alerts,
            total_scanned,
            average_wait_minutes,
            no_show_rate,
        })
    }

    /// 用最新看板覆盖所有指标
    pub fn record(&self, view: &DashboardView) {
        for (name, studies) in view.queues.buckets() {
            self.queue_size.with_label_values(&[name]).set(studies.len() as i64);
        }

        let counts = view.alert_counts();
        for kind in [AlertKind::Error, AlertKind::Warning, AlertKind::Info, AlertKind::Success] {
            let count = counts.get(&kind).copied().unwrap_or(0);
            self.alerts.with_label_values(&[kind_label(kind)]).set(count as i64);
        }

        self.total_scanned.set(view.analytics.total_scanned as i64);
        self.average_wait_minutes.set(view.analytics.average_wait_time_minutes);
        self.no_show_rate.set(view.analytics.no_show_rate);

        debug!("Dashboard metrics recorded at {}", view.generated_at);
    }

    /// 文本格式导出
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
    }
}

fn kind_label(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Error => "error",
        AlertKind::Warning => "warning",
        AlertKind::Info => "info",
        AlertKind::Success => "success",
    }
}
