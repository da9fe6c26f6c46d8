//! 分诊服务主程序
//!
//! 读取科室快照，输出队列看板、安全告警和科室统计

use clap::Parser;
use rad_admin::{init_logging, ConfigManager, DashboardMetrics};
use rad_workflow::{DashboardView, JsonFileSource};
use tracing::{error, info};

/// 分诊服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "rad-server")]
#[command(about = "放射科检查队列分诊与临床安全引擎")]
struct Args {
    /// 科室快照 JSON 文件
    #[arg(short, long)]
    snapshot: String,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// 以 JSON 输出看板
    #[arg(long)]
    json: bool,

    /// 输出 Prometheus 指标
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let manager = match &args.config {
        Some(path) => ConfigManager::new(path)?,
        None => ConfigManager::with_defaults()?,
    };
    let mut config = manager.get_config().await;
    if let Some(level) = args.log_level.clone() {
        config.logging.level = level;
    }

    // 初始化日志
    init_logging(&config.logging)?;

    info!("启动分诊服务...");
    info!("  快照文件: {}", args.snapshot);
    info!("  等待告警阈值: {} 分钟", config.triage.wait_alert_minutes);
    info!("  取消延迟阈值: {} 分钟", config.triage.cancellation_delay_minutes);
    info!("  完成检查需检查单: {}", config.checklist.require_for_completion);

    let mut engine = config.build_engine();
    if let Err(e) = engine.refresh(&JsonFileSource::new(&args.snapshot)).await {
        error!("快照加载失败: {}", e);
        return Err(e.into());
    }

    let view = engine.dashboard(chrono::Utc::now());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_dashboard(&view);
    }

    if args.metrics {
        let metrics = DashboardMetrics::new()?;
        metrics.record(&view);
        print!("{}", metrics.render()?);
    }

    Ok(())
}

fn print_dashboard(view: &DashboardView) {
    println!("看板时间: {}", view.generated_at.to_rfc3339());

    println!("\n队列:");
    for (name, studies) in view.queues.buckets() {
        println!("  {:<12} {}", name, studies.len());
        for study in studies {
            println!(
                "    {} {} {} ({})",
                study.accession_number,
                study.modality,
                study.status,
                study.scheduled_at.format("%H:%M")
            );
        }
    }

    println!("\n告警:");
    if view.alerts.is_empty() {
        println!("  无");
    }
    for alert in &view.alerts {
        println!("  [{:?}] {}", alert.kind, alert.message);
    }

    println!("\n技师负载:");
    let mut staff: Vec<_> = view.staff_load.iter().collect();
    staff.sort_by(|a, b| a.0.cmp(b.0));
    for (technologist, load) in staff {
        println!(
            "  {:<16} 分配 {:>3}  完成 {:>3}  进行中 {:>3}",
            technologist, load.assigned, load.completed, load.in_progress
        );
    }

    let analytics = &view.analytics;
    println!("\n统计:");
    println!("  已完成检查: {}", analytics.total_scanned);
    println!("  平均等待: {} 分钟", analytics.average_wait_time_minutes);
    println!("  爽约率: {:.1}%", analytics.no_show_rate);
    for peak in &analytics.peak_hours {
        println!("  高峰 {:02}:00 - {} 个检查", peak.hour, peak.count);
    }
}
