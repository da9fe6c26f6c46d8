//! 分诊引擎演示程序
//!
//! 构建一个科室快照，展示队列分类、安全告警、人员负载，以及检查单对完成检查的拦截

use chrono::{Duration, Utc};
use rad_core::utils::generate_accession_number;
use rad_core::{Modality, Patient, Priority, Study, StudyStatus};
use rad_workflow::{
    ChecklistItemStatus, ChecklistItemType, ChecklistItemUpdate, DepartmentSnapshot, StaticSource,
    StudyEvent, TriageEngine,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🚀 放射科分诊引擎演示\n");

    let now = Utc::now();
    let snapshot = create_sample_snapshot(now);
    let ct_study_id = snapshot.studies[2].id;

    let mut engine = TriageEngine::default();
    engine.refresh(&StaticSource::new(snapshot)).await?;
    println!("✅ 载入了 {} 个检查", engine.studies().len());

    // 1. 看板
    let view = engine.dashboard(now);
    println!("\n📊 队列概览:");
    for (name, studies) in view.queues.buckets() {
        println!("   {}: {}", name, studies.len());
    }

    println!("\n🚨 安全告警 ({} 条):", view.alerts.len());
    for alert in &view.alerts {
        println!("   [{:?}] {}", alert.kind, alert.message);
    }

    println!("\n👩‍⚕️ 技师负载:");
    for (technologist, load) in &view.staff_load {
        println!(
            "   {}: 分配 {} / 完成 {} / 进行中 {} ({:.0}%)",
            technologist,
            load.assigned,
            load.completed,
            load.in_progress,
            load.completion_ratio() * 100.0
        );
    }

    println!("\n📈 科室统计:");
    println!("   已完成: {}", view.analytics.total_scanned);
    println!("   平均等待: {} 分钟", view.analytics.average_wait_time_minutes);
    println!("   爽约率: {:.1}%", view.analytics.no_show_rate);

    // 2. 检查单拦截
    println!("\n📋 增强 CT 安全检查单:");
    let checklist = engine
        .start_checklist_for_study(ct_study_id, "tech.lee")
        .ok_or_else(|| anyhow::anyhow!("study not found"))?;

    for item in &checklist.items {
        let update = match item.item_type {
            ChecklistItemType::RenalFunction => {
                ChecklistItemUpdate::status(ChecklistItemStatus::Completed).with_value("45")
            }
            _ if item.is_required => ChecklistItemUpdate::status(ChecklistItemStatus::Completed),
            _ => ChecklistItemUpdate::status(ChecklistItemStatus::NotApplicable),
        };
        engine.update_checklist_item(checklist.id, item.id, update, "nurse.park");
    }

    match engine.transition_study(ct_study_id, StudyEvent::Complete, "tech.lee", now) {
        Ok(status) => println!("   检查状态: {:?}", status),
        Err(e) => println!("   ❌ 无法完成检查: {}", e),
    }

    if let Some(renal) = checklist.item_by_type(ChecklistItemType::RenalFunction) {
        engine.update_checklist_item(
            checklist.id,
            renal.id,
            ChecklistItemUpdate::default().with_value("72").with_notes("复查 eGFR"),
            "nurse.park",
        );
    }

    let status = engine.transition_study(ct_study_id, StudyEvent::Complete, "tech.lee", now)?;
    println!("   ✅ 复查后检查状态: {:?}", status);
    if engine.complete_checklist(checklist.id, "tech.lee") {
        println!("   ✅ 检查单已归档");
    }

    let view = engine.dashboard(now);
    println!("\n📊 更新后已完成: {}", view.queues.completed.len());

    Ok(())
}

fn create_sample_snapshot(now: chrono::DateTime<Utc>) -> DepartmentSnapshot {
    let child = patient("MRN-1001", "Mia Chen", 7, &[]);
    let adult = patient("MRN-1002", "Omar Haddad", 58, &["Iodine contrast"]);
    let senior = patient("MRN-1003", "Grace Liu", 71, &[]);

    let studies = vec![
        study(&child, Modality::Mri, StudyStatus::Scheduled, now - Duration::minutes(50), None),
        with_contrast(study(
            &adult,
            Modality::Ct,
            StudyStatus::Scheduled,
            now - Duration::minutes(10),
            None,
        )),
        with_contrast(study(
            &senior,
            Modality::Ct,
            StudyStatus::InProgress,
            now - Duration::minutes(20),
            Some("tech.lee"),
        )),
        study(
            &senior,
            Modality::XRay,
            StudyStatus::Completed,
            now - Duration::minutes(90),
            Some("tech.lee"),
        ),
        study(
            &adult,
            Modality::Ultrasound,
            StudyStatus::Cancelled,
            now - Duration::minutes(120),
            None,
        ),
        study(&child, Modality::XRay, StudyStatus::NoShow, now - Duration::minutes(200), None),
    ];

    DepartmentSnapshot {
        patients: vec![child, adult, senior],
        studies,
        appointments: Vec::new(),
    }
}

fn patient(mrn: &str, name: &str, age: u32, allergies: &[&str]) -> Patient {
    Patient {
        id: Uuid::new_v4(),
        medical_record_number: mrn.to_string(),
        name: name.to_string(),
        age,
        allergies: allergies.iter().map(|a| a.to_string()).collect(),
    }
}

fn study(
    patient: &Patient,
    modality: Modality,
    status: StudyStatus,
    scheduled_at: chrono::DateTime<Utc>,
    technologist: Option<&str>,
) -> Study {
    Study {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        accession_number: generate_accession_number(scheduled_at),
        modality,
        priority: Priority::Routine,
        status,
        scheduled_at,
        ended_at: None,
        special_instructions: None,
        contrast_required: false,
        sedation_required: false,
        technologist: technologist.map(str::to_string),
        radiologist: None,
        description: None,
    }
}

fn with_contrast(mut study: Study) -> Study {
    study.contrast_required = true;
    study
}
