//! Shared fixtures for unit tests.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

use precom_core::entities::{JointData, WeldingJoint};
use precom_core::lifecycle::Lifecycle;
use precom_core::ndt::NdtResults;
use precom_db::PrecomDb;

pub const CSV_HEADER: &str =
    "DrawingNumber,WeldJoint,SystemCode,SubSystemCode,TestPackageID,WeldDate,Size,VT,RT";

pub async fn test_db() -> PrecomDb {
    PrecomDb::open_local(":memory:").await.unwrap()
}

pub fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, day, 8, 0, 0).unwrap()
}

/// Write `WeldingDB_{name}.csv` with [`CSV_HEADER`] and `rows`.
pub fn write_export(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(format!("WeldingDB_{name}.csv"));
    let mut body = String::from(CSV_HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    body.push('\n');
    std::fs::write(&path, body).unwrap();
    path
}

pub fn joint_data(drawing: &str, joint: &str, package: &str) -> JointData {
    JointData {
        drawing_number: drawing.into(),
        weld_joint: joint.into(),
        page_number: None,
        pipeline_number: None,
        revision: None,
        contractor: None,
        system_code: "S1".into(),
        subsystem_code: "S1-A".into(),
        test_package_id: Some(package.into()),
        weld_date: None,
        size: Some(2.0),
        results: NdtResults::default(),
    }
}

pub fn joint(data: JointData, now: DateTime<Utc>) -> WeldingJoint {
    WeldingJoint {
        weld_id: data.key().weld_id(),
        data,
        is_manually_modified: false,
        lifecycle: Lifecycle::Active,
        last_sync_time: Some(now),
        created_at: now,
        updated_at: now,
    }
}
