use super::*;

// =============================================================
// Helpers
// =============================================================

fn finding_json(id: serde_json::Value, risk: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": "Leaked credentials",
        "content": "<p>Dump posted</p>",
        "url": "https://paste.example/abc",
        "risk_level": risk,
        "status": status,
        "sentiment": -0.4,
    })
}

// =============================================================
// RecordId
// =============================================================

#[test]
fn record_id_accepts_string_and_number() {
    let from_str: RecordId = serde_json::from_value(serde_json::json!("doc-7")).unwrap();
    let from_num: RecordId = serde_json::from_value(serde_json::json!(42)).unwrap();
    assert_eq!(from_str.as_str(), "doc-7");
    assert_eq!(from_num, RecordId::from(42_u64));
    assert_eq!(from_num.to_string(), "42");
}

#[test]
fn record_id_serializes_as_string() {
    assert_eq!(serde_json::to_string(&RecordId::from(7_u64)).unwrap(), "\"7\"");
}

// =============================================================
// Finding
// =============================================================

#[test]
fn finding_decodes_full_record() {
    let f: Finding = serde_json::from_value(finding_json(serde_json::json!(42), "critical", "escalated")).unwrap();
    assert_eq!(f.id, RecordId::from(42_u64));
    assert_eq!(f.risk_level, RiskLevel::Critical);
    assert_eq!(f.status, FindingStatus::Escalated);
    assert!((f.sentiment + 0.4).abs() < f64::EPSILON);
    assert!(f.published_date.is_none());
}

#[test]
fn finding_defaults_missing_fields() {
    let f: Finding = serde_json::from_value(serde_json::json!({ "id": "x" })).unwrap();
    assert_eq!(f.status, FindingStatus::New);
    assert_eq!(f.risk_level, RiskLevel::Low);
    assert!(f.title.is_empty());
}

#[test]
fn unknown_risk_and_status_fall_back() {
    let f: Finding = serde_json::from_value(finding_json(serde_json::json!("a"), "apocalyptic", "archived")).unwrap();
    assert_eq!(f.risk_level, RiskLevel::Unknown);
    assert_eq!(f.risk_level.rank(), 0);
    assert_eq!(f.status, FindingStatus::Other);
}

#[test]
fn humint_detection_uses_source_id() {
    let mut f: Finding = serde_json::from_value(finding_json(serde_json::json!("a"), "low", "new")).unwrap();
    assert!(!f.is_humint());
    f.source_id = Some(HUMINT_SOURCE_ID.to_owned());
    assert!(f.is_humint());
}

#[test]
fn can_apply_disables_current_status_only() {
    let mut f: Finding = serde_json::from_value(finding_json(serde_json::json!("a"), "low", "discarded")).unwrap();
    assert!(!f.can_apply(FindingStatus::Discarded));
    assert!(f.can_apply(FindingStatus::Escalated));
    assert!(!f.can_apply(FindingStatus::New));

    f.status = FindingStatus::New;
    assert!(f.can_apply(FindingStatus::Discarded));
    assert!(f.can_apply(FindingStatus::Escalated));
}

#[test]
fn risk_rank_orders_by_severity() {
    assert!(RiskLevel::Critical.rank() > RiskLevel::High.rank());
    assert!(RiskLevel::High.rank() > RiskLevel::Medium.rank());
    assert!(RiskLevel::Medium.rank() > RiskLevel::Low.rank());
}

#[test]
fn status_parses_cli_spellings() {
    assert_eq!("escalate".parse::<FindingStatus>().unwrap(), FindingStatus::Escalated);
    assert_eq!("Discarded".parse::<FindingStatus>().unwrap(), FindingStatus::Discarded);
    assert!("archived".parse::<FindingStatus>().is_err());
}

#[test]
fn status_update_serializes_lowercase() {
    let body = StatusUpdate { status: FindingStatus::Escalated };
    assert_eq!(serde_json::to_value(body).unwrap(), serde_json::json!({ "status": "escalated" }));
}

// =============================================================
// strip_html
// =============================================================

#[test]
fn strip_html_removes_tags_and_collapses_whitespace() {
    assert_eq!(strip_html("<p>Breach at <b>ACME</b></p>\n\n<br/>details"), "Breach at ACME details");
}

#[test]
fn strip_html_decodes_entities() {
    assert_eq!(strip_html("R&amp;D &lt;internal&gt; &quot;leak&quot;"), "R&D <internal> \"leak\"");
}

#[test]
fn strip_html_placeholder_for_empty() {
    assert_eq!(strip_html(""), "No description.");
    assert_eq!(strip_html("<div>  </div>"), "No description.");
}

// =============================================================
// Sources
// =============================================================

#[test]
fn new_source_defaults_to_rss_news() {
    let s = NewSource::new("BBC", "https://bbc.com/rss");
    assert_eq!(
        serde_json::to_value(&s).unwrap(),
        serde_json::json!({ "name": "BBC", "url": "https://bbc.com/rss", "category": "news", "type": "rss" })
    );
}

#[test]
fn source_decodes_type_field() {
    let s: Source = serde_json::from_value(serde_json::json!({
        "id": "s1", "name": "r/netsec", "url": "https://reddit.com/r/netsec", "type": "reddit"
    }))
    .unwrap();
    assert_eq!(s.kind, SourceKind::Reddit);
    assert_eq!(s.category, "news");
}

#[test]
fn source_unknown_type_is_other() {
    let s: Source = serde_json::from_value(serde_json::json!({ "id": 1, "name": "x", "url": "y", "type": "web" })).unwrap();
    assert_eq!(s.kind, SourceKind::Other);
}

// =============================================================
// Manual entries
// =============================================================

#[test]
fn manual_entry_omits_missing_url() {
    let entry = ManualEntry { title: "Tip".into(), content: "Observed".into(), ..ManualEntry::default() };
    assert_eq!(
        serde_json::to_value(&entry).unwrap(),
        serde_json::json!({ "title": "Tip", "content": "Observed", "risk_level": "low" })
    );
}

// =============================================================
// Admin
// =============================================================

#[test]
fn admin_stats_accepts_partial_distribution() {
    let stats: AdminStats = serde_json::from_value(serde_json::json!({
        "total_findings": 10,
        "risk_distribution": { "critical": 2, "high": 3 }
    }))
    .unwrap();
    assert_eq!(stats.system_health, "ONLINE");
    assert_eq!(stats.count(RiskLevel::Critical), 2);
    assert_eq!(stats.count(RiskLevel::Medium), 0);
    assert!((stats.share(RiskLevel::High) - 0.3).abs() < 1e-9);
}

#[test]
fn admin_stats_share_with_zero_total() {
    let stats = AdminStats::default();
    assert!(stats.share(RiskLevel::Critical).abs() < f64::EPSILON);
}

#[test]
fn admin_log_entry_tolerates_missing_id() {
    let entry: AdminLogEntry = serde_json::from_value(serde_json::json!({
        "timestamp": "2026-10-01T12:00:00Z", "user": "ops", "action": "DELETE_SOURCE", "details": "id 3"
    }))
    .unwrap();
    assert!(entry.id.is_none());
    assert_eq!(entry.action, "DELETE_SOURCE");
}

// =============================================================
// Export
// =============================================================

#[test]
fn export_file_names_use_fixed_prefix() {
    assert_eq!(ExportFormat::Pdf.file_name(), "sentinel_report.pdf");
    assert_eq!(ExportFormat::Csv.file_name(), "sentinel_report.csv");
    assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
}
