//! Wire DTOs for the backend REST surface.
//!
//! DESIGN
//! ======
//! Decoding is lenient: ids may arrive as strings or numbers, optional fields
//! default, and unknown enum strings map to a catch-all variant so one odd
//! record cannot fail a whole list fetch.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `source_id` the backend stamps on operator-entered findings.
pub const HUMINT_SOURCE_ID: &str = "human_intelligence";

/// Base name of exported report files.
pub const REPORT_FILE_PREFIX: &str = "sentinel_report";

// =============================================================================
// IDS
// =============================================================================

/// Opaque backend record id. Firestore document ids are strings, older
/// endpoints emit integers; both normalize to a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Int(n) => Self(n.to_string()),
            Raw::Float(n) => Self(n.to_string()),
        })
    }
}

// =============================================================================
// FINDINGS
// =============================================================================

/// Severity attached to a finding by the backend analyzer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
    /// Any level string this build does not know.
    #[serde(other)]
    Unknown,
}

impl RiskLevel {
    /// Severity rank used for triage ordering. Unknown levels rank with `low`.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 3,
            Self::High => 2,
            Self::Medium => 1,
            Self::Low | Self::Unknown => 0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown risk level '{other}'")),
        }
    }
}

/// Triage state of a finding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    #[default]
    New,
    Discarded,
    Escalated,
    /// Backend status this build does not know; sorts with the reviewed ones.
    #[serde(other)]
    Other,
}

impl FindingStatus {
    /// True for the two statuses an operator may assign.
    #[must_use]
    pub fn is_triage(self) -> bool {
        matches!(self, Self::Discarded | Self::Escalated)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Discarded => "discarded",
            Self::Escalated => "escalated",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FindingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "discarded" | "discard" => Ok(Self::Discarded),
            "escalated" | "escalate" => Ok(Self::Escalated),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// A single intelligence item as served by `GET /findings`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: RecordId,
    #[serde(default)]
    pub title: String,
    /// Raw, possibly HTML-bearing body text.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub status: FindingStatus,
    #[serde(default)]
    pub sentiment: f64,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
}

impl Finding {
    /// Whether an operator entered this finding by hand.
    #[must_use]
    pub fn is_humint(&self) -> bool {
        self.source_id.as_deref() == Some(HUMINT_SOURCE_ID)
    }

    /// Whether applying `status` would change anything. The action that
    /// reasserts the current status is disabled.
    #[must_use]
    pub fn can_apply(&self, status: FindingStatus) -> bool {
        status.is_triage() && self.status != status
    }

    /// Body text with markup removed and whitespace collapsed.
    #[must_use]
    pub fn plain_content(&self) -> String {
        strip_html(&self.content)
    }
}

/// Remove tags, decode the handful of entities feeds actually use, and
/// collapse runs of whitespace. Empty input yields a placeholder.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() { "No description.".to_owned() } else { collapsed }
}

/// Body of `POST /findings/manual`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualEntry {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Body of `PATCH /findings/{id}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: FindingStatus,
}

// =============================================================================
// SOURCES
// =============================================================================

/// Feed type the backend scraper understands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Rss,
    Reddit,
    #[serde(other)]
    Other,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rss" => Ok(Self::Rss),
            "reddit" => Ok(Self::Reddit),
            other => Err(format!("unknown source type '{other}'")),
        }
    }
}

fn default_category() -> String {
    "news".to_owned()
}

/// A configured intelligence source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
}

/// Body of `POST /sources`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
}

impl NewSource {
    /// A source with the default category (`news`) and type (`rss`).
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into(), category: default_category(), kind: SourceKind::Rss }
    }
}

impl Default for NewSource {
    fn default() -> Self {
        Self::new("", "")
    }
}

// =============================================================================
// ADMIN
// =============================================================================

/// One audit-log line from `GET /admin/logs`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminLogEntry {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub details: String,
}

/// Per-level finding counts. Older backends omit `medium` and `low`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDistribution {
    #[serde(default)]
    pub critical: u64,
    #[serde(default)]
    pub high: u64,
    #[serde(default)]
    pub medium: Option<u64>,
    #[serde(default)]
    pub low: Option<u64>,
}

fn default_health() -> String {
    "ONLINE".to_owned()
}

/// Aggregate snapshot from `GET /admin/stats`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub total_findings: u64,
    #[serde(default = "default_health")]
    pub system_health: String,
    #[serde(default)]
    pub risk_distribution: RiskDistribution,
}

impl Default for AdminStats {
    fn default() -> Self {
        Self { total_findings: 0, system_health: default_health(), risk_distribution: RiskDistribution::default() }
    }
}

impl AdminStats {
    /// Count of findings at `level`, zero when the backend omitted it.
    #[must_use]
    pub fn count(&self, level: RiskLevel) -> u64 {
        let d = &self.risk_distribution;
        match level {
            RiskLevel::Critical => d.critical,
            RiskLevel::High => d.high,
            RiskLevel::Medium => d.medium.unwrap_or(0),
            RiskLevel::Low => d.low.unwrap_or(0),
            RiskLevel::Unknown => 0,
        }
    }

    /// Fraction of all findings at `level`, in `0.0..=1.0` for sane data.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn share(&self, level: RiskLevel) -> f64 {
        self.count(level) as f64 / self.total_findings.max(1) as f64
    }
}

// =============================================================================
// EXPORT
// =============================================================================

/// Report formats the backend can render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Pdf,
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Csv => "csv",
        }
    }

    /// Local file name for the downloaded report.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{REPORT_FILE_PREFIX}.{}", self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}
