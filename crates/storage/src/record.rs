use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Lifecycle of an execution.
///
/// `Processing` is transient: it is entered when a processing run starts and
/// left on completion (`EmailSent`), cancellation, or failure (`Draft`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Draft,
    Processing,
    EmailSent,
    VendorResponded,
    AgentConversation,
    Completed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Draft => "draft",
            ExecutionStatus::Processing => "processing",
            ExecutionStatus::EmailSent => "email_sent",
            ExecutionStatus::VendorResponded => "vendor_responded",
            ExecutionStatus::AgentConversation => "agent_conversation",
            ExecutionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ExecutionStatus::Draft),
            "processing" => Ok(ExecutionStatus::Processing),
            "email_sent" => Ok(ExecutionStatus::EmailSent),
            "vendor_responded" => Ok(ExecutionStatus::VendorResponded),
            "agent_conversation" => Ok(ExecutionStatus::AgentConversation),
            "completed" => Ok(ExecutionStatus::Completed),
            other => Err(format!("unknown execution status '{}'", other)),
        }
    }
}

/// Where a single vendor stands in the outreach conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    Pending,
    Contacted,
    Responded,
    Conversation,
    Shortlisted,
    Rejected,
}

/// Identifier of a material line item.
///
/// Clients send numbers or strings; the importer assigns sequential numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaterialId {
    Seq(u64),
    Key(String),
}

/// A raw material line item. `total_cost` is `quantity * rate` unless a CSV
/// import supplied its own cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MaterialId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub total_cost: f64,
}

impl Material {
    pub fn new(id: Option<MaterialId>, name: impl Into<String>, quantity: f64, rate: f64) -> Self {
        Self {
            id,
            name: name.into(),
            quantity,
            rate,
            total_cost: quantity * rate,
        }
    }

    /// Re-derive `total_cost` from quantity and rate.
    pub fn recompute_total(&mut self) {
        self.total_cost = self.quantity * self.rate;
    }
}

/// Constraints applied to vendor selection for one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardrails {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_price_per_kg: Option<f64>,
    /// Delivery window in days.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub delivery_timeline: Option<u32>,
    #[serde(default)]
    pub certifications: Vec<String>,
    /// Keys this model does not know about (e.g. `vendorRating`), kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Accepts a JSON number, a numeric string, an empty string, or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, got '{}'", s))),
        Some(other) => Err(D::Error::custom(format!("expected a number, got {}", other))),
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a whole number of days, got {}", n))),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a whole number of days, got '{}'", s))),
        Some(other) => Err(D::Error::custom(format!(
            "expected a whole number of days, got {}",
            other
        ))),
    }
}

/// Outcome of surveying vendors for one material during a processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialResult {
    pub material: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_price: Option<f64>,
    /// Days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastest_delivery: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MaterialResult {
    pub fn quoted(
        material: impl Into<String>,
        vendor_count: u32,
        best_price: f64,
        fastest_delivery: u32,
    ) -> Self {
        Self {
            material: material.into(),
            success: true,
            vendor_count: Some(vendor_count),
            best_price: Some(best_price),
            fastest_delivery: Some(fastest_delivery),
            error: None,
        }
    }

    pub fn failed(material: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            success: false,
            vendor_count: None,
            best_price: None,
            fastest_delivery: None,
            error: Some(error.into()),
        }
    }
}

/// Progress of the current (or last) processing run.
///
/// Invariant: `processed_count <= total_count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    pub current_material: String,
    pub processed_count: usize,
    pub total_count: usize,
    pub is_processing: bool,
    pub results: Vec<MaterialResult>,
}

impl ProcessingStatus {
    pub fn idle(total_count: usize) -> Self {
        Self {
            total_count,
            ..Self::default()
        }
    }

    /// Fresh status for a run that is about to start.
    pub fn started(total_count: usize) -> Self {
        Self {
            total_count,
            is_processing: true,
            ..Self::default()
        }
    }
}

/// A vendor contacted on behalf of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub price: Option<f64>,
    /// Days.
    pub delivery_time: u32,
    pub certifications: Vec<String>,
    pub status: VendorStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub response_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub notes: String,
}

/// One procurement run for a named set of materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub materials: Vec<Material>,
    #[serde(default)]
    pub guardrails: Guardrails,
    pub status: ExecutionStatus,
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub vendors: Vec<Vendor>,
    pub vendors_contacted: u32,
    pub vendors_responded: u32,
    pub active_conversations: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Execution {
    /// A new `draft` execution with derived material totals and zeroed counters.
    pub fn draft(
        id: impl Into<String>,
        name: impl Into<String>,
        mut materials: Vec<Material>,
        guardrails: Guardrails,
        now: OffsetDateTime,
    ) -> Self {
        materials.iter_mut().for_each(Material::recompute_total);
        let total = materials.len();
        Self {
            id: id.into(),
            name: name.into(),
            materials,
            guardrails,
            status: ExecutionStatus::Draft,
            processing_status: ProcessingStatus::idle(total),
            vendors: Vec::new(),
            vendors_contacted: 0,
            vendors_responded: 0,
            active_conversations: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.materials.iter().map(|m| m.total_cost).sum()
    }
}

/// Kind of state change recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    Updated,
    EmailSent,
    VendorResponse,
    ConversationStarted,
}

/// A human-readable line in the recent-activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub execution_name: String,
    pub activity_type: ActivityKind,
    pub details: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}
