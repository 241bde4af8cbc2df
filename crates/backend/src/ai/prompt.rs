//! Prompt construction and response parsing for email analysis.

use chrono::{DateTime, NaiveDate, Utc};
use ideabox_types::{
    ActionExtraction, ActionPriority, ActionType, ClientMatch, EmailCategory,
};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use uuid::Uuid;

use super::{ModelAnalysis, ModelError};
use crate::models::{AnalysisContext, Email};

const DEFAULT_CLIENT_CONFIDENCE: f32 = 0.5;

pub fn system_prompt(context: &AnalysisContext) -> String {
    let categories = EmailCategory::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let clients = if context.clients.is_empty() {
        "(none)".to_string()
    } else {
        context
            .clients
            .iter()
            .map(|c| {
                let mut line = format!("- id={} name=\"{}\"", c.id, c.name);
                if let Some(company) = &c.company {
                    line.push_str(&format!(" company=\"{}\"", company));
                }
                if let Some(email) = &c.email {
                    line.push_str(&format!(" email={}", email));
                }
                if !c.domains.is_empty() {
                    line.push_str(&format!(" domains={}", c.domains.join(",")));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are an assistant that triages a busy professional's inbox.
Classify the email into exactly one category from: [{categories}].
Decide whether the email asks the reader to do something. If it does, extract one action.
If the email clearly comes from or concerns one of the known clients below, return that client's id.

Known clients:
{clients}

Respond only with a JSON object of this shape:
{{
  "category": "<category>",
  "summary": "<one sentence>",
  "topics": ["<topic>", ...],
  "action": {{
    "has_action": true|false,
    "title": "<short imperative title or null>",
    "description": "<details or null>",
    "action_type": "respond|review|create|schedule|decide|follow_up|other",
    "priority": "low|medium|high|urgent",
    "urgency_score": <1-10>,
    "due_date": "<ISO 8601 date or null>",
    "estimated_minutes": <integer or null>
  }},
  "client": {{ "id": "<client id or null>", "name": "<client name or null>", "confidence": <0-1> }}
}}"#
    )
}

pub fn user_prompt(email: &Email, max_body_chars: usize) -> String {
    let body = email
        .body_text
        .as_deref()
        .or(email.snippet.as_deref())
        .unwrap_or("");
    let body: String = body.chars().take(max_body_chars).collect();
    let from = match &email.sender_name {
        Some(name) => format!("{} <{}>", name, email.sender_email),
        None => email.sender_email.clone(),
    };

    format!(
        "<from>{}</from>\n<subject>{}</subject>\n<received>{}</received>\n<body>{}</body>",
        from,
        email.subject.as_deref().unwrap_or(""),
        email.received_at.to_rfc3339(),
        body
    )
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    category: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    action: Option<RawAction>,
    client: Option<RawClient>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(default)]
    has_action: bool,
    title: Option<String>,
    description: Option<String>,
    action_type: Option<String>,
    priority: Option<String>,
    urgency_score: Option<f64>,
    due_date: Option<String>,
    estimated_minutes: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawClient {
    id: Option<String>,
    name: Option<String>,
    confidence: Option<f32>,
}

fn code_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("valid code fence regex")
    })
}

/// Parse the assistant message content into a `ModelAnalysis`.
///
/// Client matches are only kept when they resolve to a client in `context`.
pub fn parse_analysis(
    content: &str,
    tokens_used: u32,
    context: &AnalysisContext,
) -> Result<ModelAnalysis, ModelError> {
    let json = match code_fence().captures(content) {
        Some(caps) => caps.get(1).map_or(content, |m| m.as_str()),
        None => content,
    };

    let raw: RawAnalysis = serde_json::from_str(json.trim())
        .map_err(|e| ModelError::Malformed(format!("{}: {}", e, truncate(content, 200))))?;

    Ok(ModelAnalysis {
        category: raw.category.as_deref().map(EmailCategory::from_label),
        action: raw.action.map(into_extraction).unwrap_or_default(),
        client_match: raw.client.and_then(|c| resolve_client(c, context)),
        summary: raw.summary.filter(|s| !s.trim().is_empty()),
        topics: raw.topics,
        tokens_used,
    })
}

fn into_extraction(raw: RawAction) -> ActionExtraction {
    if !raw.has_action {
        return ActionExtraction::default();
    }

    ActionExtraction {
        has_action: true,
        title: raw.title.filter(|t| !t.trim().is_empty()),
        description: raw.description,
        action_type: raw
            .action_type
            .as_deref()
            .map(|t| ActionType::from_str(&t.to_lowercase()).unwrap_or(ActionType::Other)),
        priority: raw
            .priority
            .as_deref()
            .and_then(|p| ActionPriority::from_str(&p.to_lowercase())),
        urgency_score: raw.urgency_score.map(|s| s.round().clamp(1.0, 10.0) as u8),
        due_date: raw.due_date.as_deref().and_then(parse_due_date),
        estimated_minutes: raw
            .estimated_minutes
            .filter(|m| *m > 0.0)
            .map(|m| m.round() as u32),
    }
}

fn resolve_client(raw: RawClient, context: &AnalysisContext) -> Option<ClientMatch> {
    let by_id = raw
        .id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok())
        .and_then(|id| context.find_client(id));

    let client = by_id.or_else(|| {
        let name = raw.name.as_deref()?.trim().to_lowercase();
        context
            .clients
            .iter()
            .find(|c| c.name.to_lowercase() == name)
    })?;

    Some(ClientMatch {
        client_id: client.id,
        client_name: client.name.clone(),
        confidence: raw
            .confidence
            .unwrap_or(DEFAULT_CLIENT_CONFIDENCE)
            .clamp(0.0, 1.0),
    })
}

fn parse_due_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
