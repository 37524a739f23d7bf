//! Study plan models
//!
//! A plan's `content` maps a day label ("Day 1", ...) to the items scheduled
//! that day. Day order is the backend's insertion order.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_ITEM_MINUTES: u32 = 30;

/// Saved personal study plan. `id` is absent for unsaved previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlan {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

/// One scheduled item within a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Hand-edited plans may carry `"45"`, `22.5` or `-10`; none of them should
/// drop the item. Anything unusable reads as unset.
fn lenient_minutes<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

impl PlanItem {
    /// Whole minutes, at least one. Unset, zero or negative durations use
    /// the default.
    pub fn minutes(&self) -> u32 {
        match self.duration {
            Some(d) if d.is_finite() && d > 0.0 => (d.round() as u32).max(1),
            _ => DEFAULT_ITEM_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanDay {
    pub label: String,
    pub items: Vec<PlanItem>,
}

impl StudyPlan {
    /// Days in content order. Malformed items are skipped.
    pub fn days(&self) -> Vec<PlanDay> {
        self.content
            .iter()
            .map(|(label, items)| PlanDay {
                label: label.clone(),
                items: items
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| serde_json::from_value(v.clone()).ok())
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect()
    }

    pub fn total_minutes(&self) -> u32 {
        self.days()
            .iter()
            .flat_map(|d| d.items.iter())
            .map(PlanItem::minutes)
            .sum()
    }
}

/// Body of `POST /plans/generate`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_ids: Option<Vec<i64>>,
    pub save: bool,
}
