//! iCalendar export of study plans
//!
//! Each plan day is one calendar day starting at the export time; every item
//! becomes a VEVENT of its duration starting at the same time of day.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::StudyPlan;

const PRODID: &str = "-//StudyPlanner//EN";

fn stamp(t: DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape text for a property value.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render `plan` as a VCALENDAR, CRLF-separated.
pub fn plan_to_ics(plan: &StudyPlan, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", PRODID),
    ];
    let dtstamp = stamp(now);

    for (offset, day) in plan.days().iter().enumerate() {
        let start = now + Duration::days(offset as i64);
        for item in &day.items {
            let end = start + Duration::minutes(i64::from(item.minutes()));
            let summary = item.task.as_deref().filter(|t| !t.is_empty()).unwrap_or("Study");

            lines.push("BEGIN:VEVENT".into());
            lines.push(format!("DTSTAMP:{}", dtstamp));
            lines.push(format!("DTSTART:{}", stamp(start)));
            lines.push(format!("DTEND:{}", stamp(end)));
            lines.push(format!("SUMMARY:{}", escape(summary)));
            if let Some(notes) = item.notes.as_deref().filter(|n| !n.is_empty()) {
                lines.push(format!("DESCRIPTION:{}", escape(notes)));
            }
            lines.push("END:VEVENT".into());
        }
    }

    lines.push("END:VCALENDAR".into());
    lines.join("\r\n")
}

/// `<title>.ics` with whitespace runs turned into `-`.
pub fn file_name(title: Option<&str>) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
    let title = title.filter(|t| !t.is_empty()).unwrap_or("study-plan");
    format!("{}.ics", re.replace_all(title, "-"))
}
