//! Chat notifications.
//!
//! Defines the `Notifier` trait, the markdown `Notice` messages the engine
//! sends, and the WeCom group-robot webhook implementation.

pub mod wecom;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

use crate::types::{BundleReport, NoticeKind};

/// A rendered chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    /// Markdown body.
    pub content: String,
}

impl Notice {
    /// Periodic "still watching" status.
    pub fn heartbeat(report: &BundleReport, at: DateTime<Utc>) -> Self {
        Self {
            kind: NoticeKind::Heartbeat,
            content: render_report("## ⚙️ **Monitor running**\n", report, at),
        }
    }

    /// Alert that at least one bundle can be bought right now.
    pub fn available(report: &BundleReport, at: DateTime<Utc>) -> Self {
        Self {
            kind: NoticeKind::Available,
            content: render_report("## ⚠️ **Bundle available**\n", report, at),
        }
    }

    pub fn purchased(bundle_key: &str, instance_ids: &[String], at: DateTime<Utc>) -> Self {
        let mut content = String::from("## ✅ **Purchase succeeded**\n");
        let _ = writeln!(content, "- **Bundle**: {bundle_key}");
        if !instance_ids.is_empty() {
            let _ = writeln!(content, "- **Instances**: {}", instance_ids.join(", "));
        }
        push_timestamp(&mut content, at);
        Self {
            kind: NoticeKind::Purchased,
            content,
        }
    }

    /// Urgent notices mention people.
    pub fn is_urgent(&self) -> bool {
        self.kind == NoticeKind::Available
    }
}

fn render_report(title: &str, report: &BundleReport, at: DateTime<Utc>) -> String {
    let mut content = String::from(title);
    for (key, state) in report.iter() {
        let _ = writeln!(content, "- **{key}**: {state}");
    }
    push_timestamp(&mut content, at);
    content
}

fn push_timestamp(content: &mut String, at: DateTime<Utc>) {
    let local = at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    let _ = write!(content, "\n\n**Notified at**: {local}");
}

/// Destination for notices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notice. `Ok` only on confirmed delivery.
    async fn send(&self, notice: &Notice) -> Result<()>;
}
