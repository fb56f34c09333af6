//! Transient operator-facing messages.

#[cfg(test)]
#[path = "ui_test.rs"]
mod ui_test;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// A banner (auth flows) or alert (data flows).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, text: text.into() }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Single-slot holder for the latest alert. A new alert replaces the old one.
#[derive(Clone, Default)]
pub struct NoticeSlot {
    inner: Arc<RwLock<Option<Notice>>>,
}

impl NoticeSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, notice: Notice) {
        *self.inner.write().await = Some(notice);
    }

    pub async fn peek(&self) -> Option<Notice> {
        self.inner.read().await.clone()
    }

    /// Remove and return the current alert.
    pub async fn take(&self) -> Option<Notice> {
        self.inner.write().await.take()
    }
}
