use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl ToastLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Bootstrap contextual colour used for the toast background.
    pub fn css_variant(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogIcon {
    Success,
    Error,
    Warning,
    Question,
}

impl DialogIcon {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Question => "question",
        }
    }
}

/// Blocking yes/no dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirm {
    pub icon: DialogIcon,
    pub title: String,
    pub text: String,
    pub confirm_label: String,
    pub cancel_label: String,
}

impl Confirm {
    pub fn question(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            icon: DialogIcon::Question,
            title: title.into(),
            text: text.into(),
            confirm_label: "确定".to_string(),
            cancel_label: "取消".to_string(),
        }
    }

    /// Confirmation before something that cannot be undone.
    pub fn destructive(
        title: impl Into<String>,
        text: impl Into<String>,
        confirm_label: impl Into<String>,
    ) -> Self {
        Self {
            icon: DialogIcon::Warning,
            title: title.into(),
            text: text.into(),
            confirm_label: confirm_label.into(),
            cancel_label: "取消".to_string(),
        }
    }
}

/// Blocking notice. A timed alert closes itself after `timer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub icon: DialogIcon,
    pub title: String,
    pub text: String,
    pub timer: Option<Duration>,
}

impl Alert {
    pub fn new(icon: DialogIcon, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            icon,
            title: title.into(),
            text: text.into(),
            timer: None,
        }
    }

    pub fn timed(mut self, timer: Duration) -> Self {
        self.timer = Some(timer);
        self
    }
}

/// The user-facing surface a flow talks to: toasts, blocking dialogs and
/// page navigation.
pub trait Page {
    fn toast(&self, level: ToastLevel, message: &str);

    /// Resolves once the user answers; `true` only on explicit confirmation.
    fn confirm(&self, dialog: &Confirm) -> impl Future<Output = bool>;

    /// Resolves once the alert is dismissed or its timer runs out.
    fn alert(&self, dialog: &Alert) -> impl Future<Output = ()>;

    fn reload(&self);

    /// `false` when [`Page::reload`] does nothing, so flows skip the pause
    /// that lets a result be read first.
    fn reloads(&self) -> bool {
        true
    }

    fn activate_tab(&self, _tab_id: &str) {}

    /// Whether the page already lists the given batch task.
    fn has_task_row(&self, _task_id: &str) -> bool {
        true
    }
}
