//! One-shot user notices raised by failed actions.

use std::collections::VecDeque;
use threadist_core::{CoreError, ErrorExt, ErrorReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub code: String,
    pub message: String,
}

/// Logs each failure once and queues the message shown to the user.
pub struct Notifier {
    reporter: ErrorReporter,
    pending: VecDeque<Notice>,
}

impl Notifier {
    pub fn new(reporter: ErrorReporter) -> Self {
        Self {
            reporter,
            pending: VecDeque::new(),
        }
    }

    pub fn error(&mut self, error: &CoreError) {
        self.reporter.report_error(error);
        self.push(NoticeLevel::Error, error);
    }

    /// For failures the screen already absorbed, such as an empty section.
    pub fn warning(&mut self, error: &CoreError) {
        self.reporter.report_warning(error);
        self.push(NoticeLevel::Warning, error);
    }

    fn push(&mut self, level: NoticeLevel, error: &CoreError) {
        self.pending.push_back(Notice {
            level,
            code: error.error_code(),
            message: error.user_friendly_message(),
        });
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Hands out every queued notice; each is shown once.
    pub fn drain(&mut self) -> Vec<Notice> {
        self.pending.drain(..).collect()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(ErrorReporter::default())
    }
}
