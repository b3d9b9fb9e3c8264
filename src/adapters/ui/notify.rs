//! Console implementation of the notification side channel.

use crate::domain::{Notice, NoticeLevel};
use crate::ports::Notifier;
use crossterm::ExecutableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use std::io::stderr;

/// Prints notices to stderr so they never interleave with prompt output.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let (color, tag) = match notice.level {
            NoticeLevel::Info => (Color::Cyan, "info"),
            NoticeLevel::Warning => (Color::Yellow, "warn"),
            NoticeLevel::Error => (Color::Red, "error"),
        };
        let mut out = stderr();
        let _ = out.execute(SetForegroundColor(color));
        let _ = out.execute(Print(format!("[{tag}] {}: ", notice.title)));
        let _ = out.execute(ResetColor);
        let _ = out.execute(Print(format!("{}\r\n", notice.message)));
    }
}
