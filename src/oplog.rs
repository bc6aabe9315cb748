// ============================================
// oplog.rs - The operation log
// ============================================
// Every servicing action reports what it is doing through this module.
// The log is an append-only list of timestamped entries, each with a
// severity that decides its color in the UI log pane. Entries are also
// mirrored to the console so `langpack-manager` run from a terminal
// shows the same story the UI does.
//
// The log can be copied to the clipboard or saved as JSON from the UI;
// the JSON shape is just the serialized entries.
// ============================================

use chrono::Local;
use serde::Serialize;

// ============================================
// SEVERITY
// ============================================

/// How important a log entry is. Decides the color in the UI pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// An operation is starting or progressing (steel blue)
    Info,
    /// A per-item detail line, e.g. one found package (light gray)
    Detail,
    /// Something finished successfully (green)
    Success,
    /// Needs attention but nothing broke, e.g. a package being removed (orange)
    Warning,
    /// An operation failed (red)
    Error,
}

impl Severity {
    /// The RGB color used for this severity in the UI log pane.
    /// The palette mirrors classic status colors: steel blue for progress,
    /// green for success, orange for warnings, red for errors.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Severity::Info => (70, 130, 180),     // steel blue
            Severity::Detail => (190, 190, 190),  // light gray
            Severity::Success => (60, 170, 90),   // green
            Severity::Warning => (235, 140, 0),   // dark orange
            Severity::Error => (220, 60, 60),     // red
        }
    }
}

// ============================================
// LOG ENTRY
// ============================================

/// One line of the operation log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Local wall-clock time when the entry was appended, "HH:MM:SS"
    pub timestamp: String,
    pub severity: Severity,
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current local time.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            severity,
            message: message.into(),
        }
    }

    /// The line as shown in the UI and on the console: "[12:34:56] message"
    pub fn display_line(&self) -> String {
        format!("[{}] {}", self.timestamp, self.message)
    }

    /// Print the entry to the console. Warnings and errors go to stderr
    /// so they stand out when output is redirected.
    pub fn mirror_to_console(&self) {
        match self.severity {
            Severity::Warning | Severity::Error => eprintln!("{}", self.display_line()),
            _ => println!("{}", self.display_line()),
        }
    }
}

// ============================================
// EXPORT HELPERS
// ============================================

/// Join entries into plain text for the clipboard.
pub fn entries_to_text(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(LogEntry::display_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize entries to pretty JSON for the "Save log" dialog.
pub fn entries_to_json(entries: &[LogEntry]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_shape() {
        let entry = LogEntry::new(Severity::Info, "hello");
        // "HH:MM:SS" - 8 chars with colons at positions 2 and 5
        assert_eq!(entry.timestamp.len(), 8);
        assert_eq!(&entry.timestamp[2..3], ":");
        assert_eq!(&entry.timestamp[5..6], ":");
    }

    #[test]
    fn test_display_line() {
        let mut entry = LogEntry::new(Severity::Success, "done");
        entry.timestamp = "01:02:03".to_string();
        assert_eq!(entry.display_line(), "[01:02:03] done");
    }

    #[test]
    fn test_severity_colors_are_distinct() {
        let all = [
            Severity::Info,
            Severity::Detail,
            Severity::Success,
            Severity::Warning,
            Severity::Error,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.rgb(), b.rgb(), "{:?} and {:?} share a color", a, b);
            }
        }
    }

    #[test]
    fn test_entries_to_text() {
        let mut first = LogEntry::new(Severity::Info, "starting");
        first.timestamp = "10:00:00".to_string();
        let mut second = LogEntry::new(Severity::Error, "failed");
        second.timestamp = "10:00:01".to_string();

        let text = entries_to_text(&[first, second]);
        assert_eq!(text, "[10:00:00] starting\n[10:00:01] failed");
    }

    #[test]
    fn test_entries_to_json() {
        let entry = LogEntry::new(Severity::Warning, "Removing: some-package");
        let json = entries_to_json(&[entry]).unwrap();
        assert!(json.contains("\"severity\": \"Warning\""));
        assert!(json.contains("Removing: some-package"));
    }
}
