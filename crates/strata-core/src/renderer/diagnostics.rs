// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Routing of native validation-layer messages into the log.

use std::fmt;

/// Severity of a native diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    /// Informational output from the driver or validation layer.
    Info,
    /// Suspicious but valid usage.
    Warning,
    /// Invalid API usage.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticSeverity::Info => "info",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Error => "error",
        };
        f.write_str(name)
    }
}

/// What the caller must do after a diagnostic was logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticAction {
    /// Keep going.
    Continue,
    /// Strict validation is on and an error was reported.
    Abort,
}

/// Logs `message` at the level matching `severity`.
///
/// Control flow is unaffected unless `strict` is set and the message is an
/// error, in which case [`DiagnosticAction::Abort`] is returned.
pub fn classify_diagnostic(
    severity: DiagnosticSeverity,
    message: &str,
    strict: bool,
) -> DiagnosticAction {
    match severity {
        DiagnosticSeverity::Info => log::info!(target: "strata::validation", "{message}"),
        DiagnosticSeverity::Warning => log::warn!(target: "strata::validation", "{message}"),
        DiagnosticSeverity::Error => log::error!(target: "strata::validation", "{message}"),
    }
    if strict && severity == DiagnosticSeverity::Error {
        DiagnosticAction::Abort
    } else {
        DiagnosticAction::Continue
    }
}

/// Logs a native diagnostic and aborts the process if strict validation
/// demands it.
pub fn report_diagnostic(severity: DiagnosticSeverity, message: &str, strict: bool) {
    if classify_diagnostic(severity, message, strict) == DiagnosticAction::Abort {
        log::error!("Strict validation enabled, aborting on validation error");
        log::logger().flush();
        std::process::abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_strict_errors_abort() {
        assert_eq!(
            classify_diagnostic(DiagnosticSeverity::Error, "bad", false),
            DiagnosticAction::Continue
        );
        assert_eq!(
            classify_diagnostic(DiagnosticSeverity::Warning, "meh", true),
            DiagnosticAction::Continue
        );
        assert_eq!(
            classify_diagnostic(DiagnosticSeverity::Error, "bad", true),
            DiagnosticAction::Abort
        );
    }

    #[test]
    fn non_strict_reports_return() {
        report_diagnostic(DiagnosticSeverity::Error, "logged only", false);
        report_diagnostic(DiagnosticSeverity::Info, "chatter", true);
    }
}
