//! Gate decision: exit code and CI annotations.

use blastguard_core::{RunContext, RunResult};
use serde::{Deserialize, Serialize};

/// What the process should do with a run result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    /// 0 = not blocked (skipped, nothing relevant, or all approved); 1 = blocked.
    pub exit_code: i32,

    /// GitHub workflow commands, one per line. Empty outside CI.
    pub annotations: Vec<String>,

    /// Summary message.
    pub message: String,
}

impl GateDecision {
    pub fn from_result(result: &RunResult, context: &RunContext) -> Self {
        let blocked = result.blocked();
        let exit_code = if blocked { 1 } else { 0 };

        let mut annotations = Vec::new();
        if context.is_ci() {
            for (_, verdict) in result.blocking() {
                annotations.push(workflow_command("error", &verdict.file, &verdict.reason));
            }
            for (file, cause) in result.failures() {
                annotations.push(workflow_command(
                    "warning",
                    file,
                    &format!("not reviewed: {cause}"),
                ));
            }
        }

        let blocking = result.blocking().count();
        let message = if blocked {
            format!("blocked by {blocking} file(s)")
        } else {
            "not blocked".to_string()
        };

        GateDecision {
            exit_code,
            annotations,
            message,
        }
    }

    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

fn workflow_command(level: &str, file: &str, message: &str) -> String {
    format!(
        "::{level} file={}::{}",
        escape_property(file),
        escape_data(message)
    )
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}
