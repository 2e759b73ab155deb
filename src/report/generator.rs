//! Markdown and JSON rendering of dispatch responses.
//!
//! Used by the one-shot `dispatch` command; the HTTP surface always
//! answers with JSON.

use crate::models::{
    BatchReport, DispatchResponse, LaunchReport, LaunchedTask, TaskOutcome, TaskStatus,
};
use anyhow::Result;
use serde::Serialize;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(response: &DispatchResponse) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# MediaDispatch Report\n\n");

    match response {
        DispatchResponse::Async(report) => {
            output.push_str(&generate_launch_summary(report));
            output.push_str(&generate_launch_table(&report.tasks));
        }
        DispatchResponse::Sync(report) => {
            output.push_str(&generate_batch_summary(report));
            output.push_str(&generate_outcome_table(&report.results));
            output.push_str(&generate_failures_section(&report.results));
        }
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

fn generate_launch_summary(report: &LaunchReport) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("- **Mode:** async\n");
    section.push_str(&format!("- **Batch:** `{}`\n", report.batch_id));
    section.push_str(&format!("- **Tasks:** {}\n", report.total_tasks));
    section.push_str(&format!("- **Launched:** {}\n", report.launched));
    if report.failed > 0 {
        section.push_str(&format!("- **Failed to launch:** {}\n", report.failed));
    }
    section.push_str(&format!("\n{}\n\n", report.message));

    section
}

fn generate_batch_summary(report: &BatchReport) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("- **Mode:** sync\n");
    section.push_str(&format!("- **Batch:** `{}`\n", report.batch_id));
    section.push_str("\n| ✅ Successful | ❌ Failed | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | **{}** |\n\n",
        report.successful, report.failed, report.total_tasks
    ));

    section
}

fn status_badge(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Launched => "🚀 launched",
        TaskStatus::Processing => "⏳ processing",
        TaskStatus::Completed => "✅ completed",
        TaskStatus::Failed => "❌ failed",
    }
}

fn generate_launch_table(tasks: &[LaunchedTask]) -> String {
    let mut section = String::new();

    section.push_str("## Tasks\n\n");
    section.push_str("| # | Task | File | Callback | Status |\n");
    section.push_str("|:---:|:---|:---|:---|:---|\n");

    for task in tasks {
        section.push_str(&format!(
            "| {} | `{}` | {} | {} `{}` | {} |\n",
            task.task_index,
            task.task_id,
            task.file_url,
            task.method,
            task.callback_url,
            status_badge(task.status)
        ));
    }
    section.push('\n');

    let rejected: Vec<_> = tasks.iter().filter(|t| t.error.is_some()).collect();
    if !rejected.is_empty() {
        section.push_str("### Launch Failures\n\n");
        for task in rejected {
            section.push_str(&format!(
                "- `{}`: {}\n",
                task.task_id,
                task.error.as_deref().unwrap_or_default()
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_outcome_table(results: &[TaskOutcome]) -> String {
    let mut section = String::new();

    section.push_str("## Results\n\n");
    section.push_str("| # | Task | File | Status | Processing Time |\n");
    section.push_str("|:---:|:---|:---|:---|---:|\n");

    for outcome in results {
        let time = outcome
            .processing_time
            .map(|t| format!("{}s", t))
            .unwrap_or_else(|| "-".to_string());
        section.push_str(&format!(
            "| {} | `{}` | {} | {} | {} |\n",
            outcome.task_index,
            outcome.task_id,
            outcome.file_url,
            status_badge(outcome.status),
            time
        ));
    }
    section.push('\n');

    section
}

fn generate_failures_section(results: &[TaskOutcome]) -> String {
    let failures: Vec<_> = results.iter().filter(|o| !o.success).collect();
    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Failures\n\n");

    for outcome in failures {
        let kind = outcome
            .error_kind
            .map(|k| format!("{:?}", k).to_lowercase())
            .unwrap_or_else(|| "unknown".to_string());
        section.push_str(&format!(
            "#### Task {} (`{}`)\n\n**Kind:** {}\n\n> {}\n\n---\n\n",
            outcome.task_index,
            outcome.task_id,
            kind,
            outcome.error.as_deref().unwrap_or_default()
        ));
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by MediaDispatch*\n".to_string()
}

/// Pretty JSON for any response or query result.
pub fn generate_json_report<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}
