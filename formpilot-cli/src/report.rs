use colored::*;
use formpilot::{RunReport, SessionOutcome};

/// Print a human-readable summary of a finished run.
pub fn display(report: &RunReport) {
    println!();
    println!("{}", "=".repeat(60));
    match &report.outcome {
        SessionOutcome::Succeeded { verified: true } => {
            println!("{} {}", "SUCCESS:".green().bold(), report.workflow);
        }
        SessionOutcome::Succeeded { verified: false } => {
            println!("{} {}", "DONE (UNVERIFIED):".yellow().bold(), report.workflow);
            println!("   Submission finished but no confirmation was detected. Verify in the UI.");
        }
        SessionOutcome::Failed { error } => {
            println!("{} {}", "FAILURE:".red().bold(), report.workflow);
            println!("   {error}");
        }
    }
    println!("{}", "-".repeat(60));
    println!("   Steps completed: {}", report.steps_completed);
    println!("   Human interventions: {}", report.interventions);
    if let Some(trace) = &report.trace {
        println!("   Trace saved to: {}", trace.path.display());
    }
    if let Some(screenshot) = report.failure.as_ref().and_then(|f| f.screenshot.as_ref()) {
        println!("   Screenshot saved to: {}", screenshot.path.display());
    }
    println!("{}", "=".repeat(60));
}
