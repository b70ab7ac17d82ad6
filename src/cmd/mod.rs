//! CLI command implementations.
//!
//! | Command  | What it does                                            |
//! |----------|---------------------------------------------------------|
//! | `init`   | Create the `.specflow/` layout in a project             |
//! | `status` | Per-spec task progress and pending approvals            |
//! | `review` | Interactive approve / needs-revision resolution         |
//! | `serve`  | Dashboard HTTP API + WebSocket push channel             |

use std::path::Path;

use anyhow::Result;
use console::style;
use dialoguer::{Input, Select, theme::ColorfulTheme};

use crate::approvals::{ApprovalRequest, Decision};
use crate::errors::StoreError;
use crate::store::WORKFLOW_DIR;
use crate::workflow::WorkflowEngine;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    // Constructing the engine creates the full directory layout.
    WorkflowEngine::new(project_dir)?;
    println!();
    println!(
        "Initialized {} in {}",
        style(WORKFLOW_DIR).cyan(),
        project_dir.display()
    );
    println!();
    println!("Next steps:");
    println!("  1. Create a spec: {WORKFLOW_DIR}/specs/<spec-name>/tasks.md");
    println!("  2. Run 'specflow serve' to open the dashboard API");
    println!("  3. Run 'specflow review' when approvals arrive");
    println!();
    Ok(())
}

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    let engine = WorkflowEngine::new(project_dir)?;
    let summaries = engine.spec_summaries()?;

    println!();
    if summaries.is_empty() {
        println!("No specs found. Create one under {WORKFLOW_DIR}/specs/ first.");
        println!();
        return Ok(());
    }

    println!(
        "{:<24} {:>8} {:>12} {:>10} {:>7}",
        "Spec", "Pending", "In progress", "Completed", "Total"
    );
    println!(
        "{:<24} {:>8} {:>12} {:>10} {:>7}",
        "------------------------", "-------", "-----------", "---------", "-----"
    );
    for summary in &summaries {
        let in_progress = if summary.in_progress > 0 {
            style(summary.in_progress.to_string()).yellow().to_string()
        } else {
            summary.in_progress.to_string()
        };
        println!(
            "{:<24} {:>8} {:>12} {:>10} {:>7}",
            summary.name, summary.pending, in_progress, summary.completed, summary.total
        );
    }

    let pending = engine.pending_approvals();
    println!();
    if pending.is_empty() {
        println!("No pending approvals.");
    } else {
        println!(
            "{}",
            style(format!("{} pending approval(s):", pending.len())).yellow()
        );
        for request in &pending {
            println!(
                "  {}  {} ({})",
                request.id, request.artifact_path, request.spec_name
            );
        }
        println!("Run 'specflow review' to resolve them.");
    }
    println!();
    Ok(())
}

/// Interactive reviewer loop: pick a pending request, read the artifact,
/// approve or send back with a comment.
pub fn cmd_review(project_dir: &Path) -> Result<()> {
    let engine = WorkflowEngine::new(project_dir)?;

    loop {
        let pending = engine.pending_approvals();
        if pending.is_empty() {
            println!();
            println!("No pending approvals.");
            println!();
            return Ok(());
        }

        let labels: Vec<String> = pending
            .iter()
            .map(|r| format!("{} ({})", r.artifact_path, r.spec_name))
            .chain(std::iter::once("Quit".to_string()))
            .collect();
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Pending approvals")
            .items(&labels)
            .default(0)
            .interact()?;
        if selection == pending.len() {
            return Ok(());
        }

        review_one(&engine, &pending[selection])?;
    }
}

fn review_one(engine: &WorkflowEngine, request: &ApprovalRequest) -> Result<()> {
    println!();
    println!(
        "Reviewing {} for spec {}",
        style(&request.artifact_path).cyan(),
        style(&request.spec_name).cyan()
    );

    // The request references the artifact by path, so this is always the
    // current content.
    match engine.store().read_artifact(&request.artifact_path) {
        Ok(content) => {
            println!();
            println!("{content}");
        }
        Err(StoreError::NotFound { path }) => {
            println!(
                "{}",
                style(format!("Artifact missing on disk: {path}")).red()
            );
        }
        Err(e) => return Err(e.into()),
    }

    let options = &["Approve", "Request revision", "Skip for now"];
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Decision")
        .items(options)
        .default(0)
        .interact()?;

    match selection {
        0 => {
            engine.resolve_approval(&request.id, Decision::Approve, None)?;
            println!("{}", style("Approved.").green());
        }
        1 => {
            let comment: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Revision comment")
                .interact_text()?;
            engine.resolve_approval(&request.id, Decision::NeedsRevision, Some(&comment))?;
            println!("{}", style("Sent back for revision.").yellow());
        }
        _ => {}
    }
    Ok(())
}
