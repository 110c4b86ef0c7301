use guide_core::{Event, LoopOutcome};
use guide_runner::{Runner, StudyRequest, output_path, write_document};
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const PREVIEW_CHARS: usize = 100;

/// What a finished `generate` run left behind.
#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub invocation_id: String,
    pub path: PathBuf,
    /// False when the judge never sealed the document.
    pub complete: bool,
    pub loop_outcome: Option<LoopOutcome>,
}

/// Runs one request, printing progress, and writes the document into `output_dir`.
pub async fn generate(
    runner: &Runner,
    request: StudyRequest,
    output_dir: &Path,
    cancel: CancellationToken,
) -> anyhow::Result<GenerateReport> {
    let target = output_path(output_dir, request.source());
    let outcome = runner
        .run_observed(request, cancel, |event| {
            if let Some(line) = describe_event(event) {
                println!("{}", line);
            }
        })
        .await?;

    let Some(document) = outcome.document else {
        anyhow::bail!("run {} finished without producing a document", outcome.invocation_id);
    };
    write_document(&target, &document).await?;
    if outcome.complete {
        println!("\nStudy guide saved to {}", target.display());
    } else {
        println!("\nIncomplete study guide (no quality marker) saved to {}", target.display());
    }

    Ok(GenerateReport {
        invocation_id: outcome.invocation_id,
        path: target,
        complete: outcome.complete,
        loop_outcome: outcome.loop_outcome,
    })
}

/// One progress line for `event`, or `None` for events not worth printing.
pub fn describe_event(event: &Event) -> Option<String> {
    if event.is_partial() {
        return None;
    }
    if let Some(outcome) = &event.actions.loop_outcome {
        return Some(format!(
            "[{}] loop {:?} after {} iteration(s), {} section(s)",
            event.author, outcome.state, outcome.iterations, outcome.sections
        ));
    }
    let content = event.content()?;
    if let Some((name, _)) = content.function_calls().next() {
        return Some(format!("[{}] calling {}", event.author, name));
    }
    if let Some((name, _)) = content.function_responses().next() {
        return Some(format!("[{}] {} returned", event.author, name));
    }
    let text = content.text();
    let first_line = text.lines().find(|l| !l.trim().is_empty())?.trim();
    let preview = match first_line.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &first_line[..cut]),
        None => first_line.to_string(),
    };
    Some(format!("[{}] {} ({} chars)", event.author, preview, text.chars().count()))
}

/// Cancels its token on Ctrl-C until dropped.
pub struct InterruptGuard {
    token: CancellationToken,
    watcher: JoinHandle<()>,
}

impl InterruptGuard {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted; cancelling the run...");
                trigger.cancel();
            }
        });
        Self { token, watcher }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}
