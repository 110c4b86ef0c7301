use crate::generate::{InterruptGuard, generate};
use guide_runner::{Runner, StudyRequest};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};

/// One line typed at the console prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Quit,
    Empty,
    /// `@path` names a material file.
    File(PathBuf),
    Topic(String),
}

pub fn parse_console_input(line: &str) -> ConsoleInput {
    let line = line.trim();
    match line {
        "" => ConsoleInput::Empty,
        "quit" | "exit" | "q" => ConsoleInput::Quit,
        _ => match line.strip_prefix('@') {
            Some(path) if !path.trim().is_empty() => ConsoleInput::File(PathBuf::from(path.trim())),
            _ => ConsoleInput::Topic(line.to_string()),
        },
    }
}

pub async fn run_console(runner: &Runner, output_dir: &Path, user_id: &str) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("Study Guide Console");
    println!("Pipeline: {}", runner.app_name());
    println!("Type a topic, or @path/to/material.pdf. 'quit' to exit.\n");

    loop {
        let line = match rl.readline("Study -> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        };

        let request = match parse_console_input(&line) {
            ConsoleInput::Quit => break,
            ConsoleInput::Empty => continue,
            ConsoleInput::File(path) => match StudyRequest::from_file(&path).await {
                Ok(request) => request,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    continue;
                }
            },
            ConsoleInput::Topic(topic) => StudyRequest::from_topic(&topic).with_source(topic.clone()),
        };
        rl.add_history_entry(line.as_str())?;

        let guard = InterruptGuard::new();
        match generate(runner, request.with_user_id(user_id), output_dir, guard.token()).await {
            Ok(report) if !report.complete => println!("Run {} ended without the quality marker.\n", report.invocation_id),
            Ok(_) => println!(),
            Err(e) => eprintln!("\nError: {}\n", e),
        }
    }

    Ok(())
}
