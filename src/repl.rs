//! Interactive chat shell
//!
//! Readline loop standing in for the original's chat UI: one line in, one
//! bot message out. A couple of slash commands for local inspection.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::expense::format_ars;
use crate::pipeline::ChatPipeline;
use crate::state;

pub mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

use ansi::*;

fn print_bot(text: &str) {
    println!();
    for line in text.lines() {
        println!("{}{}bot{} {}", BOLD, GREEN, RESET, line);
    }
    println!();
}

fn print_expenses(pipeline: &ChatPipeline) {
    if pipeline.store.is_empty() {
        println!("{}(sin gastos){}", DIM, RESET);
        return;
    }
    let mut total = 0.0;
    for e in pipeline.store.all() {
        total += e.amount;
        println!(
            "  {}{}{}  {} - {} ({})",
            CYAN,
            format!("${:>12}", format_ars(e.amount)),
            RESET,
            e.expense_date.format("%d/%m/%Y"),
            e.description,
            e.category
        );
    }
    println!("  {}TOTAL ${}{}", BOLD, format_ars(total), RESET);
}

/// Run the shell until EOF, Ctrl+C or /salir.
pub async fn run(pipeline: &mut ChatPipeline) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let history_path = state::data_dir().join("chat_history");
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
    }

    print_bot(&pipeline.greet());
    println!("{}Comandos: /gastos /salir{}", DIM, RESET);
    println!();

    loop {
        match editor.readline("vos > ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match line {
                    "/salir" | "/exit" | "/quit" => break,
                    "/gastos" => print_expenses(pipeline),
                    _ => {
                        println!("{}analizando...{}", DIM, RESET);
                        let reply = pipeline.handle_utterance(line).await;
                        print_bot(&reply);
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("{}¡Chau!{}", YELLOW, RESET);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = editor.save_history(&history_path);
    Ok(())
}
