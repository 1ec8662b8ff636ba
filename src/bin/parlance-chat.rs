//! Interactive chat against a parlance chat backend.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the local backend
//! parlance-chat
//!
//! # Talk to another backend and keep state between runs
//! parlance-chat --base-url http://10.0.0.5:5000/api/chat --state-dir ~/.parlance
//! ```
//!
//! Type `/help` for session commands.  Ctrl-C stops a streaming reply.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use parlance::chat::{ChatArgs, ChatCommand, ChatConfig, help_text, parse_command};
use parlance::{
    AppContext, CancellationToken, ClientLogger, Message, Session, StreamPhase,
};

const ANSI_DIM: &str = "\x1b[2m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

/// Echoes streamed chunks to stdout as they arrive.
struct TerminalEcho {
    use_color: bool,
}

impl TerminalEcho {
    fn dim(&self, text: &str) -> String {
        if self.use_color {
            format!("{ANSI_DIM}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl ClientLogger for TerminalEcho {
    fn log_sessions(&self, sessions: &[Session]) {
        println!("{}", self.dim(&format!("fetched {} sessions", sessions.len())));
    }

    fn log_response(&self, _: &Message) {}

    fn log_stream_chunk(&self, chunk: &str) {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{chunk}");
        let _ = stdout.flush();
    }

    fn log_stream_phase(&self, phase: StreamPhase) {
        match phase {
            StreamPhase::Requesting => {
                print!("{}", self.dim("Bot is typing…\r"));
                let _ = io::stdout().flush();
            }
            StreamPhase::Completed => println!(),
            StreamPhase::Cancelled => println!("{}", self.dim(" [stopped]")),
            _ => {}
        }
    }
}

fn print_error(use_color: bool, message: &str) {
    if use_color {
        eprintln!("{ANSI_RED}Error: {message}{ANSI_RESET}");
    } else {
        eprintln!("Error: {message}");
    }
}

/// Print a client error, noting when sending again may succeed.
fn report_error(use_color: bool, err: &parlance::Error) {
    if err.is_retryable() {
        print_error(use_color, &format!("{err} (temporary, try again)"));
    } else {
        print_error(use_color, &err.to_string());
    }
}

fn print_sessions(sessions: &[Session], active: Option<&str>) {
    if sessions.is_empty() {
        println!("    (no sessions)");
        return;
    }
    for session in sessions {
        let marker = if Some(session.id.as_str()) == active {
            "*"
        } else {
            " "
        };
        let archived = if session.is_archived { " [archived]" } else { "" };
        println!(
            "  {marker} {}  {} ({} messages){archived}",
            session.id,
            session.title,
            session.messages.len()
        );
    }
}

/// Main entry point for the parlance-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("parlance-chat [OPTIONS]");
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    let mut context = match &config.state_dir {
        Some(dir) => AppContext::open(config.client.clone(), dir)?,
        None => AppContext::ephemeral(config.client.clone())?,
    };
    context.set_client_logger(Arc::new(TerminalEcho { use_color }));

    if let Some(title) = &config.initial_title {
        context.chat.create_session(title.clone());
    }

    // Ctrl-C cancels whatever stream is in flight.
    let current = Arc::new(Mutex::new(CancellationToken::new()));
    let current_clone = Arc::clone(&current);
    ctrlc::set_handler(move || {
        if let Ok(token) = current_clone.lock() {
            token.cancel();
        }
    })?;

    let mut rl = DefaultEditor::new()?;
    println!("parlance chat ({})", context.client.base_url());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::New(title) => {
                            let id = context
                                .chat
                                .create_session(title.unwrap_or_else(|| "New chat".to_string()));
                            println!("    Started session {id}");
                        }
                        ChatCommand::Sessions => {
                            let active = context.chat.active_session_id();
                            print_sessions(&context.chat.sessions(), active.as_deref());
                        }
                        ChatCommand::Switch(id) => {
                            if context.chat.session(&id).is_some() {
                                context.chat.set_active_session(Some(&id));
                                println!("    Switched to {id}");
                            } else {
                                print_error(use_color, &format!("no session {id}"));
                            }
                        }
                        ChatCommand::Search(query) => {
                            let active = context.chat.active_session_id();
                            print_sessions(&context.chat.search_sessions(&query), active.as_deref());
                        }
                        ChatCommand::Archive => match context.chat.active_session_id() {
                            Some(id) if context.chat.archive_session(&id) => {
                                println!("    Toggled archive on {id}");
                            }
                            _ => print_error(use_color, "no active session"),
                        },
                        ChatCommand::Delete => match context.chat.active_session_id() {
                            Some(id) if context.chat.delete_session(&id) => {
                                println!("    Deleted {id}");
                            }
                            _ => print_error(use_color, "no active session"),
                        },
                        ChatCommand::Sync => {
                            if let Err(e) = context.sync_sessions().await {
                                report_error(use_color, &e);
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            print_error(use_color, &message);
                        }
                    }
                    continue;
                }

                let token = CancellationToken::new();
                if let Ok(mut slot) = current.lock() {
                    *slot = token.clone();
                }
                if let Err(e) = context.send_streaming(line, token).await {
                    if !e.is_abort() {
                        println!();
                        report_error(use_color, &e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                print_error(use_color, &format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}
