use anyhow::{Result, anyhow, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::time::Duration;

use super::recent::{DEFAULT_RECENT, format_recent};
use super::stats::format_stats;
use crate::ai::chat::{BusyFlag, ConversationSession, Role, SessionBuilder};
use crate::core::AppConfig;
use crate::dataset::DatasetWriter;

const HELP: &str = "\
Type a message to send it. Commands:
  /retry             regenerate the last reply, or answer an unanswered message
  /edit [INDEX]      edit a reply (default: the last one), Enter saves, Ctrl-C cancels
  /show              print the current conversation
  /save              append the conversation to the dataset and start over
  /discard           drop the conversation, including any open edit
  /clear             drop the conversation
  /system [TEXT]     show or set the system prompt
  /max-tokens [N]    show or set max tokens per reply
  /stats             dataset size and number of conversations
  /recent [N]        print the last N saved conversations
  /help              this message
  /quit              exit
Start a message with // to send text that begins with /";

#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    Retry,
    Edit(Option<usize>),
    Show,
    Save,
    Discard,
    Clear,
    System(Option<String>),
    MaxTokens(Option<u32>),
    Stats,
    Recent(usize),
    Help,
    Quit,
}

impl ReplCommand {
    /// Parses one line of input. Anything that isn't a `/command` is a
    /// message for the model, sent exactly as typed.
    pub fn parse(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("//") {
            return Ok(Self::Send(format!("/{}", rest)));
        }
        let Some(command) = trimmed.strip_prefix('/') else {
            return Ok(Self::Send(line.to_string()));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (command, None),
        };

        let cmd = match (name, arg) {
            ("retry", None) => Self::Retry,
            ("edit", None) => Self::Edit(None),
            ("edit", Some(arg)) => Self::Edit(Some(
                arg.parse()
                    .map_err(|_| anyhow!("/edit takes a turn index, got {}", arg))?,
            )),
            ("show", None) => Self::Show,
            ("save", None) => Self::Save,
            ("discard", None) => Self::Discard,
            ("clear", None) => Self::Clear,
            ("system", arg) => Self::System(arg.map(String::from)),
            ("max-tokens", None) => Self::MaxTokens(None),
            ("max-tokens", Some(arg)) => Self::MaxTokens(Some(
                arg.parse()
                    .map_err(|_| anyhow!("max tokens must be a positive integer, got {}", arg))?,
            )),
            ("stats", None) => Self::Stats,
            ("recent", None) => Self::Recent(DEFAULT_RECENT),
            ("recent", Some(arg)) => Self::Recent(
                arg.parse()
                    .map_err(|_| anyhow!("/recent takes a count, got {}", arg))?,
            ),
            ("help", None) => Self::Help,
            ("quit", None) | ("exit", None) => Self::Quit,
            (name, Some(_)) if is_known(name) => bail!("/{} doesn't take an argument", name),
            (name, _) => bail!("Unknown command /{}, try /help", name),
        };
        Ok(cmd)
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "retry" | "show" | "save" | "discard" | "clear" | "stats" | "help" | "quit" | "exit"
    )
}

pub fn format_transcript(session: &ConversationSession) -> String {
    let mut out = format!("System: {}", session.system_prompt());
    for (i, turn) in session.turns().iter().enumerate() {
        let label = match turn.role() {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        let marker = if session.active_edit() == Some(i) {
            " (editing)"
        } else {
            ""
        };
        out.push_str(&format!("\n[{}] {}{}: {}", i, label, marker, turn.content));
    }
    out
}

// Only says something when the model takes a while
async fn announce_while_busy(busy: BusyFlag) {
    tokio::time::sleep(Duration::from_millis(500)).await;
    if busy.is_busy() {
        eprintln!("Waiting on the model...");
    }
}

/// Opens an edit and lets the user change the text in place.
fn edit_turn(
    rl: &mut DefaultEditor,
    session: &mut ConversationSession,
    index: Option<usize>,
) -> Result<()> {
    let index = match index {
        Some(i) => {
            session.begin_edit(i)?;
            i
        }
        None => session.begin_edit_last()?,
    };
    let initial = session.editing_content().unwrap_or_default().to_string();

    match rl.readline_with_initial("edit> ", (initial.as_str(), "")) {
        Ok(text) => {
            session.commit_edit(&text)?;
            if text != initial {
                println!("Updated turn {}", index);
            }
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
            session.cancel_edit();
            println!("Kept turn {} as is", index);
        }
        Err(err) => {
            session.cancel_edit();
            return Err(err.into());
        }
    }
    Ok(())
}

async fn handle(
    cmd: ReplCommand,
    rl: &mut DefaultEditor,
    session: &mut ConversationSession,
    writer: &DatasetWriter,
    review: bool,
) -> Result<()> {
    match cmd {
        ReplCommand::Send(text) => {
            let notice = tokio::spawn(announce_while_busy(session.busy_handle()));
            let result = session.send_user_message(&text).await;
            notice.abort();
            println!("{}", result?);
            if review {
                edit_turn(rl, session, None)?;
            }
        }
        ReplCommand::Retry => {
            let notice = tokio::spawn(announce_while_busy(session.busy_handle()));
            let result = if session.next_speaker() == Role::Assistant {
                session.answer_pending_user().await
            } else {
                session.retry_last_assistant().await
            };
            notice.abort();
            println!("{}", result?);
            if review {
                edit_turn(rl, session, None)?;
            }
        }
        ReplCommand::Edit(index) => edit_turn(rl, session, index)?,
        ReplCommand::Show => println!("{}", format_transcript(session)),
        ReplCommand::Save => {
            let snapshot = session.finalize_for_save()?;
            if session.next_speaker() == Role::Assistant {
                println!("Note: the last user message has no reply");
            }
            writer.save(&snapshot)?;
            session.discard();
            println!("Conversation saved successfully!");
        }
        ReplCommand::Discard => {
            session.discard();
            println!("Conversation discarded");
        }
        ReplCommand::Clear => {
            session.clear()?;
            println!("Conversation cleared");
        }
        ReplCommand::System(Some(text)) => session.update_system_prompt(&text),
        ReplCommand::System(None) => println!("{}", session.system_prompt()),
        ReplCommand::MaxTokens(Some(n)) => {
            let applied = session.update_max_tokens(n);
            println!("Max tokens: {}", applied);
        }
        ReplCommand::MaxTokens(None) => println!("Max tokens: {}", session.max_tokens()),
        ReplCommand::Stats => println!("{}", format_stats(&writer.stats()?)),
        ReplCommand::Recent(n) => {
            for f in format_recent(writer, n)? {
                println!("{}\n", f);
            }
        }
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit => {}
    }
    Ok(())
}

pub async fn run(config: &AppConfig, writer: &DatasetWriter, review: bool) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut session = SessionBuilder::new(config.completion())
        .system_prompt(&config.system_message)
        .max_tokens(config.max_tokens)
        .build();

    tracing::info!(
        "Curating with {} at {}, saving to {}",
        config.llm_model(),
        config.llm_host(),
        writer.path().display()
    );
    println!("{}\n", HELP);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                match ReplCommand::parse(&line) {
                    Ok(ReplCommand::Quit) => break,
                    Ok(cmd) => {
                        if let Err(err) = handle(cmd, &mut rl, &mut session, writer, review).await
                        {
                            println!("Error: {:#}", err);
                        }
                    }
                    Err(err) => println!("{}", err),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    if !session.is_empty() {
        tracing::warn!(
            "Exiting with {} unsaved turns",
            session.turns().len()
        );
    }

    Ok(())
}
