//! Console transport.
//!
//! Each stdin line is one inbound event:
//!
//! ```text
//! <user_id>[:<name>] /start Ab12Cd34
//! <user_id>[:<name>] tap script_panel
//! <user_id>[:<name>] photo <file_id> [caption]
//! <user_id>[:<name>] any other text
//! ```
//!
//! Replies are printed with the recipient, delivery mode and keyboard
//! (as `[label](payload)` entries, one row per line).

use colored::Colorize;
use scriptbot_core::action::{CallbackAction, Command};
use scriptbot_core::dispatcher::{Caller, EventKind, InboundEvent};
use scriptbot_core::ui::{Delivery, Keyboard, Reply};
use scriptbot_types::{Identity, PhotoRef, Result, ScriptContent, ScriptbotError};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::event_loop::BotHandle;

/// Parses one console line into an event.
pub fn parse_line(line: &str) -> Result<InboundEvent> {
    let line = line.trim();
    let (who, input) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let input = input.trim();

    let caller = match who.split_once(':') {
        Some((id, name)) if !name.is_empty() => Caller::named(id.parse::<Identity>()?, name),
        Some((id, _)) => Caller::new(id.parse::<Identity>()?),
        None => Caller::new(who.parse::<Identity>()?),
    };

    if input.is_empty() {
        return Err(ScriptbotError::InvalidInput {
            reason: "expected '<user_id>[:<name>] <input>'".into(),
        });
    }

    let kind = if let Some(cmd) = Command::parse(input) {
        EventKind::Command(cmd)
    } else if let Some(payload) = input.strip_prefix("tap ") {
        EventKind::Callback(payload.trim().parse::<CallbackAction>()?)
    } else if let Some(rest) = input.strip_prefix("photo ") {
        let rest = rest.trim();
        let (file_id, caption) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        EventKind::Content(ScriptContent::photo(PhotoRef::new(file_id), caption.trim()))
    } else {
        EventKind::Content(ScriptContent::text(input))
    };

    Ok(InboundEvent::new(caller, kind))
}

/// Renders a keyboard, one row per line.
pub fn format_keyboard(keyboard: &Keyboard) -> String {
    keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| format!("[{}]({})", b.label, b.action))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_reply(to: Identity, reply: &Reply) {
    let mode = match reply.delivery {
        Delivery::NewMessage => "new",
        Delivery::EditMessage => "edit",
    };
    println!("{} {} {}", "→".green().bold(), to.to_string().bold(), mode.dimmed());
    if let Some(photo) = &reply.photo {
        println!("  {} {}", "photo:".cyan(), photo);
    }
    for line in reply.text.lines() {
        println!("  {line}");
    }
    if let Some(keyboard) = reply.keyboard.as_ref().filter(|k| !k.is_empty()) {
        for row in format_keyboard(keyboard).lines() {
            println!("  {}", row.yellow());
        }
    }
}

fn print_error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

/// Reads events from stdin until EOF, `quit` or Ctrl+C.
pub async fn run(bot: BotHandle) {
    println!(
        "Input: {} | {} | {} | {}",
        "<id>[:<name>] /command".bold(),
        "<id> tap <payload>".bold(),
        "<id> photo <file_id> [caption]".bold(),
        "quit".bold(),
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let line = tokio::select! {
            result = lines.next_line() => match result {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    print_error(&format!("failed to read input: {e}"));
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl+C, shutting down...");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed, "quit" | "exit") {
            break;
        }

        let event = match parse_line(trimmed) {
            Ok(event) => event,
            Err(e) => {
                print_error(&e.to_string());
                continue;
            }
        };
        let to = event.caller.id;

        match bot.submit(event).await {
            Ok(replies) if replies.is_empty() => println!("{}", "(no reply)".dimmed()),
            Ok(replies) => replies.iter().for_each(|r| print_reply(to, r)),
            Err(e) => {
                print_error(&e.to_string());
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptbot_core::ui;
    use scriptbot_types::ScriptCode;

    #[test]
    fn commands_with_names() -> Result<()> {
        let event = parse_line("42:Alice /start Ab12Cd34")?;
        assert_eq!(event.caller, Caller::named(Identity::new(42), "Alice"));
        assert_eq!(
            event.kind,
            EventKind::Command(Command::Start {
                payload: Some(ScriptCode::from("Ab12Cd34"))
            })
        );
        Ok(())
    }

    #[test]
    fn taps_photos_and_text() -> Result<()> {
        assert_eq!(
            parse_line("7 tap script_panel")?.kind,
            EventKind::Callback(CallbackAction::ScriptPanel)
        );
        assert_eq!(
            parse_line("7 photo AgADf1 nice <b>caption</b>")?.kind,
            EventKind::Content(ScriptContent::photo(
                PhotoRef::new("AgADf1"),
                "nice <b>caption</b>"
            ))
        );
        assert_eq!(
            parse_line("7 photo AgADf1")?.kind,
            EventKind::Content(ScriptContent::photo(PhotoRef::new("AgADf1"), ""))
        );
        assert_eq!(
            parse_line("7:   hello there ")?.kind,
            EventKind::Content(ScriptContent::text("hello there"))
        );
        Ok(())
    }

    #[test]
    fn malformed_lines_are_rejected() {
        for bad in ["hello", "abc /start", "7", "7 tap bogus"] {
            assert!(parse_line(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn keyboards_render_as_links() {
        let kb = ui::back_to(CallbackAction::ScriptPanel);
        assert_eq!(format_keyboard(&kb), "[🔙 Back](script_panel)");
    }
}
