use interview_core::SessionInput;
use interview_core::violation::FocusSignal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

pub const HELP: &str = "\
Type an answer and press Enter to submit it.
  /voice   answer by speech (the next line is treated as the transcript)
  /camera  turn the camera on
  /hide    simulate switching tabs
  /blur    simulate leaving the window
  /end     end the interview
  /help    show this text";

/// What one line of terminal input means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Session(SessionInput),
    /// Fed to the speech recognizer while listening.
    Utterance(String),
    Help,
    Unknown(String),
    Blank,
}

pub fn parse_line(line: &str, listening: bool) -> ConsoleLine {
    let line = line.trim();
    if let Some(command) = line.strip_prefix('/') {
        return match command.to_lowercase().as_str() {
            "voice" => ConsoleLine::Session(SessionInput::StartListening),
            "camera" => ConsoleLine::Session(SessionInput::ActivateCamera),
            "hide" => ConsoleLine::Session(SessionInput::FocusLost(FocusSignal::TabHidden)),
            "blur" => ConsoleLine::Session(SessionInput::FocusLost(FocusSignal::WindowBlur)),
            "end" | "quit" => ConsoleLine::Session(SessionInput::End),
            "help" => ConsoleLine::Help,
            other => ConsoleLine::Unknown(other.to_string()),
        };
    }
    if listening {
        // Blank lines count as silence for the recognizer.
        return ConsoleLine::Utterance(line.to_string());
    }
    if line.is_empty() {
        return ConsoleLine::Blank;
    }
    ConsoleLine::Session(SessionInput::Answer(line.to_string()))
}

/// Feeds console lines to the session until the reader is exhausted.
///
/// Returning drops `inputs`; once no other sender is alive the session reads
/// that as the candidate ending the interview.
pub async fn read_console<R: AsyncBufRead + Unpin>(
    reader: R,
    inputs: mpsc::Sender<SessionInput>,
    speech: mpsc::Sender<String>,
    listening: Arc<AtomicBool>,
) {
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("failed to read console input: {}", e);
                break;
            }
        };
        match parse_line(&line, listening.load(Ordering::SeqCst)) {
            ConsoleLine::Session(input) => {
                if inputs.send(input).await.is_err() {
                    break;
                }
            }
            ConsoleLine::Utterance(text) => {
                listening.store(false, Ordering::SeqCst);
                if let Err(e) = speech.send(text).await {
                    tracing::warn!("speech input dropped: {}", e);
                }
            }
            ConsoleLine::Help => println!("{HELP}"),
            ConsoleLine::Unknown(command) => println!("Unknown command /{command}. Try /help."),
            ConsoleLine::Blank => {}
        }
    }
    tracing::info!("console input closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_map_to_session_inputs() {
        assert_eq!(
            parse_line("/hide", false),
            ConsoleLine::Session(SessionInput::FocusLost(FocusSignal::TabHidden))
        );
        assert_eq!(
            parse_line(" /BLUR ", false),
            ConsoleLine::Session(SessionInput::FocusLost(FocusSignal::WindowBlur))
        );
        assert_eq!(parse_line("/quit", true), ConsoleLine::Session(SessionInput::End));
        assert_eq!(parse_line("/help", false), ConsoleLine::Help);
        assert_eq!(parse_line("/dance", false), ConsoleLine::Unknown("dance".into()));
    }

    #[test]
    fn text_is_an_answer_unless_listening() {
        assert_eq!(
            parse_line("I used a trie.", false),
            ConsoleLine::Session(SessionInput::Answer("I used a trie.".into()))
        );
        assert_eq!(
            parse_line("I used a trie.", true),
            ConsoleLine::Utterance("I used a trie.".into())
        );
        assert_eq!(parse_line("   ", false), ConsoleLine::Blank);
        assert_eq!(parse_line("", true), ConsoleLine::Utterance(String::new()));
    }

    #[tokio::test]
    async fn utterance_goes_to_speech_then_commands_resume() {
        let script = "I would shard by tenant.\n/hide\nPlain answer\n";
        let (inputs, mut session) = mpsc::channel(8);
        let (speech, mut heard) = mpsc::channel(8);
        let listening = Arc::new(AtomicBool::new(true));

        read_console(script.as_bytes(), inputs, speech, listening.clone()).await;

        assert_eq!(heard.recv().await.as_deref(), Some("I would shard by tenant."));
        assert!(!listening.load(Ordering::SeqCst));
        assert_eq!(
            session.recv().await,
            Some(SessionInput::FocusLost(FocusSignal::TabHidden))
        );
        assert_eq!(
            session.recv().await,
            Some(SessionInput::Answer("Plain answer".to_string()))
        );
        // EOF dropped the only sender.
        assert_eq!(session.recv().await, None);
    }
}
