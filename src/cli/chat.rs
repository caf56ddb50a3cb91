use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::{ChatSession, Role, SessionState};
use crate::core::config::AppConfig;

pub async fn run() -> Result<()> {
    let mut rl = DefaultEditor::new().expect("Editor failed");

    let config = AppConfig::default();
    let mut session =
        ChatSession::builder(&config.chat_api_url, &config.child_name, &config.language).build();

    let mut state = session.state();
    let mut transcript = session.transcript();

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                session.send(&line).await?;

                // Block this turn until the reply finished streaming
                state.wait_for(|s| *s == SessionState::Idle).await?;

                let messages = transcript.borrow_and_update().clone();
                if let Some(msg) = messages.last() {
                    if msg.role == Role::Assistant && !msg.text.is_empty() {
                        println!("{}", msg.text);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                session.cancel().await;
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
