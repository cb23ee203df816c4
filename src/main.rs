use anyhow::{Context, Result};
use copilot::messages::ConsoleTranscript;
use copilot::{AssistantBuilder, AssistantEvent, CopilotConfig, CopilotError, Status};
use crossbeam_channel::{select, unbounded, Receiver};
use std::io::BufRead;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Console control commands
enum Control {
    StopChat,
    StopAll,
    Toggle,
    Quit,
}

fn parse_control(line: &str) -> Option<Control> {
    match line.trim() {
        "/stop" => Some(Control::StopChat),
        "/stopall" => Some(Control::StopAll),
        "/toggle" => Some(Control::Toggle),
        "/quit" => Some(Control::Quit),
        _ => None,
    }
}

/// Forward stdin lines; the channel disconnects on EOF
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to start stdin reader")?;
    Ok(rx)
}

/// Plain-language reason for a startup failure; main still returns the error
fn report(error: &CopilotError) {
    eprintln!("{}", error.user_message());
}

fn main() -> Result<()> {
    // Logs go to stderr so the transcript owns stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "copilot=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Copilot assistant");

    let config = CopilotConfig::discover().inspect_err(report)?;
    let welcome = format!(
        "Hi{}! I'm your personal assistant. I'm ready to help you with anything you need.",
        config.persona.name_suffix()
    );

    let assistant = AssistantBuilder::new()
        .with_config(config)
        .with_transcript(Arc::new(ConsoleTranscript::new()))
        .build()
        .inspect_err(report)?;
    // Speaking before the loop starts keeps the first capture behind the welcome
    assistant.speech().speak(&welcome);
    let handle = assistant.start().inspect_err(report)?;

    println!("Type a message, or /stop, /stopall, /toggle, /quit");
    let lines = spawn_stdin_reader()?;
    let mut last_status = Status::Starting;

    loop {
        select! {
            recv(lines) -> line => match line {
                Ok(line) => match parse_control(&line) {
                    Some(Control::StopChat) => handle.request_stop_chat(),
                    Some(Control::StopAll) => handle.request_stop_all(),
                    Some(Control::Toggle) => {
                        let target = handle.request_toggle_mode();
                        info!("Toggling to {} mode", target);
                    }
                    Some(Control::Quit) => handle.shutdown(),
                    None => {
                        handle.submit_text(&line);
                    }
                },
                Err(_) => {
                    info!("Input closed");
                    handle.shutdown();
                    break;
                }
            },
            recv(handle.events()) -> event => match event {
                Ok(AssistantEvent::Status(status)) => {
                    if status != last_status {
                        println!("[{}]", status);
                        last_status = status;
                    }
                }
                Ok(AssistantEvent::ModeChanged(mode)) => println!("-- {} mode --", mode),
                Ok(AssistantEvent::TextInput(shown)) => {
                    if shown {
                        println!("(typing enabled)");
                    }
                }
                Ok(AssistantEvent::Terminated) | Err(_) => break,
            },
        }
    }

    handle.join();
    info!("Copilot stopped");

    Ok(())
}
