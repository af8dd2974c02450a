//! Folio chat - terminal front end
//!
//! Drives the widget engine from stdin and renders its events on stdout.
//! Lines go to the conversation, or to the email gate while it is shown.
//! `/skip` dismisses the gate, `/quit` exits.

use folio_chat::{
    ConversationEngine, HttpExchangeClient, LoggingClient, Role, WidgetConfig, WidgetEvent,
};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays a clean transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = WidgetConfig::from_env();
    tracing::info!(endpoint = %config.endpoint, "Starting chat widget");

    let client = LoggingClient::new(HttpExchangeClient::new(
        config.endpoint.clone(),
        config.request_timeout,
    )?);
    let handle = ConversationEngine::spawn(&config, client);

    let printer = tokio::spawn(print_events(BroadcastStream::new(handle.subscribe())));
    handle.open().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = line.trim().to_string();
        let gate_visible = handle.snapshot().await?.gate_visible;
        match command.as_str() {
            "/quit" => break,
            "/skip" => handle.abandon_gate().await?,
            _ if gate_visible => handle.submit_gate(line).await?,
            _ => handle.submit_user_message(line).await?,
        }
    }

    printer.abort();
    Ok(())
}

async fn print_events(mut events: BroadcastStream<WidgetEvent>) {
    // (turn index, chars already printed) of the reveal being echoed
    let mut echoed: Option<(usize, usize)> = None;

    while let Some(item) = events.next().await {
        // Lagged receivers skip ahead
        let Ok(event) = item else { continue };

        match event {
            WidgetEvent::Greeting { text } => println!("assistant> {text}"),
            WidgetEvent::PlaceholderShown => println!("assistant> ..."),
            WidgetEvent::TurnAppended { turn, .. } if turn.is_error => {
                println!("assistant! {}", turn.content);
            }
            WidgetEvent::TurnAppended { index, turn } if turn.role == Role::Assistant => {
                echoed = Some((index, 0));
                print!("assistant> ");
            }
            WidgetEvent::RevealProgress {
                turn_index,
                visible,
            } => {
                let printed = match echoed {
                    Some((index, printed)) if index == turn_index => printed,
                    _ => 0,
                };
                let fresh: String = visible.chars().skip(printed).collect();
                echoed = Some((turn_index, printed + fresh.chars().count()));
                print!("{fresh}");
            }
            WidgetEvent::RevealFinished { .. } => println!(),
            WidgetEvent::GateActivated => {
                println!("[email] Please enter your email address (or /skip)");
            }
            WidgetEvent::GateSubmitting => println!("[email] Submitting..."),
            WidgetEvent::GateReenabled { message } => println!("[email] {message}"),
            WidgetEvent::GateDeactivated => println!("[email] closed"),
            WidgetEvent::TurnAppended { .. }
            | WidgetEvent::PlaceholderRemoved
            | WidgetEvent::SendingChanged { .. } => {}
        }
        let _ = std::io::stdout().flush();
    }
}
