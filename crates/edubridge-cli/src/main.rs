mod client;
mod command;
mod config;
mod render;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use edubridge_app::{AppContext, Toast, Toaster};
use edubridge_backend::MessageSubscription;
use edubridge_types::{Message, Session};

use crate::client::Client;
use crate::config::Config;

enum Event {
    Line(Option<String>),
    Incoming(Option<Message>),
    Session(Option<Session>),
    SessionsClosed,
    Toast(Toast),
}

async fn next_message(subscription: &mut Option<MessageSubscription>) -> Option<Message> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edubridge=info".into()),
        )
        .init();

    // Config
    let config = Config::from_env()?;
    let (backend, local) = config::connect(&config)?;
    let mut sessions = backend.session_changes();
    let (toaster, mut toasts) = Toaster::channel();
    let ctx = AppContext::new(backend, toaster, config.site_url.clone());

    let mut client = Client::new(ctx, local);
    client.start().await?;
    info!("Edubridgepeople shell ready, type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let event = tokio::select! {
            line = lines.next_line() => Event::Line(line?),
            message = next_message(&mut client.subscription) => Event::Incoming(message),
            changed = sessions.changed() => match changed {
                Ok(()) => Event::Session(sessions.borrow_and_update().clone()),
                Err(_) => Event::SessionsClosed,
            },
            Some(toast) = toasts.recv() => Event::Toast(toast),
        };

        match event {
            Event::Line(None) => break,
            Event::Line(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match client.handle(&line).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => println!("   {:#}", err),
                }
            }
            Event::Incoming(Some(message)) => client.on_message(message).await,
            Event::Incoming(None) => {
                warn!("Realtime channel closed");
                client.subscription = None;
            }
            Event::Session(session) => client.on_session(session).await,
            Event::SessionsClosed => break,
            Event::Toast(toast) => println!("{}", render::toast(&toast)),
        }
    }

    info!("Bye");
    Ok(())
}
