// Subscribes to one push channel and prints every frame it decodes.
// Usage: push_probe [channel]   e.g. push_probe thread:t1
use anyhow::anyhow;
use skilllink::client::config::ClientConfig;
use skilllink::client::services::websocket_client::{Channel, PushSubscriber, RetryPolicy, SubscriberEvent};
use skilllink::client::utils::session_store::{KeyringStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cfg = ClientConfig::from_env();
    let channel: Channel = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "notifications".to_string())
        .parse()
        .map_err(|e: String| anyhow!(e))?;

    let token = KeyringStore::new().load().map(|(token, _)| token);
    if token.is_none() {
        println!("No stored session, connecting anonymously");
    }

    let subscriber = PushSubscriber::new(&cfg.ws_url, &channel, RetryPolicy::from(&cfg))?.with_token(token);
    println!("Listening on {}", subscriber.url());

    let (_task, mut events) = subscriber.spawn();
    while let Some(event) = events.recv().await {
        match event {
            SubscriberEvent::Connected => println!("CONNECTED"),
            SubscriberEvent::Event(event) => println!("{} -> {:?}", event.kind(), event),
            SubscriberEvent::PayloadError(err) => println!("BAD FRAME -> {}", err),
            SubscriberEvent::Reconnecting { attempt, reason } => println!("RETRY {} -> {}", attempt, reason),
            SubscriberEvent::Exhausted(reason) => {
                println!("GAVE UP -> {}", reason);
                break;
            }
        }
    }
    Ok(())
}
