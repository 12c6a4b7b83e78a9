use quoteboard::{FeedEvent, FeedSession, ViewerZone};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    // 1. Setup logging so we can see what's happening
    tracing_subscriber::fmt::init();

    let url = std::env::var("QUOTEBOARD_FEED_URL")
        .unwrap_or_else(|_| "ws://localhost:8001/ws".to_string());

    // 2. Create channels
    let (tx_command, rx_command) = mpsc::channel::<String>(32);
    let (tx_event, mut rx_event) = mpsc::channel(100);

    // 3. Spawn the session
    let session = FeedSession::new(&url, ViewerZone::default(), tx_event, rx_command)
        .expect("Invalid URL");
    tokio::spawn(session.run());

    // 4. Print what arrives; the command sender stays alive for the session
    let _keep = tx_command;
    while let Some(event) = rx_event.recv().await {
        match event {
            FeedEvent::Snapshot(snapshot) => {
                let frame = snapshot.frame();
                println!(
                    "Snapshot: {} bars ({:?} .. {:?}), {} trades, last price {:?}",
                    frame.len(),
                    frame.bars().first().map(|b| b.timestamp),
                    frame.bars().last().map(|b| b.timestamp),
                    snapshot.trades.len(),
                    snapshot.summary.as_ref().and_then(|s| s.last_price)
                );
            }
            other => println!("Event: {:?}", other),
        }
    }
}
