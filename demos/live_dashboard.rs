//! Live Dashboard Demo
//!
//! Connects to the quote simulator, renders every update through the
//! logging surface and accepts view/simulation commands on stdin.
//!
//! Endpoints come from the `QUOTEBOARD_*` environment variables.

use quoteboard::{Dashboard, DashboardConfig, LogSurface, ViewMode};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info,quoteboard=debug"))
        .init();

    let config = DashboardConfig::from_env();
    println!("Feed:      {}", config.feed_url);
    println!("Bootstrap: {}", config.bootstrap_url);
    println!("Control:   {}", config.control_url);
    println!("Commands: line | candles | ma | start | stop | speed <x> | quit\n");

    let dashboard = Dashboard::new(config, LogSurface::new())?;
    let handle = dashboard.handle();
    let runtime = tokio::spawn(dashboard.run());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let result = match (words.next(), words.next()) {
            (Some("line"), _) => handle.set_mode(ViewMode::Line).await,
            (Some("candles"), _) => handle.set_mode(ViewMode::Candlestick).await,
            (Some("ma"), _) => handle.toggle_overlays().await,
            (Some("start"), _) => handle.start().await,
            (Some("stop"), _) => handle.stop().await,
            (Some("speed"), Some(x)) => match x.parse::<f64>() {
                Ok(speed) => handle.set_speed(speed).await,
                Err(_) => {
                    println!("Not a number: {}", x);
                    Ok(())
                }
            },
            (Some("quit"), _) | (Some("exit"), _) => break,
            (None, _) => Ok(()),
            (Some(other), _) => {
                println!("Unknown command: {}", other);
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("Dashboard stopped: {}", e);
            break;
        }
    }

    handle.shutdown().await.ok();
    let controller = runtime.await??;
    let state = controller.state();
    println!(
        "Redraws: {} | trades kept: {} | last update: {:?}",
        controller.surface().redraws(),
        state.trades.len(),
        state.last_update
    );
    Ok(())
}
