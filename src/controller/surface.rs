use tracing::{info, warn};

use super::state::ConnectionStatus;
use crate::model::snapshot::{PriceDirection, Summary};
use crate::pipeline::render::{PriceSeries, RenderPayload};

/// The charting collaborator. Only `redraw` is required.
pub trait ChartSurface: Send {
    fn redraw(&mut self, payload: &RenderPayload);

    fn show_summary(&mut self, _summary: &Summary) {}

    fn show_status(&mut self, _status: ConnectionStatus) {}

    /// User-facing error, e.g. a rejected control command.
    fn alert(&mut self, _message: &str) {}
}

/// Surface that writes a one-line digest of everything to the log.
#[derive(Debug, Default)]
pub struct LogSurface {
    redraws: u64,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redraws(&self) -> u64 {
        self.redraws
    }
}

impl ChartSurface for LogSurface {
    fn redraw(&mut self, payload: &RenderPayload) {
        self.redraws += 1;
        let last = match &payload.price.series {
            PriceSeries::Line(points) => points.last().map(|p| p.y),
            PriceSeries::Candles(candles) => candles.last().map(|c| c.c),
        };
        info!(
            "[{}] {} price points (last {:?}), {} overlays, {} volume bars, range {:?}",
            payload.mode,
            payload.price.series.len(),
            last,
            payload.price.overlays.len(),
            payload.volume.bars.len(),
            payload.price.range.map(|r| (r.min, r.max)),
        );
    }

    fn show_summary(&mut self, summary: &Summary) {
        let arrow = match summary.direction() {
            PriceDirection::Up => "▲",
            PriceDirection::Down => "▼",
            PriceDirection::Flat => "-",
        };
        info!(
            "Last {:?} {} | open {:?} high {:?} low {:?} | vol {} | trades {}",
            summary.last_price,
            arrow,
            summary.opening_price,
            summary.day_high,
            summary.day_low,
            summary.total_volume,
            summary.trade_count
        );
    }

    fn show_status(&mut self, status: ConnectionStatus) {
        info!("Feed status: {}", status);
    }

    fn alert(&mut self, message: &str) {
        warn!("ALERT: {}", message);
    }
}
