//! The exchange's observer boundary.
//!
//! `EventSink` is intentionally narrow: a single callback invoked after the
//! per-instrument lock is released, in commission order for that
//! instrument. Concrete sinks (persistence mirrors, WebSocket fan-out,
//! candle aggregation) are external collaborators; this crate ships only
//! the two trivial reference sinks below.

use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::Trade;

/// Observer invoked by the exchange after every `place_order` that
/// produced at least one trade.
///
/// Implementations must not call back into the `Exchange` synchronously
/// from within `on_trades` for the same instrument — doing so risks
/// re-entrant locking, since the exchange may still be finishing other
/// bookkeeping for this call on the same task. Forward asynchronously
/// instead (as `ChannelEventSink` does).
pub trait EventSink: Send + Sync {
    fn on_trades(&self, instrument: &str, trades: &[Trade]);
}

/// A sink that discards everything. The default when no sink is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn on_trades(&self, _instrument: &str, _trades: &[Trade]) {}
}

/// A sink that forwards each batch of trades onto an unbounded channel,
/// satisfying the "forward asynchronously" policy above. Intended for a
/// persistence adapter or market-data publisher to drain on its own task.
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<(String, Vec<Trade>)>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, Vec<Trade>)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn on_trades(&self, instrument: &str, trades: &[Trade]) {
        if self
            .sender
            .send((instrument.to_string(), trades.to_vec()))
            .is_err()
        {
            warn!(instrument, "event sink receiver dropped, discarding trades");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Trade;
    use crate::money::Money;
    use common::types::{AccountId, OrderId};

    fn sample_trade() -> Trade {
        Trade::new(
            "T",
            Money::from_i64(100),
            5,
            AccountId::new(),
            AccountId::new(),
            OrderId::new(),
            OrderId::new(),
            1,
        )
    }

    #[tokio::test]
    async fn channel_sink_forwards_trades() {
        let (sink, mut rx) = ChannelEventSink::new();
        sink.on_trades("T", &[sample_trade()]);
        let (instrument, trades) = rx.recv().await.unwrap();
        assert_eq!(instrument, "T");
        assert_eq!(trades.len(), 1);
    }

    #[test]
    fn null_sink_is_silent() {
        NullEventSink.on_trades("T", &[sample_trade()]);
    }
}
