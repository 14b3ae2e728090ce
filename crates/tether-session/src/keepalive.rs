//! Keep-alive loop for an open transport.
//!
//! Exactly one keeper runs per open socket; the session actor cancels it on
//! disconnect and starts a fresh one after reconnecting. The variant decides
//! what flows: protocol pings at a short interval, or empty application
//! envelopes at a long interval (for deployments where intermediaries eat
//! ping frames).

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use tether_protocol::Envelope;
use tether_settings::KeepAliveVariant;

use crate::transport::TransportSender;

/// Outcome of the keep-alive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepAliveResult {
    /// Cancelled externally (disconnect or shutdown).
    Cancelled,
    /// The transport went away underneath us.
    TransportGone,
}

/// Run the keep-alive loop until cancelled or the transport dies.
///
/// The first signal goes out one full `interval` after start, not
/// immediately; a socket that just opened is trivially alive.
pub async fn run_keepalive(
    variant: KeepAliveVariant,
    interval: Duration,
    transport: TransportSender,
    cancel: CancellationToken,
) -> KeepAliveResult {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sent = match variant {
                    KeepAliveVariant::ProtocolPing => transport.ping().await,
                    KeepAliveVariant::AppEnvelope => transport.send(Envelope::KeepAlive).await,
                };
                if sent.is_err() {
                    return KeepAliveResult::TransportGone;
                }
                trace!(?variant, "keep-alive sent");
            }
            () = cancel.cancelled() => {
                return KeepAliveResult::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    // Build a sender whose channel we can observe or drop.
    fn test_sender() -> (TransportSender, mpsc::Receiver<crate::transport::Outbound>) {
        crate::transport::test_channel()
    }

    #[tokio::test]
    async fn cancelled_before_first_tick() {
        let (sender, _rx) = test_sender();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_keepalive(
            KeepAliveVariant::ProtocolPing,
            Duration::from_secs(30),
            sender,
            cancel,
        )
        .await;
        assert_eq!(result, KeepAliveResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn pings_flow_at_interval() {
        let (sender, mut rx) = test_sender();
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(run_keepalive(
            KeepAliveVariant::ProtocolPing,
            Duration::from_secs(30),
            sender,
            cancel2,
        ));

        // Nothing before the first interval elapses.
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_ok());

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), KeepAliveResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn envelope_variant_sends_envelopes() {
        let (sender, mut rx) = test_sender();
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(run_keepalive(
            KeepAliveVariant::AppEnvelope,
            Duration::from_secs(540),
            sender,
            cancel2,
        ));

        tokio::time::sleep(Duration::from_secs(541)).await;
        assert!(rx.try_recv().is_ok());

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), KeepAliveResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_transport_ends_loop() {
        let (sender, rx) = test_sender();
        drop(rx);
        let cancel = CancellationToken::new();

        let result = run_keepalive(
            KeepAliveVariant::ProtocolPing,
            Duration::from_secs(30),
            sender,
            cancel,
        )
        .await;
        assert_eq!(result, KeepAliveResult::TransportGone);
    }
}
