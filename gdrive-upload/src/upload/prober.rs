use std::convert::Infallible;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use url::Url;

use super::events::EventSink;
use super::transport::UploadTransport;

const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(10);

/// Recovery probe run after a failed streaming attempt.
///
/// Any failure, a missing range, or an offset past the end of the file all
/// mean nothing is confirmed.
pub(crate) async fn recover_offset<T: UploadTransport>(
    transport: &T,
    session_url: &Url,
    token: &str,
    total_size: u64,
) -> Option<u64> {
    match transport.query_offset(session_url, token, total_size).await {
        Ok(Some(offset)) if offset <= total_size => Some(offset),
        Ok(Some(offset)) => {
            warn!(offset, total_size, "probe reported more bytes than the file holds");
            None
        }
        Ok(None) => {
            debug!("probe reported no received bytes");
            None
        }
        Err(err) => {
            warn!(error = %err, "recovery probe failed, restarting from zero");
            None
        }
    }
}

/// Reports remote progress every `period` until dropped.
///
/// Probes run one at a time; ticks missed while a probe is outstanding are
/// skipped. Results are display-only and failures are only logged.
pub(crate) async fn report_progress<T: UploadTransport>(
    transport: &T,
    session_url: &Url,
    token: &str,
    total_size: u64,
    period: Duration,
    events: &EventSink,
) -> Infallible {
    let mut interval = tokio::time::interval(period.max(MIN_PROBE_INTERVAL));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // Skip immediate first tick.

    loop {
        interval.tick().await;
        match transport.query_offset(session_url, token, total_size).await {
            Ok(Some(offset)) => {
                events.progress(format!("{offset}/{total_size} bytes received"));
            }
            Ok(None) => debug!("progress probe: nothing received yet"),
            Err(err) => debug!(error = %err, "progress probe failed"),
        }
    }
}
