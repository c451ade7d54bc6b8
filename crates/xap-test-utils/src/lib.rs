//! Common test helpers and fixtures for xAP tests
//!
//! This crate provides:
//! - Wire text fixtures for the message classes the stack understands
//! - Channel helpers for draining and awaiting device output
//! - Condition-based waiting (no hardcoded sleeps)
//! - UDP port allocation

use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Wire Fixtures
// ============================================================================

/// A heartbeat from `ACME.Lighting.apartment`
pub const HEARTBEAT: &str = "xap-hbeat\n\
{\n\
v=12\n\
hop=1\n\
uid=FF345600\n\
class=xap-hbeat.alive\n\
source=ACME.Lighting.apartment\n\
interval=60\n\
}\n";

/// A BSC command turning `Output 1` on at 40%
pub const BSC_COMMAND: &str = "xap-header\n\
{\n\
v=12\n\
hop=1\n\
uid=FF123400\n\
class=xAPBSC.cmd\n\
source=ACME.Controller.Central\n\
target=ACME.Lighting.apartment:Output 1\n\
}\n\
output.state.1\n\
{\n\
ID=*\n\
State=ON\n\
Level=40%\n\
}\n";

/// A BSC query for every endpoint of `ACME.Lighting.apartment`
pub const BSC_QUERY: &str = "xap-header\n\
{\n\
v=12\n\
hop=1\n\
uid=FF123400\n\
class=xAPBSC.query\n\
source=ACME.Controller.Central\n\
target=ACME.Lighting.apartment:*\n\
}\n\
request\n\
{\n\
}\n";

/// A BSC info report from an input endpoint
pub const BSC_INFO: &str = "xap-header\n\
{\n\
v=12\n\
hop=1\n\
uid=FF345602\n\
class=xAPBSC.info\n\
source=ACME.Lighting.apartment:Switch\n\
}\n\
input.state\n\
{\n\
State=OFF\n\
}\n";

/// A message of a class nothing registers, with a hex-valued pair
pub const UNKNOWN_CLASS: &str = "xap-header\n\
{\n\
v=12\n\
hop=1\n\
uid=FF345600\n\
class=Weather.Report\n\
source=ACME.Weather.roof\n\
}\n\
weather.report\n\
{\n\
TempC=21.5\n\
Raw!48656C6C6F\n\
}\n";

// ============================================================================
// Channel Helpers
// ============================================================================

/// Take every message currently queued on a receiver
pub fn drain<T>(rx: &mut UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

/// Wait for the next message, giving up after `max_wait`
pub async fn recv_within<T>(rx: &mut UnboundedReceiver<T>, max_wait: Duration) -> Option<T> {
    timeout(max_wait, rx.recv()).await.ok().flatten()
}

/// Wait for the first message satisfying `pred`, discarding the others
pub async fn recv_matching<T, F>(
    rx: &mut UnboundedReceiver<T>,
    max_wait: Duration,
    mut pred: F,
) -> Option<T>
where
    F: FnMut(&T) -> bool,
{
    let deadline = Instant::now() + max_wait;
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        let item = recv_within(rx, remaining).await?;
        if pred(&item) {
            return Some(item);
        }
    }
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available UDP port for testing
pub fn find_available_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}
