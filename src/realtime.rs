//! Push channel for dashboard refresh events.
//!
//! The server broadcasts `computer.status.changed`, `software.installed`
//! and `hardware.alert` on the private `dashboard` channel. Frames arrive
//! Pusher-style (`{"event", "channel", "data"}`, with `data` often a
//! JSON-encoded string) from whatever transport is bridged in, and are fanned
//! out to subscribers through a [`RealtimeChannel`].

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;

pub const COMPUTER_STATUS_CHANGED: &str = "computer.status.changed";
pub const SOFTWARE_INSTALLED: &str = "software.installed";
pub const HARDWARE_ALERT: &str = "hardware.alert";

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputerStatusChanged {
    pub computer_id: u64,
    pub hostname: String,
    /// `online` or `offline`.
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub lab_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareInstalled {
    pub computer_id: u64,
    pub computer_hostname: String,
    pub software_id: u64,
    pub software_name: String,
    #[serde(default)]
    pub software_version: Option<String>,
    /// `installed` or `removed`.
    pub action: String,
    #[serde(default)]
    pub lab_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareAlert {
    pub computer_id: u64,
    pub hostname: String,
    pub alert_type: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub lab_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    ComputerStatusChanged(ComputerStatusChanged),
    SoftwareInstalled(SoftwareInstalled),
    HardwareAlert(HardwareAlert),
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl DashboardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DashboardEvent::ComputerStatusChanged(_) => COMPUTER_STATUS_CHANGED,
            DashboardEvent::SoftwareInstalled(_) => SOFTWARE_INSTALLED,
            DashboardEvent::HardwareAlert(_) => HARDWARE_ALERT,
        }
    }

    pub fn computer_id(&self) -> u64 {
        match self {
            DashboardEvent::ComputerStatusChanged(e) => e.computer_id,
            DashboardEvent::SoftwareInstalled(e) => e.computer_id,
            DashboardEvent::HardwareAlert(e) => e.computer_id,
        }
    }

    /// Parse one frame. Events the dashboard does not listen to, including
    /// `pusher:*` protocol frames, yield `Ok(None)`.
    pub fn from_frame(frame: &str) -> Result<Option<Self>, serde_json::Error> {
        let frame: Frame = serde_json::from_str(frame)?;
        // Echo listeners address custom broadcast names with a leading dot.
        let name = frame.event.strip_prefix('.').unwrap_or(&frame.event);
        let data = match frame.data {
            serde_json::Value::String(encoded) => serde_json::from_str(&encoded)?,
            other => other,
        };

        let event = match name {
            COMPUTER_STATUS_CHANGED => {
                DashboardEvent::ComputerStatusChanged(serde_json::from_value(data)?)
            }
            SOFTWARE_INSTALLED => DashboardEvent::SoftwareInstalled(serde_json::from_value(data)?),
            HARDWARE_ALERT => DashboardEvent::HardwareAlert(serde_json::from_value(data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// In-process fan-out of dashboard events.
#[derive(Debug, Clone)]
pub struct RealtimeChannel {
    tx: broadcast::Sender<DashboardEvent>,
}

impl Default for RealtimeChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RealtimeChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: DashboardEvent) -> usize {
        tracing::debug!(event = event.name(), computer_id = event.computer_id(), "publishing");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// What a subscription hands back on each receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(DashboardEvent),
    /// The subscriber fell behind and this many events were dropped.
    Missed(u64),
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<DashboardEvent>,
}

impl Subscription {
    /// `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        match self.rx.recv().await {
            Ok(event) => Some(Delivery::Event(event)),
            Err(broadcast::error::RecvError::Lagged(n)) => Some(Delivery::Missed(n)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Read newline-delimited frames and publish the dashboard events among
/// them until EOF. Malformed frames are logged and skipped.
pub async fn feed_frames<R>(reader: R, channel: &RealtimeChannel) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match DashboardEvent::from_frame(line) {
            Ok(Some(event)) => {
                channel.publish(event);
                published += 1;
            }
            Ok(None) => tracing::trace!(frame = line, "ignoring frame"),
            Err(err) => tracing::warn!(error = %err, "malformed realtime frame"),
        }
    }
    Ok(published)
}
