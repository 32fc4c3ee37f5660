//! Relay Loop

use crate::config::RelayConfig;
use crate::error::{RelayError, TransportError};
use crate::ingest::{DecodeStats, FrameIngest};
use crate::processor::SignalProcessor;
use crate::publisher::DeltaPublisher;
use crate::source::FrameSource;
use metrics::gauge;
use ring_buffer::{HistoryRing, Sample};
use stream_protocol::{
    FilterSettings, FilterUpdate, MetaPayload, RelayMessage, SnapshotPayload, StatusReply,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What a new listener starts from
#[derive(Debug)]
pub struct Subscription {
    /// Most recent meta message, if any was published
    pub meta: Option<MetaPayload>,
    /// Everything published so far, if anything
    pub snapshot: Option<SnapshotPayload>,
    /// Every message published after the snapshot
    pub receiver: broadcast::Receiver<RelayMessage>,
}

enum RelayCommand {
    Subscribe {
        reply: oneshot::Sender<Subscription>,
    },
    SetFilters {
        update: FilterUpdate,
        reply: oneshot::Sender<FilterSettings>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Status {
        with_snapshot: bool,
        reply: oneshot::Sender<StatusReply>,
    },
}

/// Cloneable handle for talking to a running [`Relay`]
#[derive(Clone)]
pub struct RelayHandle {
    commands: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RelayCommand,
    ) -> Result<T, RelayError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| RelayError::Stopped)?;
        response.await.map_err(|_| RelayError::Stopped)
    }

    /// Join as a listener
    pub async fn subscribe(&self) -> Result<Subscription, RelayError> {
        self.request(|reply| RelayCommand::Subscribe { reply }).await
    }

    /// Update filter toggles, returning the full resulting settings
    pub async fn set_filters(&self, update: FilterUpdate) -> Result<FilterSettings, RelayError> {
        self.request(|reply| RelayCommand::SetFilters { update, reply })
            .await
    }

    /// Drop all buffered samples and signal-processor state
    pub async fn clear(&self) -> Result<(), RelayError> {
        self.request(|reply| RelayCommand::Clear { reply }).await
    }

    /// Current status and buffer contents
    pub async fn status(&self) -> Result<StatusReply, RelayError> {
        self.request(|reply| RelayCommand::Status {
            with_snapshot: true,
            reply,
        })
        .await
    }

    /// Current status and buffer size, without copying the buffer
    pub async fn summary(&self) -> Result<StatusReply, RelayError> {
        self.request(|reply| RelayCommand::Status {
            with_snapshot: false,
            reply,
        })
        .await
    }
}

/// Owns the relay ring and every path that touches it.
///
/// Polling, publishing and control commands all run on the one task that
/// drives [`Relay::run`], so the ring has a single mutator.
pub struct Relay<S, P> {
    config: RelayConfig,
    source: S,
    processor: P,
    ring: HistoryRing<Sample>,
    ingest: FrameIngest,
    publisher: DeltaPublisher,
    filters: FilterSettings,
    connected: bool,
    status: String,
    status_changed: bool,
    last_count: usize,
    last_bpm: Option<u32>,
    last_polarity: Option<i8>,
    last_threshold: Option<f64>,
    last_sampling_rate: Option<f64>,
    last_meta: Option<MetaPayload>,
    tx: broadcast::Sender<RelayMessage>,
    commands: mpsc::Receiver<RelayCommand>,
}

impl<S, P> Relay<S, P>
where
    S: FrameSource,
    P: SignalProcessor,
{
    /// Create a relay and the handle used to reach it
    pub fn new(config: RelayConfig, source: S, processor: P) -> (Self, RelayHandle) {
        info!(
            "Creating relay: poll={}ms, publish={}ms, buffer={} samples",
            config.poll_interval_ms, config.publish_interval_ms, config.buffer_capacity
        );
        let (tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let (command_tx, commands) = mpsc::channel(config.command_capacity.max(1));

        let relay = Self {
            ring: HistoryRing::new(config.buffer_capacity),
            ingest: FrameIngest::new(),
            publisher: DeltaPublisher::new(),
            filters: FilterSettings::default(),
            connected: false,
            status: "Not connected".to_string(),
            status_changed: false,
            last_count: 0,
            last_bpm: None,
            last_polarity: None,
            last_threshold: None,
            last_sampling_rate: None,
            last_meta: None,
            tx,
            commands,
            config,
            source,
            processor,
        };

        (relay, RelayHandle { commands: command_tx })
    }

    /// Run until `shutdown` flips to `true` or every handle is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting relay loop");
        let mut poll = tokio::time::interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut publish = tokio::time::interval(self.config.publish_interval());
        publish.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    self.poll_once().await;
                }
                _ = publish.tick() => {
                    self.publish_tick();
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Relay loop stopped");
    }

    /// Issue one poll call and apply the response.
    ///
    /// Returns the number of samples appended. Transport and integrity
    /// failures are recorded and left for the next interval.
    pub async fn poll_once(&mut self) -> usize {
        if !self.connected {
            if let Err(err) = self.source.connect().await {
                self.set_status(format!("Transport error: {}", err));
                return 0;
            }
            self.connected = true;
            self.set_status(self.source.describe());
        }

        let result =
            match tokio::time::timeout(self.config.poll_timeout(), self.source.request_frame()).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.config.poll_timeout_ms)),
            };
        let response = match result {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Poll failed: {}", err);
                self.connected = false;
                self.set_status(format!("Transport error: {}", err));
                return 0;
            }
        };

        let Ok(frame) = self.ingest.ingest(&response, &mut self.ring) else {
            return 0;
        };
        if frame.is_empty() {
            return 0;
        }

        self.last_count = frame.count();
        if let (Some(first), Some(last)) = (frame.samples.first(), frame.samples.last()) {
            let span_ms = last.timestamp_ms.wrapping_sub(first.timestamp_ms);
            if frame.count() >= 2 && span_ms > 0 {
                self.last_sampling_rate =
                    Some((frame.count() - 1) as f64 / (span_ms as f64 / 1000.0));
            }
        }

        self.publisher.note_appended(frame.count());
        frame.count()
    }

    /// Run the signal processor over the current window and broadcast meta
    /// plus one delta.
    ///
    /// Nothing is sent, and the processor is not invoked, when no samples
    /// arrived and the status is unchanged. Returns the number of messages
    /// broadcast.
    pub fn publish_tick(&mut self) -> usize {
        let pending = self.publisher.pending();
        if pending == 0 && !self.status_changed {
            return 0;
        }

        let output = self.processor.process(&self.ring, pending.min(self.ring.len()));
        self.last_threshold = output.threshold;
        if output.bpm.is_some() {
            self.last_bpm = output.bpm;
        }
        if output.polarity.is_some() {
            self.last_polarity = output.polarity;
        }

        let meta = self.build_meta(output.status);
        self.last_meta = Some(meta.clone());
        self.status_changed = false;

        let mut sent = 0;
        let listeners = self.tx.receiver_count();
        gauge!("relay_listeners").set(listeners as f64);

        // No listeners is not an error; the batch is simply not seen.
        if self.tx.send(RelayMessage::Meta(meta)).is_ok() {
            sent += 1;
        }
        if let Some(delta) = self.publisher.take_delta(&self.ring, self.last_threshold) {
            debug!("Publishing delta of {} samples to {} listeners", delta.len(), listeners);
            if self.tx.send(RelayMessage::Delta(delta)).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    /// Join as a listener: the snapshot and the receiver are taken at the
    /// same point, so the first delta received continues the snapshot.
    pub fn subscribe(&mut self) -> Subscription {
        let subscription = Subscription {
            meta: self.last_meta.clone(),
            snapshot: self.publisher.snapshot(&self.ring, self.last_threshold),
            receiver: self.tx.subscribe(),
        };
        info!("Listener joined ({} total)", self.tx.receiver_count());
        subscription
    }

    /// Frame counters so far
    pub fn stats(&self) -> DecodeStats {
        self.ingest.stats()
    }

    /// Samples currently held
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    fn handle_command(&mut self, command: RelayCommand) {
        match command {
            RelayCommand::Subscribe { reply } => {
                let _ = reply.send(self.subscribe());
            }
            RelayCommand::SetFilters { update, reply } => {
                self.filters.apply(&update);
                self.processor.set_filters(&self.filters);
                info!("Filters updated: {:?}", self.filters);
                let _ = reply.send(self.filters);
            }
            RelayCommand::Clear { reply } => {
                self.clear();
                let _ = reply.send(());
            }
            RelayCommand::Status {
                with_snapshot,
                reply,
            } => {
                let snapshot = if with_snapshot {
                    self.publisher.snapshot(&self.ring, self.last_threshold)
                } else {
                    None
                };
                let _ = reply.send(StatusReply {
                    status: self.status.clone(),
                    filters: self.filters,
                    buffered: self.ring.len(),
                    snapshot,
                });
            }
        }
    }

    fn clear(&mut self) {
        info!("Clearing relay buffer ({} samples)", self.ring.len());
        self.ring.clear();
        self.publisher.reset();
        self.processor.reset();
        self.last_count = 0;
        self.last_bpm = None;
        self.last_polarity = None;
        self.last_threshold = None;
        self.last_sampling_rate = None;
        self.last_meta = None;
    }

    fn set_status(&mut self, status: String) {
        if status != self.status {
            info!("Relay status: {}", status);
            self.status = status;
            self.status_changed = true;
        }
    }

    fn build_meta(&self, signal_status: Option<String>) -> MetaPayload {
        let stats = self.ingest.stats();
        MetaPayload {
            status: self.status.clone(),
            last_count: self.last_count,
            bpm: self.last_bpm,
            polarity: self.last_polarity,
            sampling_rate_hz: self.last_sampling_rate,
            filters: self.filters,
            signal_status,
            integrity_failures: stats.integrity_failures,
            overflow_events: stats.overflow_events,
        }
    }
}
