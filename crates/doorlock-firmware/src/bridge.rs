//! Host bridge unit.
//!
//! Owns the serial link. Inbound lines are decoded by [`HostLineCodec`] and
//! dispatched as actuator commands, display updates or sensor requests.
//! Identification events from the sensing unit are rendered as JSON and
//! written out through [`SerialWriter`], whose lock is held for exactly one
//! message.
//!
//! Sensor requests use a blocking send. While such a send waits, the bridge
//! keeps draining the event queue, so a sensing unit blocked on a full event
//! queue can never hold the bridge up in return.

use crate::channels::{DiagnosticHook, QueueReceiver, QueueSender};
use crate::config::FirmwareConfig;
use doorlock_core::{ControlCommand, Error, IdentificationEvent, Result, SensorRequest};
use doorlock_protocol::{
    CodecError, HostCommand, HostLineCodec, InboundLine, OutboundMessage, StatusReport,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, trace};

/// Serialized writer for the outbound half of the serial link.
///
/// Clones share one underlying stream; each [`SerialWriter::write`] holds
/// the lock only while its own line is written and flushed.
pub struct SerialWriter<W> {
    inner: Arc<Mutex<FramedWrite<W, HostLineCodec>>>,
}

impl<W> Clone for SerialWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> SerialWriter<W> {
    pub fn new(writer: W, codec: HostLineCodec) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FramedWrite::new(writer, codec))),
        }
    }

    /// Write one message as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the link fails.
    pub async fn write(&self, message: OutboundMessage) -> Result<()> {
        let mut framed = self.inner.lock().await;
        framed.send(message).await?;
        Ok(())
    }
}

/// Queue ends used by the host bridge.
#[derive(Debug)]
pub struct BridgeQueues {
    pub actuator: QueueSender<ControlCommand>,
    pub display: QueueSender<ControlCommand>,
    pub requests: QueueSender<SensorRequest>,
    pub events: QueueReceiver<IdentificationEvent>,
}

/// What ended one wait of the bridge loop.
enum Wake {
    Line(Option<std::result::Result<InboundLine, CodecError>>),
    Event(Option<IdentificationEvent>),
    Idle,
}

/// The host bridge unit.
pub struct HostBridge<R, W> {
    config: Arc<FirmwareConfig>,
    lines: FramedRead<R, HostLineCodec>,
    writer: SerialWriter<W>,
    queues: BridgeQueues,
    hook: Arc<dyn DiagnosticHook>,
    inbound_open: bool,
    events_open: bool,
}

impl<R, W> HostBridge<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        config: Arc<FirmwareConfig>,
        reader: R,
        writer: W,
        queues: BridgeQueues,
        hook: Arc<dyn DiagnosticHook>,
    ) -> Self {
        let limit = config.serial.max_line_length;
        Self {
            lines: FramedRead::new(reader, HostLineCodec::with_max_line_length(limit)),
            writer: SerialWriter::new(writer, HostLineCodec::with_max_line_length(limit)),
            config,
            queues,
            hook,
            inbound_open: true,
            events_open: true,
        }
    }

    /// A handle on the outbound stream, sharing the bridge's write lock.
    pub fn writer(&self) -> SerialWriter<W> {
        self.writer.clone()
    }

    /// Run until both the host link and the event queue are closed.
    ///
    /// A closed inbound link alone does not stop the bridge: events are
    /// still reported for as long as the sensing unit produces them.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the serial link fails.
    pub async fn run(mut self) -> Result<()> {
        while self.inbound_open || self.events_open {
            match self.run_pass().await {
                Ok(()) => {}
                Err(Error::QueueClosed(queue)) => {
                    info!(queue, "queue closed, host bridge stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        info!("host link and event queue closed, host bridge stopping");
        Ok(())
    }

    /// Wait for one inbound line or one event, or for the poll interval.
    ///
    /// Inbound lines win when both are ready.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the serial link fails and `Error::QueueClosed`
    /// if a consumer this bridge feeds has stopped.
    pub async fn run_pass(&mut self) -> Result<()> {
        let poll = self.config.timing.bridge_poll();
        let wake = tokio::select! {
            biased;
            line = self.lines.next(), if self.inbound_open => Wake::Line(line),
            event = self.queues.events.recv(), if self.events_open => Wake::Event(event),
            () = sleep(poll) => Wake::Idle,
        };

        match wake {
            Wake::Line(Some(Ok(InboundLine::Command(command)))) => self.dispatch(command).await,
            Wake::Line(Some(Ok(InboundLine::Rejected(reason)))) => {
                self.hook.line_rejected(&reason);
                Ok(())
            }
            Wake::Line(Some(Err(e))) => Err(e.into()),
            Wake::Line(None) => {
                info!("host link closed");
                self.inbound_open = false;
                Ok(())
            }
            Wake::Event(Some(event)) => forward(&self.writer, event).await,
            Wake::Event(None) => {
                debug!("event queue closed");
                self.events_open = false;
                Ok(())
            }
            Wake::Idle => Ok(()),
        }
    }

    async fn dispatch(&mut self, command: HostCommand) -> Result<()> {
        debug!(cmd = command.name(), "host command");
        match command {
            HostCommand::Unlock { duration } => {
                self.queues
                    .actuator
                    .send(ControlCommand::Unlock { seconds: duration })
                    .await?;
                self.show(&self.config.messages.door_unlocked);
            }
            HostCommand::Lock => {
                self.queues.actuator.send(ControlCommand::Lock).await?;
                self.show(&self.config.messages.door_locked);
            }
            HostCommand::Beep { times } => {
                self.queues
                    .actuator
                    .send(ControlCommand::Beep { times })
                    .await?;
            }
            HostCommand::Led { color } => {
                self.queues
                    .actuator
                    .send(ControlCommand::StatusLight(color.light_mode()))
                    .await?;
            }
            HostCommand::EnrollFingerprint { id } => {
                self.writer
                    .write(StatusReport::EnrollmentStarted.into())
                    .await?;
                self.request(SensorRequest::Enroll { slot: id }).await?;
            }
            HostCommand::DeleteFingerprint { id } => {
                self.request(SensorRequest::Delete { slot: id }).await?;
            }
            HostCommand::ListFingerprints => {
                self.writer
                    .write(StatusReport::ListingFingerprints.into())
                    .await?;
                self.request(SensorRequest::List).await?;
            }
            HostCommand::ClearAllFingerprints => {
                self.request(SensorRequest::ClearAll).await?;
            }
        }
        Ok(())
    }

    /// Hand `request` to the sensing unit, forwarding events while waiting.
    async fn request(&mut self, request: SensorRequest) -> Result<()> {
        let send = self.queues.requests.send(request);
        tokio::pin!(send);

        loop {
            tokio::select! {
                biased;
                sent = &mut send => return sent,
                event = self.queues.events.recv(), if self.events_open => match event {
                    Some(event) => forward(&self.writer, event).await?,
                    None => self.events_open = false,
                },
            }
        }
    }

    fn show(&self, text: &str) {
        self.queues.display.offer(ControlCommand::display(text));
    }
}

async fn forward<W>(writer: &SerialWriter<W>, event: IdentificationEvent) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    match OutboundMessage::from_event(&event) {
        Some(message) => writer.write(message).await,
        None => {
            trace!(kind = ?event.kind(), "event not reported to host");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{DiagnosticCounter, QueueName, queue};
    use doorlock_core::LightMode;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};
    use tokio::task::JoinHandle;

    struct Harness {
        host_tx: DuplexStream,
        host_rx: BufReader<DuplexStream>,
        actuator: QueueReceiver<ControlCommand>,
        display: QueueReceiver<ControlCommand>,
        requests: QueueReceiver<SensorRequest>,
        events: QueueSender<IdentificationEvent>,
        counter: Arc<DiagnosticCounter>,
        task: JoinHandle<Result<()>>,
    }

    impl Harness {
        fn start() -> Self {
            let config = Arc::new(FirmwareConfig::default());
            let counter = Arc::new(DiagnosticCounter::default());
            let hook: Arc<dyn DiagnosticHook> = counter.clone();

            let (actuator_tx, actuator) = queue(QueueName::Actuator, 10, hook.clone());
            let (display_tx, display) = queue(QueueName::Display, 5, hook.clone());
            let (requests_tx, requests) = queue(QueueName::SensorRequests, 4, hook.clone());
            let (events, events_rx) = queue(QueueName::Events, 10, hook.clone());

            let (host_tx, device_rx) = duplex(1024);
            let (device_tx, host_rx) = duplex(1024);
            let bridge = HostBridge::new(
                config,
                device_rx,
                device_tx,
                BridgeQueues {
                    actuator: actuator_tx,
                    display: display_tx,
                    requests: requests_tx,
                    events: events_rx,
                },
                hook,
            );

            Self {
                host_tx,
                host_rx: BufReader::new(host_rx),
                actuator,
                display,
                requests,
                events,
                counter,
                task: tokio::spawn(bridge.run()),
            }
        }

        async fn send_line(&mut self, line: &str) {
            self.host_tx.write_all(line.as_bytes()).await.unwrap();
            self.host_tx.write_all(b"\n").await.unwrap();
        }

        async fn read_line(&mut self) -> String {
            let mut line = String::new();
            self.host_rx.read_line(&mut line).await.unwrap();
            line.trim_end().to_string()
        }
    }

    const WAIT: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn test_unlock_queues_actuator_and_display() {
        let mut h = Harness::start();
        h.send_line(r#"{"cmd":"unlock","duration":3}"#).await;

        let command = h.actuator.recv_timeout(WAIT).await.unwrap();
        assert_eq!(command, Some(ControlCommand::Unlock { seconds: 3 }));
        let display = h.display.recv_timeout(WAIT).await.unwrap();
        assert_eq!(display, Some(ControlCommand::display("DOOR UNLOCKED")));
    }

    #[tokio::test]
    async fn test_led_maps_to_light_mode() {
        let mut h = Harness::start();
        h.send_line(r#"{"cmd":"led","color":"red"}"#).await;

        let command = h.actuator.recv_timeout(WAIT).await.unwrap();
        assert_eq!(command, Some(ControlCommand::StatusLight(LightMode::FastBlink)));
    }

    #[tokio::test]
    async fn test_malformed_lines_are_counted_and_skipped() {
        let mut h = Harness::start();
        h.send_line("{not json").await;
        h.send_line(r#"{"cmd":"open_sesame"}"#).await;
        h.send_line(r#"{"cmd":"beep","times":3}"#).await;

        let command = h.actuator.recv_timeout(WAIT).await.unwrap();
        assert_eq!(command, Some(ControlCommand::Beep { times: 3 }));
        assert_eq!(h.counter.rejected(), 2);
    }

    #[tokio::test]
    async fn test_enroll_echoes_then_requests() {
        let mut h = Harness::start();
        h.send_line(r#"{"cmd":"enroll_fingerprint","id":7}"#).await;

        assert_eq!(h.read_line().await, r#"{"status":"enrollment_started"}"#);
        let request = h.requests.recv_timeout(WAIT).await.unwrap();
        assert_eq!(request, Some(SensorRequest::Enroll { slot: 7 }));
    }

    #[tokio::test]
    async fn test_events_are_forwarded_as_json() {
        let mut h = Harness::start();
        h.events
            .send(IdentificationEvent::key_pressed('4'))
            .await
            .unwrap();
        h.events
            .send(IdentificationEvent::card_read("0A1B2C3D"))
            .await
            .unwrap();

        assert_eq!(h.read_line().await, r#"{"type":"rfid","uid":"0A1B2C3D"}"#);
    }

    #[tokio::test]
    async fn test_events_flow_while_request_queue_is_full() {
        let mut h = Harness::start();
        for _ in 0..5 {
            h.send_line(r#"{"cmd":"clear_all_fingerprints"}"#).await;
        }
        // Four requests fit; the fifth send waits while events keep flowing.
        h.events
            .send(IdentificationEvent::biometric_match(3))
            .await
            .unwrap();
        assert_eq!(h.read_line().await, r#"{"type":"fingerprint","id":"3"}"#);

        for _ in 0..5 {
            let request = h.requests.recv_timeout(WAIT).await.unwrap();
            assert_eq!(request, Some(SensorRequest::ClearAll));
        }
    }

    #[tokio::test]
    async fn test_stops_when_link_and_events_close() {
        let h = Harness::start();
        drop(h.host_tx);
        drop(h.events);

        let result = tokio::time::timeout(WAIT, h.task).await.unwrap().unwrap();
        assert!(result.is_ok());
    }
}
