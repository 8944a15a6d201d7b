//! The poll-parse-emit loop.

use std::io;
use std::time::Duration;

use gpubeat_smi::{SmiCommand, SmiError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::events::{build_events, ProcessTracking};
use crate::output::{Output, Publisher};

/// Default time between polls.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Outcome of one successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Devices in the snapshot.
    pub devices: usize,
    /// Events accepted by the publisher.
    pub published: usize,
    /// Events the publisher rejected.
    pub failed: usize,
}

/// Runs the diagnostic command and publishes the resulting events.
///
/// This is the body of one tick, usable on its own for one-shot
/// collection.
#[derive(Debug, Clone)]
pub struct Collector {
    command: SmiCommand,
    tracking: ProcessTracking,
}

impl Collector {
    pub fn new(command: SmiCommand, tracking: ProcessTracking) -> Self {
        Self { command, tracking }
    }

    pub fn command(&self) -> &SmiCommand {
        &self.command
    }

    pub fn tracking(&self) -> ProcessTracking {
        self.tracking
    }

    /// Poll once: capture a snapshot, build its events and publish them.
    ///
    /// Command and decode failures abort the cycle before anything is
    /// published. A rejected event is logged and counted; the remaining
    /// events are still published.
    pub async fn poll_once(&self, publisher: &mut Publisher) -> Result<CycleReport, SmiError> {
        let snapshot = self.command.snapshot().await?;
        let events = build_events(&snapshot, self.tracking);

        let mut report = CycleReport {
            devices: snapshot.gpus.len(),
            ..Default::default()
        };

        for event in events {
            let kind = event.kind;
            match publisher.publish(event).await {
                Ok(()) => {
                    report.published += 1;
                    debug!(%kind, "GPU metric event sent");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(%kind, error = %err, "failed to publish event");
                }
            }
        }

        if let Err(err) = publisher.flush().await {
            warn!(error = %err, "failed to flush output");
        }

        Ok(report)
    }
}

/// Polls the diagnostic tool on a fixed period and publishes every event.
///
/// The beater owns its output. The output is connected when the beater
/// starts running and closed exactly once after the loop exits; a cycle is
/// never interrupted by a stop request.
///
/// # Example
///
/// ```rust,no_run
/// use gpubeat_sdk::{Beater, Output};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     let (output, mut rx) = Output::channel(64);
///
///     let handle = Beater::builder()
///         .output(output)
///         .period(Duration::from_secs(5))
///         .build()
///         .start();
///
///     if let Some(event) = rx.recv().await {
///         println!("{} event for {}", event.kind, event.gpu_id());
///     }
///
///     handle.stop().await
/// }
/// ```
#[derive(Debug)]
pub struct Beater {
    collector: Collector,
    output: Output,
    period: Duration,
}

impl Beater {
    /// Create a beater with default settings.
    ///
    /// Polls `nvidia-smi -q -x` every second, tracks processes and
    /// publishes to stdout.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> BeaterBuilder {
        BeaterBuilder::new()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    /// Spawn [`Beater::run`] on the current tokio runtime.
    ///
    /// Returns a handle that can be used to stop the loop.
    pub fn start(self) -> BeaterHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        BeaterHandle { stop_tx, task }
    }

    /// Run until `stop` becomes `true` or its sender is dropped.
    ///
    /// The first poll happens one period after the output is connected.
    /// A cycle that overruns the period delays the next tick; cycles never
    /// overlap. Returns an error only if the output cannot be opened or
    /// closed.
    pub async fn run(self, mut stop: watch::Receiver<bool>) -> io::Result<()> {
        let Beater {
            collector,
            output,
            period,
        } = self;

        let mut publisher = output.connect().await?;
        info!(
            output = publisher.description(),
            period_ms = period.as_millis() as u64,
            "gpubeat is running"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *stop.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            match collector.poll_once(&mut publisher).await {
                Ok(report) => debug!(
                    devices = report.devices,
                    published = report.published,
                    failed = report.failed,
                    "cycle complete"
                ),
                Err(err) => warn!(error = %err, "skipping tick"),
            }
        }

        let published = publisher.published();
        publisher.close().await?;
        info!(published, "gpubeat stopped");
        Ok(())
    }
}

impl Default for Beater {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring a [`Beater`].
#[derive(Debug, Default)]
pub struct BeaterBuilder {
    command: Option<SmiCommand>,
    output: Option<Output>,
    period: Option<Duration>,
    tracking: ProcessTracking,
}

impl BeaterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the diagnostic command (default: `nvidia-smi -q -x`, 10s timeout).
    pub fn command(mut self, command: SmiCommand) -> Self {
        self.command = Some(command);
        self
    }

    /// Set the publishing destination (default: stdout).
    pub fn output(mut self, output: Output) -> Self {
        self.output = Some(output);
        self
    }

    /// Set the polling period.
    ///
    /// Defaults to 1 second if not specified or zero.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    /// Enable or disable per-process events (default: enabled).
    pub fn process_tracking(mut self, tracking: impl Into<ProcessTracking>) -> Self {
        self.tracking = tracking.into();
        self
    }

    pub fn build(self) -> Beater {
        Beater {
            collector: Collector::new(self.command.unwrap_or_default(), self.tracking),
            output: self.output.unwrap_or_default(),
            period: self
                .period
                .filter(|p| !p.is_zero())
                .unwrap_or(DEFAULT_PERIOD),
        }
    }
}

/// Handle for a beater spawned with [`Beater::start`].
///
/// Drop this handle to stop the loop, or call `stop()` to stop it and wait
/// for the output to be closed.
#[derive(Debug)]
pub struct BeaterHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<io::Result<()>>,
}

impl BeaterHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn stop(self) -> io::Result<()> {
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(io::Error::other(err)),
        }
    }

    /// True once the loop has exited and the output is closed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpubeat_types::{Event, EventKind};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const FIXTURE_PATH: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../gpubeat-smi/tests/fixtures/nvidia_smi_log.xml"
    );

    fn fixture_command() -> SmiCommand {
        SmiCommand::builder()
            .program("cat")
            .args([FIXTURE_PATH])
            .build()
    }

    fn failing_command() -> SmiCommand {
        SmiCommand::builder().program("false").build()
    }

    async fn drain(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("output was not closed")
        {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_builder_defaults() {
        let beater = Beater::new();
        assert_eq!(beater.period(), Duration::from_secs(1));
        assert_eq!(beater.collector().tracking(), ProcessTracking::Enabled);
        assert_eq!(beater.collector().command().program(), "nvidia-smi");
        assert!(matches!(beater.output, Output::Stdout));
    }

    #[test]
    fn test_builder_custom() {
        let beater = Beater::builder()
            .command(fixture_command())
            .output(Output::tcp("localhost:5044"))
            .period(Duration::from_millis(250))
            .process_tracking(false)
            .build();

        assert_eq!(beater.period(), Duration::from_millis(250));
        assert_eq!(beater.collector().tracking(), ProcessTracking::Disabled);
        assert_eq!(beater.collector().command().program(), "cat");
        assert!(matches!(beater.output, Output::Tcp(_)));
    }

    #[test]
    fn zero_period_falls_back_to_default() {
        let beater = Beater::builder().period(Duration::ZERO).build();
        assert_eq!(beater.period(), DEFAULT_PERIOD);
    }

    #[tokio::test]
    async fn poll_once_publishes_devices_and_processes() {
        let (output, mut rx) = Output::channel(16);
        let mut publisher = output.connect().await.unwrap();
        let collector = Collector::new(fixture_command(), ProcessTracking::Enabled);

        let report = collector.poll_once(&mut publisher).await.unwrap();
        assert_eq!(
            report,
            CycleReport {
                devices: 2,
                published: 4,
                failed: 0
            }
        );

        publisher.close().await.unwrap();
        let kinds: Vec<EventKind> = drain(&mut rx).await.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Gpu,
                EventKind::GpuProcess,
                EventKind::GpuProcess,
                EventKind::Gpu
            ]
        );
    }

    #[tokio::test]
    async fn poll_once_without_tracking() {
        let (output, mut rx) = Output::channel(16);
        let mut publisher = output.connect().await.unwrap();
        let collector = Collector::new(fixture_command(), ProcessTracking::Disabled);

        let report = collector.poll_once(&mut publisher).await.unwrap();
        assert_eq!(report.published, 2);

        publisher.close().await.unwrap();
        assert!(drain(&mut rx)
            .await
            .iter()
            .all(|e| e.kind == EventKind::Gpu));
    }

    #[tokio::test]
    async fn failed_command_publishes_nothing() {
        let (output, mut rx) = Output::channel(16);
        let mut publisher = output.connect().await.unwrap();
        let collector = Collector::new(failing_command(), ProcessTracking::Enabled);

        let err = collector.poll_once(&mut publisher).await.unwrap_err();
        assert!(matches!(err, SmiError::CommandFailed { .. }));
        assert_eq!(publisher.published(), 0);

        publisher.close().await.unwrap();
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn rejected_events_are_counted() {
        let (output, rx) = Output::channel(16);
        let mut publisher = output.connect().await.unwrap();
        drop(rx);

        let collector = Collector::new(fixture_command(), ProcessTracking::Enabled);
        let report = collector.poll_once(&mut publisher).await.unwrap();
        assert_eq!(report.published, 0);
        assert_eq!(report.failed, 4);
    }

    #[tokio::test]
    async fn runs_on_every_tick_until_stopped() {
        let (output, mut rx) = Output::channel(256);
        let handle = Beater::builder()
            .command(fixture_command())
            .output(output)
            .period(Duration::from_millis(20))
            .build()
            .start();

        // Wait for at least two full cycles.
        let mut received = Vec::new();
        while received.len() < 8 {
            let event = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("no event within 5s")
                .expect("output closed early");
            received.push(event);
        }

        handle.stop().await.unwrap();

        // Output is closed after stop; anything left is from finished cycles.
        let rest = drain(&mut rx).await;
        assert_eq!((received.len() + rest.len()) % 4, 0);
    }

    #[tokio::test]
    async fn stop_between_ticks_closes_output_once() {
        let (output, mut rx) = Output::channel(16);
        let handle = Beater::builder()
            .command(fixture_command())
            .output(output)
            .period(Duration::from_secs(3600))
            .build()
            .start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("stop did not return")
            .unwrap();

        // No cycle ran, and the channel reports end-of-stream.
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn dropping_handle_stops_loop() {
        let (output, mut rx) = Output::channel(16);
        let handle = Beater::builder()
            .command(fixture_command())
            .output(output)
            .period(Duration::from_secs(3600))
            .build()
            .start();

        drop(handle);
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn failed_tick_is_followed_by_normal_tick() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("failed-once");
        let script = format!(
            "if [ -f '{marker}' ]; then cat '{fixture}'; else touch '{marker}'; exit 1; fi",
            marker = marker.display(),
            fixture = FIXTURE_PATH,
        );
        let command = SmiCommand::builder()
            .program("sh")
            .args(["-c".to_string(), script])
            .build();

        let (output, mut rx) = Output::channel(64);
        let handle = Beater::builder()
            .command(command)
            .output(output)
            .period(Duration::from_millis(20))
            .build()
            .start();

        let first = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event after failed tick")
            .unwrap();
        assert_eq!(first.kind, EventKind::Gpu);
        assert!(marker.exists());

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_during_cycle_waits_for_it() {
        let command = SmiCommand::builder()
            .program("sh")
            .args(["-c".to_string(), format!("sleep 0.4; cat '{}'", FIXTURE_PATH)])
            .build();

        let (output, mut rx) = Output::channel(64);
        let handle = Beater::builder()
            .command(command)
            .output(output)
            .period(Duration::from_millis(20))
            .build()
            .start();

        // First tick fires at 20ms; the command is still sleeping here.
        tokio::time::sleep(Duration::from_millis(150)).await;
        timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("stop did not return")
            .unwrap();

        // The in-flight cycle completed before the output was closed.
        let events = drain(&mut rx).await;
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].kind, EventKind::Gpu);
    }

    #[tokio::test]
    async fn slow_cycles_never_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("cycles.log");
        let script = format!(
            "echo start >> '{log}'; sleep 0.1; echo end >> '{log}'; cat '{fixture}'",
            log = log.display(),
            fixture = FIXTURE_PATH,
        );
        let command = SmiCommand::builder()
            .program("sh")
            .args(["-c".to_string(), script])
            .build();

        let (output, mut rx) = Output::channel(256);
        let handle = Beater::builder()
            .command(command)
            .output(output)
            .period(Duration::from_millis(20))
            .build()
            .start();

        // Three cycles, each five times longer than the period.
        for _ in 0..12 {
            timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("no event within 5s")
                .expect("output closed early");
        }
        handle.stop().await.unwrap();
        drain(&mut rx).await;

        let content = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines.len() >= 6);
        assert_eq!(lines.len() % 2, 0);
        for pair in lines.chunks(2) {
            assert_eq!(pair, ["start", "end"]);
        }
    }

    #[tokio::test]
    async fn handle_reports_failed_start() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let handle = Beater::builder()
            .command(fixture_command())
            .output(Output::tcp(addr))
            .period(Duration::from_secs(3600))
            .build()
            .start();

        timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("loop did not exit");

        assert!(handle.stop().await.is_err());
    }

    #[tokio::test]
    async fn unreachable_output_fails_run() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let (_tx, stop_rx) = watch::channel(false);
        let result = Beater::builder()
            .command(fixture_command())
            .output(Output::tcp(addr))
            .build()
            .run(stop_rx)
            .await;

        assert!(result.is_err());
    }
}
