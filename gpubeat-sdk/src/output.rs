//! Output backends for publishing events.

use std::fmt;
use std::io;
use std::path::PathBuf;

use gpubeat_types::Event;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, Stdout};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Destination for published events.
///
/// An `Output` only describes where events go; [`Output::connect`] opens
/// it and returns the [`Publisher`] the beater owns for its lifetime.
#[derive(Debug)]
pub enum Output {
    /// Newline-delimited JSON on standard output.
    Stdout,

    /// Newline-delimited JSON appended to a file.
    File(PathBuf),

    /// Newline-delimited JSON over a single TCP connection.
    Tcp(String),

    /// Events handed to an in-process channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    Channel(mpsc::Sender<Event>),
}

impl Output {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use gpubeat_sdk::Output;
    ///
    /// let output = Output::file("gpu-events.ndjson");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use gpubeat_sdk::Output;
    ///
    /// let output = Output::tcp("localhost:5044");
    /// ```
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// The receiver yields `None` once the publisher has been closed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use gpubeat_sdk::Output;
    ///
    /// let (output, mut rx) = Output::channel(64);
    ///
    /// // Later, receive events
    /// // while let Some(event) = rx.recv().await {
    /// //     println!("{} event for {}", event.kind, event.gpu_id());
    /// // }
    /// ```
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Open the destination.
    pub async fn connect(self) -> io::Result<Publisher> {
        let description = self.to_string();
        let sink = match self {
            Output::Stdout => Sink::Stdout(tokio::io::stdout()),
            Output::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await?;
                Sink::File(BufWriter::new(file))
            }
            Output::Tcp(addr) => {
                let stream = TcpStream::connect(&addr).await?;
                stream.set_nodelay(true)?;
                Sink::Tcp(BufWriter::new(stream))
            }
            Output::Channel(tx) => Sink::Channel(tx),
        };

        Ok(Publisher {
            sink,
            description,
            published: 0,
        })
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Stdout => f.write_str("stdout"),
            Output::File(path) => write!(f, "file: {}", path.display()),
            Output::Tcp(addr) => write!(f, "tcp: {}", addr),
            Output::Channel(_) => f.write_str("channel"),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Output::Stdout
    }
}

enum Sink {
    Stdout(Stdout),
    File(BufWriter<File>),
    Tcp(BufWriter<TcpStream>),
    Channel(mpsc::Sender<Event>),
}

/// An open connection to an [`Output`].
///
/// Exactly one publisher exists per running beater. [`Publisher::close`]
/// consumes it, so it cannot be used or closed again afterwards.
pub struct Publisher {
    sink: Sink,
    description: String,
    published: u64,
}

impl Publisher {
    /// Hand one event to the output.
    ///
    /// Stream outputs buffer writes; call [`Publisher::flush`] to push them
    /// out. Channel outputs wait for capacity and fail once the receiver
    /// is gone.
    pub async fn publish(&mut self, event: Event) -> io::Result<()> {
        match &mut self.sink {
            Sink::Stdout(out) => write_line(out, &event).await?,
            Sink::File(out) => write_line(out, &event).await?,
            Sink::Tcp(out) => write_line(out, &event).await?,
            Sink::Channel(tx) => tx.send(event).await.map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "event receiver dropped")
            })?,
        }
        self.published += 1;
        Ok(())
    }

    /// Flush buffered events to the underlying stream.
    pub async fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Stdout(out) => out.flush().await,
            Sink::File(out) => out.flush().await,
            Sink::Tcp(out) => out.flush().await,
            Sink::Channel(_) => Ok(()),
        }
    }

    /// Flush and release the output.
    pub async fn close(mut self) -> io::Result<()> {
        self.flush().await?;
        match self.sink {
            Sink::Tcp(mut out) => out.shutdown().await?,
            Sink::File(out) => out.into_inner().sync_all().await?,
            Sink::Stdout(_) | Sink::Channel(_) => {}
        }
        Ok(())
    }

    /// Number of events accepted so far.
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Human-readable description of the destination.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("output", &self.description)
            .field("published", &self.published)
            .finish()
    }
}

async fn write_line<W>(out: &mut W, event: &Event) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    out.write_all(&line).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpubeat_types::{EventKind, GpuMetrics};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn sample_event(id: &str) -> Event {
        Event::gpu(GpuMetrics {
            frame_buffer_total_mb: 16384.0,
            ..GpuMetrics::new(id)
        })
    }

    #[test]
    fn display_names() {
        assert_eq!(Output::Stdout.to_string(), "stdout");
        assert_eq!(Output::file("events.ndjson").to_string(), "file: events.ndjson");
        assert_eq!(Output::tcp("localhost:5044").to_string(), "tcp: localhost:5044");
        let (output, _rx) = Output::channel(1);
        assert_eq!(output.to_string(), "channel");
    }

    #[test]
    fn default_is_stdout() {
        assert!(matches!(Output::default(), Output::Stdout));
    }

    #[tokio::test]
    async fn channel_delivers_and_closes() {
        let (output, mut rx) = Output::channel(4);
        let mut publisher = output.connect().await.unwrap();

        publisher.publish(sample_event("0")).await.unwrap();
        publisher.publish(sample_event("1")).await.unwrap();
        assert_eq!(publisher.published(), 2);

        publisher.close().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().gpu_id(), "0");
        assert_eq!(rx.recv().await.unwrap().gpu_id(), "1");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn channel_publish_fails_without_receiver() {
        let (output, rx) = Output::channel(1);
        let mut publisher = output.connect().await.unwrap();
        drop(rx);

        let err = publisher.publish(sample_event("0")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(publisher.published(), 0);
    }

    #[tokio::test]
    async fn file_appends_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");

        for id in ["0", "1"] {
            let mut publisher = Output::file(&path).connect().await.unwrap();
            publisher.publish(sample_event(id)).await.unwrap();
            publisher.close().await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let events: Vec<Event> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].gpu_id(), "0");
        assert_eq!(events[1].gpu_id(), "1");
        assert_eq!(events[1].kind, EventKind::Gpu);
    }

    #[tokio::test]
    async fn tcp_sends_one_line_per_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(serde_json::from_str::<Event>(&line).unwrap());
            }
            received
        });

        let mut publisher = Output::tcp(addr).connect().await.unwrap();
        publisher.publish(sample_event("0")).await.unwrap();
        publisher.publish(sample_event("1")).await.unwrap();
        publisher.close().await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].gpu_id(), "1");
    }

    #[tokio::test]
    async fn tcp_connect_failure_is_reported() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(Output::tcp(addr).connect().await.is_err());
    }
}
