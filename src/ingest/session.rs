//! Per-connection frame loop

use crate::ingest::ReadingPipeline;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Maximum accepted frame size. A peer that streams more than this without
/// a newline is not speaking the protocol.
const MAX_FRAME_LEN: u64 = 64 * 1024;

/// One inbound device session. The owner identity is bound at accept time
/// and holds for the life of the connection.
pub struct Session {
    reader: BufReader<TcpStream>,
    peer: SocketAddr,
    owner: String,
    read_timeout: Duration,
    pipeline: Arc<ReadingPipeline>,
}

impl Session {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        owner: String,
        read_timeout: Duration,
        pipeline: Arc<ReadingPipeline>,
    ) -> Self {
        Self {
            reader: BufReader::new(stream),
            peer,
            owner,
            read_timeout,
            pipeline,
        }
    }

    /// Read frames until EOF, a read timeout, or a transport error.
    ///
    /// Frames are processed strictly in arrival order; the pipeline runs
    /// to completion before the next read. A malformed frame is logged and
    /// skipped without ending the session. A read that exceeds the
    /// deadline, or a frame that exceeds the size cap, is a session-level
    /// fault and ends only this session.
    pub async fn run(mut self) {
        info!(peer = %self.peer, owner = %self.owner, "device connected");
        let mut buf = Vec::new();

        loop {
            buf.clear();
            // Cap each read so an endless unterminated frame cannot grow
            // the buffer without bound
            let mut limited = (&mut self.reader).take(MAX_FRAME_LEN + 1);
            match timeout(self.read_timeout, limited.read_until(b'\n', &mut buf)).await {
                Err(_) => {
                    warn!(peer = %self.peer, "read timed out, closing session");
                    break;
                }
                Ok(Ok(0)) => {
                    info!(peer = %self.peer, "device disconnected");
                    break;
                }
                Ok(Ok(_)) => {
                    if buf.len() as u64 > MAX_FRAME_LEN && !buf.ends_with(b"\n") {
                        warn!(peer = %self.peer, "frame exceeds {MAX_FRAME_LEN} bytes, closing session");
                        break;
                    }
                    self.handle_frame(&buf).await;
                }
                Ok(Err(e)) => {
                    warn!(peer = %self.peer, "read error, closing session: {e}");
                    break;
                }
            }
        }
    }

    async fn handle_frame(&self, raw: &[u8]) {
        let line = match std::str::from_utf8(raw) {
            Ok(s) => s.trim(),
            Err(e) => {
                warn!(peer = %self.peer, "dropping non-UTF-8 frame: {e}");
                return;
            }
        };
        if line.is_empty() {
            // Keep-alive newline
            return;
        }

        match self.pipeline.process_frame(line, &self.owner).await {
            Ok(reading) => {
                debug!(peer = %self.peer, temp = reading.temp, hum = reading.hum, "frame processed");
            }
            Err(e) => warn!(peer = %self.peer, "dropping malformed frame: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Device;
    use crate::ingest::testing::{RecordingSink, StaticSettings, StubPublisher};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn spawn_session(
        read_timeout: Duration,
    ) -> (
        TcpStream,
        Arc<StubPublisher>,
        Arc<RecordingSink>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let publisher = Arc::new(StubPublisher::default());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(ReadingPipeline::new(
            publisher.clone(),
            Arc::new(StaticSettings::example()),
            sink.clone(),
        ));

        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            Session::new(stream, peer, "alice".into(), read_timeout, pipeline)
                .run()
                .await;
        });

        let client = TcpStream::connect(addr).await.unwrap();
        (client, publisher, sink, server)
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_session_alive() {
        let (mut client, publisher, sink, server) = spawn_session(Duration::from_secs(5)).await;

        // Missing `temp`: rejected, but the session must stay open
        client.write_all(b"{\"hum\":35}\n").await.unwrap();
        client
            .write_all(b"{\"temp\":10,\"hum\":50,\"soil\":550,\"light\":500,\"dist\":1}\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();
        server.await.unwrap();

        // Only the well-formed frame was published
        let published = publisher.published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0.temp, 10.0);

        // Freezing reading: single beep plus trailing display
        let sent = sink.sent.lock().await;
        let pairs: Vec<_> = sent.iter().map(|c| (c.device, c.action.as_str())).collect();
        assert_eq!(
            pairs,
            vec![(Device::Buzzer, "BEEP"), (Device::Display, "10")]
        );
    }

    #[tokio::test]
    async fn test_frames_processed_in_arrival_order() {
        let (mut client, publisher, _sink, server) = spawn_session(Duration::from_secs(5)).await;

        for temp in [1, 2, 3] {
            let frame = format!(
                "{{\"temp\":{temp},\"hum\":50,\"soil\":550,\"light\":500,\"dist\":1}}\n"
            );
            client.write_all(frame.as_bytes()).await.unwrap();
        }
        client.shutdown().await.unwrap();
        server.await.unwrap();

        let published = publisher.published.lock().await;
        let temps: Vec<f64> = published.iter().map(|(r, _)| r.temp).collect();
        assert_eq!(temps, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_idle_session_times_out() {
        let (client, _publisher, _sink, server) = spawn_session(Duration::from_millis(50)).await;

        // Send nothing: the session must end on its own
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("session should time out")
            .unwrap();
        drop(client);
    }

    #[tokio::test]
    async fn test_oversized_frame_ends_session() {
        let (mut client, publisher, _sink, server) = spawn_session(Duration::from_secs(5)).await;

        // Past the cap without ever sending a newline
        let flood = vec![b'x'; 70 * 1024];
        let _ = client.write_all(&flood).await;
        let _ = client.flush().await;

        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("session should close on an oversized frame")
            .unwrap();
        assert!(publisher.published.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_lines_are_ignored() {
        let (mut client, publisher, _sink, server) = spawn_session(Duration::from_secs(5)).await;

        client.write_all(b"\n\n").await.unwrap();
        client
            .write_all(b"{\"temp\":20,\"hum\":50,\"soil\":550,\"light\":500,\"dist\":1}\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();
        server.await.unwrap();

        assert_eq!(publisher.published.lock().await.len(), 1);
    }
}
