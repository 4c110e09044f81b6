/// TCP connection to the telemetry server with automatic reconnection
use log::{debug, error, info, warn};
use std::io;
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::config::TelemetryConfig;
use crate::models::Channel;
use crate::telemetry::protocol::{parse_request, Frame, Request};
use crate::telemetry::TelemetryClient;
use crate::utils::format_datetime;

const OUTBOUND_CAPACITY: usize = 64;
const REQUEST_CAPACITY: usize = 16;
const MAX_LINE_LEN: usize = 256;

/// Start the connection task and return the station's handle to it
///
/// The returned watch receiver reports whether a session is currently up.
/// The task ends once the client is dropped.
pub fn spawn_connection(config: TelemetryConfig) -> (TelemetryClient, watch::Receiver<bool>) {
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (request_tx, request_rx) = mpsc::channel(REQUEST_CAPACITY);
    let (status_tx, status_rx) = watch::channel(false);

    tokio::spawn(maintain_connection(config, outbound_rx, request_tx, status_tx));

    (TelemetryClient::new(outbound_tx, request_rx), status_rx)
}

async fn maintain_connection(
    config: TelemetryConfig,
    mut outbound: mpsc::Receiver<Frame>,
    requests: mpsc::Sender<Channel>,
    status: watch::Sender<bool>,
) {
    let mut attempt: u64 = 0;

    loop {
        // Updates queued while offline are stale by the time we connect.
        if !discard_queued(&mut outbound) {
            return;
        }
        attempt += 1;

        match TcpStream::connect((config.host.as_str(), config.port)).await {
            Ok(stream) => {
                info!(
                    "Connected to {}:{} at {}",
                    config.host,
                    config.port,
                    format_datetime(&OffsetDateTime::now_utc())
                );
                attempt = 0;
                status.send_replace(true);

                let result = run_session(stream, &config, &mut outbound, &requests).await;
                status.send_replace(false);

                match result {
                    Ok(()) => {
                        info!("Telemetry client dropped, closing connection");
                        return;
                    }
                    Err(e) => error!("Connection error: {}", e),
                }
            }
            Err(e) => error!("Attempt {}: connection error: {}", attempt, e),
        }

        sleep(config.reconnect_delay).await;
    }
}

/// Drop every queued frame, returning `false` once the client is gone
fn discard_queued(outbound: &mut mpsc::Receiver<Frame>) -> bool {
    let mut dropped = 0;
    loop {
        match outbound.try_recv() {
            Ok(_) => dropped += 1,
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => return false,
        }
    }
    if dropped > 0 {
        debug!("Discarded {} updates queued while offline", dropped);
    }
    true
}

/// Serve one connected session until it fails or the client goes away
///
/// Returns `Ok(())` only when the outbound queue is closed.
async fn run_session(
    stream: TcpStream,
    config: &TelemetryConfig,
    outbound: &mut mpsc::Receiver<Frame>,
    requests: &mpsc::Sender<Channel>,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = LineReader::new(reader);

    write_frame(&mut writer, &Frame::Auth(config.token.clone())).await?;

    let mut heartbeat = interval(config.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "server closed the connection",
                        ))
                    }
                };

                match parse_request(&line) {
                    Ok(Request::Read(channel)) => {
                        if let Err(e) = requests.try_send(channel) {
                            warn!("Dropping read request for {}: {}", channel, e);
                        }
                    }
                    Ok(Request::Ping) => write_frame(&mut writer, &Frame::Pong).await?,
                    Ok(Request::Pong) => debug!("Heartbeat acknowledged"),
                    Err(e) => warn!("Ignoring inbound line {:?}: {}", line, e),
                }
            }
            frame = outbound.recv() => match frame {
                Some(frame) => write_frame(&mut writer, &frame).await?,
                None => return Ok(()),
            },
            _ = heartbeat.tick() => write_frame(&mut writer, &Frame::Ping).await?,
        }
    }
}

/// Newline-delimited reader that tolerates hostile input
///
/// Bytes that are not UTF-8 are replaced rather than rejected, and lines
/// longer than `MAX_LINE_LEN` are skipped up to their newline. Partial input
/// stays in `buf`, so `next_line` may be cancelled and called again.
struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    discarding: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            discarding: false,
        }
    }

    /// Next complete line without its terminator, `None` at end of stream
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let limit = (MAX_LINE_LEN + 1).saturating_sub(self.buf.len()) as u64;
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;

            if self.buf.last() == Some(&b'\n') {
                let line = String::from_utf8_lossy(&self.buf)
                    .trim_end_matches(|c: char| c == '\r' || c == '\n')
                    .to_string();
                self.buf.clear();
                if std::mem::take(&mut self.discarding) {
                    continue;
                }
                return Ok(Some(line));
            }

            if self.buf.len() > MAX_LINE_LEN {
                if !self.discarding {
                    warn!("Discarding inbound line longer than {} bytes", MAX_LINE_LEN);
                }
                self.discarding = true;
                self.buf.clear();
                continue;
            }

            if read == 0 {
                return Ok(None);
            }
        }
    }
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &Frame) -> io::Result<()> {
    debug!("-> {}", frame);
    writer.write_all(format!("{}\n", frame).as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use crate::telemetry::Telemetry;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn config_for(port: u16) -> TelemetryConfig {
        TelemetryConfig {
            host: "127.0.0.1".to_string(),
            port,
            token: "secret-token".to_string(),
            heartbeat: Duration::from_secs(3600),
            reconnect_delay: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn session_authenticates_and_relays_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (mut client, mut status) = spawn_connection(config_for(port));

        let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let (reader, mut writer) = socket.into_split();
        let mut server_lines = BufReader::new(reader).lines();

        let auth = timeout(WAIT, server_lines.next_line()).await.unwrap().unwrap();
        assert_eq!(auth.as_deref(), Some("auth secret-token"));

        timeout(WAIT, async {
            while !*status.borrow() {
                status.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        writer.write_all(b"bogus\nvr 3\n").await.unwrap();

        let reads = timeout(WAIT, async {
            loop {
                let reads = client.pending_reads();
                if !reads.is_empty() {
                    return reads;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(reads, vec![Channel::CurrentTemperature]);

        client.publish(Channel::CurrentTemperature, Value::Number(21.5));
        let write = timeout(WAIT, server_lines.next_line()).await.unwrap().unwrap();
        assert_eq!(write.as_deref(), Some("vw 3 21.50"));

        writer.write_all(b"ping\n").await.unwrap();
        let pong = timeout(WAIT, server_lines.next_line()).await.unwrap().unwrap();
        assert_eq!(pong.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn line_reader_replaces_invalid_utf8() {
        let input: &[u8] = b"\xff\xfe\nvr 3\r\n";
        let mut lines = LineReader::new(input);

        let garbled = lines.next_line().await.unwrap().unwrap();
        assert!(garbled.contains('\u{fffd}'));
        assert!(parse_request(&garbled).is_err());
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("vr 3"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn line_reader_skips_overlong_lines() {
        let mut input = vec![b'x'; 4 * MAX_LINE_LEN];
        input.extend_from_slice(b"\nvr 1\n");
        input.extend(std::iter::repeat(b'y').take(MAX_LINE_LEN));
        input.extend_from_slice(b"\nping\nzzz");
        let mut lines = LineReader::new(input.as_slice());

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("vr 1"));
        assert_eq!(
            lines.next_line().await.unwrap(),
            Some("y".repeat(MAX_LINE_LEN))
        );
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ping"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_utf8_keeps_session_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (mut client, _status) = spawn_connection(config_for(port));

        let (socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let (reader, mut writer) = socket.into_split();
        let mut server_lines = BufReader::new(reader).lines();
        let auth = timeout(WAIT, server_lines.next_line()).await.unwrap().unwrap();
        assert_eq!(auth.as_deref(), Some("auth secret-token"));

        writer.write_all(b"\xff\xfe\nvr 3\n").await.unwrap();

        let reads = timeout(WAIT, async {
            loop {
                let reads = client.pending_reads();
                if !reads.is_empty() {
                    return reads;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(reads, vec![Channel::CurrentTemperature]);

        let reconnect = timeout(Duration::from_millis(300), listener.accept()).await;
        assert!(reconnect.is_err(), "session should survive a garbled line");
    }

    #[tokio::test]
    async fn offline_updates_are_not_replayed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut config = config_for(port);
        config.reconnect_delay = Duration::from_millis(300);

        let (mut client, mut status) = spawn_connection(config);

        let (first, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let mut first_lines = BufReader::new(first).lines();
        timeout(WAIT, first_lines.next_line()).await.unwrap().unwrap();
        drop(first_lines);

        timeout(WAIT, async {
            while *status.borrow() {
                status.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        // Published during the reconnect delay.
        client.publish(Channel::Watchdog, Value::Flag(true));

        let (second, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let mut lines = BufReader::new(second).lines();
        let auth = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
        assert_eq!(auth.as_deref(), Some("auth secret-token"));

        client.publish(Channel::SampleCount, Value::Count(4));
        let next = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
        assert_eq!(next.as_deref(), Some("vw 8 4"));
    }

    #[tokio::test]
    async fn reconnects_after_server_drops() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (_client, mut status) = spawn_connection(config_for(port));

        let (first, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        drop(first);

        let (second, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let mut lines = BufReader::new(second).lines();
        let auth = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
        assert_eq!(auth.as_deref(), Some("auth secret-token"));

        timeout(WAIT, async {
            while !*status.borrow() {
                status.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }
}
