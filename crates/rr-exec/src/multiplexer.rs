//! Fan-in of stdout and stderr into one sequence of tagged lines
//!
//! Each input stream is scanned by its own task. A scanner forwards every
//! complete line as soon as it is read and closes its channel when the stream
//! reaches EOF or fails; a closed channel is that stream's "drained" signal.
//! Lines from one origin keep their source order, lines from different
//! origins interleave in whatever order they become ready.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rr_core::{Origin, TaggedLine};

/// Lines buffered per origin before a scanner waits for the consumer.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Merges two output streams into one sequence of [`TaggedLine`]s
pub struct LineMultiplexer {
    stdout: Option<mpsc::Receiver<String>>,
    stderr: Option<mpsc::Receiver<String>>,
    scanners: [JoinHandle<()>; 2],
}

impl LineMultiplexer {
    /// Start scanning both streams
    pub fn new<O, E>(stdout: O, stderr: E) -> Self
    where
        O: AsyncRead + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
    {
        let (stdout_tx, stdout_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let (stderr_tx, stderr_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

        Self {
            stdout: Some(stdout_rx),
            stderr: Some(stderr_rx),
            scanners: [
                spawn_scanner(stdout, Origin::Stdout, stdout_tx),
                spawn_scanner(stderr, Origin::Stderr, stderr_tx),
            ],
        }
    }

    /// Next line from whichever stream has one ready first.
    ///
    /// Returns `None` once both streams have drained. Cancel-safe: dropping
    /// the future before it resolves loses no line.
    pub async fn next(&mut self) -> Option<TaggedLine> {
        loop {
            let (origin, line) = match (self.stdout.as_mut(), self.stderr.as_mut()) {
                (None, None) => return None,
                (Some(stdout), None) => (Origin::Stdout, stdout.recv().await),
                (None, Some(stderr)) => (Origin::Stderr, stderr.recv().await),
                (Some(stdout), Some(stderr)) => tokio::select! {
                    line = stdout.recv() => (Origin::Stdout, line),
                    line = stderr.recv() => (Origin::Stderr, line),
                },
            };

            match line {
                Some(text) => return Some(TaggedLine::new(text, origin)),
                None => {
                    tracing::trace!("{} drained", origin);
                    match origin {
                        Origin::Stdout => self.stdout = None,
                        Origin::Stderr => self.stderr = None,
                    }
                }
            }
        }
    }

    /// Whether both streams have drained and every line was consumed
    pub fn is_drained(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }
}

impl Drop for LineMultiplexer {
    fn drop(&mut self) {
        for scanner in &self.scanners {
            scanner.abort();
        }
    }
}

fn spawn_scanner<R>(reader: R, origin: Origin, lines: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(strip_line_ending(&buf)).into_owned();
                    if lines.send(line).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("{} scanner stopped: {}", origin, e);
                    break;
                }
            }
        }
    })
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;

    async fn drain(mux: &mut LineMultiplexer) -> Vec<TaggedLine> {
        let mut lines = Vec::new();
        while let Some(line) = mux.next().await {
            lines.push(line);
        }
        lines
    }

    fn texts(lines: &[TaggedLine], origin: Origin) -> Vec<&str> {
        lines
            .iter()
            .filter(|l| l.origin() == origin)
            .map(TaggedLine::text)
            .collect()
    }

    #[tokio::test]
    async fn test_preserves_order_within_origin() {
        let stdout = Cursor::new(b"1\n2\n3\n4\n5\n".to_vec());
        let stderr = Cursor::new(b"a\nb\n".to_vec());
        let mut mux = LineMultiplexer::new(stdout, stderr);

        let lines = drain(&mut mux).await;
        assert_eq!(texts(&lines, Origin::Stdout), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(texts(&lines, Origin::Stderr), vec!["a", "b"]);
        assert!(mux.is_drained());
    }

    #[tokio::test]
    async fn test_final_line_without_newline_and_crlf() {
        let stdout = Cursor::new(b"first\r\nlast".to_vec());
        let stderr = Cursor::new(Vec::new());
        let mut mux = LineMultiplexer::new(stdout, stderr);

        let lines = drain(&mut mux).await;
        assert_eq!(texts(&lines, Origin::Stdout), vec!["first", "last"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let stdout = Cursor::new(vec![b'o', b'k', 0xff, b'\n']);
        let mut mux = LineMultiplexer::new(stdout, Cursor::new(Vec::new()));

        let line = mux.next().await.unwrap();
        assert_eq!(line.text(), "ok\u{fffd}");
        assert!(mux.next().await.is_none());
    }

    #[tokio::test]
    async fn test_line_visible_before_stream_ends() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut mux = LineMultiplexer::new(reader, Cursor::new(Vec::new()));

        writer.write_all(b"early\n").await.unwrap();
        let line = mux.next().await.unwrap();
        assert_eq!(line.text(), "early");
        assert_eq!(line.origin(), Origin::Stdout);
        assert!(!mux.is_drained());

        drop(writer);
        assert!(mux.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_streams_terminate() {
        let mut mux = LineMultiplexer::new(Cursor::new(Vec::new()), Cursor::new(Vec::new()));
        assert!(mux.next().await.is_none());
        assert!(mux.next().await.is_none());
    }
}
