//! Line readers for child process pipes.
//!
//! Tools like gridlabd can emit non-UTF8 bytes. Lines are read as bytes and
//! decoded lossily so a stray byte never ends the reader early.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Receives each line as soon as it is read.
pub type LineSink = Arc<dyn Fn(String) + Send + Sync>;

/// Spawn a task draining `stream` until EOF.
///
/// Lines are trimmed and empty lines dropped. Each remaining line goes to
/// `sink` when one is given, otherwise it is kept and returned in order when
/// the task finishes.
pub fn spawn_line_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    stream_name: &'static str,
    sink: Option<LineSink>,
) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        let mut lines = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match sink {
                        Some(ref sink) => sink(line.to_string()),
                        None => lines.push(line.to_string()),
                    }
                }
                Err(e) => {
                    debug!(stream = stream_name, error = %e, "stream reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(stream = stream_name, kept = lines.len(), "stream reader task exiting");
        lines
    })
}
