//! Output capture for child stdout/stderr.

use kfr_common::InvocationId;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{trace, warn};

/// Stream type (stdout or stderr)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Stdout => write!(f, "stdout"),
            StreamType::Stderr => write!(f, "stderr"),
        }
    }
}

/// Read `stream` to EOF, appending every byte to `buf`.
///
/// Bytes land in `buf` as soon as they are read, so dropping this future
/// part-way keeps everything captured so far. Each line is traced.
pub async fn drain_into<R>(
    stream: Option<R>,
    buf: &mut Vec<u8>,
    stream_type: StreamType,
    invocation: &InvocationId,
) where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);

    loop {
        let start = buf.len();
        match reader.read_until(b'\n', buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf[start..]);
                trace!(
                    invocation = %invocation,
                    stream = %stream_type,
                    line = %line.trim_end(),
                    "child output"
                );
            }
            Err(e) => {
                warn!(
                    invocation = %invocation,
                    stream = %stream_type,
                    error = %e,
                    "Failed to read child output"
                );
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_keeps_bytes_exactly() {
        let input: &[u8] = b"first\nsecond\nno newline";
        let mut buf = Vec::new();
        drain_into(Some(input), &mut buf, StreamType::Stdout, &InvocationId::from("inv-t")).await;
        assert_eq!(buf, input);
    }

    #[tokio::test]
    async fn test_drain_without_stream() {
        let mut buf = Vec::new();
        drain_into::<&[u8]>(None, &mut buf, StreamType::Stderr, &InvocationId::from("inv-t")).await;
        assert!(buf.is_empty());
    }

    #[test]
    fn test_stream_type_display() {
        assert_eq!(StreamType::Stdout.to_string(), "stdout");
        assert_eq!(StreamType::Stderr.to_string(), "stderr");
    }
}
