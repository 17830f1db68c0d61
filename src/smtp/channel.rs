use std::time::Duration;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};

use crate::{incoming, internal, outgoing};

use super::error::ChannelError;

/// Longest wire line the channel will buffer, terminator included
/// (RFC 5321 command line limit).
pub const MAX_LINE: usize = 512;

/// Per-operation deadline on the underlying stream. Armed for exactly one
/// read or write and released with it, so a deadline never leaks into an
/// unrelated operation on the same connection.
pub const DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Transient read errors tolerated within a single `read_line` call before
/// the error is treated as fatal.
const MAX_RETRIES: u32 = 3;

/// A line produced by [`LineChannel::read_line`].
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    /// A CR-LF terminated line, terminator stripped.
    Complete(String),
    /// Whatever was buffered when the peer closed the stream mid-line.
    /// The last usable line of the session.
    Final(String),
}

impl Line {
    pub fn text(&self) -> &str {
        match self {
            Self::Complete(text) | Self::Final(text) => text,
        }
    }

    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }
}

/// A bounded, deadline-aware line reader/writer over a raw byte stream.
///
/// One channel per connection, and never more than one in-flight
/// operation per channel: the `&mut self` receivers enforce that at
/// compile time.
pub struct LineChannel<Stream> {
    stream: Stream,
    /// Bytes read past the last delimiter, carried over to the next call.
    buffer: Vec<u8>,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> LineChannel<Stream> {
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(MAX_LINE),
        }
    }

    /// Read one CR-LF delimited line, accumulating bytes across however
    /// many partial reads the stream delivers. The whole call, transient
    /// retries included, runs under [`DEADLINE`].
    pub async fn read_line(&mut self) -> Result<Line, ChannelError> {
        timeout(DEADLINE, self.fill_line())
            .await
            .map_err(|_| ChannelError::DeadlineExpired)?
    }

    async fn fill_line(&mut self) -> Result<Line, ChannelError> {
        let mut retries = 0;

        loop {
            if let Some(at) = self.buffer.iter().position(|&byte| byte == b'\n') {
                if at + 1 > MAX_LINE {
                    return Err(ChannelError::LineTooLong);
                }

                let mut line: Vec<u8> = self.buffer.drain(..=at).collect();
                line.pop();
                if line.pop() != Some(b'\r') {
                    return Err(ChannelError::MalformedLine);
                }

                return Ok(Line::Complete(String::from_utf8_lossy(&line).into_owned()));
            }

            if self.buffer.len() > MAX_LINE {
                return Err(ChannelError::LineTooLong);
            }

            let mut chunk = [0; 1024];
            match self.stream.read(&mut chunk).await {
                Ok(0) if self.buffer.is_empty() => return Err(ChannelError::StreamClosed),
                Ok(0) => {
                    let rest = std::mem::take(&mut self.buffer);
                    return Ok(Line::Final(String::from_utf8_lossy(&rest).into_owned()));
                }
                Ok(read) => {
                    incoming!(
                        "Read {read} bytes: {:?}",
                        String::from_utf8_lossy(&chunk[..read])
                    );
                    self.buffer.extend_from_slice(&chunk[..read]);
                }
                Err(err) => {
                    internal!(level = WARN, "Read error (attempt {}): {err}", retries + 1);

                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(ChannelError::ReadFailed(err));
                    }
                }
            }
        }
    }

    /// Write one line, appending CR LF unless the text already carries it,
    /// under [`DEADLINE`].
    pub async fn write_line(&mut self, text: &str) -> Result<(), ChannelError> {
        let wire = if text.ends_with("\r\n") {
            text.to_owned()
        } else {
            format!("{text}\r\n")
        };

        timeout(DEADLINE, async {
            self.stream.write_all(wire.as_bytes()).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| ChannelError::DeadlineExpired)?
        .map_err(ChannelError::WriteFailed)?;

        outgoing!("Wrote {} bytes: {wire:?}", wire.len());

        Ok(())
    }
}
