// ABOUTME: Line-oriented I/O over the modem byte stream for the AT command dialect
// ABOUTME: Splits the stream into a buffered line reader and a buffered command writer

use bytes::{Buf, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf};
use tracing::trace;

/// Ctrl-Z, terminates SMS payloads after a `> ` prompt
pub const CTRL_Z: u8 = 0x1A;

const ESCAPE: u8 = 0x1B;

/// The data-entry prompt; it is not followed by a line terminator
const PROMPT: &[u8] = b"> ";

/// One unit read from the modem
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    /// A `\r\n`-terminated line with the terminator and trailing `\r` removed
    Text(String),
    /// The `"> "` data-entry prompt
    Prompt,
}

impl Line {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Line::Text(text) => Some(text),
            Line::Prompt => None,
        }
    }
}

/// Write half of the modem stream with its concrete type erased
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Splits a duplex byte stream into its reader and writer halves
pub fn split<S>(stream: S) -> (LineReader<ReadHalf<S>>, CommandWriter<BoxedWriter>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, write) = tokio::io::split(stream);
    (LineReader::new(read), CommandWriter::new(Box::new(write)))
}

/// Reads lines from the modem.
///
/// Blank lines are swallowed. A prompt is recognized only at the start of the
/// buffered data, which is where it appears after the line before it has been
/// consumed.
#[derive(Debug)]
pub struct LineReader<R> {
    stream: R,

    // Bytes received but not yet returned as a line
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(stream: R) -> Self {
        LineReader {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Waits for the next line.
    ///
    /// Returns `None` on end of stream. A final unterminated fragment is
    /// returned as a line before that.
    pub async fn read_line(&mut self) -> io::Result<Option<Line>> {
        loop {
            if let Some(line) = self.parse_line() {
                trace!(?line, "rx");
                return Ok(Some(line));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                self.skip_blank();
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let rest = self.buffer.split();
                let text = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
                return Ok(Some(Line::Text(text)));
            }
        }
    }

    fn skip_blank(&mut self) {
        let blank = self
            .buffer
            .iter()
            .take_while(|&&b| b == b'\r' || b == b'\n')
            .count();
        self.buffer.advance(blank);
    }

    /// Takes one complete line or prompt off the buffer, if there is one
    fn parse_line(&mut self) -> Option<Line> {
        self.skip_blank();

        if self.buffer.starts_with(PROMPT) {
            self.buffer.advance(PROMPT.len());
            return Some(Line::Prompt);
        }

        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let raw = self.buffer.split_to(end + 1);
        let text = String::from_utf8_lossy(&raw[..end]);
        Some(Line::Text(text.trim_end_matches('\r').to_string()))
    }
}

/// Writes commands and payloads to the modem
#[derive(Debug)]
pub struct CommandWriter<W> {
    stream: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> CommandWriter<W> {
    pub fn new(stream: W) -> Self {
        CommandWriter {
            stream: BufWriter::new(stream),
        }
    }

    /// Writes an AT command followed by the `\r` terminator
    pub async fn write_command(&mut self, command: &str) -> io::Result<()> {
        trace!(command, "tx");
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.write_all(b"\r").await?;
        self.stream.flush().await
    }

    /// Writes the second stage of a two-stage exchange: the payload then Ctrl-Z
    pub async fn write_payload(&mut self, payload: &str) -> io::Result<()> {
        trace!(payload, "tx payload");
        self.stream.write_all(payload.as_bytes()).await?;
        self.stream.write_all(&[CTRL_Z]).await?;
        self.stream.flush().await
    }

    /// Escape aborts a data-entry prompt the modem is still waiting on
    pub async fn cancel_input(&mut self) -> io::Result<()> {
        self.stream.write_all(&[ESCAPE]).await?;
        self.stream.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
