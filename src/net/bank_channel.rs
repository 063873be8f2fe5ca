//! The bank-facing client channel: the jPOS `ASCIIChannel` convention of a
//! 4-char ASCII decimal length header followed by the message body (spec
//! §4.5). A single persistent connection is owned by the bank dispatcher
//! (C9); this module only knows how to frame bytes onto a socket.

// Uses
use async_trait::async_trait;
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpStream,
};

use crate::error::FramingError;

const LENGTH_HEADER_WIDTH: usize = 4;
const MAX_FRAME_LEN: usize = 99_999;

fn format_header(len: usize) -> String {
	format!("{len:0width$}", width = LENGTH_HEADER_WIDTH)
}

fn parse_header(header: &[u8; LENGTH_HEADER_WIDTH]) -> Result<usize, FramingError> {
	let text = std::str::from_utf8(header)
		.map_err(|_| FramingError::MalformedLength("non-ASCII length header".to_owned()))?;
	text.parse()
		.map_err(|_| FramingError::MalformedLength(text.to_owned()))
}

/// A connected transport capable of sending and receiving one ASCII-length
/// framed message at a time. Implemented for real sockets in production and
/// by an in-memory stub in tests.
#[async_trait]
pub trait BankChannel: Send {
	async fn send(&mut self, body: &[u8]) -> Result<(), FramingError>;
	async fn receive(&mut self) -> Result<Vec<u8>, FramingError>;
}

/// Where a `receive()` call left off reading the current frame. `receive()`
/// is used directly as a `select!` branch by the bank dispatcher, so it must
/// be safe to cancel mid-read: progress is kept here, on `self`, rather than
/// in a temporary inside the future, so a cancelled call resumes from the
/// exact byte it reached instead of re-reading (and desyncing) the stream.
enum ReadProgress {
	Header { buf: [u8; LENGTH_HEADER_WIDTH], filled: usize },
	Body { buf: Vec<u8>, filled: usize },
}

impl Default for ReadProgress {
	fn default() -> Self {
		Self::Header {
			buf: [0u8; LENGTH_HEADER_WIDTH],
			filled: 0,
		}
	}
}

/// A lazily-connecting TCP implementation of [`BankChannel`].
pub struct TcpBankChannel {
	host: String,
	port: u16,
	stream: Option<TcpStream>,
	progress: ReadProgress,
}

impl TcpBankChannel {
	#[must_use]
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			stream: None,
			progress: ReadProgress::default(),
		}
	}

	async fn ensure_connected(&mut self) -> Result<&mut TcpStream, FramingError> {
		if self.stream.is_none() {
			let stream = TcpStream::connect((self.host.as_str(), self.port))
				.await
				.map_err(|e| FramingError::Io(e.to_string()))?;
			self.stream = Some(stream);
		}
		Ok(self.stream.as_mut().expect("just populated"))
	}

	/// Drops the current connection so the next send/receive reconnects. Any
	/// partial frame read so far belongs to the old connection and is
	/// discarded along with it.
	pub fn disconnect(&mut self) {
		self.stream = None;
		self.progress = ReadProgress::default();
	}

	/// Reads into whichever of `progress`'s buffers isn't yet full, looping
	/// on short reads. Cancel-safe: each `.await` point is a single
	/// [`AsyncReadExt::read`] call, and the byte count it advances is
	/// recorded in `progress` (owned by `self`, not by this future) before
	/// the next `.await`, so a dropped future loses no bytes.
	async fn read_frame(stream: &mut TcpStream, progress: &mut ReadProgress) -> Result<Vec<u8>, FramingError> {
		loop {
			match progress {
				ReadProgress::Header { buf, filled } => {
					while *filled < LENGTH_HEADER_WIDTH {
						let n = stream
							.read(&mut buf[*filled..])
							.await
							.map_err(|e| FramingError::Io(e.to_string()))?;
						if n == 0 {
							return Err(FramingError::ConnectionClosed);
						}
						*filled += n;
					}
					let len = parse_header(buf)?;
					if len > MAX_FRAME_LEN {
						return Err(FramingError::FrameTooLarge(len, MAX_FRAME_LEN));
					}
					*progress = ReadProgress::Body {
						buf: vec![0u8; len],
						filled: 0,
					};
				}
				ReadProgress::Body { buf, filled } => {
					while *filled < buf.len() {
						let n = stream
							.read(&mut buf[*filled..])
							.await
							.map_err(|e| FramingError::Io(e.to_string()))?;
						if n == 0 {
							return Err(FramingError::ConnectionClosed);
						}
						*filled += n;
					}
					let body = std::mem::take(buf);
					*progress = ReadProgress::default();
					return Ok(body);
				}
			}
		}
	}
}

#[async_trait]
impl BankChannel for TcpBankChannel {
	async fn send(&mut self, body: &[u8]) -> Result<(), FramingError> {
		if body.len() > MAX_FRAME_LEN {
			return Err(FramingError::FrameTooLarge(body.len(), MAX_FRAME_LEN));
		}
		let header = format_header(body.len());
		let stream = self.ensure_connected().await?;
		let write_result = async {
			stream.write_all(header.as_bytes()).await?;
			stream.write_all(body).await
		}
		.await;
		if write_result.is_err() {
			self.disconnect();
		}
		write_result.map_err(|e| FramingError::Io(e.to_string()))
	}

	async fn receive(&mut self) -> Result<Vec<u8>, FramingError> {
		self.ensure_connected().await?;
		let stream = self.stream.as_mut().expect("just ensured connected");
		let result = Self::read_frame(stream, &mut self.progress).await;
		if result.is_err() {
			self.disconnect();
		}
		result
	}
}

// Unit Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_round_trips() {
		let header_text = format_header(123);
		assert_eq!(header_text, "0123");
		let mut header = [0u8; LENGTH_HEADER_WIDTH];
		header.copy_from_slice(header_text.as_bytes());
		assert_eq!(parse_header(&header).unwrap(), 123);
	}

	#[test]
	fn malformed_header_is_rejected() {
		let header = *b"abcd";
		assert!(parse_header(&header).is_err());
	}

	#[tokio::test]
	async fn cancelled_receive_resumes_without_losing_bytes() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		let server = tokio::spawn(async move {
			let (mut socket, _) = listener.accept().await.unwrap();
			// Header plus the first byte of a 4-byte body land together...
			socket.write_all(b"0004A").await.unwrap();
			// ...the rest trickles in only after the client's first
			// `receive()` has had time to be cancelled mid-body.
			tokio::time::sleep(std::time::Duration::from_millis(50)).await;
			socket.write_all(b"BCD").await.unwrap();
		});

		let mut channel = TcpBankChannel::new("127.0.0.1", addr.port());
		let first = tokio::time::timeout(std::time::Duration::from_millis(10), channel.receive()).await;
		assert!(first.is_err(), "first receive should have been cancelled before the body completed");

		let body = channel.receive().await.unwrap();
		assert_eq!(body, b"ABCD");
		assert!(channel.stream.is_some(), "a cancelled receive must not disconnect the stream");

		server.await.unwrap();
	}
}
