//! The POS-facing listener: an acceptor task plus one session task per
//! accepted connection, framed with a 2-byte big-endian length prefix.

// Uses
use std::sync::Arc;

use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
	sync::broadcast,
	task::JoinSet,
};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{iso8583, masking, router::TransactionRouter};

pub const MAX_FRAME_LEN: usize = 10_240;
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Reads one length-prefixed frame from `stream`. Returns `Ok(None)` on a
/// clean connection close at a frame boundary.
async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
	let mut len_bytes = [0u8; 2];
	match stream.read_exact(&mut len_bytes).await {
		Ok(_) => {}
		Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
		Err(e) => return Err(e),
	}
	let len = u16::from_be_bytes(len_bytes) as usize;
	let mut body = vec![0u8; len];
	stream.read_exact(&mut body).await?;
	Ok(Some(body))
}

async fn write_frame(stream: &mut TcpStream, body: &[u8]) -> std::io::Result<()> {
	let len = u16::try_from(body.len()).unwrap_or(u16::MAX);
	stream.write_all(&len.to_be_bytes()).await?;
	stream.write_all(&body[..len as usize]).await
}

/// One accepted connection's lifetime: read a frame, decode, route, encode,
/// write the reply; repeat until the peer closes or a decode error occurs.
async fn handle_connection(mut stream: TcpStream, router: Arc<TransactionRouter>) {
	loop {
		let frame = match read_frame(&mut stream).await {
			Ok(Some(frame)) => frame,
			Ok(None) => {
				debug!("connection closed by peer");
				return;
			}
			Err(e) => {
				warn!(error = %e, "error reading frame");
				return;
			}
		};
		if frame.len() > MAX_FRAME_LEN {
			warn!(len = frame.len(), "frame exceeds maximum length, closing");
			return;
		}

		let request = match iso8583::unpack(iso8583::dictionary::pos(), &frame) {
			Ok(msg) => msg,
			Err(e) => {
				warn!(error = %e, "decode error, closing connection without a reply");
				return;
			}
		};
		info!(message = %masking::masked_summary(&request), "received POS request");

		let Some(response) = router.process(&request).await else {
			continue;
		};
		info!(message = %masking::masked_summary(&response), "sending POS response");

		let wire = match iso8583::pack(iso8583::dictionary::pos(), &response) {
			Ok(bytes) => bytes,
			Err(e) => {
				error!(error = %e, "failed to encode response, closing connection");
				return;
			}
		};
		if let Err(e) = write_frame(&mut stream, &wire).await {
			warn!(error = %e, "error writing response");
			return;
		}
	}
}

/// Runs the acceptor loop until `shutdown` fires, at which point it stops
/// accepting new connections. Existing session tasks are given
/// [`SHUTDOWN_GRACE`] to finish their in-flight request.
pub async fn serve(
	listener: TcpListener,
	router: Arc<TransactionRouter>,
	mut shutdown: broadcast::Receiver<()>,
) {
	info!(addr = ?listener.local_addr().ok(), "POS listener started");
	let mut sessions = JoinSet::new();
	loop {
		tokio::select! {
			accepted = listener.accept() => {
				match accepted {
					Ok((stream, peer)) => {
						let router = Arc::clone(&router);
						let span = info_span!("pos_session", %peer);
						sessions.spawn(handle_connection(stream, router).instrument(span));
					}
					Err(e) => warn!(error = %e, "accept failed"),
				}
			}
			_ = shutdown.recv() => {
				info!("POS listener shutting down, draining in-flight sessions");
				break;
			}
		}
	}

	if tokio::time::timeout(SHUTDOWN_GRACE, async {
		while sessions.join_next().await.is_some() {}
	})
	.await
	.is_err()
	{
		warn!("shutdown grace period elapsed with sessions still in flight, aborting them");
		sessions.shutdown().await;
	}
}
