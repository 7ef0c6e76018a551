// TCP accept loop and the serialized-core actor (`spec.md` §4.8, §5).
// Grounded on the accept-loop/spawn-per-connection shape of
// `examples/harborgrid-justin-rusty-db/src/network/server.rs`, generalized
// from its `Arc`-shared catalog to a single-owner actor reached over a
// channel — the "serialized core" `spec.md` §5 recommends, closing the
// source's race between handlers sharing one mutable `Untold`.

use crate::config::Config;
use crate::error::{DbError, Result};
use crate::net::dispatch;
use crate::net::protocol::{Request, MAX_REQUEST_BYTES};
use crate::session::Untold;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

type CoreRequest = (Request, oneshot::Sender<std::result::Result<Vec<u8>, Vec<u8>>>);

/// Runs the single task that owns the `Untold` session for the lifetime of
/// the server. Every request is processed to completion (dispatch + save)
/// before the next is taken off the queue — invariant (1) of `spec.md` §5.
async fn run_core(mut session: Untold, mut requests: mpsc::Receiver<CoreRequest>) {
    while let Some((request, reply)) = requests.recv().await {
        let outcome = dispatch::dispatch(&mut session, request);
        let _ = reply.send(outcome);
    }
}

/// Accepts connections on `config.addr()` and serves them against a single
/// serialized `Untold` core.
pub async fn serve(config: Config, session: Untold) -> Result<()> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await.map_err(DbError::Io)?;
    tracing::info!(%addr, "untold server listening");

    let (tx, rx) = mpsc::channel::<CoreRequest>(64);
    tokio::spawn(run_core(session, rx));

    let read_timeout = Duration::from_secs(config.read_timeout_secs);
    let max_bytes = config.max_request_bytes.min(MAX_REQUEST_BYTES);

    loop {
        let (socket, peer) = listener.accept().await.map_err(DbError::Io)?;
        let tx = tx.clone();

        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, tx, max_bytes, read_timeout).await {
                tracing::warn!(%peer, error = %err, "connection handler failed");
            }
        });
    }
}

/// One request, one reply, then close (`spec.md` §4.8). A panic or I/O error
/// here only drops this connection; the core task keeps serving others
/// (invariant (3) of `spec.md` §5).
async fn handle_connection(
    mut socket: TcpStream,
    core: mpsc::Sender<CoreRequest>,
    max_bytes: usize,
    read_timeout: Duration,
) -> Result<()> {
    let mut buffer = vec![0u8; max_bytes];

    let n = tokio::time::timeout(read_timeout, socket.read(&mut buffer))
        .await
        .map_err(|_| DbError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out")))?
        .map_err(DbError::Io)?;

    if n == 0 {
        return Ok(());
    }

    let reply_bytes = match serde_json::from_slice::<Request>(&buffer[..n]) {
        Ok(request) => {
            let (reply_tx, reply_rx) = oneshot::channel();
            if core.send((request, reply_tx)).await.is_err() {
                DbError::Internal("core task is not running".into()).to_string().into_bytes()
            } else {
                match reply_rx.await {
                    Ok(Ok(bytes)) => bytes,
                    Ok(Err(error_bytes)) => error_bytes,
                    Err(_) => DbError::Internal("core task dropped the reply channel".into()).to_string().into_bytes(),
                }
            }
        }
        Err(err) => DbError::Serialization(err.to_string()).to_string().into_bytes(),
    };

    socket.write_all(&reply_bytes).await.map_err(DbError::Io)?;
    Ok(())
}
