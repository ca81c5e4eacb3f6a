//! WebSocket listener for the browser agent
//!
//! Each accepted socket gets a writer task (outbound queue, keepalive pings)
//! and a reader loop that feeds frames to the dispatcher. The reader is the
//! one that reports the disconnect.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tabwire_protocol::Envelope;
use tabwire_utils::{Result, TabwireError};

use super::channel::AgentConnection;
use crate::context::BridgeContext;

/// Bind `addr`, retrying while the address is still held by someone else
pub async fn bind_with_retry(addr: &str, attempts: u32, delay: Duration) -> Result<TcpListener> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                if attempt >= attempts {
                    return Err(TabwireError::BindFailed {
                        addr: addr.to_string(),
                        attempts,
                    });
                }
                warn!(
                    addr = %addr,
                    attempt,
                    attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "Agent listen address in use, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(TabwireError::Io(e)),
        }
    }
}

/// Bind the configured address and serve agent connections until `shutdown`
///
/// A bind failure is logged and returns; the control channel keeps working
/// and tools report that no agent is connected.
pub async fn serve_agent(ctx: BridgeContext, shutdown: CancellationToken) {
    let agent = &ctx.config.agent;
    let listener = match bind_with_retry(
        &agent.listen_addr,
        agent.bind_attempts,
        agent.bind_retry_delay(),
    )
    .await
    {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "Agent listener unavailable");
            return;
        }
    };

    run_agent_accept_loop(listener, ctx, shutdown).await;
}

/// Run the agent accept loop
pub async fn run_agent_accept_loop(
    listener: TcpListener,
    ctx: BridgeContext,
    shutdown: CancellationToken,
) {
    match listener.local_addr() {
        Ok(addr) => {
            ctx.state.set_listening(addr);
            info!(addr = %addr, "Agent listener bound");
        }
        Err(e) => warn!(error = %e, "Agent listener has no local address"),
    }

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, remote)) => {
                        debug!(remote = %remote, "New agent socket");
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, remote, ctx).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Agent accept error");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received, stopping agent accept loop");
                break;
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, remote: SocketAddr, ctx: BridgeContext) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(remote = %remote, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    let connection = AgentConnection::new(remote, tx);
    let id = connection.id();
    ctx.agent.accept(connection.clone());

    let writer_conn = connection.clone();
    let ping_interval = ctx.config.agent.ping_interval();
    let writer = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + ping_interval, ping_interval);
        loop {
            tokio::select! {
                _ = writer_conn.closed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                Some(envelope) = rx.recv() => {
                    let text = match envelope.to_text() {
                        Ok(text) => text,
                        Err(e) => {
                            error!(connection = %writer_conn.id(), error = %e, "Failed to encode agent frame");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        debug!(connection = %writer_conn.id(), error = %e, "Agent write failed");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let idle_timeout = ctx.config.agent.idle_timeout();
    loop {
        tokio::select! {
            _ = connection.closed() => {
                debug!(connection = %id, "Connection retired, stopping reader");
                break;
            }
            next = tokio::time::timeout(idle_timeout, source.next()) => {
                match next {
                    Err(_) => {
                        warn!(
                            connection = %id,
                            idle_secs = idle_timeout.as_secs(),
                            "Agent went silent, dropping connection"
                        );
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(Ok(Message::Text(text)))) => {
                        ctx.dispatcher.dispatch_text(&connection, &text);
                    }
                    Ok(Some(Ok(Message::Close(frame)))) => {
                        debug!(connection = %id, frame = ?frame, "Agent sent close");
                        break;
                    }
                    // Pings are answered by tungstenite; pongs only count as activity
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(e))) => {
                        warn!(connection = %id, error = %e, "Agent socket error");
                        break;
                    }
                }
            }
        }
    }

    ctx.agent.on_disconnect(id);
    connection.retire();
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use futures::Stream;
    use tabwire_protocol::kinds;

    fn context() -> BridgeContext {
        let mut config = AppConfig::default();
        config.agent.listen_addr = "127.0.0.1:0".into();
        BridgeContext::new(config)
    }

    async fn next_envelope<S>(ws: &mut S) -> Envelope
    where
        S: Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => return Envelope::from_text(&text).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_bind_in_use_gives_up_after_attempts() {
        let held = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = held.local_addr().unwrap().to_string();

        let result = bind_with_retry(&addr, 2, Duration::from_millis(10)).await;
        match result {
            Err(TabwireError::BindFailed { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected BindFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_accept_loop_stops_on_shutdown() {
        let ctx = context();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_agent_accept_loop(listener, ctx.clone(), shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ctx.state.snapshot().listening_on.is_some());

        shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "agent listener did not shut down");
    }

    #[tokio::test]
    async fn test_agent_round_trip_over_websocket() {
        let ctx = context();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(run_agent_accept_loop(listener, ctx.clone(), shutdown.clone()));

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();

        let ready = next_envelope(&mut ws).await;
        assert_eq!(ready.kind(), kinds::SERVER_READY);
        assert_eq!(ready.get("message").unwrap(), "MCP WebSocket Bridge Ready");

        ws.send(Message::Text(r#"{"type":"chrome_extension_connected"}"#.into()))
            .await
            .unwrap();
        assert_eq!(next_envelope(&mut ws).await.kind(), kinds::CONNECTION_CONFIRMED);
        assert!(ctx.agent.is_connected());

        let agent = ctx.agent.clone();
        let call = tokio::spawn(async move {
            agent
                .request(Envelope::new(kinds::GET_PAGE_INFO), Duration::from_secs(5))
                .await
        });

        let request = next_envelope(&mut ws).await;
        assert_eq!(request.kind(), kinds::GET_PAGE_INFO);
        let reply = format!(
            r#"{{"type":"page_info","request_id":"{}","data":{{"title":"Example"}}}}"#,
            request.request_id().unwrap()
        );
        ws.send(Message::Text(reply)).await.unwrap();

        let reply = call.await.unwrap().unwrap();
        assert_eq!(reply.data().unwrap()["title"], "Example");
        assert!(ctx.table.is_empty());

        ws.close(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!ctx.agent.is_connected());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_second_agent_supersedes_first() {
        let ctx = context();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(run_agent_accept_loop(listener, ctx.clone(), shutdown.clone()));

        let url = format!("ws://{}", addr);
        let (mut first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        next_envelope(&mut first).await;
        let first_id = ctx.agent.active().unwrap().id();

        let (mut second, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        next_envelope(&mut second).await;
        let second_id = ctx.agent.active().unwrap().id();
        assert_ne!(first_id, second_id);

        // Old socket is closed by the bridge; new one stays active
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ctx.agent.active().map(|c| c.id()), Some(second_id));
        shutdown.cancel();
    }
}
