//! Mock WebSocket synthesis service for integration tests.
//!
//! Binds an ephemeral local port and replays a scripted reply sequence on
//! each connection, after waiting for the client's request message.
//! Sequenced scripts give every connection its own script, which is how the
//! batch tests distinguish the first, second, and never-opened sessions.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// One scripted server action.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send a binary message.
    Binary(Vec<u8>),
    /// Send a text message.
    Text(String),
    /// Close the connection cleanly.
    Close,
    /// Stop replying but keep the connection open.
    Hold,
}

enum ScriptSource {
    /// The same script for every connection.
    Repeat(Vec<Reply>),
    /// One script per connection, in accept order.
    Sequence(Vec<Vec<Reply>>),
}

impl ScriptSource {
    fn script_for(&self, index: usize) -> Option<Vec<Reply>> {
        match self {
            Self::Repeat(replies) => Some(replies.clone()),
            Self::Sequence(scripts) => scripts.get(index).cloned(),
        }
    }
}

/// Handle to a running mock service.
pub struct MockService {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    handle: JoinHandle<()>,
}

impl MockService {
    /// WebSocket URL of the service.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// First message received on each connection, in accept order.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }

    /// Waits until at least `expected` connections have ended, up to two
    /// seconds. Returns whether the count was reached.
    pub async fn wait_for_disconnects(&self, expected: usize) -> bool {
        for _ in 0..200 {
            if self.disconnects.load(Ordering::SeqCst) >= expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns a service that plays the same script on every connection.
pub async fn spawn_replay_service(replies: Vec<Reply>) -> MockService {
    spawn_service(ScriptSource::Repeat(replies)).await
}

/// Spawns a service with one script per expected connection. Connections
/// beyond the script list are closed immediately.
pub async fn spawn_sequenced_service(scripts: Vec<Vec<Reply>>) -> MockService {
    spawn_service(ScriptSource::Sequence(scripts)).await
}

async fn spawn_service(source: ScriptSource) -> MockService {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock service");
    let addr = listener.local_addr().expect("mock service address");
    let connections = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));
    let requests: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));

    let accept_connections = connections.clone();
    let accept_disconnects = disconnects.clone();
    let accept_requests = requests.clone();
    let handle = tokio::spawn(async move {
        let mut index = 0usize;
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            accept_connections.fetch_add(1, Ordering::SeqCst);
            let script = source.script_for(index);
            index += 1;
            let requests = accept_requests.clone();
            let disconnects = accept_disconnects.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, script, requests).await {
                    eprintln!("mock service connection error: {e}");
                }
                disconnects.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    MockService {
        addr,
        connections,
        disconnects,
        requests,
        handle,
    }
}

async fn handle_connection(
    stream: TcpStream,
    script: Option<Vec<Reply>>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    // The first client message is the synthesis request.
    loop {
        match read.next().await {
            Some(Ok(Message::Binary(data))) => {
                requests.lock().unwrap().push(data.to_vec());
                break;
            }
            Some(Ok(Message::Text(text))) => {
                requests.lock().unwrap().push(text.as_bytes().to_vec());
                break;
            }
            Some(Ok(Message::Ping(data))) => write.send(Message::Pong(data)).await?,
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }

    let Some(script) = script else {
        write.send(Message::Close(None)).await?;
        return Ok(());
    };

    for reply in script {
        match reply {
            Reply::Binary(data) => write.send(Message::Binary(data.into())).await?,
            Reply::Text(text) => write.send(Message::Text(text.into())).await?,
            Reply::Close => {
                write.send(Message::Close(None)).await?;
                return Ok(());
            }
            Reply::Hold => break,
        }
    }

    // Drain until the client goes away.
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Ping(data)) => write.send(Message::Pong(data)).await?,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}
