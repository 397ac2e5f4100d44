//! Integration tests for the full chat flow: real sockets on loopback,
//! real server loop, real clients.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::task::JoinHandle;

use murmur::{ChatClient, ChatEvent, ChatServer, ClientConfig, MurmurError};

// =========================================================================
// Helpers
// =========================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env(),
        )
        .with_test_writer()
        .try_init();
}

type ServerHandle = JoinHandle<Result<(), MurmurError>>;

/// Starts a server on a random loopback port with the given liveness
/// timings and returns its address plus the running task.
async fn start_server(
    afk_timeout: Duration,
    sweep_interval: Duration,
) -> (SocketAddr, ServerHandle) {
    init_tracing();
    let server = ChatServer::builder()
        .bind("127.0.0.1:0")
        .afk_timeout(afk_timeout)
        .sweep_interval(sweep_interval)
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr();
    let handle = tokio::spawn(server.run());
    (addr, handle)
}

/// A server with generous timings, for tests that are not about liveness.
async fn start_quiet_server() -> (SocketAddr, ServerHandle) {
    start_server(Duration::from_secs(60), Duration::from_secs(1)).await
}

fn client_config() -> ClientConfig {
    ClientConfig {
        local_port: 0,
        heartbeat_interval: Some(Duration::from_millis(100)),
        handshake_timeout: Duration::from_secs(2),
    }
}

/// A client that never heartbeats, for eviction tests.
fn silent_client_config() -> ClientConfig {
    ClientConfig {
        heartbeat_interval: None,
        ..client_config()
    }
}

/// Pumps `client` until an event matches, panicking on timeout.
async fn await_event<F>(
    client: &mut ChatClient,
    timeout: Duration,
    mut matches: F,
) -> ChatEvent
where
    F: FnMut(&ChatEvent) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            let event = client.next_event().await.expect("event stream");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

// =========================================================================
// Connect and chat
// =========================================================================

#[tokio::test]
async fn test_two_clients_chat_through_server() {
    let (addr, _server) = start_quiet_server().await;

    let mut alice = ChatClient::connect(addr, "alice", client_config())
        .await
        .expect("alice connects");
    let mut bob = ChatClient::connect(addr, "bob", client_config())
        .await
        .expect("bob connects");

    // Alice hears bob arrive.
    let event = await_event(&mut alice, Duration::from_secs(2), |e| {
        matches!(e, ChatEvent::Joined(_))
    })
    .await;
    assert_eq!(event, ChatEvent::Joined("bob".to_string()));

    // Bob speaks, alice hears it with his name attached.
    bob.send_chat_line("hello world").await.expect("send");
    let event = await_event(&mut alice, Duration::from_secs(2), |e| {
        matches!(e, ChatEvent::Message { .. })
    })
    .await;
    assert_eq!(
        event,
        ChatEvent::Message {
            from: "bob".to_string(),
            text: "hello world".to_string(),
        }
    );
}

#[tokio::test]
async fn test_client_binds_requested_local_port() {
    let (addr, _server) = start_quiet_server().await;

    // Learn a free port from the OS, then ask for it explicitly.
    let free_port = {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").expect("bind");
        socket.local_addr().expect("local addr").port()
    };
    let config = ClientConfig {
        local_port: free_port,
        ..client_config()
    };
    let alice = ChatClient::connect(addr, "alice", config)
        .await
        .expect("alice connects");

    assert_eq!(alice.local_addr().port(), free_port);
}

#[tokio::test]
async fn test_sender_does_not_hear_own_message() {
    let (addr, _server) = start_quiet_server().await;

    let mut alice = ChatClient::connect(addr, "alice", client_config())
        .await
        .expect("alice connects");
    let _bob = ChatClient::connect(addr, "bob", client_config())
        .await
        .expect("bob connects");

    alice.send_chat_line("talking to myself?").await.expect("send");

    // Alice sees bob join but never her own line.
    let result = tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            let event = alice.next_event().await.expect("event stream");
            if matches!(event, ChatEvent::Message { .. }) {
                return event;
            }
        }
    })
    .await;
    assert!(result.is_err(), "sender must not receive its own message");
}

#[tokio::test]
async fn test_long_line_survives_segmentation() {
    let (addr, _server) = start_quiet_server().await;

    let mut alice = ChatClient::connect(addr, "alice", client_config())
        .await
        .expect("alice connects");
    let mut bob = ChatClient::connect(addr, "bob", client_config())
        .await
        .expect("bob connects");

    // Several blocks on the wire, one line at the far end.
    let text = "the quick brown fox jumps over the lazy dog ".repeat(4);
    bob.send_chat_line(&text).await.expect("send");

    let event = await_event(&mut alice, Duration::from_secs(2), |e| {
        matches!(e, ChatEvent::Message { .. })
    })
    .await;
    assert_eq!(
        event,
        ChatEvent::Message {
            from: "bob".to_string(),
            text,
        }
    );
}

// =========================================================================
// Disconnect
// =========================================================================

#[tokio::test]
async fn test_disconnect_announces_departure() {
    let (addr, _server) = start_quiet_server().await;

    let mut alice = ChatClient::connect(addr, "alice", client_config())
        .await
        .expect("alice connects");
    let bob = ChatClient::connect(addr, "bob", client_config())
        .await
        .expect("bob connects");

    bob.disconnect().await.expect("orderly disconnect");

    let event = await_event(&mut alice, Duration::from_secs(2), |e| {
        matches!(e, ChatEvent::Left(_))
    })
    .await;
    assert_eq!(event, ChatEvent::Left("bob".to_string()));
}

// =========================================================================
// Kill switch
// =========================================================================

#[tokio::test]
async fn test_kill_with_password_stops_server() {
    let (addr, server) = start_quiet_server().await;

    let mut alice = ChatClient::connect(addr, "alice", client_config())
        .await
        .expect("alice connects");

    alice.send_chat_line("!kill admin123").await.expect("send");

    let event = await_event(&mut alice, Duration::from_secs(2), |e| {
        matches!(e, ChatEvent::Kicked)
    })
    .await;
    assert_eq!(event, ChatEvent::Kicked);

    let event = await_event(&mut alice, Duration::from_secs(2), |e| {
        matches!(e, ChatEvent::Disconnected)
    })
    .await;
    assert_eq!(event, ChatEvent::Disconnected);

    // The server loop itself returns cleanly.
    let result = tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("server task should finish")
        .expect("server task should not panic");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_kill_with_wrong_password_is_silently_rejected() {
    let (addr, server) = start_quiet_server().await;

    let mut alice = ChatClient::connect(addr, "alice", client_config())
        .await
        .expect("alice connects");
    let mut bob = ChatClient::connect(addr, "bob", client_config())
        .await
        .expect("bob connects");

    alice.send_chat_line("!kill hunter2").await.expect("send");

    // The rejection is silent: no notice, no kick, and chat keeps
    // flowing. If the server had reacted, alice would see Kicked or
    // Disconnected before bob's line.
    bob.send_chat_line("still here").await.expect("send");
    let event = await_event(&mut alice, Duration::from_secs(2), |e| {
        matches!(
            e,
            ChatEvent::Message { .. } | ChatEvent::Kicked | ChatEvent::Disconnected
        )
    })
    .await;
    assert_eq!(
        event,
        ChatEvent::Message {
            from: "bob".to_string(),
            text: "still here".to_string(),
        }
    );
    assert!(!server.is_finished(), "server keeps running");
}

// =========================================================================
// Liveness
// =========================================================================

#[tokio::test]
async fn test_silent_client_is_evicted() {
    let (addr, _server) =
        start_server(Duration::from_millis(150), Duration::from_millis(50)).await;

    let mut mute = ChatClient::connect(addr, "mute", silent_client_config())
        .await
        .expect("client connects");

    // No heartbeats, no chat: the sweep notices and throws the client out.
    let event = await_event(&mut mute, Duration::from_secs(2), |e| {
        matches!(e, ChatEvent::Kicked)
    })
    .await;
    assert_eq!(event, ChatEvent::Kicked);

    let event = await_event(&mut mute, Duration::from_secs(2), |e| {
        matches!(e, ChatEvent::Disconnected)
    })
    .await;
    assert_eq!(event, ChatEvent::Disconnected);
}

#[tokio::test]
async fn test_heartbeats_keep_idle_client_alive() {
    let (addr, _server) =
        start_server(Duration::from_millis(200), Duration::from_millis(50)).await;

    let fast_heartbeat = ClientConfig {
        heartbeat_interval: Some(Duration::from_millis(50)),
        ..client_config()
    };
    let mut alice = ChatClient::connect(addr, "alice", fast_heartbeat)
        .await
        .expect("alice connects");

    // Bob waits out several AFK timeouts before speaking. Alice idles
    // in her event loop the whole time, living on heartbeats alone.
    let speak = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(700)).await;
        let mut bob = ChatClient::connect(addr, "bob", ClientConfig {
            heartbeat_interval: Some(Duration::from_millis(50)),
            ..ClientConfig::default()
        })
        .await
        .expect("bob connects");
        bob.send_chat_line("still there?").await.expect("send");
        bob
    });

    let event = await_event(&mut alice, Duration::from_secs(3), |e| {
        matches!(e, ChatEvent::Message { .. })
    })
    .await;
    assert_eq!(
        event,
        ChatEvent::Message {
            from: "bob".to_string(),
            text: "still there?".to_string(),
        }
    );
    speak.await.expect("bob task");
}
