//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it with
//! a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use rally_transport::{
        Connection, PendingConnection, Transport, TransportError, WebSocketConnection,
        WebSocketTransport,
    };
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    /// Accepts one peer and completes its upgrade.
    async fn accept_one(transport: &mut WebSocketTransport) -> WebSocketConnection {
        let pending = transport.accept().await.expect("should accept");
        pending.establish().await.expect("should upgrade")
    }

    /// Connects a client while the server side accepts; returns both ends.
    async fn pair(mut transport: WebSocketTransport, addr: &str) -> (WebSocketConnection, ClientWs) {
        let server = tokio::spawn(async move { accept_one(&mut transport).await });
        let client = connect_client(addr).await;
        let conn = server.await.expect("accept task");
        (conn, client)
    }

    // =========================================================================
    // Frames
    // =========================================================================

    #[tokio::test]
    async fn test_accept_then_exchange_frames() {
        let (transport, addr) = bind().await;
        let (conn, mut client) = pair(transport, &addr).await;

        client
            .send(Message::Text(r#"{"type":"LEAVE"}"#.into()))
            .await
            .unwrap();
        let got = conn.recv().await.unwrap().expect("a frame");
        assert_eq!(got, br#"{"type":"LEAVE"}"#.to_vec());

        conn.send(br#"{"type":"STATE"}"#).await.unwrap();
        let reply = client.next().await.unwrap().unwrap();
        // UTF-8 payloads are delivered as text frames.
        assert!(reply.is_text());
        assert_eq!(reply.into_text().unwrap().as_str(), r#"{"type":"STATE"}"#);
    }

    #[tokio::test]
    async fn test_binary_payload_goes_out_as_binary_frame() {
        let (transport, addr) = bind().await;
        let (conn, mut client) = pair(transport, &addr).await;

        conn.send(&[0xff, 0xfe, 0x00]).await.unwrap();
        let reply = client.next().await.unwrap().unwrap();
        assert!(reply.is_binary());
        assert_eq!(reply.into_data().to_vec(), vec![0xff, 0xfe, 0x00]);
    }

    #[tokio::test]
    async fn test_send_is_not_blocked_by_pending_recv() {
        let (transport, addr) = bind().await;
        let (conn, mut client) = pair(transport, &addr).await;
        let conn = Arc::new(conn);

        // Park a reader in recv() that will not get anything for a while.
        let reader = Arc::clone(&conn);
        let pending = tokio::spawn(async move { reader.recv().await });

        tokio::time::timeout(Duration::from_secs(2), conn.send(b"tick"))
            .await
            .expect("send must not wait for the reader")
            .unwrap();
        let frame = client.next().await.unwrap().unwrap();
        assert_eq!(frame.into_data().to_vec(), b"tick".to_vec());

        client.close(None).await.unwrap();
        let closed = pending.await.unwrap().unwrap();
        assert!(closed.is_none(), "close frame reads as clean end");
    }

    #[tokio::test]
    async fn test_pings_are_skipped_and_peer_is_known() {
        let (transport, addr) = bind().await;
        let (conn, mut client) = pair(transport, &addr).await;

        let peer = conn.peer_addr().expect("websocket peers have an address");
        assert!(peer.ip().is_loopback());

        client.send(Message::Ping(vec![1, 2].into())).await.unwrap();
        client.send(Message::Text("after".into())).await.unwrap();
        let got = conn.recv().await.unwrap().expect("a frame");
        assert_eq!(got, b"after".to_vec());
    }

    // =========================================================================
    // Limits
    // =========================================================================

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (transport, addr) = bind().await;
        let (conn, mut client) = pair(transport.with_max_frame_bytes(8), &addr).await;

        client.send(Message::Text("0123456789".into())).await.unwrap();
        let err = conn.recv().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::FrameTooLarge { len: 10, max: 8 }
        ));
    }

    #[tokio::test]
    async fn test_huge_frame_is_refused_from_its_header() {
        let (transport, addr) = bind().await;
        let (conn, client) = pair(transport.with_max_frame_bytes(1024), &addr).await;

        // Announce an 8 MiB frame but only send its header: the limit has to
        // trip without waiting for a payload that never comes.
        let (mut sink, _stream) = client.split();
        let header = tokio::spawn(async move {
            sink.send(Message::Binary(vec![0u8; 8 << 20].into())).await
        });

        let err = tokio::time::timeout(Duration::from_secs(5), conn.recv())
            .await
            .expect("rejected before the payload is buffered")
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::FrameTooLarge { len, max: 1024 } if len == 8 << 20
        ));
        header.abort();
    }

    // =========================================================================
    // Accepting
    // =========================================================================

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            let a = accept_one(&mut transport).await;
            let b = accept_one(&mut transport).await;
            (a.id(), b.id())
        });

        let _c1 = connect_client(&addr).await;
        let _c2 = connect_client(&addr).await;
        let (a, b) = server.await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_silent_peer_does_not_hold_up_accept() {
        let (transport, addr) = bind().await;
        let mut transport = transport.with_upgrade_timeout(Duration::from_secs(30));

        // Opens TCP and never speaks HTTP.
        let _silent = TcpStream::connect(&addr).await.unwrap();
        let stalled = transport.accept().await.unwrap();
        let stalled = tokio::spawn(stalled.establish());

        let server = tokio::spawn(async move { accept_one(&mut transport).await });
        let mut client = tokio::time::timeout(Duration::from_secs(2), connect_client(&addr))
            .await
            .expect("second peer upgrades while the first is stuck");
        let conn = server.await.unwrap();

        conn.send(b"hello").await.unwrap();
        let frame = client.next().await.unwrap().unwrap();
        assert_eq!(frame.into_data().to_vec(), b"hello".to_vec());
        assert!(!stalled.is_finished());
        stalled.abort();
    }

    #[tokio::test]
    async fn test_upgrade_times_out() {
        let (transport, addr) = bind().await;
        let mut transport = transport.with_upgrade_timeout(Duration::from_millis(100));

        let _silent = TcpStream::connect(&addr).await.unwrap();
        let pending = transport.accept().await.unwrap();
        assert!(pending.peer_addr().is_some());

        let err = pending.establish().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::AcceptFailed(e) if e.kind() == std::io::ErrorKind::TimedOut
        ));
    }
}
