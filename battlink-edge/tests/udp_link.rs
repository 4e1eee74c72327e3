use std::net::SocketAddr;
use std::time::Duration;

use battlink_core::{
    Frame, MessageId, MessageType, Method, PowerStatus, ResponseCode, TelemetryRecord,
    encode_response,
};
use battlink_edge::{Engine, LinkConfig, TelemetryConfig, UdpTransport};
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

struct Request {
    src: SocketAddr,
    method: Method,
    path: String,
    payload: Vec<u8>,
    message_id: MessageId,
}

async fn recv_request(controller: &UdpSocket) -> Request {
    let mut buf = [0u8; 256];
    let (len, src) = timeout(Duration::from_secs(1), controller.recv_from(&mut buf))
        .await
        .expect("request within a second")
        .unwrap();

    let frame = Frame::parse(&buf[..len]).unwrap();
    Request {
        src,
        method: frame.method().unwrap(),
        path: frame.path.clone(),
        payload: frame.payload.to_vec(),
        message_id: frame.message_id,
    }
}

async fn reply(controller: &UdpSocket, request: &Request, text: &str) {
    let frame = encode_response(
        MessageType::Acknowledgement,
        ResponseCode::Content,
        request.message_id,
        text.as_bytes(),
    )
    .unwrap();

    controller.send_to(frame.as_bytes(), request.src).await.unwrap();
}

/// Gives the runtime a chance to register socket readiness.
async fn settle() {
    sleep(Duration::from_millis(50)).await;
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn record(ts: u32) -> TelemetryRecord {
    TelemetryRecord {
        voltage_mv: 4012,
        current_ma: -320,
        status: PowerStatus::On,
        temperature_c: 27,
        timestamp: ts,
    }
}

#[tokio::test]
async fn handshake_and_report_over_udp() {
    let controller = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let transport = UdpTransport::bind(
        "127.0.0.1:0".parse().unwrap(),
        controller.local_addr().unwrap(),
    )
    .await
    .unwrap();
    let device_addr = transport.local_addr().unwrap();
    assert_eq!(transport.peer(), controller.local_addr().unwrap());

    let mut engine = Engine::new(
        transport,
        record,
        LinkConfig::default(),
        TelemetryConfig::default(),
    );
    settle().await;

    // searching: heartbeat only
    engine.step(secs(5));
    let probe = recv_request(&controller).await;
    assert_eq!(probe.src, device_addr);
    assert_eq!(probe.method, Method::Get);
    assert_eq!(probe.path, "heartbeat");
    assert!(probe.payload.is_empty());
    reply(&controller, &probe, "ALIVE").await;

    settle().await;
    engine.step(secs(6));
    assert!(engine.state().peer_alive());
    assert!(!engine.state().authorized());

    // alive, not authorized: heartbeat then connect
    engine.step(secs(10));
    let probe = recv_request(&controller).await;
    let connect = recv_request(&controller).await;
    assert_eq!(probe.path, "heartbeat");
    assert_eq!(connect.method, Method::Put);
    assert_eq!(connect.path, "connect");
    assert_eq!(connect.payload, b"REQ");
    assert_eq!(connect.message_id.0, probe.message_id.0.wrapping_add(1));
    reply(&controller, &probe, "ALIVE").await;
    reply(&controller, &connect, "online").await;

    settle().await;
    engine.step(secs(11));
    assert!(engine.state().authorized());

    // authorized: heartbeat then binary battery report
    engine.step(secs(15));
    let probe = recv_request(&controller).await;
    let report = recv_request(&controller).await;
    assert_eq!(probe.path, "heartbeat");
    assert_eq!(report.path, "battery");
    assert_eq!(report.payload.len(), 10);
    assert_eq!(TelemetryRecord::decode(&report.payload).unwrap(), record(15));

    // explicit disconnect
    engine.disconnect(secs(16));
    let bye = recv_request(&controller).await;
    assert_eq!(bye.path, "disconnect");
    assert_eq!(bye.payload, b"BYE");
    assert!(engine.state().peer_alive());
    assert!(!engine.state().authorized());
}

#[tokio::test]
async fn silent_controller_revokes_authorization() {
    let controller = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let transport = UdpTransport::bind(
        "127.0.0.1:0".parse().unwrap(),
        controller.local_addr().unwrap(),
    )
    .await
    .unwrap();

    let mut engine = Engine::new(
        transport,
        record,
        LinkConfig::default(),
        TelemetryConfig::default(),
    );
    settle().await;

    engine.step(secs(5));
    let probe = recv_request(&controller).await;
    reply(&controller, &probe, "ALIVE").await;
    reply(&controller, &probe, "online").await;

    settle().await;
    engine.step(secs(6));
    assert!(engine.state().authorized());

    // the controller stops answering
    engine.step(secs(46));
    assert!(engine.state().authorized());

    engine.step(secs(47));
    assert!(!engine.state().peer_alive());
    assert!(!engine.state().authorized());
}
