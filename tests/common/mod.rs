//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use homeguard::config::HttpConfig;
use homeguard::device::{Device, DeviceDirectory};
use homeguard::lifecycle::{Relay, RunningRelay};
use homeguard::listener::HttpListener;
use homeguard::wol::UdpWakeSender;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Reserve an unused loopback TCP port.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// UDP socket standing in for the broadcast segment.
pub async fn packet_sink() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

/// Receive one datagram, or `None` if nothing arrives within `wait`.
pub async fn recv_packet(socket: &UdpSocket, wait: Duration) -> Option<Vec<u8>> {
    let mut buf = [0u8; 512];
    match tokio::time::timeout(wait, socket.recv(&mut buf)).await {
        Ok(Ok(len)) => Some(buf[..len].to_vec()),
        _ => None,
    }
}

/// Directory with a single `desktop` device broadcasting on loopback.
pub fn loopback_directory() -> Arc<DeviceDirectory> {
    Arc::new(
        DeviceDirectory::from_devices(vec![Device::new(
            "desktop",
            "00:11:22:33:44:55",
            "127.0.0.1",
        )])
        .unwrap(),
    )
}

/// Start a relay with one HTTP listener whose packets go to `sink_port`.
pub async fn start_relay(
    directory: Option<Arc<DeviceDirectory>>,
    sink_port: u16,
    grace: Duration,
) -> (RunningRelay, SocketAddr) {
    let addr: SocketAddr = format!("127.0.0.1:{}", free_port()).parse().unwrap();
    let http = HttpConfig {
        bind_address: addr.to_string(),
        ..HttpConfig::default()
    };

    let running = Relay::new(
        directory,
        Arc::new(UdpWakeSender::with_port(sink_port)),
        100,
        grace,
    )
    .with_listener(Arc::new(HttpListener::new(&http)))
    .start();

    wait_for_health(addr).await;
    (running, addr)
}

/// Poll `/health` until the listener answers.
pub async fn wait_for_health(addr: SocketAddr) {
    let client = reqwest::Client::new();
    let url = format!("http://{}/health", addr);
    for _ in 0..100 {
        if let Ok(res) = client.get(&url).send().await {
            if res.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("relay at {} never became healthy", addr);
}

/// Start a programmable stand-in for the relay's HTTP endpoint.
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            405 => "405 Method Not Allowed",
                            503 => "503 Service Unavailable",
                            _ => "500 Internal Server Error",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// What a scripted broker saw, tagged with the session index (0-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connect(usize),
    Subscribe(usize, String),
    Unsubscribe(usize, String),
    Disconnect(usize),
}

#[derive(Default)]
pub struct BrokerLog {
    events: Mutex<Vec<BrokerEvent>>,
}

impl BrokerLog {
    fn push(&self, event: BrokerEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<BrokerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&BrokerEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|&e| pred(e)).count()
    }

    /// Poll until an event matching `pred` shows up or `wait` elapses.
    pub async fn wait_for(&self, pred: impl Fn(&BrokerEvent) -> bool, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;
        while tokio::time::Instant::now() < deadline {
            if self.count(&pred) > 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.count(&pred) > 0
    }
}

/// Minimal MQTT 3.1.1 broker on `addr`.
///
/// The first session gets `first_publish` on its subscribed topic and is then
/// closed by the broker. Later sessions stay open until the client
/// disconnects.
pub async fn start_scripted_broker(addr: SocketAddr, first_publish: &'static [u8]) -> Arc<BrokerLog> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let log = Arc::new(BrokerLog::default());

    let broker_log = log.clone();
    tokio::spawn(async move {
        let mut session = 0usize;
        while let Ok((socket, _)) = listener.accept().await {
            let publish = (session == 0).then_some(first_publish);
            tokio::spawn(serve_session(socket, session, broker_log.clone(), publish));
            session += 1;
        }
    });

    log
}

async fn serve_session(
    mut socket: TcpStream,
    session: usize,
    log: Arc<BrokerLog>,
    publish: Option<&'static [u8]>,
) {
    while let Some((header, body)) = read_packet(&mut socket).await {
        match header >> 4 {
            // CONNECT
            1 => {
                log.push(BrokerEvent::Connect(session));
                let _ = socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await;
            }
            // SUBSCRIBE
            8 => {
                let topic = mqtt_string(&body[2..]);
                log.push(BrokerEvent::Subscribe(session, topic.clone()));
                let _ = socket.write_all(&encode_packet(0x90, &[body[0], body[1], 0x01])).await;

                if let Some(payload) = publish {
                    let mut publish_body = Vec::new();
                    publish_body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
                    publish_body.extend_from_slice(topic.as_bytes());
                    publish_body.extend_from_slice(payload);
                    let _ = socket.write_all(&encode_packet(0x30, &publish_body)).await;
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    return;
                }
            }
            // UNSUBSCRIBE
            10 => {
                log.push(BrokerEvent::Unsubscribe(session, mqtt_string(&body[2..])));
                let _ = socket.write_all(&encode_packet(0xB0, &[body[0], body[1]])).await;
            }
            // PINGREQ
            12 => {
                let _ = socket.write_all(&[0xD0, 0x00]).await;
            }
            // DISCONNECT
            14 => {
                log.push(BrokerEvent::Disconnect(session));
                return;
            }
            _ => {}
        }
    }
}

async fn read_packet(socket: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let header = socket.read_u8().await.ok()?;

    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = socket.read_u8().await.ok()?;
        len |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0u8; len];
    socket.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

fn encode_packet(header: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![header];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
    out.extend_from_slice(body);
    out
}

fn mqtt_string(bytes: &[u8]) -> String {
    let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    String::from_utf8_lossy(&bytes[2..2 + len]).into_owned()
}
