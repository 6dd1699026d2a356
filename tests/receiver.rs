// End-to-end tests: transport -> receiver -> worker -> transport

use std::time::Duration;

use gcode_receiver::channel::channel_pair;
use gcode_receiver::receiver::{tcp, GcodeReceiver, MemoryTransport, ReceiverError, TransportError};
use gcode_receiver::worker::{Worker, WorkerConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

const IDLE: Duration = Duration::from_millis(1);

fn start(move_delay: Duration) -> (GcodeReceiver<MemoryTransport>, MemoryTransport) {
    let (frontend, channels) = channel_pair();
    Worker::new(channels, WorkerConfig { move_delay, idle_sleep: IDLE }).spawn();
    let transport = MemoryTransport::new();
    let receiver = GcodeReceiver::new(transport.clone(), frontend, IDLE);
    (receiver, transport)
}

async fn pump_until(
    receiver: &mut GcodeReceiver<MemoryTransport>,
    transport: &MemoryTransport,
    done: impl Fn(&[String]) -> bool,
) {
    timeout(Duration::from_secs(5), async {
        loop {
            receiver.poll_once().await.unwrap();
            if done(&transport.lines()) {
                break;
            }
            sleep(IDLE).await;
        }
    })
    .await
    .expect("timed out waiting for output");
}

/// Sends `?` until the worker reports idle and returns that report.
async fn idle_status(receiver: &mut GcodeReceiver<MemoryTransport>, transport: &MemoryTransport) -> String {
    loop {
        let before = transport.lines().len();
        transport.push_input("?");
        pump_until(receiver, transport, |lines| lines.len() > before).await;
        let last = transport.lines().last().cloned().unwrap_or_default();
        if last.starts_with("<Idle") {
            return last;
        }
    }
}

#[tokio::test]
async fn test_greeting() {
    let (mut receiver, transport) = start(Duration::ZERO);
    receiver.greet().await.unwrap();
    assert_eq!(transport.lines(), vec!["FakeGrbl 0.1", ""]);
}

#[tokio::test]
async fn test_move_and_status_session() {
    let (mut receiver, transport) = start(Duration::ZERO);
    receiver.greet().await.unwrap();
    transport.push_input("G21\nG1 X10 Y5\n");
    pump_until(&mut receiver, &transport, |lines| lines.len() >= 4).await;
    assert_eq!(&transport.lines()[2..], ["ok", "ok"]);

    assert_eq!(idle_status(&mut receiver, &transport).await, "<Idle|MPos:10,5,0|FS:0,0>");
}

#[tokio::test]
async fn test_spindle_session() {
    let (mut receiver, transport) = start(Duration::ZERO);
    transport.push_input("M3 S1000\n");
    pump_until(&mut receiver, &transport, |lines| !lines.is_empty()).await;
    assert_eq!(transport.lines(), vec!["ok"]);
    assert_eq!(idle_status(&mut receiver, &transport).await, "<Idle|MPos:0,0,0|FS:0,1000>");
}

#[tokio::test]
async fn test_invalid_line_answers_error() {
    let (mut receiver, transport) = start(Duration::ZERO);
    transport.push_input("G1 X10 foo\n\n   \nG20\n");
    pump_until(&mut receiver, &transport, |lines| lines.len() >= 2).await;
    assert_eq!(transport.lines(), vec!["error", "ok"]);
}

#[tokio::test]
async fn test_status_inside_a_line() {
    let (mut receiver, transport) = start(Duration::from_secs(60));
    transport.push_input("G1 X?3\n");
    pump_until(&mut receiver, &transport, |lines| lines.len() >= 2).await;
    let lines = transport.lines();
    assert!(lines[0].starts_with("<Idle|"), "got {:?}", lines);
    assert_eq!(lines[1], "ok");
}

#[tokio::test]
async fn test_status_after_line_follows_its_ok() {
    let (mut receiver, transport) = start(Duration::from_secs(60));
    transport.push_input("G1 X10\n?");
    pump_until(&mut receiver, &transport, |lines| lines.len() >= 2).await;
    let lines = transport.lines();
    assert_eq!(lines[0], "ok");
    assert!(lines[1].starts_with("<Run|"), "got {:?}", lines);
}

#[tokio::test]
async fn test_soft_reset_session() {
    let (mut receiver, transport) = start(Duration::ZERO);
    transport.push_input("G0 X4 Z2\nM3 S200\n");
    pump_until(&mut receiver, &transport, |lines| lines.len() >= 2).await;
    assert_eq!(idle_status(&mut receiver, &transport).await, "<Idle|MPos:4,0,2|FS:0,200>");

    transport.push_input([0x18u8]);
    assert_eq!(idle_status(&mut receiver, &transport).await, "<Idle|MPos:0,0,0|FS:0,0>");
}

#[tokio::test]
async fn test_closed_transport_ends_run() {
    let (mut receiver, transport) = start(Duration::ZERO);
    transport.push_input("G21\n");
    transport.close();
    let result = timeout(Duration::from_secs(5), receiver.run()).await.unwrap();
    assert!(matches!(
        result,
        Err(ReceiverError::Transport(TransportError::Disconnected))
    ));
}

async fn read_line(reader: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out reading from socket")
        .unwrap();
    line.trim_end_matches('\n').to_string()
}

#[tokio::test]
async fn test_tcp_clients_are_served_in_turn() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (frontend, channels) = channel_pair();
    let worker = Worker::new(channels, WorkerConfig { move_delay: Duration::ZERO, idle_sleep: IDLE }).spawn();
    let server = tokio::spawn(tcp::serve(listener, frontend, IDLE));

    let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
    assert_eq!(read_line(&mut client).await, "FakeGrbl 0.1");
    assert_eq!(read_line(&mut client).await, "");
    client.get_mut().write_all(b"G1 X2\nbogus\n").await.unwrap();
    assert_eq!(read_line(&mut client).await, "ok");
    assert_eq!(read_line(&mut client).await, "error");
    drop(client);

    let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
    assert_eq!(read_line(&mut client).await, "FakeGrbl 0.1");
    assert_eq!(read_line(&mut client).await, "");
    loop {
        client.get_mut().write_all(b"?").await.unwrap();
        let status = read_line(&mut client).await;
        if status.starts_with("<Idle") {
            // Machine state survives the reconnect.
            assert_eq!(status, "<Idle|MPos:2,0,0|FS:0,0>");
            break;
        }
    }

    server.abort();
    worker.abort();
}
