//! End-to-end checks through the public `open`/`Connector` entry points.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use line_transport::{
    open, Connector, ProcessConfig, ReadOutcome, TcpConfig, TransportConfig, TransportError,
};
use rstest::rstest;

fn read_line_within(transport: &dyn line_transport::Transport, timeout: Duration) -> ReadOutcome {
    let deadline = Instant::now() + timeout;
    loop {
        match transport.read_line().unwrap() {
            ReadOutcome::Idle if Instant::now() < deadline => continue,
            other => return other,
        }
    }
}

#[test]
fn test_tcp_connector_opens_fresh_connections() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        for greeting in ["first", "second"] {
            let (mut socket, _) = listener.accept().unwrap();
            writeln!(socket, "{greeting}").unwrap();
            let mut reply = String::new();
            BufReader::new(socket).read_line(&mut reply).unwrap();
            assert_eq!(reply, "ack\n");
        }
    });

    let connector = TransportConfig::Tcp(TcpConfig::new("127.0.0.1", port));
    assert_eq!(connector.describe(), format!("127.0.0.1:{port}"));

    for expected in ["first", "second"] {
        let transport = connector.connect().unwrap();
        assert_eq!(
            read_line_within(transport.as_ref(), Duration::from_secs(5)),
            ReadOutcome::Line(expected.to_string())
        );
        transport.write_line("ack").unwrap();
        transport.close();
    }

    server.join().unwrap();
}

#[rstest]
#[case::absolute("/nonexistent/dir/cec-client")]
#[case::relative("./nonexistent-cec-client")]
#[case::bare("nonexistent-cec-client-binary")]
fn test_missing_program_is_an_open_failure(#[case] program: &str) {
    let config = TransportConfig::Process(ProcessConfig::new(program).with_arg("--log-level"));
    match open(&config) {
        Err(TransportError::NotFound(path)) => assert_eq!(path, PathBuf::from(program)),
        Err(other) => panic!("expected NotFound, got {other}"),
        Ok(_) => panic!("expected NotFound for {program}"),
    }
}

#[test]
fn test_process_describe_includes_arguments() {
    let connector = TransportConfig::Process(
        ProcessConfig::new("/usr/bin/cec-client").with_args(["--log-level", "1", "RPI"]),
    );
    assert_eq!(connector.describe(), "/usr/bin/cec-client --log-level 1 RPI");
}

#[cfg(unix)]
#[test]
fn test_process_transport_reports_exit() {
    let config = TransportConfig::Process(
        ProcessConfig::new("/bin/sh").with_args(["-c", "echo 'waiting for input'"]),
    );
    let transport = open(&config).unwrap();

    assert_eq!(
        read_line_within(transport.as_ref(), Duration::from_secs(5)),
        ReadOutcome::Line("waiting for input".to_string())
    );
    assert_eq!(
        read_line_within(transport.as_ref(), Duration::from_secs(5)),
        ReadOutcome::EndOfStream
    );

    let deadline = Instant::now() + Duration::from_secs(5);
    while transport.is_alive() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(!transport.is_alive());
}
