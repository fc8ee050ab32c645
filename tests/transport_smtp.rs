use std::{
    io::{BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    thread::{self, JoinHandle},
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine};
use missive::{
    message::Message,
    transport::smtp::{authentication::Credentials, extension::ClientId, Dialer},
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Single-session SMTP server on loopback, returning the lines it received
fn fake_server(capabilities: &'static [&'static str]) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        serve(stream, capabilities)
    });
    (port, handle)
}

fn serve(stream: TcpStream, capabilities: &[&str]) -> Vec<String> {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    let mut received = Vec::new();

    writer.write_all(b"220 fake.test ESMTP\r\n").unwrap();

    let mut in_data = false;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).unwrap() == 0 {
            break;
        }
        received.push(line.clone());

        if in_data {
            if line == ".\r\n" {
                in_data = false;
                writer.write_all(b"250 2.0.0 queued\r\n").unwrap();
            }
            continue;
        }

        let verb = line
            .split(|c: char| c == ' ' || c == '\r')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        let reply = match verb.as_str() {
            "EHLO" => {
                let mut reply = String::from("250-fake.test\r\n");
                for (i, capability) in capabilities.iter().enumerate() {
                    let sep = if i + 1 == capabilities.len() { ' ' } else { '-' };
                    reply.push_str(&format!("250{sep}{capability}\r\n"));
                }
                if capabilities.is_empty() {
                    reply = String::from("250 fake.test\r\n");
                }
                reply
            }
            "AUTH" if line.starts_with("AUTH LOGIN") => {
                "334 VXNlcm5hbWU6\r\n".to_owned()
            }
            "MAIL" | "RCPT" | "RSET" | "NOOP" => "250 2.1.0 Ok\r\n".to_owned(),
            "DATA" => {
                in_data = true;
                "354 End data with <CR><LF>.<CR><LF>\r\n".to_owned()
            }
            "QUIT" => {
                writer.write_all(b"221 2.0.0 Bye\r\n").unwrap();
                break;
            }
            _ => match received.len() {
                // Username, then password, of an AUTH LOGIN exchange
                n if received[n - 2].starts_with("AUTH LOGIN") => "334 UGFzc3dvcmQ6\r\n".to_owned(),
                _ => "235 2.7.0 Authentication successful\r\n".to_owned(),
            },
        };
        writer.write_all(reply.as_bytes()).unwrap();
    }
    received
}

fn dialer(port: u16) -> Dialer {
    Dialer::new("127.0.0.1", port)
        .hello_name(ClientId::Domain("client.test".to_owned()))
        .timeout(Some(Duration::from_secs(5)))
}

fn message() -> Message {
    let mut m = Message::new();
    m.set_sender("user@localhost")
        .set_to(["root@localhost"])
        .set_subject("Hello")
        .set_plain_body("Hello ß☺ example\r\n.\r\nnot the end");
    m
}

#[test]
fn smtp_transport_simple() {
    init_tracing();
    let (port, server) = fake_server(&["8BITMIME"]);

    let response = dialer(port).dial_and_send(&message()).unwrap();
    assert!(response.has_code(250));

    let received = server.join().unwrap();
    assert_eq!(received[0], "EHLO client.test\r\n");
    assert_eq!(received[1], "MAIL FROM:<user@localhost>\r\n");
    assert_eq!(received[2], "RCPT TO:<root@localhost>\r\n");
    assert_eq!(received[3], "DATA\r\n");
    assert!(received[4].starts_with("MESSAGE-ID: <"));
    assert_eq!(received[received.len() - 2], ".\r\n");
    assert_eq!(received[received.len() - 1], "QUIT\r\n");
}

#[test]
fn smtp_transport_login_on_loopback() {
    init_tracing();
    let (port, server) = fake_server(&["AUTH LOGIN"]);

    let mut m = message();
    m.set_sender("");
    dialer(port)
        .credentials(Credentials::new("alice".to_owned(), "wonderland".to_owned()))
        .dial_and_send(&m)
        .unwrap();

    let received = server.join().unwrap();
    assert_eq!(received[1], "AUTH LOGIN\r\n");
    assert_eq!(received[2], format!("{}\r\n", STANDARD.encode("alice")));
    assert_eq!(received[3], format!("{}\r\n", STANDARD.encode("wonderland")));
    assert_eq!(received[4], "MAIL FROM:<alice>\r\n");
}

#[test]
fn smtp_transport_reuses_session() {
    init_tracing();
    let (port, server) = fake_server(&[]);

    let mut sender = dialer(port).dial().unwrap();
    assert!(!sender.is_encrypted());
    sender.send(&message()).unwrap();
    sender.reset().unwrap();
    assert!(sender.test_connected());
    sender.send(&message()).unwrap();
    sender.close().unwrap();

    let received = server.join().unwrap();
    let commands: Vec<&str> = received
        .iter()
        .map(String::as_str)
        .filter(|line| {
            ["EHLO", "MAIL", "RCPT", "DATA", "RSET", "NOOP", "QUIT"]
                .iter()
                .any(|verb| line.starts_with(verb))
        })
        .collect();
    assert_eq!(
        commands,
        [
            "EHLO client.test\r\n",
            "MAIL FROM:<user@localhost>\r\n",
            "RCPT TO:<root@localhost>\r\n",
            "DATA\r\n",
            "RSET\r\n",
            "NOOP\r\n",
            "MAIL FROM:<user@localhost>\r\n",
            "RCPT TO:<root@localhost>\r\n",
            "DATA\r\n",
            "QUIT\r\n",
        ]
    );
}

#[test]
fn smtp_transport_unreadable_attachment_returns_promptly() {
    init_tracing();
    let (port, server) = fake_server(&[]);

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut m = message();
        m.attach_path("/nonexistent/missive/report.pdf");
        let _ = tx.send(dialer(port).dial_and_send(&m));
    });

    // The server is still reading message data, so no QUIT may be awaited
    let result = rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert!(result.unwrap_err().is_network());

    let received = server.join().unwrap();
    assert!(received.iter().all(|line| line != "QUIT\r\n"));
    assert!(received.iter().all(|line| line != ".\r\n"));
}

#[test]
fn smtp_transport_connection_refused() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = dialer(port).dial().unwrap_err();
    assert!(err.is_connection());
}
