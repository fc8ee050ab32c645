use std::io::Write;

use base64::{engine::general_purpose::STANDARD, Engine};
use missive::message::{Error, Mailbox, Message};
use pretty_assertions::assert_eq;

fn basic() -> Message {
    let mut m = Message::new();
    m.set_sender("a@x.com")
        .set_to(["b@x.com"])
        .set_subject("S")
        .set_date("Tue, 15 Nov 1994 08:12:31 -0000")
        .set_user_agent("test-agent")
        .set_plain_body("hi");
    m
}

fn render(m: &Message) -> String {
    String::from_utf8(m.formatted().unwrap()).unwrap()
}

fn boundary_of(rendered: &str) -> &str {
    let start = rendered.find("boundary=\"").unwrap() + "boundary=\"".len();
    let end = start + rendered[start..].find('"').unwrap();
    &rendered[start..end]
}

fn message_id_of(rendered: &str) -> &str {
    rendered
        .lines()
        .find_map(|line| line.strip_prefix("MESSAGE-ID: "))
        .unwrap()
}

#[test]
fn plain_message_layout() {
    let rendered = render(&basic());
    let boundary = boundary_of(&rendered);
    let message_id = message_id_of(&rendered);

    let expected = format!(
        "MESSAGE-ID: {message_id}\r\n\
         FROM: <a@x.com>\r\n\
         TO: <b@x.com>\r\n\
         SUBJECT: S\r\n\
         DATE: Tue, 15 Nov 1994 08:12:31 -0000\r\n\
         MIME-VERSION: 1.0\r\n\
         USER-AGENT: test-agent\r\n\
         Content-Type: multipart/mixed;\r\n boundary=\"{boundary}\"\r\n\
         \r\n\
         --{boundary}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         aGk=\r\n\
         --{boundary}--\r\n"
    );
    assert_eq!(rendered, expected);
    assert!(boundary.len() <= 70);
    assert!(message_id.starts_with('<') && message_id.ends_with('>'));
}

#[test]
fn every_write_uses_fresh_tokens() {
    let m = basic();
    let first = render(&m);
    let second = render(&m);
    assert_ne!(boundary_of(&first), boundary_of(&second));
    assert_ne!(message_id_of(&first), message_id_of(&second));
}

#[test]
fn write_to_reports_bytes_written() {
    let mut out = Vec::new();
    let n = basic().write_to(&mut out).unwrap();
    assert_eq!(n, out.len() as u64);
}

#[test]
fn composition_errors() {
    let mut m = basic();
    m.set_sender("");
    assert!(matches!(m.formatted(), Err(Error::MissingFrom)));

    let mut m = basic();
    m.set_to(Vec::<String>::new());
    assert!(matches!(m.formatted(), Err(Error::MissingRecipients)));

    let mut m = basic();
    m.set_subject("");
    assert!(matches!(m.formatted(), Err(Error::MissingSubject)));

    let mut m = basic();
    m.set_to(["b@x.com\r\nBCC: c@x.com"]);
    assert!(matches!(m.formatted(), Err(Error::InvalidAddress(_))));
}

#[test]
fn bcc_only_recipients_are_enough() {
    let mut m = basic();
    m.set_to(Vec::<String>::new()).set_bcc(["hidden@x.com"]);
    let rendered = render(&m);
    assert!(!rendered.contains("hidden@x.com"));
    assert_eq!(
        m.envelope_recipients(),
        vec![&Mailbox::address("hidden@x.com")]
    );
}

#[test]
fn reserved_headers_cannot_be_overridden() {
    let mut m = basic();
    m.add_header("Subject", ["injected"])
        .add_header("message-id", ["<forged@x.com>"])
        .add_header("X-Mailer-Id", ["42"]);
    let rendered = render(&m);
    assert!(!rendered.contains("injected"));
    assert!(!rendered.contains("forged"));
    assert!(rendered.contains("\r\nX-MAILER-ID: 42\r\n"));
}

#[test]
fn non_ascii_subject_is_encoded() {
    let mut m = basic();
    m.set_subject("Grüße");
    let rendered = render(&m);
    assert!(rendered.contains("\r\nSUBJECT: =?utf-8?b?R3LDvMOfZQ==?=\r\n"));
}

#[test]
fn files_follow_body_parts() {
    let mut m = basic();
    m.add_html_body("<b>hi</b>")
        .attach_bytes("report.pdf", b"%PDF".to_vec())
        .embed_bytes("logo.png", vec![0x89, b'P', b'N', b'G']);
    let rendered = render(&m);
    let boundary = boundary_of(&rendered);

    let sections: Vec<&str> = rendered.split(&format!("--{boundary}")).collect();
    // preamble, two parts, two files, closing
    assert_eq!(sections.len(), 6);
    assert!(sections[1].contains("Content-Type: text/plain; charset=utf-8"));
    assert!(sections[2].contains("Content-Type: text/html; charset=utf-8"));

    assert!(sections[3].contains("Content-Type: application/pdf; name=\"report.pdf\"\r\n"));
    assert!(sections[3].contains("Content-Disposition: attachment; filename=\"report.pdf\"\r\n"));
    assert!(!sections[3].contains("Content-ID"));
    assert!(sections[3].contains(&STANDARD.encode(b"%PDF")));

    assert!(sections[4].contains("Content-Type: image/png; name=\"logo.png\"\r\n"));
    assert!(sections[4].contains("Content-Disposition: inline; filename=\"logo.png\"\r\n"));
    assert!(sections[4].contains("Content-ID: <logo.png>\r\n"));
    assert_eq!(sections[5], "--\r\n");
}

#[test]
fn long_bodies_wrap_at_76() {
    let mut m = basic();
    m.set_copier_body("text/plain", |w: &mut dyn Write| {
        let line = [b'x'; 1000];
        w.write_all(&line)?;
        Ok(line.len())
    });
    let rendered = render(&m);
    for line in rendered.split("\r\n") {
        assert!(line.len() <= 76, "{line:?}");
    }
}

#[test]
fn attach_path_reads_at_write_time() {
    let dir = std::env::temp_dir().join(format!("missive-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("notes.txt");

    let mut m = basic();
    m.attach_path(&path);
    // Missing file only fails once written
    assert!(matches!(m.formatted(), Err(Error::Io(_))));

    std::fs::write(&path, "remember").unwrap();
    let rendered = render(&m);
    assert!(rendered.contains("Content-Type: text/plain; name=\"notes.txt\"\r\n"));
    assert!(rendered.contains(&STANDARD.encode("remember")));

    std::fs::remove_dir_all(&dir).unwrap();
}
