//! Scripted in-memory stream for session tests

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use super::{Connector, SmtpStream, TlsParameters};
use crate::transport::smtp::{error, Error};

/// Replays canned server replies, one per read, and records what the
/// client writes
///
/// Clones share the script and the record, so a test keeps a handle on
/// a stream it gave away.
#[derive(Clone, Debug)]
pub(crate) struct MockStream {
    replies: Arc<Mutex<VecDeque<Vec<u8>>>>,
    written: Arc<Mutex<Vec<u8>>>,
    encrypted: bool,
}

impl MockStream {
    pub(crate) fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            replies: Arc::new(Mutex::new(
                replies.into_iter().map(|r| r.as_ref().to_vec()).collect(),
            )),
            written: Arc::new(Mutex::new(Vec::new())),
            encrypted: false,
        }
    }

    /// Everything written so far
    pub(crate) fn written(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).into_owned()
    }

    pub(crate) fn clear_written(&self) {
        self.written.lock().unwrap().clear();
    }

    /// Replies not consumed yet
    pub(crate) fn pending(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    /// Number of live handles on this stream, including this one
    pub(crate) fn handles(&self) -> usize {
        Arc::strong_count(&self.written)
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut replies = self.replies.lock().unwrap();
        let Some(mut reply) = replies.pop_front() else {
            return Ok(0);
        };
        let n = reply.len().min(buf.len());
        buf[..n].copy_from_slice(&reply[..n]);
        if n < reply.len() {
            replies.push_front(reply.split_off(n));
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SmtpStream for MockStream {
    fn is_encrypted(&self) -> bool {
        self.encrypted
    }
}

/// Hands out one scripted stream
#[derive(Debug)]
pub(crate) struct MockConnector {
    pub(crate) stream: MockStream,
    pub(crate) fail_connect: bool,
    pub(crate) fail_tls: bool,
    pub(crate) connects: AtomicUsize,
    pub(crate) upgrades: AtomicUsize,
}

impl MockConnector {
    pub(crate) fn new(stream: MockStream) -> Self {
        Self {
            stream,
            fail_connect: false,
            fail_tls: false,
            connects: AtomicUsize::new(0),
            upgrades: AtomicUsize::new(0),
        }
    }
}

impl Connector for MockConnector {
    type Stream = MockStream;

    fn connect(
        &self,
        _host: &str,
        _port: u16,
        _timeout: Option<Duration>,
    ) -> Result<MockStream, Error> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(error::connection(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(self.stream.clone())
    }

    fn upgrade_tls(
        &self,
        mut stream: MockStream,
        _tls_parameters: &TlsParameters,
    ) -> Result<MockStream, Error> {
        self.upgrades.fetch_add(1, Ordering::SeqCst);
        if self.fail_tls {
            return Err(error::tls("handshake failure"));
        }
        stream.encrypted = true;
        Ok(stream)
    }
}
