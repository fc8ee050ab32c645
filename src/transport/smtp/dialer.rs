use std::{borrow::Cow, time::Duration};

use super::{
    authentication::{Authenticator, Credentials, ServerIdentity},
    client::{Connector, NetConnector, SmtpConnection, TlsParameters},
    error::Error,
    extension::ClientId,
    response::Response,
    sender::Sender,
    DEFAULT_TIMEOUT, SUBMISSIONS_PORT, SUBMISSION_PORT,
};
use crate::message::{Mailbox, Message};

/// Opens authenticated SMTP sessions to one server
///
/// Each [`Dialer::dial`] opens an independent connection, so a dialer can
/// be shared between workers that each hold their own [`Sender`].
///
/// ```rust,no_run
/// use missive::{message::Message, transport::smtp::Dialer};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut email = Message::new();
/// email
///     .set_sender("nobody@domain.tld")
///     .set_to(["hei@domain.tld"])
///     .set_subject("Happy new year")
///     .set_plain_body("Be happy!");
///
/// let dialer = Dialer::relay("smtp.domain.tld").credentials(("nobody", "password").into());
/// dialer.dial_and_send(&email)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Dialer<C = NetConnector> {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    ssl_on_connect: bool,
    tls_parameters: Option<TlsParameters>,
    timeout: Option<Duration>,
    hello_name: ClientId,
    connector: C,
}

impl Dialer<NetConnector> {
    /// Creates a dialer for `host:port`
    ///
    /// The session starts in plaintext and is upgraded with STARTTLS when
    /// the server offers it.
    pub fn new<T: Into<String>>(host: T, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
            ssl_on_connect: false,
            tls_parameters: None,
            timeout: Some(DEFAULT_TIMEOUT),
            hello_name: ClientId::default(),
            connector: NetConnector,
        }
    }

    /// Creates a dialer using implicit TLS on the submissions port (465)
    pub fn relay<T: Into<String>>(host: T) -> Self {
        Self::new(host, SUBMISSIONS_PORT).ssl_on_connect(true)
    }

    /// Creates a dialer using STARTTLS on the submission port (587)
    pub fn starttls_relay<T: Into<String>>(host: T) -> Self {
        Self::new(host, SUBMISSION_PORT)
    }
}

impl<C: Connector> Dialer<C> {
    /// Replaces the transport factory
    pub fn with_connector<D: Connector>(self, connector: D) -> Dialer<D> {
        Dialer {
            host: self.host,
            port: self.port,
            credentials: self.credentials,
            ssl_on_connect: self.ssl_on_connect,
            tls_parameters: self.tls_parameters,
            timeout: self.timeout,
            hello_name: self.hello_name,
            connector,
        }
    }

    /// Set the port to use
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the authentication credentials to use
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Perform the TLS handshake before any SMTP exchange
    pub fn ssl_on_connect(mut self, ssl_on_connect: bool) -> Self {
        self.ssl_on_connect = ssl_on_connect;
        self
    }

    /// Set the TLS settings to use
    ///
    /// Defaults to the system trust store, verifying the configured host.
    pub fn tls_parameters(mut self, tls_parameters: TlsParameters) -> Self {
        self.tls_parameters = Some(tls_parameters);
        self
    }

    /// Set the connect timeout
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the name used during EHLO
    pub fn hello_name(mut self, name: ClientId) -> Self {
        self.hello_name = name;
        self
    }

    /// The configured host
    pub fn host(&self) -> &str {
        &self.host
    }

    fn tls(&self) -> Result<Cow<'_, TlsParameters>, Error> {
        match self.tls_parameters {
            Some(ref tls_parameters) => Ok(Cow::Borrowed(tls_parameters)),
            None => TlsParameters::new(self.host.clone()).map(Cow::Owned),
        }
    }

    /// Opens a session: connects, settles TLS, then authenticates when
    /// credentials are set
    ///
    /// On error, the connection is closed before returning.
    pub fn dial(&self) -> Result<Sender<C::Stream>, Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!("connecting to {}:{}", self.host, self.port);

        let mut stream = self.connector.connect(&self.host, self.port, self.timeout)?;

        let mut tls_domain = None;
        if self.ssl_on_connect {
            let tls_parameters = self.tls()?;
            stream = self.connector.upgrade_tls(stream, &tls_parameters)?;
            tls_domain = Some(tls_parameters.domain().to_owned());
        }

        let mut conn = SmtpConnection::connect(stream, &self.hello_name)?;

        if conn.can_starttls() {
            let tls_parameters = self.tls()?;
            conn = conn.starttls(&self.connector, &tls_parameters, &self.hello_name)?;
            tls_domain = Some(tls_parameters.domain().to_owned());

            #[cfg(feature = "tracing")]
            tracing::debug!("server {}", conn.server_info());
        }

        if let Some(ref credentials) = self.credentials {
            let authenticator = Authenticator::select(
                conn.server_info().auth(),
                credentials.clone(),
                self.host.clone(),
            )?;
            let encrypted = conn.is_encrypted();
            let name = match tls_domain {
                Some(ref domain) if encrypted => domain.as_str(),
                _ => self.host.as_str(),
            };
            conn.auth(
                &authenticator,
                &ServerIdentity {
                    tls: encrypted,
                    name,
                },
            )?;
        }

        let identity = self
            .credentials
            .as_ref()
            .map(|credentials| Mailbox::address(credentials.username()));
        Ok(Sender::new(conn, identity))
    }

    /// Dials, sends `message`, then closes the session
    ///
    /// A send error is returned in preference to a close error.
    pub fn dial_and_send(&self, message: &Message) -> Result<Response, Error> {
        let mut sender = self.dial()?;
        let sent = sender.send(message);
        let closed = sender.close();
        let response = sent?;
        closed?;
        Ok(response)
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;

    use super::Dialer;
    use crate::{
        message::Message,
        transport::smtp::{
            client::{
                mock::{MockConnector, MockStream},
                TlsParameters,
            },
            extension::ClientId,
        },
    };

    const GREETING: &str = "220 smtp.example.org ESMTP\r\n";

    fn dialer(host: &str, connector: MockConnector) -> Dialer<MockConnector> {
        Dialer::new(host, 587)
            .hello_name(ClientId::Domain("client.test".to_owned()))
            .with_connector(connector)
    }

    fn message() -> Message {
        let mut m = Message::new();
        m.set_to(["bob@example.org"])
            .set_subject("S")
            .set_plain_body("hi");
        m
    }

    #[test]
    fn plaintext_without_starttls() {
        let stream = MockStream::new([GREETING, "250 smtp.example.org\r\n"]);
        let connector = MockConnector::new(stream.clone());
        let sender = dialer("smtp.example.org", connector).dial().unwrap();
        assert!(!sender.is_encrypted());
        assert_eq!(stream.written(), "EHLO client.test\r\n");
    }

    #[test]
    fn starttls_upgrade_discards_buffered_plaintext() {
        let stream = MockStream::new([
            GREETING,
            "250-smtp.example.org\r\n250 STARTTLS\r\n",
            // Injected after the STARTTLS reply, before the handshake
            "220 ready\r\n250 injected\r\n",
            "250-smtp.example.org\r\n250 AUTH PLAIN\r\n",
        ]);
        let connector = MockConnector::new(stream.clone());
        let sender = dialer("smtp.example.org", connector).dial().unwrap();

        assert!(sender.is_encrypted());
        assert_eq!(sender.server_info().auth(), Some("PLAIN"));
        assert_eq!(
            stream.written(),
            "EHLO client.test\r\nSTARTTLS\r\nEHLO client.test\r\n"
        );
    }

    #[test]
    fn implicit_tls_then_plain_auth() {
        let stream = MockStream::new([
            GREETING,
            "250-smtp.example.org\r\n250 AUTH LOGIN PLAIN\r\n",
            "235 2.7.0 Authentication successful\r\n",
        ]);
        let connector = MockConnector::new(stream.clone());
        let sender = dialer("smtp.example.org", connector)
            .ssl_on_connect(true)
            .credentials(("alice", "wonderland").into())
            .dial()
            .unwrap();
        assert!(sender.is_encrypted());
        assert_eq!(
            stream.written(),
            "EHLO client.test\r\nAUTH PLAIN AGFsaWNlAHdvbmRlcmxhbmQ=\r\n"
        );
    }

    #[test]
    fn credentials_refused_over_plaintext() {
        let stream = MockStream::new([GREETING, "250-smtp.example.org\r\n250 AUTH LOGIN\r\n"]);
        let connector = MockConnector::new(stream.clone());
        let err = dialer("smtp.example.org", connector)
            .credentials(("alice", "wonderland").into())
            .dial()
            .unwrap_err();
        assert!(err.is_unencrypted_connection());
        assert!(!stream.written().contains("AUTH"));
        // Session and dialer are gone, only the test's handle remains
        assert_eq!(stream.handles(), 1);
    }

    #[test]
    fn credentials_bound_to_tls_domain() {
        let stream = MockStream::new([GREETING, "250-smtp.example.org\r\n250 AUTH LOGIN\r\n"]);
        let connector = MockConnector::new(stream.clone());
        let err = dialer("smtp.example.org", connector)
            .ssl_on_connect(true)
            .tls_parameters(TlsParameters::new("mx.other.test".to_owned()).unwrap())
            .credentials(("alice", "wonderland").into())
            .dial()
            .unwrap_err();
        assert!(err.is_wrong_host_name());
    }

    #[test]
    fn auth_not_supported() {
        let stream = MockStream::new([GREETING, "250 smtp.example.org\r\n"]);
        let connector = MockConnector::new(stream);
        let err = dialer("smtp.example.org", connector)
            .ssl_on_connect(true)
            .credentials(("alice", "wonderland").into())
            .dial()
            .unwrap_err();
        assert!(err.is_auth_not_supported());
    }

    #[test]
    fn no_usable_mechanism() {
        let stream = MockStream::new([GREETING, "250-smtp.example.org\r\n250 AUTH GSSAPI\r\n"]);
        let connector = MockConnector::new(stream);
        let err = dialer("smtp.example.org", connector)
            .ssl_on_connect(true)
            .credentials(("alice", "wonderland").into())
            .dial()
            .unwrap_err();
        assert!(err.is_no_mechanism());
    }

    #[test]
    fn connect_failure() {
        let mut connector = MockConnector::new(MockStream::new(Vec::<&str>::new()));
        connector.fail_connect = true;
        let err = dialer("smtp.example.org", connector).dial().unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn tls_failure_closes_connection() {
        let stream = MockStream::new([GREETING]);
        let mut connector = MockConnector::new(stream.clone());
        connector.fail_tls = true;
        let dialer = dialer("smtp.example.org", connector).ssl_on_connect(true);
        let err = dialer.dial().unwrap_err();
        assert!(err.is_tls());
        assert_eq!(stream.written(), "");
        assert_eq!(stream.pending(), 1);
        // test handle plus the connector's own
        assert_eq!(stream.handles(), 2);
        assert_eq!(dialer.connector.upgrades.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dial_and_send_uses_username_as_sender() {
        let stream = MockStream::new([
            GREETING,
            "250-smtp.example.org\r\n250 AUTH CRAM-MD5 LOGIN\r\n",
            "334 PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+\r\n",
            "235 2.7.0 Authentication successful\r\n",
            "250 2.1.0 Ok\r\n",
            "250 2.1.5 Ok\r\n",
            "354 End data with <CR><LF>.<CR><LF>\r\n",
            "250 2.0.0 Ok: queued\r\n",
            "221 2.0.0 Bye\r\n",
        ]);
        let connector = MockConnector::new(stream.clone());
        let response = dialer("smtp.example.org", connector)
            .credentials(("tim@example.org", "tanstaaftanstaaf").into())
            .dial_and_send(&message())
            .unwrap();
        assert!(response.has_code(250));

        let written = stream.written();
        assert!(written.contains("AUTH CRAM-MD5\r\n"));
        assert!(written.contains("\r\nMAIL FROM:<tim@example.org>\r\nRCPT TO:<bob@example.org>\r\nDATA\r\n"));
        assert!(written.contains("\r\nFROM: <tim@example.org>\r\n"));
        assert!(written.ends_with("\r\n.\r\nQUIT\r\n"));
        assert_eq!(stream.pending(), 0);
    }

    #[test]
    fn dial_and_send_reports_send_error_first() {
        let stream = MockStream::new([
            GREETING,
            "250 smtp.example.org\r\n",
            "550 5.7.1 sender rejected\r\n",
        ]);
        let connector = MockConnector::new(stream.clone());
        let mut m = message();
        m.set_sender("a@example.org");
        let err = dialer("smtp.example.org", connector)
            .dial_and_send(&m)
            .unwrap_err();
        assert!(err.is_permanent());
        assert!(stream.written().ends_with("QUIT\r\n"));
    }
}
