//! FastCGI client: one request at a time over a TCP or unix-domain socket.

use std::future::Future;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::FastCgiError;
use crate::params::{encode_params, Params};
use crate::record::{
    stream_records, EndRequest, ProtocolStatus, Record, RecordCodec, RecordType,
    MAX_CONTENT_LENGTH, REQUEST_ID,
};

/// Any byte stream the client can frame records over
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

type Transport = Framed<Box<dyn Io>, RecordCodec>;

/// Connection behaviour, fixed at construction
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bound on connect, every write and every read
    pub read_write_timeout: Duration,
    /// Ask the server to keep the connection open after END_REQUEST and
    /// reuse it for the next request
    pub keep_alive: bool,
    /// Largest record content accepted from the server
    pub max_record_content: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            read_write_timeout: Duration::from_secs(60),
            keep_alive: true,
            max_record_content: MAX_CONTENT_LENGTH,
        }
    }
}

/// Demultiplexed reply to one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastCgiResponse {
    /// From the CGI `Status` header, 200 when absent
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    /// STDOUT after the CGI header block
    pub body: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Application exit status from END_REQUEST
    pub app_status: u32,
}

pub struct FastCgiClient {
    endpoint: Endpoint,
    options: ClientOptions,
    transport: Option<Transport>,
}

impl FastCgiClient {
    pub fn new(endpoint: Endpoint, options: ClientOptions) -> Self {
        Self {
            endpoint,
            options,
            transport: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Drop the current connection; the next request reconnects
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!(endpoint = %self.endpoint, "Closed connection");
        }
    }

    /// Send one request and collect the reply
    ///
    /// The connection is dropped after any error, and after success when
    /// `keep_alive` is off. A kept connection lives until `close` or drop.
    ///
    /// # Errors
    /// - FastCgiError::Connect / Timeout / Io / Closed for transport faults
    /// - FastCgiError::Malformed / Rejected for protocol faults
    pub async fn request(
        &mut self,
        params: &Params,
        stdin: &[u8],
    ) -> Result<FastCgiResponse, FastCgiError> {
        let result = self.exchange(params, stdin).await;

        if result.is_err() || !self.options.keep_alive {
            self.close();
        }
        result
    }

    async fn exchange(
        &mut self,
        params: &Params,
        stdin: &[u8],
    ) -> Result<FastCgiResponse, FastCgiError> {
        let deadline = self.options.read_write_timeout;
        let records = build_request(params, stdin, self.options.keep_alive)?;
        let transport = self.connect().await?;

        for record in records {
            bounded(deadline, transport.feed(record)).await?;
        }
        bounded(deadline, transport.flush()).await?;
        trace!("Request sent");

        read_response(transport, deadline).await
    }

    async fn connect(&mut self) -> Result<&mut Transport, FastCgiError> {
        if self.transport.is_none() {
            let io = open(&self.endpoint, self.options.read_write_timeout).await?;
            debug!(endpoint = %self.endpoint, "Connected");
            let codec = RecordCodec::with_max_content_length(self.options.max_record_content);
            self.transport = Some(Framed::new(io, codec));
        }

        self.transport
            .as_mut()
            .ok_or(FastCgiError::Closed)
    }
}

async fn open(endpoint: &Endpoint, deadline: Duration) -> Result<Box<dyn Io>, FastCgiError> {
    let connect_error = |source| FastCgiError::Connect {
        endpoint: endpoint.to_string(),
        source,
    };

    match endpoint {
        Endpoint::Tcp { host, port } => {
            let stream = bounded(deadline, async {
                TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(connect_error)
            })
            .await?;
            stream.set_nodelay(true).map_err(connect_error)?;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let stream = bounded(deadline, async {
                tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(connect_error)
            })
            .await?;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        Endpoint::Unix(path) => Err(connect_error(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("unix sockets are not supported here: {}", path.display()),
        ))),
    }
}

/// Apply the read/write deadline to one socket operation
async fn bounded<T, E>(
    deadline: Duration,
    op: impl Future<Output = Result<T, E>>,
) -> Result<T, FastCgiError>
where
    FastCgiError: From<E>,
{
    match tokio::time::timeout(deadline, op).await {
        Ok(result) => result.map_err(FastCgiError::from),
        Err(_) => Err(FastCgiError::Timeout(deadline)),
    }
}

/// BEGIN_REQUEST, the PARAMS stream, the STDIN stream
pub fn build_request(
    params: &Params,
    stdin: &[u8],
    keep_alive: bool,
) -> Result<Vec<Record>, FastCgiError> {
    let encoded = encode_params(params)?;

    let mut records = vec![Record::begin_request(REQUEST_ID, keep_alive)];
    records.extend(stream_records(RecordType::Params, REQUEST_ID, &encoded));
    records.extend(stream_records(RecordType::Stdin, REQUEST_ID, stdin));
    Ok(records)
}

async fn read_response(
    transport: &mut Transport,
    deadline: Duration,
) -> Result<FastCgiResponse, FastCgiError> {
    let mut stdout = StreamBuffer::new("STDOUT");
    let mut stderr = StreamBuffer::new("STDERR");

    loop {
        let record = match tokio::time::timeout(deadline, transport.next()).await {
            Err(_) => return Err(FastCgiError::Timeout(deadline)),
            Ok(None) => return Err(FastCgiError::Closed),
            Ok(Some(record)) => record?,
        };

        if record.request_id != REQUEST_ID {
            return Err(FastCgiError::Malformed(format!(
                "record for request {} while waiting on request {}",
                record.request_id, REQUEST_ID
            )));
        }

        match record.record_type {
            RecordType::Stdout => stdout.push(&record)?,
            RecordType::Stderr => stderr.push(&record)?,
            RecordType::EndRequest => {
                let end = EndRequest::parse(&record.content)?;
                if end.protocol_status != ProtocolStatus::RequestComplete {
                    return Err(FastCgiError::Rejected(end.protocol_status));
                }
                trace!(app_status = end.app_status, "Request ended");
                return FastCgiResponse::from_streams(stdout.data, stderr.data, end.app_status);
            }
            other => {
                return Err(FastCgiError::Malformed(format!(
                    "unexpected {:?} record in response",
                    other
                )))
            }
        }
    }
}

struct StreamBuffer {
    name: &'static str,
    data: Vec<u8>,
    closed: bool,
}

impl StreamBuffer {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            data: Vec::new(),
            closed: false,
        }
    }

    fn push(&mut self, record: &Record) -> Result<(), FastCgiError> {
        if self.closed {
            return Err(FastCgiError::Malformed(format!(
                "{} data after end of stream",
                self.name
            )));
        }
        if record.is_end_of_stream() {
            self.closed = true;
        } else {
            self.data.extend_from_slice(&record.content);
        }
        Ok(())
    }
}

impl FastCgiResponse {
    /// Split the CGI header block off STDOUT
    pub fn from_streams(
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        app_status: u32,
    ) -> Result<Self, FastCgiError> {
        let (headers, body) = split_headers(stdout);

        let status_code = match headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("Status"))
        {
            Some((_, value)) => parse_status(value)?,
            None => 200,
        };

        Ok(Self {
            status_code,
            headers,
            body,
            stderr,
            app_status,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn parse_status(value: &str) -> Result<u16, FastCgiError> {
    value
        .split_whitespace()
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| FastCgiError::Malformed(format!("invalid Status header `{}`", value)))
}

/// Header block only counts when every line before the blank line is a
/// `Name: value` header; otherwise the whole output is body.
fn split_headers(stdout: Vec<u8>) -> (Vec<(String, String)>, Vec<u8>) {
    const BOUNDARY: &[u8] = b"\r\n\r\n";

    let Some(pos) = stdout.windows(BOUNDARY.len()).position(|w| w == BOUNDARY) else {
        return (Vec::new(), stdout);
    };

    match parse_header_block(&stdout[..pos]) {
        Some(headers) => (headers, stdout[pos + BOUNDARY.len()..].to_vec()),
        None => (Vec::new(), stdout),
    }
}

fn parse_header_block(block: &[u8]) -> Option<Vec<(String, String)>> {
    let block = std::str::from_utf8(block).ok()?;

    block
        .split("\r\n")
        .map(|line| {
            let (name, value) = line.split_once(':')?;
            is_token(name).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
