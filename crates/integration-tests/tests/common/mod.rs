//! Stub FastCGI responder built on the client's own record codec.
//!
//! Each request pops the next scripted behaviour; the last one repeats once
//! the script runs out.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::BufMut;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use cachetool_infra_fastcgi::params::decode_params;
use cachetool_infra_fastcgi::record::{
    stream_records, EndRequest, ProtocolStatus, FLAG_KEEP_CONN,
};
use cachetool_infra_fastcgi::{Record, RecordCodec, RecordType};

/// FPM-style header block in front of the snippet's output
pub const HTML_HEADERS: &str = "X-Powered-By: PHP/8.2.0\r\nContent-type: text/html; charset=UTF-8\r\n\r\n";

#[derive(Debug, Clone)]
pub enum Behaviour {
    /// CGI stdout (headers included) and stderr
    Reply { stdout: Vec<u8>, stderr: Vec<u8> },
    /// Reply, then hang up even when the client asked to keep the connection
    ReplyAndClose { stdout: Vec<u8>, stderr: Vec<u8> },
    /// Read the request, then hang up without a response
    Drop,
    /// Announce a STDOUT record longer than the client accepts
    Oversized(u16),
    /// END_REQUEST with FCGI_OVERLOADED
    Overloaded,
    /// Read the request and never answer
    Stall,
}

impl Behaviour {
    /// `200` reply with the given body
    pub fn ok(body: &str) -> Self {
        Behaviour::Reply {
            stdout: format!("{}{}", HTML_HEADERS, body).into_bytes(),
            stderr: Vec::new(),
        }
    }

    /// `200` reply, then the server drops the kept-alive connection
    pub fn ok_then_close(body: &str) -> Self {
        match Behaviour::ok(body) {
            Behaviour::Reply { stdout, stderr } => Behaviour::ReplyAndClose { stdout, stderr },
            other => other,
        }
    }

    /// Error reply as FPM sends it for a fatal error
    pub fn failed(status: u16, stderr: &str) -> Self {
        Behaviour::Reply {
            stdout: format!(
                "Status: {} Internal Server Error\r\nContent-type: text/html; charset=UTF-8\r\n\r\n",
                status
            )
            .into_bytes(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }
}

/// Script file named by one request, observed while the request was live
#[derive(Debug, Clone)]
pub struct SeenScript {
    pub path: PathBuf,
    pub existed: bool,
    pub source: String,
}

#[derive(Debug, Default)]
pub struct Stats {
    pub connections: usize,
    pub requests: usize,
    pub keep_conn_flags: Vec<bool>,
    pub scripts: Vec<SeenScript>,
}

struct Script {
    queue: VecDeque<Behaviour>,
    last: Behaviour,
}

impl Script {
    fn next(&mut self) -> Behaviour {
        match self.queue.pop_front() {
            Some(b) => {
                self.last = b.clone();
                b
            }
            None => self.last.clone(),
        }
    }
}

#[derive(Clone)]
struct Shared {
    script: Arc<Mutex<Script>>,
    stats: Arc<Mutex<Stats>>,
}

pub struct StubServer {
    endpoint: String,
    shared: Shared,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Listen on an ephemeral TCP port
    pub async fn tcp(behaviours: impl IntoIterator<Item = Behaviour>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let shared = Shared::new(behaviours);

        let accept = shared.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(accept.clone().serve(stream));
            }
        });

        Self {
            endpoint: addr.to_string(),
            shared,
            handle,
        }
    }

    /// Listen on a unix-domain socket at `path`
    #[cfg(unix)]
    pub async fn unix(path: &Path, behaviours: impl IntoIterator<Item = Behaviour>) -> Self {
        let listener = tokio::net::UnixListener::bind(path).unwrap();
        let shared = Shared::new(behaviours);

        let accept = shared.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(accept.clone().serve(stream));
            }
        });

        Self {
            endpoint: format!("unix://{}", path.display()),
            shared,
            handle,
        }
    }

    /// Connection string for the adapter
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn connections(&self) -> usize {
        self.shared.stats.lock().unwrap().connections
    }

    pub fn requests(&self) -> usize {
        self.shared.stats.lock().unwrap().requests
    }

    pub fn scripts(&self) -> Vec<SeenScript> {
        self.shared.stats.lock().unwrap().scripts.clone()
    }

    pub fn keep_conn_flags(&self) -> Vec<bool> {
        self.shared.stats.lock().unwrap().keep_conn_flags.clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Shared {
    fn new(behaviours: impl IntoIterator<Item = Behaviour>) -> Self {
        let queue: VecDeque<Behaviour> = behaviours.into_iter().collect();
        let last = queue.back().cloned().unwrap_or_else(|| Behaviour::ok("null"));
        Self {
            script: Arc::new(Mutex::new(Script { queue, last })),
            stats: Arc::new(Mutex::new(Stats::default())),
        }
    }

    async fn serve<S>(self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.stats.lock().unwrap().connections += 1;
        let mut framed = Framed::new(stream, RecordCodec::new());

        loop {
            let Some(request) = read_request(&mut framed).await else {
                return;
            };
            let behaviour = {
                let mut stats = self.stats.lock().unwrap();
                stats.requests += 1;
                stats.keep_conn_flags.push(request.keep_conn);
                stats.scripts.push(request.script.clone());
                self.script.lock().unwrap().next()
            };

            let (behaviour, hang_up) = match behaviour {
                Behaviour::ReplyAndClose { stdout, stderr } => {
                    (Behaviour::Reply { stdout, stderr }, true)
                }
                other => (other, false),
            };

            match behaviour {
                Behaviour::Reply { stdout, stderr } => {
                    let mut records = stream_records(RecordType::Stdout, request.id, &stdout);
                    if !stderr.is_empty() {
                        records.extend(stream_records(RecordType::Stderr, request.id, &stderr));
                    }
                    records.push(
                        EndRequest {
                            app_status: 0,
                            protocol_status: ProtocolStatus::RequestComplete,
                        }
                        .into_record(request.id),
                    );
                    for record in records {
                        if framed.feed(record).await.is_err() {
                            return;
                        }
                    }
                    if framed.flush().await.is_err() || !request.keep_conn || hang_up {
                        return;
                    }
                }
                Behaviour::ReplyAndClose { .. } => return,
                Behaviour::Drop => return,
                Behaviour::Oversized(length) => {
                    let mut raw = Vec::with_capacity(8 + length as usize);
                    raw.put_u8(1);
                    raw.put_u8(RecordType::Stdout.as_u8());
                    raw.put_u16(request.id);
                    raw.put_u16(length);
                    raw.put_u8(0);
                    raw.put_u8(0);
                    raw.put_bytes(b'x', length as usize);
                    let _ = framed.get_mut().write_all(&raw).await;
                    let _ = framed.get_mut().flush().await;
                    return;
                }
                Behaviour::Overloaded => {
                    let end = EndRequest {
                        app_status: 0,
                        protocol_status: ProtocolStatus::Overloaded,
                    }
                    .into_record(request.id);
                    let _ = framed.send(end).await;
                    return;
                }
                Behaviour::Stall => {
                    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                    return;
                }
            }
        }
    }
}

struct IncomingRequest {
    id: u16,
    keep_conn: bool,
    script: SeenScript,
}

/// BEGIN_REQUEST, PARAMS until empty, STDIN until empty
async fn read_request<S>(framed: &mut Framed<S, RecordCodec>) -> Option<IncomingRequest>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut id = 0;
    let mut keep_conn = false;
    let mut params = Vec::new();

    loop {
        let record: Record = framed.next().await?.ok()?;
        match record.record_type {
            RecordType::BeginRequest => {
                id = record.request_id;
                keep_conn = record.content.get(2).is_some_and(|f| f & FLAG_KEEP_CONN != 0);
            }
            RecordType::Params => params.extend_from_slice(&record.content),
            RecordType::Stdin if record.is_end_of_stream() => break,
            RecordType::Stdin => {}
            _ => return None,
        }
    }

    let params = decode_params(&params).ok()?;
    let path = PathBuf::from(params.get("SCRIPT_FILENAME")?);
    let source = std::fs::read_to_string(&path).unwrap_or_default();
    let script = SeenScript {
        existed: path.exists(),
        path,
        source,
    };

    Some(IncomingRequest {
        id,
        keep_conn,
        script,
    })
}

/// Entries left behind in a staging directory
pub fn staged_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
