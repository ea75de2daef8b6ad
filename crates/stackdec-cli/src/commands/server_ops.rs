//! JSON-lines server over TCP: one request object per line in, one
//! response object per line out.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use stackdec::{EngineConfig, Request, RequestPool, Response};
use tracing::{debug, info, warn};

use crate::CliError;

pub fn serve_cmd(config_file: &Path, addr: &str, workers: usize) -> Result<(), CliError> {
    let config = EngineConfig::load(config_file)?;
    let service = Arc::new(config.build_service()?);
    let pool = Arc::new(RequestPool::new(service, workers));
    let listener = TcpListener::bind(addr)?;
    info!(addr = %listener.local_addr()?, workers = pool.size(), "server listening");
    serve_listener(listener, pool, None)
}

/// Accept connections, one thread each, until `max_connections` have been
/// served (forever when `None`).
pub fn serve_listener(
    listener: TcpListener,
    pool: Arc<RequestPool>,
    max_connections: Option<usize>,
) -> Result<(), CliError> {
    let mut handles = Vec::new();
    for (accepted, stream) in listener.incoming().enumerate() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let pool = Arc::clone(&pool);
        handles.push(thread::spawn(move || {
            let peer = stream.peer_addr().ok();
            match handle_connection(stream, &pool) {
                Ok(requests) => debug!(?peer, requests, "connection closed"),
                Err(e) => warn!(?peer, error = %e, "connection failed"),
            }
        }));
        if max_connections.is_some_and(|max| accepted + 1 >= max) {
            break;
        }
    }
    for handle in handles {
        let _ = handle.join();
    }
    info!("server stopped");
    Ok(())
}

/// Answer requests on one connection until the peer closes it; returns how
/// many requests were answered.
pub fn handle_connection(stream: TcpStream, pool: &RequestPool) -> Result<usize, CliError> {
    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    let mut answered = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => pool.call(request)?,
            Err(e) => Response::error(format!("bad request: {e}")),
        };
        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        answered += 1;
    }
    Ok(answered)
}

/// Send one JSON request and return the response line.
pub fn client_request(addr: SocketAddr, request: &str) -> Result<String, CliError> {
    let request: Request = serde_json::from_str(request)?;
    let stream = TcpStream::connect(addr)?;
    let mut writer = BufWriter::new(stream.try_clone()?);
    serde_json::to_writer(&mut writer, &request)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    let mut response = String::new();
    BufReader::new(stream).read_line(&mut response)?;
    if response.is_empty() {
        return Err(CliError::Usage("server closed the connection".to_string()));
    }
    Ok(response.trim_end().to_string())
}
