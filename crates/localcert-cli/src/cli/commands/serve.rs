//! `localcert serve` - minimal HTTPS listener for checking a pair in a browser.
//!
//! One connection at a time, blocking I/O. Every request gets the same
//! plain-text answer.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use colored::Colorize;
use localcert_core::{load_identity_from_files, server_config};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use tracing::{debug, info, warn};

use super::Context;
use crate::cli::args::ServeArgs;
use crate::embedded::embedded_identity;

/// Response body for every request.
pub const BODY: &str = "Secure server is up and running";

const MAX_REQUEST_HEAD: usize = 16 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(10);

pub fn execute(_ctx: &Context, args: &ServeArgs) -> Result<()> {
    let identity = match (&args.cert, &args.key) {
        (Some(cert), Some(key)) => load_identity_from_files(cert, key)?,
        _ => embedded_identity()?,
    };
    let config = Arc::new(server_config(identity)?);

    let listener =
        TcpListener::bind(args.addr).with_context(|| format!("failed to bind {}", args.addr))?;
    let addr = listener.local_addr()?;
    info!(%addr, "HTTPS listener started");
    println!("Listening on {}", format!("https://{addr}").cyan());

    serve(&listener, &config, None);
    Ok(())
}

/// Accept connections until `limit` have been handled (forever when `None`).
/// Per-connection failures are logged and do not stop the loop.
pub fn serve(listener: &TcpListener, config: &Arc<ServerConfig>, limit: Option<usize>) {
    for stream in listener.incoming().take(limit.unwrap_or(usize::MAX)) {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let peer = stream.peer_addr().ok();
        match handle(stream, Arc::clone(config)) {
            Ok(()) => debug!(?peer, "request served"),
            Err(e) => warn!(?peer, error = %e, "connection failed"),
        }
    }
}

fn handle(tcp: TcpStream, config: Arc<ServerConfig>) -> Result<()> {
    tcp.set_read_timeout(Some(READ_TIMEOUT))?;
    let conn = ServerConnection::new(config)?;
    let mut tls = StreamOwned::new(conn, tcp);

    respond(&mut tls)?;
    tls.conn.send_close_notify();
    tls.flush()?;
    Ok(())
}

/// Read one request head from `stream` and write the fixed response.
pub fn respond<S: Read + Write>(stream: &mut S) -> io::Result<()> {
    read_request_head(stream)?;
    write!(
        stream,
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {BODY}",
        BODY.len()
    )?;
    stream.flush()
}

fn read_request_head<S: Read>(stream: &mut S) -> io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if head.len() > MAX_REQUEST_HEAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use localcert_core::loader::crypto_provider;
    use localcert_core::{load_identity, KeyPairGenerator};
    use rustls::pki_types::ServerName;
    use rustls::{ClientConfig, ClientConnection, RootCertStore};
    use std::io::Cursor;
    use std::thread;

    /// Reads from a fixed request, collects everything written.
    struct Loopback {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_respond_writes_fixed_body() {
        let mut stream = Loopback {
            input: Cursor::new(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec()),
            output: Vec::new(),
        };

        respond(&mut stream).unwrap();

        let response = String::from_utf8(stream.output).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains(&format!("Content-Length: {}\r\n", BODY.len())));
        assert!(response.ends_with(BODY));
    }

    #[test]
    fn test_oversized_head_is_rejected() {
        let mut stream = Loopback {
            input: Cursor::new(vec![b'a'; MAX_REQUEST_HEAD + 2048]),
            output: Vec::new(),
        };
        let err = respond(&mut stream).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(stream.output.is_empty());
    }

    #[test]
    fn test_https_round_trip() {
        let pair = KeyPairGenerator::new(1)
            .generate(&["Local MyCompany Cert".to_string()], &["localhost".to_string()])
            .unwrap();
        let identity =
            load_identity(pair.certificate_pem.as_bytes(), pair.private_key_pem.as_bytes()).unwrap();
        let mut roots = RootCertStore::empty();
        roots.add(identity.certificates[0].clone()).unwrap();
        let config = Arc::new(server_config(identity).unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || serve(&listener, &config, Some(1)));

        let client_config = ClientConfig::builder_with_provider(Arc::new(crypto_provider()))
            .with_protocol_versions(&[&rustls::version::TLS13])
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let conn = ClientConnection::new(
            Arc::new(client_config),
            ServerName::try_from("localhost").unwrap(),
        )
        .unwrap();
        let mut tls = StreamOwned::new(conn, TcpStream::connect(addr).unwrap());

        tls.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        let mut response = String::new();
        tls.read_to_string(&mut response).unwrap();
        server.join().unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with(BODY));
    }
}
