use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

use super::base64;
use crate::error::SourceError;

/// An HTTP/1.0 MJPEG camera reached over TCP. Credentials, when both a
/// user and password are present, are sent as HTTP Basic auth.
pub struct NetworkSource {
    name: String,
    host: String,
    port: u16,
    path: String,
    user: Option<String>,
    pass: Option<String>,
    stream: Option<TcpStream>,
}

impl NetworkSource {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
        user: Option<String>,
        pass: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            path: path.into(),
            user,
            pass,
            stream: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn open(&mut self) -> Result<(), SourceError> {
        if self.port == 0 {
            return Err(SourceError::InvalidPort {
                port: self.port as i64,
            });
        }
        if self.host.is_empty() {
            return Err(SourceError::NoHost);
        }

        let addr = format!("{}:{}", self.host, self.port);
        debug!(%addr, "resolving network source");
        let mut addrs = lookup_host(&addr)
            .await
            .map_err(|e| SourceError::ResolveError {
                host: self.host.clone(),
                details: e.to_string(),
            })?;

        let mut last_err = None;
        let mut connected = None;
        for candidate in addrs.by_ref() {
            match TcpStream::connect(candidate).await {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }

        let mut stream = connected.ok_or_else(|| SourceError::ConnectError {
            host: self.host.clone(),
            port: self.port,
            details: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses resolved".to_string()),
        })?;

        self.write_http_request(&mut stream).await?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Writes the HTTP/1.0 request one header line at a time — some
    /// cameras drop the connection if a header line arrives split across
    /// writes, so each `write_all` below corresponds to exactly one line.
    async fn write_http_request(&self, stream: &mut TcpStream) -> Result<(), SourceError> {
        async fn write_line(stream: &mut TcpStream, line: &str) -> Result<(), SourceError> {
            stream
                .write_all(line.as_bytes())
                .await
                .map_err(|e| SourceError::WriteError {
                    details: e.to_string(),
                })
        }

        write_line(stream, &format!("GET {} HTTP/1.0\r\n", self.path)).await?;
        write_line(stream, "Connection: Keep-Alive\r\n").await?;

        if let (Some(user), Some(pass)) = (&self.user, &self.pass) {
            let creds = base64::encode(format!("{user}:{pass}").as_bytes());
            write_line(stream, &format!("Authorization: Basic {creds}\r\n")).await?;
        }

        write_line(stream, "\r\n").await?;
        Ok(())
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .expect("read() called before open() succeeded");
        stream.read(buf).await
    }

    pub fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_port_fails_before_resolving() {
        let mut source = NetworkSource::new("cam", "example.invalid", 0, "/", None, None);
        let err = source.open().await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidPort { port: 0 }));
    }

    #[tokio::test]
    async fn empty_host_fails_with_no_host() {
        let mut source = NetworkSource::new("cam", "", 80, "/", None, None);
        let err = source.open().await.unwrap_err();
        assert!(matches!(err, SourceError::NoHost));
    }

    #[tokio::test]
    async fn unresolvable_host_fails_with_resolve_error() {
        let mut source = NetworkSource::new(
            "cam",
            "this-host-does-not-exist.invalid",
            80,
            "/videostream.cgi",
            None,
            None,
        );
        let err = source.open().await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::ResolveError { .. } | SourceError::ConnectError { .. }
        ));
    }
}
