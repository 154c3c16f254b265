//! Byte sources the grabber reads from.
//!
//! Modeled as a tagged enum rather than a trait object: the grabber only
//! ever needs `open`/`read`/`close`/`name`/`throttle`, and a `match` over
//! two concrete variants is simpler to reason about than dynamic dispatch
//! over a handful of methods, especially once cancellation is folded in at
//! the call site rather than inside the source itself.

pub mod base64;
pub mod file;
#[cfg(test)]
pub mod memory;
pub mod network;

use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::SourceError;

use file::FileSource;
use network::NetworkSource;

pub enum Source {
    File(FileSource),
    Network(NetworkSource),
    /// In-memory byte source used only by grabber unit tests.
    #[cfg(test)]
    Memory(memory::MemorySource),
}

impl Source {
    pub fn from_config(cfg: &SourceConfig) -> Self {
        match cfg {
            SourceConfig::File { name, file, usec, .. } => {
                Source::File(FileSource::new(name.clone(), file.clone(), *usec))
            }
            SourceConfig::Network {
                name,
                host,
                port,
                path,
                user,
                pass,
                ..
            } => Source::Network(NetworkSource::new(
                name.clone(),
                host.clone(),
                *port,
                path.clone(),
                user.clone(),
                pass.clone(),
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Source::File(f) => f.name(),
            Source::Network(n) => n.name(),
            #[cfg(test)]
            Source::Memory(m) => m.name(),
        }
    }

    pub async fn open(&mut self) -> Result<(), SourceError> {
        match self {
            Source::File(f) => f.open().await,
            Source::Network(n) => n.open().await,
            #[cfg(test)]
            Source::Memory(m) => m.open().await,
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Source::File(f) => f.read(buf).await,
            Source::Network(n) => n.read(buf).await,
            #[cfg(test)]
            Source::Memory(m) => m.read(buf).await,
        }
    }

    pub fn close(&mut self) {
        match self {
            Source::File(f) => f.close(),
            Source::Network(n) => n.close(),
            #[cfg(test)]
            Source::Memory(m) => m.close(),
        }
    }

    /// Per-frame pacing interval for file playback; always `None` for
    /// network sources, which are naturally paced by the camera.
    pub fn throttle(&self) -> Option<Duration> {
        match self {
            Source::File(f) => f.throttle(),
            Source::Network(_) => None,
            #[cfg(test)]
            Source::Memory(m) => m.throttle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_preserves_file_name_and_throttle() {
        let cfg = SourceConfig::File {
            name: "front-door".to_string(),
            file: "/tmp/x.mjpeg".to_string(),
            usec: 40_000,
            history_capacity: None,
            framerate_memory: None,
        };
        let source = Source::from_config(&cfg);
        assert_eq!(source.name(), "front-door");
        assert_eq!(source.throttle(), Some(Duration::from_micros(40_000)));
    }

    #[test]
    fn from_config_network_has_no_throttle() {
        let cfg = SourceConfig::Network {
            name: "driveway".to_string(),
            host: "192.168.1.10".to_string(),
            port: 80,
            path: "/videostream.cgi".to_string(),
            user: None,
            pass: None,
            history_capacity: None,
            framerate_memory: None,
        };
        let source = Source::from_config(&cfg);
        assert_eq!(source.name(), "driveway");
        assert_eq!(source.throttle(), None);
    }
}
