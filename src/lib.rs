//! A multi-source MJPEG grabber: parses `multipart/x-mixed-replace` (or
//! `multipart/mixed`) HTTP streams and recorded capture files down into
//! individual JPEG frames.
//!
//! [`core::grabber`] is the heart of the crate — a byte-level state
//! machine ported from a C MJPEG viewer's capture thread. Everything
//! else here is the ambient stack around it: byte [`source`]s to feed
//! it, a [`worker`] to run one per configured source, an [`events`] bus
//! to narrate what they're doing, a [`recovery`] policy for reconnects,
//! and [`config`]/[`error`] for the parts every binary needs.

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod filename;
pub mod recovery;
pub mod source;
pub mod worker;

pub use config::AppConfig;
pub use error::{GrabberError, Result};
pub use events::{EventBus, WorkerEvent};
pub use worker::{Worker, WorkerConfig};
