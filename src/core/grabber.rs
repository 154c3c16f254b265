//! The MJPEG state machine — the core of this crate.
//!
//! Ported byte-for-byte in spirit from the original `mjv_grabber.c`: a
//! fixed-capacity scan buffer with three cursors (`head`, `cur`, `anchor`)
//! is fed by [`Source::read`], and a small jump table walks an HTTP
//! response down into a `multipart/x-mixed-replace` (or `multipart/mixed`)
//! stream, slicing out each JPEG part either by its declared
//! `Content-Length` or by hunting for the EOI marker. Frame bytes are
//! copied out exactly once, at emission; everything before that is
//! index arithmetic over the same backing buffer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::frame::FrameRecord;
use super::selfpipe::SelfPipeReader;
use crate::source::Source;

/// Default idle timeout applied to every read-or-cancel wait, per
/// `GrabberConfig::idle_timeout_secs`'s own default.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default scan buffer capacity — comfortably larger than any single
/// frame plus its headers, per the original's `BUF_SIZE`.
pub const DEFAULT_BUFFER_SIZE: usize = 100_000;

/// Terminal status returned by [`Grabber::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabberStatus {
    Success,
    Timeout,
    ReadError,
    PrematureEof,
    CorruptHeader,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    HttpBanner,
    HttpHeader,
    FindBoundary,
    HttpSubheader,
    FindImage,
    ImageByContentLength,
    ImageByEofSearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MimeType {
    Unknown,
    MultipartMixed,
    MultipartXMixedReplace,
}

/// Result of one jump-table step.
enum Step {
    /// Equivalent to the original's `READ_SUCCESS`: keep dispatching.
    Continue,
    /// Equivalent to `OUT_OF_BYTES`: compact the buffer and read more.
    NeedMoreBytes,
    ReadError,
    CorruptHeader,
    /// A frame is ready to be emitted at `buf[start..start+len]`. The
    /// caller performs the (possibly paced) emission, then resumes
    /// dispatching from `increment_cur`.
    Emit(usize, usize),
}

type FrameCallback = Box<dyn FnMut(FrameRecord) + Send>;

/// Owns the scan buffer, the source it reads from, and the parser state.
/// Re-entrant calls to [`Grabber::run`] are not supported — the original's
/// state is entirely single-threaded and so is this one.
pub struct Grabber {
    source: Source,
    buf: Vec<u8>,
    head: usize,
    cur: usize,
    anchor: Option<usize>,
    state: State,
    mimetype: MimeType,
    boundary: Vec<u8>,
    content_length: usize,
    response_code: u16,
    last_emitted: Option<Instant>,
    callback: Option<FrameCallback>,
    cancel: Option<Arc<SelfPipeReader>>,
    idle_timeout: Duration,
}

impl Grabber {
    /// Allocate a grabber for `source` with the default buffer capacity.
    pub fn new(source: Source) -> Self {
        Self::with_capacity(source, DEFAULT_BUFFER_SIZE)
    }

    /// Allocate a grabber with an explicit scan buffer capacity (must
    /// comfortably exceed the largest expected frame plus its headers).
    pub fn with_capacity(source: Source, capacity: usize) -> Self {
        Self::with_capacity_and_idle_timeout(source, capacity, DEFAULT_IDLE_TIMEOUT)
    }

    /// Allocate a grabber with an explicit scan buffer capacity and idle
    /// timeout, per `GrabberConfig::buffer_size`/`idle_timeout_secs`.
    pub fn with_capacity_and_idle_timeout(
        source: Source,
        capacity: usize,
        idle_timeout: Duration,
    ) -> Self {
        assert!(capacity > 3, "grabber buffer must hold at least a boundary");
        Self {
            source,
            buf: vec![0u8; capacity],
            head: 0,
            cur: 0,
            anchor: None,
            state: State::HttpBanner,
            mimetype: MimeType::Unknown,
            boundary: Vec::new(),
            content_length: 0,
            response_code: 0,
            last_emitted: None,
            callback: None,
            cancel: None,
            idle_timeout,
        }
    }

    /// Register the frame callback. Unlike the original's C function
    /// pointer plus `void *cookie`, a Rust closure already carries its
    /// own captured state.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(FrameRecord) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Install (or clear, with `None`) the cancellation read end.
    pub fn set_cancel(&mut self, cancel: Option<Arc<SelfPipeReader>>) {
        self.cancel = cancel;
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Run the state machine to completion. Blocks the calling task until
    /// a terminal status is reached.
    pub async fn run(&mut self) -> GrabberStatus {
        let throttle = self.source.throttle();
        loop {
            if let Err(status) = self.read_more().await {
                return status;
            }
            loop {
                match self.dispatch() {
                    Step::Continue => continue,
                    Step::NeedMoreBytes => {
                        self.compact();
                        break;
                    }
                    Step::ReadError => return GrabberStatus::ReadError,
                    Step::CorruptHeader => return GrabberStatus::CorruptHeader,
                    Step::Emit(start, len) => {
                        self.emit_frame(start, len, throttle).await;
                        match self.increment_cur() {
                            Step::NeedMoreBytes => {
                                self.compact();
                                break;
                            }
                            _ => continue,
                        }
                    }
                }
            }
        }
    }

    /// Select on {source read, cancel signal} with a 10s idle timeout —
    /// the grabber's one designated cancellation point.
    async fn read_more(&mut self) -> Result<(), GrabberStatus> {
        let cancel = self.cancel.clone();
        loop {
            let head = self.head;
            if head >= self.buf.len() {
                // The scan buffer is completely full with no state able to
                // make progress; this only happens if a token exceeds the
                // buffer without the oversize-frame guards catching it.
                warn!(source = self.source.name(), "scan buffer exhausted");
                return Err(GrabberStatus::ReadError);
            }
            let sleep = tokio::time::sleep(self.idle_timeout);
            tokio::pin!(sleep);
            tokio::select! {
                res = self.source.read(&mut self.buf[head..]) => {
                    match res {
                        Ok(0) => return Err(GrabberStatus::PrematureEof),
                        Ok(n) => {
                            self.head += n;
                            trace!(source = self.source.name(), bytes = n, "read");
                            return Ok(());
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!(source = self.source.name(), error = %e, "read error");
                            return Err(GrabberStatus::ReadError);
                        }
                    }
                }
                _ = &mut sleep => return Err(GrabberStatus::Timeout),
                _ = Self::cancel_wait(&cancel) => return Err(GrabberStatus::Canceled),
            }
        }
    }

    async fn cancel_wait(cancel: &Option<Arc<SelfPipeReader>>) {
        match cancel {
            Some(c) => c.canceled().await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Scan-buffer compaction discipline: keep `[anchor, head)` if
    /// anchored, else `[cur, head)`; reset to offset 0 when there's
    /// nothing worth keeping.
    fn compact(&mut self) {
        if self.anchor == Some(0) {
            return;
        }
        let keep_from = self.anchor.unwrap_or(self.cur);
        let good_bytes = self.head - keep_from;
        if good_bytes > 0 && keep_from > 0 {
            self.buf.copy_within(keep_from..self.head, 0);
            self.cur -= keep_from;
            self.head -= keep_from;
            self.anchor = self.anchor.map(|a| a - keep_from);
        } else if self.anchor.is_none() {
            self.cur = 0;
            self.head = 0;
        }
    }

    fn dispatch(&mut self) -> Step {
        match self.state {
            State::HttpBanner => self.state_http_banner(),
            State::HttpHeader => self.state_http_header(),
            State::FindBoundary => self.state_find_boundary(),
            State::HttpSubheader => self.state_http_subheader(),
            State::FindImage => self.state_find_image(),
            State::ImageByContentLength => self.state_image_by_content_length(),
            State::ImageByEofSearch => self.state_image_by_eof_search(),
        }
    }

    fn increment_cur(&mut self) -> Step {
        self.cur += 1;
        if self.cur >= self.head {
            Step::NeedMoreBytes
        } else {
            Step::Continue
        }
    }

    /// "Full header line available": scan from `anchor` (set on
    /// the first unread byte if not already set) to the next `\n`,
    /// accepting either a bare LF or a CRLF pair as the terminator.
    fn fetch_header_line(&mut self) -> Result<(usize, usize), Step> {
        if self.anchor.is_none() {
            self.anchor = Some(self.cur);
        }
        loop {
            if self.buf[self.cur] == b'\n' {
                let anchor = self.anchor.unwrap();
                let line_len_incl = self.cur + 1 - anchor;
                let line_len = if line_len_incl >= 2 && self.buf[self.cur - 1] == b'\r' {
                    line_len_incl - 2
                } else {
                    line_len_incl - 1
                };
                let start = anchor;
                self.anchor = None;
                return Ok((start, line_len));
            }
            if let Step::NeedMoreBytes = self.increment_cur() {
                return Err(Step::NeedMoreBytes);
            }
        }
    }

    fn state_http_banner(&mut self) -> Step {
        let (start, len) = match self.fetch_header_line() {
            Ok(v) => v,
            Err(s) => return s,
        };
        let sig_ok = len >= 7 && &self.buf[start..start + 7] == b"HTTP/1.";
        if !sig_ok {
            return Step::CorruptHeader;
        }
        if len < 8 || (self.buf[start + 7] != b'0' && self.buf[start + 7] != b'1') {
            return Step::CorruptHeader;
        }
        if len < 12
            || self.buf[start + 8] != b' '
            || !is_numeric(self.buf[start + 9])
            || !is_numeric(self.buf[start + 10])
            || !is_numeric(self.buf[start + 11])
        {
            return Step::CorruptHeader;
        }
        let code = simple_atoi(&self.buf[start + 9..start + 12]);
        self.response_code = code as u16;
        if code != 200 {
            warn!(code, "non-200 response from source");
            return Step::ReadError;
        }
        self.state = State::HttpHeader;
        self.increment_cur()
    }

    fn state_http_header(&mut self) -> Step {
        loop {
            let (start, len) = match self.fetch_header_line() {
                Ok(v) => v,
                Err(s) => return s,
            };
            if len == 0 {
                if self.boundary.is_empty() {
                    return Step::CorruptHeader;
                }
                self.state = State::FindBoundary;
                break;
            }
            let line = self.buf[start..start + len].to_vec();
            if line.starts_with(b"Content-Type:") || line.starts_with(b"Content-type:") {
                let rest = &line[b"Content-Type:".len()..];
                match self.interpret_content_type(rest) {
                    Step::Continue => {}
                    other => return other,
                }
            }
            if let Step::NeedMoreBytes = self.increment_cur() {
                return Step::NeedMoreBytes;
            }
        }
        self.increment_cur()
    }

    fn interpret_content_type(&mut self, field: &[u8]) -> Step {
        const MULTIPART_X: &[u8] = b"multipart/x-mixed-replace";
        const MULTIPART_M: &[u8] = b"multipart/mixed";
        const BOUNDARY: &[u8] = b"boundary=";

        let n = field.len();
        let mut i = 0usize;
        while i < n && field[i] == b' ' {
            i += 1;
        }
        if i >= n {
            return Step::CorruptHeader;
        }

        if field[i..].starts_with(MULTIPART_X) {
            self.mimetype = MimeType::MultipartXMixedReplace;
            i += MULTIPART_X.len();
        } else if field[i..].starts_with(MULTIPART_M) {
            self.mimetype = MimeType::MultipartMixed;
            i += MULTIPART_M.len();
        }

        loop {
            while i < n && field[i] != b';' {
                i += 1;
            }
            if i >= n {
                return Step::Continue;
            }
            i += 1; // past ';'
            if i >= n {
                return Step::Continue;
            }
            while i < n && field[i] == b' ' {
                i += 1;
            }
            if i >= n {
                return Step::Continue;
            }
            if field[i..].starts_with(BOUNDARY) {
                let bstart = i + BOUNDARY.len();
                let mut bend = bstart;
                while bend < n && field[bend] != b';' {
                    bend += 1;
                }
                if bend > bstart {
                    let boundary = field[bstart..bend].to_vec();
                    if boundary.len() > self.buf.len().saturating_sub(3) {
                        warn!("boundary longer than scan buffer");
                        return Step::CorruptHeader;
                    }
                    debug!(boundary = ?String::from_utf8_lossy(&boundary), "found boundary");
                    self.boundary = boundary;
                }
                i = bend;
            }
        }
    }

    fn state_find_boundary(&mut self) -> Step {
        loop {
            match self.anchor {
                None => {
                    if self.buf[self.cur] == self.boundary[0] {
                        self.anchor = Some(self.cur);
                    }
                }
                Some(anchor) => {
                    let line_len = self.cur + 1 - anchor;
                    if line_len <= self.boundary.len()
                        && self.buf[self.cur] != self.boundary[self.cur - anchor]
                    {
                        self.cur = anchor + 1;
                        self.anchor = None;
                    }
                    if let Some(anchor) = self.anchor {
                        let line_len = self.cur + 1 - anchor;
                        if line_len == self.boundary.len() + 1 && self.buf[self.cur] == b'\n' {
                            self.anchor = None;
                            self.state = State::HttpSubheader;
                            break;
                        }
                        if line_len == self.boundary.len() + 2 {
                            if self.buf[self.cur - 1] == b'\r' && self.buf[self.cur] == b'\n' {
                                self.anchor = None;
                                self.content_length = 0;
                                self.state = State::HttpSubheader;
                                break;
                            } else {
                                self.cur = anchor + 1;
                                self.anchor = None;
                            }
                        }
                    }
                }
            }
            if let Step::NeedMoreBytes = self.increment_cur() {
                return Step::NeedMoreBytes;
            }
        }
        self.increment_cur()
    }

    fn state_http_subheader(&mut self) -> Step {
        loop {
            let (start, len) = match self.fetch_header_line() {
                Ok(v) => v,
                Err(s) => return s,
            };
            if len == 0 {
                break;
            }
            let line = self.buf[start..start + len].to_vec();
            if line.starts_with(b"Content-Length:") || line.starts_with(b"Content-length:") {
                let rest = &line[b"Content-Length:".len()..];
                let n = rest.len();
                let mut i = 0usize;
                while i < n && rest[i] == b' ' {
                    i += 1;
                }
                if i >= n {
                    return Step::CorruptHeader;
                }
                let num_start = i;
                while i < n && rest[i].is_ascii_digit() {
                    i += 1;
                }
                if i == num_start {
                    return Step::CorruptHeader;
                }
                self.content_length = simple_atoi(&rest[num_start..i]);
            }
            if let Step::NeedMoreBytes = self.increment_cur() {
                return Step::NeedMoreBytes;
            }
        }
        self.state = State::FindImage;
        self.increment_cur()
    }

    fn state_find_image(&mut self) -> Step {
        loop {
            if self.buf[self.cur] == 0xFF {
                self.anchor = Some(self.cur);
            } else if self.anchor.is_some_and(|a| self.cur - a == 1) && self.buf[self.cur] == 0xD8
            {
                self.state = if self.content_length > 0 {
                    State::ImageByContentLength
                } else {
                    State::ImageByEofSearch
                };
                if self.content_length > self.buf.len() {
                    warn!(
                        content_length = self.content_length,
                        "frame larger than scan buffer; skipping"
                    );
                    self.anchor = None;
                    self.state = State::FindBoundary;
                }
                break;
            } else {
                self.anchor = None;
            }
            if let Step::NeedMoreBytes = self.increment_cur() {
                return Step::NeedMoreBytes;
            }
        }
        self.increment_cur()
    }

    fn state_image_by_content_length(&mut self) -> Step {
        let anchor = self.anchor.expect("anchor set by state_find_image");
        loop {
            let bytes_found = (self.cur + 1 - anchor) as isize;
            let bytes_needed = self.content_length as isize - bytes_found;
            let bytes_left = self.head as isize - self.cur as isize - 1;
            if bytes_left >= bytes_needed {
                self.cur = anchor + self.content_length - 1;
                let len = self.content_length;
                self.anchor = None;
                self.content_length = 0;
                self.state = State::FindBoundary;
                return Step::Emit(anchor, len);
            }
            self.cur = self.head;
            return Step::NeedMoreBytes;
        }
    }

    fn state_image_by_eof_search(&mut self) -> Step {
        loop {
            if self.cur >= 1 && self.buf[self.cur - 1] == 0xFF && self.buf[self.cur] == 0xD9 {
                let anchor = self.anchor.expect("anchor set by state_find_image");
                let len = self.cur - anchor + 1;
                self.anchor = None;
                self.state = State::FindBoundary;
                return Step::Emit(anchor, len);
            }
            if let Step::NeedMoreBytes = self.increment_cur() {
                return Step::NeedMoreBytes;
            }
        }
    }

    /// Paces emission for file playback (`throttle`), copies the frame
    /// bytes exactly once, and hands the frame to the callback.
    async fn emit_frame(&mut self, start: usize, len: usize, throttle: Option<Duration>) {
        if let Some(interval) = throttle {
            if interval > Duration::ZERO {
                self.pace(interval).await;
            }
        }
        let bytes = self.buf[start..start + len].to_vec();
        let frame = FrameRecord::new(bytes);
        match self.callback.as_mut() {
            Some(cb) => cb(frame),
            None => warn!(source = self.source.name(), "no callback registered; dropping frame"),
        }
    }

    async fn pace(&mut self, interval: Duration) {
        let deadline = match self.last_emitted {
            Some(last) => last + interval,
            None => Instant::now(),
        };
        let now = Instant::now();
        if deadline > now {
            tokio::time::sleep(deadline - now).await;
        }
        self.last_emitted = Some(deadline);
    }
}

fn is_numeric(b: u8) -> bool {
    b.is_ascii_digit()
}

/// Parses an unsigned decimal integer from a byte slice known to contain
/// only ASCII digits (mirrors the original's trusting `simple_atoi`).
fn simple_atoi(digits: &[u8]) -> usize {
    digits.iter().fold(0usize, |acc, &b| acc * 10 + (b - b'0') as usize)
}
