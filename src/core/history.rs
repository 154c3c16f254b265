//! Bounded history of recently captured frames for one source, with a
//! human-readable status summary (`"U/K, DdHhMmSs"`-style) mirroring the
//! original GUI statusbar's age display.

use std::time::SystemTime;

use super::frame::FrameRecord;
use super::ring_buffer::RingBuffer;

pub struct FrameHistory {
    frames: RingBuffer<FrameRecord>,
}

impl FrameHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: RingBuffer::new(capacity),
        }
    }

    pub fn append(&mut self, frame: FrameRecord) {
        self.frames.append(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.used()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.used() == 0
    }

    pub fn capacity(&self) -> usize {
        self.frames.capacity()
    }

    pub fn newest(&self) -> Option<&FrameRecord> {
        self.frames.newest()
    }

    pub fn oldest(&self) -> Option<&FrameRecord> {
        self.frames.oldest()
    }

    /// Render `"U/K, DdHhMmSs"` (trimming leading zero units) describing
    /// how much wall-clock time the buffer currently spans. Returns `None`
    /// when fewer than two frames have been recorded.
    pub fn status_string(&self) -> Option<String> {
        let oldest = self.frames.oldest()?;
        let newest = self.frames.newest()?;
        if self.frames.used() < 2 {
            return None;
        }

        let elapsed = newest
            .timestamp()
            .duration_since(oldest.timestamp())
            .unwrap_or_default();
        let total_secs = elapsed.as_secs();

        let days = total_secs / 86_400;
        let hours = (total_secs % 86_400) / 3_600;
        let minutes = (total_secs % 3_600) / 60;
        let seconds = total_secs % 60;

        let mut age = String::new();
        if days > 0 {
            age.push_str(&format!("{days}d{hours}h{minutes}m{seconds}s"));
        } else if hours > 0 {
            age.push_str(&format!("{hours}h{minutes}m{seconds}s"));
        } else if minutes > 0 {
            age.push_str(&format!("{minutes}m{seconds}s"));
        } else {
            age.push_str(&format!("{seconds}s"));
        }

        Some(format!(
            "{}/{}, {}",
            self.frames.used(),
            self.frames.capacity(),
            age
        ))
    }

    /// Timestamp of the most recently appended frame, if any — used by the
    /// supervisor's disk-dump path to stamp file mtimes.
    pub fn last_capture_time(&self) -> Option<SystemTime> {
        self.frames.newest().map(|f| f.timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame_at(t: SystemTime) -> FrameRecord {
        FrameRecord::with_timestamp(vec![0xFF, 0xD8, 0xFF, 0xD9], t)
    }

    #[test]
    fn empty_or_singleton_history_has_no_status() {
        let history = FrameHistory::new(5);
        assert_eq!(history.status_string(), None);
    }

    #[test]
    fn status_string_formats_seconds_only() {
        let base = SystemTime::UNIX_EPOCH;
        let mut history = FrameHistory::new(5);
        history.append(frame_at(base));
        history.append(frame_at(base + Duration::from_secs(42)));
        assert_eq!(history.status_string().as_deref(), Some("2/5, 42s"));
    }

    #[test]
    fn status_string_formats_minutes_and_seconds() {
        let base = SystemTime::UNIX_EPOCH;
        let mut history = FrameHistory::new(10);
        history.append(frame_at(base));
        history.append(frame_at(base + Duration::from_secs(125)));
        assert_eq!(history.status_string().as_deref(), Some("2/10, 2m5s"));
    }

    #[test]
    fn history_evicts_oldest_past_capacity() {
        let base = SystemTime::UNIX_EPOCH;
        let mut history = FrameHistory::new(2);
        history.append(frame_at(base));
        history.append(frame_at(base + Duration::from_secs(1)));
        history.append(frame_at(base + Duration::from_secs(2)));
        assert_eq!(history.len(), 2);
        assert_eq!(
            history.oldest().unwrap().timestamp(),
            base + Duration::from_secs(1)
        );
    }
}
