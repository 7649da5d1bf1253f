// ABOUTME: Buffers concatenated message segments until every part has arrived
// ABOUTME: Parts are keyed by sender, reference and total count, then joined in sequence order

use crate::datatypes::ConcatInfo;
use crate::pdu::SmsDeliver;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A message that may be one part of a concatenated message
pub trait Concatenated: Sized {
    fn sender(&self) -> &str;
    fn concat_info(&self) -> Option<ConcatInfo>;
    fn text(&self) -> &str;
    /// Turns the first part into the joined message
    fn with_text(self, text: String) -> Self;
}

impl Concatenated for SmsDeliver {
    fn sender(&self) -> &str {
        self.originator.as_str()
    }

    fn concat_info(&self) -> Option<ConcatInfo> {
        SmsDeliver::concat_info(self)
    }

    fn text(&self) -> &str {
        SmsDeliver::text(self)
    }

    fn with_text(mut self, text: String) -> Self {
        self.user_data.header = None;
        self.user_data.text = text;
        self
    }
}

type SegmentKey = (String, u16, u8);

/// Parts of one concatenated message collected so far
#[derive(Debug)]
struct PendingSet<T> {
    started: Instant,
    parts: BTreeMap<u8, T>,
}

/// Collects segments of concatenated messages.
///
/// Messages without a concatenation header pass straight through. Sets whose
/// missing parts never show up are dropped after `max_age`, and at most
/// `max_pending` sets are held at once, the oldest giving way first.
#[derive(Debug)]
pub struct Reassembler<T> {
    pending: HashMap<SegmentKey, PendingSet<T>>,
    max_age: Duration,
    max_pending: usize,
}

impl<T> Default for Reassembler<T> {
    fn default() -> Self {
        Self::with_limits(Self::DEFAULT_MAX_AGE, Self::DEFAULT_MAX_PENDING)
    }
}

impl<T> Reassembler<T> {
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);
    pub const DEFAULT_MAX_PENDING: usize = 64;

    pub fn with_limits(max_age: Duration, max_pending: usize) -> Self {
        Self {
            pending: HashMap::new(),
            max_age,
            max_pending: max_pending.max(1),
        }
    }

    /// Number of messages with parts still outstanding
    pub fn pending_messages(&self) -> usize {
        self.pending.len()
    }

    fn prune(&mut self, now: Instant) {
        let max_age = self.max_age;
        let before = self.pending.len();
        self.pending
            .retain(|_, set| now.saturating_duration_since(set.started) <= max_age);
        let expired = before - self.pending.len();
        if expired > 0 {
            warn!(expired, "Dropped incomplete concatenated messages");
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .pending
            .iter()
            .min_by_key(|(_, set)| set.started)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            warn!(sender = %key.0, reference = key.1, "Too many incomplete messages, dropping oldest");
            self.pending.remove(&key);
        }
    }
}

impl<T: Concatenated> Reassembler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a part. Returns the complete message once the last missing part
    /// arrives, `None` while parts are still outstanding.
    pub fn push(&mut self, part: T) -> Option<T> {
        self.push_at(part, Instant::now())
    }

    pub(crate) fn push_at(&mut self, part: T, now: Instant) -> Option<T> {
        let Some(info) = part.concat_info().filter(|info| info.total > 1) else {
            return Some(part);
        };
        if info.sequence == 0 || info.sequence > info.total {
            warn!(
                sequence = info.sequence,
                total = info.total,
                "Segment index out of range, delivering part as-is"
            );
            return Some(part);
        }

        self.prune(now);
        let key = (part.sender().to_string(), info.reference, info.total);
        if !self.pending.contains_key(&key) && self.pending.len() >= self.max_pending {
            self.evict_oldest();
        }
        let set = self.pending.entry(key.clone()).or_insert_with(|| PendingSet {
            started: now,
            parts: BTreeMap::new(),
        });
        if set.parts.insert(info.sequence, part).is_some() {
            debug!(sequence = info.sequence, "Duplicate segment replaced");
        }
        if set.parts.len() < info.total as usize {
            debug!(
                reference = info.reference,
                have = set.parts.len(),
                total = info.total,
                "Waiting for more segments"
            );
            return None;
        }

        let parts = self.pending.remove(&key)?.parts;
        let text: String = parts.values().map(Concatenated::text).collect();
        parts.into_values().next().map(|first| first.with_text(text))
    }
}
