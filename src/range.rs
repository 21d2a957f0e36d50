//! Client-side view of the backend's indexed window.
//!
//! The backend indexes new blocks at the head while backfill may still be
//! catching up at the tail. [`RangeTracker`] records the highest and lowest
//! block numbers seen so far and classifies requested numbers against them.

use crate::block_number::BlockNumber;
use crate::types::Block;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

/// Default block production interval used for arrival estimates.
pub const DEFAULT_BLOCK_INTERVAL_SECS: u64 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeClass {
    Future,
    Stale,
    InRange,
}

/// `None` means unset. Unset is never treated as block zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeState {
    pub latest_known: Option<BlockNumber>,
    pub oldest_known: Option<BlockNumber>,
    /// True while `latest_known` comes from a navigation hint rather than an
    /// observed block.
    pub hinted: bool,
}

/// Which bounds moved during an `observe` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RangeUpdate {
    pub latest_moved: bool,
    pub oldest_moved: bool,
}

impl RangeUpdate {
    pub fn changed(&self) -> bool {
        self.latest_moved || self.oldest_moved
    }
}

#[derive(Debug)]
pub struct RangeTracker {
    state: RangeState,
    block_interval_secs: u64,
}

impl Default for RangeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_INTERVAL_SECS)
    }
}

impl RangeTracker {
    pub fn new(block_interval_secs: u64) -> Self {
        Self {
            state: RangeState::default(),
            block_interval_secs,
        }
    }

    pub fn snapshot(&self) -> RangeState {
        self.state.clone()
    }

    pub fn latest_known(&self) -> Option<&BlockNumber> {
        self.state.latest_known.as_ref()
    }

    pub fn oldest_known(&self) -> Option<&BlockNumber> {
        self.state.oldest_known.as_ref()
    }

    pub fn is_hinted(&self) -> bool {
        self.state.hinted
    }

    /// Widen the known window to include every block in `batch`.
    pub fn observe<'a, I>(&mut self, batch: I) -> RangeUpdate
    where
        I: IntoIterator<Item = &'a Block>,
    {
        let mut numbers = batch.into_iter().map(|b| &b.number);
        let Some(first) = numbers.next() else {
            return RangeUpdate::default();
        };
        let (batch_min, batch_max) = numbers.fold((first, first), |(lo, hi), n| {
            (if n < lo { n } else { lo }, if n > hi { n } else { hi })
        });

        let mut update = RangeUpdate::default();

        let raise = match &self.state.latest_known {
            None => true,
            Some(latest) => batch_max > latest,
        };
        if raise {
            log::debug!(
                "[range] latest {} -> {batch_max}",
                self.state.latest_known.as_ref().map_or("unset".to_string(), |n| n.to_string())
            );
            self.state.latest_known = Some(batch_max.clone());
            update.latest_moved = true;
        }
        if self.state.hinted
            && self
                .state
                .latest_known
                .as_ref()
                .is_some_and(|latest| batch_max >= latest)
        {
            self.state.hinted = false;
        }

        let lower = match &self.state.oldest_known {
            None => true,
            Some(oldest) => batch_min < oldest,
        };
        if lower {
            log::debug!(
                "[range] oldest {} -> {batch_min}",
                self.state.oldest_known.as_ref().map_or("unset".to_string(), |n| n.to_string())
            );
            self.state.oldest_known = Some(batch_min.clone());
            update.oldest_moved = true;
        }

        update
    }

    pub fn observe_single(&mut self, block: &Block) -> RangeUpdate {
        self.observe(std::iter::once(block))
    }

    pub fn classify(&self, requested: &BlockNumber) -> RangeClass {
        let Some(latest) = &self.state.latest_known else {
            return RangeClass::InRange;
        };
        if requested > latest {
            return RangeClass::Future;
        }
        match &self.state.oldest_known {
            Some(oldest) if requested < oldest => RangeClass::Stale,
            _ => RangeClass::InRange,
        }
    }

    /// Wall-clock estimate for when a future block should exist.
    ///
    /// The block delta is exact (decimal subtraction) but is then converted to
    /// `u64` saturating, and the resulting duration saturates at chrono's
    /// representable range, so absurd deltas yield a far-future clamp instead
    /// of overflowing.
    pub fn estimate_arrival(
        &self,
        requested: &BlockNumber,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if self.classify(requested) != RangeClass::Future {
            return None;
        }
        let latest = self.state.latest_known.as_ref()?;
        let remaining = requested.checked_sub(latest)?.to_u64_saturating();
        let secs = remaining.saturating_mul(self.block_interval_secs);
        let wait = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Some(now.checked_add_signed(wait).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    /// Best-effort head hint for navigation past the known latest block.
    ///
    /// Raises `latest_known` to `n` without having observed it, so the next
    /// block is not shown as future before the feed catches up. Never lowers
    /// the head and never touches the tail. Returns whether the head moved.
    pub fn hint_latest(&mut self, n: &BlockNumber) -> bool {
        match &self.state.latest_known {
            Some(latest) if n <= latest => false,
            _ => {
                log::debug!("[range] optimistic head hint -> {n}");
                self.state.latest_known = Some(n.clone());
                self.state.hinted = true;
                true
            }
        }
    }
}

/// Range tracker shared between feeds and views. All mutation goes through
/// the mutex; the guard is never held across an await.
#[derive(Clone, Debug, Default)]
pub struct SharedRange(Arc<Mutex<RangeTracker>>);

impl SharedRange {
    pub fn new(tracker: RangeTracker) -> Self {
        Self(Arc::new(Mutex::new(tracker)))
    }

    pub fn lock(&self) -> MutexGuard<'_, RangeTracker> {
        // Each bound is assigned whole, so state behind a poisoned lock is still valid.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn observe(&self, batch: &[Block]) -> RangeUpdate {
        self.lock().observe(batch)
    }

    pub fn observe_single(&self, block: &Block) -> RangeUpdate {
        self.lock().observe_single(block)
    }

    pub fn classify(&self, requested: &BlockNumber) -> RangeClass {
        self.lock().classify(requested)
    }

    pub fn snapshot(&self) -> RangeState {
        self.lock().snapshot()
    }

    pub fn hint_latest(&self, n: &BlockNumber) -> bool {
        self.lock().hint_latest(n)
    }

    pub fn estimate_arrival(&self, requested: &BlockNumber) -> Option<DateTime<Utc>> {
        self.lock().estimate_arrival(requested, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(number: &str) -> Block {
        Block {
            number: BlockNumber::parse(number).unwrap(),
            hash: format!("0x{number}"),
            parent_hash: String::new(),
            state_root: String::new(),
            extrinsics_root: String::new(),
            timestamp: 0,
            author_id: String::new(),
            finalized: false,
            extrinsics_count: 0,
            events_count: 0,
            logs_count: 0,
        }
    }

    fn n(s: &str) -> BlockNumber {
        BlockNumber::parse(s).unwrap()
    }

    #[test]
    fn unset_never_rejects() {
        let t = RangeTracker::default();
        assert_eq!(t.classify(&n("999999")), RangeClass::InRange);
        assert_eq!(t.classify(&n("0")), RangeClass::InRange);
    }

    #[test]
    fn classify_after_observe() {
        let mut t = RangeTracker::default();
        t.observe(&[block("99"), block("5")]);
        assert_eq!(t.classify(&n("100")), RangeClass::Future);
        assert_eq!(t.classify(&n("99")), RangeClass::InRange);
        assert_eq!(t.classify(&n("4")), RangeClass::Stale);
        assert_eq!(t.classify(&n("5")), RangeClass::InRange);
        assert_eq!(t.classify(&n("50")), RangeClass::InRange);
    }

    #[test]
    fn zero_is_a_real_bound() {
        let mut t = RangeTracker::default();
        t.observe_single(&block("0"));
        assert_eq!(t.oldest_known(), Some(&BlockNumber::zero()));
        assert_eq!(t.classify(&n("0")), RangeClass::InRange);
        assert_eq!(t.classify(&n("1")), RangeClass::Future);
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut t = RangeTracker::default();
        let update = t.observe(std::iter::empty());
        assert!(!update.changed());
        assert_eq!(t.snapshot(), RangeState::default());
    }

    #[test]
    fn observe_is_idempotent() {
        let mut t = RangeTracker::default();
        let batch = [block("10"), block("12"), block("11")];
        assert!(t.observe(&batch).changed());
        let first = t.snapshot();
        assert!(!t.observe(&batch).changed());
        assert_eq!(first, t.snapshot());
    }

    #[test]
    fn observe_is_monotone() {
        let mut t = RangeTracker::default();
        t.observe(&[block("100"), block("90")]);
        t.observe(&[block("95")]);
        assert_eq!(t.latest_known(), Some(&n("100")));
        assert_eq!(t.oldest_known(), Some(&n("90")));
        t.observe(&[block("101"), block("89")]);
        assert_eq!(t.latest_known(), Some(&n("101")));
        assert_eq!(t.oldest_known(), Some(&n("89")));
    }

    #[test]
    fn observe_uses_decimal_order() {
        // String order would pick "9" as the max.
        let mut t = RangeTracker::default();
        t.observe(&[block("9"), block("10"), block("100")]);
        assert_eq!(t.latest_known(), Some(&n("100")));
        assert_eq!(t.oldest_known(), Some(&n("9")));
    }

    #[test]
    fn arrival_estimate_only_for_future() {
        let mut t = RangeTracker::new(6);
        t.observe(&[block("100"), block("50")]);
        let now = Utc::now();
        assert_eq!(t.estimate_arrival(&n("100"), now), None);
        assert_eq!(t.estimate_arrival(&n("10"), now), None);
        assert_eq!(
            t.estimate_arrival(&n("110"), now),
            Some(now + Duration::seconds(60))
        );
    }

    #[test]
    fn arrival_estimate_saturates() {
        let mut t = RangeTracker::new(6);
        t.observe_single(&block("1"));
        let far = n("999999999999999999999999999999");
        let eta = t.estimate_arrival(&far, Utc::now()).unwrap();
        assert!(eta > Utc::now() + Duration::days(365 * 1000));
    }

    #[test]
    fn hint_raises_head_and_is_cleared_by_observation() {
        let mut t = RangeTracker::default();
        t.observe(&[block("100"), block("1")]);
        assert!(t.hint_latest(&n("101")));
        assert_eq!(t.classify(&n("101")), RangeClass::InRange);
        assert!(t.snapshot().hinted);

        // hint never lowers the head
        assert!(!t.hint_latest(&n("50")));
        assert_eq!(t.latest_known(), Some(&n("101")));

        t.observe_single(&block("100"));
        assert!(t.snapshot().hinted);
        t.observe_single(&block("101"));
        assert!(!t.snapshot().hinted);
        assert_eq!(t.oldest_known(), Some(&n("1")));
    }

    #[test]
    fn shared_range_serializes_updates() {
        let shared = SharedRange::default();
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for j in 0..50u64 {
                        shared.observe_single(&block(&(i * 100 + j).to_string()));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let s = shared.snapshot();
        assert_eq!(s.latest_known, Some(n("749")));
        assert_eq!(s.oldest_known, Some(n("0")));
    }

    mod props {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn observe_tracks_min_and_max(batches in vec(vec(0u64..1_000_000, 0..8), 1..12)) {
                let mut t = RangeTracker::default();
                let mut lo: Option<u64> = None;
                let mut hi: Option<u64> = None;
                for batch in &batches {
                    let blocks: Vec<Block> = batch.iter().map(|x| block(&x.to_string())).collect();
                    let before = t.snapshot();
                    t.observe(&blocks);
                    let after = t.snapshot();

                    if let (Some(b), Some(a)) = (&before.latest_known, &after.latest_known) {
                        prop_assert!(a >= b);
                    }
                    if let (Some(b), Some(a)) = (&before.oldest_known, &after.oldest_known) {
                        prop_assert!(a <= b);
                    }

                    // same batch twice changes nothing
                    prop_assert!(!t.observe(&blocks).changed());
                    prop_assert_eq!(&t.snapshot(), &after);

                    for &x in batch {
                        lo = Some(lo.map_or(x, |l| l.min(x)));
                        hi = Some(hi.map_or(x, |h| h.max(x)));
                    }
                    prop_assert_eq!(after.latest_known, hi.map(BlockNumber::from));
                    prop_assert_eq!(after.oldest_known, lo.map(BlockNumber::from));
                }
            }

            #[test]
            fn classify_agrees_with_bounds(seen in vec(0u64..10_000, 1..20), requested in 0u64..12_000) {
                let mut t = RangeTracker::default();
                let blocks: Vec<Block> = seen.iter().map(|x| block(&x.to_string())).collect();
                t.observe(&blocks);
                let (lo, hi) = (*seen.iter().min().unwrap(), *seen.iter().max().unwrap());
                let expected = if requested > hi {
                    RangeClass::Future
                } else if requested < lo {
                    RangeClass::Stale
                } else {
                    RangeClass::InRange
                };
                prop_assert_eq!(t.classify(&BlockNumber::from(requested)), expected);
            }
        }
    }
}
