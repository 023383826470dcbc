use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitAndAssign, BitOrAssign, BitXorAssign, RangeInclusive, SubAssign};
use std::sync::Arc;

use itertools::Itertools;
use smallvec::SmallVec;

use crate::iter::Values;
use crate::run::Run;

/// Run storage. Small selections (a point, a row of a grid) fit in the
/// handle's single allocation.
pub(crate) type RunList = SmallVec<[Run; 4]>;

/// An ordered set of `u32` values, compressed as a sorted list of disjoint,
/// non-adjacent runs. Space is proportional to the number of runs, never to
/// the number of values, so a set covering the whole 32-bit domain is as
/// cheap as a singleton.
///
/// Cloning is a constant-time operation: clones share their storage until
/// one of them is mutated, at which point the writer privatizes its copy.
/// Observable behavior is always that of an independent value.
///
/// Range ends are computed in 64 bits internally; asking for a range that
/// extends past `u32::MAX` is a caller error (debug-asserted, saturated in
/// release builds).
///
/// ```
/// use rangeset::RangeSet;
///
/// let mut set = RangeSet::new_range(10, 10);
/// set.add(25);
/// set.remove_range(12, 3);
///
/// assert_eq!(set.size(), 8);
/// assert_eq!(set.minimum(), 10);
/// assert_eq!(set.maximum(), 25);
/// assert!(set.contains(11) && !set.contains(13));
/// ```
pub struct RangeSet {
    runs: Arc<RunList>,
}

impl RangeSet {
    /// Returns the empty set.
    pub fn new() -> RangeSet {
        RangeSet {
            runs: Arc::new(RunList::new()),
        }
    }

    /// Returns the set holding the `n_items` values starting at `start`.
    /// Empty when `n_items == 0`.
    pub fn new_range(start: u32, n_items: u32) -> RangeSet {
        let mut set = RangeSet::new();
        set.add_range(start, n_items);
        set
    }

    pub(crate) fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Privatizes storage before a write. All mutation funnels through here,
    /// which is what makes cloning a constant-time copy.
    fn runs_mut(&mut self) -> &mut RunList {
        Arc::make_mut(&mut self.runs)
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Smallest member of the set, or `u32::MAX` if the set is empty.
    ///
    /// The sentinel makes the common `for v in set.minimum()..=set.maximum()`
    /// probing loop degenerate for empty sets; use `set.iter().next()` for
    /// the `Option` form.
    pub fn minimum(&self) -> u32 {
        self.runs.first().map_or(u32::MAX, Run::start)
    }

    /// Largest member of the set, or `0` if the set is empty.
    pub fn maximum(&self) -> u32 {
        self.runs.last().map_or(0, Run::last)
    }

    /// Number of values in the set. The full 32-bit domain holds `1 << 32`
    /// values, hence the wider return type.
    pub fn size(&self) -> u64 {
        self.runs.iter().map(Run::len).sum()
    }

    /// Number of values in the set that fall inside `[first, last]`.
    /// Returns `0` when `last < first`.
    pub fn size_in_range(&self, first: u32, last: u32) -> u64 {
        if last < first {
            return 0;
        }
        let window = Run::new(first, last);
        let lo = self.runs.partition_point(|r| r.last() < first);
        self.runs[lo..]
            .iter()
            .take_while(|r| r.overlaps(&window))
            .map(|r| r.last().min(last) as u64 - r.start().max(first) as u64 + 1)
            .sum()
    }

    pub fn contains(&self, value: u32) -> bool {
        self.find(value).is_ok()
    }

    /// Index of the run holding `value`, or the index where a run for it
    /// would be inserted.
    fn find(&self, value: u32) -> Result<usize, usize> {
        self.runs.binary_search_by(|run| {
            if run.last() < value {
                Ordering::Less
            } else if run.start() > value {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
    }

    /// Value of the `position`-th member in ascending order, or `0` when
    /// `position >= self.size()`.
    pub fn nth(&self, position: u64) -> u32 {
        let mut remaining = position;
        for run in self.runs.iter() {
            if remaining < run.len() {
                return run.start() + remaining as u32;
            }
            remaining -= run.len();
        }
        0
    }

    /// Inserts a single value. Adding a value already in the set is a no-op.
    pub fn add(&mut self, value: u32) {
        self.insert_run(Run::new(value, value));
    }

    /// Removes a single value. Removing an absent value is a no-op.
    pub fn remove(&mut self, value: u32) {
        self.delete_run(Run::new(value, value));
    }

    /// Inserts the `n_items` values starting at `start`.
    pub fn add_range(&mut self, start: u32, n_items: u32) {
        if n_items == 0 {
            return;
        }
        let last = start as u64 + n_items as u64 - 1;
        debug_assert!(last <= u32::MAX as u64, "range extends past the value domain");
        self.insert_run(Run::new(start, last.min(u32::MAX as u64) as u32));
    }

    /// Inserts every value in `[first, last]`. No-op when `last < first`.
    ///
    /// Unlike [`RangeSet::add_range`], this form can express the range ending
    /// at `u32::MAX`.
    pub fn add_range_closed(&mut self, first: u32, last: u32) {
        if last < first {
            return;
        }
        self.insert_run(Run::new(first, last));
    }

    /// Removes the `n_items` values starting at `start`. A run covering more
    /// than the removed range is split in two.
    pub fn remove_range(&mut self, start: u32, n_items: u32) {
        if n_items == 0 {
            return;
        }
        let last = start as u64 + n_items as u64 - 1;
        debug_assert!(last <= u32::MAX as u64, "range extends past the value domain");
        self.delete_run(Run::new(start, last.min(u32::MAX as u64) as u32));
    }

    /// Removes every value. The set keeps no memory of its previous runs.
    pub fn remove_all(&mut self) {
        self.runs = Arc::new(RunList::new());
    }

    /// Interprets the value domain as a row-major grid with rows `stride`
    /// wide and adds a `width` by `height` rectangle of values whose top-left
    /// corner is `start`. Purely an arithmetic expansion: one range insertion
    /// per row, with no bounds other than `width <= stride`.
    pub fn add_rectangle(&mut self, start: u32, width: u32, height: u32, stride: u32) {
        debug_assert!(width <= stride, "rectangle rows may not overlap");
        for row in 0..height {
            self.add_range(start + row * stride, width);
        }
    }

    /// Removes a rectangle of values; the dual of [`RangeSet::add_rectangle`].
    pub fn remove_rectangle(&mut self, start: u32, width: u32, height: u32, stride: u32) {
        debug_assert!(width <= stride, "rectangle rows may not overlap");
        for row in 0..height {
            self.remove_range(start + row * stride, width);
        }
    }

    /// Adds every value of `other` to the set. `other` is unchanged.
    pub fn union(&mut self, other: &RangeSet) {
        if other.is_empty() || Arc::ptr_eq(&self.runs, &other.runs) {
            return;
        }
        if self.is_empty() {
            self.runs = Arc::clone(&other.runs);
            return;
        }
        self.apply(other, |a, b| a | b);
    }

    /// Keeps only the values also present in `other`. `other` is unchanged.
    pub fn intersect(&mut self, other: &RangeSet) {
        if self.is_empty() || Arc::ptr_eq(&self.runs, &other.runs) {
            return;
        }
        if other.is_empty() {
            self.remove_all();
            return;
        }
        self.apply(other, |a, b| a & b);
    }

    /// Removes every value present in `other`. `other` is unchanged.
    pub fn subtract(&mut self, other: &RangeSet) {
        if self.is_empty() || other.is_empty() {
            return;
        }
        if Arc::ptr_eq(&self.runs, &other.runs) {
            self.remove_all();
            return;
        }
        self.apply(other, |a, b| a & !b);
    }

    /// Keeps the values present in exactly one of `self` and `other` (the
    /// symmetric difference). `other` is unchanged.
    pub fn difference(&mut self, other: &RangeSet) {
        if Arc::ptr_eq(&self.runs, &other.runs) {
            self.remove_all();
            return;
        }
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            self.runs = Arc::clone(&other.runs);
            return;
        }
        self.apply(other, |a, b| a ^ b);
    }

    /// Shifts every value down by `amount`; values smaller than `amount`
    /// fall off the domain and are discarded.
    pub fn shift_left(&mut self, amount: u32) {
        if amount == 0 || self.is_empty() {
            return;
        }
        let mut out = RunList::new();
        for run in self.runs.iter() {
            if run.last() < amount {
                continue;
            }
            out.push(Run::new(run.start().saturating_sub(amount), run.last() - amount));
        }
        self.runs = Arc::new(out);
    }

    /// Shifts every value up by `amount`; values pushed past `u32::MAX`
    /// are discarded.
    pub fn shift_right(&mut self, amount: u32) {
        if amount == 0 || self.is_empty() {
            return;
        }
        let mut out = RunList::new();
        for run in self.runs.iter() {
            let Some(start) = run.start().checked_add(amount) else {
                // this and every later run lies entirely past the domain
                break;
            };
            out.push(Run::new(start, run.last().saturating_add(amount)));
        }
        self.runs = Arc::new(out);
    }

    /// Mirrors an items-changed notification of a list model: deletes the
    /// `removed` positions starting at `position`, then opens up `added`
    /// empty positions there. Values below `position` stay put; values at or
    /// above `position + removed` move to `value - removed + added`. Values
    /// pushed past `u32::MAX` are discarded.
    pub fn splice(&mut self, position: u32, removed: u32, added: u32) {
        self.remove_range(position, removed);
        if removed == added {
            return;
        }
        let delta = added as i64 - removed as i64;
        let mut out = RunList::new();
        for run in self.runs.iter() {
            if run.last() < position {
                out.push(*run);
                continue;
            }
            if run.start() < position {
                // only reachable when `removed == 0`: the run straddles the
                // insertion point and splits around it
                out.push(Run::new(run.start(), position - 1));
            }
            let start = run.start().max(position) as i64 + delta;
            let last = run.last() as i64 + delta;
            if start > u32::MAX as i64 {
                break;
            }
            debug_assert!(start >= 0);
            push_coalesced(&mut out, start as u32, last.min(u32::MAX as i64) as u32);
        }
        self.runs = Arc::new(out);
    }

    /// Iterator over the members in ascending order.
    pub fn iter(&self) -> Values<'_> {
        Values::new(self.runs())
    }

    /// Iterator over the runs of the set as inclusive ranges, in ascending
    /// order. Useful for consumers that can process whole blocks at once.
    pub fn iter_runs(&self) -> impl DoubleEndedIterator<Item = RangeInclusive<u32>> + '_ {
        self.runs.iter().map(|run| (*run).into())
    }

    /// Inserts `run`, merging it with every run it overlaps or touches.
    fn insert_run(&mut self, run: Run) {
        // window of runs that merge with the new one: everything whose
        // values overlap or directly neighbor [run.start, run.last]
        let lo = self.runs.partition_point(|r| (r.last() as u64) + 1 < run.start() as u64);
        let hi = self.runs.partition_point(|r| r.start() as u64 <= run.last() as u64 + 1);
        debug_assert!(lo <= hi);
        debug_assert!(self.runs[lo..hi].iter().all(|r| r.touches(&run)));

        if lo == hi {
            self.runs_mut().insert(lo, run);
            return;
        }
        let merged = run.merge(&self.runs[lo]).merge(&self.runs[hi - 1]);
        if merged == self.runs[lo] {
            // already covered, don't privatize shared storage
            return;
        }
        let runs = self.runs_mut();
        runs[lo] = merged;
        runs.drain(lo + 1..hi);
    }

    /// Removes every value of `run` from the set, trimming or splitting the
    /// runs at the boundary.
    fn delete_run(&mut self, run: Run) {
        let lo = self.runs.partition_point(|r| r.last() < run.start());
        let hi = self.runs.partition_point(|r| r.start() <= run.last());
        if lo >= hi {
            return;
        }
        let head = (self.runs[lo].start() < run.start())
            .then(|| Run::new(self.runs[lo].start(), run.start() - 1));
        let tail = (self.runs[hi - 1].last() > run.last())
            .then(|| Run::new(run.last() + 1, self.runs[hi - 1].last()));
        let runs = self.runs_mut();
        match (head, tail) {
            (Some(head), Some(tail)) => {
                if hi - lo == 1 {
                    runs[lo] = head;
                    runs.insert(lo + 1, tail);
                } else {
                    runs[lo] = head;
                    runs[lo + 1] = tail;
                    runs.drain(lo + 2..hi);
                }
            }
            (Some(head), None) => {
                runs[lo] = head;
                runs.drain(lo + 1..hi);
            }
            (None, Some(tail)) => {
                runs[hi - 1] = tail;
                runs.drain(lo..hi - 1);
            }
            (None, None) => {
                runs.drain(lo..hi);
            }
        }
    }

    fn apply(&mut self, other: &RangeSet, keep: fn(bool, bool) -> bool) {
        self.runs = Arc::new(combine(self.runs(), other.runs(), keep));
    }
}

/// Walks the boundaries of both run lists in one merged pass and keeps the
/// windows selected by `keep`, coalescing adjacent output windows. Runtime is
/// linear in the total number of runs of both operands; the number of values
/// they cover never enters the picture.
fn combine(a: &[Run], b: &[Run], keep: fn(bool, bool) -> bool) -> RunList {
    // Every run contributes its start and the position one past its end.
    // Within one list these positions are strictly increasing, so the two
    // streams merge like sorted sequences. Positions are widened to u64 so
    // that a run ending at u32::MAX has a representable end.
    let bounds = edges(a).merge(edges(b)).dedup();

    let mut out = RunList::new();
    let (mut ai, mut bi) = (0, 0);
    for (lo, hi) in bounds.tuple_windows() {
        while ai < a.len() && (a[ai].last() as u64) < lo {
            ai += 1;
        }
        while bi < b.len() && (b[bi].last() as u64) < lo {
            bi += 1;
        }
        // membership is constant on [lo, hi): every change of membership in
        // either operand is itself a boundary
        let in_a = ai < a.len() && a[ai].start() as u64 <= lo;
        let in_b = bi < b.len() && b[bi].start() as u64 <= lo;
        if keep(in_a, in_b) {
            push_coalesced(&mut out, lo as u32, (hi - 1) as u32);
        }
    }
    out
}

fn edges(runs: &[Run]) -> impl Iterator<Item = u64> + '_ {
    runs.iter().flat_map(|run| [run.start() as u64, run.last() as u64 + 1])
}

fn push_coalesced(out: &mut RunList, start: u32, last: u32) {
    if let Some(prev) = out.last_mut() {
        if prev.last() as u64 + 1 == start as u64 {
            *prev = Run::new(prev.start(), last);
            return;
        }
    }
    out.push(Run::new(start, last));
}

impl Default for RangeSet {
    fn default() -> RangeSet {
        RangeSet::new()
    }
}

impl Clone for RangeSet {
    /// Constant-time copy sharing storage with the original; the storage is
    /// privatized when either copy is next mutated.
    fn clone(&self) -> RangeSet {
        RangeSet {
            runs: Arc::clone(&self.runs),
        }
    }
}

impl PartialEq for RangeSet {
    /// Membership equality. The run list is canonical, so two sets hold the
    /// same values exactly when their runs are identical.
    fn eq(&self, other: &RangeSet) -> bool {
        Arc::ptr_eq(&self.runs, &other.runs) || self.runs == other.runs
    }
}

impl Eq for RangeSet {}

impl fmt::Debug for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for run in self.runs.iter() {
            set.entry(&RangeInclusive::from(*run));
        }
        set.finish()
    }
}

impl Extend<u32> for RangeSet {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<u32> for RangeSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> RangeSet {
        let mut set = RangeSet::new();
        set.extend(iter);
        set
    }
}

impl BitOrAssign<&RangeSet> for RangeSet {
    #[inline]
    fn bitor_assign(&mut self, rhs: &RangeSet) {
        self.union(rhs);
    }
}

impl BitAndAssign<&RangeSet> for RangeSet {
    #[inline]
    fn bitand_assign(&mut self, rhs: &RangeSet) {
        self.intersect(rhs);
    }
}

impl SubAssign<&RangeSet> for RangeSet {
    #[inline]
    fn sub_assign(&mut self, rhs: &RangeSet) {
        self.subtract(rhs);
    }
}

impl BitXorAssign<&RangeSet> for RangeSet {
    #[inline]
    fn bitxor_assign(&mut self, rhs: &RangeSet) {
        self.difference(rhs);
    }
}
