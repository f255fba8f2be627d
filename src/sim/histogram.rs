use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PgResult, ensure_config};
use crate::sim::emission::PhotonEvent;

/// Largest number of bins a histogram may allocate.
pub const MAX_HISTOGRAM_BINS: usize = 10_000_000;

/// One bin of an [`ArrivalTimeHistogram`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    /// Bin start in ns (inclusive).
    pub start: f64,
    /// Bin end in ns (exclusive, except for the last bin).
    pub end: f64,
    pub count: u64,
}

impl HistogramBin {
    pub fn centre(&self) -> f64 {
        0.5 * (self.start + self.end)
    }
}

/// Fixed-width histogram of measured arrival times.
///
/// Bins span `[min, max]` of the recorded times. Bin `i` counts times in
/// `[start + i*w, start + (i+1)*w)`; the maximum is placed in the last bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalTimeHistogram {
    /// Time of the first bin edge in ns.
    pub start: f64,
    /// Bin width in ns.
    pub bin_width: f64,
    counts: Vec<u64>,
}

impl ArrivalTimeHistogram {
    /// Bins raw arrival times. No times gives a histogram with no bins.
    pub fn from_times(times: &[f64], bin_width: f64) -> PgResult<Self> {
        ensure_config!(
            bin_width > 0.0 && bin_width.is_finite(),
            "histogram bin width must be positive, got {bin_width} ns"
        );
        if times.is_empty() {
            return Ok(Self {
                start: 0.0,
                bin_width,
                counts: Vec::new(),
            });
        }
        let start = crate::vecutils::min(times);
        let end = crate::vecutils::max(times);
        let span_bins = ((end - start) / bin_width).floor();
        ensure_config!(
            span_bins < MAX_HISTOGRAM_BINS as f64,
            "bin width {bin_width} ns over [{start}, {end}] ns needs more than \
             {MAX_HISTOGRAM_BINS} bins"
        );
        let num_bins = span_bins as usize + 1;

        let mut counts = vec![0u64; num_bins];
        for &t in times {
            let bin = (((t - start) / bin_width) as usize).min(num_bins - 1);
            counts[bin] += 1;
        }
        debug!(
            events = times.len(),
            bins = num_bins,
            start,
            end,
            "binned arrival times"
        );
        Ok(Self {
            start,
            bin_width,
            counts,
        })
    }

    pub fn from_events(events: &[PhotonEvent], bin_width: f64) -> PgResult<Self> {
        let times: Vec<f64> = events.iter().map(|e| e.measured_time).collect();
        Self::from_times(&times, bin_width)
    }

    /// Bins a lazy event sequence. Only the arrival times are kept in memory.
    pub fn from_stream<I>(events: I, bin_width: f64) -> PgResult<Self>
    where
        I: IntoIterator<Item = PhotonEvent>,
    {
        let times: Vec<f64> = events.into_iter().map(|e| e.measured_time).collect();
        Self::from_times(&times, bin_width)
    }

    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn count(&self, bin: usize) -> u64 {
        self.counts[bin]
    }

    /// Time interval `[start, end)` of bin `i` in ns.
    pub fn bin_range(&self, i: usize) -> (f64, f64) {
        let lo = self.start + i as f64 * self.bin_width;
        (lo, lo + self.bin_width)
    }

    pub fn bin_centre(&self, i: usize) -> f64 {
        self.start + (i as f64 + 0.5) * self.bin_width
    }

    pub fn bin(&self, i: usize) -> HistogramBin {
        let (start, end) = self.bin_range(i);
        HistogramBin {
            start,
            end,
            count: self.counts[i],
        }
    }

    /// Total number of binned events.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Bins with at least one event.
    pub fn non_empty(&self) -> impl Iterator<Item = HistogramBin> + '_ {
        (0..self.counts.len())
            .filter(|&i| self.counts[i] > 0)
            .map(|i| self.bin(i))
    }
}
