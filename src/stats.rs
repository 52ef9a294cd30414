//! Low-level occupancy statistics for tuning hashers and sizing tables.
//!
//! Available with the `stats` feature.

use alloc::vec::Vec;

/// Distribution of entry displacements: how many slots past its home slot
/// each entry sits.
///
/// Produced by [`HashTable::probe_histogram`].
///
/// [`HashTable::probe_histogram`]: crate::HashTable::probe_histogram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    bins: Vec<usize>,
    populated: usize,
}

impl ProbeHistogram {
    pub(crate) fn new(bins: Vec<usize>, populated: usize) -> Self {
        debug_assert_eq!(bins.iter().sum::<usize>(), populated);
        Self { bins, populated }
    }

    /// Bin `d` holds the number of entries displaced by `d` slots. There is
    /// one bin per slot of the probe window.
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Number of entries counted.
    pub fn populated(&self) -> usize {
        self.populated
    }

    /// The largest displacement of any entry, or `None` for an empty table.
    pub fn max_displacement(&self) -> Option<usize> {
        self.bins.iter().rposition(|&count| count > 0)
    }

    /// Average displacement over all entries; `0.0` for an empty table.
    pub fn mean_displacement(&self) -> f64 {
        if self.populated == 0 {
            return 0.0;
        }

        let total: usize = self
            .bins
            .iter()
            .enumerate()
            .map(|(distance, &count)| distance * count)
            .sum();
        total as f64 / self.populated as f64
    }

    /// Pretty-prints the histogram as a horizontal bar chart on stdout, one
    /// row per displacement.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.bins.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!(
            "probe histogram ({} entries, mean displacement {:.3}):",
            self.populated,
            self.mean_displacement()
        );

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = match units % 8 {
                1 => Some('▏'),
                2 => Some('▎'),
                3 => Some('▍'),
                4 => Some('▌'),
                5 => Some('▋'),
                6 => Some('▊'),
                7 => Some('▉'),
                _ => None,
            };
            bar.extend(partial);
            bar
        };

        for (distance, &count) in self.bins.iter().enumerate() {
            println!("{:>2} | {} ({})", distance, make_bar(count), count);
        }
    }
}

/// Debug statistics for hash table analysis.
///
/// Produced by [`HashTable::debug_stats`].
///
/// [`HashTable::debug_stats`]: crate::HashTable::debug_stats
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries currently in the table
    pub populated: usize,
    /// Power-of-two table size that hash codes are masked with
    pub table_size: usize,
    /// Length of every probe window
    pub max_probe_length: usize,
    /// Total number of slots allocated, including the overflow region
    pub total_slots: usize,
    /// Number of live entries stored past `table_size`
    pub overflow_occupied: usize,
    /// Load factor (populated / table_size)
    pub load_factor: f64,
    /// Slot utilization (populated / total_slots)
    pub slot_utilization: f64,
    /// Total memory in bytes used by the slot arrays
    pub total_bytes: usize,
    /// Memory in bytes held by empty slots
    pub wasted_bytes: usize,
}

impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.table_size,
            self.load_factor * 100.0
        );
        println!(
            "Slot Usage: {}/{} ({:.2}% utilization)",
            self.populated,
            self.total_slots,
            self.slot_utilization * 100.0
        );
        println!("Probe Window: {} slots", self.max_probe_length);
        println!("Overflow Region: {} entries", self.overflow_occupied);
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes wasted ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}
