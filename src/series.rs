//! Line-oriented log parsing and gap interpolation.
//!
//! Hive logs are CSV with one record per capture slot. A sensor that failed
//! to produce a reading leaves the literal `nan` in its column, and the
//! cleaning policy here is deterministic: single gaps become the midpoint of
//! their neighbors, double gaps become two equally spaced points on the line
//! between the neighbors, and anything longer is recorded as a failure and
//! left missing. The full uninterpolated record is kept alongside the plot
//! series so a reading is never silently invented without being marked.

use std::collections::BTreeSet;
use std::fmt;

use log::debug;

pub const MISSING_SENTINEL: &str = "nan"; // Literal the firmware logs for a failed reading

/// One ledger entry: a resolved number or a reading that stayed missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LedgerValue {
    Number(f64),
    Missing,
}

impl fmt::Display for LedgerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerValue::Number(value) => write!(f, "{}", value),
            LedgerValue::Missing => write!(f, "{}", MISSING_SENTINEL),
        }
    }
}

/// Accumulator for one sensor channel, fed records in strict file order.
///
/// Two parallel views build up: the plot series (`plot_*`, numeric points
/// only, interpolated values included once resolved) and the ledger
/// (`ledger_*`, every record including ones that stayed missing).
/// `interpolated_indices` are ledger positions that were filled in rather
/// than measured.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SeriesState {
    pub plot_labels: Vec<String>,
    pub plot_values: Vec<f64>,
    pub ledger_labels: Vec<String>,
    pub ledger_values: Vec<LedgerValue>,
    pub interpolated_indices: BTreeSet<usize>,
    pub nan_count: u32,
    pub failure_count: u32,
    pending_gap: Vec<String>,
}

impl SeriesState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one record.
    ///
    /// A `nan` value opens (or extends) a gap. A numeric value first closes
    /// any open gap, then is appended to both views:
    /// - gap of 1 with a prior plotted value: filled with the midpoint of the
    ///   flanking values
    /// - gap of 2 with a prior plotted value: filled with two points stepping
    ///   a third of the way each (a linear ramp, not two midpoints)
    /// - gap of 3 or more: counted as one failure, every slot left missing
    /// - any gap before the first real value: left missing, nothing to
    ///   interpolate from
    ///
    /// A value that is neither `nan` nor numeric is dropped with a debug log
    /// and leaves the state untouched.
    pub fn observe(&mut self, label: &str, raw_value: &str) {
        let label = normalize_label(label);
        let value = raw_value.trim();

        if value == MISSING_SENTINEL {
            self.nan_count += 1;
            self.pending_gap.push(label);
            return;
        }

        let value: f64 = match value.parse() {
            Ok(value) => value,
            Err(_) => {
                debug!("Dropping unparseable reading {:?} at {}", raw_value, label);
                return;
            }
        };

        if !self.pending_gap.is_empty() {
            self.close_gap(value);
        }
        self.push_real(label, value);
    }

    /// Flush a still-open trailing gap at end of stream.
    ///
    /// There is no following value to interpolate toward, so every pending
    /// slot goes to the ledger as missing; a run of 3 or more still counts
    /// as a failure.
    pub fn finish(&mut self) {
        if self.pending_gap.len() >= 3 {
            self.failure_count += 1;
        }
        let gap = std::mem::take(&mut self.pending_gap);
        for label in gap {
            self.push_missing(label);
        }
    }

    fn close_gap(&mut self, next_value: f64) {
        let gap = std::mem::take(&mut self.pending_gap);
        let last = self.plot_values.last().copied();
        match (gap.as_slice(), last) {
            ([slot], Some(last)) => {
                let midpoint = (last + next_value) / 2.0;
                self.push_interpolated(slot.clone(), midpoint);
            }
            ([first, second], Some(last)) => {
                let step = (next_value - last) / 3.0;
                let first_value = last + step;
                let second_value = first_value + step;
                self.push_interpolated(first.clone(), first_value);
                self.push_interpolated(second.clone(), second_value);
            }
            _ => {
                // Run too long to interpolate, or nothing before it to
                // interpolate from
                if gap.len() >= 3 {
                    self.failure_count += 1;
                }
                for label in gap {
                    self.push_missing(label);
                }
            }
        }
    }

    fn push_real(&mut self, label: String, value: f64) {
        self.plot_labels.push(label.clone());
        self.plot_values.push(value);
        self.ledger_labels.push(label);
        self.ledger_values.push(LedgerValue::Number(value));
    }

    fn push_interpolated(&mut self, label: String, value: f64) {
        self.plot_labels.push(label.clone());
        self.plot_values.push(value);
        self.ledger_labels.push(label);
        self.ledger_values.push(LedgerValue::Number(value));
        self.interpolated_indices.insert(self.ledger_values.len() - 1);
    }

    fn push_missing(&mut self, label: String) {
        self.ledger_labels.push(label);
        self.ledger_values.push(LedgerValue::Missing);
    }
}

/// Normalize a record label into the short time-of-day form: quote characters
/// removed, dashes turned into colons, then cut to six characters.
fn normalize_label(raw: &str) -> String {
    raw.replace('"', "").replace('-', ":").chars().take(6).collect()
}

/// Parse a whole log into series state, reading one value column.
///
/// Records are newline-separated, fields comma-separated. A field may carry a
/// `|status` suffix (the humidity column does); only the part before the pipe
/// is the value. Blank lines and records without the requested column are
/// skipped.
pub fn parse_series(text: &str, value_column: usize) -> SeriesState {
    let mut state = SeriesState::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        let value = match fields.get(value_column) {
            Some(value) => match value.split_once('|') {
                Some((value, _status)) => value,
                None => *value,
            },
            None => {
                debug!("Skipping short record {:?}", line);
                continue;
            }
        };
        state.observe(fields[0], value);
    }
    state.finish();
    state
}
