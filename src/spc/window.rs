//! Bounded measurement window for one analyte.
//!
//! A ring buffer holding the most recent `capacity` measurements in run
//! order. Once full, each push overwrites the oldest slot and hands the
//! evicted measurement back to the caller.
//!
//! # Invariants
//!
//! - `len() <= capacity()`
//! - run indices are strictly increasing from oldest to newest
//! - every stored value is finite

use super::chart::Measurement;
use crate::error::{QcError, Result};

/// Fixed-capacity FIFO of measurements for a single analyte.
///
/// # Examples
///
/// ```
/// use u_labqc::spc::{Measurement, MeasurementWindow};
///
/// let mut window = MeasurementWindow::new("creatinine", 2).unwrap();
/// assert!(window.push(Measurement::new("creatinine", 1, 1.00)).unwrap().is_none());
/// assert!(window.push(Measurement::new("creatinine", 2, 1.02)).unwrap().is_none());
/// let evicted = window.push(Measurement::new("creatinine", 3, 0.98)).unwrap();
/// assert_eq!(evicted.map(|m| m.run_index), Some(1));
/// assert_eq!(window.values(), vec![1.02, 0.98]);
/// ```
#[derive(Debug, Clone)]
pub struct MeasurementWindow {
    analyte_id: String,
    capacity: usize,
    /// Storage; grows to `capacity` then is overwritten in place.
    slots: Vec<Measurement>,
    /// Slot holding the oldest measurement once the buffer is full.
    head: usize,
    /// Run index of the last accepted measurement; survives `clear`.
    last_run_index: Option<u64>,
}

impl MeasurementWindow {
    /// Creates an empty window.
    ///
    /// # Errors
    ///
    /// [`QcError::InvalidConfig`] if `capacity` is zero.
    pub fn new(analyte_id: impl Into<String>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(QcError::config("window_capacity", "must be at least 1"));
        }
        Ok(Self {
            analyte_id: analyte_id.into(),
            capacity,
            slots: Vec::with_capacity(capacity),
            head: 0,
            last_run_index: None,
        })
    }

    /// Appends a measurement, returning the evicted one when full.
    ///
    /// The window is left untouched when the measurement is rejected.
    ///
    /// # Errors
    ///
    /// - [`QcError::AnalyteMismatch`] if the measurement belongs to another analyte
    /// - [`QcError::NonFiniteValue`] if the value is NaN or infinite
    /// - [`QcError::OutOfOrder`] if `run_index` does not exceed the last accepted one
    ///
    /// # Complexity
    ///
    /// Time: O(1), no allocation once full
    pub fn push(&mut self, measurement: Measurement) -> Result<Option<Measurement>> {
        if measurement.analyte_id != self.analyte_id {
            return Err(QcError::AnalyteMismatch {
                expected: self.analyte_id.clone(),
                got: measurement.analyte_id,
            });
        }
        if !measurement.value.is_finite() {
            return Err(QcError::NonFiniteValue {
                analyte_id: measurement.analyte_id,
                run_index: measurement.run_index,
            });
        }
        if let Some(last) = self.last_run_index {
            if measurement.run_index <= last {
                return Err(QcError::OutOfOrder {
                    analyte_id: measurement.analyte_id,
                    last,
                    got: measurement.run_index,
                });
            }
        }

        self.last_run_index = Some(measurement.run_index);
        if self.slots.len() < self.capacity {
            self.slots.push(measurement);
            return Ok(None);
        }
        let evicted = std::mem::replace(&mut self.slots[self.head], measurement);
        self.head = (self.head + 1) % self.capacity;
        Ok(Some(evicted))
    }

    pub fn analyte_id(&self) -> &str {
        &self.analyte_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Run index of the last accepted measurement, even if since evicted or cleared.
    pub fn last_run_index(&self) -> Option<u64> {
        self.last_run_index
    }

    /// Measurement at position `i`, counting from the oldest (0).
    pub fn get(&self, i: usize) -> Option<&Measurement> {
        if i >= self.slots.len() {
            return None;
        }
        self.slots.get((self.head + i) % self.capacity)
    }

    /// Most recent measurement.
    pub fn latest(&self) -> Option<&Measurement> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// The held measurements as two contiguous runs, older run first.
    pub fn as_slices(&self) -> (&[Measurement], &[Measurement]) {
        // head stays 0 until the buffer first fills
        (&self.slots[self.head..], &self.slots[..self.head])
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Measurement> + '_ {
        let (older, newer) = self.as_slices();
        older.iter().chain(newer.iter())
    }

    /// The last `k` measurements, oldest first, or `None` if fewer are held.
    ///
    /// # Complexity
    ///
    /// Time: O(1) to build, no allocation
    pub fn tail(&self, k: usize) -> Option<impl DoubleEndedIterator<Item = &Measurement> + '_> {
        let skip = self.len().checked_sub(k)?;
        let (older, newer) = self.as_slices();
        let (older, newer) = if skip < older.len() {
            (&older[skip..], newer)
        } else {
            (&older[older.len()..], &newer[skip - older.len()..])
        };
        Some(older.iter().chain(newer.iter()))
    }

    /// Values oldest to newest.
    pub fn values(&self) -> Vec<f64> {
        self.iter().map(|m| m.value).collect()
    }

    /// Drops every held measurement. The ordering guard is kept, so a
    /// cleared window still rejects stale run indices.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn length_bounded_and_order_preserved(
            capacity in 1_usize..20,
            values in proptest::collection::vec(-1e3_f64..1e3, 0..60),
        ) {
            let mut w = MeasurementWindow::new("x", capacity).expect("valid capacity");
            for (run, &v) in values.iter().enumerate() {
                w.push(Measurement::new("x", run as u64, v)).expect("in order");
                prop_assert!(w.len() <= capacity);
            }
            let expected: Vec<f64> = values
                .iter()
                .skip(values.len().saturating_sub(capacity))
                .copied()
                .collect();
            prop_assert_eq!(w.values(), expected);
            let runs: Vec<u64> = w.iter().map(|m| m.run_index).collect();
            prop_assert!(runs.windows(2).all(|p| p[0] < p[1]));
        }
    }
}
