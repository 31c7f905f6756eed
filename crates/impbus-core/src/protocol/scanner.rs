//! Bus discovery
//!
//! Finds the serial numbers present in `[min, max]` by recursive bisection
//! of the 24-bit address space. A range probe tells whether *any* module
//! lives inside an aligned power-of-two block; empty blocks are pruned,
//! occupied ones are split until two candidates remain, which are then
//! confirmed one by one with point probes.
//!
//! A block is written as `(base, marker)`: `marker` is a single bit and
//! `base` has that bit and all lower bits cleared. The block covers
//! `[base, base | (marker | (marker - 1))]` and is probed with the
//! broadcast address `base | marker`.
//!
//! For an empty bus this costs a single range probe. A noisy line that
//! fakes presence only causes extra probes; it never fails the scan.

use std::collections::BTreeSet;

use super::{Bus, BusError, Transport, SERIAL_MASK};

/// Presence probes used by the scanner
pub trait Probe {
    /// Whether any module answers inside the block encoded by `broadcast`
    fn probe_range(&mut self, broadcast: u32) -> Result<bool, BusError>;

    /// Whether the module `serial` answers
    fn probe_serial(&mut self, serial: u32) -> Result<bool, BusError>;
}

/// An aligned block of serial numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    /// Block start; the marker bit and every bit below it are clear
    pub base: u32,
    /// Single bit selecting the block size, 0 for a single serial
    pub marker: u32,
}

impl AddressRange {
    /// Smallest aligned block containing both `min` and `max`
    pub fn enclosing(min: u32, max: u32) -> Self {
        let diff = (min ^ max) & SERIAL_MASK;
        let marker: u32 = match diff {
            0 => 0,
            d => 1 << (31 - d.leading_zeros()),
        };
        let mask = !(marker | marker.saturating_sub(1)) & SERIAL_MASK;
        Self {
            base: min & mask,
            marker,
        }
    }

    /// Address probing the whole block
    pub fn broadcast(&self) -> u32 {
        self.base | self.marker
    }

    /// Lowest serial in the block
    pub fn first(&self) -> u32 {
        self.base
    }

    /// Highest serial in the block
    pub fn last(&self) -> u32 {
        self.base | self.marker | self.marker.saturating_sub(1)
    }

    /// Whether `serial` lies inside the block
    pub fn contains(&self, serial: u32) -> bool {
        (self.first()..=self.last()).contains(&serial)
    }

    /// The block a broadcast address stands for
    pub fn from_broadcast(broadcast: u32) -> Self {
        let marker = broadcast & broadcast.wrapping_neg();
        Self {
            base: broadcast ^ marker,
            marker,
        }
    }

    fn upper(&self) -> Self {
        Self {
            base: self.broadcast(),
            marker: self.marker >> 1,
        }
    }

    fn lower(&self) -> Self {
        Self {
            base: self.base,
            marker: self.marker >> 1,
        }
    }
}

/// Find every serial in `[min, max]` that answers, sorted ascending
pub fn scan<P: Probe + ?Sized>(probe: &mut P, min: u32, max: u32) -> Result<Vec<u32>, BusError> {
    let (min, max) = (min.min(max) & SERIAL_MASK, min.max(max) & SERIAL_MASK);
    let range = AddressRange::enclosing(min, max);
    tracing::debug!(
        "scanning [{}, {}] via block {:#08x}/{:#08x}",
        min,
        max,
        range.base,
        range.marker
    );

    let mut found = BTreeSet::new();
    if range.marker == 0 {
        if probe.probe_serial(range.base)? {
            found.insert(range.base);
        }
    } else {
        search(probe, range, &mut found)?;
    }

    let modules: Vec<u32> = found.into_iter().filter(|s| (min..=max).contains(s)).collect();
    tracing::debug!("scan found {} module(s): {:?}", modules.len(), modules);
    Ok(modules)
}

fn search<P: Probe + ?Sized>(
    probe: &mut P,
    range: AddressRange,
    found: &mut BTreeSet<u32>,
) -> Result<(), BusError> {
    let bcast = range.broadcast();
    if !probe.probe_range(bcast)? {
        return Ok(());
    }
    tracing::trace!("presence in [{:#08x}, {:#08x}]", range.first(), range.last());

    if range.marker == 1 {
        let mut confirmed = false;
        for serial in [bcast, bcast - 1] {
            if probe.probe_serial(serial)? {
                found.insert(serial);
                confirmed = true;
            }
        }
        if !confirmed {
            tracing::warn!("range probe {:#08x} answered but no module confirmed", bcast);
        }
        return Ok(());
    }

    search(probe, range.upper(), found)?;
    search(probe, range.lower(), found)
}

/// Discovery on a real bus: a missing answer means "nobody there"
impl<T: Transport> Probe for Bus<T> {
    fn probe_range(&mut self, broadcast: u32) -> Result<bool, BusError> {
        match self.range_ack(broadcast) {
            Err(BusError::Timeout) => Ok(false),
            other => other,
        }
    }

    fn probe_serial(&mut self, serial: u32) -> Result<bool, BusError> {
        match self.short_ack(serial) {
            Err(BusError::Timeout) => Ok(false),
            other => other,
        }
    }
}
