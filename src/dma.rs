//! OAM DMA engine.
//!
//! Idle -> 2-cycle start delay -> 160 active cycles (one byte each) -> Idle.
//! The engine only schedules byte moves; the bus performs them with the DMA
//! requester capability and enforces contention against the CPU while the
//! transfer is active.

/// Bytes moved by one transfer (the whole sprite attribute table).
pub const OAM_DMA_BYTES: u16 = 160;

/// Machine cycles between the trigger-register write and the first copied
/// byte.
const START_DELAY: u8 = 2;

#[derive(Default)]
pub struct OamDma {
    source: u16,
    start_delay: u8,
    remaining: u16,
    /// Source page of a trigger written while a transfer was already
    /// running; consumed when that transfer completes.
    pending: Option<u16>,
}

impl OamDma {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a write to the trigger register. A request during an active
    /// transfer is remembered and restarts the engine once the current
    /// transfer finishes; a request during the start delay replaces it.
    pub fn request(&mut self, page: u8) {
        let source = (page as u16) << 8;
        if self.remaining > 0 {
            self.pending = Some(source);
        } else {
            self.source = source;
            self.start_delay = START_DELAY;
        }
    }

    /// True while bytes are being copied. CPU access to VRAM and OAM is
    /// denied only in this phase, not during the start delay.
    pub fn active(&self) -> bool {
        self.remaining > 0
    }

    /// Advance one machine cycle. Returns the `(source_addr, oam_index)`
    /// byte move to perform this cycle, if any.
    pub fn step(&mut self) -> Option<(u16, u8)> {
        if self.start_delay > 0 {
            self.start_delay -= 1;
            if self.start_delay == 0 {
                self.remaining = OAM_DMA_BYTES;
            }
            return None;
        }
        if self.remaining == 0 {
            return None;
        }

        let index = (OAM_DMA_BYTES - self.remaining) as u8;
        self.remaining -= 1;
        let mv = (self.source.wrapping_add(index as u16), index);
        if self.remaining == 0
            && let Some(source) = self.pending.take()
        {
            self.source = source;
            self.start_delay = START_DELAY;
        }
        Some(mv)
    }
}
