//! Programmable timer unit (DIV/TIMA/TMA/TAC).
//!
//! TIMA is not a prescaler: it increments on 1->0 transitions of one bit of
//! the free-running 16-bit counter, so writing DIV or TAC can produce an
//! increment of its own. An overflow does not reload TIMA immediately; the
//! register reads 0x00 for one machine cycle and the reload plus interrupt
//! request land on the next one.

const DIV: u16 = 0xFF04;
const TIMA: u16 = 0xFF05;
const TMA: u16 = 0xFF06;
const TAC: u16 = 0xFF07;

/// Clock ticks between the overflow tick and the reload tick. Together with
/// the overflow tick itself this spans one machine cycle, which is the delay
/// the guest observes.
const RELOAD_DELAY_TICKS: u8 = 3;

pub struct Timer {
    /// Free-running 16-bit counter. DIV is its upper byte.
    pub counter: u16,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    /// Level of the selected counter bit after the previous tick.
    edge: bool,
    /// TMA value captured when the register is overwritten mid-cycle; an
    /// overflow in the same cycle reloads from the old value.
    stale_tma: Option<u8>,
    /// Armed reload value after an overflow, applied once `reload_delay`
    /// reaches zero.
    reload: Option<u8>,
    reload_delay: u8,
    /// True only for the tick on which the reload is being applied; TIMA
    /// writes during this window are ignored.
    reloading: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            counter: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            edge: false,
            stale_tma: None,
            reload: None,
            reload_delay: 0,
            reloading: false,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            DIV => (self.counter >> 8) as u8,
            TIMA => self.tima,
            TMA => self.tma,
            TAC => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            DIV => self.reset_div(if_reg),
            TIMA => {
                if self.reloading || (self.reload.is_some() && self.reload_delay == 0) {
                    // Write on the reload cycle loses; the TMA value wins.
                    return;
                }
                self.tima = val;
                if self.reload.is_some() && self.reload_delay > 0 {
                    // Writing during the overflow delay cancels the reload.
                    self.reload = None;
                    self.reload_delay = 0;
                }
            }
            TMA => {
                // Keep the old value around so an overflow in this same
                // cycle still reloads from it.
                self.stale_tma = Some(self.tma);
                self.tma = val;
                if self.reload.is_some() {
                    self.reload = Some(val);
                }
                if self.reloading {
                    self.tima = val;
                }
            }
            TAC => {
                let prev = Self::signal(self.counter, self.tac);
                self.tac = val & 0x07;
                let next = Self::signal(self.counter, self.tac);
                if prev && !next {
                    let stale = self.stale_tma.take();
                    self.bump_tima(stale);
                }
                self.edge = next;
            }
            _ => {}
        }
    }

    /// Advance the counter by `ticks` clock ticks, raising the Timer bit in
    /// `if_reg` when a deferred overflow reload lands.
    pub fn step(&mut self, ticks: u16, if_reg: &mut u8) {
        for _ in 0..ticks {
            self.service_reload(if_reg);
            let prev = self.edge;
            let stale = self.stale_tma.take();
            self.counter = self.counter.wrapping_add(1);
            let next = Self::signal(self.counter, self.tac);
            if prev && !next {
                self.bump_tima(stale);
            }
            self.edge = next;
        }
    }

    /// Zero the counter, applying the falling-edge check the reset can
    /// itself trigger.
    pub fn reset_div(&mut self, if_reg: &mut u8) {
        self.service_reload(if_reg);
        let prev = Self::signal(self.counter, self.tac);
        self.counter = 0;
        let next = Self::signal(self.counter, self.tac);
        if prev && !next {
            let stale = self.stale_tma.take();
            self.bump_tima(stale);
        }
        self.edge = next;
    }

    fn service_reload(&mut self, if_reg: &mut u8) {
        self.reloading = false;
        if let Some(val) = self.reload {
            if self.reload_delay == 0 {
                self.tima = val;
                *if_reg |= 0x04;
                self.reload = None;
                self.reloading = true;
            } else {
                self.reload_delay -= 1;
            }
        }
    }

    fn bump_tima(&mut self, stale_tma: Option<u8>) {
        if self.tima == 0xFF {
            self.tima = 0;
            self.reload = Some(stale_tma.unwrap_or(self.tma));
            self.reload_delay = RELOAD_DELAY_TICKS;
        } else {
            self.tima += 1;
        }
    }

    fn signal(counter: u16, tac: u8) -> bool {
        if tac & 0x04 == 0 {
            return false;
        }
        let bit = match tac & 0x03 {
            0x00 => 9,
            0x01 => 3,
            0x02 => 5,
            _ => 7,
        };
        (counter >> bit) & 1 != 0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
