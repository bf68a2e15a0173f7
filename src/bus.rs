//! Memory bus.
//!
//! Owns the RAM arrays and the memory-mapped collaborators and decodes the
//! full 16-bit address space. Every access carries a [`Requester`] so the
//! bus can arbitrate between the CPU and the OAM DMA engine.

use crate::{
    cartridge::Cartridge,
    dma::OamDma,
    joypad::{Button, Joypad},
    ppu::Ppu,
    timer::Timer,
};

#[cfg(feature = "bus-trace")]
use log::trace;

const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;
const SOUND_PAGE_SIZE: usize = 0x30;

/// Who is driving the current bus access. DMA reads bypass the mode and
/// transfer blocking that applies to the CPU.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Requester {
    Cpu,
    Dma,
}

pub struct Bus {
    pub wram: [u8; WRAM_SIZE],
    pub hram: [u8; HRAM_SIZE],
    /// Sound register page, kept as plain storage for an audio collaborator.
    sound_regs: [u8; SOUND_PAGE_SIZE],
    pub cart: Option<Box<dyn Cartridge>>,
    pub if_reg: u8,
    pub ie_reg: u8,
    pub ppu: Ppu,
    pub timer: Timer,
    pub joypad: Joypad,
    pub dma: OamDma,
    /// Last value written to 0xFF46, readable back.
    dma_reg: u8,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            sound_regs: [0; SOUND_PAGE_SIZE],
            cart: None,
            if_reg: 0,
            ie_reg: 0,
            ppu: Ppu::new(),
            timer: Timer::new(),
            joypad: Joypad::new(),
            dma: OamDma::new(),
            dma_reg: 0,
        }
    }

    /// Put the bus-visible state where the boot ROM leaves it.
    pub fn apply_boot_state(&mut self) {
        self.timer.counter = 0xABCC;
        self.if_reg = 0x01;
        self.dma_reg = 0xFF;
        self.ppu.apply_boot_state();
    }

    pub fn load_cart(&mut self, cart: Box<dyn Cartridge>) {
        self.cart = Some(cart);
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.joypad.set_button(button, pressed, &mut self.if_reg);
    }

    /// True while the CPU is locked out of the OAM bus by a transfer.
    fn dma_blocks(&self, addr: u16, requester: Requester) -> bool {
        if requester == Requester::Dma || !self.dma.active() {
            return false;
        }
        // ROM, WRAM/Echo and the I/O/HRAM page stay reachable while the
        // transfer monopolizes the OAM bus.
        !matches!(addr, 0x0000..=0x7FFF | 0xC000..=0xFDFF | 0xFF00..=0xFFFF)
    }

    pub fn read(&mut self, addr: u16, requester: Requester) -> u8 {
        if self.dma_blocks(addr, requester) {
            #[cfg(feature = "bus-trace")]
            trace!("read blocked by OAM DMA addr={addr:04X}");
            return 0xFF;
        }
        match addr {
            0x0000..=0x7FFF => self.cart.as_mut().map(|c| c.read(addr)).unwrap_or(0xFF),
            0x8000..=0x9FFF => {
                if requester == Requester::Cpu && self.ppu.vram_blocked() {
                    #[cfg(feature = "bus-trace")]
                    trace!("VRAM read blocked addr={addr:04X}");
                    0xFF
                } else {
                    self.ppu.vram[(addr - 0x8000) as usize]
                }
            }
            0xA000..=0xBFFF => self.cart.as_mut().map(|c| c.read(addr)).unwrap_or(0xFF),
            0xC000..=0xDFFF => self.wram[(addr & 0x1FFF) as usize],
            0xE000..=0xFDFF => self.wram[(addr & 0x1FFF) as usize],
            0xFE00..=0xFE9F => {
                if requester == Requester::Cpu && self.ppu.oam_blocked() {
                    0xFF
                } else {
                    self.ppu.oam[(addr - 0xFE00) as usize]
                }
            }
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => self.joypad.read(),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg | 0xE0,
            0xFF10..=0xFF3F => self.sound_regs[(addr - 0xFF10) as usize],
            0xFF46 => self.dma_reg,
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.read_reg(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, requester: Requester) {
        if self.dma_blocks(addr, requester) {
            #[cfg(feature = "bus-trace")]
            trace!("write blocked by OAM DMA addr={addr:04X} val={val:02X}");
            return;
        }
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write(addr, val);
                }
            }
            0x8000..=0x9FFF => {
                if requester == Requester::Cpu && self.ppu.vram_blocked() {
                    #[cfg(feature = "bus-trace")]
                    trace!("VRAM write blocked addr={addr:04X} val={val:02X}");
                } else {
                    self.ppu.vram[(addr - 0x8000) as usize] = val;
                }
            }
            0xC000..=0xDFFF => self.wram[(addr & 0x1FFF) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr & 0x1FFF) as usize] = val,
            0xFE00..=0xFE9F => {
                if requester == Requester::Dma || !self.ppu.oam_blocked() {
                    self.ppu.oam[(addr - 0xFE00) as usize] = val;
                }
            }
            0xFEA0..=0xFEFF => {}
            0xFF00 => self.joypad.write(val),
            0xFF04 => self.timer.reset_div(&mut self.if_reg),
            0xFF05..=0xFF07 => self.timer.write(addr, val, &mut self.if_reg),
            0xFF0F => self.if_reg = val & 0x1F,
            0xFF10..=0xFF3F => self.sound_regs[(addr - 0xFF10) as usize] = val,
            0xFF46 => {
                self.dma_reg = val;
                self.dma.request(val);
                #[cfg(feature = "bus-trace")]
                trace!("OAM DMA requested page={val:02X}");
            }
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie_reg = val,
            _ => {}
        }
    }

    /// Advance the OAM DMA engine by the given number of machine cycles,
    /// moving one byte per cycle while a transfer is active. Source reads in
    /// 0xFE00-0xFF9F mirror down into Echo RAM territory.
    pub fn dma_step(&mut self, m_cycles: u32) {
        for _ in 0..m_cycles {
            if let Some((src, index)) = self.dma.step() {
                let src = if (0xFE00..=0xFF9F).contains(&src) {
                    src.wrapping_sub(0x2000)
                } else {
                    src
                };
                let byte = self.read(src, Requester::Dma);
                self.ppu.oam[index as usize] = byte;
            }
        }
    }

    /// Advance every clocked collaborator by the given machine cycles. The
    /// CPU calls this once per memory access so time moves at the point the
    /// bus is touched.
    pub fn tick(&mut self, m_cycles: u32) {
        let dots = 4 * m_cycles as u16;
        self.timer.step(dots, &mut self.if_reg);
        self.ppu.step(dots, &mut self.if_reg);
        self.dma_step(m_cycles);
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
