//! Cartridge collaborator.
//!
//! The bus reaches 0x0000-0x7FFF and 0xA000-0xBFFF through the narrow
//! [`Cartridge`] capability and is agnostic to the banking scheme behind it.
//! [`from_bytes`] selects a bank controller from header byte 0x147; how ROM
//! images are obtained, and whether external RAM is battery-backed and
//! persisted, is the embedder's business.

use log::{debug, info, warn};

const HEADER_TITLE: core::ops::Range<usize> = 0x134..0x144;
const HEADER_CART_TYPE: usize = 0x147;
const HEADER_RAM_SIZE: usize = 0x149;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;
const MBC2_RAM_SIZE: usize = 0x200;

/// Read/write capability over the cartridge-owned address ranges. Addresses
/// are the raw bus addresses (0x0000-0x7FFF ROM, 0xA000-0xBFFF external RAM).
pub trait Cartridge {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, val: u8);
}

/// Build a cartridge from a ROM image, selecting the bank controller from
/// the header. Unknown mapper bytes fall back to flat ROM with a warning.
pub fn from_bytes(rom: Vec<u8>) -> Box<dyn Cartridge> {
    let cart_type = rom.get(HEADER_CART_TYPE).copied().unwrap_or(0);
    let ram = vec![0; ram_size(rom.get(HEADER_RAM_SIZE).copied().unwrap_or(0))];
    let title: String = rom
        .get(HEADER_TITLE)
        .unwrap_or(&[])
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    info!("loaded ROM {title:?} (mapper byte {cart_type:02X}, {} KiB)", rom.len() / 1024);

    match cart_type {
        0x00 | 0x08 | 0x09 => Box::new(RomOnly { rom, ram }),
        0x01..=0x03 => Box::new(Mbc1 {
            rom,
            ram,
            rom_bank: 1,
            ram_bank: 0,
            mode: 0,
            ram_enable: false,
        }),
        0x05 | 0x06 => Box::new(Mbc2 {
            rom,
            ram: [0; MBC2_RAM_SIZE],
            rom_bank: 1,
            ram_enable: false,
        }),
        0x0F..=0x13 => Box::new(Mbc3 {
            rom,
            ram,
            rom_bank: 1,
            ram_bank: 0,
            ram_enable: false,
        }),
        0x19..=0x1E => Box::new(Mbc5 {
            rom,
            ram,
            rom_bank: 1,
            ram_bank: 0,
            ram_enable: false,
        }),
        other => {
            warn!("unsupported mapper byte {other:02X}; treating ROM as unbanked");
            Box::new(RomOnly { rom, ram })
        }
    }
}

fn ram_size(code: u8) -> usize {
    match code {
        0x02 => 0x2000,
        0x03 => 0x8000,
        0x04 => 0x20000,
        0x05 => 0x10000,
        _ => 0,
    }
}

fn rom_bank_count(rom: &[u8]) -> usize {
    (rom.len() / ROM_BANK_SIZE).max(1)
}

/// Flat 32 KiB ROM, optionally with unbanked external RAM.
pub struct RomOnly {
    rom: Vec<u8>,
    ram: Vec<u8>,
}

impl Cartridge for RomOnly {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0xA000..=0xBFFF => {
                let off = (addr - 0xA000) as usize;
                self.ram.get(off).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => {
                debug!("write {val:02X} to ROM address {addr:04X} ignored");
            }
            0xA000..=0xBFFF => {
                let off = (addr - 0xA000) as usize;
                if let Some(slot) = self.ram.get_mut(off) {
                    *slot = val;
                }
            }
            _ => {}
        }
    }
}

pub struct Mbc1 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_bank: u8,
    ram_bank: u8,
    mode: u8,
    ram_enable: bool,
}

impl Mbc1 {
    fn ram_offset(&self, addr: u16) -> usize {
        let bank = if self.mode == 1 {
            (self.ram_bank & 0x03) as usize
        } else {
            0
        };
        bank * RAM_BANK_SIZE + (addr - 0xA000) as usize
    }
}

impl Cartridge for Mbc1 {
    fn read(&mut self, addr: u16) -> u8 {
        let banks = rom_bank_count(&self.rom);
        match addr {
            0x0000..=0x3FFF => {
                // In mode 1 the fixed region follows the upper bank bits.
                let bank = if self.mode == 1 {
                    (((self.ram_bank & 0x03) as usize) << 5) % banks
                } else {
                    0
                };
                self.rom
                    .get(bank * ROM_BANK_SIZE + addr as usize)
                    .copied()
                    .unwrap_or(0xFF)
            }
            0x4000..=0x7FFF => {
                let mut low = (self.rom_bank & 0x1F) as usize;
                if low == 0 {
                    low = 1;
                }
                let bank = (low | (((self.ram_bank & 0x03) as usize) << 5)) % banks;
                self.rom
                    .get(bank * ROM_BANK_SIZE + (addr as usize - 0x4000))
                    .copied()
                    .unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => {
                if !self.ram_enable {
                    return 0xFF;
                }
                let off = self.ram_offset(addr);
                self.ram.get(off).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => self.rom_bank = val & 0x1F,
            0x4000..=0x5FFF => self.ram_bank = val & 0x03,
            0x6000..=0x7FFF => self.mode = val & 0x01,
            0xA000..=0xBFFF => {
                if !self.ram_enable {
                    return;
                }
                let off = self.ram_offset(addr);
                if let Some(slot) = self.ram.get_mut(off) {
                    *slot = val;
                }
            }
            _ => {}
        }
    }
}

/// MBC2 carries its own 512 half-byte RAM on the mapper die; header byte
/// 0x149 is 0 for these carts. Address bit 8 selects which register a
/// 0x0000-0x3FFF write lands on, and the RAM echoes through the whole
/// external-RAM window.
pub struct Mbc2 {
    rom: Vec<u8>,
    ram: [u8; MBC2_RAM_SIZE],
    rom_bank: u8,
    ram_enable: bool,
}

impl Cartridge for Mbc2 {
    fn read(&mut self, addr: u16) -> u8 {
        let banks = rom_bank_count(&self.rom);
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => {
                let mut bank = (self.rom_bank & 0x0F) as usize;
                if bank == 0 {
                    bank = 1;
                }
                bank %= banks;
                self.rom
                    .get(bank * ROM_BANK_SIZE + (addr as usize - 0x4000))
                    .copied()
                    .unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => {
                if !self.ram_enable {
                    return 0xFF;
                }
                // Only the low nibble is wired; the rest reads as open bus.
                0xF0 | self.ram[addr as usize & (MBC2_RAM_SIZE - 1)]
            }
            _ => 0xFF,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x3FFF => {
                if addr & 0x0100 == 0 {
                    self.ram_enable = val & 0x0F == 0x0A;
                } else {
                    self.rom_bank = val & 0x0F;
                }
            }
            0xA000..=0xBFFF => {
                if self.ram_enable {
                    self.ram[addr as usize & (MBC2_RAM_SIZE - 1)] = val & 0x0F;
                }
            }
            _ => {}
        }
    }
}

/// MBC3 without the real-time clock: register selects 0x08..=0x0C read as
/// open bus here, since wall-clock state is persistence the core does not
/// own.
pub struct Mbc3 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_bank: u8,
    ram_bank: u8,
    ram_enable: bool,
}

impl Cartridge for Mbc3 {
    fn read(&mut self, addr: u16) -> u8 {
        let banks = rom_bank_count(&self.rom);
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => {
                let mut bank = (self.rom_bank & 0x7F) as usize;
                if bank == 0 {
                    bank = 1;
                }
                bank %= banks;
                self.rom
                    .get(bank * ROM_BANK_SIZE + (addr as usize - 0x4000))
                    .copied()
                    .unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => {
                if !self.ram_enable || self.ram_bank > 0x03 {
                    return 0xFF;
                }
                let off = self.ram_bank as usize * RAM_BANK_SIZE + (addr - 0xA000) as usize;
                self.ram.get(off).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => self.rom_bank = val & 0x7F,
            0x4000..=0x5FFF => self.ram_bank = val & 0x0F,
            0x6000..=0x7FFF => {}
            0xA000..=0xBFFF => {
                if !self.ram_enable || self.ram_bank > 0x03 {
                    return;
                }
                let off = self.ram_bank as usize * RAM_BANK_SIZE + (addr - 0xA000) as usize;
                if let Some(slot) = self.ram.get_mut(off) {
                    *slot = val;
                }
            }
            _ => {}
        }
    }
}

pub struct Mbc5 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_bank: u16,
    ram_bank: u8,
    ram_enable: bool,
}

impl Cartridge for Mbc5 {
    fn read(&mut self, addr: u16) -> u8 {
        let banks = rom_bank_count(&self.rom);
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => {
                // MBC5 allows bank 0 here.
                let bank = (self.rom_bank & 0x01FF) as usize % banks;
                self.rom
                    .get(bank * ROM_BANK_SIZE + (addr as usize - 0x4000))
                    .copied()
                    .unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => {
                if !self.ram_enable {
                    return 0xFF;
                }
                let off = (self.ram_bank & 0x0F) as usize * RAM_BANK_SIZE
                    + (addr - 0xA000) as usize;
                self.ram.get(off).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = val & 0x0F == 0x0A,
            0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x0100) | val as u16,
            0x3000..=0x3FFF => {
                self.rom_bank = (self.rom_bank & 0x00FF) | (((val & 0x01) as u16) << 8)
            }
            0x4000..=0x5FFF => self.ram_bank = val & 0x0F,
            0xA000..=0xBFFF => {
                if !self.ram_enable {
                    return;
                }
                let off = (self.ram_bank & 0x0F) as usize * RAM_BANK_SIZE
                    + (addr - 0xA000) as usize;
                if let Some(slot) = self.ram.get_mut(off) {
                    *slot = val;
                }
            }
            _ => {}
        }
    }
}
