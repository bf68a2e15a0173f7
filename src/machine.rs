//! Whole-machine facade wiring the CPU to the bus.

use crate::{
    bus::Bus,
    cartridge::Cartridge,
    cpu::Cpu,
    joypad::Button,
    ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
};

pub struct Machine {
    pub cpu: Cpu,
    pub bus: Bus,
}

impl Machine {
    /// Machine in the post-boot state, as if the boot ROM just handed
    /// control to the cartridge at 0x0100.
    pub fn new() -> Self {
        let mut bus = Bus::new();
        bus.apply_boot_state();
        Self {
            cpu: Cpu::new(),
            bus,
        }
    }

    /// Reset to the post-boot state while preserving the loaded cartridge.
    pub fn reset(&mut self) {
        let cart = self.bus.cart.take();
        self.cpu = Cpu::new();
        self.bus = Bus::new();
        self.bus.apply_boot_state();
        self.bus.cart = cart;
    }

    pub fn load_cart(&mut self, cart: Box<dyn Cartridge>) {
        self.bus.load_cart(cart);
    }

    /// Load a raw ROM image, selecting the bank controller from its header.
    pub fn load_rom(&mut self, rom: Vec<u8>) {
        self.bus.load_cart(crate::cartridge::from_bytes(rom));
    }

    /// Execute one instruction and return the machine cycles it took.
    pub fn step(&mut self) -> u32 {
        self.cpu.step(&mut self.bus)
    }

    /// Run until the PPU finishes the frame in flight, then hand out the
    /// shade framebuffer. With the LCD off this still returns after a
    /// frame's worth of work so callers cannot spin forever.
    pub fn run_frame(&mut self) -> &[u8; SCREEN_WIDTH * SCREEN_HEIGHT] {
        // 70224 dots per frame at 4 dots per machine cycle.
        const FRAME_M_CYCLES: u32 = 70224 / 4;
        let mut budget = FRAME_M_CYCLES;
        self.bus.ppu.clear_frame_flag();
        while !self.bus.ppu.frame_ready() {
            let spent = self.step();
            budget = budget.saturating_sub(spent);
            if budget == 0 {
                break;
            }
        }
        self.bus.ppu.framebuffer()
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.bus.set_button(button, pressed);
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
