//! Cycle-accurate Game Boy (DMG) emulation core.
//!
//! This crate contains the platform-agnostic machine logic (CPU, bus, timer,
//! DMA, pixel unit). Frontends own presentation, audio sampling and input
//! sources and drive the core via the [`machine`] facade.

/// Memory bus: address decode, requester arbitration and I/O side effects.
pub mod bus;

/// Cartridge capability and header-selected bank controllers.
pub mod cartridge;

/// SM83 CPU core and interrupt dispatch.
pub mod cpu;

/// OAM DMA engine.
pub mod dma;

/// Joypad register and edge-triggered interrupt behavior.
pub mod joypad;

/// High-level facade that wires the CPU and bus into a single machine.
pub mod machine;

/// Pixel unit (PPU) emulation.
pub mod ppu;

/// Divider/timer unit.
pub mod timer;
