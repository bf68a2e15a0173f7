//! SM83 CPU core.
//!
//! Time advances at the point memory is touched: every bus access calls
//! [`Bus::tick`] for one machine cycle, so collaborators observe reads and
//! writes at the exact cycle they happen on hardware. Instructions whose
//! timing includes internal cycles tick explicitly.

use crate::bus::{Bus, Requester};

const FLAG_Z: u8 = 0x80; // Zero
const FLAG_N: u8 = 0x40; // Subtract
const FLAG_H: u8 = 0x20; // Half Carry
const FLAG_C: u8 = 0x10; // Carry

const VECTOR_VBLANK: u16 = 0x40;
const VECTOR_STAT: u16 = 0x48;
const VECTOR_TIMER: u16 = 0x50;
const VECTOR_SERIAL: u16 = 0x58;
const VECTOR_JOYPAD: u16 = 0x60;

// Post-boot register state
const BOOT_AF: u16 = 0x01B0;
const BOOT_BC: u16 = 0x0013;
const BOOT_DE: u16 = 0x00D8;
const BOOT_HL: u16 = 0x014D;
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

const DOTS_PER_M_CYCLE: u64 = 4;

pub struct Cpu {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    /// Elapsed dots since power on.
    pub cycles: u64,
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    halt_bug: bool,
    ime_enable_delay: u8,
    halt_pc: Option<u16>,
    halt_pending: u8,
}

impl Cpu {
    /// CPU in the post-boot register state.
    pub fn new() -> Self {
        let mut cpu = Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            pc: BOOT_PC,
            sp: BOOT_SP,
            cycles: 0,
            ime: false,
            halted: false,
            stopped: false,
            halt_bug: false,
            ime_enable_delay: 0,
            halt_pc: None,
            halt_pending: 0,
        };
        cpu.set_af(BOOT_AF);
        cpu.set_bc(BOOT_BC);
        cpu.set_de(BOOT_DE);
        cpu.set_hl(BOOT_HL);
        cpu
    }

    pub fn af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    /// The low nibble of F does not exist in hardware and is masked off.
    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = val as u8 & 0xF0;
    }

    pub fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} CY:{}",
            self.af(),
            self.bc(),
            self.de(),
            self.hl(),
            self.pc,
            self.sp,
            self.cycles
        )
    }

    #[inline]
    fn tick(&mut self, bus: &mut Bus, m_cycles: u32) {
        self.cycles += DOTS_PER_M_CYCLE * m_cycles as u64;
        bus.tick(m_cycles);
    }

    #[inline(always)]
    fn fetch8(&mut self, bus: &mut Bus) -> u8 {
        let val = bus.read(self.pc, Requester::Cpu);
        self.pc = self.pc.wrapping_add(1);
        self.tick(bus, 1);
        val
    }

    #[inline(always)]
    fn fetch16(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.fetch8(bus) as u16;
        let hi = self.fetch8(bus) as u16;
        (hi << 8) | lo
    }

    #[inline(always)]
    fn read8(&mut self, bus: &mut Bus, addr: u16) -> u8 {
        let val = bus.read(addr, Requester::Cpu);
        self.tick(bus, 1);
        val
    }

    #[inline(always)]
    fn write8(&mut self, bus: &mut Bus, addr: u16, val: u8) {
        bus.write(addr, val, Requester::Cpu);
        self.tick(bus, 1);
    }

    fn push_stack(&mut self, bus: &mut Bus, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        self.write8(bus, self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        self.write8(bus, self.sp, val as u8);
    }

    fn pop_stack(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.read8(bus, self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        let hi = self.read8(bus, self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    /// Read the register selected by a 3-bit operand field. Index 6 is the
    /// (HL) pseudo-register and costs a bus cycle.
    fn read_reg(&mut self, bus: &mut Bus, index: u8) -> u8 {
        match index {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => self.read8(bus, self.hl()),
            7 => self.a,
            _ => unreachable!(),
        }
    }

    fn write_reg(&mut self, bus: &mut Bus, index: u8, val: u8) {
        match index {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => self.h = val,
            5 => self.l = val,
            6 => {
                let addr = self.hl();
                self.write8(bus, addr, val);
            }
            7 => self.a = val,
            _ => unreachable!(),
        }
    }

    fn read_pair(&self, index: u8) -> u16 {
        match index {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            3 => self.sp,
            _ => unreachable!(),
        }
    }

    fn write_pair(&mut self, index: u8, val: u16) {
        match index {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => self.set_hl(val),
            3 => self.sp = val,
            _ => unreachable!(),
        }
    }

    /// Branch condition selected by a 2-bit operand field (NZ, Z, NC, C).
    fn condition(&self, index: u8) -> bool {
        match index {
            0 => self.f & FLAG_Z == 0,
            1 => self.f & FLAG_Z != 0,
            2 => self.f & FLAG_C == 0,
            3 => self.f & FLAG_C != 0,
            _ => unreachable!(),
        }
    }

    // 8-bit ALU helpers. Each sets F completely.

    fn add_a(&mut self, val: u8, carry_in: u8) {
        let (res1, carry1) = self.a.overflowing_add(val);
        let (res2, carry2) = res1.overflowing_add(carry_in);
        self.f = if res2 == 0 { FLAG_Z } else { 0 }
            | if (self.a & 0x0F) + (val & 0x0F) + carry_in > 0x0F {
                FLAG_H
            } else {
                0
            }
            | if carry1 || carry2 { FLAG_C } else { 0 };
        self.a = res2;
    }

    fn sub_a(&mut self, val: u8, carry_in: u8, keep_result: bool) {
        let (res1, borrow1) = self.a.overflowing_sub(val);
        let (res2, borrow2) = res1.overflowing_sub(carry_in);
        self.f = FLAG_N
            | if res2 == 0 { FLAG_Z } else { 0 }
            | if (self.a & 0x0F) < (val & 0x0F) + carry_in {
                FLAG_H
            } else {
                0
            }
            | if borrow1 || borrow2 { FLAG_C } else { 0 };
        if keep_result {
            self.a = res2;
        }
    }

    /// Dispatch an arithmetic/logic group operation against A.
    fn alu(&mut self, op: u8, val: u8) {
        let carry_in = if self.f & FLAG_C != 0 { 1 } else { 0 };
        match op {
            0 => self.add_a(val, 0),
            1 => self.add_a(val, carry_in),
            2 => self.sub_a(val, 0, true),
            3 => self.sub_a(val, carry_in, true),
            4 => {
                self.a &= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 } | FLAG_H;
            }
            5 => {
                self.a ^= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
            6 => {
                self.a |= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
            7 => self.sub_a(val, 0, false),
            _ => unreachable!(),
        }
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.f = (self.f & FLAG_C)
            | if res == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0x0F { FLAG_H } else { 0 };
        res
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.f = (self.f & FLAG_C)
            | FLAG_N
            | if res == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0 { FLAG_H } else { 0 };
        res
    }

    fn add_hl(&mut self, val: u16) {
        let hl = self.hl();
        self.f = (self.f & FLAG_Z)
            | if ((hl & 0x0FFF) + (val & 0x0FFF)) & 0x1000 != 0 {
                FLAG_H
            } else {
                0
            }
            | if hl as u32 + val as u32 > 0xFFFF {
                FLAG_C
            } else {
                0
            };
        self.set_hl(hl.wrapping_add(val));
    }

    /// SP plus the signed immediate, with the flags ADD SP,e and LD HL,SP+e
    /// share. Carries come from the low byte of the addition.
    fn sp_plus_offset(&mut self, bus: &mut Bus) -> u16 {
        let val = self.fetch8(bus) as i8 as i16 as u16;
        let sp = self.sp;
        self.f = if ((sp & 0x0F) + (val & 0x0F)) > 0x0F {
            FLAG_H
        } else {
            0
        } | if ((sp & 0xFF) + (val & 0xFF)) > 0xFF {
            FLAG_C
        } else {
            0
        };
        sp.wrapping_add(val)
    }

    fn daa(&mut self) {
        let mut correction = 0u8;
        let mut carry = false;
        if self.f & FLAG_H != 0 || (self.f & FLAG_N == 0 && self.a & 0x0F > 9) {
            correction |= 0x06;
        }
        if self.f & FLAG_C != 0 || (self.f & FLAG_N == 0 && self.a > 0x99) {
            correction |= 0x60;
            carry = true;
        }
        if self.f & FLAG_N == 0 {
            self.a = self.a.wrapping_add(correction);
        } else {
            self.a = self.a.wrapping_sub(correction);
        }
        self.f = if self.a == 0 { FLAG_Z } else { 0 }
            | (self.f & FLAG_N)
            | if carry { FLAG_C } else { 0 };
    }

    // Rotate/shift helpers for the 0xCB page. Each returns the result and
    // sets F completely, Z included.

    fn rlc(&mut self, val: u8) -> u8 {
        let res = val.rotate_left(1);
        self.f = if res == 0 { FLAG_Z } else { 0 } | if val & 0x80 != 0 { FLAG_C } else { 0 };
        res
    }

    fn rrc(&mut self, val: u8) -> u8 {
        let res = val.rotate_right(1);
        self.f = if res == 0 { FLAG_Z } else { 0 } | if val & 0x01 != 0 { FLAG_C } else { 0 };
        res
    }

    fn rl(&mut self, val: u8) -> u8 {
        let carry_in = if self.f & FLAG_C != 0 { 1 } else { 0 };
        let res = (val << 1) | carry_in;
        self.f = if res == 0 { FLAG_Z } else { 0 } | if val & 0x80 != 0 { FLAG_C } else { 0 };
        res
    }

    fn rr(&mut self, val: u8) -> u8 {
        let carry_in = if self.f & FLAG_C != 0 { 0x80 } else { 0 };
        let res = (val >> 1) | carry_in;
        self.f = if res == 0 { FLAG_Z } else { 0 } | if val & 0x01 != 0 { FLAG_C } else { 0 };
        res
    }

    fn sla(&mut self, val: u8) -> u8 {
        let res = val << 1;
        self.f = if res == 0 { FLAG_Z } else { 0 } | if val & 0x80 != 0 { FLAG_C } else { 0 };
        res
    }

    fn sra(&mut self, val: u8) -> u8 {
        let res = (val >> 1) | (val & 0x80);
        self.f = if res == 0 { FLAG_Z } else { 0 } | if val & 0x01 != 0 { FLAG_C } else { 0 };
        res
    }

    fn swap(&mut self, val: u8) -> u8 {
        let res = val.rotate_left(4);
        self.f = if res == 0 { FLAG_Z } else { 0 };
        res
    }

    fn srl(&mut self, val: u8) -> u8 {
        let res = val >> 1;
        self.f = if res == 0 { FLAG_Z } else { 0 } | if val & 0x01 != 0 { FLAG_C } else { 0 };
        res
    }

    fn handle_cb(&mut self, opcode: u8, bus: &mut Bus) {
        let r = opcode & 0x07;
        match opcode >> 6 {
            0 => {
                let val = self.read_reg(bus, r);
                let res = match opcode >> 3 {
                    0 => self.rlc(val),
                    1 => self.rrc(val),
                    2 => self.rl(val),
                    3 => self.rr(val),
                    4 => self.sla(val),
                    5 => self.sra(val),
                    6 => self.swap(val),
                    7 => self.srl(val),
                    _ => unreachable!(),
                };
                self.write_reg(bus, r, res);
            }
            1 => {
                // BIT only reads, so BIT b,(HL) is one cycle shorter than
                // the other (HL) forms.
                let bit = (opcode >> 3) & 0x07;
                let val = self.read_reg(bus, r);
                self.f = (self.f & FLAG_C)
                    | FLAG_H
                    | if val & (1 << bit) == 0 { FLAG_Z } else { 0 };
            }
            2 => {
                let bit = (opcode >> 3) & 0x07;
                let val = self.read_reg(bus, r);
                self.write_reg(bus, r, val & !(1 << bit));
            }
            3 => {
                let bit = (opcode >> 3) & 0x07;
                let val = self.read_reg(bus, r);
                self.write_reg(bus, r, val | (1 << bit));
            }
            _ => unreachable!(),
        }
    }

    fn enter_halt(&mut self, next_pc: u16, buffered: u8) {
        self.halted = true;
        self.halt_pc = Some(next_pc);
        self.halt_pending = buffered;
    }

    fn exit_halt(&mut self) {
        self.halted = false;
        self.halt_pc = None;
        self.halt_pending = 0;
    }

    /// Highest-priority requested interrupt. Lower bits win.
    fn next_interrupt(pending: u8) -> (u8, u16) {
        if pending & 0x01 != 0 {
            (0x01, VECTOR_VBLANK)
        } else if pending & 0x02 != 0 {
            (0x02, VECTOR_STAT)
        } else if pending & 0x04 != 0 {
            (0x04, VECTOR_TIMER)
        } else if pending & 0x08 != 0 {
            (0x08, VECTOR_SERIAL)
        } else {
            (0x10, VECTOR_JOYPAD)
        }
    }

    fn handle_interrupts(&mut self, bus: &mut Bus) {
        let pending = bus.if_reg & bus.ie_reg & 0x1F;
        if pending == 0 {
            return;
        }

        if self.ime {
            let (initial_bit, _) = Self::next_interrupt(pending);
            let mut return_pc = self.pc;

            if let Some(halt_pc) = self.halt_pc {
                if self.halt_pending & initial_bit != 0 {
                    return_pc = halt_pc.wrapping_sub(1);
                } else if self.halted {
                    return_pc = halt_pc;
                }
            }

            self.ime = false;

            // Two internal cycles, then the pushes, then the vector jump.
            self.tick(bus, 2);

            self.sp = self.sp.wrapping_sub(1);
            self.write8(bus, self.sp, (return_pc >> 8) as u8);

            // The high-byte push can land on IE and change which interrupt
            // is dispatched, or cancel dispatch entirely. Re-check between
            // the two pushes, as hardware does.
            let queue = bus.if_reg & bus.ie_reg & 0x1F;
            if queue == 0 {
                self.sp = self.sp.wrapping_sub(1);
                self.write8(bus, self.sp, return_pc as u8);
                self.exit_halt();
                self.pc = 0;
                self.tick(bus, 1);
                return;
            }

            let (bit, vector) = Self::next_interrupt(queue);
            bus.if_reg &= !bit;

            self.sp = self.sp.wrapping_sub(1);
            self.write8(bus, self.sp, return_pc as u8);

            // Execution resumes at the vector even for requests buffered
            // at HALT time; those only change the pushed return address.
            self.exit_halt();

            self.pc = vector;
            self.tick(bus, 1);
        } else if self.halted {
            self.exit_halt();
        }
    }

    /// Execute one instruction (plus any interrupt dispatch that follows it)
    /// and return the number of machine cycles consumed.
    pub fn step(&mut self, bus: &mut Bus) -> u32 {
        let start = self.cycles;

        if self.stopped {
            // STOP ends on any button press.
            if bus.joypad.any_pressed() {
                self.stopped = false;
            } else {
                self.tick(bus, 1);
                return ((self.cycles - start) / DOTS_PER_M_CYCLE) as u32;
            }
        }

        if self.halted {
            self.tick(bus, 1);
            self.handle_interrupts(bus);
            return ((self.cycles - start) / DOTS_PER_M_CYCLE) as u32;
        }

        let enable_after = self.ime_enable_delay == 1;
        let opcode = if self.halt_bug {
            // The byte after HALT is fetched without advancing PC, so it
            // executes twice.
            self.halt_bug = false;
            self.read8(bus, self.pc)
        } else {
            self.fetch8(bus)
        };
        self.execute(opcode, bus);

        if enable_after && self.ime_enable_delay > 0 {
            self.ime = true;
        }
        if self.ime_enable_delay > 0 {
            self.ime_enable_delay -= 1;
        }
        self.handle_interrupts(bus);

        ((self.cycles - start) / DOTS_PER_M_CYCLE) as u32
    }

    fn execute(&mut self, opcode: u8, bus: &mut Bus) {
        match opcode {
            0x00 => {}
            // LD rr,nn
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.fetch16(bus);
                self.write_pair((opcode >> 4) & 0x03, val);
            }
            // LD (BC)/(DE),A
            0x02 | 0x12 => {
                let addr = self.read_pair((opcode >> 4) & 0x03);
                self.write8(bus, addr, self.a);
            }
            // INC rr
            0x03 | 0x13 | 0x23 | 0x33 => {
                let idx = (opcode >> 4) & 0x03;
                let val = self.read_pair(idx).wrapping_add(1);
                self.write_pair(idx, val);
                self.tick(bus, 1);
            }
            // DEC rr
            0x0B | 0x1B | 0x2B | 0x3B => {
                let idx = (opcode >> 4) & 0x03;
                let val = self.read_pair(idx).wrapping_sub(1);
                self.write_pair(idx, val);
                self.tick(bus, 1);
            }
            // INC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = (opcode >> 3) & 0x07;
                let val = self.read_reg(bus, r);
                let res = self.inc8(val);
                self.write_reg(bus, r, res);
            }
            // DEC r
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = (opcode >> 3) & 0x07;
                let val = self.read_reg(bus, r);
                let res = self.dec8(val);
                self.write_reg(bus, r, res);
            }
            // LD r,n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let val = self.fetch8(bus);
                self.write_reg(bus, (opcode >> 3) & 0x07, val);
            }
            // The accumulator rotates clear Z.
            0x07 => {
                self.a = self.rlc(self.a);
                self.f &= !FLAG_Z;
            }
            0x0F => {
                self.a = self.rrc(self.a);
                self.f &= !FLAG_Z;
            }
            0x17 => {
                self.a = self.rl(self.a);
                self.f &= !FLAG_Z;
            }
            0x1F => {
                self.a = self.rr(self.a);
                self.f &= !FLAG_Z;
            }
            // LD (nn),SP
            0x08 => {
                let addr = self.fetch16(bus);
                self.write8(bus, addr, self.sp as u8);
                self.write8(bus, addr.wrapping_add(1), (self.sp >> 8) as u8);
            }
            // ADD HL,rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                let val = self.read_pair((opcode >> 4) & 0x03);
                self.add_hl(val);
                self.tick(bus, 1);
            }
            // LD A,(BC)/(DE)
            0x0A | 0x1A => {
                let addr = self.read_pair((opcode >> 4) & 0x03);
                self.a = self.read8(bus, addr);
            }
            0x10 => {
                // STOP: consume the pad byte, clear DIV, idle until a button.
                let _ = self.fetch8(bus);
                bus.write(0xFF04, 0, Requester::Cpu);
                self.stopped = true;
            }
            // JR e
            0x18 => {
                let offset = self.fetch8(bus) as i8;
                self.pc = self.pc.wrapping_add(offset as u16);
                self.tick(bus, 1);
            }
            // JR cc,e
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(bus) as i8;
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = self.pc.wrapping_add(offset as u16);
                    self.tick(bus, 1);
                }
            }
            // LD (HL+),A / LD (HL-),A
            0x22 | 0x32 => {
                let addr = self.hl();
                self.write8(bus, addr, self.a);
                if opcode == 0x22 {
                    self.set_hl(addr.wrapping_add(1));
                } else {
                    self.set_hl(addr.wrapping_sub(1));
                }
            }
            // LD A,(HL+) / LD A,(HL-)
            0x2A | 0x3A => {
                let addr = self.hl();
                self.a = self.read8(bus, addr);
                if opcode == 0x2A {
                    self.set_hl(addr.wrapping_add(1));
                } else {
                    self.set_hl(addr.wrapping_sub(1));
                }
            }
            0x27 => self.daa(),
            0x2F => {
                self.a ^= 0xFF;
                self.f = (self.f & (FLAG_Z | FLAG_C)) | FLAG_N | FLAG_H;
            }
            0x37 => self.f = (self.f & FLAG_Z) | FLAG_C,
            0x3F => self.f = (self.f & FLAG_Z) | (self.f & FLAG_C) ^ FLAG_C,
            0x76 => {
                let pending = bus.if_reg & bus.ie_reg & 0x1F;
                if self.ime || pending == 0 {
                    self.enter_halt(self.pc, 0);
                } else if self.ime_enable_delay > 0 {
                    self.enter_halt(self.pc, pending);
                } else {
                    // Wake with IME clear and a request pending triggers the
                    // fetch bug instead of halting.
                    self.halt_bug = true;
                    self.exit_halt();
                }
            }
            // LD r,r
            0x40..=0x7F => {
                let val = self.read_reg(bus, opcode & 0x07);
                self.write_reg(bus, (opcode >> 3) & 0x07, val);
            }
            // ALU A,r
            0x80..=0xBF => {
                let val = self.read_reg(bus, opcode & 0x07);
                self.alu((opcode >> 3) & 0x07, val);
            }
            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                self.tick(bus, 1);
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = self.pop_stack(bus);
                    self.tick(bus, 1);
                }
            }
            // POP rr
            0xC1 | 0xD1 | 0xE1 => {
                let val = self.pop_stack(bus);
                self.write_pair((opcode >> 4) & 0x03, val);
            }
            0xF1 => {
                let val = self.pop_stack(bus);
                self.set_af(val);
            }
            // JP cc,nn
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch16(bus);
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = addr;
                    self.tick(bus, 1);
                }
            }
            0xC3 => {
                self.pc = self.fetch16(bus);
                self.tick(bus, 1);
            }
            // CALL cc,nn
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch16(bus);
                if self.condition((opcode >> 3) & 0x03) {
                    self.tick(bus, 1);
                    self.push_stack(bus, self.pc);
                    self.pc = addr;
                }
            }
            // PUSH rr
            0xC5 | 0xD5 | 0xE5 => {
                let val = self.read_pair((opcode >> 4) & 0x03);
                self.tick(bus, 1);
                self.push_stack(bus, val);
            }
            0xF5 => {
                let val = self.af();
                self.tick(bus, 1);
                self.push_stack(bus, val);
            }
            // ALU A,n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let val = self.fetch8(bus);
                self.alu((opcode >> 3) & 0x07, val);
            }
            // RST
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.tick(bus, 1);
                self.push_stack(bus, self.pc);
                self.pc = (opcode & 0x38) as u16;
            }
            0xC9 => {
                self.pc = self.pop_stack(bus);
                self.tick(bus, 1);
            }
            0xCB => {
                let op = self.fetch8(bus);
                self.handle_cb(op, bus);
            }
            0xCD => {
                let addr = self.fetch16(bus);
                self.tick(bus, 1);
                self.push_stack(bus, self.pc);
                self.pc = addr;
            }
            // RETI enables IME immediately, without the EI delay.
            0xD9 => {
                self.pc = self.pop_stack(bus);
                self.ime = true;
                self.tick(bus, 1);
            }
            // LDH (n),A / LDH A,(n)
            0xE0 => {
                let offset = self.fetch8(bus);
                self.write8(bus, 0xFF00 | offset as u16, self.a);
            }
            0xF0 => {
                let offset = self.fetch8(bus);
                self.a = self.read8(bus, 0xFF00 | offset as u16);
            }
            // LDH (C),A / LDH A,(C)
            0xE2 => self.write8(bus, 0xFF00 | self.c as u16, self.a),
            0xF2 => {
                self.a = self.read8(bus, 0xFF00 | self.c as u16);
            }
            0xE8 => {
                let res = self.sp_plus_offset(bus);
                self.sp = res;
                self.tick(bus, 2);
            }
            0xF8 => {
                let res = self.sp_plus_offset(bus);
                self.set_hl(res);
                self.tick(bus, 1);
            }
            0xE9 => self.pc = self.hl(),
            0xEA => {
                let addr = self.fetch16(bus);
                self.write8(bus, addr, self.a);
            }
            0xFA => {
                let addr = self.fetch16(bus);
                self.a = self.read8(bus, addr);
            }
            0xF3 => {
                self.ime = false;
                self.ime_enable_delay = 0;
            }
            // EI takes effect after the following instruction.
            0xFB => self.ime_enable_delay = 2,
            0xF9 => {
                self.sp = self.hl();
                self.tick(bus, 1);
            }
            _ => {
                panic!(
                    "unhandled opcode {opcode:02X} at PC={:04X}",
                    self.pc.wrapping_sub(1)
                );
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
