use dotmatrix_core::machine::Machine;

/// Machine with test code in WRAM and the stack parked above it.
fn machine_with_code(code: &[u8]) -> Machine {
    let mut machine = Machine::new();
    machine.bus.wram[..code.len()].copy_from_slice(code);
    machine.cpu.pc = 0xC000;
    machine.cpu.sp = 0xD800;
    machine.bus.if_reg = 0;
    machine
}

#[test]
fn dispatch_takes_five_cycles_to_vector() {
    let mut machine = machine_with_code(&[0x00]);
    machine.bus.ie_reg = 0x04;
    machine.bus.if_reg = 0x04;
    machine.cpu.ime = true;

    // One cycle for the NOP, five for the dispatch.
    let cycles = machine.step();
    assert_eq!(cycles, 6);
    assert_eq!(machine.cpu.pc, 0x0050);
    assert!(!machine.cpu.ime);
    assert_eq!(machine.bus.if_reg & 0x04, 0);
    // Return address 0xC001 pushed high byte first.
    assert_eq!(machine.bus.wram[0x17FF], 0xC0);
    assert_eq!(machine.bus.wram[0x17FE], 0x01);
    assert_eq!(machine.cpu.sp, 0xD7FE);
}

#[test]
fn lowest_bit_wins_when_several_pending() {
    let mut machine = machine_with_code(&[0x00]);
    machine.bus.ie_reg = 0x1F;
    machine.bus.if_reg = 0x1F;
    machine.cpu.ime = true;

    machine.step();
    assert_eq!(machine.cpu.pc, 0x0040);
    assert_eq!(machine.bus.if_reg, 0x1E);
}

#[test]
fn ei_takes_effect_after_next_instruction() {
    let mut machine = machine_with_code(&[0xFB, 0x00, 0x00]);
    machine.bus.ie_reg = 0x04;
    machine.bus.if_reg = 0x04;

    machine.step();
    assert_eq!(machine.cpu.pc, 0xC001);
    assert!(!machine.cpu.ime);

    // The NOP after EI runs, then the dispatch fires.
    let cycles = machine.step();
    assert_eq!(cycles, 6);
    assert_eq!(machine.cpu.pc, 0x0050);
}

#[test]
fn di_suppresses_pending_dispatch() {
    let mut machine = machine_with_code(&[0xF3, 0x00]);
    machine.bus.ie_reg = 0x04;
    machine.bus.if_reg = 0x04;
    machine.cpu.ime = true;

    machine.step();
    assert_eq!(machine.cpu.pc, 0xC001);
    machine.step();
    assert_eq!(machine.cpu.pc, 0xC002);
    assert_eq!(machine.bus.if_reg & 0x04, 0x04);
}

#[test]
fn halt_wakes_without_dispatch_when_ime_clear() {
    let mut machine = machine_with_code(&[0x76, 0x00]);
    machine.bus.ie_reg = 0x04;

    machine.step();
    assert!(machine.cpu.halted);

    machine.step();
    assert!(machine.cpu.halted);

    machine.bus.if_reg = 0x04;
    machine.step();
    assert!(!machine.cpu.halted);
    machine.step();
    assert_eq!(machine.cpu.pc, 0xC002);
    // The request is still latched.
    assert_eq!(machine.bus.if_reg & 0x04, 0x04);
}

#[test]
fn halt_with_pending_request_and_ime_clear_duplicates_fetch() {
    let mut machine = machine_with_code(&[0x76, 0x3C, 0x00]);
    machine.bus.ie_reg = 0x04;
    machine.bus.if_reg = 0x04;

    let a_before = machine.cpu.a;
    machine.step();
    assert!(!machine.cpu.halted);

    // The INC A after HALT executes twice.
    machine.step();
    assert_eq!(machine.cpu.pc, 0xC001);
    machine.step();
    assert_eq!(machine.cpu.pc, 0xC002);
    assert_eq!(machine.cpu.a, a_before.wrapping_add(2));
}

#[test]
fn halt_wakes_into_dispatch_when_ime_set() {
    let mut machine = machine_with_code(&[0x76, 0x00]);
    machine.bus.ie_reg = 0x04;
    machine.cpu.ime = true;

    machine.step();
    assert!(machine.cpu.halted);

    machine.bus.if_reg = 0x04;
    machine.step();
    assert!(!machine.cpu.halted);
    assert_eq!(machine.cpu.pc, 0x0050);
    // Resume address is the instruction after HALT.
    assert_eq!(machine.bus.wram[0x17FF], 0xC0);
    assert_eq!(machine.bus.wram[0x17FE], 0x01);
}

#[test]
fn halt_during_ei_delay_dispatches_and_runs_isr() {
    let mut machine = machine_with_code(&[0xFB, 0x76, 0x00]);
    machine.bus.ie_reg = 0x04;
    machine.bus.if_reg = 0x04;

    machine.step();
    let cycles = machine.step();
    assert_eq!(cycles, 6);
    assert_eq!(machine.cpu.pc, 0x0050);
    assert!(!machine.cpu.halted);
    // The pushed return address is the HALT instruction itself.
    assert_eq!(machine.bus.wram[0x17FF], 0xC0);
    assert_eq!(machine.bus.wram[0x17FE], 0x01);

    // The handler executes instead of idling at the vector.
    machine.step();
    assert!(!machine.cpu.halted);
    assert_ne!(machine.cpu.pc, 0x0050);
}

#[test]
fn reti_enables_ime_immediately() {
    let mut machine = machine_with_code(&[0xD9]);
    machine.bus.wram[0x1800] = 0x10;
    machine.bus.wram[0x1801] = 0xC0;

    let cycles = machine.step();
    assert_eq!(cycles, 4);
    assert_eq!(machine.cpu.pc, 0xC010);
    assert!(machine.cpu.ime);
}
