use dotmatrix_core::bus::{Bus, Requester};

fn bus_with_wram_pattern(base: u8) -> Bus {
    let mut bus = Bus::new();
    for i in 0..160usize {
        bus.wram[i] = base.wrapping_add(i as u8);
    }
    bus
}

#[test]
fn transfer_copies_whole_oam_in_162_cycles() {
    let mut bus = bus_with_wram_pattern(0x10);
    bus.write(0xFF46, 0xC0, Requester::Cpu);

    // Two start-delay cycles before the first byte moves.
    bus.dma_step(1);
    assert!(!bus.dma.active());
    bus.dma_step(1);

    bus.dma_step(160);
    assert!(!bus.dma.active());
    for i in 0..160usize {
        assert_eq!(bus.ppu.oam[i], 0x10 + i as u8, "byte {i}");
    }
}

#[test]
fn oam_reads_blocked_while_active() {
    let mut bus = bus_with_wram_pattern(0x00);
    bus.write(0xFF46, 0xC0, Requester::Cpu);
    bus.dma_step(2);
    assert!(bus.dma.active());

    assert_eq!(bus.read(0xFE00, Requester::Cpu), 0xFF);
    bus.write(0xFE05, 0xAA, Requester::Cpu);

    bus.dma_step(160);
    assert!(!bus.dma.active());
    assert_eq!(bus.read(0xFE05, Requester::Cpu), 0x05);
}

#[test]
fn wram_and_hram_stay_reachable_while_active() {
    let mut bus = bus_with_wram_pattern(0x77);
    bus.write(0xFF46, 0xC0, Requester::Cpu);
    bus.dma_step(10);
    assert!(bus.dma.active());
    assert_eq!(bus.read(0xC000, Requester::Cpu), 0x77);
    bus.write(0xFF80, 0x5A, Requester::Cpu);
    assert_eq!(bus.read(0xFF80, Requester::Cpu), 0x5A);
}

#[test]
fn trigger_register_reads_back_last_write() {
    let mut bus = Bus::new();
    bus.write(0xFF46, 0xC0, Requester::Cpu);
    assert_eq!(bus.read(0xFF46, Requester::Cpu), 0xC0);
    bus.dma_step(50);
    assert_eq!(bus.read(0xFF46, Requester::Cpu), 0xC0);
}

#[test]
fn restart_during_transfer_runs_after_completion() {
    let mut bus = bus_with_wram_pattern(0x00);
    // Second source page in the other half of WRAM.
    for i in 0..160usize {
        bus.wram[0x1000 + i] = 0x80u8.wrapping_add(i as u8);
    }

    bus.write(0xFF46, 0xC0, Requester::Cpu);
    bus.dma_step(50);
    assert!(bus.dma.active());
    bus.write(0xFF46, 0xD0, Requester::Cpu);

    // First transfer runs to completion from the old source.
    bus.dma_step(112);
    assert_eq!(bus.ppu.oam[159], 159);

    // Then the remembered request restarts the engine.
    bus.dma_step(2 + 160);
    assert!(!bus.dma.active());
    for i in 0..160usize {
        assert_eq!(bus.ppu.oam[i], 0x80u8.wrapping_add(i as u8), "byte {i}");
    }
}

#[test]
fn source_reads_above_echo_mirror_down() {
    let mut bus = Bus::new();
    // 0xFE00 mirrors down to 0xDE00, which is WRAM offset 0x1E00.
    for i in 0..160usize {
        bus.wram[0x1E00 + i] = 0x33u8.wrapping_add(i as u8);
    }
    bus.write(0xFF46, 0xFE, Requester::Cpu);
    bus.dma_step(162);
    assert_eq!(bus.ppu.oam[0], 0x33);
    assert_eq!(bus.ppu.oam[159], 0x33u8.wrapping_add(159));
}
