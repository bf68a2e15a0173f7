use dotmatrix_core::ppu::{Mode, Ppu, SCREEN_WIDTH};

const LINE_DOTS: u16 = 456;
const FRAME_DOTS: u32 = 70224;

fn ppu_with_lcd_on() -> Ppu {
    let mut ppu = Ppu::new();
    ppu.write_reg(0xFF40, 0x91);
    ppu
}

fn step_dots(ppu: &mut Ppu, mut dots: u32, if_reg: &mut u8) {
    while dots > 0 {
        let chunk = dots.min(u16::MAX as u32 / 2) as u16;
        ppu.step(chunk, if_reg);
        dots -= chunk as u32;
    }
}

#[test]
fn line_walks_oam_transfer_hblank() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    assert_eq!(ppu.mode, Mode::OamScan);
    ppu.step(80, &mut if_reg);
    assert_eq!(ppu.mode, Mode::Transfer);
    // No sprites latched, so the transfer runs its base length.
    ppu.step(172, &mut if_reg);
    assert_eq!(ppu.mode, Mode::HBlank);
    ppu.step(LINE_DOTS - 80 - 172, &mut if_reg);
    assert_eq!(ppu.mode, Mode::OamScan);
    assert_eq!(ppu.read_reg(0xFF44), 1);
}

#[test]
fn vblank_interrupt_fires_at_line_144() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    step_dots(&mut ppu, 144 * LINE_DOTS as u32 - 4, &mut if_reg);
    assert_eq!(if_reg & 0x01, 0);
    ppu.step(4, &mut if_reg);
    assert_eq!(if_reg & 0x01, 0x01);
    assert_eq!(ppu.mode, Mode::VBlank);
    assert_eq!(ppu.read_reg(0xFF44), 144);
    assert!(ppu.frame_ready());
}

#[test]
fn frame_wraps_after_70224_dots() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    step_dots(&mut ppu, FRAME_DOTS, &mut if_reg);
    assert_eq!(ppu.read_reg(0xFF44), 0);
    assert_eq!(ppu.mode, Mode::OamScan);
    assert_eq!(ppu.frames(), 1);
}

#[test]
fn sprite_count_stretches_transfer() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    // Three sprites on line 0 (Y byte 16 puts a sprite on line 0).
    for i in 0..3 {
        ppu.oam[i * 4] = 16;
        ppu.oam[i * 4 + 1] = 8 * (i as u8 + 1);
    }
    ppu.step(80, &mut if_reg);
    assert_eq!(ppu.mode, Mode::Transfer);
    ppu.step(172, &mut if_reg);
    assert_eq!(ppu.mode, Mode::Transfer);
    ppu.step(3 * 6, &mut if_reg);
    assert_eq!(ppu.mode, Mode::HBlank);
    // The line still totals 456 dots.
    ppu.step(LINE_DOTS - 80 - 172 - 3 * 6, &mut if_reg);
    assert_eq!(ppu.read_reg(0xFF44), 1);
}

#[test]
fn vram_and_oam_blocking_follows_mode() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    assert_eq!(ppu.mode, Mode::OamScan);
    assert!(ppu.oam_blocked());
    assert!(!ppu.vram_blocked());
    ppu.step(80, &mut if_reg);
    assert_eq!(ppu.mode, Mode::Transfer);
    assert!(ppu.oam_blocked());
    assert!(ppu.vram_blocked());
    ppu.step(172, &mut if_reg);
    assert_eq!(ppu.mode, Mode::HBlank);
    assert!(!ppu.oam_blocked());
    assert!(!ppu.vram_blocked());
}

#[test]
fn lcd_off_forces_line_zero_hblank() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    step_dots(&mut ppu, 10 * LINE_DOTS as u32, &mut if_reg);
    assert_eq!(ppu.read_reg(0xFF44), 10);
    ppu.write_reg(0xFF40, 0x11);
    ppu.step(4, &mut if_reg);
    assert_eq!(ppu.read_reg(0xFF44), 0);
    assert_eq!(ppu.mode, Mode::HBlank);
    assert!(!ppu.oam_blocked());
    assert!(!ppu.vram_blocked());
    // No interrupts while off.
    if_reg = 0;
    step_dots(&mut ppu, FRAME_DOTS, &mut if_reg);
    assert_eq!(if_reg, 0);
}

#[test]
fn lyc_match_raises_stat_interrupt() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    ppu.write_reg(0xFF45, 5);
    ppu.write_reg(0xFF41, 0x40);
    step_dots(&mut ppu, 5 * LINE_DOTS as u32 - 4, &mut if_reg);
    assert_eq!(if_reg & 0x02, 0);
    ppu.step(4, &mut if_reg);
    assert_eq!(if_reg & 0x02, 0x02);
    // Coincidence bit reads back in STAT.
    assert_eq!(ppu.read_reg(0xFF41) & 0x04, 0x04);
}

#[test]
fn stat_line_blocks_back_to_back_sources() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    // LYC=0 matches immediately and holds the line high, so the later
    // HBlank source on the same high line must not fire again.
    ppu.write_reg(0xFF45, 0);
    ppu.write_reg(0xFF41, 0x48);
    ppu.step(4, &mut if_reg);
    assert_eq!(if_reg & 0x02, 0x02);
    if_reg = 0;
    ppu.step(LINE_DOTS - 4, &mut if_reg);
    assert_eq!(if_reg & 0x02, 0);
}

#[test]
fn background_scanline_renders_shades() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    // Identity palette, tile 0 row 0 drawn as shade 3 on every pixel.
    ppu.write_reg(0xFF47, 0xE4);
    ppu.vram[0] = 0xFF;
    ppu.vram[1] = 0xFF;
    // Map already points every cell at tile 0.
    ppu.step(80 + 172, &mut if_reg);
    assert_eq!(ppu.mode, Mode::HBlank);
    let line = &ppu.framebuffer()[..SCREEN_WIDTH];
    assert!(line.iter().all(|&px| px == 3));
}

#[test]
fn window_left_of_screen_covers_whole_line() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    // Window from its own map, WX=0 so it hangs 7 pixels off the left
    // edge and replaces the background across the whole line.
    ppu.write_reg(0xFF40, 0xF1);
    ppu.write_reg(0xFF47, 0xE4);
    ppu.write_reg(0xFF4A, 0);
    ppu.write_reg(0xFF4B, 0);
    for cell in 0x1C00..0x1C20 {
        ppu.vram[cell] = 1;
    }
    // Tile 1 row 0 drawn as shade 3, tile 0 (the background) stays 0.
    ppu.vram[16] = 0xFF;
    ppu.vram[17] = 0xFF;
    ppu.step(80 + 172, &mut if_reg);
    assert_eq!(ppu.mode, Mode::HBlank);
    let line = &ppu.framebuffer()[..SCREEN_WIDTH];
    assert!(line.iter().all(|&px| px == 3));
    assert_eq!(ppu.window_line_counter(), 1);
}

#[test]
fn window_line_counter_only_advances_when_drawn() {
    let mut ppu = ppu_with_lcd_on();
    let mut if_reg = 0;
    ppu.write_reg(0xFF40, 0xB1);
    ppu.write_reg(0xFF4A, 2);
    ppu.write_reg(0xFF4B, 7);
    step_dots(&mut ppu, 2 * LINE_DOTS as u32, &mut if_reg);
    assert_eq!(ppu.window_line_counter(), 0);
    step_dots(&mut ppu, 3 * LINE_DOTS as u32, &mut if_reg);
    assert_eq!(ppu.window_line_counter(), 3);
}
