//! Pixel processing unit.
//!
//! Runs the four-mode line state machine and composites one scanline at a
//! time into a shade framebuffer. Each pixel is a 2-bit shade (0 lightest,
//! 3 darkest); mapping shades to actual colors is left to the embedder.

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

/// Dots per scanline, all modes included.
const LINE_DOTS: u16 = 456;
/// Dots spent scanning OAM at the start of a visible line.
const OAM_SCAN_DOTS: u16 = 80;
/// Minimum pixel transfer length, with an empty sprite table.
const TRANSFER_BASE_DOTS: u16 = 172;
/// Extra transfer dots charged per latched sprite.
const SPRITE_PENALTY_DOTS: u16 = 6;
/// Hard cap on the pixel transfer length.
const TRANSFER_MAX_DOTS: u16 = 289;

const VBLANK_LINES: u8 = 10;

const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

pub const VRAM_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;

const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_SIGNED_BASE: usize = 0x0800;

// Window X position is clipped if greater than this value
const WINDOW_X_MAX: u8 = 166;

/// LCD register state the boot ROM leaves behind, held for this many dots
/// before the line machine starts advancing again.
const BOOT_HOLD_DOTS: u16 = 8192;

/// LCD mode as exposed in STAT bits 0-1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    Transfer = 3,
}

#[derive(Copy, Clone, Default)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
    oam_index: usize,
}

pub struct Ppu {
    pub vram: [u8; VRAM_SIZE],
    pub oam: [u8; OAM_SIZE],

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    lyc_eq_ly: bool,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    /// Internal window line counter
    win_line_counter: u8,

    pub mode: Mode,
    mode_clock: u16,
    /// Pixel transfer length for the line in flight, fixed at mode 3 entry.
    transfer_dots: u16,
    boot_hold_dots: u16,

    framebuffer: [u8; SCREEN_WIDTH * SCREEN_HEIGHT],
    line_bg_zero: [bool; SCREEN_WIDTH],
    /// Latched sprites for the current scanline
    line_sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    frame_ready: bool,
    stat_irq_line: bool,
    vblank_mode2_quirk: bool,
    frame_counter: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            vram: [0; VRAM_SIZE],
            oam: [0; OAM_SIZE],
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            lyc_eq_ly: false,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            win_line_counter: 0,
            mode: Mode::OamScan,
            mode_clock: 0,
            transfer_dots: TRANSFER_BASE_DOTS,
            boot_hold_dots: 0,
            framebuffer: [0; SCREEN_WIDTH * SCREEN_HEIGHT],
            line_bg_zero: [false; SCREEN_WIDTH],
            line_sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            frame_ready: false,
            stat_irq_line: false,
            vblank_mode2_quirk: false,
            frame_counter: 0,
        }
    }

    /// Initialize registers to the state expected after the boot ROM
    /// has finished executing.
    pub fn apply_boot_state(&mut self) {
        self.lcdc = 0x91;
        self.stat = 0x00;
        self.bgp = 0xFC;
        self.mode = Mode::HBlank;
        self.ly = 0x0A;
        self.mode_clock = 0;
        self.win_line_counter = 0;
        self.boot_hold_dots = BOOT_HOLD_DOTS;
        self.lyc_eq_ly = self.ly == self.lyc;
        self.stat_irq_line = false;
        self.vblank_mode2_quirk = false;
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcdc & 0x80 != 0
    }

    /// VRAM is held by the pixel pipe during mode 3.
    pub fn vram_blocked(&self) -> bool {
        self.lcd_enabled() && self.mode == Mode::Transfer
    }

    /// OAM is held during the scan and the pixel transfer.
    pub fn oam_blocked(&self) -> bool {
        self.lcd_enabled() && matches!(self.mode, Mode::OamScan | Mode::Transfer)
    }

    /// Returns true if a full frame has been rendered and is ready to display.
    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Returns the current framebuffer of 2-bit shades. Call `frame_ready()`
    /// to check if a frame is complete. After presenting, call
    /// `clear_frame_flag()`.
    pub fn framebuffer(&self) -> &[u8; SCREEN_WIDTH * SCREEN_HEIGHT] {
        &self.framebuffer
    }

    /// Clears the frame ready flag after a frame has been consumed.
    pub fn clear_frame_flag(&mut self) {
        self.frame_ready = false;
    }

    /// Returns the number of frames that have been completed since power on.
    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    /// Returns the current value of the internal window line counter.
    pub fn window_line_counter(&self) -> u8 {
        self.win_line_counter
    }

    fn update_lyc_compare(&mut self) {
        if self.lcd_enabled() {
            self.lyc_eq_ly = self.ly == self.lyc;
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                (self.stat & 0x78)
                    | 0x80
                    | self.mode as u8
                    | if self.lyc_eq_ly { 0x04 } else { 0 }
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcd_enabled();
                self.lcdc = val;
                if was_on && !self.lcd_enabled() {
                    self.mode = Mode::HBlank;
                    self.mode_clock = 0;
                    self.win_line_counter = 0;
                    self.ly = 0;
                }
                if self.lcd_enabled() {
                    self.update_lyc_compare();
                }
            }
            0xFF41 => self.stat = (self.stat & 0x07) | (val & 0xF8),
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => {
                self.lyc = val;
                self.update_lyc_compare();
            }
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    pub fn step(&mut self, dots: u16, if_reg: &mut u8) {
        let mut remaining = dots;
        if self.boot_hold_dots > 0 {
            let consume = remaining.min(self.boot_hold_dots);
            self.boot_hold_dots -= consume;
            remaining -= consume;
            if remaining == 0 {
                return;
            }
        }
        while remaining > 0 {
            let increment = remaining.min(4);
            remaining -= increment;
            if !self.lcd_enabled() {
                self.mode = Mode::HBlank;
                self.ly = 0;
                self.mode_clock = 0;
                self.win_line_counter = 0;
                self.vblank_mode2_quirk = false;
                continue;
            }

            self.update_lyc_compare();

            self.mode_clock += increment;

            match self.mode {
                Mode::OamScan => {
                    if self.mode_clock >= OAM_SCAN_DOTS {
                        self.mode_clock -= OAM_SCAN_DOTS;
                        self.oam_scan();
                        self.transfer_dots = (TRANSFER_BASE_DOTS
                            + SPRITE_PENALTY_DOTS * self.sprite_count as u16)
                            .min(TRANSFER_MAX_DOTS);
                        self.mode = Mode::Transfer;
                    }
                }
                Mode::Transfer => {
                    if self.mode_clock >= self.transfer_dots {
                        self.mode_clock -= self.transfer_dots;
                        self.render_scanline();
                        self.mode = Mode::HBlank;
                    }
                }
                Mode::HBlank => {
                    let hblank_dots = LINE_DOTS - OAM_SCAN_DOTS - self.transfer_dots;
                    if self.mode_clock >= hblank_dots {
                        self.mode_clock -= hblank_dots;
                        self.ly += 1;
                        self.update_lyc_compare();
                        if self.ly == SCREEN_HEIGHT as u8 {
                            self.frame_ready = true;
                            self.mode = Mode::VBlank;
                            self.vblank_mode2_quirk = true;
                            *if_reg |= 0x01;
                        } else {
                            self.mode = Mode::OamScan;
                        }
                    }
                }
                Mode::VBlank => {
                    if self.mode_clock >= LINE_DOTS {
                        self.mode_clock -= LINE_DOTS;
                        self.ly += 1;
                        self.update_lyc_compare();
                        if self.ly > SCREEN_HEIGHT as u8 + VBLANK_LINES - 1 {
                            self.ly = 0;
                            self.frame_ready = false;
                            self.win_line_counter = 0;
                            self.frame_counter = self.frame_counter.wrapping_add(1);
                            self.mode = Mode::OamScan;
                            self.update_lyc_compare();
                        }
                    }
                }
            }

            self.update_stat_irq(if_reg);
        }
    }

    fn update_stat_irq(&mut self, if_reg: &mut u8) {
        let coincidence = self.lyc_eq_ly && self.stat & 0x40 != 0;
        let mode_signal = match self.mode {
            Mode::HBlank => self.stat & 0x08 != 0,
            Mode::VBlank => self.stat & 0x10 != 0,
            Mode::OamScan => self.stat & 0x20 != 0,
            Mode::Transfer => false,
        };
        // On DMG hardware the mode 2 STAT source also fires at VBlank entry.
        let glitch = self.vblank_mode2_quirk && self.stat & 0x20 != 0;
        self.vblank_mode2_quirk = false;
        let current = coincidence || mode_signal;
        if (current && !self.stat_irq_line) || glitch {
            *if_reg |= 0x02;
        }
        self.stat_irq_line = current || glitch;
    }

    /// Collect up to 10 sprites visible on the current scanline, ordered by
    /// X position then OAM index for draw priority.
    fn oam_scan(&mut self) {
        let sprite_height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
        self.sprite_count = 0;
        for i in 0..TOTAL_SPRITES {
            if self.sprite_count >= MAX_SPRITES_PER_LINE {
                break;
            }
            let base = i * 4;
            let y = self.oam[base] as i16 - 16;
            if self.ly as i16 >= y && (self.ly as i16) < y + sprite_height {
                self.line_sprites[self.sprite_count] = Sprite {
                    x: self.oam[base + 1] as i16 - 8,
                    y,
                    tile: self.oam[base + 2],
                    flags: self.oam[base + 3],
                    oam_index: i,
                };
                self.sprite_count += 1;
            }
        }
        self.line_sprites[..self.sprite_count].sort_by_key(|s| (s.x, s.oam_index));
    }

    #[inline(always)]
    fn shade(palette: u8, color_id: u8) -> u8 {
        (palette >> (color_id * 2)) & 0x03
    }

    fn tile_row_address(&self, tile_index: u8, tile_y: usize) -> usize {
        let base = if self.lcdc & 0x10 != 0 {
            tile_index as usize * 16
        } else {
            TILE_DATA_SIGNED_BASE + ((tile_index as i8 as i16 + 128) as usize) * 16
        };
        base + tile_y * 2
    }

    fn render_scanline(&mut self) {
        if !self.lcd_enabled() || self.ly as usize >= SCREEN_HEIGHT {
            return;
        }

        // When the background is disabled via LCDC bit 0 the hardware outputs
        // color 0 for every pixel and sprites treat the line as color 0.
        let bg_enabled = self.lcdc & 0x01 != 0;
        let zero_shade = Self::shade(self.bgp, 0);
        let row = self.ly as usize * SCREEN_WIDTH;
        self.framebuffer[row..row + SCREEN_WIDTH].fill(zero_shade);
        self.line_bg_zero.fill(true);

        if bg_enabled {
            let tile_map_base = if self.lcdc & 0x08 != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };

            let bg_y = (self.ly as u16 + self.scy as u16) & 0xFF;
            let tile_row = (bg_y / 8) as usize;
            let tile_y = (bg_y % 8) as usize;
            for x in 0..SCREEN_WIDTH as u16 {
                let px = x.wrapping_add(self.scx as u16) & 0xFF;
                let tile_col = (px / 8) as usize;
                let tile_index = self.vram[tile_map_base + tile_row * 32 + tile_col];
                let addr = self.tile_row_address(tile_index, tile_y);
                let bit = 7 - (px % 8) as usize;
                let lo = self.vram[addr];
                let hi = self.vram[addr + 1];
                let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                self.framebuffer[row + x as usize] = Self::shade(self.bgp, color_id);
                self.line_bg_zero[x as usize] = color_id == 0;
            }

            if self.lcdc & 0x20 != 0 && self.ly >= self.wy && self.wx <= WINDOW_X_MAX {
                // WX below 7 hangs off the left edge; the window still
                // covers the whole line from column 0.
                let origin = self.wx as i16 - 7;
                let window_map_base = if self.lcdc & 0x40 != 0 {
                    BG_MAP_1_BASE
                } else {
                    BG_MAP_0_BASE
                };
                let window_y = self.win_line_counter as usize;
                let tile_row = window_y / 8;
                let tile_y = window_y % 8;
                for x in origin.max(0) as usize..SCREEN_WIDTH {
                    let window_x = (x as i16 - origin) as usize;
                    let tile_col = window_x / 8;
                    let tile_index = self.vram[window_map_base + tile_row * 32 + tile_col];
                    let addr = self.tile_row_address(tile_index, tile_y);
                    let bit = 7 - window_x % 8;
                    let lo = self.vram[addr];
                    let hi = self.vram[addr + 1];
                    let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                    self.framebuffer[row + x] = Self::shade(self.bgp, color_id);
                    self.line_bg_zero[x] = color_id == 0;
                }
                self.win_line_counter = self.win_line_counter.wrapping_add(1);
            }
        }

        if self.lcdc & 0x02 != 0 {
            let sprite_height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
            let mut drawn = [false; SCREEN_WIDTH];
            for s in &self.line_sprites[..self.sprite_count] {
                let mut tile = s.tile;
                if sprite_height == 16 {
                    tile &= 0xFE;
                }
                let mut line_idx = self.ly as i16 - s.y;
                if s.flags & 0x40 != 0 {
                    line_idx = sprite_height - 1 - line_idx;
                }
                let palette = if s.flags & 0x10 != 0 {
                    self.obp1
                } else {
                    self.obp0
                };
                for px in 0..8 {
                    let bit = if s.flags & 0x20 != 0 { px } else { 7 - px };
                    let addr = (tile + ((line_idx as usize) >> 3) as u8) as usize * 16
                        + (line_idx as usize & 7) * 2;
                    let lo = self.vram[addr];
                    let hi = self.vram[addr + 1];
                    let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                    if color_id == 0 {
                        continue;
                    }
                    let sx = s.x + px as i16;
                    if !(0i16..SCREEN_WIDTH as i16).contains(&sx) || drawn[sx as usize] {
                        continue;
                    }
                    let bg_zero = !bg_enabled || self.line_bg_zero[sx as usize];
                    if s.flags & 0x80 != 0 && !bg_zero {
                        continue;
                    }
                    self.framebuffer[row + sx as usize] = Self::shade(palette, color_id);
                    drawn[sx as usize] = true;
                }
            }
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
