//! Joypad register (0xFF00).
//!
//! The guest writes the upper-nibble select lines; the frontend publishes
//! button state through [`Joypad::set_button`]. Lines are active-low:
//! 0 = selected / pressed.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

pub struct Joypad {
    /// Select bits 4 (directions) and 5 (actions) as last written.
    select: u8,
    /// Direction pad state, bits 0..=3, 1 = released.
    directions: u8,
    /// Action button state, bits 0..=3, 1 = released.
    actions: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            directions: 0x0F,
            actions: 0x0F,
        }
    }

    pub fn read(&self) -> u8 {
        let mut nibble = 0x0F;
        if self.select & 0x10 == 0 {
            nibble &= self.directions;
        }
        if self.select & 0x20 == 0 {
            nibble &= self.actions;
        }
        0xC0 | self.select | nibble
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    /// Update one button from the frontend, requesting the Joypad interrupt
    /// on a high-to-low transition of a selected line.
    pub fn set_button(&mut self, button: Button, pressed: bool, if_reg: &mut u8) {
        let (mask, selected, state) = match button {
            Button::Right => (0x01, self.select & 0x10 == 0, &mut self.directions),
            Button::Left => (0x02, self.select & 0x10 == 0, &mut self.directions),
            Button::Up => (0x04, self.select & 0x10 == 0, &mut self.directions),
            Button::Down => (0x08, self.select & 0x10 == 0, &mut self.directions),
            Button::A => (0x01, self.select & 0x20 == 0, &mut self.actions),
            Button::B => (0x02, self.select & 0x20 == 0, &mut self.actions),
            Button::Select => (0x04, self.select & 0x20 == 0, &mut self.actions),
            Button::Start => (0x08, self.select & 0x20 == 0, &mut self.actions),
        };
        let was_released = *state & mask != 0;
        if pressed {
            *state &= !mask;
            if was_released && selected {
                *if_reg |= 0x10;
            }
        } else {
            *state |= mask;
        }
    }

    /// True if any button is currently held, regardless of the select lines.
    /// Used to leave STOP.
    pub fn any_pressed(&self) -> bool {
        self.directions != 0x0F || self.actions != 0x0F
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}
