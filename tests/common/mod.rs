use once_cell::sync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use dotmatrix_core::machine::Machine;

static INIT: OnceCell<()> = OnceCell::new();

fn ensure_test_roms() {
    INIT.get_or_init(|| {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("test_roms");
        fs::create_dir_all(&dir).expect("failed to create test_roms directory");
        ensure_c_sp_test_rom_bundle(&dir);
    });
}

fn ensure_c_sp_test_rom_bundle(dir: &Path) {
    // ROM binaries are not checked in; CI/dev machines download a known
    // bundle on demand. Skip the download if the tree is already extracted.
    let has_core_tree = dir.join("blargg").exists() && dir.join("mooneye-test-suite").exists();
    if has_core_tree {
        return;
    }

    let url = "https://github.com/c-sp/game-boy-test-roms/releases/download/v7.0/game-boy-test-roms-v7.0.zip";
    let resp = reqwest::blocking::get(url).expect("failed to download test roms");
    let status = resp.status();
    if !status.is_success() {
        panic!("failed to download test roms: {status}");
    }
    let bytes = resp.bytes().expect("failed to read rom bytes");
    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).expect("failed to open zip archive");
    archive.extract(dir).expect("failed to extract test roms");
}

pub fn roms_dir() -> PathBuf {
    ensure_test_roms();
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test_roms")
}

#[allow(dead_code)]
pub fn rom_path<P: AsRef<Path>>(relative: P) -> PathBuf {
    roms_dir().join(relative)
}

/// Decode the visible background map as text. Blargg's ROMs print their
/// report with a font whose tile indices are the ASCII codes, so the map
/// bytes read back as characters.
#[allow(dead_code)]
pub fn screen_text(machine: &Machine) -> String {
    let lcdc = machine.bus.ppu.read_reg(0xFF40);
    let map_base: usize = if lcdc & 0x08 != 0 { 0x1C00 } else { 0x1800 };
    let mut text = String::new();
    for row in 0..18 {
        for col in 0..20 {
            let tile = machine.bus.ppu.vram[map_base + row * 32 + col];
            text.push(if (0x20..0x7F).contains(&tile) {
                tile as char
            } else {
                ' '
            });
        }
        text.push('\n');
    }
    text
}
