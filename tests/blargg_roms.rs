mod common;

use dotmatrix_core::machine::Machine;

/// Run until the report screen settles on a verdict. The ROMs print
/// their result to the background map, so we scrape it as text.
fn run_blargg<P: AsRef<std::path::Path>>(rom_path: P, max_frames: u32) -> String {
    let rom = std::fs::read(rom_path).expect("rom not found");
    let mut machine = Machine::new();
    machine.load_rom(rom);

    let mut text = String::new();
    for _ in 0..max_frames {
        machine.run_frame();
        text = common::screen_text(&machine);
        if text.contains("Passed") || text.contains("Failed") {
            break;
        }
    }
    text
}

#[test]
fn cpu_instrs() {
    let output = run_blargg(common::rom_path("blargg/cpu_instrs/cpu_instrs.gb"), 4000);
    assert!(output.contains("Passed"), "cpu_instrs failed:\n{}", output);
}

#[test]
fn instr_timing() {
    let output = run_blargg(
        common::rom_path("blargg/instr_timing/instr_timing.gb"),
        1000,
    );
    assert!(output.contains("Passed"), "instr_timing failed:\n{}", output);
}

#[test]
fn mem_timing() {
    let output = run_blargg(common::rom_path("blargg/mem_timing/mem_timing.gb"), 1000);
    assert!(output.contains("Passed"), "mem_timing failed:\n{}", output);
}
