//! Baby Emulator - CLI Entry Point
//!
//! Commands:
//! - `baby-emu run <program>` - Run an ASM or snapshot file
//! - `baby-emu asm <source>` - Assemble to a snapshot file
//! - `baby-emu disasm <snapshot>` - Disassemble a snapshot file
//! - `baby-emu config` - Print a sample configuration file

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "baby-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the Manchester Baby (SSEM, 1948)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .asm or snapshot file to execute
        program: String,
        /// Milliseconds to wait between cycles (default from config)
        #[arg(short, long)]
        delay_ms: Option<u64>,
        /// Maximum number of cycles to run (default from config)
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Save the final state to a snapshot file
        #[arg(short, long)]
        save: Option<String>,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assemble source to a snapshot file
    Asm {
        /// Path to the source file
        source: String,
        /// Output snapshot file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a snapshot file to source text
    Disasm {
        /// Path to the snapshot file
        snapshot: String,
        /// Assembly source whose labels should be used
        #[arg(short, long)]
        labels: Option<String>,
    },
    /// Print a sample baby.toml
    Config,
}

fn main() {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, delay_ms, max_cycles, trace, save, json }) => {
            run_program(&program, delay_ms, max_cycles, trace, save, json);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { snapshot, labels }) => {
            disassemble_file(&snapshot, labels);
        }
        Some(Commands::Config) => {
            print!("{}", baby::Config::sample_config());
        }
        None => {
            println!("Baby Emulator v0.1.0");
            println!("An emulator of the Manchester Baby (1948)");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

fn read_source(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| fail(format!("Failed to read {}: {}", path, e)))
}

/// Load a program (either assembly or snapshot) into a fresh machine.
fn load_machine(path: &str, config: &baby::Config) -> baby::Baby {
    use baby::asm::load_snapshot_file;

    let mut machine = baby::Baby::new();

    if path.ends_with(".asm") {
        let source = read_source(path);
        match machine.load_program_with(&source, &config.asm_options()) {
            Ok(symbols) => println!("📝 Assembled {} ({} labels)", path, symbols.len()),
            Err(e) => fail(format!("Assembly error: {}", e)),
        }
    } else {
        match load_snapshot_file(path) {
            Ok(snapshot) => {
                machine.restore(&snapshot);
                println!("📂 Loaded snapshot {}", path);
            }
            Err(e) => fail(format!("Failed to load snapshot: {}", e)),
        }
    }

    machine
}

fn run_program(
    path: &str,
    delay_ms: Option<u64>,
    max_cycles: Option<u64>,
    trace: bool,
    save: Option<String>,
    json: bool,
) {
    use baby::{RunController, RunEvent};
    use std::time::Duration;

    let config = baby::Config::get();
    let delay = delay_ms.map(Duration::from_millis).unwrap_or_else(|| config.delay());
    let max_cycles = max_cycles.unwrap_or_else(|| config.max_cycles());

    println!("🔧 Running: {}", path);
    let mut controller = RunController::new(load_machine(path, config));
    let events = controller.events();

    println!();
    println!("━━━ Execution ━━━");

    controller.run_limited(delay, max_cycles);

    for event in events.iter() {
        match event {
            RunEvent::Cycle(cycle) => {
                if trace {
                    println!(
                        "{:02}: {:<8} A={:<11} CI={:02}",
                        cycle.line,
                        cycle.instruction.to_string(),
                        cycle.snapshot.accumulator.to_i32(),
                        cycle.snapshot.control_instruction
                    );
                }
            }
            RunEvent::Halted(_) | RunEvent::Paused(_) => break,
        }
    }

    let snapshot = controller.wait();
    let cycles = controller.with_machine(|baby| baby.cycles);

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cycles);
    println!("State: {}", if snapshot.stop { "Halted" } else { "Stopped" });
    println!("A  (accumulator): {} ({})", snapshot.accumulator, snapshot.accumulator.to_i32());
    println!("CI (control):     {}", snapshot.control_instruction);

    if !snapshot.stop && cycles >= max_cycles {
        println!();
        println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }

    if json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(format!("Failed to encode JSON: {}", e)),
        }
    }

    if let Some(out_path) = save {
        if let Err(e) = baby::asm::save_snapshot_file(&out_path, &snapshot) {
            fail(format!("Failed to save snapshot: {}", e));
        }
        println!("✓ Saved to {}", out_path);
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use baby::asm::save_snapshot_file;

    let out_path = output.unwrap_or_else(|| {
        std::path::Path::new(source_path)
            .with_extension("snp")
            .display()
            .to_string()
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let config = baby::Config::get();
    let mut machine = baby::Baby::new();
    if let Err(e) = machine.load_program_with(&read_source(source_path), &config.asm_options()) {
        fail(format!("Assembly error: {}", e));
    }

    if let Err(e) = save_snapshot_file(&out_path, &machine.export_snapshot()) {
        fail(format!("Failed to save snapshot: {}", e));
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(snapshot_path: &str, labels: Option<String>) {
    use baby::asm::{assemble_program, load_snapshot_file};

    let snapshot = load_snapshot_file(snapshot_path)
        .unwrap_or_else(|e| fail(format!("Failed to load snapshot: {}", e)));

    let symbols = labels.map(|path| {
        let config = baby::Config::get();
        assemble_program(&read_source(&path), &config.asm_options())
            .unwrap_or_else(|e| fail(format!("Assembly error in {}: {}", path, e)))
            .symbols
    });

    let mut machine = baby::Baby::new();
    machine.restore(&snapshot);
    print!("{}", machine.export_assembly(symbols.as_ref()));
}
