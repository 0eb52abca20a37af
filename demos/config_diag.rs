/*!
    Configuration diagnostic: expands the static session schema, registers and
    activates each declared slave against the built-in software slave, dumps the
    assigned offsets and validates the packing invariants.

    usage: `config_diag <session-config.json>`
*/

use core::time::Duration;
use std::{env, path::Path, process::ExitCode};
use pdomap::{
    config::SessionConfig,
    domain::{self, DomainPlan},
    monitor::{StateMonitor, Stop},
    sim::SimSlave,
    MappingResult,
    };

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: config_diag <session-config.json>");
        return ExitCode::FAILURE
    };
    match run(Path::new(&path)).await {
        Ok(true) => {
            println!("VALIDATION PASSED: mapping and domain size OK");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("VALIDATION FAILED");
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("setup failed: {}", error);
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &Path) -> MappingResult<bool> {
    let config = SessionConfig::load(path)?;
    let mut clean = true;

    for slave in &config.slaves {
        let device = slave.device(&config.defaults);
        let layout = slave.layout();
        println!("{}", device);
        println!("  SM2 (output) {} entries @ 0x{:04x}", slave.sm2.size_bytes, slave.sm2.entry_index);
        println!("  SM3 (input)  {} entries @ 0x{:04x}", slave.sm3.size_bytes, slave.sm3.entry_index);

        let sim = SimSlave::new();
        let domain = DomainPlan::build(&device, &layout)?.activate(&sim).await?;

        println!("===== domain mapping =====");
        for (rank, (request, offset)) in domain.entries().enumerate() {
            println!("  {:4}: {:?}  offset={:<4} bit={}", rank, request.object, offset.byte, offset.bit);
        }
        println!("total entries: {}, image size: {} bytes", domain.len(), domain.image_size());

        let violations = domain::verify_packing(&domain);
        for violation in &violations {
            eprintln!("[PACKING] entry {}: {}", violation.index, violation.description);
        }
        clean &= violations.is_empty();

        // hold the exchange a moment before releasing the master
        let monitor = StateMonitor::new(Duration::from_millis(10), Stop::new());
        monitor.run(&sim, |cycle| cycle < 20).await?;
    }
    Ok(clean)
}
