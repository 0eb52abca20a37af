/*!
    Cyclic viewer of named input fields, running the full dynamic pipeline against the
    built-in software slave: wait for the mailbox, discover the PDO layout from the
    dictionnary, apply the sync configuration, activate the domain, resolve the
    configured fields and decode them every cycle.

    usage: `live_viewer <fields-config.json>`
*/

use core::time::Duration;
use std::{env, path::Path, process::ExitCode};
use pdomap::{
    config::FieldsConfig,
    domain::DomainPlan,
    fields,
    link::{DeviceId, DeviceState, MasterLink},
    mapping,
    monitor::{StateMonitor, Stop},
    reader::SdoReader,
    sdo::{self, PdoEntry},
    sim::SimSlave,
    MappingError, MappingResult, WaitState,
    };

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: live_viewer <fields-config.json>");
        return ExitCode::FAILURE
    };
    match run(Path::new(&path)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("setup failed: {}", error);
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &Path) -> MappingResult {
    let fields_config = FieldsConfig::load(path)?;
    let device = DeviceId {alias: 0, position: 0, vendor: 0x6c, product: 0xa72c};
    let sim = demo_slave().await;
    let monitor = StateMonitor::new(Duration::from_millis(1), Stop::new());

    println!("waiting for PREOP...");
    match monitor.wait_for_state(&sim, &device, DeviceState::PreOperational, Duration::from_secs(2)).await? {
        WaitState::Ready(_) => println!("PREOP reached"),
        WaitState::TimedOut(last) => {
            eprintln!("device stuck in {}", last);
            return Err(MappingError::Link("device never reached PREOP"))
        }
        WaitState::Cancelled(_) => return Err(MappingError::Link("wait cancelled")),
    }

    let reader = SdoReader::default();
    let layout = mapping::discover(&reader, &sim, &device).await?;
    println!("PDO map read OK: {} output PDOs, {} input PDOs", layout.outputs.len(), layout.inputs.len());

    sim.configure_sync(&device, &mapping::sync_layout(&layout)).await?;
    let domain = DomainPlan::build(&device, &layout)?.activate(&sim).await?;
    let resolved = fields::resolve(&fields_config.input_fields(), &domain, domain.rx_count());

    match monitor.wait_for_state(&sim, &device, DeviceState::Operational, Duration::from_secs(2)).await? {
        WaitState::Ready(_) => println!("OP reached"),
        WaitState::TimedOut(last) => {
            eprintln!("device stuck in {}", last);
            return Err(MappingError::Link("device never reached OP"))
        }
        WaitState::Cancelled(_) => return Err(MappingError::Link("wait cancelled")),
    }

    // bounded display loop in place of the viewer's endless spin
    let period = Duration::from_millis(100);
    for cycle in 0 .. 10u32 {
        if monitor.stop.triggered()  {break}
        sim.cycle().await?;
        feed_inputs(&sim, &domain, cycle).await;
        let image = sim.image().await;

        println!("=== live input fields (cycle {}) ===", cycle);
        for field in &resolved {
            if field.valid {
                println!("{:<28} : {}", field.field.name, field.decode(&image));
            } else {
                println!("{:<28} : <out of range>", field.field.name);
            }
        }
        tokio::time::sleep(period).await;
    }
    Ok(())
}

/// a software slave with a servo-drive-like layout: 62 output bytes, 234 input bytes
async fn demo_slave() -> SimSlave {
    let sim = SimSlave::new();
    sim.install_assignment(sdo::RX_ASSIGN, &[0x1600]).await;
    sim.install_mapping(0x1600, &byte_entries(0x7000, 62)).await;
    sim.install_assignment(sdo::TX_ASSIGN, &[0x1a00]).await;
    sim.install_mapping(0x1a00, &byte_entries(0x6000, 234)).await;
    sim.schedule_state(DeviceState::PreOperational, 2).await;
    sim.schedule_state(DeviceState::Operational, 20).await;
    sim
}

fn byte_entries(index: u16, count: usize) -> Vec<PdoEntry> {
    (0 .. count).map(|i| PdoEntry::new(index, (i + 1) as u8, 8)).collect()
}

/// stand-in for live device values: a ramp over the input image
async fn feed_inputs(sim: &SimSlave, domain: &pdomap::DomainLayout, cycle: u32) {
    let base = domain.rx_count();
    let values: Vec<u8> = (0 .. domain.len() - base)
        .map(|i| (cycle as usize + i) as u8)
        .collect();
    sim.feed_image(base, &values).await;
}
