/*!
Cyclic exchange pumping and device state observation.

Devices only advance their application state machine while the cyclic exchange is running, so waiting for a state means pumping cycles the whole time, even though no process data is of interest yet. The loops here are bounded and cancellable: every wait carries a timeout budget, and a shared [Stop] flag lets a caller wind a task down from outside instead of killing the process under a hung device.
*/

use crate::{
    error::MappingResult,
    link::{DeviceId, DeviceState, MasterLink},
    };
use core::time::Duration;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    };
use log::{debug, info};


/// shared flag winding cyclic tasks down; handles clone freely and all observe the same trigger
#[derive(Clone, Debug, Default)]
pub struct Stop {
    flag: Arc<AtomicBool>,
}
impl Stop {
    pub fn new() -> Self  {Self::default()}
    /// ask every task holding this flag to stop at its next cycle
    pub fn trigger(&self)  {self.flag.store(true, Ordering::Relaxed)}
    pub fn triggered(&self) -> bool  {self.flag.load(Ordering::Relaxed)}
}

/// outcome of a state wait
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum WaitState {
    /// the device reported the target state
    Ready(DeviceState),
    /// the budget elapsed first, with the last sampled state
    TimedOut(DeviceState),
    /// the stop flag was triggered, with the last sampled state
    Cancelled(DeviceState),
}

/**
    cyclic pump observing the application state of devices

    Each iteration runs one exchange cycle, samples the state, then sleeps one quantum. The quantum is both the sampling pace and the minimum cycle period, callers tune it to their bus. The monitor only observes: transition legality is the device firmware's business, no sequencing is enforced from here.
*/
#[derive(Clone, Debug)]
pub struct StateMonitor {
    /// pause between two cycles, also the state sampling pace
    pub quantum: Duration,
    /// cancellation flag shared with the caller
    pub stop: Stop,
}
impl Default for StateMonitor {
    fn default() -> Self {
        Self {quantum: Duration::from_millis(10), stop: Stop::new()}
    }
}
impl StateMonitor {
    pub fn new(quantum: Duration, stop: Stop) -> Self {
        Self {quantum, stop}
    }

    /**
        pump cycles until the device reports `target`, the budget elapses, or the stop flag triggers

        The last sampled state travels in every outcome so a failed wait can still be reported precisely. Link failures abort the wait as errors, they are not folded into [WaitState::TimedOut].
    */
    pub async fn wait_for_state<L: MasterLink>(
        &self,
        link: &L,
        device: &DeviceId,
        target: DeviceState,
        timeout: Duration,
        ) -> MappingResult<WaitState>
    {
        debug!("waiting up to {:?} for {} on {}", timeout, target, device);
        let mut remaining = timeout;
        let mut last = DeviceState::Unknown;
        loop {
            if self.stop.triggered()
                {return Ok(WaitState::Cancelled(last))}
            link.cycle().await?;
            last = link.device_state(device).await?;
            if last == target {
                info!("{} reached {}", device, target);
                return Ok(WaitState::Ready(last))
            }
            if remaining < self.quantum
                {return Ok(WaitState::TimedOut(last))}
            remaining -= self.quantum;
            tokio::time::sleep(self.quantum).await;
        }
    }

    /**
        pump cycles until `each` declines to continue or the stop flag triggers

        `each` receives the number of cycles run so far and returns whether to keep going. This is the steady-state shape of viewers and hold loops; returns the number of cycles run.
    */
    pub async fn run<L, F>(&self, link: &L, mut each: F) -> MappingResult<u64>
    where
        L: MasterLink,
        F: FnMut(u64) -> bool,
    {
        let mut cycles = 0;
        while ! self.stop.triggered() {
            link.cycle().await?;
            cycles += 1;
            if ! each(cycles)  {break}
            tokio::time::sleep(self.quantum).await;
        }
        Ok(cycles)
    }
}
