/*!
Software slave implementing [MasterLink] over an in-memory dictionnary of objects, so the whole mapping pipeline runs without any bus attached.

The simulated device answers uploads after a configurable number of completion polls, walks its application state machine as cycles are pumped, and packs registrations one byte each from offset 0, which is also what a real master does for all-8-bit layouts. Tests and demos drive it; nothing in the crate's setup path depends on it.
*/

use crate::{
    domain::{EntryOffset, EntryRequest},
    error::{MappingError, MappingResult},
    link::{Activation, DeviceId, DeviceState, MasterLink, UploadPoll},
    mapping::SyncSlot,
    sdo::{Object, PdoEntry, SyncAssign},
    };
use std::collections::HashMap;
use tokio::sync::Mutex;


struct SimState {
    /// raw value per dictionnary coordinate
    dictionary: HashMap<(u16, u8), Vec<u8>>,
    /// remaining completion polls per in-flight upload
    pending: HashMap<(u16, u8), usize>,
    /// completion polls a fresh upload needs
    latency: usize,
    al_state: DeviceState,
    /// states the firmware walks to once enough cycles were pumped
    schedule: Vec<(u64, DeviceState)>,
    cycles: u64,
    applied_sync: Option<[SyncSlot; 4]>,
    /// cyclic input image, one byte per registered input entry
    image: Vec<u8>,
}

/// a simulated slave device; clone-free, share it by reference
pub struct SimSlave {
    state: Mutex<SimState>,
}
impl SimSlave {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                dictionary: HashMap::new(),
                pending: HashMap::new(),
                latency: 0,
                al_state: DeviceState::Init,
                schedule: Vec::new(),
                cycles: 0,
                applied_sync: None,
                image: Vec::new(),
            }),
        }
    }

    /// completion polls every upload will take from now on
    pub async fn set_latency(&self, polls: usize) {
        self.state.lock().await.latency = polls;
    }

    /// store a raw value at one dictionnary coordinate
    pub async fn insert(&self, object: Object, data: &[u8]) {
        self.state.lock().await.dictionary.insert((object.index, object.sub), data.to_vec());
    }

    /// populate an assignment object: count at subindex 0, PDO indices in the following slots
    pub async fn install_assignment(&self, assign: SyncAssign, pdos: &[u16]) {
        let mut state = self.state.lock().await;
        state.dictionary.insert((assign.index, 0), vec![pdos.len() as u8]);
        for (rank, index) in pdos.iter().enumerate() {
            state.dictionary.insert((assign.index, (rank + 1) as u8), index.to_le_bytes().to_vec());
        }
    }

    /// populate an assignment count alone, with the given reply width, the low byte carrying the value
    pub async fn install_assignment_count(&self, assign: SyncAssign, count: u8, width: usize) {
        let mut reply = vec![0; width];
        reply[0] = count;
        self.insert(assign.count(), &reply).await;
    }

    /// populate a mapping object: entry count at subindex 0, 32 bit words in the following slots
    pub async fn install_mapping(&self, index: u16, entries: &[PdoEntry]) {
        let mut state = self.state.lock().await;
        state.dictionary.insert((index, 0), vec![entries.len() as u8]);
        for (rank, entry) in entries.iter().enumerate() {
            state.dictionary.insert((index, (rank + 1) as u8), u32::from(*entry).to_le_bytes().to_vec());
        }
    }

    /// make the firmware reach `state` once `after` cycles were pumped
    pub async fn schedule_state(&self, state: DeviceState, after: u64) {
        self.state.lock().await.schedule.push((after, state));
    }

    /// sync configuration the master applied, if any
    pub async fn applied_sync(&self) -> Option<[SyncSlot; 4]> {
        self.state.lock().await.applied_sync.clone()
    }

    /// number of cycles pumped so far
    pub async fn cycles(&self) -> u64 {
        self.state.lock().await.cycles
    }

    /// snapshot of the process image
    pub async fn image(&self) -> Vec<u8> {
        self.state.lock().await.image.clone()
    }

    /// overwrite part of the process image, as live device values would
    pub async fn feed_image(&self, offset: usize, data: &[u8]) {
        let mut state = self.state.lock().await;
        state.image[offset .. offset + data.len()].copy_from_slice(data);
    }
}

impl Default for SimSlave {
    fn default() -> Self  {Self::new()}
}

impl MasterLink for SimSlave {
    async fn sdo_upload_start(&self, _device: &DeviceId, object: Object) -> MappingResult {
        let mut state = self.state.lock().await;
        let latency = state.latency;
        state.pending.insert((object.index, object.sub), latency);
        Ok(())
    }

    async fn sdo_upload_poll(&self, _device: &DeviceId, object: Object, data: &mut [u8]) -> MappingResult<UploadPoll> {
        let mut state = self.state.lock().await;
        let key = (object.index, object.sub);
        let busy = match state.pending.get_mut(&key) {
            None => return Err(MappingError::Link("no upload in flight for this object")),
            Some(remaining) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            }
        };
        if busy
            {return Ok(UploadPoll::Pending)}
        state.pending.remove(&key);
        let reply = state.dictionary.get(&key)
            .ok_or(MappingError::Link("object missing from the dictionnary"))?
            .clone();
        data[.. reply.len()].copy_from_slice(&reply);
        Ok(UploadPoll::Ready(reply.len()))
    }

    async fn configure_sync(&self, _device: &DeviceId, slots: &[SyncSlot; 4]) -> MappingResult {
        self.state.lock().await.applied_sync = Some(slots.clone());
        Ok(())
    }

    async fn register_and_activate(&self, requests: &[EntryRequest]) -> MappingResult<Activation> {
        if requests.is_empty()
            {return Err(MappingError::Registration("empty registration list"))}
        let mut state = self.state.lock().await;
        state.image = vec![0; requests.len()];
        Ok(Activation {
            offsets: (0 .. requests.len()).map(|byte| EntryOffset {byte, bit: 0}).collect(),
            image_size: requests.len(),
        })
    }

    async fn cycle(&self) -> MappingResult {
        let mut state = self.state.lock().await;
        state.cycles += 1;
        let cycles = state.cycles;
        if let Some(position) = state.schedule.iter().position(|(after, _)| *after <= cycles) {
            state.al_state = state.schedule.remove(position).1;
        }
        Ok(())
    }

    async fn device_state(&self, _device: &DeviceId) -> MappingResult<DeviceState> {
        Ok(self.state.lock().await.al_state)
    }
}
