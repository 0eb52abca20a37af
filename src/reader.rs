/*!
Bounded read of one dictionnary object through the master's mailbox services.

An upload is issued once and then polled for completion a bounded number of times at a fixed short interval, so a dead mailbox costs a few hundred milliseconds instead of hanging the setup forever. Reads block the calling task for up to that budget: they belong to the setup phase only and must never be issued from inside the steady-state exchange cycle.

Devices answer the "count" subitems of composite objects with whatever scalar width their stack favors, so the accepted reply widths are declared by the caller rather than assumed.
*/

use crate::{
    error::{MappingError, MappingResult},
    link::{DeviceId, MasterLink, UploadPoll},
    sdo::Object,
    };
use core::time::Duration;
use log::trace;


/// longest tolerated reply
const REPLY_MAX: usize = 8;

/**
    reader of single dictionnary values, polling the link until each upload completes

    The default budget is 200 polls at 1 ms, enough for the mailbox turnaround of every device encountered so far. Tests shrink it, slow gateways may need to grow it.
*/
#[derive(Copy, Clone, Debug)]
pub struct SdoReader {
    /// number of completion polls before the read is abandoned
    pub attempts: usize,
    /// pause between two completion polls
    pub interval: Duration,
}
impl Default for SdoReader {
    fn default() -> Self {
        Self {attempts: 200, interval: Duration::from_millis(1)}
    }
}
impl SdoReader {
    pub fn new(attempts: usize, interval: Duration) -> Self {
        Self {attempts, interval}
    }

    /**
        read one object, accepting only the given reply widths

        Returns the raw little-endian reply bytes. A reply whose width is not in `accepted` is a [MappingError::SizeMismatch] even if the device considered the read successful, and an upload still pending after the polling budget is a [MappingError::Timeout].
    */
    pub async fn read<L: MasterLink>(
        &self,
        link: &L,
        device: &DeviceId,
        object: Object,
        accepted: &[usize],
        ) -> MappingResult<Vec<u8>>
    {
        let mut buffer = [0; REPLY_MAX];
        link.sdo_upload_start(device, object).await?;
        for attempt in 0 .. self.attempts {
            match link.sdo_upload_poll(device, object, &mut buffer).await? {
                UploadPoll::Ready(size) => {
                    trace!("upload {:?} replied {} bytes after {} polls", object, size, attempt+1);
                    if ! accepted.contains(&size)
                        {return Err(MappingError::SizeMismatch{object, size})}
                    return Ok(buffer[.. size].to_vec())
                }
                UploadPoll::Pending => tokio::time::sleep(self.interval).await,
            }
        }
        Err(MappingError::Timeout(object))
    }

    /// read a count subitem: 1/2/4 byte replies are tolerated, the value is the low byte
    pub async fn read_count<L: MasterLink>(&self, link: &L, device: &DeviceId, object: Object) -> MappingResult<u8> {
        Ok(self.read(link, device, object, &[1, 2, 4]).await?[0])
    }

    /// read an assigned PDO index: 2/4/8 byte replies are tolerated, the low 16 bits are significant
    pub async fn read_pdo_index<L: MasterLink>(&self, link: &L, device: &DeviceId, object: Object) -> MappingResult<u16> {
        let data = self.read(link, device, object, &[2, 4, 8]).await?;
        Ok(u16::from_le_bytes([data[0], data[1]]))
    }

    /// read a mapping word: the reply must be exactly 4 bytes
    pub async fn read_mapword<L: MasterLink>(&self, link: &L, device: &DeviceId, object: Object) -> MappingResult<u32> {
        let data = self.read(link, device, object, &[4]).await?;
        Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
    }
}
