/*!
Seam to the external master/bus driver.

The mapping core never moves a byte on the wire itself: everything it needs from the running master is behind the [MasterLink] trait, whose methods mirror the setup primitives any EtherCAT master exposes (synchronous object upload, sync-manager configuration, entry registration and activation, one cyclic exchange, application-state query).

Implementors take `&self` and handle their own interior synchronization, so independent setup operations may be awaited concurrently over the same link.
*/

use crate::{
    domain::{EntryOffset, EntryRequest},
    error::MappingResult,
    mapping::SyncSlot,
    sdo::Object,
    };
use core::fmt;


/**
    identity of one device on the bus, as declared by the session configuration

    There is no ambient "device 0": every operation of the core takes the identity it acts on explicitly, so one session can drive any number of devices through the same link.
*/
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct DeviceId {
    /// configured station alias, 0 when unused
    pub alias: u16,
    /// topological position on the bus
    pub position: u16,
    /// expected vendor identifier
    pub vendor: u32,
    /// expected product code
    pub product: u32,
}
impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "device alias={} pos={} (vendor=0x{:08x} product=0x{:08x})",
            self.alias, self.position, self.vendor, self.product)
    }
}

/**
    application-layer state of a device

    This state gates which services the device firmware answers: the mailbox (hence object reads) needs at least [Self::PreOperational], cyclic inputs are live from [Self::SafeOperational], cyclic outputs from [Self::Operational].
*/
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DeviceState {
    /// only registers can be used, no mailbox, no process data
    Init,
    /// mailbox communication is up, process data is not exchanged yet
    PreOperational,
    /// inputs are exchanged, outputs are ignored by the device
    SafeOperational,
    /// full cyclic exchange
    Operational,
    /// transitional firmware-update state
    Bootstrap,
    /// the device reported a code outside the standard set
    Unknown,
}
impl DeviceState {
    /// decode the standard AL status code
    pub fn from_al(code: u8) -> Self {
        match code & 0x0f {
            1 => Self::Init,
            2 => Self::PreOperational,
            3 => Self::Bootstrap,
            4 => Self::SafeOperational,
            8 => Self::Operational,
            _ => Self::Unknown,
        }
    }
}
impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "INIT",
            Self::PreOperational => "PREOP",
            Self::SafeOperational => "SAFEOP",
            Self::Operational => "OP",
            Self::Bootstrap => "BOOT",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// progress of an in-flight object upload
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum UploadPoll {
    /// the device did not answer yet, poll again later
    Pending,
    /// the reply is complete, this many bytes were written to the caller's buffer
    Ready(usize),
}

/// what the activation primitive hands back: one offset per submitted registration, same order, plus the total image size
#[derive(Clone, Debug)]
pub struct Activation {
    /// runtime offsets, parallel to the submitted registration list
    pub offsets: Vec<EntryOffset>,
    /// byte size of the whole process image
    pub image_size: usize,
}

/**
    the set of master primitives the mapping core consumes

    All methods are setup-phase operations except [Self::cycle] and [Self::device_state], which are also pumped from steady-state loops. Object uploads follow an issue-then-poll shape: [Self::sdo_upload_start] files the request, [Self::sdo_upload_poll] reports its progress without blocking. Several uploads may be in flight at once as long as they address different objects.
*/
#[allow(async_fn_in_trait)]
pub trait MasterLink {
    /// issue one upload request for the given dictionnary coordinate
    async fn sdo_upload_start(&self, device: &DeviceId, object: Object) -> MappingResult;

    /// check an upload issued with [Self::sdo_upload_start], copying the reply into `data` once complete
    async fn sdo_upload_poll(&self, device: &DeviceId, object: Object, data: &mut [u8]) -> MappingResult<UploadPoll>;

    /// apply a sync-manager/PDO configuration on the device
    async fn configure_sync(&self, device: &DeviceId, slots: &[SyncSlot; 4]) -> MappingResult;

    /**
        register the given ordered entry list against the process image and activate the master

        The returned offset collection must be parallel to `requests`: same length, same order, one runtime offset per entry. This is invoked exactly once per session.
    */
    async fn register_and_activate(&self, requests: &[EntryRequest]) -> MappingResult<Activation>;

    /// run one exchange cycle (receive, process, queue, send)
    async fn cycle(&self) -> MappingResult;

    /// sample the current application-layer state of the device
    async fn device_state(&self, device: &DeviceId) -> MappingResult<DeviceState>;
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn al_state_codes() {
        assert_eq!(DeviceState::from_al(1), DeviceState::Init);
        assert_eq!(DeviceState::from_al(2), DeviceState::PreOperational);
        assert_eq!(DeviceState::from_al(4), DeviceState::SafeOperational);
        assert_eq!(DeviceState::from_al(8), DeviceState::Operational);
        assert_eq!(DeviceState::from_al(0), DeviceState::Unknown);
    }
}
