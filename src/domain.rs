/*!
Flattening of every mapped entry into one ordered registration list, and the resulting process image layout once the master assigned runtime offsets.

The master packs all registered entries of a session into one flat image exchanged per cycle, and only reveals each entry's position at activation. The registrar therefore works in two phases with two types: a [DomainPlan] is the ordered list of registration requests, with no offset anywhere; activating it submits the list to the link and binds the offset collection the master hands back, yielding a read-only [DomainLayout]. Offsets live in their own arena, parallel to the requests, addressed by registration index, never as writable locations buried inside the request objects.

After activation the layout never changes again, so any number of consumers (resolver, viewers, the packing validator) may read it concurrently without locking.
*/

use crate::{
    error::{MappingError, MappingResult},
    link::{DeviceId, MasterLink},
    mapping::PdoLayout,
    sdo::Object,
    };
use log::{debug, info};


/// request to register one mapped entry in the process image
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct EntryRequest {
    /// device owning the entry
    pub device: DeviceId,
    /// application object mapped by the entry
    pub object: Object,
}

/// position of one registered entry in the process image, assigned by the master at activation
#[derive(Copy, Clone, Default, Eq, PartialEq, Debug)]
pub struct EntryOffset {
    /// byte offset in the image
    pub byte: usize,
    /// bit offset in that byte, 0 for byte-aligned entries
    pub bit: u8,
}

/**
    ordered registration list of one session, before the master assigned any offset

    The order is the contract: the activation primitive must return one offset per request, in this exact order.
*/
#[derive(Clone, Debug)]
pub struct DomainPlan {
    requests: Vec<EntryRequest>,
    rx_count: usize,
}
impl DomainPlan {
    /**
        flatten every mapped entry of `layout` in registration order

        All output-side entries come first (in PDO order, then entry order within each PDO), then all input-side entries the same way. [Self::rx_count] is the length of the output portion, which locates the first input entry later.
    */
    pub fn build(device: &DeviceId, layout: &PdoLayout) -> MappingResult<Self> {
        let total: usize = layout.outputs.iter()
            .chain(&layout.inputs)
            .map(|pdo| pdo.entries.len())
            .sum();
        let mut requests = Vec::new();
        requests.try_reserve_exact(total)
            .map_err(|_| MappingError::ResourceExhausted("domain registration list"))?;

        for pdo in layout.outputs.iter().chain(&layout.inputs) {
            for entry in &pdo.entries {
                requests.push(EntryRequest {device: *device, object: entry.object()});
            }
        }
        let rx_count = layout.outputs.iter().map(|pdo| pdo.entries.len()).sum();
        debug!("registration list for {}: {} entries, {} output-side", device, total, rx_count);
        Ok(Self {requests, rx_count})
    }

    /// the ordered registration requests, as the activation primitive must consume them
    pub fn requests(&self) -> &[EntryRequest]  {&self.requests}
    /// number of output-side registrations at the head of the list
    pub fn rx_count(&self) -> usize  {self.rx_count}
    pub fn len(&self) -> usize  {self.requests.len()}
    pub fn is_empty(&self) -> bool  {self.requests.is_empty()}

    /**
        submit the registration list and bind the runtime offsets the master assigned

        This consumes the plan: offsets are assigned exactly once per session, and the returned [DomainLayout] is read-only from here on. An offset collection whose length differs from the request list is a [MappingError::Activation].
    */
    pub async fn activate<L: MasterLink>(self, link: &L) -> MappingResult<DomainLayout> {
        let activation = link.register_and_activate(&self.requests).await?;
        if activation.offsets.len() != self.requests.len()
            {return Err(MappingError::Activation("offset collection does not match the registration list"))}
        info!("domain activated: {} entries, image of {} bytes", self.requests.len(), activation.image_size);
        Ok(DomainLayout {
            requests: self.requests,
            offsets: activation.offsets,
            rx_count: self.rx_count,
            image_size: activation.image_size,
        })
    }
}

/**
    the activated layout of the process image

    Holds the registration requests and the parallel offset arena the master returned. The registration invariant carries over: entry count equals the sum of all PDO entry counts, output entries first, then input entries.
*/
#[derive(Clone, Debug)]
pub struct DomainLayout {
    requests: Vec<EntryRequest>,
    offsets: Vec<EntryOffset>,
    rx_count: usize,
    image_size: usize,
}
impl DomainLayout {
    /// rebuild a layout from its parts, for offline inspection of a dumped session
    pub fn from_parts(
        requests: Vec<EntryRequest>,
        offsets: Vec<EntryOffset>,
        rx_count: usize,
        image_size: usize,
        ) -> MappingResult<Self>
    {
        if requests.len() != offsets.len()
            {return Err(MappingError::Activation("offset collection does not match the registration list"))}
        Ok(Self {requests, offsets, rx_count, image_size})
    }

    /// number of registered entries
    pub fn len(&self) -> usize  {self.requests.len()}
    pub fn is_empty(&self) -> bool  {self.requests.is_empty()}
    /// number of output-side registrations, also the registration index of the first input entry
    pub fn rx_count(&self) -> usize  {self.rx_count}
    /// byte size of the whole process image
    pub fn image_size(&self) -> usize  {self.image_size}

    /// runtime offset of the i-th registration
    pub fn offset(&self, index: usize) -> Option<EntryOffset>  {self.offsets.get(index).copied()}
    /// request submitted as the i-th registration
    pub fn request(&self, index: usize) -> Option<&EntryRequest>  {self.requests.get(index)}

    /// enumerate registrations with their assigned offsets, in registration order
    pub fn entries(&self) -> impl Iterator<Item=(&EntryRequest, EntryOffset)> + '_ {
        self.requests.iter().zip(self.offsets.iter().copied())
    }
}

/// one packing rule broken by an activated layout
#[derive(Clone, Debug)]
pub struct Violation {
    /// registration index the rule broke at, or the entry count for whole-image rules
    pub index: usize,
    pub description: String,
}

/**
    check that the master packed the image the way consecutive 8 bit entries demand

    Every entry must sit byte-aligned at the byte matching its registration index (entry 0 at byte 0, each following entry one byte further), and the image must be exactly one byte per registration. All broken rules are reported, not just the first one.

    This check is byte-granular, like the session layouts it inspects, where every mapped entry is 8 bits wide. It is diagnostic only: violations are reported for display, they abort nothing.
*/
pub fn verify_packing(layout: &DomainLayout) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (index, offset) in layout.offsets.iter().enumerate() {
        if offset.bit != 0 {
            violations.push(Violation {
                index,
                description: format!("non-zero bit position {}", offset.bit),
            });
        }
        if offset.byte != index {
            violations.push(Violation {
                index,
                description: format!("expected byte offset {}, master assigned {}", index, offset.byte),
            });
        }
    }
    if layout.image_size != layout.len() {
        violations.push(Violation {
            index: layout.len(),
            description: format!("image of {} bytes does not match {} registrations", layout.image_size, layout.len()),
        });
    }
    violations
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::{mapping::Pdo, sdo::PdoEntry};

    fn device() -> DeviceId {
        DeviceId {alias: 0, position: 0, vendor: 0x6c, product: 0xa72c}
    }

    fn packed_layout(n: usize) -> DomainLayout {
        let requests = (0 .. n)
            .map(|i| EntryRequest {device: device(), object: crate::sdo::Object::new(0x6000, (i+1) as u8)})
            .collect();
        let offsets = (0 .. n).map(|i| EntryOffset {byte: i, bit: 0}).collect();
        DomainLayout::from_parts(requests, offsets, 0, n).unwrap()
    }

    #[test]
    fn registration_order() {
        let layout = PdoLayout {
            outputs: vec![
                Pdo {index: 0x1600, entries: vec![PdoEntry::new(0x7000, 1, 8), PdoEntry::new(0x7000, 2, 8)]},
                Pdo {index: 0x1601, entries: vec![PdoEntry::new(0x7010, 1, 8)]},
                ],
            inputs: vec![
                Pdo {index: 0x1a00, entries: vec![PdoEntry::new(0x6000, 1, 8), PdoEntry::new(0x6000, 2, 8)]},
                ],
            };
        let plan = DomainPlan::build(&device(), &layout).unwrap();
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.rx_count(), 3);
        let objects: Vec<_> = plan.requests().iter().map(|request| (request.object.index, request.object.sub)).collect();
        assert_eq!(objects, [(0x7000, 1), (0x7000, 2), (0x7010, 1), (0x6000, 1), (0x6000, 2)]);
    }

    #[test]
    fn packing_clean() {
        assert!(verify_packing(&packed_layout(8)).is_empty());
    }

    #[test]
    fn packing_single_misassignment() {
        // one wrong byte offset must yield exactly one violation, at that index
        let mut layout = packed_layout(8);
        layout.offsets[5].byte = 99;
        let violations = verify_packing(&layout);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].index, 5);
    }

    #[test]
    fn packing_image_size() {
        let mut layout = packed_layout(4);
        layout.image_size = 6;
        let violations = verify_packing(&layout);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].index, 4);
    }
}
