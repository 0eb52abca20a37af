/*!
Discovery of a slave's dynamic process-data layout from its dictionnary of objects, and arrangement of the discovered PDOs into the sync-manager descriptors a master applies.

The layout a slave exchanges cyclically is not static: the assignment objects name the PDOs each sync manager channel carries, and each PDO's mapping object names the application objects it packs. Both lists are ordered, and that order is load-bearing, it is the order in which bytes are later assigned runtime offsets in the process image. Nothing in this module sorts, deduplicates or truncates what the device declares: a declaration outside the supported envelope is an error, never a silent adjustment.

Example

```ignore
let reader = SdoReader::default();
let layout = mapping::discover(&reader, &link, &device).await?;
link.configure_sync(&device, &mapping::sync_layout(&layout)).await?;
```
*/

use crate::{
    error::{MappingError, MappingResult},
    link::{DeviceId, MasterLink},
    reader::SdoReader,
    sdo,
    };
use futures_concurrency::future::Join;
use log::debug;


/// direction of a sync manager channel, from the master point of view
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SyncDirection {
    /// master to slave
    Write,
    /// slave to master
    Read,
}

/// one process data object: an ordered set of mapped application objects exchanged cyclically without per-object addressing
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Pdo {
    /// index of the mapping object describing this PDO
    pub index: u16,
    /// mapped entries, in the order their bytes are laid out in the channel
    pub entries: Vec<sdo::PdoEntry>,
}

/// everything one slave exchanges cyclically, as discovered from its dictionnary
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct PdoLayout {
    /// PDOs written by the master, in assignment order (SM2)
    pub outputs: Vec<Pdo>,
    /// PDOs read by the master, in assignment order (SM3)
    pub inputs: Vec<Pdo>,
}

/// descriptor of one sync manager slot to apply on a device
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SyncSlot {
    /// slot number in the device's sync manager bank
    pub index: u8,
    pub direction: SyncDirection,
    /// PDOs carried by the slot, empty for the mailbox slots
    pub pdos: Vec<Pdo>,
}

/**
    read one assignment object: which PDOs the channel exchanges, in which order

    Subindex 0 carries the number of assigned PDOs, subindices 1 .. count the PDO indices. The slots are read in ascending subindex order and returned in that exact order. A count of 0 is a [MappingError::NoAssignment], a count above [sdo::ASSIGN_CAPACITY] is a [MappingError::CapacityExceeded].
*/
pub async fn read_assignment<L: MasterLink>(
    reader: &SdoReader,
    link: &L,
    device: &DeviceId,
    assign: sdo::SyncAssign,
    ) -> MappingResult<heapless::Vec<u16, {sdo::ASSIGN_CAPACITY}>>
{
    let count = reader.read_count(link, device, assign.count()).await?;
    if count == 0
        {return Err(MappingError::NoAssignment(assign.count()))}
    if usize::from(count) > sdo::ASSIGN_CAPACITY
        {return Err(MappingError::CapacityExceeded{object: assign.count(), count, max: sdo::ASSIGN_CAPACITY})}

    let mut indices = heapless::Vec::new();
    for i in 0 .. count {
        let index = reader.read_pdo_index(link, device, assign.slot(i)).await?;
        debug!("{:?} slot {}: pdo 0x{:04x}", assign, i+1, index);
        // the count check above guarantees room
        indices.push(index).unwrap();
    }
    Ok(indices)
}

/**
    read one PDO mapping object into an ordered [Pdo]

    Subindex 0 carries the entry count (0 is a [MappingError::EmptyMapping]), subindices 1 .. count the 32 bit mapping words, decomposed as object index in the low 16 bits, object subindex in the next 8, bit length in the top 8.
*/
pub async fn read_pdo<L: MasterLink>(
    reader: &SdoReader,
    link: &L,
    device: &DeviceId,
    mapping: sdo::PdoMapping,
    ) -> MappingResult<Pdo>
{
    let count = reader.read_count(link, device, mapping.count()).await?;
    if count == 0
        {return Err(MappingError::EmptyMapping(mapping.index))}

    let mut entries = Vec::with_capacity(count.into());
    for i in 0 .. count {
        let word = reader.read_mapword(link, device, mapping.slot(i)).await?;
        let entry = sdo::PdoEntry::from(word);
        debug!("pdo 0x{:04x} slot {}: {:?} over {} bits", mapping.index, i+1, entry.object(), entry.bits());
        entries.push(entry);
    }
    Ok(Pdo {index: mapping.index, entries})
}

/**
    discover the complete cyclic layout of one device

    Both assignment banks are read concurrently, then every declared PDO mapping, preserving the declaration order on each side. The result is deterministic: discovering the same dictionnary twice yields the same layout.
*/
pub async fn discover<L: MasterLink>(reader: &SdoReader, link: &L, device: &DeviceId) -> MappingResult<PdoLayout> {
    let (outputs, inputs) = (
        read_assignment(reader, link, device, sdo::RX_ASSIGN),
        read_assignment(reader, link, device, sdo::TX_ASSIGN),
        ).join().await;
    let (outputs, inputs) = (outputs?, inputs?);

    let mut layout = PdoLayout::default();
    for index in outputs {
        layout.outputs.push(read_pdo(reader, link, device, sdo::PdoMapping{index}).await?);
    }
    for index in inputs {
        layout.inputs.push(read_pdo(reader, link, device, sdo::PdoMapping{index}).await?);
    }
    debug!("discovered layout on {}: {} output PDOs, {} input PDOs",
        device, layout.outputs.len(), layout.inputs.len());
    Ok(layout)
}

/**
    arrange a discovered layout into the four-slot configuration a device expects

    Slots 0 and 1 are the mailbox channels and carry no PDO. Slot 2 carries the output PDOs and slot 3 the input PDOs, both in discovery order, the same order the registrar flattens later.
*/
pub fn sync_layout(layout: &PdoLayout) -> [SyncSlot; 4] {
    [
        SyncSlot {index: 0, direction: SyncDirection::Write, pdos: Vec::new()},
        SyncSlot {index: 1, direction: SyncDirection::Read, pdos: Vec::new()},
        SyncSlot {index: 2, direction: SyncDirection::Write, pdos: layout.outputs.clone()},
        SyncSlot {index: 3, direction: SyncDirection::Read, pdos: layout.inputs.clone()},
    ]
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sync_layout_slots() {
        let layout = PdoLayout {
            outputs: vec![Pdo {index: 0x1600, entries: vec![sdo::PdoEntry::new(0x7000, 1, 8)]}],
            inputs: vec![
                Pdo {index: 0x1a01, entries: vec![sdo::PdoEntry::new(0x6010, 1, 8)]},
                Pdo {index: 0x1a00, entries: vec![sdo::PdoEntry::new(0x6000, 1, 8)]},
                ],
            };
        let slots = sync_layout(&layout);
        assert!(slots[0].pdos.is_empty() && slots[1].pdos.is_empty());
        assert_eq!(slots[0].direction, SyncDirection::Write);
        assert_eq!(slots[1].direction, SyncDirection::Read);
        assert_eq!(slots[2].pdos, layout.outputs);
        // discovery order is preserved, 0x1a01 stays ahead of 0x1a00
        assert_eq!(slots[3].pdos, layout.inputs);
        assert_eq!([slots[2].index, slots[3].index], [2, 3]);
    }
}
