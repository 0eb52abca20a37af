/*!
Coordinates in the slave's dictionnary of objects, and the standard objects describing its process-data layout.

A slave carrying a CoE dictionnary describes its own cyclic exchanges in it:

- the *assignment* objects (`0x1c10 + channel`) list which PDOs a sync manager channel exchanges
- the *mapping* objects (typically `0x1600 ..` for outputs and `0x1a00 ..` for inputs) list which application objects each PDO carries, packed as 32 bit words

Both families are composite objects: subindex 0 carries the number of used slots, subindices 1 .. count carry the slots themselves. The slot order is the byte order of the cyclic exchange and must be preserved everywhere downstream.
*/

use core::fmt;
use bilge::prelude::*;


/// coordinate of one value in a slave's dictionnary of objects
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Object {
    /// index of the item in the slave's dictionnary of objects
    pub index: u16,
    /// subindex in the item
    pub sub: u8,
}
impl Object {
    pub const fn new(index: u16, sub: u8) -> Self  {Self{index, sub}}
    /// the count subitem of a composite object
    pub const fn count(index: u16) -> Self  {Self{index, sub: 0}}
    /// the i-th slot of a composite object, slots start at subindex 1
    pub const fn slot(index: u16, i: u8) -> Self  {Self{index, sub: i+1}}
}
impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Object {{0x{:04x}:{:02x}}}", self.index, self.sub)
    }
}

/**
    one entry of a PDO mapping object

    This is the 32 bit word format the dictionnary packs a mapped application object into: the object coordinate in the low 24 bits, and the room it takes in the channel in the top 8.
*/
#[bitsize(32)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq)]
pub struct PdoEntry {
    /// index of the mapped object
    pub index: u16,
    /// subindex of the mapped object
    pub sub: u8,
    /// bit length of the mapped value in the channel
    pub bits: u8,
}
impl PdoEntry {
    /// dictionnary coordinate of the mapped object
    pub fn object(&self) -> Object  {Object::new(self.index(), self.sub())}
}

/// description of an SDO assigning PDOs to a sync manager channel
#[derive(Copy, Clone)]
pub struct SyncAssign {
    /// index of the SDO that configures the channel
    pub index: u16,
}
impl SyncAssign {
    /// number of assigned PDOs
    pub const fn count(&self) -> Object  {Object::count(self.index)}
    /// the i-th assigned PDO index
    pub const fn slot(&self, i: u8) -> Object  {Object::slot(self.index, i)}
}
impl fmt::Debug for SyncAssign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SyncAssign {{0x{:04x}}}", self.index)
    }
}

/// description of an SDO mapping application objects into one PDO
#[derive(Copy, Clone)]
pub struct PdoMapping {
    /// index of the SDO that describes the PDO
    pub index: u16,
}
impl PdoMapping {
    /// number of mapped entries
    pub const fn count(&self) -> Object  {Object::count(self.index)}
    /// the i-th mapped entry, as a [PdoEntry] word
    pub const fn slot(&self, i: u8) -> Object  {Object::slot(self.index, i)}
}
impl fmt::Debug for PdoMapping {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PdoMapping {{0x{:04x}}}", self.index)
    }
}

/// standard assignment object of the process-output channel (SM2, master to slave)
pub const RX_ASSIGN: SyncAssign = SyncAssign {index: 0x1c12};
/// standard assignment object of the process-input channel (SM3, slave to master)
pub const TX_ASSIGN: SyncAssign = SyncAssign {index: 0x1c13};

/// highest number of PDOs one assignment object may declare
pub const ASSIGN_CAPACITY: usize = 16;
