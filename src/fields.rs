/*!
Resolution of externally declared named fields to runtime byte offsets in the process image.

Applications name the values they care about in a config file, as byte offsets inside one sub-image (usually the input image). The master, however, scatters entries anywhere it likes in the flat image, so a declared field must be translated into the actual image bytes backing it. Resolution happens once, after activation; the resolved set is then reused every cycle to decode live values.

A field declared outside its sub-image is marked invalid and reported as such, it never aborts the resolution of its siblings nor the session.
*/

use crate::domain::DomainLayout;
use log::warn;
use serde::Deserialize;


/// byte width of a logical field value
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldWidth {
    U8,
    U16,
    U32,
}
impl FieldWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// a named application-level field, declared externally, at a byte offset inside one sub-image
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct LogicalField {
    pub name: String,
    /// byte offset relative to the start of the targeted sub-image
    pub offset: usize,
    pub width: FieldWidth,
}

/**
    a logical field bound to the runtime positions of its bytes in the process image

    `offsets` holds one image byte offset per field byte, in value order (least significant first). An invalid field has no offsets and [Self::decode] returns 0 for it.
*/
#[derive(Clone, Debug)]
pub struct ResolvedField {
    pub field: LogicalField,
    /// image byte offsets backing the field, empty when it did not resolve
    pub offsets: Vec<usize>,
    /// false when the declaration exceeds its sub-image; the field is skipped, never fatal
    pub valid: bool,
}
impl ResolvedField {
    /// little-endian composition of the field's bytes out of a process image snapshot
    pub fn decode(&self, image: &[u8]) -> u32 {
        let mut value = 0;
        for (rank, &offset) in self.offsets.iter().enumerate() {
            value |= u32::from(image[offset]) << (8 * rank);
        }
        value
    }
}

/**
    bind each declared field to the runtime offsets of the registrations backing it

    `base` is the registration index where the targeted sub-image starts ([DomainLayout::rx_count] when targeting the input image). A field spanning `offset .. offset + width` resolves only if it fits entirely inside the sub-image; byte `k` of a resolved field lives at the byte offset of registration `base + offset + k`.

    Fields resolve independently: an out-of-range declaration is logged, marked invalid and the remaining fields are resolved normally. Resolution is byte-granular, each registration is assumed to back exactly one image byte.
*/
pub fn resolve(fields: &[LogicalField], layout: &DomainLayout, base: usize) -> Vec<ResolvedField> {
    let size = layout.len().saturating_sub(base);
    fields.iter()
        .map(|field| {
            let width = field.width.bytes();
            if field.offset + width > size {
                warn!("field {:?} spans {}..{} outside its {} byte sub-image",
                    field.name, field.offset, field.offset + width, size);
                return ResolvedField {field: field.clone(), offsets: Vec::new(), valid: false}
            }
            let offsets = (0 .. width)
                // in range by the check above
                .map(|rank| layout.offset(base + field.offset + rank).unwrap().byte)
                .collect();
            ResolvedField {field: field.clone(), offsets, valid: true}
        })
        .collect()
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::{DomainLayout, EntryOffset, EntryRequest};
    use crate::link::DeviceId;
    use crate::sdo::Object;

    fn layout(total: usize, rx: usize) -> DomainLayout {
        let device = DeviceId {alias: 0, position: 0, vendor: 0, product: 0};
        let requests = (0 .. total)
            .map(|i| EntryRequest {device, object: Object::new(if i < rx {0x7000} else {0x6000}, (i+1) as u8)})
            .collect();
        let offsets = (0 .. total).map(|i| EntryOffset {byte: i, bit: 0}).collect();
        DomainLayout::from_parts(requests, offsets, rx, total).unwrap()
    }

    fn field(name: &str, offset: usize, width: FieldWidth) -> LogicalField {
        LogicalField {name: name.into(), offset, width}
    }

    #[test]
    fn input_image_binding() {
        let layout = layout(10, 4);
        let resolved = resolve(&[field("speed", 2, FieldWidth::U16)], &layout, layout.rx_count());
        assert!(resolved[0].valid);
        assert_eq!(resolved[0].offsets, [6, 7]);
    }

    #[test]
    fn tail_field_overflow() {
        // a 2 byte field on the last byte of the sub-image must not resolve
        let layout = layout(8, 0);
        let resolved = resolve(&[field("tail", 7, FieldWidth::U16)], &layout, 0);
        assert!(! resolved[0].valid);
        assert!(resolved[0].offsets.is_empty());
    }

    #[test]
    fn invalid_field_degrades_alone() {
        let layout = layout(8, 0);
        let resolved = resolve(
            &[
                field("good", 0, FieldWidth::U32),
                field("bad", 20, FieldWidth::U8),
                field("also_good", 4, FieldWidth::U16),
                ],
            &layout, 0);
        assert!(resolved[0].valid && resolved[2].valid);
        assert!(! resolved[1].valid);
        assert_eq!(resolved[2].offsets, [4, 5]);
    }

    #[test]
    fn little_endian_decode() {
        let resolved = ResolvedField {
            field: field("x", 0, FieldWidth::U32),
            offsets: vec![3, 2, 1, 0],
            valid: true,
        };
        assert_eq!(resolved.decode(&[0x12, 0x34, 0x56, 0x78]), 0x12345678);

        let invalid = ResolvedField {field: field("y", 0, FieldWidth::U8), offsets: vec![], valid: false};
        assert_eq!(invalid.decode(&[0xff]), 0);
    }
}
