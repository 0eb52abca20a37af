/*!
JSON session configuration.

Three schemas travel with the tools built on this crate:

- the *session* schema declares which devices exist on the bus (identity, optional per-direction size limit) and, for devices whose layout is not discovered dynamically, one static output and one static input PDO each
- the *fields* schema names the application values a viewer decodes from the input image

The files in the field carry numeric identifiers either as JSON integers or as `"0x..."` strings, both are accepted everywhere an identifier is expected. Any malformed or missing declared field is a [MappingError::Config] at load time, before any device is touched.
*/

use crate::{
    error::{MappingError, MappingResult},
    fields::{FieldWidth, LogicalField},
    link::DeviceId,
    mapping::{Pdo, PdoLayout},
    sdo::PdoEntry,
    };
use log::debug;
use serde::{Deserialize, Deserializer, de};
use std::path::Path;


/// numeric config value, tolerating the `"0x..."` string spelling used by the field files
#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(u64),
    Text(String),
}
impl Numeric {
    fn value(self) -> Result<u64, String> {
        match self {
            Self::Number(value) => Ok(value),
            Self::Text(text) => {
                let text = text.trim();
                let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Some(hexadecimal) => (hexadecimal, 16),
                    None => (text, 10),
                };
                u64::from_str_radix(digits, radix)
                    .map_err(|_| format!("invalid numeric value {:?}", text))
            }
        }
    }
}

fn numeric_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Numeric::deserialize(deserializer)?.value().map_err(de::Error::custom)?;
    u32::try_from(value).map_err(|_| de::Error::custom("value does not fit in 32 bits"))
}

fn numeric_u32_option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    match Option::<Numeric>::deserialize(deserializer)? {
        None => Ok(None),
        Some(numeric) => {
            let value = numeric.value().map_err(de::Error::custom)?;
            u32::try_from(value)
                .map(Some)
                .map_err(|_| de::Error::custom("value does not fit in 32 bits"))
        }
    }
}

fn numeric_u16<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let value = Numeric::deserialize(deserializer)?.value().map_err(de::Error::custom)?;
    u16::try_from(value).map_err(|_| de::Error::custom("value does not fit in 16 bits"))
}


/// identity and size defaults applying to every slave that does not override them
#[derive(Clone, Debug, Deserialize)]
pub struct Defaults {
    #[serde(default, deserialize_with = "numeric_u32")]
    pub vendor_id: u32,
    #[serde(default, deserialize_with = "numeric_u32")]
    pub product_code: u32,
    /// upper bound on the static per-direction image size of any slave
    #[serde(default = "Defaults::max_bytes")]
    pub max_bytes_per_direction: usize,
}
impl Defaults {
    fn max_bytes() -> usize  {250}
}
impl Default for Defaults {
    fn default() -> Self {
        Self {vendor_id: 0, product_code: 0, max_bytes_per_direction: Self::max_bytes()}
    }
}

/// one statically declared sync manager channel: a single PDO of consecutive 8 bit entries
#[derive(Clone, Debug, Deserialize)]
pub struct StaticChannel {
    #[serde(deserialize_with = "numeric_u16")]
    pub pdo_index: u16,
    /// application object whose subindices the entries are generated from
    #[serde(deserialize_with = "numeric_u16")]
    pub entry_index: u16,
    pub size_bytes: usize,
}
impl StaticChannel {
    /// expand the channel into the PDO it carries: `size_bytes` 8 bit entries at consecutive subindices starting at 1
    pub fn to_pdo(&self) -> Pdo {
        Pdo {
            index: self.pdo_index,
            entries: (0 .. self.size_bytes)
                .map(|i| PdoEntry::new(self.entry_index, (i + 1) as u8, 8))
                .collect(),
        }
    }
}

/// declaration of one slave: identity plus its static output (sm2) and input (sm3) channels
#[derive(Clone, Debug, Deserialize)]
pub struct SlaveConfig {
    #[serde(default)]
    pub alias: u16,
    #[serde(default)]
    pub position: u16,
    #[serde(default, deserialize_with = "numeric_u32_option")]
    pub vendor_id: Option<u32>,
    #[serde(default, deserialize_with = "numeric_u32_option")]
    pub product_code: Option<u32>,
    pub sm2: StaticChannel,
    pub sm3: StaticChannel,
}
impl SlaveConfig {
    /// identity of this slave, falling back to the session defaults where not overridden
    pub fn device(&self, defaults: &Defaults) -> DeviceId {
        DeviceId {
            alias: self.alias,
            position: self.position,
            vendor: self.vendor_id.unwrap_or(defaults.vendor_id),
            product: self.product_code.unwrap_or(defaults.product_code),
        }
    }
    /// static cyclic layout of this slave, in the same shape the dynamic discovery produces
    pub fn layout(&self) -> PdoLayout {
        PdoLayout {
            outputs: vec![self.sm2.to_pdo()],
            inputs: vec![self.sm3.to_pdo()],
        }
    }
}

/// the session schema: defaults plus the declared slaves
#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub defaults: Defaults,
    pub slaves: Vec<SlaveConfig>,
}
impl SessionConfig {
    pub fn load(path: &Path) -> MappingResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> MappingResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|error| MappingError::Config(error.to_string()))?;
        config.check()?;
        debug!("session config: {} slaves", config.slaves.len());
        Ok(config)
    }

    fn check(&self) -> MappingResult {
        for (rank, slave) in self.slaves.iter().enumerate() {
            for (name, channel) in [("sm2", &slave.sm2), ("sm3", &slave.sm3)] {
                if channel.size_bytes == 0 {
                    return Err(MappingError::Config(
                        format!("slave {}: {} size_bytes must be positive", rank, name)))
                }
                if channel.size_bytes > self.defaults.max_bytes_per_direction {
                    return Err(MappingError::Config(
                        format!("slave {}: {} size {} exceeds max_bytes_per_direction ({})",
                            rank, name, channel.size_bytes, self.defaults.max_bytes_per_direction)))
                }
                // entry subindices are generated from 1, the u8 subindex space bounds the channel
                if channel.size_bytes > 255 {
                    return Err(MappingError::Config(
                        format!("slave {}: {} size {} does not fit the subindex space", rank, name, channel.size_bytes)))
                }
            }
        }
        Ok(())
    }
}


/// one named field declaration of the fields schema
#[derive(Clone, Debug, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    /// byte offset within the input image of the declaring slave
    pub offset: usize,
    #[serde(rename = "type")]
    pub width: FieldWidth,
}
impl FieldDecl {
    pub fn to_field(&self) -> LogicalField {
        LogicalField {name: self.name.clone(), offset: self.offset, width: self.width}
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SlaveFields {
    /// fields decoded from the input image (SM3)
    #[serde(default)]
    pub sm3: Vec<FieldDecl>,
}

#[derive(Clone, Debug, Deserialize)]
struct FieldsBySlave {
    slave0: SlaveFields,
}

/// the fields schema of the viewer tools: `fields.slave0.sm3`
#[derive(Clone, Debug, Deserialize)]
pub struct FieldsConfig {
    #[serde(rename = "fields")]
    by_slave: FieldsBySlave,
}
impl FieldsConfig {
    pub fn load(path: &Path) -> MappingResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> MappingResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|error| MappingError::Config(error.to_string()))?;
        debug!("fields config: {} input fields", config.by_slave.slave0.sm3.len());
        Ok(config)
    }

    /// declared input-image fields of the first slave, ready for resolution
    pub fn input_fields(&self) -> Vec<LogicalField> {
        self.by_slave.slave0.sm3.iter().map(FieldDecl::to_field).collect()
    }
}


#[cfg(test)]
mod test {
    use super::*;

    const SESSION: &str = r#"{
        "defaults": {"vendor_id": "0x6c", "product_code": "0xa72c", "max_bytes_per_direction": 250},
        "slaves": [{
            "alias": 0,
            "position": 0,
            "sm2": {"pdo_index": "0x1600", "entry_index": "0x7000", "size_bytes": 3},
            "sm3": {"pdo_index": "0x1A00", "entry_index": "0x6000", "size_bytes": 5}
        }]
    }"#;

    #[test]
    fn session_schema() {
        let config = SessionConfig::parse(SESSION).unwrap();
        let slave = &config.slaves[0];
        let device = slave.device(&config.defaults);
        assert_eq!((device.vendor, device.product), (0x6c, 0xa72c));

        let layout = slave.layout();
        assert_eq!(layout.outputs[0].index, 0x1600);
        assert_eq!(layout.inputs[0].entries.len(), 5);
        // consecutive 8 bit subindices from 1
        let subs: Vec<_> = layout.inputs[0].entries.iter()
            .map(|entry| (entry.object().index, entry.object().sub, entry.bits()))
            .collect();
        assert_eq!(subs, [(0x6000, 1, 8), (0x6000, 2, 8), (0x6000, 3, 8), (0x6000, 4, 8), (0x6000, 5, 8)]);
    }

    #[test]
    fn size_limits() {
        let oversized = SESSION.replace("\"size_bytes\": 5", "\"size_bytes\": 251");
        assert!(matches!(SessionConfig::parse(&oversized), Err(MappingError::Config(_))));

        let empty = SESSION.replace("\"size_bytes\": 3", "\"size_bytes\": 0");
        assert!(matches!(SessionConfig::parse(&empty), Err(MappingError::Config(_))));
    }

    #[test]
    fn fields_schema() {
        let config = FieldsConfig::parse(r#"{
            "fields": {"slave0": {"sm3": [
                {"name": "status", "offset": 0, "type": "u16"},
                {"name": "position", "offset": 2, "type": "u32"},
                {"name": "mode", "offset": 6, "type": "u8"}
            ]}}
        }"#).unwrap();
        let fields = config.input_fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].name, "position");
        assert_eq!(fields[1].width, FieldWidth::U32);
        assert_eq!(fields[2].width.bytes(), 1);
    }

    #[test]
    fn malformed_declarations() {
        assert!(matches!(
            FieldsConfig::parse(r#"{"fields": {"slave0": {"sm3": [{"name": "x", "offset": 0, "type": "f64"}]}}}"#),
            Err(MappingError::Config(_))));
        assert!(matches!(
            SessionConfig::parse(r#"{"slaves": [{"sm2": {"pdo_index": "0x1600"}}]}"#),
            Err(MappingError::Config(_))));
    }
}
