use crate::errors::Error;

use super::{ModelType, Storable};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorData {
    pub sensor_id: u32,
    pub value: f64,
    pub timestamp: u64,
}

impl SensorData {
    pub fn new(sensor_id: u32, value: f64, timestamp: u64) -> Self {
        Self {
            sensor_id,
            value,
            timestamp,
        }
    }
}

/// `sensor_id(4) + value(8) + timestamp(8)`, always fixed-width.
pub const ENCODED_SIZE: usize = 4 + 8 + 8;

impl Storable for SensorData {
    const MODEL_TYPE: ModelType = ModelType::Sensor;

    fn serialized_size(&self) -> usize {
        ENCODED_SIZE
    }

    fn serialize(&self, dest: &mut [u8]) {
        dest[0..4].copy_from_slice(&self.sensor_id.to_le_bytes());
        dest[4..12].copy_from_slice(&self.value.to_le_bytes());
        dest[12..20].copy_from_slice(&self.timestamp.to_le_bytes());
    }

    fn deserialize(src: &[u8]) -> Result<Self, Error> {
        if src.len() < ENCODED_SIZE {
            return Err(Error::CorruptPage("sensor record shorter than its fixed width".into()));
        }
        Ok(SensorData {
            sensor_id: u32::from_le_bytes(src[0..4].try_into().unwrap()),
            value: f64::from_le_bytes(src[4..12].try_into().unwrap()),
            timestamp: u64::from_le_bytes(src[12..20].try_into().unwrap()),
        })
    }
}
