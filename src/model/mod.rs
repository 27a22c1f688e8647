//! Record types the database façade knows how to store. Each `Storable`
//! packs itself into a fixed little-endian byte layout with no padding and
//! no self-describing schema — `deserialize` has to already know which type
//! it's reading back, which is exactly the job `Database<T>` does for it.

mod course;
mod sensor;
mod user;

pub use course::Course;
pub use sensor::SensorData;
pub use user::User;

use crate::errors::Error;

/// Tags a record's concrete type on disk (carried in the data page's own
/// `object_type` header field, independent of the B+Tree's `OBJECT_TYPE_BTREE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Sensor = 1,
    User = 2,
    Course = 3,
}

impl ModelType {
    /// The inverse of `as u32` on the `object_type` a data page's header
    /// actually carries. `None` for any tag this crate's façade doesn't
    /// know (`0 = Unknown`, `OBJECT_TYPE_BTREE`, or garbage).
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(ModelType::Sensor),
            2 => Some(ModelType::User),
            3 => Some(ModelType::Course),
            _ => None,
        }
    }
}

pub trait Storable: Sized {
    const MODEL_TYPE: ModelType;

    /// Bytes this value currently needs — not a fixed constant for variable-length types.
    fn serialized_size(&self) -> usize;

    /// Writes exactly `serialized_size()` bytes starting at `dest[0]`.
    fn serialize(&self, dest: &mut [u8]);

    /// Reads a value back from bytes written by `serialize`. `src` may be
    /// longer than the record (it's a whole page-record slice); `Err` only
    /// on a length too short to hold a well-formed record.
    fn deserialize(src: &[u8]) -> Result<Self, Error>;
}

/// One already-deserialized record of any known `ModelType`, for call sites
/// that only learn a record's concrete type at runtime (a data page's own
/// `object_type` header field) rather than at the call site's generic
/// parameter. Mirrors `original_source`'s `ModelFactory::create(ModelType)`
/// — which hands back a default-constructed `Storable` of the right
/// subtype for its caller to then fill via virtual dispatch — collapsed
/// into one call, since `Storable::deserialize` already does both steps.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Sensor(SensorData),
    User(User),
    Course(Course),
}

impl Record {
    /// Dispatches on `model_type` and deserializes `bytes` as the matching
    /// concrete record.
    pub fn create(model_type: ModelType, bytes: &[u8]) -> Result<Self, Error> {
        Ok(match model_type {
            ModelType::Sensor => Record::Sensor(SensorData::deserialize(bytes)?),
            ModelType::User => Record::User(User::deserialize(bytes)?),
            ModelType::Course => Record::Course(Course::deserialize(bytes)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_round_trips_through_its_u32_tag() {
        for mt in [ModelType::Sensor, ModelType::User, ModelType::Course] {
            assert_eq!(ModelType::from_u32(mt as u32), Some(mt));
        }
    }

    #[test]
    fn model_type_from_u32_rejects_unknown_tags() {
        assert_eq!(ModelType::from_u32(0), None);
        assert_eq!(ModelType::from_u32(crate::pages::OBJECT_TYPE_BTREE), None);
    }

    #[test]
    fn record_create_dispatches_on_the_runtime_tag() {
        let user = User::new(7, "Ada Lovelace", 36);
        let mut buf = vec![0u8; user.serialized_size()];
        user.serialize(&mut buf);
        assert_eq!(Record::create(ModelType::User, &buf).unwrap(), Record::User(user));

        let reading = SensorData::new(9, 21.5, 1_700_000_000);
        let mut buf = vec![0u8; reading.serialized_size()];
        reading.serialize(&mut buf);
        assert_eq!(Record::create(ModelType::Sensor, &buf).unwrap(), Record::Sensor(reading));

        let course = Course::new(100, "Databases", vec![1, 2]);
        let mut buf = vec![0u8; course.serialized_size()];
        course.serialize(&mut buf);
        assert_eq!(Record::create(ModelType::Course, &buf).unwrap(), Record::Course(course));
    }

    #[test]
    fn record_create_propagates_a_deserialize_error() {
        assert!(Record::create(ModelType::Sensor, &[0u8; 2]).is_err());
    }
}
