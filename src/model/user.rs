use crate::errors::Error;

use super::{ModelType, Storable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub age: u16,
}

impl User {
    pub fn new(id: u32, name: impl Into<String>, age: u16) -> Self {
        Self {
            id,
            name: name.into(),
            age,
        }
    }
}

/// `id(4) + age(2) + name_len(2) + name`.
const HEADER_LEN: usize = 4 + 2 + 2;

impl Storable for User {
    const MODEL_TYPE: ModelType = ModelType::User;

    fn serialized_size(&self) -> usize {
        HEADER_LEN + self.name.len()
    }

    fn serialize(&self, dest: &mut [u8]) {
        dest[0..4].copy_from_slice(&self.id.to_le_bytes());
        dest[4..6].copy_from_slice(&self.age.to_le_bytes());
        dest[6..8].copy_from_slice(&(self.name.len() as u16).to_le_bytes());
        dest[8..8 + self.name.len()].copy_from_slice(self.name.as_bytes());
    }

    fn deserialize(src: &[u8]) -> Result<Self, Error> {
        if src.len() < HEADER_LEN {
            return Err(Error::CorruptPage("user record shorter than its fixed header".into()));
        }
        let id = u32::from_le_bytes(src[0..4].try_into().unwrap());
        let age = u16::from_le_bytes(src[4..6].try_into().unwrap());
        let name_len = u16::from_le_bytes(src[6..8].try_into().unwrap()) as usize;
        if src.len() < HEADER_LEN + name_len {
            return Err(Error::CorruptPage("user record truncated before its name".into()));
        }
        let name = String::from_utf8(src[8..8 + name_len].to_vec())
            .map_err(|_| Error::CorruptPage("user name is not valid UTF-8".into()))?;
        Ok(User { id, name, age })
    }
}
