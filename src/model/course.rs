use crate::errors::Error;

use super::{ModelType, Storable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub course_id: u32,
    pub title: String,
    pub student_ids: Vec<u32>,
}

impl Course {
    pub fn new(course_id: u32, title: impl Into<String>, student_ids: Vec<u32>) -> Self {
        Self {
            course_id,
            title: title.into(),
            student_ids,
        }
    }

    pub fn add_student(&mut self, student_id: u32) {
        self.student_ids.push(student_id);
    }
}

/// `course_id(4) + title_len(2) + title + student_count(2) + students(4 each)`.
const FIXED_LEN: usize = 4 + 2 + 2;

impl Storable for Course {
    const MODEL_TYPE: ModelType = ModelType::Course;

    fn serialized_size(&self) -> usize {
        FIXED_LEN + self.title.len() + self.student_ids.len() * 4
    }

    fn serialize(&self, dest: &mut [u8]) {
        let mut offset = 0;
        dest[offset..offset + 4].copy_from_slice(&self.course_id.to_le_bytes());
        offset += 4;

        dest[offset..offset + 2].copy_from_slice(&(self.title.len() as u16).to_le_bytes());
        offset += 2;
        dest[offset..offset + self.title.len()].copy_from_slice(self.title.as_bytes());
        offset += self.title.len();

        dest[offset..offset + 2].copy_from_slice(&(self.student_ids.len() as u16).to_le_bytes());
        offset += 2;
        for &id in &self.student_ids {
            dest[offset..offset + 4].copy_from_slice(&id.to_le_bytes());
            offset += 4;
        }
    }

    fn deserialize(src: &[u8]) -> Result<Self, Error> {
        let too_short = || Error::CorruptPage("course record truncated".into());

        if src.len() < 6 {
            return Err(too_short());
        }
        let course_id = u32::from_le_bytes(src[0..4].try_into().unwrap());
        let title_len = u16::from_le_bytes(src[4..6].try_into().unwrap()) as usize;
        let mut offset = 6;

        if src.len() < offset + title_len {
            return Err(too_short());
        }
        let title = String::from_utf8(src[offset..offset + title_len].to_vec())
            .map_err(|_| Error::CorruptPage("course title is not valid UTF-8".into()))?;
        offset += title_len;

        if src.len() < offset + 2 {
            return Err(too_short());
        }
        let student_count = u16::from_le_bytes(src[offset..offset + 2].try_into().unwrap()) as usize;
        offset += 2;

        if src.len() < offset + student_count * 4 {
            return Err(too_short());
        }
        let mut student_ids = Vec::with_capacity(student_count);
        for _ in 0..student_count {
            student_ids.push(u32::from_le_bytes(src[offset..offset + 4].try_into().unwrap()));
            offset += 4;
        }

        Ok(Course {
            course_id,
            title,
            student_ids,
        })
    }
}
