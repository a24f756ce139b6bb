use garde::Validate;
use serde::{Deserialize, Serialize};
use toon_macros::ValueRepository;
use toon_types::general::is_valid_slug;

#[derive(Debug, Serialize, Deserialize, Clone, Validate, ValueRepository)]
pub struct CreateGenre {
    #[garde(length(min = 1, max = 255))]
    name: String,
    #[garde(custom(is_valid_slug))]
    slug: String,
    #[garde(range(min = 0))]
    version: Option<i64>,
}

impl CreateGenre {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }
}
