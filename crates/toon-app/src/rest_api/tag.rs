use toon_dal::tag::{CreateTag, TagRepository};

crate::value_api!(Tag);
