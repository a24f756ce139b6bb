use toon_dal::genre::{CreateGenre, GenreRepository};

crate::value_api!(Genre);
