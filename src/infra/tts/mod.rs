mod cartesia;

pub use cartesia::{CartesiaBackend, CARTESIA_DEFAULT_BASE_URL};
