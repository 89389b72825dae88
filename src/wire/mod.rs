pub mod records;

pub use records::{parse_envelope, Envelope, TaggedRecord};
