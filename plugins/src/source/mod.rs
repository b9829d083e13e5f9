pub mod local;

pub use local::LocalEvidenceSource;
