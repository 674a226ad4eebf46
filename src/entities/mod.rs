// Entity Models
// Identity persists (the SKS number), values change (one record per
// validity window).

pub mod institution;

pub use institution::{InstitutionRecord, InstitutionType, OperationCode};
