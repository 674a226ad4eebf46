// 🏥 Institution Entity - one decoded register entry
//
// Identity: the SKS number (nummer). Values: name and validity window.
// The same number appears once per validity window, so a record is a
// value in the institution's timeline, never the institution itself.

use crate::temporal::ValidityWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// INSTITUTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstitutionType {
    /// Hospital (record tag "sgh")
    Hospital,

    /// Hospital department (record tag "afd")
    HospitalDepartment,
}

impl InstitutionType {
    pub const HOSPITAL_TAG: &'static str = "sgh";
    pub const DEPARTMENT_TAG: &'static str = "afd";

    /// Map a record-type tag to its institution type
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            Self::HOSPITAL_TAG => Some(InstitutionType::Hospital),
            Self::DEPARTMENT_TAG => Some(InstitutionType::HospitalDepartment),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            InstitutionType::Hospital => Self::HOSPITAL_TAG,
            InstitutionType::HospitalDepartment => Self::DEPARTMENT_TAG,
        }
    }

    /// Organisation type label stored with every row
    pub fn as_str(&self) -> &'static str {
        match self {
            InstitutionType::Hospital => "Sygehus",
            InstitutionType::HospitalDepartment => "Afdeling",
        }
    }

    /// Inverse of `as_str`, used when reading rows back
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Sygehus" => Some(InstitutionType::Hospital),
            "Afdeling" => Some(InstitutionType::HospitalDepartment),
            _ => None,
        }
    }
}

// ============================================================================
// OPERATION CODE
// ============================================================================

/// Register operation code; create and update are persisted the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationCode {
    Create,
    Update,
}

impl OperationCode {
    pub fn from_char(code: char) -> Option<Self> {
        match code {
            '1' => Some(OperationCode::Create),
            '3' => Some(OperationCode::Update),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            OperationCode::Create => '1',
            OperationCode::Update => '3',
        }
    }
}

// ============================================================================
// INSTITUTION RECORD
// ============================================================================

/// Immutable value decoded from one applicable register line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionRecord {
    identifier: String,
    kind: InstitutionType,
    name: String,
    validity: ValidityWindow,
    operation: OperationCode,
    line_number: usize,
}

impl InstitutionRecord {
    pub fn new(
        identifier: String,
        kind: InstitutionType,
        name: String,
        validity: ValidityWindow,
        operation: OperationCode,
        line_number: usize,
    ) -> Self {
        InstitutionRecord {
            identifier,
            kind,
            name,
            validity,
            operation,
            line_number,
        }
    }

    /// SKS number (nummer)
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> InstitutionType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validity(&self) -> &ValidityWindow {
        &self.validity
    }

    /// Inclusive start of validity
    pub fn valid_from(&self) -> DateTime<Utc> {
        self.validity.valid_from()
    }

    /// Exclusive end of validity
    pub fn valid_to(&self) -> DateTime<Utc> {
        self.validity.valid_to()
    }

    pub fn operation(&self) -> OperationCode {
        self.operation
    }

    /// 1-based line in the source file
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn was_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.validity.contains(time)
    }
}
