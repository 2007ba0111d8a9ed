use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::user::LocalUser;

mod http;

pub(crate) use http::HttpRequestMessageProcessor;

/// Kind of clinical record created from an embedded request message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordKind {
    EConsult,
    Referral,
    Unrecognized(String),
}

impl RecordKind {
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "econsult" => Self::EConsult,
            "referral" => Self::Referral,
            other => Self::Unrecognized(other.to_owned()),
        }
    }

    /// Value of the `record_type` redirect parameter. Empty for unrecognized kinds.
    pub fn routing_tag(&self) -> &str {
        match self {
            Self::EConsult => "econsult",
            Self::Referral => "referral",
            Self::Unrecognized(_) => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Record {
    pub kind: RecordKind,
    pub id: String,
}

impl Record {
    pub fn new(kind: RecordKind, id: impl ToString) -> Self {
        Self { kind, id: id.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageErrorKind {
    InvalidSegment,
    InvalidMessage,
    PermissionDenied,
    MissingOrganization,
    MissingSpecialty,
    MissingChiefComplaint,
    MissingWorkupChecklist,
    Other,
}

impl MessageErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "INVALID_HL7_SEGMENT" => Self::InvalidSegment,
            "INVALID_HL7_MESSAGE" => Self::InvalidMessage,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "MISSING_HL7_ORGANIZATION" => Self::MissingOrganization,
            "MISSING_HL7_SPECIALTY" => Self::MissingSpecialty,
            "MISSING_HL7_CHIEF_COMPLAINT" => Self::MissingChiefComplaint,
            "MISSING_HL7_WORKUP_CHECKLIST" => Self::MissingWorkupChecklist,
            _ => Self::Other,
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub(crate) struct MessageError {
    pub kind: MessageErrorKind,
    pub message: String,
}

impl MessageError {
    pub fn new(kind: MessageErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Turns an embedded HL7 request message into an application record on behalf of `user`.
#[cfg_attr(test, automock)]
#[async_trait]
pub(crate) trait RequestMessageProcessor {
    async fn create_request(&self, raw_message: &str, user: &LocalUser) -> Result<Option<Record>, MessageError>;
}
