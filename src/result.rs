//! The LDAPResult component shared by every response PDU.

use crate::ber::{enumerated_octets, tlv_octets, BerReader, BerWriter};
use crate::error::{DecodeError, EncodeError};

/// Referral URI sequence, context tag [3] constructed.
const TAG_REFERRAL: u8 = 0xA3;

/// Protocol result codes. Codes outside the registered set survive a
/// round-trip through [`ResultCode::Other`] rather than failing the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    OperationsError,
    ProtocolError,
    TimeLimitExceeded,
    SizeLimitExceeded,
    CompareFalse,
    CompareTrue,
    AuthMethodNotSupported,
    StrongerAuthRequired,
    Referral,
    AdminLimitExceeded,
    UnavailableCriticalExtension,
    ConfidentialityRequired,
    SaslBindInProgress,
    NoSuchAttribute,
    UndefinedAttributeType,
    InappropriateMatching,
    ConstraintViolation,
    AttributeOrValueExists,
    InvalidAttributeSyntax,
    NoSuchObject,
    AliasProblem,
    InvalidDnSyntax,
    AliasDereferencingProblem,
    InappropriateAuthentication,
    InvalidCredentials,
    InsufficientAccessRights,
    Busy,
    Unavailable,
    UnwillingToPerform,
    LoopDetect,
    NamingViolation,
    ObjectClassViolation,
    NotAllowedOnNonLeaf,
    NotAllowedOnRdn,
    EntryAlreadyExists,
    ObjectClassModsProhibited,
    AffectsMultipleDsas,
    Other(u32),
}

impl ResultCode {
    pub fn code(&self) -> u32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::OperationsError => 1,
            ResultCode::ProtocolError => 2,
            ResultCode::TimeLimitExceeded => 3,
            ResultCode::SizeLimitExceeded => 4,
            ResultCode::CompareFalse => 5,
            ResultCode::CompareTrue => 6,
            ResultCode::AuthMethodNotSupported => 7,
            ResultCode::StrongerAuthRequired => 8,
            ResultCode::Referral => 10,
            ResultCode::AdminLimitExceeded => 11,
            ResultCode::UnavailableCriticalExtension => 12,
            ResultCode::ConfidentialityRequired => 13,
            ResultCode::SaslBindInProgress => 14,
            ResultCode::NoSuchAttribute => 16,
            ResultCode::UndefinedAttributeType => 17,
            ResultCode::InappropriateMatching => 18,
            ResultCode::ConstraintViolation => 19,
            ResultCode::AttributeOrValueExists => 20,
            ResultCode::InvalidAttributeSyntax => 21,
            ResultCode::NoSuchObject => 32,
            ResultCode::AliasProblem => 33,
            ResultCode::InvalidDnSyntax => 34,
            ResultCode::AliasDereferencingProblem => 36,
            ResultCode::InappropriateAuthentication => 48,
            ResultCode::InvalidCredentials => 49,
            ResultCode::InsufficientAccessRights => 50,
            ResultCode::Busy => 51,
            ResultCode::Unavailable => 52,
            ResultCode::UnwillingToPerform => 53,
            ResultCode::LoopDetect => 54,
            ResultCode::NamingViolation => 64,
            ResultCode::ObjectClassViolation => 65,
            ResultCode::NotAllowedOnNonLeaf => 66,
            ResultCode::NotAllowedOnRdn => 67,
            ResultCode::EntryAlreadyExists => 68,
            ResultCode::ObjectClassModsProhibited => 69,
            ResultCode::AffectsMultipleDsas => 71,
            ResultCode::Other(code) => *code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ResultCode::Success,
            1 => ResultCode::OperationsError,
            2 => ResultCode::ProtocolError,
            3 => ResultCode::TimeLimitExceeded,
            4 => ResultCode::SizeLimitExceeded,
            5 => ResultCode::CompareFalse,
            6 => ResultCode::CompareTrue,
            7 => ResultCode::AuthMethodNotSupported,
            8 => ResultCode::StrongerAuthRequired,
            10 => ResultCode::Referral,
            11 => ResultCode::AdminLimitExceeded,
            12 => ResultCode::UnavailableCriticalExtension,
            13 => ResultCode::ConfidentialityRequired,
            14 => ResultCode::SaslBindInProgress,
            16 => ResultCode::NoSuchAttribute,
            17 => ResultCode::UndefinedAttributeType,
            18 => ResultCode::InappropriateMatching,
            19 => ResultCode::ConstraintViolation,
            20 => ResultCode::AttributeOrValueExists,
            21 => ResultCode::InvalidAttributeSyntax,
            32 => ResultCode::NoSuchObject,
            33 => ResultCode::AliasProblem,
            34 => ResultCode::InvalidDnSyntax,
            36 => ResultCode::AliasDereferencingProblem,
            48 => ResultCode::InappropriateAuthentication,
            49 => ResultCode::InvalidCredentials,
            50 => ResultCode::InsufficientAccessRights,
            51 => ResultCode::Busy,
            52 => ResultCode::Unavailable,
            53 => ResultCode::UnwillingToPerform,
            54 => ResultCode::LoopDetect,
            64 => ResultCode::NamingViolation,
            65 => ResultCode::ObjectClassViolation,
            66 => ResultCode::NotAllowedOnNonLeaf,
            67 => ResultCode::NotAllowedOnRdn,
            68 => ResultCode::EntryAlreadyExists,
            69 => ResultCode::ObjectClassModsProhibited,
            71 => ResultCode::AffectsMultipleDsas,
            other => ResultCode::Other(other),
        }
    }
}

/// The common result component: code, matched Dn, diagnostic message and an
/// optional referral list. Referrals are omitted from the wire entirely when
/// the list is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapResult {
    pub result_code: ResultCode,
    pub matched_dn: String,
    pub diagnostic_message: String,
    pub referrals: Vec<String>,
}

impl LdapResult {
    pub fn new(result_code: ResultCode) -> Self {
        LdapResult {
            result_code,
            matched_dn: String::new(),
            diagnostic_message: String::new(),
            referrals: Vec::new(),
        }
    }

    pub fn success() -> Self {
        LdapResult::new(ResultCode::Success)
    }

    pub fn with_diagnostic(result_code: ResultCode, message: impl Into<String>) -> Self {
        LdapResult {
            diagnostic_message: message.into(),
            ..LdapResult::new(result_code)
        }
    }

    fn referral_content_length(&self) -> usize {
        self.referrals.iter().map(|uri| tlv_octets(uri.len())).sum()
    }

    /// Length of the result components as they appear inside the enclosing
    /// response sequence.
    pub fn encoded_length(&self) -> usize {
        let mut len = tlv_octets(enumerated_octets(self.result_code.code()))
            + tlv_octets(self.matched_dn.len())
            + tlv_octets(self.diagnostic_message.len());

        if !self.referrals.is_empty() {
            len += tlv_octets(self.referral_content_length());
        }

        len
    }

    pub fn encode(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        writer.write_enumerated(self.result_code.code())?;
        writer.write_string(&self.matched_dn)?;
        writer.write_string(&self.diagnostic_message)?;

        if !self.referrals.is_empty() {
            writer.write_header(TAG_REFERRAL, self.referral_content_length())?;
            for uri in &self.referrals {
                writer.write_string(uri)?;
            }
        }

        Ok(())
    }

    /// Decode the result components, bounded by the enclosing element's end
    /// offset.
    pub fn decode(reader: &mut BerReader<'_>, end: usize) -> Result<Self, DecodeError> {
        let result_code = ResultCode::from_code(reader.read_enumerated()?);
        let matched_dn = reader.read_string()?;
        let diagnostic_message = reader.read_string()?;

        let mut referrals = Vec::new();
        if reader.offset() < end && reader.peek_tag()? == TAG_REFERRAL {
            let referral_end = reader.read_element(TAG_REFERRAL)?;
            while reader.offset() < referral_end {
                referrals.push(reader.read_string()?);
            }
        }

        Ok(LdapResult {
            result_code,
            matched_dn,
            diagnostic_message,
            referrals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(result: &LdapResult) -> LdapResult {
        let mut buf = vec![0u8; result.encoded_length()];
        let mut writer = BerWriter::new(&mut buf);
        result.encode(&mut writer).unwrap();
        assert_eq!(writer.position(), buf.len());

        let mut reader = BerReader::new(&buf);
        LdapResult::decode(&mut reader, buf.len()).unwrap()
    }

    #[test]
    fn test_result_code_round_trip() {
        for code in [0, 1, 10, 32, 49, 53, 68, 71] {
            assert_eq!(ResultCode::from_code(code).code(), code);
        }
        assert_eq!(ResultCode::from_code(4095), ResultCode::Other(4095));
        assert_eq!(ResultCode::Other(4095).code(), 4095);
    }

    #[test]
    fn test_success_encoding() {
        let result = LdapResult::success();
        let mut buf = vec![0u8; result.encoded_length()];
        let mut writer = BerWriter::new(&mut buf);
        result.encode(&mut writer).unwrap();
        assert_eq!(&buf, &[0x0A, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00]);
    }

    #[test]
    fn test_round_trip_with_diagnostic() {
        let result = LdapResult {
            result_code: ResultCode::NoSuchObject,
            matched_dn: "dc=example".to_string(),
            diagnostic_message: "entry not found".to_string(),
            referrals: Vec::new(),
        };
        assert_eq!(round_trip(&result), result);
    }

    #[test]
    fn test_referrals_present() {
        let result = LdapResult {
            result_code: ResultCode::Referral,
            matched_dn: String::new(),
            diagnostic_message: String::new(),
            referrals: vec![
                "ldap://other.example/dc=example".to_string(),
                "ldap://backup.example/dc=example".to_string(),
            ],
        };
        assert_eq!(round_trip(&result), result);
    }

    #[test]
    fn test_empty_referrals_not_encoded() {
        let result = LdapResult::success();
        let mut buf = vec![0u8; result.encoded_length()];
        let mut writer = BerWriter::new(&mut buf);
        result.encode(&mut writer).unwrap();
        assert!(!buf.contains(&0xA3));
    }
}
