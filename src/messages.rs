//! LDAP message envelope and per-operation codecs.
//!
//! Every PDU type encodes in two passes: `content_length` computes the
//! exact encoded size bottom-up, then `encode_content` writes into a buffer
//! allocated to that size. A length mismatch therefore shows up as an
//! encode error, never as a corrupt PDU on the wire.

use crate::attribute::Attribute;
use crate::ber::{
    enumerated_octets, integer_octets, tlv_octets, BerReader, BerWriter, TAG_SEQUENCE, TAG_SET,
};
use crate::config::CodecConfig;
use crate::entry::Entry;
use crate::error::{DecodeError, EncodeError};
use crate::result::LdapResult;
use crate::value::Value;

pub const TAG_BIND_REQUEST: u8 = 0x60;
pub const TAG_BIND_RESPONSE: u8 = 0x61;
pub const TAG_UNBIND_REQUEST: u8 = 0x42;
pub const TAG_SEARCH_REQUEST: u8 = 0x63;
pub const TAG_SEARCH_RESULT_ENTRY: u8 = 0x64;
pub const TAG_SEARCH_RESULT_DONE: u8 = 0x65;
pub const TAG_MODIFY_REQUEST: u8 = 0x66;
pub const TAG_MODIFY_RESPONSE: u8 = 0x67;
pub const TAG_ADD_REQUEST: u8 = 0x68;
pub const TAG_ADD_RESPONSE: u8 = 0x69;
pub const TAG_DEL_REQUEST: u8 = 0x4A;
pub const TAG_DEL_RESPONSE: u8 = 0x6B;
pub const TAG_MODIFY_DN_REQUEST: u8 = 0x6C;
pub const TAG_MODIFY_DN_RESPONSE: u8 = 0x6D;
pub const TAG_COMPARE_REQUEST: u8 = 0x6E;
pub const TAG_COMPARE_RESPONSE: u8 = 0x6F;
pub const TAG_EXTENDED_REQUEST: u8 = 0x77;
pub const TAG_EXTENDED_RESPONSE: u8 = 0x78;
pub const TAG_INTERMEDIATE_RESPONSE: u8 = 0x79;

const TAG_CONTROLS: u8 = 0xA0;
const TAG_SIMPLE_AUTH: u8 = 0x80;
const TAG_SASL_AUTH: u8 = 0xA3;
const TAG_SERVER_SASL_CREDS: u8 = 0x87;
const TAG_NEW_SUPERIOR: u8 = 0x80;
const TAG_EXTENDED_REQUEST_NAME: u8 = 0x80;
const TAG_EXTENDED_REQUEST_VALUE: u8 = 0x81;
const TAG_EXTENDED_RESPONSE_NAME: u8 = 0x8A;
const TAG_EXTENDED_RESPONSE_VALUE: u8 = 0x8B;
const TAG_INTERMEDIATE_NAME: u8 = 0x80;
const TAG_INTERMEDIATE_VALUE: u8 = 0x81;

/// The outer envelope: message id, one operation, optional controls.
#[derive(Debug, Clone)]
pub struct LdapMessage {
    pub message_id: i32,
    pub protocol_op: ProtocolOp,
    pub controls: Vec<Control>,
}

impl LdapMessage {
    pub fn new(message_id: i32, protocol_op: ProtocolOp) -> Self {
        LdapMessage {
            message_id,
            protocol_op,
            controls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Control {
    pub control_type: String,
    pub criticality: bool,
    pub value: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub enum ProtocolOp {
    BindRequest(BindRequest),
    BindResponse(BindResponse),
    UnbindRequest,
    SearchRequest(SearchRequest),
    SearchResultEntry(SearchResultEntry),
    SearchResultDone(SearchResultDone),
    ModifyRequest(ModifyRequest),
    ModifyResponse(ModifyResponse),
    AddRequest(AddRequest),
    AddResponse(AddResponse),
    DelRequest(DelRequest),
    DelResponse(DelResponse),
    ModifyDnRequest(ModifyDnRequest),
    ModifyDnResponse(ModifyDnResponse),
    CompareRequest(CompareRequest),
    CompareResponse(CompareResponse),
    ExtendedRequest(ExtendedRequest),
    ExtendedResponse(ExtendedResponse),
    IntermediateResponse(IntermediateResponse),
}

impl ProtocolOp {
    pub fn tag(&self) -> u8 {
        match self {
            ProtocolOp::BindRequest(_) => TAG_BIND_REQUEST,
            ProtocolOp::BindResponse(_) => TAG_BIND_RESPONSE,
            ProtocolOp::UnbindRequest => TAG_UNBIND_REQUEST,
            ProtocolOp::SearchRequest(_) => TAG_SEARCH_REQUEST,
            ProtocolOp::SearchResultEntry(_) => TAG_SEARCH_RESULT_ENTRY,
            ProtocolOp::SearchResultDone(_) => TAG_SEARCH_RESULT_DONE,
            ProtocolOp::ModifyRequest(_) => TAG_MODIFY_REQUEST,
            ProtocolOp::ModifyResponse(_) => TAG_MODIFY_RESPONSE,
            ProtocolOp::AddRequest(_) => TAG_ADD_REQUEST,
            ProtocolOp::AddResponse(_) => TAG_ADD_RESPONSE,
            ProtocolOp::DelRequest(_) => TAG_DEL_REQUEST,
            ProtocolOp::DelResponse(_) => TAG_DEL_RESPONSE,
            ProtocolOp::ModifyDnRequest(_) => TAG_MODIFY_DN_REQUEST,
            ProtocolOp::ModifyDnResponse(_) => TAG_MODIFY_DN_RESPONSE,
            ProtocolOp::CompareRequest(_) => TAG_COMPARE_REQUEST,
            ProtocolOp::CompareResponse(_) => TAG_COMPARE_RESPONSE,
            ProtocolOp::ExtendedRequest(_) => TAG_EXTENDED_REQUEST,
            ProtocolOp::ExtendedResponse(_) => TAG_EXTENDED_RESPONSE,
            ProtocolOp::IntermediateResponse(_) => TAG_INTERMEDIATE_RESPONSE,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ProtocolOp::BindRequest(_) => "BindRequest",
            ProtocolOp::BindResponse(_) => "BindResponse",
            ProtocolOp::UnbindRequest => "UnbindRequest",
            ProtocolOp::SearchRequest(_) => "SearchRequest",
            ProtocolOp::SearchResultEntry(_) => "SearchResultEntry",
            ProtocolOp::SearchResultDone(_) => "SearchResultDone",
            ProtocolOp::ModifyRequest(_) => "ModifyRequest",
            ProtocolOp::ModifyResponse(_) => "ModifyResponse",
            ProtocolOp::AddRequest(_) => "AddRequest",
            ProtocolOp::AddResponse(_) => "AddResponse",
            ProtocolOp::DelRequest(_) => "DelRequest",
            ProtocolOp::DelResponse(_) => "DelResponse",
            ProtocolOp::ModifyDnRequest(_) => "ModifyDnRequest",
            ProtocolOp::ModifyDnResponse(_) => "ModifyDnResponse",
            ProtocolOp::CompareRequest(_) => "CompareRequest",
            ProtocolOp::CompareResponse(_) => "CompareResponse",
            ProtocolOp::ExtendedRequest(_) => "ExtendedRequest",
            ProtocolOp::ExtendedResponse(_) => "ExtendedResponse",
            ProtocolOp::IntermediateResponse(_) => "IntermediateResponse",
        }
    }

    fn content_length(&self) -> usize {
        match self {
            ProtocolOp::BindRequest(op) => op.content_length(),
            ProtocolOp::BindResponse(op) => op.content_length(),
            ProtocolOp::UnbindRequest => 0,
            ProtocolOp::SearchRequest(op) => op.content_length(),
            ProtocolOp::SearchResultEntry(op) => op.content_length(),
            ProtocolOp::SearchResultDone(op) => op.result.encoded_length(),
            ProtocolOp::ModifyRequest(op) => op.content_length(),
            ProtocolOp::ModifyResponse(op) => op.result.encoded_length(),
            ProtocolOp::AddRequest(op) => op.content_length(),
            ProtocolOp::AddResponse(op) => op.result.encoded_length(),
            ProtocolOp::DelRequest(op) => op.dn.len(),
            ProtocolOp::DelResponse(op) => op.result.encoded_length(),
            ProtocolOp::ModifyDnRequest(op) => op.content_length(),
            ProtocolOp::ModifyDnResponse(op) => op.result.encoded_length(),
            ProtocolOp::CompareRequest(op) => op.content_length(),
            ProtocolOp::CompareResponse(op) => op.result.encoded_length(),
            ProtocolOp::ExtendedRequest(op) => op.content_length(),
            ProtocolOp::ExtendedResponse(op) => op.content_length(),
            ProtocolOp::IntermediateResponse(op) => op.content_length(),
        }
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        match self {
            ProtocolOp::BindRequest(op) => op.encode_content(writer),
            ProtocolOp::BindResponse(op) => op.encode_content(writer),
            ProtocolOp::UnbindRequest => Ok(()),
            ProtocolOp::SearchRequest(op) => op.encode_content(writer),
            ProtocolOp::SearchResultEntry(op) => op.encode_content(writer),
            ProtocolOp::SearchResultDone(op) => op.result.encode(writer),
            ProtocolOp::ModifyRequest(op) => op.encode_content(writer),
            ProtocolOp::ModifyResponse(op) => op.result.encode(writer),
            ProtocolOp::AddRequest(op) => op.encode_content(writer),
            ProtocolOp::AddResponse(op) => op.result.encode(writer),
            ProtocolOp::DelRequest(op) => writer.write_raw(op.dn.as_bytes()),
            ProtocolOp::DelResponse(op) => op.result.encode(writer),
            ProtocolOp::ModifyDnRequest(op) => op.encode_content(writer),
            ProtocolOp::ModifyDnResponse(op) => op.result.encode(writer),
            ProtocolOp::CompareRequest(op) => op.encode_content(writer),
            ProtocolOp::CompareResponse(op) => op.result.encode(writer),
            ProtocolOp::ExtendedRequest(op) => op.encode_content(writer),
            ProtocolOp::ExtendedResponse(op) => op.encode_content(writer),
            ProtocolOp::IntermediateResponse(op) => op.encode_content(writer),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BindRequest {
    pub version: i32,
    pub name: String,
    pub authentication: BindAuthentication,
}

#[derive(Debug, Clone)]
pub enum BindAuthentication {
    Simple(String),
    Sasl {
        mechanism: String,
        credentials: Option<Vec<u8>>,
    },
}

impl BindRequest {
    fn auth_length(&self) -> usize {
        match &self.authentication {
            BindAuthentication::Simple(password) => tlv_octets(password.len()),
            BindAuthentication::Sasl {
                mechanism,
                credentials,
            } => {
                let inner = tlv_octets(mechanism.len())
                    + credentials.as_ref().map_or(0, |c| tlv_octets(c.len()));
                tlv_octets(inner)
            }
        }
    }

    fn content_length(&self) -> usize {
        tlv_octets(integer_octets(self.version)) + tlv_octets(self.name.len()) + self.auth_length()
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        writer.write_integer(self.version)?;
        writer.write_string(&self.name)?;

        match &self.authentication {
            BindAuthentication::Simple(password) => {
                writer.write_tagged_octet_string(TAG_SIMPLE_AUTH, password.as_bytes())
            }
            BindAuthentication::Sasl {
                mechanism,
                credentials,
            } => {
                let inner = tlv_octets(mechanism.len())
                    + credentials.as_ref().map_or(0, |c| tlv_octets(c.len()));
                writer.write_header(TAG_SASL_AUTH, inner)?;
                writer.write_string(mechanism)?;
                if let Some(credentials) = credentials {
                    writer.write_octet_string(credentials)?;
                }
                Ok(())
            }
        }
    }

    fn decode(reader: &mut BerReader<'_>, _end: usize) -> Result<Self, DecodeError> {
        let version = reader.read_integer()?;
        let name = reader.read_string()?;

        let auth_offset = reader.offset();
        let tag = reader.read_tag()?;
        let len = reader.read_length()?;

        let authentication = match tag {
            TAG_SIMPLE_AUTH => {
                let offset = reader.offset();
                let bytes = reader.read_raw(len)?;
                let password = String::from_utf8(bytes.to_vec())
                    .map_err(|_| DecodeError::InvalidUtf8 { offset })?;
                BindAuthentication::Simple(password)
            }
            TAG_SASL_AUTH => {
                let auth_end = reader.offset() + len;
                let mechanism = reader.read_string()?;
                let credentials = if reader.offset() < auth_end {
                    Some(reader.read_octet_string()?.to_vec())
                } else {
                    None
                };
                BindAuthentication::Sasl {
                    mechanism,
                    credentials,
                }
            }
            other => {
                return Err(DecodeError::UnsupportedTag {
                    offset: auth_offset,
                    tag: other,
                })
            }
        };

        Ok(BindRequest {
            version,
            name,
            authentication,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BindResponse {
    pub result: LdapResult,
    pub server_sasl_creds: Option<Vec<u8>>,
}

impl BindResponse {
    fn content_length(&self) -> usize {
        self.result.encoded_length()
            + self
                .server_sasl_creds
                .as_ref()
                .map_or(0, |c| tlv_octets(c.len()))
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        self.result.encode(writer)?;
        if let Some(creds) = &self.server_sasl_creds {
            writer.write_tagged_octet_string(TAG_SERVER_SASL_CREDS, creds)?;
        }
        Ok(())
    }

    fn decode(reader: &mut BerReader<'_>, end: usize) -> Result<Self, DecodeError> {
        let result = LdapResult::decode(reader, end)?;
        let server_sasl_creds = if reader.offset() < end
            && reader.peek_tag()? == TAG_SERVER_SASL_CREDS
        {
            Some(
                reader
                    .read_tagged_octet_string(TAG_SERVER_SASL_CREDS)?
                    .to_vec(),
            )
        } else {
            None
        };
        Ok(BindResponse {
            result,
            server_sasl_creds,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject = 0,
    SingleLevel = 1,
    WholeSubtree = 2,
}

impl SearchScope {
    fn from_wire(value: u32, offset: usize) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(SearchScope::BaseObject),
            1 => Ok(SearchScope::SingleLevel),
            2 => Ok(SearchScope::WholeSubtree),
            other => Err(DecodeError::Invalid {
                offset,
                reason: format!("invalid search scope {other}"),
            }),
        }
    }
}

/// The filter is carried as its raw TLV bytes: this codec relays filters
/// without interpreting them, so an opaque copy round-trips exotic matching
/// rules untouched.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub base_object: String,
    pub scope: SearchScope,
    pub deref_aliases: u32,
    pub size_limit: i32,
    pub time_limit: i32,
    pub types_only: bool,
    pub filter: Vec<u8>,
    pub attributes: Vec<String>,
}

impl SearchRequest {
    fn attributes_length(&self) -> usize {
        self.attributes.iter().map(|a| tlv_octets(a.len())).sum()
    }

    fn content_length(&self) -> usize {
        tlv_octets(self.base_object.len())
            + 3 // scope, single-octet enumerated
            + tlv_octets(enumerated_octets(self.deref_aliases))
            + tlv_octets(integer_octets(self.size_limit))
            + tlv_octets(integer_octets(self.time_limit))
            + 3 // types only
            + self.filter.len()
            + tlv_octets(self.attributes_length())
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        writer.write_string(&self.base_object)?;
        writer.write_enumerated(self.scope as u32)?;
        writer.write_enumerated(self.deref_aliases)?;
        writer.write_integer(self.size_limit)?;
        writer.write_integer(self.time_limit)?;
        writer.write_boolean(self.types_only)?;
        writer.write_raw(&self.filter)?;

        writer.write_header(TAG_SEQUENCE, self.attributes_length())?;
        for attribute in &self.attributes {
            writer.write_string(attribute)?;
        }
        Ok(())
    }

    fn decode(reader: &mut BerReader<'_>, _end: usize) -> Result<Self, DecodeError> {
        let base_object = reader.read_string()?;

        let scope_offset = reader.offset();
        let scope = SearchScope::from_wire(reader.read_enumerated()?, scope_offset)?;
        let deref_aliases = reader.read_enumerated()?;
        let size_limit = reader.read_integer()?;
        let time_limit = reader.read_integer()?;
        let types_only = reader.read_boolean()?;
        let filter = reader.read_raw_tlv()?.to_vec();

        let attrs_end = reader.read_sequence()?;
        let mut attributes = Vec::new();
        while reader.offset() < attrs_end {
            attributes.push(reader.read_string()?);
        }

        Ok(SearchRequest {
            base_object,
            scope,
            deref_aliases,
            size_limit,
            time_limit,
            types_only,
            filter,
            attributes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchResultEntry {
    pub object_name: String,
    pub attributes: Vec<Attribute>,
}

impl SearchResultEntry {
    fn content_length(&self) -> usize {
        tlv_octets(self.object_name.len()) + tlv_octets(attribute_list_length(&self.attributes))
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        writer.write_string(&self.object_name)?;
        encode_attribute_list(&self.attributes, writer)
    }

    fn decode(reader: &mut BerReader<'_>, _end: usize) -> Result<Self, DecodeError> {
        let object_name = reader.read_string()?;
        let attributes = decode_attribute_list(reader)?;
        Ok(SearchResultEntry {
            object_name,
            attributes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchResultDone {
    pub result: LdapResult,
}

#[derive(Debug, Clone)]
pub struct ModifyRequest {
    pub object: String,
    pub changes: Vec<ModifyChange>,
}

#[derive(Debug, Clone)]
pub struct ModifyChange {
    pub operation: ModifyOperation,
    pub modification: Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOperation {
    Add = 0,
    Delete = 1,
    Replace = 2,
}

impl ModifyOperation {
    fn from_wire(value: u32, offset: usize) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(ModifyOperation::Add),
            1 => Ok(ModifyOperation::Delete),
            2 => Ok(ModifyOperation::Replace),
            other => Err(DecodeError::Invalid {
                offset,
                reason: format!("invalid modify operation {other}"),
            }),
        }
    }
}

impl ModifyChange {
    fn content_length(&self) -> usize {
        3 + tlv_octets(attribute_content_length(&self.modification))
    }

    fn tlv_length(&self) -> usize {
        tlv_octets(self.content_length())
    }
}

impl ModifyRequest {
    fn changes_length(&self) -> usize {
        self.changes.iter().map(ModifyChange::tlv_length).sum()
    }

    fn content_length(&self) -> usize {
        tlv_octets(self.object.len()) + tlv_octets(self.changes_length())
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        writer.write_string(&self.object)?;
        writer.write_header(TAG_SEQUENCE, self.changes_length())?;

        for change in &self.changes {
            writer.write_header(TAG_SEQUENCE, change.content_length())?;
            writer.write_enumerated(change.operation as u32)?;
            encode_attribute(&change.modification, writer)?;
        }
        Ok(())
    }

    fn decode(reader: &mut BerReader<'_>, _end: usize) -> Result<Self, DecodeError> {
        let object = reader.read_string()?;

        let changes_end = reader.read_sequence()?;
        let mut changes = Vec::new();
        while reader.offset() < changes_end {
            reader.read_sequence()?;
            let op_offset = reader.offset();
            let operation = ModifyOperation::from_wire(reader.read_enumerated()?, op_offset)?;
            let modification = decode_attribute(reader)?;
            changes.push(ModifyChange {
                operation,
                modification,
            });
        }

        Ok(ModifyRequest { object, changes })
    }
}

#[derive(Debug, Clone)]
pub struct ModifyResponse {
    pub result: LdapResult,
}

/// Carries a whole model [`Entry`]; the decoder reconstructs it
/// schema-agnostically, leaving schema application to the receiver.
#[derive(Debug, Clone)]
pub struct AddRequest {
    pub entry: Entry,
}

impl AddRequest {
    fn content_length(&self) -> usize {
        let attributes: Vec<&Attribute> = self.entry.iter().collect();
        let list: usize = attributes
            .iter()
            .map(|a| tlv_octets(attribute_content_length(a)))
            .sum();
        tlv_octets(self.entry.dn().name().len()) + tlv_octets(list)
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        writer.write_string(self.entry.dn().name())?;

        let list: usize = self
            .entry
            .iter()
            .map(|a| tlv_octets(attribute_content_length(a)))
            .sum();
        writer.write_header(TAG_SEQUENCE, list)?;
        for attribute in self.entry.iter() {
            encode_attribute(attribute, writer)?;
        }
        Ok(())
    }

    fn decode(reader: &mut BerReader<'_>, _end: usize) -> Result<Self, DecodeError> {
        let dn_offset = reader.offset();
        let dn = reader.read_string()?;
        let attributes = decode_attribute_list(reader)?;

        let mut entry = Entry::with_dn(dn.as_str());
        entry
            .add_attributes(attributes)
            .map_err(|err| DecodeError::Invalid {
                offset: dn_offset,
                reason: err.to_string(),
            })?;

        Ok(AddRequest { entry })
    }
}

#[derive(Debug, Clone)]
pub struct AddResponse {
    pub result: LdapResult,
}

/// The Dn is the operation's entire content, carried directly in the
/// application tag with no inner TLV.
#[derive(Debug, Clone)]
pub struct DelRequest {
    pub dn: String,
}

impl DelRequest {
    fn decode(reader: &mut BerReader<'_>, end: usize) -> Result<Self, DecodeError> {
        let offset = reader.offset();
        let bytes = reader.read_raw(end - offset)?;
        let dn = String::from_utf8(bytes.to_vec())
            .map_err(|_| DecodeError::InvalidUtf8 { offset })?;
        Ok(DelRequest { dn })
    }
}

#[derive(Debug, Clone)]
pub struct DelResponse {
    pub result: LdapResult,
}

#[derive(Debug, Clone)]
pub struct ModifyDnRequest {
    pub entry: String,
    pub new_rdn: String,
    pub delete_old_rdn: bool,
    pub new_superior: Option<String>,
}

impl ModifyDnRequest {
    fn content_length(&self) -> usize {
        tlv_octets(self.entry.len())
            + tlv_octets(self.new_rdn.len())
            + 3
            + self.new_superior.as_ref().map_or(0, |s| tlv_octets(s.len()))
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        writer.write_string(&self.entry)?;
        writer.write_string(&self.new_rdn)?;
        writer.write_boolean(self.delete_old_rdn)?;
        if let Some(superior) = &self.new_superior {
            writer.write_tagged_octet_string(TAG_NEW_SUPERIOR, superior.as_bytes())?;
        }
        Ok(())
    }

    fn decode(reader: &mut BerReader<'_>, end: usize) -> Result<Self, DecodeError> {
        let entry = reader.read_string()?;
        let new_rdn = reader.read_string()?;
        let delete_old_rdn = reader.read_boolean()?;
        let new_superior = if reader.offset() < end {
            Some(reader.read_tagged_string(TAG_NEW_SUPERIOR)?)
        } else {
            None
        };
        Ok(ModifyDnRequest {
            entry,
            new_rdn,
            delete_old_rdn,
            new_superior,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ModifyDnResponse {
    pub result: LdapResult,
}

#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub entry: String,
    pub attribute_desc: String,
    pub assertion_value: Vec<u8>,
}

impl CompareRequest {
    fn ava_length(&self) -> usize {
        tlv_octets(self.attribute_desc.len()) + tlv_octets(self.assertion_value.len())
    }

    fn content_length(&self) -> usize {
        tlv_octets(self.entry.len()) + tlv_octets(self.ava_length())
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        writer.write_string(&self.entry)?;
        writer.write_header(TAG_SEQUENCE, self.ava_length())?;
        writer.write_string(&self.attribute_desc)?;
        writer.write_octet_string(&self.assertion_value)
    }

    fn decode(reader: &mut BerReader<'_>, _end: usize) -> Result<Self, DecodeError> {
        let entry = reader.read_string()?;
        reader.read_sequence()?;
        let attribute_desc = reader.read_string()?;
        let assertion_value = reader.read_octet_string()?.to_vec();
        Ok(CompareRequest {
            entry,
            attribute_desc,
            assertion_value,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompareResponse {
    pub result: LdapResult,
}

#[derive(Debug, Clone)]
pub struct ExtendedRequest {
    pub request_name: String,
    pub request_value: Option<Vec<u8>>,
}

impl ExtendedRequest {
    fn content_length(&self) -> usize {
        tlv_octets(self.request_name.len())
            + self.request_value.as_ref().map_or(0, |v| tlv_octets(v.len()))
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        writer.write_tagged_octet_string(TAG_EXTENDED_REQUEST_NAME, self.request_name.as_bytes())?;
        if let Some(value) = &self.request_value {
            writer.write_tagged_octet_string(TAG_EXTENDED_REQUEST_VALUE, value)?;
        }
        Ok(())
    }

    fn decode(reader: &mut BerReader<'_>, end: usize) -> Result<Self, DecodeError> {
        let request_name = reader.read_tagged_string(TAG_EXTENDED_REQUEST_NAME)?;
        let request_value = if reader.offset() < end {
            Some(
                reader
                    .read_tagged_octet_string(TAG_EXTENDED_REQUEST_VALUE)?
                    .to_vec(),
            )
        } else {
            None
        };
        Ok(ExtendedRequest {
            request_name,
            request_value,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExtendedResponse {
    pub result: LdapResult,
    pub response_name: Option<String>,
    pub response_value: Option<Vec<u8>>,
}

impl ExtendedResponse {
    fn content_length(&self) -> usize {
        self.result.encoded_length()
            + self.response_name.as_ref().map_or(0, |n| tlv_octets(n.len()))
            + self.response_value.as_ref().map_or(0, |v| tlv_octets(v.len()))
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        self.result.encode(writer)?;
        if let Some(name) = &self.response_name {
            writer.write_tagged_octet_string(TAG_EXTENDED_RESPONSE_NAME, name.as_bytes())?;
        }
        if let Some(value) = &self.response_value {
            writer.write_tagged_octet_string(TAG_EXTENDED_RESPONSE_VALUE, value)?;
        }
        Ok(())
    }

    fn decode(reader: &mut BerReader<'_>, end: usize) -> Result<Self, DecodeError> {
        let result = LdapResult::decode(reader, end)?;

        let mut response_name = None;
        let mut response_value = None;
        if reader.offset() < end && reader.peek_tag()? == TAG_EXTENDED_RESPONSE_NAME {
            response_name = Some(reader.read_tagged_string(TAG_EXTENDED_RESPONSE_NAME)?);
        }
        if reader.offset() < end && reader.peek_tag()? == TAG_EXTENDED_RESPONSE_VALUE {
            response_value = Some(
                reader
                    .read_tagged_octet_string(TAG_EXTENDED_RESPONSE_VALUE)?
                    .to_vec(),
            );
        }

        Ok(ExtendedResponse {
            result,
            response_name,
            response_value,
        })
    }
}

#[derive(Debug, Clone)]
pub struct IntermediateResponse {
    pub response_name: Option<String>,
    pub response_value: Option<Vec<u8>>,
}

impl IntermediateResponse {
    fn content_length(&self) -> usize {
        self.response_name.as_ref().map_or(0, |n| tlv_octets(n.len()))
            + self.response_value.as_ref().map_or(0, |v| tlv_octets(v.len()))
    }

    fn encode_content(&self, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
        if let Some(name) = &self.response_name {
            writer.write_tagged_octet_string(TAG_INTERMEDIATE_NAME, name.as_bytes())?;
        }
        if let Some(value) = &self.response_value {
            writer.write_tagged_octet_string(TAG_INTERMEDIATE_VALUE, value)?;
        }
        Ok(())
    }

    fn decode(reader: &mut BerReader<'_>, end: usize) -> Result<Self, DecodeError> {
        let mut response_name = None;
        let mut response_value = None;

        if reader.offset() < end && reader.peek_tag()? == TAG_INTERMEDIATE_NAME {
            response_name = Some(reader.read_tagged_string(TAG_INTERMEDIATE_NAME)?);
        }
        if reader.offset() < end && reader.peek_tag()? == TAG_INTERMEDIATE_VALUE {
            response_value = Some(
                reader
                    .read_tagged_octet_string(TAG_INTERMEDIATE_VALUE)?
                    .to_vec(),
            );
        }

        Ok(IntermediateResponse {
            response_name,
            response_value,
        })
    }
}

// PartialAttribute codec shared by add, modify and search-result-entry.

fn value_wire_length(value: &Value) -> usize {
    tlv_octets(value.as_bytes().map_or(0, <[u8]>::len))
}

fn attribute_content_length(attribute: &Attribute) -> usize {
    let values: usize = attribute.iter().map(value_wire_length).sum();
    tlv_octets(attribute.up_id().len()) + tlv_octets(values)
}

fn attribute_list_length(attributes: &[Attribute]) -> usize {
    attributes
        .iter()
        .map(|a| tlv_octets(attribute_content_length(a)))
        .sum()
}

fn encode_attribute(attribute: &Attribute, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
    writer.write_header(TAG_SEQUENCE, attribute_content_length(attribute))?;
    writer.write_string(attribute.up_id())?;

    let values: usize = attribute.iter().map(value_wire_length).sum();
    writer.write_header(TAG_SET, values)?;
    for value in attribute {
        writer.write_octet_string(value.as_bytes().unwrap_or(b""))?;
    }
    Ok(())
}

fn encode_attribute_list(
    attributes: &[Attribute],
    writer: &mut BerWriter<'_>,
) -> Result<(), EncodeError> {
    writer.write_header(TAG_SEQUENCE, attribute_list_length(attributes))?;
    for attribute in attributes {
        encode_attribute(attribute, writer)?;
    }
    Ok(())
}

fn decode_attribute(reader: &mut BerReader<'_>) -> Result<Attribute, DecodeError> {
    reader.read_sequence()?;
    let id_offset = reader.offset();
    let up_id = reader.read_string()?;

    let values_end = reader.read_set()?;
    let mut values = Vec::new();
    while reader.offset() < values_end {
        let bytes = reader.read_octet_string()?;
        values.push(value_from_wire(bytes));
    }

    Attribute::with_values(&up_id, values).map_err(|err| DecodeError::Invalid {
        offset: id_offset,
        reason: err.to_string(),
    })
}

fn decode_attribute_list(reader: &mut BerReader<'_>) -> Result<Vec<Attribute>, DecodeError> {
    let end = reader.read_sequence()?;
    let mut attributes = Vec::new();
    while reader.offset() < end {
        attributes.push(decode_attribute(reader)?);
    }
    Ok(attributes)
}

/// Wire octets become a text value when they hold valid UTF-8, a binary one
/// otherwise.
fn value_from_wire(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(s) => Value::text(s),
        Err(_) => Value::binary(bytes.to_vec()),
    }
}

// Control codec.

fn control_content_length(control: &Control) -> usize {
    tlv_octets(control.control_type.len())
        + if control.criticality { 3 } else { 0 }
        + control.value.as_ref().map_or(0, |v| tlv_octets(v.len()))
}

fn controls_length(controls: &[Control]) -> usize {
    controls
        .iter()
        .map(|c| tlv_octets(control_content_length(c)))
        .sum()
}

fn encode_control(control: &Control, writer: &mut BerWriter<'_>) -> Result<(), EncodeError> {
    writer.write_header(TAG_SEQUENCE, control_content_length(control))?;
    writer.write_string(&control.control_type)?;
    // criticality FALSE is the default and is omitted from the wire
    if control.criticality {
        writer.write_boolean(true)?;
    }
    if let Some(value) = &control.value {
        writer.write_octet_string(value)?;
    }
    Ok(())
}

fn decode_control(reader: &mut BerReader<'_>) -> Result<Control, DecodeError> {
    let end = reader.read_sequence()?;
    let control_type = reader.read_string()?;

    let mut criticality = false;
    let mut value = None;

    if reader.offset() < end && reader.peek_tag()? == crate::ber::TAG_BOOLEAN {
        criticality = reader.read_boolean()?;
    }
    if reader.offset() < end {
        value = Some(reader.read_octet_string()?.to_vec());
    }

    Ok(Control {
        control_type,
        criticality,
        value,
    })
}

/// Encode a full message in one allocation.
pub fn encode_message(message: &LdapMessage) -> Result<Vec<u8>, EncodeError> {
    let op_content = message.protocol_op.content_length();
    let controls_content = controls_length(&message.controls);

    let mut content = tlv_octets(integer_octets(message.message_id)) + tlv_octets(op_content);
    if !message.controls.is_empty() {
        content += tlv_octets(controls_content);
    }

    let mut buf = vec![0u8; tlv_octets(content)];
    let mut writer = BerWriter::new(&mut buf);

    writer.write_header(TAG_SEQUENCE, content)?;
    writer.write_integer(message.message_id)?;
    writer.write_header(message.protocol_op.tag(), op_content)?;
    message.protocol_op.encode_content(&mut writer)?;

    if !message.controls.is_empty() {
        writer.write_header(TAG_CONTROLS, controls_content)?;
        for control in &message.controls {
            encode_control(control, &mut writer)?;
        }
    }

    debug_assert_eq!(writer.position(), buf.len());
    Ok(buf)
}

/// Peek at the envelope without decoding the operation: message id and the
/// operation tag. Enough for routing and logging.
pub fn parse_message_header(data: &[u8]) -> Result<(i32, u8), DecodeError> {
    let mut reader = BerReader::new(data);
    reader.read_sequence()?;
    let message_id = reader.read_integer()?;
    let tag = reader.peek_tag()?;
    Ok((message_id, tag))
}

/// Decode a complete message. The buffer must hold exactly one PDU;
/// trailing bytes, outside or inside the declared lengths, are rejected.
pub fn parse_message(data: &[u8], config: &CodecConfig) -> Result<LdapMessage, DecodeError> {
    if data.len() > config.max_pdu_size {
        return Err(DecodeError::PduTooLarge {
            size: data.len(),
            limit: config.max_pdu_size,
        });
    }

    let mut reader = BerReader::with_max_length_octets(data, config.max_length_octets);
    let message_end = reader.read_sequence()?;
    let message_id = reader.read_integer()?;

    let tag_offset = reader.offset();
    let tag = reader.read_tag()?;
    let len = reader.read_length()?;
    let op_end = reader.offset() + len;

    let protocol_op = match tag {
        TAG_BIND_REQUEST => ProtocolOp::BindRequest(BindRequest::decode(&mut reader, op_end)?),
        TAG_BIND_RESPONSE => ProtocolOp::BindResponse(BindResponse::decode(&mut reader, op_end)?),
        TAG_UNBIND_REQUEST => {
            reader.skip(len)?;
            ProtocolOp::UnbindRequest
        }
        TAG_SEARCH_REQUEST => {
            ProtocolOp::SearchRequest(SearchRequest::decode(&mut reader, op_end)?)
        }
        TAG_SEARCH_RESULT_ENTRY => {
            ProtocolOp::SearchResultEntry(SearchResultEntry::decode(&mut reader, op_end)?)
        }
        TAG_SEARCH_RESULT_DONE => ProtocolOp::SearchResultDone(SearchResultDone {
            result: LdapResult::decode(&mut reader, op_end)?,
        }),
        TAG_MODIFY_REQUEST => {
            ProtocolOp::ModifyRequest(ModifyRequest::decode(&mut reader, op_end)?)
        }
        TAG_MODIFY_RESPONSE => ProtocolOp::ModifyResponse(ModifyResponse {
            result: LdapResult::decode(&mut reader, op_end)?,
        }),
        TAG_ADD_REQUEST => ProtocolOp::AddRequest(AddRequest::decode(&mut reader, op_end)?),
        TAG_ADD_RESPONSE => ProtocolOp::AddResponse(AddResponse {
            result: LdapResult::decode(&mut reader, op_end)?,
        }),
        TAG_DEL_REQUEST => ProtocolOp::DelRequest(DelRequest::decode(&mut reader, op_end)?),
        TAG_DEL_RESPONSE => ProtocolOp::DelResponse(DelResponse {
            result: LdapResult::decode(&mut reader, op_end)?,
        }),
        TAG_MODIFY_DN_REQUEST => {
            ProtocolOp::ModifyDnRequest(ModifyDnRequest::decode(&mut reader, op_end)?)
        }
        TAG_MODIFY_DN_RESPONSE => ProtocolOp::ModifyDnResponse(ModifyDnResponse {
            result: LdapResult::decode(&mut reader, op_end)?,
        }),
        TAG_COMPARE_REQUEST => {
            ProtocolOp::CompareRequest(CompareRequest::decode(&mut reader, op_end)?)
        }
        TAG_COMPARE_RESPONSE => ProtocolOp::CompareResponse(CompareResponse {
            result: LdapResult::decode(&mut reader, op_end)?,
        }),
        TAG_EXTENDED_REQUEST => {
            ProtocolOp::ExtendedRequest(ExtendedRequest::decode(&mut reader, op_end)?)
        }
        TAG_EXTENDED_RESPONSE => {
            ProtocolOp::ExtendedResponse(ExtendedResponse::decode(&mut reader, op_end)?)
        }
        TAG_INTERMEDIATE_RESPONSE => {
            ProtocolOp::IntermediateResponse(IntermediateResponse::decode(&mut reader, op_end)?)
        }
        other => {
            return Err(DecodeError::UnsupportedTag {
                offset: tag_offset,
                tag: other,
            })
        }
    };

    // every operation must consume exactly its declared length; bytes
    // smuggled inside the op TLV are an error, not padding
    if reader.offset() != op_end {
        return Err(DecodeError::Invalid {
            offset: reader.offset(),
            reason: format!("operation content does not end at declared offset {op_end}"),
        });
    }

    let mut controls = Vec::new();
    if reader.offset() < message_end && reader.peek_tag()? == TAG_CONTROLS {
        let controls_end = reader.read_element(TAG_CONTROLS)?;
        while reader.offset() < controls_end {
            controls.push(decode_control(&mut reader)?);
        }
    }

    if reader.offset() != message_end || reader.remaining() != 0 {
        return Err(DecodeError::Invalid {
            offset: reader.offset(),
            reason: "trailing bytes after message".to_string(),
        });
    }

    Ok(LdapMessage {
        message_id,
        protocol_op,
        controls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ResultCode;

    fn round_trip(message: &LdapMessage) -> LdapMessage {
        let encoded = encode_message(message).unwrap();
        parse_message(&encoded, &CodecConfig::default()).unwrap()
    }

    #[test]
    fn test_bind_request_simple_round_trip() {
        let message = LdapMessage::new(
            1,
            ProtocolOp::BindRequest(BindRequest {
                version: 3,
                name: "cn=admin,dc=example".to_string(),
                authentication: BindAuthentication::Simple("secret".to_string()),
            }),
        );

        let decoded = round_trip(&message);
        assert_eq!(decoded.message_id, 1);
        let ProtocolOp::BindRequest(bind) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(bind.version, 3);
        assert_eq!(bind.name, "cn=admin,dc=example");
        let BindAuthentication::Simple(password) = bind.authentication else {
            panic!("wrong auth");
        };
        assert_eq!(password, "secret");
    }

    #[test]
    fn test_bind_request_sasl_round_trip() {
        let message = LdapMessage::new(
            1,
            ProtocolOp::BindRequest(BindRequest {
                version: 3,
                name: String::new(),
                authentication: BindAuthentication::Sasl {
                    mechanism: "EXTERNAL".to_string(),
                    credentials: Some(vec![0x01, 0x02]),
                },
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::BindRequest(bind) = decoded.protocol_op else {
            panic!("wrong op");
        };
        let BindAuthentication::Sasl {
            mechanism,
            credentials,
        } = bind.authentication
        else {
            panic!("wrong auth");
        };
        assert_eq!(mechanism, "EXTERNAL");
        assert_eq!(credentials, Some(vec![0x01, 0x02]));
    }

    #[test]
    fn test_bind_response_with_sasl_creds() {
        let message = LdapMessage::new(
            1,
            ProtocolOp::BindResponse(BindResponse {
                result: LdapResult::new(ResultCode::SaslBindInProgress),
                server_sasl_creds: Some(b"challenge".to_vec()),
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::BindResponse(bind) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(bind.result.result_code, ResultCode::SaslBindInProgress);
        assert_eq!(bind.server_sasl_creds, Some(b"challenge".to_vec()));
    }

    #[test]
    fn test_unbind_round_trip() {
        let decoded = round_trip(&LdapMessage::new(7, ProtocolOp::UnbindRequest));
        assert_eq!(decoded.message_id, 7);
        assert!(matches!(decoded.protocol_op, ProtocolOp::UnbindRequest));
    }

    #[test]
    fn test_search_request_round_trip() {
        // present filter: (objectClass=*)
        let filter = {
            let mut f = vec![0x87, 0x0B];
            f.extend_from_slice(b"objectClass");
            f
        };

        let message = LdapMessage::new(
            2,
            ProtocolOp::SearchRequest(SearchRequest {
                base_object: "dc=example".to_string(),
                scope: SearchScope::WholeSubtree,
                deref_aliases: 0,
                size_limit: 100,
                time_limit: 30,
                types_only: false,
                filter: filter.clone(),
                attributes: vec!["cn".to_string(), "sn".to_string()],
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::SearchRequest(search) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(search.base_object, "dc=example");
        assert_eq!(search.scope, SearchScope::WholeSubtree);
        assert_eq!(search.size_limit, 100);
        assert_eq!(search.filter, filter);
        assert_eq!(search.attributes, vec!["cn", "sn"]);
    }

    #[test]
    fn test_search_result_entry_round_trip() {
        let mut cn = Attribute::new("cn").unwrap();
        cn.add_str(&["test"]);
        let mut cert = Attribute::new("userCertificate").unwrap();
        cert.add_binary(&[&[0xFF, 0x00, 0x01]]);

        let message = LdapMessage::new(
            2,
            ProtocolOp::SearchResultEntry(SearchResultEntry {
                object_name: "cn=test,dc=example".to_string(),
                attributes: vec![cn, cert],
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::SearchResultEntry(entry) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(entry.object_name, "cn=test,dc=example");
        assert_eq!(entry.attributes.len(), 2);
        assert!(entry.attributes[0].contains_str("test"));
        // non-UTF-8 payload comes back binary
        assert!(entry.attributes[1].has_binary_value());
    }

    #[test]
    fn test_add_request_carries_model_entry() {
        let mut entry = Entry::with_dn("cn=new,dc=example");
        entry.add_str("objectClass", &["top", "person"]).unwrap();
        entry.add_str("cn", &["new"]).unwrap();

        let message = LdapMessage::new(3, ProtocolOp::AddRequest(AddRequest { entry }));

        let decoded = round_trip(&message);
        let ProtocolOp::AddRequest(add) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(add.entry.dn().name(), "cn=new,dc=example");
        assert_eq!(add.entry.len(), 2);
        assert!(add.entry.contains_str("cn", "new"));
        assert!(add.entry.has_object_class("person"));
    }

    #[test]
    fn test_modify_request_round_trip() {
        let mut replacement = Attribute::new("mail").unwrap();
        replacement.add_str(&["new@example.com"]);
        let delete = Attribute::new("telephoneNumber").unwrap();

        let message = LdapMessage::new(
            4,
            ProtocolOp::ModifyRequest(ModifyRequest {
                object: "cn=test,dc=example".to_string(),
                changes: vec![
                    ModifyChange {
                        operation: ModifyOperation::Replace,
                        modification: replacement,
                    },
                    ModifyChange {
                        operation: ModifyOperation::Delete,
                        modification: delete,
                    },
                ],
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::ModifyRequest(modify) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(modify.object, "cn=test,dc=example");
        assert_eq!(modify.changes.len(), 2);
        assert_eq!(modify.changes[0].operation, ModifyOperation::Replace);
        assert!(modify.changes[0].modification.contains_str("new@example.com"));
        assert_eq!(modify.changes[1].operation, ModifyOperation::Delete);
        assert!(modify.changes[1].modification.is_empty());
    }

    #[test]
    fn test_del_request_round_trip() {
        let message = LdapMessage::new(
            5,
            ProtocolOp::DelRequest(DelRequest {
                dn: "cn=gone,dc=example".to_string(),
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::DelRequest(del) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(del.dn, "cn=gone,dc=example");
    }

    #[test]
    fn test_modify_dn_response_known_bytes() {
        let message = LdapMessage::new(
            2,
            ProtocolOp::ModifyDnResponse(ModifyDnResponse {
                result: LdapResult::success(),
            }),
        );

        let encoded = encode_message(&message).unwrap();
        assert_eq!(
            encoded,
            vec![
                0x30, 0x0C, // LDAPMessage SEQUENCE
                0x02, 0x01, 0x02, // messageID 2
                0x6D, 0x07, // ModifyDnResponse
                0x0A, 0x01, 0x00, // resultCode success
                0x04, 0x00, // matchedDN
                0x04, 0x00, // diagnosticMessage
            ]
        );

        let decoded = parse_message(&encoded, &CodecConfig::default()).unwrap();
        assert_eq!(decoded.message_id, 2);
        let ProtocolOp::ModifyDnResponse(response) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(response.result.result_code, ResultCode::Success);
    }

    #[test]
    fn test_modify_dn_request_round_trip() {
        let message = LdapMessage::new(
            6,
            ProtocolOp::ModifyDnRequest(ModifyDnRequest {
                entry: "cn=old,dc=example".to_string(),
                new_rdn: "cn=new".to_string(),
                delete_old_rdn: true,
                new_superior: Some("ou=people,dc=example".to_string()),
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::ModifyDnRequest(request) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(request.entry, "cn=old,dc=example");
        assert_eq!(request.new_rdn, "cn=new");
        assert!(request.delete_old_rdn);
        assert_eq!(request.new_superior.as_deref(), Some("ou=people,dc=example"));
    }

    #[test]
    fn test_compare_round_trip() {
        let message = LdapMessage::new(
            8,
            ProtocolOp::CompareRequest(CompareRequest {
                entry: "cn=test,dc=example".to_string(),
                attribute_desc: "cn".to_string(),
                assertion_value: b"test".to_vec(),
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::CompareRequest(compare) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(compare.attribute_desc, "cn");
        assert_eq!(compare.assertion_value, b"test");
    }

    #[test]
    fn test_extended_round_trip() {
        let message = LdapMessage::new(
            9,
            ProtocolOp::ExtendedResponse(ExtendedResponse {
                result: LdapResult::success(),
                response_name: Some("1.3.6.1.4.1.1466.20037".to_string()),
                response_value: Some(vec![0xDE, 0xAD]),
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::ExtendedResponse(response) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(
            response.response_name.as_deref(),
            Some("1.3.6.1.4.1.1466.20037")
        );
        assert_eq!(response.response_value, Some(vec![0xDE, 0xAD]));
    }

    #[test]
    fn test_intermediate_response_round_trip() {
        let message = LdapMessage::new(
            10,
            ProtocolOp::IntermediateResponse(IntermediateResponse {
                response_name: Some("1.3.6.1.4.1.4203.1.9.1.4".to_string()),
                response_value: None,
            }),
        );

        let decoded = round_trip(&message);
        let ProtocolOp::IntermediateResponse(response) = decoded.protocol_op else {
            panic!("wrong op");
        };
        assert_eq!(
            response.response_name.as_deref(),
            Some("1.3.6.1.4.1.4203.1.9.1.4")
        );
        assert!(response.response_value.is_none());
    }

    #[test]
    fn test_controls_round_trip() {
        let mut message = LdapMessage::new(11, ProtocolOp::UnbindRequest);
        message.controls = vec![
            Control {
                control_type: "1.2.840.113556.1.4.319".to_string(),
                criticality: true,
                value: Some(vec![0x30, 0x00]),
            },
            Control {
                control_type: "2.16.840.1.113730.3.4.2".to_string(),
                criticality: false,
                value: None,
            },
        ];

        let decoded = round_trip(&message);
        assert_eq!(decoded.controls.len(), 2);
        assert!(decoded.controls[0].criticality);
        assert_eq!(decoded.controls[0].value, Some(vec![0x30, 0x00]));
        assert!(!decoded.controls[1].criticality);
        assert!(decoded.controls[1].value.is_none());
    }

    #[test]
    fn test_parse_message_header() {
        let message = LdapMessage::new(42, ProtocolOp::UnbindRequest);
        let encoded = encode_message(&message).unwrap();
        let (message_id, tag) = parse_message_header(&encoded).unwrap();
        assert_eq!(message_id, 42);
        assert_eq!(tag, TAG_UNBIND_REQUEST);
    }

    #[test]
    fn test_unsupported_tag_rejected() {
        // envelope wrapping an unknown application tag 0x7F
        let data = [0x30, 0x05, 0x02, 0x01, 0x01, 0x7F, 0x00];
        let err = parse_message(&data, &CodecConfig::default()).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedTag { offset: 5, tag: 0x7F });
    }

    #[test]
    fn test_pdu_size_limit() {
        let config = CodecConfig {
            max_pdu_size: 8,
            ..CodecConfig::default()
        };
        let message = LdapMessage::new(
            1,
            ProtocolOp::DelRequest(DelRequest {
                dn: "cn=way-too-long,dc=example".to_string(),
            }),
        );
        let encoded = encode_message(&message).unwrap();
        let err = parse_message(&encoded, &config).unwrap_err();
        assert!(matches!(err, DecodeError::PduTooLarge { limit: 8, .. }));
    }

    #[test]
    fn test_length_octets_limit() {
        let message = LdapMessage::new(
            1,
            ProtocolOp::DelRequest(DelRequest {
                dn: format!("cn={},dc=example", "x".repeat(200)),
            }),
        );
        let encoded = encode_message(&message).unwrap();

        // the envelope length needs long form, fine under the default limit
        assert!(parse_message(&encoded, &CodecConfig::default()).is_ok());

        let config = CodecConfig {
            max_length_octets: 0,
            ..CodecConfig::default()
        };
        let err = parse_message(&encoded, &config).unwrap_err();
        assert!(matches!(err, DecodeError::LengthTooLong { max: 0, .. }));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let message = LdapMessage::new(1, ProtocolOp::UnbindRequest);
        let mut encoded = encode_message(&message).unwrap();
        encoded.push(0x00);

        let err = parse_message(&encoded, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { .. }));
    }

    #[test]
    fn test_op_length_must_be_consumed_exactly() {
        // ModifyDnResponse whose op length claims one byte more than the
        // result components occupy
        let data = [
            0x30, 0x0D, // LDAPMessage SEQUENCE
            0x02, 0x01, 0x02, // messageID 2
            0x6D, 0x08, // ModifyDnResponse, one byte oversized
            0x0A, 0x01, 0x00, // resultCode success
            0x04, 0x00, // matchedDN
            0x04, 0x00, // diagnosticMessage
            0x00, // smuggled byte
        ];
        let err = parse_message(&data, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { offset: 14, .. }));
    }

    #[test]
    fn test_truncated_message() {
        let message = LdapMessage::new(
            1,
            ProtocolOp::DelRequest(DelRequest {
                dn: "cn=x".to_string(),
            }),
        );
        let encoded = encode_message(&message).unwrap();
        let err = parse_message(&encoded[..encoded.len() - 2], &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }
}
