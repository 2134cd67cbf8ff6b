//! Minimal STUN message codec (RFC 5389 framing, RFC 5766 Allocate).
//!
//! Only what the relay probe needs: encoding an unauthenticated Allocate
//! request and decoding the relay's answer far enough to read its class,
//! transaction id and ERROR-CODE.

use crate::error_handling::StunError;

pub const MAGIC_COOKIE: u32 = 0x2112_A442;
pub const HEADER_LEN: usize = 20;

pub const METHOD_ALLOCATE: u16 = 0x003;

pub const ATTR_ERROR_CODE: u16 = 0x0009;
pub const ATTR_REALM: u16 = 0x0014;
pub const ATTR_NONCE: u16 = 0x0015;
pub const ATTR_REQUESTED_TRANSPORT: u16 = 0x0019;

/// IANA protocol number for UDP, as carried in REQUESTED-TRANSPORT
const PROTOCOL_UDP: u8 = 17;

pub type TransactionId = [u8; 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Request,
    Indication,
    SuccessResponse,
    ErrorResponse,
}

impl MessageClass {
    fn bits(self) -> u16 {
        match self {
            MessageClass::Request => 0b00,
            MessageClass::Indication => 0b01,
            MessageClass::SuccessResponse => 0b10,
            MessageClass::ErrorResponse => 0b11,
        }
    }

    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b00 => MessageClass::Request,
            0b01 => MessageClass::Indication,
            0b10 => MessageClass::SuccessResponse,
            _ => MessageClass::ErrorResponse,
        }
    }
}

/// ERROR-CODE attribute contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: u16,
    pub reason: String,
}

/// A decoded STUN message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StunMessage {
    pub class: MessageClass,
    pub method: u16,
    pub transaction_id: TransactionId,
    pub error_code: Option<ErrorCode>,
    pub realm: Option<String>,
    pub nonce: Option<String>,
}

/// Fresh random transaction id.
pub fn new_transaction_id() -> TransactionId {
    rand::random()
}

/// Interleaves method and class bits into the 14-bit message type.
pub fn message_type(class: MessageClass, method: u16) -> u16 {
    let c = class.bits();
    (method & 0x000F)
        | ((method & 0x0070) << 1)
        | ((method & 0x0F80) << 2)
        | ((c & 0b01) << 4)
        | ((c & 0b10) << 7)
}

fn split_message_type(message_type: u16) -> (MessageClass, u16) {
    let class = ((message_type >> 4) & 0b01) | ((message_type >> 7) & 0b10);
    let method = (message_type & 0x000F)
        | ((message_type >> 1) & 0x0070)
        | ((message_type >> 2) & 0x0F80);
    (MessageClass::from_bits(class), method)
}

/// Encodes a message from already-encoded attribute values.
pub fn encode_message(
    class: MessageClass,
    method: u16,
    transaction_id: &TransactionId,
    attributes: &[(u16, Vec<u8>)],
) -> Vec<u8> {
    let body_len: usize = attributes
        .iter()
        .map(|(_, value)| 4 + padded_len(value.len()))
        .sum();

    let mut out = Vec::with_capacity(HEADER_LEN + body_len);
    out.extend_from_slice(&message_type(class, method).to_be_bytes());
    out.extend_from_slice(&(body_len as u16).to_be_bytes());
    out.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
    out.extend_from_slice(transaction_id);

    for (attr_type, value) in attributes {
        out.extend_from_slice(&attr_type.to_be_bytes());
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value);
        out.resize(out.len() + padded_len(value.len()) - value.len(), 0);
    }
    out
}

/// Unauthenticated Allocate request asking for a UDP relay.
pub fn encode_allocate_request(transaction_id: &TransactionId) -> Vec<u8> {
    encode_message(
        MessageClass::Request,
        METHOD_ALLOCATE,
        transaction_id,
        &[(ATTR_REQUESTED_TRANSPORT, vec![PROTOCOL_UDP, 0, 0, 0])],
    )
}

/// Allocate error response, as a relay sends it when challenging a client.
pub fn encode_allocate_error(
    transaction_id: &TransactionId,
    code: u16,
    reason: &str,
    realm: Option<&str>,
    nonce: Option<&str>,
) -> Vec<u8> {
    let mut error_value = vec![0, 0, (code / 100) as u8 & 0x07, (code % 100) as u8];
    error_value.extend_from_slice(reason.as_bytes());

    let mut attributes = vec![(ATTR_ERROR_CODE, error_value)];
    if let Some(realm) = realm {
        attributes.push((ATTR_REALM, realm.as_bytes().to_vec()));
    }
    if let Some(nonce) = nonce {
        attributes.push((ATTR_NONCE, nonce.as_bytes().to_vec()));
    }
    encode_message(
        MessageClass::ErrorResponse,
        METHOD_ALLOCATE,
        transaction_id,
        &attributes,
    )
}

/// Decodes a datagram into a STUN message.
///
/// Unknown attributes are skipped.
///
/// # Errors
///
/// Returns a `StunError` if the datagram is not a well-formed STUN message.
pub fn decode(buf: &[u8]) -> Result<StunMessage, StunError> {
    if buf.len() < HEADER_LEN {
        return Err(StunError::TooShort(buf.len()));
    }
    let message_type = u16::from_be_bytes([buf[0], buf[1]]);
    let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    // The two most significant bits of every STUN message are zero
    if cookie != MAGIC_COOKIE || message_type & 0xC000 != 0 {
        return Err(StunError::BadMagicCookie);
    }
    if HEADER_LEN + length > buf.len() {
        return Err(StunError::Truncated {
            declared: HEADER_LEN + length,
            available: buf.len(),
        });
    }

    let (class, method) = split_message_type(message_type);
    let mut transaction_id = [0u8; 12];
    transaction_id.copy_from_slice(&buf[8..HEADER_LEN]);

    let mut message = StunMessage {
        class,
        method,
        transaction_id,
        error_code: None,
        realm: None,
        nonce: None,
    };

    let body = &buf[HEADER_LEN..HEADER_LEN + length];
    let mut offset = 0;
    while offset + 4 <= body.len() {
        let attr_type = u16::from_be_bytes([body[offset], body[offset + 1]]);
        let attr_len = u16::from_be_bytes([body[offset + 2], body[offset + 3]]) as usize;
        let start = offset + 4;
        if start + attr_len > body.len() {
            return Err(StunError::Truncated {
                declared: start + attr_len,
                available: body.len(),
            });
        }
        let value = &body[start..start + attr_len];

        match attr_type {
            ATTR_ERROR_CODE if value.len() >= 4 => {
                let code = u16::from(value[2] & 0x07) * 100 + u16::from(value[3]);
                message.error_code = Some(ErrorCode {
                    code,
                    reason: String::from_utf8_lossy(&value[4..]).into_owned(),
                });
            }
            ATTR_REALM => message.realm = Some(String::from_utf8_lossy(value).into_owned()),
            ATTR_NONCE => message.nonce = Some(String::from_utf8_lossy(value).into_owned()),
            _ => {}
        }
        offset = start + padded_len(attr_len);
    }

    Ok(message)
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}
