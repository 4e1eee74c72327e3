use serde::{Deserialize, Serialize};

use super::*;

// frame structure : header(1) + code(1) + message id(2) + [option(1) + path] + [marker(1) + payload]

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u16);

impl MessageId {
    pub fn next(self) -> Self {
        MessageId(self.0.wrapping_add(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get = 0x01,
    Put = 0x03,
}

impl TryFrom<u8> for Method {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Method::Get),
            0x03 => Ok(Method::Put),
            _ => Err(value),
        }
    }
}

impl core::fmt::Display for Method {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Put => f.write_str("PUT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Confirmable = 0,
    NonConfirmable = 1,
    Acknowledgement = 2,
    Reset = 3,
}

impl MessageType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgement,
            _ => MessageType::Reset,
        }
    }
}

/// Response codes, `class << 5 | detail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Changed = 0x44,
    Content = 0x45,
    BadRequest = 0x80,
    Forbidden = 0x83,
    NotFound = 0x84,
}

/// An encoded datagram, at most `MAX_FRAME_SIZE` bytes.
#[derive(Clone)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_SIZE],
    len: usize,
}

impl Frame {
    fn encode(
        header: u8,
        code: u8,
        message_id: MessageId,
        path: &[u8],
        payload: &[u8],
    ) -> ParseResult<Self> {
        if path.len() > MAX_PATH_LEN {
            return Err(ProtocolError::FrameTooLarge {
                section: FrameSection::Path,
                size: path.len(),
                max: MAX_PATH_LEN,
            });
        }

        let path_len = if path.is_empty() { 0 } else { 1 + path.len() };
        let payload_len = if payload.is_empty() {
            0
        } else {
            1 + payload.len()
        };
        let total = FIXED_HEADER_SIZE + path_len + payload_len;

        if total > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                section: FrameSection::Frame,
                size: total,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut bytes = [0u8; MAX_FRAME_SIZE];
        bytes[0] = header;
        bytes[1] = code;
        bytes[2..4].copy_from_slice(&message_id.0.to_be_bytes());

        let mut pos = FIXED_HEADER_SIZE;

        if !path.is_empty() {
            bytes[pos] = (URI_PATH_OPTION << 4) | path.len() as u8;
            pos += 1;
            bytes[pos..pos + path.len()].copy_from_slice(path);
            pos += path.len();
        }

        if !payload.is_empty() {
            bytes[pos] = PAYLOAD_MARKER;
            pos += 1;
            bytes[pos..pos + payload.len()].copy_from_slice(payload);
            pos += payload.len();
        }

        Ok(Self { bytes, len: pos })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn message_id(&self) -> MessageId {
        MessageId(u16::from_be_bytes([self.bytes[2], self.bytes[3]]))
    }

    pub fn parse(bytes: &[u8]) -> ParseResult<ParsedFrame<'_>> {
        if bytes.len() < FIXED_HEADER_SIZE {
            return Err(ProtocolError::InsufficientData {
                needed: FIXED_HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let version = bytes[0] >> 6;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let kind = MessageType::from_bits(bytes[0] >> 4);
        let token_len = bytes[0] & 0x0F;
        if token_len > 8 {
            return Err(ProtocolError::InvalidTokenLength(token_len));
        }

        let code = bytes[1];
        let message_id = MessageId(u16::from_be_bytes([bytes[2], bytes[3]]));

        let mut pos = FIXED_HEADER_SIZE;
        let token = take(bytes, &mut pos, token_len as usize)?;

        let mut option_number = 0usize;
        let mut segments: Vec<&[u8]> = Vec::new();
        let mut payload: &[u8] = &[];

        while pos < bytes.len() {
            let option = bytes[pos];
            pos += 1;

            if option == PAYLOAD_MARKER {
                if pos == bytes.len() {
                    return Err(ProtocolError::EmptyPayload);
                }
                payload = &bytes[pos..];
                break;
            }

            let delta = read_extended(option >> 4, option, bytes, &mut pos)?;
            let length = read_extended(option & 0x0F, option, bytes, &mut pos)?;
            option_number += delta;

            let value = take(bytes, &mut pos, length)?;
            if option_number == URI_PATH_OPTION as usize {
                segments.push(value);
            }
        }

        let path = segments
            .iter()
            .map(|s| String::from_utf8_lossy(s))
            .collect::<Vec<_>>()
            .join("/");

        Ok(ParsedFrame {
            kind,
            code,
            message_id,
            token,
            path,
            payload,
        })
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("message_id", &self.message_id())
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> ParseResult<&'a [u8]> {
    let end = *pos + len;
    if end > bytes.len() {
        return Err(ProtocolError::InsufficientData {
            needed: end,
            available: bytes.len(),
        });
    }

    let value = &bytes[*pos..end];
    *pos = end;
    Ok(value)
}

fn read_extended(nibble: u8, option: u8, bytes: &[u8], pos: &mut usize) -> ParseResult<usize> {
    match nibble {
        0..=12 => Ok(nibble as usize),
        13 => {
            let ext = take(bytes, pos, 1)?;
            Ok(ext[0] as usize + 13)
        }
        14 => {
            let ext = take(bytes, pos, 2)?;
            Ok(u16::from_be_bytes([ext[0], ext[1]]) as usize + 269)
        }
        _ => Err(ProtocolError::InvalidOption(option)),
    }
}

/// A decoded frame borrowing its token and payload from the datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame<'a> {
    pub kind: MessageType,
    pub code: u8,
    pub message_id: MessageId,
    pub token: &'a [u8],
    /// Uri-Path segments joined with `/`.
    pub path: String,
    pub payload: &'a [u8],
}

impl ParsedFrame<'_> {
    pub fn method(&self) -> Option<Method> {
        Method::try_from(self.code).ok()
    }

    pub fn is_response(&self) -> bool {
        self.code >> 5 >= 2
    }
}

/// Hands out message ids and encodes requests.
///
/// Every call takes an id, including one whose request is rejected.
#[derive(Debug, Default)]
pub struct FrameBuilder {
    next_id: MessageId,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next_id: MessageId) -> Self {
        Self { next_id }
    }

    pub fn next_message_id(&self) -> MessageId {
        self.next_id
    }

    pub fn build(&mut self, method: Method, path: &str, payload: &[u8]) -> ParseResult<Frame> {
        let message_id = self.next_id;
        self.next_id = message_id.next();

        Frame::encode(
            HEADER_BYTE,
            method as u8,
            message_id,
            path.as_bytes(),
            payload,
        )
    }
}

/// Encode a response carrying no token and no options.
pub fn encode_response(
    kind: MessageType,
    code: ResponseCode,
    message_id: MessageId,
    payload: &[u8],
) -> ParseResult<Frame> {
    let header = (PROTOCOL_VERSION << 6) | ((kind as u8) << 4);
    Frame::encode(header, code as u8, message_id, &[], payload)
}
