use rkyv::api::high::{HighDeserializer, HighSerializer, HighValidator};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor::Error;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use crate::error::CodecError;
use crate::protocol::{Envelope, EventKind};

pub const FRAME_VERSION: u8 = 1;
pub const FRAME_HEADER_LEN: usize = 2;

pub fn encode<T>(value: &T) -> Result<Vec<u8>, CodecError>
where
    T: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, Error>>,
{
    Ok(rkyv::to_bytes::<Error>(value)?.into_vec())
}

pub fn decode<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: Archive,
    T::Archived:
        for<'a> CheckBytes<HighValidator<'a, Error>> + Deserialize<T, HighDeserializer<Error>>,
{
    // rkyv needs an aligned buffer; frame bodies start at an odd offset.
    let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    Ok(rkyv::from_bytes::<T, Error>(&aligned)?)
}

/// `[version][kind][rkyv envelope]`. The kind byte lets relays route
/// without decoding the body.
pub fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let body = encode(envelope)?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.push(FRAME_VERSION);
    frame.push(envelope.event.kind() as u8);
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn peek_kind(frame: &[u8]) -> Result<EventKind, CodecError> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(CodecError::Truncated(frame.len()));
    }
    if frame[0] != FRAME_VERSION {
        return Err(CodecError::Version {
            expected: FRAME_VERSION,
            found: frame[0],
        });
    }
    EventKind::from_u8(frame[1]).ok_or(CodecError::UnknownKind(frame[1]))
}

pub fn decode_frame(frame: &[u8]) -> Result<Envelope, CodecError> {
    let kind = peek_kind(frame)?;
    let envelope: Envelope = decode(&frame[FRAME_HEADER_LEN..])?;
    let body = envelope.event.kind();
    if body != kind {
        return Err(CodecError::KindMismatch {
            header: kind as u8,
            body: body as u8,
        });
    }
    Ok(envelope)
}
