//! SASL frame type and corresponding encoder and decoder

use bytes::{Buf, BufMut, BytesMut};
use fe2o3_amqp_types::sasl::{SaslChallenge, SaslInit, SaslMechanisms, SaslOutcome, SaslResponse};
use serde::{
    de::{self, VariantAccess},
    Deserialize, Serialize,
};
use serde_amqp::read::IoReader;
use tokio_util::codec::{Decoder, Encoder};

use super::{Error, FRAME_TYPE_SASL};

/// Fixed frame header: 4 byte size, doff, type and two ignored bytes
const FRAME_HEADER_LEN: usize = 8;

/// SASL frame
#[derive(Debug)]
pub enum Frame {
    /// SASL Mechanisms
    Mechanisms(SaslMechanisms),

    /// SASL Init
    Init(SaslInit),

    /// SASL Challenge
    Challenge(SaslChallenge),

    /// SASL Response
    Response(SaslResponse),

    /// SASL Outcome
    Outcome(SaslOutcome),
}

/// Encoder and decoder for SASL frames.
///
/// Unlike the AMQP frame codec this codec owns the size prefix as well: a
/// SASL layer works directly on the transport's byte buffers and has no
/// length-delimited framing beneath it. `decode` yields at most one frame
/// and returns `Ok(None)` on a partial frame so that bytes following the
/// negotiation are left untouched for the layer above.
#[derive(Debug, Default)]
pub struct FrameCodec {}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        use serde_amqp::ser::Serializer;

        let start = dst.len();
        dst.put_u32(0); // size, backfilled below
        // The extended header is ignored.
        // Implementations SHOULD therefore set DOFF to 0x02.
        dst.put_u8(0x02);
        dst.put_u8(FRAME_TYPE_SASL);
        // Bytes 6 and 7 of the header are ignored.
        // Implementations SHOULD set these to 0x00.
        dst.put_u16(0x0000);

        let mut serializer = Serializer::from(dst.writer());
        item.serialize(&mut serializer)?;

        let size = (dst.len() - start) as u32;
        dst[start..start + 4].copy_from_slice(&size.to_be_bytes());
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        use serde_amqp::de::Deserializer;

        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let size = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if size < FRAME_HEADER_LEN {
            return Err(Error::FramingError);
        }
        if src.len() < size {
            return Ok(None);
        }

        let mut frame = src.split_to(size);
        frame.advance(4);
        let doff = frame.get_u8();
        let ftype = frame.get_u8();
        let _ignored = frame.get_u16();

        if ftype != FRAME_TYPE_SASL {
            return Err(Error::FramingError);
        }
        let body_offset = doff as usize * 4;
        if !(FRAME_HEADER_LEN..=size).contains(&body_offset) {
            return Err(Error::FramingError);
        }
        // The extended header is ignored
        frame.advance(body_offset - FRAME_HEADER_LEN);

        let reader = IoReader::new(frame.reader());
        let mut deserializer = Deserializer::new(reader);
        let frame: Frame = Deserialize::deserialize(&mut deserializer)?;
        Ok(Some(frame))
    }
}

impl Serialize for Frame {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Frame::Mechanisms(value) => value.serialize(serializer),
            Frame::Init(value) => value.serialize(serializer),
            Frame::Challenge(value) => value.serialize(serializer),
            Frame::Response(value) => value.serialize(serializer),
            Frame::Outcome(value) => value.serialize(serializer),
        }
    }
}

enum Field {
    Mechanisms,
    Init,
    Challenge,
    Response,
    Outcome,
}

struct FieldVisitor {}

impl<'de> de::Visitor<'de> for FieldVisitor {
    type Value = Field;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("SASL frame body variant identifier")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            "amqp:sasl-mechanisms:list" => Ok(Field::Mechanisms),
            "amqp:sasl-init:list" => Ok(Field::Init),
            "amqp:sasl-challenge:list" => Ok(Field::Challenge),
            "amqp:sasl-response:list" => Ok(Field::Response),
            "amqp:sasl-outcome:list" => Ok(Field::Outcome),
            _ => Err(de::Error::custom(
                "wrong symbol value for SASL frame body descriptor",
            )),
        }
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            0x0000_0000_0000_0040 => Ok(Field::Mechanisms),
            0x0000_0000_0000_0041 => Ok(Field::Init),
            0x0000_0000_0000_0042 => Ok(Field::Challenge),
            0x0000_0000_0000_0043 => Ok(Field::Response),
            0x0000_0000_0000_0044 => Ok(Field::Outcome),
            _ => Err(de::Error::custom(
                "wrong code value for SASL frame body descriptor",
            )),
        }
    }
}

impl<'de> de::Deserialize<'de> for Field {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_identifier(FieldVisitor {})
    }
}

struct Visitor {}

impl<'de> de::Visitor<'de> for Visitor {
    type Value = Frame;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("enum sasl::Frame")
    }

    fn visit_enum<A>(self, data: A) -> Result<Self::Value, A::Error>
    where
        A: de::EnumAccess<'de>,
    {
        let (field, variant) = data.variant()?;

        match field {
            Field::Mechanisms => variant.newtype_variant().map(Frame::Mechanisms),
            Field::Init => variant.newtype_variant().map(Frame::Init),
            Field::Challenge => variant.newtype_variant().map(Frame::Challenge),
            Field::Response => variant.newtype_variant().map(Frame::Response),
            Field::Outcome => variant.newtype_variant().map(Frame::Outcome),
        }
    }
}

impl<'de> de::Deserialize<'de> for Frame {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        const VARIANTS: &[&str] = &[
            "amqp:sasl-mechanisms:list",
            "amqp:sasl-init:list",
            "amqp:sasl-challenge:list",
            "amqp:sasl-response:list",
            "amqp:sasl-outcome:list",
        ];
        deserializer.deserialize_enum("sasl::Frame", VARIANTS, Visitor {})
    }
}
