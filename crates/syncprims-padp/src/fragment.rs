use bytes::{Bytes, BytesMut};
use syncprims_codec::{decode_prefix, encode_into, FieldDescriptor, Record, Schema};
use syncprims_slp::MAX_BODY;

use crate::error::{PadpError, Result};

/// First fragment of a message; `size` is the total message length.
pub const FLAG_FIRST: u8 = 0x80;
/// Last fragment of a message.
pub const FLAG_LAST: u8 = 0x40;
/// Set by the device on an ack when it ran out of memory for the message.
pub const FLAG_MEMORY_ERROR: u8 = 0x20;
/// `size` is a u32 instead of a u16.
pub const FLAG_LONG_FORM: u8 = 0x10;

/// Largest `size` a short-form header can carry.
const SHORT_FORM_MAX: usize = u16::MAX as usize;

const SHORT_HEADER_SIZE: usize = 4;
const LONG_HEADER_SIZE: usize = 6;

/// Largest data chunk that fits one SLP body under either header form.
pub const MAX_FRAGMENT: usize = MAX_BODY - LONG_HEADER_SIZE;

static SHORT_HEADER: Schema = Schema::new(
    "PadpHeader",
    &[
        FieldDescriptor::u8("type"),
        FieldDescriptor::u8("flags"),
        FieldDescriptor::u16("size"),
    ],
);

static LONG_HEADER: Schema = Schema::new(
    "PadpLongHeader",
    &[
        FieldDescriptor::u8("type"),
        FieldDescriptor::u8("flags"),
        FieldDescriptor::u32("size"),
    ],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FragmentType {
    Data = 1,
    Ack = 2,
    /// Keep-alive; carries nothing and is never acknowledged.
    Tickle = 4,
    Abort = 8,
}

impl FragmentType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Data),
            2 => Some(Self::Ack),
            4 => Some(Self::Tickle),
            8 => Some(Self::Abort),
            _ => None,
        }
    }
}

/// Fragment header.
///
/// For a first fragment `size` is the total message length; for
/// continuation fragments it is the offset of this fragment's data within the
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    pub kind: FragmentType,
    pub flags: u8,
    pub size: u32,
}

impl FragmentHeader {
    pub fn is_first(&self) -> bool {
        self.flags & FLAG_FIRST != 0
    }

    pub fn is_last(&self) -> bool {
        self.flags & FLAG_LAST != 0
    }

    pub fn is_long_form(&self) -> bool {
        self.flags & FLAG_LONG_FORM != 0
    }

    /// Wire size of this header.
    pub fn encoded_len(&self) -> usize {
        if self.is_long_form() {
            LONG_HEADER_SIZE
        } else {
            SHORT_HEADER_SIZE
        }
    }

    /// The acknowledgement for this header: same flags and size.
    pub fn ack(&self) -> Self {
        Self {
            kind: FragmentType::Ack,
            flags: self.flags,
            size: self.size,
        }
    }

    fn to_record(self) -> Record {
        let record = Record::new()
            .with("type", self.kind as u8)
            .with("flags", self.flags);
        if self.is_long_form() {
            record.with("size", self.size)
        } else {
            record.with("size", self.size as u16)
        }
    }

    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        if !self.is_long_form() && self.size as usize > SHORT_FORM_MAX {
            return Err(PadpError::protocol(format!(
                "size {} needs the long-form header",
                self.size
            )));
        }
        let schema = if self.is_long_form() {
            &LONG_HEADER
        } else {
            &SHORT_HEADER
        };
        encode_into(schema, &self.to_record(), dst).map_err(malformed)
    }

    /// Decode a header from the front of `src`, advancing past it.
    pub fn decode(src: &mut &[u8]) -> Result<Self> {
        let long = src.get(1).is_some_and(|flags| flags & FLAG_LONG_FORM != 0);
        let schema = if long { &LONG_HEADER } else { &SHORT_HEADER };
        let record = decode_prefix(schema, src).map_err(malformed)?;

        let raw_type = record.u8("type").map_err(malformed)?;
        let kind = FragmentType::from_u8(raw_type)
            .ok_or_else(|| PadpError::protocol(format!("unknown fragment type {raw_type:#04x}")))?;
        let flags = record.u8("flags").map_err(malformed)?;
        let size = if long {
            record.u32("size").map_err(malformed)?
        } else {
            u32::from(record.u16("size").map_err(malformed)?)
        };
        Ok(Self { kind, flags, size })
    }
}

/// One PADP fragment: header plus data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub header: FragmentHeader,
    pub data: Bytes,
}

impl Fragment {
    /// Parse an SLP body.
    pub fn parse(body: &Bytes) -> Result<Self> {
        let mut cursor = body.as_ref();
        let header = FragmentHeader::decode(&mut cursor)?;
        let data = body.slice(header.encoded_len()..);
        Ok(Self { header, data })
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.header.encoded_len() + self.data.len());
        self.header.encode_into(&mut dst)?;
        dst.extend_from_slice(&self.data);
        Ok(dst.freeze())
    }
}

/// Split a message into data fragments of at most `max_fragment` bytes.
pub(crate) fn split(payload: &Bytes, max_fragment: usize) -> Result<Vec<Fragment>> {
    let total = u32::try_from(payload.len()).map_err(|_| PadpError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    let long = payload.len() > SHORT_FORM_MAX;
    let step = max_fragment.max(1);

    let mut fragments = Vec::with_capacity(payload.len() / step + 1);
    let mut offset = 0usize;
    loop {
        let end = (offset + step).min(payload.len());
        let mut flags = 0;
        if offset == 0 {
            flags |= FLAG_FIRST;
        }
        if end == payload.len() {
            flags |= FLAG_LAST;
        }
        if long {
            flags |= FLAG_LONG_FORM;
        }
        let size = if offset == 0 { total } else { offset as u32 };
        fragments.push(Fragment {
            header: FragmentHeader {
                kind: FragmentType::Data,
                flags,
                size,
            },
            data: payload.slice(offset..end),
        });
        if end == payload.len() {
            return Ok(fragments);
        }
        offset = end;
    }
}

fn malformed(err: syncprims_codec::CodecError) -> PadpError {
    PadpError::protocol(format!("malformed fragment header: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_header_layout() {
        let fragment = Fragment {
            header: FragmentHeader {
                kind: FragmentType::Data,
                flags: FLAG_FIRST | FLAG_LAST,
                size: 5,
            },
            data: Bytes::from_static(b"hello"),
        };
        let wire = fragment.encode().unwrap();
        assert_eq!(&wire[..4], &[0x01, 0xC0, 0x00, 0x05]);
        assert_eq!(Fragment::parse(&wire).unwrap(), fragment);
    }

    #[test]
    fn long_header_layout() {
        let header = FragmentHeader {
            kind: FragmentType::Data,
            flags: FLAG_FIRST | FLAG_LONG_FORM,
            size: 0x0001_2345,
        };
        let mut wire = BytesMut::new();
        header.encode_into(&mut wire).unwrap();
        assert_eq!(&wire[..], &[0x01, 0x90, 0x00, 0x01, 0x23, 0x45]);
        let mut cursor = &wire[..];
        assert_eq!(FragmentHeader::decode(&mut cursor).unwrap(), header);
        assert!(cursor.is_empty());
    }

    #[test]
    fn largest_fragment_fills_one_slp_body() {
        let payload = Bytes::from(vec![0u8; MAX_FRAGMENT + 10]);
        let fragments = split(&payload, MAX_FRAGMENT).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].header.is_long_form());
        assert_eq!(fragments[0].encode().unwrap().len(), MAX_BODY);
        assert_eq!(fragments[1].data.len(), 10);
    }

    #[test]
    fn short_header_rejects_large_size() {
        let header = FragmentHeader {
            kind: FragmentType::Data,
            flags: FLAG_FIRST,
            size: 70_000,
        };
        assert!(matches!(
            header.encode_into(&mut BytesMut::new()),
            Err(PadpError::Protocol(_))
        ));
    }

    #[test]
    fn ack_echoes_flags_and_size() {
        let header = FragmentHeader {
            kind: FragmentType::Data,
            flags: FLAG_LAST,
            size: 1024,
        };
        let ack = header.ack();
        assert_eq!(ack.kind, FragmentType::Ack);
        assert_eq!((ack.flags, ack.size), (FLAG_LAST, 1024));
    }

    #[test]
    fn unknown_type_and_truncation_are_protocol_errors() {
        assert!(matches!(
            Fragment::parse(&Bytes::from_static(&[0x03, 0xC0, 0, 0])),
            Err(PadpError::Protocol(_))
        ));
        assert!(matches!(
            Fragment::parse(&Bytes::from_static(&[0x01, 0xC0])),
            Err(PadpError::Protocol(_))
        ));
    }

    #[test]
    fn split_sizes_and_offsets() {
        let payload = Bytes::from(vec![7u8; 2500]);
        let fragments = split(&payload, 1024).unwrap();
        let headers: Vec<_> = fragments.iter().map(|f| (f.header.flags, f.header.size)).collect();
        assert_eq!(
            headers,
            vec![(FLAG_FIRST, 2500), (0, 1024), (FLAG_LAST, 2048)]
        );
        let lens: Vec<_> = fragments.iter().map(|f| f.data.len()).collect();
        assert_eq!(lens, vec![1024, 1024, 452]);
    }

    #[test]
    fn split_empty_payload_is_single_fragment() {
        let fragments = split(&Bytes::new(), 1024).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].header.flags, FLAG_FIRST | FLAG_LAST);
        assert_eq!(fragments[0].header.size, 0);
    }

    #[test]
    fn split_large_payload_uses_long_form() {
        let payload = Bytes::from(vec![0u8; 70_000]);
        let fragments = split(&payload, 60_000).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| f.header.is_long_form()));
        assert_eq!(fragments[0].header.size, 70_000);
        assert_eq!(fragments[1].header.size, 60_000);
    }
}
