use bytes::{BufMut, Bytes, BytesMut};
use syncprims_codec::{decode_value, encode_value};
use tracing::trace;

use crate::args::{ArgSpec, ArgumentMap};
use crate::error::{DlpError, DlpErrorKind, Result};

/// High bit set on the opcode echoed in every response.
pub const RESPONSE_FLAG: u8 = 0x80;

/// Immutable definition of one DLP command.
///
/// ```
/// use syncprims_dlp::{DlpArg, DlpCommand};
///
/// const VOLUME: DlpArg<u16> = DlpArg::new(0x200, "volume");
///
/// static SET_VOLUME: DlpCommand = DlpCommand {
///     opcode: 0x5A,
///     name: "SetVolume",
///     request: &[VOLUME.spec],
///     response: &[],
/// };
/// assert_eq!(SET_VOLUME.request[0].name, "volume");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlpCommand {
    pub opcode: u8,
    pub name: &'static str,
    /// Encoded in this order after the opcode.
    pub request: &'static [ArgSpec],
    /// Decoded in this order after the status byte.
    pub response: &'static [ArgSpec],
}

impl DlpCommand {
    /// Opcode expected in byte 0 of the response.
    pub fn response_opcode(&self) -> u8 {
        self.opcode | RESPONSE_FLAG
    }

    /// Build the request payload: opcode, then each request argument.
    ///
    /// Fails before producing any bytes if a declared argument is missing.
    pub fn encode_request(&self, args: &ArgumentMap) -> Result<Bytes> {
        let values = self
            .request
            .iter()
            .map(|spec| {
                args.value(spec.id)
                    .map(|value| (spec, value))
                    .ok_or(DlpError::MissingArgument {
                        command: self.name,
                        arg: spec.name,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut dst = BytesMut::with_capacity(64);
        dst.put_u8(self.opcode);
        for (spec, value) in values {
            encode_value(spec.name, &spec.wire, value, &mut dst)?;
        }
        Ok(dst.freeze())
    }

    /// Check the response header and decode the response arguments.
    ///
    /// A non-zero status fails with [`DlpError::Command`] without looking at
    /// the rest of the payload.
    pub fn decode_response(&self, response: &[u8]) -> Result<ArgumentMap> {
        let (&opcode, rest) = response
            .split_first()
            .ok_or_else(|| DlpError::protocol(format!("{}: empty response", self.name)))?;
        if opcode != self.response_opcode() {
            return Err(DlpError::protocol(format!(
                "{}: response opcode {opcode:#04x}, expected {:#04x}",
                self.name,
                self.response_opcode()
            )));
        }
        let (&status, mut cursor) = rest
            .split_first()
            .ok_or_else(|| DlpError::protocol(format!("{}: response has no status", self.name)))?;
        if status != 0 {
            return Err(DlpError::Command {
                command: self.name,
                kind: DlpErrorKind::from_code(status),
            });
        }

        let mut args = ArgumentMap::new();
        for spec in self.response {
            let value = decode_value(spec.name, &spec.wire, None, &mut cursor)?;
            args.insert_value(spec.id, value);
        }
        if !cursor.is_empty() {
            trace!(
                command = self.name,
                trailing = cursor.len(),
                "ignoring trailing response bytes"
            );
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use syncprims_codec::CodecError;

    use super::*;
    use crate::args::DlpArg;

    const VALUE: DlpArg<u16> = DlpArg::new(0x300, "value");
    const NAME: DlpArg<String> = DlpArg::new(0x301, "name");

    static ECHO: DlpCommand = DlpCommand {
        opcode: 0x1F,
        name: "Echo",
        request: &[VALUE.spec],
        response: &[VALUE.spec],
    };

    static LABELLED: DlpCommand = DlpCommand {
        opcode: 0x20,
        name: "Labelled",
        request: &[VALUE.spec, NAME.spec],
        response: &[],
    };

    #[test]
    fn request_is_opcode_then_arguments() {
        let args = ArgumentMap::new().with(&VALUE, 0x1234).unwrap();
        let wire = ECHO.encode_request(&args).unwrap();
        assert_eq!(wire.as_ref(), &[0x1F, 0x12, 0x34]);
    }

    #[test]
    fn arguments_encode_in_declaration_order() {
        let args = ArgumentMap::new()
            .with(&NAME, "ab".to_string())
            .unwrap()
            .with(&VALUE, 1)
            .unwrap();
        let wire = LABELLED.encode_request(&args).unwrap();
        assert_eq!(wire.as_ref(), b"\x20\x00\x01ab\0");
    }

    #[test]
    fn missing_argument_fails_before_encoding() {
        let args = ArgumentMap::new().with(&VALUE, 1).unwrap();
        assert!(matches!(
            LABELLED.encode_request(&args),
            Err(DlpError::MissingArgument {
                command: "Labelled",
                arg: "name"
            })
        ));
    }

    #[test]
    fn successful_response_decodes_arguments() {
        let args = ECHO.decode_response(&[0x9F, 0x00, 0xBE, 0xEF]).unwrap();
        assert_eq!(args.get(&VALUE).unwrap(), 0xBEEF);
    }

    #[test]
    fn error_status_skips_decoding() {
        let err = ECHO.decode_response(&[0x9F, 0x05]).unwrap_err();
        assert!(matches!(
            err,
            DlpError::Command {
                command: "Echo",
                kind: DlpErrorKind::NotFound
            }
        ));
    }

    #[test]
    fn opcode_mismatch_is_protocol_error() {
        assert!(matches!(
            ECHO.decode_response(&[0x90, 0x00, 0x00, 0x01]),
            Err(DlpError::Protocol(_))
        ));
        assert!(matches!(
            ECHO.decode_response(&[0x1F, 0x00, 0x00, 0x01]),
            Err(DlpError::Protocol(_))
        ));
    }

    #[test]
    fn truncated_response_is_malformed_data() {
        assert!(matches!(
            ECHO.decode_response(&[0x9F]),
            Err(DlpError::Protocol(_))
        ));
        assert!(matches!(
            ECHO.decode_response(&[0x9F, 0x00, 0x01]),
            Err(DlpError::Codec(CodecError::MalformedData { field: "value", .. }))
        ));
    }
}
