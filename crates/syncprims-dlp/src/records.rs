//! Typed payloads of the standard commands.

use std::fmt;

use bytes::Bytes;
use syncprims_codec::{
    latin1_decode, latin1_encode, CodecError, FieldDescriptor as F, Length, Record, Result,
    Schema, Value, WireRecord, WireType,
};

static DATE_TIME: Schema = Schema::new(
    "DlpDateTime",
    &[
        F::u16("year"),
        F::u8("month"),
        F::u8("day"),
        F::u8("hour"),
        F::u8("minute"),
        F::u8("second"),
        F::u8("reserved"),
    ],
);

static USER_INFO: Schema = Schema::new(
    "UserInfo",
    &[
        F::u32("userId"),
        F::u32("viewerId"),
        F::u32("lastSyncPc"),
        F::record("lastSuccessfulSync", &DATE_TIME),
        F::record("lastSync", &DATE_TIME),
        F::u8("nameLength").length_of("name"),
        F::u8("passwordLength").length_of("password"),
        F::bytes("name", Length::Derived),
        F::bytes("password", Length::Derived),
    ],
);

static USER_INFO_UPDATE: Schema = Schema::new(
    "UserInfoUpdate",
    &[
        F::u32("userId"),
        F::u32("viewerId"),
        F::u32("lastSyncPc"),
        F::record("lastSync", &DATE_TIME),
        F::u8("modifyFlags"),
        F::u8("nameLength").length_of("name"),
        F::bytes("name", Length::Derived),
    ],
);

static SYS_INFO: Schema = Schema::new(
    "SysInfo",
    &[
        F::u32("romVersion"),
        F::u32("locale"),
        F::u8("reserved"),
        F::u8("productIdLength").length_of("productId"),
        F::bytes("productId", Length::Derived),
    ],
);

static CARD_QUERY: Schema = Schema::new("CardQuery", &[F::u8("cardNo"), F::u8("reserved")]);

static CARD_INFO: Schema = Schema::new(
    "CardInfo",
    &[
        F::u8("totalSize"),
        F::u8("cardNo"),
        F::u16("cardVersion"),
        F::record("created", &DATE_TIME),
        F::u32("romSize"),
        F::u32("ramSize"),
        F::u32("freeRam"),
        F::u8("nameLength").length_of("name"),
        F::u8("manufacturerLength").length_of("manufacturer"),
        F::bytes("name", Length::Derived),
        F::bytes("manufacturer", Length::Derived),
    ],
);

static CARD_INFO_TYPE: WireType = WireType::Record(&CARD_INFO);

static STORAGE_INFO: Schema = Schema::new(
    "StorageInfo",
    &[
        F::u8("lastCard"),
        F::u8("more"),
        F::u8("reserved"),
        F::u8("count").length_of("cards"),
        F::array("cards", &CARD_INFO_TYPE, Length::Derived),
    ],
);

/// Fixed part of a card record, up to and including the two length bytes.
const CARD_INFO_FIXED: usize = 26;

/// Device-side timestamp. Year is the full year (e.g. 2004).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DlpDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl WireRecord for DlpDateTime {
    const SCHEMA: &'static Schema = &DATE_TIME;

    fn to_record(&self) -> Result<Record> {
        Ok(Record::new()
            .with("year", self.year)
            .with("month", self.month)
            .with("day", self.day)
            .with("hour", self.hour)
            .with("minute", self.minute)
            .with("second", self.second)
            .with("reserved", 0u8))
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            year: record.u16("year")?,
            month: record.u8("month")?,
            day: record.u8("day")?,
            hour: record.u8("hour")?,
            minute: record.u8("minute")?,
            second: record.u8("second")?,
        })
    }
}

impl fmt::Display for DlpDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Response of `ReadUserInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: u32,
    pub viewer_id: u32,
    pub last_sync_pc: u32,
    pub last_successful_sync: DlpDateTime,
    pub last_sync: DlpDateTime,
    pub name: String,
    pub password: Bytes,
}

impl WireRecord for UserInfo {
    const SCHEMA: &'static Schema = &USER_INFO;

    fn to_record(&self) -> Result<Record> {
        Ok(Record::new()
            .with("userId", self.user_id)
            .with("viewerId", self.viewer_id)
            .with("lastSyncPc", self.last_sync_pc)
            .with("lastSuccessfulSync", self.last_successful_sync.to_record()?)
            .with("lastSync", self.last_sync.to_record()?)
            .with("name", text_block("name", &self.name, true)?)
            .with("password", self.password.clone()))
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            user_id: record.u32("userId")?,
            viewer_id: record.u32("viewerId")?,
            last_sync_pc: record.u32("lastSyncPc")?,
            last_successful_sync: DlpDateTime::from_record(record.record("lastSuccessfulSync")?)?,
            last_sync: DlpDateTime::from_record(record.record("lastSync")?)?,
            name: block_text(record.bytes("name")?),
            password: record.bytes("password")?.clone(),
        })
    }
}

/// Request of `WriteUserInfo`. Only fields selected by `modify_flags` change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfoUpdate {
    pub user_id: u32,
    pub viewer_id: u32,
    pub last_sync_pc: u32,
    pub last_sync: DlpDateTime,
    pub modify_flags: u8,
    pub name: String,
}

impl UserInfoUpdate {
    pub const MODIFY_USER_ID: u8 = 0x80;
    pub const MODIFY_SYNC_PC: u8 = 0x40;
    pub const MODIFY_SYNC_DATE: u8 = 0x20;
    pub const MODIFY_NAME: u8 = 0x10;
    pub const MODIFY_VIEWER_ID: u8 = 0x08;
}

impl WireRecord for UserInfoUpdate {
    const SCHEMA: &'static Schema = &USER_INFO_UPDATE;

    fn to_record(&self) -> Result<Record> {
        Ok(Record::new()
            .with("userId", self.user_id)
            .with("viewerId", self.viewer_id)
            .with("lastSyncPc", self.last_sync_pc)
            .with("lastSync", self.last_sync.to_record()?)
            .with("modifyFlags", self.modify_flags)
            .with("name", text_block("name", &self.name, true)?))
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            user_id: record.u32("userId")?,
            viewer_id: record.u32("viewerId")?,
            last_sync_pc: record.u32("lastSyncPc")?,
            last_sync: DlpDateTime::from_record(record.record("lastSync")?)?,
            modify_flags: record.u8("modifyFlags")?,
            name: block_text(record.bytes("name")?),
        })
    }
}

/// Response of `ReadSysInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SysInfo {
    pub rom_version: u32,
    pub locale: u32,
    pub product_id: Bytes,
}

impl WireRecord for SysInfo {
    const SCHEMA: &'static Schema = &SYS_INFO;

    fn to_record(&self) -> Result<Record> {
        Ok(Record::new()
            .with("romVersion", self.rom_version)
            .with("locale", self.locale)
            .with("reserved", 0u8)
            .with("productId", self.product_id.clone()))
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            rom_version: record.u32("romVersion")?,
            locale: record.u32("locale")?,
            product_id: record.bytes("productId")?.clone(),
        })
    }
}

/// Request of `ReadStorageInfo`: first card to report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardQuery {
    pub card_no: u8,
}

impl WireRecord for CardQuery {
    const SCHEMA: &'static Schema = &CARD_QUERY;

    fn to_record(&self) -> Result<Record> {
        Ok(Record::new()
            .with("cardNo", self.card_no)
            .with("reserved", 0u8))
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            card_no: record.u8("cardNo")?,
        })
    }
}

/// One memory card as reported by `ReadStorageInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardInfo {
    pub card_no: u8,
    pub card_version: u16,
    pub created: DlpDateTime,
    pub rom_size: u32,
    pub ram_size: u32,
    pub free_ram: u32,
    pub name: String,
    pub manufacturer: String,
}

impl WireRecord for CardInfo {
    const SCHEMA: &'static Schema = &CARD_INFO;

    fn to_record(&self) -> Result<Record> {
        let name = text_block("name", &self.name, false)?;
        let manufacturer = text_block("manufacturer", &self.manufacturer, false)?;
        let total = CARD_INFO_FIXED + name.len() + manufacturer.len();
        let total_size = u8::try_from(total).map_err(|_| CodecError::LengthOverflow {
            field: "totalSize",
            len: total,
            max: usize::from(u8::MAX),
        })?;
        Ok(Record::new()
            .with("totalSize", total_size)
            .with("cardNo", self.card_no)
            .with("cardVersion", self.card_version)
            .with("created", self.created.to_record()?)
            .with("romSize", self.rom_size)
            .with("ramSize", self.ram_size)
            .with("freeRam", self.free_ram)
            .with("name", name)
            .with("manufacturer", manufacturer))
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            card_no: record.u8("cardNo")?,
            card_version: record.u16("cardVersion")?,
            created: DlpDateTime::from_record(record.record("created")?)?,
            rom_size: record.u32("romSize")?,
            ram_size: record.u32("ramSize")?,
            free_ram: record.u32("freeRam")?,
            name: block_text(record.bytes("name")?),
            manufacturer: block_text(record.bytes("manufacturer")?),
        })
    }
}

/// Response of `ReadStorageInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageInfo {
    pub last_card: u8,
    /// More cards follow `last_card`; query again from `last_card + 1`.
    pub more: bool,
    pub cards: Vec<CardInfo>,
}

impl WireRecord for StorageInfo {
    const SCHEMA: &'static Schema = &STORAGE_INFO;

    fn to_record(&self) -> Result<Record> {
        let cards = self
            .cards
            .iter()
            .map(|card| card.to_record().map(Value::Record))
            .collect::<Result<Vec<_>>>()?;
        Ok(Record::new()
            .with("lastCard", self.last_card)
            .with("more", u8::from(self.more))
            .with("reserved", 0u8)
            .with("cards", cards))
    }

    fn from_record(record: &Record) -> Result<Self> {
        let cards = record
            .array("cards")?
            .iter()
            .map(|value| match value {
                Value::Record(card) => CardInfo::from_record(card),
                other => Err(CodecError::TypeMismatch {
                    field: "cards",
                    expected: "record",
                    found: other.kind(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            last_card: record.u8("lastCard")?,
            more: record.u8("more")? != 0,
            cards,
        })
    }
}

/// Status reported with `EndOfSync`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u16)]
pub enum EndStatus {
    #[default]
    Normal = 0,
    OutOfMemory = 1,
    UserCancelled = 2,
    Other = 3,
}

impl EndStatus {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Latin-1 bytes of `text`, optionally NUL-terminated. Empty text is an
/// empty block with no terminator.
fn text_block(field: &'static str, text: &str, nul_terminated: bool) -> Result<Bytes> {
    if text.is_empty() {
        return Ok(Bytes::new());
    }
    let mut raw = latin1_encode(field, text)?;
    if nul_terminated {
        raw.push(0);
    }
    Ok(Bytes::from(raw))
}

/// Text of a length-prefixed block, cut at the first NUL.
fn block_text(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    latin1_decode(&raw[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> DlpDateTime {
        DlpDateTime {
            year: 2004,
            month: 10,
            day: 16,
            hour: 12,
            minute: 30,
            second: 5,
        }
    }

    #[test]
    fn date_time_displays_as_iso_like_text() {
        assert_eq!(date().to_string(), "2004-10-16 12:30:05");
    }

    #[test]
    fn schemas_validate() {
        for schema in [
            &DATE_TIME,
            &USER_INFO,
            &USER_INFO_UPDATE,
            &SYS_INFO,
            &CARD_QUERY,
            &CARD_INFO,
            &STORAGE_INFO,
        ] {
            schema.validate().unwrap();
        }
    }

    #[test]
    fn date_time_layout() {
        assert_eq!(
            date().encode().unwrap().as_ref(),
            &[0x07, 0xD4, 10, 16, 12, 30, 5, 0]
        );
    }

    #[test]
    fn user_info_name_carries_terminator_in_length() {
        let info = UserInfo {
            user_id: 7,
            name: "Ann".to_string(),
            last_sync: date(),
            ..UserInfo::default()
        };
        let wire = info.encode().unwrap();
        // 12 bytes of ids, two 8-byte dates, then the two length bytes.
        assert_eq!(&wire[28..30], &[4, 0]);
        assert_eq!(&wire[30..], b"Ann\0");
        assert_eq!(UserInfo::decode(&wire).unwrap(), info);
    }

    #[test]
    fn sys_info_decodes_device_bytes() {
        let wire = [
            0x03, 0x50, 0x30, 0x00, // rom version 3.5
            0x00, 0x00, 0x00, 0x01, // locale
            0x00, 0x04, b'p', b'a', b'l', b'm',
        ];
        let info = SysInfo::decode(&wire).unwrap();
        assert_eq!(info.rom_version, 0x0350_3000);
        assert_eq!(info.locale, 1);
        assert_eq!(info.product_id.as_ref(), b"palm");
    }

    #[test]
    fn storage_info_with_cards() {
        let storage = StorageInfo {
            last_card: 0,
            more: false,
            cards: vec![CardInfo {
                card_no: 0,
                card_version: 1,
                created: date(),
                rom_size: 0x0020_0000,
                ram_size: 0x0080_0000,
                free_ram: 0x0040_0000,
                name: "PalmCard".to_string(),
                manufacturer: "Palm".to_string(),
            }],
        };
        let wire = storage.encode().unwrap();
        assert_eq!(&wire[..4], &[0, 0, 0, 1]);
        assert_eq!(usize::from(wire[4]), CARD_INFO_FIXED + 8 + 4);
        assert_eq!(wire.len(), 4 + CARD_INFO_FIXED + 12);
        assert_eq!(StorageInfo::decode(&wire).unwrap(), storage);
    }

    #[test]
    fn text_outside_latin1_is_rejected() {
        let info = UserInfo {
            name: "a\u{263A}".to_string(),
            ..UserInfo::default()
        };
        assert_eq!(
            info.encode(),
            Err(CodecError::InvalidString {
                field: "name",
                reason: "character outside Latin-1",
            })
        );
        assert!(text_block("name", "", true).unwrap().is_empty());
        assert_eq!(
            text_block("name", "caf\u{e9}", true).unwrap().as_ref(),
            b"caf\xe9\0"
        );
        assert_eq!(block_text(b"caf\xe9\0junk"), "caf\u{e9}");
    }

    #[test]
    fn oversized_card_record_is_rejected() {
        let card = CardInfo {
            name: "n".repeat(200),
            manufacturer: "m".repeat(40),
            ..CardInfo::default()
        };
        assert_eq!(
            card.encode(),
            Err(CodecError::LengthOverflow {
                field: "totalSize",
                len: CARD_INFO_FIXED + 240,
                max: 255,
            })
        );
        let storage = StorageInfo {
            cards: vec![card],
            ..StorageInfo::default()
        };
        assert!(matches!(
            storage.encode(),
            Err(CodecError::LengthOverflow { field: "totalSize", .. })
        ));
    }
}
