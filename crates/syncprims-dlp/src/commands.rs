//! Standard command catalogue.

use crate::args::DlpArg;
use crate::command::DlpCommand;
use crate::records::{CardQuery, DlpDateTime, StorageInfo, SysInfo, UserInfo, UserInfoUpdate};

pub const USER_INFO: DlpArg<UserInfo> = DlpArg::new(0x01, "userInfo");
pub const USER_INFO_UPDATE: DlpArg<UserInfoUpdate> = DlpArg::new(0x02, "userInfoUpdate");
pub const SYS_INFO: DlpArg<SysInfo> = DlpArg::new(0x03, "sysInfo");
pub const DATE_TIME: DlpArg<DlpDateTime> = DlpArg::new(0x04, "dateTime");
pub const CARD_QUERY: DlpArg<CardQuery> = DlpArg::new(0x05, "cardQuery");
pub const STORAGE_INFO: DlpArg<StorageInfo> = DlpArg::new(0x06, "storageInfo");
pub const LOG_TEXT: DlpArg<String> = DlpArg::new(0x07, "logText");
pub const END_STATUS: DlpArg<u16> = DlpArg::new(0x08, "endStatus");

pub static READ_USER_INFO: DlpCommand = DlpCommand {
    opcode: 0x10,
    name: "ReadUserInfo",
    request: &[],
    response: &[USER_INFO.spec],
};

pub static WRITE_USER_INFO: DlpCommand = DlpCommand {
    opcode: 0x11,
    name: "WriteUserInfo",
    request: &[USER_INFO_UPDATE.spec],
    response: &[],
};

pub static READ_SYS_INFO: DlpCommand = DlpCommand {
    opcode: 0x12,
    name: "ReadSysInfo",
    request: &[],
    response: &[SYS_INFO.spec],
};

pub static GET_SYS_DATE_TIME: DlpCommand = DlpCommand {
    opcode: 0x13,
    name: "GetSysDateTime",
    request: &[],
    response: &[DATE_TIME.spec],
};

pub static SET_SYS_DATE_TIME: DlpCommand = DlpCommand {
    opcode: 0x14,
    name: "SetSysDateTime",
    request: &[DATE_TIME.spec],
    response: &[],
};

pub static READ_STORAGE_INFO: DlpCommand = DlpCommand {
    opcode: 0x15,
    name: "ReadStorageInfo",
    request: &[CARD_QUERY.spec],
    response: &[STORAGE_INFO.spec],
};

pub static ADD_SYNC_LOG_ENTRY: DlpCommand = DlpCommand {
    opcode: 0x2A,
    name: "AddSyncLogEntry",
    request: &[LOG_TEXT.spec],
    response: &[],
};

pub static OPEN_CONDUIT: DlpCommand = DlpCommand {
    opcode: 0x2E,
    name: "OpenConduit",
    request: &[],
    response: &[],
};

pub static END_OF_SYNC: DlpCommand = DlpCommand {
    opcode: 0x2F,
    name: "EndOfSync",
    request: &[END_STATUS.spec],
    response: &[],
};

/// Every standard command, in opcode order.
pub static CATALOGUE: &[&DlpCommand] = &[
    &READ_USER_INFO,
    &WRITE_USER_INFO,
    &READ_SYS_INFO,
    &GET_SYS_DATE_TIME,
    &SET_SYS_DATE_TIME,
    &READ_STORAGE_INFO,
    &ADD_SYNC_LOG_ENTRY,
    &OPEN_CONDUIT,
    &END_OF_SYNC,
];

/// Standard command with the given request opcode.
pub fn lookup(opcode: u8) -> Option<&'static DlpCommand> {
    CATALOGUE
        .iter()
        .copied()
        .find(|command| command.opcode == opcode)
}
