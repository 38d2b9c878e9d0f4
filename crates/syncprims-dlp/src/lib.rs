//! Desktop Link Protocol (DLP) transaction engine.
//!
//! A transaction is one request (opcode byte followed by the encoded request
//! arguments) and one response (opcode with the high bit set, a status byte,
//! then the encoded response arguments). Commands are `static`
//! [`DlpCommand`] definitions; arguments are typed [`DlpArg`] handles that
//! key the [`ArgumentMap`] passed in and returned.
//!
//! ```no_run
//! # fn demo(conn: &syncprims_dlp::DlpConnection<impl syncprims_dlp::Exchange>) -> syncprims_dlp::Result<()> {
//! use syncprims_dlp::{commands, ArgumentMap};
//!
//! let response = conn.execute(&commands::READ_SYS_INFO, &ArgumentMap::new())?;
//! let info = response.get(&commands::SYS_INFO)?;
//! println!("ROM {:#010x}", info.rom_version);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod command;
pub mod commands;
pub mod connection;
pub mod error;
pub mod exchange;
pub mod records;

pub use args::{ArgId, ArgSpec, ArgumentMap, DlpArg};
pub use command::{DlpCommand, RESPONSE_FLAG};
pub use connection::DlpConnection;
pub use error::{DlpError, DlpErrorKind, Result};
pub use exchange::{Direct, Exchange};
pub use records::{
    CardInfo, CardQuery, DlpDateTime, EndStatus, StorageInfo, SysInfo, UserInfo, UserInfoUpdate,
};
