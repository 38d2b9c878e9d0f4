use std::sync::{Mutex, PoisonError};

use tracing::{debug, debug_span, trace};

use crate::args::ArgumentMap;
use crate::command::DlpCommand;
use crate::commands;
use crate::error::{DlpError, Result};
use crate::exchange::Exchange;
use crate::records::{
    CardQuery, DlpDateTime, EndStatus, StorageInfo, SysInfo, UserInfo, UserInfoUpdate,
};

/// A DLP session over one reliable transport.
///
/// Transactions are serialized: a second caller blocks until the first
/// transaction's response has arrived. Share it behind an `Arc` to issue
/// commands from several threads.
pub struct DlpConnection<T> {
    transport: Mutex<T>,
}

impl<T: Exchange> DlpConnection<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
        }
    }

    /// Run one transaction.
    ///
    /// Request arguments are encoded before the transport is locked, so a
    /// missing or unencodable argument never reaches the wire.
    pub fn execute(&self, command: &DlpCommand, args: &ArgumentMap) -> Result<ArgumentMap> {
        let span = debug_span!("dlp", opcode = command.opcode, command = command.name);
        let _enter = span.enter();

        let request = command.encode_request(args)?;
        let response = {
            let mut transport = self
                .transport
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            trace!(len = request.len(), "request");
            transport.exchange(&request)?
        };
        trace!(len = response.len(), "response");

        let result = command.decode_response(&response);
        match &result {
            Ok(_) => debug!("transaction complete"),
            Err(DlpError::Command { kind, .. }) => debug!(%kind, "device rejected command"),
            Err(err) => debug!(%err, "transaction failed"),
        }
        result
    }

    /// Consume the connection and return its transport.
    pub fn into_inner(self) -> T {
        self.transport
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read_user_info(&self) -> Result<UserInfo> {
        self.execute(&commands::READ_USER_INFO, &ArgumentMap::new())?
            .take(&commands::USER_INFO)
    }

    pub fn write_user_info(&self, update: UserInfoUpdate) -> Result<()> {
        let args = ArgumentMap::new().with(&commands::USER_INFO_UPDATE, update)?;
        self.execute(&commands::WRITE_USER_INFO, &args).map(drop)
    }

    pub fn read_sys_info(&self) -> Result<SysInfo> {
        self.execute(&commands::READ_SYS_INFO, &ArgumentMap::new())?
            .take(&commands::SYS_INFO)
    }

    pub fn get_sys_date_time(&self) -> Result<DlpDateTime> {
        self.execute(&commands::GET_SYS_DATE_TIME, &ArgumentMap::new())?
            .take(&commands::DATE_TIME)
    }

    pub fn set_sys_date_time(&self, time: DlpDateTime) -> Result<()> {
        let args = ArgumentMap::new().with(&commands::DATE_TIME, time)?;
        self.execute(&commands::SET_SYS_DATE_TIME, &args).map(drop)
    }

    /// Cards starting at `first_card`. Check [`StorageInfo::more`] for the rest.
    pub fn read_storage_info(&self, first_card: u8) -> Result<StorageInfo> {
        let args = ArgumentMap::new().with(
            &commands::CARD_QUERY,
            CardQuery {
                card_no: first_card,
            },
        )?;
        self.execute(&commands::READ_STORAGE_INFO, &args)?
            .take(&commands::STORAGE_INFO)
    }

    pub fn add_sync_log_entry(&self, text: &str) -> Result<()> {
        let args = ArgumentMap::new().with(&commands::LOG_TEXT, text.to_string())?;
        self.execute(&commands::ADD_SYNC_LOG_ENTRY, &args).map(drop)
    }

    /// Tell the device a conduit is starting; shows progress on its screen.
    pub fn open_conduit(&self) -> Result<()> {
        self.execute(&commands::OPEN_CONDUIT, &ArgumentMap::new())
            .map(drop)
    }

    pub fn end_of_sync(&self, status: EndStatus) -> Result<()> {
        let args = ArgumentMap::new().with(&commands::END_STATUS, status.code())?;
        self.execute(&commands::END_OF_SYNC, &args).map(drop)
    }
}
