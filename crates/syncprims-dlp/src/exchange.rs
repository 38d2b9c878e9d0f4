use bytes::Bytes;
use syncprims_transport::{DirectTransport, TransportError};

use crate::error::Result;

/// One reliable request → response round trip.
///
/// Implemented by PADP channels and by [`Direct`] transports; the engine does
/// not care which.
pub trait Exchange: Send {
    fn exchange(&mut self, request: &[u8]) -> Result<Bytes>;
}

impl<T: Exchange + ?Sized> Exchange for Box<T> {
    fn exchange(&mut self, request: &[u8]) -> Result<Bytes> {
        (**self).exchange(request)
    }
}

#[cfg(feature = "padp")]
impl Exchange for syncprims_padp::PadpChannel {
    fn exchange(&mut self, request: &[u8]) -> Result<Bytes> {
        self.send(Bytes::copy_from_slice(request))?;
        Ok(self.recv()?)
    }
}

/// Adapter for media that already deliver whole requests and responses.
#[derive(Debug)]
pub struct Direct<T>(pub T);

impl<T: DirectTransport> Exchange for Direct<T> {
    fn exchange(&mut self, request: &[u8]) -> Result<Bytes> {
        let response = self.0.execute_transaction(request)?;
        if response.is_empty() {
            return Err(TransportError::EmptyResponse.into());
        }
        Ok(response)
    }
}
