use super::{to_writer, Error, Writer};
use crate::types::Hash;

use serde::Serialize;
use sha3::{Digest, Keccak256};

#[derive(Default)]
pub struct Keccak256Writer {
    hasher: Keccak256,
}

impl Writer for Keccak256Writer {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}

impl Keccak256Writer {
    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

/// `keccak256(abi.encodePacked(value))`
pub fn to_hash<T>(value: &T) -> Result<Hash, Error>
where
    T: Serialize + ?Sized,
{
    let mut writer = Keccak256Writer::default();
    to_writer(value, &mut writer)?;
    Ok(writer.finalize())
}
