use super::SubSystem;
use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;

/// Medbay scanner queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MedScanSystem {
    /// Player ids waiting for or using the scanner.
    pub users: Vec<u8>,
}

impl SubSystem for MedScanSystem {
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        let count = r.packed()?;
        self.users = r.bytes(count as usize)?.to_vec();
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        w.packed(self.users.len() as u32).bytes(&self.users);
    }
}
