use super::SubSystem;
use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;

/// Electrical switch panel. Lights are out while `actual != expected`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwitchSystem {
    /// Bit per switch, the solved position.
    pub expected: u8,
    /// Bit per switch, the current position.
    pub actual: u8,
    /// Light level, 0..=255.
    pub value: u8,
}

impl SwitchSystem {
    /// Whether the lights are sabotaged.
    pub fn is_sabotaged(&self) -> bool {
        self.expected != self.actual
    }
}

impl SubSystem for SwitchSystem {
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        let bytes = r.bytes(3)?;
        self.expected = bytes[0];
        self.actual = bytes[1];
        self.value = bytes[2];
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        w.u8(self.expected).u8(self.actual).u8(self.value);
    }
}
