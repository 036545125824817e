//! Key material handoff to the protected program
//!
//! The key never appears in argv or the environment. It is written once to the
//! child's stdin as four CR-LF terminated lines: algorithm, key size, IV size,
//! password. There is no length prefix and no escaping.

use crate::defaults::HANDOFF_LINE_TERMINATOR;

/// The four key-material buffers compiled into the stub
#[derive(Clone, PartialEq, Eq)]
pub struct KeyBundle {
    pub algorithm: Vec<u8>,
    pub key_size: Vec<u8>,
    pub iv_size: Vec<u8>,
    pub password: Vec<u8>,
}

impl KeyBundle {
    pub fn new(
        algorithm: impl AsRef<[u8]>,
        key_size: impl AsRef<[u8]>,
        iv_size: impl AsRef<[u8]>,
        password: impl AsRef<[u8]>,
    ) -> Self {
        KeyBundle {
            algorithm: algorithm.as_ref().to_vec(),
            key_size: key_size.as_ref().to_vec(),
            iv_size: iv_size.as_ref().to_vec(),
            password: password.as_ref().to_vec(),
        }
    }

    /// Serialize into the line-delimited handoff record
    pub fn encode(&self) -> Vec<u8> {
        let fields = [
            &self.algorithm,
            &self.key_size,
            &self.iv_size,
            &self.password,
        ];
        let capacity = fields.iter().map(|f| f.len()).sum::<usize>()
            + fields.len() * HANDOFF_LINE_TERMINATOR.len();

        let mut out = Vec::with_capacity(capacity);
        for field in fields {
            out.extend_from_slice(field);
            out.extend_from_slice(HANDOFF_LINE_TERMINATOR);
        }
        out
    }
}

// Keep the password out of logs
impl std::fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBundle")
            .field("algorithm", &String::from_utf8_lossy(&self.algorithm))
            .field("key_size", &String::from_utf8_lossy(&self.key_size))
            .field("iv_size", &String::from_utf8_lossy(&self.iv_size))
            .field("password", &"<redacted>")
            .finish()
    }
}
