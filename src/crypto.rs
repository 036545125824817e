//! AES-CBC license decryption with strict PKCS#5/PKCS#7 padding checks

use crate::defaults::AES_BLOCK_SIZE;
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, InvalidLength, KeyIvInit};
use log::trace;
use std::fmt;

/// Reasons a license blob fails to decrypt
///
/// Callers collapse all of these into "license invalid"; the variants only
/// exist for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Key is not 16, 24 or 32 bytes
    InvalidKeyLength(usize),
    /// IV is not one block long
    InvalidIvLength(usize),
    /// Ciphertext is empty or not a multiple of the block size
    NotBlockAligned(usize),
    /// Nothing left to unpad
    Empty,
    /// Declared padding length is zero or longer than the data
    InvalidPaddingSize(u8),
    /// Padding bytes disagree with the declared length
    InvalidPaddingBytes,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKeyLength(len) => write!(f, "invalid AES key length: {len}"),
            CryptoError::InvalidIvLength(len) => write!(f, "invalid IV length: {len}"),
            CryptoError::NotBlockAligned(len) => {
                write!(f, "ciphertext length {len} is not a multiple of block size")
            }
            CryptoError::Empty => write!(f, "input is empty"),
            CryptoError::InvalidPaddingSize(n) => write!(f, "invalid padding size: {n}"),
            CryptoError::InvalidPaddingBytes => write!(f, "invalid padding bytes"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Decrypt `ciphertext` with AES-CBC and strip its padding
///
/// # Errors
///
/// Returns an error if the key or IV has the wrong length, the ciphertext is
/// not block aligned, or the padding is malformed. No partial plaintext is
/// ever returned.
pub fn decrypt_aes_cbc(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_iv(iv)?;
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::NotBlockAligned(ciphertext.len()));
    }

    let mut buf = ciphertext.to_vec();
    let bad_key = |_: InvalidLength| CryptoError::InvalidKeyLength(key.len());
    let unaligned = CryptoError::NotBlockAligned(buf.len());
    let decrypted = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .is_ok(),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .is_ok(),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .is_ok(),
        other => return Err(CryptoError::InvalidKeyLength(other)),
    };
    if !decrypted {
        return Err(unaligned);
    }
    trace!("🔓 Decrypted {} bytes", buf.len());

    let plain_len = unpad_pkcs7(&buf)?.len();
    buf.truncate(plain_len);
    Ok(buf)
}

/// Pad `plaintext` and encrypt it with AES-CBC
///
/// # Errors
///
/// Returns an error if the key or IV has the wrong length.
pub fn encrypt_aes_cbc(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_iv(iv)?;
    let mut buf = pad_pkcs7(plaintext, AES_BLOCK_SIZE);
    let msg_len = buf.len();
    let bad_key = |_: InvalidLength| CryptoError::InvalidKeyLength(key.len());
    let encrypted = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, msg_len)
            .is_ok(),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, msg_len)
            .is_ok(),
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, msg_len)
            .is_ok(),
        other => return Err(CryptoError::InvalidKeyLength(other)),
    };
    if !encrypted {
        return Err(CryptoError::NotBlockAligned(msg_len));
    }
    Ok(buf)
}

/// Strip PKCS#5/PKCS#7 padding
///
/// The last byte `n` must satisfy `1 <= n <= data.len()` and the final `n`
/// bytes must all equal `n`. `n` is checked against the whole input rather
/// than one block, which accepts every blob the issuer ever produced.
pub fn unpad_pkcs7(data: &[u8]) -> Result<&[u8], CryptoError> {
    let Some(&last) = data.last() else {
        return Err(CryptoError::Empty);
    };

    let pad_len = usize::from(last);
    if pad_len == 0 || pad_len > data.len() {
        return Err(CryptoError::InvalidPaddingSize(last));
    }

    let (plain, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b != last) {
        return Err(CryptoError::InvalidPaddingBytes);
    }
    Ok(plain)
}

/// Append PKCS#7 padding up to the next multiple of `block_size`
///
/// A full block of padding is added when the input is already aligned.
pub fn pad_pkcs7(data: &[u8], block_size: usize) -> Vec<u8> {
    debug_assert!((1..=255).contains(&block_size));
    let pad_len = block_size - data.len() % block_size;
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.resize(data.len() + pad_len, pad_len as u8);
    out
}

fn check_iv(iv: &[u8]) -> Result<(), CryptoError> {
    if iv.len() != AES_BLOCK_SIZE {
        return Err(CryptoError::InvalidIvLength(iv.len()));
    }
    Ok(())
}
