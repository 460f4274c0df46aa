//! Session stream cipher shared by both protocol generations.
//!
//! Every payload byte is XORed with the session key, cycling through the key
//! by position. Applying the cipher twice with the same key and offset
//! restores the original bytes, so the same function both enciphers and
//! deciphers.

/// XORs `buf` in place against `key`, starting at key position `offset`.
///
/// `offset` lets a response that arrives in several reads be deciphered chunk
/// by chunk while keeping the key position continuous. An empty key leaves the
/// buffer untouched.
pub fn xor_cipher(buf: &mut [u8], key: &[u8], offset: usize) {
    if key.is_empty() {
        return;
    }

    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[(offset + i) % key.len()];
    }
}

/// Returns an enciphered copy of `data` starting at key position 0.
pub fn xor_copy(data: &[u8], key: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    xor_cipher(&mut out, key, 0);
    out
}
