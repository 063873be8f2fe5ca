//! Triple-DES in ECB mode, operating on hex-string blocks as the gateway's
//! wire-level contract, plus the KCV derivation.
//!
//! `tdes_encrypt`/`tdes_decrypt` accept 32-hex (EDE-2, `K3 = K1`) or 48-hex
//! (EDE-3) keys. Data is processed ECB-style over successive 8-byte blocks.

// Uses
use crate::{
	crypto::des::{decrypt_block, encrypt_block},
	error::CryptoError,
	util::{bytes_to_hex, expect_hex_len, hex_to_bytes},
};

// Constants
const BLOCK_HEX_LEN: usize = 16;
const KEY_HEX_LEN_2KEY: usize = 32;
const KEY_HEX_LEN_3KEY: usize = 48;

struct Keys {
	k1: [u8; 8],
	k2: [u8; 8],
	k3: [u8; 8],
}

fn parse_keys(key_hex: &str, three_key: bool) -> Result<Keys, CryptoError> {
	let expected_len = if three_key {
		KEY_HEX_LEN_3KEY
	} else {
		KEY_HEX_LEN_2KEY
	};
	expect_hex_len(key_hex, expected_len)?;
	let bytes = hex_to_bytes(key_hex)?;

	let mut k1 = [0u8; 8];
	let mut k2 = [0u8; 8];
	k1.copy_from_slice(&bytes[0..8]);
	k2.copy_from_slice(&bytes[8..16]);
	let k3 = if three_key {
		let mut k3 = [0u8; 8];
		k3.copy_from_slice(&bytes[16..24]);
		k3
	} else {
		k1
	};

	Ok(Keys { k1, k2, k3 })
}

fn block_from_hex(hex: &str) -> Result<[u8; 8], CryptoError> {
	let bytes = hex_to_bytes(hex)?;
	if bytes.len() != 8 {
		return Err(CryptoError::InvalidLength {
			expected: 8,
			found: bytes.len(),
		});
	}
	let mut block = [0u8; 8];
	block.copy_from_slice(&bytes);
	Ok(block)
}

/// Encrypts `data` (a multiple of 16 hex chars) under `key` using the
/// EDE pipeline `E(K1) -> D(K2) -> E(K3)`, with `K3 = K1` unless `three_key`.
pub fn tdes_encrypt(data: &str, key: &str, three_key: bool) -> Result<String, CryptoError> {
	if data.is_empty() || data.len() % BLOCK_HEX_LEN != 0 {
		return Err(CryptoError::InvalidLength {
			expected: BLOCK_HEX_LEN,
			found: data.len(),
		});
	}
	let keys = parse_keys(key, three_key)?;

	let mut out = String::with_capacity(data.len());
	for chunk in data.as_bytes().chunks(BLOCK_HEX_LEN) {
		let chunk = std::str::from_utf8(chunk).expect("ascii hex input");
		let block = block_from_hex(chunk)?;
		let stage1 = encrypt_block(block, keys.k1);
		let stage2 = decrypt_block(stage1, keys.k2);
		let stage3 = encrypt_block(stage2, keys.k3);
		out.push_str(&bytes_to_hex(&stage3));
	}
	Ok(out)
}

/// The inverse of [`tdes_encrypt`]: `D(K3) -> E(K2) -> D(K1)`.
pub fn tdes_decrypt(data: &str, key: &str, three_key: bool) -> Result<String, CryptoError> {
	if data.is_empty() || data.len() % BLOCK_HEX_LEN != 0 {
		return Err(CryptoError::InvalidLength {
			expected: BLOCK_HEX_LEN,
			found: data.len(),
		});
	}
	let keys = parse_keys(key, three_key)?;

	let mut out = String::with_capacity(data.len());
	for chunk in data.as_bytes().chunks(BLOCK_HEX_LEN) {
		let chunk = std::str::from_utf8(chunk).expect("ascii hex input");
		let block = block_from_hex(chunk)?;
		let stage1 = decrypt_block(block, keys.k3);
		let stage2 = encrypt_block(stage1, keys.k2);
		let stage3 = decrypt_block(stage2, keys.k1);
		out.push_str(&bytes_to_hex(&stage3));
	}
	Ok(out)
}

/// Key Check Value: the first 6 hex chars of the zero block encrypted under
/// `key`. `key` may be a 32- or 48-hex TDES key; the key's own hex length
/// determines whether it is treated as EDE-2 or EDE-3.
pub fn kcv(key: &str) -> Result<String, CryptoError> {
	let three_key = match key.len() {
		KEY_HEX_LEN_2KEY => false,
		KEY_HEX_LEN_3KEY => true,
		found => {
			return Err(CryptoError::InvalidLength {
				expected: KEY_HEX_LEN_2KEY,
				found,
			})
		}
	};
	let cipher = tdes_encrypt("0000000000000000", key, three_key)?;
	Ok(cipher[..6].to_owned())
}

// Unit Tests
#[cfg(test)]
mod tests {
	use super::*;

	const KEY_2: &str = "0123456789ABCDEFFEDCBA9876543210";
	const KEY_3: &str = "0123456789ABCDEFFEDCBA9876543210AABBCCDDEEFF0011";

	#[test]
	fn ede2_round_trip() {
		let data = "0011223344556677";
		let cipher = tdes_encrypt(data, KEY_2, false).unwrap();
		assert_ne!(cipher, data);
		let plain = tdes_decrypt(&cipher, KEY_2, false).unwrap();
		assert_eq!(plain, data);
	}

	#[test]
	fn ede3_round_trip() {
		let data = "0011223344556677AABBCCDDEEFF0011";
		let cipher = tdes_encrypt(data, KEY_3, true).unwrap();
		let plain = tdes_decrypt(&cipher, KEY_3, true).unwrap();
		assert_eq!(plain, data);
	}

	#[test]
	fn multi_block_ecb_processes_each_block_independently() {
		let single = tdes_encrypt("0011223344556677", KEY_2, false).unwrap();
		let doubled = tdes_encrypt("00112233445566770011223344556677", KEY_2, false);
		// 33 hex chars isn't a multiple of 16, so this must fail outright.
		assert!(doubled.is_err());
		let exactly_two_blocks =
			tdes_encrypt("00112233445566770011223344556678", KEY_2, false).unwrap();
		assert_eq!(&exactly_two_blocks[..16], single);
	}

	#[test]
	fn kcv_matches_manual_zero_block_encryption() {
		let expected = &tdes_encrypt("0000000000000000", KEY_2, false).unwrap()[..6];
		assert_eq!(kcv(KEY_2).unwrap(), expected);
	}

	#[test]
	fn rejects_wrong_key_length() {
		assert!(tdes_encrypt("0011223344556677", "ABCD", false).is_err());
	}
}
