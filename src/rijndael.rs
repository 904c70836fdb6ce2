//! Rijndael block cipher
//!
//! AES fixes the Rijndael block at 128 bits. The envelope format uses the
//! original 256-bit block variant, which no AES implementation provides,
//! so the block transform is implemented here for block and key lengths
//! of 16, 24 or 32 bytes (FIPS-197 "Rijndael" with Nb, Nk in {4, 6, 8}).
//!
//! The state is kept column-major exactly as the input block is laid out:
//! byte `r + 4 * c` is row `r` of column `c`.

use zeroize::Zeroize;

use crate::error::{ErrorCategory, ErrorKind, FileSealError, Result};

/// Largest supported block, eight 32-bit columns
const MAX_BLOCK_LEN: usize = 32;

const SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

const INV_SBOX: [u8; 256] = [
    0x52, 0x09, 0x6a, 0xd5, 0x30, 0x36, 0xa5, 0x38, 0xbf, 0x40, 0xa3, 0x9e, 0x81, 0xf3, 0xd7, 0xfb,
    0x7c, 0xe3, 0x39, 0x82, 0x9b, 0x2f, 0xff, 0x87, 0x34, 0x8e, 0x43, 0x44, 0xc4, 0xde, 0xe9, 0xcb,
    0x54, 0x7b, 0x94, 0x32, 0xa6, 0xc2, 0x23, 0x3d, 0xee, 0x4c, 0x95, 0x0b, 0x42, 0xfa, 0xc3, 0x4e,
    0x08, 0x2e, 0xa1, 0x66, 0x28, 0xd9, 0x24, 0xb2, 0x76, 0x5b, 0xa2, 0x49, 0x6d, 0x8b, 0xd1, 0x25,
    0x72, 0xf8, 0xf6, 0x64, 0x86, 0x68, 0x98, 0x16, 0xd4, 0xa4, 0x5c, 0xcc, 0x5d, 0x65, 0xb6, 0x92,
    0x6c, 0x70, 0x48, 0x50, 0xfd, 0xed, 0xb9, 0xda, 0x5e, 0x15, 0x46, 0x57, 0xa7, 0x8d, 0x9d, 0x84,
    0x90, 0xd8, 0xab, 0x00, 0x8c, 0xbc, 0xd3, 0x0a, 0xf7, 0xe4, 0x58, 0x05, 0xb8, 0xb3, 0x45, 0x06,
    0xd0, 0x2c, 0x1e, 0x8f, 0xca, 0x3f, 0x0f, 0x02, 0xc1, 0xaf, 0xbd, 0x03, 0x01, 0x13, 0x8a, 0x6b,
    0x3a, 0x91, 0x11, 0x41, 0x4f, 0x67, 0xdc, 0xea, 0x97, 0xf2, 0xcf, 0xce, 0xf0, 0xb4, 0xe6, 0x73,
    0x96, 0xac, 0x74, 0x22, 0xe7, 0xad, 0x35, 0x85, 0xe2, 0xf9, 0x37, 0xe8, 0x1c, 0x75, 0xdf, 0x6e,
    0x47, 0xf1, 0x1a, 0x71, 0x1d, 0x29, 0xc5, 0x89, 0x6f, 0xb7, 0x62, 0x0e, 0xaa, 0x18, 0xbe, 0x1b,
    0xfc, 0x56, 0x3e, 0x4b, 0xc6, 0xd2, 0x79, 0x20, 0x9a, 0xdb, 0xc0, 0xfe, 0x78, 0xcd, 0x5a, 0xf4,
    0x1f, 0xdd, 0xa8, 0x33, 0x88, 0x07, 0xc7, 0x31, 0xb1, 0x12, 0x10, 0x59, 0x27, 0x80, 0xec, 0x5f,
    0x60, 0x51, 0x7f, 0xa9, 0x19, 0xb5, 0x4a, 0x0d, 0x2d, 0xe5, 0x7a, 0x9f, 0x93, 0xc9, 0x9c, 0xef,
    0xa0, 0xe0, 0x3b, 0x4d, 0xae, 0x2a, 0xf5, 0xb0, 0xc8, 0xeb, 0xbb, 0x3c, 0x83, 0x53, 0x99, 0x61,
    0x17, 0x2b, 0x04, 0x7e, 0xba, 0x77, 0xd6, 0x26, 0xe1, 0x69, 0x14, 0x63, 0x55, 0x21, 0x0c, 0x7d,
];

/// Rijndael keyed for one block length.
pub struct Rijndael {
    /// Number of 32-bit columns in a block.
    nb: usize,
    rounds: usize,
    shifts: [usize; 3],
    /// Expanded key schedule, `nb * (rounds + 1)` words of 4 bytes.
    round_keys: Vec<u8>,
}

impl Rijndael {
    /// Expands `key` for blocks of `block_len` bytes.
    pub fn new(key: &[u8], block_len: usize) -> Result<Self> {
        let nk = words(key.len(), "key")?;
        let nb = words(block_len, "block")?;
        let rounds = nb.max(nk) + 6;
        let shifts = if nb == 8 { [1, 3, 4] } else { [1, 2, 3] };

        Ok(Self {
            nb,
            rounds,
            shifts,
            round_keys: expand_key(key, nk, nb * (rounds + 1)),
        })
    }

    /// Block length in bytes.
    pub fn block_len(&self) -> usize {
        4 * self.nb
    }

    /// Encrypts one block in place. `block` must be exactly `block_len()` bytes.
    pub fn encrypt_block(&self, block: &mut [u8]) {
        debug_assert_eq!(block.len(), self.block_len());

        self.add_round_key(block, 0);
        for round in 1..self.rounds {
            sub_bytes(block, &SBOX);
            self.shift_rows(block);
            mix_columns(block);
            self.add_round_key(block, round);
        }
        sub_bytes(block, &SBOX);
        self.shift_rows(block);
        self.add_round_key(block, self.rounds);
    }

    /// Decrypts one block in place. `block` must be exactly `block_len()` bytes.
    pub fn decrypt_block(&self, block: &mut [u8]) {
        debug_assert_eq!(block.len(), self.block_len());

        self.add_round_key(block, self.rounds);
        for round in (1..self.rounds).rev() {
            self.inv_shift_rows(block);
            sub_bytes(block, &INV_SBOX);
            self.add_round_key(block, round);
            inv_mix_columns(block);
        }
        self.inv_shift_rows(block);
        sub_bytes(block, &INV_SBOX);
        self.add_round_key(block, 0);
    }

    fn add_round_key(&self, state: &mut [u8], round: usize) {
        let offset = round * self.block_len();
        let key = &self.round_keys[offset..offset + self.block_len()];
        for (s, k) in state.iter_mut().zip(key) {
            *s ^= k;
        }
    }

    fn shift_rows(&self, state: &mut [u8]) {
        let mut scratch = [0u8; MAX_BLOCK_LEN];
        let old = &mut scratch[..state.len()];
        old.copy_from_slice(state);
        for (row, &shift) in (1..4).zip(&self.shifts) {
            for col in 0..self.nb {
                state[row + 4 * col] = old[row + 4 * ((col + shift) % self.nb)];
            }
        }
        scratch.zeroize();
    }

    fn inv_shift_rows(&self, state: &mut [u8]) {
        let mut scratch = [0u8; MAX_BLOCK_LEN];
        let old = &mut scratch[..state.len()];
        old.copy_from_slice(state);
        for (row, &shift) in (1..4).zip(&self.shifts) {
            for col in 0..self.nb {
                state[row + 4 * ((col + shift) % self.nb)] = old[row + 4 * col];
            }
        }
        scratch.zeroize();
    }
}

impl Drop for Rijndael {
    fn drop(&mut self) {
        self.round_keys.zeroize();
    }
}

fn words(len: usize, what: &str) -> Result<usize> {
    match len {
        16 | 24 | 32 => Ok(len / 4),
        _ => Err(FileSealError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            format!("unsupported rijndael {} length: {} bytes", what, len),
        )),
    }
}

fn expand_key(key: &[u8], nk: usize, total_words: usize) -> Vec<u8> {
    let mut w = Vec::with_capacity(4 * total_words);
    w.extend_from_slice(key);

    let mut rcon = 1u8;
    for i in nk..total_words {
        let mut temp = [0u8; 4];
        temp.copy_from_slice(&w[4 * (i - 1)..4 * i]);

        if i % nk == 0 {
            temp.rotate_left(1);
            for b in temp.iter_mut() {
                *b = SBOX[*b as usize];
            }
            temp[0] ^= rcon;
            rcon = xtime(rcon);
        } else if nk > 6 && i % nk == 4 {
            for b in temp.iter_mut() {
                *b = SBOX[*b as usize];
            }
        }

        for j in 0..4 {
            let byte = w[4 * (i - nk) + j] ^ temp[j];
            w.push(byte);
        }
        temp.zeroize();
    }
    w
}

fn sub_bytes(state: &mut [u8], table: &[u8; 256]) {
    for b in state.iter_mut() {
        *b = table[*b as usize];
    }
}

fn mix_columns(state: &mut [u8]) {
    for col in state.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [col[0], col[1], col[2], col[3]];
        col[0] = mul(a0, 2) ^ mul(a1, 3) ^ a2 ^ a3;
        col[1] = a0 ^ mul(a1, 2) ^ mul(a2, 3) ^ a3;
        col[2] = a0 ^ a1 ^ mul(a2, 2) ^ mul(a3, 3);
        col[3] = mul(a0, 3) ^ a1 ^ a2 ^ mul(a3, 2);
    }
}

fn inv_mix_columns(state: &mut [u8]) {
    for col in state.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [col[0], col[1], col[2], col[3]];
        col[0] = mul(a0, 14) ^ mul(a1, 11) ^ mul(a2, 13) ^ mul(a3, 9);
        col[1] = mul(a0, 9) ^ mul(a1, 14) ^ mul(a2, 11) ^ mul(a3, 13);
        col[2] = mul(a0, 13) ^ mul(a1, 9) ^ mul(a2, 14) ^ mul(a3, 11);
        col[3] = mul(a0, 11) ^ mul(a1, 13) ^ mul(a2, 9) ^ mul(a3, 14);
    }
}

/// Multiplication by x in GF(2^8) modulo x^8 + x^4 + x^3 + x + 1.
fn xtime(a: u8) -> u8 {
    (a << 1) ^ if a & 0x80 != 0 { 0x1b } else { 0 }
}

fn mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        a = xtime(a);
        b >>= 1;
    }
    product
}
