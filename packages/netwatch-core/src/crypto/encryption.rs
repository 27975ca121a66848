//! # Cipher Engine
//!
//! Encrypts and decrypts byte buffers and streams under AES, RSA or EC keys.
//!
//! ## Ciphertext Envelope
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       CIPHERTEXT ENVELOPE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────┬─────────┬──────────────────┐                              │
//! │  │ version │ scheme  │ key fingerprint  │   header (10 bytes)          │
//! │  │ 1 byte  │ 1 byte  │ 8 bytes          │                              │
//! │  └─────────┴─────────┴──────────────────┘                              │
//! │                                                                         │
//! │  Scheme 1  AES-GCM        nonce(12) ‖ ciphertext ‖ tag(16)             │
//! │  Scheme 2  AES-GCM chunk  chunk_size(u32 LE) ‖ chunk ‖ chunk ‖ ...     │
//! │  Scheme 3  RSA-OAEP       OAEP block (256)                             │
//! │  Scheme 4  ECIES          ephemeral pubkey(33) ‖ nonce ‖ ct ‖ tag      │
//! │  Scheme 5  ECIES chunk    ephemeral pubkey(33) ‖ chunk_size ‖ chunks   │
//! │                                                                         │
//! │  chunk = nonce(12) ‖ ciphertext ‖ tag(16)                              │
//! │                                                                         │
//! │  Every chunk but the last holds exactly chunk_size plaintext bytes.    │
//! │  The last holds fewer, possibly zero.                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Associated Data
//!
//! AES-GCM bodies authenticate everything in front of them (header,
//! ephemeral key, chunk size). Chunks additionally bind
//! `chunk_index (u32 LE) ‖ last_flag`, so chunks cannot be reordered,
//! dropped or cut off without the final one. RSA-OAEP has no associated
//! data; its header is checked against the key before the primitive runs.
//!
//! ## ECIES
//!
//! ```text
//!  ephemeral secret × recipient public ──► ECDH shared secret
//!        │
//!        ▼
//!  HKDF-SHA256(ikm = shared secret,
//!              salt = ephemeral public key (compressed),
//!              info = "netwatch-ecies-v1")  ──►  AES-256-GCM key
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use rsa::Oaep;
use sha2::Sha256;
use std::io::{self, Read, Write};
use zeroize::Zeroizing;

use super::keys::{Key, KeyMaterial, AES_KEY_SIZE, FINGERPRINT_SIZE};
use super::{Algorithm, KeyPurpose};
use crate::error::{Error, Result};

/// Current envelope format version
pub const FORMAT_VERSION: u8 = 1;

/// Size of the envelope header in bytes
pub const HEADER_SIZE: usize = 2 + FINGERPRINT_SIZE;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Largest plaintext RSA-2048 OAEP-SHA256 accepts
pub const RSA_MAX_PLAINTEXT: usize = 190;

/// Default plaintext size of one chunk (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default size above which file payloads are chunked (16 MiB)
pub const DEFAULT_CHUNK_THRESHOLD: usize = 16 * 1024 * 1024;

/// Largest chunk size accepted when encrypting or decrypting (64 MiB)
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

const RSA_BLOCK_SIZE: usize = 256;
const EPHEMERAL_KEY_SIZE: usize = 33;
const ECIES_INFO: &[u8] = b"netwatch-ecies-v1";

// ============================================================================
// SCHEMES
// ============================================================================

/// Envelope scheme identifier (byte 1 of the header)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Scheme {
    /// Single-shot AES-256-GCM
    AesGcm = 1,
    /// Chunked AES-256-GCM
    AesGcmChunked = 2,
    /// RSA-OAEP-SHA256
    RsaOaep = 3,
    /// Single-shot ECIES
    Ecies = 4,
    /// Chunked ECIES
    EciesChunked = 5,
}

impl Scheme {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Scheme::AesGcm),
            2 => Some(Scheme::AesGcmChunked),
            3 => Some(Scheme::RsaOaep),
            4 => Some(Scheme::Ecies),
            5 => Some(Scheme::EciesChunked),
            _ => None,
        }
    }

    /// Algorithm whose keys produce this scheme
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Scheme::AesGcm | Scheme::AesGcmChunked => Algorithm::Aes,
            Scheme::RsaOaep => Algorithm::Rsa,
            Scheme::Ecies | Scheme::EciesChunked => Algorithm::Ec,
        }
    }

    /// Whether the body is split into chunks
    pub fn is_chunked(&self) -> bool {
        matches!(self, Scheme::AesGcmChunked | Scheme::EciesChunked)
    }

    fn single(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Aes => Scheme::AesGcm,
            Algorithm::Rsa => Scheme::RsaOaep,
            Algorithm::Ec => Scheme::Ecies,
        }
    }

    fn chunked(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::Aes => Some(Scheme::AesGcmChunked),
            Algorithm::Rsa => None,
            Algorithm::Ec => Some(Scheme::EciesChunked),
        }
    }

    /// Identify the scheme of an envelope without decrypting it
    pub fn of(ciphertext: &[u8]) -> Option<Self> {
        match ciphertext {
            [FORMAT_VERSION, scheme, ..] => Scheme::from_byte(*scheme),
            _ => None,
        }
    }
}

// ============================================================================
// NONCES & OPTIONS
// ============================================================================

/// A nonce (number used once) for AES-GCM encryption
///
/// ## Critical Security Requirement
///
/// **NEVER reuse a nonce with the same key!** Random nonces are safe for
/// up to 2^32 messages per key. Caller-supplied nonces exist only for
/// deterministic test vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Result<Self> {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::EncryptionFailed(format!("Random source failed: {}", e)))?;
        Ok(Self(bytes))
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// When and how file payloads are split into chunks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Payloads strictly larger than this are chunked
    pub threshold: usize,
    /// Plaintext bytes per chunk
    pub chunk_size: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CHUNK_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(Error::InvalidInput(format!(
            "Chunk size must be between 1 and {} bytes, got {}",
            MAX_CHUNK_SIZE, chunk_size
        )));
    }
    Ok(())
}

// ============================================================================
// AES-GCM PRIMITIVES
// ============================================================================

/// Encrypt with AES-256-GCM, returning `ciphertext ‖ tag`
fn seal(key: &[u8; AES_KEY_SIZE], nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

    cipher
        .encrypt(&AesNonce::from(nonce.0), Payload { msg: plaintext, aad })
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))
}

/// Decrypt `ciphertext ‖ tag` with AES-256-GCM
fn open(key: &[u8; AES_KEY_SIZE], nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::DecryptionFailed(format!("Invalid key: {}", e)))?;

    cipher
        .decrypt(&AesNonce::from(nonce.0), Payload { msg: ciphertext, aad })
        .map_err(|_| Error::DecryptionFailed("Authentication tag mismatch".into()))
}

/// Seal `value` under `key` with a random nonce, returning `nonce ‖ ct ‖ tag`
///
/// Used by the secure store to wrap persisted entries.
pub(crate) fn seal_with_random_nonce(
    key: &[u8; AES_KEY_SIZE],
    value: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let nonce = Nonce::random()?;
    let ciphertext = seal(key, &nonce, value, aad)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(nonce.as_bytes());
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Open a value produced by [`seal_with_random_nonce`]
pub(crate) fn open_sealed(key: &[u8; AES_KEY_SIZE], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let (nonce, ciphertext) = split_nonce(sealed)?;
    open(key, &nonce, ciphertext, aad)
}

fn split_nonce(data: &[u8]) -> Result<(Nonce, &[u8])> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::DecryptionFailed("Ciphertext too short".into()));
    }
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&data[..NONCE_SIZE]);
    Ok((Nonce(nonce), &data[NONCE_SIZE..]))
}

// ============================================================================
// HEADER & KEY SCHEDULE
// ============================================================================

fn header(scheme: Scheme, material: &KeyMaterial) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_SIZE + EPHEMERAL_KEY_SIZE);
    header.push(FORMAT_VERSION);
    header.push(scheme as u8);
    header.extend_from_slice(&material.fingerprint());
    header
}

/// Validate a header against the decrypting key and return its scheme
fn check_header(header: &[u8], key: &Key) -> Result<Scheme> {
    if header.len() < HEADER_SIZE {
        return Err(Error::DecryptionFailed("Ciphertext too short".into()));
    }
    if header[0] != FORMAT_VERSION {
        return Err(Error::DecryptionFailed(format!(
            "Unsupported envelope version {}",
            header[0]
        )));
    }
    let scheme = Scheme::from_byte(header[1])
        .ok_or_else(|| Error::DecryptionFailed(format!("Unknown envelope scheme {}", header[1])))?;

    if scheme.algorithm() != key.algorithm() {
        return Err(Error::DecryptionFailed(format!(
            "Ciphertext was produced by an {} key, not {}",
            scheme.algorithm(),
            key.algorithm()
        )));
    }
    if header[2..HEADER_SIZE] != key.material().fingerprint() {
        return Err(Error::DecryptionFailed(
            "Ciphertext was produced by a different key".into(),
        ));
    }
    Ok(scheme)
}

fn derive_ecies_key(shared_secret: &[u8], ephemeral_public: &[u8]) -> Result<Zeroizing<[u8; AES_KEY_SIZE]>> {
    use hkdf::Hkdf;

    let hkdf = Hkdf::<Sha256>::new(Some(ephemeral_public), shared_secret);
    let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
    hkdf.expand(ECIES_INFO, &mut *key)
        .map_err(|_| Error::Internal("HKDF expansion failed".into()))?;
    Ok(key)
}

/// Sender side of ECIES: a fresh ephemeral key agreed with the recipient
fn ecies_sender_key(
    recipient: &p256::SecretKey,
) -> Result<([u8; EPHEMERAL_KEY_SIZE], Zeroizing<[u8; AES_KEY_SIZE]>)> {
    let ephemeral = p256::ecdh::EphemeralSecret::random(&mut rand::rngs::OsRng);
    let encoded = ephemeral.public_key().to_encoded_point(true);

    let mut ephemeral_public = [0u8; EPHEMERAL_KEY_SIZE];
    ephemeral_public.copy_from_slice(encoded.as_bytes());

    let shared = ephemeral.diffie_hellman(&recipient.public_key());
    let key = derive_ecies_key(shared.raw_secret_bytes(), &ephemeral_public)?;
    Ok((ephemeral_public, key))
}

/// Recipient side of ECIES
fn ecies_recipient_key(
    recipient: &p256::SecretKey,
    ephemeral_public: &[u8],
) -> Result<Zeroizing<[u8; AES_KEY_SIZE]>> {
    let ephemeral = p256::PublicKey::from_sec1_bytes(ephemeral_public)
        .map_err(|_| Error::DecryptionFailed("Invalid ephemeral public key".into()))?;

    let shared = p256::ecdh::diffie_hellman(recipient.to_nonzero_scalar(), ephemeral.as_affine());
    derive_ecies_key(shared.raw_secret_bytes(), ephemeral_public)
}

/// Start an envelope: the prefix bytes (used as associated data) and the
/// AES key that seals the body
fn begin_envelope(
    key: &Key,
    scheme: Scheme,
) -> Result<(Vec<u8>, Zeroizing<[u8; AES_KEY_SIZE]>)> {
    let mut prefix = header(scheme, key.material());
    let content_key = match key.material() {
        KeyMaterial::Aes(aes) => Zeroizing::new(*aes.as_bytes()),
        KeyMaterial::Ec(secret) => {
            let (ephemeral_public, derived) = ecies_sender_key(secret)?;
            prefix.extend_from_slice(&ephemeral_public);
            derived
        }
        KeyMaterial::Rsa(_) => {
            return Err(Error::UnsupportedAlgorithm(
                "RSA keys encrypt with OAEP, not AES-GCM envelopes".into(),
            ))
        }
    };
    Ok((prefix, content_key))
}

/// Recover the content key of a parsed envelope, reading the ephemeral
/// public key from `ephemeral` for EC keys
fn content_key_for(key: &Key, ephemeral: Option<&[u8]>) -> Result<Zeroizing<[u8; AES_KEY_SIZE]>> {
    match (key.material(), ephemeral) {
        (KeyMaterial::Aes(aes), _) => Ok(Zeroizing::new(*aes.as_bytes())),
        (KeyMaterial::Ec(secret), Some(ephemeral_public)) => {
            ecies_recipient_key(secret, ephemeral_public)
        }
        _ => Err(Error::DecryptionFailed("Malformed envelope".into())),
    }
}

fn chunk_aad(prefix: &[u8], index: u32, last: bool) -> Vec<u8> {
    let mut aad = Vec::with_capacity(prefix.len() + 5);
    aad.extend_from_slice(prefix);
    aad.extend_from_slice(&index.to_le_bytes());
    aad.push(last as u8);
    aad
}

// ============================================================================
// BUFFER API
// ============================================================================

/// Encrypt a buffer under `key` with a fresh random nonce
///
/// ## Parameters
///
/// - `key`: A key generated with the encrypt purpose
/// - `plaintext`: Bytes to encrypt (may be empty)
///
/// ## Returns
///
/// A self-describing envelope. Two calls with identical input produce
/// different envelopes.
///
/// ## Errors
///
/// - `UnsupportedAlgorithm` if the key lacks the encrypt purpose
/// - `PayloadTooLarge` for RSA plaintexts above 190 bytes
pub fn encrypt(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>> {
    key.require(KeyPurpose::Encrypt)?;

    match key.material() {
        KeyMaterial::Rsa(private) => rsa_encrypt(key, private, plaintext),
        _ => encrypt_single(key, plaintext, Nonce::random()?),
    }
}

/// Encrypt a buffer with a caller-supplied nonce
///
/// Deterministic for a given `(key, plaintext, nonce)`. Only AES keys
/// accept a nonce; reusing one with the same key voids confidentiality.
///
/// ## Errors
///
/// `UnsupportedAlgorithm` for RSA and EC keys, or if the key lacks the
/// encrypt purpose.
pub fn encrypt_with_nonce(key: &Key, plaintext: &[u8], nonce: Nonce) -> Result<Vec<u8>> {
    key.require(KeyPurpose::Encrypt)?;

    if key.algorithm() != Algorithm::Aes {
        return Err(Error::UnsupportedAlgorithm(format!(
            "{} encryption does not accept a caller-supplied nonce",
            key.algorithm()
        )));
    }
    encrypt_single(key, plaintext, nonce)
}

fn encrypt_single(key: &Key, plaintext: &[u8], nonce: Nonce) -> Result<Vec<u8>> {
    let (mut envelope, content_key) = begin_envelope(key, Scheme::single(key.algorithm()))?;
    let ciphertext = seal(&content_key, &nonce, plaintext, &envelope)?;

    envelope.reserve(NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(nonce.as_bytes());
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

fn rsa_encrypt(key: &Key, private: &rsa::RsaPrivateKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.len() > RSA_MAX_PLAINTEXT {
        return Err(Error::PayloadTooLarge {
            algorithm: "RSA",
            size: plaintext.len(),
            limit: RSA_MAX_PLAINTEXT,
        });
    }

    let public = private.to_public_key();
    let block = public
        .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|e| Error::EncryptionFailed(format!("RSA-OAEP failed: {}", e)))?;

    let mut envelope = header(Scheme::RsaOaep, key.material());
    envelope.extend_from_slice(&block);
    Ok(envelope)
}

/// Decrypt any envelope produced by this module
///
/// Single-shot and chunked envelopes are both accepted.
///
/// ## Errors
///
/// - `UnsupportedAlgorithm` if the key lacks the decrypt purpose
/// - `DecryptionFailed` on tag mismatch, malformed structure, wrong key or
///   wrong algorithm. No partial plaintext is ever returned.
pub fn decrypt(key: &Key, ciphertext: &[u8]) -> Result<Vec<u8>> {
    key.require(KeyPurpose::Decrypt)?;
    let scheme = check_header(ciphertext, key)?;
    let body = &ciphertext[HEADER_SIZE..];

    match scheme {
        Scheme::AesGcm => {
            let content_key = content_key_for(key, None)?;
            let (nonce, sealed) = split_nonce(body)?;
            open(&content_key, &nonce, sealed, &ciphertext[..HEADER_SIZE])
        }
        Scheme::Ecies => {
            if body.len() < EPHEMERAL_KEY_SIZE {
                return Err(Error::DecryptionFailed("Ciphertext too short".into()));
            }
            let prefix_len = HEADER_SIZE + EPHEMERAL_KEY_SIZE;
            let content_key = content_key_for(key, Some(&body[..EPHEMERAL_KEY_SIZE]))?;
            let (nonce, sealed) = split_nonce(&ciphertext[prefix_len..])?;
            open(&content_key, &nonce, sealed, &ciphertext[..prefix_len])
        }
        Scheme::RsaOaep => {
            let KeyMaterial::Rsa(private) = key.material() else {
                return Err(Error::DecryptionFailed("Malformed envelope".into()));
            };
            if body.len() != RSA_BLOCK_SIZE {
                return Err(Error::DecryptionFailed(format!(
                    "RSA block must be {} bytes, found {}",
                    RSA_BLOCK_SIZE,
                    body.len()
                )));
            }
            private
                .decrypt(Oaep::new::<Sha256>(), body)
                .map_err(|_| Error::DecryptionFailed("RSA-OAEP decryption failed".into()))
        }
        Scheme::AesGcmChunked | Scheme::EciesChunked => {
            let mut plaintext = Vec::with_capacity(body.len());
            decrypt_stream(key, ciphertext, &mut plaintext)?;
            Ok(plaintext)
        }
    }
}

/// Encrypt a file payload
///
/// Payloads larger than `options.threshold` are split into independently
/// authenticated chunks of `options.chunk_size` bytes. RSA keys never chunk
/// and keep their 190-byte limit.
pub fn encrypt_file(key: &Key, data: &[u8], options: &ChunkOptions) -> Result<Vec<u8>> {
    if data.len() <= options.threshold || key.algorithm() == Algorithm::Rsa {
        return encrypt(key, data);
    }

    let chunks = data.len() / options.chunk_size.max(1) + 1;
    let mut envelope = Vec::with_capacity(data.len() + chunks * (NONCE_SIZE + TAG_SIZE) + 64);
    encrypt_stream(key, data, &mut envelope, options.chunk_size)?;
    Ok(envelope)
}

// ============================================================================
// STREAMING API
// ============================================================================

/// Fill `buf` from `reader`, stopping early only at end of input
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::StorageReadError(e.to_string())),
        }
    }
    Ok(filled)
}

fn write_all<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer
        .write_all(bytes)
        .map_err(|e| Error::StorageWriteError(e.to_string()))
}

/// Encrypt everything `reader` yields into the chunked envelope format
///
/// Memory use is bounded by one chunk.
///
/// ## Returns
///
/// Number of plaintext bytes consumed.
///
/// ## Errors
///
/// `UnsupportedAlgorithm` for RSA keys, `InvalidInput` for a chunk size
/// outside `1..=MAX_CHUNK_SIZE`, I/O failures as storage errors.
pub fn encrypt_stream<R: Read, W: Write>(
    key: &Key,
    mut reader: R,
    mut writer: W,
    chunk_size: usize,
) -> Result<u64> {
    key.require(KeyPurpose::Encrypt)?;
    check_chunk_size(chunk_size)?;

    let scheme = Scheme::chunked(key.algorithm()).ok_or_else(|| {
        Error::UnsupportedAlgorithm(format!(
            "RSA keys cannot encrypt streams; payloads are limited to {} bytes",
            RSA_MAX_PLAINTEXT
        ))
    })?;

    let (mut prefix, content_key) = begin_envelope(key, scheme)?;
    prefix.extend_from_slice(&(chunk_size as u32).to_le_bytes());
    write_all(&mut writer, &prefix)?;

    let mut buffer = Zeroizing::new(vec![0u8; chunk_size]);
    let mut index: u32 = 0;
    let mut total = 0u64;

    loop {
        let read = read_full(&mut reader, &mut buffer)?;
        let last = read < chunk_size;

        let nonce = Nonce::random()?;
        let sealed = seal(&content_key, &nonce, &buffer[..read], &chunk_aad(&prefix, index, last))?;
        write_all(&mut writer, nonce.as_bytes())?;
        write_all(&mut writer, &sealed)?;
        total += read as u64;

        if last {
            break;
        }
        index = index
            .checked_add(1)
            .ok_or_else(|| Error::EncryptionFailed("Too many chunks".into()))?;
    }

    writer
        .flush()
        .map_err(|e| Error::StorageWriteError(e.to_string()))?;
    tracing::debug!(bytes = total, chunks = index + 1, "Stream encrypted");
    Ok(total)
}

/// Decrypt an envelope read from `reader`, writing plaintext to `writer`
///
/// Chunked envelopes are processed one chunk at a time; single-shot
/// envelopes are read whole and decrypted in one step.
///
/// Plaintext of chunks that authenticated is written before later chunks
/// are checked. Callers that need all-or-nothing output must write to a
/// temporary destination and discard it on error.
///
/// ## Returns
///
/// Number of plaintext bytes written.
pub fn decrypt_stream<R: Read, W: Write>(key: &Key, mut reader: R, mut writer: W) -> Result<u64> {
    key.require(KeyPurpose::Decrypt)?;

    let mut prefix = vec![0u8; HEADER_SIZE];
    if read_full(&mut reader, &mut prefix)? < HEADER_SIZE {
        return Err(Error::DecryptionFailed("Ciphertext too short".into()));
    }
    let scheme = check_header(&prefix, key)?;

    if !scheme.is_chunked() {
        let mut envelope = prefix;
        reader
            .read_to_end(&mut envelope)
            .map_err(|e| Error::StorageReadError(e.to_string()))?;
        let plaintext = decrypt(key, &envelope)?;
        write_all(&mut writer, &plaintext)?;
        return Ok(plaintext.len() as u64);
    }

    let content_key = if scheme == Scheme::EciesChunked {
        let mut ephemeral_public = [0u8; EPHEMERAL_KEY_SIZE];
        if read_full(&mut reader, &mut ephemeral_public)? < EPHEMERAL_KEY_SIZE {
            return Err(Error::DecryptionFailed("Ciphertext too short".into()));
        }
        prefix.extend_from_slice(&ephemeral_public);
        content_key_for(key, Some(&ephemeral_public))?
    } else {
        content_key_for(key, None)?
    };

    let mut size_bytes = [0u8; 4];
    if read_full(&mut reader, &mut size_bytes)? < size_bytes.len() {
        return Err(Error::DecryptionFailed("Ciphertext too short".into()));
    }
    let chunk_size = u32::from_le_bytes(size_bytes) as usize;
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(Error::DecryptionFailed(format!("Invalid chunk size {}", chunk_size)));
    }
    prefix.extend_from_slice(&size_bytes);

    let record_size = NONCE_SIZE + chunk_size + TAG_SIZE;
    let mut record = vec![0u8; record_size];
    let mut index: u32 = 0;
    let mut total = 0u64;

    loop {
        let read = read_full(&mut reader, &mut record)?;
        if read < NONCE_SIZE + TAG_SIZE {
            return Err(Error::DecryptionFailed("Truncated chunk stream".into()));
        }
        let last = read < record_size;

        let (nonce, sealed) = split_nonce(&record[..read])?;
        let plaintext = Zeroizing::new(open(&content_key, &nonce, sealed, &chunk_aad(&prefix, index, last))?);
        write_all(&mut writer, &plaintext)?;
        total += plaintext.len() as u64;

        if last {
            break;
        }
        index = index
            .checked_add(1)
            .ok_or_else(|| Error::DecryptionFailed("Too many chunks".into()))?;
    }

    writer
        .flush()
        .map_err(|e| Error::StorageWriteError(e.to_string()))?;
    Ok(total)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::test_keys;
    use crate::crypto::Purposes;

    fn small_chunks() -> ChunkOptions {
        ChunkOptions { threshold: 1024, chunk_size: 1024 }
    }

    #[test]
    fn test_roundtrip_every_algorithm() {
        for algorithm in Algorithm::ALL {
            let key = test_keys::key("k", algorithm);
            let ciphertext = encrypt(&key, b"Hello World").unwrap();
            assert_eq!(decrypt(&key, &ciphertext).unwrap(), b"Hello World");
        }
    }

    #[test]
    fn test_empty_plaintext() {
        for algorithm in Algorithm::ALL {
            let key = test_keys::key("k", algorithm);
            let ciphertext = encrypt(&key, b"").unwrap();
            assert!(decrypt(&key, &ciphertext).unwrap().is_empty());
        }
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = test_keys::key("k2", Algorithm::Aes);
        let first = encrypt(&key, b"Hello World").unwrap();
        let second = encrypt(&key, b"Hello World").unwrap();

        assert_ne!(first, second);
        assert_eq!(decrypt(&key, &first).unwrap(), b"Hello World");
        assert_eq!(decrypt(&key, &second).unwrap(), b"Hello World");
    }

    #[test]
    fn test_envelope_layout() {
        let key = test_keys::key("k", Algorithm::Aes);
        let ciphertext = encrypt(&key, b"abc").unwrap();

        assert_eq!(ciphertext[0], FORMAT_VERSION);
        assert_eq!(Scheme::of(&ciphertext), Some(Scheme::AesGcm));
        assert_eq!(&ciphertext[2..HEADER_SIZE], &key.material().fingerprint());
        assert_eq!(ciphertext.len(), HEADER_SIZE + NONCE_SIZE + 3 + TAG_SIZE);

        let ec = test_keys::key("e", Algorithm::Ec);
        let ciphertext = encrypt(&ec, b"abc").unwrap();
        assert_eq!(Scheme::of(&ciphertext), Some(Scheme::Ecies));
        assert_eq!(
            ciphertext.len(),
            HEADER_SIZE + EPHEMERAL_KEY_SIZE + NONCE_SIZE + 3 + TAG_SIZE
        );
    }

    #[test]
    fn test_caller_nonce_is_deterministic() {
        let key = test_keys::key("k", Algorithm::Aes);
        let nonce = Nonce::from_bytes([7u8; NONCE_SIZE]);

        let first = encrypt_with_nonce(&key, b"same", nonce).unwrap();
        let second = encrypt_with_nonce(&key, b"same", nonce).unwrap();
        assert_eq!(first, second);
        assert_eq!(decrypt(&key, &first).unwrap(), b"same");
    }

    #[test]
    fn test_caller_nonce_rejected_for_asymmetric_keys() {
        for algorithm in [Algorithm::Rsa, Algorithm::Ec] {
            let key = test_keys::key("k", algorithm);
            let result = encrypt_with_nonce(&key, b"x", Nonce::from_bytes([0u8; NONCE_SIZE]));
            assert!(matches!(result, Err(Error::UnsupportedAlgorithm(_))));
        }
    }

    #[test]
    fn test_rsa_payload_limit() {
        let key = test_keys::key("r", Algorithm::Rsa);

        let at_limit = vec![0x41u8; RSA_MAX_PLAINTEXT];
        let ciphertext = encrypt(&key, &at_limit).unwrap();
        assert_eq!(ciphertext.len(), HEADER_SIZE + RSA_BLOCK_SIZE);
        assert_eq!(decrypt(&key, &ciphertext).unwrap(), at_limit);

        let over = vec![0x41u8; RSA_MAX_PLAINTEXT + 1];
        match encrypt(&key, &over) {
            Err(Error::PayloadTooLarge { size, limit, .. }) => {
                assert_eq!(size, 191);
                assert_eq!(limit, 190);
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = test_keys::key("a", Algorithm::Aes);
        let b = test_keys::key("b", Algorithm::Aes);
        let ciphertext = encrypt(&a, b"secret").unwrap();
        assert!(matches!(decrypt(&b, &ciphertext), Err(Error::DecryptionFailed(_))));

        let ec_a = test_keys::key("a", Algorithm::Ec);
        let ec_b = test_keys::key("b", Algorithm::Ec);
        let ciphertext = encrypt(&ec_a, b"secret").unwrap();
        assert!(matches!(decrypt(&ec_b, &ciphertext), Err(Error::DecryptionFailed(_))));

        let rsa_a = test_keys::key("a", Algorithm::Rsa);
        let rsa_b = test_keys::other_rsa_key("b");
        let ciphertext = encrypt(&rsa_a, b"secret").unwrap();
        assert!(matches!(decrypt(&rsa_b, &ciphertext), Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_wrong_algorithm_fails() {
        let aes = test_keys::key("a", Algorithm::Aes);
        let ec = test_keys::key("e", Algorithm::Ec);
        let ciphertext = encrypt(&aes, b"secret").unwrap();
        assert!(matches!(decrypt(&ec, &ciphertext), Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_tampering_detected() {
        for algorithm in [Algorithm::Aes, Algorithm::Ec] {
            let key = test_keys::key("k", algorithm);
            let ciphertext = encrypt(&key, b"Hello World").unwrap();

            for position in [1, ciphertext.len() - 1, ciphertext.len() / 2] {
                let mut tampered = ciphertext.clone();
                tampered[position] ^= 0x01;
                assert!(matches!(decrypt(&key, &tampered), Err(Error::DecryptionFailed(_))));
            }
        }
    }

    #[test]
    fn test_malformed_input() {
        let key = test_keys::key("k", Algorithm::Aes);
        assert!(matches!(decrypt(&key, b""), Err(Error::DecryptionFailed(_))));
        assert!(matches!(decrypt(&key, b"garbage"), Err(Error::DecryptionFailed(_))));

        let ciphertext = encrypt(&key, b"Hello").unwrap();
        assert!(matches!(
            decrypt(&key, &ciphertext[..HEADER_SIZE + 4]),
            Err(Error::DecryptionFailed(_))
        ));

        let mut wrong_version = ciphertext.clone();
        wrong_version[0] = 9;
        assert!(matches!(decrypt(&key, &wrong_version), Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_purpose_enforced() {
        let material = KeyMaterial::generate(Algorithm::Aes).unwrap();
        let decrypt_only = test_keys::key_with("d", material, Purposes::DECRYPT);
        assert!(matches!(
            encrypt(&decrypt_only, b"x"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_small_files_are_not_chunked() {
        let key = test_keys::key("k", Algorithm::Aes);
        let ciphertext = encrypt_file(&key, &[1u8; 1024], &small_chunks()).unwrap();
        assert_eq!(Scheme::of(&ciphertext), Some(Scheme::AesGcm));
    }

    #[test]
    fn test_chunked_file_roundtrip() {
        for algorithm in [Algorithm::Aes, Algorithm::Ec] {
            let key = test_keys::key("k", algorithm);
            // Partial final chunk and exact multiple of the chunk size
            for len in [5000usize, 4096] {
                let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                let ciphertext = encrypt_file(&key, &data, &small_chunks()).unwrap();

                assert!(Scheme::of(&ciphertext).unwrap().is_chunked());
                assert_eq!(decrypt(&key, &ciphertext).unwrap(), data);
            }
        }
    }

    #[test]
    fn test_chunk_reordering_detected() {
        let key = test_keys::key("k", Algorithm::Aes);
        let data = vec![0xAAu8; 4000];
        let ciphertext = encrypt_file(&key, &data, &small_chunks()).unwrap();

        let body = HEADER_SIZE + 4;
        let record = NONCE_SIZE + 1024 + TAG_SIZE;
        let mut swapped = ciphertext.clone();
        let (first, rest) = swapped[body..].split_at_mut(record);
        first.swap_with_slice(&mut rest[..record]);

        assert!(matches!(decrypt(&key, &swapped), Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_chunk_truncation_detected() {
        let key = test_keys::key("k", Algorithm::Aes);
        let data = vec![0x55u8; 4096];
        let ciphertext = encrypt_file(&key, &data, &small_chunks()).unwrap();

        // Drop the trailing empty chunk
        let truncated = &ciphertext[..ciphertext.len() - (NONCE_SIZE + TAG_SIZE)];
        assert!(matches!(decrypt(&key, truncated), Err(Error::DecryptionFailed(_))));

        // Cut a full chunk in half
        let truncated = &ciphertext[..HEADER_SIZE + 4 + 600];
        assert!(matches!(decrypt(&key, truncated), Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_rsa_files_keep_limit() {
        let key = test_keys::key("r", Algorithm::Rsa);
        let result = encrypt_file(&key, &vec![0u8; 4096], &small_chunks());
        assert!(matches!(result, Err(Error::PayloadTooLarge { .. })));

        let mut sink = Vec::new();
        let result = encrypt_stream(&key, &b"data"[..], &mut sink, 1024);
        assert!(matches!(result, Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_stream_roundtrip() {
        let key = test_keys::key("k", Algorithm::Ec);
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7) as u8).collect();

        let mut encrypted = Vec::new();
        let read = encrypt_stream(&key, &data[..], &mut encrypted, 777).unwrap();
        assert_eq!(read, data.len() as u64);

        let mut decrypted = Vec::new();
        let written = decrypt_stream(&key, &encrypted[..], &mut decrypted).unwrap();
        assert_eq!(written, data.len() as u64);
        assert_eq!(decrypted, data);
    }

    #[test]
    fn test_decrypt_stream_accepts_single_shot() {
        let key = test_keys::key("k", Algorithm::Aes);
        let ciphertext = encrypt(&key, b"short").unwrap();

        let mut out = Vec::new();
        decrypt_stream(&key, &ciphertext[..], &mut out).unwrap();
        assert_eq!(out, b"short");
    }

    #[test]
    fn test_invalid_chunk_size() {
        let key = test_keys::key("k", Algorithm::Aes);
        let mut sink = Vec::new();
        assert!(matches!(
            encrypt_stream(&key, &b""[..], &mut sink, 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sealed_value_roundtrip() {
        let key = [9u8; AES_KEY_SIZE];
        let sealed = seal_with_random_nonce(&key, b"value", b"entry").unwrap();
        assert_eq!(open_sealed(&key, &sealed, b"entry").unwrap(), b"value");
        assert!(open_sealed(&key, &sealed, b"other").is_err());
    }
}
