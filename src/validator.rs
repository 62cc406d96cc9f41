//! Concrete ECDSA/P-256 [`SignatureValidator`], feature-gated under
//! `ecdsa-verify`. The core itself treats signature verification as an
//! external collaborator; this is one real implementation of that
//! collaborator, following the same hash-then-verify shape this codebase
//! already uses for its own signed images, generalized from a single
//! fixed trailing signature to the TLV-addressed layout this core's
//! headers use.
//!
//! This is the one site the fault-injection-hardened [`FihResult`] return
//! type exists for: a single bit flip on the wire back to the caller must
//! not turn a rejected signature into an accepted one.

use core::cell::RefCell;

use p256::ecdsa::{signature::DigestVerifier, Signature, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::collaborators::{SignatureValidator, TlvIterator, TlvStep};
use crate::fih::FihResult;
use crate::flash_area::FlashArea;
use crate::header::ImageHeader;

/// Unprotected TLV tag carrying the detached ECDSA/P-256 signature over
/// the image's header, body and protected TLVs.
pub const IMAGE_TLV_ECDSA_SIG: u16 = 0x0022;

const CHUNK: usize = 64;

/// Verifies a slot's SHA-256 digest against a detached ECDSA/P-256
/// signature read out of its TLV stream. `T` is wrapped in a `RefCell`
/// because [`SignatureValidator::validate`] takes `&self` but the TLV
/// iterator it drives is inherently stateful.
pub struct EcdsaP256Validator<T> {
    key: VerifyingKey,
    tlv: RefCell<T>,
}

impl<T: TlvIterator> EcdsaP256Validator<T> {
    pub fn new(key: VerifyingKey, tlv: T) -> Self {
        EcdsaP256Validator { key, tlv: RefCell::new(tlv) }
    }
}

impl<T: TlvIterator> SignatureValidator for EcdsaP256Validator<T> {
    fn validate<A: FlashArea>(&self, area: &A, header: &ImageHeader) -> FihResult {
        let digest = match digest_image::<A>(area, header) {
            Ok(digest) => digest,
            Err(_) => return FihResult::failure(),
        };

        let mut tlv = self.tlv.borrow_mut();
        if tlv.iter_begin(area, header, IMAGE_TLV_ECDSA_SIG, false).is_err() {
            return FihResult::failure();
        }

        let (offset, len) = match tlv.iter_next(area) {
            Ok(TlvStep::Entry { offset, len }) => (offset, len),
            _ => return FihResult::failure(),
        };

        let mut signature_bytes = [0u8; 72];
        let len = len as usize;
        if len > signature_bytes.len() || area.read(offset, &mut signature_bytes[..len]).is_err() {
            return FihResult::failure();
        }

        let signature = match Signature::from_slice(&signature_bytes[..len]) {
            Ok(signature) => signature,
            Err(_) => return FihResult::failure(),
        };

        FihResult::from(self.key.verify_digest(digest, &signature).is_ok())
    }
}

/// Hashes header, body and protected TLVs: everything `hdr_size +
/// img_size + protect_tlv_size` bytes from the start of the slot.
fn digest_image<A: FlashArea>(area: &A, header: &ImageHeader) -> Result<Sha256, crate::error::Error> {
    let total = header.hdr_size as u32 + header.img_size + header.protect_tlv_size as u32;
    let mut digest = Sha256::default();
    let mut buf = [0u8; CHUNK];
    let mut offset = 0u32;
    while offset < total {
        let take = CHUNK.min((total - offset) as usize);
        area.read(offset, &mut buf[..take]).map_err(|_| crate::error::Error::Io)?;
        digest.update(&buf[..take]);
        offset += take as u32;
    }
    Ok(digest)
}
