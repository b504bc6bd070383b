//! Digest dispatch and public-key signature verification.
//!
//! Authenticode still ships MD5 and SHA-1 blobs, so the digest enumeration
//! covers the full legacy set even though new signatures are SHA-2 only.

use const_oid::ObjectIdentifier;
use md5::Md5;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::domain::constants::*;

/// Digest algorithms the parser understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashKind {
    /// Map a digest-algorithm OID onto a hash kind.
    #[must_use]
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        if *oid == OID_MD5 {
            Some(HashKind::Md5)
        } else if *oid == OID_SHA1 {
            Some(HashKind::Sha1)
        } else if *oid == OID_SHA256 {
            Some(HashKind::Sha256)
        } else if *oid == OID_SHA384 {
            Some(HashKind::Sha384)
        } else if *oid == OID_SHA512 {
            Some(HashKind::Sha512)
        } else {
            None
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            HashKind::Md5 => "md5",
            HashKind::Sha1 => "sha1",
            HashKind::Sha256 => "sha256",
            HashKind::Sha384 => "sha384",
            HashKind::Sha512 => "sha512",
        }
    }

    #[must_use]
    pub fn output_len(self) -> usize {
        match self {
            HashKind::Md5 => 16,
            HashKind::Sha1 => 20,
            HashKind::Sha256 => 32,
            HashKind::Sha384 => 48,
            HashKind::Sha512 => 64,
        }
    }

    /// One-shot digest of `data`.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashKind::Md5 => Md5::digest(data).to_vec(),
            HashKind::Sha1 => Sha1::digest(data).to_vec(),
            HashKind::Sha256 => Sha256::digest(data).to_vec(),
            HashKind::Sha384 => Sha384::digest(data).to_vec(),
            HashKind::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Verify `signature` over `message` with the subject public key of
/// `spki`. The scheme is chosen from the pair of declared algorithms: the
/// signer's digestAlgorithm and its digestEncryptAlgorithm (rsaEncryption
/// leaves the hash to the digest algorithm, the `*WithRSAEncryption` and
/// `ecdsa-with-*` forms carry it themselves). A pair that names no
/// supported scheme, or disagrees with the key, reports `false`.
#[must_use]
pub fn verify_message_signature(
    spki: &SubjectPublicKeyInfoOwned,
    digest_algorithm: Option<&ObjectIdentifier>,
    signature_algorithm: Option<&ObjectIdentifier>,
    message: &[u8],
    signature: &[u8],
) -> bool {
    let Some(key_bytes) = spki.subject_public_key.as_bytes() else {
        return false;
    };
    let Some(signature_algorithm) = signature_algorithm else {
        return false;
    };
    let digest_kind = digest_algorithm.and_then(HashKind::from_oid);

    match (digest_kind, signature_algorithm) {
        (Some(HashKind::Md5), &OID_RSA_ENCRYPTION) | (_, &OID_MD5_WITH_RSA) => {
            verify_rsa(key_bytes, HashKind::Md5, message, signature)
        }
        (Some(HashKind::Sha1), &OID_RSA_ENCRYPTION) | (_, &OID_SHA1_WITH_RSA) => {
            verify_rsa(key_bytes, HashKind::Sha1, message, signature)
        }
        (Some(HashKind::Sha256), &OID_RSA_ENCRYPTION) | (_, &OID_SHA256_WITH_RSA) => {
            verify_rsa(key_bytes, HashKind::Sha256, message, signature)
        }
        (Some(HashKind::Sha384), &OID_RSA_ENCRYPTION) | (_, &OID_SHA384_WITH_RSA) => {
            verify_rsa(key_bytes, HashKind::Sha384, message, signature)
        }
        (Some(HashKind::Sha512), &OID_RSA_ENCRYPTION) | (_, &OID_SHA512_WITH_RSA) => {
            verify_rsa(key_bytes, HashKind::Sha512, message, signature)
        }
        (Some(HashKind::Sha256), &OID_EC_PUBLIC_KEY) | (_, &OID_ECDSA_SHA256) => {
            verify_p256(key_bytes, &HashKind::Sha256.digest(message), signature)
        }
        (Some(HashKind::Sha384), &OID_EC_PUBLIC_KEY) | (_, &OID_ECDSA_SHA384) => {
            verify_p256(key_bytes, &HashKind::Sha384.digest(message), signature)
        }
        _ => {
            log::debug!(
                "unsupported algorithm pair {digest_algorithm:?}/{signature_algorithm}"
            );
            false
        }
    }
}

fn verify_rsa(key_bytes: &[u8], hash: HashKind, message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = RsaPublicKey::from_pkcs1_der(key_bytes) else {
        return false;
    };
    let scheme = match hash {
        HashKind::Md5 => Pkcs1v15Sign::new::<Md5>(),
        HashKind::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        HashKind::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashKind::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashKind::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    };
    key.verify(scheme, &hash.digest(message), signature).is_ok()
}

fn verify_p256(key_bytes: &[u8], digest: &[u8], signature: &[u8]) -> bool {
    use p256::ecdsa::signature::hazmat::PrehashVerifier;

    let Ok(key) = p256::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes) else {
        return false;
    };
    let Ok(sig) = p256::ecdsa::Signature::from_der(signature) else {
        return false;
    };
    key.verify_prehash(digest, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_mapping() {
        assert_eq!(HashKind::from_oid(&OID_SHA256), Some(HashKind::Sha256));
        assert_eq!(HashKind::from_oid(&OID_MD5), Some(HashKind::Md5));
        assert_eq!(HashKind::from_oid(&OID_RSA_ENCRYPTION), None);
    }

    #[test]
    fn digest_lengths() {
        for kind in [
            HashKind::Md5,
            HashKind::Sha1,
            HashKind::Sha256,
            HashKind::Sha384,
            HashKind::Sha512,
        ] {
            assert_eq!(kind.digest(b"abc").len(), kind.output_len());
        }
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            hex::encode(HashKind::Sha256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn rejects_unsupported_or_mismatched_algorithm_pairs() {
        use der::asn1::BitString;
        use x509_cert::spki::AlgorithmIdentifierOwned;

        let spki = SubjectPublicKeyInfoOwned {
            algorithm: AlgorithmIdentifierOwned {
                oid: OID_RSA_ENCRYPTION,
                parameters: None,
            },
            subject_public_key: BitString::from_bytes(&[0x30, 0x00]).unwrap(),
        };
        // Missing signature algorithm.
        assert!(!verify_message_signature(
            &spki,
            Some(&OID_SHA256),
            None,
            b"m",
            b"s"
        ));
        // rsaEncryption alone names no hash.
        assert!(!verify_message_signature(
            &spki,
            None,
            Some(&OID_RSA_ENCRYPTION),
            b"m",
            b"s"
        ));
        // ECDSA declared over an RSA key.
        assert!(!verify_message_signature(
            &spki,
            Some(&OID_SHA256),
            Some(&OID_ECDSA_SHA256),
            b"m",
            b"s"
        ));
    }
}
