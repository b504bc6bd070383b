//! Legacy PKCS#9 counter-signatures.
//!
//! The counterSignature attribute value has type SignerInfo (RFC 2985), and
//! since a counter-signature is itself a SignerInfo it can carry further
//! counterSignature attributes, arbitrarily deep.

use cms::signed_data::{SignerIdentifier, SignerInfo as CmsSignerInfo};
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use der::Encode;

use crate::domain::asn1;
use crate::domain::certificate::CertificateView;
use crate::domain::constants::{
    OID_CONTENT_TYPE, OID_COUNTER_SIGNATURE, OID_MESSAGE_DIGEST, OID_SIGNING_TIME,
};
use crate::domain::crypto::HashKind;

/// Decoded PKCS#9 counter-signature.
#[derive(Debug, Clone)]
pub struct Pkcs9CounterSignature {
    /// Index of the counter-signer certificate in the parent's bag.
    pub signer_cert: usize,
    /// signingTime in canonical form; empty when absent.
    pub signing_time: String,
    /// messageDigest over the parent SignerInfo's encryptedDigest, hex.
    pub digest: String,
    pub(crate) digest_bytes: Vec<u8>,
    /// Digest algorithm declared by the counter-signer.
    pub digest_algorithm: Option<ObjectIdentifier>,
    /// The counter-signer's own encryptedDigest; nested counter-signatures
    /// hash this value.
    pub(crate) encrypt_digest: Vec<u8>,
    /// Counter-signatures of this counter-signature.
    pub counter_signatures: Vec<Pkcs9CounterSignature>,
}

impl Pkcs9CounterSignature {
    /// Decode one counterSignature SignerInfo against the parent's
    /// certificate bag. The error is a warning message; the caller drops
    /// the counter-signature and keeps the parent.
    pub fn parse(
        si: &CmsSignerInfo,
        bag: &[CertificateView],
        depth: usize,
        max_depth: usize,
        warnings: &mut Vec<String>,
    ) -> Result<Self, String> {
        let SignerIdentifier::IssuerAndSerialNumber(ias) = &si.sid else {
            return Err("counter-signer certificate not found".to_string());
        };
        let issuer_der = ias
            .issuer
            .to_der()
            .map_err(|_| format!("malformed attribute: {OID_COUNTER_SIGNATURE}"))?;
        let signer_cert = bag
            .iter()
            .position(|c| c.matches_issuer_and_serial(&issuer_der, &ias.serial_number))
            .ok_or_else(|| "counter-signer certificate not found".to_string())?;

        let mut cs = Pkcs9CounterSignature {
            signer_cert,
            signing_time: String::new(),
            digest: String::new(),
            digest_bytes: Vec::new(),
            digest_algorithm: Some(si.digest_alg.oid),
            encrypt_digest: si.signature.as_bytes().to_vec(),
            counter_signatures: Vec::new(),
        };

        let Some(attrs) = &si.signed_attrs else {
            return Ok(cs);
        };
        for attr in attrs.iter() {
            let Some(value) = attr.values.iter().next() else {
                continue;
            };
            if attr.oid == OID_SIGNING_TIME {
                cs.signing_time = asn1::decode_time_any(value, warnings);
            } else if attr.oid == OID_MESSAGE_DIGEST {
                match value.decode_as::<OctetString>() {
                    Ok(d) => {
                        cs.digest = hex::encode(d.as_bytes());
                        cs.digest_bytes = d.as_bytes().to_vec();
                    }
                    Err(_) => {
                        warnings.push(format!("malformed attribute: {OID_MESSAGE_DIGEST}"));
                    }
                }
            } else if attr.oid == OID_COUNTER_SIGNATURE {
                if depth + 1 >= max_depth {
                    warnings.push("nested signature depth exceeded".to_string());
                    continue;
                }
                for nested_value in attr.values.iter() {
                    match nested_value.decode_as::<CmsSignerInfo>() {
                        Ok(nested_si) => {
                            match Self::parse(&nested_si, bag, depth + 1, max_depth, warnings) {
                                Ok(nested) => cs.counter_signatures.push(nested),
                                Err(warning) => warnings.push(warning),
                            }
                        }
                        Err(_) => {
                            warnings.push(format!("malformed attribute: {OID_COUNTER_SIGNATURE}"));
                        }
                    }
                }
            } else if attr.oid == OID_CONTENT_TYPE {
                continue;
            }
        }
        Ok(cs)
    }

    /// Check the messageDigest against the parent's encryptedDigest.
    #[must_use]
    pub fn digest_matches(&self, parent_encrypted_digest: &[u8]) -> bool {
        let Some(oid) = &self.digest_algorithm else {
            return false;
        };
        let Some(kind) = HashKind::from_oid(oid) else {
            return false;
        };
        !self.digest_bytes.is_empty()
            && kind.digest(parent_encrypted_digest) == self.digest_bytes
    }
}
