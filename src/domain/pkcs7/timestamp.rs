//! Microsoft RFC 3161 counter-signatures.
//!
//! The unsigned attribute 1.3.6.1.4.1.311.3.3.1 carries a full PKCS#7
//! SignedData whose encapsulated content is a TSTInfo imprint binding the
//! parent signature to the authority's signed time:
//!
//! ```text
//! TSTInfo ::= SEQUENCE {
//!   version        INTEGER,
//!   policy         TSAPolicyId,
//!   messageImprint MessageImprint,
//!   serialNumber   INTEGER,
//!   genTime        GeneralizedTime,
//!   accuracy       Accuracy OPTIONAL,
//!   ordering       BOOLEAN DEFAULT FALSE,
//!   nonce          INTEGER OPTIONAL,
//!   tsa            [0] GeneralName OPTIONAL,
//!   extensions     [1] IMPLICIT Extensions OPTIONAL }
//! ```

use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo as CmsContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo as CmsSignerInfo};
use const_oid::ObjectIdentifier;
use der::asn1::{GeneralizedTime, Int, OctetString};
use der::{Any, Decode, Encode, Sequence};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::domain::asn1;
use crate::domain::certificate::CertificateView;
use crate::domain::constants::{OID_MS_COUNTER_SIGNATURE, OID_SIGNED_DATA, OID_TST_INFO};
use crate::domain::crypto::{self, HashKind};

/// RFC 3161 messageImprint: hash algorithm plus the hashed message.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub hashed_message: OctetString,
}

/// RFC 3161 Accuracy.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Accuracy {
    #[asn1(optional = "true")]
    pub seconds: Option<u64>,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub millis: Option<i16>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub micros: Option<i16>,
}

/// RFC 3161 TSTInfo.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TstInfo {
    pub version: u8,
    pub policy: ObjectIdentifier,
    pub message_imprint: MessageImprint,
    pub serial_number: Int,
    pub gen_time: GeneralizedTime,
    #[asn1(optional = "true")]
    pub accuracy: Option<Accuracy>,
    #[asn1(default = "Default::default")]
    pub ordering: bool,
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub tsa: Option<Any>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Any>,
}

/// Decoded Microsoft timestamp counter-signature.
#[derive(Debug, Clone)]
pub struct MsCounterSignature {
    /// Index of the TSA signer certificate within [`Self::certificates`];
    /// `None` when the token does not carry it.
    pub sign_cert: Option<usize>,
    /// genTime in canonical form.
    pub sign_time: String,
    /// messageImprint hash algorithm OID.
    pub imprint_algorithm: Option<ObjectIdentifier>,
    /// messageImprint hashedMessage, lowercase hex.
    pub imprint: String,
    pub(crate) imprint_bytes: Vec<u8>,
    /// TSTInfo serialNumber as hex.
    pub serial_number: String,
    /// TSA policy OID in dotted form.
    pub policy: String,
    /// Certificates local to the timestamp token; may include the TSA root.
    pub certificates: Vec<CertificateView>,
    /// Digest algorithm of the token's own signer.
    pub digest_algorithm: Option<ObjectIdentifier>,
    /// Signature algorithm of the token's own signer.
    pub signature_algorithm: Option<ObjectIdentifier>,
    pub(crate) signed_attrs_der: Option<Vec<u8>>,
    pub(crate) signature: Vec<u8>,
}

impl MsCounterSignature {
    /// Decode the attribute value. `None` means the token was dropped; the
    /// reason has been pushed onto `warnings`.
    pub fn parse(value: &Any, warnings: &mut Vec<String>) -> Option<Self> {
        let malformed = || format!("malformed attribute: {OID_MS_COUNTER_SIGNATURE}");

        let Ok(token_der) = value.to_der() else {
            warnings.push(malformed());
            return None;
        };
        let ci = match CmsContentInfo::from_der(&token_der) {
            Ok(ci) => ci,
            Err(e) => {
                log::debug!("undecodable timestamp token: {e}");
                warnings.push(malformed());
                return None;
            }
        };
        if ci.content_type != OID_SIGNED_DATA {
            warnings.push(malformed());
            return None;
        }
        let signed_data = match ci.content.decode_as::<SignedData>() {
            Ok(sd) => sd,
            Err(e) => {
                log::debug!("undecodable timestamp SignedData: {e}");
                warnings.push(malformed());
                return None;
            }
        };
        if signed_data.encap_content_info.econtent_type != OID_TST_INFO {
            warnings.push(malformed());
            return None;
        }
        let Some(econtent) = &signed_data.encap_content_info.econtent else {
            warnings.push(malformed());
            return None;
        };
        let tst_info = match TstInfo::from_der(econtent.value()) {
            Ok(t) => t,
            Err(e) => {
                log::debug!("undecodable TSTInfo: {e}");
                warnings.push(malformed());
                return None;
            }
        };

        let certificates = collect_certificates(&signed_data, warnings);

        let mut ms = MsCounterSignature {
            sign_cert: None,
            sign_time: asn1::format_datetime(&tst_info.gen_time.to_date_time()),
            imprint_algorithm: Some(tst_info.message_imprint.hash_algorithm.oid),
            imprint: hex::encode(tst_info.message_imprint.hashed_message.as_bytes()),
            imprint_bytes: tst_info.message_imprint.hashed_message.as_bytes().to_vec(),
            serial_number: asn1::int_to_hex(tst_info.serial_number.as_bytes()),
            policy: tst_info.policy.to_string(),
            certificates,
            digest_algorithm: None,
            signature_algorithm: None,
            signed_attrs_der: None,
            signature: Vec::new(),
        };

        let signers = &signed_data.signer_infos.0;
        if signers.len() != 1 {
            warnings.push("unexpected signer count".to_string());
        }
        if let Some(si) = signers.iter().next() {
            ms.digest_algorithm = Some(si.digest_alg.oid);
            ms.signature_algorithm = Some(si.signature_algorithm.oid);
            ms.signature = si.signature.as_bytes().to_vec();
            ms.signed_attrs_der = si.signed_attrs.as_ref().and_then(|a| a.to_der().ok());
            ms.sign_cert = find_signer_index(si, &ms.certificates);
            if ms.sign_cert.is_none() {
                warnings.push("counter-signer certificate not found".to_string());
            }
        }
        Some(ms)
    }

    /// Check the imprint against the parent SignerInfo's encryptedDigest.
    #[must_use]
    pub fn imprint_matches(&self, parent_encrypted_digest: &[u8]) -> bool {
        let Some(oid) = &self.imprint_algorithm else {
            return false;
        };
        let Some(kind) = HashKind::from_oid(oid) else {
            return false;
        };
        kind.digest(parent_encrypted_digest) == self.imprint_bytes
    }

    /// Verify the token's own signer over its authenticated attributes.
    #[must_use]
    pub fn signer_verifies(&self) -> bool {
        let (Some(index), Some(attrs_der)) = (self.sign_cert, self.signed_attrs_der.as_deref())
        else {
            return false;
        };
        let Some(cert) = self.certificates.get(index) else {
            return false;
        };
        crypto::verify_message_signature(
            &cert.raw().tbs_certificate.subject_public_key_info,
            self.digest_algorithm.as_ref(),
            self.signature_algorithm.as_ref(),
            attrs_der,
            &self.signature,
        )
    }
}

fn collect_certificates(signed_data: &SignedData, warnings: &mut Vec<String>) -> Vec<CertificateView> {
    let mut views = Vec::new();
    if let Some(set) = &signed_data.certificates {
        for choice in set.0.iter() {
            if let CertificateChoices::Certificate(cert) = choice {
                match CertificateView::from_x509(cert.clone()) {
                    Ok(view) => views.push(view),
                    Err(e) => {
                        log::debug!("unencodable timestamp certificate: {e}");
                        warnings.push(format!("malformed attribute: {OID_MS_COUNTER_SIGNATURE}"));
                    }
                }
            }
        }
    }
    views
}

fn find_signer_index(si: &CmsSignerInfo, bag: &[CertificateView]) -> Option<usize> {
    let SignerIdentifier::IssuerAndSerialNumber(ias) = &si.sid else {
        return None;
    };
    let issuer_der = ias.issuer.to_der().ok()?;
    bag.iter()
        .position(|c| c.matches_issuer_and_serial(&issuer_der, &ias.serial_number))
}
