//! SpcIndirectDataContent decoding.
//!
//! The encapsulated content of an Authenticode envelope carries the file
//! image digest:
//!
//! ```text
//! SpcIndirectDataContent ::= SEQUENCE {
//!   data          SpcAttributeTypeAndOptionalValue,
//!   messageDigest DigestInfo }
//! DigestInfo ::= SEQUENCE {
//!   digestAlgorithm AlgorithmIdentifier,
//!   digest          OCTET STRING }
//! ```

use cms::signed_data::EncapsulatedContentInfo;
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use der::{Any, Decode, Sequence};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::domain::constants::OID_SPC_INDIRECT_DATA;
use crate::domain::crypto::HashKind;

/// Authenticode ASN.1 image and digest data.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcIndirectDataContent {
    pub data: SpcAttributeTypeAndOptionalValue,
    pub message_digest: DigestInfo,
}

/// Image data descriptor; the value is opaque to the verifier.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcAttributeTypeAndOptionalValue {
    pub value_type: ObjectIdentifier,
    #[asn1(optional = "true")]
    pub value: Option<Any>,
}

/// Digest algorithm plus the file image digest.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct DigestInfo {
    pub digest_algorithm: AlgorithmIdentifierOwned,
    pub digest: OctetString,
}

/// Decoded view of the encapsulated content.
#[derive(Debug, Clone, Default)]
pub struct ContentInfo {
    /// eContentType OID; anything but SpcIndirectDataContent is a warning.
    pub content_type: Option<ObjectIdentifier>,
    /// Digest algorithm declared inside the DigestInfo.
    pub digest_algorithm: Option<ObjectIdentifier>,
    /// File image digest, lowercase hex.
    pub digest: String,
    /// Value bytes of the SpcIndirectDataContent SEQUENCE (tag and length
    /// stripped); the signer's messageDigest is computed over these bytes.
    pub spc_value: Vec<u8>,
}

impl ContentInfo {
    /// Best-effort decode; problems leave fields empty and push warnings.
    pub fn parse(encap: &EncapsulatedContentInfo, warnings: &mut Vec<String>) -> Self {
        let mut info = ContentInfo {
            content_type: Some(encap.econtent_type),
            ..Default::default()
        };

        if encap.econtent_type != OID_SPC_INDIRECT_DATA {
            warnings.push("invalid indirect data content type".to_string());
            return info;
        }

        let Some(content) = &encap.econtent else {
            warnings.push(format!("malformed attribute: {OID_SPC_INDIRECT_DATA}"));
            return info;
        };
        info.spc_value = content.value().to_vec();

        match SpcIndirectDataContent::from_der(&content_der(content)) {
            Ok(spc) => {
                let oid = spc.message_digest.digest_algorithm.oid;
                info.digest_algorithm = Some(oid);
                info.digest = hex::encode(spc.message_digest.digest.as_bytes());
                // The digest must have the algorithm's native output size.
                if let Some(kind) = HashKind::from_oid(&oid) {
                    if spc.message_digest.digest.as_bytes().len() != kind.output_len() {
                        warnings.push(format!("malformed attribute: {OID_SPC_INDIRECT_DATA}"));
                    }
                }
            }
            Err(e) => {
                log::debug!("undecodable SpcIndirectDataContent: {e}");
                warnings.push(format!("malformed attribute: {OID_SPC_INDIRECT_DATA}"));
            }
        }
        info
    }
}

fn content_der(content: &Any) -> Vec<u8> {
    use der::Encode;
    content.to_der().unwrap_or_default()
}
