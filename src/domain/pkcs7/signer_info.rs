//! PKCS#7 SignerInfo decoding.
//!
//! Authenticode requires exactly one signer; its unauthenticated attributes
//! are where the interesting payloads hide: PKCS#9 counter-signatures,
//! Microsoft RFC 3161 timestamp tokens and whole nested Authenticode
//! signatures. Unknown attribute OIDs are ignored, the format is
//! open-ended.

use cms::signed_data::{SignerIdentifier, SignerInfo as CmsSignerInfo};
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use der::{Any, Encode};
use serde::{Deserialize, Serialize};
use x509_cert::serial_number::SerialNumber;

use crate::domain::asn1;
use crate::domain::certificate::{self, CertificateView};
use crate::domain::constants::*;
use crate::domain::pkcs7::counter_signature::Pkcs9CounterSignature;
use crate::domain::pkcs7::timestamp::MsCounterSignature;
use crate::domain::pkcs7::Pkcs7Signature;
use crate::infra::config::ParserConfig;

/// Program name and more-info URL from the SpcSpOpusInfo attribute.
/// Decorative; either field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpcSpOpusInfo {
    pub program_name: String,
    pub more_info_url: String,
}

impl SpcSpOpusInfo {
    /// Opportunistic decode of the attribute value:
    ///
    /// ```text
    /// SpcSpOpusInfo ::= SEQUENCE {
    ///   programName [0] EXPLICIT SpcString OPTIONAL,
    ///   moreInfo    [1] EXPLICIT SpcLink OPTIONAL }
    /// SpcString ::= CHOICE { unicode [0] BMPSTRING, ascii [1] IA5STRING }
    /// SpcLink   ::= CHOICE { url [0] IA5STRING, ... }
    /// ```
    pub fn parse(value: &Any) -> Option<Self> {
        use der::Tagged;
        if value.tag() != der::Tag::Sequence {
            return None;
        }
        let mut info = SpcSpOpusInfo::default();
        let mut rest = value.value();
        while !rest.is_empty() {
            let (tag, inner, next) = asn1::read_tlv(rest)?;
            match tag {
                // programName [0]
                0xa0 => {
                    if let Some((string_tag, bytes, _)) = asn1::read_tlv(inner) {
                        match string_tag {
                            0x80 => info.program_name = asn1::decode_bmp_string(bytes),
                            0x81 => {
                                info.program_name = String::from_utf8_lossy(bytes).into_owned();
                            }
                            _ => {}
                        }
                    }
                }
                // moreInfo [1]
                0xa1 => {
                    if let Some((link_tag, bytes, _)) = asn1::read_tlv(inner) {
                        if link_tag == 0x80 {
                            info.more_info_url = String::from_utf8_lossy(bytes).into_owned();
                        }
                    }
                }
                _ => {}
            }
            rest = next;
        }
        Some(info)
    }
}

/// Decoded SignerInfo and everything found in its attributes.
#[derive(Debug, Clone)]
pub struct SignerInfo {
    /// SignerInfo.version; anything but 1 is a warning.
    pub version: u64,
    /// Issuer DN of the signer certificate, one-line form.
    pub issuer: String,
    /// Signer certificate serial as hex.
    pub serial: String,
    pub(crate) issuer_der: Vec<u8>,
    pub(crate) serial_number: Option<SerialNumber>,
    /// Digest algorithm; must agree with the content and SignedData level.
    pub digest_algorithm: Option<ObjectIdentifier>,
    /// Signature algorithm for the encryptedDigest.
    pub digest_encrypt_algorithm: Option<ObjectIdentifier>,
    /// Raw signature bytes over the authenticated attributes.
    pub encrypt_digest: Vec<u8>,
    /// contentType authenticated attribute as a short name.
    pub content_type: Option<String>,
    /// messageDigest authenticated attribute, hex.
    pub message_digest: Option<String>,
    pub(crate) message_digest_bytes: Vec<u8>,
    /// SpcSpOpusInfo, when present and decodable.
    pub spc_info: Option<SpcSpOpusInfo>,
    pub(crate) signed_attrs_der: Option<Vec<u8>>,
    pub counter_signatures: Vec<Pkcs9CounterSignature>,
    pub ms_counter_signatures: Vec<MsCounterSignature>,
    pub nested_signatures: Vec<Pkcs7Signature>,
}

impl SignerInfo {
    /// Decode one SignerInfo against the envelope's certificate bag.
    pub(crate) fn parse(
        si: &CmsSignerInfo,
        bag: &[CertificateView],
        config: &ParserConfig,
        depth: usize,
        warnings: &mut Vec<String>,
    ) -> Self {
        let mut out = SignerInfo {
            version: si.version as u64,
            issuer: String::new(),
            serial: String::new(),
            issuer_der: Vec::new(),
            serial_number: None,
            digest_algorithm: Some(si.digest_alg.oid),
            digest_encrypt_algorithm: Some(si.signature_algorithm.oid),
            encrypt_digest: si.signature.as_bytes().to_vec(),
            content_type: None,
            message_digest: None,
            message_digest_bytes: Vec::new(),
            spc_info: None,
            signed_attrs_der: None,
            counter_signatures: Vec::new(),
            ms_counter_signatures: Vec::new(),
            nested_signatures: Vec::new(),
        };

        if out.version != 1 {
            warnings.push("unexpected signer info version".to_string());
        }

        match &si.sid {
            SignerIdentifier::IssuerAndSerialNumber(ias) => {
                out.issuer = certificate::name_to_string(&ias.issuer);
                out.serial = asn1::int_to_hex(ias.serial_number.as_bytes());
                out.issuer_der = ias.issuer.to_der().unwrap_or_default();
                out.serial_number = Some(ias.serial_number.clone());
            }
            SignerIdentifier::SubjectKeyIdentifier(_) => {
                // Authenticode signers are identified by issuer and serial;
                // verification reports the unlocatable certificate.
                log::debug!("signer identified by subject key id, not issuer and serial");
            }
        }

        out.signed_attrs_der = si.signed_attrs.as_ref().and_then(|a| a.to_der().ok());
        if let Some(attrs) = &si.signed_attrs {
            for attr in attrs.iter() {
                let Some(value) = attr.values.iter().next() else {
                    continue;
                };
                if attr.oid == OID_CONTENT_TYPE {
                    match value.decode_as::<ObjectIdentifier>() {
                        Ok(oid) => out.content_type = Some(asn1::oid_name_or_dotted(&oid)),
                        Err(_) => {
                            warnings.push(format!("malformed attribute: {OID_CONTENT_TYPE}"));
                        }
                    }
                } else if attr.oid == OID_MESSAGE_DIGEST {
                    match value.decode_as::<OctetString>() {
                        Ok(digest) => {
                            out.message_digest = Some(hex::encode(digest.as_bytes()));
                            out.message_digest_bytes = digest.as_bytes().to_vec();
                        }
                        Err(_) => {
                            warnings.push(format!("malformed attribute: {OID_MESSAGE_DIGEST}"));
                        }
                    }
                } else if attr.oid == OID_SPC_SP_OPUS_INFO {
                    match SpcSpOpusInfo::parse(value) {
                        Some(info) => out.spc_info = Some(info),
                        None => {
                            warnings.push(format!("malformed attribute: {OID_SPC_SP_OPUS_INFO}"));
                        }
                    }
                }
            }
        }

        if let Some(attrs) = &si.unsigned_attrs {
            for attr in attrs.iter() {
                if attr.oid == OID_COUNTER_SIGNATURE {
                    for value in attr.values.iter() {
                        match value.decode_as::<CmsSignerInfo>() {
                            Ok(cs_si) => {
                                match Pkcs9CounterSignature::parse(
                                    &cs_si,
                                    bag,
                                    0,
                                    config.max_nested_depth,
                                    warnings,
                                ) {
                                    Ok(cs) => out.counter_signatures.push(cs),
                                    Err(warning) => warnings.push(warning),
                                }
                            }
                            Err(_) => {
                                warnings
                                    .push(format!("malformed attribute: {OID_COUNTER_SIGNATURE}"));
                            }
                        }
                    }
                } else if attr.oid == OID_MS_COUNTER_SIGNATURE {
                    for value in attr.values.iter() {
                        if let Some(ms) = MsCounterSignature::parse(value, warnings) {
                            out.ms_counter_signatures.push(ms);
                        }
                    }
                } else if attr.oid == OID_SPC_NESTED_SIGNATURE {
                    if depth + 1 >= config.max_nested_depth {
                        warnings.push("nested signature depth exceeded".to_string());
                        continue;
                    }
                    for value in attr.values.iter() {
                        match value.to_der() {
                            Ok(nested_der) => {
                                out.nested_signatures.push(Pkcs7Signature::parse_at_depth(
                                    &nested_der,
                                    config,
                                    depth + 1,
                                ));
                            }
                            Err(_) => {
                                warnings.push(format!(
                                    "malformed attribute: {OID_SPC_NESTED_SIGNATURE}"
                                ));
                            }
                        }
                    }
                }
                // Other OIDs are ignored, Authenticode is open-ended.
            }
        }

        out
    }

    /// Locate the signer certificate in `bag` by issuer and serial.
    #[must_use]
    pub fn find_signer_cert(&self, bag: &[CertificateView]) -> Option<usize> {
        let serial = self.serial_number.as_ref()?;
        bag.iter()
            .position(|c| c.matches_issuer_and_serial(&self.issuer_der, serial))
    }

    /// Program name from SpcSpOpusInfo; empty when absent.
    #[must_use]
    pub fn program_name(&self) -> &str {
        self.spc_info.as_ref().map_or("", |i| &i.program_name)
    }

    /// More-info URL from SpcSpOpusInfo; empty when absent.
    #[must_use]
    pub fn more_info_url(&self) -> &str {
        self.spc_info.as_ref().map_or("", |i| &i.more_info_url)
    }
}
