//! X.509 certificate view and the owned report record built from it.
//!
//! `CertificateView` wraps one parsed certificate together with its DER
//! encoding. Views live in a bag owned by the root signature; everything
//! else refers to them by index into that bag.

pub mod chain;

use der::asn1::OctetString;
use der::pem::LineEnding;
use der::{Decode, Encode, EncodePem};
use serde::{Deserialize, Serialize};
use x509_cert::ext::pkix::AuthorityKeyIdentifier;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;
use x509_cert::Certificate as X509Certificate;

use crate::domain::asn1;
use crate::domain::constants::*;
use crate::domain::crypto::HashKind;

/// Structured distinguished-name attributes. Unknown entry types are
/// dropped during extraction.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub country: String,
    pub organization: String,
    pub organizational_unit: String,
    pub name_qualifier: String,
    pub state: String,
    pub common_name: String,
    pub serial_number: String,
    pub locality: String,
    pub title: String,
    pub surname: String,
    pub given_name: String,
    pub initials: String,
    pub pseudonym: String,
    pub generation_qualifier: String,
    pub email_address: String,
}

/// Owned, serializable snapshot of one certificate.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub subject_raw: String,
    pub issuer_raw: String,
    pub subject: Attributes,
    pub issuer: Attributes,
    pub public_key: String,
    pub public_key_algo: String,
    pub signature_algo: String,
    pub serial_number: String,
    pub sha1_digest: String,
    pub sha256_digest: String,
    pub valid_since: String,
    pub valid_until: String,
    pub version: u8,
    pub pem: String,
}

/// Parsed certificate plus its cached DER encoding and fingerprints.
#[derive(Debug, Clone)]
pub struct CertificateView {
    cert: X509Certificate,
    der: Vec<u8>,
    subject_der: Vec<u8>,
    issuer_der: Vec<u8>,
    sha1: String,
    sha256: String,
}

impl CertificateView {
    /// Wrap an already-parsed certificate.
    pub fn from_x509(cert: X509Certificate) -> der::Result<Self> {
        let der = cert.to_der()?;
        let subject_der = cert.tbs_certificate.subject.to_der()?;
        let issuer_der = cert.tbs_certificate.issuer.to_der()?;
        let sha1 = hex::encode(HashKind::Sha1.digest(&der));
        let sha256 = hex::encode(HashKind::Sha256.digest(&der));
        Ok(Self {
            cert,
            der,
            subject_der,
            issuer_der,
            sha1,
            sha256,
        })
    }

    pub fn from_der(der: &[u8]) -> der::Result<Self> {
        Self::from_x509(X509Certificate::from_der(der)?)
    }

    #[must_use]
    pub fn raw(&self) -> &X509Certificate {
        &self.cert
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn subject(&self) -> Attributes {
        attributes_from_name(&self.cert.tbs_certificate.subject)
    }

    #[must_use]
    pub fn issuer(&self) -> Attributes {
        attributes_from_name(&self.cert.tbs_certificate.issuer)
    }

    /// One-line subject DN in DER entry order.
    #[must_use]
    pub fn raw_subject(&self) -> String {
        name_to_string(&self.cert.tbs_certificate.subject)
    }

    /// One-line issuer DN in DER entry order.
    #[must_use]
    pub fn raw_issuer(&self) -> String {
        name_to_string(&self.cert.tbs_certificate.issuer)
    }

    #[must_use]
    pub fn subject_der(&self) -> &[u8] {
        &self.subject_der
    }

    #[must_use]
    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }

    /// Serial number as big-endian unsigned hex.
    #[must_use]
    pub fn serial_number(&self) -> String {
        asn1::int_to_hex(self.cert.tbs_certificate.serial_number.as_bytes())
    }

    #[must_use]
    pub fn signature_algorithm(&self) -> String {
        asn1::oid_name_or_dotted(&self.cert.signature_algorithm.oid)
    }

    #[must_use]
    pub fn public_key_algorithm(&self) -> String {
        asn1::oid_name_or_dotted(
            &self
                .cert
                .tbs_certificate
                .subject_public_key_info
                .algorithm
                .oid,
        )
    }

    /// SPKI in PEM form; empty string when encoding fails.
    #[must_use]
    pub fn public_key_pem(&self) -> String {
        self.cert
            .tbs_certificate
            .subject_public_key_info
            .to_pem(LineEnding::LF)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn valid_since(&self) -> String {
        format_time(&self.cert.tbs_certificate.validity.not_before)
    }

    #[must_use]
    pub fn valid_until(&self) -> String {
        format_time(&self.cert.tbs_certificate.validity.not_after)
    }

    /// X.509 version field (0-based: 2 means a v3 certificate).
    #[must_use]
    pub fn version(&self) -> u8 {
        self.cert.tbs_certificate.version as u8
    }

    #[must_use]
    pub fn pem(&self) -> String {
        self.cert.to_pem(LineEnding::LF).unwrap_or_default()
    }

    /// SHA-1 fingerprint of the full DER encoding.
    #[must_use]
    pub fn sha1(&self) -> &str {
        &self.sha1
    }

    /// SHA-256 fingerprint of the full DER encoding.
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        self.subject_der == self.issuer_der
    }

    /// True when the current time falls inside the validity window.
    #[must_use]
    pub fn is_time_valid_now(&self) -> bool {
        use std::time::{SystemTime, UNIX_EPOCH};
        let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) else {
            return false;
        };
        let validity = &self.cert.tbs_certificate.validity;
        now >= validity.not_before.to_unix_duration()
            && now <= validity.not_after.to_unix_duration()
    }

    #[must_use]
    pub fn subject_key_id(&self) -> Option<Vec<u8>> {
        let raw = self.extension(&OID_SUBJECT_KEY_ID)?;
        OctetString::from_der(raw)
            .ok()
            .map(|o| o.as_bytes().to_vec())
    }

    #[must_use]
    pub fn authority_key_id(&self) -> Option<Vec<u8>> {
        let raw = self.extension(&OID_AUTHORITY_KEY_ID)?;
        AuthorityKeyIdentifier::from_der(raw)
            .ok()?
            .key_identifier
            .map(|k| k.as_bytes().to_vec())
    }

    /// Exact match on issuer DN bytes and serial number, the lookup used to
    /// locate a signer within a certificate bag.
    #[must_use]
    pub fn matches_issuer_and_serial(&self, issuer_der: &[u8], serial: &SerialNumber) -> bool {
        self.issuer_der == issuer_der && self.cert.tbs_certificate.serial_number == *serial
    }

    /// Snapshot every field into an owned record.
    #[must_use]
    pub fn to_certificate(&self) -> Certificate {
        Certificate {
            subject_raw: self.raw_subject(),
            issuer_raw: self.raw_issuer(),
            subject: self.subject(),
            issuer: self.issuer(),
            public_key: self.public_key_pem(),
            public_key_algo: self.public_key_algorithm(),
            signature_algo: self.signature_algorithm(),
            serial_number: self.serial_number(),
            sha1_digest: self.sha1.clone(),
            sha256_digest: self.sha256.clone(),
            valid_since: self.valid_since(),
            valid_until: self.valid_until(),
            version: self.version(),
            pem: self.pem(),
        }
    }

    fn extension(&self, oid: &const_oid::ObjectIdentifier) -> Option<&[u8]> {
        self.cert
            .tbs_certificate
            .extensions
            .as_ref()?
            .iter()
            .find(|e| e.extn_id == *oid)
            .map(|e| e.extn_value.as_bytes())
    }
}

fn format_time(time: &Time) -> String {
    asn1::format_datetime(&time.to_date_time())
}

/// Short key for a DN attribute type, `None` when unrecognized.
fn dn_key(oid: &const_oid::ObjectIdentifier) -> Option<&'static str> {
    let key = if *oid == OID_AT_COUNTRY {
        "C"
    } else if *oid == OID_AT_ORGANIZATION {
        "O"
    } else if *oid == OID_AT_ORG_UNIT {
        "OU"
    } else if *oid == OID_AT_DN_QUALIFIER {
        "dnQualifier"
    } else if *oid == OID_AT_STATE {
        "ST"
    } else if *oid == OID_AT_COMMON_NAME {
        "CN"
    } else if *oid == OID_AT_SERIAL_NUMBER {
        "serialNumber"
    } else if *oid == OID_AT_LOCALITY {
        "L"
    } else if *oid == OID_AT_TITLE {
        "title"
    } else if *oid == OID_AT_SURNAME {
        "SN"
    } else if *oid == OID_AT_GIVEN_NAME {
        "GN"
    } else if *oid == OID_AT_INITIALS {
        "initials"
    } else if *oid == OID_AT_PSEUDONYM {
        "pseudonym"
    } else if *oid == OID_AT_GENERATION_QUALIFIER {
        "generationQualifier"
    } else if *oid == OID_AT_EMAIL {
        "emailAddress"
    } else {
        return None;
    };
    Some(key)
}

/// Walk DN entries in DER order and fill the named attribute slots.
pub(crate) fn attributes_from_name(name: &Name) -> Attributes {
    let mut attributes = Attributes::default();
    for rdn in name.0.iter() {
        for atv in rdn.0.iter() {
            let value = asn1::decode_string_any(&atv.value);
            match dn_key(&atv.oid) {
                Some("C") => attributes.country = value,
                Some("O") => attributes.organization = value,
                Some("OU") => attributes.organizational_unit = value,
                Some("dnQualifier") => attributes.name_qualifier = value,
                Some("ST") => attributes.state = value,
                Some("CN") => attributes.common_name = value,
                Some("serialNumber") => attributes.serial_number = value,
                Some("L") => attributes.locality = value,
                Some("title") => attributes.title = value,
                Some("SN") => attributes.surname = value,
                Some("GN") => attributes.given_name = value,
                Some("initials") => attributes.initials = value,
                Some("pseudonym") => attributes.pseudonym = value,
                Some("generationQualifier") => attributes.generation_qualifier = value,
                Some("emailAddress") => attributes.email_address = value,
                _ => {}
            }
        }
    }
    attributes
}

/// One-line DN form: entries in DER order, `key=value` joined by `", "`.
pub(crate) fn name_to_string(name: &Name) -> String {
    let mut parts = Vec::new();
    for rdn in name.0.iter() {
        for atv in rdn.0.iter() {
            let key = match dn_key(&atv.oid) {
                Some(k) => k.to_string(),
                None => atv.oid.to_string(),
            };
            parts.push(format!("{}={}", key, asn1::decode_string_any(&atv.value)));
        }
    }
    parts.join(", ")
}
