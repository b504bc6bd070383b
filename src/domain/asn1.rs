//! Low-level DER/ASN.1 helpers shared by the decoders.
//!
//! Everything here fails softly: malformed input yields an empty result and
//! a warning pushed onto the caller's sink, never an abort. This mirrors how
//! hostile Authenticode blobs are handled throughout the crate.

use const_oid::ObjectIdentifier;
use der::asn1::{GeneralizedTime, UtcTime};
use der::{Any, DateTime, Tag, Tagged};

use crate::domain::constants::*;

/// Short name for a known OID, `None` for everything else.
pub fn oid_short_name(oid: &ObjectIdentifier) -> Option<&'static str> {
    let name = if *oid == OID_MD5 {
        "md5"
    } else if *oid == OID_SHA1 {
        "sha1"
    } else if *oid == OID_SHA256 {
        "sha256"
    } else if *oid == OID_SHA384 {
        "sha384"
    } else if *oid == OID_SHA512 {
        "sha512"
    } else if *oid == OID_RSA_ENCRYPTION {
        "rsaEncryption"
    } else if *oid == OID_MD5_WITH_RSA {
        "md5WithRSAEncryption"
    } else if *oid == OID_SHA1_WITH_RSA {
        "sha1WithRSAEncryption"
    } else if *oid == OID_SHA256_WITH_RSA {
        "sha256WithRSAEncryption"
    } else if *oid == OID_SHA384_WITH_RSA {
        "sha384WithRSAEncryption"
    } else if *oid == OID_SHA512_WITH_RSA {
        "sha512WithRSAEncryption"
    } else if *oid == OID_EC_PUBLIC_KEY {
        "id-ecPublicKey"
    } else if *oid == OID_ECDSA_SHA256 {
        "ecdsa-with-SHA256"
    } else if *oid == OID_ECDSA_SHA384 {
        "ecdsa-with-SHA384"
    } else if *oid == OID_DATA {
        "data"
    } else if *oid == OID_SIGNED_DATA {
        "signedData"
    } else if *oid == OID_CONTENT_TYPE {
        "contentType"
    } else if *oid == OID_MESSAGE_DIGEST {
        "messageDigest"
    } else if *oid == OID_SIGNING_TIME {
        "signingTime"
    } else if *oid == OID_COUNTER_SIGNATURE {
        "counterSignature"
    } else if *oid == OID_SPC_INDIRECT_DATA {
        "spcIndirectDataContext"
    } else if *oid == OID_SPC_SP_OPUS_INFO {
        "spcSpOpusInfo"
    } else if *oid == OID_SPC_NESTED_SIGNATURE {
        "spcNestedSignature"
    } else if *oid == OID_MS_COUNTER_SIGNATURE {
        "msCounterSign"
    } else if *oid == OID_TST_INFO {
        "id-ct-TSTInfo"
    } else {
        return None;
    };
    Some(name)
}

/// Short name for a known OID, dotted-decimal form otherwise.
#[must_use]
pub fn oid_name_or_dotted(oid: &ObjectIdentifier) -> String {
    match oid_short_name(oid) {
        Some(name) => name.to_string(),
        None => oid.to_string(),
    }
}

/// Big-endian unsigned hex of an INTEGER's magnitude. The leading 0x00 sign
/// byte is stripped; lowercase digits, no separators.
#[must_use]
pub fn int_to_hex(bytes: &[u8]) -> String {
    let mut magnitude = bytes;
    while magnitude.len() > 1 && magnitude[0] == 0 {
        magnitude = &magnitude[1..];
    }
    hex::encode(magnitude)
}

/// Canonical `YYYY-MM-DD HH:MM:SS UTC` rendering.
#[must_use]
pub fn format_datetime(dt: &DateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minutes(),
        dt.seconds()
    )
}

/// Decode a time-valued `Any` (UTCTime with the RFC 5280 year-50 pivot, or
/// GeneralizedTime) into the canonical string form. Malformed values yield
/// an empty string plus a warning.
pub fn decode_time_any(value: &Any, warnings: &mut Vec<String>) -> String {
    match value.tag() {
        Tag::UtcTime => match value.decode_as::<UtcTime>() {
            Ok(t) => format_datetime(&t.to_date_time()),
            Err(_) => {
                warnings.push(format!("malformed attribute: {}", OID_SIGNING_TIME));
                String::new()
            }
        },
        Tag::GeneralizedTime => match value.decode_as::<GeneralizedTime>() {
            Ok(t) => format_datetime(&t.to_date_time()),
            Err(_) => {
                warnings.push(format!("malformed attribute: {}", OID_SIGNING_TIME));
                String::new()
            }
        },
        _ => {
            warnings.push(format!("malformed attribute: {}", OID_SIGNING_TIME));
            String::new()
        }
    }
}

/// Read one TLV from `input`. Returns `(tag, value, rest)`, or `None` on
/// truncated or multi-byte-tag input. Only definite short/long lengths up to
/// four bytes are accepted.
#[must_use]
pub fn read_tlv(input: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    if input.len() < 2 {
        return None;
    }
    let tag = input[0];
    // Multi-byte tag numbers never occur in the structures we walk.
    if tag & 0x1f == 0x1f {
        return None;
    }
    let first = input[1];
    let (len, header) = if first & 0x80 == 0 {
        (first as usize, 2)
    } else {
        let n = (first & 0x7f) as usize;
        if n == 0 || n > 4 || input.len() < 2 + n {
            return None;
        }
        let mut len = 0usize;
        for &b in &input[2..2 + n] {
            len = (len << 8) | b as usize;
        }
        (len, 2 + n)
    };
    if input.len() < header + len {
        return None;
    }
    Some((tag, &input[header..header + len], &input[header + len..]))
}

/// Decode a BMPString (UTF-16BE) payload into a `String`.
#[must_use]
pub fn decode_bmp_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decode a directory-string `Any` (UTF8String, PrintableString, IA5String,
/// TeletexString or BMPString) into text; anything else is hex-dumped.
#[must_use]
pub fn decode_string_any(value: &Any) -> String {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            String::from_utf8_lossy(value.value()).into_owned()
        }
        Tag::BmpString => decode_bmp_string(value.value()),
        _ => hex::encode(value.value()),
    }
}
