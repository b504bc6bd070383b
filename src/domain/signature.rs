//! Flattened report records, one per Authenticode signature.

use serde::{Deserialize, Serialize};

use crate::domain::certificate::Certificate;

/// Which mechanism produced a counter-signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CounterSignerKind {
    /// Legacy PKCS#9 counterSignature attribute.
    Pkcs9,
    /// Microsoft RFC 3161 timestamp token.
    MsTimestamp,
}

impl CounterSignerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CounterSignerKind::Pkcs9 => "pkcs9",
            CounterSignerKind::MsTimestamp => "ms-timestamp",
        }
    }
}

/// One counter-signer, unified across both variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterSigner {
    pub kind: CounterSignerKind,
    /// The counter-signer certificate, when it could be located.
    pub certificate: Option<Certificate>,
    /// Chain built for the counter-signer, counter-signer first.
    pub chain: Vec<Certificate>,
    /// Signing time in `YYYY-MM-DD HH:MM:SS UTC` form; may be empty.
    pub sign_time: String,
    /// Digest over the parent signer's encryptedDigest, hex.
    pub digest: String,
    /// Short name of the declared digest algorithm.
    pub digest_algorithm: String,
}

/// Uniform view of one Authenticode signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalSignature {
    /// The signer certificate, when present in the bag.
    pub signer_cert: Option<Certificate>,
    /// Expected file image digest from SpcIndirectDataContent, hex.
    pub file_digest: String,
    /// Short name of the file digest algorithm.
    pub digest_algorithm: String,
    /// SpcSpOpusInfo program name; may be empty.
    pub program_name: String,
    /// SpcSpOpusInfo more-info URL; may be empty.
    pub more_info_url: String,
    /// Signer chain, signer first.
    pub certificates: Vec<Certificate>,
    /// PKCS#9 and MS counter-signers, flattened.
    pub counter_signers: Vec<CounterSigner>,
    /// Decode-time and verify-time warnings for this signature.
    pub warnings: Vec<String>,
    /// True when `warnings` is empty.
    pub is_valid: bool,
}
