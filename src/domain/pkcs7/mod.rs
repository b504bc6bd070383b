//! PKCS#7 envelope root.
//!
//! Construction is total: any byte slice yields a `Pkcs7Signature`, with
//! decoding problems recorded as warnings on the nearest component instead
//! of aborting. Malware blobs are broken on purpose; a parser that gives up
//! hides the rest of the signature from the analyst.

pub mod content_info;
pub mod counter_signature;
pub mod signer_info;
pub mod timestamp;

use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo as CmsContentInfo;
use cms::signed_data::SignedData;
use const_oid::ObjectIdentifier;
use der::{Decode, SliceReader};

use crate::domain::certificate::chain::CertificateProcessor;
use crate::domain::certificate::{Certificate, CertificateView};
use crate::domain::constants::OID_SIGNED_DATA;
use crate::domain::crypto::{self, HashKind};
use crate::domain::pkcs7::content_info::ContentInfo;
use crate::domain::pkcs7::counter_signature::Pkcs9CounterSignature;
use crate::domain::pkcs7::signer_info::SignerInfo;
use crate::domain::signature::DigitalSignature;
use crate::infra::config::ParserConfig;
use crate::infra::error::{ParseError, ParseResult};
use crate::services::report::ReportService;

/// Parsed Authenticode PKCS#7 envelope.
#[derive(Debug, Clone, Default)]
pub struct Pkcs7Signature {
    /// SignedData.version.
    pub version: u64,
    /// Encapsulated SpcIndirectDataContent view.
    pub content_info: Option<ContentInfo>,
    /// The sole SignerInfo; absence is a warning, not fatal.
    pub signer_info: Option<SignerInfo>,
    /// Digest algorithm OIDs declared at the SignedData level.
    pub content_digest_algorithms: Vec<ObjectIdentifier>,
    certificates: Vec<CertificateView>,
    outer_content_type: Option<ObjectIdentifier>,
    signed_data_decoded: bool,
    warnings: Vec<String>,
}

impl Pkcs7Signature {
    /// Parse a WIN_CERTIFICATE payload (header already stripped).
    pub fn from_der(input: &[u8]) -> ParseResult<Self> {
        Self::from_der_with_config(input, &ParserConfig::default())
    }

    /// Parse with explicit limits. Exceeding `max_input_len` is the one
    /// hard failure; everything else degrades to warnings.
    pub fn from_der_with_config(input: &[u8], config: &ParserConfig) -> ParseResult<Self> {
        if let Some(limit) = config.max_input_len {
            if input.len() > limit {
                return Err(ParseError::InputTooLarge {
                    size: input.len(),
                    limit,
                });
            }
        }
        Ok(Self::parse_at_depth(input, config, 0))
    }

    pub(crate) fn parse_at_depth(input: &[u8], config: &ParserConfig, depth: usize) -> Self {
        let mut sig = Pkcs7Signature::default();
        let mut warnings = Vec::new();

        // A reader tolerates trailing padding, which WIN_CERTIFICATE blobs
        // routinely carry.
        let outer = SliceReader::new(input)
            .ok()
            .and_then(|mut reader| CmsContentInfo::decode(&mut reader).ok());
        let Some(ci) = outer else {
            log::debug!("input is not a PKCS#7 ContentInfo ({} bytes)", input.len());
            warnings.push("invalid outer pkcs7 content type".to_string());
            sig.warnings = warnings;
            return sig;
        };

        sig.outer_content_type = Some(ci.content_type);
        if ci.content_type != OID_SIGNED_DATA {
            warnings.push("invalid outer pkcs7 content type".to_string());
            sig.warnings = warnings;
            return sig;
        }

        let signed_data = match ci.content.decode_as::<SignedData>() {
            Ok(sd) => sd,
            Err(e) => {
                log::debug!("undecodable SignedData: {e}");
                warnings.push(format!("malformed attribute: {OID_SIGNED_DATA}"));
                sig.warnings = warnings;
                return sig;
            }
        };
        sig.signed_data_decoded = true;
        sig.version = signed_data.version as u64;
        sig.content_digest_algorithms = signed_data
            .digest_algorithms
            .iter()
            .map(|alg| alg.oid)
            .collect();

        let mut certificates = Vec::new();
        if let Some(set) = &signed_data.certificates {
            for choice in set.0.iter() {
                if let CertificateChoices::Certificate(cert) = choice {
                    match CertificateView::from_x509(cert.clone()) {
                        Ok(view) => certificates.push(view),
                        Err(e) => log::debug!("skipping unencodable certificate: {e}"),
                    }
                }
            }
        }

        sig.content_info = Some(ContentInfo::parse(
            &signed_data.encap_content_info,
            &mut warnings,
        ));

        let signers = &signed_data.signer_infos.0;
        if signers.is_empty() {
            warnings.push("missing signer info".to_string());
        } else if signers.len() > 1 {
            warnings.push("unexpected signer count".to_string());
        }
        sig.signer_info = signers
            .iter()
            .next()
            .map(|si| SignerInfo::parse(si, &certificates, config, depth, &mut warnings));

        // Timestamp tokens bring their own certificates, often including
        // the TSA root; fold them into the envelope bag.
        if let Some(signer) = &sig.signer_info {
            for ms in &signer.ms_counter_signatures {
                for cert in &ms.certificates {
                    if !certificates.iter().any(|c| c.sha256() == cert.sha256()) {
                        certificates.push(cert.clone());
                    }
                }
            }
        }
        sig.certificates = certificates;
        sig.warnings = warnings;
        sig
    }

    /// Certificates of the envelope, timestamp bags merged in, deduplicated
    /// by SHA-256. Typically excludes the signer's root.
    #[must_use]
    pub fn certificates(&self) -> &[CertificateView] {
        &self.certificates
    }

    /// Warnings recorded while decoding.
    #[must_use]
    pub fn parse_warnings(&self) -> &[String] {
        &self.warnings
    }

    /// ContentType of the outer envelope, when it decoded at all.
    #[must_use]
    pub fn outer_content_type(&self) -> Option<&ObjectIdentifier> {
        self.outer_content_type.as_ref()
    }

    pub(crate) fn is_signed_data(&self) -> bool {
        self.signed_data_decoded
    }

    /// Run every verification check and return the union of decode-time and
    /// verify-time warnings. Never panics, never aborts early.
    #[must_use]
    pub fn verify(&self) -> Vec<String> {
        self.verify_with(&CertificateProcessor::new())
    }

    /// `verify()` against an explicit processor (and its trust store).
    #[must_use]
    pub fn verify_with(&self, processor: &CertificateProcessor) -> Vec<String> {
        let mut warnings = self.warnings.clone();
        let Some(signer) = &self.signer_info else {
            return warnings;
        };

        // Digest algorithm agreement across all three declaration sites.
        let algorithms_agree = match &signer.digest_algorithm {
            Some(alg) => {
                self.content_digest_algorithms.contains(alg)
                    && self
                        .content_info
                        .as_ref()
                        .and_then(|ci| ci.digest_algorithm)
                        .as_ref()
                        == Some(alg)
            }
            None => false,
        };
        if !algorithms_agree {
            warnings.push("digest algorithm mismatch".to_string());
        }

        // messageDigest over the SpcIndirectDataContent value bytes.
        if let Some(ci) = &self.content_info {
            if !ci.spc_value.is_empty() {
                let computed = signer
                    .digest_algorithm
                    .as_ref()
                    .and_then(HashKind::from_oid)
                    .map(|kind| kind.digest(&ci.spc_value));
                if computed.as_deref() != Some(signer.message_digest_bytes.as_slice()) {
                    warnings.push("message digest mismatch".to_string());
                }
            }
        }

        // Signer certificate, signature over authenticated attributes, and
        // the signer's chain.
        match signer.find_signer_cert(&self.certificates) {
            Some(index) => {
                let cert = &self.certificates[index];
                let verified = signer
                    .signed_attrs_der
                    .as_deref()
                    .map(|message| {
                        crypto::verify_message_signature(
                            &cert.raw().tbs_certificate.subject_public_key_info,
                            signer.digest_algorithm.as_ref(),
                            signer.digest_encrypt_algorithm.as_ref(),
                            message,
                            &signer.encrypt_digest,
                        )
                    })
                    .unwrap_or(false);
                if !verified {
                    warnings.push("signature verification failed".to_string());
                }
                if !processor.get_chain(cert, &self.certificates).is_valid {
                    warnings.push("broken certificate chain".to_string());
                }
            }
            None => warnings.push("signer certificate not found".to_string()),
        }

        // PKCS#9 counter-signature digests and chains, arbitrarily deep.
        for cs in &signer.counter_signatures {
            self.verify_counter_signature(cs, &signer.encrypt_digest, processor, &mut warnings);
        }

        // Microsoft timestamp tokens.
        for ms in &signer.ms_counter_signatures {
            if !ms.imprint_matches(&signer.encrypt_digest) {
                warnings.push("timestamp imprint mismatch".to_string());
            }
            if !ms.signer_verifies() {
                warnings.push("signature verification failed".to_string());
            }
            if let Some(index) = ms.sign_cert {
                if let Some(cert) = ms.certificates.get(index) {
                    let mut bag = ms.certificates.clone();
                    for c in &self.certificates {
                        if !bag.iter().any(|b| b.sha256() == c.sha256()) {
                            bag.push(c.clone());
                        }
                    }
                    if !processor.get_chain(cert, &bag).is_valid {
                        warnings.push("broken certificate chain".to_string());
                    }
                }
            }
        }

        warnings
    }

    fn verify_counter_signature(
        &self,
        cs: &Pkcs9CounterSignature,
        parent_encrypted_digest: &[u8],
        processor: &CertificateProcessor,
        warnings: &mut Vec<String>,
    ) {
        if !cs.digest_matches(parent_encrypted_digest) {
            warnings.push("counter-signature digest mismatch".to_string());
        }
        match self.certificates.get(cs.signer_cert) {
            Some(cert) => {
                if !processor.get_chain(cert, &self.certificates).is_valid {
                    warnings.push("broken certificate chain".to_string());
                }
            }
            None => warnings.push("counter-signer certificate not found".to_string()),
        }
        for nested in &cs.counter_signatures {
            self.verify_counter_signature(nested, &cs.encrypt_digest, processor, warnings);
        }
    }

    /// Flatten this signature and every nested one into report records,
    /// depth-first, outer signature first.
    #[must_use]
    pub fn get_signatures(&self) -> Vec<DigitalSignature> {
        ReportService::signatures(self)
    }

    /// Deduplicated union of certificates across this signature, its nested
    /// signatures and timestamp tokens, keyed by SHA-256.
    #[must_use]
    pub fn get_all_certificates(&self) -> Vec<Certificate> {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        self.collect_certificates(&mut seen, &mut out);
        out
    }

    fn collect_certificates(&self, seen: &mut Vec<String>, out: &mut Vec<Certificate>) {
        for cert in &self.certificates {
            if !seen.iter().any(|s| s == cert.sha256()) {
                seen.push(cert.sha256().to_string());
                out.push(cert.to_certificate());
            }
        }
        if let Some(signer) = &self.signer_info {
            for nested in &signer.nested_signatures {
                nested.collect_certificates(seen, out);
            }
        }
    }
}
