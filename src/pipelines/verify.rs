//! `VerifyWorkflow`: high-level facade for inspecting Authenticode blobs.
//!
//! Parses a WIN_CERTIFICATE payload and emits the flattened report records
//! in one call; keeps the parse/verify/report sequencing in one place.

use crate::domain::certificate::chain::{CertificateProcessor, TrustStore};
use crate::domain::pkcs7::Pkcs7Signature;
use crate::domain::signature::DigitalSignature;
use crate::infra::config::ParserConfig;
use crate::infra::error::ParseResult;
use crate::services::report::ReportService;

/// Orchestrates parsing and verification of one signature blob.
pub struct VerifyWorkflow {
    config: ParserConfig,
    processor: CertificateProcessor,
}

impl Default for VerifyWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ParserConfig::default(),
            processor: CertificateProcessor::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_trust_store(mut self, trust_store: TrustStore) -> Self {
        self.processor = CertificateProcessor::with_trust_store(trust_store);
        self
    }

    /// Parse the blob and return one record per signature found.
    pub fn run(&self, input: &[u8]) -> ParseResult<Vec<DigitalSignature>> {
        let signature = Pkcs7Signature::from_der_with_config(input, &self.config)?;
        log::debug!(
            "parsed envelope: {} certificates, {} parse warnings",
            signature.certificates().len(),
            signature.parse_warnings().len()
        );
        Ok(ReportService::signatures_with(&signature, &self.processor))
    }
}
