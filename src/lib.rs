//! Authenticode Signature Parser & Verifier
//!
//! Decodes the Microsoft Authenticode PKCS#7 envelope found in a PE file's
//! attribute certificate table: the embedded SpcIndirectDataContent, the
//! signer and its counter-signatures (legacy PKCS#9 and RFC 3161 timestamp
//! tokens), nested signatures, and the certificate bag. Decoding is
//! best-effort by policy: broken structures surface as warnings on the
//! affected component, never as aborts.
//!
//! The caller supplies the raw WIN_CERTIFICATE payload (header stripped)
//! and compares the reported `file_digest` against a PE image hash it
//! computed itself; neither PE parsing nor image hashing happens here.

pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use domain::certificate::chain::{CertificateChain, CertificateProcessor, TrustStore};
pub use domain::certificate::{Attributes, Certificate, CertificateView};
pub use domain::crypto::HashKind;
pub use domain::pkcs7::Pkcs7Signature;
pub use domain::signature::{CounterSigner, CounterSignerKind, DigitalSignature};
pub use infra::config::ParserConfig;
pub use infra::error::{ParseError, ParseResult};
pub use pipelines::verify::VerifyWorkflow;

/// Parse a WIN_CERTIFICATE payload into one record per signature found.
///
/// Convenience wrapper over [`VerifyWorkflow`] with default limits and an
/// empty trust store.
pub fn parse_signatures(input: &[u8]) -> ParseResult<Vec<DigitalSignature>> {
    VerifyWorkflow::new().run(input)
}
