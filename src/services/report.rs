//! Report flattening service.
//!
//! Turns the parsed signature tree into `DigitalSignature` records: this
//! signature first, then every nested signature in depth-first order, each
//! with its signer chain and unified counter-signer list attached.

use crate::domain::asn1;
use crate::domain::certificate::chain::CertificateProcessor;
use crate::domain::certificate::CertificateView;
use crate::domain::pkcs7::counter_signature::Pkcs9CounterSignature;
use crate::domain::pkcs7::timestamp::MsCounterSignature;
use crate::domain::pkcs7::Pkcs7Signature;
use crate::domain::signature::{CounterSigner, CounterSignerKind, DigitalSignature};

/// Builds report records from a parsed envelope.
pub struct ReportService;

impl ReportService {
    /// Flatten `root` and its nested signatures, outer first.
    #[must_use]
    pub fn signatures(root: &Pkcs7Signature) -> Vec<DigitalSignature> {
        Self::signatures_with(root, &CertificateProcessor::new())
    }

    /// Flatten with an explicit processor (and its trust store).
    #[must_use]
    pub fn signatures_with(
        root: &Pkcs7Signature,
        processor: &CertificateProcessor,
    ) -> Vec<DigitalSignature> {
        let mut records = Vec::new();
        Self::collect(root, processor, &mut records);
        records
    }

    fn collect(
        sig: &Pkcs7Signature,
        processor: &CertificateProcessor,
        records: &mut Vec<DigitalSignature>,
    ) {
        if !sig.is_signed_data() {
            // Not a PKCS#7 signedData at all; nothing to report.
            return;
        }
        records.push(Self::record(sig, processor));
        if let Some(signer) = &sig.signer_info {
            for nested in &signer.nested_signatures {
                Self::collect(nested, processor, records);
            }
        }
    }

    fn record(sig: &Pkcs7Signature, processor: &CertificateProcessor) -> DigitalSignature {
        let warnings = sig.verify_with(processor);
        let is_valid = warnings.is_empty();

        let mut record = DigitalSignature {
            signer_cert: None,
            file_digest: String::new(),
            digest_algorithm: String::new(),
            program_name: String::new(),
            more_info_url: String::new(),
            certificates: Vec::new(),
            counter_signers: Vec::new(),
            warnings,
            is_valid,
        };

        if let Some(ci) = &sig.content_info {
            record.file_digest = ci.digest.clone();
            if let Some(alg) = &ci.digest_algorithm {
                record.digest_algorithm = asn1::oid_name_or_dotted(alg);
            }
        }

        let Some(signer) = &sig.signer_info else {
            return record;
        };
        record.program_name = signer.program_name().to_string();
        record.more_info_url = signer.more_info_url().to_string();

        if let Some(index) = signer.find_signer_cert(sig.certificates()) {
            let cert = &sig.certificates()[index];
            record.signer_cert = Some(cert.to_certificate());
            record.certificates = processor
                .get_chain(cert, sig.certificates())
                .certificates
                .iter()
                .map(CertificateView::to_certificate)
                .collect();
        }

        for cs in &signer.counter_signatures {
            Self::collect_pkcs9(cs, sig.certificates(), processor, &mut record.counter_signers);
        }
        for ms in &signer.ms_counter_signatures {
            record
                .counter_signers
                .push(Self::ms_counter_signer(ms, sig.certificates(), processor));
        }
        record
    }

    fn collect_pkcs9(
        cs: &Pkcs9CounterSignature,
        bag: &[CertificateView],
        processor: &CertificateProcessor,
        out: &mut Vec<CounterSigner>,
    ) {
        let certificate = bag.get(cs.signer_cert);
        out.push(CounterSigner {
            kind: CounterSignerKind::Pkcs9,
            certificate: certificate.map(CertificateView::to_certificate),
            chain: certificate
                .map(|cert| {
                    processor
                        .get_chain(cert, bag)
                        .certificates
                        .iter()
                        .map(CertificateView::to_certificate)
                        .collect()
                })
                .unwrap_or_default(),
            sign_time: cs.signing_time.clone(),
            digest: cs.digest.clone(),
            digest_algorithm: cs
                .digest_algorithm
                .as_ref()
                .map(asn1::oid_name_or_dotted)
                .unwrap_or_default(),
        });
        // RFC 2985 permits arbitrarily deep chains; flatten them.
        for nested in &cs.counter_signatures {
            Self::collect_pkcs9(nested, bag, processor, out);
        }
    }

    fn ms_counter_signer(
        ms: &MsCounterSignature,
        root_bag: &[CertificateView],
        processor: &CertificateProcessor,
    ) -> CounterSigner {
        let certificate = ms.sign_cert.and_then(|i| ms.certificates.get(i));
        let chain = certificate
            .map(|cert| {
                let mut bag = ms.certificates.clone();
                for c in root_bag {
                    if !bag.iter().any(|b| b.sha256() == c.sha256()) {
                        bag.push(c.clone());
                    }
                }
                processor
                    .get_chain(cert, &bag)
                    .certificates
                    .iter()
                    .map(CertificateView::to_certificate)
                    .collect()
            })
            .unwrap_or_default();
        CounterSigner {
            kind: CounterSignerKind::MsTimestamp,
            certificate: certificate.map(CertificateView::to_certificate),
            chain,
            sign_time: ms.sign_time.clone(),
            digest: ms.imprint.clone(),
            digest_algorithm: ms
                .imprint_algorithm
                .as_ref()
                .map(asn1::oid_name_or_dotted)
                .unwrap_or_default(),
        }
    }
}
