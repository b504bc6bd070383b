//! Certificate chain construction from an unordered bag.
//!
//! Authenticode blobs carry their certificates as a flat set, usually
//! without the root. The processor rebuilds the signer's chain by matching
//! issuer DN + authority key id against subject DN + subject key id,
//! consulting an optional trust-anchor store for the missing upper links.

use crate::domain::certificate::CertificateView;

/// Optional set of X.509 trust anchors.
#[derive(Debug, Default)]
pub struct TrustStore {
    anchors: Vec<CertificateView>,
}

impl TrustStore {
    #[must_use]
    pub fn new(anchors: Vec<CertificateView>) -> Self {
        Self { anchors }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    #[must_use]
    pub fn anchors(&self) -> &[CertificateView] {
        &self.anchors
    }

    fn contains_sha256(&self, fingerprint: &str) -> bool {
        self.anchors.iter().any(|a| a.sha256() == fingerprint)
    }
}

/// Chain produced for one signer: the signer first, then each issuer toward
/// the root. Broken chains are returned as far as they reach; `is_valid`
/// reports completeness, it never filters.
#[derive(Debug, Clone)]
pub struct CertificateChain {
    pub certificates: Vec<CertificateView>,
    pub is_valid: bool,
}

/// Builds candidate chains for signers against a certificate bag.
#[derive(Debug, Default)]
pub struct CertificateProcessor {
    trust_store: TrustStore,
}

impl CertificateProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_trust_store(trust_store: TrustStore) -> Self {
        Self { trust_store }
    }

    #[must_use]
    pub fn trust_store(&self) -> &TrustStore {
        &self.trust_store
    }

    /// Build the chain for `signer`, extending through `bag` and the trust
    /// store until a self-signed certificate is reached or no parent is
    /// found.
    #[must_use]
    pub fn get_chain(&self, signer: &CertificateView, bag: &[CertificateView]) -> CertificateChain {
        let mut chain = vec![signer.clone()];
        let mut anchored = self.trust_store.contains_sha256(signer.sha256());

        loop {
            let current = chain.last().expect("chain is never empty");
            if current.is_self_signed() {
                break;
            }
            let Some(parent) = self.find_parent(current, bag, &chain) else {
                break;
            };
            if self.trust_store.contains_sha256(parent.sha256()) {
                anchored = true;
            }
            chain.push(parent);
        }

        let complete = chain
            .last()
            .map(CertificateView::is_self_signed)
            .unwrap_or(false);
        let is_valid = if self.trust_store.is_empty() {
            complete
        } else {
            anchored
        };

        if !is_valid {
            log::debug!(
                "chain for {} is not valid (complete: {complete}, anchored: {anchored})",
                signer.raw_subject()
            );
        }
        CertificateChain {
            certificates: chain,
            is_valid,
        }
    }

    /// Candidate parents come from the bag and the trust store; ties are
    /// broken by preferring non-expired certificates, then the smallest
    /// SHA-256 fingerprint so results stay deterministic.
    fn find_parent(
        &self,
        child: &CertificateView,
        bag: &[CertificateView],
        chain: &[CertificateView],
    ) -> Option<CertificateView> {
        let mut candidates: Vec<&CertificateView> = bag
            .iter()
            .chain(self.trust_store.anchors.iter())
            .filter(|c| is_parent_of(child, c))
            .filter(|c| !chain.iter().any(|seen| seen.sha256() == c.sha256()))
            .collect();
        candidates.sort_by(|a, b| {
            b.is_time_valid_now()
                .cmp(&a.is_time_valid_now())
                .then_with(|| a.sha256().cmp(b.sha256()))
        });
        candidates.first().map(|c| (*c).clone())
    }
}

/// Issuer DN must equal the candidate's subject DN; when both sides carry
/// key identifiers they must agree as well.
fn is_parent_of(child: &CertificateView, candidate: &CertificateView) -> bool {
    if child.issuer_der() != candidate.subject_der() {
        return false;
    }
    match (child.authority_key_id(), candidate.subject_key_id()) {
        (Some(aki), Some(ski)) => aki == ski,
        _ => true,
    }
}
