//! Shared fixture builders: in-process PKI plus assembly of real, signed
//! Authenticode blobs the integration tests parse back.

#![allow(dead_code)]

use cms::builder::{create_signing_time_attribute, SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::ContentInfo as CmsContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo as CmsSignerInfo, SignerInfos};
use const_oid::ObjectIdentifier;
use der::asn1::{BitString, GeneralizedTime, Int, OctetString, SetOfVec};
use der::{Any, DateTime, Decode, Encode, Tag};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::RsaPrivateKey;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use x509_cert::attr::{Attribute, AttributeTypeAndValue};
use x509_cert::builder::Builder;
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

use authenticode_verify::domain::pkcs7::content_info::{
    DigestInfo, SpcAttributeTypeAndOptionalValue, SpcIndirectDataContent,
};
use authenticode_verify::domain::pkcs7::timestamp::{MessageImprint, TstInfo};

pub const OID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub const OID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
pub const OID_SPC_INDIRECT_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.4");
pub const OID_SPC_PE_IMAGE_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.15");
pub const OID_SPC_SP_OPUS_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.12");
pub const OID_SPC_NESTED_SIGNATURE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.4.1");
pub const OID_MS_COUNTER_SIGNATURE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.3.3.1");
pub const OID_COUNTER_SIGNATURE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.6");
pub const OID_TST_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
pub const OID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
pub const OID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
pub const OID_SHA1_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
pub const OID_SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub const OID_ECDSA_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

/// Key + certificate pair used as a signer in fixtures.
pub struct TestIdentity {
    pub key: RsaPrivateKey,
    pub cert: Certificate,
}

/// A minimal two-level PKI: self-signed root plus a leaf it issued.
pub struct TestPki {
    pub root: TestIdentity,
    pub signer: TestIdentity,
}

pub fn rsa_key() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("rsa keygen")
}

/// DN with a single CN entry.
pub fn name(common_name: &str) -> Name {
    let atv = AttributeTypeAndValue {
        oid: ObjectIdentifier::new_unwrap("2.5.4.3"),
        value: Any::new(Tag::Utf8String, common_name.as_bytes()).unwrap(),
    };
    RdnSequence(vec![RelativeDistinguishedName::from(
        SetOfVec::try_from(vec![atv]).unwrap(),
    )])
}

fn rsa_sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: OID_SHA256_WITH_RSA,
        parameters: None,
    }
}

fn spki_for(key: &RsaPrivateKey) -> SubjectPublicKeyInfoOwned {
    let doc = key.to_public_key().to_public_key_der().expect("spki der");
    SubjectPublicKeyInfoOwned::from_der(doc.as_bytes()).expect("spki parse")
}

/// Issue a certificate for `subject_key`, signed by `issuer_key`.
pub fn make_cert(
    subject: &Name,
    issuer: &Name,
    serial: &[u8],
    subject_key: &RsaPrivateKey,
    issuer_key: &RsaPrivateKey,
) -> Certificate {
    let validity = Validity {
        not_before: Time::GeneralTime(GeneralizedTime::from_date_time(
            DateTime::new(2020, 1, 1, 0, 0, 0).unwrap(),
        )),
        not_after: Time::GeneralTime(GeneralizedTime::from_date_time(
            DateTime::new(2050, 1, 1, 0, 0, 0).unwrap(),
        )),
    };
    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(serial).unwrap(),
        signature: rsa_sha256_algorithm(),
        issuer: issuer.clone(),
        validity,
        subject: subject.clone(),
        subject_public_key_info: spki_for(subject_key),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };
    let tbs_der = tbs.to_der().unwrap();
    let signing_key = SigningKey::<Sha256>::new(issuer_key.clone());
    let signature: rsa::pkcs1v15::Signature =
        signature::Signer::sign(&signing_key, &tbs_der);
    let signature_bytes: Box<[u8]> = signature::SignatureEncoding::to_bytes(&signature);
    Certificate {
        tbs_certificate: tbs,
        signature_algorithm: rsa_sha256_algorithm(),
        signature: BitString::from_bytes(&signature_bytes).unwrap(),
    }
}

/// Root CA plus one leaf signer, CNs derived from `label`.
pub fn make_pki(label: &str) -> TestPki {
    let root_key = rsa_key();
    let signer_key = rsa_key();
    let root_name = name(&format!("{label} Root CA"));
    let signer_name = name(&format!("{label} Signer"));
    let root_cert = make_cert(&root_name, &root_name, &[0x01], &root_key, &root_key);
    let signer_cert = make_cert(&signer_name, &root_name, &[0x02, 0x01], &signer_key, &root_key);
    TestPki {
        root: TestIdentity {
            key: root_key,
            cert: root_cert,
        },
        signer: TestIdentity {
            key: signer_key,
            cert: signer_cert,
        },
    }
}

pub fn signer_identifier(cert: &Certificate) -> SignerIdentifier {
    SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: cert.tbs_certificate.issuer.clone(),
        serial_number: cert.tbs_certificate.serial_number.clone(),
    })
}

/// Encapsulated SpcIndirectDataContent for a given file digest.
pub fn spc_content(digest_oid: ObjectIdentifier, file_digest: &[u8]) -> Any {
    let spc = SpcIndirectDataContent {
        data: SpcAttributeTypeAndOptionalValue {
            value_type: OID_SPC_PE_IMAGE_DATA,
            value: None,
        },
        message_digest: DigestInfo {
            digest_algorithm: AlgorithmIdentifierOwned {
                oid: digest_oid,
                parameters: None,
            },
            digest: OctetString::new(file_digest.to_vec()).unwrap(),
        },
    };
    Any::from_der(&spc.to_der().unwrap()).unwrap()
}

/// SpcSpOpusInfo attribute with an ASCII program name and URL.
pub fn opus_info_attribute(program_name: &str, url: &str) -> Attribute {
    let mut name_string = vec![0x81, program_name.len() as u8];
    name_string.extend_from_slice(program_name.as_bytes());
    let mut link = vec![0x80, url.len() as u8];
    link.extend_from_slice(url.as_bytes());

    let mut body = vec![0xa0, name_string.len() as u8];
    body.extend_from_slice(&name_string);
    body.push(0xa1);
    body.push(link.len() as u8);
    body.extend_from_slice(&link);

    let value = Any::new(Tag::Sequence, body).unwrap();
    Attribute {
        oid: OID_SPC_SP_OPUS_INFO,
        values: SetOfVec::try_from(vec![value]).unwrap(),
    }
}

/// Digest algorithm choice for blob fixtures.
#[derive(Clone, Copy)]
pub enum FixtureDigest {
    Sha1,
    Sha256,
}

impl FixtureDigest {
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            FixtureDigest::Sha1 => OID_SHA1,
            FixtureDigest::Sha256 => OID_SHA256,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            FixtureDigest::Sha1 => Sha1::digest(data).to_vec(),
            FixtureDigest::Sha256 => Sha256::digest(data).to_vec(),
        }
    }

    pub fn output_len(self) -> usize {
        match self {
            FixtureDigest::Sha1 => 20,
            FixtureDigest::Sha256 => 32,
        }
    }
}

/// Build a complete signed Authenticode blob: SpcIndirectDataContent with
/// `file_digest`, one signer, the signer and root certificates embedded.
pub fn build_signed_blob(
    pki: &TestPki,
    digest: FixtureDigest,
    file_digest: &[u8],
    signed_attributes: &[Attribute],
) -> Vec<u8> {
    let econtent = cms::signed_data::EncapsulatedContentInfo {
        econtent_type: OID_SPC_INDIRECT_DATA,
        econtent: Some(spc_content(digest.oid(), file_digest)),
    };
    let digest_algorithm = AlgorithmIdentifierOwned {
        oid: digest.oid(),
        parameters: None,
    };

    let content_info = match digest {
        FixtureDigest::Sha1 => {
            let signing_key = SigningKey::<Sha1>::new(pki.signer.key.clone());
            let mut si_builder = SignerInfoBuilder::new(
                &signing_key,
                signer_identifier(&pki.signer.cert),
                digest_algorithm.clone(),
                &econtent,
                None,
            )
            .expect("signer info builder");
            for attr in signed_attributes {
                si_builder.add_signed_attribute(attr.clone()).unwrap();
            }
            SignedDataBuilder::new(&econtent)
                .add_digest_algorithm(digest_algorithm)
                .unwrap()
                .add_certificate(CertificateChoices::Certificate(pki.signer.cert.clone()))
                .unwrap()
                .add_certificate(CertificateChoices::Certificate(pki.root.cert.clone()))
                .unwrap()
                .add_signer_info::<SigningKey<Sha1>, rsa::pkcs1v15::Signature>(si_builder)
                .unwrap()
                .build()
                .expect("signed data")
        }
        FixtureDigest::Sha256 => {
            let signing_key = SigningKey::<Sha256>::new(pki.signer.key.clone());
            let mut si_builder = SignerInfoBuilder::new(
                &signing_key,
                signer_identifier(&pki.signer.cert),
                digest_algorithm.clone(),
                &econtent,
                None,
            )
            .expect("signer info builder");
            for attr in signed_attributes {
                si_builder.add_signed_attribute(attr.clone()).unwrap();
            }
            SignedDataBuilder::new(&econtent)
                .add_digest_algorithm(digest_algorithm)
                .unwrap()
                .add_certificate(CertificateChoices::Certificate(pki.signer.cert.clone()))
                .unwrap()
                .add_certificate(CertificateChoices::Certificate(pki.root.cert.clone()))
                .unwrap()
                .add_signer_info::<SigningKey<Sha256>, rsa::pkcs1v15::Signature>(si_builder)
                .unwrap()
                .build()
                .expect("signed data")
        }
    };

    content_info.to_der().expect("blob der")
}

fn decode_blob(blob: &[u8]) -> SignedData {
    let ci = CmsContentInfo::from_der(blob).expect("content info");
    ci.content.decode_as::<SignedData>().expect("signed data")
}

fn reassemble(signed_data: &SignedData) -> Vec<u8> {
    let ci = CmsContentInfo {
        content_type: OID_SIGNED_DATA,
        content: Any::encode_from(signed_data).expect("re-encode signed data"),
    };
    ci.to_der().expect("re-encode blob")
}

/// The signer's encryptedDigest bytes from a built blob.
pub fn signer_signature(blob: &[u8]) -> Vec<u8> {
    let sd = decode_blob(blob);
    sd.signer_infos
        .0
        .iter()
        .next()
        .expect("one signer")
        .signature
        .as_bytes()
        .to_vec()
}

/// Attach an unsigned attribute to the sole signer of a built blob.
/// Unsigned attributes are outside the signature, so this keeps it valid.
pub fn attach_unsigned_attribute(blob: &[u8], attribute: Attribute) -> Vec<u8> {
    let mut sd = decode_blob(blob);
    let mut signer = sd
        .signer_infos
        .0
        .iter()
        .next()
        .expect("one signer")
        .clone();
    let mut attrs: Vec<Attribute> = signer
        .unsigned_attrs
        .iter()
        .flat_map(|set| set.iter().cloned())
        .collect();
    attrs.push(attribute);
    signer.unsigned_attrs = Some(SetOfVec::try_from(attrs).unwrap());
    sd.signer_infos = SignerInfos(SetOfVec::try_from(vec![signer]).unwrap());
    reassemble(&sd)
}

/// Override the declared signature algorithm of the sole signer. The
/// signature bytes stay untouched, so a disagreeing declaration must make
/// verification fail.
pub fn override_signature_algorithm(blob: &[u8], oid: ObjectIdentifier) -> Vec<u8> {
    let mut sd = decode_blob(blob);
    let mut signer = sd
        .signer_infos
        .0
        .iter()
        .next()
        .expect("one signer")
        .clone();
    signer.signature_algorithm = AlgorithmIdentifierOwned {
        oid,
        parameters: None,
    };
    sd.signer_infos = SignerInfos(SetOfVec::try_from(vec![signer]).unwrap());
    reassemble(&sd)
}

/// Remove every SignerInfo from a built blob, keeping the rest intact.
pub fn strip_signer_infos(blob: &[u8]) -> Vec<u8> {
    let mut sd = decode_blob(blob);
    sd.signer_infos = SignerInfos(SetOfVec::new());
    reassemble(&sd)
}

/// Flip the last byte of the embedded file digest, leaving the signed
/// attributes untouched: the classic tampered-content fixture.
pub fn tamper_spc_digest(blob: &[u8]) -> Vec<u8> {
    let mut sd = decode_blob(blob);
    let econtent = sd
        .encap_content_info
        .econtent
        .as_ref()
        .expect("encapsulated content");
    let mut spc =
        SpcIndirectDataContent::from_der(&econtent.to_der().unwrap()).expect("spc content");
    let mut digest = spc.message_digest.digest.as_bytes().to_vec();
    *digest.last_mut().unwrap() ^= 0xff;
    spc.message_digest.digest = OctetString::new(digest).unwrap();
    sd.encap_content_info.econtent = Some(Any::from_der(&spc.to_der().unwrap()).unwrap());
    reassemble(&sd)
}

/// PKCS#9 counterSignature attribute over `parent_signature`, signed by
/// `counter_signer` with SHA-1 (the legacy pairing).
pub fn pkcs9_counter_attribute(
    counter_signer: &TestIdentity,
    parent_signature: &[u8],
) -> Attribute {
    let digest = Sha1::digest(parent_signature);
    let placeholder = cms::signed_data::EncapsulatedContentInfo {
        econtent_type: OID_DATA,
        econtent: None,
    };
    let signing_key = SigningKey::<Sha1>::new(counter_signer.key.clone());
    let mut builder = SignerInfoBuilder::new(
        &signing_key,
        signer_identifier(&counter_signer.cert),
        AlgorithmIdentifierOwned {
            oid: OID_SHA1,
            parameters: None,
        },
        &placeholder,
        Some(digest.as_slice()),
    )
    .expect("counter signer builder");
    builder
        .add_signed_attribute(create_signing_time_attribute().unwrap())
        .unwrap();
    let signer_info: CmsSignerInfo = builder
        .build::<rsa::pkcs1v15::Signature>()
        .expect("counter signer info");
    Attribute {
        oid: OID_COUNTER_SIGNATURE,
        values: SetOfVec::try_from(vec![Any::encode_from(&signer_info).unwrap()]).unwrap(),
    }
}

/// Microsoft RFC 3161 timestamp attribute over `parent_signature`. The
/// token carries its own certificate bag (TSA leaf plus TSA root).
pub fn ms_timestamp_attribute(tsa: &TestPki, parent_signature: &[u8]) -> Attribute {
    let imprint = Sha256::digest(parent_signature);
    let tst = TstInfo {
        version: 1,
        policy: ObjectIdentifier::new_unwrap("1.3.6.1.4.1.601.10.3.1"),
        message_imprint: MessageImprint {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: OID_SHA256,
                parameters: None,
            },
            hashed_message: OctetString::new(imprint.to_vec()).unwrap(),
        },
        serial_number: Int::new(&[0x03, 0x39]).unwrap(),
        gen_time: GeneralizedTime::from_date_time(DateTime::new(2025, 6, 15, 8, 30, 0).unwrap()),
        accuracy: None,
        ordering: false,
        nonce: None,
        tsa: None,
        extensions: None,
    };
    let econtent = cms::signed_data::EncapsulatedContentInfo {
        econtent_type: OID_TST_INFO,
        econtent: Some(Any::new(Tag::OctetString, tst.to_der().unwrap()).unwrap()),
    };
    let digest_algorithm = AlgorithmIdentifierOwned {
        oid: OID_SHA256,
        parameters: None,
    };
    let signing_key = SigningKey::<Sha256>::new(tsa.signer.key.clone());
    let si_builder = SignerInfoBuilder::new(
        &signing_key,
        signer_identifier(&tsa.signer.cert),
        digest_algorithm.clone(),
        &econtent,
        None,
    )
    .expect("tsa signer builder");
    let token = SignedDataBuilder::new(&econtent)
        .add_digest_algorithm(digest_algorithm)
        .unwrap()
        .add_certificate(CertificateChoices::Certificate(tsa.signer.cert.clone()))
        .unwrap()
        .add_certificate(CertificateChoices::Certificate(tsa.root.cert.clone()))
        .unwrap()
        .add_signer_info::<SigningKey<Sha256>, rsa::pkcs1v15::Signature>(si_builder)
        .unwrap()
        .build()
        .expect("timestamp token");
    Attribute {
        oid: OID_MS_COUNTER_SIGNATURE,
        values: SetOfVec::try_from(vec![Any::from_der(&token.to_der().unwrap()).unwrap()])
            .unwrap(),
    }
}

/// Nested-signature attribute wrapping a complete inner blob.
pub fn nested_signature_attribute(inner_blob: &[u8]) -> Attribute {
    Attribute {
        oid: OID_SPC_NESTED_SIGNATURE,
        values: SetOfVec::try_from(vec![Any::from_der(inner_blob).unwrap()]).unwrap(),
    }
}
