// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Self-signed certificate generation and TLS keypair validation.

use rcgen::string::Ia5String;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, IsCa, KeyPair,
    KeyUsagePurpose, SanType,
};
use x509_parser::prelude::*;

use crate::constants::SERVER_SERVICE_NAME;
use crate::error::{QuartermasterError, Result};
use crate::types::TlsCertificate;

/// Validity period for the bootstrap-generated certificate
const CERT_VALIDITY_YEARS: i64 = 10;

/// In-cluster DNS names the generated certificate must cover
pub fn server_dns_names(namespace: &str) -> Vec<String> {
    vec![
        "localhost".to_string(),
        SERVER_SERVICE_NAME.to_string(),
        format!("{}.{}", SERVER_SERVICE_NAME, namespace),
        format!("{}.{}.svc", SERVER_SERVICE_NAME, namespace),
        format!("{}.{}.svc.cluster.local", SERVER_SERVICE_NAME, namespace),
    ]
}

/// Generate a self-signed certificate covering the given DNS names, marked
/// as its own CA
pub fn generate_self_signed(hosts: &[String]) -> Result<TlsCertificate> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::CommonName,
        DnValue::Utf8String(SERVER_SERVICE_NAME.to_string()),
    );
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String("Quartermaster".to_string()),
    );
    params.distinguished_name = dn;

    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ServerAuth];

    let now = ::time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + ::time::Duration::days(CERT_VALIDITY_YEARS * 365);

    params.subject_alt_names = hosts
        .iter()
        .map(|host| {
            if let Ok(ip) = host.parse::<std::net::IpAddr>() {
                Ok(SanType::IpAddress(ip))
            } else {
                Ia5String::try_from(host.clone())
                    .map(SanType::DnsName)
                    .map_err(|e| {
                        QuartermasterError::CertificateError(format!(
                            "invalid DNS name '{}': {}",
                            host, e
                        ))
                    })
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let key_pair = KeyPair::generate().map_err(|e| {
        QuartermasterError::CertificateError(format!("failed to generate key pair: {}", e))
    })?;
    let cert = params.self_signed(&key_pair).map_err(|e| {
        QuartermasterError::CertificateError(format!("failed to self-sign certificate: {}", e))
    })?;

    Ok(TlsCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}

/// Check that a PEM certificate/private-key pair is well formed
pub fn validate_key_pair(cert_pem: &str, key_pem: &str) -> Result<()> {
    let der = parse_cert_pem(cert_pem)?;
    X509Certificate::from_der(&der).map_err(|e| {
        QuartermasterError::CertificateError(format!("failed to parse certificate: {}", e))
    })?;
    KeyPair::from_pem(key_pem).map_err(|e| {
        QuartermasterError::CertificateError(format!("failed to parse private key: {}", e))
    })?;
    Ok(())
}

fn parse_cert_pem(pem_data: &str) -> Result<Vec<u8>> {
    let pem_obj = ::pem::parse(pem_data.as_bytes())
        .map_err(|e| QuartermasterError::CertificateError(format!("failed to parse PEM: {}", e)))?;
    Ok(pem_obj.contents().to_vec())
}
