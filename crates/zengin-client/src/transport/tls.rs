//! TLS client configuration.
//!
//! Only TLS 1.2 and 1.3 are offered, and only AEAD suites (GCM or
//! ChaCha20-Poly1305). Key material arrives as DER; reading it from disk is
//! the caller's job.

use std::sync::Arc;
use std::time::SystemTime;

use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{
    Certificate, ClientConfig, PrivateKey, RootCertStore, ServerName, SupportedCipherSuite,
};

use super::TransportError;

/// Client certificate chain plus its PKCS#8 key.
pub struct ClientIdentity {
    pub cert_chain: Vec<Certificate>,
    pub key: PrivateKey,
}

#[derive(Default)]
pub struct TlsMaterial {
    pub client_identity: Option<ClientIdentity>,
    /// Anchors for the bank's server certificate.
    pub trust_roots: Option<Vec<Certificate>>,
}

const WEAK_MARKERS: [&str; 6] = ["NULL", "EXPORT", "ANON", "RC4", "_DES_", "3DES"];

/// Whether a suite name is acceptable for bank traffic.
pub fn is_strong_cipher_suite(name: &str) -> bool {
    let name = name.to_ascii_uppercase();
    let aead = name.contains("GCM") || name.contains("CHACHA20");
    aead && !WEAK_MARKERS.iter().any(|weak| name.contains(weak))
}

/// The compiled-in suites that pass `is_strong_cipher_suite`.
pub fn strong_cipher_suites() -> Vec<SupportedCipherSuite> {
    rustls::ALL_CIPHER_SUITES
        .iter()
        .copied()
        .filter(|s| is_strong_cipher_suite(&format!("{:?}", s.suite())))
        .collect()
}

/// Build the client configuration.
///
/// Without trust roots this fails unless `accept_invalid_certs` is set, in
/// which case every server certificate is accepted.
pub fn client_config(
    material: TlsMaterial,
    accept_invalid_certs: bool,
) -> Result<Arc<ClientConfig>, TransportError> {
    let tls_err = |e: rustls::Error| TransportError::TlsInitialization(e.to_string());

    let suites = strong_cipher_suites();
    if suites.is_empty() {
        return Err(TransportError::TlsInitialization(
            "no acceptable cipher suites".into(),
        ));
    }

    let mut roots = RootCertStore::empty();
    let trust_all = match &material.trust_roots {
        Some(certs) if !certs.is_empty() => {
            for cert in certs {
                roots.add(cert).map_err(|e| {
                    TransportError::TlsInitialization(format!("invalid trust root: {e}"))
                })?;
            }
            false
        }
        _ if accept_invalid_certs => true,
        _ => {
            return Err(TransportError::TlsInitialization(
                "no trust roots configured and accept_invalid_certs is off".into(),
            ))
        }
    };

    let builder = ClientConfig::builder()
        .with_cipher_suites(&suites)
        .with_safe_default_kx_groups()
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(tls_err)?
        .with_root_certificates(roots);

    let mut config = match material.client_identity {
        Some(identity) => builder
            .with_client_auth_cert(identity.cert_chain, identity.key)
            .map_err(tls_err)?,
        None => builder.with_no_client_auth(),
    };

    if trust_all {
        tracing::warn!("TLS server certificate verification is DISABLED");
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyServerCert));
    }

    Ok(Arc::new(config))
}

/// Accepts every server certificate. Only reachable through
/// `accept_invalid_certs`.
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
