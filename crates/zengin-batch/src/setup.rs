//! Wiring from configuration to store and connector.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rustls::{Certificate, PrivateKey};

use zengin_client::transport::{tls, Connector};
use zengin_client::{ClientIdentity, TcpConnector, TlsMaterial};
use zengin_core::config::{StoreBackend, StoreConfig, TlsConfig, ZenginConfig};
use zengin_services::{IntegrityStore, MemoryIntegrityStore, SqliteIntegrityStore};

pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn IntegrityStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("integrity store: in-memory");
            Ok(Arc::new(MemoryIntegrityStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = &config.sqlite_path;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let store = SqliteIntegrityStore::open(path)
                .with_context(|| format!("failed to open integrity store {}", path.display()))?;
            tracing::info!(path = %path.display(), "integrity store: sqlite");
            Ok(Arc::new(store))
        }
    }
}

fn read_der(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_tls_material(config: &TlsConfig) -> Result<TlsMaterial> {
    let trust_roots = match &config.trust_roots_path {
        Some(path) => Some(vec![Certificate(read_der(path)?)]),
        None => None,
    };

    let client_identity = match (&config.client_cert_path, &config.client_key_path) {
        (Some(cert), Some(key)) => Some(ClientIdentity {
            cert_chain: vec![Certificate(read_der(cert)?)],
            key: PrivateKey(read_der(key)?),
        }),
        (None, None) => None,
        _ => bail!("tls.client_cert_path and tls.client_key_path must be set together"),
    };

    Ok(TlsMaterial {
        client_identity,
        trust_roots,
    })
}

pub fn connector(config: &ZenginConfig) -> Result<Box<dyn Connector>> {
    if !config.tls.enabled {
        tracing::warn!("TLS disabled, bank traffic will be sent in clear text");
        return Ok(Box::new(TcpConnector::plain(&config.transport)));
    }

    let material = load_tls_material(&config.tls)?;
    let client_config = tls::client_config(material, config.tls.accept_invalid_certs)?;
    Ok(Box::new(TcpConnector::tls(&config.transport, client_config)))
}
