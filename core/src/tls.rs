//! TLS client configuration for the relay's rustls sessions.
//!
//! Trust roots come from the platform's native certificate store first, with
//! the bundled Mozilla roots from `webpki-roots` as a fallback when the
//! platform offers none. The config is built once and shared by every call
//! that does not bring its own.

use std::sync::{Arc, OnceLock};

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore};
use tracing::debug;

use crate::error::TransportError;

static CLIENT_CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = root_store.add_parsable_certificates(certs);
            debug!(added, ignored, "loaded native trust roots");
        }
        Err(err) => debug!("native trust roots unavailable: {err}"),
    }
    if root_store.is_empty() {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    root_store
}

/// Default client config: default trust roots, no client auth.
pub fn client_config() -> Arc<ClientConfig> {
    CLIENT_CONFIG
        .get_or_init(|| {
            let config = ClientConfig::builder()
                .with_root_certificates(build_root_store())
                .with_no_client_auth();
            Arc::new(config)
        })
        .clone()
}

/// Validate `host` as the SNI name to announce.
pub fn server_name(host: &str) -> Result<ServerName<'static>, TransportError> {
    ServerName::try_from(host)
        .map(|name| name.to_owned())
        .map_err(|_| TransportError::Sni(host.to_string()))
}

/// A client session for `host` with SNI set, ready to handshake.
pub fn client_session(
    host: &str,
    config: Arc<ClientConfig>,
) -> Result<ClientConnection, TransportError> {
    let name = server_name(host)?;
    Ok(ClientConnection::new(config, name)?)
}
