use std::sync::Once;

use tracing::debug;

/// Ensures the crypto provider is only initialized once.
static INIT_CRYPTO: Once = Once::new();

/// Installs the AWS LC cryptographic provider as the process default.
///
/// Must run before the first BigQuery client is built. Calling it again is a no-op, and a provider
/// installed by someone else is left in place.
pub fn install_crypto_provider_once() {
    INIT_CRYPTO.call_once(|| {
        if rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .is_err()
        {
            debug!("a default crypto provider was already installed");
        }
    });
}
