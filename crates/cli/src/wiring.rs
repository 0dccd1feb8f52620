// Adapter selection (Composition Root)

use cachetool_core::port::Adapter;
use cachetool_core::{CacheToolError, Result};
use cachetool_infra_fastcgi::{Endpoint, FastCgiAdapter, FastCgiConfig};
use cachetool_infra_system::{ProcessAdapter, ProcessConfig};

use crate::settings::Settings;

pub const ADAPTER_CLI: &str = "cli";
pub const ADAPTER_FASTCGI: &str = "fastcgi";

/// Build the adapter named by `settings.adapter`
///
/// # Errors
/// - CacheToolError::Configuration for an unknown adapter name or a bad
///   connection string
pub fn build_adapter(settings: &Settings) -> Result<Box<dyn Adapter>> {
    match settings.adapter.as_str() {
        ADAPTER_CLI => {
            let config = ProcessConfig {
                php_binary: settings.php_binary(),
                timeout: settings.timeout(),
                temp_dir: settings.temp_dir(),
                ..ProcessConfig::default()
            };
            let span = tracing::info_span!("adapter", kind = ADAPTER_CLI);
            Ok(Box::new(ProcessAdapter::new(config).with_span(span)))
        }
        ADAPTER_FASTCGI => {
            let endpoint = match settings.fastcgi_endpoint() {
                Some(conn) => conn.parse::<Endpoint>()?,
                None => Endpoint::discover(),
            };
            let span = tracing::info_span!("adapter", kind = ADAPTER_FASTCGI, endpoint = %endpoint);
            let config = FastCgiConfig {
                read_write_timeout: settings.timeout(),
                keep_alive: settings.keep_alive,
                persistent: settings.persistent,
                temp_dir: settings.temp_dir(),
                ..FastCgiConfig::new(endpoint)
            };
            Ok(Box::new(FastCgiAdapter::new(config).with_span(span)))
        }
        other => Err(CacheToolError::Configuration(format!(
            "Adapter '{}' is not one of cli or fastcgi",
            other
        ))),
    }
}
