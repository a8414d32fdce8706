// Endpoint module - discovers the Prometheus query endpoint from the cluster
//
// This module is responsible for:
// 1. Asking kubectl for the ingress that fronts Prometheus
// 2. Extracting the externally-reachable load-balancer hostname
// 3. Building the instant-query base URL from that hostname
//
// Resolution is a one-shot precondition check: there is no retry, and a
// failure here is fatal to the whole run (no queries can be issued).

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Well-known name of the ingress resource fronting Prometheus
pub const INGRESS_NAME: &str = "prometheus-ingress";

/// jsonpath expression selecting the first load-balancer hostname of the
/// prometheus-ingress resource, across all namespaces
const HOSTNAME_JSONPATH: &str = "jsonpath={.items[?(@.metadata.name=='prometheus-ingress')].status.loadBalancer.ingress[0].hostname}";

/// Errors that can occur during endpoint resolution
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("failed to run kubectl: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("kubectl exited with {status}: {stderr}")]
    CommandFailed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("ingress '{}' has no load-balancer hostname assigned", INGRESS_NAME)]
    NoHostname,
}

/// Resolves the Prometheus instant-query URL from cluster configuration
///
/// Runs `kubectl get ingress -A` with a jsonpath filter and builds
/// `http://<hostname>/api/v1/query` from the returned hostname.
///
/// # Returns
/// * `Ok(String)` - A usable query base URL
/// * `Err(ResolveError)` - kubectl missing/failed, or no hostname assigned;
///   the caller must treat this as unrecoverable and halt before collecting
pub async fn resolve_prometheus_url() -> Result<String, ResolveError> {
    debug!("Querying kubectl for ingress '{}'", INGRESS_NAME);

    let output = Command::new("kubectl")
        .args(["get", "ingress", "-A", "-o", HOSTNAME_JSONPATH])
        .output()
        .await?;

    if !output.status.success() {
        return Err(ResolveError::CommandFailed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let hostname = String::from_utf8_lossy(&output.stdout);
    let url = query_url_from_hostname(&hostname).ok_or(ResolveError::NoHostname)?;

    info!("Resolved Prometheus endpoint: {}", url);
    Ok(url)
}

/// Builds the instant-query URL from a raw kubectl hostname string
///
/// Returns `None` when the hostname is empty after trimming, which is what
/// kubectl prints when the ingress is absent or has no address assigned yet.
fn query_url_from_hostname(hostname: &str) -> Option<String> {
    let hostname = hostname.trim();
    if hostname.is_empty() {
        return None;
    }
    Some(format!("http://{hostname}/api/v1/query"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_from_hostname() {
        assert_eq!(
            query_url_from_hostname("prom.example.com\n").as_deref(),
            Some("http://prom.example.com/api/v1/query")
        );
    }

    #[test]
    fn test_empty_hostname_is_unresolvable() {
        assert!(query_url_from_hostname("").is_none());
        assert!(query_url_from_hostname("   \n").is_none());
    }

    #[test]
    fn test_no_hostname_error_names_the_ingress() {
        let message = ResolveError::NoHostname.to_string();
        assert!(message.contains(INGRESS_NAME));
    }
}
