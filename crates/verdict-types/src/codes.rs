//! Well-known result codes reported by stations.
//!
//! Retrieval and indexer results are open sets of strings; only the codes the
//! engine branches on are named here.

/// Successful retrieval, or an indexer response advertising HTTP retrieval.
pub const OK: &str = "OK";

/// Indexer found the content but no HTTP advertisement.
pub const HTTP_NOT_ADVERTISED: &str = "HTTP_NOT_ADVERTISED";

pub const CONTENT_VERIFICATION_FAILED: &str = "CONTENT_VERIFICATION_FAILED";

pub const TIMEOUT: &str = "TIMEOUT";

/// Protocol name stations report for HTTP retrievals.
pub const PROTOCOL_HTTP: &str = "http";

const IPNI_ERROR_PREFIX: &str = "IPNI_ERROR_5";

/// Matches `IPNI_ERROR_5xx`: the indexer itself was unavailable, so the
/// measurement says nothing about the provider.
pub fn is_ipni_server_error(code: &str) -> bool {
    code.len() == IPNI_ERROR_PREFIX.len() + 2
        && code.starts_with(IPNI_ERROR_PREFIX)
        && code[IPNI_ERROR_PREFIX.len()..]
            .bytes()
            .all(|b| b.is_ascii_digit())
}
