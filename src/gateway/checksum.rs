//! Keyed checksum engine for the hosted-pay-page provider.
//!
//! The provider authenticates both directions with a suffixed SHA-256 digest:
//! `hex(sha256(<input> ++ salt_key)) ++ "###" ++ salt_index`. What goes into
//! `<input>` differs per message kind and is mandated by the provider:
//!
//! * outbound pay request:  base64 body ++ API path
//! * outbound status query: API path only (GET, no body)
//! * inbound webhook:       base64 body only (no path component)
//!
//! The asymmetry between the outbound and inbound conventions is part of the
//! provider contract and must not be "normalized".

use crate::gateway::utils::secure_eq;
use sha2::{Digest, Sha256};

pub const CHECKSUM_SEPARATOR: &str = "###";

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

fn suffixed(digest: String, salt_index: &str) -> String {
    format!("{}{}{}", digest, CHECKSUM_SEPARATOR, salt_index)
}

/// Checksum for a signed POST request: `sha256(base64_body + path + salt)`.
pub fn sign_request(body_base64: &str, api_path: &str, salt_key: &str, salt_index: &str) -> String {
    suffixed(
        sha256_hex(&format!("{}{}{}", body_base64, api_path, salt_key)),
        salt_index,
    )
}

/// Checksum for a signed GET request: `sha256(path + salt)`.
pub fn sign_path(api_path: &str, salt_key: &str, salt_index: &str) -> String {
    suffixed(sha256_hex(&format!("{}{}", api_path, salt_key)), salt_index)
}

/// Checksum over an inbound webhook body: `sha256(base64_body + salt)`.
pub fn sign_response(body_base64: &str, salt_key: &str, salt_index: &str) -> String {
    suffixed(
        sha256_hex(&format!("{}{}", body_base64, salt_key)),
        salt_index,
    )
}

/// Verify an inbound webhook checksum against the `X-VERIFY` header value.
///
/// The full suffixed string is compared, so a wrong salt index fails exactly
/// like a wrong digest.
pub fn verify_response(
    body_base64: &str,
    salt_key: &str,
    salt_index: &str,
    provided: &str,
) -> bool {
    let expected = sign_response(body_base64, salt_key, salt_index);
    secure_eq(expected.as_bytes(), provided.trim().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &str = "salt-key-under-test";
    const INDEX: &str = "1";

    #[test]
    fn response_sign_verify_roundtrip() {
        let body = "eyJjb2RlIjoiUEFZTUVOVF9TVUNDRVNTIn0=";
        let checksum = sign_response(body, SALT, INDEX);
        assert!(verify_response(body, SALT, INDEX, &checksum));
    }

    #[test]
    fn checksum_carries_salt_index_suffix() {
        let checksum = sign_response("cGF5bG9hZA==", SALT, "2");
        assert!(checksum.ends_with("###2"));
        // 64 hex chars + "###" + index
        assert_eq!(checksum.len(), 64 + 3 + 1);
    }

    #[test]
    fn mutated_payload_fails_verification() {
        let body = "cGF5bG9hZA==";
        let checksum = sign_response(body, SALT, INDEX);
        assert!(!verify_response("cGF5bG9hZB==", SALT, INDEX, &checksum));
    }

    #[test]
    fn mutated_checksum_fails_verification() {
        let body = "cGF5bG9hZA==";
        let mut checksum = sign_response(body, SALT, INDEX);
        // Flip one hex character.
        let first = if checksum.starts_with('a') { 'b' } else { 'a' };
        checksum.replace_range(0..1, &first.to_string());
        assert!(!verify_response(body, SALT, INDEX, &checksum));
    }

    #[test]
    fn wrong_salt_index_fails_verification() {
        let body = "cGF5bG9hZA==";
        let checksum = sign_response(body, SALT, "1");
        assert!(!verify_response(body, SALT, "2", &checksum));
    }

    #[test]
    fn request_and_response_conventions_differ() {
        // The outbound convention hashes the API path after the body; the
        // inbound one does not. Same body, same salt, different checksum.
        let body = "cGF5bG9hZA==";
        let outbound = sign_request(body, "/pg/v1/pay", SALT, INDEX);
        let inbound = sign_response(body, SALT, INDEX);
        assert_ne!(outbound, inbound);
    }

    #[test]
    fn path_convention_hashes_path_only() {
        let path = "/pg/v1/status/MID/txn-1";
        let signed = sign_path(path, SALT, INDEX);
        // Equivalent to the request convention over an empty body.
        assert_eq!(signed, sign_request("", path, SALT, INDEX));
    }
}
