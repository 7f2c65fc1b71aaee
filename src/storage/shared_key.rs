//! Shared Key authorization for the blob data plane
//!
//! Signs requests with the account key: the signature is the base64
//! HMAC-SHA256 of a canonical string built from the verb, a fixed list of
//! standard headers, the `x-ms-*` headers and the canonicalized resource.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Standard headers in string-to-sign order
const SIGNED_HEADERS: &[&str] = &[
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

/// Signs blob-service requests for one account
#[derive(Clone)]
pub struct SharedKeySigner {
    account: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for SharedKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Security: never print the key
        f.debug_struct("SharedKeySigner")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl SharedKeySigner {
    /// `account_key` is the base64 key returned by `listKeys`
    pub fn new(account: &str, account_key: &str) -> Result<Self> {
        let key = BASE64
            .decode(account_key.trim())
            .context("storage account key is not valid base64")?;
        Ok(Self {
            account: account.to_string(),
            key,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Build the canonical string; `headers` keys must be lowercase
    pub fn string_to_sign(&self, method: &str, url: &Url, headers: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        out.push_str(&method.to_ascii_uppercase());
        out.push('\n');

        for name in SIGNED_HEADERS {
            let value = headers.get(*name).map(String::as_str).unwrap_or("");
            // A zero Content-Length is signed as empty
            let value = if *name == "content-length" && value == "0" { "" } else { value };
            out.push_str(value);
            out.push('\n');
        }

        for (name, value) in headers.iter().filter(|(k, _)| k.starts_with("x-ms-")) {
            out.push_str(name);
            out.push(':');
            out.push_str(value.trim());
            out.push('\n');
        }

        out.push_str(&self.canonicalized_resource(url));
        out
    }

    fn canonicalized_resource(&self, url: &Url) -> String {
        let mut out = format!("/{}{}", self.account, url.path());

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in url.query_pairs() {
            params
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(value.into_owned());
        }

        for (name, mut values) in params {
            values.sort();
            out.push('\n');
            out.push_str(&name);
            out.push(':');
            out.push_str(&values.join(","));
        }

        out
    }

    /// Value for the `Authorization` header
    pub fn authorization(
        &self,
        method: &str,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<String> {
        let string_to_sign = self.string_to_sign(method, url, headers);
        let mut mac =
            HmacSha256::new_from_slice(&self.key).context("initializing HMAC with account key")?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{}", self.account, signature))
    }
}
