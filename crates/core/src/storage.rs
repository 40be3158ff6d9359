use crate::error::{ConfigurationError, StorageError};
use crate::models::ObjectInfo;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// All uploaded documents live under this key namespace.
pub const DOCUMENT_PREFIX: &str = "documents/";

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Storage key for an uploaded file: `documents/<filename>`.
pub fn document_key(filename: &str) -> String {
    format!("{DOCUMENT_PREFIX}{filename}")
}

/// An object fetched from storage: its bytes and the bare filename derived
/// from the key.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Durable object storage collaborator: store bytes under a key, fetch bytes
/// by key, list keys. Shared across sessions; every operation is atomic on
/// its own with no cross-session transactional guarantee.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<FetchedObject, StorageError>;

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError>;
}

/// S3 connection settings. Credentials have no default; bucket and region do.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    pub endpoint: Option<String>,
}

impl S3Config {
    pub const DEFAULT_BUCKET: &'static str = "medibot-bucket";
    pub const DEFAULT_REGION: &'static str = "us-east-1";

    /// Read configuration from the environment: `S3_ACCESS_KEY` and
    /// `S3_SECRET_KEY` are required, `S3_BUCKET_NAME` and `S3_REGION` have
    /// defaults, `S3_ENDPOINT` is optional.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let required = |name: &'static str| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigurationError::MissingCredential(name))
        };

        Ok(Self {
            access_key: required("S3_ACCESS_KEY")?,
            secret_key: required("S3_SECRET_KEY")?,
            bucket: std::env::var("S3_BUCKET_NAME")
                .unwrap_or_else(|_| Self::DEFAULT_BUCKET.to_string()),
            region: std::env::var("S3_REGION").unwrap_or_else(|_| Self::DEFAULT_REGION.to_string()),
            endpoint: std::env::var("S3_ENDPOINT").ok().filter(|e| !e.is_empty()),
        })
    }
}

/// S3-backed [`ObjectStore`] using the REST API directly with AWS Signature
/// V4 request signing (`hmac` + `sha2`), so it works against AWS and any
/// S3-compatible endpoint without a vendor SDK.
pub struct S3ObjectStore {
    config: S3Config,
    client: reqwest::Client,
    timeout: Duration,
}

impl S3ObjectStore {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    fn host(&self) -> String {
        match &self.config.endpoint {
            Some(endpoint) => endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string(),
            None => format!(
                "{}.s3.{}.amazonaws.com",
                self.config.bucket, self.config.region
            ),
        }
    }

    fn scheme(&self) -> &'static str {
        match &self.config.endpoint {
            Some(endpoint) if endpoint.starts_with("http://") => "http",
            _ => "https",
        }
    }

    /// Build a signed request. `canonical_uri` must already be URI-encoded
    /// and `query` sorted by key.
    fn signed_request(
        &self,
        method: reqwest::Method,
        canonical_uri: &str,
        query: &[(String, String)],
        payload: &[u8],
    ) -> reqwest::RequestBuilder {
        let host = self.host();
        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex_sha256(payload);

        let canonical_querystring = query
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let headers = [
            ("host", host.as_str()),
            ("x-amz-content-sha256", payload_hash.as_str()),
            ("x-amz-date", amz_date.as_str()),
        ];
        let signed_headers = headers.map(|(k, _)| k).join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_querystring,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.config.secret_key,
            &date_stamp,
            &self.config.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.config.access_key, credential_scope, signed_headers, signature
        );

        let mut url = format!("{}://{}{}", self.scheme(), host, canonical_uri);
        if !canonical_querystring.is_empty() {
            url = format!("{url}?{canonical_querystring}");
        }

        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header("Authorization", authorization)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        let canonical_uri = format!("/{}", encode_key(key));
        let response = self
            .signed_request(reqwest::Method::PUT, &canonical_uri, &[], bytes)
            .header("content-type", content_type)
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(StorageError::Request {
                key: key.to_string(),
                status: status.as_u16(),
                details: details.chars().take(500).collect(),
            });
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<FetchedObject, StorageError> {
        let canonical_uri = format!("/{}", encode_key(key));
        let response = self
            .signed_request(reqwest::Method::GET, &canonical_uri, &[], b"")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(StorageError::Request {
                key: key.to_string(),
                status: status.as_u16(),
                details: details.chars().take(500).collect(),
            });
        }

        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedObject {
            bytes,
            filename: filename_of(key),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("list-type".to_string(), "2".to_string()),
                ("max-keys".to_string(), "1000".to_string()),
            ];
            if !prefix.is_empty() {
                query.push(("prefix".to_string(), prefix.to_string()));
            }
            if let Some(token) = &continuation_token {
                query.push(("continuation-token".to_string(), token.clone()));
            }
            // Canonical query strings must be sorted by key.
            query.sort_by(|a, b| a.0.cmp(&b.0));

            let response = self
                .signed_request(reqwest::Method::GET, "/", &query, b"")
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let details = response.text().await.unwrap_or_default();
                return Err(StorageError::Request {
                    key: prefix.to_string(),
                    status: status.as_u16(),
                    details: details.chars().take(500).collect(),
                });
            }

            let xml = response.text().await?;
            let (batch, truncated, next_token) = parse_list_response(&xml)?;
            objects.extend(batch);

            if truncated {
                continuation_token = next_token;
            } else {
                break;
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

fn filename_of(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}

fn encode_key(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// AWS SigV4 key derivation:
/// `HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`.
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{secret_key}").as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 percent-encoding with only unreserved characters left bare, as
/// SigV4 canonical requests require.
fn uri_encode(s: impl AsRef<str>) -> String {
    let mut out = String::new();
    for byte in s.as_ref().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn parse_list_response(xml: &str) -> Result<(Vec<ObjectInfo>, bool, Option<String>), StorageError> {
    let truncated = extract_xml_value(xml, "IsTruncated")
        .map(|value| value == "true")
        .unwrap_or(false);
    let next_token = extract_xml_value(xml, "NextContinuationToken");

    let mut objects = Vec::new();
    let mut remaining = xml;

    while let Some(start) = remaining.find("<Contents>") {
        let block_start = start + "<Contents>".len();
        let Some(end) = remaining[block_start..].find("</Contents>") else {
            return Err(StorageError::ListResponse(
                "unterminated Contents block".to_string(),
            ));
        };
        let block = &remaining[block_start..block_start + end];

        let key = extract_xml_value(block, "Key").unwrap_or_default();
        if !key.is_empty() && !key.ends_with('/') {
            let last_modified = extract_xml_value(block, "LastModified")
                .and_then(|value| chrono::DateTime::parse_from_rfc3339(&value).ok())
                .map(|value| value.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            let size = extract_xml_value(block, "Size")
                .and_then(|value| value.parse::<i64>().ok())
                .unwrap_or(0);

            objects.push(ObjectInfo {
                filename: filename_of(&key),
                key,
                size,
                last_modified,
            });
        }

        remaining = &remaining[block_start + end + "</Contents>".len()..];
    }

    Ok((objects, truncated, next_token))
}

fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)?;
    Some(xml[start..start + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_keys_are_namespaced() {
        assert_eq!(document_key("report.pdf"), "documents/report.pdf");
        assert_eq!(filename_of("documents/report.pdf"), "report.pdf");
    }

    #[test]
    fn signing_key_matches_aws_reference_vector() {
        // Worked example from the AWS SigV4 documentation.
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn uri_encoding_leaves_unreserved_characters() {
        assert_eq!(uri_encode("report-1.pdf"), "report-1.pdf");
        assert_eq!(uri_encode("a b/c"), "a%20b%2Fc");
        assert_eq!(
            encode_key("documents/lab results.pdf"),
            "documents/lab%20results.pdf"
        );
    }

    #[test]
    fn list_response_parses_contents_and_pagination() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>token-123</NextContinuationToken>
  <Contents>
    <Key>documents/a.pdf</Key>
    <LastModified>2024-05-01T10:00:00Z</LastModified>
    <Size>1024</Size>
  </Contents>
  <Contents>
    <Key>documents/</Key>
    <LastModified>2024-05-01T10:00:00Z</LastModified>
    <Size>0</Size>
  </Contents>
</ListBucketResult>"#;

        let (objects, truncated, token) = parse_list_response(xml).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "documents/a.pdf");
        assert_eq!(objects[0].filename, "a.pdf");
        assert_eq!(objects[0].size, 1024);
        assert!(truncated);
        assert_eq!(token.as_deref(), Some("token-123"));
    }

    #[test]
    fn custom_endpoint_overrides_host_and_scheme() {
        let store = S3ObjectStore::new(S3Config {
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            bucket: "medibot-bucket".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
        });
        assert_eq!(store.host(), "localhost:9000");
        assert_eq!(store.scheme(), "http");

        let aws = S3ObjectStore::new(S3Config {
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            bucket: "medibot-bucket".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
        });
        assert_eq!(aws.host(), "medibot-bucket.s3.us-east-1.amazonaws.com");
        assert_eq!(aws.scheme(), "https");
    }
}
