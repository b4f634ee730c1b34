//! Minimal AWS Signature v4 for the one request rust-s3 does not cover:
//! `PUT /{bucket}?policy`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::core::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// Headers to attach to a signed bucket-policy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub payload_hash: String,
    pub authorization: String,
}

pub struct PolicySigner<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
}

impl PolicySigner<'_> {
    /// Sign `PUT /{bucket}?policy` with `policy` as the body
    pub fn sign(
        &self,
        host_header: &str,
        bucket: &str,
        policy: &str,
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders, AppError> {
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex::encode(Sha256::digest(policy.as_bytes()));

        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            host_header, payload_hash, amz_date
        );
        let canonical_request = format!(
            "PUT\n/{}\npolicy=\n{}\n{}\n{}",
            bucket, canonical_headers, SIGNED_HEADERS, payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_key).as_bytes(),
            date_stamp.as_bytes(),
        )?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, b"s3")?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

        Ok(SignedHeaders {
            authorization: format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.access_key, credential_scope, SIGNED_HEADERS, signature
            ),
            amz_date,
            payload_hash,
        })
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(format!("HMAC key error: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer() -> PolicySigner<'static> {
        PolicySigner {
            access_key: "minioadmin",
            secret_key: "minioadmin",
            region: "us-east-1",
        }
    }

    #[test]
    fn test_sign_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2025, 8, 15, 10, 30, 0).unwrap();
        let a = signer().sign("localhost:9000", "civic", "{}", now).unwrap();
        let b = signer().sign("localhost:9000", "civic", "{}", now).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.amz_date, "20250815T103000Z");
        assert!(a
            .authorization
            .starts_with("AWS4-HMAC-SHA256 Credential=minioadmin/20250815/us-east-1/s3/aws4_request"));
    }

    #[test]
    fn test_payload_hash_is_sha256_of_policy() {
        let now = Utc.with_ymd_and_hms(2025, 8, 15, 0, 0, 0).unwrap();
        let signed = signer().sign("localhost:9000", "civic", "", now).unwrap();
        assert_eq!(
            signed.payload_hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_signature_changes_with_policy() {
        let now = Utc.with_ymd_and_hms(2025, 8, 15, 0, 0, 0).unwrap();
        let a = signer().sign("localhost:9000", "civic", "{}", now).unwrap();
        let b = signer().sign("localhost:9000", "civic", "{ }", now).unwrap();
        assert_ne!(a.authorization, b.authorization);
    }
}
