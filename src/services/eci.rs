use std::{collections::BTreeMap, time::Duration};

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Url,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    entities::{
        config::Config,
        request::CreateContainerGroupRequest,
        response::{CreateContainerGroupResponse, ErrorResponse},
    },
    error::{Error, Result},
};

static API_VERSION: &str = "2018-08-08";
static SIGNATURE_ALGORITHM: &str = "ACS3-HMAC-SHA256";
static REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct Credentials {
    access_key_id: String,
    access_key_secret: String,
}

/// Client for the Elastic Container Instance RPC API.
pub struct Eci {
    credentials: Credentials,
    endpoint: Url,
    client: reqwest::Client,
}

impl Eci {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = format!("https://eci.{}.aliyuncs.com/", config.region);
        Self::with_endpoint(config, &endpoint)
    }

    pub fn with_endpoint(config: &Config, endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint).map_err(|_| Error::InvalidEndpoint(endpoint.to_owned()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(Error::InvalidEndpoint(endpoint.to_owned()));
        }
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            credentials: Credentials {
                access_key_id: config.access_key_id.clone(),
                access_key_secret: config.access_secret.clone(),
            },
            endpoint: url,
            client,
        })
    }

    pub async fn create_container_group(
        &self,
        request: &CreateContainerGroupRequest,
    ) -> Result<CreateContainerGroupResponse> {
        let body = self
            .request("CreateContainerGroup", &request.to_query())
            .await?;
        serde_json::from_str(&body)
            .map_err(|source| Error::MalformedResponse { source, body })
    }

    async fn request(&self, action: &str, params: &BTreeMap<String, String>) -> Result<String> {
        let query = canonical_query(params);
        let mut url = self.endpoint.clone();
        url.set_path("/");
        url.set_query(Some(&query).filter(|query| !query.is_empty()).map(String::as_str));
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidEndpoint(url.to_string()))?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_owned(),
        };
        let mut headers = BTreeMap::new();
        headers.insert("host", host);
        headers.insert("x-acs-action", action.to_owned());
        headers.insert("x-acs-version", API_VERSION.to_owned());
        headers.insert(
            "x-acs-date",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        headers.insert("x-acs-signature-nonce", Uuid::new_v4().to_string());
        headers.insert("x-acs-content-sha256", format!("{:x}", Sha256::digest(b"")));
        let auth = self.authorize_v3("POST", &query, &headers)?;

        let mut header_map = HeaderMap::new();
        for (key, value) in headers
            .iter()
            .map(|(key, value)| (*key, value))
            .chain([("authorization", &auth)])
        {
            let name = HeaderName::from_static(key);
            let value = HeaderValue::from_str(value)
                .map_err(|err| Error::Sign(format!("invalid header '{}': {}", key, err)))?;
            header_map.insert(name, value);
        }
        debug!(%url, action, "Sending ECI request");
        let response = self.client.post(url).headers(header_map).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            info!("{}", body);
            Ok(body)
        } else {
            Err(ErrorResponse::parse(&body).into_error(status.as_u16()))
        }
    }

    fn authorize_v3(
        &self,
        method: &str,
        query: &str,
        headers: &BTreeMap<&str, String>,
    ) -> Result<String> {
        let (canonical_request, signed_headers) = canonical_request(method, query, headers)?;
        debug!("Canonical request:\n{}", canonical_request);
        let signature = sign_v3(&self.credentials.access_key_secret, &canonical_request)?;
        Ok(format!(
            "{} Credential={},SignedHeaders={},Signature={}",
            SIGNATURE_ALGORITHM, self.credentials.access_key_id, signed_headers, signature
        ))
    }
}

/// RFC 3986 encoding of sorted parameters; this exact string is both signed and sent.
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Returns the canonical request and the `;`-joined signed header names.
fn canonical_request(
    method: &str,
    query: &str,
    headers: &BTreeMap<&str, String>,
) -> Result<(String, String)> {
    let content_sha256 = headers
        .get("x-acs-content-sha256")
        .ok_or_else(|| Error::Sign("missing request header 'x-acs-content-sha256'".to_owned()))?;
    let canonical_headers = headers
        .iter()
        .map(|(key, value)| format!("{}:{}\n", key.to_lowercase(), value.trim()))
        .collect::<String>();
    let signed_headers = headers
        .keys()
        .map(|key| key.to_lowercase())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_request = format!(
        "{}\n/\n{}\n{}\n{}\n{}",
        method, query, canonical_headers, signed_headers, content_sha256
    );
    Ok((canonical_request, signed_headers))
}

fn sign_v3(secret: &str, canonical_request: &str) -> Result<String> {
    let string_to_sign = format!(
        "{}\n{:x}",
        SIGNATURE_ALGORITHM,
        Sha256::digest(canonical_request)
    );
    let signature = hmac_sha256(secret, string_to_sign)?;
    Ok(format!("{:x}", signature))
}

fn hmac_sha256<K: AsRef<[u8]>, T: AsRef<[u8]>>(
    key: K,
    data: T,
) -> Result<hmac::digest::Output<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_ref())
        .map_err(|err| Error::Sign(err.to_string()))?;
    mac.update(data.as_ref());
    Ok(mac.finalize().into_bytes())
}
