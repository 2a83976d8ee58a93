#![allow(clippy::module_name_repetitions)]
//! Docker Registry v2 client: tag listing, manifest digests and manifest deletion.
//!
//! TLS certificate verification is disabled: the tool targets self-hosted registries that
//! commonly run with private certificates.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{header, Method, StatusCode};
use serde::Deserialize;

use crate::errors::SkipperError;
use crate::image::ImageRow;

const ACCEPT_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
const DIGEST_HEADER: &str = "Docker-Content-Digest";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Registry error codes that mean "no such repository or tag".
const NOT_FOUND_CODES: [&str; 2] = ["NAME_UNKNOWN", "NOT_FOUND"];

/// Read/delete operations the CLI needs from a registry.
pub trait RegistryApi {
    /// Tags of `image`; an unknown repository yields an empty list.
    fn list_tags(&self, image: &str) -> Result<Vec<String>, SkipperError>;
    fn manifest_digest(&self, image: &str, tag: &str) -> Result<String, SkipperError>;
    fn delete_manifest(&self, image: &str, digest: &str) -> Result<(), SkipperError>;
}

/// Login for one registry, taken from the docker client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuthEntry>,
}

#[derive(Deserialize)]
struct DockerAuthEntry {
    auth: Option<String>,
}

impl Credentials {
    /// Decode a base64 `user:pass` auth token.
    pub fn from_auth_token(token: &str) -> Option<Self> {
        let raw = BASE64.decode(token.trim()).ok()?;
        let text = String::from_utf8(raw).ok()?;
        let (user, pass) = text.split_once(':')?;
        Some(Self {
            username: user.to_string(),
            password: pass.to_string(),
        })
    }

    /// Look up `auths.<registry>.auth` in a docker `config.json`. Any failure yields None.
    pub fn from_docker_config(path: &Path, registry: &str) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        let cfg: DockerConfig = serde_json::from_str(&text).ok()?;
        let token = cfg.auths.get(registry)?.auth.as_deref()?;
        Self::from_auth_token(token)
    }

    /// `~/.docker/config.json`
    pub fn default_config_path() -> Option<PathBuf> {
        home::home_dir().map(|h| h.join(".docker").join("config.json"))
    }
}

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ErrorList {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    code: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Interpret a tags/list response.
pub fn parse_tags_response(status: u16, body: &str) -> Result<Vec<String>, SkipperError> {
    if (200..300).contains(&status) {
        let list: TagList = serde_json::from_str(body).map_err(|e| SkipperError::Registry {
            status,
            body: format!("invalid tag list: {e}"),
        })?;
        return Ok(list.tags.unwrap_or_default());
    }
    let not_found = serde_json::from_str::<ErrorList>(body)
        .map(|list| {
            list.errors
                .iter()
                .any(|e| NOT_FOUND_CODES.contains(&e.code.as_str()))
        })
        .unwrap_or(false);
    if not_found {
        Ok(Vec::new())
    } else {
        Err(SkipperError::Registry {
            status,
            body: body.to_string(),
        })
    }
}

/// Bearer challenge from a `WWW-Authenticate` header.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
    pub scope: String,
}

impl AuthChallenge {
    /// Parse `Bearer realm="..",service="..",scope=".."`. Non-bearer schemes yield None.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("Bearer ")?;
        let mut challenge = Self::default();
        for part in split_params(rest) {
            let Some((key, val)) = part.split_once('=') else {
                continue;
            };
            let val = val.trim().trim_matches('"').to_string();
            match key.trim() {
                "realm" => challenge.realm = val,
                "service" => challenge.service = val,
                "scope" => challenge.scope = val,
                _ => {}
            }
        }
        if challenge.realm.is_empty() {
            None
        } else {
            Some(challenge)
        }
    }
}

// Commas inside quoted values (e.g. "repository:a:pull,push") do not split parameters.
fn split_params(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// HTTP client for one registry host.
pub struct RegistryClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    // Bearer tokens per repository.
    tokens: RefCell<HashMap<String, String>>,
}

impl RegistryClient {
    pub fn new(registry: &str, credentials: Option<Credentials>) -> Result<Self, SkipperError> {
        let http = Client::builder()
            .user_agent(concat!("skipper/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: Self::registry_to_url(registry),
            credentials,
            tokens: RefCell::new(HashMap::new()),
        })
    }

    fn registry_to_url(registry: &str) -> String {
        let r = registry.trim_end_matches('/');
        if r.starts_with("http://") || r.starts_with("https://") {
            r.to_string()
        } else {
            format!("https://{r}")
        }
    }

    fn manifest_url(&self, image: &str, reference: &str) -> String {
        format!("{}/v2/{image}/manifests/{reference}", self.base_url)
    }

    fn request(&self, method: Method, url: &str, token: Option<&str>) -> RequestBuilder {
        let req = self
            .http
            .request(method, url)
            .header(header::ACCEPT, ACCEPT_MANIFEST);
        match (token, &self.credentials) {
            (Some(t), _) => req.bearer_auth(t),
            (None, Some(c)) => req.basic_auth(&c.username, Some(&c.password)),
            (None, None) => req,
        }
    }

    /// Send a request, answering a bearer challenge once if the registry asks for one.
    fn send(&self, method: Method, url: &str, image: &str) -> Result<Response, SkipperError> {
        let cached = self.tokens.borrow().get(image).cloned();
        let resp = self.request(method.clone(), url, cached.as_deref()).send()?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }
        let challenge = resp
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(AuthChallenge::parse);
        let Some(challenge) = challenge else {
            return Ok(resp);
        };
        let token = self.fetch_token(&challenge)?;
        self.tokens
            .borrow_mut()
            .insert(image.to_string(), token.clone());
        Ok(self.request(method, url, Some(&token)).send()?)
    }

    fn fetch_token(&self, challenge: &AuthChallenge) -> Result<String, SkipperError> {
        let params: Vec<(&str, &str)> = [
            ("service", challenge.service.as_str()),
            ("scope", challenge.scope.as_str()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect();
        let url = url::Url::parse_with_params(&challenge.realm, &params).map_err(|e| {
            SkipperError::Registry {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                body: format!("invalid token realm {}: {e}", challenge.realm),
            }
        })?;
        let mut req = self.http.get(url);
        if let Some(c) = &self.credentials {
            req = req.basic_auth(&c.username, Some(&c.password));
        }
        let resp = req.send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(SkipperError::Registry {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| SkipperError::Registry {
                status: status.as_u16(),
                body: format!("invalid token response: {e}"),
            })?;
        parsed
            .token
            .or(parsed.access_token)
            .ok_or_else(|| SkipperError::Registry {
                status: status.as_u16(),
                body: "token response without a token".to_string(),
            })
    }
}

impl RegistryApi for RegistryClient {
    fn list_tags(&self, image: &str) -> Result<Vec<String>, SkipperError> {
        let url = format!("{}/v2/{image}/tags/list", self.base_url);
        let resp = self.send(Method::GET, &url, image)?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        parse_tags_response(status, &body)
    }

    fn manifest_digest(&self, image: &str, tag: &str) -> Result<String, SkipperError> {
        let resp = self.send(Method::GET, &self.manifest_url(image, tag), image)?;
        let status = resp.status();
        let digest = resp
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        match digest {
            Some(d) if status.is_success() => Ok(d),
            _ => Err(SkipperError::Registry {
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            }),
        }
    }

    fn delete_manifest(&self, image: &str, digest: &str) -> Result<(), SkipperError> {
        let resp = self.send(Method::DELETE, &self.manifest_url(image, digest), image)?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SkipperError::Registry {
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            })
        }
    }
}

pub fn remote_image_exists(
    api: &dyn RegistryApi,
    image: &str,
    tag: &str,
) -> Result<bool, SkipperError> {
    Ok(api.list_tags(image)?.iter().any(|t| t == tag))
}

/// One row per remote tag of each image.
pub fn remote_images_info(
    api: &dyn RegistryApi,
    registry: &str,
    images: &[String],
) -> Result<Vec<ImageRow>, SkipperError> {
    let mut rows = Vec::new();
    for image in images {
        for tag in api.list_tags(image)? {
            rows.push(ImageRow {
                registry: registry.to_string(),
                name: image.clone(),
                tag,
            });
        }
    }
    Ok(rows)
}

/// Resolve the tag's manifest digest and delete it.
pub fn delete_remote_image(
    api: &dyn RegistryApi,
    image: &str,
    tag: &str,
) -> Result<(), SkipperError> {
    let digest = api.manifest_digest(image, tag)?;
    api.delete_manifest(image, &digest)
}
