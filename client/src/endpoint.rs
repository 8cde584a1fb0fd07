use crate::ClientError;
use url::Url;

/// Builds the fixed set of API routes relative to a base server URI.
#[derive(Clone)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    pub fn new(uri: &str) -> Result<Self, ClientError> {
        let base =
            Url::parse(uri).map_err(|e| ClientError::InvalidBase(format!("{uri}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidBase(uri.to_string()));
        }
        Ok(Self { base })
    }

    fn route(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(None);
        url
    }

    pub fn health(&self) -> Url {
        self.route("/health")
    }

    pub fn upload(&self) -> Url {
        self.route("/api/upload")
    }

    pub fn upload_url(&self) -> Url {
        self.route("/api/upload-url")
    }

    pub fn download_url(&self) -> Url {
        self.route("/api/download-url")
    }

    pub fn files(&self, limit: Option<usize>) -> Url {
        let mut url = self.route("/api/files");
        if let Some(limit) = limit {
            url.set_query(Some(&format!("limit={limit}")));
        }
        url
    }

    /// The key goes into the path percent-encoded, slashes included, so the
    /// server receives it as a single wildcard segment.
    pub fn file(&self, key: &str) -> Url {
        self.route(&format!("/api/files/{}", urlencoding::encode(key)))
    }
}
