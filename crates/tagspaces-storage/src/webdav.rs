use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use futures::StreamExt;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Method, StatusCode};

use crate::traits::{ByteStream, StorageAdapter, StorageError, StorageResult};
use tagspaces_core::{paths, FileSystemEntry, LocationType};

/// Characters escaped inside a URL path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'%');

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/><d:getcontentlength/><d:getlastmodified/></d:prop></d:propfind>"#;

/// One resource parsed out of a PROPFIND multistatus response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct DavResource {
    href: String,
    is_collection: bool,
    size: u64,
    lmdt: Option<i64>,
}

/// WebDAV share adapter.
///
/// Paths are share-relative, forward-slash separated. Listing and stat go
/// through PROPFIND; copies use the server-side COPY method so no bytes
/// travel through the client for same-share copies.
#[derive(Clone)]
pub struct WebDavAdapter {
    client: Client,
    endpoint_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl WebDavAdapter {
    pub fn new(
        endpoint_url: String,
        username: Option<String>,
        password: Option<String>,
    ) -> StorageResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        Ok(WebDavAdapter {
            client,
            endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    /// Absolute URL for a share-relative path, with each segment escaped.
    fn url_for(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|seg| utf8_percent_encode(seg, SEGMENT).to_string())
            .collect();
        if encoded.is_empty() {
            self.endpoint_url.clone()
        } else {
            format!("{}/{}", self.endpoint_url, encoded.join("/"))
        }
    }

    /// Server-absolute path part of the endpoint, e.g. `/remote.php/webdav`.
    fn base_path(&self) -> &str {
        let after_scheme = match self.endpoint_url.find("://") {
            Some(idx) => &self.endpoint_url[idx + 3..],
            None => self.endpoint_url.as_str(),
        };
        match after_scheme.find('/') {
            Some(idx) => &after_scheme[idx..],
            None => "",
        }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, url);
        if let Some(user) = &self.username {
            req = req.basic_auth(user, self.password.as_deref());
        }
        req
    }

    fn dav_method(name: &str) -> StorageResult<Method> {
        Method::from_bytes(name.as_bytes()).map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn map_status(path: &str, status: StatusCode) -> StorageError {
        match status {
            StatusCode::NOT_FOUND => StorageError::NotFound(path.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                StorageError::AccessDenied(path.to_string())
            }
            StatusCode::PRECONDITION_FAILED => StorageError::Conflict(path.to_string()),
            other => StorageError::Network(format!("{}: HTTP {}", path, other)),
        }
    }

    fn map_send_error(path: &str, err: reqwest::Error) -> StorageError {
        StorageError::Network(format!("{}: {}", path, err))
    }

    /// Convert a multistatus href into a share-relative path.
    fn href_to_path(&self, href: &str) -> String {
        let decoded = percent_decode_str(href).decode_utf8_lossy();
        let relative = decoded
            .strip_prefix(self.base_path())
            .unwrap_or(decoded.as_ref());
        relative.trim_matches('/').to_string()
    }

    fn resource_to_entry(&self, resource: &DavResource) -> FileSystemEntry {
        let path = self.href_to_path(&resource.href);
        FileSystemEntry {
            uuid: None,
            name: paths::base_name(&path, '/').to_string(),
            path,
            is_file: !resource.is_collection,
            size: if resource.is_collection { 0 } else { resource.size },
            lmdt: resource.lmdt,
            tags: Vec::new(),
        }
    }

    async fn propfind(&self, path: &str, depth: &str) -> StorageResult<Vec<DavResource>> {
        let url = self.url_for(path);
        let response = self
            .request(Self::dav_method("PROPFIND")?, &url)
            .header("Depth", depth)
            .header("Content-Type", "application/xml")
            .body(PROPFIND_BODY)
            .send()
            .await
            .map_err(|e| Self::map_send_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(path, status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::map_send_error(path, e))?;
        parse_multistatus(&body)
    }
}

/// Parse a PROPFIND multistatus document into flat resources.
///
/// Namespace prefixes vary between servers, so elements are matched by
/// local name only.
fn parse_multistatus(xml: &str) -> StorageResult<Vec<DavResource>> {
    let mut reader = Reader::from_str(xml);
    let mut resources = Vec::new();
    let mut current = DavResource::default();
    let mut field: Option<&'static str> = None;
    let mut in_resourcetype = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => current = DavResource::default(),
                b"href" => field = Some("href"),
                b"getcontentlength" => field = Some("size"),
                b"getlastmodified" => field = Some("lmdt"),
                b"resourcetype" => in_resourcetype = true,
                b"collection" => {
                    if in_resourcetype {
                        current.is_collection = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_resourcetype && e.local_name().as_ref() == b"collection" {
                    current.is_collection = true;
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                let text = text.trim();
                match field {
                    Some("href") => current.href = text.to_string(),
                    Some("size") => current.size = text.parse().unwrap_or(0),
                    Some("lmdt") => {
                        current.lmdt = DateTime::parse_from_rfc2822(text)
                            .ok()
                            .map(|dt| dt.timestamp_millis());
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"response" => resources.push(std::mem::take(&mut current)),
                b"resourcetype" => in_resourcetype = false,
                b"href" | b"getcontentlength" | b"getlastmodified" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(StorageError::Backend(format!("multistatus parse: {}", e))),
            _ => {}
        }
    }

    Ok(resources)
}

#[async_trait]
impl StorageAdapter for WebDavAdapter {
    async fn list_directory(
        &self,
        path: &str,
        extensions: &[String],
    ) -> StorageResult<Vec<FileSystemEntry>> {
        let resources = self.propfind(path, "1").await?;
        let requested = path.trim_matches('/');
        let wanted: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();

        let mut entries = Vec::new();
        for resource in &resources {
            let entry = self.resource_to_entry(resource);
            // Depth 1 includes the requested collection itself; skip it.
            if entry.path == requested {
                continue;
            }
            if entry.is_file && !wanted.is_empty() {
                let ext = paths::extract_file_extension(&entry.name, '/');
                if !wanted.contains(&ext) {
                    continue;
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn load_text_file(&self, path: &str) -> StorageResult<String> {
        let content = self.get_file_content(path).await?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    async fn get_file_content(&self, path: &str) -> StorageResult<Bytes> {
        let url = self.url_for(path);
        let start = std::time::Instant::now();

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| Self::map_send_error(path, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(path, status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::map_send_error(path, e))?;

        tracing::info!(
            path = %path,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "WebDAV download successful"
        );
        Ok(bytes)
    }

    async fn get_file_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let url = self.url_for(path);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| Self::map_send_error(path, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(path, status));
        }

        let key = path.to_string();
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| Self::map_send_error(&key, e)));
        Ok(Box::pin(stream))
    }

    async fn put_file(
        &self,
        path: &str,
        content: Bytes,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry> {
        let url = self.url_for(path);
        let size = content.len();
        let start = std::time::Instant::now();

        let mut request = self.request(Method::PUT, &url).body(content);
        if !overwrite {
            // Conditional put; the server answers 412 when the resource
            // already exists, which maps onto the Conflict kind.
            request = request.header("If-None-Match", "*");
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_send_error(path, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(path, status));
        }

        tracing::info!(
            path = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "WebDAV upload successful"
        );

        self.stat(path).await
    }

    async fn put_file_stream(
        &self,
        path: &str,
        stream: ByteStream,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry> {
        let url = self.url_for(path);
        let start = std::time::Instant::now();

        let mut request = self
            .request(Method::PUT, &url)
            .body(reqwest::Body::wrap_stream(stream));
        if !overwrite {
            request = request.header("If-None-Match", "*");
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_send_error(path, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(path, status));
        }

        tracing::info!(
            path = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "WebDAV stream upload successful"
        );

        self.stat(path).await
    }

    async fn stat(&self, path: &str) -> StorageResult<FileSystemEntry> {
        let resources = self.propfind(path, "0").await?;
        resources
            .first()
            .map(|r| self.resource_to_entry(r))
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_directory(&self, path: &str) -> StorageResult<()> {
        let url = self.url_for(path);
        let response = self
            .request(Self::dav_method("MKCOL")?, &url)
            .send()
            .await
            .map_err(|e| Self::map_send_error(path, e))?;
        let status = response.status();
        // 405 means the collection already exists.
        if !status.is_success() && status != StatusCode::METHOD_NOT_ALLOWED {
            return Err(Self::map_status(path, status));
        }
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        let url = self.url_for(path);
        let response = self
            .request(Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| Self::map_send_error(path, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(path, status));
        }
        tracing::info!(path = %path, "WebDAV delete successful");
        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> StorageResult<()> {
        // DAV DELETE on a collection is recursive by definition.
        self.delete_file(path).await
    }

    async fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> StorageResult<()> {
        let url = self.url_for(from);
        let start = std::time::Instant::now();

        let response = self
            .request(Self::dav_method("COPY")?, &url)
            .header("Destination", self.url_for(to))
            .header("Overwrite", if overwrite { "T" } else { "F" })
            .send()
            .await
            .map_err(|e| Self::map_send_error(from, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(to, status));
        }

        tracing::info!(
            from = %from,
            to = %to,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "WebDAV server-side copy successful"
        );
        Ok(())
    }

    fn supports_presign(&self) -> bool {
        true
    }

    async fn presign_upload_url(
        &self,
        path: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        // WebDAV has no signed URLs; the direct resource URL is the upload
        // target, authenticated by the caller's own credentials.
        Ok(self.url_for(path))
    }

    fn location_type(&self) -> LocationType {
        LocationType::WebDav
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTISTATUS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/remote.php/webdav/docs/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/></d:resourcetype>
        <d:getlastmodified>Mon, 12 Jan 2010 04:54:31 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/webdav/docs/report%20final.pdf</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype/>
        <d:getcontentlength>10240</d:getcontentlength>
        <d:getlastmodified>Tue, 13 Jan 2010 10:00:00 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    fn adapter() -> WebDavAdapter {
        WebDavAdapter::new(
            "https://dav.example.com/remote.php/webdav/".to_string(),
            Some("tester".to_string()),
            Some("secret".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn parses_multistatus_resources() {
        let resources = parse_multistatus(MULTISTATUS).unwrap();
        assert_eq!(resources.len(), 2);

        assert!(resources[0].is_collection);
        assert_eq!(resources[0].href, "/remote.php/webdav/docs/");

        assert!(!resources[1].is_collection);
        assert_eq!(resources[1].size, 10240);
        assert!(resources[1].lmdt.is_some());
    }

    #[test]
    fn resources_become_share_relative_entries() {
        let dav = adapter();
        let resources = parse_multistatus(MULTISTATUS).unwrap();

        let dir = dav.resource_to_entry(&resources[0]);
        assert_eq!(dir.path, "docs");
        assert!(!dir.is_file);

        let file = dav.resource_to_entry(&resources[1]);
        assert_eq!(file.path, "docs/report final.pdf");
        assert_eq!(file.name, "report final.pdf");
        assert_eq!(file.size, 10240);
        assert!(file.is_file);
    }

    #[test]
    fn url_encoding_of_segments() {
        let dav = adapter();
        assert_eq!(
            dav.url_for("docs/report final.pdf"),
            "https://dav.example.com/remote.php/webdav/docs/report%20final.pdf"
        );
        assert_eq!(dav.url_for(""), "https://dav.example.com/remote.php/webdav");
        assert_eq!(dav.base_path(), "/remote.php/webdav");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            WebDavAdapter::map_status("x", StatusCode::NOT_FOUND),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            WebDavAdapter::map_status("x", StatusCode::FORBIDDEN),
            StorageError::AccessDenied(_)
        ));
        assert!(matches!(
            WebDavAdapter::map_status("x", StatusCode::PRECONDITION_FAILED),
            StorageError::Conflict(_)
        ));
        assert!(matches!(
            WebDavAdapter::map_status("x", StatusCode::BAD_GATEWAY),
            StorageError::Network(_)
        ));
    }
}
