use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, info};

use super::library::{LibraryConnector, RemoteLibrary};
use super::sharepoint_auth::{sign_in, ODATA_VERBOSE};
use crate::error::RemoteError;
use crate::models::{odata_literal, RemotePath, UploadTarget};

const DIGEST_HEADER: &str = "X-RequestDigest";

/// SharePoint REST session for one site, holding cookies and form digest
pub struct SharePointClient {
    http: Client,
    target: UploadTarget,
    form_digest: String,
}

impl SharePointClient {
    pub fn new(http: Client, target: UploadTarget, form_digest: String) -> Self {
        Self {
            http,
            target,
            form_digest,
        }
    }

    fn create_folder_request(&self, folder: &RemotePath) -> RequestBuilder {
        self.http
            .post(folder_add_url(&self.target, folder))
            .header(ACCEPT, ODATA_VERBOSE)
            .header(DIGEST_HEADER, &self.form_digest)
            .body("")
    }

    fn upload_file_request(
        &self,
        folder: &RemotePath,
        file_name: &str,
        content: Vec<u8>,
    ) -> RequestBuilder {
        self.http
            .post(file_add_url(&self.target, folder, file_name))
            .header(ACCEPT, ODATA_VERBOSE)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(DIGEST_HEADER, &self.form_digest)
            .body(content)
    }
}

/// `.../_api/web/folders/add('<folder>')`
pub fn folder_add_url(target: &UploadTarget, folder: &RemotePath) -> String {
    format!(
        "{}/_api/web/folders/add('{}')",
        target.site_url(),
        folder.odata_literal()
    )
}

/// `.../GetFolderByServerRelativeUrl('<folder>')/Files/add(url='<name>',overwrite=true)`
pub fn file_add_url(target: &UploadTarget, folder: &RemotePath, file_name: &str) -> String {
    format!(
        "{}/_api/web/GetFolderByServerRelativeUrl('{}')/Files/add(url='{}',overwrite=true)",
        target.site_url(),
        folder.odata_literal(),
        odata_literal(file_name)
    )
}

#[async_trait]
impl RemoteLibrary for SharePointClient {
    async fn probe(&self) -> Result<StatusCode, RemoteError> {
        let url = self.target.host_url();
        let response = self.http.get(&url).send().await?;
        debug!("Probe {} returned {}", url, response.status());
        Ok(response.status())
    }

    async fn create_folder(&self, folder: &RemotePath) -> Result<StatusCode, RemoteError> {
        let response = self.create_folder_request(folder).send().await?;
        Ok(response.status())
    }

    async fn upload_file(
        &self,
        folder: &RemotePath,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<StatusCode, RemoteError> {
        let response = self
            .upload_file_request(folder, file_name, content)
            .send()
            .await?;
        Ok(response.status())
    }
}

/// Builds one cookie-holding HTTP client per run and signs it in
#[derive(Debug, Clone, Default)]
pub struct SharePointConnector;

impl SharePointConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LibraryConnector for SharePointConnector {
    async fn connect(
        &self,
        target: &UploadTarget,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn RemoteLibrary>, RemoteError> {
        let http = Client::builder()
            .cookie_store(true)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!("Connecting to {} (site {})", target.host, target.site);
        let form_digest = sign_in(&http, target, user, password).await?;

        Ok(Box::new(SharePointClient::new(
            http,
            target.clone(),
            form_digest,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> UploadTarget {
        UploadTarget::new("contoso.sharepoint.com", "records", "Shared Documents")
    }

    fn client() -> SharePointClient {
        SharePointClient::new(Client::new(), target(), "0xDIGEST,01 Jan 2024".to_string())
    }

    fn month_folder() -> RemotePath {
        RemotePath::new("Shared Documents").unwrap().join("2024-05").unwrap()
    }

    #[test]
    fn test_create_folder_request_carries_digest() {
        let request = client()
            .create_folder_request(&month_folder())
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            folder_add_url(&target(), &month_folder())
        );
        assert_eq!(request.headers()[DIGEST_HEADER], "0xDIGEST,01 Jan 2024");
        assert_eq!(request.headers()[ACCEPT], ODATA_VERBOSE);
        assert_eq!(request.body().and_then(|b| b.as_bytes()), Some(&b""[..]));
    }

    #[test]
    fn test_upload_file_request_sends_raw_content() {
        let request = client()
            .upload_file_request(&month_folder(), "report.pdf", b"%PDF-1.7".to_vec())
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert!(request.url().as_str().ends_with("/Files/add(url='report.pdf',overwrite=true)"));
        assert_eq!(request.headers()[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(request.headers()[DIGEST_HEADER], "0xDIGEST,01 Jan 2024");
        assert_eq!(
            request.body().and_then(|b| b.as_bytes()),
            Some(&b"%PDF-1.7"[..])
        );
    }

    #[test]
    fn test_folder_add_url() {
        let folder = RemotePath::new("Shared Documents").unwrap().join("2024-05").unwrap();
        assert_eq!(
            folder_add_url(&target(), &folder),
            "https://contoso.sharepoint.com/sites/records/_api/web/folders/add('Shared%20Documents/2024-05')"
        );
    }

    #[test]
    fn test_file_add_url_escapes_file_name() {
        let folder = RemotePath::new("Shared Documents").unwrap().join("2024-05").unwrap();
        assert_eq!(
            file_add_url(&target(), &folder, "O'Brien report.pdf"),
            "https://contoso.sharepoint.com/sites/records/_api/web/GetFolderByServerRelativeUrl('Shared%20Documents/2024-05')/Files/add(url='O%27%27Brien%20report.pdf',overwrite=true)"
        );
    }
}
