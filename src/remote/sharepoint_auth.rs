//! SharePoint Online sign-in using the federated cookie flow.
//!
//! 1. The user name and password go to the Microsoft security token service,
//!    which answers with a binary security token.
//! 2. The token is posted to the site's sign-in form; the client cookie store
//!    keeps the session cookies from that exchange.
//! 3. A form digest is fetched from `_api/contextinfo`. Every write request
//!    must carry it in `X-RequestDigest`.

use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::RemoteError;
use crate::models::UploadTarget;

pub const STS_URL: &str = "https://login.microsoftonline.com/extSTS.srf";

pub const ODATA_VERBOSE: &str = "application/json;odata=verbose";

const TOKEN_PATTERN: &str = r"<wsse:BinarySecurityToken[^>]*>([^<]+)</wsse:BinarySecurityToken>";
const FAULT_PATTERN: &str = r"<psf:text>([^<]+)</psf:text>";

/// Sign in and return the form digest for the target site
pub async fn sign_in(
    http: &Client,
    target: &UploadTarget,
    user: &str,
    password: &str,
) -> Result<String, RemoteError> {
    let sign_in_url = sign_in_endpoint(target);

    let token = request_security_token(http, user, password, &sign_in_url).await?;
    debug!("Security token received for {}", user);

    let response = http.post(&sign_in_url).body(token).send().await?;
    ensure_success(response.status(), &sign_in_url, "sign-in form")?;

    let digest = fetch_form_digest(http, target).await?;
    info!("Signed in to {} as {}", target.host, user);

    Ok(digest)
}

pub fn sign_in_endpoint(target: &UploadTarget) -> String {
    format!("{}/_forms/default.aspx?wa=wsignin1.0", target.host_url())
}

async fn request_security_token(
    http: &Client,
    user: &str,
    password: &str,
    endpoint: &str,
) -> Result<String, RemoteError> {
    let body = build_token_request(user, password, endpoint);

    let response = http
        .post(STS_URL)
        .header(CONTENT_TYPE, "application/soap+xml; charset=utf-8")
        .body(body)
        .send()
        .await?;
    let text = response.text().await?;

    extract_security_token(&text).map_err(|reason| RemoteError::Authentication {
        endpoint: STS_URL.to_string(),
        reason,
    })
}

async fn fetch_form_digest(http: &Client, target: &UploadTarget) -> Result<String, RemoteError> {
    let endpoint = format!("{}/_api/contextinfo", target.site_url());

    let response = http
        .post(&endpoint)
        .header(ACCEPT, ODATA_VERBOSE)
        .body("")
        .send()
        .await?;

    ensure_success(response.status(), &endpoint, "context info")?;

    let text = response.text().await?;
    parse_form_digest(&text).map_err(|e| RemoteError::UnexpectedResponse {
        endpoint,
        detail: e.to_string(),
    })
}

/// Any non-2xx answer during sign-in means the session is unusable
fn ensure_success(status: StatusCode, endpoint: &str, step: &str) -> Result<(), RemoteError> {
    if status.is_success() {
        return Ok(());
    }
    Err(RemoteError::Authentication {
        endpoint: endpoint.to_string(),
        reason: format!("{} returned status {}", step, status),
    })
}

/// WS-Trust issue request for a SAML token scoped to `endpoint`
pub fn build_token_request(user: &str, password: &str, endpoint: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://www.w3.org/2005/08/addressing" xmlns:u="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
  <s:Header>
    <a:Action s:mustUnderstand="1">http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue</a:Action>
    <a:ReplyTo><a:Address>http://www.w3.org/2005/08/addressing/anonymous</a:Address></a:ReplyTo>
    <a:To s:mustUnderstand="1">{sts}</a:To>
    <o:Security s:mustUnderstand="1" xmlns:o="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">
      <o:UsernameToken>
        <o:Username>{user}</o:Username>
        <o:Password>{password}</o:Password>
      </o:UsernameToken>
    </o:Security>
  </s:Header>
  <s:Body>
    <t:RequestSecurityToken xmlns:t="http://schemas.xmlsoap.org/ws/2005/02/trust">
      <wsp:AppliesTo xmlns:wsp="http://schemas.xmlsoap.org/ws/2004/09/policy">
        <a:EndpointReference><a:Address>{endpoint}</a:Address></a:EndpointReference>
      </wsp:AppliesTo>
      <t:KeyType>http://schemas.xmlsoap.org/ws/2005/05/identity/NoProofKey</t:KeyType>
      <t:RequestType>http://schemas.xmlsoap.org/ws/2005/02/trust/Issue</t:RequestType>
      <t:TokenType>urn:oasis:names:tc:SAML:1.0:assertion</t:TokenType>
    </t:RequestSecurityToken>
  </s:Body>
</s:Envelope>"#,
        sts = STS_URL,
        user = xml_escape(user),
        password = xml_escape(password),
        endpoint = xml_escape(endpoint),
    )
}

/// Pull the token out of the STS response, or the fault text if it refused
pub fn extract_security_token(response: &str) -> Result<String, String> {
    let token_re = Regex::new(TOKEN_PATTERN).map_err(|e| e.to_string())?;
    if let Some(token) = token_re.captures(response).and_then(|c| c.get(1)) {
        return Ok(xml_unescape(token.as_str()));
    }

    let fault_re = Regex::new(FAULT_PATTERN).map_err(|e| e.to_string())?;
    match fault_re.captures(response).and_then(|c| c.get(1)) {
        Some(fault) => Err(xml_unescape(fault.as_str())),
        None => Err("no security token in response".to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ContextInfoEnvelope {
    d: ContextInfoBody,
}

#[derive(Debug, Deserialize)]
struct ContextInfoBody {
    #[serde(rename = "GetContextWebInformation")]
    info: ContextWebInformation,
}

#[derive(Debug, Deserialize)]
struct ContextWebInformation {
    #[serde(rename = "FormDigestValue")]
    form_digest_value: String,
}

pub fn parse_form_digest(body: &str) -> Result<String, serde_json::Error> {
    let envelope: ContextInfoEnvelope = serde_json::from_str(body)?;
    Ok(envelope.d.info.form_digest_value)
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_request_escapes_credentials() {
        let body = build_token_request("a&b@example.com", "p<w>\"'", "https://h/_forms");
        assert!(body.contains("<o:Username>a&amp;b@example.com</o:Username>"));
        assert!(body.contains("<o:Password>p&lt;w&gt;&quot;&apos;</o:Password>"));
        assert!(body.contains("<a:Address>https://h/_forms</a:Address>"));
    }

    #[test]
    fn test_extract_security_token() {
        let response = r#"<S:Envelope><S:Body><wst:RequestSecurityTokenResponse>
            <wsse:BinarySecurityToken Id="Compact0">t=abc&amp;p=def</wsse:BinarySecurityToken>
            </wst:RequestSecurityTokenResponse></S:Body></S:Envelope>"#;
        assert_eq!(extract_security_token(response).unwrap(), "t=abc&p=def");
    }

    #[test]
    fn test_extract_security_token_reports_fault() {
        let response = r#"<S:Fault><S:Detail><psf:error><psf:internalerror>
            <psf:text>AADSTS50126: Invalid username or password.</psf:text>
            </psf:internalerror></psf:error></S:Detail></S:Fault>"#;
        let err = extract_security_token(response).unwrap_err();
        assert!(err.starts_with("AADSTS50126"));

        assert!(extract_security_token("<html/>").is_err());
    }

    #[test]
    fn test_parse_form_digest() {
        let body = r#"{"d":{"GetContextWebInformation":{"__metadata":{"type":"SP.ContextWebInformation"},"FormDigestTimeoutSeconds":1800,"FormDigestValue":"0x1234,01 Jan 2024 00:00:00 -0000","WebFullUrl":"https://h/sites/s"}}}"#;
        assert_eq!(
            parse_form_digest(body).unwrap(),
            "0x1234,01 Jan 2024 00:00:00 -0000"
        );
        assert!(parse_form_digest("{}").is_err());
    }

    #[test]
    fn test_sign_in_rejects_non_success_status() {
        assert!(ensure_success(StatusCode::OK, "https://h/_forms", "sign-in form").is_ok());
        assert!(ensure_success(StatusCode::NO_CONTENT, "https://h/_forms", "sign-in form").is_ok());

        let err = ensure_success(StatusCode::FORBIDDEN, "https://h/_api/contextinfo", "context info")
            .unwrap_err();
        match err {
            RemoteError::Authentication { endpoint, reason } => {
                assert_eq!(endpoint, "https://h/_api/contextinfo");
                assert!(reason.contains("403"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sign_in_endpoint() {
        let target = UploadTarget::new("contoso.sharepoint.com", "archive", "Documents");
        assert_eq!(
            sign_in_endpoint(&target),
            "https://contoso.sharepoint.com/_forms/default.aspx?wa=wsignin1.0"
        );
    }
}
