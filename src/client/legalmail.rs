// file: src/client/legalmail.rs
// description: HTTP adapter for the LegalMail filing API
// reference: https://app.legalmail.com.br/assets/docs/openapi.yaml

use crate::error::{FilingError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response};
use serde_json::{Value, json};
use tracing::debug;

/// Internal handle of a located judicial process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub id: i64,
    pub cnj: String,
}

/// Draft petition bound to a process and a signing certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetitionHandle {
    pub petition_id: i64,
    pub process_id: i64,
    pub certificate_id: i64,
}

/// Remote filing operations the pipeline drives, in protocol order. The
/// caller supplies deadlines; this port only translates calls and maps
/// non-2xx responses to typed errors.
#[async_trait]
pub trait FilingApi: Send + Sync {
    /// Resolves a canonical CNJ to the filing system's process handle.
    /// `None` means the process does not exist in the workspace.
    async fn locate_process(&self, cnj: &str) -> Result<Option<ProcessHandle>>;

    /// Creates a draft intermediate petition on the process.
    async fn create_petition(
        &self,
        process: &ProcessHandle,
        certificate_id: i64,
    ) -> Result<PetitionHandle>;

    /// Uploads the principal PDF; returns the raw acknowledgement payload.
    async fn upload_principal(
        &self,
        petition: &PetitionHandle,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<String>;

    /// Uploads one attachment; `document_type` is the court-specific
    /// attachment type code, when one applies.
    async fn upload_attachment(
        &self,
        petition: &PetitionHandle,
        bytes: Vec<u8>,
        file_name: &str,
        document_type: Option<&str>,
    ) -> Result<String>;

    /// Submits the petition for protocol with the given piece type
    /// (fk_peca). Irreversible once accepted; returns the protocol number.
    async fn submit_for_protocol(&self, petition: &PetitionHandle, piece_type: i64)
    -> Result<String>;

    /// Read-only status lookup used by verification; raw payload because
    /// the response shape varies per court system.
    async fn petition_status(&self, petition_id: i64) -> Result<Value>;
}

/// reqwest-backed [`FilingApi`] implementation.
///
/// The provider rate-limits the workspace to 30 requests per minute and
/// blocks keys caught polling, which is why the pipeline runs processes
/// strictly sequentially and never retries a protocol submission.
pub struct LegalMailClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl LegalMailClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<Value>,
        form: Option<Form>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("{} {}", method, endpoint);

        let mut request = self
            .client
            .request(method, &url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query);

        if let Some(body) = body {
            request = request.json(&body);
        }
        if let Some(form) = form {
            request = request.multipart(form);
        }

        let response = request.send().await?;
        parse_response(response).await
    }

    fn pdf_part(bytes: Vec<u8>, file_name: &str) -> Result<Part> {
        Ok(Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?)
    }
}

#[async_trait]
impl FilingApi for LegalMailClient {
    async fn locate_process(&self, cnj: &str) -> Result<Option<ProcessHandle>> {
        let payload = self
            .request(
                Method::GET,
                "/api/v1/process",
                &[("cnj", cnj.to_string())],
                None,
                None,
            )
            .await?;

        Ok(extract_process_id(&payload).map(|id| ProcessHandle {
            id,
            cnj: cnj.to_string(),
        }))
    }

    async fn create_petition(
        &self,
        process: &ProcessHandle,
        certificate_id: i64,
    ) -> Result<PetitionHandle> {
        let payload = self
            .request(
                Method::POST,
                "/api/v1/petition/intermediate",
                &[],
                Some(json!({
                    "idprocessos": process.id,
                    "fk_certificado": certificate_id,
                })),
                None,
            )
            .await?;

        let petition_id = payload
            .get("idPeticoes")
            .and_then(Value::as_i64)
            .ok_or_else(|| FilingError::RemoteApi {
                status: 200,
                message: "petition creation response missing idPeticoes".to_string(),
            })?;

        Ok(PetitionHandle {
            petition_id,
            process_id: process.id,
            certificate_id,
        })
    }

    async fn upload_principal(
        &self,
        petition: &PetitionHandle,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<String> {
        let form = Form::new().part("file", Self::pdf_part(bytes, file_name)?);

        let payload = self
            .request(
                Method::POST,
                "/api/v1/petition/file",
                &[
                    ("idpeticoes", petition.petition_id.to_string()),
                    ("idprocessos", petition.process_id.to_string()),
                ],
                None,
                Some(form),
            )
            .await?;

        Ok(payload.to_string())
    }

    async fn upload_attachment(
        &self,
        petition: &PetitionHandle,
        bytes: Vec<u8>,
        file_name: &str,
        document_type: Option<&str>,
    ) -> Result<String> {
        let form = Form::new().part("file", Self::pdf_part(bytes, file_name)?);

        let mut query = vec![
            ("idpeticoes", petition.petition_id.to_string()),
            ("idprocessos", petition.process_id.to_string()),
        ];
        if let Some(document_type) = document_type {
            query.push(("tipo_documento", document_type.to_string()));
        }

        let payload = self
            .request(
                Method::POST,
                "/api/v1/petition/attachments",
                &query,
                None,
                Some(form),
            )
            .await?;

        Ok(payload.to_string())
    }

    async fn submit_for_protocol(
        &self,
        petition: &PetitionHandle,
        piece_type: i64,
    ) -> Result<String> {
        let payload = self
            .request(
                Method::POST,
                "/api/v1/petition/intermediate/send",
                &[
                    ("idpeticoes", petition.petition_id.to_string()),
                    ("idprocessos", petition.process_id.to_string()),
                    ("idcertificados", petition.certificate_id.to_string()),
                    ("fk_peca", piece_type.to_string()),
                ],
                None,
                None,
            )
            .await?;

        Ok(extract_protocol_number(&payload, petition.petition_id))
    }

    async fn petition_status(&self, petition_id: i64) -> Result<Value> {
        self.request(
            Method::GET,
            "/api/v1/petition/status",
            &[("idpeticoes", petition_id.to_string())],
            None,
            None,
        )
        .await
    }
}

async fn parse_response(response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(FilingError::RemoteApi {
            status: status.as_u16(),
            message: error_message(status.as_u16(), &text),
        });
    }

    // The API sometimes returns JSON under a wrong content type, so the
    // body is always parsed optimistically; plain text is wrapped as-is.
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn error_message(status: u16, body: &str) -> String {
    if status == 429 {
        return "Request limit exceeded (30 per minute). Wait before retrying.".to_string();
    }

    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|payload| {
            payload
                .get("message")
                .or_else(|| payload.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                body.to_string()
            }
        })
}

fn extract_process_id(payload: &Value) -> Option<i64> {
    match payload {
        Value::Array(items) => items.first().and_then(extract_process_id),
        _ => payload.get("idprocessos").and_then(Value::as_i64),
    }
}

/// The protocol number field is not stable across court systems; fall back
/// to echoing the petition id when none is present.
fn extract_protocol_number(payload: &Value, petition_id: i64) -> String {
    ["protocolo", "numeroProtocolo", "numero_protocolo"]
        .iter()
        .find_map(|field| payload.get(field).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| petition_id.to_string())
}
