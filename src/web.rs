//! Web form served on the local port.
//!
//! The whole form is posted back on every action and re-rendered with the
//! updated subject, body and status, so the page itself holds the state.

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{error, info, warn};
use minijinja::{context, Environment};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;

use crate::composer::EmailFields;
use crate::config::{SenderDefaults, ServerConfig};
use crate::controller::{FormController, GenerateInput, GenerateOutcome};

const FORM_TEMPLATE: &str = "form.html";
const ATTACHMENTS_FIELD: &str = "attachments";

#[derive(Debug, Error)]
pub enum WebError {
    #[error("invalid form submission: {0}")]
    Multipart(#[from] MultipartError),

    #[error("unable to store upload: {0}")]
    Upload(#[from] std::io::Error),

    #[error("unable to render page: {0}")]
    Render(#[from] minijinja::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::Multipart(e) => e.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!("❌ {}", self);
        (status, self.to_string()).into_response()
    }
}

/// Every visible field of the page
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormState {
    pub recipient_email: String,
    pub recipient_name: String,
    pub instructions: String,
    pub sender_name: String,
    pub sender_position: String,
    pub sender_contact: String,
    pub subject: String,
    pub body: String,
    pub status: String,
}

impl FormState {
    pub fn with_defaults(defaults: &SenderDefaults) -> Self {
        FormState {
            sender_name: defaults.name.clone(),
            sender_position: defaults.position.clone(),
            sender_contact: defaults.contact.clone(),
            ..Default::default()
        }
    }

    fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "recipient_email" => &mut self.recipient_email,
            "recipient_name" => &mut self.recipient_name,
            "instructions" => &mut self.instructions,
            "sender_name" => &mut self.sender_name,
            "sender_position" => &mut self.sender_position,
            "sender_contact" => &mut self.sender_contact,
            "subject" => &mut self.subject,
            "body" => &mut self.body,
            "status" => &mut self.status,
            _ => return false,
        };
        *slot = value;
        true
    }

    fn generate_input(&self) -> GenerateInput {
        GenerateInput {
            instructions: self.instructions.clone(),
            recipient_name: self.recipient_name.clone(),
            sender_name: self.sender_name.clone(),
        }
    }

    fn email_fields(&self, attachments: Vec<PathBuf>) -> EmailFields {
        EmailFields {
            recipient_email: self.recipient_email.clone(),
            recipient_name: self.recipient_name.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            sender_name: self.sender_name.clone(),
            sender_position: self.sender_position.clone(),
            sender_contact: self.sender_contact.clone(),
            attachments,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<FormController>,
    pub templates: Arc<Environment<'static>>,
    pub defaults: SenderDefaults,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        controller: Arc<FormController>,
        defaults: SenderDefaults,
        max_upload_bytes: usize,
    ) -> Result<Self, WebError> {
        Ok(AppState {
            controller,
            templates: Arc::new(templates()?),
            defaults,
            max_upload_bytes,
        })
    }
}

pub fn templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template(FORM_TEMPLATE, include_str!("../templates/form.html"))?;
    Ok(env)
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .route("/send", post(send))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub async fn serve(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("🌐 Form available at http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

fn render(state: &AppState, form: &FormState) -> Result<Html<String>, WebError> {
    let page = state
        .templates
        .get_template(FORM_TEMPLATE)?
        .render(context! { form => form })?;
    Ok(Html(page))
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, WebError> {
    render(&state, &FormState::with_defaults(&state.defaults))
}

async fn generate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, WebError> {
    let (mut form, _) = read_form(multipart, None).await?;

    match state.controller.generate(&form.generate_input()).await {
        GenerateOutcome::Drafted(draft) => {
            form.subject = draft.subject;
            form.body = draft.body;
            form.status.clear();
        }
        outcome @ GenerateOutcome::MissingInstructions => {
            form.status = outcome.message().unwrap_or_default().to_string();
        }
    }

    render(&state, &form)
}

async fn send(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, WebError> {
    // Uploads live only for the duration of this action
    let uploads = TempDir::new()?;
    let (mut form, attachments) = read_form(multipart, Some(uploads.path())).await?;

    form.status = state.controller.send(form.email_fields(attachments)).await;

    render(&state, &form)
}

/// Collect text fields and spool uploaded files into `upload_dir`
async fn read_form(
    mut multipart: Multipart,
    upload_dir: Option<&Path>,
) -> Result<(FormState, Vec<PathBuf>), WebError> {
    let mut form = FormState::default();
    let mut attachments = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == ATTACHMENTS_FIELD {
            let file_name = field.file_name().and_then(upload_file_name);
            let data = field.bytes().await?;

            if let (Some(dir), Some(file_name)) = (upload_dir, file_name) {
                // One sub-directory per upload keeps duplicate names apart
                let slot = dir.join(attachments.len().to_string());
                tokio::fs::create_dir(&slot).await?;
                let path = slot.join(file_name);
                tokio::fs::write(&path, &data).await?;
                attachments.push(path);
            }
        } else {
            let value = field.text().await?;
            if !form.set(&name, value) {
                warn!("Ignoring unknown form field {:?}", name);
            }
        }
    }

    Ok((form, attachments))
}

/// Keep only the final path component of a client-supplied file name
fn upload_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();

    match cleaned.trim() {
        "" if raw.trim().is_empty() => None,
        "" | "." | ".." => Some("attachment".to_string()),
        name => Some(name.to_string()),
    }
}
