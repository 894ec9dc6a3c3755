use log::{error, info, warn};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::auth::oauth::{GMAIL_READONLY_SCOPE, IdentityProvider, UserInfo};
use crate::cloud::storage::{ObjectStore, artifact_key};
use crate::cloud::tasks::{QUEUE_HEADER, TaskQueue};
use crate::error::Error;
use crate::store::repo::CredentialStore;
use crate::task::{AUDIO_FILE, DigestRunner};
use crate::web::http::{HttpRequest, HttpResponse};
use crate::web::pages;
use crate::web::session::{SESSION_COOKIE, SessionCodec, SessionData};

const STATIC_DEBUG_SAMPLE: usize = 50;

/// Everything the routes talk to.
pub struct AppParts {
    /// `None` when no OAuth client id/secret is configured.
    pub oauth: Option<Box<dyn IdentityProvider>>,
    pub store: Arc<dyn CredentialStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub queue: Box<dyn TaskQueue>,
    pub digest: Box<dyn DigestRunner>,
    pub sessions: SessionCodec,
    pub static_dir: PathBuf,
}

pub struct App {
    parts: AppParts,
}

impl App {
    pub fn new(parts: AppParts) -> Self {
        Self { parts }
    }

    /// Route one request, decoding the session cookie first and sending an
    /// updated one back if a handler changed it.
    pub fn handle(&self, req: &HttpRequest) -> HttpResponse {
        let sessions = &self.parts.sessions;
        let original = req
            .cookie(SESSION_COOKIE)
            .and_then(|v| sessions.decode(v))
            .unwrap_or_default();
        let mut session = original.clone();

        let resp = match self.route(req, &mut session) {
            Ok(resp) => resp,
            Err(e) => {
                error!("{} {} failed: {e:#}", req.method, req.path);
                return HttpResponse::text(e.status_code(), e.to_string());
            }
        };

        if session == original {
            resp
        } else if session == SessionData::default() {
            resp.with_header("Set-Cookie", &sessions.clear_cookie())
        } else {
            match sessions.set_cookie(&session) {
                Ok(cookie) => resp.with_header("Set-Cookie", &cookie),
                Err(e) => {
                    error!("could not encode session: {e:#}");
                    HttpResponse::text(500, "Internal Server Error")
                }
            }
        }
    }

    fn route(&self, req: &HttpRequest, session: &mut SessionData) -> Result<HttpResponse, Error> {
        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/") => Ok(self.index(session)),
            ("GET", "/login") => self.login(session),
            ("GET", "/oauth2callback") => self.oauth_callback(req, session),
            ("GET", "/home") => Ok(self.home(session)),
            ("GET", "/logout") => {
                *session = SessionData::default();
                Ok(HttpResponse::redirect("/"))
            }
            ("GET", "/cron/kick-ai") => self.kick_digest(),
            ("POST", "/tasks/newsletter-digest") => self.run_digest(req),
            ("GET", "/__static_debug") => Ok(self.static_debug()),
            _ => Ok(HttpResponse::text(404, "Not Found")),
        }
    }

    fn index(&self, session: &SessionData) -> HttpResponse {
        if session.logged_in() {
            return HttpResponse::redirect("/home");
        }
        HttpResponse::html(200, pages::login())
    }

    fn login(&self, session: &mut SessionData) -> Result<HttpResponse, Error> {
        let oauth = self
            .parts
            .oauth
            .as_deref()
            .ok_or(Error::MissingClientCredentials)?;

        let request = oauth.authorization_request()?;
        session.oauth_state = Some(request.state);
        session.pkce_verifier = Some(request.pkce_verifier);
        Ok(HttpResponse::redirect(request.url.as_str()))
    }

    fn oauth_callback(
        &self,
        req: &HttpRequest,
        session: &mut SessionData,
    ) -> Result<HttpResponse, Error> {
        let Some(expected_state) = session.oauth_state.clone() else {
            return Err(Error::MissingOAuthState);
        };
        let oauth = self
            .parts
            .oauth
            .as_deref()
            .ok_or(Error::MissingClientCredentials)?;

        if let Some(provider_error) = req.query("error") {
            return Err(Error::TokenExchange(provider_error.to_string()));
        }
        if req.query("state") != Some(expected_state.as_str()) {
            return Err(Error::TokenExchange("state mismatch".into()));
        }
        let code = req
            .query("code")
            .ok_or_else(|| Error::TokenExchange("missing authorization code".into()))?;
        let verifier = session.pkce_verifier.clone().unwrap_or_default();

        let grant = oauth
            .exchange_code(code, &verifier)
            .map_err(|e| Error::TokenExchange(format!("{e:#}")))?;

        let user = oauth.user_info(&grant).unwrap_or_else(|e| {
            warn!("could not verify who signed in: {e:#}");
            UserInfo::default()
        });

        match user.email.as_deref() {
            Some(email) => {
                self.parts.store.save(email, &grant.credential)?;
                info!("stored credential for {email}");
            }
            None => warn!("signed-in user has no email; credential not stored"),
        }

        session.has_gmail_scope = grant
            .credential
            .scopes
            .iter()
            .any(|s| s == GMAIL_READONLY_SCOPE);
        session.user = Some(user);
        session.oauth_state = None;
        session.pkce_verifier = None;
        Ok(HttpResponse::redirect("/home"))
    }

    fn home(&self, session: &SessionData) -> HttpResponse {
        let Some(user) = &session.user else {
            return HttpResponse::redirect("/");
        };
        let audio_url = user
            .email
            .as_deref()
            .map(|email| self.parts.objects.public_url(&artifact_key(email)));
        HttpResponse::html(200, pages::home(user, audio_url.as_deref()))
    }

    fn kick_digest(&self) -> Result<HttpResponse, Error> {
        let name = self.parts.queue.enqueue_digest()?;
        Ok(HttpResponse::json(200, &json!({ "enqueued": name })))
    }

    fn run_digest(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        let Some(queue) = req.header(QUEUE_HEADER) else {
            warn!("digest task request without {QUEUE_HEADER}");
            return Ok(HttpResponse::text(403, "Forbidden"));
        };
        info!("digest task delivered from queue {queue}");

        let report = self.parts.digest.run_batch()?;
        Ok(HttpResponse::json(200, &report))
    }

    fn static_debug(&self) -> HttpResponse {
        let dir = &self.parts.static_dir;
        let exists = dir.is_dir();
        let files: Vec<String> = if exists {
            WalkDir::new(dir)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    e.path()
                        .strip_prefix(dir)
                        .ok()
                        .map(|p| p.to_string_lossy().into_owned())
                })
                .take(STATIC_DEBUG_SAMPLE)
                .collect()
        } else {
            Vec::new()
        };

        HttpResponse::json(
            200,
            &json!({
                "static_dir": dir.display().to_string(),
                "exists_static": exists,
                "has_podcast": dir.join(AUDIO_FILE).exists(),
                "sample_files": files,
            }),
        )
    }
}
