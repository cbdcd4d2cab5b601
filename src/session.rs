//! Session management for the Telegram client
//!
//! Provides:
//! - Client creation over a grammers SQLite session file
//! - One reconnect attempt when the first connection fails
//! - Interactive sign in (phone, code, two-step password)

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use grammers_client::client::updates::UpdatesLike;
use grammers_client::types::{LoginToken, PasswordToken};
use grammers_client::{Client, InvocationError, SignInError};
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Credentials;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::prompt::Prompter;

/// Open (or create) the session file at `path`.
pub fn open_session(path: &Path) -> Result<Arc<SqliteSession>> {
    let session = SqliteSession::open(&*path.to_string_lossy()).map_err(|e| {
        Error::Config(format!(
            "Failed to open session {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(Arc::new(session))
}

/// Map a failed authorization check: RPC answers mean we reached Telegram, anything
/// else is a transport problem worth one retry.
fn classify_connect_error(err: InvocationError) -> Error {
    match err {
        InvocationError::Rpc(rpc) => Error::Telegram(rpc.to_string()),
        other => Error::Connection(other.to_string()),
    }
}

/// Run `attempt`, and run it once more if it failed with [`Error::Connection`].
pub async fn connect_with_retry<T, F, Fut>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match attempt().await {
        Err(Error::Connection(reason)) => {
            warn!(%reason, "Initial connection failed, retrying");
            println!("Initial connection failed. Retrying...");
            attempt().await
        }
        other => other,
    }
}

/// Result of submitting a login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOutcome {
    /// Signed in; carries the account's display name.
    SignedIn(String),
    InvalidCode,
    PasswordRequired,
}

/// The sign-in requests, one per step of the flow.
#[async_trait]
pub trait Authenticator: Send {
    async fn request_code(&mut self, phone: &str) -> Result<()>;
    async fn submit_code(&mut self, code: &str) -> Result<CodeOutcome>;
    /// Returns the account's display name.
    async fn submit_password(&mut self, password: &str) -> Result<String>;
}

/// Phone, then code (re-asked while invalid), then the two-step password
/// if the account has one. Every step gives up when `ctx` is cancelled.
pub async fn sign_in_flow<A: Authenticator + ?Sized>(
    auth: &mut A,
    phone: Option<&str>,
    prompter: &mut Prompter,
    ctx: &RunContext,
) -> Result<String> {
    println!("First run. Sending code request...");
    let phone = match phone.map(str::trim) {
        Some(phone) if !phone.is_empty() => phone.to_string(),
        _ => prompter.ask("Enter your phone: ").await?,
    };

    ctx.interruptible(auth.request_code(&phone)).await??;

    loop {
        let code = prompter.ask("Enter the code you just received: ").await?;
        match ctx.interruptible(auth.submit_code(&code)).await?? {
            CodeOutcome::SignedIn(name) => return Ok(name),
            CodeOutcome::InvalidCode => println!("Invalid code. Try again."),
            CodeOutcome::PasswordRequired => {
                let password = prompter
                    .ask_password("Two step verification is enabled. Please enter your password: ")
                    .await?;
                return ctx
                    .interruptible(auth.submit_password(password.trim()))
                    .await?;
            }
        }
    }
}

/// [`Authenticator`] over a grammers client.
struct ClientAuthenticator<'a> {
    client: &'a Client,
    api_hash: &'a str,
    login_token: Option<LoginToken>,
    password_token: Option<PasswordToken>,
}

#[async_trait]
impl Authenticator for ClientAuthenticator<'_> {
    async fn request_code(&mut self, phone: &str) -> Result<()> {
        let token = self
            .client
            .request_login_code(phone, self.api_hash)
            .await
            .map_err(|e| Error::SignIn(format!("Failed to request code: {}", e)))?;
        self.login_token = Some(token);
        Ok(())
    }

    async fn submit_code(&mut self, code: &str) -> Result<CodeOutcome> {
        let token = self
            .login_token
            .as_ref()
            .ok_or_else(|| Error::SignIn("no login code was requested".to_string()))?;

        match self.client.sign_in(token, code).await {
            Ok(user) => Ok(CodeOutcome::SignedIn(user.full_name())),
            Err(SignInError::InvalidCode) => Ok(CodeOutcome::InvalidCode),
            Err(SignInError::PasswordRequired(password_token)) => {
                self.password_token = Some(password_token);
                Ok(CodeOutcome::PasswordRequired)
            }
            Err(e) => Err(Error::SignIn(e.to_string())),
        }
    }

    async fn submit_password(&mut self, password: &str) -> Result<String> {
        let token = self
            .password_token
            .take()
            .ok_or_else(|| Error::SignIn("no password was requested".to_string()))?;

        self.client
            .check_password(token, password)
            .await
            .map(|user| user.full_name())
            .map_err(|e| Error::SignIn(e.to_string()))
    }
}

/// A connected grammers client plus the sender pool it runs on.
///
/// The runner task is aborted when the client is dropped.
pub struct TelegramClient {
    pub client: Client,
    authorized: bool,
    _handle: SenderPoolHandle,
    _updates: mpsc::UnboundedReceiver<UpdatesLike>,
    runner: JoinHandle<()>,
}

impl TelegramClient {
    /// Connect with the given credentials, retrying once on connection failure.
    pub async fn connect(credentials: &Credentials) -> Result<Self> {
        println!("Connecting to Telegram servers...");
        connect_with_retry(|| Self::try_connect(credentials)).await
    }

    async fn try_connect(credentials: &Credentials) -> Result<Self> {
        let session = open_session(&credentials.session_name)?;
        let pool = SenderPool::new(session, credentials.api_id);

        // Create client from pool (need reference to whole pool)
        let client = Client::new(&pool);

        let SenderPool {
            runner,
            updates,
            handle,
        } = pool;

        let runner = tokio::spawn(async move {
            runner.run().await;
        });

        let mut connected = Self {
            client,
            authorized: false,
            _handle: handle,
            _updates: updates,
            runner,
        };

        connected.authorized = connected
            .client
            .is_authorized()
            .await
            .map_err(classify_connect_error)?;
        info!(authorized = connected.authorized, "Connected");

        Ok(connected)
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// Sign in interactively unless the session is already authorized.
    pub async fn authorize(
        &mut self,
        credentials: &Credentials,
        prompter: &mut Prompter,
        ctx: &RunContext,
    ) -> Result<()> {
        if self.authorized {
            return Ok(());
        }

        let mut auth = ClientAuthenticator {
            client: &self.client,
            api_hash: &credentials.api_hash,
            login_token: None,
            password_token: None,
        };
        let name = sign_in_flow(
            &mut auth,
            credentials.user_phone.as_deref(),
            prompter,
            ctx,
        )
        .await?;

        self.authorized = true;
        info!(user = %name, "Signed in");
        println!("Signed in as {}", name);
        Ok(())
    }
}

// Implement Deref to allow using TelegramClient as &Client
impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl Drop for TelegramClient {
    fn drop(&mut self) {
        self.runner.abort();
    }
}
