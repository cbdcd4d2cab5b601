//! Credential store
//!
//! API credentials and named sessions live in `credentials.yml` inside the
//! session directory (default `~/.tgeraser/`). They can also be passed as a
//! JSON string or taken from environment variables. Values written as
//! `${VAR}` are read from the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::prompt::{print_header, Prompter};

pub const DEFAULT_DIRECTORY: &str = "~/.tgeraser/";
pub const CREDENTIALS_FILE: &str = "credentials.yml";
pub const SESSION_EXTENSION: &str = "session";

pub const ENV_API_ID: &str = "TG_API_ID";
pub const ENV_API_HASH: &str = "TG_API_HASH";
pub const ENV_SESSION: &str = "TG_SESSION";

const PHONE_ATTEMPTS: usize = 3;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(([+][(]?[0-9]{1,3}[)]?)|([(]?[0-9]{4}[)]?))\s*[)]?[-\s\.]?[(]?[0-9]{1,3}[)]?([-\s\.]?[0-9]{3})([-\s\.]?[0-9]{3,4})",
    )
    .expect("valid phone regex")
});

/// Everything needed to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
    /// Full path to the session file.
    pub session_name: PathBuf,
    pub user_phone: Option<String>,
}

/// Where credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// `credentials.yml` in the session directory.
    File,
    /// Credentials document passed inline as JSON.
    Json(String),
    /// `TG_API_ID`, `TG_API_HASH`, `TG_SESSION`.
    Env,
}

/// On-disk layout of the credentials document (YAML or JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsFile {
    #[serde(default)]
    pub api_credentials: Option<ApiCredentials>,
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiCredentials {
    #[serde(
        default,
        deserialize_with = "deserialize_string_or_number",
        serialize_with = "serialize_number_or_string"
    )]
    pub api_id: Option<String>,
    #[serde(default)]
    pub api_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionEntry {
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_phone: Option<String>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

fn serialize_number_or_string<S>(
    value: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(v) => match v.parse::<i64>() {
            Ok(n) => serializer.serialize_i64(n),
            Err(_) => serializer.serialize_str(v),
        },
        None => serializer.serialize_none(),
    }
}

/// Resolve a `${VAR}` placeholder from the environment; other values pass through.
fn resolve_env_string(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        if let Ok(env_val) = std::env::var(var_name) {
            return env_val;
        }
    }
    value.to_string()
}

fn missing(what: &str) -> Error {
    Error::Config(format!("Credentials file doesn't contain {}.", what))
}

impl CredentialsFile {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse credentials file: {}", e)))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse credentials JSON: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check the required keys and return `(api_id, api_hash)`.
    pub fn api(&self) -> Result<(i32, String)> {
        let api = self
            .api_credentials
            .as_ref()
            .ok_or_else(|| missing("'api_credentials'"))?;

        let api_id = api
            .api_id
            .as_deref()
            .map(resolve_env_string)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("'api_id'"))?;
        let api_id = api_id
            .trim()
            .parse::<i32>()
            .map_err(|_| Error::Config("'api_id' should be integer.".to_string()))?;

        let api_hash = api
            .api_hash
            .as_deref()
            .map(resolve_env_string)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("'api_hash'"))?;

        if self.sessions.is_empty() {
            return Err(missing("sessions"));
        }
        if self.session_names().any(|name| name.is_none()) {
            return Err(missing("session_name"));
        }

        Ok((api_id, api_hash))
    }

    fn session_names(&self) -> impl Iterator<Item = Option<&str>> {
        self.sessions.iter().map(|s| {
            s.session_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
        })
    }

    pub fn find_session(&self, name: &str) -> Option<&SessionEntry> {
        self.sessions
            .iter()
            .find(|s| s.session_name.as_deref().map(str::trim) == Some(name))
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_directory(raw: &str) -> PathBuf {
    let home = || dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    if raw == "~" {
        home()
    } else if let Some(rest) = raw.strip_prefix("~/") {
        home().join(rest)
    } else {
        PathBuf::from(raw)
    }
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// Credential store rooted at a session directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    directory: PathBuf,
}

impl CredentialStore {
    /// Open the store, creating the directory if needed.
    pub fn open(directory: &str) -> Result<Self> {
        let directory = expand_directory(directory);
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.directory.join(CREDENTIALS_FILE)
    }

    pub fn session_path(&self, name: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", name.trim(), SESSION_EXTENSION))
    }

    pub fn read_file(&self) -> Result<CredentialsFile> {
        let content = fs::read_to_string(self.credentials_path())?;
        CredentialsFile::from_yaml(&content)
    }

    pub fn write_file(&self, file: &CredentialsFile) -> Result<()> {
        fs::write(self.credentials_path(), file.to_yaml()?)?;
        Ok(())
    }

    /// Build credentials for a named session from a validated document.
    pub fn credentials_for(&self, file: &CredentialsFile, name: &str) -> Result<Credentials> {
        let (api_id, api_hash) = file.api()?;
        let entry = file.find_session(name).ok_or_else(|| {
            Error::Config(format!(
                "It can't find '{}' session in credentials file.",
                name
            ))
        })?;

        Ok(Credentials {
            api_id,
            api_hash,
            session_name: self.session_path(name),
            user_phone: entry.user_phone.clone(),
        })
    }

    /// Load credentials from `source`, prompting where the source is incomplete.
    pub async fn load(
        &self,
        source: &CredentialSource,
        session_name: Option<&str>,
        prompter: &mut Prompter,
    ) -> Result<Credentials> {
        match source {
            CredentialSource::Json(json) => {
                let file = CredentialsFile::from_json(json)?;
                self.select(&file, session_name, prompter).await
            }
            CredentialSource::Env => self.from_env(prompter).await,
            CredentialSource::File => {
                let path = self.credentials_path();
                if path.exists() {
                    debug!(path = %path.display(), "Reading credentials file");
                    let file = self.read_file()?;
                    self.select(&file, session_name, prompter).await
                } else if prompter
                    .confirm("Do you want to create a credentials file? (y/n): ")
                    .await?
                {
                    self.create_file(prompter).await
                } else {
                    Err(Error::Config(format!(
                        "Credentials file {} doesn't exist.",
                        path.display()
                    )))
                }
            }
        }
    }

    async fn select(
        &self,
        file: &CredentialsFile,
        session_name: Option<&str>,
        prompter: &mut Prompter,
    ) -> Result<Credentials> {
        file.api()?;

        let name = match session_name {
            Some(name) => name.to_string(),
            None if file.sessions.len() == 1 => session_label(&file.sessions[0]),
            None => {
                print_header("Sessions");
                for (i, entry) in file.sessions.iter().enumerate() {
                    println!(
                        "{}. {}\t | {}",
                        i + 1,
                        session_label(entry),
                        entry
                            .user_phone
                            .as_deref()
                            .unwrap_or("Phone number wasn't specified")
                    );
                }
                let index = prompter
                    .choose("\nChoose session: ", file.sessions.len())
                    .await?;
                let name = session_label(&file.sessions[index]);
                println!("Chosen: {}\n", name);
                name
            }
        };

        let creds = self.credentials_for(file, &name)?;
        info!(session = %creds.session_name.display(), "Using session");
        Ok(creds)
    }

    async fn create_file(&self, prompter: &mut Prompter) -> Result<Credentials> {
        let api_id = prompter.ask_int("Enter api_id: ", "api_id").await?;
        let api_hash = prompter.ask("Enter api_hash: ").await?;
        let session_name = prompter.ask("Enter session_name: ").await?;

        let mut user_phone = None;
        for _ in 0..PHONE_ATTEMPTS {
            let phone = prompter.ask("Enter user_phone (+1234567890): ").await?;
            if is_valid_phone(&phone) {
                user_phone = Some(phone);
                break;
            }
            println!("Incorrect phone number. Try again.");
        }
        let user_phone = user_phone
            .ok_or_else(|| Error::Validation("Incorrect phone number. Exiting...".to_string()))?;

        let file = CredentialsFile {
            api_credentials: Some(ApiCredentials {
                api_id: Some(api_id.to_string()),
                api_hash: Some(api_hash),
            }),
            sessions: vec![SessionEntry {
                session_name: Some(session_name.clone()),
                user_phone: Some(user_phone),
            }],
        };

        // Validate before touching the disk.
        file.api()?;
        self.write_file(&file)?;
        println!(
            "Credentials file is created ({}).",
            self.credentials_path().display()
        );

        self.credentials_for(&file, &session_name)
    }

    async fn from_env(&self, prompter: &mut Prompter) -> Result<Credentials> {
        let api_id = match std::env::var(ENV_API_ID) {
            Ok(v) => crate::prompt::parse_int(&v, ENV_API_ID)?,
            Err(_) => prompter.ask_int("Enter your API ID: ", "api_id").await?,
        };
        let api_id = i32::try_from(api_id)
            .map_err(|_| Error::Validation("'api_id' is out of range.".to_string()))?;

        let api_hash = match std::env::var(ENV_API_HASH) {
            Ok(v) => v,
            Err(_) => prompter.ask("Enter your API hash: ").await?,
        };
        let session = match std::env::var(ENV_SESSION) {
            Ok(v) => v,
            Err(_) => prompter.ask("Enter session name: ").await?,
        };

        if api_hash.is_empty() || session.trim().is_empty() {
            return Err(Error::Config(
                "API hash and session name must not be empty.".to_string(),
            ));
        }

        Ok(Credentials {
            api_id,
            api_hash,
            session_name: self.session_path(&session),
            user_phone: None,
        })
    }
}

fn session_label(entry: &SessionEntry) -> String {
    entry
        .session_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}
