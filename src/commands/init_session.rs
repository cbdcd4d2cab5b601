//! Session initialization command
//!
//! Creates (or picks) stored credentials and signs the session in, without
//! erasing anything.

use crate::config::{CredentialSource, CredentialStore};
use crate::context::RunContext;
use crate::error::Result;
use crate::prompt::{print_header, Prompter};
use crate::session::TelegramClient;

pub async fn run(
    directory: &str,
    session: Option<&str>,
    source: &CredentialSource,
    ctx: &RunContext,
) -> Result<()> {
    let mut prompter = Prompter::stdin(ctx);

    let store = CredentialStore::open(directory)?;
    let credentials = store.load(source, session, &mut prompter).await?;

    let mut client = ctx
        .interruptible(TelegramClient::connect(&credentials))
        .await??;
    if client.is_authorized() {
        println!("Session is already authorized.");
    } else {
        client.authorize(&credentials, &mut prompter, ctx).await?;
    }

    print_header("Session ready");
    println!("Session file: {}", credentials.session_name.display());
    Ok(())
}
