//! CLI commands

use anyhow::{anyhow, bail, Result};
use clap::{Args, Subcommand, ValueEnum};
use tokenrelay_core::{render_body, AuthEvent, CallEngine};
use tokenrelay_domain::{ArgumentEncoding, Arguments, HttpMethod, HttpRequest};
use tracing::{info, warn};

use crate::context::ClientContext;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the credentials (reduced-security mode)
    Login {
        /// Account to log in with (defaults to the configured account)
        #[arg(long)]
        account: Option<String>,
    },

    /// Invalidate the token on the identity server
    Logout,

    /// Request a new token from the refresh endpoint
    Refresh,

    /// Delete the stored credentials of the configured account
    Forget,

    /// Call an API route and print the response body
    Call(CallArgs),

    /// Download an API route into the download directory
    Download(RouteArgs),
}

#[derive(Args)]
pub struct RouteArgs {
    /// Route appended to the API base URL
    route: String,

    /// Request argument, repeatable
    #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    args: Vec<(String, String)>,

    /// Where the arguments travel
    #[arg(long, value_enum, default_value_t = Encoding::Query)]
    encoding: Encoding,

    /// HTTP method (case-insensitive)
    #[arg(long, default_value = "GET")]
    method: HttpMethod,
}

#[derive(Args)]
pub struct CallArgs {
    #[command(flatten)]
    route: RouteArgs,

    /// Raw JSON body; replaces `--arg`
    #[arg(long, conflicts_with = "args")]
    json: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Encoding {
    Query,
    Form,
    Json,
}

impl From<Encoding> for ArgumentEncoding {
    fn from(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Query => Self::QueryString,
            Encoding::Form => Self::FORM,
            Encoding::Json => Self::JSON,
        }
    }
}

impl Commands {
    pub async fn execute(self, context: &ClientContext, password: Option<String>) -> Result<()> {
        let engine = &context.engine;
        let mut events = engine.subscribe();

        let outcome = match self {
            Self::Login { account } => {
                let account = context
                    .account(account.as_deref())
                    .ok_or_else(|| anyhow!("no account given and none configured"))?;
                let Some(password) = password else {
                    bail!("a password is required (--password or TOKENRELAY_PASSWORD)");
                };
                engine.authenticate(&account, &password).await.map(|message| println!("{message}"))
            }
            Self::Logout => {
                prepare(engine, context.account(None), password).await?;
                engine.logout().await.map(|message| println!("{message}"))
            }
            Self::Refresh => engine.refresh().await.map(|message| println!("{message}")),
            Self::Forget => engine.forget_credentials().await.map(|()| println!("Credentials removed")),
            Self::Call(args) => {
                prepare(engine, context.account(None), password).await?;
                let request = args.build(engine)?;
                engine.call_text(&request).await.map(|body| println!("{}", render_body(body.as_bytes())))
            }
            Self::Download(args) => {
                prepare(engine, context.account(None), password).await?;
                let request = args.build(engine)?;
                engine.download(&request).await.map(|path| println!("{}", path.display()))
            }
        };

        if let Err(err) = outcome {
            if matches!(events.try_recv(), Ok(AuthEvent::AuthenticationRequired)) {
                eprintln!("Authentication required: run `tokenrelay login`");
            }
            return Err(err.into());
        }
        Ok(())
    }
}

/// Restore stored credentials, and log in up front when a password is at
/// hand. Without either, the first call runs unauthenticated and relies on
/// recovery. An unreadable credential store is not fatal.
async fn prepare(
    engine: &CallEngine,
    account: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let restored = match engine.restore_credentials().await {
        Ok(restored) => restored,
        Err(err) => {
            warn!(error = %err, "Could not read stored credentials");
            false
        }
    };
    if let (Some(account), Some(password)) = (account, password) {
        engine.authenticate(&account, &password).await?;
    } else if restored {
        info!("Using stored credentials");
    }
    Ok(())
}

impl RouteArgs {
    fn arguments(&self) -> Option<Arguments> {
        (!self.args.is_empty()).then(|| self.args.iter().cloned().collect())
    }

    fn build(&self, engine: &CallEngine) -> Result<HttpRequest> {
        Ok(engine.authorized_request(
            &self.route,
            self.arguments().as_ref(),
            self.encoding.into(),
            self.method,
        )?)
    }
}

impl CallArgs {
    fn build(&self, engine: &CallEngine) -> Result<HttpRequest> {
        match &self.json {
            Some(raw) => {
                let body: serde_json::Value = serde_json::from_str(raw)?;
                Ok(engine.authorized_json_request(&self.route.route, &body, self.route.method)?)
            }
            None => self.route.build(engine),
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}
