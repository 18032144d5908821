use clap::Parser;
use rpcauth_reqwest::{ClientConfig, ClientFactory};
use rpcauth_tokens::{sources::oauth2, Credential};

#[derive(Debug, Parser)]
struct Opts {
    /// The issuing authority's token request URL
    #[arg(short, long, env, default_value = rpcauth_reqwest::DEFAULT_TOKEN_URL)]
    token_url: reqwest::Url,

    /// Base64 `clientID:clientSecret`, or a refresh token with `--refresh`
    #[arg(short = 'a', long, env, hide_env_values = true, default_value = "")]
    auth_token: String,

    /// Treat the auth token as a refresh token
    #[arg(short, long)]
    refresh: bool,

    /// An RPC endpoint to send a `getHealth` request to once authenticated
    #[arg(short, long, env = "RPC_ENDPOINT")]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let credential = if opts.refresh {
        Credential::from_refresh_token(&opts.auth_token)
    } else {
        Credential::from_encoded_client_credentials(&opts.auth_token)?
    };

    let factory = ClientFactory::new(ClientConfig::default().with_token_url(opts.token_url));

    let token_client = factory.token_client()?;
    match oauth2::fetch_token(&token_client, &factory.config().token_url, &credential).await? {
        Some(token) => tracing::info!(
            token = format_args!("{:#?}", token.access_token()),
            scheme = %token.scheme(),
            lifetime = token.lifetime().0,
            "fetched access token"
        ),
        None => tracing::info!("no credential supplied, requests will be sent anonymously"),
    }

    if let Some(endpoint) = opts.endpoint {
        let rpc = factory.build(&endpoint, credential)?;
        let response = rpc
            .post()
            .header("content-type", "application/json")
            .body(r#"{"jsonrpc":"2.0","id":1,"method":"getHealth"}"#)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::info!(%status, body = %body, "RPC response");
    }

    Ok(())
}
