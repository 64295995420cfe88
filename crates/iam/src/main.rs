use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, ValueEnum};
use http::header::DATE;
use http::{HeaderName, HeaderValue, Method, Request};
use http_body_util::Full;
use nosql_iam_auth::{
    CertificateRetriever, HyperTransport, RequestSigner, RetrieverKeyProvider,
    StaticCertificateRetriever, UrlCertificateRetriever,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SignerKind {
    Default,
    Delegation,
}

#[derive(Parser)]
#[clap(about = "Sign an HTTP request with an X.509/RSA identity and print its headers")]
struct Args {
    #[clap(long, env = "IAM_CERTIFICATE_URL", conflicts_with = "certificate_file")]
    certificate_url: Option<String>,
    #[clap(long, env = "IAM_CERTIFICATE_FILE")]
    certificate_file: Option<PathBuf>,
    #[clap(long, env = "IAM_PRIVATE_KEY_URL", conflicts_with = "private_key_file")]
    private_key_url: Option<String>,
    #[clap(long, env = "IAM_PRIVATE_KEY_FILE")]
    private_key_file: Option<PathBuf>,
    #[clap(long, env = "IAM_KEY_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,
    #[clap(long, env = "IAM_KEY_ID")]
    key_id: String,
    #[clap(long, env = "IAM_FETCH_TIMEOUT_SECS", default_value = "10")]
    timeout_secs: u64,

    #[clap(long, default_value = "GET")]
    method: String,
    #[clap(long)]
    url: String,
    /// Extra request header as `name:value`; may be repeated.
    #[clap(long = "header")]
    headers: Vec<String>,
    #[clap(long)]
    body: Option<String>,
    #[clap(long)]
    delegation_token: Option<String>,
    #[clap(long, value_enum, default_value = "default")]
    signer: SignerKind,
    /// Only hash the body when the request carries `x-nosql-hash-body: true`.
    #[clap(long)]
    exclude_body: bool,
}

#[derive(Serialize)]
struct SignedRequest {
    method: String,
    url: String,
    headers: serde_json::Map<String, serde_json::Value>,
    expires_at: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let retriever = build_retriever(&args).await?;
    retriever
        .refresh()
        .await
        .context("loading certificate material")?;

    let provider = Arc::new(RetrieverKeyProvider::new(retriever, args.key_id.clone()));
    let signer = match (args.signer, args.exclude_body) {
        (SignerKind::Default, false) => RequestSigner::default_signer(provider),
        (SignerKind::Default, true) => RequestSigner::exclude_body(provider),
        (SignerKind::Delegation, false) => RequestSigner::delegation(provider),
        (SignerKind::Delegation, true) => RequestSigner::delegation_exclude_body(provider),
    };

    let mut request = build_request(&args)?;
    signer.sign(&mut request).await.context("signing request")?;

    let output = SignedRequest {
        method: request.method().to_string(),
        url: request.uri().to_string(),
        headers: request
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.to_string(), serde_json::Value::String(value))
            })
            .collect(),
        expires_at: chrono::DateTime::<chrono::Utc>::from(signer.expiration_time())
            .to_rfc3339(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn build_retriever(args: &Args) -> Result<Arc<dyn CertificateRetriever>> {
    let passphrase = args.passphrase.clone().map(String::into_bytes);

    if let Some(certificate_url) = &args.certificate_url {
        if args.private_key_file.is_some() {
            bail!("--private-key-file can not be combined with --certificate-url");
        }
        let transport =
            HyperTransport::new().with_timeout(Duration::from_secs(args.timeout_secs));
        return Ok(Arc::new(UrlCertificateRetriever::new(
            Arc::new(transport),
            certificate_url.clone(),
            args.private_key_url.clone(),
            passphrase,
        )));
    }

    let Some(certificate_file) = &args.certificate_file else {
        bail!("one of --certificate-url or --certificate-file is required");
    };
    if args.private_key_url.is_some() {
        bail!("--private-key-url can not be combined with --certificate-file");
    }
    let certificate = tokio::fs::read(certificate_file)
        .await
        .with_context(|| format!("reading {}", certificate_file.display()))?;
    let private_key = match &args.private_key_file {
        Some(path) => Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };

    Ok(Arc::new(StaticCertificateRetriever::new(
        certificate,
        private_key.map(Bytes::from),
        passphrase,
    )))
}

fn build_request(args: &Args) -> Result<Request<Full<Bytes>>> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method {}", args.method))?;
    let body = args.body.clone().map(Bytes::from).unwrap_or_default();
    let mut request = Request::builder()
        .method(method)
        .uri(&args.url)
        .body(Full::new(body))
        .context("building request")?;

    let headers = request.headers_mut();
    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("header {header:?} is not name:value"))?;
        headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    if let Some(token) = &args.delegation_token {
        headers.insert("opc-obo-token", HeaderValue::from_str(token)?);
    }
    if !headers.contains_key(DATE) {
        let now = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        headers.insert(DATE, HeaderValue::from_str(&now)?);
    }
    Ok(request)
}
