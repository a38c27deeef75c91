//! `acmagent request-certificate`.

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info};

use acmagent_core::load_config;
use acmagent_request::{certificate_id_from_arn, read_json_input, AcmClient, Certificate};

#[derive(Args)]
pub struct RequestArgs {
    /// Fully qualified domain name, such as www.example.com
    #[arg(long)]
    pub domain_name: Option<String>,

    /// Domain ACM sends the validation emails for
    #[arg(long)]
    pub validation_domain: Option<String>,

    /// Additional names for the Subject Alternative Name extension
    #[arg(long, num_args = 1..)]
    pub alternative_names: Vec<String>,

    /// Read the request from a JSON file (file://path)
    #[arg(long)]
    pub cli_input_json: Option<String>,

    /// Print a sample --cli-input-json document and exit
    #[arg(long, default_value_t = false)]
    pub generate_cli_skeleton: bool,

    /// Send logging to stderr
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

pub async fn run(args: RequestArgs) -> Result<()> {
    if args.generate_cli_skeleton {
        let template = Certificate::template();
        debug!(template = %template, "Generating json input file");
        println!("{template}");
        return Ok(());
    }

    let certificate = build_certificate(args)?;

    let config = load_config(None);
    let client = AcmClient::from_config(&config.acm).context("failed to set up the ACM client")?;
    let arn = client.request_certificate(&certificate).await?;

    let certificate_id = certificate_id_from_arn(&arn);
    info!(
        domain = %certificate.domain_name,
        certificate_id = %certificate_id,
        "Certificate was requested"
    );
    println!("{certificate_id}");
    Ok(())
}

/// `--cli-input-json` takes precedence over the individual flags.
fn build_certificate(args: RequestArgs) -> Result<Certificate> {
    let certificate = match &args.cli_input_json {
        Some(location) => Certificate::from_json_input(&read_json_input(location)?)?,
        None => Certificate::new(
            args.domain_name,
            args.alternative_names,
            args.validation_domain,
        )?,
    };
    Ok(certificate)
}
