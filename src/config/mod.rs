use anyhow::{Context, Result};

const DEFAULT_CF_ENDPOINT: &str = "cloudformation.us-east-1.amazonaws.com";
const DEFAULT_PORT: u16 = 8442;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Bot token, like xoxb-...
    pub slack_token: String,
    /// Channel id, like CUL812373
    pub slack_channel: String,
    /// Header line of the status message, like "Deploying to production"
    pub slack_header: String,
    /// Host the relay fronts, like cloudformation.us-east-1.amazonaws.com
    pub cloudformation_endpoint: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let slack_token = std::env::var("SLACK_TOKEN").context("SLACK_TOKEN must be set")?;
        let slack_channel = std::env::var("SLACK_CHANNEL").context("SLACK_CHANNEL must be set")?;
        let slack_header = std::env::var("SLACK_HEADER").unwrap_or_default();

        let cloudformation_endpoint = std::env::var("CLOUDFORMATION_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_CF_ENDPOINT.to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("PORT") {
            Ok(port) => port.parse().unwrap_or(DEFAULT_PORT),
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            host,
            port,
            slack_token,
            slack_channel,
            slack_header,
            cloudformation_endpoint,
        })
    }
}
