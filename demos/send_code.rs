//! Send a one-time code through any supported provider.
//!
//! ```text
//! cargo run --example send_code -- --provider Aliyun --access-id LTAI... \
//!     --access-key secret --sign Acme --template SMS_1234 --to 13800138000 --code 482913
//! ```
//!
//! Every flag can also come from the environment (`SMS_PROVIDER`, `SMS_ACCESS_ID`, ...).
//! `--extra` takes the provider-specific positional arguments, comma separated.
use sms_core::params_with_code;
use smsgate::LoggingConfig;

use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    smsgate::logging::init(&LoggingConfig {
        level: "debug".into(),
        format: "pretty".into(),
    })?;

    let provider = arg_or_env("--provider", "SMS_PROVIDER")?;
    let access_id = arg_or_env("--access-id", "SMS_ACCESS_ID").unwrap_or_default();
    let access_key = arg_or_env("--access-key", "SMS_ACCESS_KEY").unwrap_or_default();
    let sign = arg_or_env("--sign", "SMS_SIGN").unwrap_or_default();
    let template = arg_or_env("--template", "SMS_TEMPLATE").unwrap_or_default();
    let extra = arg_or_env("--extra", "SMS_EXTRA").unwrap_or_default();
    let to = arg_or_env("--to", "SMS_TO")?;
    let code = arg_or_env("--code", "SMS_CODE")?;

    let extra: Vec<&str> = extra.split(',').filter(|s| !s.is_empty()).collect();
    let recipients: Vec<&str> = to.split(',').collect();

    let client =
        smsgate::create(&provider, &access_id, &access_key, &sign, &template, &extra).await?;
    client.send(&params_with_code(code), &recipients).await?;
    println!("Sent via {} to {} recipient(s)", client.provider(), recipients.len());
    Ok(())
}

fn arg_or_env(flag: &str, env_key: &str) -> Result<String, String> {
    let args: Vec<String> = env::args().collect();
    if let Some(idx) = args.iter().position(|a| a == flag) {
        if idx + 1 < args.len() {
            return Ok(args[idx + 1].clone());
        }
    }
    env::var(env_key).map_err(|_| format!("missing {} (arg {} or env {})", flag, flag, env_key))
}
