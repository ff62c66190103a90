use super::RebuildArgs;
use anyhow::Result;

pub async fn rebuild(args: RebuildArgs) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/admin/staff-cache/rebuild", args.server.trim_end_matches('/'));

    let mut request = client.post(&url);
    if let Some(token) = &args.token {
        request = request.bearer_auth(token);
    }

    let resp = request
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("HTTP request failed: {}. Is `tos serve` running?", e))?;

    let status = resp.status();
    let body: serde_json::Value = resp.json().await?;
    if !status.is_success() {
        let err = body["error"].as_str().unwrap_or("unknown error");
        anyhow::bail!("{} ({})", err, status);
    }

    let added = body["data"]["added"].as_u64().unwrap_or(0);
    println!("Successfully added staff users to TOS staff ({} users)", added);
    Ok(())
}
