use crate::config::Config;
use crate::sync::handle_invocation;
use crate::zoom::{RecordingList, ZoomClient};
use anyhow::{Context, Result};
use std::path::Path;

pub mod args;

pub use args::{Cli, CliCommand, RunCliArgs};

pub async fn handle_run_command(args: RunCliArgs, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let event = match args.event.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("Failed to parse --event as JSON")?,
        None => serde_json::Value::Null,
    };

    let response = handle_invocation(&config, &event).await?;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

pub async fn handle_list_command(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let client = ZoomClient::new(config.zoom.base_url.clone(), config.zoom_credentials()?);

    let token = client.fetch_token().await?;
    let recordings = client.list_recordings(&token).await?;
    print!("{}", render_listing(&recordings));
    Ok(())
}

fn render_listing(recordings: &RecordingList) -> String {
    if recordings.total_records == 0 {
        return "No recordings found.\n".to_string();
    }

    let mut out = format!("{} recording(s)\n", recordings.total_records);
    for meeting in &recordings.meetings {
        out.push_str(&format!("{} ({})\n", meeting.topic, meeting.uuid));
        let mut any = false;
        for file in meeting.eligible_files() {
            out.push_str(&format!("  {}\n", file.scratch_name()));
            any = true;
        }
        if !any {
            out.push_str("  (no MP4 files)\n");
        }
    }
    out
}
