//! One-shot commands: run a single request against the tool tab and print
//! the reply as JSON.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value, json};
use tracing::info;

use flowhands_config::{Config, ConfigValidator};
use flowhands_core::{
    AspectRatio, Command, CommandMessage, GenerationResult, PollPolicy, ReplyStatus,
    TextToVideoRequest, VideoModel,
};

use crate::app::FlowApp;
use crate::cli::SettingsArgs;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Run `generate` through the page controls, or `--direct` through the API.
pub(crate) async fn generate(
    config: &Config,
    settings: SettingsArgs,
    prompt: String,
    mode: Option<String>,
    new_project: bool,
    frames: Vec<PathBuf>,
    direct: bool,
) -> CmdResult {
    if direct {
        if !frames.is_empty() {
            return Err("--direct only supports text-to-video; drop --frame".into());
        }
        return generate_direct(config, &settings, prompt).await;
    }

    let mut payload = settings_payload(&settings);
    payload.insert("prompt".to_string(), json!(prompt));
    payload.insert("createNewProject".to_string(), json!(new_project));
    if let Some(mode) = mode {
        payload.insert("mode".to_string(), json!(mode));
    }
    if !frames.is_empty() {
        payload.insert("frames".to_string(), frames_payload(&frames)?);
    }

    run(config, CommandMessage::new(Command::Generate, Value::Object(payload))).await
}

pub(crate) async fn test_settings(
    config: &Config,
    settings: SettingsArgs,
    prompt: Option<String>,
    new_project: bool,
) -> CmdResult {
    let mut payload = settings_payload(&settings);
    payload.insert("createNewProject".to_string(), json!(new_project));
    if let Some(prompt) = prompt {
        payload.insert("prompt".to_string(), json!(prompt));
    }
    run(config, CommandMessage::new(Command::TestSettings, Value::Object(payload))).await
}

/// Print validation findings. Fails when any error was found.
pub(crate) fn check_config(config_path: &Path, config: &Config) -> CmdResult {
    let result = ConfigValidator::validate(config)?;
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    if !result.is_valid() {
        return Err(format!("{} has {} error(s)", config_path.display(), result.errors.len()).into());
    }
    println!("{} is valid", config_path.display());
    Ok(())
}

async fn run(config: &Config, message: CommandMessage) -> CmdResult {
    let app = FlowApp::attach(config).await?;
    let reply = app.router().dispatch(message).await;
    app.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&reply)?);
    if reply.status == ReplyStatus::Error {
        let code = reply.field("code").and_then(Value::as_str).unwrap_or("error");
        return Err(format!("command failed: {}", code).into());
    }
    Ok(())
}

async fn generate_direct(config: &Config, settings: &SettingsArgs, prompt: String) -> CmdResult {
    let aspect = match &settings.aspect {
        Some(label) => parse_label::<AspectRatio>(label)?,
        None => AspectRatio::Landscape,
    };
    let model = match &settings.model {
        Some(label) => parse_label::<VideoModel>(label)?,
        None => VideoModel::Veo31Fast,
    };

    let app = FlowApp::attach(config).await?;
    let client = app.upstream(config);
    let outcome = async {
        let submitted = client
            .generate_text_video(&TextToVideoRequest::new(prompt, aspect, model))
            .await?;
        info!(
            project_id = %submitted.project_id,
            operations = submitted.operations.len(),
            "generation submitted"
        );
        let policy = PollPolicy::new(
            config.timing.result_poll_interval(),
            config.timing.result_max_wait(),
        );
        let signal = client.await_operations(&submitted.operations, policy).await?;
        Ok::<_, flowhands_core::FlowError>((submitted, GenerationResult::from(signal)))
    }
    .await;
    app.shutdown().await;

    let (submitted, result) = outcome?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({"submitted": submitted, "result": result}))?
    );
    match result {
        GenerationResult::Complete { .. } => Ok(()),
        _ => Err("generation did not complete".into()),
    }
}

fn settings_payload(settings: &SettingsArgs) -> Map<String, Value> {
    let mut payload = Map::new();
    if let Some(aspect) = &settings.aspect {
        payload.insert("aspectRatio".to_string(), json!(aspect));
    }
    if let Some(model) = &settings.model {
        payload.insert("model".to_string(), json!(model));
    }
    if let Some(outputs) = settings.outputs {
        payload.insert("outputCount".to_string(), json!(outputs));
    }
    payload
}

/// Read frame files into `data:` URL entries, labelled by file name.
fn frames_payload(paths: &[PathBuf]) -> Result<Value, std::io::Error> {
    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(path)?;
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        frames.push(json!({
            "label": label,
            "data": format!("data:{};base64,{}", mime_for_path(path), BASE64.encode(bytes)),
        }));
    }
    Ok(Value::Array(frames))
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

fn parse_label<T: serde::de::DeserializeOwned>(label: &str) -> Result<T, String> {
    serde_json::from_value(json!(label)).map_err(|_| format!("unrecognized value: {}", label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowhands_core::decode_frame;

    #[test]
    fn test_settings_payload() {
        let payload = settings_payload(&SettingsArgs {
            aspect: Some("9:16".to_string()),
            model: None,
            outputs: Some(2),
        });
        assert_eq!(payload.get("aspectRatio"), Some(&json!("9:16")));
        assert_eq!(payload.get("outputCount"), Some(&json!(2)));
        assert!(!payload.contains_key("model"));
    }

    #[test]
    fn test_frames_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("start.JPG");
        std::fs::write(&path, b"\xff\xd8jpeg").unwrap();

        let frames = frames_payload(&[path]).unwrap();
        assert_eq!(frames[0]["label"], "start.JPG");
        let (mime, bytes) = decode_frame(frames[0]["data"].as_str().unwrap()).unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(bytes, b"\xff\xd8jpeg");
    }

    #[test]
    fn test_frames_payload_missing_file() {
        assert!(frames_payload(&[PathBuf::from("/nonexistent/frame.png")]).is_err());
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("a.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("frame")), "image/png");
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label::<AspectRatio>("portrait").unwrap(), AspectRatio::Portrait);
        assert_eq!(
            parse_label::<VideoModel>("Veo 3.1 - Quality").unwrap(),
            VideoModel::Veo31Quality
        );
        assert!(parse_label::<VideoModel>("Veo 9").is_err());
    }
}
