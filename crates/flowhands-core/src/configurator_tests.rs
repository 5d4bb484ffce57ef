use super::*;
use crate::testing::{Effect, flow_page};
use tokio::time::Instant;

fn run<'a>(
    page: &'a crate::testing::FakePage,
    selectors: &'a SelectorsConfig,
    timing: &'a TimingConfig,
) -> SettingsConfigurator<'a> {
    SettingsConfigurator::new(page, selectors, timing)
}

#[tokio::test(start_paused = true)]
async fn test_applies_aspect_and_model() {
    let page = flow_page();
    let selectors = SelectorsConfig::default();
    let timing = TimingConfig::default();

    let report = run(&page, &selectors, &timing)
        .configure(&SettingsRequest {
            aspect_ratio: Some("Portrait (9:16)".to_string()),
            model: Some("Veo 2 - Fast".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(report.panel_opened);
    assert_eq!(report.applied, vec!["aspect_ratio", "model"]);
    assert!(report.skipped.is_empty());
    assert_eq!(
        page.clicked(),
        vec!["model-button", "aspect", "opt-portrait", "model", "opt-veo2-fast"]
    );
    assert_eq!(page.dismissals(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_aspect_control_still_sets_model() {
    let page = flow_page();
    page.remove("aspect");
    let selectors = SelectorsConfig::default();
    let timing = TimingConfig::default();

    let report = run(&page, &selectors, &timing)
        .configure(&SettingsRequest {
            aspect_ratio: Some("Portrait (9:16)".to_string()),
            model: Some("Veo 2 - Fast".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(report.panel_opened);
    assert_eq!(report.applied, vec!["model"]);
    assert_eq!(report.skipped, vec!["aspect_ratio"]);
    assert!(page.was_clicked("opt-veo2-fast"));
    assert!(!page.was_clicked("opt-portrait"));
}

#[tokio::test(start_paused = true)]
async fn test_mode_and_output_count() {
    let page = flow_page();
    let selectors = SelectorsConfig::default();
    let timing = TimingConfig::default();

    let report = run(&page, &selectors, &timing)
        .configure(&SettingsRequest {
            mode: Some("Frames to Video".to_string()),
            output_count: Some(4),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(report.applied, vec!["mode", "output_count"]);
    assert!(page.was_clicked("opt-mode-frames"));
    assert!(page.was_clicked("opt-out-4"));
    assert!(page.is_visible("slot-0"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_mode_option_closes_dropdown() {
    let page = flow_page();
    let selectors = SelectorsConfig::default();
    let timing = TimingConfig::default();

    let report = run(&page, &selectors, &timing)
        .configure(&SettingsRequest {
            mode: Some("Storyboard".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(report.skipped, vec!["mode"]);
    assert!(!page.is_visible("opt-mode-text"));
    // One dismiss for the unmatched mode, one at the end.
    assert_eq!(page.dismissals(), 2);
    assert!(report.panel_opened);
}

#[tokio::test(start_paused = true)]
async fn test_no_panel_control_returns_false() {
    let page = flow_page();
    page.remove("model-button");
    page.remove("tune");
    let selectors = SelectorsConfig::default();
    let timing = TimingConfig::default();

    let report = run(&page, &selectors, &timing)
        .configure(&SettingsRequest {
            mode: Some("Text to Video".to_string()),
            aspect_ratio: Some("Landscape (16:9)".to_string()),
            model: Some("Veo 3.1 - Quality".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(!report.panel_opened);
    assert_eq!(report.applied, vec!["mode"]);
    assert_eq!(report.skipped, vec!["aspect_ratio", "model"]);
    assert!(!page.was_clicked("aspect"));
    assert!(!page.was_clicked("model"));
}

#[tokio::test(start_paused = true)]
async fn test_falls_back_to_settings_button() {
    let page = flow_page();
    page.remove("model-button");
    page.on_click("tune", Effect::show("model"));
    let selectors = SelectorsConfig::default();
    let timing = TimingConfig::default();

    let report = run(&page, &selectors, &timing)
        .configure(&SettingsRequest {
            model: Some("Veo 3.1 - Quality".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(report.panel_opened);
    assert_eq!(page.clicked()[0], "tune");
    assert!(page.was_clicked("opt-veo31-quality"));
}

#[tokio::test(start_paused = true)]
async fn test_settle_delays_come_from_timing() {
    let page = flow_page();
    let selectors = SelectorsConfig::default();
    let timing = TimingConfig::default();
    let start = Instant::now();

    run(&page, &selectors, &timing)
        .configure(&SettingsRequest {
            mode: Some("Text to Video".to_string()),
            aspect_ratio: Some("Landscape (16:9)".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    // mode 300 + 300, panel 500, aspect 200 + 300, dismiss 300
    assert_eq!(start.elapsed(), Duration::from_millis(1900));

    let page = flow_page();
    let instant = TimingConfig::instant();
    let start = Instant::now();
    run(&page, &selectors, &instant)
        .configure(&SettingsRequest {
            aspect_ratio: Some("Landscape (16:9)".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[test]
fn test_settings_from_generation_request() {
    use crate::model::{AspectRatio, FrameAsset, VideoModel};

    let request = GenerationRequest::new("a fox")
        .with_aspect_ratio(AspectRatio::Portrait)
        .with_model(VideoModel::Veo31Quality)
        .with_output_count(2)
        .with_frame(FrameAsset::png("First Frame", vec![1u8]));
    let settings = SettingsRequest::from_generation(&request);

    assert_eq!(settings.mode.as_deref(), Some("Frames to Video"));
    assert_eq!(settings.aspect_ratio.as_deref(), Some("Portrait (9:16)"));
    assert_eq!(settings.output_count, Some(2));
    assert_eq!(settings.model.as_deref(), Some("Veo 3.1 - Quality"));
}
