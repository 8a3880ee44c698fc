use crux_core::testing::AppTester;
use detection_overlay::{
    App, Detection, Effect, Event, FrameResult, ImageRef, Model, VideoDetectionResult, VideoView,
    ViewState,
};

fn video(counts: &[usize]) -> VideoDetectionResult {
    let frames = counts
        .iter()
        .enumerate()
        .map(|(i, &n)| {
            let detections = (0..n)
                .map(|j| {
                    let class = if j % 2 == 0 { "RBC" } else { "Platelets" };
                    Detection::new(class, 0.8, [10.0, 10.0, 40.0, 40.0])
                })
                .collect();
            FrameResult::new(
                i,
                format!("{:.2}s", i as f64 * 0.5),
                detections,
                ImageRef::new(format!("annotated-{i}.jpg")),
                ImageRef::new(format!("original-{i}.jpg")),
            )
        })
        .collect();
    VideoDetectionResult::from_frames(frames)
}

fn video_view(app: &AppTester<App, Effect>, model: &Model) -> VideoView {
    match app.view(model).state {
        ViewState::Video(view) => view,
        other => panic!("expected video view, got {other:?}"),
    }
}

fn loaded(counts: &[usize]) -> (AppTester<App, Effect>, Model) {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(
        Event::VideoAnalysisCompleted(Box::new(video(counts))),
        &mut model,
    );
    (app, model)
}

#[test]
fn test_five_frame_navigation() {
    let (app, mut model) = loaded(&[1, 2, 3, 4, 5]);

    let view = video_view(&app, &model);
    let nav = view.navigation.expect("navigation present");
    assert_eq!(nav.label, "Frame 1/5 (1 detections)");
    assert!(!nav.can_prev);
    assert!(nav.can_next);

    app.update(Event::NextFrame, &mut model);
    app.update(Event::NextFrame, &mut model);
    assert_eq!(model.navigator.current(), Some(2));

    app.update(Event::FrameSelected { index: 4 }, &mut model);
    let update = app.update(Event::NextFrame, &mut model);
    assert_eq!(model.navigator.current(), Some(4));
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Render(_))));

    app.update(Event::FrameSelected { index: 7 }, &mut model);
    assert_eq!(model.navigator.current(), Some(4));

    app.update(Event::PreviousFrame, &mut model);
    assert_eq!(model.navigator.current(), Some(3));

    let view = video_view(&app, &model);
    assert_eq!(view.navigation.unwrap().label, "Frame 4/5 (4 detections)");
    let active: Vec<usize> = view
        .timeline
        .iter()
        .filter(|b| b.is_active)
        .map(|b| b.index)
        .collect();
    assert_eq!(active, vec![3]);
}

#[test]
fn test_overlay_toggle_switches_frame_image() {
    let (app, mut model) = loaded(&[2, 2]);

    let frame = video_view(&app, &model).current_frame.unwrap();
    assert_eq!(frame.image, "annotated-0.jpg");
    assert_eq!(frame.shapes.len(), 4);

    app.update(Event::OverlayToggled { enabled: false }, &mut model);
    let view = video_view(&app, &model);
    let frame = view.current_frame.unwrap();
    assert_eq!(frame.image, "original-0.jpg");
    assert!(frame.shapes.is_empty());
    assert_eq!(frame.detections.len(), 2);
    assert!(!view.navigation.unwrap().show_overlay);

    app.update(Event::NextFrame, &mut model);
    assert!(!model.navigator.show_overlay());
}

#[test]
fn test_frame_surface_survives_navigation() {
    let (app, mut model) = loaded(&[1, 1]);
    app.update(Event::ViewportResized { width: 1280.0 }, &mut model);
    app.update(
        Event::DisplayImageLoaded {
            width: 300,
            height: 300,
        },
        &mut model,
    );
    let first = video_view(&app, &model).current_frame.unwrap();
    assert_eq!((first.surface.width, first.surface.height), (600.0, 600.0));

    app.update(Event::NextFrame, &mut model);
    let second = video_view(&app, &model).current_frame.unwrap();
    assert_eq!(second.index, 1);
    assert_eq!(second.surface, first.surface);
    assert_eq!(second.shapes, first.shapes);
}

#[test]
fn test_new_video_resets_navigation() {
    let (app, mut model) = loaded(&[1, 1, 1]);
    app.update(Event::FrameSelected { index: 2 }, &mut model);
    app.update(Event::OverlayToggled { enabled: false }, &mut model);

    app.update(
        Event::VideoAnalysisCompleted(Box::new(video(&[3, 3]))),
        &mut model,
    );
    assert_eq!(model.navigator.current(), Some(0));
    assert!(model.navigator.show_overlay());
}

#[test]
fn test_summary_and_distribution() {
    let (app, model) = loaded(&[0, 4, 2]);
    let view = video_view(&app, &model);

    assert_eq!(view.total_frames, 3);
    assert_eq!(view.total_detections, 6);
    assert_eq!(view.average_text, "2.0");

    let heights: Vec<f64> = view.timeline.iter().map(|b| b.height_pct).collect();
    assert_eq!(heights, vec![5.0, 100.0, 50.0]);
    assert_eq!(view.timeline[1].title, "Frame 2: 4 detections");

    let rbc = view
        .distribution
        .iter()
        .find(|row| row.class_name == "RBC")
        .unwrap();
    assert_eq!(rbc.count, 3);
    assert_eq!(rbc.label, "3 (50.0%)");

    let wbc = view
        .distribution
        .iter()
        .find(|row| row.class_name == "WBC")
        .unwrap();
    assert_eq!(wbc.label, "0 (0.0%)");
}

#[test]
fn test_empty_video() {
    let (app, mut model) = loaded(&[]);
    let view = video_view(&app, &model);

    assert!(view.navigation.is_none());
    assert!(view.current_frame.is_none());
    assert!(view.timeline.is_empty());
    assert_eq!(view.average_text, "0.0");
    assert!(view.distribution.iter().all(|row| row.percentage == 0.0));
    assert_eq!(app.view(&model).warnings.len(), 1);

    app.update(Event::NextFrame, &mut model);
    app.update(Event::FrameSelected { index: 0 }, &mut model);
    assert_eq!(model.navigator.current(), None);
}

#[test]
fn test_all_empty_frames_sit_at_floor() {
    let (app, model) = loaded(&[0, 0, 0]);
    let view = video_view(&app, &model);
    assert!(view.timeline.iter().all(|b| b.height_pct == 5.0));
}
