use std::path::Path;

use super::*;
use crate::test_support::fonts::system_font_path;

fn setup() -> Option<(tempfile::TempDir, InputLayout, RenderConfig)> {
    let font = system_font_path()?;
    let dir = tempfile::tempdir().unwrap();
    let layout = InputLayout::new(dir.path().join("in"), dir.path().join("out/nested"));
    std::fs::create_dir_all(&layout.input_dir).unwrap();
    let mut cfg = RenderConfig::default();
    cfg.text.font_path = Some(font);
    cfg.workers = Some(2);
    Some((dir, layout, cfg))
}

fn garbage_item(dir: &Path, item: u64) {
    for ext in ["png", "srt", "mp3"] {
        std::fs::write(dir.join(format!("{item}.{ext}")), b"garbage").unwrap();
    }
}

#[test]
fn report_helpers() {
    let report = BatchReport {
        outcomes: vec![
            ItemOutcome::Failed {
                item: 2,
                error: "boom".to_string(),
            },
            ItemOutcome::Succeeded(ItemReport {
                item: 3,
                output: "out/output_3.mp4".into(),
                frames: 30,
                duration_secs: 1.0,
                cues: 1,
                elapsed: Duration::from_millis(5),
            }),
        ],
    };
    assert!(!report.is_success());
    assert_eq!(report.failed().collect::<Vec<_>>(), vec![(2, "boom")]);
    assert_eq!(report.succeeded().map(|r| r.item).collect::<Vec<_>>(), vec![3]);
    assert_eq!(report.outcomes[1].item(), 3);
    assert!(BatchReport::default().is_success());
}

#[test]
fn panic_messages_are_extracted() {
    let p = std::panic::catch_unwind(|| -> u8 { panic!("static") }).unwrap_err();
    assert_eq!(panic_message(p.as_ref()), "static");
    let p = std::panic::catch_unwind(|| -> u8 { panic!("formatted {}", 7) }).unwrap_err();
    assert_eq!(panic_message(p.as_ref()), "formatted 7");
}

#[test]
fn panicking_item_does_not_stop_the_others() {
    let Some((_dir, layout, cfg)) = setup() else {
        return;
    };
    let s = BatchScheduler::new(layout.clone(), cfg).unwrap();

    let report = s.run_items_with(&[1, 2, 3], |layout, item, renderer, _cfg| {
        if item == 2 {
            std::fs::write(layout.partial_path(item), b"half-written").unwrap();
            panic!("encoder exploded on item {item}");
        }
        assert!(!renderer.family_name().is_empty());
        Ok(ItemReport {
            item,
            output: layout.output_path(item),
            frames: 1,
            duration_secs: 0.1,
            cues: 0,
            elapsed: Duration::ZERO,
        })
    });

    assert_eq!(
        report.outcomes.iter().map(ItemOutcome::item).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(report.succeeded().map(|r| r.item).collect::<Vec<_>>(), vec![1, 3]);
    let failed = report.failed().collect::<Vec<_>>();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, 2);
    assert!(failed[0].1.contains("panicked"), "{}", failed[0].1);
    assert!(failed[0].1.contains("encoder exploded on item 2"), "{}", failed[0].1);
    assert!(!layout.partial_path(2).exists());
}

#[test]
fn worker_keeps_rendering_after_a_panic() {
    let Some((_dir, layout, mut cfg)) = setup() else {
        return;
    };
    cfg.workers = Some(1);
    let s = BatchScheduler::new(layout, cfg).unwrap();

    let report = s.run_items_with(&[1, 2], |layout, item, renderer, _cfg| {
        if item == 1 {
            panic!("first item fails");
        }
        assert!(!renderer.family_name().is_empty());
        Ok(ItemReport {
            item,
            output: layout.output_path(item),
            frames: 1,
            duration_secs: 0.1,
            cues: 0,
            elapsed: Duration::ZERO,
        })
    });
    assert_eq!(report.failed().map(|(i, _)| i).collect::<Vec<_>>(), vec![1]);
    assert_eq!(report.succeeded().map(|r| r.item).collect::<Vec<_>>(), vec![2]);
}

#[test]
fn new_requires_a_font() {
    let dir = tempfile::tempdir().unwrap();
    let layout = InputLayout::new(dir.path(), dir.path().join("out"));
    assert!(BatchScheduler::new(layout, RenderConfig::default()).is_err());
}

#[test]
fn new_creates_output_dir_and_sizes_pool() {
    let Some((_dir, layout, cfg)) = setup() else {
        return;
    };
    let s = BatchScheduler::new(layout.clone(), cfg).unwrap();
    assert!(layout.output_dir.is_dir());
    assert_eq!(s.pool.current_num_threads(), 2);
    assert!(s.run_once().unwrap().outcomes.is_empty());
}

#[test]
fn failures_are_isolated_and_ordered() {
    let Some((_dir, layout, cfg)) = setup() else {
        return;
    };
    garbage_item(&layout.input_dir, 4);
    garbage_item(&layout.input_dir, 1);
    let s = BatchScheduler::new(layout.clone(), cfg).unwrap();

    let report = s.run_once().unwrap();
    let items: Vec<u64> = report.outcomes.iter().map(ItemOutcome::item).collect();
    assert_eq!(items, vec![1, 4]);
    assert_eq!(report.failed().count(), 2);
    assert!(!layout.output_path(1).exists());
    assert!(!layout.output_path(4).exists());
}

#[test]
fn watch_stops_and_does_not_retry_unchanged_failures() {
    let Some((_dir, layout, cfg)) = setup() else {
        return;
    };
    garbage_item(&layout.input_dir, 9);
    let s = BatchScheduler::new(layout, cfg).unwrap();

    let mut polls = 0;
    let report = s
        .watch(Duration::from_millis(10), || {
            polls += 1;
            polls > 4
        })
        .unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].item(), 9);
    assert!(!report.is_success());
}

#[test]
fn watch_returns_immediately_when_stopped() {
    let Some((_dir, layout, cfg)) = setup() else {
        return;
    };
    garbage_item(&layout.input_dir, 2);
    let s = BatchScheduler::new(layout, cfg).unwrap();
    let report = s.watch(Duration::from_secs(30), || true).unwrap();
    assert!(report.outcomes.is_empty());
}
