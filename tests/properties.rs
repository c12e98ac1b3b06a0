use proptest::prelude::*;
use std::path::Path;
use std::time::Duration;

use logpager::{ContentReader, PagerConfig, PagingEngine, ScanLimits};

/// Small scan limits so short files still cross block and checkpoint edges
fn config() -> PagerConfig {
    PagerConfig::default()
        .with_poll_interval(Duration::from_secs(3600))
        .with_scan_limits(ScanLimits {
            block_size: 16,
            backscan_initial: 4,
            backscan_max: 256,
            checkpoint_stride: 4,
            max_recent_boundaries: 8,
        })
}

fn write_file(path: &Path, lines: &[String]) {
    let content: String = lines.iter().map(|l| format!("{l}\n")).collect();
    std::fs::write(path, content).expect("write contents");
}

fn line_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9 ]{0,12}", 0..60)
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Up(usize),
    Down(usize),
    Top(usize),
    Tail(usize),
    Refresh(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1usize..12).prop_map(Step::Up),
        (1usize..12).prop_map(Step::Down),
        (1usize..12).prop_map(Step::Top),
        (1usize..12).prop_map(Step::Tail),
        (1usize..12).prop_map(Step::Refresh),
    ]
}

/// Lines `start..start + n` as a full read of the file would return them
fn slice(lines: &[String], start: usize, n: usize) -> Vec<String> {
    let start = start.min(lines.len());
    lines[start..(start + n).min(lines.len())].to_vec()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn to_top_then_move_up_is_idempotent(lines in line_strategy(), n in 0usize..20) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prop.log");
        write_file(&path, &lines);
        let mut engine = PagingEngine::open(&path, config()).unwrap();

        let top = engine.to_top(n);
        prop_assert_eq!(engine.move_up(n), top);
    }

    #[test]
    fn navigation_matches_full_read(
        lines in line_strategy(),
        steps in prop::collection::vec(step_strategy(), 1..24),
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prop.log");
        write_file(&path, &lines);
        let mut engine = PagingEngine::open(&path, config()).unwrap();

        for step in steps {
            let (n, page) = match step {
                Step::Up(n) => (n, engine.move_up(n)),
                Step::Down(n) => (n, engine.move_down(n)),
                Step::Top(n) => (n, engine.to_top(n)),
                Step::Tail(n) => (n, engine.to_tail(n)),
                Step::Refresh(n) => (n, engine.refresh(n)),
            };
            let page = page.unwrap();
            let start = engine.window_start() as usize;
            prop_assert!(start <= lines.len());

            match step {
                Step::Top(_) => prop_assert_eq!(&page, &slice(&lines, 0, n)),
                Step::Tail(_) => {
                    let from = lines.len().saturating_sub(n);
                    prop_assert_eq!(&page, &slice(&lines, from, n));
                }
                Step::Up(_) | Step::Refresh(_) => {
                    prop_assert_eq!(&page, &slice(&lines, start, n));
                }
                Step::Down(_) => prop_assert!(page.len() <= n),
            }

            // Whatever was kept from earlier pages agrees with a fresh read
            prop_assert_eq!(engine.refresh(n), Some(slice(&lines, start, n)));
        }
    }

    #[test]
    fn to_tail_returns_last_lines(lines in line_strategy(), n in 0usize..80) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prop.log");
        write_file(&path, &lines);
        let mut engine = PagingEngine::open(&path, config()).unwrap();

        let expected = lines[lines.len().saturating_sub(n)..].to_vec();
        prop_assert_eq!(engine.to_tail(n), Some(expected));
    }

    #[test]
    fn interior_move_down_then_up_round_trips(
        lines in prop::collection::vec("[a-z]{1,8}", 30..80),
        n in 1usize..8,
        steps in 0usize..3,
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prop.log");
        write_file(&path, &lines);
        let mut engine = PagingEngine::open(&path, config()).unwrap();

        let mut window = engine.to_top(n).unwrap();
        for _ in 0..steps {
            window = engine.move_down(n).unwrap();
        }
        // Stay clear of the bottom so neither move is clamped
        prop_assume!((steps + 2) * n <= lines.len());

        let below = engine.move_down(n).unwrap();
        prop_assert_eq!(below.len(), n);
        prop_assert_eq!(engine.move_up(n), Some(window));
    }

    #[test]
    fn refresh_on_unmodified_file_is_stable(
        lines in line_strategy(),
        n in 0usize..20,
        downs in 0usize..4,
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prop.log");
        write_file(&path, &lines);
        let mut engine = PagingEngine::open(&path, config()).unwrap();

        let mut window = engine.to_top(n).unwrap();
        for _ in 0..downs {
            engine.move_down(n).unwrap();
            window = engine.refresh(n).unwrap();
        }
        prop_assert_eq!(engine.refresh(n), Some(window));
    }

    #[test]
    fn truncation_below_window_matches_tail(
        lines in prop::collection::vec("[a-z]{0,8}", 20..60),
        keep in 0usize..10,
        n in 1usize..6,
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prop.log");
        write_file(&path, &lines);
        let mut engine = PagingEngine::open(&path, config()).unwrap();

        engine.to_top(n).unwrap();
        engine.move_down(n).unwrap();
        engine.move_down(n).unwrap();
        prop_assume!(keep < 2 * n);

        write_file(&path, &lines[..keep]);
        let refreshed = engine.refresh(n);
        prop_assert_eq!(refreshed.clone(), engine.to_tail(n));
        prop_assert_eq!(refreshed, Some(lines[keep.saturating_sub(n)..keep].to_vec()));
    }
}
