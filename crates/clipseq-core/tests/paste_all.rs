use clipseq_core::{
    execute_plan, ingest_files, ingest_image, ingest_text, plan_paste_all, CaptureGate,
    DuplicatePolicy, ItemStatus, JoinMode, MemStore, PasteAllMode, PasteOptions, PasteStep,
    PasteTarget, Query, Store,
};
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    pasted: Vec<PasteStep>,
    fail_first: usize,
    calls: usize,
}

impl PasteTarget for Recorder {
    fn paste(&mut self, step: &PasteStep) -> anyhow::Result<()> {
        self.calls += 1;
        if self.calls <= self.fail_first {
            anyhow::bail!("keystroke rejected");
        }
        self.pasted.push(step.clone());
        Ok(())
    }
}

fn quick(mark_used: bool, max_retries: u32) -> PasteOptions {
    PasteOptions {
        interval: Duration::ZERO,
        max_retries,
        mark_used,
    }
}

fn seeded() -> (MemStore, Vec<i64>) {
    let store = MemStore::new();
    let ids = vec![
        ingest_text(&store, "你好", DuplicatePolicy::Separate).unwrap().id().unwrap(),
        ingest_image(&store, "/img/a.png").unwrap().id().unwrap(),
        ingest_text(&store, "世界", DuplicatePolicy::Separate).unwrap().id().unwrap(),
        ingest_files(&store, &["/f/1", "/f/2"]).unwrap().id().unwrap(),
    ];
    (store, ids)
}

#[test]
fn merge_mode_joins_text_first_then_other_items() {
    let (store, ids) = seeded();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items, PasteAllMode::Merge, JoinMode::Cjk, "");
    assert_eq!(
        plan,
        vec![
            PasteStep::Text {
                sources: vec![ids[0], ids[2]],
                text: "你好世界".into()
            },
            PasteStep::Image {
                item: ids[1],
                path: "/img/a.png".into()
            },
            PasteStep::Files {
                item: ids[3],
                paths: vec!["/f/1".into(), "/f/2".into()]
            },
        ]
    );
}

#[test]
fn merge_mode_uses_custom_separator() {
    let (store, ids) = seeded();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items, PasteAllMode::Merge, JoinMode::Custom, " / ");
    assert_eq!(
        plan[0],
        PasteStep::Text {
            sources: vec![ids[0], ids[2]],
            text: "你好 / 世界".into()
        }
    );
}

#[test]
fn merge_mode_without_text_has_no_text_step() {
    let store = MemStore::new();
    ingest_image(&store, "/only.png").unwrap();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items, PasteAllMode::Merge, JoinMode::Cjk, "");
    assert_eq!(plan.len(), 1);
    assert!(matches!(plan[0], PasteStep::Image { .. }));
}

#[test]
fn step_mode_keeps_item_order() {
    let (store, ids) = seeded();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items, PasteAllMode::Step, JoinMode::Cjk, "");
    let order: Vec<i64> = plan.iter().flat_map(|s| s.sources().to_vec()).collect();
    assert_eq!(order, ids);
}

#[test]
fn execution_marks_consumed_items_used() {
    let (store, ids) = seeded();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items, PasteAllMode::Merge, JoinMode::Cjk, "");
    let mut target = Recorder::default();
    let report = execute_plan(&store, &mut target, None, &plan, &quick(true, 0)).unwrap();
    assert_eq!(report.pasted, 3);
    assert!(report.failures.is_empty());
    assert_eq!(target.pasted, plan);
    for id in ids {
        assert_eq!(store.get(id).unwrap().unwrap().status, ItemStatus::Used);
    }
}

#[test]
fn execution_leaves_status_alone_when_disabled() {
    let (store, _) = seeded();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items, PasteAllMode::Step, JoinMode::Cjk, "");
    let mut target = Recorder::default();
    let report = execute_plan(&store, &mut target, None, &plan, &quick(false, 0)).unwrap();
    assert_eq!(report.pasted, 4);
    assert!(report.marked_used.is_empty());
    let used = store
        .list(Query {
            status: Some(ItemStatus::Used),
            ..Query::default()
        })
        .unwrap();
    assert!(used.is_empty());
}

#[test]
fn retries_then_records_failures() {
    let (store, ids) = seeded();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items, PasteAllMode::Step, JoinMode::Cjk, "");

    // one failure is absorbed by a retry
    let mut flaky = Recorder {
        fail_first: 1,
        ..Recorder::default()
    };
    let report = execute_plan(&store, &mut flaky, None, &plan, &quick(true, 1)).unwrap();
    assert_eq!(report.pasted, 4);
    assert!(report.failures.is_empty());

    // without retries the first step fails and the rest still run
    for id in &ids {
        store.mark_active(*id).unwrap();
    }
    let mut broken = Recorder {
        fail_first: 1,
        ..Recorder::default()
    };
    let report = execute_plan(&store, &mut broken, None, &plan, &quick(true, 0)).unwrap();
    assert_eq!(report.pasted, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].sources, vec![ids[0]]);
    assert!(report.failures[0].message.contains("keystroke rejected"));
    assert_eq!(store.get(ids[0]).unwrap().unwrap().status, ItemStatus::Active);
}

#[test]
fn execution_suppresses_capture() {
    let (store, _) = seeded();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items, PasteAllMode::Merge, JoinMode::Cjk, "");
    let gate = CaptureGate::default();
    assert!(gate.admit(None));
    let mut target = Recorder::default();
    execute_plan(&store, &mut target, Some(&gate), &plan, &quick(false, 0)).unwrap();
    assert!(gate.is_suppressed());
    assert!(!gate.admit(None));
}

#[test]
fn deleted_item_aborts_with_store_error() {
    let (store, ids) = seeded();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items, PasteAllMode::Step, JoinMode::Cjk, "");
    store.delete(&[ids[0]]).unwrap();
    let mut target = Recorder::default();
    assert!(execute_plan(&store, &mut target, None, &plan, &quick(true, 0)).is_err());
}

#[test]
fn oversized_retry_count_is_capped() {
    let (store, _) = seeded();
    let items = store.list(Query::default()).unwrap();
    let plan = plan_paste_all(&items[..1], PasteAllMode::Step, JoinMode::Cjk, "");
    let mut never = Recorder {
        fail_first: usize::MAX,
        ..Recorder::default()
    };
    let report = execute_plan(&store, &mut never, None, &plan, &quick(true, u32::MAX)).unwrap();
    assert_eq!(report.pasted, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(never.calls, clipseq_core::MAX_RETRIES_LIMIT as usize + 1);
}
