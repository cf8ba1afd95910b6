//! Concurrent stories must never see each other's steps or docs.

use std::time::Duration;
use storyline_context::{enter, markers, scope};
use storyline_recorder::Recorder;
use storyline_schema::story::{Outcome, StepKeyword, StoryOptions};

async fn narrate(name: &'static str, rounds: usize) {
    for i in 0..rounds {
        markers::given(&format!("{name} step {i}")).unwrap();
        markers::note(&format!("{name} note {i}")).unwrap();
        // Give the other task a chance to run between markers.
        tokio::time::sleep(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
    }
    markers::run_async(StepKeyword::Then, &format!("{name} done"), async {
        tokio::task::yield_now().await;
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_tasks_keep_their_own_story() {
    let a = Recorder::start("A", StoryOptions::new());
    let b = Recorder::start("B", StoryOptions::new());

    let ta = tokio::spawn(scope(a.clone(), narrate("A", 20)));
    let tb = tokio::spawn(scope(b.clone(), narrate("B", 20)));
    ta.await.unwrap();
    tb.await.unwrap();

    for (rec, name, other) in [(&a, "A", "B"), (&b, "B", "A")] {
        let record = rec.finalize(Outcome::passed()).unwrap();
        assert_eq!(record.steps.len(), 21);
        for step in &record.steps {
            assert!(step.text.starts_with(name), "{name} got {:?}", step.text);
            for doc in &step.docs {
                let rendered = format!("{doc:?}");
                assert!(!rendered.contains(&format!("{other} note")), "{rendered}");
            }
        }
    }
}

#[test]
fn threads_keep_their_own_story() {
    let stories: Vec<Recorder> = (0..8)
        .map(|i| Recorder::start(&format!("story {i}"), StoryOptions::new()))
        .collect();

    std::thread::scope(|s| {
        for (i, rec) in stories.iter().enumerate() {
            s.spawn(move || {
                let _guard = enter(rec.clone());
                for j in 0..50 {
                    markers::when(&format!("{i}:{j}")).unwrap();
                }
            });
        }
    });

    for (i, rec) in stories.iter().enumerate() {
        let steps = rec.steps();
        assert_eq!(steps.len(), 50);
        let prefix = format!("{i}:");
        assert!(steps.iter().all(|s| s.text.starts_with(&prefix)));
        let order: Vec<_> = steps.iter().map(|s| s.text.clone()).collect();
        let expected: Vec<_> = (0..50).map(|j| format!("{i}:{j}")).collect();
        assert_eq!(order, expected);
    }
}

#[tokio::test]
async fn task_scope_ends_with_the_future() {
    let rec = Recorder::start("scoped", StoryOptions::new());
    scope(rec.clone(), async {
        markers::given("inside").unwrap();
    })
    .await;
    assert!(markers::given("outside").is_err());
    assert_eq!(rec.steps().len(), 1);
}
