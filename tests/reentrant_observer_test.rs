//! Observers that call back into the orchestrator from `on_event`.

mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use helpers::{image, ScriptedService, Tracker};
use label_check::config::OrchestratorConfig;
use label_check::models::job::{JobId, JobStatus, TaskId, UploadFile};
use label_check::services::presenter::{JobEvent, JobObserver};
use label_check::Orchestrator;

/// Cancels every poll as soon as its job starts waiting, and queues one
/// more file the first time the queue reports it is empty.
#[derive(Default)]
struct Interactive {
    orchestrator: OnceLock<Orchestrator>,
    tracker: Tracker,
    refilled: AtomicBool,
    added: Mutex<Vec<JobId>>,
}

impl JobObserver for Interactive {
    fn on_event(&self, event: JobEvent) {
        self.tracker.on_event(event.clone());
        let Some(orchestrator) = self.orchestrator.get() else {
            return;
        };
        match event {
            JobEvent::Updated(job) if job.status == JobStatus::AwaitingResult => {
                if let Some(task_id) = job.task_id {
                    assert!(orchestrator.cancel(&task_id));
                }
            }
            JobEvent::Empty if !self.refilled.swap(true, Ordering::SeqCst) => {
                let ids = orchestrator.submit(vec![image("later.png")]);
                self.added.lock().unwrap().extend(ids);
            }
            _ => {}
        }
    }
}

fn setup(service: ScriptedService) -> (Orchestrator, Arc<Interactive>) {
    let service = Arc::new(service);
    let observer = Arc::new(Interactive::default());
    let orchestrator = Orchestrator::new(
        OrchestratorConfig::default(),
        service.clone(),
        service,
        observer.clone(),
    );
    assert!(observer.orchestrator.set(orchestrator.clone()).is_ok());
    (orchestrator, observer)
}

async fn settle(orchestrator: &Orchestrator) {
    tokio::time::timeout(Duration::from_secs(5), orchestrator.settled())
        .await
        .expect("orchestrator stalled while an observer re-entered it");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_observer_can_cancel_from_event() {
    let service = ScriptedService::new(Duration::from_millis(10));
    service.deferred("label.png", "t1");
    let (orchestrator, observer) = setup(service);

    let ids = orchestrator.submit(vec![image("label.png")]);
    settle(&orchestrator).await;

    let job = orchestrator.job(ids[0]).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("polling cancelled"));
    assert!(orchestrator.active_polls().is_empty());
    assert_eq!(
        observer.tracker.history(ids[0]),
        vec![
            JobStatus::Queued,
            JobStatus::Uploading,
            JobStatus::AwaitingResult,
            JobStatus::Failed
        ]
    );
    assert!(!orchestrator.cancel(&TaskId::new("t1")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_observer_can_submit_on_empty() {
    let service = ScriptedService::new(Duration::from_millis(10));
    service.immediate("later.png", true);
    let (orchestrator, observer) = setup(service);

    let ids = orchestrator.submit(vec![UploadFile::new("notes.txt", "text/plain", b"notes".to_vec())]);
    assert!(ids.is_empty());
    settle(&orchestrator).await;

    let added = observer.added.lock().unwrap().clone();
    assert_eq!(added.len(), 1);
    assert_eq!(orchestrator.job(added[0]).unwrap().status, JobStatus::Succeeded);
    assert!(matches!(
        observer.tracker.events().first(),
        Some(JobEvent::Empty)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_events_raised_during_delivery_keep_order() {
    let service = ScriptedService::new(Duration::from_millis(100));
    service.deferred("a.png", "ta").deferred("b.png", "tb");
    let (orchestrator, observer) = setup(service);

    let ids = orchestrator.submit(vec![image("a.png"), image("b.png")]);
    tokio::time::timeout(Duration::from_secs(60), orchestrator.settled())
        .await
        .expect("jobs did not settle");

    for id in &ids {
        assert_eq!(
            observer.tracker.history(*id),
            vec![
                JobStatus::Queued,
                JobStatus::Uploading,
                JobStatus::AwaitingResult,
                JobStatus::Failed
            ]
        );
    }
    assert_eq!(orchestrator.count(JobStatus::Failed), 2);
    assert_eq!(orchestrator.count(JobStatus::Succeeded), 0);
}
