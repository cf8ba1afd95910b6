use std::future::Future;
use storyline_recorder::Recorder;

tokio::task_local! {
    static TASK_STORY: Recorder;
}

/// Run `fut` with `recorder` as the current story of this task.
///
/// The binding follows the task across worker threads and await points, so
/// concurrently running bodies never see each other's story.
pub async fn scope<F: Future>(recorder: Recorder, fut: F) -> F::Output {
    TASK_STORY.scope(recorder, fut).await
}

/// Synchronous counterpart of [`scope`].
pub fn sync_scope<R>(recorder: Recorder, f: impl FnOnce() -> R) -> R {
    TASK_STORY.sync_scope(recorder, f)
}

pub(crate) fn current() -> Option<Recorder> {
    TASK_STORY.try_with(Recorder::clone).ok()
}
