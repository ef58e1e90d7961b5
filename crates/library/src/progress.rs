//! Progress reporting for front ends.
//!
//! Two independent kinds of signal come out of a build: counter updates for
//! an overall progress indicator, and one structured [`PackResult`] per pack.

use crate::report::BuildReport;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// An increment (or resize) of the overall progress indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub overall_increment: Option<u64>,
    pub overall_max: Option<u64>,
    pub detail: Option<String>,
}
impl ProgressUpdate {
    pub fn increment(detail: impl Into<String>) -> Self {
        Self { overall_increment: Some(1), detail: Some(detail.into()), ..Self::default() }
    }

    pub fn max(max: u64, detail: impl Into<String>) -> Self {
        Self { overall_max: Some(max), detail: Some(detail.into()), ..Self::default() }
    }

    pub fn detail(detail: impl Into<String>) -> Self {
        Self { detail: Some(detail.into()), ..Self::default() }
    }
}

/// The outcome of loading one pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackResult {
    pub pack_name: String,
    pub source_name: String,
    pub success: bool,
    pub item_count: u64,
    pub error: Option<String>,
}
impl PackResult {
    pub fn succeeded(pack_name: impl Into<String>, source_name: impl Into<String>, item_count: u64) -> Self {
        Self { pack_name: pack_name.into(), source_name: source_name.into(), success: true, item_count, error: None }
    }

    pub fn failed(pack_name: impl Into<String>, source_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            pack_name: pack_name.into(),
            source_name: source_name.into(),
            success: false,
            item_count: 0,
            error: Some(error.into()),
        }
    }
}

/// Receives progress while a build runs. Both methods default to doing
/// nothing, so observers only implement what they render.
pub trait Progress: Send + Sync {
    fn on_progress(&self, _update: ProgressUpdate) {}
    fn on_pack_result(&self, _result: &PackResult) {}
}

impl Progress for () {}

impl<P: Progress + ?Sized> Progress for Arc<P> {
    fn on_progress(&self, update: ProgressUpdate) {
        (**self).on_progress(update)
    }

    fn on_pack_result(&self, result: &PackResult) {
        (**self).on_pack_result(result)
    }
}

/// Events emitted by [`Pipeline::build_stream`](crate::Pipeline::build_stream).
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. [`Progress`](Self::Progress) and [`Pack`](Self::Pack), interleaved.
/// 3. [`Finished`](Self::Finished) exactly once, unless the build failed.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    Started,
    Progress(ProgressUpdate),
    Pack(PackResult),
    Finished(BuildReport),
}

impl Progress for UnboundedSender<BuildEvent> {
    fn on_progress(&self, update: ProgressUpdate) {
        // The receiver only goes away when the stream was dropped.
        _ = self.send(BuildEvent::Progress(update));
    }

    fn on_pack_result(&self, result: &PackResult) {
        _ = self.send(BuildEvent::Pack(result.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn sender_forwards_events() {
        let (tx, mut rx) = unbounded_channel();
        tx.on_progress(ProgressUpdate::increment("Processing: spells"));
        tx.on_pack_result(&PackResult::failed("spells", "dnd5e", "boom"));
        assert!(matches!(rx.try_recv(), Ok(BuildEvent::Progress(u)) if u.overall_increment == Some(1)));
        assert!(matches!(rx.try_recv(), Ok(BuildEvent::Pack(r)) if !r.success && r.error.as_deref() == Some("boom")));
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (tx, rx) = unbounded_channel::<BuildEvent>();
        drop(rx);
        tx.on_pack_result(&PackResult::succeeded("spells", "dnd5e", 3));
    }
}
