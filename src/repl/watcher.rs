use crossbeam_channel::Sender;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

/// Watches script files on notify's background thread and forwards raw
/// events to a channel.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher that sends events to the provided channel
    pub fn new(tx: Sender<notify::Result<Event>>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res| {
            // The receiver is gone once the loop has exited
            let _ = tx.send(res);
        })?;

        Ok(Self { watcher })
    }

    /// Add a path to be watched
    pub fn watch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        self.watcher
            .watch(path.as_ref(), RecursiveMode::NonRecursive)
    }

    /// Remove a path from being watched
    pub fn unwatch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        self.watcher.unwatch(path.as_ref())
    }
}

/// Paths whose contents changed, or nothing for events that do not call
/// for a re-run (access, metadata, removal)
pub fn changed_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Modify(_) | EventKind::Create(_) => event.paths,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind) -> Event {
        Event::new(kind).add_path(PathBuf::from("main.hn"))
    }

    #[test]
    fn test_only_content_changes_trigger_reruns() {
        assert_eq!(
            changed_paths(event(EventKind::Modify(ModifyKind::Any))),
            vec![PathBuf::from("main.hn")]
        );
        assert_eq!(changed_paths(event(EventKind::Create(CreateKind::File))).len(), 1);
        assert!(changed_paths(event(EventKind::Access(AccessKind::Any))).is_empty());
        assert!(changed_paths(event(EventKind::Remove(RemoveKind::File))).is_empty());
    }

    #[test]
    fn test_watcher_creation() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        assert!(FileWatcher::new(tx).is_ok());
    }
}
