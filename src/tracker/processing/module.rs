use anyhow::Result;

use crate::tracker::{commands::TrackerCommand, event::ReadingEvent};

/// Represents an event processor. This should realistically be able to abstract over different
/// options: local ledgers, remote sync.
pub trait EventProcessor {
    fn process_next(
        &mut self,
        message: ReadingEvent,
    ) -> impl std::future::Future<Output = Result<()>>;

    fn handle_command(
        &mut self,
        command: TrackerCommand,
    ) -> impl std::future::Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
