use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use super::{commands::TrackerCommand, event::ReadingEvent};

pub mod ledger;
pub mod module;

/// Receiving side of the pipeline. Drains reading events and runtime
/// commands and feeds them to the processor; shuts down once the capture
/// side drops its sender.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<ReadingEvent>,
    commands: Receiver<TrackerCommand>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(
        receiver: Receiver<ReadingEvent>,
        commands: Receiver<TrackerCommand>,
        processor: P,
    ) -> Self {
        Self {
            receiver,
            commands,
            processor,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut commands_open = true;
        loop {
            tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(event) => {
                        debug!("Processing event {:?}", event);
                        match self.processor.process_next(event.clone()).await {
                            Ok(_) => {
                                debug!("Processed event {:?}", event)
                            }
                            Err(e) => {
                                error!("Error processing event {:?}: {e:?}", event)
                            }
                        }
                    }
                    None => break,
                },
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => {
                        info!("Handling command {:?}", command);
                        if let Err(e) = self.processor.handle_command(command).await {
                            error!("Error handling command {:?}: {e:?}", command);
                        }
                    }
                    // The command side closing is not a shutdown, readings
                    // keep flowing.
                    None => commands_open = false,
                }
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}
