use super::repository::MeasurementRepository;
use crate::probe::Measurement;
use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};

#[derive(Clone, Debug)]
pub enum WriterMessage {
    Save(Box<Measurement>, String),
    Stop,
}

/// Cheap, cloneable entry point the engine uses to hand off saves.
#[derive(Clone)]
pub struct SaveQueue {
    sender: Sender<WriterMessage>,
}

impl SaveQueue {
    /// Queues a save and returns immediately. A gone writer drops the save.
    pub fn submit(&self, measurement: Measurement, target: &str) {
        if self
            .sender
            .send(WriterMessage::Save(Box::new(measurement), target.to_string()))
            .is_err()
        {
            tracing::debug!("persistence writer is gone; measurement not saved");
        }
    }
}

pub struct WriterHandle {
    pub sender: Sender<WriterMessage>,
    pub join: Option<JoinHandle<()>>,
}

impl WriterHandle {
    pub fn queue(&self) -> SaveQueue {
        SaveQueue {
            sender: self.sender.clone(),
        }
    }

    /// Drains what is already queued, then stops the writer thread.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let _ = self.sender.send(WriterMessage::Stop);
        if let Some(join) = self.join.take()
            && join.join().is_err()
        {
            tracing::error!("persistence writer panicked");
        }
    }
}

impl Drop for WriterHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

pub fn spawn_writer(repository: MeasurementRepository) -> WriterHandle {
    let (tx, rx) = crossbeam_channel::unbounded();
    let join = thread::Builder::new()
        .name("netpulse-writer".to_string())
        .spawn(move || run_writer(repository, rx));
    let join = match join {
        Ok(join) => Some(join),
        Err(err) => {
            tracing::error!(error = %err, "failed to spawn persistence writer; history disabled");
            None
        }
    };
    WriterHandle { sender: tx, join }
}

fn run_writer(repository: MeasurementRepository, rx: Receiver<WriterMessage>) {
    while let Ok(message) = rx.recv() {
        match message {
            WriterMessage::Save(measurement, target) => repository.save(&measurement, &target),
            WriterMessage::Stop => break,
        }
    }
}
