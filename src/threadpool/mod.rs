use crate::utils::error::TransferError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread;

pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

impl ThreadPool {
    pub fn new(size: usize) -> Result<ThreadPool, TransferError> {
        assert!(size > 0);

        let (sender, receiver) = bounded(size);
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            workers.push(Worker::new(id, receiver.clone())?);
        }

        Ok(ThreadPool {
            workers,
            sender: Some(sender),
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn execute<F>(&self, f: F) -> Result<(), TransferError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(TransferError::PoolClosed)?;
        sender
            .send(Box::new(f))
            .map_err(|_| TransferError::PoolClosed)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // 关闭发送端，工作线程取完剩余任务后退出
        drop(self.sender.take());

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    log::error!("Worker {} panicked", worker.id);
                }
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Receiver<Job>) -> Result<Worker, TransferError> {
        let thread = thread::Builder::new()
            .name(format!("stress-worker-{}", id))
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })?;

        Ok(Worker {
            id,
            thread: Some(thread),
        })
    }
}
