//! In-process stand-in for an MPI runtime.
//!
//! A `SimRuntime` plays one rank of a job. Data that would come from other
//! ranks is preloaded: `root_send` is what the root holds when this rank is
//! not the root, `peers[r]` is what rank `r` contributes to a gather.

#![allow(dead_code)]

use macrompi::{Element, ElementKind, Error, Result, Runtime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct SimRuntime {
    pub rank: i32,
    pub size: i32,
    pub root_send: Vec<u8>,
    pub peers: Vec<Vec<u8>>,
    pub unsupported: Vec<ElementKind>,
    pub fail_code: Option<i32>,
    pub collective_calls: Arc<AtomicUsize>,
    initialized: bool,
    finalized: bool,
}

impl SimRuntime {
    pub fn new(rank: i32, size: i32) -> Self {
        SimRuntime {
            rank,
            size,
            root_send: Vec::new(),
            peers: vec![Vec::new(); size as usize],
            unsupported: Vec::new(),
            fail_code: None,
            collective_calls: Arc::new(AtomicUsize::new(0)),
            initialized: false,
            finalized: false,
        }
    }

    pub fn with_root_data<T: Element>(mut self, data: &[T]) -> Self {
        self.root_send = T::to_bytes(data);
        self
    }

    pub fn with_peer<T: Element>(mut self, rank: usize, data: &[T]) -> Self {
        self.peers[rank] = T::to_bytes(data);
        self
    }

    fn collective(&self) -> Result<()> {
        self.collective_calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_code {
            Some(code) => Err(Error::MpiError(code)),
            None => Ok(()),
        }
    }

    fn source<'a>(&'a self, send: &'a [u8], root: i32) -> &'a [u8] {
        if self.rank == root {
            send
        } else {
            &self.root_send
        }
    }

    fn contribution<'a>(&'a self, send: &'a [u8], from: usize) -> &'a [u8] {
        if from == self.rank as usize {
            send
        } else {
            &self.peers[from]
        }
    }
}

fn copy(from: &[u8], offset: usize, count: usize, to: &mut [u8], at: usize, kind: ElementKind) {
    let n = kind.size();
    to[at * n..(at + count) * n].copy_from_slice(&from[offset * n..(offset + count) * n]);
}

impl Runtime for SimRuntime {
    fn flavor(&self) -> &str {
        "simulated"
    }

    fn init(&mut self, _args: &[String]) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        Ok(self.initialized)
    }

    fn is_finalized(&self) -> Result<bool> {
        Ok(self.finalized)
    }

    fn rank(&self) -> Result<i32> {
        Ok(self.rank)
    }

    fn size(&self) -> Result<i32> {
        Ok(self.size)
    }

    fn barrier(&self) -> Result<()> {
        self.collective()
    }

    fn supports(&self, kind: ElementKind) -> bool {
        !self.unsupported.contains(&kind)
    }

    fn scatter(
        &self,
        send: &[u8],
        send_count: i32,
        recv: &mut [u8],
        recv_count: i32,
        kind: ElementKind,
        root: i32,
    ) -> Result<()> {
        self.collective()?;
        let offset = self.rank as usize * send_count as usize;
        copy(self.source(send, root), offset, recv_count as usize, recv, 0, kind);
        Ok(())
    }

    fn scatterv(
        &self,
        send: &[u8],
        send_counts: &[i32],
        displs: &[i32],
        recv: &mut [u8],
        recv_count: i32,
        kind: ElementKind,
        root: i32,
    ) -> Result<()> {
        self.collective()?;
        let me = self.rank as usize;
        if send_counts.len() <= me || send_counts[me] != recv_count {
            return Err(Error::MpiError(15));
        }
        copy(
            self.source(send, root),
            displs[me] as usize,
            recv_count as usize,
            recv,
            0,
            kind,
        );
        Ok(())
    }

    fn gather(
        &self,
        send: &[u8],
        _send_count: i32,
        recv: &mut [u8],
        recv_count: i32,
        kind: ElementKind,
        root: i32,
    ) -> Result<()> {
        self.collective()?;
        if self.rank != root {
            return Ok(());
        }
        for from in 0..self.size as usize {
            let count = recv_count as usize;
            copy(self.contribution(send, from), 0, count, recv, from * count, kind);
        }
        Ok(())
    }

    fn gatherv(
        &self,
        send: &[u8],
        _send_count: i32,
        recv: &mut [u8],
        recv_counts: &[i32],
        displs: &[i32],
        kind: ElementKind,
        root: i32,
    ) -> Result<()> {
        self.collective()?;
        if self.rank != root {
            return Ok(());
        }
        for from in 0..self.size as usize {
            copy(
                self.contribution(send, from),
                0,
                recv_counts[from] as usize,
                recv,
                displs[from] as usize,
                kind,
            );
        }
        Ok(())
    }
}
