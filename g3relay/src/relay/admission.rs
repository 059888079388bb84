/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Count the flows that passed the admission check.
#[derive(Default)]
pub(super) struct AdmissionGate {
    current: Arc<AtomicUsize>,
}

pub(super) struct AdmissionPermit {
    current: Arc<AtomicUsize>,
}

impl AdmissionGate {
    pub(super) fn try_acquire(&self, max: usize) -> Option<AdmissionPermit> {
        let mut cur = self.current.load(Ordering::Acquire);
        loop {
            if cur >= max {
                return None;
            }
            match self.current.compare_exchange(
                cur,
                cur + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(AdmissionPermit {
                        current: self.current.clone(),
                    });
                }
                Err(v) => cur = v,
            }
        }
    }

    #[cfg(test)]
    fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::AcqRel);
    }
}
